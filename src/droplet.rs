// Copyright (c) 2026 rezky_nightky

use rand::{
    distr::{Distribution, Uniform},
    Rng,
};

use crate::cell::CharacterCell;
use crate::glyph::Glyph;
use crate::layer::{DepthLayer, LayerGrids};
use crate::palette::Palette;
use crate::runtime::DepthBias;

pub const MIN_LENGTH: u32 = 5;
pub const MAX_LENGTH: u32 = 50;
pub const MIN_SPEED: u32 = 10;
pub const MAX_SPEED: u32 = 30;

/// Shared, read-only inputs for one simulation step.
pub struct DrawCtx<'a> {
    pub layers: &'a [DepthLayer],
    pub palette: &'a Palette,
    pub glyphs: &'a [Glyph],
    pub column_count: u32,
    pub view_width: f32,
    pub view_height: f32,
    pub depth_bias: DepthBias,
    pub show_head: bool,
}

impl DrawCtx<'_> {
    fn cell_size(&self, layer: usize) -> f32 {
        self.layers[layer].cell_size(self.view_width, self.column_count)
    }
}

/// Table index for the glyph shown at (`column`, `row`). A pure function of
/// its inputs, so a cell keeps its glyph between frames until the table is
/// reshuffled.
pub fn glyph_index(column: u32, row: i32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let mut h = (column as u64)
        .wrapping_add(1)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (row as i64 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    h ^= h >> 29;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 32;
    (h % len as u64) as usize
}

pub fn hashed_glyph(glyphs: &[Glyph], column: u32, row: i32) -> Option<&Glyph> {
    glyphs.get(glyph_index(column, row, glyphs.len()))
}

/// One falling string. `head` is the continuous row of the leading glyph;
/// the trailing glyph sits `length - 1` rows above it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Droplet {
    pub column: u32,
    pub head: f32,
    pub length: u32,
    pub speed: f32,
    pub layer: usize,
}

impl Droplet {
    /// Rows `(min_y, max_y)` covered this frame.
    pub fn rows(&self) -> (i32, i32) {
        let max_y = self.head.round() as i32;
        (max_y - self.length as i32 + 1, max_y)
    }

    /// Fresh random state, placed above the top edge with a random delay.
    pub fn init<R: Rng + ?Sized>(&mut self, rng: &mut R, ctx: &DrawCtx<'_>) {
        let count = ctx.layers.len().max(1);
        let t: f32 = rng.random();
        self.layer =
            ((t.powi(ctx.depth_bias.exponent()) * count as f32) as usize).min(count - 1);

        let layer = ctx.layers[self.layer];
        let columns = layer.columns(ctx.column_count);
        self.column = Uniform::new(0, columns).expect("valid range").sample(rng);
        self.length = Uniform::new_inclusive(MIN_LENGTH, MAX_LENGTH)
            .expect("valid range")
            .sample(rng);
        self.speed = Uniform::new_inclusive(MIN_SPEED, MAX_SPEED)
            .expect("valid range")
            .sample(rng) as f32;

        let spread = (MAX_LENGTH as f32).max(ctx.view_height / layer.depth);
        let r = Uniform::new(0.0, spread).expect("valid range").sample(rng);
        self.head = -(self.length as f32 + r);
    }

    /// Emits the visible rows into the droplet's layer grid, moves the head
    /// by `speed * dt` and respawns once the trailing row is below the view.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        ctx: &DrawCtx<'_>,
        grids: &mut LayerGrids,
        rng: &mut R,
    ) {
        let layer = ctx.layers[self.layer];
        let cell = ctx.cell_size(self.layer);
        let fade = layer.fade();
        let (min_y, max_y) = self.rows();

        for y in min_y..=max_y {
            let top = y as f32 * cell;
            if top + cell <= 0.0 || top >= ctx.view_height {
                continue;
            }
            let Some(glyph) = hashed_glyph(ctx.glyphs, self.column, y) else {
                break;
            };
            let color = if ctx.show_head && y == max_y {
                let h = ctx.palette.head;
                [h[0], h[1], h[2], 1.0]
            } else {
                let t = if max_y == min_y {
                    1.0
                } else {
                    (y - min_y) as f32 / (max_y - min_y) as f32
                };
                let c = ctx.palette.get(t);
                [c[0], c[1], c[2], t * fade]
            };
            let pos = [self.column as f32 * cell, top];
            grids.push(self.layer, &CharacterCell::new(glyph, color, pos, cell));
        }

        self.head += self.speed * dt;

        if min_y as f32 * cell >= ctx.view_height {
            self.init(rng, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::DEFAULT_LAYERS;
    use crate::palette::build_palette;
    use crate::runtime::ColorScheme;
    use rand::{rngs::StdRng, SeedableRng};

    fn glyphs() -> Vec<Glyph> {
        ('0'..='9')
            .map(|c| Glyph {
                code_point: c,
                uv0: [0.0, 1.0],
                uv1: [1.0, 0.0],
                advance: 1.0,
                offset: [0.0, 0.0],
                size: [1.0, 1.0],
            })
            .collect()
    }

    fn ctx<'a>(palette: &'a Palette, glyphs: &'a [Glyph]) -> DrawCtx<'a> {
        DrawCtx {
            layers: &DEFAULT_LAYERS,
            palette,
            glyphs,
            column_count: 64,
            view_width: 64.0,
            view_height: 48.0,
            depth_bias: DepthBias::Quadratic,
            show_head: true,
        }
    }

    #[test]
    fn respawned_fields_stay_in_range() {
        let palette = build_palette(ColorScheme::Green);
        let g = glyphs();
        let ctx = ctx(&palette, &g);
        let mut rng = StdRng::seed_from_u64(1);
        let mut d = Droplet::default();
        for _ in 0..2000 {
            d.init(&mut rng, &ctx);
            assert!((MIN_LENGTH..=MAX_LENGTH).contains(&d.length));
            assert!((MIN_SPEED as f32..=MAX_SPEED as f32).contains(&d.speed));
            assert!(d.layer < DEFAULT_LAYERS.len());
            assert!(d.column < DEFAULT_LAYERS[d.layer].columns(64));
            assert!(d.head <= -(d.length as f32));
        }
    }

    #[test]
    fn depth_bias_favours_far_layers() {
        let palette = build_palette(ColorScheme::Green);
        let g = glyphs();
        let mut c = ctx(&palette, &g);
        let mut rng = StdRng::seed_from_u64(2);
        let mut d = Droplet::default();
        let mut far = 0;
        let mut near = 0;
        for bias in [DepthBias::Quadratic, DepthBias::Cubic] {
            c.depth_bias = bias;
            for _ in 0..1000 {
                d.init(&mut rng, &c);
                match d.layer {
                    0 => far += 1,
                    4 => near += 1,
                    _ => {}
                }
            }
        }
        assert!(far > near * 2);
    }

    #[test]
    fn head_advances_speed_times_time() {
        let palette = build_palette(ColorScheme::Green);
        let g = glyphs();
        let ctx = ctx(&palette, &g);
        let mut rng = StdRng::seed_from_u64(3);
        let mut grids = LayerGrids::new(DEFAULT_LAYERS.len());
        let start = Droplet {
            column: 3,
            head: -5.0,
            length: 10,
            speed: 10.0,
            layer: 0,
        };
        let mut d = start;
        for _ in 0..60 {
            d.update(1.0 / 60.0, &ctx, &mut grids, &mut rng);
        }
        assert!((d.head - 5.0).abs() < 1e-3);
        assert_eq!(d.length, start.length);
        assert_eq!(d.column, start.column);
    }

    #[test]
    fn trailing_row_past_bottom_respawns_on_next_update() {
        let palette = build_palette(ColorScheme::Green);
        let g = glyphs();
        let ctx = ctx(&palette, &g);
        let mut rng = StdRng::seed_from_u64(4);
        let mut grids = LayerGrids::new(DEFAULT_LAYERS.len());
        let cell = DEFAULT_LAYERS[4].cell_size(64.0, 64);
        let rows = (48.0 / cell) as i32;
        let mut d = Droplet {
            column: 0,
            head: (rows + 9) as f32,
            length: 10,
            speed: 10.0,
            layer: 4,
        };
        assert_eq!(d.rows().0, rows);
        d.update(0.0, &ctx, &mut grids, &mut rng);
        assert!(d.head < 0.0);
        assert_eq!(grids.total_cells(), 0);
    }

    #[test]
    fn emitted_rows_fade_toward_the_tail() {
        let palette = build_palette(ColorScheme::Green);
        let g = glyphs();
        let mut c = ctx(&palette, &g);
        c.show_head = false;
        let mut rng = StdRng::seed_from_u64(5);
        let mut grids = LayerGrids::new(DEFAULT_LAYERS.len());
        let mut d = Droplet {
            column: 1,
            head: 12.0,
            length: 5,
            speed: 0.0,
            layer: 4,
        };
        d.update(0.0, &c, &mut grids, &mut rng);
        let v = grids.vertices(4);
        assert_eq!(v.len(), 5 * 6);
        let alphas: Vec<f32> = v.chunks(6).map(|q| q[0].color[3]).collect();
        assert_eq!(alphas[0], 0.0);
        assert_eq!(alphas[4], 1.0);
        assert!(alphas.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn single_row_string_is_fully_opaque() {
        let palette = build_palette(ColorScheme::Green);
        let g = glyphs();
        let mut c = ctx(&palette, &g);
        c.show_head = false;
        let mut rng = StdRng::seed_from_u64(6);
        let mut grids = LayerGrids::new(DEFAULT_LAYERS.len());
        let mut d = Droplet {
            column: 1,
            head: 3.0,
            length: 1,
            speed: 0.0,
            layer: 4,
        };
        d.update(0.0, &c, &mut grids, &mut rng);
        let a = grids.vertices(4)[0].color[3];
        assert!(a.is_finite());
        assert_eq!(a, 1.0);
    }

    #[test]
    fn head_row_uses_head_color() {
        let palette = build_palette(ColorScheme::Green);
        let g = glyphs();
        let c = ctx(&palette, &g);
        let mut rng = StdRng::seed_from_u64(7);
        let mut grids = LayerGrids::new(DEFAULT_LAYERS.len());
        let mut d = Droplet {
            column: 2,
            head: 10.0,
            length: 4,
            speed: 0.0,
            layer: 0,
        };
        d.update(0.0, &c, &mut grids, &mut rng);
        let v = grids.vertices(0);
        let head = v[v.len() - 1].color;
        assert_eq!(&head[..3], &palette.head[..]);
        assert_eq!(head[3], 1.0);
    }

    #[test]
    fn glyph_hash_is_stable() {
        for (x, y) in [(0, 0), (5, -3), (900, 77)] {
            assert_eq!(glyph_index(x, y, 37), glyph_index(x, y, 37));
            assert!(glyph_index(x, y, 37) < 37);
        }
        let spread: std::collections::HashSet<usize> =
            (0..40).map(|y| glyph_index(3, y, 10)).collect();
        assert!(spread.len() > 5);
    }
}
