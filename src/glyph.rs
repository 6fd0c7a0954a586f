// Copyright (c) 2026 rezky_nightky

use std::collections::HashMap;
use std::fmt;

use rand::{
    distr::{Distribution, Uniform},
    Rng,
};

use crate::bitmap_font;
use crate::gfx::{Filter, Gpu, TextureId};

/// Metrics and atlas placement of one character. Everything except the UVs
/// is normalized against the font's nominal pixel size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glyph {
    pub code_point: char,
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
    pub advance: f32,
    pub offset: [f32; 2],
    pub size: [f32; 2],
}

#[derive(Debug)]
pub enum GlyphError {
    MissingGlyph(char),
    FontLoad(String),
    AtlasFull { code_point: char },
}

impl fmt::Display for GlyphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlyphError::MissingGlyph(c) => {
                write!(f, "glyph U+{:04X} ({:?}) is not in the font", *c as u32, c)
            }
            GlyphError::FontLoad(e) => write!(f, "failed to load font: {}", e),
            GlyphError::AtlasFull { code_point } => write!(
                f,
                "glyph atlas is full while packing U+{:04X}; lower --font-size",
                *code_point as u32
            ),
        }
    }
}

impl std::error::Error for GlyphError {}

/// Metrics and UV lookup used by the rain and the intro.
pub trait GlyphProvider {
    /// Any glyph that was loaded, by code point.
    fn find_glyph(&self, code_point: char) -> Result<&Glyph, GlyphError>;

    /// The rain's lookup table. Only its order changes at runtime.
    fn glyphs(&self) -> &[Glyph];

    /// Exchanges `count` random pairs of entries in the rain table.
    fn swap_glyphs<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R);
}

pub const ATLAS_WIDTH: u32 = 1024;
pub const ATLAS_MAX_HEIGHT: u32 = 1024;
const PADDING: u32 = 2;

struct Raster {
    code_point: char,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    advance: f32,
    offset: [f32; 2],
}

struct Placed {
    raster: Raster,
    x: u32,
    y: u32,
}

/// Shelf packer: glyphs go left to right, a new shelf starts when a row is
/// full. The atlas height is trimmed to the shelves in use.
fn pack(rasters: Vec<Raster>, width: u32) -> Result<(Vec<Placed>, u32), GlyphError> {
    let mut x = PADDING;
    let mut y = PADDING;
    let mut shelf_h = 0;
    let mut placed = Vec::with_capacity(rasters.len());

    for r in rasters {
        if x + r.width + PADDING > width {
            x = PADDING;
            y += shelf_h + PADDING;
            shelf_h = 0;
        }
        if r.width + 2 * PADDING > width || y + r.height + PADDING > ATLAS_MAX_HEIGHT {
            return Err(GlyphError::AtlasFull {
                code_point: r.code_point,
            });
        }
        shelf_h = shelf_h.max(r.height);
        let (px, py) = (x, y);
        x += r.width + PADDING;
        placed.push(Placed {
            raster: r,
            x: px,
            y: py,
        });
    }

    let height = (y + shelf_h + PADDING).min(ATLAS_MAX_HEIGHT);
    Ok((placed, height))
}

fn dedup(chars: impl IntoIterator<Item = char>) -> Vec<char> {
    let mut seen = std::collections::HashSet::new();
    chars.into_iter().filter(|c| seen.insert(*c)).collect()
}

/// Glyphs rasterized into one `R8` texture owned by the graphics context.
pub struct GlyphAtlas {
    texture: Option<TextureId>,
    table: Vec<Glyph>,
    lookup: HashMap<char, Glyph>,
    atlas_size: (u32, u32),
}

impl GlyphAtlas {
    /// Rasterizes `rain` (every entry required) and `extra` (loaded when the
    /// font has it) from TrueType `font_bytes` at `px` pixels.
    pub fn from_font(
        gpu: &mut Gpu,
        font_bytes: &[u8],
        px: f32,
        rain: &[char],
        extra: &[char],
    ) -> Result<Self, GlyphError> {
        let font = fontdue::Font::from_bytes(font_bytes, fontdue::FontSettings::default())
            .map_err(|e| GlyphError::FontLoad(e.to_string()))?;
        let ascent = font
            .horizontal_line_metrics(px)
            .map(|m| m.ascent)
            .unwrap_or(px * 0.8);

        let mut rasters = Vec::new();
        for c in dedup(rain.iter().chain(extra).copied()) {
            let present = c == ' ' || font.lookup_glyph_index(c) != 0;
            if !present {
                if rain.contains(&c) {
                    return Err(GlyphError::MissingGlyph(c));
                }
                log::debug!("font has no glyph for U+{:04X}, skipped", c as u32);
                continue;
            }
            let (m, pixels) = font.rasterize(c, px);
            rasters.push(Raster {
                code_point: c,
                width: m.width as u32,
                height: m.height as u32,
                pixels,
                advance: m.advance_width / px,
                offset: [
                    (px - m.width as f32) * 0.5 / px,
                    (ascent - (m.ymin as f32 + m.height as f32)) / px,
                ],
            });
        }

        Self::upload(gpu, rasters, rain, px, ATLAS_WIDTH, Filter::Linear)
    }

    /// Uses the built-in dot font; `px` picks the dot size.
    pub fn builtin(gpu: &mut Gpu, px: f32, rain: &[char], extra: &[char]) -> Result<Self, GlyphError> {
        let dot = (px / bitmap_font::CELL_DOTS as f32).round().max(1.0) as u32;
        let nominal = (bitmap_font::CELL_DOTS * dot) as f32;
        let cell = bitmap_font::CELL_DOTS as f32;

        let mut rasters = Vec::new();
        for c in dedup(rain.iter().chain(extra).copied()) {
            let Some((width, height, pixels)) = bitmap_font::rasterize(c, dot) else {
                if rain.contains(&c) {
                    return Err(GlyphError::MissingGlyph(c));
                }
                continue;
            };
            rasters.push(Raster {
                code_point: c,
                width,
                height,
                pixels,
                advance: (bitmap_font::DOTS_W + 1) as f32 / cell,
                offset: [
                    (cell - bitmap_font::DOTS_W as f32) * 0.5 / cell,
                    (cell - bitmap_font::DOTS_H as f32) * 0.5 / cell,
                ],
            });
        }

        Self::upload(gpu, rasters, rain, nominal, 256, Filter::Nearest)
    }

    fn upload(
        gpu: &mut Gpu,
        rasters: Vec<Raster>,
        rain: &[char],
        nominal: f32,
        width: u32,
        filter: Filter,
    ) -> Result<Self, GlyphError> {
        let (placed, height) = pack(rasters, width)?;

        let mut bitmap = vec![0u8; (width * height) as usize];
        let mut lookup = HashMap::with_capacity(placed.len());
        let (w, h) = (width as f32, height as f32);

        for p in &placed {
            let r = &p.raster;
            for row in 0..r.height {
                let src = (row * r.width) as usize;
                let dst = ((p.y + row) * width + p.x) as usize;
                bitmap[dst..dst + r.width as usize]
                    .copy_from_slice(&r.pixels[src..src + r.width as usize]);
            }
            let (x0, y0) = (p.x as f32, p.y as f32);
            let (x1, y1) = ((p.x + r.width) as f32, (p.y + r.height) as f32);
            lookup.insert(
                r.code_point,
                Glyph {
                    code_point: r.code_point,
                    uv0: [x0 / w, y1 / h],
                    uv1: [x1 / w, y0 / h],
                    advance: r.advance,
                    offset: r.offset,
                    size: [r.width as f32 / nominal, r.height as f32 / nominal],
                },
            );
        }

        let table = dedup(rain.iter().copied())
            .into_iter()
            .map(|c| lookup.get(&c).copied().ok_or(GlyphError::MissingGlyph(c)))
            .collect::<Result<Vec<_>, _>>()?;

        let texture = gpu.create_texture(filter);
        gpu.tex_upload_r8(texture, width, height, &bitmap);
        log::info!(
            "glyph atlas {}x{}: {} glyphs, {} in the rain table",
            width,
            height,
            lookup.len(),
            table.len()
        );

        Ok(Self {
            texture: Some(texture),
            table,
            lookup,
            atlas_size: (width, height),
        })
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn atlas_size(&self) -> (u32, u32) {
        self.atlas_size
    }

    /// Deletes the atlas texture. Must run before the context goes away.
    pub fn release(&mut self, gpu: &mut Gpu) {
        if let Some(t) = self.texture.take() {
            gpu.delete_texture(t);
        }
    }
}

impl GlyphProvider for GlyphAtlas {
    fn find_glyph(&self, code_point: char) -> Result<&Glyph, GlyphError> {
        self.lookup
            .get(&code_point)
            .ok_or(GlyphError::MissingGlyph(code_point))
    }

    fn glyphs(&self) -> &[Glyph] {
        &self.table
    }

    fn swap_glyphs<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) {
        if self.table.len() < 2 {
            return;
        }
        let dist = Uniform::new(0, self.table.len()).expect("valid range");
        for _ in 0..count {
            let a = dist.sample(rng);
            let b = dist.sample(rng);
            self.table.swap(a, b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn atlas(gpu: &mut Gpu) -> GlyphAtlas {
        let rain: Vec<char> = ('0'..='9').collect();
        GlyphAtlas::builtin(gpu, 16.0, &rain, &['A', '\u{30A2}']).unwrap()
    }

    #[test]
    fn builtin_loads_rain_and_known_extras() {
        let mut gpu = Gpu::new(1, 1);
        let a = atlas(&mut gpu);
        assert_eq!(a.glyphs().len(), 10);
        assert!(a.find_glyph('A').is_ok());
        assert!(matches!(
            a.find_glyph('\u{30A2}'),
            Err(GlyphError::MissingGlyph('\u{30A2}'))
        ));
        assert_eq!(gpu.live_textures(), 1);
    }

    #[test]
    fn missing_rain_glyph_is_an_error() {
        let mut gpu = Gpu::new(1, 1);
        let r = GlyphAtlas::builtin(&mut gpu, 16.0, &['\u{30A2}'], &[]);
        assert!(matches!(r, Err(GlyphError::MissingGlyph(_))));
        assert_eq!(gpu.live_textures(), 0);
    }

    #[test]
    fn uv_rect_matches_packed_bitmap() {
        let mut gpu = Gpu::new(1, 1);
        let a = atlas(&mut gpu);
        let (w, h) = a.atlas_size();
        let g = a.find_glyph('1').unwrap();
        let px_w = (g.uv1[0] - g.uv0[0]) * w as f32;
        let px_h = (g.uv0[1] - g.uv1[1]) * h as f32;
        assert!((px_w - 10.0).abs() < 1e-3);
        assert!((px_h - 14.0).abs() < 1e-3);
        assert!((g.size[1] - 14.0 / 16.0).abs() < 1e-6);
    }

    #[test]
    fn swap_keeps_the_glyph_set() {
        let mut gpu = Gpu::new(1, 1);
        let mut a = atlas(&mut gpu);
        let before: Vec<char> = a.glyphs().iter().map(|g| g.code_point).collect();
        let mut rng = StdRng::seed_from_u64(7);
        a.swap_glyphs(50, &mut rng);
        let mut after: Vec<char> = a.glyphs().iter().map(|g| g.code_point).collect();
        assert_ne!(before, after);
        after.sort();
        assert_eq!(before, after);
        assert_eq!(a.find_glyph('3').unwrap().code_point, '3');
    }

    fn raster(code_point: char, width: u32, height: u32) -> Raster {
        Raster {
            code_point,
            width,
            height,
            pixels: vec![0; (width * height) as usize],
            advance: 1.0,
            offset: [0.0, 0.0],
        }
    }

    /// A TrueType file from `GLYPHFALL_TEST_FONT` or the usual DejaVu install.
    fn system_font() -> Option<Vec<u8>> {
        let env = std::env::var("GLYPHFALL_TEST_FONT").ok();
        let candidates = env.iter().map(String::as_str).chain([
            "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
        ]);
        for path in candidates {
            if let Ok(bytes) = std::fs::read(path) {
                return Some(bytes);
            }
        }
        eprintln!("no TrueType font found, set GLYPHFALL_TEST_FONT");
        None
    }

    #[test]
    fn garbage_font_bytes_fail_to_load() {
        let mut gpu = Gpu::new(1, 1);
        let r = GlyphAtlas::from_font(&mut gpu, b"definitely not a font", 16.0, &['A'], &[]);
        assert!(matches!(r, Err(GlyphError::FontLoad(_))));
        assert_eq!(gpu.live_textures(), 0);
    }

    #[test]
    fn pack_rejects_glyph_wider_than_atlas() {
        let r = pack(vec![raster('A', 4, 4), raster('W', 10, 4)], 8);
        assert!(matches!(r, Err(GlyphError::AtlasFull { code_point: 'W' })));
    }

    #[test]
    fn pack_rejects_shelves_past_max_height() {
        let tall = ATLAS_MAX_HEIGHT / 2;
        let r = pack(
            vec![raster('a', 8, tall), raster('b', 8, tall), raster('c', 8, tall)],
            12,
        );
        assert!(matches!(r, Err(GlyphError::AtlasFull { code_point: 'b' })));
    }

    #[test]
    fn pack_places_glyphs_on_shelves() {
        let (placed, height) = pack(vec![raster('a', 4, 3), raster('b', 4, 5)], 10).unwrap();
        assert_eq!((placed[0].x, placed[0].y), (PADDING, PADDING));
        assert_eq!((placed[1].x, placed[1].y), (PADDING, PADDING + 3 + PADDING));
        assert_eq!(height, PADDING + 3 + PADDING + 5 + PADDING);
    }

    #[test]
    fn truetype_rain_glyph_missing_from_font_is_an_error() {
        let Some(font) = system_font() else {
            return;
        };
        let mut gpu = Gpu::new(1, 1);
        let r = GlyphAtlas::from_font(&mut gpu, &font, 24.0, &['A', '\u{FFFF0}'], &[]);
        assert!(matches!(r, Err(GlyphError::MissingGlyph('\u{FFFF0}'))));
        assert_eq!(gpu.live_textures(), 0);
    }

    #[test]
    fn truetype_optional_glyph_missing_from_font_is_skipped() {
        let Some(font) = system_font() else {
            return;
        };
        let mut gpu = Gpu::new(1, 1);
        let a = GlyphAtlas::from_font(&mut gpu, &font, 24.0, &['A', 'B', '0'], &['\u{FFFF0}'])
            .unwrap();
        assert_eq!(a.glyphs().len(), 3);
        assert!(a.find_glyph('\u{FFFF0}').is_err());
        let g = a.find_glyph('A').unwrap();
        assert!(g.size[0] > 0.0 && g.size[1] > 0.0);
        assert!(g.uv1[0] > g.uv0[0]);
        assert_eq!(gpu.live_textures(), 1);
    }

    #[test]
    fn release_frees_the_texture() {
        let mut gpu = Gpu::new(1, 1);
        let mut a = atlas(&mut gpu);
        a.release(&mut gpu);
        a.release(&mut gpu);
        assert_eq!(gpu.live_textures(), 0);
        assert!(a.texture().is_none());
    }
}
