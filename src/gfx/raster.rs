// Copyright (c) 2026 rezky_nightky

use crate::cell::Vertex;

use super::texture::{Texture, TextureFormat};
use super::{BlendFactor, Viewport};

#[derive(Clone, Copy, Debug)]
pub(super) struct RasterState {
    pub viewport: Viewport,
    pub blend: Option<(BlendFactor, BlendFactor)>,
    pub srgb: bool,
}

/// A linked program with its samplers resolved to textures.
pub(super) enum Stage<'a> {
    Glyph {
        font: &'a Texture,
        screen: [f32; 2],
    },
    Copy {
        src: &'a Texture,
    },
    Blur {
        src: &'a Texture,
        strength: f32,
        horizontal: bool,
    },
    Prefilter {
        src: &'a Texture,
        threshold: f32,
        knee: f32,
    },
    Downsample {
        src: &'a Texture,
    },
    Upsample {
        previous: &'a Texture,
        downsample: &'a Texture,
    },
    ToneMap {
        base: &'a Texture,
        bloom: &'a Texture,
        exposure: f32,
        bloom_intensity: f32,
    },
}

fn texel_step(t: &Texture) -> [f32; 2] {
    [
        1.0 / t.width().max(1) as f32,
        1.0 / t.height().max(1) as f32,
    ]
}

fn rgb(c: [f32; 4]) -> [f32; 3] {
    [c[0], c[1], c[2]]
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x >= edge0 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

const BLUR_KERNEL: [f32; 3] = [0.25, 0.5, 0.25];

const TENT: [(f32, f32, f32); 9] = [
    (-1.0, 1.0, 1.0),
    (0.0, 1.0, 2.0),
    (1.0, 1.0, 1.0),
    (-1.0, 0.0, 2.0),
    (0.0, 0.0, 4.0),
    (1.0, 0.0, 2.0),
    (-1.0, -1.0, 1.0),
    (0.0, -1.0, 2.0),
    (1.0, -1.0, 1.0),
];

impl Stage<'_> {
    fn shade_fullscreen(&self, u: f32, v: f32) -> [f32; 4] {
        match *self {
            Stage::Glyph { .. } => [0.0; 4],
            Stage::Copy { src } => src.sample(u, v),
            Stage::Blur {
                src,
                strength,
                horizontal,
            } => {
                let step = texel_step(src);
                let mut blurred = [0.0f32; 3];
                for (i, w) in BLUR_KERNEL.iter().enumerate() {
                    let o = i as f32 - 1.0;
                    let s = if horizontal {
                        src.sample(u + o * step[0], v)
                    } else {
                        src.sample(u, v + o * step[1])
                    };
                    for c in 0..3 {
                        blurred[c] += s[c] * w;
                    }
                }
                let base = src.sample(u, v);
                [
                    mix(base[0], blurred[0], strength),
                    mix(base[1], blurred[1], strength),
                    mix(base[2], blurred[2], strength),
                    1.0,
                ]
            }
            Stage::Prefilter {
                src,
                threshold,
                knee,
            } => {
                let c = rgb(src.sample(u, v));
                let luma = 0.299 * c[0] + 0.587 * c[1] + 0.114 * c[2];
                let k = smoothstep(threshold - knee, threshold + knee, luma);
                [c[0] * k, c[1] * k, c[2] * k, 1.0]
            }
            Stage::Downsample { src } => {
                let s = texel_step(src);
                let mut acc = [0.0f32; 3];
                for (dx, dy) in [(-1.0, 1.0), (1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)] {
                    let t = src.sample(u + dx * s[0], v + dy * s[1]);
                    for c in 0..3 {
                        acc[c] += t[c];
                    }
                }
                [acc[0] / 4.0, acc[1] / 4.0, acc[2] / 4.0, 1.0]
            }
            Stage::Upsample {
                previous,
                downsample,
            } => {
                let s = texel_step(previous);
                let mut acc = [0.0f32; 3];
                for &(dx, dy, w) in &TENT {
                    let t = previous.sample(u + dx * s[0], v + dy * s[1]);
                    for c in 0..3 {
                        acc[c] += t[c] * w;
                    }
                }
                let d = downsample.sample(u, v);
                [
                    acc[0] / 16.0 + d[0],
                    acc[1] / 16.0 + d[1],
                    acc[2] / 16.0 + d[2],
                    1.0,
                ]
            }
            Stage::ToneMap {
                base,
                bloom,
                exposure,
                bloom_intensity,
            } => {
                let b = base.sample(u, v);
                let g = bloom.sample(u, v);
                let mut out = [0.0, 0.0, 0.0, 1.0];
                for c in 0..3 {
                    let hdr = b[c] + g[c] * bloom_intensity;
                    out[c] = 1.0 - (-hdr * exposure).exp();
                }
                out
            }
        }
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn factor(f: BlendFactor, src_alpha: f32) -> f32 {
    match f {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::SrcAlpha => src_alpha,
        BlendFactor::OneMinusSrcAlpha => 1.0 - src_alpha,
    }
}

fn write_fragment(state: &RasterState, target: &mut Texture, x: u32, y: u32, mut c: [f32; 4]) {
    if state.srgb && target.format() == TextureFormat::Rgba8 {
        for v in c.iter_mut().take(3) {
            *v = linear_to_srgb(v.clamp(0.0, 1.0));
        }
    }
    if let Some((src, dst)) = state.blend {
        let d = target.read(x, y);
        let sf = factor(src, c[3]);
        let df = factor(dst, c[3]);
        for i in 0..4 {
            c[i] = c[i] * sf + d[i] * df;
        }
    }
    target.write(x, y, c);
}

/// Pixel rectangle covered by the viewport, clipped to the target.
fn clip(state: &RasterState, target: &Texture) -> (u32, u32, u32, u32) {
    let vp = state.viewport;
    let x0 = vp.x.max(0) as i64;
    let y0 = vp.y.max(0) as i64;
    let x1 = (vp.x as i64 + vp.width as i64).min(target.width() as i64);
    let y1 = (vp.y as i64 + vp.height as i64).min(target.height() as i64);
    if x1 <= x0 || y1 <= y0 {
        return (0, 0, 0, 0);
    }
    (x0 as u32, y0 as u32, x1 as u32, y1 as u32)
}

pub(super) fn draw_fullscreen(stage: &Stage<'_>, state: &RasterState, target: &mut Texture) -> u64 {
    let (x0, y0, x1, y1) = clip(state, target);
    let vp = state.viewport;
    let vw = vp.width.max(1) as f32;
    let vh = vp.height.max(1) as f32;
    for py in y0..y1 {
        let v = (py as f32 - vp.y as f32 + 0.5) / vh;
        for px in x0..x1 {
            let u = (px as f32 - vp.x as f32 + 0.5) / vw;
            let c = stage.shade_fullscreen(u, v);
            write_fragment(state, target, px, py, c);
        }
    }
    (x1 - x0) as u64 * (y1 - y0) as u64
}

fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

// Top-left fill rule for counter-clockwise triangles with y pointing up.
fn owns_edge(a: [f32; 2], b: [f32; 2]) -> bool {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    dy < 0.0 || (dy == 0.0 && dx < 0.0)
}

fn covers(w: f32, owned: bool) -> bool {
    w > 0.0 || (w == 0.0 && owned)
}

pub(super) fn draw_triangles(
    stage: &Stage<'_>,
    state: &RasterState,
    target: &mut Texture,
    vertices: &[Vertex],
) -> u64 {
    let Stage::Glyph { font, screen } = *stage else {
        return 0;
    };
    if screen[0] == 0.0 || screen[1] == 0.0 {
        return 0;
    }
    let vp = state.viewport;
    let to_window = |p: [f32; 2]| -> [f32; 2] {
        let nx = (p[0] / screen[0]) * 2.0 - 1.0;
        let ny = (p[1] / screen[1]) * -2.0 + 1.0;
        [
            vp.x as f32 + (nx + 1.0) * 0.5 * vp.width as f32,
            vp.y as f32 + (ny + 1.0) * 0.5 * vp.height as f32,
        ]
    };
    let (cx0, cy0, cx1, cy1) = clip(state, target);
    let mut fragments = 0u64;

    for tri in vertices.chunks_exact(3) {
        let mut p = [
            to_window(tri[0].position),
            to_window(tri[1].position),
            to_window(tri[2].position),
        ];
        let mut uv = [tri[0].uv, tri[1].uv, tri[2].uv];
        let mut area = edge(p[0], p[1], p[2]);
        if area == 0.0 {
            continue;
        }
        if area < 0.0 {
            p.swap(1, 2);
            uv.swap(1, 2);
            area = -area;
        }
        let color = tri[2].color;

        let min_x = p.iter().map(|q| q[0]).fold(f32::INFINITY, f32::min);
        let max_x = p.iter().map(|q| q[0]).fold(f32::NEG_INFINITY, f32::max);
        let min_y = p.iter().map(|q| q[1]).fold(f32::INFINITY, f32::min);
        let max_y = p.iter().map(|q| q[1]).fold(f32::NEG_INFINITY, f32::max);

        let x0 = (min_x.floor().max(cx0 as f32)) as u32;
        let x1 = (max_x.ceil().min(cx1 as f32)).max(0.0) as u32;
        let y0 = (min_y.floor().max(cy0 as f32)) as u32;
        let y1 = (max_y.ceil().min(cy1 as f32)).max(0.0) as u32;

        let own = [
            owns_edge(p[1], p[2]),
            owns_edge(p[2], p[0]),
            owns_edge(p[0], p[1]),
        ];

        for py in y0..y1 {
            for px in x0..x1 {
                let s = [px as f32 + 0.5, py as f32 + 0.5];
                let w0 = edge(p[1], p[2], s);
                let w1 = edge(p[2], p[0], s);
                let w2 = edge(p[0], p[1], s);
                if !(covers(w0, own[0]) && covers(w1, own[1]) && covers(w2, own[2])) {
                    continue;
                }
                let (b0, b1, b2) = (w0 / area, w1 / area, w2 / area);
                let u = b0 * uv[0][0] + b1 * uv[1][0] + b2 * uv[2][0];
                let v = b0 * uv[0][1] + b1 * uv[1][1] + b2 * uv[2][1];
                let mask = font.sample(u, v)[0];
                let c = [color[0], color[1], color[2], color[3] * mask];
                write_fragment(state, target, px, py, c);
                fragments += 1;
            }
        }
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::Filter;

    fn state(w: u32, h: u32) -> RasterState {
        RasterState {
            viewport: Viewport {
                x: 0,
                y: 0,
                width: w,
                height: h,
            },
            blend: None,
            srgb: false,
        }
    }

    fn solid_font() -> Texture {
        let mut t = Texture::new(Filter::Nearest);
        t.upload_r8(1, 1, &[255]);
        t
    }

    fn quad(x: f32, y: f32, w: f32, h: f32) -> Vec<Vertex> {
        let v = |px: f32, py: f32| Vertex {
            position: [px, py],
            uv: [0.5, 0.5],
            color: [1.0, 1.0, 1.0, 1.0],
        };
        vec![
            v(x, y),
            v(x, y + h),
            v(x + w, y),
            v(x, y + h),
            v(x + w, y + h),
            v(x + w, y),
        ]
    }

    #[test]
    fn adjacent_quads_cover_each_pixel_once() {
        let font = solid_font();
        let stage = Stage::Glyph {
            font: &font,
            screen: [4.0, 4.0],
        };
        let mut target = Texture::new(Filter::Nearest);
        target.allocate(4, 4, TextureFormat::Rgba16F);
        let mut st = state(4, 4);
        st.blend = Some((BlendFactor::One, BlendFactor::One));

        let mut verts = quad(0.0, 0.0, 2.0, 4.0);
        verts.extend(quad(2.0, 0.0, 2.0, 4.0));
        let n = draw_triangles(&stage, &st, &mut target, &verts);

        assert_eq!(n, 16);
        assert!(target.texels().iter().all(|c| c[0] == 1.0));
    }

    #[test]
    fn view_top_maps_to_last_row() {
        let font = solid_font();
        let stage = Stage::Glyph {
            font: &font,
            screen: [4.0, 4.0],
        };
        let mut target = Texture::new(Filter::Nearest);
        target.allocate(4, 4, TextureFormat::Rgba16F);
        draw_triangles(&stage, &state(4, 4), &mut target, &quad(0.0, 0.0, 4.0, 1.0));
        assert_eq!(target.read(0, 3)[0], 1.0);
        assert_eq!(target.read(0, 0)[0], 0.0);
    }

    #[test]
    fn knee_zero_prefilter_is_a_step() {
        assert_eq!(smoothstep(0.5, 0.5, 0.49), 0.0);
        assert_eq!(smoothstep(0.5, 0.5, 0.5), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn alpha_blend_mixes_with_destination() {
        let mut target = Texture::new(Filter::Nearest);
        target.allocate(1, 1, TextureFormat::Rgba16F);
        target.fill([1.0, 0.0, 0.0, 1.0]);
        let mut st = state(1, 1);
        st.blend = Some((BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha));
        write_fragment(&st, &mut target, 0, 0, [0.0, 1.0, 0.0, 0.25]);
        let c = target.read(0, 0);
        assert!((c[0] - 0.75).abs() < 1e-6);
        assert!((c[1] - 0.25).abs() < 1e-6);
    }
}
