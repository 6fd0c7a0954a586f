// Copyright (c) 2026 rezky_nightky

use crate::bloom::Bloom;
use crate::cell::Vertex;
use crate::filter::BlurFilter;
use crate::gfx::{
    BlendFactor, Cap, CapScope, Filter, FramebufferId, Gpu, ProgramError, ProgramId,
    ProgramLoader, TextureId, TextureFormat,
};
use crate::layer::{DepthLayer, LayerGrids};
use crate::shaders;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositeSettings {
    /// Integer divisor for the background targets.
    pub blur_scale: u32,
    /// Blur iterations for the farthest layer; nearer layers scale down.
    pub blur_iterations: u32,
    pub bloom_enabled: bool,
    pub bloom_threshold: f32,
    pub bloom_knee: f32,
    pub bloom_intensity: f32,
    pub exposure: f32,
}

impl Default for CompositeSettings {
    fn default() -> Self {
        Self {
            blur_scale: 2,
            blur_iterations: 2,
            bloom_enabled: true,
            bloom_threshold: 0.8,
            bloom_knee: 0.4,
            bloom_intensity: 1.0,
            exposure: 1.0,
        }
    }
}

impl CompositeSettings {
    pub fn blur_strength(layer: &DepthLayer) -> f32 {
        (1.0 - layer.depth).clamp(0.0, 1.0)
    }

    pub fn blur_iterations_for(&self, layer: &DepthLayer) -> u32 {
        ((self.blur_iterations as f32) * Self::blur_strength(layer)).ceil() as u32
    }
}

/// What one frame draws: the rain grids, an optional overlay drawn with the
/// foreground layer, and the view extent the vertices are expressed in.
pub struct Scene<'a> {
    pub layers: &'a [DepthLayer],
    pub grids: &'a LayerGrids,
    pub overlay: &'a [Vertex],
    pub view: (f32, f32),
    pub atlas: Option<TextureId>,
}

struct Programs {
    glyph: ProgramId,
    copy: ProgramId,
    tonemap: ProgramId,
}

/// Render targets and passes that turn layer grids into the final image.
pub struct Compositor {
    pub settings: CompositeSettings,
    framebuffer: Option<FramebufferId>,
    programs: Option<Programs>,
    background: [Option<TextureId>; 2],
    final_target: Option<TextureId>,
    size: (u32, u32),
    background_size: (u32, u32),
}

impl Compositor {
    pub fn new(gpu: &mut Gpu, settings: CompositeSettings) -> Result<Self, ProgramError> {
        let glyph = gpu.load_program(shaders::GLYPH_VS, shaders::GLYPH_FS, &[])?;
        let copy = match gpu.load_program(shaders::FULLSCREEN_VS, shaders::COPY_FS, &[]) {
            Ok(p) => p,
            Err(e) => {
                gpu.delete_program(glyph);
                return Err(e);
            }
        };
        let tonemap = match gpu.load_program(shaders::FULLSCREEN_VS, shaders::TONEMAP_FS, &[]) {
            Ok(p) => p,
            Err(e) => {
                gpu.delete_program(glyph);
                gpu.delete_program(copy);
                return Err(e);
            }
        };
        gpu.blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        Ok(Self {
            settings,
            framebuffer: Some(gpu.create_framebuffer()),
            programs: Some(Programs {
                glyph,
                copy,
                tonemap,
            }),
            background: [
                Some(gpu.create_texture(Filter::Linear)),
                Some(gpu.create_texture(Filter::Linear)),
            ],
            final_target: Some(gpu.create_texture(Filter::Linear)),
            size: (0, 0),
            background_size: (0, 0),
        })
    }

    pub fn background_size(&self) -> (u32, u32) {
        self.background_size
    }

    #[cfg(test)]
    pub fn final_texture(&self) -> Option<TextureId> {
        self.final_target
    }

    #[cfg(test)]
    pub fn background_textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.background.iter().flatten().copied()
    }

    /// Reallocates every target. Background targets run at `size /
    /// blur_scale`, never smaller than 1x1.
    pub fn resize(&mut self, gpu: &mut Gpu, width: u32, height: u32) {
        let scale = self.settings.blur_scale.max(1);
        self.size = (width, height);
        self.background_size = ((width / scale).max(1), (height / scale).max(1));
        let (bw, bh) = self.background_size;
        for t in self.background.iter().flatten() {
            gpu.tex_image(*t, bw, bh, TextureFormat::Rgba16F);
        }
        if let Some(t) = self.final_target {
            gpu.tex_image(t, width, height, TextureFormat::Rgba16F);
        }
    }

    fn copy_into(&self, gpu: &mut Gpu, src: TextureId) {
        let Some(p) = &self.programs else {
            return;
        };
        let mut g = CapScope::new(gpu, &[Cap::Blend]);
        g.disable(Cap::Blend);
        g.use_program(Some(p.copy));
        g.uniform_i32("uTexture", 0);
        g.active_texture(0);
        g.bind_texture(Some(src));
        g.draw_fullscreen_quad();
    }

    fn draw_glyphs(&self, gpu: &mut Gpu, scene: &Scene<'_>, vertices: &[Vertex]) {
        let Some(p) = &self.programs else {
            return;
        };
        if vertices.is_empty() {
            return;
        }
        let mut g = CapScope::new(gpu, &[Cap::Blend]);
        g.enable(Cap::Blend);
        g.use_program(Some(p.glyph));
        g.uniform_f32("uScreenWidth", scene.view.0);
        g.uniform_f32("uScreenHeight", scene.view.1);
        g.uniform_i32("uFont", 0);
        g.active_texture(0);
        g.bind_texture(scene.atlas);
        g.draw_triangles(vertices);
    }

    /// Runs every pass for one frame and leaves the tone-mapped image in the
    /// default framebuffer.
    pub fn render(&self, gpu: &mut Gpu, blur: &BlurFilter, bloom: &Bloom, scene: &Scene<'_>) {
        let (Some(fb), Some(final_target), [Some(bg0), Some(bg1)]) =
            (self.framebuffer, self.final_target, self.background)
        else {
            return;
        };
        let (w, h) = self.size;
        let (bw, bh) = self.background_size;
        let (mut src, mut dst) = (bg0, bg1);

        gpu.bind_framebuffer(Some(fb));
        gpu.framebuffer_texture(src);
        gpu.viewport(0, 0, bw, bh);
        gpu.clear_color(0.0, 0.0, 0.0, 1.0);
        gpu.clear();

        let n = scene.layers.len();
        for (i, layer) in scene.layers.iter().enumerate().take(n.saturating_sub(1)) {
            gpu.bind_framebuffer(Some(fb));
            gpu.framebuffer_texture(dst);
            gpu.viewport(0, 0, bw, bh);
            self.copy_into(gpu, src);
            self.draw_glyphs(gpu, scene, scene.grids.vertices(i));

            let iterations = self.settings.blur_iterations_for(layer);
            if iterations > 0 {
                blur.apply(gpu, dst, CompositeSettings::blur_strength(layer), iterations);
            }
            std::mem::swap(&mut src, &mut dst);
        }

        gpu.bind_framebuffer(Some(fb));
        gpu.framebuffer_texture(final_target);
        gpu.viewport(0, 0, w, h);
        self.copy_into(gpu, src);
        if n > 0 {
            self.draw_glyphs(gpu, scene, scene.grids.vertices(n - 1));
        }
        self.draw_glyphs(gpu, scene, scene.overlay);

        let bloom_tex = if self.settings.bloom_enabled {
            Some(bloom.compute(
                gpu,
                final_target,
                self.settings.bloom_threshold,
                self.settings.bloom_knee,
            ))
        } else {
            None
        };

        let Some(p) = &self.programs else {
            return;
        };
        let mut g = CapScope::new(gpu, &[Cap::Blend, Cap::FramebufferSrgb]);
        g.disable(Cap::Blend);
        g.enable(Cap::FramebufferSrgb);
        g.bind_framebuffer(None);
        g.viewport(0, 0, w, h);
        g.use_program(Some(p.tonemap));
        g.uniform_i32("uBase", 0);
        g.uniform_i32("uBloom", 1);
        g.uniform_f32("uExposure", self.settings.exposure);
        g.uniform_f32("uBloomIntensity", self.settings.bloom_intensity);
        g.active_texture(0);
        g.bind_texture(Some(final_target));
        g.active_texture(1);
        g.bind_texture(bloom_tex);
        g.draw_fullscreen_quad();
        g.bind_texture(None);
        g.active_texture(0);
        g.bind_texture(None);
    }

    pub fn release(&mut self, gpu: &mut Gpu) {
        if let Some(fb) = self.framebuffer.take() {
            gpu.delete_framebuffer(fb);
        }
        for t in self
            .background
            .iter_mut()
            .map(Option::take)
            .chain([self.final_target.take()])
            .flatten()
        {
            gpu.delete_texture(t);
        }
        if let Some(p) = self.programs.take() {
            for id in [p.glyph, p.copy, p.tonemap] {
                gpu.delete_program(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::DEFAULT_LAYERS;

    #[test]
    fn background_runs_at_blur_scale() {
        let mut gpu = Gpu::new(10, 10);
        let mut c = Compositor::new(&mut gpu, CompositeSettings::default()).unwrap();
        c.resize(&mut gpu, 101, 50);
        assert_eq!(c.background_size(), (50, 25));
        for t in c.background_textures() {
            assert_eq!(gpu.texture_size(t), (50, 25));
        }
        assert_eq!(gpu.texture_size(c.final_texture().unwrap()), (101, 50));
    }

    #[test]
    fn farther_layers_blur_harder() {
        let s = CompositeSettings::default();
        let far = CompositeSettings::blur_strength(&DEFAULT_LAYERS[0]);
        let near = CompositeSettings::blur_strength(&DEFAULT_LAYERS[4]);
        assert!(far > near);
        assert_eq!(near, 0.0);
        assert_eq!(s.blur_iterations_for(&DEFAULT_LAYERS[4]), 0);
        assert!(s.blur_iterations_for(&DEFAULT_LAYERS[0]) >= 1);
    }

    #[test]
    fn empty_scene_tone_maps_to_black_and_restores_caps() {
        let mut gpu = Gpu::new(8, 4);
        let mut c = Compositor::new(&mut gpu, CompositeSettings::default()).unwrap();
        let mut blur = BlurFilter::new(&mut gpu).unwrap();
        let mut bloom = Bloom::new(&mut gpu).unwrap();
        c.resize(&mut gpu, 8, 4);
        blur.resize(&mut gpu, 4, 2);
        bloom.resize(&mut gpu, 8, 4);

        let grids = LayerGrids::new(DEFAULT_LAYERS.len());
        let scene = Scene {
            layers: &DEFAULT_LAYERS,
            grids: &grids,
            overlay: &[],
            view: (8.0, 4.0),
            atlas: None,
        };
        c.render(&mut gpu, &blur, &bloom, &scene);
        assert!(gpu.screen().texels().iter().all(|p| p[..3] == [0.0, 0.0, 0.0]));
        assert!(!gpu.is_enabled(Cap::Blend));
        assert!(!gpu.is_enabled(Cap::FramebufferSrgb));
    }
}
