// Copyright (c) 2026 rezky_nightky

use crate::gfx::{
    Cap, CapScope, Filter, FramebufferId, Gpu, ProgramError, ProgramId, ProgramLoader, TextureId,
    TextureFormat,
};
use crate::shaders;

/// Separable 3-tap blur. Each iteration runs a horizontal pass into the
/// ping-pong texture and a vertical pass back into the target.
pub struct BlurFilter {
    framebuffer: Option<FramebufferId>,
    pingpong: Option<TextureId>,
    horizontal: Option<ProgramId>,
    vertical: Option<ProgramId>,
    size: (u32, u32),
}

impl BlurFilter {
    pub fn new(gpu: &mut Gpu) -> Result<Self, ProgramError> {
        let horizontal =
            gpu.load_program(shaders::FULLSCREEN_VS, shaders::BLUR_FS, &["HORIZONTAL"])?;
        let vertical =
            match gpu.load_program(shaders::FULLSCREEN_VS, shaders::BLUR_FS, &["VERTICAL"]) {
                Ok(p) => p,
                Err(e) => {
                    gpu.delete_program(horizontal);
                    return Err(e);
                }
            };
        Ok(Self {
            framebuffer: Some(gpu.create_framebuffer()),
            pingpong: Some(gpu.create_texture(Filter::Linear)),
            horizontal: Some(horizontal),
            vertical: Some(vertical),
            size: (0, 0),
        })
    }

    #[cfg(test)]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    #[cfg(test)]
    pub fn pingpong(&self) -> Option<TextureId> {
        self.pingpong
    }

    /// Reallocates the ping-pong texture at the resolution of the targets
    /// that will be blurred.
    pub fn resize(&mut self, gpu: &mut Gpu, width: u32, height: u32) {
        if let Some(t) = self.pingpong {
            gpu.tex_image(t, width, height, TextureFormat::Rgba16F);
        }
        self.size = (width, height);
    }

    /// Blurs `target` in place. `strength` mixes the blurred result with the
    /// unfiltered input: 0 leaves it untouched, 1 is the full convolution.
    pub fn apply(&self, gpu: &mut Gpu, target: TextureId, strength: f32, iterations: u32) {
        let (Some(fb), Some(pingpong), Some(h), Some(v)) =
            (self.framebuffer, self.pingpong, self.horizontal, self.vertical)
        else {
            return;
        };
        debug_assert_eq!(gpu.texture_size(target), self.size, "blur target size");

        let mut g = CapScope::new(gpu, &[Cap::Blend]);
        g.disable(Cap::Blend);
        g.bind_framebuffer(Some(fb));
        g.viewport(0, 0, self.size.0, self.size.1);
        g.active_texture(0);

        for _ in 0..iterations {
            g.framebuffer_texture(pingpong);
            g.use_program(Some(h));
            g.uniform_i32("uTexture", 0);
            g.uniform_f32("uStrength", strength);
            g.bind_texture(Some(target));
            g.draw_fullscreen_quad();

            g.framebuffer_texture(target);
            g.use_program(Some(v));
            g.uniform_i32("uTexture", 0);
            g.uniform_f32("uStrength", strength);
            g.bind_texture(Some(pingpong));
            g.draw_fullscreen_quad();
        }

        g.bind_texture(None);
    }

    pub fn release(&mut self, gpu: &mut Gpu) {
        if let Some(fb) = self.framebuffer.take() {
            gpu.delete_framebuffer(fb);
        }
        if let Some(t) = self.pingpong.take() {
            gpu.delete_texture(t);
        }
        for p in [self.horizontal.take(), self.vertical.take()].into_iter().flatten() {
            gpu.delete_program(p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(gpu: &mut Gpu) -> TextureId {
        let t = gpu.create_texture(Filter::Linear);
        gpu.tex_image(t, 3, 3, TextureFormat::Rgba16F);
        gpu.texture_mut(t).write(1, 1, [1.0, 2.0, 0.0, 1.0]);
        t
    }

    #[test]
    fn zero_strength_is_identity() {
        let mut gpu = Gpu::new(1, 1);
        let mut blur = BlurFilter::new(&mut gpu).unwrap();
        blur.resize(&mut gpu, 3, 3);
        let t = target(&mut gpu);
        let before: Vec<[f32; 4]> = gpu.texture(t).texels().to_vec();
        blur.apply(&mut gpu, t, 0.0, 3);
        for (a, b) in before.iter().zip(gpu.texture(t).texels()) {
            assert_eq!(a[..3], b[..3]);
        }
    }

    #[test]
    fn full_strength_matches_separable_kernel() {
        let mut gpu = Gpu::new(1, 1);
        let mut blur = BlurFilter::new(&mut gpu).unwrap();
        blur.resize(&mut gpu, 3, 3);
        let t = target(&mut gpu);
        blur.apply(&mut gpu, t, 1.0, 1);
        let tex = gpu.texture(t);
        let close = |x: u32, y: u32, want: f32| {
            let got = tex.read(x, y)[0];
            assert!((got - want).abs() < 1e-5, "({x},{y}) {got} != {want}");
        };
        close(1, 1, 0.25);
        close(0, 1, 0.125);
        close(1, 2, 0.125);
        close(0, 0, 0.0625);
        assert!((tex.read(1, 1)[1] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn apply_restores_blend_state() {
        let mut gpu = Gpu::new(1, 1);
        let mut blur = BlurFilter::new(&mut gpu).unwrap();
        blur.resize(&mut gpu, 3, 3);
        let t = target(&mut gpu);
        gpu.enable(Cap::Blend);
        blur.apply(&mut gpu, t, 1.0, 2);
        assert!(gpu.is_enabled(Cap::Blend));
    }

    #[test]
    fn release_is_complete() {
        let mut gpu = Gpu::new(1, 1);
        let mut blur = BlurFilter::new(&mut gpu).unwrap();
        blur.release(&mut gpu);
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_programs(), 0);
        assert_eq!(gpu.live_framebuffers(), 0);
    }
}
