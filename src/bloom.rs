// Copyright (c) 2026 rezky_nightky

use crate::gfx::{
    Cap, CapScope, Filter, FramebufferId, Gpu, ProgramError, ProgramId, ProgramLoader, TextureId,
    TextureFormat,
};
use crate::shaders;

/// Mip sizes from `(width, height)` down, halving until a side hits zero.
pub fn mip_sizes(width: u32, height: u32) -> Vec<(u32, u32)> {
    let mut out = Vec::new();
    let (mut w, mut h) = (width, height);
    while w >= 1 && h >= 1 {
        out.push((w, h));
        w /= 2;
        h /= 2;
    }
    out
}

struct Programs {
    prefilter: ProgramId,
    downsample: ProgramId,
    upsample: ProgramId,
    copy: ProgramId,
}

/// Soft-threshold bloom over a downsample chain and a matching upsample
/// chain. Level 0 of the upsample chain is the result.
pub struct Bloom {
    framebuffer: Option<FramebufferId>,
    programs: Option<Programs>,
    down: Vec<TextureId>,
    up: Vec<TextureId>,
    sizes: Vec<(u32, u32)>,
}

impl Bloom {
    pub fn new(gpu: &mut Gpu) -> Result<Self, ProgramError> {
        let mut loaded: Vec<ProgramId> = Vec::new();
        for fs in [
            shaders::BLOOM_PREFILTER_FS,
            shaders::BLOOM_DOWNSAMPLE_FS,
            shaders::BLOOM_UPSAMPLE_FS,
            shaders::COPY_FS,
        ] {
            match gpu.load_program(shaders::FULLSCREEN_VS, fs, &[]) {
                Ok(p) => loaded.push(p),
                Err(e) => {
                    for p in loaded {
                        gpu.delete_program(p);
                    }
                    return Err(e);
                }
            }
        }
        let programs = Programs {
            prefilter: loaded[0],
            downsample: loaded[1],
            upsample: loaded[2],
            copy: loaded[3],
        };
        Ok(Self {
            framebuffer: Some(gpu.create_framebuffer()),
            programs: Some(programs),
            down: Vec::new(),
            up: Vec::new(),
            sizes: Vec::new(),
        })
    }

    pub fn chain_len(&self) -> usize {
        self.sizes.len()
    }

    #[cfg(test)]
    pub fn level(&self, i: usize) -> Option<(TextureId, TextureId)> {
        Some((*self.down.get(i)?, *self.up.get(i)?))
    }

    fn delete_chains(&mut self, gpu: &mut Gpu) {
        for t in self.down.drain(..).chain(self.up.drain(..)) {
            gpu.delete_texture(t);
        }
    }

    /// Rebuilds both chains for a `width` x `height` source.
    pub fn resize(&mut self, gpu: &mut Gpu, width: u32, height: u32) {
        self.delete_chains(gpu);
        self.sizes = mip_sizes(width, height);
        for &(w, h) in &self.sizes {
            let d = gpu.create_texture(Filter::Linear);
            gpu.tex_image(d, w, h, TextureFormat::Rgb16F);
            self.down.push(d);
            let u = gpu.create_texture(Filter::Linear);
            gpu.tex_image(u, w, h, TextureFormat::Rgb16F);
            self.up.push(u);
        }
        log::debug!("bloom chain: {} levels from {}x{}", self.sizes.len(), width, height);
    }

    /// Returns the texture holding the bloom term for `source`.
    ///
    /// Panics when called before [`Bloom::resize`].
    pub fn compute(&self, gpu: &mut Gpu, source: TextureId, threshold: f32, knee: f32) -> TextureId {
        assert!(
            !self.sizes.is_empty(),
            "bloom compute called before resize"
        );
        let (Some(fb), Some(p)) = (self.framebuffer, self.programs.as_ref()) else {
            panic!("bloom compute called after release");
        };
        let n = self.sizes.len();

        let mut g = CapScope::new(gpu, &[Cap::Blend]);
        g.disable(Cap::Blend);
        g.bind_framebuffer(Some(fb));

        let target = |g: &mut Gpu, i: usize, tex: TextureId| {
            let (w, h) = self.sizes[i];
            g.viewport(0, 0, w, h);
            g.framebuffer_texture(tex);
        };

        target(&mut *g, 0, self.down[0]);
        g.use_program(Some(p.prefilter));
        g.uniform_i32("uSource", 0);
        g.uniform_f32("uThreshold", threshold);
        g.uniform_f32("uKnee", knee);
        g.active_texture(0);
        g.bind_texture(Some(source));
        g.draw_fullscreen_quad();

        g.use_program(Some(p.downsample));
        g.uniform_i32("uSource", 0);
        for i in 1..n {
            target(&mut *g, i, self.down[i]);
            g.bind_texture(Some(self.down[i - 1]));
            g.draw_fullscreen_quad();
        }

        target(&mut *g, n - 1, self.up[n - 1]);
        g.use_program(Some(p.copy));
        g.uniform_i32("uTexture", 0);
        g.bind_texture(Some(self.down[n - 1]));
        g.draw_fullscreen_quad();

        g.use_program(Some(p.upsample));
        g.uniform_i32("uPrevious", 0);
        g.uniform_i32("uDownsample", 1);
        for i in (0..n - 1).rev() {
            target(&mut *g, i, self.up[i]);
            g.active_texture(0);
            g.bind_texture(Some(self.up[i + 1]));
            g.active_texture(1);
            g.bind_texture(Some(self.down[i]));
            g.draw_fullscreen_quad();
        }

        g.active_texture(1);
        g.bind_texture(None);
        g.active_texture(0);
        g.bind_texture(None);

        self.up[0]
    }

    pub fn release(&mut self, gpu: &mut Gpu) {
        self.delete_chains(gpu);
        self.sizes.clear();
        if let Some(fb) = self.framebuffer.take() {
            gpu.delete_framebuffer(fb);
        }
        if let Some(p) = self.programs.take() {
            for id in [p.prefilter, p.downsample, p.upsample, p.copy] {
                gpu.delete_program(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_length_is_log2_of_min_side_plus_one() {
        assert_eq!(mip_sizes(1, 1).len(), 1);
        assert_eq!(mip_sizes(3, 5), vec![(3, 5), (1, 2)]);
        assert_eq!(mip_sizes(1280, 768).len(), 10);
        assert!(mip_sizes(0, 9).is_empty());
        for (w, h) in [(2u32, 2u32), (17, 4), (640, 480), (1, 999)] {
            let expect = (w.min(h) as f32).log2().floor() as usize + 1;
            assert_eq!(mip_sizes(w, h).len(), expect, "{w}x{h}");
        }
    }

    #[test]
    #[should_panic(expected = "before resize")]
    fn compute_before_resize_panics() {
        let mut gpu = Gpu::new(1, 1);
        let bloom = Bloom::new(&mut gpu).unwrap();
        let src = gpu.create_texture(Filter::Linear);
        bloom.compute(&mut gpu, src, 1.0, 0.5);
    }

    #[test]
    fn dark_source_produces_no_bloom() {
        let mut gpu = Gpu::new(1, 1);
        let mut bloom = Bloom::new(&mut gpu).unwrap();
        bloom.resize(&mut gpu, 8, 4);
        let src = gpu.create_texture(Filter::Linear);
        gpu.tex_image(src, 8, 4, TextureFormat::Rgba16F);
        gpu.texture_mut(src).fill([0.2, 0.2, 0.2, 1.0]);
        let out = bloom.compute(&mut gpu, src, 1.0, 0.1);
        assert!(gpu.texture(out).texels().iter().all(|c| c[0] == 0.0));
    }

    #[test]
    fn bright_source_accumulates_across_levels() {
        let mut gpu = Gpu::new(1, 1);
        let mut bloom = Bloom::new(&mut gpu).unwrap();
        bloom.resize(&mut gpu, 1, 1);
        let src = gpu.create_texture(Filter::Linear);
        gpu.tex_image(src, 1, 1, TextureFormat::Rgba16F);
        gpu.texture_mut(src).fill([4.0, 4.0, 4.0, 1.0]);
        let out = bloom.compute(&mut gpu, src, 1.0, 0.5);
        assert_eq!(out, bloom.level(0).unwrap().1);
        assert!((gpu.texture(out).read(0, 0)[0] - 4.0).abs() < 1e-5);

        bloom.resize(&mut gpu, 4, 4);
        let src2 = gpu.create_texture(Filter::Linear);
        gpu.tex_image(src2, 4, 4, TextureFormat::Rgba16F);
        gpu.texture_mut(src2).fill([4.0, 4.0, 4.0, 1.0]);
        let out = bloom.compute(&mut gpu, src2, 1.0, 0.5);
        // Three levels of a flat field: 4 + 4 + 4.
        assert!((gpu.texture(out).read(2, 1)[0] - 12.0).abs() < 1e-4);
    }

    #[test]
    fn resize_reallocates_chains() {
        let mut gpu = Gpu::new(1, 1);
        let mut bloom = Bloom::new(&mut gpu).unwrap();
        bloom.resize(&mut gpu, 800, 600);
        bloom.resize(&mut gpu, 1280, 768);
        assert_eq!(bloom.chain_len(), 10);
        let (d, u) = bloom.level(0).unwrap();
        assert_eq!(gpu.texture_size(d), (1280, 768));
        assert_eq!(gpu.texture_size(u), (1280, 768));
        assert_eq!(gpu.live_textures(), 20);
        bloom.release(&mut gpu);
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_programs(), 0);
    }
}
