// Copyright (c) 2026 rezky_nightky

use anyhow::Context;

use crate::bloom::Bloom;
use crate::cloud::Cloud;
use crate::compositor::{CompositeSettings, Compositor, Scene};
use crate::filter::BlurFilter;
use crate::gfx::{DrawStats, Gpu, Texture};
use crate::glyph::GlyphAtlas;
use crate::intro::Intro;
use crate::runtime::{ColorScheme, DepthBias};

const CURSOR_GLYPHS: [char; 2] = ['\u{2588}', '_'];

#[derive(Clone, Debug)]
pub struct IntroOptions {
    pub lines: Vec<String>,
    pub char_delay: f32,
    pub line_pause: f32,
}

#[derive(Clone, Debug)]
pub struct RenderOptions {
    pub seed: u64,
    pub strings: usize,
    pub columns: u32,
    pub color_scheme: ColorScheme,
    pub depth_bias: DepthBias,
    pub show_head: bool,
    pub glitch_rate: f32,
    /// TrueType font bytes; the built-in dot font is used when absent.
    pub font: Option<Vec<u8>>,
    pub font_size: f32,
    pub rain_chars: Vec<char>,
    pub intro: Option<IntroOptions>,
    pub composite: CompositeSettings,
}

/// Everything one running effect owns: the graphics context and every
/// resource created in it, plus the simulation state.
pub struct RendererContext {
    gpu: Gpu,
    atlas: GlyphAtlas,
    cloud: Cloud,
    intro: Option<Intro>,
    blur: BlurFilter,
    bloom: Bloom,
    compositor: Compositor,
    size: (u32, u32),
    terminated: bool,
}

impl RendererContext {
    pub fn new(opts: RenderOptions, width: u32, height: u32) -> anyhow::Result<Self> {
        let (width, height) = (width.max(1), height.max(1));
        let mut gpu = Gpu::new(width, height);

        let mut extra: Vec<char> = CURSOR_GLYPHS.to_vec();
        if let Some(intro) = &opts.intro {
            extra.extend(intro.lines.iter().flat_map(|l| l.chars()));
        }

        let atlas = match &opts.font {
            Some(bytes) => {
                GlyphAtlas::from_font(&mut gpu, bytes, opts.font_size, &opts.rain_chars, &extra)
                    .context("failed to build the glyph atlas from the font")?
            }
            None => GlyphAtlas::builtin(&mut gpu, opts.font_size, &opts.rain_chars, &extra)
                .context("failed to build the built-in glyph atlas")?,
        };

        let intro = match &opts.intro {
            Some(o) => Some(
                Intro::new(&o.lines, o.char_delay, o.line_pause, &atlas)
                    .context("intro text uses a glyph the font does not have")?,
            ),
            None => None,
        };

        let (aw, ah) = atlas.atlas_size();
        log::debug!("glyph atlas {}x{}, {} rain glyphs", aw, ah, opts.rain_chars.len());

        let blur = BlurFilter::new(&mut gpu).context("failed to load the blur programs")?;
        let bloom = Bloom::new(&mut gpu).context("failed to load the bloom programs")?;
        let compositor = Compositor::new(&mut gpu, opts.composite)
            .context("failed to load the compositor programs")?;

        let mut cloud = Cloud::new(opts.strings, opts.columns, opts.color_scheme, opts.seed);
        cloud.depth_bias = opts.depth_bias;
        cloud.show_head = opts.show_head;
        cloud.glitch_rate = opts.glitch_rate;

        let mut ctx = Self {
            gpu,
            atlas,
            cloud,
            intro,
            blur,
            bloom,
            compositor,
            size: (0, 0),
            terminated: false,
        };
        ctx.resize(width, height);
        Ok(ctx)
    }

    /// Reallocates every resolution-dependent texture and recomputes the
    /// view before the next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        self.size = (width, height);
        self.gpu.resize_screen(width, height);
        self.compositor.resize(&mut self.gpu, width, height);
        let (bw, bh) = self.compositor.background_size();
        self.blur.resize(&mut self.gpu, bw, bh);
        self.bloom.resize(&mut self.gpu, width, height);
        self.cloud.reset(width, height);
        log::debug!(
            "resized to {}x{} (background {}x{}, bloom chain {})",
            width,
            height,
            bw,
            bh,
            self.bloom.chain_len()
        );
    }

    /// Advances the intro or the rain by `dt` seconds and renders one frame
    /// into the default framebuffer.
    pub fn frame(&mut self, dt: f32) {
        if self.terminated {
            return;
        }
        let (vw, vh) = self.cloud.view_size();
        match self.intro.as_mut().filter(|i| !i.is_done()) {
            Some(intro) => {
                intro.update(dt);
                intro.build_cells(&self.atlas, vw, vh);
            }
            None => self.cloud.rain(dt, &mut self.atlas),
        }
        if log::log_enabled!(log::Level::Trace) {
            let grids = self.cloud.grids();
            let per_layer: Vec<usize> = (0..grids.layer_count()).map(|i| grids.cell_count(i)).collect();
            log::trace!("cells per layer: {:?}", per_layer);
        }

        let overlay = self.intro.as_ref().map(Intro::vertices).unwrap_or(&[]);
        let scene = Scene {
            layers: self.cloud.layers(),
            grids: self.cloud.grids(),
            overlay,
            view: (vw, vh),
            atlas: self.atlas.texture(),
        };
        self.compositor
            .render(&mut self.gpu, &self.blur, &self.bloom, &scene);
    }

    pub fn screen(&self) -> &Texture {
        self.gpu.screen()
    }

    pub fn draw_stats(&self) -> DrawStats {
        self.gpu.stats()
    }

    #[cfg(test)]
    pub fn cloud(&self) -> &Cloud {
        &self.cloud
    }

    pub fn cloud_mut(&mut self) -> &mut Cloud {
        &mut self.cloud
    }

    pub fn settings_mut(&mut self) -> &mut CompositeSettings {
        &mut self.compositor.settings
    }

    pub fn intro_running(&self) -> bool {
        self.intro.as_ref().is_some_and(|i| !i.is_done())
    }

    pub fn skip_intro(&mut self) {
        if let Some(intro) = self.intro.as_mut() {
            intro.skip();
        }
    }

    /// Respawns every string at the current size.
    pub fn reset_rain(&mut self) {
        let (w, h) = self.size;
        self.cloud.reset(w, h);
    }

    #[cfg(test)]
    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    /// Releases the atlas, filter, bloom and compositor resources. Safe to
    /// call more than once.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.atlas.release(&mut self.gpu);
        self.blur.release(&mut self.gpu);
        self.bloom.release(&mut self.gpu);
        self.compositor.release(&mut self.gpu);
        log::debug!(
            "renderer terminated: {} textures, {} framebuffers, {} programs left",
            self.gpu.live_textures(),
            self.gpu.live_framebuffers(),
            self.gpu.live_programs()
        );
    }
}

impl Drop for RendererContext {
    fn drop(&mut self) {
        self.terminate();
    }
}
