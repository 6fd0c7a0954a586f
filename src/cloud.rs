// Copyright (c) 2026 rezky_nightky

use rand::{rngs::StdRng, SeedableRng};

use crate::droplet::{DrawCtx, Droplet};
use crate::glyph::GlyphProvider;
use crate::layer::{DepthLayer, LayerGrids, DEFAULT_LAYERS};
use crate::palette::{build_palette, Palette};
use crate::runtime::{ColorScheme, DepthBias};

/// The fixed pool of falling strings plus the per-layer grids they fill.
pub struct Cloud {
    pub show_head: bool,
    pub depth_bias: DepthBias,
    /// Glyph table swaps per second.
    pub glitch_rate: f32,
    pub speed_scale: f32,

    column_count: u32,
    layers: Vec<DepthLayer>,
    palette: Palette,
    color_scheme: ColorScheme,

    droplets: Vec<Droplet>,
    grids: LayerGrids,

    view_width: f32,
    view_height: f32,

    pause: bool,
    glitch_remainder: f32,

    mt: StdRng,
}

impl Cloud {
    pub fn new(
        droplet_count: usize,
        column_count: u32,
        color_scheme: ColorScheme,
        seed: u64,
    ) -> Self {
        let layers = DEFAULT_LAYERS.to_vec();
        Self {
            show_head: true,
            depth_bias: DepthBias::Quadratic,
            glitch_rate: 4.0,
            speed_scale: 1.0,
            column_count: column_count.max(1),
            grids: LayerGrids::new(layers.len()),
            layers,
            palette: build_palette(color_scheme),
            color_scheme,
            droplets: vec![Droplet::default(); droplet_count],
            view_width: column_count.max(1) as f32,
            view_height: 0.0,
            pause: false,
            glitch_remainder: 0.0,
            mt: StdRng::seed_from_u64(seed),
        }
    }

    pub fn set_color_scheme(&mut self, scheme: ColorScheme) {
        if scheme == self.color_scheme {
            return;
        }
        log::debug!("color scheme {:?} -> {:?}", self.color_scheme, scheme);
        self.color_scheme = scheme;
        self.palette = build_palette(scheme);
    }

    #[cfg(test)]
    pub fn color_scheme(&self) -> ColorScheme {
        self.color_scheme
    }

    pub fn toggle_pause(&mut self) {
        self.pause = !self.pause;
    }

    #[cfg(test)]
    pub fn is_paused(&self) -> bool {
        self.pause
    }

    pub fn layers(&self) -> &[DepthLayer] {
        &self.layers
    }

    pub fn grids(&self) -> &LayerGrids {
        &self.grids
    }

    #[cfg(test)]
    pub fn droplets(&self) -> &[Droplet] {
        &self.droplets
    }

    #[cfg(test)]
    pub fn droplets_mut(&mut self) -> &mut [Droplet] {
        &mut self.droplets
    }

    /// View extent in view units: `column_count` wide, aspect-matched tall.
    pub fn view_size(&self) -> (f32, f32) {
        (self.view_width, self.view_height)
    }

    fn ctx<'a>(
        layers: &'a [DepthLayer],
        palette: &'a Palette,
        glyphs: &'a [crate::glyph::Glyph],
        column_count: u32,
        view: (f32, f32),
        depth_bias: DepthBias,
        show_head: bool,
    ) -> DrawCtx<'a> {
        DrawCtx {
            layers,
            palette,
            glyphs,
            column_count,
            view_width: view.0,
            view_height: view.1,
            depth_bias,
            show_head,
        }
    }

    /// Recomputes the view for a `width` x `height` pixel target and
    /// respawns every string.
    pub fn reset(&mut self, width: u32, height: u32) {
        self.view_width = self.column_count as f32;
        self.view_height = if width == 0 {
            0.0
        } else {
            height as f32 / width as f32 * self.view_width
        };

        let ctx = Self::ctx(
            &self.layers,
            &self.palette,
            &[],
            self.column_count,
            (self.view_width, self.view_height),
            self.depth_bias,
            self.show_head,
        );
        for d in &mut self.droplets {
            d.init(&mut self.mt, &ctx);
        }
        self.grids.clear();
        self.glitch_remainder = 0.0;
        log::debug!(
            "rain reset: view {}x{:.2}, {} strings",
            self.view_width,
            self.view_height,
            self.droplets.len()
        );
    }

    /// Advances the simulation by `dt` seconds and rebuilds the grids. While
    /// paused the previous grids are kept as they are.
    pub fn rain<G: GlyphProvider>(&mut self, dt: f32, glyphs: &mut G) {
        if self.pause {
            return;
        }

        self.glitch_remainder += self.glitch_rate.max(0.0) * dt;
        let swaps = self.glitch_remainder.floor();
        if swaps >= 1.0 {
            self.glitch_remainder -= swaps;
            glyphs.swap_glyphs(swaps as usize, &mut self.mt);
        }

        self.grids.clear();
        let ctx = Self::ctx(
            &self.layers,
            &self.palette,
            glyphs.glyphs(),
            self.column_count,
            (self.view_width, self.view_height),
            self.depth_bias,
            self.show_head,
        );
        let dt = dt * self.speed_scale;
        for d in &mut self.droplets {
            d.update(dt, &ctx, &mut self.grids, &mut self.mt);
        }
    }
}
