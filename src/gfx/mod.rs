// Copyright (c) 2026 rezky_nightky

//! A small software graphics context with GL-like state: a handle arena for
//! textures, framebuffers and programs, capability bits, a viewport, texture
//! units and two draw calls. The default framebuffer is an `Rgba8` texture
//! that the terminal presenter reads back.

mod program;
mod raster;
mod texture;

use std::ops::{Deref, DerefMut};

use crate::cell::Vertex;

pub use program::{ProgramError, ProgramLoader};
pub use texture::{Filter, Texture, TextureFormat};

use program::{build_program, Kernel, Program, Uniform, VertexStage};

use raster::{RasterState, Stage};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FramebufferId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cap {
    Blend,
    FramebufferSrgb,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

pub const TEXTURE_UNITS: usize = 4;

#[derive(Clone, Copy, Debug, Default)]
pub struct DrawStats {
    pub draw_calls: u64,
    pub fragments: u64,
}

fn alloc_slot<T>(slots: &mut Vec<Option<T>>, value: T) -> u32 {
    if let Some(i) = slots.iter().position(Option::is_none) {
        slots[i] = Some(value);
        return i as u32;
    }
    slots.push(Some(value));
    (slots.len() - 1) as u32
}

pub struct Gpu {
    textures: Vec<Option<Texture>>,
    framebuffers: Vec<Option<Option<TextureId>>>,
    programs: Vec<Option<Program>>,
    screen: Texture,
    empty: Texture,

    bound_framebuffer: Option<FramebufferId>,
    viewport: Viewport,
    blend: bool,
    srgb: bool,
    blend_src: BlendFactor,
    blend_dst: BlendFactor,
    clear_color: [f32; 4],

    current_program: Option<ProgramId>,
    units: [Option<TextureId>; TEXTURE_UNITS],
    active_unit: usize,

    stats: DrawStats,
}

impl Gpu {
    /// Creates a context whose default framebuffer is `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        let mut screen = Texture::new(Filter::Nearest);
        screen.allocate(width, height, TextureFormat::Rgba8);
        Self {
            textures: Vec::new(),
            framebuffers: Vec::new(),
            programs: Vec::new(),
            screen,
            empty: Texture::new(Filter::Nearest),
            bound_framebuffer: None,
            viewport: Viewport {
                x: 0,
                y: 0,
                width,
                height,
            },
            blend: false,
            srgb: false,
            blend_src: BlendFactor::One,
            blend_dst: BlendFactor::Zero,
            clear_color: [0.0, 0.0, 0.0, 0.0],
            current_program: None,
            units: [None; TEXTURE_UNITS],
            active_unit: 0,
            stats: DrawStats::default(),
        }
    }

    /// Reallocates the default framebuffer after a window resize.
    pub fn resize_screen(&mut self, width: u32, height: u32) {
        self.screen.allocate(width, height, TextureFormat::Rgba8);
    }

    pub fn screen(&self) -> &Texture {
        &self.screen
    }

    pub fn stats(&self) -> DrawStats {
        self.stats
    }

    // Capabilities

    pub fn enable(&mut self, cap: Cap) {
        self.set_enabled(cap, true);
    }

    pub fn disable(&mut self, cap: Cap) {
        self.set_enabled(cap, false);
    }

    pub fn set_enabled(&mut self, cap: Cap, on: bool) {
        match cap {
            Cap::Blend => self.blend = on,
            Cap::FramebufferSrgb => self.srgb = on,
        }
    }

    pub fn is_enabled(&self, cap: Cap) -> bool {
        match cap {
            Cap::Blend => self.blend,
            Cap::FramebufferSrgb => self.srgb,
        }
    }

    pub fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.blend_src = src;
        self.blend_dst = dst;
    }

    pub fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = Viewport {
            x,
            y,
            width,
            height,
        };
    }

    pub fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.clear_color = [r, g, b, a];
    }

    // Textures

    pub fn create_texture(&mut self, filter: Filter) -> TextureId {
        TextureId(alloc_slot(&mut self.textures, Texture::new(filter)))
    }

    pub fn delete_texture(&mut self, id: TextureId) {
        if let Some(slot) = self.textures.get_mut(id.0 as usize) {
            *slot = None;
        }
        for unit in &mut self.units {
            if *unit == Some(id) {
                *unit = None;
            }
        }
        for fb in self.framebuffers.iter_mut().flatten() {
            if *fb == Some(id) {
                *fb = None;
            }
        }
    }

    /// Allocates fresh storage for `id`; the previous contents are gone.
    pub fn tex_image(&mut self, id: TextureId, width: u32, height: u32, format: TextureFormat) {
        self.texture_mut(id).allocate(width, height, format);
    }

    pub fn tex_upload_r8(&mut self, id: TextureId, width: u32, height: u32, pixels: &[u8]) {
        self.texture_mut(id).upload_r8(width, height, pixels);
    }

    pub fn texture(&self, id: TextureId) -> &Texture {
        self.textures
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .expect("texture handle is live")
    }

    pub fn texture_mut(&mut self, id: TextureId) -> &mut Texture {
        self.textures
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .expect("texture handle is live")
    }

    pub fn texture_size(&self, id: TextureId) -> (u32, u32) {
        self.texture(id).size()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
    }

    pub fn active_texture(&mut self, unit: usize) {
        assert!(unit < TEXTURE_UNITS, "texture unit {} out of range", unit);
        self.active_unit = unit;
    }

    pub fn bind_texture(&mut self, id: Option<TextureId>) {
        self.units[self.active_unit] = id;
    }

    // Framebuffers

    pub fn create_framebuffer(&mut self) -> FramebufferId {
        FramebufferId(alloc_slot(&mut self.framebuffers, None))
    }

    pub fn delete_framebuffer(&mut self, id: FramebufferId) {
        if let Some(slot) = self.framebuffers.get_mut(id.0 as usize) {
            *slot = None;
        }
        if self.bound_framebuffer == Some(id) {
            self.bound_framebuffer = None;
        }
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.iter().filter(|f| f.is_some()).count()
    }

    /// `None` binds the default framebuffer.
    pub fn bind_framebuffer(&mut self, id: Option<FramebufferId>) {
        self.bound_framebuffer = id;
    }

    /// Attaches `texture` as the color target of the bound framebuffer.
    pub fn framebuffer_texture(&mut self, texture: TextureId) {
        let fb = self
            .bound_framebuffer
            .expect("a framebuffer object must be bound to attach a texture");
        let slot = self
            .framebuffers
            .get_mut(fb.0 as usize)
            .and_then(Option::as_mut)
            .expect("framebuffer handle is live");
        *slot = Some(texture);
    }

    // Programs

    pub fn use_program(&mut self, id: Option<ProgramId>) {
        self.current_program = id;
    }

    pub fn live_programs(&self) -> usize {
        self.programs.iter().filter(|p| p.is_some()).count()
    }

    fn current_program_mut(&mut self) -> &mut Program {
        let id = self.current_program.expect("a program must be in use");
        self.programs
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .expect("program handle is live")
    }

    pub fn uniform_f32(&mut self, name: &str, v: f32) {
        self.current_program_mut().set_uniform(name, Uniform::F32(v));
    }

    pub fn uniform_i32(&mut self, name: &str, v: i32) {
        self.current_program_mut().set_uniform(name, Uniform::I32(v));
    }

    // Drawing

    fn raster_state(&self) -> RasterState {
        RasterState {
            viewport: self.viewport,
            blend: self.blend.then_some((self.blend_src, self.blend_dst)),
            srgb: self.srgb,
        }
    }

    fn take_target(&mut self) -> Option<Texture> {
        match self.bound_framebuffer {
            None => Some(std::mem::take(&mut self.screen)),
            Some(fb) => {
                let attached = self
                    .framebuffers
                    .get(fb.0 as usize)
                    .and_then(|f| f.as_ref().copied())
                    .flatten()?;
                self.textures
                    .get_mut(attached.0 as usize)
                    .and_then(Option::as_mut)
                    .map(std::mem::take)
            }
        }
    }

    fn put_target(&mut self, target: Texture) {
        match self.bound_framebuffer {
            None => self.screen = target,
            Some(fb) => {
                if let Some(Some(Some(attached))) = self.framebuffers.get(fb.0 as usize) {
                    if let Some(Some(slot)) = self.textures.get_mut(attached.0 as usize) {
                        *slot = target;
                    }
                }
            }
        }
    }

    /// Clears the whole color attachment, ignoring the viewport.
    pub fn clear(&mut self) {
        let color = self.clear_color;
        if let Some(mut target) = self.take_target() {
            target.fill(color);
            self.put_target(target);
        }
    }

    fn sampler(&self, program: &Program, name: &str) -> &Texture {
        let unit = program.i32(name);
        if !(0..TEXTURE_UNITS as i32).contains(&unit) {
            return &self.empty;
        }
        self.units[unit as usize]
            .and_then(|id| self.textures.get(id.0 as usize))
            .and_then(Option::as_ref)
            .unwrap_or(&self.empty)
    }

    fn stage(&self, program: &Program) -> Stage<'_> {
        match program.kernel {
            Kernel::Glyph => Stage::Glyph {
                font: self.sampler(program, "uFont"),
                screen: [program.f32("uScreenWidth"), program.f32("uScreenHeight")],
            },
            Kernel::Copy => Stage::Copy {
                src: self.sampler(program, "uTexture"),
            },
            Kernel::BlurHorizontal | Kernel::BlurVertical => Stage::Blur {
                src: self.sampler(program, "uTexture"),
                strength: program.f32("uStrength"),
                horizontal: program.kernel == Kernel::BlurHorizontal,
            },
            Kernel::BloomPrefilter => Stage::Prefilter {
                src: self.sampler(program, "uSource"),
                threshold: program.f32("uThreshold"),
                knee: program.f32("uKnee"),
            },
            Kernel::BloomDownsample => Stage::Downsample {
                src: self.sampler(program, "uSource"),
            },
            Kernel::BloomUpsample => Stage::Upsample {
                previous: self.sampler(program, "uPrevious"),
                downsample: self.sampler(program, "uDownsample"),
            },
            Kernel::ToneMap => Stage::ToneMap {
                base: self.sampler(program, "uBase"),
                bloom: self.sampler(program, "uBloom"),
                exposure: program.f32("uExposure"),
                bloom_intensity: program.f32("uBloomIntensity"),
            },
        }
    }

    /// Runs `f` with the current program when its linked vertex stage is
    /// `vertex`. A program linked for the other draw call is skipped.
    fn draw_with(
        &mut self,
        vertex: VertexStage,
        f: impl FnOnce(&Stage<'_>, &RasterState, &mut Texture) -> u64,
    ) {
        let Some(id) = self.current_program else {
            return;
        };
        let Some(program) = self.programs.get(id.0 as usize).and_then(Option::as_ref) else {
            return;
        };
        if program.vertex != vertex {
            log::warn!(
                "program {} is linked for the {:?} vertex stage, draw needs {:?}; skipped",
                id.0,
                program.vertex,
                vertex
            );
            return;
        }
        let Some(mut target) = self.take_target() else {
            return;
        };
        let state = self.raster_state();
        let fragments = match self.programs.get(id.0 as usize).and_then(Option::as_ref) {
            Some(program) => {
                let stage = self.stage(program);
                f(&stage, &state, &mut target)
            }
            None => 0,
        };
        self.put_target(target);
        self.stats.draw_calls += 1;
        self.stats.fragments += fragments;
    }

    /// Runs the current fullscreen program over every pixel of the viewport.
    pub fn draw_fullscreen_quad(&mut self) {
        self.draw_with(VertexStage::Fullscreen, |stage, state, target| {
            raster::draw_fullscreen(stage, state, target)
        });
    }

    /// Rasterizes `vertices` as a triangle list with the current glyph program.
    pub fn draw_triangles(&mut self, vertices: &[Vertex]) {
        self.draw_with(VertexStage::Glyph, |stage, state, target| {
            raster::draw_triangles(stage, state, target, vertices)
        });
    }
}

impl ProgramLoader for Gpu {
    fn load_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
        defines: &[&str],
    ) -> Result<ProgramId, ProgramError> {
        let program = build_program(vertex_source, fragment_source, defines)?;
        Ok(ProgramId(alloc_slot(&mut self.programs, program)))
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(slot) = self.programs.get_mut(program.0 as usize) {
            *slot = None;
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }
}

/// Records the state of some capability bits and puts them back when
/// dropped, on every exit path. Derefs to the context so passes can keep
/// issuing calls through the guard.
pub struct CapScope<'a> {
    gpu: &'a mut Gpu,
    saved: Vec<(Cap, bool)>,
}

impl<'a> CapScope<'a> {
    pub fn new(gpu: &'a mut Gpu, caps: &[Cap]) -> Self {
        let saved = caps.iter().map(|&c| (c, gpu.is_enabled(c))).collect();
        Self { gpu, saved }
    }
}

impl Deref for CapScope<'_> {
    type Target = Gpu;

    fn deref(&self) -> &Gpu {
        self.gpu
    }
}

impl DerefMut for CapScope<'_> {
    fn deref_mut(&mut self) -> &mut Gpu {
        self.gpu
    }
}

impl Drop for CapScope<'_> {
    fn drop(&mut self) {
        for &(cap, on) in &self.saved {
            self.gpu.set_enabled(cap, on);
        }
    }
}
