// Copyright (c) 2026 rezky_nightky

/// Storage format of a texture. Float formats keep full `f32` precision;
/// the 8-bit formats quantize on every write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    R8,
    Rgba8,
    Rgb16F,
    Rgba16F,
}

impl TextureFormat {
    fn store(self, c: [f32; 4]) -> [f32; 4] {
        match self {
            TextureFormat::R8 => [quantize(c[0]), 0.0, 0.0, 1.0],
            TextureFormat::Rgba8 => [
                quantize(c[0]),
                quantize(c[1]),
                quantize(c[2]),
                quantize(c[3]),
            ],
            TextureFormat::Rgb16F => [c[0], c[1], c[2], 1.0],
            TextureFormat::Rgba16F => c,
        }
    }
}

fn quantize(v: f32) -> f32 {
    (v.clamp(0.0, 1.0) * 255.0).round() / 255.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

/// A 2D texture. Row 0 is the bottom row (`v == 0`), texel centers sit at
/// half-integer coordinates and every lookup clamps to the edge.
#[derive(Clone, Debug)]
pub struct Texture {
    width: u32,
    height: u32,
    format: TextureFormat,
    filter: Filter,
    texels: Vec<[f32; 4]>,
}

impl Default for Texture {
    fn default() -> Self {
        Self::new(Filter::Linear)
    }
}

impl Texture {
    pub fn new(filter: Filter) -> Self {
        Self {
            width: 0,
            height: 0,
            format: TextureFormat::Rgba8,
            filter,
            texels: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Drops the previous storage and allocates zeroed texels.
    pub fn allocate(&mut self, width: u32, height: u32, format: TextureFormat) {
        self.width = width;
        self.height = height;
        self.format = format;
        self.texels = vec![[0.0; 4]; width as usize * height as usize];
    }

    /// Uploads a top-down 8-bit single channel bitmap (first row is the top
    /// of the image) into an `R8` texture, so `v` grows downwards in the
    /// bitmap's own coordinates.
    pub fn upload_r8(&mut self, width: u32, height: u32, pixels: &[u8]) {
        self.allocate(width, height, TextureFormat::R8);
        for (texel, &p) in self.texels.iter_mut().zip(pixels) {
            *texel = [p as f32 / 255.0, 0.0, 0.0, 1.0];
        }
    }

    pub fn fill(&mut self, c: [f32; 4]) {
        let v = self.format.store(c);
        self.texels.fill(v);
    }

    pub fn read(&self, x: u32, y: u32) -> [f32; 4] {
        self.texels[y as usize * self.width as usize + x as usize]
    }

    pub fn write(&mut self, x: u32, y: u32, c: [f32; 4]) {
        let i = y as usize * self.width as usize + x as usize;
        self.texels[i] = self.format.store(c);
    }

    #[cfg(test)]
    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    fn fetch(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.texels[y * self.width as usize + x]
    }

    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        if self.texels.is_empty() {
            return [0.0, 0.0, 0.0, 0.0];
        }
        match self.filter {
            Filter::Nearest => self.fetch(
                (u * self.width as f32).floor() as i64,
                (v * self.height as f32).floor() as i64,
            ),
            Filter::Linear => {
                let x = u * self.width as f32 - 0.5;
                let y = v * self.height as f32 - 0.5;
                let (x0, fx) = subtexel(x);
                let (y0, fy) = subtexel(y);
                let a = self.fetch(x0, y0);
                let b = self.fetch(x0 + 1, y0);
                let c = self.fetch(x0, y0 + 1);
                let d = self.fetch(x0 + 1, y0 + 1);
                let mut out = [0.0; 4];
                for i in 0..4 {
                    let top = a[i] * (1.0 - fx) + b[i] * fx;
                    let bottom = c[i] * (1.0 - fx) + d[i] * fx;
                    out[i] = top * (1.0 - fy) + bottom * fy;
                }
                out
            }
        }
    }
}

/// Splits a texel coordinate into its integer part and a filter weight
/// quantized to 8 bits, like fixed-function texture units.
fn subtexel(x: f32) -> (i64, f32) {
    let q = (x * 256.0).round() as i64;
    (q.div_euclid(256), q.rem_euclid(256) as f32 / 256.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_sample_at_texel_center_is_exact() {
        let mut t = Texture::new(Filter::Linear);
        t.allocate(4, 2, TextureFormat::Rgba16F);
        t.write(1, 1, [2.0, 0.5, 0.25, 1.0]);
        let s = t.sample(1.5 / 4.0, 1.5 / 2.0);
        assert!((s[0] - 2.0).abs() < 1e-5);
        assert!((s[1] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn linear_sample_between_texels_averages() {
        let mut t = Texture::new(Filter::Linear);
        t.allocate(2, 1, TextureFormat::Rgb16F);
        t.write(0, 0, [0.0, 0.0, 0.0, 1.0]);
        t.write(1, 0, [1.0, 1.0, 1.0, 1.0]);
        let s = t.sample(0.5, 0.5);
        assert!((s[0] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn nearest_sample_picks_the_texel_under_uv() {
        let mut t = Texture::new(Filter::Nearest);
        t.allocate(4, 1, TextureFormat::Rgba16F);
        for x in 0..4 {
            t.write(x, 0, [x as f32, 0.0, 0.0, 1.0]);
        }
        let at = |u: f32| t.sample(u, 0.5)[0];
        assert_eq!(at(0.0), 0.0);
        assert_eq!(at(0.24), 0.0);
        assert_eq!(at(0.25), 1.0);
        assert_eq!(at(0.375), 1.0);
        assert_eq!(at(0.49), 1.0);
        assert_eq!(at(0.5), 2.0);
        assert_eq!(at(0.99), 3.0);
        assert_eq!(at(1.0), 3.0);
        assert_eq!(at(-0.3), 0.0);
    }

    #[test]
    fn rgba8_writes_are_clamped_and_quantized() {
        let mut t = Texture::new(Filter::Nearest);
        t.allocate(1, 1, TextureFormat::Rgba8);
        t.write(0, 0, [1.7, -0.2, 0.5, 1.0]);
        let c = t.read(0, 0);
        assert_eq!(c[0], 1.0);
        assert_eq!(c[1], 0.0);
        assert!((c[2] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn allocate_replaces_storage() {
        let mut t = Texture::new(Filter::Linear);
        t.allocate(3, 3, TextureFormat::Rgba16F);
        t.fill([1.0; 4]);
        t.allocate(2, 5, TextureFormat::Rgba16F);
        assert_eq!(t.size(), (2, 5));
        assert_eq!(t.texels().len(), 10);
        assert!(t.texels().iter().all(|c| c[0] == 0.0));
    }
}
