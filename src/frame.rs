// Copyright (c) 2026 rezky_nightky

use crossterm::style::Color;

use crate::gfx::Texture;
use crate::palette::terminal_color;
use crate::runtime::ColorMode;

pub const UPPER_HALF: char = '\u{2580}';

/// One terminal cell. Two image pixels share it: the upper one is drawn as
/// the foreground of an upper half block, the lower one as the background.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
}

impl Cell {
    pub const BLANK: Cell = Cell {
        ch: ' ',
        fg: None,
        bg: None,
    };
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u16,
    pub height: u16,
    pub cells: Vec<Cell>,
    dirty_all: bool,
    dirty_map: Vec<bool>,
    dirty: Vec<usize>,
}

/// Terminal rows needed to show an image `pixel_height` pixels tall.
pub fn rows_for(pixel_height: u32) -> u16 {
    pixel_height.div_ceil(2).min(u16::MAX as u32) as u16
}

fn to_u8(c: [f32; 4]) -> [u8; 3] {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [q(c[0]), q(c[1]), q(c[2])]
}

impl Frame {
    pub fn new(width: u16, height: u16) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            cells: vec![Cell::BLANK; len],
            dirty_all: true,
            dirty_map: vec![false; len],
            dirty: Vec::new(),
        }
    }

    pub fn is_dirty_all(&self) -> bool {
        self.dirty_all
    }

    pub fn dirty_indices(&self) -> &[usize] {
        &self.dirty
    }

    pub fn clear_dirty(&mut self) {
        if self.dirty_all {
            self.dirty_all = false;
            self.dirty_map.fill(false);
            self.dirty.clear();
            return;
        }

        for &i in &self.dirty {
            if let Some(v) = self.dirty_map.get_mut(i) {
                *v = false;
            }
        }
        self.dirty.clear();
    }

    pub fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    #[cfg(test)]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    pub fn cell_at_index(&self, i: usize) -> Cell {
        self.cells.get(i).copied().unwrap_or(Cell::BLANK)
    }

    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        let Some(i) = self.index(x, y) else {
            return;
        };
        if self.cells[i] == cell {
            return;
        }
        self.cells[i] = cell;
        if !self.dirty_all && !self.dirty_map[i] {
            self.dirty_map[i] = true;
            self.dirty.push(i);
        }
    }

    /// Converts a bottom-up RGBA image into half-block cells. Image row 0 is
    /// the bottom of the picture, so terminal row 0 shows the last two rows.
    pub fn present(&mut self, image: &Texture, mode: ColorMode) {
        let (w, h) = image.size();
        for y in 0..self.height {
            let top = h as i64 - 1 - 2 * y as i64;
            let bottom = top - 1;
            for x in 0..self.width {
                if x as u32 >= w || top < 0 {
                    self.set(x, y, Cell::BLANK);
                    continue;
                }
                let upper = to_u8(image.read(x as u32, top as u32));
                let lower = if bottom >= 0 {
                    to_u8(image.read(x as u32, bottom as u32))
                } else {
                    [0; 3]
                };
                let fg = terminal_color(mode, upper);
                let bg = terminal_color(mode, lower);
                let cell = if fg == bg {
                    Cell {
                        ch: ' ',
                        fg: None,
                        bg: Some(bg),
                    }
                } else {
                    Cell {
                        ch: UPPER_HALF,
                        fg: Some(fg),
                        bg: Some(bg),
                    }
                };
                self.set(x, y, cell);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{Filter, TextureFormat};

    fn image() -> Texture {
        let mut t = Texture::new(Filter::Nearest);
        t.allocate(2, 3, TextureFormat::Rgba8);
        t.write(0, 2, [1.0, 0.0, 0.0, 1.0]);
        t.write(0, 1, [0.0, 0.0, 1.0, 1.0]);
        t
    }

    #[test]
    fn present_maps_pixel_pairs_top_down() {
        let mut f = Frame::new(2, rows_for(3));
        assert_eq!(f.height, 2);
        f.present(&image(), ColorMode::TrueColor);

        let c = f.get(0, 0).unwrap();
        assert_eq!(c.ch, UPPER_HALF);
        assert_eq!(c.fg, Some(Color::Rgb { r: 255, g: 0, b: 0 }));
        assert_eq!(c.bg, Some(Color::Rgb { r: 0, g: 0, b: 255 }));

        let black = Color::Rgb { r: 0, g: 0, b: 0 };
        assert_eq!(f.get(1, 0).unwrap().ch, ' ');
        assert_eq!(f.get(1, 0).unwrap().bg, Some(black));
        assert_eq!(f.get(0, 1).unwrap().bg, Some(black));
    }

    #[test]
    fn only_changed_cells_are_dirty() {
        let mut f = Frame::new(2, 2);
        f.present(&image(), ColorMode::TrueColor);
        assert!(f.is_dirty_all());
        f.clear_dirty();

        let mut img = image();
        f.present(&img, ColorMode::TrueColor);
        assert!(f.dirty_indices().is_empty());

        img.write(1, 2, [0.0, 1.0, 0.0, 1.0]);
        f.present(&img, ColorMode::TrueColor);
        assert_eq!(f.dirty_indices(), &[1]);
    }
}
