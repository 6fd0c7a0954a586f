// Copyright (c) 2026 rezky_nightky

use crossterm::style::Color;

use crate::runtime::{ColorMode, ColorScheme};

/// Linear HDR color stops sampled along a falling string, tail (t = 0) to
/// head (t = 1). Components above 1.0 feed the bloom prefilter.
#[derive(Clone, Debug)]
pub struct Palette {
    pub colors: Vec<[f32; 3]>,
    pub head: [f32; 3],
}

impl Palette {
    pub fn get(&self, t: f32) -> [f32; 3] {
        let n = self.colors.len();
        if n == 0 {
            return [0.0; 3];
        }
        let pos = t.clamp(0.0, 1.0) * (n - 1) as f32;
        let i = pos as usize;
        if i >= n - 1 {
            return self.colors[n - 1];
        }
        let f = pos - i as f32;
        let (a, b) = (self.colors[i], self.colors[i + 1]);
        [
            a[0] * (1.0 - f) + b[0] * f,
            a[1] * (1.0 - f) + b[1] * f,
            a[2] * (1.0 - f) + b[2] * f,
        ]
    }
}

pub fn build_palette(scheme: ColorScheme) -> Palette {
    let (colors, head): (&[[f32; 3]], [f32; 3]) = match scheme {
        ColorScheme::Green => (
            &[
                [0.0, 0.25, 0.02],
                [0.0, 0.6, 0.05],
                [0.05, 1.0, 0.1],
                [0.3, 1.4, 0.35],
            ],
            [1.6, 2.2, 1.6],
        ),
        ColorScheme::Green2 => (
            &[[0.0, 0.35, 0.15], [0.1, 0.9, 0.4], [0.5, 1.5, 0.8]],
            [1.8, 2.2, 1.9],
        ),
        ColorScheme::Gold => (
            &[[0.3, 0.15, 0.0], [0.9, 0.6, 0.05], [1.4, 1.1, 0.3]],
            [2.2, 2.0, 1.4],
        ),
        ColorScheme::Red => (
            &[[0.25, 0.0, 0.0], [0.8, 0.05, 0.05], [1.5, 0.3, 0.25]],
            [2.2, 1.4, 1.3],
        ),
        ColorScheme::Blue => (
            &[[0.0, 0.02, 0.3], [0.05, 0.2, 0.9], [0.4, 0.7, 1.5]],
            [1.5, 1.8, 2.4],
        ),
        ColorScheme::Cyan => (
            &[[0.0, 0.2, 0.25], [0.05, 0.75, 0.85], [0.4, 1.4, 1.5]],
            [1.6, 2.2, 2.2],
        ),
        ColorScheme::Purple => (
            &[[0.15, 0.0, 0.3], [0.5, 0.15, 0.9], [1.1, 0.6, 1.5]],
            [2.0, 1.6, 2.4],
        ),
        ColorScheme::Fire => (
            &[
                [0.3, 0.0, 0.0],
                [0.9, 0.2, 0.0],
                [1.4, 0.7, 0.05],
                [1.6, 1.3, 0.4],
            ],
            [2.4, 2.2, 1.6],
        ),
        ColorScheme::Gray => (
            &[[0.15, 0.15, 0.15], [0.55, 0.55, 0.55], [1.1, 1.1, 1.1]],
            [2.0, 2.0, 2.0],
        ),
    };
    Palette {
        colors: colors.to_vec(),
        head,
    }
}

pub fn scheme_from_str(s: &str) -> Result<ColorScheme, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "green" => Ok(ColorScheme::Green),
        "green2" | "mint" => Ok(ColorScheme::Green2),
        "gold" | "yellow" => Ok(ColorScheme::Gold),
        "red" => Ok(ColorScheme::Red),
        "blue" => Ok(ColorScheme::Blue),
        "cyan" => Ok(ColorScheme::Cyan),
        "purple" => Ok(ColorScheme::Purple),
        "fire" => Ok(ColorScheme::Fire),
        "gray" | "grey" | "snow" => Ok(ColorScheme::Gray),
        other => Err(format!(
            "unsupported color: {} (see --list-colors)",
            other
        )),
    }
}

pub const SCHEME_NAMES: &[(&str, &str)] = &[
    ("green", "classic phosphor green (key 1)"),
    ("green2", "mint green (key 2)"),
    ("gold", "amber and gold (key 3)"),
    ("red", "red alert (key 4)"),
    ("blue", "deep blue (key 5)"),
    ("cyan", "cyan (key 6)"),
    ("purple", "violet (key 7)"),
    ("fire", "red to yellow (key 8)"),
    ("gray", "monochrome gray (key 9)"),
];

fn dist2(a: [u8; 3], b: [u8; 3]) -> i32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    dr * dr + dg * dg + db * db
}

/// Nearest xterm-256 index, choosing between the 6x6x6 cube and the gray ramp.
pub fn rgb_to_ansi256(c: [u8; 3]) -> u8 {
    const LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

    let q = |v: u8| ((v as u16 * 5 + 127) / 255) as u8;
    let (r6, g6, b6) = (q(c[0]), q(c[1]), q(c[2]));
    let cube = [LEVELS[r6 as usize], LEVELS[g6 as usize], LEVELS[b6 as usize]];
    let cube_idx = 16 + 36 * r6 + 6 * g6 + b6;

    let avg = ((c[0] as u16 + c[1] as u16 + c[2] as u16) / 3) as u8;
    let (gray_idx, gray) = match avg {
        0..=7 => (16, 0),
        239..=255 => (231, 255),
        _ => {
            let i = (avg - 8) / 10;
            (232 + i, 8 + 10 * i)
        }
    };

    if dist2(c, [gray; 3]) < dist2(c, cube) {
        gray_idx
    } else {
        cube_idx
    }
}

fn rgb_to_color16(c: [u8; 3]) -> Color {
    const TABLE: [(Color, [u8; 3]); 16] = [
        (Color::Black, [0, 0, 0]),
        (Color::DarkGrey, [128, 128, 128]),
        (Color::Grey, [192, 192, 192]),
        (Color::White, [255, 255, 255]),
        (Color::DarkRed, [128, 0, 0]),
        (Color::Red, [255, 0, 0]),
        (Color::DarkGreen, [0, 128, 0]),
        (Color::Green, [0, 255, 0]),
        (Color::DarkBlue, [0, 0, 128]),
        (Color::Blue, [0, 0, 255]),
        (Color::DarkCyan, [0, 128, 128]),
        (Color::Cyan, [0, 255, 255]),
        (Color::DarkMagenta, [128, 0, 128]),
        (Color::Magenta, [255, 0, 255]),
        (Color::DarkYellow, [128, 128, 0]),
        (Color::Yellow, [255, 255, 0]),
    ];

    TABLE
        .iter()
        .min_by_key(|(_, rgb)| dist2(c, *rgb))
        .map(|(color, _)| *color)
        .unwrap_or(Color::White)
}

/// Maps an 8-bit display color to what the terminal can show.
pub fn terminal_color(mode: ColorMode, c: [u8; 3]) -> Color {
    match mode {
        ColorMode::TrueColor => Color::Rgb {
            r: c[0],
            g: c[1],
            b: c[2],
        },
        ColorMode::Color256 => Color::AnsiValue(rgb_to_ansi256(c)),
        ColorMode::Color16 => rgb_to_color16(c),
        ColorMode::Mono => {
            let luma = (c[0] as u32 * 299 + c[1] as u32 * 587 + c[2] as u32 * 114) / 1000;
            match luma {
                0..=40 => Color::Black,
                41..=110 => Color::DarkGrey,
                111..=190 => Color::Grey,
                _ => Color::White,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_interpolates_between_stops() {
        let p = Palette {
            colors: vec![[0.0, 0.0, 0.0], [2.0, 1.0, 0.0]],
            head: [1.0; 3],
        };
        assert_eq!(p.get(0.0), [0.0, 0.0, 0.0]);
        assert_eq!(p.get(1.0), [2.0, 1.0, 0.0]);
        let mid = p.get(0.5);
        assert!((mid[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn every_scheme_has_hdr_head() {
        for s in ColorScheme::ALL {
            let p = build_palette(s);
            assert!(p.colors.len() >= 2);
            assert!(p.head.iter().any(|&c| c > 1.0));
        }
    }

    #[test]
    fn ansi256_picks_cube_and_gray() {
        assert_eq!(rgb_to_ansi256([0, 255, 0]), 46);
        assert_eq!(rgb_to_ansi256([0, 0, 0]), 16);
        assert_eq!(rgb_to_ansi256([128, 128, 128]), 244);
    }

    #[test]
    fn scheme_names_parse() {
        for (name, _) in SCHEME_NAMES {
            assert!(scheme_from_str(name).is_ok());
        }
        assert!(scheme_from_str("plaid").is_err());
    }
}
