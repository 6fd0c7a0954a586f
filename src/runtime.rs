// Copyright (c) 2026 rezky_nightky

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Mono,
    Color16,
    Color256,
    TrueColor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorScheme {
    Green,
    Green2,
    Gold,
    Red,
    Blue,
    Cyan,
    Purple,
    Fire,
    Gray,
}

impl ColorScheme {
    pub const ALL: [ColorScheme; 9] = [
        ColorScheme::Green,
        ColorScheme::Green2,
        ColorScheme::Gold,
        ColorScheme::Red,
        ColorScheme::Blue,
        ColorScheme::Cyan,
        ColorScheme::Purple,
        ColorScheme::Fire,
        ColorScheme::Gray,
    ];

    /// Scheme bound to number key `digit` (1-9).
    pub fn from_digit(digit: u32) -> Option<ColorScheme> {
        let i = digit.checked_sub(1)? as usize;
        Self::ALL.get(i).copied()
    }
}

/// Exponent applied to the uniform draw that picks a string's depth layer.
/// Higher exponents favour the far layers more strongly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthBias {
    Quadratic,
    Cubic,
}

impl DepthBias {
    pub fn exponent(self) -> i32 {
        match self {
            DepthBias::Quadratic => 2,
            DepthBias::Cubic => 3,
        }
    }
}
