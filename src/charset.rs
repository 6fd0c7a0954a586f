// Copyright (c) 2026 rezky_nightky

use std::char;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Charset(u32);

impl Charset {
    pub const DIGITS: Charset = Charset(0x1);
    pub const LETTERS: Charset = Charset(0x2);
    pub const PUNCTUATION: Charset = Charset(0x4);
    pub const KATAKANA: Charset = Charset(0x8);
    pub const BINARY: Charset = Charset(0x10);
    pub const HEX: Charset = Charset(0x20);

    pub const ASCII: Charset = Charset::DIGITS
        .union(Charset::LETTERS)
        .union(Charset::PUNCTUATION);
    /// The film look; half-width katakana needs a TrueType font.
    pub const MATRIX: Charset = Charset::KATAKANA.union(Charset::DIGITS);

    pub fn contains(self, other: Charset) -> bool {
        (self.0 & other.0) != 0
    }

    pub const fn union(self, other: Charset) -> Charset {
        Charset(self.0 | other.0)
    }

    /// True when the built-in dot font cannot draw the set.
    pub fn needs_font(self) -> bool {
        self.contains(Charset::KATAKANA)
    }
}

/// Punctuation the built-in dot font can draw.
pub const PUNCTUATION: &str = ".,:;!?-+=*/\\<>_|'\"#$%&()[]";

pub const CHARSET_NAMES: &[(&str, &str)] = &[
    ("auto", "matrix with --font, otherwise ascii"),
    ("matrix", "half-width katakana and digits (needs --font)"),
    ("ascii", "A-Z, 0-9 and punctuation"),
    ("letters", "A-Z"),
    ("digits", "0-9"),
    ("binary", "0 and 1"),
    ("hex", "0-9 and A-F"),
    ("katakana", "half-width katakana (needs --font)"),
];

pub fn charset_from_str(spec: &str, have_font: bool) -> Result<Charset, String> {
    let spec = spec.trim().to_ascii_lowercase();
    match spec.as_str() {
        "auto" => Ok(if have_font {
            Charset::MATRIX
        } else {
            Charset::ASCII
        }),
        "matrix" => Ok(Charset::MATRIX),
        "ascii" => Ok(Charset::ASCII),
        "letters" | "english" => Ok(Charset::LETTERS),
        "digits" | "dec" | "decimal" => Ok(Charset::DIGITS),
        "bin" | "binary" | "01" => Ok(Charset::BINARY),
        "hex" | "hexadecimal" => Ok(Charset::HEX),
        "katakana" => Ok(Charset::KATAKANA),
        "punc" => Ok(Charset::PUNCTUATION),
        _ => Err(format!(
            "unsupported charset: {} (see --list-charsets)",
            spec
        )),
    }
}

fn push_range(out: &mut Vec<char>, start: u32, end: u32) {
    for v in start..=end {
        if let Some(ch) = char::from_u32(v) {
            out.push(ch);
        }
    }
}

/// Characters of `charset` in table order, without duplicates.
pub fn build_chars(charset: Charset) -> Vec<char> {
    let mut out: Vec<char> = Vec::new();

    if charset.contains(Charset::BINARY) {
        push_range(&mut out, 0x30, 0x31);
    }
    if charset.contains(Charset::HEX) {
        push_range(&mut out, 0x30, 0x39);
        push_range(&mut out, 0x41, 0x46);
    }
    if charset.contains(Charset::DIGITS) {
        push_range(&mut out, 0x30, 0x39);
    }
    if charset.contains(Charset::LETTERS) {
        push_range(&mut out, 0x41, 0x5A);
    }
    if charset.contains(Charset::PUNCTUATION) {
        out.extend(PUNCTUATION.chars());
    }
    if charset.contains(Charset::KATAKANA) {
        push_range(&mut out, 0xFF66, 0xFF9D);
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|c| seen.insert(*c));

    if out.is_empty() {
        out.push('0');
        out.push('1');
    }

    out
}
