// Copyright (c) 2026 rezky_nightky

use crate::cell::{CharacterCell, Vertex};
use crate::glyph::{Glyph, GlyphError, GlyphProvider};

pub const DEFAULT_LINES: [&str; 4] = [
    "WAKE UP, NEO...",
    "THE MATRIX HAS YOU...",
    "FOLLOW THE WHITE RABBIT.",
    "KNOCK, KNOCK, NEO.",
];

const TEXT_COLOR: [f32; 4] = [0.35, 1.6, 0.45, 1.0];
const CURSOR_BLINK: f32 = 0.5;
const MARGIN_CELLS: f32 = 2.0;
const MIN_COLUMNS: f32 = 40.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IntroState {
    Typing { line: usize, ch: usize, timer: f32 },
    Done,
}

/// Typewriter that prints a few lines before the rain starts. Once `Done`
/// it never types again.
pub struct Intro {
    lines: Vec<Vec<char>>,
    state: IntroState,
    char_delay: f32,
    line_pause: f32,
    clock: f32,
    cursor: Option<Glyph>,
    cells: Vec<Vertex>,
}

impl Intro {
    /// Every non-space character of `lines` must be in `glyphs`.
    pub fn new<G: GlyphProvider>(
        lines: &[String],
        char_delay: f32,
        line_pause: f32,
        glyphs: &G,
    ) -> Result<Self, GlyphError> {
        let lines: Vec<Vec<char>> = lines.iter().map(|l| l.chars().collect()).collect();
        for c in lines.iter().flatten() {
            if !c.is_whitespace() {
                glyphs.find_glyph(*c)?;
            }
        }
        let cursor = glyphs
            .find_glyph('\u{2588}')
            .or_else(|_| glyphs.find_glyph('_'))
            .ok()
            .copied();
        let state = if lines.is_empty() {
            IntroState::Done
        } else {
            IntroState::Typing {
                line: 0,
                ch: 0,
                timer: char_delay,
            }
        };
        Ok(Self {
            lines,
            state,
            char_delay: char_delay.max(0.0),
            line_pause: line_pause.max(0.0),
            clock: 0.0,
            cursor,
            cells: Vec::new(),
        })
    }

    pub fn is_done(&self) -> bool {
        self.state == IntroState::Done
    }

    pub fn skip(&mut self) {
        self.state = IntroState::Done;
        self.cells.clear();
    }

    pub fn update(&mut self, dt: f32) -> IntroState {
        self.clock += dt;
        let IntroState::Typing {
            mut line,
            mut ch,
            mut timer,
        } = self.state
        else {
            return self.state;
        };

        timer -= dt;
        if timer > 0.0 {
            self.state = IntroState::Typing { line, ch, timer };
            return self.state;
        }

        let len = self.lines[line].len();
        self.state = if ch < len {
            ch += 1;
            timer = if ch == len {
                self.line_pause
            } else {
                self.char_delay
            };
            IntroState::Typing { line, ch, timer }
        } else if line + 1 < self.lines.len() {
            line += 1;
            IntroState::Typing {
                line,
                ch: 0,
                timer: self.char_delay,
            }
        } else {
            log::debug!("intro finished after {:.2}s", self.clock);
            IntroState::Done
        };
        self.state
    }

    /// Typed text so far, one entry per started line.
    #[cfg(test)]
    pub fn visible_text(&self) -> Vec<String> {
        match self.state {
            IntroState::Done => Vec::new(),
            IntroState::Typing { line, ch, .. } => {
                let mut out: Vec<String> =
                    self.lines[..line].iter().map(|l| l.iter().collect()).collect();
                out.push(self.lines[line][..ch].iter().collect());
                out
            }
        }
    }

    /// Rebuilds the text geometry for a view of `view_width` x `view_height`.
    pub fn build_cells<G: GlyphProvider>(&mut self, glyphs: &G, view_width: f32, view_height: f32) {
        self.cells.clear();
        let IntroState::Typing { line, ch, .. } = self.state else {
            return;
        };
        let longest = self.lines.iter().map(Vec::len).max().unwrap_or(0) as f32;
        let cell = view_width / (longest + 2.0 * MARGIN_CELLS).max(MIN_COLUMNS);
        let top = (view_height * 0.5 - (self.lines.len() as f32 * 0.5) * cell).max(cell);

        for (row, text) in self.lines[..=line].iter().enumerate() {
            let typed = if row == line { &text[..ch] } else { &text[..] };
            let y = top + row as f32 * cell;
            for (col, c) in typed.iter().enumerate() {
                if c.is_whitespace() {
                    continue;
                }
                if let Ok(g) = glyphs.find_glyph(*c) {
                    let x = (MARGIN_CELLS + col as f32) * cell;
                    let q = CharacterCell::new(g, TEXT_COLOR, [x, y], cell);
                    self.cells.extend_from_slice(&q.vertices);
                }
            }
        }

        let blink_on = (self.clock / CURSOR_BLINK) as u64 % 2 == 0;
        if let (Some(g), true) = (self.cursor.as_ref(), blink_on) {
            let x = (MARGIN_CELLS + ch as f32) * cell;
            let y = top + line as f32 * cell;
            let q = CharacterCell::new(g, TEXT_COLOR, [x, y], cell);
            self.cells.extend_from_slice(&q.vertices);
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.cells
    }
}
