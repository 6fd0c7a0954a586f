// Copyright (c) 2026 rezky_nightky

use std::env;
use std::fmt::Display;
use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;

use crate::charset::{charset_from_str, Charset, CHARSET_NAMES};
use crate::compositor::CompositeSettings;
use crate::intro::DEFAULT_LINES;
use crate::palette::{scheme_from_str, SCHEME_NAMES};
use crate::renderer::IntroOptions;
use crate::runtime::{ColorMode, ColorScheme, DepthBias};

pub const DEFAULT_PARAMS_USAGE: &str = "DEFAULT PARAMS USAGE:\n  glyphfall --fps 30 --color green --charset auto --blur-scale 2 --bloom-threshold 0.8 --bloom-knee 0.4 --exposure 1 --glitch-rate 4";

/// Seconds per typed intro character and pause after each line at
/// `--intro-speed 1`.
const INTRO_CHAR_DELAY: f32 = 0.08;
const INTRO_LINE_PAUSE: f32 = 1.2;

pub fn color_enabled_stdout() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if matches!(env::var("CLICOLOR").ok().as_deref(), Some("0")) {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn heading(text: &str) -> String {
    if color_enabled_stdout() {
        format!("\x1b[1;36m{}\x1b[0m", text)
    } else {
        text.to_string()
    }
}

pub fn default_params_usage_for_help() -> String {
    match DEFAULT_PARAMS_USAGE.split_once('\n') {
        Some((head, rest)) => format!("{}\n{}", heading(head), rest),
        None => DEFAULT_PARAMS_USAGE.to_string(),
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "glyphfall", version, disable_version_flag = true)]
pub struct Args {
    #[arg(
        short = 'F',
        long = "fullscreen",
        help_heading = "GENERAL",
        help = "Use the whole terminal instead of a centered window"
    )]
    pub fullscreen: bool,

    #[arg(
        short = 's',
        long = "screensaver",
        help_heading = "GENERAL",
        help = "Screensaver mode: any key or mouse movement exits once a 1.5s grace period has passed; keys, q included, are ignored before that"
    )]
    pub screensaver: bool,

    #[arg(
        long = "duration",
        help_heading = "GENERAL",
        help = "Stop after N seconds (min 0.1 max 86400; <=0 disables)"
    )]
    pub duration: Option<f64>,

    #[arg(long = "seed", help_heading = "GENERAL", help = "Random seed")]
    pub seed: Option<u64>,

    #[arg(
        long = "log-file",
        help_heading = "GENERAL",
        help = "Write log output (RUST_LOG) to this file"
    )]
    pub log_file: Option<PathBuf>,

    #[arg(
        short = 'c',
        long = "color",
        default_value = "green",
        help_heading = "APPEARANCE",
        help = "Color theme (see --list-colors)"
    )]
    pub color: String,

    #[arg(
        long = "colormode",
        help_heading = "APPEARANCE",
        help = "Force color mode (allowed: 0,16,8/256,24/32). Default: 24-bit if supported (COLORTERM), else 8-bit"
    )]
    pub colormode: Option<u16>,

    #[arg(
        long = "no-head",
        help_heading = "APPEARANCE",
        help = "Draw the leading glyph like the rest of the trail"
    )]
    pub no_head: bool,

    #[arg(
        long = "exposure",
        default_value_t = 1.0,
        help_heading = "APPEARANCE",
        help = "Tone mapping exposure (min 0.01 max 20)"
    )]
    pub exposure: f32,

    #[arg(
        long = "font",
        help_heading = "GLYPHS",
        help = "TrueType/OpenType font file (default: built-in dot font)"
    )]
    pub font: Option<PathBuf>,

    #[arg(
        long = "font-size",
        help_heading = "GLYPHS",
        help = "Atlas glyph size in pixels (min 4 max 128; default 8, 24 with --font)"
    )]
    pub font_size: Option<f32>,

    #[arg(
        long = "charset",
        default_value = "auto",
        help_heading = "GLYPHS",
        help = "Charset preset (see --list-charsets)"
    )]
    pub charset: String,

    #[arg(
        long = "glitch-rate",
        default_value_t = 4.0,
        help_heading = "GLYPHS",
        help = "Glyph table swaps per second (min 0 max 1000)"
    )]
    pub glitch_rate: f32,

    #[arg(
        short = 'f',
        long = "fps",
        default_value_t = 30.0,
        help_heading = "RAIN",
        help = "Target FPS (min 1 max 240)"
    )]
    pub fps: f64,

    #[arg(
        long = "columns",
        help_heading = "RAIN",
        help = "Columns across the nearest layer (min 8 max 400; default: width / 8)"
    )]
    pub columns: Option<u32>,

    #[arg(
        long = "strings",
        help_heading = "RAIN",
        help = "Falling strings (min 1 max 20000; default: 10 per column)"
    )]
    pub strings: Option<usize>,

    #[arg(
        long = "depth-bias",
        default_value_t = 2,
        help_heading = "RAIN",
        help = "Depth layer bias exponent (2=quadratic, 3=cubic)"
    )]
    pub depth_bias: u8,

    #[arg(
        long = "blur-scale",
        default_value_t = 2,
        help_heading = "POST-PROCESSING",
        help = "Background layer resolution divisor (min 1 max 8)"
    )]
    pub blur_scale: u32,

    #[arg(
        long = "blur-iterations",
        default_value_t = 2,
        help_heading = "POST-PROCESSING",
        help = "Blur iterations for the farthest layer (min 0 max 8)"
    )]
    pub blur_iterations: u32,

    #[arg(
        long = "no-bloom",
        help_heading = "POST-PROCESSING",
        help = "Start with bloom disabled (toggle with b)"
    )]
    pub no_bloom: bool,

    #[arg(
        long = "bloom-threshold",
        default_value_t = 0.8,
        help_heading = "POST-PROCESSING",
        help = "Bloom luminance threshold (min 0 max 10)"
    )]
    pub bloom_threshold: f32,

    #[arg(
        long = "bloom-knee",
        default_value_t = 0.4,
        help_heading = "POST-PROCESSING",
        help = "Bloom soft knee (min 0 max 10)"
    )]
    pub bloom_knee: f32,

    #[arg(
        long = "bloom-intensity",
        default_value_t = 1.0,
        help_heading = "POST-PROCESSING",
        help = "Bloom contribution in the composite (min 0 max 10)"
    )]
    pub bloom_intensity: f32,

    #[arg(
        long = "no-intro",
        help_heading = "INTRO",
        help = "Skip the typing intro"
    )]
    pub no_intro: bool,

    #[arg(
        long = "intro-line",
        help_heading = "INTRO",
        help = "Intro line (repeatable; replaces the default text)"
    )]
    pub intro_line: Vec<String>,

    #[arg(
        long = "intro-speed",
        default_value_t = 1.0,
        help_heading = "INTRO",
        help = "Typing speed multiplier (min 0.1 max 10)"
    )]
    pub intro_speed: f32,

    #[arg(
        long = "check-bitcolor",
        help_heading = "HELP",
        help = "Print detected terminal color capability and exit"
    )]
    pub check_bitcolor: bool,

    #[arg(
        long = "list-charsets",
        help_heading = "HELP",
        help = "List available charset presets and exit"
    )]
    pub list_charsets: bool,

    #[arg(
        long = "list-colors",
        help_heading = "HELP",
        help = "List available color themes and exit"
    )]
    pub list_colors: bool,

    #[arg(
        long = "info",
        short = 'i',
        help_heading = "HELP",
        help = "Print version info and exit"
    )]
    pub info: bool,

    #[arg(
        long = "version",
        short = 'v',
        help_heading = "HELP",
        help = "Print version and exit"
    )]
    pub version: bool,
}

fn require_range<T: PartialOrd + Display + Copy>(
    name: &str,
    v: T,
    min: T,
    max: T,
) -> Result<T, String> {
    if v < min || v > max {
        return Err(format!("failed to apply {} {} (min {} max {})", name, v, min, max));
    }
    Ok(v)
}

pub fn require_f64_range(name: &str, v: f64, min: f64, max: f64) -> Result<f64, String> {
    if !v.is_finite() {
        return Err(format!("failed to apply {} {} (must be a finite number)", name, v));
    }
    require_range(name, v, min, max)
}

pub fn require_f32_range(name: &str, v: f32, min: f32, max: f32) -> Result<f32, String> {
    if !v.is_finite() {
        return Err(format!("failed to apply {} {} (must be a finite number)", name, v));
    }
    require_range(name, v, min, max)
}

pub fn require_u32_range(name: &str, v: u32, min: u32, max: u32) -> Result<u32, String> {
    require_range(name, v, min, max)
}

pub fn detect_color_mode_auto() -> ColorMode {
    let colorterm = env::var("COLORTERM")
        .unwrap_or_default()
        .to_ascii_lowercase();
    if colorterm.contains("truecolor") || colorterm.contains("24bit") {
        return ColorMode::TrueColor;
    }

    let term = env::var("TERM").unwrap_or_default().to_ascii_lowercase();
    if term == "dumb" {
        return ColorMode::Mono;
    }
    ColorMode::Color256
}

pub fn color_mode_from_arg(m: Option<u16>) -> Result<ColorMode, String> {
    match m {
        None => Ok(detect_color_mode_auto()),
        Some(0) => Ok(ColorMode::Mono),
        Some(16) => Ok(ColorMode::Color16),
        Some(8 | 256) => Ok(ColorMode::Color256),
        Some(24 | 32) => Ok(ColorMode::TrueColor),
        Some(m) => Err(format!(
            "invalid --colormode: {} (allowed: 0,16,8,256,24,32)",
            m
        )),
    }
}

pub fn color_mode_label(m: ColorMode) -> &'static str {
    match m {
        ColorMode::TrueColor => "24-bit truecolor",
        ColorMode::Color256 => "8-bit (256-color)",
        ColorMode::Color16 => "16-color",
        ColorMode::Mono => "mono",
    }
}

/// Launch settings after range checks. Values that depend on the terminal
/// size (`columns`, `strings`) stay optional until the size is known.
#[derive(Clone, Debug)]
pub struct Settings {
    pub full_screen: bool,
    pub exit_on_input: bool,
    pub fps: f64,
    pub duration: Option<f64>,
    pub seed: Option<u64>,
    pub color_mode: ColorMode,
    pub color_scheme: ColorScheme,
    pub show_head: bool,
    pub font: Option<PathBuf>,
    pub font_size: f32,
    pub charset: Charset,
    pub glitch_rate: f32,
    pub columns: Option<u32>,
    pub strings: Option<usize>,
    pub depth_bias: DepthBias,
    pub composite: CompositeSettings,
    pub intro: Option<IntroOptions>,
}

impl Settings {
    pub fn from_args(args: &Args) -> Result<Self, String> {
        let fps = require_f64_range("--fps", args.fps, 1.0, 240.0)?;
        let duration = match args.duration {
            Some(s) if !s.is_finite() => {
                return Err(format!(
                    "failed to apply --duration {} (must be a finite number)",
                    s
                ))
            }
            Some(s) if s > 0.0 => Some(require_f64_range("--duration", s, 0.1, 86400.0)?),
            _ => None,
        };

        let have_font = args.font.is_some();
        let charset = charset_from_str(&args.charset, have_font)?;
        if charset.needs_font() && !have_font {
            return Err(format!(
                "--charset {} needs glyphs the built-in font lacks (pass --font)",
                args.charset
            ));
        }
        let default_size = if have_font { 24.0 } else { 8.0 };
        let font_size = match args.font_size {
            Some(px) => require_f32_range("--font-size", px, 4.0, 128.0)?,
            None => default_size,
        };

        let columns = args
            .columns
            .map(|c| require_u32_range("--columns", c, 8, 400))
            .transpose()?;
        let strings = args
            .strings
            .map(|n| require_range("--strings", n, 1, 20_000))
            .transpose()?;
        let depth_bias = match args.depth_bias {
            2 => DepthBias::Quadratic,
            3 => DepthBias::Cubic,
            v => return Err(format!("failed to apply --depth-bias {} (allowed: 2,3)", v)),
        };

        let composite = CompositeSettings {
            blur_scale: require_u32_range("--blur-scale", args.blur_scale, 1, 8)?,
            blur_iterations: require_u32_range("--blur-iterations", args.blur_iterations, 0, 8)?,
            bloom_enabled: !args.no_bloom,
            bloom_threshold: require_f32_range("--bloom-threshold", args.bloom_threshold, 0.0, 10.0)?,
            bloom_knee: require_f32_range("--bloom-knee", args.bloom_knee, 0.0, 10.0)?,
            bloom_intensity: require_f32_range("--bloom-intensity", args.bloom_intensity, 0.0, 10.0)?,
            exposure: require_f32_range("--exposure", args.exposure, 0.01, 20.0)?,
        };

        let intro_speed = require_f32_range("--intro-speed", args.intro_speed, 0.1, 10.0)?;
        let intro = (!args.no_intro).then(|| IntroOptions {
            lines: if args.intro_line.is_empty() {
                DEFAULT_LINES.iter().map(|l| l.to_string()).collect()
            } else {
                args.intro_line.clone()
            },
            char_delay: INTRO_CHAR_DELAY / intro_speed,
            line_pause: INTRO_LINE_PAUSE / intro_speed,
        });

        Ok(Self {
            full_screen: args.fullscreen,
            exit_on_input: args.screensaver,
            fps,
            duration,
            seed: args.seed,
            color_mode: color_mode_from_arg(args.colormode)?,
            color_scheme: scheme_from_str(&args.color)?,
            show_head: !args.no_head,
            font: args.font.clone(),
            font_size,
            charset,
            glitch_rate: require_f32_range("--glitch-rate", args.glitch_rate, 0.0, 1000.0)?,
            columns,
            strings,
            depth_bias,
            composite,
            intro,
        })
    }

    /// Columns across the nearest layer for an image `pixel_width` wide.
    pub fn columns_for(&self, pixel_width: u32) -> u32 {
        self.columns.unwrap_or_else(|| (pixel_width / 8).clamp(8, 400))
    }

    pub fn strings_for(&self, columns: u32) -> usize {
        self.strings.unwrap_or(columns as usize * 10)
    }
}

fn print_value_list(title: &str, flag: &str, rows: &[(&str, &str)]) {
    println!("{}", heading(title));
    println!("NOTE: Use only the VALUE (left side) with {}.", flag);
    println!();
    println!("VALUE        DESCRIPTION");
    for (name, desc) in rows {
        println!("{:<12} {}", name, desc);
    }
}

pub fn print_list_charsets() {
    print_value_list("AVAILABLE CHARSET PRESETS:", "--charset", CHARSET_NAMES);
}

pub fn print_list_colors() {
    print_value_list("AVAILABLE COLOR THEMES:", "--color", SCHEME_NAMES);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Settings, String> {
        let argv = std::iter::once("glyphfall").chain(extra.iter().copied());
        let args = Args::try_parse_from(argv).map_err(|e| e.to_string())?;
        Settings::from_args(&args)
    }

    #[test]
    fn defaults_are_valid() {
        let s = parse(&["--colormode", "24"]).unwrap();
        assert_eq!(s.fps, 30.0);
        assert_eq!(s.charset, Charset::ASCII);
        assert_eq!(s.font_size, 8.0);
        assert_eq!(s.depth_bias, DepthBias::Quadratic);
        assert_eq!(s.color_mode, ColorMode::TrueColor);
        assert_eq!(s.composite, CompositeSettings::default());
        assert_eq!(s.intro.as_ref().unwrap().lines.len(), DEFAULT_LINES.len());
        assert!(s.duration.is_none());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(parse(&["--fps", "0"]).is_err());
        assert!(parse(&["--fps", "NaN"]).is_err());
        assert!(parse(&["--blur-scale", "9"]).is_err());
        assert!(parse(&["--depth-bias", "4"]).is_err());
        assert!(parse(&["--colormode", "7"]).is_err());
        assert!(parse(&["--color", "plaid"]).is_err());
        assert!(parse(&["--duration", "0.01"]).is_err());
    }

    #[test]
    fn font_only_charsets_need_a_font() {
        assert!(parse(&["--charset", "katakana"]).is_err());
        let s = parse(&["--charset", "katakana", "--font", "x.ttf"]).unwrap();
        assert_eq!(s.font_size, 24.0);
    }

    #[test]
    fn intro_options_follow_flags() {
        let s = parse(&["--no-intro"]).unwrap();
        assert!(s.intro.is_none());

        let s = parse(&["--intro-line", "HI", "--intro-line", "THERE", "--intro-speed", "2"])
            .unwrap();
        let intro = s.intro.unwrap();
        assert_eq!(intro.lines, vec!["HI".to_string(), "THERE".to_string()]);
        assert!((intro.char_delay - INTRO_CHAR_DELAY / 2.0).abs() < 1e-6);
    }

    #[test]
    fn size_dependent_defaults() {
        let s = parse(&[]).unwrap();
        assert_eq!(s.columns_for(640), 80);
        assert_eq!(s.columns_for(16), 8);
        assert_eq!(s.strings_for(80), 800);
        let s = parse(&["--columns", "100", "--strings", "1000"]).unwrap();
        assert_eq!(s.columns_for(640), 100);
        assert_eq!(s.strings_for(100), 1000);
    }
}
