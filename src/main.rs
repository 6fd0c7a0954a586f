// Copyright (c) 2026 rezky_nightky

mod bitmap_font;
mod bloom;
mod cell;
mod charset;
mod cloud;
mod compositor;
mod config;
mod droplet;
mod filter;
mod frame;
mod gfx;
#[cfg(test)]
mod git_sha;
mod glyph;
mod intro;
mod layer;
mod palette;
mod renderer;
mod runtime;
mod shaders;
mod terminal;

use std::env;
use std::path::Path;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::thread;

use anyhow::Context;
use clap::builder::styling::{AnsiColor as ClapAnsiColor, Color as ClapColor};
use clap::builder::styling::{Effects as ClapEffects, Style as ClapStyle};
use clap::builder::Styles as ClapStyles;
use clap::{CommandFactory, FromArgMatches};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};

#[cfg(unix)]
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

use crate::charset::build_chars;
use crate::config::{
    color_enabled_stdout, color_mode_from_arg, color_mode_label, default_params_usage_for_help,
    detect_color_mode_auto, print_list_charsets, print_list_colors, Args, Settings,
};
use crate::frame::{rows_for, Frame};
use crate::renderer::{RenderOptions, RendererContext};
use crate::runtime::ColorScheme;
use crate::terminal::{region, restore_terminal_best_effort, Terminal};

const HELP_TEMPLATE_PLAIN: &str = "\
{before-help}{about-with-newline}
USAGE:
  {usage}

{all-args}{after-help}";

const HELP_TEMPLATE_COLOR: &str = "\
{before-help}{about-with-newline}
\x1b[1;36mUSAGE:\x1b[0m
  {usage}

{all-args}{after-help}";

/// Input is ignored for this long after start in screensaver mode.
const SCREENSAVER_GRACE: Duration = Duration::from_millis(1500);

/// Longest simulated step; a stalled terminal should not teleport the rain.
const MAX_FRAME_DELTA: f32 = 0.25;

fn build_info() -> &'static str {
    env!("GLYPHFALL_BUILD")
}

fn clap_styles() -> ClapStyles {
    ClapStyles::styled()
        .header(
            ClapStyle::new()
                .effects(ClapEffects::BOLD)
                .fg_color(Some(ClapColor::Ansi(ClapAnsiColor::Cyan))),
        )
        .usage(
            ClapStyle::new()
                .effects(ClapEffects::BOLD)
                .fg_color(Some(ClapColor::Ansi(ClapAnsiColor::Green))),
        )
        .literal(ClapStyle::new().fg_color(Some(ClapColor::Ansi(ClapAnsiColor::Yellow))))
        .placeholder(ClapStyle::new().fg_color(Some(ClapColor::Ansi(ClapAnsiColor::Magenta))))
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(path) = log_file {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("failed to install the logger")?;
    Ok(())
}

fn install_signal_handlers() {
    #[cfg(unix)]
    {
        match Signals::new([SIGINT, SIGTERM, SIGHUP]) {
            Ok(mut signals) => {
                thread::spawn(move || {
                    if let Some(sig) = signals.forever().next() {
                        restore_terminal_best_effort();
                        log::info!("caught signal {}, exiting", sig);
                        std::process::exit(128 + sig);
                    }
                });
            }
            Err(e) => log::warn!("failed to install signal handlers: {}", e),
        }
    }

    #[cfg(windows)]
    {
        if let Err(e) = ctrlc::set_handler(|| {
            restore_terminal_best_effort();
            std::process::exit(130);
        }) {
            log::warn!("failed to install Ctrl-C handler: {}", e);
        }
    }
}

fn print_check_bitcolor(args: &Args) {
    let colorterm = env::var("COLORTERM").unwrap_or_default();
    let term = env::var("TERM").unwrap_or_default();
    let unset = |v: &str| if v.is_empty() { "(unset)".to_string() } else { v.to_string() };

    println!("BITCOLOR CHECK:");
    println!("  COLORTERM: {}", unset(&colorterm));
    println!("  TERM: {}", unset(&term));
    println!("  auto_detected: {}", color_mode_label(detect_color_mode_auto()));
    match color_mode_from_arg(args.colormode) {
        Ok(m) if args.colormode.is_some() => {
            println!("  forced: {}", color_mode_label(m));
            println!("  effective: {}", color_mode_label(m));
        }
        Ok(m) => println!("  effective: {}", color_mode_label(m)),
        Err(e) => println!("  forced: {}", e),
    }
}

/// What a key press asks the loop to do.
#[derive(Debug, PartialEq)]
enum KeyAction {
    Quit,
    Handled,
    Ignored,
}

/// Screensaver input, quit keys included, is ignored until the grace ends.
fn screensaver_input_ends_run(settings: &Settings, elapsed: Duration) -> bool {
    settings.exit_on_input && elapsed >= SCREENSAVER_GRACE
}

fn handle_key(renderer: &mut RendererContext, k: KeyEvent) -> KeyAction {
    match (k.code, k.modifiers) {
        (KeyCode::Esc, _) | (KeyCode::Char('q'), _) => return KeyAction::Quit,
        (KeyCode::Char('c'), m) if m.contains(KeyModifiers::CONTROL) => return KeyAction::Quit,
        _ => {}
    }

    if renderer.intro_running() {
        renderer.skip_intro();
        return KeyAction::Handled;
    }

    match k.code {
        KeyCode::Char(' ') => renderer.reset_rain(),
        KeyCode::Char('p') => renderer.cloud_mut().toggle_pause(),
        KeyCode::Char('b') => {
            let s = renderer.settings_mut();
            s.bloom_enabled = !s.bloom_enabled;
        }
        KeyCode::Up => {
            let cloud = renderer.cloud_mut();
            cloud.speed_scale = (cloud.speed_scale * 1.25).min(8.0);
        }
        KeyCode::Down => {
            let cloud = renderer.cloud_mut();
            cloud.speed_scale = (cloud.speed_scale / 1.25).max(0.125);
        }
        KeyCode::Right => {
            let s = renderer.settings_mut();
            s.exposure = (s.exposure * 1.25).min(20.0);
        }
        KeyCode::Left => {
            let s = renderer.settings_mut();
            s.exposure = (s.exposure / 1.25).max(0.01);
        }
        KeyCode::Char(c) => match c.to_digit(10).and_then(ColorScheme::from_digit) {
            Some(scheme) => renderer.cloud_mut().set_color_scheme(scheme),
            None => return KeyAction::Ignored,
        },
        _ => return KeyAction::Ignored,
    }
    KeyAction::Handled
}

fn run(settings: &Settings) -> anyhow::Result<()> {
    let font = match &settings.font {
        Some(path) => Some(
            std::fs::read(path)
                .with_context(|| format!("failed to read font {}", path.display()))?,
        ),
        None => None,
    };
    let seed = settings.seed.unwrap_or_else(rand::random);
    log::info!("seed {}", seed);

    let mut term =
        Terminal::new(settings.exit_on_input).context("failed to set up the terminal")?;
    let (cols, rows) = term.size().context("failed to query the terminal size")?;
    let (origin, w, h) = region(cols, rows, settings.full_screen);
    term.set_origin(origin);
    let (pw, ph) = (w as u32, h as u32 * 2);

    let columns = settings.columns_for(pw);
    let opts = RenderOptions {
        seed,
        strings: settings.strings_for(columns),
        columns,
        color_scheme: settings.color_scheme,
        depth_bias: settings.depth_bias,
        show_head: settings.show_head,
        glitch_rate: settings.glitch_rate,
        font,
        font_size: settings.font_size,
        rain_chars: build_chars(settings.charset),
        intro: settings.intro.clone(),
        composite: settings.composite,
    };
    let mut renderer = RendererContext::new(opts, pw, ph)?;
    let mut frame = Frame::new(w, rows_for(ph));

    let start_time = Instant::now();
    let end_time = settings
        .duration
        .map(|s| start_time + Duration::from_secs_f64(s));
    let target_period = Duration::from_secs_f64(1.0 / settings.fps);
    let mut next_frame = Instant::now();
    let mut last_frame = Instant::now();
    let mut frames: u64 = 0;
    let mut running = true;

    while running {
        if end_time.is_some_and(|end| Instant::now() >= end) {
            break;
        }
        let mut pending_resize: Option<(u16, u16)> = None;

        loop {
            while Terminal::poll_event(Duration::from_millis(0))? {
                let input_ends_run = screensaver_input_ends_run(settings, start_time.elapsed());
                match Terminal::read_event()? {
                    Event::Resize(nc, nr) => pending_resize = Some((nc, nr)),
                    Event::Key(k) if k.kind == KeyEventKind::Press => {
                        if input_ends_run {
                            running = false;
                        } else if !settings.exit_on_input
                            && handle_key(&mut renderer, k) == KeyAction::Quit
                        {
                            running = false;
                        }
                    }
                    Event::Mouse(m) if input_ends_run => {
                        if !matches!(m.kind, MouseEventKind::ScrollUp | MouseEventKind::ScrollDown)
                        {
                            running = false;
                        }
                    }
                    _ => {}
                }
                if !running {
                    break;
                }
            }

            if !running || pending_resize.is_some() {
                break;
            }

            let now = Instant::now();
            if now >= next_frame {
                break;
            }

            let mut timeout = next_frame - now;
            if let Some(end) = end_time {
                if now >= end {
                    break;
                }
                timeout = timeout.min(end - now);
            }
            let _ = Terminal::poll_event(timeout)?;
        }

        if !running {
            break;
        }

        if let Some((nc, nr)) = pending_resize {
            let (origin, w, h) = region(nc, nr, settings.full_screen);
            term.set_origin(origin);
            renderer.resize(w as u32, h as u32 * 2);
            frame = Frame::new(w, rows_for(h as u32 * 2));
        }

        let now = Instant::now();
        let dt = (now - last_frame).as_secs_f32().min(MAX_FRAME_DELTA);
        last_frame = now;

        renderer.frame(dt);
        frame.present(renderer.screen(), settings.color_mode);
        if frame.is_dirty_all() || !frame.dirty_indices().is_empty() {
            term.draw(&mut frame)?;
        }
        frames = frames.saturating_add(1);

        next_frame += target_period;
        let now = Instant::now();
        if now > next_frame {
            next_frame = now;
        }
    }

    renderer.terminate();
    drop(term);
    let elapsed = start_time.elapsed().as_secs_f64().max(0.000_001);
    let stats = renderer.draw_stats();
    log::info!(
        "{} frames in {:.2}s ({:.1} fps), {} draw calls, {} fragments",
        frames,
        elapsed,
        frames as f64 / elapsed,
        stats.draw_calls,
        stats.fragments
    );
    Ok(())
}

fn main() {
    std::panic::set_hook(Box::new(|info| {
        restore_terminal_best_effort();
        eprintln!("{}", info);
    }));

    let mut cmd = Args::command();
    cmd = cmd.styles(clap_styles());
    cmd = cmd.before_help(default_params_usage_for_help());
    let help_template = if color_enabled_stdout() {
        HELP_TEMPLATE_COLOR
    } else {
        HELP_TEMPLATE_PLAIN
    };
    cmd = cmd.help_template(help_template);
    cmd.build();

    if cmd.get_arguments().any(|a| a.get_id().as_str() == "help") {
        cmd = cmd.mut_arg("help", |a| a.help_heading("HELP"));
    }
    cmd.build();

    let matches = cmd.get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    if args.list_charsets {
        print_list_charsets();
        return;
    }

    if args.list_colors {
        print_list_colors();
        return;
    }

    if args.check_bitcolor {
        print_check_bitcolor(&args);
        return;
    }

    if args.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return;
    }

    if args.info {
        println!("Version: v{}", env!("CARGO_PKG_VERSION"));
        println!("Build: {}", build_info());
        println!("Commit: {}", env!("GLYPHFALL_GIT_SHA"));
        println!("Copyright: (c) 2026 {}", env!("CARGO_PKG_AUTHORS"));
        println!("License: {}", env!("CARGO_PKG_LICENSE"));
        println!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
        return;
    }

    let settings = match Settings::from_args(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(args.log_file.as_deref()) {
        eprintln!("{:#}", e);
        std::process::exit(-1);
    }
    install_signal_handlers();

    if let Err(e) = run(&settings) {
        restore_terminal_best_effort();
        log::error!("{:#}", e);
        eprintln!("glyphfall: {:#}", e);
        std::process::exit(-1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::Charset;
    use crate::compositor::CompositeSettings;
    use crate::renderer::IntroOptions;
    use crate::runtime::DepthBias;
    use clap::Parser;
    use crossterm::event::KeyEventState;

    fn renderer(intro: bool) -> RendererContext {
        let opts = RenderOptions {
            seed: 1,
            strings: 10,
            columns: 8,
            color_scheme: ColorScheme::Green,
            depth_bias: DepthBias::Quadratic,
            show_head: true,
            glitch_rate: 0.0,
            font: None,
            font_size: 8.0,
            rain_chars: build_chars(Charset::DIGITS),
            intro: intro.then(|| IntroOptions {
                lines: vec!["HI".to_string()],
                char_delay: 1.0,
                line_pause: 1.0,
            }),
            composite: CompositeSettings::default(),
        };
        RendererContext::new(opts, 16, 16).unwrap()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn keys_drive_the_renderer() {
        let mut r = renderer(false);
        assert_eq!(handle_key(&mut r, key(KeyCode::Char('q'))), KeyAction::Quit);
        assert_eq!(handle_key(&mut r, key(KeyCode::Esc)), KeyAction::Quit);

        handle_key(&mut r, key(KeyCode::Char('p')));
        assert!(r.cloud().is_paused());

        handle_key(&mut r, key(KeyCode::Char('b')));
        assert!(!r.settings_mut().bloom_enabled);

        handle_key(&mut r, key(KeyCode::Up));
        assert!(r.cloud().speed_scale > 1.0);

        handle_key(&mut r, key(KeyCode::Char('4')));
        assert_eq!(r.cloud().color_scheme(), ColorScheme::Red);

        assert_eq!(handle_key(&mut r, key(KeyCode::Char('x'))), KeyAction::Ignored);
    }

    fn settings(argv: &[&str]) -> Settings {
        let args = Args::try_parse_from(argv).unwrap();
        Settings::from_args(&args).unwrap()
    }

    #[test]
    fn screensaver_input_waits_for_the_grace_period() {
        let saver = settings(&["glyphfall", "--screensaver"]);
        assert!(!screensaver_input_ends_run(&saver, Duration::from_millis(0)));
        assert!(!screensaver_input_ends_run(&saver, Duration::from_millis(1499)));
        assert!(screensaver_input_ends_run(&saver, SCREENSAVER_GRACE));
        assert!(screensaver_input_ends_run(&saver, Duration::from_secs(60)));

        let normal = settings(&["glyphfall"]);
        assert!(!screensaver_input_ends_run(&normal, Duration::from_secs(60)));
    }

    #[test]
    fn any_key_skips_the_intro_first() {
        let mut r = renderer(true);
        assert!(r.intro_running());
        assert_eq!(handle_key(&mut r, key(KeyCode::Char('p'))), KeyAction::Handled);
        assert!(!r.intro_running());
        assert!(!r.cloud().is_paused());
    }
}
