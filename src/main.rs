// SPDX-License-Identifier: MIT
//
// ansie — a small full-screen demo built on ansie-term.
//
// Opens a screen on stdout, draws a centred label showing the terminal size,
// redraws it whenever the terminal is resized, and leaves after a few
// seconds or on Ctrl-C / SIGTERM. If stdout is not a terminal (or the
// session cannot be opened) it prints one plain line instead.
//
// Usage:
//   ansie [seconds]                       (default 5)
//   ANSIE_LOG=debug ansie 2> ansie.log

use std::env;
use std::io::{self, IsTerminal, Write};
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use ansie_term::ansi::{self, Attr, Colour};
use ansie_term::{FdTerminal, Screen, ScreenOptions, Size};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Run time when no argument is given.
const DEFAULT_SECONDS: u64 = 5;

/// How often the main loop looks for a new size or a closed screen.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Environment variable holding the log filter.
const LOG_ENV: &str = "ANSIE_LOG";

fn main() {
    init_tracing("warn");

    let seconds = parse_seconds(env::args().nth(1).as_deref()).unwrap_or_else(|msg| {
        eprintln!("ansie: {msg}");
        process::exit(2);
    });

    match Screen::stdout(ScreenOptions::default()) {
        Ok(screen) => run(&screen, Duration::from_secs(seconds)),
        Err(e) => {
            if e.is_not_a_terminal() {
                info!("stdout is not a terminal, using plain output");
            } else {
                warn!(error = %e, "cannot open screen, using plain output");
            }
            println!("{}", label(None));
        }
    }
}

/// Install a stderr subscriber filtered by `ANSIE_LOG`.
fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_names(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Redraw on every size change until time runs out or a signal closes the
/// screen.
fn run(screen: &Screen<FdTerminal>, duration: Duration) {
    screen.set_cursor_visible(false);

    let start = Instant::now();
    let mut drawn: Option<Size> = None;
    while !screen.is_closed() && start.elapsed() < duration {
        let size = screen.size();
        if drawn != Some(size) {
            draw(screen, size);
            drawn = Some(size);
        }
        thread::sleep(POLL_INTERVAL);
    }

    debug!(elapsed_ms = start.elapsed().as_millis(), "demo finished");
    screen.close();
}

fn draw(screen: &Screen<FdTerminal>, size: Size) {
    let text = label(Some(size));
    let (x, y) = label_origin(size, text.len());

    screen.clear();
    screen.move_cursor_to(x, y);
    if let Err(e) = screen.write(&styled(&text)) {
        warn!(error = %e, "failed to draw label");
    }
}

/// `text` in bold bright cyan, followed by an SGR reset.
fn styled(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(text.len() + 16);
    // Writing into a Vec cannot fail.
    let _ = write_styled(&mut buf, text);
    buf
}

fn write_styled(w: &mut Vec<u8>, text: &str) -> io::Result<()> {
    ansi::attr(w, Attr::Bold)?;
    ansi::fg_bright(w, Colour::Cyan)?;
    w.write_all(text.as_bytes())?;
    ansi::reset(w)
}

fn label(size: Option<Size>) -> String {
    match size {
        Some(s) => format!("ansie {}x{}", s.cols, s.rows),
        None => "ansie: not a terminal".to_string(),
    }
}

/// Top-left cell (1-based) that centres a label of `len` columns.
fn label_origin(size: Size, len: usize) -> (u16, u16) {
    let len = u16::try_from(len).unwrap_or(u16::MAX);
    let x = size.cols.saturating_sub(len) / 2 + 1;
    let y = size.rows / 2 + 1;
    (x, y)
}

fn parse_seconds(arg: Option<&str>) -> Result<u64, String> {
    arg.map_or(Ok(DEFAULT_SECONDS), |s| {
        s.parse()
            .map_err(|_| format!("invalid duration {s:?}, expected whole seconds"))
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────────
