// SPDX-License-Identifier: MIT
//
// Screen — one full-screen terminal session, from open to teardown.
//
// Opening a screen captures the terminal's termios, switches to the
// alternate buffer, reads the window size and starts a background listener
// thread. The listener reacts to two notifications:
//
//   Resize    → re-query the size; on failure keep the last known size.
//   Terminate → tear the session down.
//
// Notifications arrive on an mpsc channel. With `os_signals` enabled a small
// forwarder thread maps SIGWINCH to `Resize` and SIGINT / SIGTERM to
// `Terminate` (via signal-hook). Without it, only `Notifier` handles feed the
// channel, which is how tests simulate a resize.
//
// signal-hook never uninstalls its OS handlers. So SIGINT and SIGTERM are
// also registered as "conditional default" on the `closed` flag: once the
// screen is closed, they terminate the process as if nobody had caught them.
// A later screen in the same process inherits that, which is why only one
// screen per process should enable `os_signals`.
//
// # Teardown
//
// Teardown is reachable from the caller (`close`, `Drop`) and from the
// listener (a termination signal), possibly at the same time. A single
// compare-and-swap on `closed` decides who runs it; everyone else returns
// immediately. The body then, in order:
//
//   1. closes the signal-hook handle and wakes the listener so it exits
//   2. optionally re-enters the alternate buffer (`reassert_alternate_screen`)
//   3. shows the cursor
//   4. exits the alternate buffer
//   5. restores the original termios, logging (not returning) any failure
//
// The screen is never cleared on the way out: the primary buffer comes back
// exactly as it was.
//
// Display operations check `closed` and then write, without holding a lock
// across both steps. One that loses the race against a signal-triggered
// teardown can land its bytes after the alternate-buffer exit. Termios is
// unaffected, and `set_cursor_visible` re-checks `closed` before recording
// the new value so a late hide does not overwrite teardown's "visible".
//
// # Size
//
// Width and height are packed into one `AtomicU32`, so the listener's update
// and the bounds check in `move_cursor_to` always see a consistent pair. The
// check can still be one resize behind, which moves at most one cursor
// command to a stale position.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use signal_hook::consts::{SIGINT, SIGTERM, SIGWINCH};
use signal_hook::flag;
use signal_hook::iterator::{Handle, Signals};
use tracing::{debug, info, warn};

use crate::ansi;
use crate::error::ScreenError;
use crate::terminal::{FdTerminal, Settings, Size, Terminal};

// ─── Notifications ──────────────────────────────────────────────────────────

/// An event the screen's listener reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The window size may have changed (SIGWINCH).
    Resize,
    /// The session should end (SIGINT, SIGTERM).
    Terminate,
}

/// Sending half of a screen's notification channel.
///
/// Cheap to clone. Sending after the screen has closed is harmless.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<Notification>,
}

impl Notifier {
    /// Deliver a notification. Returns `false` if the listener is gone.
    #[allow(clippy::must_use_candidate)] // Fire-and-forget is the common use.
    pub fn notify(&self, notification: Notification) -> bool {
        self.tx.send(notification).is_ok()
    }

    /// Deliver [`Notification::Resize`].
    #[allow(clippy::must_use_candidate)]
    pub fn resize(&self) -> bool {
        self.notify(Notification::Resize)
    }

    /// Deliver [`Notification::Terminate`].
    #[allow(clippy::must_use_candidate)]
    pub fn terminate(&self) -> bool {
        self.notify(Notification::Terminate)
    }
}

// ─── Options ────────────────────────────────────────────────────────────────

/// How a [`Screen`] sets the terminal up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)] // Independent on/off switches.
pub struct ScreenOptions {
    /// Clear echo and canonical mode while opening. Default: `false`
    /// (raw mode is opt-in through [`Screen::set_raw_mode`]).
    pub raw_mode: bool,

    /// Clear the alternate buffer and home the cursor right after entering
    /// it. Default: `true`.
    pub clear_on_enter: bool,

    /// Re-enter the alternate buffer before exiting it during teardown.
    /// Default: `false`.
    pub reassert_alternate_screen: bool,

    /// Listen for SIGWINCH, SIGINT and SIGTERM. Default: `true`.
    ///
    /// Signal delivery is process-wide, so at most one screen per process
    /// should enable this.
    pub os_signals: bool,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            raw_mode: false,
            clear_on_enter: true,
            reassert_alternate_screen: false,
            os_signals: true,
        }
    }
}

// ─── Shared State ───────────────────────────────────────────────────────────

/// State shared between the caller's [`Screen`] and the listener thread.
struct Shared<T: Terminal> {
    terminal: Arc<T>,
    /// `cols << 16 | rows`.
    size: AtomicU32,
    cursor_visible: AtomicBool,
    original: Settings,
    /// Shared with signal-hook's conditional-default actions.
    closed: Arc<AtomicBool>,
    reassert_alternate_screen: bool,
    signals: Mutex<Option<Handle>>,
    notifier: Notifier,
}

const fn pack(size: Size) -> u32 {
    ((size.cols as u32) << 16) | size.rows as u32
}

#[allow(clippy::cast_possible_truncation)] // Both halves were u16 on the way in.
const fn unpack(packed: u32) -> Size {
    Size {
        cols: (packed >> 16) as u16,
        rows: packed as u16,
    }
}

impl<T: Terminal> Shared<T> {
    fn size(&self) -> Size {
        unpack(self.size.load(Ordering::Acquire))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Format one or more sequences into a single buffer and write it in one
    /// call. Display output is best-effort: write errors are dropped.
    fn emit(&self, f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) {
        let mut buf = Vec::with_capacity(32);
        if f(&mut buf).is_ok() && !buf.is_empty() {
            let _ = self.terminal.write(&buf);
        }
    }

    /// Re-query the window size. A failed query keeps the last known size.
    fn refresh_size(&self) {
        match self.terminal.get_size() {
            Ok(size) => {
                self.size.store(pack(size), Ordering::Release);
                debug!(cols = size.cols, rows = size.rows, "terminal resized");
            }
            Err(e) => {
                let kept = self.size();
                warn!(
                    error = %e,
                    cols = kept.cols,
                    rows = kept.rows,
                    "resize query failed, keeping last known size"
                );
            }
        }
    }

    /// Run the teardown body if nobody has yet. Returns whether this call
    /// did the work.
    fn teardown(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        if let Some(handle) = lock(&self.signals).take() {
            handle.close();
        }
        // Wake the listener; it sees `closed` and exits.
        let _ = self.notifier.terminate();

        let reassert = self.reassert_alternate_screen;
        self.emit(|w| {
            if reassert {
                ansi::enter_alt_screen(w)?;
            }
            ansi::cursor_show(w)?;
            ansi::exit_alt_screen(w)
        });
        self.cursor_visible.store(true, Ordering::Release);

        if let Err(e) = self.terminal.set_state(&self.original) {
            warn!(error = %e, fd = self.terminal.fd(), "failed to restore terminal settings");
        }

        debug!(fd = self.terminal.fd(), "screen closed");
        true
    }

    /// The listener loop. Exits on `Terminate`, once the screen is closed, or
    /// when every sender is gone.
    fn listen(&self, rx: &Receiver<Notification>) {
        for notification in rx {
            if self.is_closed() {
                break;
            }
            match notification {
                Notification::Resize => self.refresh_size(),
                Notification::Terminate => {
                    info!("termination requested, closing screen");
                    self.teardown();
                    break;
                }
            }
        }
    }
}

/// Lock ignoring poison. The guarded data stays valid across a panic.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Screen ─────────────────────────────────────────────────────────────────

/// A full-screen terminal session with guaranteed, exactly-once teardown.
///
/// All methods take `&self`, so a screen can be shared (for example in an
/// `Arc`) between threads that may race to [`close`](Self::close) it. After
/// teardown, display operations are silent no-ops and fallible operations
/// return [`ScreenError::Closed`].
///
/// # Example
///
/// ```no_run
/// use ansie_term::screen::Screen;
///
/// let screen = Screen::stdout_default()?;
/// screen.clear();
/// screen.set_cursor_visible(false);
/// screen.move_cursor_to(screen.width() / 2, screen.height() / 2);
/// screen.write(b"hello")?;
/// // Terminal is restored when `screen` is dropped.
/// # Ok::<(), ansie_term::ScreenError>(())
/// ```
pub struct Screen<T: Terminal + 'static> {
    shared: Arc<Shared<T>>,
    /// Listener and (with `os_signals`) signal forwarder threads.
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Screen<FdTerminal> {
    /// Open a screen on standard output.
    ///
    /// # Errors
    ///
    /// See [`Screen::with_options`].
    pub fn stdout(options: ScreenOptions) -> Result<Self, ScreenError> {
        Self::with_options(Arc::new(FdTerminal::stdout()), options)
    }

    /// Open a screen on standard output with default options.
    ///
    /// # Errors
    ///
    /// See [`Screen::with_options`].
    pub fn stdout_default() -> Result<Self, ScreenError> {
        Self::stdout(ScreenOptions::default())
    }
}

impl<T: Terminal + 'static> Screen<T> {
    /// Open a screen on `terminal` with default options.
    ///
    /// # Errors
    ///
    /// See [`Screen::with_options`].
    pub fn new(terminal: Arc<T>) -> Result<Self, ScreenError> {
        Self::with_options(terminal, ScreenOptions::default())
    }

    /// Open a screen on `terminal`.
    ///
    /// Nothing is written unless `terminal` is a TTY whose settings can be
    /// read. Any failure after the alternate buffer has been entered
    /// releases everything acquired so far before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`ScreenError::NotATerminal`] if `terminal` is not a TTY.
    /// - [`ScreenError::State`] if termios cannot be read, or `raw_mode`
    ///   cannot be applied.
    /// - [`ScreenError::Size`] if the initial size query fails.
    /// - [`ScreenError::Signals`] if signal registration or the listener
    ///   thread cannot be set up.
    pub fn with_options(terminal: Arc<T>, options: ScreenOptions) -> Result<Self, ScreenError> {
        if !terminal.is_terminal() {
            return Err(ScreenError::NotATerminal { fd: terminal.fd() });
        }
        let original = terminal.get_state().map_err(ScreenError::State)?;

        let (tx, rx) = mpsc::channel();
        let screen = Self {
            shared: Arc::new(Shared {
                terminal,
                size: AtomicU32::new(0),
                cursor_visible: AtomicBool::new(true),
                original,
                closed: Arc::new(AtomicBool::new(false)),
                reassert_alternate_screen: options.reassert_alternate_screen,
                signals: Mutex::new(None),
                notifier: Notifier { tx },
            }),
            threads: Mutex::new(Vec::new()),
        };

        // From here on, an early return drops `screen`, and Drop tears down.
        screen.shared.emit(|w| {
            ansi::enter_alt_screen(w)?;
            if options.clear_on_enter {
                ansi::clear_screen(w)?;
                ansi::cursor_home(w)?;
            }
            Ok(())
        });

        let size = screen.shared.terminal.get_size().map_err(ScreenError::Size)?;
        screen.shared.size.store(pack(size), Ordering::Release);

        if options.raw_mode {
            screen.set_raw_mode(true)?;
        }
        if options.os_signals {
            screen.forward_os_signals()?;
        }
        screen.spawn_listener(rx)?;

        debug!(
            fd = screen.shared.terminal.fd(),
            cols = size.cols,
            rows = size.rows,
            "screen opened"
        );
        Ok(screen)
    }

    /// Register process-wide signal delivery and forward it to the channel.
    fn forward_os_signals(&self) -> Result<(), ScreenError> {
        for signal in [SIGINT, SIGTERM] {
            flag::register_conditional_default(signal, Arc::clone(&self.shared.closed))
                .map_err(ScreenError::Signals)?;
        }
        let mut signals =
            Signals::new([SIGWINCH, SIGINT, SIGTERM]).map_err(ScreenError::Signals)?;
        *lock(&self.shared.signals) = Some(signals.handle());

        let notifier = self.shared.notifier.clone();
        let handle = thread::Builder::new()
            .name("ansie-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    let notification = if signal == SIGWINCH {
                        Notification::Resize
                    } else {
                        Notification::Terminate
                    };
                    if !notifier.notify(notification) {
                        break;
                    }
                }
            })
            .map_err(ScreenError::Signals)?;

        lock(&self.threads).push(handle);
        Ok(())
    }

    fn spawn_listener(&self, rx: Receiver<Notification>) -> Result<(), ScreenError> {
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("ansie-screen".into())
            .spawn(move || shared.listen(&rx))
            .map_err(ScreenError::Signals)?;

        lock(&self.threads).push(handle);
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Last known terminal size.
    #[inline]
    #[must_use]
    pub fn size(&self) -> Size {
        self.shared.size()
    }

    /// Last known width in columns.
    #[inline]
    #[must_use]
    pub fn width(&self) -> u16 {
        self.size().cols
    }

    /// Last known height in rows.
    #[inline]
    #[must_use]
    pub fn height(&self) -> u16 {
        self.size().rows
    }

    /// Whether the last visibility command showed the cursor.
    #[inline]
    #[must_use]
    pub fn is_cursor_visible(&self) -> bool {
        self.shared.cursor_visible.load(Ordering::Acquire)
    }

    /// Whether teardown has run.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// A handle for injecting notifications into this screen's listener.
    #[must_use]
    pub fn notifier(&self) -> Notifier {
        self.shared.notifier.clone()
    }

    // ── Display ─────────────────────────────────────────────────────

    /// Show or hide the cursor.
    pub fn set_cursor_visible(&self, visible: bool) {
        if self.is_closed() {
            return;
        }
        self.shared.emit(|w| {
            if visible {
                ansi::cursor_show(w)
            } else {
                ansi::cursor_hide(w)
            }
        });
        if !self.is_closed() {
            self.shared.cursor_visible.store(visible, Ordering::Release);
        }
    }

    /// Move the cursor to column `x`, row `y`, both 1-based.
    ///
    /// Positions outside `1..=width` × `1..=height` are ignored: nothing is
    /// written and nothing is clamped.
    pub fn move_cursor_to(&self, x: u16, y: u16) {
        if self.is_closed() || !self.size().contains(x, y) {
            return;
        }
        self.shared.emit(|w| ansi::cursor_to(w, x, y));
    }

    /// Clear the screen and move the cursor home.
    pub fn clear(&self) {
        if self.is_closed() {
            return;
        }
        self.shared.emit(|w| {
            ansi::clear_screen(w)?;
            ansi::cursor_home(w)
        });
    }

    /// Write caller-formatted bytes (text, styling) straight through.
    ///
    /// # Errors
    ///
    /// [`ScreenError::Closed`] after teardown, or [`ScreenError::Io`] if
    /// the terminal write fails.
    pub fn write(&self, bytes: &[u8]) -> Result<usize, ScreenError> {
        if self.is_closed() {
            return Err(ScreenError::Closed);
        }
        Ok(self.shared.terminal.write(bytes)?)
    }

    // ── Input Mode ──────────────────────────────────────────────────

    /// Enter (`true`) or leave (`false`) raw input mode.
    ///
    /// Always derived from the settings captured at open time, with only
    /// echo and canonical mode changed. Failures are returned and leave the
    /// screen usable.
    ///
    /// # Errors
    ///
    /// [`ScreenError::State`] if the settings cannot be applied, or
    /// [`ScreenError::Closed`] after teardown.
    pub fn set_raw_mode(&self, enabled: bool) -> Result<(), ScreenError> {
        if self.is_closed() {
            return Err(ScreenError::Closed);
        }
        let settings = self.shared.original.with_raw_input(enabled);
        self.shared
            .terminal
            .set_state(&settings)
            .map_err(ScreenError::State)
    }

    // ── Teardown ────────────────────────────────────────────────────

    /// Restore the terminal and stop the listener.
    ///
    /// Only the first call (from any thread, or from a termination signal)
    /// has an effect. Waits for the background threads to finish.
    pub fn close(&self) {
        if self.shared.teardown() {
            debug!("screen closed by caller");
        }

        let threads = std::mem::take(&mut *lock(&self.threads));
        let current = thread::current().id();
        for handle in threads {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}

impl<T: Terminal + 'static> Drop for Screen<T> {
    fn drop(&mut self) {
        self.close();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeTerminal;
    use pretty_assertions::assert_eq;
    use std::os::unix::io::RawFd;
    use std::time::{Duration, Instant};

    const ENTER: &str = "\x1b[?1049h";
    const EXIT: &str = "\x1b[?1049l";
    const HIDE: &str = "\x1b[?25l";
    const SHOW: &str = "\x1b[?25h";
    const CLEAR: &str = "\x1b[2J";

    fn quiet() -> ScreenOptions {
        ScreenOptions {
            os_signals: false,
            ..ScreenOptions::default()
        }
    }

    fn open(cols: u16, rows: u16) -> (Arc<FakeTerminal>, Screen<FakeTerminal>) {
        let term = Arc::new(FakeTerminal::new(cols, rows));
        let screen = Screen::with_options(Arc::clone(&term), quiet()).unwrap();
        (term, screen)
    }

    /// Poll until `cond` holds, or fail after two seconds.
    fn wait_for(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Terminal double whose individual operations can be made to fail.
    struct Scripted {
        tty: bool,
        state_readable: bool,
        state_writable: bool,
        output: Mutex<Vec<u8>>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                tty: true,
                state_readable: true,
                state_writable: true,
                output: Mutex::new(Vec::new()),
            }
        }

        fn output(&self) -> Vec<u8> {
            self.output.lock().unwrap().clone()
        }
    }

    impl Terminal for Scripted {
        fn fd(&self) -> RawFd {
            42
        }

        fn write(&self, bytes: &[u8]) -> io::Result<usize> {
            self.output.lock().unwrap().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn is_terminal(&self) -> bool {
            self.tty
        }

        fn get_state(&self) -> io::Result<Settings> {
            if self.state_readable {
                Ok(Settings::cooked())
            } else {
                Err(io::Error::from_raw_os_error(libc::ENOTTY))
            }
        }

        fn set_state(&self, _settings: &Settings) -> io::Result<()> {
            if self.state_writable {
                Ok(())
            } else {
                Err(io::Error::from_raw_os_error(libc::EIO))
            }
        }

        fn get_size(&self) -> io::Result<Size> {
            Ok(Size::new(80, 24))
        }
    }

    // ── Size packing ────────────────────────────────────────────────

    #[test]
    fn pack_unpack_keeps_both_halves() {
        for size in [Size::new(0, 0), Size::new(80, 24), Size::new(u16::MAX, 1)] {
            assert_eq!(unpack(pack(size)), size);
        }
    }

    // ── Options ─────────────────────────────────────────────────────

    #[test]
    fn default_options() {
        let o = ScreenOptions::default();
        assert!(!o.raw_mode);
        assert!(o.clear_on_enter);
        assert!(!o.reassert_alternate_screen);
        assert!(o.os_signals);
    }

    // ── Construction ────────────────────────────────────────────────

    #[test]
    fn open_reads_initial_size() {
        let (_term, screen) = open(80, 24);
        assert_eq!(screen.width(), 80);
        assert_eq!(screen.height(), 24);
        assert_eq!(screen.size(), Size::new(80, 24));
        assert!(screen.is_cursor_visible());
        assert!(!screen.is_closed());
    }

    #[test]
    fn open_enters_alternate_buffer_first_and_once() {
        let (term, _screen) = open(80, 24);
        let out = term.output_string();
        assert!(out.starts_with(ENTER), "{out:?}");
        assert_eq!(out.matches(ENTER).count(), 1);
        assert_eq!(out, "\x1b[?1049h\x1b[2J\x1b[H");
    }

    #[test]
    fn open_without_clear_only_enters() {
        let term = Arc::new(FakeTerminal::new(80, 24));
        let options = ScreenOptions {
            clear_on_enter: false,
            ..quiet()
        };
        let _screen = Screen::with_options(Arc::clone(&term), options).unwrap();
        assert_eq!(term.output_string(), ENTER);
    }

    #[test]
    fn open_leaves_settings_cooked() {
        let (term, _screen) = open(80, 24);
        assert!(term.state().echo());
        assert!(term.state().canonical());
    }

    #[test]
    fn open_rejects_non_terminal_without_writing() {
        let term = Arc::new(Scripted {
            tty: false,
            ..Scripted::new()
        });
        let err = Screen::with_options(Arc::clone(&term), quiet()).err().unwrap();
        assert!(matches!(err, ScreenError::NotATerminal { fd: 42 }));
        assert!(term.output().is_empty());
    }

    #[test]
    fn open_fails_with_state_error_before_writing() {
        let term = Arc::new(Scripted {
            state_readable: false,
            ..Scripted::new()
        });
        let err = Screen::with_options(Arc::clone(&term), quiet()).err().unwrap();
        assert!(matches!(err, ScreenError::State(_)));
        assert!(term.output().is_empty());
    }

    #[test]
    fn failed_size_query_rolls_back() {
        let term = Arc::new(FakeTerminal::new(80, 24));
        term.fail_size_queries(true);
        let err = Screen::with_options(Arc::clone(&term), quiet()).err().unwrap();
        assert!(matches!(err, ScreenError::Size(_)));

        let out = term.output_string();
        assert!(out.starts_with(ENTER));
        assert!(out.ends_with(EXIT));
        assert_eq!(out.matches(EXIT).count(), 1);
        assert!(term.state().echo());
    }

    #[test]
    fn raw_mode_option_applies_on_open() {
        let term = Arc::new(FakeTerminal::new(80, 24));
        let options = ScreenOptions {
            raw_mode: true,
            ..quiet()
        };
        let screen = Screen::with_options(Arc::clone(&term), options).unwrap();
        assert!(!term.state().echo());
        assert!(!term.state().canonical());

        screen.close();
        assert!(term.state().echo());
        assert!(term.state().canonical());
    }

    #[test]
    fn raw_mode_option_failure_rolls_back() {
        let term = Arc::new(Scripted {
            state_writable: false,
            ..Scripted::new()
        });
        let options = ScreenOptions {
            raw_mode: true,
            ..quiet()
        };
        let err = Screen::with_options(Arc::clone(&term), options).err().unwrap();
        assert!(matches!(err, ScreenError::State(_)));
        let out = String::from_utf8(term.output()).unwrap();
        assert!(out.ends_with(EXIT));
    }

    // ── Cursor ──────────────────────────────────────────────────────

    #[test]
    fn cursor_visibility_sequences_in_order() {
        let (term, screen) = open(80, 24);
        term.reset_output();

        screen.set_cursor_visible(false);
        assert!(!screen.is_cursor_visible());
        screen.set_cursor_visible(true);
        assert!(screen.is_cursor_visible());

        assert_eq!(term.output_string(), format!("{HIDE}{SHOW}"));
    }

    #[test]
    fn move_cursor_inside_bounds() {
        let (term, screen) = open(80, 24);
        term.reset_output();

        screen.move_cursor_to(10, 5);
        assert_eq!(term.output_string(), "\x1b[5;10H");

        term.reset_output();
        screen.move_cursor_to(80, 24);
        assert_eq!(term.output_string(), "\x1b[24;80H");

        term.reset_output();
        screen.move_cursor_to(1, 1);
        assert_eq!(term.output_string(), "\x1b[1;1H");
    }

    #[test]
    fn move_cursor_outside_bounds_is_silent() {
        let (term, screen) = open(80, 24);
        term.reset_output();

        screen.move_cursor_to(0, 5);
        screen.move_cursor_to(5, 0);
        screen.move_cursor_to(81, 5);
        screen.move_cursor_to(20, 25);
        screen.move_cursor_to(u16::MAX, u16::MAX);

        assert!(term.output().is_empty());
    }

    #[test]
    fn move_cursor_covers_every_cell_of_a_small_screen() {
        let (term, screen) = open(6, 3);
        for y in 0..=4u16 {
            for x in 0..=7u16 {
                term.reset_output();
                screen.move_cursor_to(x, y);
                let expected = if (1..=6).contains(&x) && (1..=3).contains(&y) {
                    format!("\x1b[{y};{x}H")
                } else {
                    String::new()
                };
                assert_eq!(term.output_string(), expected, "({x}, {y})");
            }
        }
    }

    // ── Clear / write ───────────────────────────────────────────────

    #[test]
    fn clear_then_home() {
        let (term, screen) = open(80, 24);
        term.reset_output();
        screen.clear();
        assert_eq!(term.output_string(), "\x1b[2J\x1b[H");
    }

    #[test]
    fn write_passes_bytes_through() {
        let (term, screen) = open(80, 24);
        term.reset_output();
        assert_eq!(screen.write(b"hello").unwrap(), 5);
        assert_eq!(term.output_string(), "hello");
    }

    // ── Raw mode ────────────────────────────────────────────────────

    #[test]
    fn set_raw_mode_toggles_echo_and_canonical() {
        let (term, screen) = open(80, 24);

        screen.set_raw_mode(true).unwrap();
        assert!(!term.state().echo());
        assert!(!term.state().canonical());

        screen.set_raw_mode(false).unwrap();
        assert!(term.state().echo());
        assert!(term.state().canonical());
    }

    #[test]
    fn set_raw_mode_failure_is_returned_and_screen_stays_usable() {
        let term = Arc::new(Scripted {
            state_writable: false,
            ..Scripted::new()
        });
        let screen = Screen::with_options(Arc::clone(&term), quiet()).unwrap();

        let err = screen.set_raw_mode(true).unwrap_err();
        assert!(matches!(err, ScreenError::State(_)));
        assert!(!screen.is_closed());

        screen.move_cursor_to(2, 2);
        let out = String::from_utf8(term.output()).unwrap();
        assert!(out.ends_with("\x1b[2;2H"));
    }

    // ── Teardown ────────────────────────────────────────────────────

    #[test]
    fn close_shows_cursor_and_exits_without_clearing() {
        let (term, screen) = open(80, 24);
        screen.set_cursor_visible(false);
        term.reset_output();

        screen.close();

        let out = term.output_string();
        assert_eq!(out, format!("{SHOW}{EXIT}"));
        assert!(!out.contains(CLEAR));
        assert!(screen.is_cursor_visible());
        assert!(screen.is_closed());
    }

    #[test]
    fn close_with_reassert_reenters_before_exit() {
        let term = Arc::new(FakeTerminal::new(80, 24));
        let options = ScreenOptions {
            reassert_alternate_screen: true,
            ..quiet()
        };
        let screen = Screen::with_options(Arc::clone(&term), options).unwrap();
        term.reset_output();

        screen.close();
        assert_eq!(term.output_string(), format!("{ENTER}{SHOW}{EXIT}"));
    }

    #[test]
    fn close_restores_original_settings() {
        let (term, screen) = open(80, 24);
        screen.set_raw_mode(true).unwrap();
        screen.close();
        assert!(term.state().echo());
        assert!(term.state().canonical());
    }

    #[test]
    fn close_swallows_restore_failure() {
        let term = Arc::new(Scripted {
            state_writable: false,
            ..Scripted::new()
        });
        let screen = Screen::with_options(Arc::clone(&term), quiet()).unwrap();
        screen.close();
        assert!(screen.is_closed());
        let out = String::from_utf8(term.output()).unwrap();
        assert!(out.ends_with(EXIT));
    }

    #[test]
    fn close_twice_tears_down_once() {
        let (term, screen) = open(80, 24);
        term.reset_output();

        screen.close();
        let first = term.output_string();
        screen.close();

        assert_eq!(term.output_string(), first);
        assert_eq!(first.matches(EXIT).count(), 1);
    }

    #[test]
    fn concurrent_close_tears_down_once() {
        let term = Arc::new(FakeTerminal::new(80, 24));
        let screen = Arc::new(Screen::with_options(Arc::clone(&term), quiet()).unwrap());
        term.reset_output();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let screen = Arc::clone(&screen);
                thread::spawn(move || screen.close())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let out = term.output_string();
        assert_eq!(out.matches(EXIT).count(), 1);
        assert_eq!(out.matches(SHOW).count(), 1);
    }

    #[test]
    fn drop_tears_down() {
        let term = Arc::new(FakeTerminal::new(80, 24));
        {
            let _screen = Screen::with_options(Arc::clone(&term), quiet()).unwrap();
            term.reset_output();
        }
        assert_eq!(term.output_string(), format!("{SHOW}{EXIT}"));
    }

    #[test]
    fn operations_after_close_are_inert() {
        let (term, screen) = open(80, 24);
        screen.close();
        term.reset_output();

        screen.move_cursor_to(1, 1);
        screen.clear();
        screen.set_cursor_visible(false);

        assert!(term.output().is_empty());
        assert!(screen.is_cursor_visible());
        assert!(matches!(screen.write(b"x"), Err(ScreenError::Closed)));
        assert!(matches!(screen.set_raw_mode(true), Err(ScreenError::Closed)));
    }

    // ── Listener ────────────────────────────────────────────────────

    #[test]
    fn resize_notification_updates_size() {
        let (term, screen) = open(80, 24);
        term.set_size(100, 30, Some(&screen.notifier()));

        wait_for("resize", || screen.size() == Size::new(100, 30));
        assert_eq!(screen.width(), 100);
        assert_eq!(screen.height(), 30);
    }

    #[test]
    fn resize_widens_cursor_bounds() {
        let (term, screen) = open(80, 24);
        term.set_size(100, 30, Some(&screen.notifier()));
        wait_for("resize", || screen.width() == 100);

        term.reset_output();
        screen.move_cursor_to(100, 30);
        assert_eq!(term.output_string(), "\x1b[30;100H");
    }

    #[test]
    fn failed_resize_keeps_size_and_listener() {
        let (term, screen) = open(80, 24);
        let notifier = screen.notifier();

        term.fail_size_queries(true);
        term.set_size(120, 40, Some(&notifier));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(screen.size(), Size::new(80, 24));
        assert!(!screen.is_closed());

        term.fail_size_queries(false);
        assert!(notifier.resize());
        wait_for("resize after recovery", || screen.size() == Size::new(120, 40));
    }

    #[test]
    fn terminate_notification_closes_screen() {
        let (term, screen) = open(80, 24);
        screen.set_cursor_visible(false);
        term.reset_output();

        assert!(screen.notifier().terminate());
        wait_for("teardown", || screen.is_closed());
        wait_for("teardown output", || term.output_string().ends_with(EXIT));

        assert_eq!(term.output_string(), format!("{SHOW}{EXIT}"));

        // Explicit close afterwards is a no-op that joins the listener.
        screen.close();
        assert_eq!(term.output_string().matches(EXIT).count(), 1);
    }

    #[test]
    fn close_racing_terminate_tears_down_once() {
        let (term, screen) = open(80, 24);
        term.reset_output();

        let _ = screen.notifier().terminate();
        screen.close();

        assert_eq!(term.output_string().matches(EXIT).count(), 1);
    }

    #[test]
    fn notifier_after_close_reports_listener_gone() {
        let (_term, screen) = open(80, 24);
        let notifier = screen.notifier();
        screen.close();
        assert!(!notifier.resize());
    }
}
