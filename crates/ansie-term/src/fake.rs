// SPDX-License-Identifier: MIT
//
// In-memory terminal for tests.
//
// Records every byte written, holds a settable window size and a termios
// snapshot, and always claims to be a TTY. A resize is simulated by changing
// the size and then pushing `Notification::Resize` through a `Notifier`,
// which is exactly what the SIGWINCH forwarder does for a real terminal.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::screen::Notifier;
use crate::terminal::{Settings, Size, Terminal};

/// Descriptor number reported by a fake terminal.
const FAKE_FD: RawFd = 1;

/// [`Terminal`] that lives entirely in memory.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ansie_term::fake::FakeTerminal;
/// use ansie_term::screen::{Screen, ScreenOptions};
///
/// let term = Arc::new(FakeTerminal::new(80, 24));
/// let screen = Screen::with_options(
///     Arc::clone(&term),
///     ScreenOptions { os_signals: false, ..ScreenOptions::default() },
/// )?;
/// screen.move_cursor_to(10, 5);
/// assert!(term.output_string().ends_with("\x1b[5;10H"));
/// # Ok::<(), ansie_term::ScreenError>(())
/// ```
#[derive(Debug)]
pub struct FakeTerminal {
    size: Mutex<Size>,
    state: Mutex<Settings>,
    output: Mutex<Vec<u8>>,
    fail_size: AtomicBool,
}

impl FakeTerminal {
    /// A cooked-mode terminal of `cols × rows` cells with empty output.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            size: Mutex::new(Size { cols, rows }),
            state: Mutex::new(Settings::cooked()),
            output: Mutex::new(Vec::new()),
            fail_size: AtomicBool::new(false),
        }
    }

    /// Everything written so far.
    #[must_use]
    pub fn output(&self) -> Vec<u8> {
        lock(&self.output).clone()
    }

    /// Everything written so far, decoded lossily as UTF-8.
    #[must_use]
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&lock(&self.output)).into_owned()
    }

    /// Forget recorded output.
    pub fn reset_output(&self) {
        lock(&self.output).clear();
    }

    /// The settings most recently applied with [`Terminal::set_state`].
    #[must_use]
    pub fn state(&self) -> Settings {
        *lock(&self.state)
    }

    /// Change the window size, then notify the screen if a notifier is given.
    pub fn set_size(&self, cols: u16, rows: u16, notifier: Option<&Notifier>) {
        *lock(&self.size) = Size { cols, rows };
        if let Some(notifier) = notifier {
            notifier.resize();
        }
    }

    /// Make subsequent size queries fail (or succeed again).
    pub fn fail_size_queries(&self, fail: bool) {
        self.fail_size.store(fail, Ordering::SeqCst);
    }
}

impl Terminal for FakeTerminal {
    fn fd(&self) -> RawFd {
        FAKE_FD
    }

    fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        lock(&self.output).extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn is_terminal(&self) -> bool {
        true
    }

    fn get_state(&self) -> io::Result<Settings> {
        Ok(*lock(&self.state))
    }

    fn set_state(&self, settings: &Settings) -> io::Result<()> {
        *lock(&self.state) = *settings;
        Ok(())
    }

    fn get_size(&self) -> io::Result<Size> {
        if self.fail_size.load(Ordering::SeqCst) {
            return Err(io::Error::from_raw_os_error(libc::ENOTTY));
        }
        Ok(*lock(&self.size))
    }
}

/// Lock ignoring poison: a panicking test thread must not hide the output.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
