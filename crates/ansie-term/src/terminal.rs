// SPDX-License-Identifier: MIT
//
// Terminal capability — the seam between `Screen` and the operating system.
//
// Safety: `FdTerminal` necessarily uses `unsafe` for isatty, tcgetattr,
// tcsetattr, ioctl(TIOCGWINSZ) and raw fd writes. These are the standard
// POSIX interfaces for terminal control. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// `Screen` never touches a file descriptor itself. Everything it needs from
// the OS goes through the `Terminal` trait, which has two implementations:
// `FdTerminal` here, and `FakeTerminal` in `crate::fake` for tests.
//
// Termios request codes differ between BSD-family systems (TIOCGETA /
// TIOCSETA) and Linux (TCGETS / TCSETS). `tcgetattr` and `tcsetattr` from
// libc already pick the right one for the compilation target.

use std::fmt;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Size {
    /// Build a size from columns and rows.
    #[inline]
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Whether the 1-based cell `(x, y)` lies inside this size.
    #[inline]
    #[must_use]
    pub const fn contains(self, x: u16, y: u16) -> bool {
        x >= 1 && y >= 1 && x <= self.cols && y <= self.rows
    }
}

// ─── Settings ───────────────────────────────────────────────────────────────

/// Opaque snapshot of the terminal line discipline (termios).
///
/// Obtained from [`Terminal::get_state`] and handed back verbatim to
/// [`Terminal::set_state`]. The only edit this crate ever makes is toggling
/// echo and canonical mode through [`with_raw_input`](Self::with_raw_input).
#[derive(Clone, Copy)]
pub struct Settings {
    termios: libc::termios,
}

impl Settings {
    /// Wrap a raw termios structure.
    #[inline]
    #[must_use]
    pub const fn from_termios(termios: libc::termios) -> Self {
        Self { termios }
    }

    /// The underlying termios structure.
    #[inline]
    #[must_use]
    pub const fn as_termios(&self) -> &libc::termios {
        &self.termios
    }

    /// A zeroed snapshot with only `ECHO` and `ICANON` set.
    ///
    /// This is what a freshly opened interactive terminal looks like as far
    /// as this crate is concerned. Used by [`FakeTerminal`](crate::fake::FakeTerminal).
    #[must_use]
    pub fn cooked() -> Self {
        // SAFETY: termios is a plain C struct of integers and arrays.
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        termios.c_lflag = libc::ECHO | libc::ICANON;
        Self { termios }
    }

    /// Local mode flags (`c_lflag`).
    #[inline]
    #[must_use]
    pub const fn local_flags(&self) -> libc::tcflag_t {
        self.termios.c_lflag
    }

    /// Whether input characters are echoed.
    #[inline]
    #[must_use]
    pub const fn echo(&self) -> bool {
        self.termios.c_lflag & libc::ECHO != 0
    }

    /// Whether input is line-buffered (canonical mode).
    #[inline]
    #[must_use]
    pub const fn canonical(&self) -> bool {
        self.termios.c_lflag & libc::ICANON != 0
    }

    /// Copy of this snapshot with echo and canonical mode cleared (`raw`)
    /// or set (`!raw`). Every other field is left untouched.
    #[must_use]
    pub const fn with_raw_input(mut self, raw: bool) -> Self {
        if raw {
            self.termios.c_lflag &= !(libc::ECHO | libc::ICANON);
        } else {
            self.termios.c_lflag |= libc::ECHO | libc::ICANON;
        }
        self
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("echo", &self.echo())
            .field("canonical", &self.canonical())
            .finish_non_exhaustive()
    }
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// Byte-oriented access to one terminal endpoint.
///
/// Every method takes `&self`: the handle is shared between the caller and
/// the screen's background listener, and individual calls are serialized by
/// the OS (or by the fake's internal locks).
pub trait Terminal: Send + Sync {
    /// The file descriptor this terminal talks to. Used for diagnostics.
    fn fd(&self) -> RawFd;

    /// Write raw bytes. Partial writes are reported, not retried.
    ///
    /// # Errors
    ///
    /// Returns the OS error from the underlying write.
    fn write(&self, bytes: &[u8]) -> io::Result<usize>;

    /// Whether the handle is an interactive terminal device.
    fn is_terminal(&self) -> bool;

    /// Read the current line discipline settings.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the settings cannot be read.
    fn get_state(&self) -> io::Result<Settings>;

    /// Apply previously obtained (or modified) settings.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the settings cannot be applied.
    fn set_state(&self, settings: &Settings) -> io::Result<()>;

    /// Query the window size in character cells.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the size cannot be determined.
    fn get_size(&self) -> io::Result<Size>;
}

// ─── FdTerminal ─────────────────────────────────────────────────────────────

/// [`Terminal`] backed by a raw file descriptor.
///
/// The descriptor is borrowed, not owned: dropping an `FdTerminal` never
/// closes it. The caller keeps the descriptor open for as long as the
/// terminal (and any `Screen` built on it) is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdTerminal {
    fd: RawFd,
}

impl FdTerminal {
    /// Borrow the descriptor of any open file-like handle.
    #[must_use]
    pub fn new(handle: &impl AsRawFd) -> Self {
        Self {
            fd: handle.as_raw_fd(),
        }
    }

    /// Wrap a raw descriptor number.
    #[must_use]
    pub const fn from_raw_fd(fd: RawFd) -> Self {
        Self { fd }
    }

    /// Standard output (fd 1).
    #[must_use]
    pub const fn stdout() -> Self {
        Self {
            fd: libc::STDOUT_FILENO,
        }
    }
}

impl Terminal for FdTerminal {
    fn fd(&self) -> RawFd {
        self.fd
    }

    fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        let n = unsafe { libc::write(self.fd, bytes.as_ptr().cast::<libc::c_void>(), bytes.len()) };
        usize::try_from(n).map_err(|_| io::Error::last_os_error())
    }

    fn is_terminal(&self) -> bool {
        unsafe { libc::isatty(self.fd) != 0 }
    }

    fn get_state(&self) -> io::Result<Settings> {
        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(self.fd, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Settings::from_termios(termios))
        }
    }

    fn set_state(&self, settings: &Settings) -> io::Result<()> {
        let rc = unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, settings.as_termios()) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn get_size(&self) -> io::Result<Size> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::ioctl(self.fd, libc::TIOCGWINSZ, &mut ws) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
