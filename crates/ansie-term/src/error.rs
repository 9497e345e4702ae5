// SPDX-License-Identifier: MIT
//
// Screen session errors.
//
// Construction is all-or-nothing: every variant except `Closed` is returned
// from `Screen::with_options` after whatever was acquired has been released.

use std::io;

/// Errors produced while opening or driving a [`Screen`](crate::screen::Screen).
#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    /// The handle is a pipe, a file, or anything else that is not a TTY.
    #[error("file descriptor {fd} is not a valid terminal")]
    NotATerminal {
        /// The offending file descriptor.
        fd: i32,
    },

    /// Reading or applying the terminal settings (termios) failed.
    #[error("cannot access terminal state")]
    State(#[source] io::Error),

    /// The initial window size query failed.
    #[error("cannot get window size")]
    Size(#[source] io::Error),

    /// Signal registration or the listener thread could not be set up.
    #[error("cannot set up signal listener")]
    Signals(#[source] io::Error),

    /// A raw write through the screen failed.
    #[error("terminal write failed")]
    Io(#[from] io::Error),

    /// The screen has already been torn down.
    #[error("screen is closed")]
    Closed,
}

impl ScreenError {
    /// Whether this error came from construction on a non-terminal handle.
    ///
    /// Callers use this to fall back to plain, line-oriented output.
    #[must_use]
    pub const fn is_not_a_terminal(&self) -> bool {
        matches!(self, Self::NotATerminal { .. })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
