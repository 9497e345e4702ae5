// SPDX-License-Identifier: MIT
//
// ansie-term — full-screen terminal sessions over plain ANSI escape codes.
//
// A `Screen` owns one terminal session: it saves the termios, switches to
// the alternate buffer, tracks the window size through SIGWINCH, and puts
// everything back exactly once, whether the session ends by `close`, by
// drop, or by SIGINT / SIGTERM. Every command is a direct, unbuffered write
// of control bytes; there is no frame buffer and no diffing.
//
// The OS is reached only through the `Terminal` trait, so the whole
// lifecycle runs against `FakeTerminal` in tests.
#![cfg(unix)]

pub mod ansi;
pub mod error;
pub mod fake;
pub mod screen;
pub mod terminal;

pub use error::ScreenError;
pub use screen::{Notification, Notifier, Screen, ScreenOptions};
pub use terminal::{FdTerminal, Settings, Size, Terminal};
