// SPDX-License-Identifier: MIT
//
// ANSI escape sequences: the screen session's control sequences plus SGR
// text attributes and 16-colour foreground/background.
//
// Pure functions over any `impl Write`. They know the byte encoding of each
// control sequence and nothing else: no state, no bounds checks, no opinion
// on when a sequence should be sent. `Screen` makes those decisions for the
// session sequences; callers format text by writing into a buffer and
// handing it to `Screen::write`.
//
// Cursor coordinates here are 1-based, exactly as the terminal sees them.

use std::io::{self, Write};

/// Control Sequence Introducer: `ESC [`.
pub const CSI: &[u8] = b"\x1b[";

// ─── Alternate Screen ───────────────────────────────────────────────────────

/// Enter the alternate screen buffer (DEC Private Mode 1049).
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

/// Exit the alternate screen buffer, restoring the primary screen content.
#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

// ─── Cursor ─────────────────────────────────────────────────────────────────

/// Move the cursor to column `x`, row `y` (CUP). Both are 1-based.
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{y};{x}H")
}

/// Move the cursor to the top-left cell (CUP with no parameters).
#[inline]
pub fn cursor_home(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[H")
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ─────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2). The cursor does not move.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

// ─── Escape ─────────────────────────────────────────────────────────────────

/// Write `CSI p1;p2;...<command>`. With no parameters this is `CSI <command>`.
pub fn escape(w: &mut impl Write, command: char, params: &[u16]) -> io::Result<()> {
    w.write_all(CSI)?;
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            w.write_all(b";")?;
        }
        write!(w, "{p}")?;
    }
    write!(w, "{command}")
}

/// Select Graphic Rendition with raw codes: `CSI codes m`.
#[inline]
pub fn sgr(w: &mut impl Write, codes: &[u16]) -> io::Result<()> {
    escape(w, 'm', codes)
}

/// Reset all SGR attributes and colours to terminal defaults (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── Text Attributes ────────────────────────────────────────────────────────

/// One SGR text attribute. The discriminant is the SGR code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Attr {
    Reset = 0,
    Bold = 1,
    Faint = 2,
    Italic = 3,
    Underline = 4,
    SlowBlink = 5,
    RapidBlink = 6,
    Reverse = 7,
    Conceal = 8,
    CrossOut = 9,
    /// Double underline on most terminals; a few treat it as bold off.
    NoBold = 21,
    /// Neither bold nor faint.
    Normal = 22,
    NoItalic = 23,
    NoUnderline = 24,
    NoBlink = 25,
    NoReverse = 27,
    NoConceal = 28,
    NoCrossOut = 29,
}

impl Attr {
    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }
}

/// Set one text attribute.
#[inline]
pub fn attr(w: &mut impl Write, attr: Attr) -> io::Result<()> {
    write!(w, "\x1b[{}m", attr.code())
}

/// Set several attributes in a single sequence: `\x1b[1;4m` for bold and
/// underline. Does nothing for an empty slice.
pub fn attrs(w: &mut impl Write, attrs: &[Attr]) -> io::Result<()> {
    if attrs.is_empty() {
        return Ok(());
    }
    w.write_all(CSI)?;
    for (i, a) in attrs.iter().enumerate() {
        if i > 0 {
            w.write_all(b";")?;
        }
        write!(w, "{}", a.code())?;
    }
    w.write_all(b"m")
}

// ─── Colour ─────────────────────────────────────────────────────────────────

/// The eight base colours of the 16-colour palette. The bright variants are
/// selected by [`fg_bright`] and [`bg_bright`] rather than by extra values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Colour {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
}

impl Colour {
    #[inline]
    const fn offset(self) -> u16 {
        self as u16
    }
}

/// Set the foreground colour (SGR 30–37).
#[inline]
pub fn fg(w: &mut impl Write, colour: Colour) -> io::Result<()> {
    write!(w, "\x1b[{}m", 30 + colour.offset())
}

/// Set the background colour (SGR 40–47).
#[inline]
pub fn bg(w: &mut impl Write, colour: Colour) -> io::Result<()> {
    write!(w, "\x1b[{}m", 40 + colour.offset())
}

/// Set the bright foreground colour (SGR 90–97).
#[inline]
pub fn fg_bright(w: &mut impl Write, colour: Colour) -> io::Result<()> {
    write!(w, "\x1b[{}m", 90 + colour.offset())
}

/// Set the bright background colour (SGR 100–107).
#[inline]
pub fn bg_bright(w: &mut impl Write, colour: Colour) -> io::Result<()> {
    write!(w, "\x1b[{}m", 100 + colour.offset())
}

/// Back to the terminal's default foreground (SGR 39).
#[inline]
pub fn fg_default(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[39m")
}

/// Back to the terminal's default background (SGR 49).
#[inline]
pub fn bg_default(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[49m")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
