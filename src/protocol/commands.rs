//! # ESC/POS Protocol Commands
//!
//! Initialization, paper feed and cutter commands for ESC/POS thermal
//! receipt printers (the generic 58mm/80mm BLE and USB printers sold for
//! point-of-sale use).
//!
//! ## Escape Sequence Structure
//!
//! Commands are short byte sequences mixed in with raw text:
//! - Single byte: `LF`
//! - Two bytes: `ESC @`
//! - With parameters: `ESC a n`, `GS ! n`, `GS V m n`
//!
//! Anything that is not a command is printed as a character, which is why
//! text must never carry control bytes of its own (see [`super::text::encode`]).

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
///
/// Used for character size (`GS !`) and the cutter (`GS V`).
pub const GS: u8 = 0x1D;

/// LF (Line Feed) - Print the line buffer and advance one line
pub const LF: u8 = 0x0A;

// ============================================================================
// INITIALIZATION COMMANDS
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Resets the printer to its power-on state. Always the first bytes of a
/// receipt.
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
/// | Decimal | 27 64 |
///
/// ## What Gets Reset
///
/// - Print buffer is cleared
/// - Bold and character size reset to normal
/// - Alignment reset to left
///
/// ## Example
///
/// ```
/// use comanda::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

// ============================================================================
// CUTTER CONTROL COMMANDS
// ============================================================================

/// # Feed and Full Cut (GS V A 0)
///
/// Feeds to the cutter position and performs a full cut. Always the last
/// bytes of a receipt.
///
/// ## Protocol Details
///
/// | Format  | Bytes       |
/// |---------|-------------|
/// | ASCII   | GS V A NUL  |
/// | Hex     | 1D 56 41 00 |
/// | Decimal | 29 86 65 0  |
///
/// ## Behavior
///
/// Function B of `GS V`: `m = 65` feeds `n` extra dots (here 0) past the
/// cutter position before cutting. Printers without a cutter ignore it.
///
/// ## Example
///
/// ```
/// use comanda::protocol::commands;
///
/// assert_eq!(commands::cut(), vec![0x1D, 0x56, 0x41, 0x00]);
/// ```
#[inline]
pub fn cut() -> Vec<u8> {
    vec![GS, b'V', b'A', 0]
}

// ============================================================================
// PAPER FEED COMMANDS
// ============================================================================

/// Line feed (LF)
#[inline]
pub fn newline() -> Vec<u8> {
    vec![LF]
}

/// # Blank Feed Lines
///
/// `n` bare line feeds. Used before the cut so the cutter, which sits a few
/// millimetres above the print head, does not sever the last printed lines.
///
/// Plain `LF`s are used rather than `ESC d n` because some budget BLE
/// printers ignore `ESC d`.
///
/// ## Example
///
/// ```
/// use comanda::protocol::commands;
///
/// assert_eq!(commands::feed_lines(3), vec![0x0A, 0x0A, 0x0A]);
/// assert!(commands::feed_lines(0).is_empty());
/// ```
#[inline]
pub fn feed_lines(n: u8) -> Vec<u8> {
    vec![LF; n as usize]
}

// ============================================================================
// TESTS
// ============================================================================
