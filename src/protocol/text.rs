//! # ESC/POS Text Commands
//!
//! Alignment, emphasis and character size commands, plus the text encoding
//! every printed string goes through.
//!
//! | Style | Command | Effect |
//! |-------|---------|--------|
//! | Alignment | ESC a n | Left / center |
//! | Bold | ESC E n | **Emphasized** text |
//! | Size | GS ! n | Normal / double width and height |
//!
//! ## Text Encoding
//!
//! Budget thermal printers ship with a single-byte code page and render
//! accented Latin characters unreliably (or as garbage), so all text is
//! reduced to plain ASCII before it is sent:
//!
//! ```text
//! "Cartão"  → "Cartao"
//! "Açaí"    → "Acai"
//! "Pão €5"  → "Pao ?5"
//! ```

use super::commands::{ESC, GS};
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// TEXT ALIGNMENT
// ============================================================================

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left = 0,
    Center = 1,
}

/// # Set Text Alignment (ESC a n)
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC a n |
/// | Hex     | 1B 61 n |
/// | Decimal | 27 97 n |
///
/// ## Parameters
///
/// - `n = 0`: Left alignment (default)
/// - `n = 1`: Center alignment
///
/// ## Example
///
/// ```
/// use comanda::protocol::text::{align, Alignment};
///
/// assert_eq!(align(Alignment::Center), vec![0x1B, 0x61, 0x01]);
/// ```
pub fn align(alignment: Alignment) -> Vec<u8> {
    vec![ESC, b'a', alignment as u8]
}

/// Convenience function for left alignment
#[inline]
pub fn align_left() -> Vec<u8> {
    align(Alignment::Left)
}

/// Convenience function for center alignment
#[inline]
pub fn align_center() -> Vec<u8> {
    align(Alignment::Center)
}

// ============================================================================
// TEXT EMPHASIS (BOLD)
// ============================================================================

/// # Enable Bold/Emphasis (ESC E 1)
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC E SOH |
/// | Hex     | 1B 45 01 |
/// | Decimal | 27 69 1 |
///
/// ## Example
///
/// ```
/// use comanda::protocol::text::{bold_on, bold_off};
///
/// let mut data = Vec::new();
/// data.extend(bold_on());
/// data.extend(b"TOTAL");
/// data.extend(bold_off());
/// assert_eq!(&data[..3], &[0x1B, 0x45, 0x01]);
/// ```
#[inline]
pub fn bold_on() -> Vec<u8> {
    vec![ESC, b'E', 1]
}

/// # Disable Bold/Emphasis (ESC E 0)
#[inline]
pub fn bold_off() -> Vec<u8> {
    vec![ESC, b'E', 0]
}

// ============================================================================
// CHARACTER SIZE
// ============================================================================

/// Character scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharSize {
    #[default]
    Normal = 0x00,
    /// Double width and double height
    Double = 0x11,
}

/// # Select Character Size (GS ! n)
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | GS ! n |
/// | Hex     | 1D 21 n |
/// | Decimal | 29 33 n |
///
/// ## Parameters
///
/// High nibble is the width multiplier minus one, low nibble the height
/// multiplier minus one:
///
/// | n | Effect |
/// |---|--------|
/// | 0x00 | Normal |
/// | 0x11 | Double width + double height |
pub fn size(size: CharSize) -> Vec<u8> {
    vec![GS, b'!', size as u8]
}

/// Normal character size
#[inline]
pub fn size_normal() -> Vec<u8> {
    size(CharSize::Normal)
}

/// Double width and height
#[inline]
pub fn size_double() -> Vec<u8> {
    size(CharSize::Double)
}

// ============================================================================
// TEXT ENCODING
// ============================================================================

/// Strip accents: canonical decomposition (NFD), then drop combining
/// diacritical marks (U+0300–U+036F).
///
/// ```
/// use comanda::protocol::text::normalize;
///
/// assert_eq!(normalize("Cartão"), "Cartao");
/// assert_eq!(normalize("Guaraná Açaí"), "Guarana Acai");
/// ```
pub fn normalize(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Encode field text as single-byte printer text.
///
/// - Accents are stripped with [`normalize`]
/// - Printable ASCII passes through
/// - ASCII control characters (including CR/LF and ESC) become a space, so
///   free-form fields cannot inject printer commands or break the layout
/// - Anything else left after normalization becomes `?`
pub fn encode(s: &str) -> Vec<u8> {
    let normalized = normalize(s);
    let mut out = Vec::with_capacity(normalized.len());
    for ch in normalized.chars() {
        if ch.is_ascii_control() {
            out.push(b' ');
        } else if ch.is_ascii() {
            out.push(ch as u8);
        } else {
            warn!(
                "unprintable character '{}' (U+{:04X}), replacing with '?'",
                ch, ch as u32
            );
            out.push(b'?');
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
