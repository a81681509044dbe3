//! # ESC/POS Protocol Implementation
//!
//! Low-level command builders for the ESC/POS control-code language spoken
//! by thermal receipt printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: Initialize, line feeds, paper cut
//! - [`text`]: Alignment, bold, character size, text encoding
//!
//! ## Usage Example
//!
//! ```
//! use comanda::protocol::{commands, text};
//!
//! let mut data = Vec::new();
//! data.extend(commands::init());
//! data.extend(text::align_center());
//! data.extend(text::bold_on());
//! data.extend(text::encode("Açaí"));
//! data.extend(commands::newline());
//! data.extend(text::bold_off());
//! data.extend(commands::cut());
//!
//! assert_eq!(&data[..2], &[0x1B, 0x40]);
//! assert!(data.windows(4).any(|w| w == b"Acai"));
//! ```

pub mod commands;
pub mod text;
