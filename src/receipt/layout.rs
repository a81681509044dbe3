//! # Receipt Layout Configuration
//!
//! Everything about the printed receipt that differs between deployments:
//! store name, field labels, currency symbol, date format, paper width,
//! footer and how far to feed before cutting.
//!
//! Every field has a default, so a layout file only needs the fields it
//! changes:
//!
//! ```json
//! { "store_name": "Cantinho da Sandra", "footer": "Obrigado pela preferencia!" }
//! ```
//!
//! ## Paper Widths
//!
//! | Paper | Columns (Font A) | `separator_width` |
//! |-------|------------------|-------------------|
//! | 58mm | 32 | 32 (default) |
//! | 80mm | 48 | 48 |

use std::path::Path;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{PrintError, PrintResult};

/// Receipt layout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptLayout {
    /// Header line, printed bold and centered
    pub store_name: String,

    /// Number of dashes in a separator line
    pub separator_width: usize,

    /// Prefix for money values ("R$ 36.00")
    pub currency_symbol: String,

    /// chrono `strftime` format for the order date
    pub date_format: String,

    /// Print the date in this UTC offset (minutes) instead of the one the
    /// order was stamped with
    pub utc_offset_minutes: Option<i32>,

    /// Optional closing line after the total
    pub footer: Option<String>,

    /// Blank lines fed before the cut
    pub feed_lines: u8,

    pub labels: ReceiptLabels,
}

impl Default for ReceiptLayout {
    fn default() -> Self {
        Self {
            store_name: "LANCHONETE PEDIDOS".to_string(),
            separator_width: 32,
            currency_symbol: "R$".to_string(),
            date_format: "%d/%m/%Y, %H:%M:%S".to_string(),
            utc_offset_minutes: None,
            footer: None,
            feed_lines: 4,
            labels: ReceiptLabels::default(),
        }
    }
}

impl ReceiptLayout {
    /// Parse a layout from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> PrintResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PrintError::Input(format!("layout: {}", e)))
    }

    /// Load a layout file.
    pub fn load<P: AsRef<Path>>(path: P) -> PrintResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Separator line (without the trailing newline).
    pub fn separator(&self) -> String {
        "-".repeat(self.separator_width)
    }

    /// Configured date offset, if set and in range.
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes.checked_mul(60)?))
    }
}

/// Field labels. Each is printed as `"{label}: {value}"`, except
/// `items`, which is a header on its own line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptLabels {
    pub order: String,
    pub date: String,
    pub customer: String,
    pub phone: String,
    pub address: String,
    pub reference: String,
    pub payment: String,
    pub items: String,
    pub total: String,
}

impl Default for ReceiptLabels {
    fn default() -> Self {
        Self {
            order: "Pedido".to_string(),
            date: "Data".to_string(),
            customer: "Cliente".to_string(),
            phone: "Tel".to_string(),
            address: "End".to_string(),
            reference: "Ref".to_string(),
            payment: "Pagamento".to_string(),
            items: "ITENS".to_string(),
            total: "TOTAL".to_string(),
        }
    }
}
