//! # Receipt Encoder
//!
//! Turns an [`Order`] into the ESC/POS byte stream for one receipt. Pure:
//! no I/O, no device knowledge, never fails.
//!
//! ## Layout
//!
//! ```text
//!        LANCHONETE PEDIDOS          center, bold
//! --------------------------------
//! Pedido: #abcdefgh                  left
//! Data: 16/10/2026, 19:30:00
//! Cliente: Ana
//! Tel: 999
//! End: Rua X, 10
//! Ref: ...                           only when given
//! Pagamento: Dinheiro
//! --------------------------------   center
//! ITENS                              left, bold
//! 2x X-Burguer
//! R$ 36.00
//! --------------------------------   center
//!   TOTAL: R$ 36.00                  bold, double size
//!
//!                                    feed, then cut
//! ```
//!
//! There is no wrapping or column math: every value is its own line and the
//! printer wraps long lines itself.

pub mod layout;

pub use layout::{ReceiptLabels, ReceiptLayout};

use std::fmt::Write;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use crate::order::Order;
use crate::protocol::{commands, text};

/// Characters of the order id printed on the receipt
const ORDER_ID_CHARS: usize = 8;

/// Format a money amount with exactly two decimals, rounding half away
/// from zero. No thousands separators.
///
/// ```
/// use comanda::receipt::format_currency;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_currency(Decimal::new(121, 1)), "12.10");
/// assert_eq!(format_currency(Decimal::ZERO), "0.00");
/// ```
pub fn format_currency(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded.to_string()
}

/// Encode an order with the default layout.
pub fn encode(order: &Order) -> Vec<u8> {
    ReceiptEncoder::default().encode(order)
}

/// Receipt encoder for one layout.
#[derive(Debug, Clone, Default)]
pub struct ReceiptEncoder {
    layout: ReceiptLayout,
}

impl ReceiptEncoder {
    pub fn new(layout: ReceiptLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ReceiptLayout {
        &self.layout
    }

    /// Encode an order into printer commands.
    ///
    /// Output always starts with Initialize and ends with Cut. Orders the
    /// caller should have rejected (no items, zero total) still produce a
    /// complete receipt.
    pub fn encode(&self, order: &Order) -> Vec<u8> {
        let layout = &self.layout;
        let labels = &layout.labels;
        let separator = layout.separator();
        let mut data = Vec::with_capacity(512);

        // Header
        data.extend(commands::init());
        data.extend(text::align_center());
        data.extend(text::bold_on());
        push_line(&mut data, &layout.store_name);
        data.extend(text::bold_off());
        push_line(&mut data, &separator);

        // Order and customer details
        let customer = &order.customer;
        let short_id: String = order.id.chars().take(ORDER_ID_CHARS).collect();
        data.extend(text::align_left());
        push_line(&mut data, &format!("{}: #{}", labels.order, short_id));
        push_line(&mut data, &format!("{}: {}", labels.date, self.format_date(order)));
        push_line(&mut data, &format!("{}: {}", labels.customer, customer.name));
        push_line(&mut data, &format!("{}: {}", labels.phone, customer.phone));
        push_line(&mut data, &format!("{}: {}", labels.address, customer.address));
        if !customer.reference.is_empty() {
            push_line(&mut data, &format!("{}: {}", labels.reference, customer.reference));
        }
        push_line(
            &mut data,
            &format!("{}: {}", labels.payment, customer.payment_method.label()),
        );

        data.extend(text::align_center());
        push_line(&mut data, &separator);

        // Items
        data.extend(text::align_left());
        data.extend(text::bold_on());
        push_line(&mut data, &labels.items);
        data.extend(text::bold_off());
        for item in &order.items {
            push_line(&mut data, &format!("{}x {}", item.quantity, item.product.name));
            push_line(&mut data, &self.money(item.subtotal()));
        }

        // Total
        data.extend(text::align_center());
        push_line(&mut data, &separator);
        data.extend(text::bold_on());
        data.extend(text::size_double());
        push_line(&mut data, &format!("{}: {}", labels.total, self.money(order.total)));
        data.extend(text::size_normal());
        data.extend(text::bold_off());

        if let Some(footer) = &layout.footer {
            data.extend(commands::newline());
            push_line(&mut data, footer);
        }

        data.extend(commands::feed_lines(layout.feed_lines));
        data.extend(commands::cut());
        data
    }

    fn money(&self, value: Decimal) -> String {
        format!("{} {}", self.layout.currency_symbol, format_currency(value))
    }

    fn format_date(&self, order: &Order) -> String {
        let offset = self
            .layout
            .utc_offset()
            .unwrap_or_else(|| *order.created_at.offset());
        let local = order.created_at.with_timezone(&offset);

        let mut out = String::new();
        if write!(out, "{}", local.format(&self.layout.date_format)).is_err() {
            warn!(format = %self.layout.date_format, "invalid date format, using RFC 3339");
            return local.to_rfc3339();
        }
        out
    }
}

/// Encoded text followed by a line feed.
fn push_line(data: &mut Vec<u8>, line: &str) {
    data.extend(text::encode(line));
    data.extend(commands::newline());
}
