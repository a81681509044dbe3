//! # Order Model
//!
//! The finished order handed to the printing core by the order-taking
//! front end. The core only reads these values.
//!
//! JSON field names follow the front end's camelCase shape:
//!
//! ```json
//! {
//!   "id": "abcdefgh12",
//!   "customer": {
//!     "name": "Ana", "address": "Rua X, 10", "reference": "",
//!     "phone": "999", "paymentMethod": "CASH"
//!   },
//!   "items": [
//!     { "id": "1", "name": "X-Burguer", "price": 18.00,
//!       "category": "Hamburgueres", "quantity": 2 }
//!   ],
//!   "total": 36.00,
//!   "date": "2026-10-16T19:30:00-03:00",
//!   "status": "PENDING"
//! }
//! ```

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "PIX", alias = "Pix")]
    Pix,
    #[serde(rename = "CASH", alias = "Dinheiro")]
    Cash,
    #[serde(rename = "CARD", alias = "Cartão", alias = "Cartao")]
    Card,
}

impl PaymentMethod {
    /// Label printed on the receipt.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "PIX",
            PaymentMethod::Cash => "Dinheiro",
            PaymentMethod::Card => "Cartão",
        }
    }
}

/// Lifecycle tag of an order. Not printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "PENDING", alias = "Pendente")]
    Pending,
    #[serde(rename = "COMPLETED", alias = "Concluído")]
    Completed,
    #[serde(rename = "CANCELLED", alias = "Cancelado")]
    Cancelled,
}

/// Menu product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub category: String,
}

/// A product in the cart with its quantity (always >= 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product: Product, quantity: u32) -> Self {
        Self { product, quantity }
    }

    /// `price * quantity`
    pub fn subtotal(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// Customer and delivery details captured for the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    pub address: String,
    /// Delivery reference note; empty when not given.
    #[serde(default)]
    pub reference: String,
    pub phone: String,
    pub payment_method: PaymentMethod,
}

/// A finished order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer: Customer,
    pub items: Vec<CartItem>,
    /// Grand total as computed at creation time. Printed as-is.
    pub total: Decimal,
    #[serde(rename = "date")]
    pub created_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub status: OrderStatus,
}

impl Order {
    /// Sum of item subtotals.
    ///
    /// Equals `total` for a well-formed order. The receipt never uses this;
    /// it is here for callers that want to check the invariant.
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Parse an order from the front end's JSON.
    pub fn from_json(json: &str) -> Result<Self, crate::PrintError> {
        serde_json::from_str(json).map_err(|e| crate::PrintError::Input(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_JSON: &str = r#"{
        "id": "abcdefgh12",
        "customer": {
            "name": "Ana",
            "address": "Rua X, 10",
            "reference": "",
            "phone": "999",
            "paymentMethod": "CASH"
        },
        "items": [
            {"id": "1", "name": "X-Burguer", "price": 18.00, "category": "Hamburgueres", "quantity": 2},
            {"id": "4", "name": "Coca-Cola Lata", "price": 6.5, "category": "Bebidas", "quantity": 1}
        ],
        "total": 42.50,
        "date": "2026-10-16T19:30:00-03:00",
        "status": "PENDING"
    }"#;

    #[test]
    fn test_parse_front_end_json() {
        let order = Order::from_json(ORDER_JSON).unwrap();
        assert_eq!(order.id, "abcdefgh12");
        assert_eq!(order.customer.payment_method, PaymentMethod::Cash);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].product.name, "X-Burguer");
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.total, Decimal::new(4250, 2));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_items_total_matches_total() {
        let order = Order::from_json(ORDER_JSON).unwrap();
        assert_eq!(order.items_total(), order.total);
    }

    #[test]
    fn test_subtotal() {
        let item = CartItem::new(
            Product {
                id: "3".into(),
                name: "X-Bacon".into(),
                price: Decimal::new(2500, 2),
                category: String::new(),
            },
            3,
        );
        assert_eq!(item.subtotal(), Decimal::new(7500, 2));
    }

    #[test]
    fn test_payment_method_accepts_labels() {
        let m: PaymentMethod = serde_json::from_str("\"Cartão\"").unwrap();
        assert_eq!(m, PaymentMethod::Card);
        let m: PaymentMethod = serde_json::from_str("\"Dinheiro\"").unwrap();
        assert_eq!(m, PaymentMethod::Cash);
        let m: PaymentMethod = serde_json::from_str("\"PIX\"").unwrap();
        assert_eq!(m, PaymentMethod::Pix);
    }

    #[test]
    fn test_payment_method_label() {
        assert_eq!(PaymentMethod::Pix.label(), "PIX");
        assert_eq!(PaymentMethod::Cash.label(), "Dinheiro");
        assert_eq!(PaymentMethod::Card.label(), "Cartão");
    }

    #[test]
    fn test_missing_field_is_order_error() {
        let err = Order::from_json(r#"{"id": "x"}"#).unwrap_err();
        assert!(matches!(err, crate::PrintError::Input(_)));
    }
}
