//! # Comanda - Order Receipt Printing
//!
//! Comanda prints kitchen and delivery receipts for food orders on cheap
//! ESC/POS thermal printers, over Bluetooth LE or USB. It provides:
//!
//! - **Receipt encoding**: `Order` to ESC/POS bytes, accents folded to ASCII
//! - **Transports**: BLE GATT with chunked writes, USB bulk transfer
//! - **Print orchestration**: lazy connect, one print at a time
//!
//! ## Quick Start
//!
//! ```no_run
//! use comanda::{Order, PrintService, ReceiptLayout};
//! use comanda::transport::UsbTransport;
//! use comanda::transport::mock::MockUsbHost;
//!
//! # async fn run() -> comanda::PrintResult<()> {
//! let json = std::fs::read_to_string("order.json")?;
//! let order = Order::from_json(&json)?;
//!
//! // Real hardware: transport::libusb::LibUsbHost (--features usb).
//! // The transport connects on first use.
//! let service = PrintService::new(
//!     UsbTransport::new(MockUsbHost::printer()),
//!     ReceiptLayout::default(),
//! );
//! service.print_order(&order).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`order`] | Order data model (input) |
//! | [`protocol`] | ESC/POS command builders and text normalization |
//! | [`receipt`] | Receipt encoder and layout configuration |
//! | [`transport`] | BLE and USB printer connections |
//! | [`service`] | Print orchestrator |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Tested against generic 58mm ESC/POS printers (the "PT-210" / "MTP-II"
//! family) over BLE and USB. Any printer that accepts the basic ESC/POS
//! text commands should work; 80mm paper only needs a wider separator.

pub mod error;
pub mod order;
pub mod protocol;
pub mod receipt;
pub mod service;
pub mod transport;

// Re-exports for convenience
pub use error::{FailureKind, PrintError, PrintResult};
pub use order::{CartItem, Customer, Order, OrderStatus, PaymentMethod, Product};
pub use receipt::{ReceiptEncoder, ReceiptLayout};
pub use service::PrintService;
pub use transport::Transport;
