//! # Printer Transport Layer
//!
//! Communication backends for sending receipt bytes to a printer.
//!
//! ## Available Transports
//!
//! - [`ble`]: Bluetooth LE GATT, chunked writes
//! - [`usb`]: USB bulk endpoint, single transfer
//!
//! A deployment targets exactly one of them; the choice is made when the
//! binary is built (cargo features `ble` / `usb`), never at runtime.
//!
//! ## Host Capabilities
//!
//! Device discovery and pairing belong to the host platform. Each transport
//! is generic over a small host trait ([`ble::GattHost`], [`usb::UsbHost`])
//! that it calls into for the device chooser and raw device operations.
//! Concrete hosts:
//!
//! | Host | Feature | Backend |
//! |------|---------|---------|
//! | `btle::BtleplugHost` | `ble` | btleplug (BlueZ / CoreBluetooth / WinRT) |
//! | `libusb::LibUsbHost` | `usb` | rusb (libusb) |
//! | `mock::MockGattHost`, `mock::MockUsbHost` | `mock` | Scripted doubles for tests |
//!
//! ## Connection Lifecycle
//!
//! ```text
//! Unopened ──connect()──▶ Open ──transfer error / close()──▶ Closed
//!                          ▲                                  │
//!                          └──────── next send() ─────────────┘
//! ```
//!
//! `send()` connects lazily: if there is no live handle it calls
//! `connect()` first, and a failed connect aborts the send before any byte
//! is written.

pub mod ble;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod usb;

#[cfg(feature = "ble")]
pub mod btle;
#[cfg(feature = "usb")]
pub mod libusb;

pub use ble::BleTransport;
pub use usb::UsbTransport;

use async_trait::async_trait;

use crate::error::PrintResult;

/// A printer connection on one hardware transport.
///
/// Implementations own their connection handle. Callers must not run two
/// sends at once on the same transport; [`crate::PrintService`] serializes
/// access for them.
#[async_trait]
pub trait Transport: Send {
    /// Short transport name for logs ("ble", "usb")
    fn kind(&self) -> &'static str;

    /// Discover a printer and open a data channel to it.
    async fn connect(&mut self) -> PrintResult<()>;

    /// Deliver bytes, connecting first if needed.
    async fn send(&mut self, data: &[u8]) -> PrintResult<()>;

    /// Whether a live handle is held.
    fn is_connected(&self) -> bool;

    /// Release the handle. Errors are logged, not returned.
    async fn close(&mut self);
}

/// Connection state owned by a transport.
#[derive(Debug, Default)]
pub enum Link<H> {
    #[default]
    Unopened,
    Open(H),
    Closed,
}

impl<H> Link<H> {
    pub fn is_open(&self) -> bool {
        matches!(self, Link::Open(_))
    }

    /// Live handle, if any.
    pub fn handle(&self) -> Option<&H> {
        match self {
            Link::Open(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn handle_mut(&mut self) -> Option<&mut H> {
        match self {
            Link::Open(handle) => Some(handle),
            _ => None,
        }
    }

    /// Move to `Closed`, returning the handle that was open.
    pub fn take(&mut self) -> Option<H> {
        match std::mem::replace(self, Link::Closed) {
            Link::Open(handle) => Some(handle),
            previous @ Link::Unopened => {
                *self = previous;
                None
            }
            Link::Closed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_starts_unopened() {
        let link: Link<u8> = Link::default();
        assert!(matches!(link, Link::Unopened));
        assert!(!link.is_open());
        assert!(link.handle().is_none());
    }

    #[test]
    fn test_take_closes_open_link() {
        let mut link = Link::Open(7u8);
        assert!(link.is_open());
        assert_eq!(link.take(), Some(7));
        assert!(matches!(link, Link::Closed));
        assert_eq!(link.take(), None);
    }

    #[test]
    fn test_take_on_unopened_stays_unopened() {
        let mut link: Link<u8> = Link::Unopened;
        assert_eq!(link.take(), None);
        assert!(matches!(link, Link::Unopened));
    }
}
