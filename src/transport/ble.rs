//! # Bluetooth LE Transport
//!
//! Sends receipts to BLE thermal printers through a writable GATT
//! characteristic.
//!
//! ## Service Discovery
//!
//! Most budget BLE receipt printers expose the Bluetooth SIG printer
//! service, but several vendors use their own. Discovery asks the host
//! for a device advertising the standard service and accepts the fallbacks:
//!
//! | Service | Write characteristic | Seen on |
//! |---------|----------------------|---------|
//! | `000018f0-…-00805f9b34fb` | `00002af1-…` | Most ESC/POS BLE printers |
//! | `e7810a71-73ae-499d-8c15-faa9aef0c3f2` | `bef8d6c9-9c21-4c9e-b632-bd58c1009f9f` | Chinese OEM printers |
//! | `0000ff00-…-00805f9b34fb` | `0000ff02-…` | Generic serial bridges |
//!
//! In each service the known characteristic is preferred, then any
//! characteristic that accepts writes. If no service yields one, the attempt
//! fails with [`PrintError::Negotiation`]. There is no retry loop; the caller
//! tries again.
//!
//! ## Chunked Writes
//!
//! A GATT write carries at most 512 bytes. The command buffer is split into
//! `chunk_size` pieces that are written one after another, each awaited
//! before the next starts, so the printer's small receive buffer is never
//! overrun.
//!
//! ```text
//! [........ 1200 bytes ........]
//!  └─ 512 ─┘└─ 512 ─┘└─ 176 ─┘    3 sequential writes
//! ```
//!
//! ## Failure Handling
//!
//! A failed write aborts the print. Chunks already written stay written
//! (the printer may produce a partial receipt). The handle is kept: the next
//! `send()` reuses it if the GATT link is still up, and reconnects if not.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{Link, Transport};
use crate::error::{PrintError, PrintResult};

/// Bluetooth SIG printer service
pub const PRINTER_SERVICE: Uuid = Uuid::from_u128(0x000018f0_0000_1000_8000_00805f9b34fb);

/// Write characteristic of [`PRINTER_SERVICE`]
pub const PRINTER_WRITE_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x00002af1_0000_1000_8000_00805f9b34fb);

/// Vendor service used by many Chinese OEM printers
pub const VENDOR_SERVICE: Uuid = Uuid::from_u128(0xe7810a71_73ae_499d_8c15_faa9aef0c3f2);

/// Write characteristic of [`VENDOR_SERVICE`]
pub const VENDOR_WRITE_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0xbef8d6c9_9c21_4c9e_b632_bd58c1009f9f);

/// Generic serial-bridge service (16-bit 0xFF00)
pub const SERIAL_SERVICE: Uuid = Uuid::from_u128(0x0000ff00_0000_1000_8000_00805f9b34fb);

/// Write characteristic of [`SERIAL_SERVICE`] (16-bit 0xFF02)
pub const SERIAL_WRITE_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb);

/// Default chunk size for writes (bytes)
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Services a printer may expose, in the order they are tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFilter {
    /// Service the device must advertise to be offered by the chooser
    pub required: Uuid,
    /// Services also accepted once connected
    pub optional: Vec<Uuid>,
}

impl Default for ServiceFilter {
    fn default() -> Self {
        Self {
            required: PRINTER_SERVICE,
            optional: vec![VENDOR_SERVICE, SERIAL_SERVICE],
        }
    }
}

impl ServiceFilter {
    /// Required service first, then the optional ones.
    pub fn services(&self) -> impl Iterator<Item = &Uuid> {
        std::iter::once(&self.required).chain(
            self.optional
                .iter()
                .filter(move |s| **s != self.required),
        )
    }
}

/// Known write characteristic for a service.
pub fn known_write_characteristic(service: Uuid) -> Option<Uuid> {
    match service {
        PRINTER_SERVICE => Some(PRINTER_WRITE_CHARACTERISTIC),
        VENDOR_SERVICE => Some(VENDOR_WRITE_CHARACTERISTIC),
        SERIAL_SERVICE => Some(SERIAL_WRITE_CHARACTERISTIC),
        _ => None,
    }
}

/// BLE transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleConfig {
    /// Bytes per GATT write
    pub chunk_size: usize,
    pub filter: ServiceFilter,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            filter: ServiceFilter::default(),
        }
    }
}

/// A GATT characteristic as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub service: Uuid,
    /// Supports write with response
    pub write: bool,
    /// Supports write without response
    pub write_without_response: bool,
}

impl GattCharacteristic {
    pub fn can_write(&self) -> bool {
        self.write || self.write_without_response
    }
}

/// Host Bluetooth LE stack: capability check and device chooser.
#[async_trait]
pub trait GattHost: Send + Sync {
    type Device: GattDevice;

    /// Whether the host has a usable Bluetooth LE stack at all.
    async fn is_available(&self) -> bool;

    /// Ask the host (or the user, through the host's picker) for a device
    /// matching `filter`. Fails with [`PrintError::Discovery`] when nothing
    /// is chosen.
    async fn request_device(&self, filter: &ServiceFilter) -> PrintResult<Self::Device>;
}

/// A BLE peripheral chosen through a [`GattHost`].
#[async_trait]
pub trait GattDevice: Send + Sync {
    /// Display name for logs
    fn name(&self) -> String;

    /// Connect the GATT server and discover its services.
    async fn connect(&mut self) -> PrintResult<()>;

    async fn is_connected(&self) -> bool;

    /// Characteristics of `service`; empty if the device lacks it.
    async fn characteristics(&self, service: Uuid) -> PrintResult<Vec<GattCharacteristic>>;

    /// Write one chunk, resolving once the host reports it written.
    async fn write(&self, characteristic: &GattCharacteristic, chunk: &[u8]) -> PrintResult<()>;

    async fn disconnect(&mut self) -> PrintResult<()>;
}

/// Open GATT channel: the device and the characteristic receipts go to.
#[derive(Debug)]
struct Channel<D> {
    device: D,
    characteristic: GattCharacteristic,
}

/// # Bluetooth LE Printer Transport
///
/// ## Example
///
/// ```
/// use comanda::transport::{BleTransport, Transport};
/// use comanda::transport::mock::MockGattHost;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let host = MockGattHost::printer();
/// let mut transport = BleTransport::new(host.clone()).with_chunk_size(4);
///
/// transport.send(b"\x1B@hello").await?;
///
/// assert_eq!(host.chunks(), vec![b"\x1B@he".to_vec(), b"llo".to_vec()]);
/// # Ok::<(), comanda::PrintError>(())
/// # }).unwrap();
/// ```
pub struct BleTransport<H: GattHost> {
    host: H,
    filter: ServiceFilter,
    chunk_size: usize,
    link: Link<Channel<H::Device>>,
}

impl<H: GattHost> BleTransport<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, BleConfig::default())
    }

    pub fn with_config(host: H, config: BleConfig) -> Self {
        Self {
            host,
            filter: config.filter,
            chunk_size: config.chunk_size.max(1),
            link: Link::Unopened,
        }
    }

    /// Set the chunk size for writes (minimum 1).
    ///
    /// Must stay at or under the link's maximum write size. Default is 512
    /// bytes.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_filter(mut self, filter: ServiceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Find the characteristic receipts are written to.
    async fn find_write_characteristic(&self, device: &H::Device) -> PrintResult<GattCharacteristic> {
        for service in self.filter.services() {
            let characteristics = device.characteristics(*service).await?;
            if characteristics.is_empty() {
                debug!(%service, "service not present");
                continue;
            }

            let known = known_write_characteristic(*service);
            let chosen = characteristics
                .iter()
                .find(|c| Some(c.uuid) == known && c.can_write())
                .or_else(|| characteristics.iter().find(|c| c.can_write()));

            if let Some(characteristic) = chosen {
                return Ok(characteristic.clone());
            }
            debug!(%service, "service has no writable characteristic");
        }

        Err(PrintError::Negotiation(format!(
            "{} has no writable characteristic in services {}",
            device.name(),
            self.filter
                .services()
                .map(Uuid::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Drop a handle whose GATT link has gone away.
    async fn drop_stale_link(&mut self) {
        let stale = match self.link.handle() {
            Some(channel) => !channel.device.is_connected().await,
            None => false,
        };
        if stale {
            info!("printer disconnected, reconnecting");
            self.link = Link::Closed;
        }
    }
}

#[async_trait]
impl<H: GattHost> Transport for BleTransport<H> {
    fn kind(&self) -> &'static str {
        "ble"
    }

    #[instrument(skip(self), fields(transport = "ble"))]
    async fn connect(&mut self) -> PrintResult<()> {
        self.drop_stale_link().await;
        if self.link.is_open() {
            debug!("already connected");
            return Ok(());
        }

        if !self.host.is_available().await {
            return Err(PrintError::CapabilityAbsent(
                "Bluetooth LE is not available on this host".to_string(),
            ));
        }

        let mut device = self.host.request_device(&self.filter).await?;
        info!(device = %device.name(), "printer selected");

        device.connect().await?;

        let characteristic = match self.find_write_characteristic(&device).await {
            Ok(c) => c,
            Err(e) => {
                if let Err(close_err) = device.disconnect().await {
                    warn!(error = %close_err, "disconnect after failed negotiation");
                }
                return Err(e);
            }
        };

        info!(
            device = %device.name(),
            service = %characteristic.service,
            characteristic = %characteristic.uuid,
            "printer connected"
        );
        self.link = Link::Open(Channel {
            device,
            characteristic,
        });
        Ok(())
    }

    #[instrument(skip(self, data), fields(transport = "ble", data_len = data.len()))]
    async fn send(&mut self, data: &[u8]) -> PrintResult<()> {
        self.connect().await?;
        let Some(channel) = self.link.handle() else {
            return Err(PrintError::Transfer("no open GATT channel".to_string()));
        };

        let total = data.len().div_ceil(self.chunk_size);
        for (i, chunk) in data.chunks(self.chunk_size).enumerate() {
            debug!(chunk = i + 1, of = total, len = chunk.len(), "writing chunk");
            channel
                .device
                .write(&channel.characteristic, chunk)
                .await
                .map_err(|e| {
                    warn!(chunk = i + 1, of = total, error = %e, "write failed");
                    match e {
                        PrintError::Transfer(_) => e,
                        other => PrintError::Transfer(other.to_string()),
                    }
                })?;
        }

        info!(bytes = data.len(), chunks = total, "receipt sent");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    async fn close(&mut self) {
        if let Some(mut channel) = self.link.take() {
            if let Err(e) = channel.device.disconnect().await {
                warn!(error = %e, "disconnect failed");
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuids() {
        assert_eq!(
            PRINTER_SERVICE.to_string(),
            "000018f0-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            PRINTER_WRITE_CHARACTERISTIC.to_string(),
            "00002af1-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            VENDOR_SERVICE.to_string(),
            "e7810a71-73ae-499d-8c15-faa9aef0c3f2"
        );
        assert_eq!(
            SERIAL_SERVICE.to_string(),
            "0000ff00-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_filter_order() {
        let filter = ServiceFilter::default();
        let services: Vec<Uuid> = filter.services().copied().collect();
        assert_eq!(services, vec![PRINTER_SERVICE, VENDOR_SERVICE, SERIAL_SERVICE]);
    }

    #[test]
    fn test_filter_skips_duplicate_required() {
        let filter = ServiceFilter {
            required: VENDOR_SERVICE,
            optional: vec![VENDOR_SERVICE, PRINTER_SERVICE],
        };
        let services: Vec<Uuid> = filter.services().copied().collect();
        assert_eq!(services, vec![VENDOR_SERVICE, PRINTER_SERVICE]);
    }

    #[test]
    fn test_known_write_characteristic() {
        assert_eq!(
            known_write_characteristic(PRINTER_SERVICE),
            Some(PRINTER_WRITE_CHARACTERISTIC)
        );
        assert_eq!(known_write_characteristic(Uuid::nil()), None);
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let transport = BleTransport::with_config(
            crate::transport::mock::MockGattHost::printer(),
            BleConfig {
                chunk_size: 0,
                ..BleConfig::default()
            },
        );
        assert_eq!(transport.chunk_size(), 1);
    }

    #[test]
    fn test_can_write() {
        let mut c = GattCharacteristic {
            uuid: PRINTER_WRITE_CHARACTERISTIC,
            service: PRINTER_SERVICE,
            write: false,
            write_without_response: false,
        };
        assert!(!c.can_write());
        c.write_without_response = true;
        assert!(c.can_write());
    }

    // Connection and delivery behaviour is covered in tests/transport_tests.rs
    // against the scripted hosts in `transport::mock`.
}
