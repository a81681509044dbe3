//! # USB Transport
//!
//! Sends receipts over a USB bulk OUT endpoint.
//!
//! ## Device Selection
//!
//! The chooser is unfiltered: cheap printers often report a vendor-specific
//! class instead of the printer class (0x07), so filtering by class hides
//! them. Once a device is chosen the transport:
//!
//! 1. opens it
//! 2. selects its first configuration
//! 3. claims the first interface of that configuration
//! 4. scans that interface's endpoints for a bulk OUT endpoint
//!
//! A device without a bulk OUT endpoint on that interface is the wrong
//! device; connect fails with [`PrintError::Negotiation`] and nothing is
//! transferred.
//!
//! ## Delivery
//!
//! USB bulk transfers have no practical size ceiling, so the whole receipt
//! goes out as one transfer. A failed or short transfer closes the device
//! (best effort) so the next `send()` starts from a fresh open.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::{Link, Transport};
use crate::error::{PrintError, PrintResult};

/// USB class code for hubs, skipped by "first device" choosers
pub const CLASS_HUB: u8 = 0x09;

/// USB class code for printers
pub const CLASS_PRINTER: u8 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to host
    In,
    /// Host to device
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Endpoint address including the direction bit (0x01, 0x81, ...)
    pub address: u8,
    pub direction: Direction,
    pub transfer_type: TransferType,
}

impl EndpointInfo {
    pub fn is_bulk_out(&self) -> bool {
        self.direction == Direction::Out && self.transfer_type == TransferType::Bulk
    }
}

/// Interface descriptor (alternate setting 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub number: u8,
    pub class: u8,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationInfo {
    /// `bConfigurationValue`
    pub value: u8,
    pub interfaces: Vec<InterfaceInfo>,
}

/// First bulk OUT endpoint of an interface.
pub fn bulk_out_endpoint(interface: &InterfaceInfo) -> Option<&EndpointInfo> {
    interface.endpoints.iter().find(|e| e.is_bulk_out())
}

/// Whether the transport can print to a device with these descriptors:
/// its first configuration's first interface has a bulk OUT endpoint.
pub fn has_print_endpoint(configurations: &[ConfigurationInfo]) -> bool {
    configurations
        .first()
        .and_then(|c| c.interfaces.first())
        .and_then(bulk_out_endpoint)
        .is_some()
}

/// Explicit `VID:PID` device choice, e.g. `0416:5011`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbDeviceSelector {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl UsbDeviceSelector {
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

impl FromStr for UsbDeviceSelector {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PrintError::Input(format!("expected VID:PID in hex, got {:?}", s));

        let (vid, pid) = s.trim().split_once(':').ok_or_else(invalid)?;
        let parse = |part: &str| {
            let part = part.trim();
            let part = part
                .strip_prefix("0x")
                .or_else(|| part.strip_prefix("0X"))
                .unwrap_or(part);
            u16::from_str_radix(part, 16).map_err(|_| invalid())
        };

        Ok(Self {
            vendor_id: parse(vid)?,
            product_id: parse(pid)?,
        })
    }
}

impl fmt::Display for UsbDeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// USB transport settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsbConfig {
    /// Device to use; `None` means the host's first candidate
    pub device: Option<UsbDeviceSelector>,
}

/// Host USB stack: capability check and device chooser.
#[async_trait]
pub trait UsbHost: Send + Sync {
    type Device: UsbDevice;

    /// Whether the host exposes USB device access at all.
    async fn is_available(&self) -> bool;

    /// Ask the host for a device. Fails with [`PrintError::Discovery`] when
    /// nothing is chosen.
    async fn request_device(&self) -> PrintResult<Self::Device>;
}

/// A USB device chosen through a [`UsbHost`].
#[async_trait]
pub trait UsbDevice: Send {
    /// Display name for logs
    fn name(&self) -> String;

    async fn open(&mut self) -> PrintResult<()>;

    /// Configuration descriptors, in device order.
    fn configurations(&self) -> Vec<ConfigurationInfo>;

    async fn select_configuration(&mut self, value: u8) -> PrintResult<()>;

    async fn claim_interface(&mut self, number: u8) -> PrintResult<()>;

    /// Bulk OUT transfer. Returns the number of bytes the device accepted.
    async fn transfer_out(&mut self, endpoint: u8, data: &[u8]) -> PrintResult<usize>;

    async fn close(&mut self) -> PrintResult<()>;
}

/// Open device plus the endpoint receipts go to.
#[derive(Debug)]
struct Pipe<D> {
    device: D,
    endpoint: u8,
}

/// # USB Printer Transport
///
/// ## Example
///
/// ```
/// use comanda::transport::{Transport, UsbTransport};
/// use comanda::transport::mock::MockUsbHost;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let host = MockUsbHost::printer();
/// let mut transport = UsbTransport::new(host.clone());
///
/// transport.send(b"\x1B@hello").await?;
///
/// assert_eq!(host.transfers(), vec![b"\x1B@hello".to_vec()]);
/// # Ok::<(), comanda::PrintError>(())
/// # }).unwrap();
/// ```
pub struct UsbTransport<H: UsbHost> {
    host: H,
    link: Link<Pipe<H::Device>>,
}

impl<H: UsbHost> UsbTransport<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            link: Link::Unopened,
        }
    }

    /// Walk the descriptors: first configuration, first interface, bulk OUT.
    async fn negotiate(device: &mut H::Device) -> PrintResult<u8> {
        let configurations = device.configurations();
        let configuration = configurations.first().ok_or_else(|| {
            PrintError::Negotiation(format!("{} has no configuration", device.name()))
        })?;
        device.select_configuration(configuration.value).await?;

        let interface = configuration.interfaces.first().ok_or_else(|| {
            PrintError::Negotiation(format!(
                "{} configuration {} has no interface",
                device.name(),
                configuration.value
            ))
        })?;
        device.claim_interface(interface.number).await?;

        let endpoint = bulk_out_endpoint(interface).ok_or_else(|| {
            PrintError::Negotiation(format!(
                "{} interface {} has no bulk OUT endpoint",
                device.name(),
                interface.number
            ))
        })?;

        debug!(
            configuration = configuration.value,
            interface = interface.number,
            endpoint = format_args!("{:#04x}", endpoint.address),
            "bulk OUT endpoint found"
        );
        Ok(endpoint.address)
    }

    /// Close the device after a failed transfer. Errors are only logged.
    async fn close_after_failure(&mut self) {
        if let Some(mut pipe) = self.link.take() {
            if let Err(e) = pipe.device.close().await {
                warn!(error = %e, "close after failed transfer");
            }
        }
    }
}

#[async_trait]
impl<H: UsbHost> Transport for UsbTransport<H> {
    fn kind(&self) -> &'static str {
        "usb"
    }

    #[instrument(skip(self), fields(transport = "usb"))]
    async fn connect(&mut self) -> PrintResult<()> {
        if self.link.is_open() {
            debug!("already connected");
            return Ok(());
        }

        if !self.host.is_available().await {
            return Err(PrintError::CapabilityAbsent(
                "USB device access is not available on this host".to_string(),
            ));
        }

        let mut device = self.host.request_device().await?;
        info!(device = %device.name(), "printer selected");

        device.open().await?;

        let endpoint = match Self::negotiate(&mut device).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                if let Err(close_err) = device.close().await {
                    warn!(error = %close_err, "close after failed negotiation");
                }
                return Err(e);
            }
        };

        info!(
            device = %device.name(),
            endpoint = format_args!("{:#04x}", endpoint),
            "printer connected"
        );
        self.link = Link::Open(Pipe { device, endpoint });
        Ok(())
    }

    #[instrument(skip(self, data), fields(transport = "usb", data_len = data.len()))]
    async fn send(&mut self, data: &[u8]) -> PrintResult<()> {
        if !self.link.is_open() {
            self.connect().await?;
        }
        let Some(pipe) = self.link.handle_mut() else {
            return Err(PrintError::Transfer("no open USB device".to_string()));
        };

        let endpoint = pipe.endpoint;
        let result = match pipe.device.transfer_out(endpoint, data).await {
            Ok(written) if written == data.len() => Ok(()),
            Ok(written) => Err(PrintError::Transfer(format!(
                "short write: {} of {} bytes",
                written,
                data.len()
            ))),
            Err(PrintError::Transfer(msg)) => Err(PrintError::Transfer(msg)),
            Err(other) => Err(PrintError::Transfer(other.to_string())),
        };

        match result {
            Ok(()) => {
                info!(bytes = data.len(), "receipt sent");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "transfer failed, closing device");
                self.close_after_failure().await;
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    async fn close(&mut self) {
        if let Some(mut pipe) = self.link.take() {
            if let Err(e) = pipe.device.close().await {
                warn!(error = %e, "close failed");
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
    fn test_selector_parse() {
        let sel: UsbDeviceSelector = "0416:5011".parse().unwrap();
        assert_eq!(sel.vendor_id, 0x0416);
        assert_eq!(sel.product_id, 0x5011);
        assert_eq!(sel.to_string(), "0416:5011");
        assert!(sel.matches(0x0416, 0x5011));
        assert!(!sel.matches(0x0416, 0x5012));
    }

    #[test]
    fn test_selector_parse_accepts_prefix_and_case() {
        let sel: UsbDeviceSelector = "0x04B8:0X0E15".parse().unwrap();
        assert_eq!(sel.vendor_id, 0x04b8);
        assert_eq!(sel.product_id, 0x0e15);
    }

    #[test]
    fn test_selector_parse_rejects_garbage() {
        for bad in ["", "0416", "0416:", "zzzz:0001", "10000:0001"] {
            let err = bad.parse::<UsbDeviceSelector>().unwrap_err();
            assert!(matches!(err, PrintError::Input(_)), "{:?}", bad);
        }
    }

    fn interface(number: u8, endpoints: Vec<EndpointInfo>) -> InterfaceInfo {
        InterfaceInfo {
            number,
            class: CLASS_PRINTER,
            endpoints,
        }
    }

    const BULK_OUT: EndpointInfo = EndpointInfo {
        address: 0x01,
        direction: Direction::Out,
        transfer_type: TransferType::Bulk,
    };

    const INTERRUPT_IN: EndpointInfo = EndpointInfo {
        address: 0x81,
        direction: Direction::In,
        transfer_type: TransferType::Interrupt,
    };

    #[test]
    fn test_has_print_endpoint() {
        let printer = vec![ConfigurationInfo {
            value: 1,
            interfaces: vec![interface(0, vec![INTERRUPT_IN, BULK_OUT])],
        }];
        assert!(has_print_endpoint(&printer));
        assert_eq!(
            bulk_out_endpoint(&printer[0].interfaces[0]).map(|e| e.address),
            Some(0x01)
        );
    }

    #[test]
    fn test_has_print_endpoint_only_looks_at_first_interface() {
        // webcam-like: bulk OUT lives on a later interface
        let camera = vec![ConfigurationInfo {
            value: 1,
            interfaces: vec![
                interface(0, vec![INTERRUPT_IN]),
                interface(1, vec![BULK_OUT]),
            ],
        }];
        assert!(!has_print_endpoint(&camera));
        assert!(!has_print_endpoint(&[]));
        assert!(!has_print_endpoint(&[ConfigurationInfo {
            value: 1,
            interfaces: vec![],
        }]));
    }

    #[test]
    fn test_is_bulk_out() {
        let out = EndpointInfo {
            address: 0x01,
            direction: Direction::Out,
            transfer_type: TransferType::Bulk,
        };
        let bulk_in = EndpointInfo {
            address: 0x81,
            direction: Direction::In,
            ..out
        };
        let interrupt_out = EndpointInfo {
            transfer_type: TransferType::Interrupt,
            ..out
        };
        assert!(out.is_bulk_out());
        assert!(!bulk_in.is_bulk_out());
        assert!(!interrupt_out.is_bulk_out());
    }
}
