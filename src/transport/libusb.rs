//! # libusb Host Backend
//!
//! [`UsbHost`] on top of rusb. libusb calls block, so each one runs on
//! tokio's blocking pool with the device handle moved in and back out.
//!
//! ## Permissions (Linux)
//!
//! The user needs write access to the device node. A udev rule such as
//!
//! ```text
//! SUBSYSTEM=="usb", ATTR{idVendor}=="0416", ATTR{idProduct}=="5011", MODE="0666"
//! ```
//!
//! avoids running as root. The kernel `usblp` driver is detached
//! automatically where libusb supports it.

use std::time::Duration;

use async_trait::async_trait;
use rusb::{Context, Device, DeviceHandle, UsbContext};
use tracing::{debug, info, warn};

use super::usb::{
    ConfigurationInfo, Direction, EndpointInfo, InterfaceInfo, TransferType, UsbConfig, UsbDevice,
    UsbDeviceSelector, UsbHost, CLASS_HUB, has_print_endpoint,
};
use crate::error::{PrintError, PrintResult};

/// USB host backed by a libusb context.
#[derive(Debug, Clone, Default)]
pub struct LibUsbHost {
    selector: Option<UsbDeviceSelector>,
}

impl LibUsbHost {
    pub fn new(config: UsbConfig) -> Self {
        Self {
            selector: config.device,
        }
    }
}

fn usb_error(context: &str, e: rusb::Error) -> PrintError {
    PrintError::Transfer(format!("{}: {}", context, e))
}

fn join_error(e: tokio::task::JoinError) -> PrintError {
    PrintError::Transfer(format!("usb worker: {}", e))
}

/// Read every configuration descriptor into plain values.
fn read_configurations(device: &Device<Context>) -> rusb::Result<Vec<ConfigurationInfo>> {
    let descriptor = device.device_descriptor()?;
    let mut configurations = Vec::with_capacity(descriptor.num_configurations() as usize);

    for index in 0..descriptor.num_configurations() {
        let config = device.config_descriptor(index)?;
        let interfaces = config
            .interfaces()
            .filter_map(|interface| {
                // alternate setting 0 only
                let alt = interface.descriptors().next()?;
                let endpoints = alt
                    .endpoint_descriptors()
                    .map(|ep| EndpointInfo {
                        address: ep.address(),
                        direction: match ep.direction() {
                            rusb::Direction::In => Direction::In,
                            rusb::Direction::Out => Direction::Out,
                        },
                        transfer_type: match ep.transfer_type() {
                            rusb::TransferType::Control => TransferType::Control,
                            rusb::TransferType::Isochronous => TransferType::Isochronous,
                            rusb::TransferType::Bulk => TransferType::Bulk,
                            rusb::TransferType::Interrupt => TransferType::Interrupt,
                        },
                    })
                    .collect();
                Some(InterfaceInfo {
                    number: alt.interface_number(),
                    class: alt.class_code(),
                    endpoints,
                })
            })
            .collect();
        configurations.push(ConfigurationInfo {
            value: config.number(),
            interfaces,
        });
    }

    Ok(configurations)
}

/// Pick a device: the `VID:PID` one if given, otherwise the first non-hub
/// device that looks printable, falling back to the first non-hub device so
/// negotiation can report what is missing.
fn choose(selector: Option<UsbDeviceSelector>) -> PrintResult<LibUsbDevice> {
    let context = Context::new()
        .map_err(|e| PrintError::CapabilityAbsent(format!("libusb: {}", e)))?;
    let devices = context
        .devices()
        .map_err(|e| PrintError::Discovery(format!("cannot list USB devices: {}", e)))?;

    let mut fallback = None;
    for device in devices.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "skipping device without descriptor");
                continue;
            }
        };
        let (vid, pid) = (descriptor.vendor_id(), descriptor.product_id());

        let wanted = match selector {
            Some(sel) => sel.matches(vid, pid),
            None => descriptor.class_code() != CLASS_HUB,
        };
        if !wanted {
            continue;
        }

        let configurations = match read_configurations(&device) {
            Ok(c) => c,
            Err(e) => {
                debug!(vid, pid, error = %e, "skipping device with unreadable descriptors");
                continue;
            }
        };

        let name = format!(
            "{:04x}:{:04x} (bus {} address {})",
            vid,
            pid,
            device.bus_number(),
            device.address()
        );
        let printable = has_print_endpoint(&configurations);
        let candidate = LibUsbDevice {
            device,
            name,
            configurations,
            handle: None,
            claimed: None,
        };

        if selector.is_some() || printable {
            return Ok(candidate);
        }
        debug!(device = %candidate.name, "no bulk OUT endpoint on first interface");
        if fallback.is_none() {
            fallback = Some(candidate);
        }
    }

    fallback.ok_or_else(|| {
        PrintError::Discovery(match selector {
            Some(sel) => format!("USB device {} not found", sel),
            None => "no USB device found".to_string(),
        })
    })
}

#[async_trait]
impl UsbHost for LibUsbHost {
    type Device = LibUsbDevice;

    async fn is_available(&self) -> bool {
        Context::new().is_ok()
    }

    async fn request_device(&self) -> PrintResult<LibUsbDevice> {
        let selector = self.selector;
        let device = tokio::task::spawn_blocking(move || choose(selector))
            .await
            .map_err(join_error)??;
        info!(device = %device.name, "usb device chosen");
        Ok(device)
    }
}

/// A device chosen by [`LibUsbHost`].
pub struct LibUsbDevice {
    device: Device<Context>,
    name: String,
    configurations: Vec<ConfigurationInfo>,
    handle: Option<DeviceHandle<Context>>,
    claimed: Option<u8>,
}

impl LibUsbDevice {
    fn take_handle(&mut self) -> PrintResult<DeviceHandle<Context>> {
        self.handle
            .take()
            .ok_or_else(|| PrintError::Transfer(format!("{} is not open", self.name)))
    }

    /// Run a blocking libusb call with the open handle.
    async fn with_handle<T, F>(&mut self, f: F) -> PrintResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DeviceHandle<Context>) -> rusb::Result<T> + Send + 'static,
    {
        let mut handle = self.take_handle()?;
        let (handle, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut handle);
            (handle, result)
        })
        .await
        .map_err(join_error)?;
        self.handle = Some(handle);
        result.map_err(|e| usb_error(&self.name, e))
    }
}

#[async_trait]
impl UsbDevice for LibUsbDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn open(&mut self) -> PrintResult<()> {
        let device = self.device.clone();
        let handle = tokio::task::spawn_blocking(move || device.open())
            .await
            .map_err(join_error)?
            .map_err(|e| usb_error(&self.name, e))?;
        self.handle = Some(handle);
        Ok(())
    }

    fn configurations(&self) -> Vec<ConfigurationInfo> {
        self.configurations.clone()
    }

    async fn select_configuration(&mut self, value: u8) -> PrintResult<()> {
        self.with_handle(move |handle| {
            if handle.active_configuration()? == value {
                return Ok(());
            }
            handle.set_active_configuration(value)
        })
        .await
    }

    async fn claim_interface(&mut self, number: u8) -> PrintResult<()> {
        self.with_handle(move |handle| {
            // Not supported on macOS/Windows; harmless there.
            let _ = handle.set_auto_detach_kernel_driver(true);
            handle.claim_interface(number)
        })
        .await?;
        self.claimed = Some(number);
        Ok(())
    }

    async fn transfer_out(&mut self, endpoint: u8, data: &[u8]) -> PrintResult<usize> {
        let data = data.to_vec();
        // Zero timeout: libusb waits until the transfer completes.
        self.with_handle(move |handle| handle.write_bulk(endpoint, &data, Duration::ZERO))
            .await
    }

    async fn close(&mut self) -> PrintResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let claimed = self.claimed.take();
        tokio::task::spawn_blocking(move || {
            let mut handle = handle;
            if let Some(number) = claimed {
                if let Err(e) = handle.release_interface(number) {
                    warn!(interface = number, error = %e, "release interface failed");
                }
            }
            // dropping the handle closes the device
        })
        .await
        .map_err(join_error)
    }
}
