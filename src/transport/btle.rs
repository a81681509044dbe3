//! # btleplug Host Backend
//!
//! [`GattHost`] on top of btleplug (BlueZ on Linux, CoreBluetooth on macOS,
//! WinRT on Windows).
//!
//! There is no picker dialog on a headless host, so the chooser scans for a
//! fixed window and takes the first peripheral advertising the required
//! service, or the one with the configured address.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ble::{GattCharacteristic, GattDevice, GattHost, ServiceFilter};
use crate::error::{PrintError, PrintResult};

/// Default scan window
pub const DEFAULT_SCAN: Duration = Duration::from_secs(5);

/// Bluetooth LE host backed by the first system adapter.
#[derive(Debug, Clone)]
pub struct BtleplugHost {
    scan_window: Duration,
    address: Option<String>,
}

impl Default for BtleplugHost {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN)
    }
}

impl BtleplugHost {
    pub fn new(scan_window: Duration) -> Self {
        Self {
            scan_window,
            address: None,
        }
    }

    /// Only accept the peripheral with this address (`AA:BB:CC:DD:EE:FF`).
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    async fn adapter() -> Option<Adapter> {
        let manager = match Manager::new().await {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "no bluetooth manager");
                return None;
            }
        };
        match manager.adapters().await {
            Ok(adapters) => adapters.into_iter().next(),
            Err(e) => {
                debug!(error = %e, "cannot list bluetooth adapters");
                None
            }
        }
    }

    async fn matches(&self, peripheral: &Peripheral, filter: &ServiceFilter) -> bool {
        if let Some(address) = &self.address {
            return peripheral.address().to_string().eq_ignore_ascii_case(address);
        }
        match peripheral.properties().await {
            Ok(Some(props)) => props.services.contains(&filter.required),
            _ => false,
        }
    }
}

fn discovery_error(e: btleplug::Error) -> PrintError {
    PrintError::Discovery(e.to_string())
}

#[async_trait]
impl GattHost for BtleplugHost {
    type Device = BtleplugDevice;

    async fn is_available(&self) -> bool {
        Self::adapter().await.is_some()
    }

    async fn request_device(&self, filter: &ServiceFilter) -> PrintResult<BtleplugDevice> {
        let adapter = Self::adapter()
            .await
            .ok_or_else(|| PrintError::CapabilityAbsent("no bluetooth adapter".to_string()))?;

        // Scan unfiltered when an address is given: some printers do not
        // advertise their service UUID.
        let scan_filter = match self.address {
            Some(_) => ScanFilter::default(),
            None => ScanFilter {
                services: vec![filter.required],
            },
        };

        info!(window_secs = self.scan_window.as_secs_f32(), "scanning for printers");
        adapter.start_scan(scan_filter).await.map_err(discovery_error)?;
        tokio::time::sleep(self.scan_window).await;

        let peripherals = adapter.peripherals().await.map_err(discovery_error)?;
        if let Err(e) = adapter.stop_scan().await {
            warn!(error = %e, "stop scan failed");
        }

        for peripheral in peripherals {
            if self.matches(&peripheral, filter).await {
                let name = match peripheral.properties().await {
                    Ok(Some(props)) => props.local_name,
                    _ => None,
                }
                .unwrap_or_else(|| peripheral.address().to_string());
                return Ok(BtleplugDevice {
                    peripheral,
                    name,
                    characteristics: BTreeSet::new(),
                });
            }
        }

        Err(PrintError::Discovery(match &self.address {
            Some(address) => format!("printer {} not found", address),
            None => format!("no printer advertising {}", filter.required),
        }))
    }
}

/// A peripheral found by [`BtleplugHost`].
pub struct BtleplugDevice {
    peripheral: Peripheral,
    name: String,
    characteristics: BTreeSet<Characteristic>,
}

impl BtleplugDevice {
    fn find(&self, characteristic: &GattCharacteristic) -> Option<&Characteristic> {
        self.characteristics
            .iter()
            .find(|c| c.uuid == characteristic.uuid && c.service_uuid == characteristic.service)
    }
}

fn to_gatt(c: &Characteristic) -> GattCharacteristic {
    GattCharacteristic {
        uuid: c.uuid,
        service: c.service_uuid,
        write: c.properties.contains(CharPropFlags::WRITE),
        write_without_response: c.properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
    }
}

#[async_trait]
impl GattDevice for BtleplugDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn connect(&mut self) -> PrintResult<()> {
        let transfer = |e: btleplug::Error| PrintError::Transfer(e.to_string());
        if !self.peripheral.is_connected().await.map_err(transfer)? {
            self.peripheral.connect().await.map_err(transfer)?;
        }
        self.peripheral.discover_services().await.map_err(transfer)?;
        self.characteristics = self.peripheral.characteristics();
        debug!(count = self.characteristics.len(), "characteristics discovered");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn characteristics(&self, service: Uuid) -> PrintResult<Vec<GattCharacteristic>> {
        Ok(self
            .characteristics
            .iter()
            .filter(|c| c.service_uuid == service)
            .map(to_gatt)
            .collect())
    }

    async fn write(&self, characteristic: &GattCharacteristic, chunk: &[u8]) -> PrintResult<()> {
        let target = self.find(characteristic).ok_or_else(|| {
            PrintError::Transfer(format!("characteristic {} gone", characteristic.uuid))
        })?;
        let write_type = if characteristic.write {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral
            .write(target, chunk, write_type)
            .await
            .map_err(|e| PrintError::Transfer(e.to_string()))
    }

    async fn disconnect(&mut self) -> PrintResult<()> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| PrintError::Transfer(e.to_string()))
    }
}
