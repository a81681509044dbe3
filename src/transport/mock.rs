//! # Scripted Host Doubles
//!
//! In-memory [`GattHost`] and [`UsbHost`] implementations that record every
//! call and can be told to fail at a chosen step.
//!
//! Hosts are cheap handles onto shared state: clone one, hand the clone to a
//! transport, and inspect the original afterwards.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use super::ble::{
    GattCharacteristic, GattDevice, GattHost, ServiceFilter, PRINTER_SERVICE,
    PRINTER_WRITE_CHARACTERISTIC,
};
use super::usb::{
    ConfigurationInfo, Direction, EndpointInfo, InterfaceInfo, TransferType, UsbDevice, UsbHost,
    CLASS_PRINTER,
};
use crate::error::{PrintError, PrintResult};

/// A call observed by a mock host or device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// Chooser invoked
    Requested,
    Connected,
    /// USB device opened
    Opened,
    ConfigurationSelected(u8),
    InterfaceClaimed(u8),
    /// One write / transfer of this many bytes
    Write(usize),
    Disconnected,
    Closed,
}

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tracks overlapping writes so tests can assert they never happen.
#[derive(Debug, Default)]
struct Flight {
    current: usize,
    max: usize,
}

impl Flight {
    fn enter(&mut self) {
        self.current += 1;
        self.max = self.max.max(self.current);
    }

    fn leave(&mut self) {
        self.current = self.current.saturating_sub(1);
    }
}

// ============================================================================
// BLE
// ============================================================================

#[derive(Debug)]
struct GattState {
    available: bool,
    device_present: bool,
    services: Vec<(Uuid, Vec<GattCharacteristic>)>,
    connected: bool,
    fail_connect: bool,
    /// Zero-based index (across all writes) of the write that fails
    fail_write_at: Option<usize>,
    write_calls: usize,
    chunks: Vec<Vec<u8>>,
    events: Vec<MockEvent>,
    requests: usize,
    flight: Flight,
}

/// Scripted Bluetooth LE host.
#[derive(Debug, Clone)]
pub struct MockGattHost {
    state: Arc<Mutex<GattState>>,
}

impl MockGattHost {
    /// A host with one printer exposing the standard printer service.
    pub fn printer() -> Self {
        Self::with_services(vec![(
            PRINTER_SERVICE,
            vec![GattCharacteristic {
                uuid: PRINTER_WRITE_CHARACTERISTIC,
                service: PRINTER_SERVICE,
                write: true,
                write_without_response: true,
            }],
        )])
    }

    /// A host with one device exposing exactly these services.
    pub fn with_services(services: Vec<(Uuid, Vec<GattCharacteristic>)>) -> Self {
        Self {
            state: Arc::new(Mutex::new(GattState {
                available: true,
                device_present: true,
                services,
                connected: false,
                fail_connect: false,
                fail_write_at: None,
                write_calls: 0,
                chunks: Vec::new(),
                events: Vec::new(),
                requests: 0,
                flight: Flight::default(),
            })),
        }
    }

    /// Host without Bluetooth LE support.
    pub fn unavailable(self) -> Self {
        lock(&self.state).available = false;
        self
    }

    /// Chooser returns nothing (user cancelled).
    pub fn no_device(self) -> Self {
        lock(&self.state).device_present = false;
        self
    }

    pub fn fail_connect(self) -> Self {
        lock(&self.state).fail_connect = true;
        self
    }

    /// Fail the `index`-th write call (zero-based, counted across sends).
    pub fn fail_write_at(self, index: usize) -> Self {
        lock(&self.state).fail_write_at = Some(index);
        self
    }

    /// Stop failing writes.
    pub fn heal(&self) {
        lock(&self.state).fail_write_at = None;
    }

    /// Simulate the printer dropping the GATT link.
    pub fn drop_connection(&self) {
        let mut state = lock(&self.state);
        state.connected = false;
        state.events.push(MockEvent::Disconnected);
    }

    /// Successful chunks, in write order.
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        lock(&self.state).chunks.clone()
    }

    /// All successfully written bytes, concatenated.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.state).chunks.concat()
    }

    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.state).events.clone()
    }

    /// Number of chooser invocations.
    pub fn requests(&self) -> usize {
        lock(&self.state).requests
    }

    /// Most writes ever in progress at once.
    pub fn max_in_flight(&self) -> usize {
        lock(&self.state).flight.max
    }

    pub fn is_device_connected(&self) -> bool {
        lock(&self.state).connected
    }
}

#[async_trait]
impl GattHost for MockGattHost {
    type Device = MockGattDevice;

    async fn is_available(&self) -> bool {
        lock(&self.state).available
    }

    async fn request_device(&self, _filter: &ServiceFilter) -> PrintResult<MockGattDevice> {
        let mut state = lock(&self.state);
        state.requests += 1;
        state.events.push(MockEvent::Requested);
        if !state.device_present {
            return Err(PrintError::Discovery("no device selected".to_string()));
        }
        Ok(MockGattDevice {
            state: Arc::clone(&self.state),
        })
    }
}

/// Device handed out by [`MockGattHost`].
#[derive(Debug)]
pub struct MockGattDevice {
    state: Arc<Mutex<GattState>>,
}

#[async_trait]
impl GattDevice for MockGattDevice {
    fn name(&self) -> String {
        "MockPrinter".to_string()
    }

    async fn connect(&mut self) -> PrintResult<()> {
        let mut state = lock(&self.state);
        if state.fail_connect {
            return Err(PrintError::Transfer("GATT connect refused".to_string()));
        }
        state.connected = true;
        state.events.push(MockEvent::Connected);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    async fn characteristics(&self, service: Uuid) -> PrintResult<Vec<GattCharacteristic>> {
        let state = lock(&self.state);
        Ok(state
            .services
            .iter()
            .find(|(uuid, _)| *uuid == service)
            .map(|(_, chars)| chars.clone())
            .unwrap_or_default())
    }

    async fn write(&self, _characteristic: &GattCharacteristic, chunk: &[u8]) -> PrintResult<()> {
        let call = {
            let mut state = lock(&self.state);
            state.flight.enter();
            let call = state.write_calls;
            state.write_calls += 1;
            call
        };

        // Give any concurrent writer a chance to overlap.
        tokio::task::yield_now().await;

        let mut state = lock(&self.state);
        state.flight.leave();
        if !state.connected {
            return Err(PrintError::Transfer("GATT server disconnected".to_string()));
        }
        if state.fail_write_at == Some(call) {
            return Err(PrintError::Transfer(format!("write {} rejected", call)));
        }
        state.chunks.push(chunk.to_vec());
        state.events.push(MockEvent::Write(chunk.len()));
        Ok(())
    }

    async fn disconnect(&mut self) -> PrintResult<()> {
        let mut state = lock(&self.state);
        state.connected = false;
        state.events.push(MockEvent::Disconnected);
        Ok(())
    }
}

// ============================================================================
// USB
// ============================================================================

#[derive(Debug)]
struct UsbState {
    available: bool,
    device_present: bool,
    configurations: Vec<ConfigurationInfo>,
    open: bool,
    fail_open: bool,
    fail_close: bool,
    /// Zero-based index of the transfer that fails
    fail_transfer_at: Option<usize>,
    /// Accept only this many bytes per transfer
    accept_limit: Option<usize>,
    transfer_calls: usize,
    transfers: Vec<Vec<u8>>,
    events: Vec<MockEvent>,
    requests: usize,
    flight: Flight,
}

/// Scripted USB host.
#[derive(Debug, Clone)]
pub struct MockUsbHost {
    state: Arc<Mutex<UsbState>>,
}

impl MockUsbHost {
    /// A host with one printer: configuration 1, interface 0 with bulk
    /// IN 0x81 and bulk OUT 0x01.
    pub fn printer() -> Self {
        Self::with_configurations(vec![ConfigurationInfo {
            value: 1,
            interfaces: vec![InterfaceInfo {
                number: 0,
                class: CLASS_PRINTER,
                endpoints: vec![
                    EndpointInfo {
                        address: 0x81,
                        direction: Direction::In,
                        transfer_type: TransferType::Bulk,
                    },
                    EndpointInfo {
                        address: 0x01,
                        direction: Direction::Out,
                        transfer_type: TransferType::Bulk,
                    },
                ],
            }],
        }])
    }

    pub fn with_configurations(configurations: Vec<ConfigurationInfo>) -> Self {
        Self {
            state: Arc::new(Mutex::new(UsbState {
                available: true,
                device_present: true,
                configurations,
                open: false,
                fail_open: false,
                fail_close: false,
                fail_transfer_at: None,
                accept_limit: None,
                transfer_calls: 0,
                transfers: Vec::new(),
                events: Vec::new(),
                requests: 0,
                flight: Flight::default(),
            })),
        }
    }

    /// Drop every bulk OUT endpoint from the first interface.
    pub fn without_bulk_out(self) -> Self {
        {
            let mut state = lock(&self.state);
            for config in &mut state.configurations {
                if let Some(interface) = config.interfaces.first_mut() {
                    interface.endpoints.retain(|e| !e.is_bulk_out());
                }
            }
        }
        self
    }

    pub fn unavailable(self) -> Self {
        lock(&self.state).available = false;
        self
    }

    pub fn no_device(self) -> Self {
        lock(&self.state).device_present = false;
        self
    }

    pub fn fail_open(self) -> Self {
        lock(&self.state).fail_open = true;
        self
    }

    /// Make `close()` return an error.
    pub fn fail_close(self) -> Self {
        lock(&self.state).fail_close = true;
        self
    }

    /// Fail the `index`-th transfer (zero-based, counted across sends).
    pub fn fail_transfer_at(self, index: usize) -> Self {
        lock(&self.state).fail_transfer_at = Some(index);
        self
    }

    /// Accept at most `limit` bytes per transfer (short writes).
    pub fn accept_at_most(self, limit: usize) -> Self {
        lock(&self.state).accept_limit = Some(limit);
        self
    }

    /// Successful transfers, in order.
    pub fn transfers(&self) -> Vec<Vec<u8>> {
        lock(&self.state).transfers.clone()
    }

    pub fn written(&self) -> Vec<u8> {
        lock(&self.state).transfers.concat()
    }

    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.state).events.clone()
    }

    pub fn requests(&self) -> usize {
        lock(&self.state).requests
    }

    pub fn max_in_flight(&self) -> usize {
        lock(&self.state).flight.max
    }

    pub fn is_device_open(&self) -> bool {
        lock(&self.state).open
    }
}

#[async_trait]
impl UsbHost for MockUsbHost {
    type Device = MockUsbDevice;

    async fn is_available(&self) -> bool {
        lock(&self.state).available
    }

    async fn request_device(&self) -> PrintResult<MockUsbDevice> {
        let mut state = lock(&self.state);
        state.requests += 1;
        state.events.push(MockEvent::Requested);
        if !state.device_present {
            return Err(PrintError::Discovery("no device selected".to_string()));
        }
        Ok(MockUsbDevice {
            state: Arc::clone(&self.state),
        })
    }
}

/// Device handed out by [`MockUsbHost`].
#[derive(Debug)]
pub struct MockUsbDevice {
    state: Arc<Mutex<UsbState>>,
}

#[async_trait]
impl UsbDevice for MockUsbDevice {
    fn name(&self) -> String {
        "MockPrinter (0416:5011)".to_string()
    }

    async fn open(&mut self) -> PrintResult<()> {
        let mut state = lock(&self.state);
        if state.fail_open {
            return Err(PrintError::Transfer("access denied".to_string()));
        }
        state.open = true;
        state.events.push(MockEvent::Opened);
        Ok(())
    }

    fn configurations(&self) -> Vec<ConfigurationInfo> {
        lock(&self.state).configurations.clone()
    }

    async fn select_configuration(&mut self, value: u8) -> PrintResult<()> {
        lock(&self.state)
            .events
            .push(MockEvent::ConfigurationSelected(value));
        Ok(())
    }

    async fn claim_interface(&mut self, number: u8) -> PrintResult<()> {
        lock(&self.state).events.push(MockEvent::InterfaceClaimed(number));
        Ok(())
    }

    async fn transfer_out(&mut self, _endpoint: u8, data: &[u8]) -> PrintResult<usize> {
        let call = {
            let mut state = lock(&self.state);
            state.flight.enter();
            let call = state.transfer_calls;
            state.transfer_calls += 1;
            call
        };

        tokio::task::yield_now().await;

        let mut state = lock(&self.state);
        state.flight.leave();
        if !state.open {
            return Err(PrintError::Transfer("device not open".to_string()));
        }
        if state.fail_transfer_at == Some(call) {
            return Err(PrintError::Transfer("transfer stalled".to_string()));
        }
        let accepted = state.accept_limit.map_or(data.len(), |limit| limit.min(data.len()));
        state.transfers.push(data[..accepted].to_vec());
        state.events.push(MockEvent::Write(accepted));
        Ok(accepted)
    }

    async fn close(&mut self) -> PrintResult<()> {
        let mut state = lock(&self.state);
        state.open = false;
        state.events.push(MockEvent::Closed);
        if state.fail_close {
            return Err(PrintError::Transfer("close failed".to_string()));
        }
        Ok(())
    }
}
