//! # Transport Tests
//!
//! Connection and delivery behaviour of both transports and the print
//! service, driven through the scripted hosts in `comanda::transport::mock`.

use comanda::transport::ble::{
    BleConfig, GattCharacteristic, SERIAL_SERVICE, SERIAL_WRITE_CHARACTERISTIC, VENDOR_SERVICE,
    VENDOR_WRITE_CHARACTERISTIC,
};
use comanda::transport::mock::{MockEvent, MockGattHost, MockUsbHost};
use comanda::transport::usb::{
    ConfigurationInfo, Direction, EndpointInfo, InterfaceInfo, TransferType,
};
use comanda::transport::{BleTransport, Transport, UsbTransport};
use comanda::{FailureKind, Order, PrintService, ReceiptLayout};
use pretty_assertions::assert_eq;
use uuid::Uuid;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn ble(host: &MockGattHost, chunk_size: usize) -> BleTransport<MockGattHost> {
    BleTransport::with_config(
        host.clone(),
        BleConfig {
            chunk_size,
            ..BleConfig::default()
        },
    )
}

fn order(id: &str) -> Order {
    Order::from_json(&format!(
        r#"{{
            "id": "{}",
            "customer": {{"name": "Ana", "address": "Rua X, 10", "phone": "999",
                          "paymentMethod": "CARD"}},
            "items": [{{"id": "1", "name": "X-Burguer", "price": "18.00", "quantity": 2}}],
            "total": "36.00",
            "date": "2026-10-16T19:30:00-03:00"
        }}"#,
        id
    ))
    .unwrap()
}

fn writable(service: Uuid, uuid: Uuid) -> GattCharacteristic {
    GattCharacteristic {
        uuid,
        service,
        write: true,
        write_without_response: false,
    }
}

// ============================================================================
// BLE
// ============================================================================

#[tokio::test]
async fn test_ble_chunks_reassemble_to_buffer() {
    for (len, chunk) in [(1200, 512), (512, 512), (513, 512), (1, 512), (100, 7)] {
        let host = MockGattHost::printer();
        let mut transport = ble(&host, chunk);
        let data = payload(len);

        transport.send(&data).await.unwrap();

        let chunks = host.chunks();
        assert_eq!(chunks.len(), len.div_ceil(chunk), "len {} chunk {}", len, chunk);
        assert!(chunks.iter().all(|c| c.len() <= chunk));
        assert_eq!(host.written(), data);
    }
}

#[tokio::test]
async fn test_ble_1200_bytes_in_three_writes() {
    let host = MockGattHost::printer();
    let mut transport = ble(&host, 512);

    transport.send(&payload(1200)).await.unwrap();

    let sizes: Vec<usize> = host.chunks().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![512, 512, 176]);
    assert_eq!(host.max_in_flight(), 1);
}

#[tokio::test]
async fn test_ble_capability_absent_requests_nothing() {
    let host = MockGattHost::printer().unavailable();
    let mut transport = ble(&host, 512);

    let err = transport.send(b"hello").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::CapabilityAbsent);
    assert_eq!(host.requests(), 0);
    assert!(host.written().is_empty());
}

#[tokio::test]
async fn test_ble_no_device_is_discovery_failure() {
    let host = MockGattHost::printer().no_device();
    let mut transport = ble(&host, 512);

    let err = transport.connect().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Discovery);
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn test_ble_missing_characteristic_is_negotiation_failure() {
    let host = MockGattHost::with_services(vec![(
        comanda::transport::ble::PRINTER_SERVICE,
        vec![GattCharacteristic {
            write: false,
            write_without_response: false,
            ..writable(
                comanda::transport::ble::PRINTER_SERVICE,
                comanda::transport::ble::PRINTER_WRITE_CHARACTERISTIC,
            )
        }],
    )]);
    let mut transport = ble(&host, 512);

    let err = transport.send(b"hello").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Negotiation);
    assert!(host.written().is_empty());
    assert!(!host.is_device_connected());
}

#[tokio::test]
async fn test_ble_falls_back_to_vendor_service() {
    let other = Uuid::from_u128(0x1234);
    let host = MockGattHost::with_services(vec![(
        VENDOR_SERVICE,
        vec![
            writable(VENDOR_SERVICE, other),
            writable(VENDOR_SERVICE, VENDOR_WRITE_CHARACTERISTIC),
        ],
    )]);
    let mut transport = ble(&host, 512);

    transport.send(b"hello").await.unwrap();

    assert_eq!(host.written(), b"hello");
}

#[tokio::test]
async fn test_ble_serial_service_any_writable() {
    let host = MockGattHost::with_services(vec![(
        SERIAL_SERVICE,
        vec![writable(SERIAL_SERVICE, SERIAL_WRITE_CHARACTERISTIC)],
    )]);
    let mut transport = ble(&host, 512);

    transport.connect().await.unwrap();

    assert!(transport.is_connected());
}

#[tokio::test]
async fn test_ble_write_failure_keeps_handle() {
    let host = MockGattHost::printer().fail_write_at(1);
    let mut transport = ble(&host, 4);

    let err = transport.send(b"abcdefghij").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Transfer);
    // first chunk stays written
    assert_eq!(host.chunks(), vec![b"abcd".to_vec()]);
    assert!(transport.is_connected());

    host.heal();
    transport.send(b"xyz").await.unwrap();

    assert_eq!(host.requests(), 1);
    assert_eq!(host.chunks().last(), Some(&b"xyz".to_vec()));
}

#[tokio::test]
async fn test_ble_stale_handle_reconnects() {
    let host = MockGattHost::printer();
    let mut transport = ble(&host, 512);

    transport.send(b"first").await.unwrap();
    host.drop_connection();
    transport.send(b"second").await.unwrap();

    assert_eq!(host.requests(), 2);
    assert_eq!(host.written(), b"firstsecond");
}

#[tokio::test]
async fn test_ble_connect_twice_keeps_one_device() {
    let host = MockGattHost::printer();
    let mut transport = ble(&host, 512);

    transport.connect().await.unwrap();
    transport.connect().await.unwrap();
    transport.send(b"hello").await.unwrap();

    assert!(transport.is_connected());
    assert_eq!(host.requests(), 1);
    let connects = host
        .events()
        .into_iter()
        .filter(|e| *e == MockEvent::Connected)
        .count();
    assert_eq!(connects, 1);
    assert_eq!(host.written(), b"hello");
}

#[tokio::test]
async fn test_ble_connect_after_link_loss_reconnects() {
    let host = MockGattHost::printer();
    let mut transport = ble(&host, 512);

    transport.connect().await.unwrap();
    host.drop_connection();
    transport.connect().await.unwrap();

    assert!(transport.is_connected());
    assert_eq!(host.requests(), 2);
}

#[tokio::test]
async fn test_ble_close_disconnects() {
    let host = MockGattHost::printer();
    let mut transport = ble(&host, 512);

    transport.connect().await.unwrap();
    transport.close().await;

    assert!(!transport.is_connected());
    assert!(!host.is_device_connected());
    assert_eq!(host.events().last(), Some(&MockEvent::Disconnected));
}

// ============================================================================
// USB
// ============================================================================

#[tokio::test]
async fn test_usb_single_transfer() {
    let host = MockUsbHost::printer();
    let mut transport = UsbTransport::new(host.clone());
    let data = payload(4096);

    transport.send(&data).await.unwrap();

    assert_eq!(host.transfers(), vec![data]);
    assert_eq!(
        host.events(),
        vec![
            MockEvent::Requested,
            MockEvent::Opened,
            MockEvent::ConfigurationSelected(1),
            MockEvent::InterfaceClaimed(0),
            MockEvent::Write(4096),
        ]
    );
}

#[tokio::test]
async fn test_usb_missing_bulk_out_transfers_nothing() {
    let host = MockUsbHost::printer().without_bulk_out();
    let mut transport = UsbTransport::new(host.clone());

    let err = transport.connect().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Negotiation);
    assert!(err.notice().contains("endpoint not found"));
    assert!(host.transfers().is_empty());
    assert!(!host.is_device_open());
}

#[tokio::test]
async fn test_usb_only_first_interface_is_used() {
    let bulk_out = EndpointInfo {
        address: 0x02,
        direction: Direction::Out,
        transfer_type: TransferType::Bulk,
    };
    let host = MockUsbHost::with_configurations(vec![ConfigurationInfo {
        value: 1,
        interfaces: vec![
            InterfaceInfo {
                number: 0,
                class: 0xff,
                endpoints: vec![EndpointInfo {
                    address: 0x83,
                    direction: Direction::In,
                    transfer_type: TransferType::Interrupt,
                }],
            },
            InterfaceInfo {
                number: 1,
                class: 0x07,
                endpoints: vec![bulk_out],
            },
        ],
    }]);
    let mut transport = UsbTransport::new(host.clone());

    let err = transport.send(b"hello").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Negotiation);
    assert!(host.transfers().is_empty());
}

#[tokio::test]
async fn test_usb_connect_twice_keeps_one_device() {
    let host = MockUsbHost::printer();
    let mut transport = UsbTransport::new(host.clone());

    transport.connect().await.unwrap();
    transport.connect().await.unwrap();
    transport.send(b"hello").await.unwrap();

    assert!(transport.is_connected());
    assert!(host.is_device_open());
    assert_eq!(host.requests(), 1);
    assert_eq!(
        host.events(),
        vec![
            MockEvent::Requested,
            MockEvent::Opened,
            MockEvent::ConfigurationSelected(1),
            MockEvent::InterfaceClaimed(0),
            MockEvent::Write(5),
        ]
    );
}

#[tokio::test]
async fn test_usb_capability_absent_requests_nothing() {
    let host = MockUsbHost::printer().unavailable();
    let mut transport = UsbTransport::new(host.clone());

    let err = transport.send(b"hello").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::CapabilityAbsent);
    assert_eq!(host.requests(), 0);
}

#[tokio::test]
async fn test_usb_transfer_failure_closes_then_reconnects() {
    let host = MockUsbHost::printer().fail_transfer_at(0);
    let mut transport = UsbTransport::new(host.clone());

    let err = transport.send(b"first").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Transfer);
    assert!(!transport.is_connected());
    assert!(!host.is_device_open());
    assert_eq!(host.events().last(), Some(&MockEvent::Closed));

    transport.send(b"second").await.unwrap();

    assert_eq!(host.requests(), 2);
    assert_eq!(host.transfers(), vec![b"second".to_vec()]);
}

#[tokio::test]
async fn test_usb_close_error_is_swallowed() {
    let host = MockUsbHost::printer().fail_transfer_at(0).fail_close();
    let mut transport = UsbTransport::new(host.clone());

    let err = transport.send(b"first").await.unwrap_err();

    // the transfer error is reported, not the close error
    assert_eq!(err.kind(), FailureKind::Transfer);
    assert!(err.to_string().contains("stalled"));
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn test_usb_short_write_is_transfer_failure() {
    let host = MockUsbHost::printer().accept_at_most(3);
    let mut transport = UsbTransport::new(host.clone());

    let err = transport.send(b"hello").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Transfer);
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn test_usb_open_failure_aborts_send() {
    let host = MockUsbHost::printer().fail_open();
    let mut transport = UsbTransport::new(host.clone());

    assert!(transport.send(b"hello").await.is_err());
    assert!(host.transfers().is_empty());
}

// ============================================================================
// PRINT SERVICE
// ============================================================================

#[tokio::test]
async fn test_concurrent_prints_do_not_interleave() {
    let host = MockGattHost::printer();
    let service = PrintService::new(ble(&host, 16), ReceiptLayout::default());

    let (a, b) = (order("aaaaaaaa-1"), order("bbbbbbbb-2"));
    let (ra, rb) = tokio::join!(service.print_order(&a), service.print_order(&b));
    ra.unwrap();
    rb.unwrap();

    assert_eq!(host.max_in_flight(), 1);
    assert_eq!(host.requests(), 1);

    let first = service.encoder().encode(&a);
    let second = service.encoder().encode(&b);
    let written = host.written();
    let expected_ab = [first.clone(), second.clone()].concat();
    let expected_ba = [second, first].concat();
    assert!(written == expected_ab || written == expected_ba);
}

#[tokio::test]
async fn test_print_failure_names_category() {
    let host = MockUsbHost::printer().without_bulk_out();
    let service = PrintService::new(UsbTransport::new(host.clone()), ReceiptLayout::default());

    let err = service.print_order(&order("abc")).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Negotiation);
    assert!(host.transfers().is_empty());
}

#[tokio::test]
async fn test_print_uses_layout() {
    let host = MockUsbHost::printer();
    let layout = ReceiptLayout {
        store_name: "Cantinho da Sandra".to_string(),
        footer: Some("Obrigado pela preferencia!".to_string()),
        ..ReceiptLayout::default()
    };
    let service = PrintService::new(UsbTransport::new(host.clone()), layout);

    service.print_order(&order("abc")).await.unwrap();

    let text = String::from_utf8_lossy(&host.written()).into_owned();
    assert!(text.contains("Cantinho da Sandra\n"));
    assert!(text.contains("Obrigado pela preferencia!\n"));
    assert!(text.contains("Pagamento: Cartao\n"));
}
