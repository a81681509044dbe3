//! # Print Orchestrator
//!
//! [`PrintService`] ties an encoder to one transport: encode the order,
//! make sure the printer is connected, deliver the bytes, report the result.
//!
//! The transport sits behind an async mutex, so concurrent `print_order`
//! calls queue up and their writes never interleave on the connection.
//! Nothing is retried automatically; a failed print is returned to the
//! caller, who decides whether to try again.

use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use crate::error::PrintResult;
use crate::order::Order;
use crate::receipt::{ReceiptEncoder, ReceiptLayout};
use crate::transport::Transport;

/// Prints orders through one transport.
///
/// ```
/// use comanda::{Order, PrintService, ReceiptLayout};
/// use comanda::transport::UsbTransport;
/// use comanda::transport::mock::MockUsbHost;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let host = MockUsbHost::printer();
/// let service = PrintService::new(UsbTransport::new(host.clone()), ReceiptLayout::default());
///
/// let order = Order::from_json(r#"{
///     "id": "abc123",
///     "customer": {"name": "Ana", "address": "Rua X", "phone": "999", "paymentMethod": "PIX"},
///     "items": [],
///     "total": 0,
///     "date": "2026-10-16T19:30:00-03:00"
/// }"#)?;
/// service.print_order(&order).await?;
///
/// assert!(host.written().starts_with(b"\x1B\x40"));
/// # Ok::<(), comanda::PrintError>(())
/// # }).unwrap();
/// ```
pub struct PrintService<T: Transport> {
    encoder: ReceiptEncoder,
    transport: Mutex<T>,
}

impl<T: Transport> PrintService<T> {
    pub fn new(transport: T, layout: ReceiptLayout) -> Self {
        Self::with_encoder(transport, ReceiptEncoder::new(layout))
    }

    pub fn with_encoder(transport: T, encoder: ReceiptEncoder) -> Self {
        Self {
            encoder,
            transport: Mutex::new(transport),
        }
    }

    pub fn encoder(&self) -> &ReceiptEncoder {
        &self.encoder
    }

    /// Connect ahead of the first print ("connect printer" button).
    #[instrument(skip(self))]
    pub async fn connect(&self) -> PrintResult<()> {
        let mut transport = self.transport.lock().await;
        transport.connect().await.inspect_err(|e| {
            error!(transport = transport.kind(), error = %e, notice = e.notice(), "connect failed");
        })?;
        info!(transport = transport.kind(), "printer ready");
        Ok(())
    }

    /// Encode and deliver one order.
    ///
    /// Connects first if the transport has no live handle. Waits for any
    /// print already in progress.
    #[instrument(skip(self, order), fields(order_id = %order.id, items = order.items.len()))]
    pub async fn print_order(&self, order: &Order) -> PrintResult<()> {
        let data = self.encoder.encode(order);

        let mut transport = self.transport.lock().await;
        let kind = transport.kind();
        if let Err(e) = transport.send(&data).await {
            error!(transport = kind, error = %e, notice = e.notice(), "print failed");
            return Err(e);
        }

        info!(transport = kind, bytes = data.len(), "order printed");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_connected()
    }

    /// Release the printer connection.
    pub async fn close(&self) {
        self.transport.lock().await.close().await;
    }

    pub fn into_transport(self) -> T {
        self.transport.into_inner()
    }
}
