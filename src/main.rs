//! # Comanda CLI
//!
//! Command-line interface for printing order receipts.
//!
//! ## Usage
//!
//! ```bash
//! # Print an order over the transport this binary was built with
//! comanda print order.json
//!
//! # Pick the USB printer explicitly
//! comanda print --transport usb --usb-device 0416:5011 order.json
//!
//! # Smaller BLE writes for picky printers
//! comanda print --transport ble --chunk-size 100 order.json
//!
//! # Show the bytes without printing
//! comanda encode order.json
//!
//! # Dump the default layout as a starting point for --layout
//! comanda layout > layout.json
//! ```
//!
//! Build with `--features ble` and/or `--features usb` to get a transport.
//! Set `RUST_LOG=comanda=debug` to see every chunk.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use comanda::{
    Order, PrintError, PrintResult, ReceiptEncoder, ReceiptLayout,
    transport::{ble::DEFAULT_CHUNK_SIZE, usb::UsbDeviceSelector},
};

/// Comanda - order receipt printer utility
#[derive(Parser, Debug)]
#[command(name = "comanda")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print an order on the receipt printer
    Print(PrintArgs),

    /// Encode an order to ESC/POS without printing
    Encode {
        /// Order JSON file
        order: PathBuf,

        /// Layout JSON file (defaults apply to missing fields)
        #[arg(long, value_name = "FILE")]
        layout: Option<PathBuf>,

        /// Write raw bytes here instead of a hex dump to stdout
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the default layout as JSON
    Layout,
}

#[derive(clap::Args, Debug)]
struct PrintArgs {
    /// Order JSON file
    order: PathBuf,

    /// Transport to use (defaults to the one this binary was built with)
    #[arg(long, value_enum)]
    transport: Option<TransportKind>,

    /// Layout JSON file (defaults apply to missing fields)
    #[arg(long, value_name = "FILE")]
    layout: Option<PathBuf>,

    /// BLE write size in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// BLE scan window in seconds
    #[arg(long, default_value_t = 5)]
    scan_secs: u64,

    /// BLE printer address (AA:BB:CC:DD:EE:FF)
    #[arg(long)]
    ble_address: Option<String>,

    /// USB printer as VID:PID in hex (defaults to the first non-hub device)
    #[arg(long, value_name = "VID:PID")]
    usb_device: Option<UsbDeviceSelector>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TransportKind {
    /// Bluetooth LE (GATT)
    Ble,
    /// USB bulk
    Usb,
}

impl TransportKind {
    /// Transport compiled into this binary, BLE first.
    fn built_in() -> Option<Self> {
        if cfg!(feature = "ble") {
            Some(TransportKind::Ble)
        } else if cfg!(feature = "usb") {
            Some(TransportKind::Usb)
        } else {
            None
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comanda=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}: {}", e.notice(), e);
        std::process::exit(1);
    }
}

async fn run() -> PrintResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Print(args) => {
            let order = read_order(&args.order)?;
            let layout = read_layout(args.layout.as_deref())?;

            let kind = args.transport.or_else(TransportKind::built_in).ok_or_else(|| {
                PrintError::CapabilityAbsent(
                    "no transport compiled in (build with --features ble or usb)".to_string(),
                )
            })?;

            eprintln!("Printing order #{}...", order.id);
            match kind {
                TransportKind::Ble => print_ble(&args, &order, layout).await?,
                TransportKind::Usb => print_usb(&args, &order, layout).await?,
            }
            eprintln!("Printed successfully!");
        }

        Commands::Encode {
            order,
            layout,
            output,
        } => {
            let order = read_order(&order)?;
            let layout = read_layout(layout.as_deref())?;
            let data = ReceiptEncoder::new(layout).encode(&order);

            match output {
                Some(path) => {
                    std::fs::write(&path, &data)?;
                    eprintln!("Wrote {} bytes to {}", data.len(), path.display());
                }
                None => print!("{}", hex_dump(&data)),
            }
        }

        Commands::Layout => {
            let json = serde_json::to_string_pretty(&ReceiptLayout::default())
                .map_err(|e| PrintError::Input(e.to_string()))?;
            println!("{}", json);
        }
    }

    Ok(())
}

fn read_order(path: &Path) -> PrintResult<Order> {
    let json = std::fs::read_to_string(path)?;
    Order::from_json(&json)
}

fn read_layout(path: Option<&Path>) -> PrintResult<ReceiptLayout> {
    match path {
        Some(path) => ReceiptLayout::load(path),
        None => Ok(ReceiptLayout::default()),
    }
}

#[cfg(feature = "ble")]
async fn print_ble(args: &PrintArgs, order: &Order, layout: ReceiptLayout) -> PrintResult<()> {
    use comanda::PrintService;
    use comanda::transport::BleTransport;
    use comanda::transport::ble::BleConfig;
    use comanda::transport::btle::BtleplugHost;

    let mut host = BtleplugHost::new(std::time::Duration::from_secs(args.scan_secs));
    if let Some(address) = &args.ble_address {
        host = host.with_address(address.clone());
    }
    let config = BleConfig {
        chunk_size: args.chunk_size,
        ..BleConfig::default()
    };

    let service = PrintService::new(BleTransport::with_config(host, config), layout);
    let result = service.print_order(order).await;
    service.close().await;
    result
}

#[cfg(not(feature = "ble"))]
async fn print_ble(_args: &PrintArgs, _order: &Order, _layout: ReceiptLayout) -> PrintResult<()> {
    Err(PrintError::CapabilityAbsent(
        "this binary was built without Bluetooth LE (--features ble)".to_string(),
    ))
}

#[cfg(feature = "usb")]
async fn print_usb(args: &PrintArgs, order: &Order, layout: ReceiptLayout) -> PrintResult<()> {
    use comanda::PrintService;
    use comanda::transport::UsbTransport;
    use comanda::transport::libusb::LibUsbHost;
    use comanda::transport::usb::UsbConfig;

    let host = LibUsbHost::new(UsbConfig {
        device: args.usb_device,
    });

    let service = PrintService::new(UsbTransport::new(host), layout);
    let result = service.print_order(order).await;
    service.close().await;
    result
}

#[cfg(not(feature = "usb"))]
async fn print_usb(_args: &PrintArgs, _order: &Order, _layout: ReceiptLayout) -> PrintResult<()> {
    Err(PrintError::CapabilityAbsent(
        "this binary was built without USB (--features usb)".to_string(),
    ))
}

/// Offset, hex and printable ASCII, 16 bytes per row.
fn hex_dump(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for (row, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:08x}  ", row * 16);
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push_str("|\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        let dump = hex_dump(b"\x1B@LANCHONETE PEDIDOS\n");
        assert_eq!(
            dump,
            "00000000  1b 40 4c 41 4e 43 48 4f  4e 45 54 45 20 50 45 44  |.@LANCHONETE PED|\n\
             00000010  49 44 4f 53 0a                                    |IDOS.|\n"
        );
    }

    #[test]
    fn test_cli_parses_print() {
        let cli = Cli::try_parse_from([
            "comanda",
            "print",
            "--transport",
            "usb",
            "--usb-device",
            "0416:5011",
            "order.json",
        ])
        .unwrap();
        let Commands::Print(args) = cli.command else {
            panic!("expected print");
        };
        assert_eq!(args.transport, Some(TransportKind::Usb));
        assert_eq!(args.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(
            args.usb_device,
            Some(UsbDeviceSelector {
                vendor_id: 0x0416,
                product_id: 0x5011
            })
        );
    }

    #[test]
    fn test_cli_rejects_bad_usb_device() {
        assert!(
            Cli::try_parse_from(["comanda", "print", "--usb-device", "nope", "order.json"]).is_err()
        );
    }
}
