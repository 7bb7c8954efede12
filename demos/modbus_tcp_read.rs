//! Example: Reading holding registers from a Modbus TCP device
//!
//! Run with: cargo run --example modbus_tcp_read -- 192.168.1.10:502
//!
//! This example demonstrates:
//! - Connecting a TcpTransport and wrapping it in a FrameReceiver
//! - Sending requests with send_receive and transaction-id correlation
//! - Reading the same stream twice without losing buffered bytes
//! - Telling framing errors from connection errors

use plc_framing::protocols::ModbusTcpMessage;
use plc_framing::utils::format_bytes;
use plc_framing::{FrameError, FrameReceiver, ReceiverConfig, TcpTransport};
use std::net::SocketAddr;
use std::time::Duration;

fn read_holding_registers(transaction_id: u16, unit: u8, address: u16, count: u16) -> Vec<u8> {
    let mut request = Vec::with_capacity(12);
    request.extend_from_slice(&transaction_id.to_be_bytes());
    request.extend_from_slice(&[0x00, 0x00, 0x00, 0x06, unit, 0x03]);
    request.extend_from_slice(&address.to_be_bytes());
    request.extend_from_slice(&count.to_be_bytes());
    request
}

fn main() -> plc_framing::Result<()> {
    // =========================================================================
    // Connect
    // =========================================================================

    let addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:502".to_string())
        .parse()
        .map_err(|e| FrameError::invalid_parameter("addr", format!("{}", e)))?;

    let transport = TcpTransport::connect(addr, Duration::from_secs(2))?;
    let config = ReceiverConfig::new()
        .with_read_timeout(Duration::from_millis(50))
        .with_max_frame_size(512);
    let mut receiver = FrameReceiver::with_config(transport, config);
    let mut modbus = ModbusTcpMessage::new().with_transaction_check(true);

    println!("Connected to {}", addr);

    // =========================================================================
    // Read registers
    // =========================================================================

    for (address, count) in [(0u16, 1u16), (100, 10)] {
        let request = read_holding_registers(modbus.next_transaction_id(), 1, address, count);
        println!("-> {}", format_bytes(&request));

        match receiver.send_receive(&modbus, &request, Duration::from_secs(1)) {
            Ok(reply) => {
                println!("<- {}", format_bytes(reply.as_bytes()));
                let data = reply.content();
                if data.len() > 1 {
                    let words: Vec<u16> = data[1..]
                        .chunks_exact(2)
                        .map(|w| u16::from_be_bytes([w[0], w[1]]))
                        .collect();
                    println!("HR{}..: {:?}", address, words);
                }
            }
            Err(FrameError::Timeout) => println!("No answer within 1s"),
            Err(e) if e.requires_reconnect() => {
                println!("Connection lost: {}", e);
                return Err(e);
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    Ok(())
}
