//! # PLC Framing Library
//!
//! A Rust library that turns the byte stream of an industrial controller
//! connection into complete protocol frames.
//!
//! This is a **framing-only** library: no command encoding, no data
//! decoding, no connection management. Each protocol is described by a
//! [`MessageDescriptor`], and one [`FrameReceiver`] per connection reads
//! exactly one frame per call.
//!
//! ## Features
//!
//! - **Descriptor-driven** - header size, body length, sync bytes,
//!   checksum and correlation are all answered by the protocol descriptor
//! - **Three header regimes** - fixed, dynamic and terminator-delimited
//! - **Resilient** - leading garbage is skipped, surplus bytes are kept for
//!   the next frame, stray responses can be skipped by correlation
//! - **Bounded** - overall deadline, per-read timeout, maximum frame size
//!   and a cancel token
//! - **No panics** - all errors returned as `Result<T, FrameError>`
//!
//! ## Quick Start
//!
//! ```no_run
//! use plc_framing::protocols::ModbusTcpMessage;
//! use plc_framing::{FrameReceiver, TcpTransport};
//! use std::time::Duration;
//!
//! fn main() -> plc_framing::Result<()> {
//!     let addr = "192.168.1.10:502".parse().unwrap();
//!     let transport = TcpTransport::connect(addr, Duration::from_secs(2))?;
//!     let mut receiver = FrameReceiver::new(transport);
//!     let mut modbus = ModbusTcpMessage::new().with_transaction_check(true);
//!
//!     // Read 1 holding register at address 0 from unit 1
//!     let id = modbus.next_transaction_id().to_be_bytes();
//!     let request = [id[0], id[1], 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
//!     let reply = receiver.send_receive(&modbus, &request, Duration::from_secs(1))?;
//!     println!("PDU: {:02X?}", reply.content());
//!     Ok(())
//! }
//! ```
//!
//! ## Protocols
//!
//! See the [`protocols`] module for the descriptor of each supported
//! protocol. Protocols that end frames at a byte sequence and have no
//! descriptor of their own can use
//! [`SpecifiedCharacterMessage`](protocols::SpecifiedCharacterMessage).
//!
//! ## Writing a Descriptor
//!
//! ```
//! use plc_framing::{BodyLength, FrameReceiver, HeaderLength, MemoryTransport, MessageDescriptor};
//! use std::time::Duration;
//!
//! /// `[0xAA][len]` followed by `len` bytes.
//! struct Tiny;
//!
//! impl MessageDescriptor for Tiny {
//!     fn header_length(&self) -> HeaderLength {
//!         HeaderLength::Fixed(2)
//!     }
//!
//!     fn body_length(&self, header: &[u8], _sent: &[u8]) -> plc_framing::Result<BodyLength> {
//!         Ok(BodyLength::Known(header[1] as usize))
//!     }
//!
//!     fn validate_header(&self, header: &[u8]) -> bool {
//!         header[0] == 0xAA
//!     }
//! }
//!
//! let mut receiver = FrameReceiver::new(MemoryTransport::chunked(&[0xAA, 0x02, 0x01, 0x02], 1));
//! let message = receiver.receive(&Tiny, &[], Duration::from_secs(1))?;
//! assert_eq!(message.content(), &[0x01, 0x02]);
//! # Ok::<(), plc_framing::FrameError>(())
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! # use plc_framing::protocols::S7Message;
//! # use plc_framing::{FrameReceiver, TcpTransport};
//! # use std::time::Duration;
//! use plc_framing::FrameError;
//!
//! # let transport = TcpTransport::connect("127.0.0.1:102".parse().unwrap(), Duration::from_secs(1))?;
//! # let mut receiver = FrameReceiver::new(transport);
//! match receiver.receive(&S7Message, &[], Duration::from_secs(2)) {
//!     Ok(message) => println!("{} bytes", message.len()),
//!     Err(FrameError::Timeout) => println!("No answer"),
//!     Err(e) if e.requires_reconnect() => println!("Reconnect: {}", e),
//!     Err(e) => println!("Error: {}", e),
//! }
//! # Ok::<(), FrameError>(())
//! ```
//!
//! ## Logging
//!
//! Discarded bytes, skipped frames and header growth are reported through
//! [`tracing`] at `debug` and `trace` level. Install any subscriber to see
//! them.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod descriptor;
mod error;
mod message;
pub mod protocols;
mod receiver;
mod transport;
pub mod utils;

// Public re-exports
pub use descriptor::{
    find_sync, BodyLength, HeaderLength, MatchOutcome, MessageDescriptor, Terminator,
    MAX_HEADER_RESOLUTION_ATTEMPTS, PACKED_DYNAMIC,
};
pub use error::{FrameError, Result};
pub use message::RawMessage;
pub use receiver::{
    CancelToken, FrameReceiver, ReceiverConfig, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_MAX_RESYNC_ATTEMPTS, DEFAULT_READ_TIMEOUT,
};
pub use transport::{
    ByteSink, ByteSource, MemoryTransport, TcpTransport, UdpTransport, MAX_DATAGRAM_SIZE,
};
