//! Modbus framing: TCP (MBAP), RTU and ASCII.
//!
//! # Modbus TCP
//!
//! | Byte | Field |
//! |------|-------|
//! | 0-1 | transaction id, echoed by the server |
//! | 2-3 | protocol id, always `0x0000` |
//! | 4-5 | length of unit id + PDU, big-endian |
//! | 6 | unit id |
//! | 7 | function code |
//!
//! The descriptor reads those 8 bytes as the header, so the body is the
//! length field minus 2.
//!
//! # Modbus RTU
//!
//! `[station][function]` followed by a function-specific body and a
//! little-endian CRC-16. Read responses carry a byte count as their third
//! byte, so the header grows by one byte before the body length is known.
//!
//! # Modbus ASCII
//!
//! `:` followed by hex-encoded station, PDU and LRC, terminated by CR LF.

use crate::descriptor::{
    find_sync, BodyLength, HeaderLength, MatchOutcome, MessageDescriptor, Terminator,
};
use crate::error::{FrameError, Result};
use crate::utils::{crc16_modbus, decode_ascii_hex, lrc, parse_hex_byte};

/// MBAP header plus function code.
pub const MODBUS_TCP_HEADER_SIZE: usize = 8;

/// Ceiling applied to the Modbus TCP body length against corrupt length
/// fields.
pub const MODBUS_TCP_MAX_BODY: usize = 300;

/// Modbus TCP (MBAP framing).
///
/// Owns the transaction counter of its connection.
///
/// # Example
///
/// ```
/// use plc_framing::protocols::ModbusTcpMessage;
/// use plc_framing::{BodyLength, MatchOutcome, MessageDescriptor};
///
/// let mut modbus = ModbusTcpMessage::new();
/// let id = modbus.next_transaction_id();
/// assert_eq!(modbus.next_transaction_id(), id.wrapping_add(1));
///
/// let header = [0x01, 0x00, 0x00, 0x00, 0x00, 0x17, 0x01, 0x03];
/// assert_eq!(modbus.body_length(&header, &[]).unwrap(), BodyLength::Known(0x17 - 2));
///
/// let request = [0x01, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
/// assert_eq!(modbus.match_response(&request, &header), MatchOutcome::Accept);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusTcpMessage {
    check_transaction_id: bool,
    transaction_id: u16,
}

impl Default for ModbusTcpMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl ModbusTcpMessage {
    /// Creates a descriptor that checks transaction ids.
    pub fn new() -> Self {
        Self {
            check_transaction_id: true,
            transaction_id: 0,
        }
    }

    /// Enables or disables transaction id matching (default enabled).
    ///
    /// Some gateways answer with a zero transaction id; disable matching
    /// for them.
    pub fn with_transaction_check(mut self, enabled: bool) -> Self {
        self.check_transaction_id = enabled;
        self
    }

    /// Returns the next transaction id of this connection.
    pub fn next_transaction_id(&mut self) -> u16 {
        let id = self.transaction_id;
        self.transaction_id = self.transaction_id.wrapping_add(1);
        id
    }
}

impl MessageDescriptor for ModbusTcpMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(MODBUS_TCP_HEADER_SIZE)
    }

    fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        Ok(BodyLength::Known(
            length.saturating_sub(2).min(MODBUS_TCP_MAX_BODY),
        ))
    }

    fn validate_header(&self, header: &[u8]) -> bool {
        header[2] == 0x00 && header[3] == 0x00
    }

    fn correlation_id(&self, frame: &[u8]) -> Option<u32> {
        if frame.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([frame[0], frame[1]]) as u32)
    }

    fn match_response(&self, sent: &[u8], received: &[u8]) -> MatchOutcome {
        if !self.check_transaction_id {
            return MatchOutcome::Accept;
        }
        match (self.correlation_id(sent), self.correlation_id(received)) {
            (Some(expected), Some(actual)) if expected != actual => MatchOutcome::Continue,
            _ => MatchOutcome::Accept,
        }
    }
}

/// Matches station addresses on a shared serial bus.
fn match_station(check: bool, sent: Option<u32>, received: Option<u32>) -> MatchOutcome {
    match (check, sent, received) {
        // Broadcast requests get no answer worth matching.
        (true, Some(0), _) => MatchOutcome::Accept,
        (true, Some(expected), Some(actual)) if expected != actual => MatchOutcome::Continue,
        _ => MatchOutcome::Accept,
    }
}

/// Modbus RTU over a serial line.
///
/// # Example
///
/// ```
/// use plc_framing::protocols::ModbusRtuMessage;
/// use plc_framing::{BodyLength, MessageDescriptor};
///
/// let rtu = ModbusRtuMessage::new();
/// // Read response: the byte count is not known from [station, function].
/// assert_eq!(rtu.body_length(&[0x01, 0x03], &[]).unwrap(), BodyLength::NeedMore(1));
/// assert_eq!(rtu.body_length(&[0x01, 0x03, 0x04], &[]).unwrap(), BodyLength::Known(6));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusRtuMessage {
    station_check: bool,
}

impl Default for ModbusRtuMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl ModbusRtuMessage {
    /// Creates a descriptor that checks the answering station.
    pub fn new() -> Self {
        Self {
            station_check: true,
        }
    }

    /// Enables or disables station matching (default enabled).
    pub fn with_station_check(mut self, enabled: bool) -> Self {
        self.station_check = enabled;
        self
    }
}

impl MessageDescriptor for ModbusRtuMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(2)
    }

    fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        let function = header[1];
        if function & 0x80 != 0 {
            // exception code + CRC
            return Ok(BodyLength::Known(3));
        }
        match function {
            0x01..=0x04 | 0x17 => match header.get(2) {
                None => Ok(BodyLength::NeedMore(1)),
                Some(&count) => Ok(BodyLength::Known(count as usize + 2)),
            },
            0x05 | 0x06 | 0x0F | 0x10 => Ok(BodyLength::Known(6)),
            0x07 => Ok(BodyLength::Known(3)),
            0x08 => Ok(BodyLength::Known(6)),
            other => Err(FrameError::framing(format!(
                "unsupported Modbus function code 0x{:02X}",
                other
            ))),
        }
    }

    fn verify_frame(&self, frame: &[u8]) -> Result<()> {
        let n = frame.len();
        if n < 4 {
            return Err(FrameError::framing("RTU frame shorter than 4 bytes"));
        }
        let expected = crc16_modbus(&frame[..n - 2]);
        let actual = u16::from_le_bytes([frame[n - 2], frame[n - 1]]);
        if expected != actual {
            return Err(FrameError::checksum_mismatch(expected as u32, actual as u32));
        }
        Ok(())
    }

    fn correlation_id(&self, frame: &[u8]) -> Option<u32> {
        frame.first().map(|&station| station as u32)
    }

    fn match_response(&self, sent: &[u8], received: &[u8]) -> MatchOutcome {
        match_station(
            self.station_check,
            self.correlation_id(sent),
            self.correlation_id(received),
        )
    }
}

/// Modbus ASCII over a serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusAsciiMessage {
    station_check: bool,
}

impl Default for ModbusAsciiMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl ModbusAsciiMessage {
    /// Creates a descriptor that checks the answering station.
    pub fn new() -> Self {
        Self {
            station_check: true,
        }
    }

    /// Enables or disables station matching (default enabled).
    pub fn with_station_check(mut self, enabled: bool) -> Self {
        self.station_check = enabled;
        self
    }
}

impl MessageDescriptor for ModbusAsciiMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Terminated {
            terminator: Terminator::Two(b'\r', b'\n'),
            trailing: 0,
        }
    }

    fn verify_frame(&self, frame: &[u8]) -> Result<()> {
        let n = frame.len();
        if n < 7 || frame[0] != b':' {
            return Err(FrameError::framing("Modbus ASCII frame must start with ':'"));
        }
        let data = decode_ascii_hex(&frame[1..n - 2])
            .ok_or_else(|| FrameError::framing("Modbus ASCII frame is not hex encoded"))?;
        let (payload, check) = data.split_at(data.len() - 1);
        let expected = lrc(payload);
        if expected != check[0] {
            return Err(FrameError::checksum_mismatch(expected as u32, check[0] as u32));
        }
        Ok(())
    }

    fn resync_offset(&self, buffered: &[u8]) -> usize {
        find_sync(buffered, b":")
    }

    fn correlation_id(&self, frame: &[u8]) -> Option<u32> {
        if frame.len() < 3 {
            return None;
        }
        parse_hex_byte(frame[1], frame[2]).map(u32::from)
    }

    fn match_response(&self, sent: &[u8], received: &[u8]) -> MatchOutcome {
        match_station(
            self.station_check,
            self.correlation_id(sent),
            self.correlation_id(received),
        )
    }
}
