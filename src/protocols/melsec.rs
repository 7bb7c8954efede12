//! Mitsubishi MELSEC framing: MC protocol 1E/3E/4E binary and the
//! computer link (FX serial) format.
//!
//! # 1E Binary
//!
//! Responses start with `[sub-header][end code]`. Neither byte gives the
//! data length: it follows from the command and point count of the
//! request, so [`MelsecA1EMessage`] reads the request.
//!
//! # 3E / 4E Binary
//!
//! | Frame | Sub-header | Header size | Length field |
//! |-------|------------|-------------|--------------|
//! | 3E | `D0 00` | 9 | bytes 7-8, little-endian |
//! | 4E | `D4 00` + serial | 13 | bytes 11-12, little-endian |
//!
//! The 4E serial number is echoed from the request and used for
//! correlation.
//!
//! # Computer Link
//!
//! | Start | Shape |
//! |-------|-------|
//! | `STX` | `STX station pc data ETX [sum]` |
//! | `ACK` | `ACK station pc` |
//! | `NAK` | `NAK station pc error` |

use crate::descriptor::{find_sync, BodyLength, HeaderLength, MessageDescriptor};
use crate::error::{FrameError, Result};
use crate::utils::{parse_hex_byte, sum_check, to_hex_ascii};

/// 1E request size for batch reads.
pub const A1E_REQUEST_SIZE: usize = 12;

const A1E_ABNORMAL_END: u8 = 0x5B;
const A1E_POINTS_OFFSET: usize = 10;

const QNA_3E_SUB_HEADER: [u8; 2] = [0xD0, 0x00];
const QNA_4E_SUB_HEADER: [u8; 2] = [0xD4, 0x00];

const STX: u8 = 0x02;
const ETX: u8 = 0x03;
const ACK: u8 = 0x06;
const NAK: u8 = 0x15;

/// MC protocol 1E frame, binary.
///
/// # Example
///
/// ```
/// use plc_framing::protocols::MelsecA1EMessage;
/// use plc_framing::{BodyLength, MessageDescriptor};
///
/// // Word batch read of 3 points.
/// let request = [0x01, 0xFF, 0x0A, 0x00, 0x64, 0x00, 0x00, 0x00, 0x20, 0x44, 0x03, 0x00];
/// let header = [0x81, 0x00];
/// assert_eq!(
///     MelsecA1EMessage.body_length(&header, &request).unwrap(),
///     BodyLength::Known(6)
/// );
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MelsecA1EMessage;

impl MelsecA1EMessage {
    fn points(sent: &[u8]) -> Result<usize> {
        if sent.len() < A1E_REQUEST_SIZE {
            return Err(FrameError::invalid_parameter(
                "sent",
                format!(
                    "1E read request must be at least {} bytes, got {}",
                    A1E_REQUEST_SIZE,
                    sent.len()
                ),
            ));
        }
        Ok(match sent[A1E_POINTS_OFFSET] {
            0 => 256,
            n => n as usize,
        })
    }
}

impl MessageDescriptor for MelsecA1EMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(2)
    }

    fn body_length(&self, header: &[u8], sent: &[u8]) -> Result<BodyLength> {
        match header[1] {
            0x00 => {}
            // error code + one reserved byte
            A1E_ABNORMAL_END => return Ok(BodyLength::Known(2)),
            _ => return Ok(BodyLength::Known(0)),
        }
        let length = match header[0] {
            // bit read: two points per byte
            0x80 => (Self::points(sent)? + 1) / 2,
            0x81 => Self::points(sent)? * 2,
            _ => 0,
        };
        Ok(BodyLength::Known(length))
    }

    fn validate_header(&self, header: &[u8]) -> bool {
        header[0] & 0x80 != 0
    }
}

/// MC protocol 3E frame, binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MelsecQna3EMessage;

impl MessageDescriptor for MelsecQna3EMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(9)
    }

    fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        Ok(BodyLength::Known(
            u16::from_le_bytes([header[7], header[8]]) as usize
        ))
    }

    fn validate_header(&self, header: &[u8]) -> bool {
        header[..2] == QNA_3E_SUB_HEADER
    }

    fn resync_offset(&self, buffered: &[u8]) -> usize {
        find_sync(buffered, &QNA_3E_SUB_HEADER)
    }
}

/// MC protocol 4E frame, binary.
///
/// Owns the serial-number counter of its connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MelsecQna4EMessage {
    serial: u16,
}

impl MelsecQna4EMessage {
    /// Creates the descriptor with the serial counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next serial number of this connection.
    pub fn next_serial(&mut self) -> u16 {
        let serial = self.serial;
        self.serial = self.serial.wrapping_add(1);
        serial
    }
}

impl MessageDescriptor for MelsecQna4EMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(13)
    }

    fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        Ok(BodyLength::Known(
            u16::from_le_bytes([header[11], header[12]]) as usize
        ))
    }

    fn validate_header(&self, header: &[u8]) -> bool {
        header[..2] == QNA_4E_SUB_HEADER
    }

    fn resync_offset(&self, buffered: &[u8]) -> usize {
        find_sync(buffered, &QNA_4E_SUB_HEADER)
    }

    fn correlation_id(&self, frame: &[u8]) -> Option<u32> {
        if frame.len() < 4 {
            return None;
        }
        Some(u16::from_le_bytes([frame[2], frame[3]]) as u32)
    }
}

/// Mitsubishi computer link, format 1, over a serial line.
///
/// # Example
///
/// ```
/// use plc_framing::protocols::MelsecFxLinksMessage;
/// use plc_framing::MessageDescriptor;
///
/// let fx = MelsecFxLinksMessage::new();
/// assert_eq!(fx.frame_length(&[], b"\x0600FF"), Some(5));
/// assert_eq!(fx.frame_length(&[], b"\x0200FF1234\x03B"), None);
/// assert_eq!(fx.frame_length(&[], b"\x0200FF1234\x03B9"), Some(12));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MelsecFxLinksMessage {
    sum_check: bool,
}

impl Default for MelsecFxLinksMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl MelsecFxLinksMessage {
    /// Creates a descriptor expecting a sum check after ETX.
    pub fn new() -> Self {
        Self { sum_check: true }
    }

    /// Sets whether the link is configured with a sum check (default true).
    pub fn with_sum_check(mut self, enabled: bool) -> Self {
        self.sum_check = enabled;
        self
    }
}

impl MessageDescriptor for MelsecFxLinksMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Dynamic
    }

    fn frame_length(&self, _sent: &[u8], buffered: &[u8]) -> Option<usize> {
        let total = match *buffered.first()? {
            STX => {
                let etx = buffered.iter().position(|&b| b == ETX)?;
                etx + 1 + if self.sum_check { 2 } else { 0 }
            }
            ACK => 5,
            NAK => 7,
            // Unknown start byte: hand it over so verification rejects it.
            _ => 1,
        };
        (buffered.len() >= total).then_some(total)
    }

    fn verify_frame(&self, frame: &[u8]) -> Result<()> {
        match frame[0] {
            STX if self.sum_check => {
                let n = frame.len();
                if n < 4 {
                    return Err(FrameError::framing("computer link frame too short"));
                }
                let expected = sum_check(&frame[1..n - 2]);
                if to_hex_ascii(expected) != frame[n - 2..] {
                    let actual = parse_hex_byte(frame[n - 2], frame[n - 1])
                        .map_or(u32::MAX, u32::from);
                    return Err(FrameError::checksum_mismatch(expected as u32, actual));
                }
                Ok(())
            }
            STX | ACK | NAK => Ok(()),
            other => Err(FrameError::framing(format!(
                "unexpected computer link start byte 0x{:02X}",
                other
            ))),
        }
    }

    fn resync_offset(&self, buffered: &[u8]) -> usize {
        buffered
            .iter()
            .position(|b| matches!(*b, STX | ACK | NAK))
            .unwrap_or(buffered.len())
    }

    fn correlation_id(&self, frame: &[u8]) -> Option<u32> {
        if frame.len() < 3 {
            return None;
        }
        parse_hex_byte(frame[1], frame[2]).map(u32::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MatchOutcome;

    fn a1e_request(command: u8, points: u8) -> Vec<u8> {
        vec![command, 0xFF, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x20, 0x44, points, 0x00]
    }

    #[test]
    fn test_a1e_bit_read() {
        let d = MelsecA1EMessage;
        let request = a1e_request(0x00, 5);
        assert_eq!(d.body_length(&[0x80, 0x00], &request).unwrap(), BodyLength::Known(3));
        let request = a1e_request(0x00, 0);
        assert_eq!(d.body_length(&[0x80, 0x00], &request).unwrap(), BodyLength::Known(128));
    }

    #[test]
    fn test_a1e_write_and_errors() {
        let d = MelsecA1EMessage;
        assert_eq!(d.body_length(&[0x82, 0x00], &[]).unwrap(), BodyLength::Known(0));
        assert_eq!(d.body_length(&[0x81, 0x5B], &[]).unwrap(), BodyLength::Known(2));
        assert_eq!(d.body_length(&[0x81, 0x51], &[]).unwrap(), BodyLength::Known(0));
    }

    #[test]
    fn test_a1e_short_request_rejected() {
        let err = MelsecA1EMessage
            .body_length(&[0x81, 0x00], &[0x01, 0xFF])
            .unwrap_err();
        assert!(matches!(err, FrameError::InvalidParameter { .. }));
    }

    #[test]
    fn test_qna_3e() {
        let header = [0xD0, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x06, 0x00];
        let d = MelsecQna3EMessage;
        assert!(d.validate_header(&header));
        assert_eq!(d.body_length(&header, &[]).unwrap(), BodyLength::Known(6));
        assert_eq!(d.resync_offset(&[0x11, 0xD0, 0x00, 0x00]), 1);
    }

    #[test]
    fn test_qna_4e_serial_correlation() {
        let mut d = MelsecQna4EMessage::new();
        assert_eq!(d.next_serial(), 0);
        assert_eq!(d.next_serial(), 1);

        let request = [0x54, 0x00, 0x34, 0x12, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00];
        let header = [0xD4, 0x00, 0x34, 0x12, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x02, 0x00];
        assert_eq!(d.body_length(&header, &[]).unwrap(), BodyLength::Known(2));
        assert_eq!(d.correlation_id(&request), Some(0x1234));
        assert_eq!(d.match_response(&request, &header), MatchOutcome::Accept);

        let mut stale = header;
        stale[2] = 0x33;
        assert_eq!(d.match_response(&request, &stale), MatchOutcome::Continue);
    }

    #[test]
    fn test_fx_links_complete_only_after_sum_check() {
        let d = MelsecFxLinksMessage::new();
        let frame = b"\x0200FF1234\x03B9";
        for end in 0..frame.len() {
            assert!(!d.is_complete(&[], &frame[..end]), "prefix {}", end);
        }
        assert!(d.is_complete(&[], frame));
        assert!(d.verify_frame(frame).is_ok());
    }

    #[test]
    fn test_fx_links_without_sum_check() {
        let d = MelsecFxLinksMessage::new().with_sum_check(false);
        assert_eq!(d.frame_length(&[], b"\x0200FF1234\x03"), Some(10));
        assert!(d.verify_frame(b"\x0200FF1234\x03").is_ok());
    }

    #[test]
    fn test_fx_links_bad_sum() {
        let err = MelsecFxLinksMessage::new()
            .verify_frame(b"\x0200FF1234\x03B8")
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::ChecksumMismatch {
                expected: 0xB9,
                actual: 0xB8
            }
        ));
    }

    #[test]
    fn test_fx_links_nak_and_station() {
        let d = MelsecFxLinksMessage::new();
        let nak = b"\x1505FF06";
        assert_eq!(d.frame_length(&[], nak), Some(7));
        assert_eq!(d.correlation_id(nak), Some(5));
        let request = b"\x0505FFBR0X0000005C";
        assert_eq!(d.match_response(request, nak), MatchOutcome::Accept);
        assert_eq!(d.match_response(request, b"\x0607FF"), MatchOutcome::Continue);
    }

    #[test]
    fn test_fx_links_unknown_start() {
        let d = MelsecFxLinksMessage::new();
        assert_eq!(d.frame_length(&[], b"Z"), Some(1));
        assert!(d.verify_frame(b"Z").unwrap_err().is_framing());
        assert_eq!(d.resync_offset(b"ZZ\x0600FF"), 2);
    }

    #[test]
    fn test_fx_links_receive_after_line_noise() {
        use crate::receiver::FrameReceiver;
        use crate::transport::MemoryTransport;
        use std::time::Duration;

        let frame = b"\x0200FF1234\x03B9";
        let mut noisy = b"\xFF\x00".to_vec();
        noisy.extend_from_slice(frame);
        let mut receiver = FrameReceiver::new(MemoryTransport::chunked(&noisy, 3));
        let message = receiver
            .receive(&MelsecFxLinksMessage::new(), &[], Duration::from_secs(1))
            .unwrap();
        assert_eq!(message.as_bytes(), &frame[..]);
    }
}
