//! Siemens framing: S7 over ISO-on-TCP, Fetch/Write, and PPI.
//!
//! # S7 (RFC 1006 TPKT)
//!
//! | Byte | Field |
//! |------|-------|
//! | 0 | version, always `0x03` |
//! | 1 | reserved, always `0x00` |
//! | 2-3 | total frame length, big-endian, including these 4 bytes |
//!
//! # Fetch/Write
//!
//! Every frame starts with a 16-byte header beginning with `"S5"`. A fetch
//! acknowledge carries data whose length is not in the header: it is the
//! length requested in the fetch request.
//!
//! # PPI
//!
//! Serial framing with three shapes: a single `E5` acknowledge, a fixed
//! frame `10 DA SA FC FCS 16`, and a variable frame
//! `68 LE LEr 68 DA SA FC ... FCS 16` of `LE + 6` bytes.

use crate::descriptor::{find_sync, BodyLength, HeaderLength, MessageDescriptor};
use crate::error::{FrameError, Result};

/// TPKT header size.
pub const TPKT_HEADER_SIZE: usize = 4;

/// Fetch/Write header size.
pub const FETCH_WRITE_HEADER_SIZE: usize = 16;

const FETCH_WRITE_MAGIC: &[u8; 2] = b"S5";
const FETCH_ACK: u8 = 0x06;

/// PPI single-byte acknowledge.
pub const PPI_ACK: u8 = 0xE5;
const PPI_FIXED_START: u8 = 0x10;
const PPI_VARIABLE_START: u8 = 0x68;
const PPI_END: u8 = 0x16;

/// S7 over ISO-on-TCP.
///
/// # Example
///
/// ```
/// use plc_framing::protocols::S7Message;
/// use plc_framing::{BodyLength, MessageDescriptor};
///
/// let header = [0x03, 0x00, 0x00, 0x16];
/// assert!(S7Message.validate_header(&header));
/// assert_eq!(S7Message.body_length(&header, &[]).unwrap(), BodyLength::Known(0x16 - 4));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct S7Message;

impl MessageDescriptor for S7Message {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(TPKT_HEADER_SIZE)
    }

    fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        let total = u16::from_be_bytes([header[2], header[3]]) as usize;
        if total < TPKT_HEADER_SIZE {
            return Err(FrameError::framing(format!(
                "TPKT length {} smaller than its header",
                total
            )));
        }
        Ok(BodyLength::Known(total - TPKT_HEADER_SIZE))
    }

    fn validate_header(&self, header: &[u8]) -> bool {
        header[0] == 0x03 && header[1] == 0x00
    }

    fn resync_offset(&self, buffered: &[u8]) -> usize {
        find_sync(buffered, &[0x03, 0x00])
    }
}

/// Area codes of the Fetch/Write protocol that are addressed in words.
fn is_word_area(org_id: u8) -> bool {
    // DB, counter, timer, DX
    matches!(org_id, 0x01 | 0x06 | 0x07 | 0x10)
}

/// Siemens Fetch/Write (S5-compatible) over TCP.
///
/// The request layout read by [`body_length`](MessageDescriptor::body_length):
/// area code at byte 8 and the requested length (big-endian) at bytes 12-13.
/// Word areas double that length into bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchWriteMessage;

impl MessageDescriptor for FetchWriteMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(FETCH_WRITE_HEADER_SIZE)
    }

    fn body_length(&self, header: &[u8], sent: &[u8]) -> Result<BodyLength> {
        // Only a successful fetch acknowledge carries data.
        if header[5] != FETCH_ACK || header[8] != 0x00 {
            return Ok(BodyLength::Known(0));
        }
        if sent.len() < FETCH_WRITE_HEADER_SIZE {
            return Err(FrameError::invalid_parameter(
                "sent",
                format!(
                    "fetch request must be at least {} bytes, got {}",
                    FETCH_WRITE_HEADER_SIZE,
                    sent.len()
                ),
            ));
        }
        let count = u16::from_be_bytes([sent[12], sent[13]]) as usize;
        let bytes = if is_word_area(sent[8]) { count * 2 } else { count };
        Ok(BodyLength::Known(bytes))
    }

    fn validate_header(&self, header: &[u8]) -> bool {
        header[..2] == FETCH_WRITE_MAGIC[..]
    }

    fn resync_offset(&self, buffered: &[u8]) -> usize {
        find_sync(buffered, FETCH_WRITE_MAGIC)
    }
}

/// Siemens PPI over a serial line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiemensPpiMessage;

impl MessageDescriptor for SiemensPpiMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Dynamic
    }

    fn frame_length(&self, _sent: &[u8], buffered: &[u8]) -> Option<usize> {
        let total = match *buffered.first()? {
            PPI_ACK => 1,
            PPI_FIXED_START => 6,
            PPI_VARIABLE_START => buffered.get(1).map(|&le| le as usize + 6)?,
            // Unknown start byte: hand it over so verification rejects it.
            _ => 1,
        };
        (buffered.len() >= total).then_some(total)
    }

    fn verify_frame(&self, frame: &[u8]) -> Result<()> {
        let n = frame.len();
        let checked = match frame[0] {
            PPI_ACK => return Ok(()),
            PPI_FIXED_START => &frame[1..4],
            PPI_VARIABLE_START => {
                if frame[1] != frame[2] || frame[3] != PPI_VARIABLE_START {
                    return Err(FrameError::framing("PPI length bytes disagree"));
                }
                &frame[4..n - 2]
            }
            other => {
                return Err(FrameError::framing(format!(
                    "unexpected PPI start byte 0x{:02X}",
                    other
                )))
            }
        };
        if frame[n - 1] != PPI_END {
            return Err(FrameError::framing("PPI frame missing end byte"));
        }
        let fcs = checked.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        if fcs != frame[n - 2] {
            return Err(FrameError::checksum_mismatch(fcs as u32, frame[n - 2] as u32));
        }
        Ok(())
    }

    fn resync_offset(&self, buffered: &[u8]) -> usize {
        buffered
            .iter()
            .position(|b| matches!(*b, PPI_ACK | PPI_FIXED_START | PPI_VARIABLE_START))
            .unwrap_or(buffered.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ppi_variable(payload: &[u8]) -> Vec<u8> {
        let le = payload.len() as u8;
        let mut frame = vec![0x68, le, le, 0x68];
        frame.extend_from_slice(payload);
        frame.push(payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)));
        frame.push(0x16);
        frame
    }

    #[test]
    fn test_s7_body_length() {
        let header = [0x03, 0x00, 0x00, 0x1F];
        assert_eq!(
            S7Message.body_length(&header, &[]).unwrap(),
            BodyLength::Known(27)
        );
    }

    #[test]
    fn test_s7_length_below_header() {
        assert!(S7Message.body_length(&[0x03, 0x00, 0x00, 0x02], &[]).is_err());
    }

    #[test]
    fn test_s7_validate_and_resync() {
        assert!(!S7Message.validate_header(&[0x00, 0x03, 0x00, 0x00]));
        assert_eq!(S7Message.resync_offset(&[0xFF, 0xFF, 0x03, 0x00, 0x00]), 2);
        assert_eq!(S7Message.resync_offset(&[0xFF, 0xFF, 0xFF, 0x03]), 3);
    }

    #[test]
    fn test_fetch_write_read_length_from_request() {
        let mut request = [0u8; 16];
        request[..2].copy_from_slice(b"S5");
        request[5] = 0x05;
        request[8] = 0x01; // DB
        request[13] = 10;
        let mut header = [0u8; 16];
        header[..2].copy_from_slice(b"S5");
        header[5] = FETCH_ACK;
        let d = FetchWriteMessage;
        assert!(d.validate_header(&header));
        assert_eq!(d.body_length(&header, &request).unwrap(), BodyLength::Known(20));

        request[8] = 0x02; // flags, byte addressed
        assert_eq!(d.body_length(&header, &request).unwrap(), BodyLength::Known(10));
    }

    #[test]
    fn test_fetch_write_ack_and_error_have_no_body() {
        let mut header = [0u8; 16];
        header[..2].copy_from_slice(b"S5");
        header[5] = 0x04;
        assert_eq!(
            FetchWriteMessage.body_length(&header, &[]).unwrap(),
            BodyLength::Known(0)
        );
        header[5] = FETCH_ACK;
        header[8] = 0x03;
        assert_eq!(
            FetchWriteMessage.body_length(&header, &[]).unwrap(),
            BodyLength::Known(0)
        );
    }

    #[test]
    fn test_fetch_write_short_request_rejected() {
        let mut header = [0u8; 16];
        header[..2].copy_from_slice(b"S5");
        header[5] = FETCH_ACK;
        let err = FetchWriteMessage.body_length(&header, &[0x53, 0x35]).unwrap_err();
        assert!(matches!(err, FrameError::InvalidParameter { .. }));
    }

    #[test]
    fn test_ppi_ack() {
        assert_eq!(SiemensPpiMessage.frame_length(&[], &[PPI_ACK, 0x68]), Some(1));
        assert!(SiemensPpiMessage.verify_frame(&[PPI_ACK]).is_ok());
    }

    #[test]
    fn test_ppi_variable_frame_prefixes() {
        let frame = ppi_variable(&[0x00, 0x02, 0x08, 0x32, 0x03]);
        for end in 0..frame.len() {
            assert!(!SiemensPpiMessage.is_complete(&[], &frame[..end]));
        }
        assert_eq!(SiemensPpiMessage.frame_length(&[], &frame), Some(frame.len()));
        assert!(SiemensPpiMessage.verify_frame(&frame).is_ok());
    }

    #[test]
    fn test_ppi_bad_fcs() {
        let mut frame = ppi_variable(&[0x00, 0x02, 0x08]);
        let n = frame.len();
        frame[n - 2] ^= 0xFF;
        let err = SiemensPpiMessage.verify_frame(&frame).unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_ppi_fixed_frame() {
        let frame = [0x10, 0x02, 0x00, 0x5C, 0x5E, 0x16];
        assert_eq!(SiemensPpiMessage.frame_length(&[], &frame), Some(6));
        assert!(SiemensPpiMessage.verify_frame(&frame).is_ok());
    }

    #[test]
    fn test_ppi_unknown_start_byte() {
        assert_eq!(SiemensPpiMessage.frame_length(&[], &[0x42]), Some(1));
        assert!(SiemensPpiMessage.verify_frame(&[0x42]).unwrap_err().is_framing());
        assert_eq!(SiemensPpiMessage.resync_offset(&[0x42, 0x00, PPI_ACK]), 2);
    }
}
