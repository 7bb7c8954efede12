//! Panasonic Mewtocol-COM framing.
//!
//! Frames are ASCII and end with CR:
//!
//! ```text
//! % <station:2> # <command ...> <bcc:2> CR     command
//! % <station:2> $ <data ...>    <bcc:2> CR     normal response
//! % <station:2> ! <error:2>     <bcc:2> CR     error response
//! ```
//!
//! The block check code is the XOR of every byte before it, written as two
//! hex digits. `**` in its place disables the check.

use crate::descriptor::{HeaderLength, MessageDescriptor, Terminator};
use crate::error::{FrameError, Result};
use crate::utils::{bcc_xor, parse_hex_byte};

const CR: u8 = b'\r';
const BCC_DISABLED: &[u8; 2] = b"**";

/// Shortest well-formed frame: `%`, station, type, BCC, CR.
const MIN_FRAME_SIZE: usize = 7;

/// Mewtocol-COM over a serial line or TCP gateway.
///
/// # Example
///
/// ```
/// use plc_framing::protocols::MewtocolMessage;
/// use plc_framing::MessageDescriptor;
///
/// assert_eq!(MewtocolMessage.frame_length(&[], b"%01$RC1**"), None);
/// assert_eq!(MewtocolMessage.frame_length(&[], b"%01$RC1**\r"), Some(10));
/// assert!(MewtocolMessage.verify_frame(b"%01$RC1**\r").is_ok());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MewtocolMessage;

impl MessageDescriptor for MewtocolMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Terminated {
            terminator: Terminator::One(CR),
            trailing: 0,
        }
    }

    fn verify_frame(&self, frame: &[u8]) -> Result<()> {
        let n = frame.len();
        if n < MIN_FRAME_SIZE || !matches!(frame[0], b'%' | b'<') {
            return Err(FrameError::framing(format!(
                "malformed Mewtocol frame of {} bytes",
                n
            )));
        }
        let bcc = &frame[n - 3..n - 1];
        if bcc == BCC_DISABLED {
            return Ok(());
        }
        let expected = bcc_xor(&frame[..n - 3]);
        match parse_hex_byte(bcc[0], bcc[1]) {
            Some(actual) if actual == expected => Ok(()),
            actual => Err(FrameError::checksum_mismatch(
                expected as u32,
                actual.map_or(u32::MAX, u32::from),
            )),
        }
    }

    fn resync_offset(&self, buffered: &[u8]) -> usize {
        buffered
            .iter()
            .position(|b| matches!(*b, b'%' | b'<'))
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
    use crate::utils::to_hex_ascii;

    fn with_bcc(body: &[u8]) -> Vec<u8> {
        let mut frame = body.to_vec();
        frame.extend_from_slice(&to_hex_ascii(bcc_xor(body)));
        frame.push(CR);
        frame
    }

    #[test]
    fn test_command_bcc() {
        assert_eq!(with_bcc(b"%01#RCSX0000"), b"%01#RCSX00001D\r".to_vec());
        assert!(MewtocolMessage.verify_frame(b"%01#RCSX00001D\r").is_ok());
    }

    #[test]
    fn test_bad_bcc() {
        let err = MewtocolMessage.verify_frame(b"%01#RCSX00001E\r").unwrap_err();
        assert!(matches!(
            err,
            FrameError::ChecksumMismatch {
                expected: 0x1D,
                actual: 0x1E
            }
        ));
    }

    #[test]
    fn test_error_response() {
        let frame = with_bcc(b"%01!42");
        assert_eq!(MewtocolMessage.frame_length(&[], &frame), Some(frame.len()));
        assert!(MewtocolMessage.verify_frame(&frame).is_ok());
    }

    #[test]
    fn test_malformed() {
        assert!(MewtocolMessage.verify_frame(b"\r").unwrap_err().is_framing());
        assert!(MewtocolMessage.verify_frame(b"X01$RC1**\r").unwrap_err().is_framing());
        assert_eq!(MewtocolMessage.resync_offset(b"X\x00%01$RC1**\r"), 2);
        assert_eq!(MewtocolMessage.resync_offset(b"%01$RC1**\r"), 0);
    }

    #[test]
    fn test_station_match() {
        let request = with_bcc(b"%05#RCSX0000");
        let answer = with_bcc(b"%05$RC1");
        let other = with_bcc(b"%06$RC1");
        assert_eq!(MewtocolMessage.correlation_id(&answer), Some(5));
        assert_eq!(MewtocolMessage.match_response(&request, &answer), MatchOutcome::Accept);
        assert_eq!(MewtocolMessage.match_response(&request, &other), MatchOutcome::Continue);
    }
}
