//! KUKA VarProxy (KRC robot variable access over TCP).
//!
//! | Byte | Field |
//! |------|-------|
//! | 0-1 | message id, big-endian |
//! | 2-3 | length of the remaining bytes, big-endian |
//! | 4.. | payload |

use crate::descriptor::{BodyLength, HeaderLength, MatchOutcome, MessageDescriptor};
use crate::error::Result;

/// VarProxy header size.
pub const KUKA_HEADER_SIZE: usize = 4;

/// KUKA VarProxy.
///
/// The proxy answers requests strictly in order, so a response carrying
/// another message id means the stream is out of step: it is rejected
/// instead of skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KukaVarProxyMessage;

impl MessageDescriptor for KukaVarProxyMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(KUKA_HEADER_SIZE)
    }

    fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        Ok(BodyLength::Known(
            u16::from_be_bytes([header[2], header[3]]) as usize
        ))
    }

    fn correlation_id(&self, frame: &[u8]) -> Option<u32> {
        if frame.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([frame[0], frame[1]]) as u32)
    }

    fn match_response(&self, sent: &[u8], received: &[u8]) -> MatchOutcome {
        match (self.correlation_id(sent), self.correlation_id(received)) {
            (Some(expected), Some(actual)) if expected != actual => MatchOutcome::Reject,
            _ => MatchOutcome::Accept,
        }
    }
}
