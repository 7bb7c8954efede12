//! EtherNet/IP encapsulation (Allen-Bradley / Rockwell CIP over TCP).
//!
//! | Byte | Field |
//! |------|-------|
//! | 0-1 | command, little-endian |
//! | 2-3 | length of the data after the header, little-endian |
//! | 4-7 | session handle |
//! | 8-11 | status |
//! | 12-19 | sender context, echoed by the target |
//! | 20-23 | options |

use crate::descriptor::{BodyLength, HeaderLength, MessageDescriptor};
use crate::error::Result;

/// Encapsulation header size.
pub const ENIP_HEADER_SIZE: usize = 24;

const SENDER_CONTEXT_OFFSET: usize = 12;

/// EtherNet/IP encapsulation.
///
/// Correlates on the low four bytes of the sender context, which the
/// target copies from the request.
///
/// # Example
///
/// ```
/// use plc_framing::protocols::EtherNetIpMessage;
/// use plc_framing::{BodyLength, MessageDescriptor};
///
/// let mut header = [0u8; 24];
/// header[0] = 0x6F; // SendRRData
/// header[2] = 0x14;
/// assert_eq!(EtherNetIpMessage.body_length(&header, &[]).unwrap(), BodyLength::Known(20));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EtherNetIpMessage;

impl MessageDescriptor for EtherNetIpMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(ENIP_HEADER_SIZE)
    }

    fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        Ok(BodyLength::Known(
            u16::from_le_bytes([header[2], header[3]]) as usize
        ))
    }

    fn correlation_id(&self, frame: &[u8]) -> Option<u32> {
        let context = frame.get(SENDER_CONTEXT_OFFSET..SENDER_CONTEXT_OFFSET + 4)?;
        Some(u32::from_le_bytes([context[0], context[1], context[2], context[3]]))
    }
}
