//! Fuji SPH (MICREX-SX) framing over TCP.
//!
//! The 20-byte header starts with `FB 80` and ends with the length of the
//! command data, little-endian, at bytes 18-19.

use crate::descriptor::{find_sync, BodyLength, HeaderLength, MessageDescriptor};
use crate::error::Result;

/// SPH header size.
pub const SPH_HEADER_SIZE: usize = 20;

const SPH_MAGIC: [u8; 2] = [0xFB, 0x80];

/// Fuji SPH.
///
/// # Example
///
/// ```
/// use plc_framing::protocols::FujiSphMessage;
/// use plc_framing::MessageDescriptor;
///
/// assert_eq!(FujiSphMessage.resync_offset(&[0x00, 0xFB, 0x80, 0x80]), 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FujiSphMessage;

impl MessageDescriptor for FujiSphMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(SPH_HEADER_SIZE)
    }

    fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        Ok(BodyLength::Known(
            u16::from_le_bytes([header[18], header[19]]) as usize
        ))
    }

    fn validate_header(&self, header: &[u8]) -> bool {
        header[..2] == SPH_MAGIC
    }

    fn resync_offset(&self, buffered: &[u8]) -> usize {
        find_sync(buffered, &SPH_MAGIC)
    }
}
