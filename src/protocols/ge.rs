//! GE Fanuc SRTP framing.
//!
//! Every SRTP frame starts with a 56-byte header. The length of the data
//! that follows is carried little-endian at bytes 4-5; byte 0 is the
//! message type (`0x03` on responses).

use crate::descriptor::{BodyLength, HeaderLength, MessageDescriptor};
use crate::error::Result;

/// SRTP header size.
pub const SRTP_HEADER_SIZE: usize = 56;

/// GE SRTP over TCP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeSrtpMessage;

impl MessageDescriptor for GeSrtpMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(SRTP_HEADER_SIZE)
    }

    fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        Ok(BodyLength::Known(
            u16::from_le_bytes([header[4], header[5]]) as usize
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_length() {
        let mut header = [0u8; SRTP_HEADER_SIZE];
        header[0] = 0x03;
        header[4] = 0x06;
        assert_eq!(
            GeSrtpMessage.body_length(&header, &[]).unwrap(),
            BodyLength::Known(6)
        );
        header[5] = 0x01;
        assert_eq!(
            GeSrtpMessage.body_length(&header, &[]).unwrap(),
            BodyLength::Known(0x106)
        );
    }
}
