//! Beckhoff ADS framing over AMS/TCP.
//!
//! | Byte | Field |
//! |------|-------|
//! | 0-1 | reserved, zero |
//! | 2-5 | length of the AMS packet, little-endian |
//! | 6-37 | AMS header; invoke id at bytes 34-37 |
//! | 38.. | ADS data |

use crate::descriptor::{BodyLength, HeaderLength, MessageDescriptor};
use crate::error::{FrameError, Result};

/// AMS/TCP header size.
pub const AMS_TCP_HEADER_SIZE: usize = 6;

/// AMS header size following the AMS/TCP header.
pub const AMS_HEADER_SIZE: usize = 32;

/// Largest AMS packet accepted.
pub const ADS_MAX_PACKET: usize = 8 * 1024 * 1024;

const INVOKE_ID_OFFSET: usize = AMS_TCP_HEADER_SIZE + 28;

/// ADS over AMS/TCP.
///
/// Notifications arrive on the same socket as responses; their invoke id
/// differs from the pending request, so correlated receives skip them.
///
/// # Example
///
/// ```
/// use plc_framing::protocols::AdsMessage;
/// use plc_framing::{BodyLength, MessageDescriptor};
///
/// let header = [0x00, 0x00, 0x28, 0x00, 0x00, 0x00];
/// assert_eq!(AdsMessage.body_length(&header, &[]).unwrap(), BodyLength::Known(40));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdsMessage;

impl MessageDescriptor for AdsMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(AMS_TCP_HEADER_SIZE)
    }

    fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        let length = u32::from_le_bytes([header[2], header[3], header[4], header[5]]) as usize;
        if length > ADS_MAX_PACKET {
            return Err(FrameError::framing(format!(
                "AMS packet length {} exceeds {}",
                length, ADS_MAX_PACKET
            )));
        }
        Ok(BodyLength::Known(length))
    }

    fn validate_header(&self, header: &[u8]) -> bool {
        header[0] == 0 && header[1] == 0
    }

    fn correlation_id(&self, frame: &[u8]) -> Option<u32> {
        let id = frame.get(INVOKE_ID_OFFSET..INVOKE_ID_OFFSET + 4)?;
        Some(u32::from_le_bytes([id[0], id[1], id[2], id[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MatchOutcome;
    use crate::receiver::FrameReceiver;
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    fn ads_frame(command: u16, invoke_id: u32, data: &[u8]) -> Vec<u8> {
        let mut ams = vec![0u8; AMS_HEADER_SIZE];
        ams[16..18].copy_from_slice(&command.to_le_bytes());
        ams[20..24].copy_from_slice(&(data.len() as u32).to_le_bytes());
        ams[28..32].copy_from_slice(&invoke_id.to_le_bytes());
        ams.extend_from_slice(data);
        let mut frame = vec![0x00, 0x00];
        frame.extend_from_slice(&(ams.len() as u32).to_le_bytes());
        frame.extend(ams);
        frame
    }

    #[test]
    fn test_reserved_bytes() {
        assert!(AdsMessage.validate_header(&[0, 0, 0x20, 0, 0, 0]));
        assert!(!AdsMessage.validate_header(&[0, 1, 0x20, 0, 0, 0]));
    }

    #[test]
    fn test_oversized_packet() {
        let header = [0x00, 0x00, 0xFF, 0xFF, 0xFF, 0x7F];
        assert!(AdsMessage.body_length(&header, &[]).unwrap_err().is_framing());
    }

    #[test]
    fn test_invoke_id() {
        let frame = ads_frame(2, 0xDEAD_BEEF, &[0; 4]);
        assert_eq!(AdsMessage.correlation_id(&frame), Some(0xDEAD_BEEF));
        assert_eq!(AdsMessage.correlation_id(&frame[..20]), None);
    }

    #[test]
    fn test_notification_skipped() {
        let request = ads_frame(2, 7, &[0; 12]);
        let notification = ads_frame(8, 0, &[0xAA; 8]);
        let response = ads_frame(2, 7, &[0, 0, 0, 0, 2, 0, 0, 0, 0x34, 0x12]);
        assert_eq!(
            AdsMessage.match_response(&request, &notification),
            MatchOutcome::Continue
        );

        let mut wire = notification;
        wire.extend_from_slice(&response);
        let mut receiver = FrameReceiver::new(MemoryTransport::chunked(&wire, 16));
        let message = receiver
            .receive_correlated(&AdsMessage, &request, Duration::from_secs(1))
            .unwrap();
        assert_eq!(message.as_bytes(), &response[..]);
        assert_eq!(message.header(), &response[..AMS_TCP_HEADER_SIZE]);
    }
}
