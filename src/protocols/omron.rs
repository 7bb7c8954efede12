//! Omron FINS framing over TCP and UDP.
//!
//! # FINS/TCP
//!
//! | Byte | Field |
//! |------|-------|
//! | 0-3 | magic `"FINS"` |
//! | 4-7 | length of everything after these 8 bytes, big-endian |
//! | 8-11 | command (`2` = FINS frame send) |
//! | 12-15 | error code |
//! | 16.. | FINS header and payload (command `2` only) |
//!
//! Devices are known to emit stray bytes ahead of a frame after a
//! reconnect, so the descriptor resynchronizes on the magic.
//!
//! # FINS Header
//!
//! The 10-byte FINS header carries ICF at byte 0 (bit 6 set on responses)
//! and the service id (SID) at byte 9. Responses echo the SID of the
//! command; over UDP that is the only way to pair them.

use crate::descriptor::{find_sync, BodyLength, HeaderLength, MatchOutcome, MessageDescriptor};
use crate::error::{FrameError, Result};

/// FINS/TCP magic.
pub const FINS_MAGIC: &[u8; 4] = b"FINS";

/// FINS/TCP header read before the length is known.
pub const FINS_TCP_HEADER_SIZE: usize = 8;

/// Largest FINS/TCP length field accepted.
pub const FINS_TCP_MAX_LENGTH: usize = 8192;

/// FINS header size in bytes.
pub const FINS_HEADER_SIZE: usize = 10;

/// Minimum response size: header (10) + MRC + SRC + main code + sub code.
pub const MIN_RESPONSE_SIZE: usize = FINS_HEADER_SIZE + 4;

const FINS_TCP_PREFIX: usize = 16;
const COMMAND_FRAME_SEND: u32 = 2;
const ICF_GATEWAY: u8 = 0x80;
const ICF_RESPONSE: u8 = 0x40;
const SID_OFFSET: usize = 9;

/// FINS over TCP.
///
/// # Example
///
/// ```
/// use plc_framing::protocols::FinsTcpMessage;
/// use plc_framing::{BodyLength, MessageDescriptor};
///
/// let header = *b"FINS\x00\x00\x00\x0C";
/// let fins = FinsTcpMessage::new();
/// assert!(fins.validate_header(&header));
/// assert_eq!(fins.body_length(&header, &[]).unwrap(), BodyLength::Known(12));
/// assert_eq!(fins.resync_offset(b"\x00\x00FINS\x00\x00"), 2);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinsTcpMessage;

impl FinsTcpMessage {
    /// Creates the descriptor.
    pub fn new() -> Self {
        Self
    }
}

impl MessageDescriptor for FinsTcpMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Fixed(FINS_TCP_HEADER_SIZE)
    }

    fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        let length = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if length > FINS_TCP_MAX_LENGTH {
            return Err(FrameError::framing(format!(
                "FINS/TCP length {} exceeds {}",
                length, FINS_TCP_MAX_LENGTH
            )));
        }
        Ok(BodyLength::Known(length))
    }

    fn validate_header(&self, header: &[u8]) -> bool {
        header[..4] == FINS_MAGIC[..]
    }

    fn resync_offset(&self, buffered: &[u8]) -> usize {
        find_sync(buffered, FINS_MAGIC)
    }

    fn correlation_id(&self, frame: &[u8]) -> Option<u32> {
        if frame.len() < FINS_TCP_PREFIX + FINS_HEADER_SIZE {
            return None;
        }
        let command = u32::from_be_bytes([frame[8], frame[9], frame[10], frame[11]]);
        (command == COMMAND_FRAME_SEND).then(|| frame[FINS_TCP_PREFIX + SID_OFFSET] as u32)
    }
}

/// FINS over UDP: one datagram is one frame.
///
/// Owns the SID counter of its connection. Datagrams that are not
/// responses, or that echo another SID, are skipped rather than failing the
/// request: a PLC may still answer an earlier, timed-out command.
///
/// A frame must start with a plausible FINS header (ICF bit 7 set, RSV
/// zero). When datagrams reach the receiver joined into one stream, bytes
/// ahead of such a header are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinsUdpMessage {
    sid: u8,
}

impl FinsUdpMessage {
    /// Creates the descriptor with the SID counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next SID of this connection.
    ///
    /// # Example
    ///
    /// ```
    /// use plc_framing::protocols::FinsUdpMessage;
    ///
    /// let mut fins = FinsUdpMessage::new();
    /// assert_eq!(fins.next_sid(), 0);
    /// assert_eq!(fins.next_sid(), 1);
    /// ```
    pub fn next_sid(&mut self) -> u8 {
        let sid = self.sid;
        self.sid = self.sid.wrapping_add(1);
        sid
    }
}

impl MessageDescriptor for FinsUdpMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Dynamic
    }

    fn frame_length(&self, _sent: &[u8], buffered: &[u8]) -> Option<usize> {
        (buffered.len() >= MIN_RESPONSE_SIZE).then_some(buffered.len())
    }

    fn verify_frame(&self, frame: &[u8]) -> Result<()> {
        if is_fins_header_start(frame) {
            Ok(())
        } else {
            Err(FrameError::framing("datagram does not start with a FINS header"))
        }
    }

    fn resync_offset(&self, buffered: &[u8]) -> usize {
        (1..buffered.len())
            .find(|&i| is_fins_header_start(&buffered[i..]))
            .unwrap_or(buffered.len())
    }

    fn correlation_id(&self, frame: &[u8]) -> Option<u32> {
        frame.get(SID_OFFSET).map(|&sid| sid as u32)
    }

    fn match_response(&self, sent: &[u8], received: &[u8]) -> MatchOutcome {
        if received.first().map_or(true, |icf| icf & ICF_RESPONSE == 0) {
            return MatchOutcome::Continue;
        }
        match (self.correlation_id(sent), self.correlation_id(received)) {
            (Some(expected), Some(actual)) if expected != actual => MatchOutcome::Continue,
            _ => MatchOutcome::Accept,
        }
    }
}

/// ICF with the gateway bit, then RSV `0x00` (or not yet received).
fn is_fins_header_start(bytes: &[u8]) -> bool {
    match bytes {
        [icf, rest @ ..] => icf & ICF_GATEWAY != 0 && rest.first().map_or(true, |&rsv| rsv == 0),
        [] => false,
    }
}
