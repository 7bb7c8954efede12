//! The per-protocol framing contract.
//!
//! A [`MessageDescriptor`] tells the [`FrameReceiver`](crate::FrameReceiver)
//! how one wire protocol delimits a message: how long the header is, how to
//! derive the body length from it, how to recognise a valid frame start, how
//! to find the end of a frame that has no length field, and how to decide
//! whether a received frame answers the request that was sent.
//!
//! Only [`header_length`](MessageDescriptor::header_length) is mandatory.
//! Every other method has a default suitable for protocols without the
//! corresponding feature.
//!
//! # Header Length Regimes
//!
//! | Variant | Receiver behaviour |
//! |---------|--------------------|
//! | [`HeaderLength::Fixed`] | read exactly N bytes, validate, compute body length |
//! | [`HeaderLength::Dynamic`] | read until [`frame_length`](MessageDescriptor::frame_length) reports a complete frame |
//! | [`HeaderLength::Terminated`] | read until the end byte(s) plus a fixed trailer have arrived |
//!
//! # Example
//!
//! ```
//! use plc_framing::{BodyLength, HeaderLength, MessageDescriptor, Result};
//!
//! /// `[0xAA][len]` followed by `len` payload bytes.
//! struct TinyMessage;
//!
//! impl MessageDescriptor for TinyMessage {
//!     fn header_length(&self) -> HeaderLength {
//!         HeaderLength::Fixed(2)
//!     }
//!
//!     fn body_length(&self, header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
//!         Ok(BodyLength::Known(header[1] as usize))
//!     }
//!
//!     fn validate_header(&self, header: &[u8]) -> bool {
//!         header[0] == 0xAA
//!     }
//! }
//! ```

use std::convert::TryFrom;

use crate::error::{FrameError, Result};

/// Maximum number of body-length computations for one header.
///
/// A descriptor that still answers [`BodyLength::NeedMore`] on the last
/// attempt makes the receive fail with
/// [`FrameError::HeaderUnresolved`].
pub const MAX_HEADER_RESOLUTION_ATTEMPTS: usize = 16;

/// Sentinel used by the packed integer form for [`HeaderLength::Dynamic`].
pub const PACKED_DYNAMIC: i32 = -1;

/// End-of-frame byte sequence for terminator-delimited protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// A single end byte, e.g. CR.
    One(u8),
    /// Two consecutive end bytes, e.g. CR LF.
    Two(u8, u8),
}

impl Terminator {
    /// Returns the index one past the first occurrence of the terminator.
    ///
    /// # Example
    ///
    /// ```
    /// use plc_framing::Terminator;
    ///
    /// assert_eq!(Terminator::Two(b'\r', b'\n').end_of(b"AB\r\nCD"), Some(4));
    /// assert_eq!(Terminator::One(b'\r').end_of(b"AB"), None);
    /// ```
    pub fn end_of(self, buffer: &[u8]) -> Option<usize> {
        match self {
            Terminator::One(a) => buffer.iter().position(|&b| b == a).map(|i| i + 1),
            Terminator::Two(a, b) => buffer
                .windows(2)
                .position(|w| w[0] == a && w[1] == b)
                .map(|i| i + 2),
        }
    }
}

/// How many bytes form the header of a protocol's frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLength {
    /// Exactly this many bytes are read before header analysis runs.
    Fixed(usize),
    /// No header; completeness is decided by inspecting the whole buffer.
    Dynamic,
    /// The frame ends with `terminator`, followed by `trailing` bytes
    /// (e.g. a CRC appended after the stop byte).
    Terminated {
        /// End byte sequence.
        terminator: Terminator,
        /// Bytes that still follow the terminator.
        trailing: usize,
    },
}

impl HeaderLength {
    /// Returns whether the receiver must scan the buffer for completeness.
    pub fn is_dynamic(self) -> bool {
        !matches!(self, HeaderLength::Fixed(_))
    }

    /// Encodes this value in the packed `i32` form used by legacy
    /// configuration.
    ///
    /// Non-negative values are fixed lengths, `-1` is dynamic, and any other
    /// negative value packs `[0x80 | count][trailing][end0][end1]` from the
    /// most significant byte down.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::InvalidParameter` if a fixed length or trailing
    /// count does not fit the packed layout.
    ///
    /// # Example
    ///
    /// ```
    /// use plc_framing::{HeaderLength, Terminator};
    /// use std::convert::TryFrom;
    ///
    /// let length = HeaderLength::Terminated {
    ///     terminator: Terminator::One(b'\r'),
    ///     trailing: 2,
    /// };
    /// let packed = length.to_packed().unwrap();
    /// assert!(packed < -1);
    /// assert_eq!(HeaderLength::try_from(packed).unwrap(), length);
    /// ```
    pub fn to_packed(self) -> Result<i32> {
        match self {
            HeaderLength::Fixed(n) => i32::try_from(n).map_err(|_| {
                FrameError::invalid_parameter("header_length", "fixed length exceeds i32::MAX")
            }),
            HeaderLength::Dynamic => Ok(PACKED_DYNAMIC),
            HeaderLength::Terminated {
                terminator,
                trailing,
            } => {
                let trailing = u8::try_from(trailing).map_err(|_| {
                    FrameError::invalid_parameter("trailing", "must fit in one byte")
                })?;
                let (count, end0, end1) = match terminator {
                    Terminator::One(a) => (1u8, a, 0u8),
                    Terminator::Two(a, b) => (2u8, a, b),
                };
                Ok(i32::from_be_bytes([0x80 | count, trailing, end0, end1]))
            }
        }
    }
}

impl TryFrom<i32> for HeaderLength {
    type Error = FrameError;

    fn try_from(packed: i32) -> Result<Self> {
        if packed >= 0 {
            return Ok(HeaderLength::Fixed(packed as usize));
        }
        if packed == PACKED_DYNAMIC {
            return Ok(HeaderLength::Dynamic);
        }
        let [marker, trailing, end0, end1] = packed.to_be_bytes();
        let terminator = match marker & 0x7F {
            1 => Terminator::One(end0),
            2 => Terminator::Two(end0, end1),
            other => {
                return Err(FrameError::invalid_parameter(
                    "header_length",
                    format!("terminator count must be 1 or 2, got {}", other),
                ))
            }
        };
        Ok(HeaderLength::Terminated {
            terminator,
            trailing: trailing as usize,
        })
    }
}

/// Result of a body-length computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    /// The header is resolved; this many content bytes follow.
    Known(usize),
    /// The header is not resolved yet; append this many bytes to it and ask
    /// again.
    NeedMore(usize),
}

/// Outcome of matching a received frame against the request that was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The frame answers the request.
    Accept,
    /// The frame is not the answer; fail the pending request.
    Reject,
    /// The frame is not the answer; discard it and keep waiting.
    Continue,
}

impl MatchOutcome {
    /// Numeric form: `1` accept, `0` reject, `-1` continue.
    pub fn as_i32(self) -> i32 {
        match self {
            MatchOutcome::Accept => 1,
            MatchOutcome::Reject => 0,
            MatchOutcome::Continue => -1,
        }
    }

    /// Parses the numeric form. Any positive value accepts and any negative
    /// value continues.
    pub fn from_i32(value: i32) -> Self {
        match value {
            v if v > 0 => MatchOutcome::Accept,
            0 => MatchOutcome::Reject,
            _ => MatchOutcome::Continue,
        }
    }
}

/// Framing policy of one wire protocol.
///
/// Implementations are small value types owned by a single connection.
/// Methods that inspect bytes receive slices that are at least as long as
/// the receiver guarantees for that phase (the full fixed header for
/// [`body_length`](Self::body_length) and [`validate_header`](Self::validate_header));
/// `sent` may be empty when no request is outstanding, so any method reading
/// from it must check its length.
pub trait MessageDescriptor {
    /// Header regime of this protocol.
    fn header_length(&self) -> HeaderLength;

    /// Computes how many bytes follow the header.
    ///
    /// Only called for [`HeaderLength::Fixed`]. The default reports an empty
    /// body.
    ///
    /// # Errors
    ///
    /// Descriptors return a framing error when the header carries an
    /// impossible length, or an invalid-parameter error when the sent
    /// request is too short to derive the length from.
    fn body_length(&self, _header: &[u8], _sent: &[u8]) -> Result<BodyLength> {
        Ok(BodyLength::Known(0))
    }

    /// Checks the magic/sync bytes of a fixed header.
    fn validate_header(&self, _header: &[u8]) -> bool {
        true
    }

    /// Returns how many leading bytes of `buffered` to drop to reach the
    /// first plausible frame start. `0` means the protocol cannot resync.
    fn resync_offset(&self, _buffered: &[u8]) -> usize {
        0
    }

    /// Length of the first complete frame in `buffered`, if there is one.
    ///
    /// Used for dynamic regimes. The default handles
    /// [`HeaderLength::Terminated`]; descriptors declaring
    /// [`HeaderLength::Dynamic`] override it.
    fn frame_length(&self, _sent: &[u8], buffered: &[u8]) -> Option<usize> {
        match self.header_length() {
            HeaderLength::Terminated {
                terminator,
                trailing,
            } => terminator
                .end_of(buffered)
                .map(|end| end + trailing)
                .filter(|&total| total <= buffered.len()),
            _ => None,
        }
    }

    /// Returns whether `buffered` starts with a complete frame.
    fn is_complete(&self, sent: &[u8], buffered: &[u8]) -> bool {
        self.frame_length(sent, buffered).is_some()
    }

    /// Checks the checksum or CRC of a complete frame.
    fn verify_frame(&self, _frame: &[u8]) -> Result<()> {
        Ok(())
    }

    /// Extracts the identifier used to pair a frame with its request.
    ///
    /// `frame` is a complete frame (request or response).
    fn correlation_id(&self, _frame: &[u8]) -> Option<u32> {
        None
    }

    /// Decides whether `received` answers `sent`.
    ///
    /// The default accepts when either side has no correlation id, and
    /// continues waiting when the ids differ.
    fn match_response(&self, sent: &[u8], received: &[u8]) -> MatchOutcome {
        match (self.correlation_id(sent), self.correlation_id(received)) {
            (Some(expected), Some(actual)) if expected != actual => MatchOutcome::Continue,
            _ => MatchOutcome::Accept,
        }
    }
}

/// Finds where a frame starting with `magic` may begin in `buffer`.
///
/// Returns the offset of the first full occurrence of `magic`; failing that,
/// the offset of the longest suffix of `buffer` that is a prefix of `magic`
/// (the rest may still arrive); failing that, `buffer.len()`.
///
/// # Example
///
/// ```
/// use plc_framing::find_sync;
///
/// assert_eq!(find_sync(b"xxFINS....", b"FINS"), 2);
/// assert_eq!(find_sync(b"xxxFI", b"FINS"), 3);
/// assert_eq!(find_sync(b"xyz", b"FINS"), 3);
/// ```
pub fn find_sync(buffer: &[u8], magic: &[u8]) -> usize {
    if magic.is_empty() {
        return 0;
    }
    if let Some(pos) = buffer.windows(magic.len()).position(|w| w == magic) {
        return pos;
    }
    let start = buffer.len().saturating_sub(magic.len() - 1);
    (start..buffer.len())
        .find(|&i| magic.starts_with(&buffer[i..]))
        .unwrap_or(buffer.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CrMessage;

    impl MessageDescriptor for CrMessage {
        fn header_length(&self) -> HeaderLength {
            HeaderLength::Terminated {
                terminator: Terminator::One(0x03),
                trailing: 2,
            }
        }
    }

    #[test]
    fn test_packed_fixed_and_dynamic() {
        assert_eq!(HeaderLength::try_from(8).unwrap(), HeaderLength::Fixed(8));
        assert_eq!(HeaderLength::try_from(-1).unwrap(), HeaderLength::Dynamic);
        assert_eq!(HeaderLength::Dynamic.to_packed().unwrap(), -1);
        assert_eq!(HeaderLength::Fixed(16).to_packed().unwrap(), 16);
    }

    #[test]
    fn test_packed_terminated_layout() {
        let length = HeaderLength::Terminated {
            terminator: Terminator::Two(0x0D, 0x0A),
            trailing: 0,
        };
        let packed = length.to_packed().unwrap();
        assert_eq!(packed.to_be_bytes(), [0x82, 0x00, 0x0D, 0x0A]);
        assert_eq!(HeaderLength::try_from(packed).unwrap(), length);
    }

    #[test]
    fn test_packed_bad_count() {
        let packed = i32::from_be_bytes([0x83, 0x00, 0x0D, 0x0A]);
        assert!(HeaderLength::try_from(packed).is_err());
    }

    #[test]
    fn test_packed_trailing_too_large() {
        let length = HeaderLength::Terminated {
            terminator: Terminator::One(0x0D),
            trailing: 300,
        };
        assert!(length.to_packed().is_err());
    }

    #[test]
    fn test_terminated_frame_length_waits_for_trailer() {
        let d = CrMessage;
        let frame = [0x02, b'A', b'B', 0x03, b'C', b'3'];
        for end in 0..frame.len() {
            assert!(!d.is_complete(&[], &frame[..end]), "prefix {}", end);
        }
        assert_eq!(d.frame_length(&[], &frame), Some(6));
        let mut longer = frame.to_vec();
        longer.extend_from_slice(&[0x02, 0x03]);
        assert_eq!(d.frame_length(&[], &longer), Some(6));
    }

    #[test]
    fn test_match_outcome_numeric() {
        for outcome in [MatchOutcome::Accept, MatchOutcome::Reject, MatchOutcome::Continue] {
            assert_eq!(MatchOutcome::from_i32(outcome.as_i32()), outcome);
        }
        assert_eq!(MatchOutcome::from_i32(7), MatchOutcome::Accept);
        assert_eq!(MatchOutcome::from_i32(-5), MatchOutcome::Continue);
    }

    #[test]
    fn test_find_sync() {
        assert_eq!(find_sync(b"FINS", b"FINS"), 0);
        assert_eq!(find_sync(b"\x00\x01FINS\x00", b"FINS"), 2);
        assert_eq!(find_sync(b"\x00\x01\x02F", b"FINS"), 3);
        assert_eq!(find_sync(b"\x00\x01\x02FIN", b"FINS"), 3);
        assert_eq!(find_sync(b"\x00\x01\x02", b"FINS"), 3);
        assert_eq!(find_sync(b"", b"FINS"), 0);
    }

    #[test]
    fn test_default_match_response() {
        assert_eq!(CrMessage.match_response(b"a", b"b"), MatchOutcome::Accept);
    }
}
