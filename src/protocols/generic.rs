//! Terminator-delimited framing for protocols described only by their end
//! bytes.

use crate::descriptor::{HeaderLength, MessageDescriptor, Terminator};

/// A frame that ends at a given byte sequence, optionally followed by a
/// fixed number of trailing bytes such as a checksum.
///
/// # Example
///
/// ```
/// use plc_framing::protocols::SpecifiedCharacterMessage;
/// use plc_framing::{MessageDescriptor, Terminator};
///
/// let etx_bcc = SpecifiedCharacterMessage::new(Terminator::One(0x03)).with_trailing(1);
/// assert_eq!(etx_bcc.frame_length(&[], b"\x02ABC\x03"), None);
/// assert_eq!(etx_bcc.frame_length(&[], b"\x02ABC\x03\x41\x02"), Some(6));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecifiedCharacterMessage {
    terminator: Terminator,
    trailing: usize,
}

impl SpecifiedCharacterMessage {
    /// Creates a descriptor for frames ending at `terminator`.
    pub fn new(terminator: Terminator) -> Self {
        Self {
            terminator,
            trailing: 0,
        }
    }

    /// Sets how many bytes follow the terminator.
    pub fn with_trailing(mut self, trailing: usize) -> Self {
        self.trailing = trailing;
        self
    }

    /// The end byte sequence.
    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    /// Bytes following the terminator.
    pub fn trailing(&self) -> usize {
        self.trailing
    }
}

impl MessageDescriptor for SpecifiedCharacterMessage {
    fn header_length(&self) -> HeaderLength {
        HeaderLength::Terminated {
            terminator: self.terminator,
            trailing: self.trailing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf() {
        let d = SpecifiedCharacterMessage::new(Terminator::Two(b'\r', b'\n'));
        assert_eq!(d.frame_length(&[], b"OK\r"), None);
        assert_eq!(d.frame_length(&[], b"OK\r\nNEXT"), Some(4));
        // A lone LF is not the terminator.
        assert_eq!(d.frame_length(&[], b"O\nK\r\n"), Some(5));
    }

    #[test]
    fn test_header_length_carries_config() {
        let d = SpecifiedCharacterMessage::new(Terminator::One(b'#')).with_trailing(2);
        assert_eq!(d.terminator(), Terminator::One(b'#'));
        assert_eq!(d.trailing(), 2);
        assert_eq!(
            d.header_length(),
            HeaderLength::Terminated {
                terminator: Terminator::One(b'#'),
                trailing: 2
            }
        );
        assert!(d.header_length().is_dynamic());
    }
}
