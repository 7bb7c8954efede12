//! Delimited messages returned by the receiver.
//!
//! A [`RawMessage`] is one complete frame as it appeared on the wire, split
//! into the header the descriptor analysed and the content that followed.
//!
//! | Regime | Header | Content |
//! |--------|--------|---------|
//! | Fixed | the resolved header (including any growth) | the body |
//! | Dynamic / Terminated | empty | the whole frame |
//!
//! The request a frame answers travels with it when the receiver was given
//! one ([`sent`](RawMessage::sent)), so decoders whose layout depends on
//! the request do not need to keep it themselves.
//!
//! # Example
//!
//! ```
//! use plc_framing::RawMessage;
//!
//! let message = RawMessage::new(vec![0x03, 0x00, 0x00, 0x06, 0xAA, 0xBB], 4);
//! assert_eq!(message.header(), &[0x03, 0x00, 0x00, 0x06]);
//! assert_eq!(message.content(), &[0xAA, 0xBB]);
//! assert_eq!(message.len(), 6);
//! ```

use bytes::Bytes;

/// One complete frame delimited from a byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    frame: Bytes,
    header_len: usize,
    sent: Option<Bytes>,
}

impl RawMessage {
    /// Creates a message from a complete frame whose first `header_len`
    /// bytes are the header. `header_len` is clamped to the frame length.
    pub fn new(frame: impl Into<Bytes>, header_len: usize) -> Self {
        let frame = frame.into();
        let header_len = header_len.min(frame.len());
        Self {
            frame,
            header_len,
            sent: None,
        }
    }

    /// Attaches the request this frame answers.
    ///
    /// # Example
    ///
    /// ```
    /// use plc_framing::RawMessage;
    ///
    /// let message = RawMessage::new(vec![0x01, 0x83, 0x02], 0).with_sent(vec![0x01, 0x03]);
    /// assert_eq!(message.sent(), Some(&[0x01, 0x03][..]));
    /// ```
    pub fn with_sent(mut self, sent: impl Into<Bytes>) -> Self {
        self.sent = Some(sent.into());
        self
    }

    /// The request this frame answers, if the receiver was given one.
    pub fn sent(&self) -> Option<&[u8]> {
        self.sent.as_deref()
    }

    /// Header bytes.
    pub fn header(&self) -> &[u8] {
        &self.frame[..self.header_len]
    }

    /// Content bytes following the header.
    pub fn content(&self) -> &[u8] {
        &self.frame[self.header_len..]
    }

    /// Header followed by content, exactly as received.
    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    /// Total frame length.
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    /// Returns whether the frame has no bytes.
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// Consumes the message and returns the frame.
    pub fn into_bytes(self) -> Bytes {
        self.frame
    }
}

impl AsRef<[u8]> for RawMessage {
    fn as_ref(&self) -> &[u8] {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_header_content() {
        let message = RawMessage::new(vec![1, 2, 3, 4, 5], 2);
        assert_eq!(message.header(), &[1, 2]);
        assert_eq!(message.content(), &[3, 4, 5]);
        assert_eq!(message.as_bytes(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_dynamic_message_has_empty_header() {
        let message = RawMessage::new(b":0103\r\n".to_vec(), 0);
        assert!(message.header().is_empty());
        assert_eq!(message.content(), b":0103\r\n");
    }

    #[test]
    fn test_header_len_clamped() {
        let message = RawMessage::new(vec![1, 2], 8);
        assert_eq!(message.header(), &[1, 2]);
        assert!(message.content().is_empty());
        assert!(!message.is_empty());
    }

    #[test]
    fn test_sent_request_kept() {
        let message = RawMessage::new(vec![1, 2, 3], 1);
        assert_eq!(message.sent(), None);
        let message = message.with_sent(vec![7, 7]);
        assert_eq!(message.sent(), Some(&[7, 7][..]));
        assert_eq!(message.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_into_bytes() {
        let message = RawMessage::new(vec![9, 8, 7], 1);
        assert_eq!(&message.into_bytes()[..], &[9, 8, 7]);
    }
}
