//! Generic frame receiver and response correlator.
//!
//! This module provides the [`FrameReceiver`] struct, which turns the byte
//! stream of one connection into complete frames using a
//! [`MessageDescriptor`].
//!
//! # Overview
//!
//! For a fixed header the receiver:
//! 1. reads the header window,
//! 2. validates it, dropping leading garbage via
//!    [`resync_offset`](MessageDescriptor::resync_offset) when it is invalid,
//! 3. asks for the body length, growing the header while the descriptor
//!    answers [`BodyLength::NeedMore`] (at most
//!    [`MAX_HEADER_RESOLUTION_ATTEMPTS`] times),
//! 4. reads the body and verifies the complete frame.
//!
//! For dynamic and terminated regimes it reads until
//! [`frame_length`](MessageDescriptor::frame_length) reports a complete
//! frame.
//!
//! Bytes read past the end of a frame stay buffered for the next call.
//! After any error the buffer is cleared.
//!
//! # Example
//!
//! ```
//! use plc_framing::protocols::S7Message;
//! use plc_framing::{FrameReceiver, MemoryTransport};
//! use std::time::Duration;
//!
//! let frame = [0x03, 0x00, 0x00, 0x07, 0x02, 0xF0, 0x80];
//! let transport = MemoryTransport::chunked(&frame, 1);
//!
//! let mut receiver = FrameReceiver::new(transport);
//! let message = receiver
//!     .receive(&S7Message, &[], Duration::from_secs(1))
//!     .unwrap();
//! assert_eq!(message.content(), &[0x02, 0xF0, 0x80]);
//! ```
//!
//! # Timeouts and Cancellation
//!
//! The `timeout` passed to each call is an overall deadline for the message.
//! Every transport read is additionally bounded by
//! [`ReceiverConfig::read_timeout`]; a read that times out while the
//! deadline has not passed is simply retried, which is also where a
//! [`CancelToken`] is observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::descriptor::{BodyLength, HeaderLength, MatchOutcome, MessageDescriptor};
use crate::descriptor::MAX_HEADER_RESOLUTION_ATTEMPTS;
use crate::error::{FrameError, Result};
use crate::message::RawMessage;
use crate::transport::{ByteSink, ByteSource};
use crate::utils::format_bytes;

/// Default bound on a single transport read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Default upper bound on the size of one frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Default number of resync steps before giving up on a header.
pub const DEFAULT_MAX_RESYNC_ATTEMPTS: usize = 16;

/// Configuration for a [`FrameReceiver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Upper bound on one transport read.
    pub read_timeout: Duration,
    /// Largest frame accepted; longer frames are framing errors.
    pub max_frame_size: usize,
    /// Resync steps allowed per header.
    pub max_resync_attempts: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_resync_attempts: DEFAULT_MAX_RESYNC_ATTEMPTS,
        }
    }
}

impl ReceiverConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-read timeout (default is 100 ms).
    ///
    /// # Arguments
    ///
    /// * `read_timeout` - Upper bound on one transport read; also how often
    ///   the deadline and cancel token are checked while the line is idle
    ///
    /// # Example
    ///
    /// ```
    /// use plc_framing::ReceiverConfig;
    /// use std::time::Duration;
    ///
    /// let config = ReceiverConfig::new()
    ///     .with_read_timeout(Duration::from_millis(20))
    ///     .with_max_frame_size(4096);
    /// assert_eq!(config.max_frame_size, 4096);
    /// ```
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Sets the maximum frame size (default is 64 KiB).
    ///
    /// # Arguments
    ///
    /// * `max_frame_size` - Largest frame in bytes, header included
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Sets the number of resync steps allowed per frame (default is 16).
    ///
    /// # Arguments
    ///
    /// * `attempts` - Times leading bytes may be dropped before the receive
    ///   fails with a framing error
    pub fn with_max_resync_attempts(mut self, attempts: usize) -> Self {
        self.max_resync_attempts = attempts;
        self
    }
}

/// Shared flag that aborts a blocked receive between two reads.
///
/// Clones share the same flag.
///
/// # Example
///
/// ```
/// use plc_framing::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clears a previous cancellation so the token can be reused.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Returns whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
struct Deadline(Instant);

impl Deadline {
    fn after(timeout: Duration) -> Self {
        assert!(!timeout.is_zero(), "receive timeout must be non-zero");
        Deadline(Instant::now() + timeout)
    }

    fn remaining(self) -> Result<Duration> {
        let now = Instant::now();
        if now >= self.0 {
            Err(FrameError::Timeout)
        } else {
            Ok(self.0 - now)
        }
    }
}

/// Frame receiver for one connection.
///
/// Owns the byte source and the bytes already read but not yet returned.
/// Descriptors are passed per call so that a connection can switch protocol
/// phases (e.g. a handshake followed by data exchange).
pub struct FrameReceiver<T> {
    transport: T,
    pending: BytesMut,
    config: ReceiverConfig,
    cancel: Option<CancelToken>,
}

impl<T: ByteSource> FrameReceiver<T> {
    /// Creates a receiver with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ReceiverConfig::default())
    }

    /// Creates a receiver with a custom configuration.
    ///
    /// # Arguments
    ///
    /// * `transport` - Byte source of the connection
    /// * `config` - Timeouts and limits
    pub fn with_config(transport: T, config: ReceiverConfig) -> Self {
        Self {
            transport,
            pending: BytesMut::with_capacity(1024),
            config,
            cancel: None,
        }
    }

    /// Attaches a cancellation token checked before every read.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Returns a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consumes the receiver and returns the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Bytes read from the transport that belong to no frame yet.
    pub fn buffered(&self) -> &[u8] {
        &self.pending
    }

    /// Discards buffered bytes, e.g. after reconnecting.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Receives exactly one complete frame.
    ///
    /// `sent` is the request the frame answers; descriptors that derive the
    /// body length from the request read it, others ignore it. A non-empty
    /// `sent` is kept on the returned message.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - Framing rules of the protocol
    /// * `sent` - Request the frame answers, or empty
    /// * `timeout` - Overall deadline for the whole frame
    ///
    /// # Errors
    ///
    /// - `FrameError::Framing` - invalid header and no resync possible
    /// - `FrameError::HeaderUnresolved` - header still growing after 16 attempts
    /// - `FrameError::ChecksumMismatch` - frame failed verification
    /// - `FrameError::Timeout` - deadline expired
    /// - `FrameError::Cancelled` - the cancel token fired
    /// - `FrameError::ConnectionClosed` - the source reached end of stream
    ///
    /// # Panics
    ///
    /// Panics if `timeout` is zero.
    pub fn receive<D>(&mut self, descriptor: &D, sent: &[u8], timeout: Duration) -> Result<RawMessage>
    where
        D: MessageDescriptor + ?Sized,
    {
        let deadline = Deadline::after(timeout);
        let result = self.receive_until(descriptor, sent, deadline);
        if result.is_err() {
            self.pending.clear();
        }
        result
    }

    /// Receives frames until one answers `sent`.
    ///
    /// Frames for which the descriptor answers [`MatchOutcome::Continue`]
    /// are discarded and the receiver keeps reading under the same
    /// deadline.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - Framing and correlation rules of the protocol
    /// * `sent` - Request the frame must answer
    /// * `timeout` - Overall deadline, shared by all discarded frames
    ///
    /// # Errors
    ///
    /// Everything [`receive`](Self::receive) returns, plus
    /// `FrameError::CorrelationRejected` when the descriptor answers
    /// [`MatchOutcome::Reject`].
    ///
    /// # Panics
    ///
    /// Panics if `timeout` is zero.
    pub fn receive_correlated<D>(
        &mut self,
        descriptor: &D,
        sent: &[u8],
        timeout: Duration,
    ) -> Result<RawMessage>
    where
        D: MessageDescriptor + ?Sized,
    {
        let deadline = Deadline::after(timeout);
        let result = self.correlate(descriptor, sent, deadline);
        if result.is_err() {
            self.pending.clear();
        }
        result
    }

    fn correlate<D>(&mut self, descriptor: &D, sent: &[u8], deadline: Deadline) -> Result<RawMessage>
    where
        D: MessageDescriptor + ?Sized,
    {
        loop {
            let message = self.receive_until(descriptor, sent, deadline)?;
            match descriptor.match_response(sent, message.as_bytes()) {
                MatchOutcome::Accept => return Ok(message),
                MatchOutcome::Reject => {
                    return Err(FrameError::correlation_rejected(
                        descriptor.correlation_id(sent),
                        descriptor.correlation_id(message.as_bytes()),
                    ))
                }
                MatchOutcome::Continue => {
                    debug!(
                        len = message.len(),
                        id = ?descriptor.correlation_id(message.as_bytes()),
                        frame = %format_bytes(message.as_bytes()),
                        "discarding uncorrelated frame"
                    );
                }
            }
        }
    }

    fn receive_until<D>(&mut self, descriptor: &D, sent: &[u8], deadline: Deadline) -> Result<RawMessage>
    where
        D: MessageDescriptor + ?Sized,
    {
        match descriptor.header_length() {
            HeaderLength::Fixed(header_len) => {
                self.receive_fixed(descriptor, header_len, sent, deadline)
            }
            HeaderLength::Dynamic | HeaderLength::Terminated { .. } => {
                if self.transport.is_datagram() {
                    self.receive_datagram(descriptor, sent, deadline)
                } else {
                    self.receive_dynamic(descriptor, sent, deadline)
                }
            }
        }
    }

    fn receive_fixed<D>(
        &mut self,
        descriptor: &D,
        mut header_len: usize,
        sent: &[u8],
        deadline: Deadline,
    ) -> Result<RawMessage>
    where
        D: MessageDescriptor + ?Sized,
    {
        self.fill(header_len, deadline)?;

        let mut resyncs = 0;
        while !descriptor.validate_header(&self.pending[..header_len]) {
            if resyncs >= self.config.max_resync_attempts {
                return Err(FrameError::framing(format!(
                    "no valid header after {} resync attempts",
                    resyncs
                )));
            }
            let skip = descriptor
                .resync_offset(&self.pending)
                .min(self.pending.len());
            if skip == 0 {
                return Err(FrameError::framing("invalid header"));
            }
            debug!(skip, "discarding bytes before frame start");
            self.pending.advance(skip);
            resyncs += 1;
            self.fill(header_len, deadline)?;
        }

        let mut attempts = 0;
        let body_len = loop {
            attempts += 1;
            match descriptor.body_length(&self.pending[..header_len], sent)? {
                BodyLength::Known(n) => break n,
                BodyLength::NeedMore(0) => {
                    return Err(FrameError::framing(
                        "descriptor requested zero additional header bytes",
                    ))
                }
                BodyLength::NeedMore(extra) => {
                    if attempts >= MAX_HEADER_RESOLUTION_ATTEMPTS {
                        return Err(FrameError::HeaderUnresolved { attempts });
                    }
                    trace!(header_len, extra, "header needs more bytes");
                    header_len = header_len.saturating_add(extra);
                    self.fill(header_len, deadline)?;
                }
            }
        };

        let total = header_len.saturating_add(body_len);
        self.fill(total, deadline)?;
        let frame = self.pending.split_to(total).freeze();
        descriptor.verify_frame(&frame)?;
        Ok(message(frame, header_len, sent))
    }

    fn receive_dynamic<D>(&mut self, descriptor: &D, sent: &[u8], deadline: Deadline) -> Result<RawMessage>
    where
        D: MessageDescriptor + ?Sized,
    {
        let mut resyncs = 0;
        loop {
            if !self.pending.is_empty() {
                if let Some(len) = descriptor.frame_length(sent, &self.pending) {
                    if len == 0 || len > self.pending.len() {
                        return Err(FrameError::framing(format!(
                            "descriptor reported frame length {} with {} bytes buffered",
                            len,
                            self.pending.len()
                        )));
                    }
                    match descriptor.verify_frame(&self.pending[..len]) {
                        Ok(()) => {
                            let frame = self.pending.split_to(len).freeze();
                            return Ok(message(frame, 0, sent));
                        }
                        Err(e) => {
                            let skip = descriptor
                                .resync_offset(&self.pending)
                                .min(self.pending.len());
                            if skip == 0 || resyncs >= self.config.max_resync_attempts {
                                return Err(e);
                            }
                            debug!(skip, error = %e, "discarding bytes before frame start");
                            self.pending.advance(skip);
                            resyncs += 1;
                            continue;
                        }
                    }
                }
            }
            if self.pending.len() >= self.config.max_frame_size {
                return Err(FrameError::framing(format!(
                    "no complete frame within {} bytes",
                    self.config.max_frame_size
                )));
            }
            self.read_more(1, deadline)?;
        }
    }

    /// Each transport read is one candidate frame; bytes of two datagrams
    /// are never joined. Incomplete or invalid datagrams are skipped.
    fn receive_datagram<D>(&mut self, descriptor: &D, sent: &[u8], deadline: Deadline) -> Result<RawMessage>
    where
        D: MessageDescriptor + ?Sized,
    {
        loop {
            self.pending.clear();
            self.read_more(1, deadline)?;
            let len = match descriptor.frame_length(sent, &self.pending) {
                Some(len) if len > 0 && len <= self.pending.len() => len,
                _ => {
                    debug!(
                        len = self.pending.len(),
                        datagram = %format_bytes(&self.pending),
                        "discarding incomplete datagram"
                    );
                    continue;
                }
            };
            if let Err(e) = descriptor.verify_frame(&self.pending[..len]) {
                debug!(len, error = %e, "discarding invalid datagram");
                continue;
            }
            if len < self.pending.len() {
                trace!(extra = self.pending.len() - len, "ignoring bytes after frame in datagram");
            }
            let frame = self.pending.split_to(len).freeze();
            self.pending.clear();
            return Ok(message(frame, 0, sent));
        }
    }

    /// Reads until at least `n` bytes are buffered.
    fn fill(&mut self, n: usize, deadline: Deadline) -> Result<()> {
        if n > self.config.max_frame_size {
            return Err(FrameError::framing(format!(
                "frame length {} exceeds maximum {}",
                n, self.config.max_frame_size
            )));
        }
        while self.pending.len() < n {
            self.read_more(n - self.pending.len(), deadline)?;
        }
        Ok(())
    }

    /// Performs one successful transport read of up to `n` bytes.
    fn read_more(&mut self, n: usize, deadline: Deadline) -> Result<()> {
        loop {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(FrameError::Cancelled);
            }
            let remaining = deadline.remaining()?;
            match self
                .transport
                .read_at_least(n, remaining.min(self.config.read_timeout))
            {
                Ok(chunk) if chunk.is_empty() => return Err(FrameError::ConnectionClosed),
                Ok(chunk) => {
                    trace!(len = chunk.len(), "read");
                    self.pending.extend_from_slice(&chunk);
                    return Ok(());
                }
                Err(FrameError::Timeout) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

fn message(frame: Bytes, header_len: usize, sent: &[u8]) -> RawMessage {
    let message = RawMessage::new(frame, header_len);
    if sent.is_empty() {
        message
    } else {
        message.with_sent(Bytes::copy_from_slice(sent))
    }
}

impl<T: ByteSource + ByteSink> FrameReceiver<T> {
    /// Writes `request` and receives the frame that answers it.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - Framing and correlation rules of the protocol
    /// * `request` - Complete request frame to write
    /// * `timeout` - Overall deadline for the answer
    ///
    /// # Errors
    ///
    /// Write failures, plus everything
    /// [`receive_correlated`](Self::receive_correlated) returns.
    ///
    /// # Example
    ///
    /// ```
    /// use plc_framing::protocols::ModbusTcpMessage;
    /// use plc_framing::{FrameReceiver, MemoryTransport};
    /// use std::time::Duration;
    ///
    /// let mut transport = MemoryTransport::new();
    /// transport.push_chunk(vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x12, 0x34]);
    ///
    /// let mut receiver = FrameReceiver::new(transport);
    /// let request = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
    /// let reply = receiver
    ///     .send_receive(&ModbusTcpMessage::new(), &request, Duration::from_secs(1))
    ///     .unwrap();
    /// assert_eq!(reply.content(), &[0x02, 0x12, 0x34]);
    /// assert_eq!(receiver.transport().written(), &[request.to_vec()]);
    /// ```
    pub fn send_receive<D>(
        &mut self,
        descriptor: &D,
        request: &[u8],
        timeout: Duration,
    ) -> Result<RawMessage>
    where
        D: MessageDescriptor + ?Sized,
    {
        self.transport.write_all(request)?;
        self.receive_correlated(descriptor, request, timeout)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for FrameReceiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReceiver")
            .field("transport", &self.transport)
            .field("buffered", &self.pending.len())
            .field("config", &self.config)
            .finish()
    }
}
