//! Byte sources and sinks consumed by the receiver.
//!
//! The receiver never opens or closes a connection. It only needs something
//! that implements [`ByteSource`] (and [`ByteSink`] for
//! [`send_receive`](crate::FrameReceiver::send_receive)). This module defines
//! those two traits and three adapters:
//!
//! - [`TcpTransport`] - blocking `TcpStream`
//! - [`UdpTransport`] - connected UDP socket, one datagram per read
//! - [`MemoryTransport`] - scripted in-process chunks, for tests and demos
//!
//! # Constants
//!
//! - [`MAX_DATAGRAM_SIZE`] - receive buffer size for one UDP datagram
//!
//! # Example
//!
//! ```
//! use plc_framing::{ByteSource, MemoryTransport};
//! use std::time::Duration;
//!
//! let mut transport = MemoryTransport::new();
//! transport.push_chunk(vec![0x03, 0x00]);
//! transport.push_chunk(vec![0x00, 0x04]);
//!
//! let bytes = transport.read_at_least(3, Duration::from_millis(10)).unwrap();
//! assert_eq!(bytes, vec![0x03, 0x00, 0x00, 0x04]);
//! ```

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::time::Duration;

use crate::error::{FrameError, Result};

/// Maximum UDP datagram size accepted by [`UdpTransport`].
pub const MAX_DATAGRAM_SIZE: usize = 2048;

const READ_CHUNK_SIZE: usize = 1024;

/// Blocking source of bytes from one connection.
pub trait ByteSource {
    /// Reads up to `n` bytes, blocking at most `timeout` for the first.
    ///
    /// `n` is how many bytes the receiver still needs. Implementations may
    /// return more (surplus is buffered) or fewer (the receiver reads
    /// again), but must return as soon as something arrived so that the
    /// receiver regains control between reads. An empty vector means end
    /// of stream.
    ///
    /// # Arguments
    ///
    /// * `n` - Bytes still missing from the current frame
    /// * `timeout` - Upper bound on the wait for the first byte
    ///
    /// # Errors
    ///
    /// Returns `FrameError::Timeout` when nothing arrived within `timeout`.
    fn read_at_least(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>>;

    /// Returns whether every read yields exactly one datagram.
    ///
    /// The receiver then treats each read as one candidate frame and never
    /// joins bytes of two datagrams. Defaults to `false`.
    fn is_datagram(&self) -> bool {
        false
    }
}

/// Blocking sink of bytes to one connection.
pub trait ByteSink {
    /// Writes all of `data`.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;
}

fn map_read_error(e: std::io::Error) -> FrameError {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => FrameError::Timeout,
        _ => FrameError::Io(e),
    }
}

/// TCP transport over a blocking `TcpStream`.
pub struct TcpTransport {
    stream: TcpStream,
    remote_addr: SocketAddr,
}

impl TcpTransport {
    /// Connects to `addr`, waiting at most `timeout` for the handshake.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address of the device (IP:port)
    /// * `timeout` - Connect timeout
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the connection cannot be established.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use plc_framing::TcpTransport;
    /// use std::time::Duration;
    ///
    /// let transport = TcpTransport::connect(
    ///     "192.168.1.10:502".parse().unwrap(),
    ///     Duration::from_secs(2),
    /// ).unwrap();
    /// ```
    pub fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        Self::from_stream(stream)
    }

    /// Wraps an already connected stream.
    ///
    /// # Arguments
    ///
    /// * `stream` - Connected stream; its read timeout is managed per read
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the peer address cannot be read.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        let remote_addr = stream.peer_addr()?;
        Ok(Self {
            stream,
            remote_addr,
        })
    }

    /// Returns the remote device address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Returns a reference to the underlying stream.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl ByteSource for TcpTransport {
    fn read_at_least(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        // A zero read timeout means "block forever" to the OS.
        self.stream
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        // One read only: the receiver checks its deadline and cancel token
        // between calls.
        let mut buffer = vec![0u8; n.max(READ_CHUNK_SIZE)];
        loop {
            match self.stream.read(&mut buffer) {
                Ok(size) => {
                    buffer.truncate(size);
                    return Ok(buffer);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_read_error(e)),
            }
        }
    }
}

impl ByteSink for TcpTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data)?;
        Ok(())
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.stream.local_addr().ok())
            .finish()
    }
}

/// UDP transport for datagram protocols such as FINS/UDP.
///
/// Each read returns exactly one datagram regardless of `n`; datagram
/// protocols frame with [`HeaderLength::Dynamic`](crate::HeaderLength::Dynamic).
pub struct UdpTransport {
    socket: UdpSocket,
    remote_addr: SocketAddr,
}

impl UdpTransport {
    /// Creates a UDP transport connected to the specified device address.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - Socket address of the device (IP:port)
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket cannot be created or configured.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use plc_framing::UdpTransport;
    ///
    /// let transport = UdpTransport::new("192.168.1.10:9600".parse().unwrap()).unwrap();
    /// ```
    pub fn new(remote_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(remote_addr)?;
        Ok(Self {
            socket,
            remote_addr,
        })
    }

    /// Returns the remote device address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Returns a reference to the underlying socket.
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

impl ByteSource for UdpTransport {
    fn read_at_least(&mut self, _n: usize, timeout: Duration) -> Result<Vec<u8>> {
        self.socket
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            match self.socket.recv(&mut buffer) {
                Ok(size) => {
                    buffer.truncate(size);
                    return Ok(buffer);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_read_error(e)),
            }
        }
    }

    fn is_datagram(&self) -> bool {
        true
    }
}

impl ByteSink for UdpTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.socket.send(data)?;
        Ok(())
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.socket.local_addr().ok())
            .finish()
    }
}

/// In-process transport fed with scripted chunks.
///
/// Each read hands out queued chunks until at least `n` bytes were
/// returned or the queue ran dry; a transport created with
/// [`datagram`](Self::datagram) hands out exactly one chunk per read
/// instead, like [`UdpTransport`]. An empty queue reports
/// `FrameError::Timeout`, or end of stream once [`close`](Self::close) was
/// called. Everything written is recorded.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    chunks: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    closed: bool,
    reads: usize,
    datagram: bool,
}

impl MemoryTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty transport that delivers one chunk per read.
    ///
    /// # Example
    ///
    /// ```
    /// use plc_framing::{ByteSource, MemoryTransport};
    /// use std::time::Duration;
    ///
    /// let mut transport = MemoryTransport::datagram();
    /// transport.push_chunk(vec![0x01]);
    /// transport.push_chunk(vec![0x02, 0x03]);
    /// assert!(transport.is_datagram());
    /// assert_eq!(transport.read_at_least(3, Duration::from_millis(10)).unwrap(), vec![0x01]);
    /// ```
    pub fn datagram() -> Self {
        Self {
            datagram: true,
            ..Self::default()
        }
    }

    /// Creates a transport that delivers `data` in chunks of `chunk_size`.
    ///
    /// # Arguments
    ///
    /// * `data` - Bytes to deliver
    /// * `chunk_size` - Size of each queued chunk (at least 1)
    ///
    /// # Example
    ///
    /// ```
    /// use plc_framing::MemoryTransport;
    ///
    /// let transport = MemoryTransport::chunked(&[1, 2, 3, 4, 5], 2);
    /// assert_eq!(transport.pending_chunks(), 3);
    /// ```
    pub fn chunked(data: &[u8], chunk_size: usize) -> Self {
        let mut transport = Self::new();
        for chunk in data.chunks(chunk_size.max(1)) {
            transport.push_chunk(chunk.to_vec());
        }
        transport
    }

    /// Queues one chunk for delivery.
    pub fn push_chunk(&mut self, chunk: impl Into<Vec<u8>>) {
        self.chunks.push_back(chunk.into());
    }

    /// Marks the stream as ended once the queued chunks are consumed.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Number of chunks not yet delivered.
    pub fn pending_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Number of `read_at_least` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Every buffer passed to [`ByteSink::write_all`], in order.
    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }
}

impl ByteSource for MemoryTransport {
    fn read_at_least(&mut self, n: usize, _timeout: Duration) -> Result<Vec<u8>> {
        self.reads += 1;
        let mut out = Vec::new();
        let wanted = if self.datagram { 1 } else { n.max(1) };
        while out.len() < wanted {
            match self.chunks.pop_front() {
                Some(chunk) => out.extend_from_slice(&chunk),
                None => break,
            }
        }
        if out.is_empty() && !self.closed {
            return Err(FrameError::Timeout);
        }
        Ok(out)
    }

    fn is_datagram(&self) -> bool {
        self.datagram
    }
}

impl ByteSink for MemoryTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.written.push(data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_default_constants() {
        assert_eq!(MAX_DATAGRAM_SIZE, 2048);
    }

    #[test]
    fn test_memory_transport_reads_chunks() {
        let mut transport = MemoryTransport::chunked(&[1, 2, 3, 4, 5], 2);
        let timeout = Duration::from_millis(1);
        assert_eq!(transport.read_at_least(1, timeout).unwrap(), vec![1, 2]);
        assert_eq!(transport.read_at_least(3, timeout).unwrap(), vec![3, 4, 5]);
        assert!(matches!(
            transport.read_at_least(1, timeout),
            Err(FrameError::Timeout)
        ));
        transport.close();
        assert!(transport.read_at_least(1, timeout).unwrap().is_empty());
        assert_eq!(transport.reads(), 4);
    }

    #[test]
    fn test_memory_transport_records_writes() {
        let mut transport = MemoryTransport::new();
        transport.write_all(&[0xAA]).unwrap();
        transport.write_all(&[0xBB, 0xCC]).unwrap();
        assert_eq!(transport.written(), &[vec![0xAA], vec![0xBB, 0xCC]]);
    }

    #[test]
    fn test_tcp_transport_reads_from_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut peer, _) = listener.accept().unwrap();
            peer.write_all(&[0x03, 0x00, 0x00, 0x04]).unwrap();
        });

        let mut transport = TcpTransport::connect(addr, Duration::from_secs(1)).unwrap();
        assert_eq!(transport.remote_addr(), addr);
        let mut received = Vec::new();
        while received.len() < 4 {
            let chunk = transport
                .read_at_least(4 - received.len(), Duration::from_secs(1))
                .unwrap();
            assert!(!chunk.is_empty());
            received.extend(chunk);
        }
        assert_eq!(received, vec![0x03, 0x00, 0x00, 0x04]);
        server.join().unwrap();
    }

    #[test]
    fn test_tcp_transport_returns_first_chunk() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut peer, _) = listener.accept().unwrap();
            peer.write_all(&[0x03]).unwrap();
            std::thread::sleep(Duration::from_millis(300));
            let _ = peer.write_all(&[0x00, 0x00, 0x04]);
        });

        let mut transport = TcpTransport::connect(addr, Duration::from_secs(1)).unwrap();
        let started = std::time::Instant::now();
        let chunk = transport.read_at_least(4, Duration::from_secs(1)).unwrap();
        assert_eq!(chunk, vec![0x03]);
        assert!(started.elapsed() < Duration::from_millis(250));
        assert!(!transport.is_datagram());
        server.join().unwrap();
    }

    #[test]
    fn test_memory_datagram_mode() {
        let mut transport = MemoryTransport::datagram();
        transport.push_chunk(vec![0x00, 0x11]);
        transport.push_chunk(vec![0xC0, 0x00, 0x02]);
        let timeout = Duration::from_millis(1);
        assert!(transport.is_datagram());
        assert_eq!(transport.read_at_least(14, timeout).unwrap(), vec![0x00, 0x11]);
        assert_eq!(transport.read_at_least(14, timeout).unwrap(), vec![0xC0, 0x00, 0x02]);
        assert!(!MemoryTransport::new().is_datagram());
    }

    #[test]
    fn test_udp_transport_creation() {
        let addr: SocketAddr = "127.0.0.1:9600".parse().unwrap();
        let transport = UdpTransport::new(addr).unwrap();
        assert_eq!(transport.remote_addr(), addr);
        assert!(transport.is_datagram());
        let debug_str = format!("{:?}", transport);
        assert!(debug_str.contains("UdpTransport"));
        assert!(debug_str.contains("127.0.0.1:9600"));
    }

    #[test]
    fn test_udp_transport_timeout() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut transport = UdpTransport::new(peer.local_addr().unwrap()).unwrap();
        let result = transport.read_at_least(1, Duration::from_millis(20));
        assert!(matches!(result, Err(FrameError::Timeout)));
    }
}
