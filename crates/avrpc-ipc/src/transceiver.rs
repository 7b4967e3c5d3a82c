use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;

use avrpc_frame::{FrameConfig, MessageReader, MessageWriter};

use crate::error::Result;

/// Blocking client-side transceiver: one connection, one outstanding
/// request at a time.
///
/// `transceive` blocks the calling thread for the whole round trip. A
/// transceiver is not meant to be shared between threads; use one per
/// thread or serialize access externally (`&mut self` enforces this within
/// safe code).
pub struct SocketTransceiver {
    reader: MessageReader<TcpStream>,
    writer: MessageWriter<TcpStream>,
}

impl SocketTransceiver {
    /// Connect to a remote endpoint with default framing configuration.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream, FrameConfig::default())
    }

    /// Connect with a bound on connection establishment time.
    pub fn connect_timeout(addr: &SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(addr, timeout)?;
        Self::from_stream(stream, FrameConfig::default())
    }

    /// Connect with explicit framing configuration; read/write timeouts
    /// from the config are applied to the socket.
    pub fn connect_with_config(addr: impl ToSocketAddrs, config: FrameConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream, config)
    }

    fn from_stream(stream: TcpStream, config: FrameConfig) -> Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;

        let reader_stream = stream.try_clone()?;
        Ok(Self {
            reader: MessageReader::with_config(reader_stream, config.clone()),
            writer: MessageWriter::with_config(stream, config),
        })
    }

    /// Write the framed request, then block until the framed response has
    /// been fully read.
    ///
    /// A 0-byte read where more bytes were expected, mid-header or
    /// mid-payload, surfaces as `FrameError::ConnectionClosed`.
    pub fn transceive(&mut self, request: &[u8]) -> Result<Bytes> {
        self.writer.send(request)?;
        Ok(self.reader.read_message()?)
    }

    /// Address of the remote endpoint.
    pub fn remote_addr(&self) -> Result<SocketAddr> {
        Ok(self.writer.get_ref().peer_addr()?)
    }

    /// Shut down both directions and release the socket.
    ///
    /// Taking `self` by value makes use-after-close unrepresentable.
    pub fn close(self) -> Result<()> {
        self.writer.get_ref().shutdown(Shutdown::Both)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    use avrpc_frame::{FrameError, MessageReader, MessageWriter};

    use super::*;
    use crate::error::RpcError;

    /// Blocking single-shot echo peer used to exercise the transceiver
    /// without the async server.
    fn echo_peer(listener: TcpListener) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let reader_stream = stream.try_clone().expect("clone");
            let mut reader = MessageReader::new(reader_stream);
            let mut writer = MessageWriter::new(stream);

            let request = reader.read_message().expect("request");
            writer.send(&request).expect("reply");
        })
    }

    #[test]
    fn round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = echo_peer(listener);

        let mut client = SocketTransceiver::connect(addr).unwrap();
        let reply = client.transceive(b"ping").unwrap();
        assert_eq!(reply.as_ref(), b"ping");

        client.close().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn empty_request_and_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = echo_peer(listener);

        let mut client = SocketTransceiver::connect(addr).unwrap();
        let reply = client.transceive(b"").unwrap();
        assert!(reply.is_empty());

        client.close().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn connect_timeout_variant() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = echo_peer(listener);

        let mut client =
            SocketTransceiver::connect_timeout(&addr, Duration::from_secs(5)).unwrap();
        let reply = client.transceive(b"hi").unwrap();
        assert_eq!(reply.as_ref(), b"hi");

        client.close().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn peer_closing_mid_response_is_connection_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        // Peer reads the request, sends half a frame, then hangs up.
        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");

            let mut reader = MessageReader::new(stream.try_clone().expect("clone"));
            let _ = reader.read_message().expect("request");

            use std::io::Write;
            stream.write_all(&16u32.to_be_bytes()).expect("header");
            stream.write_all(b"partial").expect("partial payload");
            stream.shutdown(Shutdown::Both).expect("shutdown");
        });

        let mut client = SocketTransceiver::connect(addr).unwrap();
        let err = client.transceive(b"ping").unwrap_err();
        assert!(matches!(
            err,
            RpcError::Frame(FrameError::ConnectionClosed)
        ));
        peer.join().unwrap();
    }

    #[test]
    fn peer_closing_before_header_is_connection_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            // Drain the request without replying at all.
            let mut reader = MessageReader::new(stream);
            let _ = reader.read_message();
        });

        let mut client = SocketTransceiver::connect(addr).unwrap();
        let err = client.transceive(b"ping").unwrap_err();
        assert!(matches!(
            err,
            RpcError::Frame(FrameError::ConnectionClosed)
        ));
        peer.join().unwrap();
    }

    #[test]
    fn close_shuts_down_both_directions() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = Vec::new();
            // EOF arrives once the client closes its write half.
            stream.read_to_end(&mut buf).expect("read to end");
            assert!(buf.is_empty());
        });

        let client = SocketTransceiver::connect(addr).unwrap();
        client.close().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn remote_addr_reports_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = echo_peer(listener);

        let mut client = SocketTransceiver::connect(addr).unwrap();
        assert_eq!(client.remote_addr().unwrap(), addr);

        let _ = client.transceive(b"bye").unwrap();
        client.close().unwrap();
        peer.join().unwrap();
    }
}
