//! TCP interface to the controller's Ethernet port.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use crate::config::LinkConfig;
use crate::error::ConnectError;

/// An open TCP connection usable as an [embedded_io] interface.
///
/// Reads time out after the configured read timeout. The socket is shut down when this is dropped.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Resolve `host` and connect to the first address that accepts.
    pub fn connect(host: &str, port: u16, link: &LinkConfig) -> Result<Self, ConnectError> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|source| ConnectError::Resolve {
                host: host.to_owned(),
                port,
                source,
            })?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, link.connect_timeout) {
                Ok(stream) => return Self::configure(stream, addr, link),
                Err(source) => {
                    tracing::debug!(%addr, "connect failed: {source}");
                    last_error = Some(ConnectError::Connect { addr, source });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ConnectError::NoAddress {
            host: host.to_owned(),
            port,
        }))
    }

    fn configure(stream: TcpStream, addr: SocketAddr, link: &LinkConfig) -> Result<Self, ConnectError> {
        let configure = |stream: &TcpStream| -> io::Result<()> {
            stream.set_nodelay(true)?;
            stream.set_read_timeout(Some(link.read_timeout))?;
            stream.set_write_timeout(Some(link.read_timeout))
        };
        configure(&stream).map_err(|source| ConnectError::Configure { addr, source })?;

        Ok(Self { stream, peer: addr })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        tracing::debug!(peer = %self.peer, "closing connection");
        // The peer may already be gone; the descriptor is released either way.
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl embedded_io::ErrorType for TcpTransport {
    type Error = io::Error;
}

impl embedded_io::Read for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match io::Read::read(&mut self.stream, buf) {
            // A socket read timeout surfaces as `WouldBlock` on some platforms.
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                Err(io::Error::new(io::ErrorKind::TimedOut, err))
            }
            other => other,
        }
    }
}

impl embedded_io::ReadReady for TcpTransport {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.stream.set_nonblocking(true)?;
        let mut byte = [0u8; 1];
        let peeked = self.stream.peek(&mut byte);
        self.stream.set_nonblocking(false)?;

        match peeked {
            // Data pending, or zero bytes for a closed peer.
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl embedded_io::Write for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        io::Write::write(&mut self.stream, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        io::Write::flush(&mut self.stream)
    }
}
