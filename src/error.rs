//! Our error types for the Spellman controller.

use std::net::SocketAddr;

use thiserror::Error;

use crate::types::Channel;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Per-call error raised while talking to a Spellman controller.
///
/// None of these are fatal: a failed call leaves the stored setpoints exactly as they were.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Transport I/O error: {0:?}")]
    Io(I),
    #[error("Communication timeout")]
    Timeout,
    #[error("Malformed response frame: {0}")]
    Protocol(#[from] FrameError),
    #[error("{channel} DAC value {code} out of range")]
    RangeExceeded { channel: Channel, code: i64 },
    #[error("{channel} setpoint {value} is not a finite number")]
    InvalidSetpoint { channel: Channel, value: f64 },
    #[error("{0} is read-only")]
    ReadOnlyChannel(Channel),
    #[error("Unexpected response {response:?} to {command:?}")]
    UnexpectedResponse { command: String, response: String },
    #[error("{channel} readback {response:?} is not a number")]
    MalformedTelemetry { channel: Channel, response: String },
}

impl<I: embedded_io::Error> Error<I> {
    /// Map an interface error, folding timeouts into [`Error::Timeout`].
    pub(crate) fn from_io(err: I) -> Self {
        match err.kind() {
            embedded_io::ErrorKind::TimedOut => Error::Timeout,
            _ => Error::Io(err),
        }
    }

    /// True for failures of the link itself rather than of a single request.
    ///
    /// Repeated link faults usually mean the connection is wedged.
    pub fn is_link_fault(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Timeout | Error::Protocol(_))
    }
}

/// Framing failures on the receive path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("no terminator within {len} bytes")]
    Unterminated { len: usize },
    #[error("connection closed with {pending} unterminated bytes pending")]
    Closed { pending: usize },
    #[error("response is not valid UTF-8")]
    NotUtf8,
}

/// The link to the controller could not be established.
///
/// This is the only fatal condition: without a connection the device never leaves initialization.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("failed to resolve {host}:{port}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("{host}:{port} resolved to no addresses")]
    NoAddress { host: String, port: u16 },
    #[error("failed to connect to {addr}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to configure socket to {addr}")]
    Configure {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}
