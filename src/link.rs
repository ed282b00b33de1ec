//! Line framing for the controller's request/response protocol.

use core::time::Duration;
use std::time::Instant;

use crate::error::{Error, FrameError, Result};
use crate::types::LF;

/// Bytes requested from the interface per read call.
const CHUNK: usize = 64;

/// Sleep between readiness checks while a deadline is running.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Frames commands and responses over any byte interface.
///
/// `L` is the largest response frame accepted, terminator included. Exactly one request may be
/// outstanding: callers send a command and then receive its response before sending another.
///
/// An exchange that fails on the link leaves the stream out of step: part of a frame may be buffered
/// and the real reply may still arrive. The next [`Link::send`] therefore discards everything received
/// until the line has been idle for the resync window, so a late reply is never taken for the answer
/// to a later command.
pub struct Link<
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
    const L: usize = 1024,
> {
    interface: S,
    /// Received bytes not yet returned as a frame.
    buffer: heapless::Vec<u8, L>,
    /// Wait before the first read of each response.
    response_delay: Duration,
    /// Deadline for a complete frame, `None` to rely on the interface alone.
    read_timeout: Option<Duration>,
    /// Idle time that ends discarding after a failed exchange.
    resync_idle: Duration,
    /// Set when the last exchange failed on the link.
    stale: bool,
}

impl<S, const L: usize> Link<S, L>
where
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
{
    /// Wrap an interface with no response delay, no frame deadline and no resync window.
    pub fn new(interface: S) -> Self {
        Self {
            interface,
            buffer: heapless::Vec::new(),
            response_delay: Duration::ZERO,
            read_timeout: None,
            resync_idle: Duration::ZERO,
            stale: false,
        }
    }

    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_resync_idle(mut self, idle: Duration) -> Self {
        self.resync_idle = idle;
        self
    }

    /// Whether the next send will first discard stale input.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Write `command` followed by the terminator.
    ///
    /// There is no retry: a failed or partial write is reported as is.
    pub fn send(&mut self, command: &str) -> Result<(), S::Error> {
        if self.stale {
            self.resync()?;
        }
        tracing::debug!(command, "send");
        self.write_line(command).inspect_err(|_| self.stale = true)
    }

    /// Block until a full line has arrived and return it without its terminator.
    ///
    /// A trailing carriage return is dropped. Bytes after the terminator are kept for the next call.
    /// With a read timeout set the whole frame must arrive within it, counted after the response delay.
    pub fn receive(&mut self) -> Result<String, S::Error> {
        self.next_frame().inspect_err(|err| {
            // A frame that fails to decode was still delimited correctly.
            if err.is_link_fault() && !matches!(err, Error::Protocol(FrameError::NotUtf8)) {
                self.stale = true;
            }
        })
    }

    /// Send a command and receive its response as one exchange.
    pub fn query(&mut self, command: &str) -> Result<String, S::Error> {
        self.send(command)?;
        self.receive()
    }

    #[cfg(test)]
    pub(crate) fn interface(&self) -> &S {
        &self.interface
    }

    #[cfg(test)]
    pub(crate) fn interface_mut(&mut self) -> &mut S {
        &mut self.interface
    }

    fn write_line(&mut self, command: &str) -> Result<(), S::Error> {
        self.interface
            .write_all(command.as_bytes())
            .map_err(Error::from_io)?;
        self.interface.write_all(&[LF]).map_err(Error::from_io)?;
        self.interface.flush().map_err(Error::from_io)
    }

    fn next_frame(&mut self) -> Result<String, S::Error> {
        if !self.response_delay.is_zero() && !self.buffer.contains(&LF) {
            std::thread::sleep(self.response_delay);
        }

        let deadline = self.read_timeout.map(|timeout| Instant::now() + timeout);
        loop {
            if let Some(end) = self.buffer.iter().position(|&b| b == LF) {
                let response = self.take_frame(end)?;
                tracing::debug!(response = response.as_str(), "receive");
                return Ok(response);
            }

            if self.buffer.len() == L {
                self.buffer.clear();
                return Err(FrameError::Unterminated { len: L }.into());
            }

            // Never block past the deadline.
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(Error::Timeout);
                }
                if !self.interface.read_ready().map_err(Error::from_io)? {
                    std::thread::sleep(POLL_INTERVAL);
                    continue;
                }
            }

            let mut chunk = [0u8; CHUNK];
            let want = core::cmp::min(CHUNK, L - self.buffer.len());
            let read = self
                .interface
                .read(&mut chunk[..want])
                .map_err(Error::from_io)?;

            if read == 0 {
                let pending = self.buffer.len();
                self.buffer.clear();
                return Err(FrameError::Closed { pending }.into());
            }

            // Cannot fail: `want` never exceeds the free space.
            self.buffer
                .extend_from_slice(&chunk[..read])
                .map_err(|_| FrameError::Unterminated { len: L })?;
        }
    }

    /// Drop buffered bytes and drain the interface until it has been idle for `resync_idle`.
    fn resync(&mut self) -> Result<(), S::Error> {
        let mut discarded = self.buffer.len();
        self.buffer.clear();

        let mut chunk = [0u8; CHUNK];
        let mut idle_since = Instant::now();
        loop {
            if self.interface.read_ready().map_err(Error::from_io)? {
                let read = self.interface.read(&mut chunk).map_err(Error::from_io)?;
                if read == 0 {
                    // Peer closed; the next receive reports it.
                    break;
                }
                discarded += read;
                idle_since = Instant::now();
            } else if idle_since.elapsed() >= self.resync_idle {
                break;
            } else {
                std::thread::sleep(POLL_INTERVAL);
            }
        }

        if discarded > 0 {
            tracing::warn!(discarded, "discarded stale input after a failed exchange");
        }
        self.stale = false;
        Ok(())
    }

    /// Remove the first frame, whose terminator sits at `end`, from the buffer.
    fn take_frame(&mut self, end: usize) -> Result<String, S::Error> {
        let mut line = &self.buffer[..end];
        if let [head @ .., b'\r'] = line {
            line = head;
        }
        let decoded = core::str::from_utf8(line).map(str::to_owned);

        let consumed = end + 1;
        let remaining = self.buffer.len() - consumed;
        self.buffer.copy_within(consumed.., 0);
        self.buffer.truncate(remaining);

        decoded.map_err(|_| FrameError::NotUtf8.into())
    }
}
