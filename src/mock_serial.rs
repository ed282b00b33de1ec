//! We use this mocking module in unit tests to emulate the controller's socket.

use std::time::Duration;

/// Computes the reply to one received command line, or `None` to stay silent.
pub type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

/// Our mock type used to emulate a controller connection.
pub struct MockSerial {
    /// Buffer to store data written to the mock
    write_buffer: heapless::Vec<u8, 4096>,
    /// Buffer containing pre-configured or generated response data to be read
    read_buffer: heapless::Vec<u8, 1024>,
    /// Current position in the read buffer
    read_position: usize,
    /// Command bytes written since the last terminator
    pending_line: heapless::Vec<u8, 256>,
    /// Replies to complete command lines when set
    responder: Option<Responder>,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
    /// Flag to simulate a controller that never answers
    should_time_out: bool,
    /// When set, each read waits this long and yields a single byte
    trickle: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum MockSerialError {
    /// Simulated timeout error
    #[error("timed out")]
    Timeout,
    /// Simulated buffer overflow
    #[error("buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;

        for &byte in buf {
            if byte == b'\n' {
                self.answer_pending_line()?;
            } else {
                self.pending_line
                    .push(byte)
                    .map_err(|_| MockSerialError::BufferOverflow)?;
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        let available_bytes = self.read_buffer.len() - self.read_position;
        if available_bytes == 0 {
            if self.should_time_out {
                return Err(MockSerialError::Timeout);
            }
            // Behave like a socket whose peer has closed.
            return Ok(0);
        }

        let mut bytes_to_read = core::cmp::min(buf.len(), available_bytes);
        if let Some(delay) = self.trickle {
            std::thread::sleep(delay);
            bytes_to_read = core::cmp::min(bytes_to_read, 1);
        }
        buf[..bytes_to_read]
            .copy_from_slice(&self.read_buffer[self.read_position..self.read_position + bytes_to_read]);

        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }
        // An exhausted buffer reads as a close unless the mock is set to time out.
        Ok(self.read_position < self.read_buffer.len() || !self.should_time_out)
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            pending_line: heapless::Vec::new(),
            responder: None,
            should_error_on_write: false,
            should_error_on_read: false,
            should_time_out: false,
            trickle: None,
        }
    }

    /// Create a mock which answers every command line through `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&str) -> Option<String> + Send + 'static,
    {
        let mut mock = Self::new();
        mock.responder = Some(Box::new(responder));
        mock
    }

    /// Set the data that will be returned when read() is called
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer.clear();
        self.read_position = 0;
        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Get a reference to the data that was written to this mock
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Written data split into command lines, terminators removed.
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.write_buffer)
            .split_terminator('\n')
            .map(str::to_owned)
            .collect()
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }

    /// Configure whether reads with no data pending should time out instead of reporting a close
    pub fn set_time_out(&mut self, should_time_out: bool) {
        self.should_time_out = should_time_out;
    }

    /// Configure whether reads are slowed down to one byte each
    pub fn set_trickle(&mut self, delay: Option<Duration>) {
        self.trickle = delay;
    }

    fn answer_pending_line(&mut self) -> Result<(), MockSerialError> {
        let line = String::from_utf8_lossy(&self.pending_line).into_owned();
        self.pending_line.clear();

        let Some(responder) = self.responder.as_mut() else {
            return Ok(());
        };
        let Some(reply) = responder(&line) else {
            return Ok(());
        };

        // Drop what has already been read so long sessions fit the buffer.
        let unread = self.read_buffer.len() - self.read_position;
        self.read_buffer.copy_within(self.read_position.., 0);
        self.read_buffer.truncate(unread);
        self.read_position = 0;

        self.read_buffer
            .extend_from_slice(reply.as_bytes())
            .map_err(|_| MockSerialError::BufferOverflow)?;
        self.read_buffer
            .push(b'\n')
            .map_err(|_| MockSerialError::BufferOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, ReadReady, Write};

    #[test]
    fn test_write_data() {
        let mut mock = MockSerial::new();
        let test_data = b":V 128\n";

        let result = mock.write(test_data);
        assert_eq!(result.unwrap(), test_data.len());
        assert_eq!(mock.written_data(), test_data);
        assert_eq!(mock.written_lines(), vec![":V 128".to_owned()]);
    }

    #[test]
    fn test_read_partial_data() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Long response data").unwrap();

        let mut buffer = [0u8; 5];
        assert_eq!(mock.read(&mut buffer).unwrap(), 5);
        assert_eq!(&buffer, b"Long ");
    }

    #[test]
    fn test_read_reports_close_when_exhausted() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Hi").unwrap();

        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer).unwrap(), 2);
        assert_eq!(mock.read(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_time_out_when_exhausted() {
        let mut mock = MockSerial::new();
        mock.set_time_out(true);

        let mut buffer = [0u8; 10];
        let err = mock.read(&mut buffer).unwrap_err();
        assert!(matches!(err, MockSerialError::Timeout));
        assert!(matches!(err.kind(), embedded_io::ErrorKind::TimedOut));
    }

    #[test]
    fn test_read_ready_follows_pending_data() {
        let mut mock = MockSerial::new();
        mock.set_time_out(true);
        assert!(!mock.read_ready().unwrap());

        mock.set_read_data(b"OK\n").unwrap();
        assert!(mock.read_ready().unwrap());

        mock.set_time_out(false);
        let mut buffer = [0u8; 10];
        mock.read(&mut buffer).unwrap();
        // Exhausted without time out reads as closed, which is ready.
        assert!(mock.read_ready().unwrap());
    }

    #[test]
    fn test_trickle_yields_one_byte_per_read() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"512\n").unwrap();
        mock.set_trickle(Some(Duration::from_millis(1)));

        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer).unwrap(), 1);
        assert_eq!(&buffer[..1], b"5");
    }

    #[test]
    fn test_responder_answers_complete_lines() {
        let mut mock = MockSerial::with_responder(|line| Some(format!("echo {line}")));

        mock.write(b":V").unwrap();
        let mut buffer = [0u8; 32];
        assert_eq!(mock.read(&mut buffer).unwrap(), 0);

        mock.write(b"?\n").unwrap();
        let n = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"echo :V?\n");
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(matches!(mock.write(b"test").unwrap_err(), MockSerialError::SimulatedError));
        assert!(mock.written_data().is_empty());

        mock.set_read_data(b"data").unwrap();
        mock.set_read_error(true);
        let mut buffer = [0u8; 10];
        assert!(matches!(mock.read(&mut buffer).unwrap_err(), MockSerialError::SimulatedError));
    }
}
