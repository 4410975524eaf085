//! Timeout-bounded byte channel to the receiver. No protocol knowledge lives here.

use std::{
    io,
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, trace};

use crate::{
    config::SerialConfig,
    constants::{TEXT_END_CHAR_1, TEXT_END_CHAR_2},
    error::TransportError,
};

/// Longest single blocking read. Keeps long read windows responsive to their deadline.
const READ_SLICE: Duration = Duration::from_millis(50);
const CHUNK_LEN: usize = 1024;

/// Byte-level access to a serial line.
///
/// Implemented for `serialport` handles; anything else that reads and writes bytes (a
/// simulator, a pty, a pipe) can implement it to stand in for the device.
pub trait SerialIo: io::Read + io::Write + Send {
    /// Bounds the next blocking read or write. A read that times out returns
    /// `ErrorKind::TimedOut` or `Ok(0)`.
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl SerialIo for Box<dyn serialport::SerialPort> {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        serialport::SerialPort::set_timeout(self.as_mut(), timeout).map_err(io::Error::from)
    }
}

pub struct SerialTransport {
    config: SerialConfig,
    port: Option<Box<dyn SerialIo>>,
    // bytes read past a marker, handed to the next read
    pending: Vec<u8>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.config.path)
            .field("open", &self.port.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl SerialTransport {
    /// Opens the device at `config.path`.
    ///
    /// # Errors
    ///
    /// `TransportError::Connection` when the device is missing, busy, or the driver rejects
    /// the baud rate.
    pub fn open(config: SerialConfig) -> Result<Self, TransportError> {
        if config.baud_rate == 0 {
            return Err(TransportError::Connection {
                path: config.path.clone(),
                source: serialport::Error::new(
                    serialport::ErrorKind::InvalidInput,
                    "baud rate must be positive",
                ),
            });
        }
        let port = serialport::new(&config.path, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(READ_SLICE)
            .open()
            .map_err(|source| TransportError::Connection {
                path: config.path.clone(),
                source,
            })?;
        debug!(path = %config.path, baud = config.baud_rate, "serial port opened");
        Ok(Self::from_port(config, Box::new(port)))
    }

    /// Wraps an already opened byte channel.
    pub fn from_port(config: SerialConfig, port: Box<dyn SerialIo>) -> Self {
        Self {
            config,
            port: Some(port),
            pending: Vec::new(),
            timeout: None,
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Writes `text` plus the line terminator, then waits out the inter-command delay.
    pub fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let mut bytes = self.config.encoding.encode(text);
        bytes.extend(self.config.encoding.encode(&self.config.line_terminator));
        self.send_raw(&bytes)
    }

    /// Writes pre-built bytes unchanged, then waits out the inter-command delay.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let write_timeout = self.config.write_timeout;
        self.apply_timeout(write_timeout)?;
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        trace!(len = bytes.len(), "tx {:02x?}", bytes);
        port.write_all(bytes)?;
        port.flush()?;
        thread::sleep(self.config.cmd_delay);
        Ok(())
    }

    /// Drains whatever the device has already sent and splits it into lines. A trailing
    /// line without terminator is returned as well.
    pub fn read_lines(&mut self) -> Result<Vec<String>, TransportError> {
        let mut data = std::mem::take(&mut self.pending);
        let mut chunk = [0u8; CHUNK_LEN];
        loop {
            let n = self.read_chunk(&mut chunk, Duration::from_millis(1))?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
        }
        Ok(self.split_lines(&data))
    }

    /// Reads until `marker` arrives or the read timeout elapses. A timeout is not an error:
    /// whatever arrived so far is returned, possibly nothing.
    pub fn read_until(&mut self, marker: &[u8]) -> Result<Vec<String>, TransportError> {
        let deadline = Instant::now() + self.config.read_timeout;
        let data = self.read_until_deadline(marker, deadline)?;
        Ok(self.split_lines(&data))
    }

    /// Reads until `marker`, then one further line, and returns both as one string. Returns
    /// `None` when `marker` did not show up within the read timeout.
    pub fn read_until_line(&mut self, marker: &[u8]) -> Result<Option<String>, TransportError> {
        let deadline = Instant::now() + self.config.read_timeout;
        let mut data = self.read_until_deadline(marker, deadline)?;
        if !ends_with_marker(&data, marker) {
            return Ok(None);
        }
        let rest = self.read_until_deadline(&[TEXT_END_CHAR_2], deadline)?;
        data.extend_from_slice(&rest);
        let text = self.config.encoding.decode(&data);
        Ok(Some(trim_line_end(&text).to_string()))
    }

    /// Up to `n` bytes, blocking until they arrive or the read timeout elapses.
    pub fn read_raw(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + self.config.read_timeout;
        let mut data = self.take_pending(n);
        let mut chunk = [0u8; CHUNK_LEN];
        while data.len() < n {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let want = (n - data.len()).min(CHUNK_LEN);
            let got = self.read_chunk(&mut chunk[..want], deadline - now)?;
            data.extend_from_slice(&chunk[..got]);
        }
        Ok(data)
    }

    /// Releases the port. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            let _ = port.flush();
            self.pending.clear();
            debug!(path = %self.config.path, "serial port closed");
        }
    }

    /// Reads until `marker` or `deadline`, whichever comes first. Bytes past the marker stay
    /// buffered for the next read.
    pub(crate) fn read_until_deadline(
        &mut self,
        marker: &[u8],
        deadline: Instant,
    ) -> Result<Vec<u8>, TransportError> {
        let mut data = std::mem::take(&mut self.pending);
        let mut chunk = [0u8; CHUNK_LEN];
        loop {
            if let Some(end) = find(&data, marker) {
                self.pending = data.split_off(end + marker.len());
                return Ok(data);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(data);
            }
            let n = match self.read_chunk(&mut chunk, deadline - now) {
                Ok(n) => n,
                Err(e) => {
                    self.pending = data;
                    return Err(e);
                },
            };
            data.extend_from_slice(&chunk[..n]);
        }
    }

    /// Next complete line before `deadline`, without its terminator.
    pub(crate) fn read_line_by(
        &mut self,
        deadline: Instant,
    ) -> Result<Option<String>, TransportError> {
        let data = self.read_until_deadline(&[TEXT_END_CHAR_2], deadline)?;
        if !ends_with_marker(&data, &[TEXT_END_CHAR_2]) {
            // partial line: keep it for the next read
            self.pending = data;
            return Ok(None);
        }
        let text = self.config.encoding.decode(&data);
        Ok(Some(trim_line_end(&text).to_string()))
    }

    /// Whatever bytes are available within `wait`.
    pub(crate) fn read_available(&mut self, wait: Duration) -> Result<Vec<u8>, TransportError> {
        let mut data = std::mem::take(&mut self.pending);
        let mut chunk = [0u8; CHUNK_LEN];
        let n = self.read_chunk(&mut chunk, wait)?;
        data.extend_from_slice(&chunk[..n]);
        Ok(data)
    }

    fn take_pending(&mut self, n: usize) -> Vec<u8> {
        if self.pending.len() <= n {
            std::mem::take(&mut self.pending)
        } else {
            let rest = self.pending.split_off(n);
            std::mem::replace(&mut self.pending, rest)
        }
    }

    fn read_chunk(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize, TransportError> {
        self.apply_timeout(wait.min(READ_SLICE).max(Duration::from_millis(1)))?;
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        match port.read(buf) {
            Ok(n) => {
                if n > 0 {
                    trace!(len = n, "rx {:02x?}", &buf[..n]);
                }
                Ok(n)
            },
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(0)
            },
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn apply_timeout(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if self.timeout == Some(timeout) {
            return Ok(());
        }
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        port.set_timeout(timeout)?;
        self.timeout = Some(timeout);
        Ok(())
    }

    fn split_lines(&self, data: &[u8]) -> Vec<String> {
        let text = self.config.encoding.decode(data);
        text.split_inclusive('\n')
            .map(trim_line_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn ends_with_marker(data: &[u8], marker: &[u8]) -> bool {
    !marker.is_empty() && data.ends_with(marker)
}

fn trim_line_end(line: &str) -> &str {
    line.trim_end_matches([char::from(TEXT_END_CHAR_1), char::from(TEXT_END_CHAR_2)])
}
