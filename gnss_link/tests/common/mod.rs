#![allow(dead_code)]

//! A scripted stand-in for a receiver on the other end of the serial line.
//!
//! Every flushed write is recorded and handed to the script, whose return value is queued as
//! the device's reply. Reads of an empty queue wait a millisecond and time out, the way a
//! real port does.

use std::{
    collections::VecDeque,
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use gnss_link::{SerialConfig, SerialIo, SerialTransport};
use parking_lot::Mutex;

type Script = Box<dyn FnMut(usize, &[u8]) -> Vec<u8> + Send>;

struct DeviceState {
    writes: Vec<Vec<u8>>,
    tx: Vec<u8>,
    rx: VecDeque<u8>,
    script: Script,
}

#[derive(Clone)]
pub struct SimulatedDevice {
    state: Arc<Mutex<DeviceState>>,
    open_ports: Arc<AtomicUsize>,
}

/// The device end handed to a transport.
pub struct SimulatedPort {
    device: SimulatedDevice,
}

impl SimulatedDevice {
    /// `script(n, written)` answers the `n`-th (0-based) write.
    pub fn new(script: impl FnMut(usize, &[u8]) -> Vec<u8> + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                writes: Vec::new(),
                tx: Vec::new(),
                rx: VecDeque::new(),
                script: Box::new(script),
            })),
            open_ports: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Never answers.
    pub fn silent() -> Self {
        Self::new(|_, _| Vec::new())
    }

    /// Answers every write with `reply`.
    pub fn always(reply: &[u8]) -> Self {
        let reply = reply.to_vec();
        Self::new(move |_, _| reply.clone())
    }

    /// Answers write `n` with `replies[n]`, then goes quiet.
    pub fn replies(replies: Vec<Vec<u8>>) -> Self {
        Self::new(move |n, _| replies.get(n).cloned().unwrap_or_default())
    }

    pub fn push_rx(&self, bytes: &[u8]) {
        self.state.lock().rx.extend(bytes);
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().writes.len()
    }

    /// Whether a transport still holds a port of this device.
    pub fn is_attached(&self) -> bool {
        self.open_ports.load(Ordering::SeqCst) > 0
    }

    pub fn transport(&self, config: SerialConfig) -> SerialTransport {
        self.open_ports.fetch_add(1, Ordering::SeqCst);
        let port = SimulatedPort {
            device: self.clone(),
        };
        SerialTransport::from_port(config, Box::new(port))
    }
}

impl Drop for SimulatedPort {
    fn drop(&mut self) {
        self.device.open_ports.fetch_sub(1, Ordering::SeqCst);
    }
}

impl io::Read for SimulatedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        {
            let mut state = self.device.state.lock();
            if !state.rx.is_empty() {
                let n = buf.len().min(state.rx.len());
                for (dst, src) in buf.iter_mut().zip(state.rx.drain(..n)) {
                    *dst = src;
                }
                return Ok(n);
            }
        }
        thread::sleep(Duration::from_millis(1));
        Err(io::ErrorKind::TimedOut.into())
    }
}

impl io::Write for SimulatedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.device.state.lock().tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.device.state.lock();
        if state.tx.is_empty() {
            return Ok(());
        }
        let written = std::mem::take(&mut state.tx);
        let n = state.writes.len();
        let reply = (state.script)(n, &written);
        state.writes.push(written);
        state.rx.extend(reply);
        Ok(())
    }
}

impl SerialIo for SimulatedPort {
    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }
}

/// Short timeouts and no settling delay, so retry tests stay fast.
pub fn fast_config() -> SerialConfig {
    SerialConfig::new("sim://receiver", 115_200)
        .with_read_timeout(Duration::from_millis(100))
        .with_write_timeout(Duration::from_millis(100))
        .with_cmd_delay(Duration::ZERO)
}

pub const VERSIONA_OK: &[u8] = b"$command,VERSIONA,response: OK*45\r\n";
