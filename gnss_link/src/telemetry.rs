//! Continuous telemetry decoding alongside command traffic on the same port.
//!
//! A background thread polls the transport under a mutex and publishes an immutable
//! [`TelemetrySnapshot`]. Commands take the same mutex for their whole duration, so telemetry
//! pauses while a command is in flight and the two never interleave reads.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::{
    commands::{Command, UbxCommand},
    constants::{TEXT_END_CHAR_2, TEXT_SYNC_CHAR},
    controller::{Exchange, Reply},
    error::{CommandError, TransportError},
    messages::{DecodedTimeRecord, TimeUtcStream},
    retry::RetryPolicy,
    transport::SerialTransport,
};

/// How long one poll may hold the port waiting for bytes.
const READ_WINDOW: Duration = Duration::from_millis(20);
/// Longest unterminated text kept while looking for the end of a line.
const MAX_LINE: usize = 512;

/// Latest decoded telemetry. Replaced as a whole, never updated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Most recent time record that passed checksum and validity checks.
    pub time: Option<DecodedTimeRecord>,
    pub frames_decoded: u64,
    pub checksum_failures: u64,
    /// Checksum-valid frames from a receiver without valid time yet.
    pub validity_unset: u64,
    pub bytes_read: u64,
    /// Most recent complete `$...` line.
    pub last_line: Option<String>,
    pub updated_at: Option<Instant>,
}

/// Single-writer cell holding the current snapshot.
#[derive(Debug, Default)]
pub struct TelemetryCell {
    current: RwLock<Arc<TelemetrySnapshot>>,
}

impl TelemetryCell {
    pub fn load(&self) -> Arc<TelemetrySnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn store(&self, snapshot: TelemetrySnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }
}

pub struct TelemetryMonitor {
    transport: Arc<Mutex<SerialTransport>>,
    cell: Arc<TelemetryCell>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl TelemetryMonitor {
    /// Starts the reader thread. It polls every `interval`, holding the port only while it
    /// reads.
    pub fn spawn(transport: SerialTransport, interval: Duration) -> Self {
        let transport = Arc::new(Mutex::new(transport));
        let cell = Arc::new(TelemetryCell::default());
        let running = Arc::new(AtomicBool::new(true));

        let reader = {
            let transport = Arc::clone(&transport);
            let cell = Arc::clone(&cell);
            let running = Arc::clone(&running);
            thread::spawn(move || read_loop(&transport, &cell, &running, interval))
        };

        Self {
            transport,
            cell,
            running,
            reader: Some(reader),
        }
    }

    pub fn snapshot(&self) -> Arc<TelemetrySnapshot> {
        self.cell.load()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs a text command with telemetry paused.
    pub fn execute(&self, command: &Command, policy: RetryPolicy) -> Result<Reply, CommandError> {
        let mut transport = self.transport.lock();
        Exchange::new(&mut transport).execute(command, policy)
    }

    pub fn execute_ubx(
        &self,
        command: &UbxCommand,
        policy: RetryPolicy,
    ) -> Result<Reply, CommandError> {
        let mut transport = self.transport.lock();
        Exchange::new(&mut transport).execute_ubx(command, policy)
    }

    /// Stops and joins the reader, then hands the transport back.
    pub fn shutdown(mut self) -> Option<SerialTransport> {
        self.stop();
        let transport = Arc::clone(&self.transport);
        drop(self);
        Arc::try_unwrap(transport).ok().map(Mutex::into_inner)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("telemetry reader panicked");
            }
        }
    }
}

impl Drop for TelemetryMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop(
    transport: &Mutex<SerialTransport>,
    cell: &TelemetryCell,
    running: &AtomicBool,
    interval: Duration,
) {
    let mut stream = TimeUtcStream::new();
    let mut lines = LineTail::default();
    debug!("telemetry reader started");

    while running.load(Ordering::Acquire) {
        let read = transport.lock().read_available(READ_WINDOW);
        match read {
            Ok(bytes) if !bytes.is_empty() => {
                let summary = stream.consume(&bytes);
                let line = lines.push(&bytes);
                let prev = cell.load();
                cell.store(TelemetrySnapshot {
                    time: summary.records.last().copied().or(prev.time),
                    frames_decoded: prev.frames_decoded + summary.records.len() as u64,
                    checksum_failures: prev.checksum_failures + summary.checksum_failures as u64,
                    validity_unset: prev.validity_unset + summary.validity_unset as u64,
                    bytes_read: prev.bytes_read + bytes.len() as u64,
                    last_line: line.or_else(|| prev.last_line.clone()),
                    updated_at: Some(Instant::now()),
                });
            },
            Ok(_) => {},
            Err(TransportError::Closed) => break,
            Err(e) => warn!(error = %e, "telemetry read failed"),
        }
        thread::sleep(interval);
    }

    running.store(false, Ordering::Release);
    debug!("telemetry reader stopped");
}

/// Collects bytes until a line ends, for the last text line seen.
#[derive(Debug, Default)]
struct LineTail {
    buf: Vec<u8>,
}

impl LineTail {
    fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > MAX_LINE {
            let cut = self.buf.len() - MAX_LINE;
            self.buf.drain(..cut);
        }
        let end = self.buf.iter().rposition(|&b| b == TEXT_END_CHAR_2)?;
        let rest = self.buf.split_off(end + 1);
        let done = std::mem::replace(&mut self.buf, rest);
        done.split(|&b| b == TEXT_END_CHAR_2)
            .rev()
            .find_map(|line| {
                let start = line.iter().position(|&b| b == TEXT_SYNC_CHAR)?;
                let text = String::from_utf8_lossy(&line[start..]);
                Some(text.trim_end().to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_swaps_whole_snapshots() {
        let cell = TelemetryCell::default();
        let before = cell.load();
        cell.store(TelemetrySnapshot {
            frames_decoded: 3,
            ..TelemetrySnapshot::default()
        });
        assert_eq!(before.frames_decoded, 0);
        assert_eq!(cell.load().frames_decoded, 3);
    }

    #[test]
    fn line_tail_keeps_partial_lines() {
        let mut tail = LineTail::default();
        assert_eq!(tail.push(b"$GNGGA,1"), None);
        assert_eq!(
            tail.push(b"23*00\r\n\xb5\x62$GNRMC"),
            Some("$GNGGA,123*00".to_string())
        );
        assert_eq!(tail.push(b",x*11\r\n"), Some("$GNRMC,x*11".to_string()));
    }

    #[test]
    fn line_tail_ignores_binary_only_lines() {
        let mut tail = LineTail::default();
        assert_eq!(tail.push(&[0xb5, 0x62, 0x01, 0x0a]), None);
    }

    #[test]
    fn line_tail_is_bounded_without_newlines() {
        let mut tail = LineTail::default();
        for _ in 0..100 {
            assert_eq!(tail.push(&[0xb5; 1000]), None);
            assert!(tail.buf.len() <= MAX_LINE);
        }
        assert_eq!(tail.push(b"$GNGGA,1*00\r\n"), Some("$GNGGA,1*00".to_string()));
        assert!(tail.buf.is_empty());
    }
}
