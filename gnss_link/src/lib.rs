//! # gnss_link
//!
//! Command and telemetry protocol engine for GNSS receivers on a local serial line. Two wire
//! disciplines are supported: checksummed text commands (`$VERSIONA*1B`, Xor8) and binary UBX
//! frames (DualSum8 trailer).
//!
//! A command-line front end lives in the `gnss_link_cli` crate of this workspace.
//!
//! Building Commands
//! =================
//!
//! Commands are a closed set; parsing operator input rejects unknown names up front:
//! ```
//! use gnss_link::{Command, ExpectedResponse};
//!
//! let cmd = Command::parse("versiona", &[] as &[&str]).unwrap();
//! let frame = cmd.frame().unwrap();
//! assert_eq!(frame.as_text(), Some("$VERSIONA*1B"));
//! assert_eq!(
//!     ExpectedResponse::for_frame(&frame).text(),
//!     "$command,VERSIONA,response: OK*45"
//! );
//! ```
//!
//! Running Commands
//! ================
//!
//! A `CommandController` opens the port, sends the command, waits for the contracted reply
//! and retries under a `RetryPolicy`. The port is closed again on every path:
//! ```no_run
//! use std::time::Duration;
//! use gnss_link::{Command, CommandController, RetryPolicy, SerialConfig};
//!
//! let mut controller = CommandController::new(SerialConfig::new("/dev/ttyUSB0", 115_200));
//! let reply = controller
//!     .execute(&Command::SaveConfig, RetryPolicy::fixed(3, Duration::from_secs(1)))
//!     .unwrap();
//! println!("{} after {} attempt(s)", reply.line, reply.attempts);
//! ```
//!
//! Scanning Telemetry
//! ==================
//!
//! Binary messages are found anywhere in a noisy buffer. Only frames that pass both the
//! checksum and the validity flag become records:
//! ```
//! use gnss_link::{DecodedTimeRecord, NavTimeUtcBuilder, NavTimeUtcFlags};
//!
//! let frame = NavTimeUtcBuilder {
//!     year: 2024,
//!     month: 3,
//!     day: 14,
//!     hour: 15,
//!     min: 9,
//!     sec: 26,
//!     valid: NavTimeUtcFlags::all(),
//!     ..Default::default()
//! }
//! .into_packet_bytes();
//!
//! let mut stream = b"$GNGGA,noise\r\n".to_vec();
//! stream.extend_from_slice(&frame);
//! let records = DecodedTimeRecord::scan(&stream);
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].year, 2024);
//! ```
//! Use `TimeUtcStream` when frames may be split across reads.

pub mod checksum;
pub mod commands;
pub mod config;
mod constants;
pub mod controller;
pub mod error;
pub mod frame;
pub mod messages;
pub mod retry;
pub mod scanner;
pub mod telemetry;
pub mod transport;

pub use crate::{
    checksum::{Checksum, ChecksumAlgorithm, DualSum8, DualSum8Calc, Xor8},
    commands::{Command, ReceiverMode, UbxCommand},
    config::{Encoding, SerialConfig},
    constants::{UBX_CHECKSUM_LEN, UBX_HEADER_LEN, UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2},
    controller::{CommandController, CommandState, Connect, Exchange, Reply, SerialConnector},
    error::{CommandError, DateTimeError, FrameError, TransportError},
    frame::{CommandFrame, ExpectedResponse, Protocol, ReplyMatch},
    messages::{
        AckBuilder, AckKind, DecodedTimeRecord, NavTimeUtcBuilder, NavTimeUtcFlags,
        ScanSummary, TimeUtcStream,
    },
    retry::{AttemptBudget, Backoff, RetryPolicy},
    scanner::{BinaryMessageScanner, BinaryMessageSpec, FrameVerdict, ValidFrame},
    telemetry::{TelemetryMonitor, TelemetrySnapshot},
    transport::{SerialIo, SerialTransport},
};
