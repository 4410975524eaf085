//! Send a command, wait for its contracted reply, retry within a bounded budget.
//!
//! One [`Exchange`] drives one command at a time over a borrowed transport:
//!
//! ```text
//! Idle -> Sending -> AwaitingResponse -> Matched    -> Idle
//!                                     -> Mismatched -> Sending (retry) | Failed
//!                                     -> TimedOut   -> Sending (retry) | Failed
//! ```
//!
//! [`CommandController`] wraps that in a connection scope: the port is opened on first use
//! and closed on every exit path.

use std::{
    io, thread,
    time::{Duration, Instant},
};

use tracing::{debug, info, trace, warn};

use crate::{
    commands::{Command, UbxCommand},
    config::SerialConfig,
    error::{CommandError, FrameError, TransportError},
    frame::{CommandFrame, ExpectedResponse, ReplyMatch},
    messages::{find_ack, AckKind, DecodedTimeRecord, TimeUtcStream},
    retry::RetryPolicy,
    transport::SerialTransport,
};

/// Read window slice while waiting for binary replies.
const BINARY_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Idle,
    Sending,
    AwaitingResponse,
    Matched,
    Mismatched,
    TimedOut,
    Failed,
}

/// A successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The reply line, or the ACK message name for binary commands.
    pub line: String,
    /// Attempts it took, the successful one included.
    pub attempts: u32,
}

enum Outcome<T> {
    Matched(T),
    Rejected(String),
    TimedOut { corrupt: bool },
    Io(io::Error),
}

enum Failure {
    Rejected(String),
    TimedOut,
    Io(io::Error),
}

/// Command execution over an open transport.
pub struct Exchange<'t> {
    transport: &'t mut SerialTransport,
    state: CommandState,
}

impl<'t> Exchange<'t> {
    pub fn new(transport: &'t mut SerialTransport) -> Self {
        Self {
            transport,
            state: CommandState::Idle,
        }
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn transport(&mut self) -> &mut SerialTransport {
        &mut *self.transport
    }

    /// Sends `command` until its success reply is seen or `policy` runs out.
    ///
    /// Every attempt assembles a fresh frame. Lines other than the expected reply are
    /// skipped; a reply whose checksum does not hold counts as no reply at all.
    pub fn execute(
        &mut self,
        command: &Command,
        policy: RetryPolicy,
    ) -> Result<Reply, CommandError> {
        let label = command.to_string();
        let (line, attempts) = self.run(&label, policy, || command.frame(), await_text)?;
        Ok(Reply { line, attempts })
    }

    /// Sends a binary configuration command and waits for its ACK-ACK. An ACK-NAK is a
    /// rejection. Commands that are not acknowledged are sent once.
    pub fn execute_ubx(
        &mut self,
        command: &UbxCommand,
        policy: RetryPolicy,
    ) -> Result<Reply, CommandError> {
        let frame = command.frame()?;
        let label = frame.name().to_string();
        if !command.expects_ack() {
            self.transition(CommandState::Sending, &label);
            let sent = self.transport.send_raw(frame.wire_bytes());
            self.transition(CommandState::Idle, &label);
            sent?;
            return Ok(Reply {
                line: label,
                attempts: 1,
            });
        }
        let (class, id) = command.class_id();
        let (line, attempts) = self.run(
            &label,
            policy,
            || command.frame(),
            |transport, _| await_ack(transport, class, id),
        )?;
        Ok(Reply { line, attempts })
    }

    /// Polls NAV-TIMEUTC. `Ok(None)` means the receiver answered but has no valid time yet.
    pub fn poll_time(
        &mut self,
        policy: RetryPolicy,
    ) -> Result<Option<DecodedTimeRecord>, CommandError> {
        let command = UbxCommand::PollTimeUtc;
        let label = command.frame()?.name().to_string();
        let (record, _) = self.run(
            &label,
            policy,
            || command.frame(),
            |transport, _| await_time(transport),
        )?;
        Ok(record)
    }

    fn run<T, B, W>(
        &mut self,
        label: &str,
        policy: RetryPolicy,
        build: B,
        mut wait: W,
    ) -> Result<(T, u32), CommandError>
    where
        B: Fn() -> Result<CommandFrame, FrameError>,
        W: FnMut(&mut SerialTransport, &CommandFrame) -> Result<Outcome<T>, CommandError>,
    {
        self.transition(CommandState::Idle, label);
        let mut attempts = 0;
        let mut corrupt_seen = false;
        let mut last = None;

        while policy.begin_attempt() {
            if attempts > 0 {
                let delay = policy.delay_after(attempts);
                warn!(command = label, attempt = attempts + 1, ?delay, "retrying");
                thread::sleep(delay);
            }
            attempts += 1;
            match self.attempt(label, &build, &mut wait) {
                Ok(Outcome::Matched(value)) => {
                    self.transition(CommandState::Matched, label);
                    info!(command = label, attempts, "command acknowledged");
                    self.transition(CommandState::Idle, label);
                    return Ok((value, attempts));
                },
                Ok(Outcome::Rejected(reply)) => {
                    self.transition(CommandState::Mismatched, label);
                    last = Some(Failure::Rejected(reply));
                },
                Ok(Outcome::TimedOut { corrupt }) => {
                    self.transition(CommandState::TimedOut, label);
                    corrupt_seen |= corrupt;
                    last = Some(Failure::TimedOut);
                },
                Ok(Outcome::Io(e)) => {
                    warn!(command = label, error = %e, "attempt failed");
                    self.transition(CommandState::TimedOut, label);
                    last = Some(Failure::Io(e));
                },
                Err(e) => {
                    self.transition(CommandState::Failed, label);
                    return Err(e);
                },
            }
        }

        self.transition(CommandState::Failed, label);
        let command = label.to_string();
        Err(match last {
            None => CommandError::Cancelled { command },
            Some(Failure::Io(e)) => CommandError::Io(e),
            Some(Failure::Rejected(reply)) => CommandError::Rejected { command, reply },
            Some(Failure::TimedOut) if corrupt_seen => {
                CommandError::ChecksumMismatch { command, attempts }
            },
            Some(Failure::TimedOut) => CommandError::Timeout { command, attempts },
        })
    }

    fn attempt<T, B, W>(
        &mut self,
        label: &str,
        build: &B,
        wait: &mut W,
    ) -> Result<Outcome<T>, CommandError>
    where
        B: Fn() -> Result<CommandFrame, FrameError>,
        W: FnMut(&mut SerialTransport, &CommandFrame) -> Result<Outcome<T>, CommandError>,
    {
        let frame = build()?;
        self.transition(CommandState::Sending, label);
        let sent = match frame.as_text() {
            Some(text) => self.transport.send(text),
            None => self.transport.send_raw(frame.wire_bytes()),
        };
        if let Err(e) = sent {
            return io_outcome(e);
        }
        self.transition(CommandState::AwaitingResponse, label);
        wait(&mut *self.transport, &frame)
    }

    fn transition(&mut self, to: CommandState, label: &str) {
        if self.state != to {
            debug!(command = label, from = ?self.state, ?to, "state");
            self.state = to;
        }
    }
}

fn await_text(
    transport: &mut SerialTransport,
    frame: &CommandFrame,
) -> Result<Outcome<String>, CommandError> {
    let expected = ExpectedResponse::for_frame(frame);
    let deadline = Instant::now() + transport.config().read_timeout;
    let mut corrupt = false;
    loop {
        let line = match transport.read_line_by(deadline) {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(Outcome::TimedOut { corrupt }),
            Err(e) => return io_outcome(e),
        };
        match expected.classify(&line) {
            ReplyMatch::Matched => return Ok(Outcome::Matched(line)),
            ReplyMatch::Rejected => return Ok(Outcome::Rejected(line)),
            ReplyMatch::Corrupt => {
                debug!(%line, "reply failed its checksum");
                corrupt = true;
            },
            ReplyMatch::Unrelated => trace!(%line, "skipped"),
        }
    }
}

fn await_ack(
    transport: &mut SerialTransport,
    class: u8,
    id: u8,
) -> Result<Outcome<String>, CommandError> {
    let deadline = Instant::now() + transport.config().read_timeout;
    let mut buf = Vec::new();
    while Instant::now() < deadline {
        match transport.read_available(BINARY_POLL) {
            Ok(bytes) => buf.extend_from_slice(&bytes),
            Err(e) => return io_outcome(e),
        }
        match find_ack(&buf, class, id) {
            Some(AckKind::Ack) => return Ok(Outcome::Matched("ACK-ACK".to_string())),
            Some(AckKind::Nak) => return Ok(Outcome::Rejected("ACK-NAK".to_string())),
            None => {},
        }
    }
    Ok(Outcome::TimedOut { corrupt: false })
}

fn await_time(
    transport: &mut SerialTransport,
) -> Result<Outcome<Option<DecodedTimeRecord>>, CommandError> {
    let deadline = Instant::now() + transport.config().read_timeout;
    let mut stream = TimeUtcStream::new();
    let mut corrupt = false;
    while Instant::now() < deadline {
        let bytes = match transport.read_available(BINARY_POLL) {
            Ok(bytes) => bytes,
            Err(e) => return io_outcome(e),
        };
        let summary = stream.consume(&bytes);
        corrupt |= summary.checksum_failures > 0;
        if let Some(record) = summary.records.into_iter().last() {
            return Ok(Outcome::Matched(Some(record)));
        }
        if summary.validity_unset > 0 {
            debug!("receiver has no valid time yet");
            return Ok(Outcome::Matched(None));
        }
    }
    Ok(Outcome::TimedOut { corrupt })
}

fn io_outcome<T>(e: TransportError) -> Result<Outcome<T>, CommandError> {
    match e {
        TransportError::Io(e) => Ok(Outcome::Io(e)),
        other => Err(CommandError::Unreachable(other)),
    }
}

/// Opens transports for a [`CommandController`].
pub trait Connect {
    fn connect(&mut self, config: &SerialConfig) -> Result<SerialTransport, TransportError>;
}

/// Opens the real serial device named by the config.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connect for SerialConnector {
    fn connect(&mut self, config: &SerialConfig) -> Result<SerialTransport, TransportError> {
        SerialTransport::open(config.clone())
    }
}

impl<F> Connect for F
where
    F: FnMut(&SerialConfig) -> Result<SerialTransport, TransportError>,
{
    fn connect(&mut self, config: &SerialConfig) -> Result<SerialTransport, TransportError> {
        self(config)
    }
}

/// Runs commands against one device, each inside its own connection scope.
#[derive(Debug)]
pub struct CommandController<C = SerialConnector> {
    config: SerialConfig,
    connector: C,
}

impl CommandController<SerialConnector> {
    pub fn new(config: SerialConfig) -> Self {
        Self::with_connector(config, SerialConnector)
    }

    /// The frame `name args...` assembles to.
    pub fn build_command<S: AsRef<str>>(
        name: &str,
        args: &[S],
    ) -> Result<CommandFrame, CommandError> {
        Ok(Command::parse(name, args)?.frame()?)
    }

    /// The exact success reply the device emits for the command body `name`.
    pub fn expected_response_for(name: &str) -> ExpectedResponse {
        ExpectedResponse::for_command(name)
    }
}

impl<C: Connect> CommandController<C> {
    pub fn with_connector(config: SerialConfig, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub fn execute(
        &mut self,
        command: &Command,
        policy: RetryPolicy,
    ) -> Result<Reply, CommandError> {
        self.with_session(|exchange| exchange.execute(command, policy))
    }

    pub fn execute_ubx(
        &mut self,
        command: &UbxCommand,
        policy: RetryPolicy,
    ) -> Result<Reply, CommandError> {
        self.with_session(|exchange| exchange.execute_ubx(command, policy))
    }

    pub fn poll_time(
        &mut self,
        policy: RetryPolicy,
    ) -> Result<Option<DecodedTimeRecord>, CommandError> {
        self.with_session(|exchange| exchange.poll_time(policy))
    }

    /// Opens the device, hands an [`Exchange`] to `f`, and closes the device again whatever
    /// `f` returns.
    ///
    /// # Errors
    ///
    /// `CommandError::Unreachable` if the device cannot be opened, otherwise whatever `f`
    /// returns.
    pub fn with_session<T, F>(&mut self, f: F) -> Result<T, CommandError>
    where
        F: FnOnce(&mut Exchange<'_>) -> Result<T, CommandError>,
    {
        let mut transport = self
            .connector
            .connect(&self.config)
            .map_err(CommandError::Unreachable)?;
        let result = f(&mut Exchange::new(&mut transport));
        transport.close();
        result
    }
}
