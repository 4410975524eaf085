//! The commands this engine knows how to issue.
//!
//! Text commands are parsed from operator input once, up front; a misspelt command name is
//! an `UnknownCommand` error before anything touches the wire.

use std::{fmt, str::FromStr};

use crate::{
    constants::{
        UBX_CLASS_CFG, UBX_CLASS_NAV, UBX_ID_CFG_CFG, UBX_ID_CFG_MSG, UBX_ID_NAV_TIMEUTC,
    },
    error::{CommandError, FrameError},
    frame::{CommandFrame, ExpectedResponse},
};

/// Log messages the receiver can be asked to stream.
pub const LOG_MESSAGES: &[&str] = &[
    "GPGGA", "GPGLL", "GPGSA", "GPGST", "GPGSV", "GPRMC", "GPVTG", "GPZDA", "GNGGA", "GNRMC",
    "BESTNAVA", "BESTNAVB", "BESTPOSA", "BESTPOSB", "TIMEA", "TIMEB", "OBSVMA", "OBSVMB",
    "GPSEPHA", "BDSEPHA", "GLOEPHA", "GALEPHA", "AGCA", "STADOPA",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverMode {
    Rover,
    /// Base station that surveys its own position for `seconds`.
    BaseSurveyIn { seconds: u32 },
    /// Base station at a known position (degrees, degrees, metres).
    BaseFixed { lat: f64, lon: f64, height: f64 },
}

impl ReceiverMode {
    fn args(&self) -> Vec<String> {
        match self {
            ReceiverMode::Rover => vec!["ROVER".into()],
            ReceiverMode::BaseSurveyIn { seconds } => {
                vec!["BASE".into(), "TIME".into(), seconds.to_string()]
            },
            ReceiverMode::BaseFixed { lat, lon, height } => vec![
                "BASE".into(),
                lat.to_string(),
                lon.to_string(),
                height.to_string(),
            ],
        }
    }

    fn parse(args: &[String]) -> Result<Self, CommandError> {
        let upper: Vec<String> = args.iter().map(|a| a.to_ascii_uppercase()).collect();
        let words: Vec<&str> = upper.iter().map(String::as_str).collect();
        match words.as_slice() {
            ["ROVER"] => Ok(ReceiverMode::Rover),
            ["BASE", "TIME", seconds] => Ok(ReceiverMode::BaseSurveyIn {
                seconds: number("MODE", "survey seconds", seconds)?,
            }),
            ["BASE", lat, lon, height] => Ok(ReceiverMode::BaseFixed {
                lat: number("MODE", "latitude", lat)?,
                lon: number("MODE", "longitude", lon)?,
                height: number("MODE", "height", height)?,
            }),
            _ => Err(invalid(
                "MODE",
                "expected ROVER, BASE TIME <seconds> or BASE <lat> <lon> <height>",
            )),
        }
    }
}

/// Text-protocol commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `VERSIONA`
    Version,
    /// `FRESET`: wipe the stored configuration and restart.
    FactoryReset,
    /// `RESET`
    Reset,
    /// `SAVECONFIG`: persist the running configuration.
    SaveConfig,
    /// `UNLOG [port]`: stop every log on `port`, or on the current port.
    Unlog { port: Option<String> },
    /// `MODE ...`
    Mode(ReceiverMode),
    /// `CONFIG <port> <baud>`
    ConfigBaud { port: String, baud: u32 },
    /// `<message> [port] [period]`: start streaming a log.
    Log {
        message: String,
        port: Option<String>,
        period: Option<f32>,
    },
}

impl Command {
    /// Resolves an operator-supplied name and argument list. Names are case-insensitive.
    pub fn parse<S: AsRef<str>>(name: &str, args: &[S]) -> Result<Self, CommandError> {
        let name = name.trim().to_ascii_uppercase();
        if name.is_empty() {
            return Err(FrameError::EmptyCommand.into());
        }
        let args: Vec<String> = args.iter().map(|a| a.as_ref().trim().to_string()).collect();
        let cmd = match name.as_str() {
            "VERSIONA" | "VERSION" => no_args(&name, &args, Command::Version)?,
            "FRESET" => no_args(&name, &args, Command::FactoryReset)?,
            "RESET" => no_args(&name, &args, Command::Reset)?,
            "SAVECONFIG" => no_args(&name, &args, Command::SaveConfig)?,
            "UNLOG" => match args.as_slice() {
                [] => Command::Unlog { port: None },
                [port] => Command::Unlog {
                    port: Some(port.to_ascii_uppercase()),
                },
                _ => return Err(invalid("UNLOG", "expected at most a port")),
            },
            "MODE" => Command::Mode(ReceiverMode::parse(&args)?),
            "CONFIG" => match args.as_slice() {
                [port, baud] => Command::ConfigBaud {
                    port: port.to_ascii_uppercase(),
                    baud: number("CONFIG", "baud rate", baud)?,
                },
                _ => return Err(invalid("CONFIG", "expected <port> <baud>")),
            },
            log if LOG_MESSAGES.contains(&log) => {
                let (port, period) = match args.as_slice() {
                    [] => (None, None),
                    [port] => (Some(port.to_ascii_uppercase()), None),
                    [port, period] => (
                        Some(port.to_ascii_uppercase()),
                        Some(number(log, "period", period)?),
                    ),
                    _ => return Err(invalid(log, "expected [port] [period]")),
                };
                Command::Log {
                    message: log.to_string(),
                    port,
                    period,
                }
            },
            _ => return Err(CommandError::UnknownCommand(name)),
        };
        Ok(cmd)
    }

    /// Command word as sent on the wire.
    pub fn name(&self) -> &str {
        match self {
            Command::Version => "VERSIONA",
            Command::FactoryReset => "FRESET",
            Command::Reset => "RESET",
            Command::SaveConfig => "SAVECONFIG",
            Command::Unlog { .. } => "UNLOG",
            Command::Mode(_) => "MODE",
            Command::ConfigBaud { .. } => "CONFIG",
            Command::Log { message, .. } => message,
        }
    }

    pub fn args(&self) -> Vec<String> {
        match self {
            Command::Version | Command::FactoryReset | Command::Reset | Command::SaveConfig => {
                Vec::new()
            },
            Command::Unlog { port } => port.iter().cloned().collect(),
            Command::Mode(mode) => mode.args(),
            Command::ConfigBaud { port, baud } => vec![port.clone(), baud.to_string()],
            Command::Log { port, period, .. } => {
                let mut args: Vec<String> = port.iter().cloned().collect();
                args.extend(period.map(|p| p.to_string()));
                args
            },
        }
    }

    /// Assembles a fresh frame.
    pub fn frame(&self) -> Result<CommandFrame, FrameError> {
        CommandFrame::text(self.name(), &self.args())
    }

    pub fn expected_response(&self) -> Result<ExpectedResponse, FrameError> {
        self.frame().map(|frame| ExpectedResponse::for_frame(&frame))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        for arg in self.args() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl FromStr for Command {
    type Err = CommandError;

    /// Parses a whole command line such as `MODE BASE TIME 60`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        Command::parse(name, &args)
    }
}

/// Binary-protocol commands. Configuration commands are acknowledged with ACK-ACK/ACK-NAK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UbxCommand {
    /// CFG-MSG: output `class`/`id` every `rate` navigation solutions on the current port.
    EnableMessage { class: u8, id: u8, rate: u8 },
    /// CFG-CFG: save every configuration section to BBR, flash and EEPROM.
    SaveConfig,
    /// Empty-payload poll of NAV-TIMEUTC. Answered by the message itself, not by an ACK.
    PollTimeUtc,
}

impl UbxCommand {
    pub fn class_id(&self) -> (u8, u8) {
        match self {
            UbxCommand::EnableMessage { .. } => (UBX_CLASS_CFG, UBX_ID_CFG_MSG),
            UbxCommand::SaveConfig => (UBX_CLASS_CFG, UBX_ID_CFG_CFG),
            UbxCommand::PollTimeUtc => (UBX_CLASS_NAV, UBX_ID_NAV_TIMEUTC),
        }
    }

    pub fn payload(&self) -> Vec<u8> {
        match *self {
            UbxCommand::EnableMessage { class, id, rate } => vec![class, id, rate],
            UbxCommand::SaveConfig => {
                let mut payload = Vec::with_capacity(13);
                payload.extend_from_slice(&0u32.to_le_bytes()); // clear
                payload.extend_from_slice(&0x0000_1f1f_u32.to_le_bytes()); // save
                payload.extend_from_slice(&0u32.to_le_bytes()); // load
                payload.push(0x17); // BBR | flash | EEPROM | SPI flash
                payload
            },
            UbxCommand::PollTimeUtc => Vec::new(),
        }
    }

    pub fn expects_ack(&self) -> bool {
        !matches!(self, UbxCommand::PollTimeUtc)
    }

    pub fn frame(&self) -> Result<CommandFrame, FrameError> {
        let (class, id) = self.class_id();
        CommandFrame::ubx(class, id, &self.payload())
    }
}

fn no_args(name: &str, args: &[String], cmd: Command) -> Result<Command, CommandError> {
    if args.is_empty() {
        Ok(cmd)
    } else {
        Err(invalid(name, "takes no arguments"))
    }
}

fn number<T: FromStr>(command: &str, what: &str, text: &str) -> Result<T, CommandError> {
    text.parse().map_err(|_| CommandError::InvalidArguments {
        command: command.to_string(),
        reason: format!("{what} {text:?} is not a number"),
    })
}

fn invalid(command: &str, reason: &str) -> CommandError {
    CommandError::InvalidArguments {
        command: command.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::DualSum8;

    const NO_ARGS: &[&str] = &[];

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(Command::parse("versiona", NO_ARGS).unwrap(), Command::Version);
        assert_eq!(Command::parse("FReset", NO_ARGS).unwrap(), Command::FactoryReset);
        assert_eq!(
            Command::parse("mode", &["rover"]).unwrap(),
            Command::Mode(ReceiverMode::Rover)
        );
    }

    #[test]
    fn unknown_command() {
        assert!(matches!(
            Command::parse("VERSOINA", NO_ARGS),
            Err(CommandError::UnknownCommand(name)) if name == "VERSOINA"
        ));
        assert!(matches!(
            Command::parse("", NO_ARGS),
            Err(CommandError::Frame(FrameError::EmptyCommand))
        ));
    }

    #[test]
    fn argument_errors() {
        assert!(matches!(
            Command::parse("VERSIONA", &["COM1"]),
            Err(CommandError::InvalidArguments { .. })
        ));
        assert!(matches!(
            Command::parse("CONFIG", &["COM1", "fast"]),
            Err(CommandError::InvalidArguments { .. })
        ));
        assert!(matches!(
            Command::parse("MODE", &["BASE"]),
            Err(CommandError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn wire_text() {
        let cases = [
            ("VERSIONA", vec![], "VERSIONA"),
            ("unlog", vec!["com2"], "UNLOG COM2"),
            ("config", vec!["com1", "460800"], "CONFIG COM1 460800"),
            ("mode", vec!["base", "time", "60"], "MODE BASE TIME 60"),
            ("mode", vec!["BASE", "40.5", "-3.25", "650"], "MODE BASE 40.5 -3.25 650"),
            ("gpgga", vec!["com1", "0.2"], "GPGGA COM1 0.2"),
            ("BESTNAVA", vec!["COM1", "1"], "BESTNAVA COM1 1"),
        ];
        for (name, args, body) in cases {
            let cmd = Command::parse(name, &args).unwrap();
            assert_eq!(cmd.to_string(), body);
            assert_eq!(cmd.frame().unwrap().body(), body);
        }
    }

    #[test]
    fn from_str_splits_words() {
        let cmd: Command = "config com2 115200".parse().unwrap();
        assert_eq!(
            cmd,
            Command::ConfigBaud {
                port: "COM2".into(),
                baud: 115_200
            }
        );
    }

    #[test]
    fn expected_response_uses_full_body() {
        let cmd = Command::Mode(ReceiverMode::Rover);
        let expected = cmd.expected_response().unwrap();
        assert!(expected.text().starts_with("$command,MODE ROVER,response: OK*"));
    }

    #[test]
    fn ubx_frames() {
        let save = UbxCommand::SaveConfig.frame().unwrap();
        assert_eq!(&save.wire_bytes()[..6], &[0xb5, 0x62, 0x06, 0x09, 13, 0]);
        assert!(DualSum8::verify_frame(save.wire_bytes()));

        let poll = UbxCommand::PollTimeUtc;
        assert!(!poll.expects_ack());
        assert_eq!(poll.frame().unwrap().wire_bytes().len(), 8);

        let enable = UbxCommand::EnableMessage {
            class: 0x01,
            id: 0x21,
            rate: 1,
        };
        assert_eq!(&enable.frame().unwrap().wire_bytes()[6..9], &[0x01, 0x21, 0x01]);
    }
}
