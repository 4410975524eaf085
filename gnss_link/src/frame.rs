//! Outgoing command frames and the replies they are contracted to produce.

use crate::{
    checksum::{Checksum, Xor8},
    constants::{
        TEXT_ARG_SEPARATOR, TEXT_CHECKSUM_DELIM, TEXT_RESPONSE_OK, TEXT_RESPONSE_PREFIX,
        TEXT_SYNC_CHAR,
    },
    error::FrameError,
    messages::ubx_frame,
};

/// Wire discipline a frame was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// `$<body>*<xor8>`
    Text,
    /// `B5 62 class id len payload ck_a ck_b`
    Ubx { class: u8, id: u8 },
}

/// A fully assembled command. Built once per send and never reused for another command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    name: String,
    args: Vec<String>,
    protocol: Protocol,
    checksum: Checksum,
    wire: Vec<u8>,
}

impl CommandFrame {
    /// Text command: name and arguments joined by the argument separator, prefixed with `$`
    /// and suffixed with `*` and the Xor8 of the joined body.
    pub fn text<S: AsRef<str>>(name: &str, args: &[S]) -> Result<Self, FrameError> {
        if name.trim().is_empty() {
            return Err(FrameError::EmptyCommand);
        }
        check_text(name)?;
        if name.contains(TEXT_ARG_SEPARATOR) {
            return Err(FrameError::IllegalCharacter {
                text: name.to_string(),
                ch: TEXT_ARG_SEPARATOR,
            });
        }
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        for arg in &args {
            check_text(arg)?;
        }

        let body = join_body(name, &args);
        let checksum = Xor8::compute(body.as_bytes());
        let wire = format!(
            "{}{}{}{}",
            char::from(TEXT_SYNC_CHAR),
            body,
            char::from(TEXT_CHECKSUM_DELIM),
            Xor8::to_hex(checksum)
        )
        .into_bytes();
        Ok(Self {
            name: name.to_string(),
            args,
            protocol: Protocol::Text,
            checksum: Checksum::Xor8(checksum),
            wire,
        })
    }

    /// Binary command with a DualSum8 trailer.
    pub fn ubx(class: u8, id: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let wire = ubx_frame(class, id, payload)?;
        let n = wire.len();
        Ok(Self {
            name: format!("UBX-{class:02X}-{id:02X}"),
            args: Vec::new(),
            protocol: Protocol::Ubx { class, id },
            checksum: Checksum::DualSum8(wire[n - 2], wire[n - 1]),
            wire,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn checksum(&self) -> Checksum {
        self.checksum
    }

    /// Name and arguments as the device echoes them back.
    pub fn body(&self) -> String {
        join_body(&self.name, &self.args)
    }

    pub fn wire_bytes(&self) -> &[u8] {
        &self.wire
    }

    /// The frame as text, for text-protocol frames.
    pub fn as_text(&self) -> Option<&str> {
        match self.protocol {
            Protocol::Text => std::str::from_utf8(&self.wire).ok(),
            Protocol::Ubx { .. } => None,
        }
    }
}

fn join_body(name: &str, args: &[String]) -> String {
    let mut body = name.to_string();
    for arg in args {
        body.push(TEXT_ARG_SEPARATOR);
        body.push_str(arg);
    }
    body
}

fn check_text(text: &str) -> Result<(), FrameError> {
    let illegal = text.chars().find(|&c| {
        c == char::from(TEXT_SYNC_CHAR)
            || c == char::from(TEXT_CHECKSUM_DELIM)
            || c == ','
            || c.is_control()
    });
    match illegal {
        Some(ch) => Err(FrameError::IllegalCharacter {
            text: text.to_string(),
            ch,
        }),
        None => Ok(()),
    }
}

/// How a received line relates to the reply a command is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMatch {
    /// The success reply, verbatim.
    Matched,
    /// A reply to this command whose checksum does not hold.
    Corrupt,
    /// A checksum-valid reply to this command that is not the success reply.
    Rejected,
    /// Anything else: telemetry, replies to other commands, noise.
    Unrelated,
}

/// The exact success reply of a text command:
/// `$command,<body>,response: OK*<xor8>`.
///
/// The checksum covers everything before the `*`, the leading `$` included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedResponse {
    reply_prefix: String,
    text: String,
}

impl ExpectedResponse {
    pub fn for_command(body: &str) -> Self {
        let reply_prefix = format!("{TEXT_RESPONSE_PREFIX}{body},");
        let payload = format!("{reply_prefix}{TEXT_RESPONSE_OK}");
        let checksum = Xor8::compute(payload.as_bytes());
        let text = format!(
            "{payload}{}{}",
            char::from(TEXT_CHECKSUM_DELIM),
            Xor8::to_hex(checksum)
        );
        Self { reply_prefix, text }
    }

    pub fn for_frame(frame: &CommandFrame) -> Self {
        Self::for_command(&frame.body())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn classify(&self, line: &str) -> ReplyMatch {
        let line = line.trim_end();
        let reply = match line.find(TEXT_RESPONSE_PREFIX) {
            Some(start) => &line[start..],
            None => return ReplyMatch::Unrelated,
        };
        if reply == self.text {
            return ReplyMatch::Matched;
        }
        if !reply.starts_with(&self.reply_prefix) {
            return ReplyMatch::Unrelated;
        }
        let valid = reply
            .rsplit_once(char::from(TEXT_CHECKSUM_DELIM))
            .and_then(|(payload, digits)| {
                Xor8::parse_hex(digits).map(|cs| Xor8::verify(payload.as_bytes(), cs))
            })
            .unwrap_or(false);
        if valid {
            ReplyMatch::Rejected
        } else {
            ReplyMatch::Corrupt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_ARGS: &[&str] = &[];

    #[test]
    fn version_frame() {
        let frame = CommandFrame::text("VERSIONA", NO_ARGS).unwrap();
        assert_eq!(frame.as_text(), Some("$VERSIONA*1B"));
        assert_eq!(frame.checksum(), Checksum::Xor8(0x1b));
        assert_eq!(frame.body(), "VERSIONA");
    }

    #[test]
    fn arguments_are_space_separated_and_covered() {
        let frame = CommandFrame::text("MODE", &["ROVER"]).unwrap();
        assert_eq!(frame.as_text(), Some("$MODE ROVER*7F"));
        assert_eq!(frame.args(), ["ROVER".to_string()]);
    }

    #[test]
    fn illegal_text_is_rejected() {
        assert_eq!(
            CommandFrame::text("  ", NO_ARGS),
            Err(FrameError::EmptyCommand)
        );
        assert!(matches!(
            CommandFrame::text("VERSION*A", NO_ARGS),
            Err(FrameError::IllegalCharacter { ch: '*', .. })
        ));
        assert!(matches!(
            CommandFrame::text("MODE", &["ROVER\r\n"]),
            Err(FrameError::IllegalCharacter { ch: '\r', .. })
        ));
        assert!(matches!(
            CommandFrame::text("MODE ROVER", NO_ARGS),
            Err(FrameError::IllegalCharacter { ch: ' ', .. })
        ));
    }

    #[test]
    fn ubx_frame_is_not_text() {
        let frame = CommandFrame::ubx(0x06, 0x09, &[0; 13]).unwrap();
        assert_eq!(frame.as_text(), None);
        assert_eq!(frame.name(), "UBX-06-09");
        assert_eq!(frame.wire_bytes().len(), 21);
        assert_eq!(frame.protocol(), Protocol::Ubx { class: 6, id: 9 });
    }

    #[test]
    fn expected_responses() {
        assert_eq!(
            ExpectedResponse::for_command("VERSIONA").text(),
            "$command,VERSIONA,response: OK*45"
        );
        assert_eq!(
            ExpectedResponse::for_command("FRESET").text(),
            "$command,FRESET,response: OK*4D"
        );
    }

    #[test]
    fn classification() {
        let expected = ExpectedResponse::for_command("VERSIONA");
        assert_eq!(
            expected.classify("$command,VERSIONA,response: OK*45\r\n"),
            ReplyMatch::Matched
        );
        assert_eq!(
            expected.classify("\u{fffd}\u{fffd}$command,VERSIONA,response: OK*45"),
            ReplyMatch::Matched
        );
        assert_eq!(
            expected.classify("$command,VERSIONA,response: OK*46"),
            ReplyMatch::Corrupt
        );
        assert_eq!(
            expected.classify("$command,VERSIONA,respXnse: OK*45"),
            ReplyMatch::Corrupt
        );
        assert_eq!(
            expected.classify("$command,FRESET,response: OK*4D"),
            ReplyMatch::Unrelated
        );
        assert_eq!(
            expected.classify("$GNGGA,000000.00,,,,,0,00,,,,,,,*56"),
            ReplyMatch::Unrelated
        );
    }

    #[test]
    fn checksum_valid_failure_reply_is_rejected() {
        let payload = "$command,VERSIONA,response: PARSING FAILD NO MATCHING FUNC";
        let line = format!("{payload}*{}", Xor8::to_hex(Xor8::compute(payload.as_bytes())));
        let expected = ExpectedResponse::for_command("VERSIONA");
        assert_eq!(expected.classify(&line), ReplyMatch::Rejected);
    }
}
