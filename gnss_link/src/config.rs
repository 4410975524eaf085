use std::time::Duration;

use crate::constants::TEXT_LINE_TERMINATOR;

/// Byte encoding used for the text side of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    /// Decodes `bytes`, replacing anything the encoding cannot represent with U+FFFD.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER })
                .collect(),
            Encoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }

    /// Encodes `text`; characters outside the encoding become `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

/// Connection parameters of one serial device. Immutable once a transport is opened with it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SerialConfig {
    pub path: String,
    pub baud_rate: u32,
    #[cfg_attr(feature = "serde", serde(with = "millis", rename = "read_timeout_ms"))]
    pub read_timeout: Duration,
    #[cfg_attr(feature = "serde", serde(with = "millis", rename = "write_timeout_ms"))]
    pub write_timeout: Duration,
    /// Settling time the receiver needs after every command.
    #[cfg_attr(feature = "serde", serde(with = "millis", rename = "cmd_delay_ms"))]
    pub cmd_delay: Duration,
    pub encoding: Encoding,
    pub line_terminator: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: String::from("/dev/ttyUSB0"),
            baud_rate: 115_200,
            read_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            cmd_delay: Duration::from_millis(100),
            encoding: Encoding::Utf8,
            line_terminator: String::from(TEXT_LINE_TERMINATOR),
        }
    }
}

impl SerialConfig {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            ..Self::default()
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_cmd_delay(mut self, delay: Duration) -> Self {
        self.cmd_delay = delay;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }
}

#[cfg(feature = "serde")]
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
