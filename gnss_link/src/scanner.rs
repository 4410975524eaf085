//! Locating fixed-format binary messages inside a raw byte stream.
//!
//! Signatures are short and a single read rarely exceeds a kilobyte, so the scan is a plain
//! byte-wise search: every offset whose byte equals the first signature byte is tested
//! against the full signature. Every complete candidate found in a buffer is reported; the
//! scan does not stop at the first match.

use tracing::debug;

use crate::{checksum::DualSum8, constants::UBX_CHECKSUM_LEN, error::FrameError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Width and signedness of a fixed-offset integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
}

impl FieldKind {
    pub const fn width(self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::I8 => 1,
            FieldKind::U16 | FieldKind::I16 => 2,
            FieldKind::U32 | FieldKind::I32 => 4,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, FieldKind::I8 | FieldKind::I16 | FieldKind::I32)
    }
}

/// One integer field of a binary message. `offset` counts from the first signature byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
    pub endian: Endian,
}

impl FieldSpec {
    pub const fn new(name: &'static str, offset: usize, kind: FieldKind) -> Self {
        Self {
            name,
            offset,
            kind,
            endian: Endian::Little,
        }
    }

    /// Reads the field out of a complete frame. The frame must be at least
    /// `offset + width` bytes long, which [`BinaryMessageSpec::validate`] guarantees for
    /// frames handed out by the scanner.
    pub fn read(&self, frame: &[u8]) -> i64 {
        let raw = &frame[self.offset..self.offset + self.kind.width()];
        let mut bytes = [0u8; 4];
        bytes[..raw.len()].copy_from_slice(raw);
        if self.endian == Endian::Big {
            bytes[..raw.len()].reverse();
        }
        let unsigned = u32::from_le_bytes(bytes);
        match self.kind {
            FieldKind::U8 | FieldKind::U16 | FieldKind::U32 => i64::from(unsigned),
            FieldKind::I8 => i64::from(unsigned as u8 as i8),
            FieldKind::I16 => i64::from(unsigned as u16 as i16),
            FieldKind::I32 => i64::from(unsigned as i32),
        }
    }
}

/// Byte and bit that must be set for the payload of a frame to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityFlag {
    pub offset: usize,
    pub mask: u8,
}

impl ValidityFlag {
    pub fn is_set(&self, frame: &[u8]) -> bool {
        frame[self.offset] & self.mask == self.mask
    }
}

/// Layout of a fixed-length binary message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryMessageSpec {
    pub name: &'static str,
    /// Sync chars, class, id and length: everything that is the same in every frame.
    pub signature: &'static [u8],
    pub frame_len: usize,
    pub fields: &'static [FieldSpec],
    pub validity: Option<ValidityFlag>,
}

impl BinaryMessageSpec {
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.signature.is_empty() || self.signature.len() + UBX_CHECKSUM_LEN > self.frame_len {
            return Err(FrameError::InvalidSignature {
                message: self.name,
            });
        }
        let body_end = self.frame_len - UBX_CHECKSUM_LEN;
        for field in self.fields {
            if field.offset + field.kind.width() > body_end {
                return Err(FrameError::InvalidField {
                    message: self.name,
                    field: field.name,
                    frame_len: self.frame_len,
                });
            }
        }
        if let Some(flag) = self.validity {
            if flag.offset >= body_end {
                return Err(FrameError::InvalidField {
                    message: self.name,
                    field: "validity",
                    frame_len: self.frame_len,
                });
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A checksum-valid frame whose validity flag (if the message has one) is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidFrame<'a> {
    spec: &'a BinaryMessageSpec,
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> ValidFrame<'a> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn spec(&self) -> &'a BinaryMessageSpec {
        self.spec
    }

    pub fn field(&self, name: &str) -> Option<i64> {
        self.spec.field(name).map(|f| f.read(self.bytes))
    }
}

/// What the scanner concluded about one candidate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameVerdict<'a> {
    Valid(ValidFrame<'a>),
    ChecksumMismatch { offset: usize },
    ValidityUnset { offset: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct BinaryMessageScanner {
    spec: BinaryMessageSpec,
}

impl BinaryMessageScanner {
    pub fn new(spec: BinaryMessageSpec) -> Result<Self, FrameError> {
        spec.validate()?;
        Ok(Self { spec })
    }

    /// For the built-in layouts, whose validity is covered by unit tests.
    pub(crate) const fn new_unchecked(spec: BinaryMessageSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &BinaryMessageSpec {
        &self.spec
    }

    /// Iterates over every candidate in `buf`, in stream order, with its verdict.
    pub fn scan<'a>(&'a self, buf: &'a [u8]) -> ScanIter<'a> {
        ScanIter {
            spec: &self.spec,
            buf,
            pos: 0,
        }
    }

    /// Only the frames that passed both checksum and validity checks.
    pub fn valid_frames<'a>(&'a self, buf: &'a [u8]) -> impl Iterator<Item = ValidFrame<'a>> + 'a {
        self.scan(buf).filter_map(|verdict| match verdict {
            FrameVerdict::Valid(frame) => Some(frame),
            _ => None,
        })
    }

    /// First offset at which a frame could still be completed by bytes that have not
    /// arrived yet. Everything before it has been fully scanned.
    pub fn pending_from(&self, buf_len: usize) -> usize {
        buf_len.saturating_sub(self.spec.frame_len - 1)
    }
}

pub struct ScanIter<'a> {
    spec: &'a BinaryMessageSpec,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for ScanIter<'a> {
    type Item = FrameVerdict<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let sig = self.spec.signature;
        while self.pos + self.spec.frame_len <= self.buf.len() {
            let offset = self.pos;
            self.pos += 1;
            if self.buf[offset] != sig[0] || !self.buf[offset..].starts_with(sig) {
                continue;
            }
            let frame = &self.buf[offset..offset + self.spec.frame_len];
            if !DualSum8::verify_frame(frame) {
                debug!(msg = self.spec.name, offset, "dropping frame with bad checksum");
                return Some(FrameVerdict::ChecksumMismatch { offset });
            }
            if let Some(flag) = self.spec.validity {
                if !flag.is_set(frame) {
                    debug!(msg = self.spec.name, offset, "frame carries no valid data yet");
                    return Some(FrameVerdict::ValidityUnset { offset });
                }
            }
            return Some(FrameVerdict::Valid(ValidFrame {
                spec: self.spec,
                offset,
                bytes: frame,
            }));
        }
        self.pos = self.buf.len();
        None
    }
}
