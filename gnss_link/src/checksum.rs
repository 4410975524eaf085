//! The two checksum disciplines spoken by the receivers.
//!
//! [`DualSum8`] is the UBX [Fletcher-16 checksum](https://en.wikipedia.org/wiki/Fletcher%27s_checksum)
//! used by binary frames, [`Xor8`] is the single-byte exclusive-or used by the text command
//! protocol. Both are pure: no state survives a call.

use crate::constants::{UBX_CHECKSUM_LEN, UBX_CLASS_OFFSET, UBX_HEADER_LEN};

/// Streaming dual running-sum calculator, for callers that feed a frame in pieces.
#[derive(Default, Debug, Clone, Copy)]
pub struct DualSum8Calc {
    ck_a: u8,
    ck_b: u8,
}

impl DualSum8Calc {
    pub const fn new() -> Self {
        Self { ck_a: 0, ck_b: 0 }
    }

    /// Update checksum with new bytes
    pub const fn update(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            self.update_byte(bytes[i]);
            i += 1;
        }
    }

    /// Update checksum with a single byte
    pub const fn update_byte(&mut self, byte: u8) {
        self.ck_a = self.ck_a.wrapping_add(byte);
        self.ck_b = self.ck_b.wrapping_add(self.ck_a);
    }

    /// Get the current checksum result
    pub const fn result(self) -> (u8, u8) {
        (self.ck_a, self.ck_b)
    }

    const fn is_valid(&self, received_ck_a: u8, received_ck_b: u8) -> bool {
        self.ck_a == received_ck_a && self.ck_b == received_ck_b
    }
}

/// Two-accumulator running sum of the binary protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualSum8;

impl DualSum8 {
    pub const fn compute(bytes: &[u8]) -> (u8, u8) {
        let mut calc = DualSum8Calc::new();
        calc.update(bytes);
        calc.result()
    }

    pub const fn verify(bytes: &[u8], expected: (u8, u8)) -> bool {
        let mut calc = DualSum8Calc::new();
        calc.update(bytes);
        calc.is_valid(expected.0, expected.1)
    }

    /// Checksum of a complete frame: class, id, length and payload are covered, the sync
    /// chars and the trailing checksum pair are not.
    ///
    /// Returns `None` when `frame` is too short to hold a header and a trailer.
    pub fn compute_frame(frame: &[u8]) -> Option<(u8, u8)> {
        Self::covered_range(frame).map(Self::compute)
    }

    /// Recomputes the checksum of a complete frame and compares it to its trailer.
    pub fn verify_frame(frame: &[u8]) -> bool {
        match Self::covered_range(frame) {
            Some(body) => {
                let n = frame.len();
                Self::verify(body, (frame[n - 2], frame[n - 1]))
            },
            None => false,
        }
    }

    fn covered_range(frame: &[u8]) -> Option<&[u8]> {
        if frame.len() < UBX_HEADER_LEN + UBX_CHECKSUM_LEN {
            return None;
        }
        Some(&frame[UBX_CLASS_OFFSET..frame.len() - UBX_CHECKSUM_LEN])
    }
}

/// Single-accumulator exclusive-or of the text protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xor8;

impl Xor8 {
    pub const fn compute(bytes: &[u8]) -> u8 {
        let mut acc = 0u8;
        let mut i = 0;
        while i < bytes.len() {
            acc ^= bytes[i];
            i += 1;
        }
        acc
    }

    pub const fn verify(bytes: &[u8], expected: u8) -> bool {
        Self::compute(bytes) == expected
    }

    /// Two uppercase hex digits, as embedded after the `*` of a text frame.
    pub fn to_hex(checksum: u8) -> String {
        format!("{checksum:02X}")
    }

    pub fn parse_hex(digits: &str) -> Option<u8> {
        if digits.len() != 2 {
            return None;
        }
        u8::from_str_radix(digits, 16).ok()
    }
}

/// Checksum algorithm selector, for code that handles both protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Xor8,
    DualSum8,
}

/// A computed checksum, tagged with the algorithm that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checksum {
    Xor8(u8),
    DualSum8(u8, u8),
}

impl ChecksumAlgorithm {
    pub const fn compute(self, bytes: &[u8]) -> Checksum {
        match self {
            ChecksumAlgorithm::Xor8 => Checksum::Xor8(Xor8::compute(bytes)),
            ChecksumAlgorithm::DualSum8 => {
                let (a, b) = DualSum8::compute(bytes);
                Checksum::DualSum8(a, b)
            },
        }
    }

    pub fn verify(self, bytes: &[u8], expected: Checksum) -> bool {
        self.compute(bytes) == expected
    }
}

impl Checksum {
    /// Wire bytes of the checksum: the hex digits for text, the raw pair for binary.
    pub fn to_wire(self) -> Vec<u8> {
        match self {
            Checksum::Xor8(c) => Xor8::to_hex(c).into_bytes(),
            Checksum::DualSum8(a, b) => vec![a, b],
        }
    }
}
