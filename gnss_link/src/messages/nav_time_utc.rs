use bitflags::bitflags;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::{
    checksum::DualSum8Calc,
    constants::{UBX_CLASS_NAV, UBX_ID_NAV_TIMEUTC},
    error::DateTimeError,
    scanner::{
        BinaryMessageScanner, BinaryMessageSpec, FieldKind, FieldSpec, FrameVerdict, ValidityFlag,
    },
};

pub const NAV_TIME_UTC_FRAME_LEN: usize = 28;
const NAV_TIME_UTC_PAYLOAD_LEN: usize = 20;

bitflags! {
    /// Validity Flags of a UTC time solution
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NavTimeUtcFlags: u8 {
        /// Valid Time of Week
        const VALID_TOW = 1;
        /// Valid Week Number
        const VALID_WKN = 2;
        /// Valid UTC (Leap Seconds already known)
        const VALID_UTC = 4;
    }
}

const ITOW: FieldSpec = FieldSpec::new("itow", 6, FieldKind::U32);
const TIME_ACCURACY: FieldSpec = FieldSpec::new("time_accuracy_ns", 10, FieldKind::U32);
const NANOS: FieldSpec = FieldSpec::new("nanos", 14, FieldKind::I32);
const YEAR: FieldSpec = FieldSpec::new("year", 18, FieldKind::U16);
const MONTH: FieldSpec = FieldSpec::new("month", 20, FieldKind::U8);
const DAY: FieldSpec = FieldSpec::new("day", 21, FieldKind::U8);
const HOUR: FieldSpec = FieldSpec::new("hour", 22, FieldKind::U8);
const MIN: FieldSpec = FieldSpec::new("min", 23, FieldKind::U8);
const SEC: FieldSpec = FieldSpec::new("sec", 24, FieldKind::U8);
const VALID: FieldSpec = FieldSpec::new("valid", 25, FieldKind::U8);

/// UTC Time Solution (UBX-NAV-TIMEUTC), 20 byte payload.
pub const NAV_TIME_UTC: BinaryMessageSpec = BinaryMessageSpec {
    name: "NAV-TIMEUTC",
    signature: &[0xb5, 0x62, UBX_CLASS_NAV, UBX_ID_NAV_TIMEUTC, 0x14, 0x00],
    frame_len: NAV_TIME_UTC_FRAME_LEN,
    fields: &[
        ITOW,
        TIME_ACCURACY,
        NANOS,
        YEAR,
        MONTH,
        DAY,
        HOUR,
        MIN,
        SEC,
        VALID,
    ],
    // the flags byte sits right before the checksum pair
    validity: Some(ValidityFlag {
        offset: NAV_TIME_UTC_FRAME_LEN - 3,
        mask: NavTimeUtcFlags::VALID_UTC.bits(),
    }),
};

/// Raw UTC fields of a trusted NAV-TIMEUTC frame. No timezone or locale is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedTimeRecord {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub valid: NavTimeUtcFlags,
}

fn u8_at(frame: &[u8], field: FieldSpec) -> u8 {
    frame[field.offset]
}

fn u16_at(frame: &[u8], field: FieldSpec) -> u16 {
    u16::from_le_bytes([frame[field.offset], frame[field.offset + 1]])
}

impl DecodedTimeRecord {
    fn from_frame(frame: &[u8]) -> Self {
        Self {
            year: u16_at(frame, YEAR),
            month: u8_at(frame, MONTH),
            day: u8_at(frame, DAY),
            hour: u8_at(frame, HOUR),
            minute: u8_at(frame, MIN),
            second: u8_at(frame, SEC),
            valid: NavTimeUtcFlags::from_bits_truncate(u8_at(frame, VALID)),
        }
    }

    /// Every trusted time record in `buf`, in stream order.
    pub fn scan(buf: &[u8]) -> Vec<DecodedTimeRecord> {
        let records: Vec<_> = scanner()
            .valid_frames(buf)
            .map(|frame| Self::from_frame(frame.bytes()))
            .collect();
        if records.is_empty() {
            debug!(len = buf.len(), "no valid time data");
        }
        records
    }

    pub fn is_valid(&self) -> bool {
        self.valid.contains(NavTimeUtcFlags::VALID_UTC)
    }

    /// Calendar view of the record. A second of 60 is kept as a leap second.
    pub fn to_datetime(&self) -> Result<NaiveDateTime, DateTimeError> {
        let date = NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
        .ok_or(DateTimeError::InvalidDate)?;
        let (h, m, s) = (
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        );
        let time = if s == 60 {
            NaiveTime::from_hms_milli_opt(h, m, 59, 1_000)
        } else {
            NaiveTime::from_hms_opt(h, m, s)
        }
        .ok_or(DateTimeError::InvalidTime)?;
        Ok(NaiveDateTime::new(date, time))
    }
}

const fn scanner() -> BinaryMessageScanner {
    BinaryMessageScanner::new_unchecked(NAV_TIME_UTC)
}

/// Outcome of feeding one read to a [`TimeUtcStream`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub records: Vec<DecodedTimeRecord>,
    pub checksum_failures: usize,
    pub validity_unset: usize,
}

/// Scanner for a continuous byte stream: a frame split across two reads is decoded once the
/// second read arrives. At most one frame length of tail is kept between reads.
#[derive(Debug)]
pub struct TimeUtcStream {
    scanner: BinaryMessageScanner,
    buf: Vec<u8>,
}

impl Default for TimeUtcStream {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeUtcStream {
    pub fn new() -> Self {
        Self {
            scanner: scanner(),
            buf: Vec::with_capacity(2 * NAV_TIME_UTC_FRAME_LEN),
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.buf.len()
    }

    pub fn consume(&mut self, data: &[u8]) -> ScanSummary {
        self.buf.extend_from_slice(data);

        let mut summary = ScanSummary::default();
        for verdict in self.scanner.scan(&self.buf) {
            match verdict {
                FrameVerdict::Valid(frame) => summary
                    .records
                    .push(DecodedTimeRecord::from_frame(frame.bytes())),
                FrameVerdict::ChecksumMismatch { .. } => summary.checksum_failures += 1,
                FrameVerdict::ValidityUnset { .. } => summary.validity_unset += 1,
            }
        }

        let keep_from = self.scanner.pending_from(self.buf.len());
        self.buf.drain(..keep_from);
        summary
    }
}

/// Writes NAV-TIMEUTC frames, for simulators and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NavTimeUtcBuilder {
    pub itow: u32,
    pub time_accuracy_ns: u32,
    pub nanos: i32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    pub valid: NavTimeUtcFlags,
}

impl NavTimeUtcBuilder {
    pub fn into_packet_bytes(self) -> [u8; NAV_TIME_UTC_FRAME_LEN] {
        let mut payload = [0u8; NAV_TIME_UTC_PAYLOAD_LEN];
        payload[0..4].copy_from_slice(&self.itow.to_le_bytes());
        payload[4..8].copy_from_slice(&self.time_accuracy_ns.to_le_bytes());
        payload[8..12].copy_from_slice(&self.nanos.to_le_bytes());
        payload[12..14].copy_from_slice(&self.year.to_le_bytes());
        payload[14] = self.month;
        payload[15] = self.day;
        payload[16] = self.hour;
        payload[17] = self.min;
        payload[18] = self.sec;
        payload[19] = self.valid.bits();

        let mut out = [0u8; NAV_TIME_UTC_FRAME_LEN];
        out[..6].copy_from_slice(NAV_TIME_UTC.signature);
        out[6..6 + NAV_TIME_UTC_PAYLOAD_LEN].copy_from_slice(&payload);
        let mut calc = DualSum8Calc::new();
        calc.update(&out[2..NAV_TIME_UTC_FRAME_LEN - 2]);
        let (ck_a, ck_b) = calc.result();
        out[NAV_TIME_UTC_FRAME_LEN - 2] = ck_a;
        out[NAV_TIME_UTC_FRAME_LEN - 1] = ck_b;
        out
    }
}
