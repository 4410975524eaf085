use gnss_link::{
    messages::NAV_TIME_UTC, BinaryMessageScanner, DecodedTimeRecord, DualSum8, FrameVerdict,
    NavTimeUtcBuilder, NavTimeUtcFlags, TimeUtcStream,
};
use proptest::prelude::*;

fn frame(year: u16, sec: u8, valid: NavTimeUtcFlags) -> [u8; 28] {
    NavTimeUtcBuilder {
        itow: 86_400_000,
        year,
        month: 12,
        day: 31,
        hour: 23,
        min: 59,
        sec,
        valid,
        ..Default::default()
    }
    .into_packet_bytes()
}

#[test]
fn one_valid_frame_one_record() {
    let buf = frame(2023, 58, NavTimeUtcFlags::all());
    let records = DecodedTimeRecord::scan(&buf);
    assert_eq!(records.len(), 1);
    let r = records[0];
    assert_eq!(
        (r.year, r.month, r.day, r.hour, r.minute, r.second),
        (2023, 12, 31, 23, 59, 58)
    );
    assert!(r.is_valid());
}

#[test]
fn concatenated_frames_in_stream_order() {
    let mut buf = frame(2023, 58, NavTimeUtcFlags::all()).to_vec();
    buf.extend_from_slice(&frame(2024, 59, NavTimeUtcFlags::all()));
    let years: Vec<u16> = DecodedTimeRecord::scan(&buf).iter().map(|r| r.year).collect();
    assert_eq!(years, [2023, 2024]);
}

#[test]
fn flipped_checksum_bytes_yield_nothing() {
    for idx in [26, 27] {
        let mut buf = frame(2023, 58, NavTimeUtcFlags::all());
        buf[idx] ^= 0xff;
        assert!(DecodedTimeRecord::scan(&buf).is_empty(), "byte {idx}");
    }
}

#[test]
fn cleared_validity_bit_yields_nothing() {
    let buf = frame(2023, 58, NavTimeUtcFlags::VALID_TOW | NavTimeUtcFlags::VALID_WKN);
    assert!(DualSum8::verify_frame(&buf));
    assert!(DecodedTimeRecord::scan(&buf).is_empty());

    let mut stream = TimeUtcStream::new();
    let summary = stream.consume(&buf);
    assert!(summary.records.is_empty());
    assert_eq!(summary.validity_unset, 1);
    assert_eq!(summary.checksum_failures, 0);
}

#[test]
fn truncated_frame_is_not_a_candidate() {
    let buf = frame(2023, 58, NavTimeUtcFlags::all());
    let scanner = BinaryMessageScanner::new(NAV_TIME_UTC).unwrap();
    assert_eq!(scanner.scan(&buf[..27]).count(), 0);
}

#[test]
fn verdicts_carry_offsets() {
    let mut buf = vec![0x00, 0xb5];
    let mut bad = frame(2023, 58, NavTimeUtcFlags::all());
    bad[26] ^= 1;
    buf.extend_from_slice(&bad);
    buf.extend_from_slice(&frame(2024, 0, NavTimeUtcFlags::all()));

    let scanner = BinaryMessageScanner::new(NAV_TIME_UTC).unwrap();
    let verdicts: Vec<_> = scanner.scan(&buf).collect();
    assert_eq!(verdicts.len(), 2);
    assert!(matches!(verdicts[0], FrameVerdict::ChecksumMismatch { offset: 2 }));
    match &verdicts[1] {
        FrameVerdict::Valid(f) => {
            assert_eq!(f.offset(), 30);
            assert_eq!(f.field("year"), Some(2024));
        },
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn stream_joins_split_frames() {
    let buf = frame(2023, 58, NavTimeUtcFlags::all());
    let mut stream = TimeUtcStream::new();
    assert!(stream.consume(&buf[..11]).records.is_empty());
    let summary = stream.consume(&buf[11..]);
    assert_eq!(summary.records.len(), 1);
    assert!(stream.buffer_len() < 28);
}

proptest! {
    #[test]
    fn dual_sum_verifies_own_checksum(bytes in prop::collection::vec(any::<u8>(), 1..256)) {
        let ck = DualSum8::compute(&bytes);
        prop_assert!(DualSum8::verify(&bytes, ck));
    }

    #[test]
    fn dual_sum_detects_single_bit_flip(
        bytes in prop::collection::vec(any::<u8>(), 1..256),
        pos in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let ck = DualSum8::compute(&bytes);
        let mut flipped = bytes.clone();
        flipped[pos.index(bytes.len())] ^= 1 << bit;
        prop_assert!(!DualSum8::verify(&flipped, ck));
    }

    #[test]
    fn frame_is_found_inside_noise(
        head in prop::collection::vec(any::<u8>(), 0..200),
        tail in prop::collection::vec(any::<u8>(), 0..200),
        year in 1980u16..2100,
    ) {
        let mut buf = head;
        buf.extend_from_slice(&frame(year, 1, NavTimeUtcFlags::all()));
        buf.extend_from_slice(&tail);
        let records = DecodedTimeRecord::scan(&buf);
        prop_assert!(records.iter().any(|r| r.year == year && r.second == 1));
    }

    #[test]
    fn scanning_noise_never_panics(noise in prop::collection::vec(any::<u8>(), 0..1024)) {
        let mut stream = TimeUtcStream::new();
        let _ = stream.consume(&noise);
        prop_assert!(stream.buffer_len() < 28);
    }
}
