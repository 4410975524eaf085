//! Binary messages the engine understands, and the generic UBX frame writer.

use crate::{
    checksum::DualSum8Calc,
    constants::{UBX_CHECKSUM_LEN, UBX_HEADER_LEN, UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2},
    error::FrameError,
};

mod ack;
mod nav_time_utc;

pub use ack::{find_ack, AckBuilder, AckKind, ACK_ACK, ACK_NAK};
pub use nav_time_utc::{
    DecodedTimeRecord, NavTimeUtcBuilder, NavTimeUtcFlags, ScanSummary, TimeUtcStream,
    NAV_TIME_UTC, NAV_TIME_UTC_FRAME_LEN,
};

/// Assembles `[sync][class][id][length LE16][payload][ck_a][ck_b]`.
pub fn ubx_frame(class: u8, id: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u16::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLong {
        len: payload.len(),
    })?;
    let mut frame = Vec::with_capacity(UBX_HEADER_LEN + payload.len() + UBX_CHECKSUM_LEN);
    frame.extend_from_slice(&[UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2, class, id]);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);

    let mut calc = DualSum8Calc::new();
    calc.update(&frame[2..]);
    let (ck_a, ck_b) = calc.result();
    frame.push(ck_a);
    frame.push(ck_b);
    Ok(frame)
}
