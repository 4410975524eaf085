use super::ubx_frame;
use crate::{
    constants::{UBX_CLASS_ACK, UBX_ID_ACK_ACK, UBX_ID_ACK_NAK},
    error::FrameError,
    scanner::{BinaryMessageScanner, BinaryMessageSpec, FieldKind, FieldSpec, ValidFrame},
};

const ACK_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("class", 6, FieldKind::U8),
    FieldSpec::new("msg_id", 7, FieldKind::U8),
];

/// Message Acknowledged
pub const ACK_ACK: BinaryMessageSpec = BinaryMessageSpec {
    name: "ACK-ACK",
    signature: &[0xb5, 0x62, UBX_CLASS_ACK, UBX_ID_ACK_ACK, 0x02, 0x00],
    frame_len: 10,
    fields: ACK_FIELDS,
    validity: None,
};

/// Message Not-Acknowledged
pub const ACK_NAK: BinaryMessageSpec = BinaryMessageSpec {
    name: "ACK-NAK",
    signature: &[0xb5, 0x62, UBX_CLASS_ACK, UBX_ID_ACK_NAK, 0x02, 0x00],
    frame_len: 10,
    fields: ACK_FIELDS,
    validity: None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Ack,
    Nak,
}

fn acks(frame: &ValidFrame<'_>, class: u8, msg_id: u8) -> bool {
    frame.field("class") == Some(i64::from(class))
        && frame.field("msg_id") == Some(i64::from(msg_id))
}

/// Looks for the acknowledgement of the message `class`/`msg_id` in `buf`. A NAK wins over an
/// ACK found in the same buffer.
pub fn find_ack(buf: &[u8], class: u8, msg_id: u8) -> Option<AckKind> {
    let nak = BinaryMessageScanner::new_unchecked(ACK_NAK);
    if nak.valid_frames(buf).any(|f| acks(&f, class, msg_id)) {
        return Some(AckKind::Nak);
    }
    let ack = BinaryMessageScanner::new_unchecked(ACK_ACK);
    if ack.valid_frames(buf).any(|f| acks(&f, class, msg_id)) {
        return Some(AckKind::Ack);
    }
    None
}

/// Writes ACK-ACK / ACK-NAK frames, for simulators and tests.
#[derive(Debug, Clone, Copy)]
pub struct AckBuilder {
    pub kind: AckKind,
    pub class: u8,
    pub msg_id: u8,
}

impl AckBuilder {
    pub fn into_packet_bytes(self) -> Result<Vec<u8>, FrameError> {
        let id = match self.kind {
            AckKind::Ack => UBX_ID_ACK_ACK,
            AckKind::Nak => UBX_ID_ACK_NAK,
        };
        ubx_frame(UBX_CLASS_ACK, id, &[self.class, self.msg_id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_are_consistent() {
        assert_eq!(ACK_ACK.validate(), Ok(()));
        assert_eq!(ACK_NAK.validate(), Ok(()));
    }

    #[test]
    fn finds_matching_ack_only() {
        let ack = AckBuilder {
            kind: AckKind::Ack,
            class: 0x06,
            msg_id: 0x01,
        }
        .into_packet_bytes()
        .unwrap();
        assert_eq!(find_ack(&ack, 0x06, 0x01), Some(AckKind::Ack));
        assert_eq!(find_ack(&ack, 0x06, 0x09), None);
    }

    #[test]
    fn nak_is_reported() {
        let mut data = b"$GNGGA,junk\r\n".to_vec();
        data.extend(
            AckBuilder {
                kind: AckKind::Nak,
                class: 0x06,
                msg_id: 0x09,
            }
            .into_packet_bytes()
            .unwrap(),
        );
        assert_eq!(find_ack(&data, 0x06, 0x09), Some(AckKind::Nak));
    }
}
