pub const UBX_SYNC_CHAR_1: u8 = 0xb5;
pub const UBX_SYNC_CHAR_2: u8 = 0x62;
pub(crate) const UBX_SYNC_SIZE: usize = 2;
pub(crate) const UBX_PAYLOAD_SIZE_LEN: usize = 2;
pub(crate) const UBX_CLASS_LEN: usize = 1;
pub(crate) const UBX_ID_LEN: usize = 1;
pub const UBX_HEADER_LEN: usize =
    UBX_SYNC_SIZE + UBX_PAYLOAD_SIZE_LEN + UBX_CLASS_LEN + UBX_ID_LEN;
pub const UBX_CHECKSUM_LEN: usize = 2;

pub(crate) const UBX_CLASS_OFFSET: usize = 2; // After SYNC_CHAR_1, SYNC_CHAR_2

pub(crate) const UBX_CLASS_ACK: u8 = 0x05;
pub(crate) const UBX_ID_ACK_ACK: u8 = 0x01;
pub(crate) const UBX_ID_ACK_NAK: u8 = 0x00;

pub(crate) const UBX_CLASS_NAV: u8 = 0x01;
pub(crate) const UBX_ID_NAV_TIMEUTC: u8 = 0x21;
pub(crate) const UBX_CLASS_CFG: u8 = 0x06;
pub(crate) const UBX_ID_CFG_MSG: u8 = 0x01;
pub(crate) const UBX_ID_CFG_CFG: u8 = 0x09;

pub const TEXT_SYNC_CHAR: u8 = 0x24; // '$'
pub const TEXT_CHECKSUM_DELIM: u8 = 0x2a; // '*'
pub const TEXT_ARG_SEPARATOR: char = ' ';
pub const TEXT_END_CHAR_1: u8 = 0x0d; // '\r' (<CR>)
pub const TEXT_END_CHAR_2: u8 = 0x0a; // '\n' (<LF>)
pub const TEXT_LINE_TERMINATOR: &str = "\r\n";

/// Prefix of every command acknowledgement emitted by the text protocol.
pub const TEXT_RESPONSE_PREFIX: &str = "$command,";
/// Status field of a successful acknowledgement.
pub const TEXT_RESPONSE_OK: &str = "response: OK";
