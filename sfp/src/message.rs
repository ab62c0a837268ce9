//! The SFP wire record and the ten message-type variants that ride on it.
//!
//! `SfpMessage` is laid out with `#[repr(C)]` and decoded/encoded with
//! `zerocopy`. Every byte of the record is accounted for by an explicit field
//! (including reserved padding) so the derive macros never have to reject an
//! implicit compiler-inserted gap.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Fixed block size for file reads/writes.
pub const BLOCK_SIZE: usize = 16;
/// Maximum directory entries returned by a single `LISTDIR`.
pub const MAX_NAMES: usize = 40;
/// Maximum length of a path or name field.
pub const MAX_PATH: usize = 512;
/// Maximum size of the concatenated name buffer in a listing reply.
pub const MAX_NAMES_BUFFER: usize = 2048;

/// One of the ten SFP message variants.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    RdReq = 0,
    RdRep = 1,
    WrReq = 2,
    WrRep = 3,
    DcReq = 4,
    DcRep = 5,
    DrReq = 6,
    DrRep = 7,
    DlReq = 8,
    DlRep = 9,
}

impl MsgType {
    /// Decode a raw wire value. Unknown values map to `None` (the caller
    /// replies with `Status::UNKNOWN_REQUEST`).
    pub fn from_u8(value: u8) -> Option<MsgType> {
        Some(match value {
            0 => MsgType::RdReq,
            1 => MsgType::RdRep,
            2 => MsgType::WrReq,
            3 => MsgType::WrRep,
            4 => MsgType::DcReq,
            5 => MsgType::DcRep,
            6 => MsgType::DrReq,
            7 => MsgType::DrRep,
            8 => MsgType::DlReq,
            9 => MsgType::DlRep,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this is a request variant (as opposed to a reply).
    pub fn is_request(self) -> bool {
        matches!(
            self,
            MsgType::RdReq | MsgType::WrReq | MsgType::DcReq | MsgType::DrReq | MsgType::DlReq
        )
    }

    /// The reply variant for a request (REQ+1 per the wire convention).
    /// `None` if `self` is already a reply.
    pub fn reply_type(self) -> Option<MsgType> {
        Some(match self {
            MsgType::RdReq => MsgType::RdRep,
            MsgType::WrReq => MsgType::WrRep,
            MsgType::DcReq => MsgType::DcRep,
            MsgType::DrReq => MsgType::DrRep,
            MsgType::DlReq => MsgType::DlRep,
            _ => return None,
        })
    }

    /// Whether this variant belongs to the file-reply FIFO (RD/WR) as
    /// opposed to the directory-reply FIFO (DC/DR/DL).
    pub fn is_file_kind(self) -> bool {
        matches!(self, MsgType::RdReq | MsgType::RdRep | MsgType::WrReq | MsgType::WrRep)
    }

    pub fn is_directory_kind(self) -> bool {
        !self.is_file_kind()
    }
}

/// One entry in a directory listing: `(start, end, is_dir)` indexing into
/// the concatenated `allfilenames` buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable)]
pub struct FstEntry {
    pub start: u16,
    pub end: u16,
    pub is_dir: u8,
    _pad: u8,
}

impl FstEntry {
    pub fn new(start: u16, end: u16, is_dir: bool) -> Self {
        FstEntry { start, end, is_dir: is_dir as u8, _pad: 0 }
    }

    pub fn is_dir(self) -> bool {
        self.is_dir != 0
    }
}

/// The fixed-size SFP wire record, identical for every request and reply.
///
/// Field order is chosen so that every field lands on its natural alignment
/// with no compiler-inserted padding: widest fields (`i64`, then `i32`s)
/// come first, followed by the byte arrays, with one explicit `_reserved`
/// field replacing what would otherwise be an implicit 2-byte gap.
#[repr(C)]
#[derive(Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
pub struct SfpMessage {
    /// Byte offset for RD/WR; carries the status code in RD_REP/WR_REP.
    pub offset: i64,
    /// Length of `path`; carries the status code in DC_REP/DR_REP.
    pub path_len: i32,
    /// Length of `name` (DC/DR only).
    pub name_len: i32,
    /// Directory entry count; carries the status code in DL_REP.
    pub nrnames: i32,
    pub msg_type: u8,
    pub owner: u8,
    _reserved: [u8; 2],
    pub path: [u8; MAX_PATH],
    pub name: [u8; MAX_PATH],
    pub payload: [u8; BLOCK_SIZE],
    pub fstlst: [FstEntry; MAX_NAMES],
    pub allfilenames: [u8; MAX_NAMES_BUFFER],
}

impl SfpMessage {
    /// An all-zero message with the given type and owner, ready for callers
    /// to fill in the fields relevant to that message's variant.
    pub fn new(msg_type: MsgType, owner: u8) -> Self {
        SfpMessage {
            offset: 0,
            path_len: 0,
            name_len: 0,
            nrnames: 0,
            msg_type: msg_type.as_u8(),
            owner,
            _reserved: [0; 2],
            path: [0; MAX_PATH],
            name: [0; MAX_PATH],
            payload: [0; BLOCK_SIZE],
            fstlst: [FstEntry::new(0, 0, false); MAX_NAMES],
            allfilenames: [0; MAX_NAMES_BUFFER],
        }
    }

    pub fn msg_type(&self) -> Option<MsgType> {
        MsgType::from_u8(self.msg_type)
    }

    /// Set `path` from a `&str`, truncating to fit and NUL-terminating the
    /// remainder. Sets `path_len` to the (possibly truncated) length.
    pub fn set_path(&mut self, path: &str) {
        let len = write_fixed_str(&mut self.path, path);
        self.path_len = len as i32;
    }

    pub fn path_str(&self) -> &str {
        read_fixed_str(&self.path, self.path_len.max(0) as usize)
    }

    pub fn set_name(&mut self, name: &str) {
        let len = write_fixed_str(&mut self.name, name);
        self.name_len = len as i32;
    }

    pub fn name_str(&self) -> &str {
        read_fixed_str(&self.name, self.name_len.max(0) as usize)
    }

    /// Set the payload from a byte slice, truncating to `BLOCK_SIZE` and
    /// zero-padding any remainder.
    pub fn set_payload(&mut self, data: &[u8]) {
        let n = data.len().min(BLOCK_SIZE);
        self.payload = [0; BLOCK_SIZE];
        self.payload[..n].copy_from_slice(&data[..n]);
    }

    /// Encode to an owned byte buffer for sending over the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Decode a message from a received datagram. Returns `None` if the
    /// buffer is not exactly the wire record size.
    pub fn from_bytes(buf: &[u8]) -> Option<SfpMessage> {
        zerocopy::FromBytes::read_from_bytes(buf).ok()
    }

    pub const WIRE_SIZE: usize = core::mem::size_of::<SfpMessage>();
}

fn write_fixed_str(buf: &mut [u8; MAX_PATH], s: &str) -> usize {
    let bytes = s.as_bytes();
    let n = bytes.len().min(MAX_PATH);
    buf.fill(0);
    buf[..n].copy_from_slice(&bytes[..n]);
    n
}

fn read_fixed_str(buf: &[u8; MAX_PATH], len: usize) -> &str {
    let n = len.min(MAX_PATH);
    core::str::from_utf8(&buf[..n]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip_preserves_fields() {
        let mut msg = SfpMessage::new(MsgType::WrReq, 2);
        msg.set_path("/A2/file.txt");
        msg.offset = 48;
        msg.set_payload(b"hello world");

        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), SfpMessage::WIRE_SIZE);

        let decoded = SfpMessage::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded.msg_type(), Some(MsgType::WrReq));
        assert_eq!(decoded.owner, 2);
        assert_eq!(decoded.path_str(), "/A2/file.txt");
        assert_eq!(decoded.offset, 48);
        assert_eq!(&decoded.payload[..11], b"hello world");
        assert_eq!(decoded.payload[11], 0);
    }

    #[test]
    fn reply_type_pairs_request_to_reply() {
        assert_eq!(MsgType::RdReq.reply_type(), Some(MsgType::RdRep));
        assert_eq!(MsgType::DlReq.reply_type(), Some(MsgType::DlRep));
        assert_eq!(MsgType::RdRep.reply_type(), None);
    }

    #[test]
    fn file_vs_directory_kind_classification() {
        assert!(MsgType::RdReq.is_file_kind());
        assert!(MsgType::WrRep.is_file_kind());
        assert!(MsgType::DcReq.is_directory_kind());
        assert!(MsgType::DlRep.is_directory_kind());
    }

    #[test]
    fn truncates_oversized_path() {
        let mut msg = SfpMessage::new(MsgType::RdReq, 1);
        let long = "a".repeat(MAX_PATH + 50);
        msg.set_path(&long);
        assert_eq!(msg.path_len as usize, MAX_PATH);
        assert_eq!(msg.path_str().len(), MAX_PATH);
    }

    #[test]
    fn from_bytes_rejects_wrong_size() {
        assert!(SfpMessage::from_bytes(&[0u8; 10]).is_none());
    }
}
