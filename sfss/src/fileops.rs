//! `RD_REQ`/`WR_REQ` handling.
//!
//! Plain synchronous `std::fs::File` operations — there is no async
//! executor on the SFSS side, just one thread serving one datagram at a
//! time.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, warn};
use sfp::{MsgType, SfpMessage, Status, BLOCK_SIZE};

/// Handle `RD_REQ`, returning the `RD_REP` reply.
pub fn read(root: &Path, req: &SfpMessage) -> SfpMessage {
    let mut reply = SfpMessage::new(MsgType::RdRep, req.owner);
    reply.set_path(req.path_str());

    let full_path = root.join(req.path_str().trim_start_matches('/'));
    let mut file = match std::fs::File::open(&full_path) {
        Ok(f) => f,
        Err(_) => {
            warn!("RD_REQ {:?}: not found", req.path_str());
            reply.offset = Status::NOT_FOUND.0 as i64;
            return reply;
        }
    };

    let file_size = file.metadata().map(|m| m.len()).unwrap_or(0);
    let offset = req.offset.max(0) as u64;
    if offset >= file_size && !(file_size == 0 && offset == 0) {
        warn!("RD_REQ {:?}: offset {offset} out of bounds (size {file_size})", req.path_str());
        reply.offset = Status::OFFSET_OOB.0 as i64;
        return reply;
    }

    if let Err(e) = file.seek(SeekFrom::Start(offset)) {
        warn!("RD_REQ {:?}: seek failed: {e}", req.path_str());
        reply.offset = Status::IO.0 as i64;
        return reply;
    }

    let mut block = [0u8; BLOCK_SIZE];
    match file.read(&mut block) {
        Ok(n) => {
            debug!("RD_REQ {:?}: read {n} bytes at offset {offset}", req.path_str());
            reply.offset = req.offset;
            reply.set_payload(&block[..n]);
        }
        Err(e) => {
            warn!("RD_REQ {:?}: read failed: {e}", req.path_str());
            reply.offset = Status::IO.0 as i64;
        }
    }
    reply
}

/// Handle `WR_REQ`, returning the `WR_REP` reply. Implements the
/// `offset=0, payload[0]=0` remove special case and sparse-hole fill with
/// `0x20` bytes for writes past the current end of file.
pub fn write(root: &Path, req: &SfpMessage) -> SfpMessage {
    let mut reply = SfpMessage::new(MsgType::WrRep, req.owner);
    reply.set_path(req.path_str());

    let full_path = root.join(req.path_str().trim_start_matches('/'));

    if req.offset == 0 && req.payload[0] == 0 {
        return remove(&full_path, req, reply);
    }

    let mut file = match OpenOptions::new().read(true).write(true).create(true).open(&full_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("WR_REQ {:?}: open failed: {e}", req.path_str());
            reply.offset = Status::IO.0 as i64;
            return reply;
        }
    };

    let file_size = match file.metadata() {
        Ok(m) => m.len(),
        Err(e) => {
            warn!("WR_REQ {:?}: stat failed: {e}", req.path_str());
            reply.offset = Status::IO.0 as i64;
            return reply;
        }
    };

    let offset = req.offset.max(0) as u64;
    if offset > file_size {
        if let Err(e) = fill_sparse_hole(&mut file, file_size, offset) {
            warn!("WR_REQ {:?}: sparse fill failed: {e}", req.path_str());
            reply.offset = Status::IO.0 as i64;
            return reply;
        }
    }

    if let Err(e) = file.seek(SeekFrom::Start(offset)) {
        warn!("WR_REQ {:?}: seek failed: {e}", req.path_str());
        reply.offset = Status::IO.0 as i64;
        return reply;
    }

    match file.write_all(&req.payload) {
        Ok(()) => {
            debug!("WR_REQ {:?}: wrote {BLOCK_SIZE} bytes at offset {offset}", req.path_str());
            reply.offset = req.offset;
        }
        Err(e) => {
            warn!("WR_REQ {:?}: write failed: {e}", req.path_str());
            reply.offset = Status::IO.0 as i64;
        }
    }
    reply
}

fn fill_sparse_hole(file: &mut std::fs::File, from: u64, to: u64) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(from))?;
    let filler = vec![0x20u8; (to - from) as usize];
    file.write_all(&filler)
}

fn remove(full_path: &Path, req: &SfpMessage, mut reply: SfpMessage) -> SfpMessage {
    match std::fs::remove_file(full_path) {
        Ok(()) => {
            debug!("WR_REQ {:?}: removed via empty write", req.path_str());
            reply.offset = 0;
        }
        Err(e) => {
            warn!("WR_REQ {:?}: remove failed: {e}", req.path_str());
            reply.offset = Status::IO.0 as i64;
        }
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(owner: u8, path: &str, offset: i64, payload: &[u8]) -> SfpMessage {
        let mut m = SfpMessage::new(MsgType::WrReq, owner);
        m.set_path(path);
        m.offset = offset;
        m.set_payload(payload);
        m
    }

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("A1")).unwrap();

        let wr = request(1, "/A1/file.txt", 0, b"Hello");
        let wrep = write(dir.path(), &wr);
        assert_eq!(wrep.offset, 0);

        let mut rd = SfpMessage::new(MsgType::RdReq, 1);
        rd.set_path("/A1/file.txt");
        rd.offset = 0;
        let rrep = read(dir.path(), &rd);
        assert_eq!(rrep.offset, 0);
        assert_eq!(&rrep.payload[..5], b"Hello");
        assert_eq!(rrep.payload[5], 0);
    }

    #[test]
    fn sparse_fill_law() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("A2")).unwrap();

        let wr = request(2, "/A2/sparse.dat", 48, b"X");
        let reply = write(dir.path(), &wr);
        assert_eq!(reply.offset, 48);

        let contents = std::fs::read(dir.path().join("A2/sparse.dat")).unwrap();
        assert_eq!(contents.len(), 64);
        assert!(contents[..48].iter().all(|&b| b == 0x20));
    }

    #[test]
    fn empty_write_removes_file() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("A1")).unwrap();
        let file_path = dir.path().join("A1/doomed.txt");
        std::fs::write(&file_path, b"data").unwrap();

        let mut req = SfpMessage::new(MsgType::WrReq, 1);
        req.set_path("/A1/doomed.txt");
        req.offset = 0;
        req.payload[0] = 0;

        let reply = write(dir.path(), &req);
        assert_eq!(reply.offset, 0);
        assert!(!file_path.exists());

        let mut rd = SfpMessage::new(MsgType::RdReq, 1);
        rd.set_path("/A1/doomed.txt");
        let rrep = read(dir.path(), &rd);
        assert_eq!(rrep.offset, Status::NOT_FOUND.0 as i64);
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut rd = SfpMessage::new(MsgType::RdReq, 1);
        rd.set_path("/A1/missing.txt");
        let reply = read(dir.path(), &rd);
        assert_eq!(reply.offset, Status::NOT_FOUND.0 as i64);
    }

    #[test]
    fn read_offset_out_of_bounds() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("A1")).unwrap();
        std::fs::write(dir.path().join("A1/small.txt"), b"hi").unwrap();

        let mut rd = SfpMessage::new(MsgType::RdReq, 1);
        rd.set_path("/A1/small.txt");
        rd.offset = 100;
        let reply = read(dir.path(), &rd);
        assert_eq!(reply.offset, Status::OFFSET_OOB.0 as i64);
    }
}
