//! `DL_REQ` handling, using a small `DirEntry { name, is_dir }` record read
//! directly off the host filesystem via `std::fs::read_dir`.

use std::path::Path;

use log::{debug, warn};
use sfp::{FstEntry, MsgType, SfpMessage, Status, MAX_NAMES, MAX_NAMES_BUFFER};

/// One directory entry as read from the host filesystem.
struct DirEntry {
    name: String,
    is_dir: bool,
}

/// Handle `DL_REQ`: list up to `MAX_NAMES` entries of `root + path`,
/// skipping `.`/`..`, concatenating names into `allfilenames` with no
/// separator and recording `(start, end, is_dir)` per entry in `fstlst`.
pub fn list(root: &Path, req: &SfpMessage) -> SfpMessage {
    let mut reply = SfpMessage::new(MsgType::DlRep, req.owner);

    let target = root.join(req.path_str().trim_start_matches('/'));
    let read_dir = match std::fs::read_dir(&target) {
        Ok(rd) => rd,
        Err(e) => {
            warn!("DL_REQ {:?}: opendir failed: {e}", req.path_str());
            reply.nrnames = Status::NOT_FOUND.0;
            return reply;
        }
    };

    let mut entries = Vec::new();
    for dirent in read_dir.flatten() {
        let name = dirent.file_name().to_string_lossy().into_owned();
        if name == "." || name == ".." {
            continue;
        }
        let is_dir = dirent.file_type().map(|t| t.is_dir()).unwrap_or(false);
        entries.push(DirEntry { name, is_dir });
        if entries.len() >= MAX_NAMES {
            break;
        }
    }

    let mut cursor = 0usize;
    let mut count = 0usize;
    for entry in &entries {
        let bytes = entry.name.as_bytes();
        if cursor + bytes.len() > MAX_NAMES_BUFFER {
            debug!("DL_REQ {:?}: stopping early, name buffer full", req.path_str());
            break;
        }
        reply.allfilenames[cursor..cursor + bytes.len()].copy_from_slice(bytes);
        reply.fstlst[count] = FstEntry::new(cursor as u16, (cursor + bytes.len()) as u16, entry.is_dir);
        cursor += bytes.len();
        count += 1;
    }

    debug!("DL_REQ {:?}: {count} entries", req.path_str());
    reply.nrnames = count as i32;
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn name_at(reply: &SfpMessage, index: usize) -> (String, bool) {
        let entry = reply.fstlst[index];
        let name =
            String::from_utf8_lossy(&reply.allfilenames[entry.start as usize..entry.end as usize])
                .into_owned();
        (name, entry.is_dir())
    }

    #[test]
    fn lists_files_and_directories() {
        let dir = tempdir().unwrap();
        let a4 = dir.path().join("A4");
        std::fs::create_dir_all(a4.join("sub")).unwrap();
        std::fs::write(a4.join("file.txt"), b"x").unwrap();

        let mut req = SfpMessage::new(MsgType::DlReq, 4);
        req.set_path("/A4");
        let reply = list(dir.path(), &req);

        assert_eq!(reply.nrnames, 2);
        let mut seen: Vec<(String, bool)> = (0..2).map(|i| name_at(&reply, i)).collect();
        seen.sort();
        assert_eq!(seen, vec![("file.txt".to_string(), false), ("sub".to_string(), true)]);
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let mut req = SfpMessage::new(MsgType::DlReq, 1);
        req.set_path("/A1/missing");
        let reply = list(dir.path(), &req);
        assert_eq!(reply.nrnames, Status::NOT_FOUND.0);
    }

    #[test]
    fn empty_directory_lists_zero_entries() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("A2")).unwrap();
        let mut req = SfpMessage::new(MsgType::DlReq, 2);
        req.set_path("/A2");
        let reply = list(dir.path(), &req);
        assert_eq!(reply.nrnames, 0);
    }
}
