//! `DC_REQ`/`DR_REQ` handling: create and remove a directory entry with
//! synchronous `std::fs` calls. `path_len` carries the status code on the
//! wire instead of a separate error field.

use std::path::Path;

use log::{debug, warn};
use sfp::{MsgType, SfpMessage, Status};

/// Handle `DC_REQ`: create directory `root + path + "/" + name` with mode
/// 0755.
pub fn create(root: &Path, req: &SfpMessage) -> SfpMessage {
    let mut reply = SfpMessage::new(MsgType::DcRep, req.owner);
    let full_path = format!("{}/{}", req.path_str(), req.name_str());
    let target = root.join(full_path.trim_start_matches('/'));

    match make_dir(&target) {
        Ok(()) => {
            debug!("DC_REQ: created {full_path:?}");
            reply.set_path(&full_path);
        }
        Err(e) => {
            warn!("DC_REQ: failed to create {full_path:?}: {e}");
            reply.set_path(req.path_str());
            reply.path_len = Status::IO.0;
        }
    }
    reply
}

#[cfg(unix)]
fn make_dir(target: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().mode(0o755).create(target)
}

#[cfg(not(unix))]
fn make_dir(target: &Path) -> std::io::Result<()> {
    std::fs::create_dir(target)
}

/// Handle `DR_REQ`: attempt `unlink`, and if that fails attempt `rmdir`, on
/// `root + path + "/" + name`.
pub fn remove(root: &Path, req: &SfpMessage) -> SfpMessage {
    let mut reply = SfpMessage::new(MsgType::DrRep, req.owner);
    let full_path = format!("{}/{}", req.path_str(), req.name_str());
    let target = root.join(full_path.trim_start_matches('/'));
    reply.set_path(req.path_str());

    if std::fs::remove_file(&target).is_ok() || std::fs::remove_dir(&target).is_ok() {
        debug!("DR_REQ: removed {full_path:?}");
        reply.path_len = req.path_str().len() as i32;
    } else {
        warn!("DR_REQ: failed to remove {full_path:?}");
        reply.path_len = Status::IO.0;
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(msg_type: MsgType, owner: u8, path: &str, name: &str) -> SfpMessage {
        let mut m = SfpMessage::new(msg_type, owner);
        m.set_path(path);
        m.set_name(name);
        m
    }

    #[test]
    fn create_then_remove_restores_prior_listing() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("A4")).unwrap();

        let dc = request(MsgType::DcReq, 4, "/A4", "sub");
        let dc_rep = create(dir.path(), &dc);
        assert_eq!(dc_rep.path_len, "/A4/sub".len() as i32);
        assert!(dir.path().join("A4/sub").is_dir());

        let dr = request(MsgType::DrReq, 4, "/A4", "sub");
        let dr_rep = remove(dir.path(), &dr);
        assert_eq!(dr_rep.path_len, "/A4".len() as i32);
        assert!(!dir.path().join("A4/sub").exists());
    }

    #[test]
    fn create_failure_reports_io_status() {
        let dir = tempdir().unwrap();
        // No A9 directory precreated, so creating a child under it fails.
        let dc = request(MsgType::DcReq, 9, "/A9", "sub");
        let reply = create(dir.path(), &dc);
        assert_eq!(reply.path_len, Status::IO.0);
    }

    #[test]
    fn remove_missing_entry_reports_io_status() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("A1")).unwrap();
        let dr = request(MsgType::DrReq, 1, "/A1", "nonexistent");
        let reply = remove(dir.path(), &dr);
        assert_eq!(reply.path_len, Status::IO.0);
    }
}
