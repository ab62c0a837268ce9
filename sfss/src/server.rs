//! The single-threaded datagram server loop.
//!
//! One thread, one socket, one request at a time: receive, permission-check,
//! dispatch by `msg_type`, reply. There is no concurrency to manage here:
//! every filesystem operation runs synchronously because nothing else needs
//! the thread while it does.

use std::net::UdpSocket;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use sfp::{MsgType, SfpMessage, Status};

use crate::error::SfssError;
use crate::{dirops, fileops, listing, permission};

pub struct Server {
    socket: UdpSocket,
    root: PathBuf,
}

impl Server {
    pub fn bind(addr: &str, root: PathBuf, apps: u32) -> Result<Self, SfssError> {
        if !root.is_dir() {
            return Err(SfssError::InvalidRoot { path: root });
        }
        ensure_owner_dirs(&root, apps)?;

        let socket = UdpSocket::bind(addr)
            .map_err(|source| SfssError::SocketBind { addr: addr.to_string(), source })?;
        info!("SFSS listening on {addr}, root={root:?}");
        Ok(Server { socket, root })
    }

    pub fn run(&self) -> ! {
        let mut buf = vec![0u8; SfpMessage::WIRE_SIZE];
        loop {
            let (n, src) = match self.socket.recv_from(&mut buf) {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("recv_from failed: {e}");
                    continue;
                }
            };

            if n != SfpMessage::WIRE_SIZE {
                warn!("dropping datagram of unexpected size {n} from {src}");
                continue;
            }

            let Some(request) = SfpMessage::from_bytes(&buf[..n]) else {
                warn!("dropping malformed datagram from {src}");
                continue;
            };

            let reply = self.handle_request(&request);
            if let Err(e) = self.socket.send_to(&reply.to_bytes(), src) {
                warn!("sendto {src} failed: {e}");
            }
        }
    }

    fn handle_request(&self, request: &SfpMessage) -> SfpMessage {
        let Some(msg_type) = request.msg_type() else {
            warn!("unknown msg_type {} from owner {}", request.msg_type, request.owner);
            return unknown_request_reply(request);
        };

        if !msg_type.is_request() {
            warn!("received a reply-typed message ({msg_type:?}) as a request, dropping");
            return unknown_request_reply(request);
        }

        if !permission::is_permitted(request.owner, request.path_str()) {
            debug!("permission denied: owner {} path {:?}", request.owner, request.path_str());
            return permission_denied_reply(msg_type, request);
        }

        match msg_type {
            MsgType::RdReq => fileops::read(&self.root, request),
            MsgType::WrReq => fileops::write(&self.root, request),
            MsgType::DcReq => dirops::create(&self.root, request),
            MsgType::DrReq => dirops::remove(&self.root, request),
            MsgType::DlReq => listing::list(&self.root, request),
            _ => unreachable!("non-request variants filtered above"),
        }
    }
}

fn unknown_request_reply(request: &SfpMessage) -> SfpMessage {
    let mut reply = SfpMessage::new(MsgType::RdRep, request.owner);
    reply.offset = Status::UNKNOWN_REQUEST.0 as i64;
    reply
}

fn permission_denied_reply(msg_type: MsgType, request: &SfpMessage) -> SfpMessage {
    let reply_type = msg_type.reply_type().unwrap_or(MsgType::RdRep);
    let mut reply = SfpMessage::new(reply_type, request.owner);
    reply.set_path(request.path_str());
    match msg_type {
        MsgType::RdReq | MsgType::WrReq => reply.offset = Status::PERMISSION.0 as i64,
        MsgType::DcReq | MsgType::DrReq => reply.path_len = Status::PERMISSION.0,
        MsgType::DlReq => reply.nrnames = Status::PERMISSION.0,
        _ => {}
    }
    reply
}

/// Precreate `A0..AN` under `root` if missing, establishing the expected
/// per-owner filesystem layout.
fn ensure_owner_dirs(root: &Path, apps: u32) -> Result<(), SfssError> {
    for owner in 0..=apps {
        let dir = root.join(format!("A{owner}"));
        if !dir.exists() {
            std::fs::create_dir(&dir)
                .map_err(|source| SfssError::OwnerDirSetup { path: dir, source })?;
        }
    }
    Ok(())
}
