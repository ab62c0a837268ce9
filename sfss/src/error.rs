//! Lifecycle-fatal errors for the SFSS binary: socket bind failure and
//! malformed root directory layout. Every per-request failure (missing
//! file, permission denial, short read) is encoded in-band on the reply's
//! status field instead (`sfp::Status`), never constructed as one of these.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SfssError {
    #[error("failed to bind SFSS UDP socket on {addr}: {source}")]
    SocketBind { addr: String, #[source] source: io::Error },

    #[error("root directory {path:?} does not exist or is not a directory")]
    InvalidRoot { path: PathBuf },

    #[error("failed to create owner directory {path:?}: {source}")]
    OwnerDirSetup { path: PathBuf, #[source] source: io::Error },
}
