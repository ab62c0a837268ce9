//! Simple File Protocol (SFP) — the fixed-size wire record shared by the
//! kernel simulator and the Simple File Storage Service, plus the
//! newline-delimited syscall grammar the kernel parses from its children.
//!
//! A small, dependency-light crate holding the types both sides must agree
//! on bit-for-bit.

pub mod line;
pub mod message;
pub mod status;

pub use line::{AppLine, LineParser};
pub use message::{FstEntry, MsgType, SfpMessage, BLOCK_SIZE, MAX_NAMES, MAX_NAMES_BUFFER, MAX_PATH};
pub use status::Status;
