//! Library surface for the `kernelsim` binary, split out so unit tests can
//! exercise individual modules directly.

pub mod app;
pub mod children;
pub mod error;
pub mod ic;
pub mod pcb;
pub mod readyqueue;
pub mod replyqueue;
pub mod signals;
pub mod net;
pub mod supervisor;
