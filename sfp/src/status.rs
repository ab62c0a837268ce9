//! Status codes carried in-band on the `offset`, `path_len`, and `nrnames`
//! wire fields.
//!
//! The wire protocol overloads those fields: a non-negative value is a
//! count or echoed offset, a negative value is one of the codes below. This
//! module is the "tagged variant at the wire boundary only" representation
//! from the design notes — internal code works with `Result<i32, Status>`
//! and only [`Status::encode`]/[`Status::decode`] touch the raw field.

/// A negative wire status code, or the carrier for a successful value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(pub i32);

impl Status {
    /// Request path failed the owner-prefix permission check.
    pub const PERMISSION: Status = Status(-1);
    /// Target file or directory does not exist.
    pub const NOT_FOUND: Status = Status(-2);
    /// Requested offset is at or past the end of the file.
    pub const OFFSET_OOB: Status = Status(-3);
    /// Generic I/O failure (create, unlink, rmdir, read, write, opendir).
    pub const IO: Status = Status(-4);
    /// `msg_type` did not match any of the ten known variants.
    pub const UNKNOWN_REQUEST: Status = Status(-100);

    pub fn is_error(self) -> bool {
        self.0 < 0
    }
}

/// Flatten a `Result` onto a signed wire field: `Ok(v)` becomes `v` (which
/// must already be non-negative), `Err(status)` becomes the status code.
pub fn encode(result: Result<i64, Status>) -> i64 {
    match result {
        Ok(v) => {
            debug_assert!(v >= 0, "successful SFP value must be non-negative");
            v
        }
        Err(status) => status.0 as i64,
    }
}

/// Inverse of [`encode`]: negative values become the matching [`Status`],
/// non-negative values become `Ok`.
pub fn decode(raw: i64) -> Result<i64, Status> {
    if raw < 0 { Err(Status(raw as i32)) } else { Ok(raw) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        assert_eq!(decode(encode(Ok(42))), Ok(42));
        assert_eq!(decode(encode(Err(Status::NOT_FOUND))), Err(Status::NOT_FOUND));
    }

    #[test]
    fn negative_raw_decodes_to_status() {
        assert_eq!(decode(-1), Err(Status::PERMISSION));
        assert_eq!(decode(-4), Err(Status::IO));
    }

    #[test]
    fn nonnegative_raw_decodes_to_ok() {
        assert_eq!(decode(0), Ok(0));
        assert_eq!(decode(16), Ok(16));
    }
}
