//! The owner-path permission check.
//!
//! Component-aware prefix checks (never naive string prefixing) against the
//! two prefixes a request may legally target: the owner's private subtree
//! and the shared `/A0` subtree.

/// Returns `true` if `path` is exactly `prefix` or begins with `prefix` and
/// is immediately followed by `/`. This is what makes `/A50` fail to match
/// the owner prefix `/A5` even though it starts with the same characters.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

/// Check whether `owner` may access `path`: it must fall under the owner's
/// private prefix `/A{owner}` or the shared prefix `/A0`.
pub fn is_permitted(owner: u8, path: &str) -> bool {
    let owner_prefix = format!("/A{owner}");
    matches_prefix(path, &owner_prefix) || matches_prefix(path, "/A0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_private_prefix_permitted() {
        assert!(is_permitted(5, "/A5"));
        assert!(is_permitted(5, "/A5/file.txt"));
        assert!(is_permitted(5, "/A5/sub/dir"));
    }

    #[test]
    fn shared_prefix_always_permitted() {
        assert!(is_permitted(3, "/A0"));
        assert!(is_permitted(3, "/A0/shared.txt"));
    }

    #[test]
    fn other_owner_prefix_denied() {
        assert!(!is_permitted(5, "/A2/file.txt"));
        assert!(!is_permitted(5, "/A2"));
    }

    #[test]
    fn numeric_prefix_collision_denied() {
        // /A50 must not match owner prefix /A5.
        assert!(!is_permitted(5, "/A50"));
        assert!(!is_permitted(5, "/A50/file.txt"));
    }
}
