//! Owner names double as certificate file stems.

use crate::{CertificateError, CertificateResult};

/// Owner used when none is given
pub const DEFAULT_OWNER: &str = "pubkey";

/// Check that `owner` is a bare file stem: no directories, no traversal.
pub fn validate_owner(owner: &str) -> CertificateResult<()> {
    let reason = if owner.is_empty() {
        Some("must not be empty")
    } else if owner == "." || owner == ".." {
        Some("must not be a directory reference")
    } else if owner.contains(|c: char| c == '/' || c == '\\') {
        Some("must not contain path separators")
    } else if owner.contains('\0') {
        Some("must not contain NUL")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CertificateError::InvalidOwner {
            owner: owner.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_owners() {
        for owner in [DEFAULT_OWNER, "alice", "Alice Smith", "release-key.v2"] {
            assert!(validate_owner(owner).is_ok(), "{owner} should be accepted");
        }
    }

    #[test]
    fn test_invalid_owners() {
        for owner in ["", ".", "..", "a/b", "..\\x", "nul\0byte"] {
            assert!(validate_owner(owner).is_err(), "{owner:?} should be rejected");
        }
    }
}
