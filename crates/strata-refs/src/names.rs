//! Branch name validation following git-style conventions.
//!
//! Branch names double as storage path segments, so they must not contain
//! whitespace, `~ ^ : ? * [ \`, `..`, `@{`, empty `/` components, or
//! components starting with `.`; must not end with `.` or `.lock`; and must
//! not be `HEAD`.

use crate::error::{RefError, Result};

/// Characters that are forbidden anywhere in a branch name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

fn reject(name: &str, reason: impl Into<String>) -> Result<()> {
    Err(RefError::InvalidBranchName {
        name: name.to_string(),
        reason: reason.into(),
    })
}

/// Validate a branch name, returning `Ok(())` if valid.
///
/// ```
/// use strata_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("experiments/augment").is_ok());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return reject(name, "branch name must not be empty");
    }
    if name == "HEAD" {
        return reject(name, "'HEAD' is reserved");
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return reject(name, format!("contains forbidden character: {ch:?}"));
    }
    for (pattern, what) in [("..", "'..'"), ("@{", "'@{'")] {
        if name.contains(pattern) {
            return reject(name, format!("must not contain {what}"));
        }
    }
    if name.ends_with('.') || name.ends_with(".lock") {
        return reject(name, "must not end with '.' or '.lock'");
    }
    for component in name.split('/') {
        if component.is_empty() {
            return reject(name, "path components must not be empty");
        }
        if component.starts_with('.') {
            return reject(name, format!("component must not start with '.': {component:?}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["main", "alt", "v1.0", "feature/auth", "user/alice/fix-123"] {
            assert!(validate_branch_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn reject_empty_and_reserved() {
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("HEAD").is_err());
    }

    #[test]
    fn reject_forbidden_chars() {
        for name in ["has space", "a\tb", "a~b", "a^b", "a:b", "a?b", "a*b", "a[b", "a\\b"] {
            assert!(validate_branch_name(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn reject_sequences() {
        assert!(validate_branch_name("bad..name").is_err());
        assert!(validate_branch_name("a@{1}").is_err());
    }

    #[test]
    fn reject_bad_boundaries() {
        assert!(validate_branch_name(".hidden").is_err());
        assert!(validate_branch_name("trailing.").is_err());
        assert!(validate_branch_name("/leading").is_err());
        assert!(validate_branch_name("trailing/").is_err());
        assert!(validate_branch_name("a//b").is_err());
        assert!(validate_branch_name("a/.b").is_err());
        assert!(validate_branch_name("branch.lock").is_err());
    }

    #[test]
    fn error_carries_reason() {
        match validate_branch_name("a b") {
            Err(RefError::InvalidBranchName { name, reason }) => {
                assert_eq!(name, "a b");
                assert!(reason.contains("forbidden"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
