//! Constant-time comparison of the webhook shared secret.
//!
//! A naive `==` on the header value would leak timing information about
//! how many leading bytes matched; `subtle::ConstantTimeEq` makes the
//! comparison take the same time whether the secret matches or not.

use subtle::ConstantTimeEq;

#[must_use]
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_secrets_match() {
        assert!(secrets_match("topsecret", "topsecret"));
    }

    #[test]
    fn different_secrets_do_not_match() {
        assert!(!secrets_match("topsecret", "wrong"));
    }

    #[test]
    fn different_lengths_do_not_match() {
        assert!(!secrets_match("short", "a-much-longer-secret"));
    }
}
