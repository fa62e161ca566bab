//! Non-retryable status code sets for agent requests.

use std::collections::BTreeSet;

/// Immutable set of HTTP status codes that stop the retry loop immediately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    non_retryable: BTreeSet<u16>,
}

impl RetryPolicy {
    /// Build a policy from an arbitrary set of codes.
    pub fn new(codes: impl IntoIterator<Item = u16>) -> Self {
        Self { non_retryable: codes.into_iter().collect() }
    }

    /// Policy for create-or-get: authentication failures are final.
    pub fn create_db() -> Self {
        Self::new([401, 403])
    }

    /// Policy for get-connection: the whole 400..=404 range is final.
    pub fn get_connection() -> Self {
        Self::new(400..=404)
    }

    /// Policy that retries every status.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether `status` must stop the retry loop.
    pub fn is_non_retryable(&self, status: u16) -> bool {
        self.non_retryable.contains(&status)
    }

    /// Codes in ascending order.
    pub fn codes(&self) -> impl Iterator<Item = u16> + '_ {
        self.non_retryable.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_db_policy() {
        let policy = RetryPolicy::create_db();
        assert!(policy.is_non_retryable(401));
        assert!(policy.is_non_retryable(403));
        assert!(!policy.is_non_retryable(404));
        assert!(!policy.is_non_retryable(202));
        assert!(!policy.is_non_retryable(500));
    }

    #[test]
    fn test_get_connection_policy() {
        let policy = RetryPolicy::get_connection();
        for code in 400..=404 {
            assert!(policy.is_non_retryable(code), "{} should be non-retryable", code);
        }
        assert!(!policy.is_non_retryable(405));
        assert!(!policy.is_non_retryable(408));
    }

    #[test]
    fn test_empty_policy() {
        let policy = RetryPolicy::empty();
        assert!(!policy.is_non_retryable(401));
        assert_eq!(policy.codes().count(), 0);
    }
}
