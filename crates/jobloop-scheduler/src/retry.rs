use std::collections::BTreeSet;

use jobloop_core::ErrorKind;

use crate::error::TaskError;

/// Which task failures are worth a restart.
///
/// Errors whose kind is in the allow-list consume one unit of the job's
/// retry budget; anything else fails the job outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    recoverable: BTreeSet<ErrorKind>,
}

impl RetryPolicy {
    pub fn new(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        Self {
            recoverable: kinds.into_iter().collect(),
        }
    }

    /// Extend the allow-list with one more kind.
    pub fn allow(mut self, kind: ErrorKind) -> Self {
        self.recoverable.insert(kind);
        self
    }

    pub fn is_recoverable(&self, err: &TaskError) -> bool {
        self.recoverable.contains(&err.kind())
    }

    pub fn kinds(&self) -> impl Iterator<Item = ErrorKind> + '_ {
        self.recoverable.iter().copied()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(ErrorKind::DEFAULT_RECOVERABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_retries_transient_kinds_only() {
        let policy = RetryPolicy::default();
        assert!(policy.is_recoverable(&TaskError::Transport("reset".into())));
        assert!(policy.is_recoverable(&TaskError::Type("expected list".into())));
        assert!(!policy.is_recoverable(&TaskError::Value("negative".into())));
        assert!(!policy.is_recoverable(&TaskError::Other("boom".into())));
    }

    #[test]
    fn allow_widens_the_list() {
        let policy = RetryPolicy::default().allow(ErrorKind::Value);
        assert!(policy.is_recoverable(&TaskError::Value("negative".into())));
        assert_eq!(policy.kinds().count(), 6);
    }

    #[test]
    fn empty_policy_retries_nothing() {
        let policy = RetryPolicy::new(Vec::<ErrorKind>::new());
        assert!(!policy.is_recoverable(&TaskError::Transport("reset".into())));
    }
}
