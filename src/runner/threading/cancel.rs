use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CancelReason;

/// Cooperative cancellation shared between a run and whoever may stop it.
/// Checked by the evaluator at every statement boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Same cancellation flag, expiring at `deadline` (or earlier if one
    /// is already set).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        CancelToken {
            flag: self.flag.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn check(&self) -> Result<(), CancelReason> {
        if self.is_cancelled() {
            return Err(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CancelReason::TimedOut),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.with_timeout(Duration::from_secs(60));
        assert_eq!(other.check(), Ok(()));
        token.cancel();
        assert_eq!(other.check(), Err(CancelReason::Cancelled));
    }

    #[test]
    fn expired_deadline_times_out() {
        let token = CancelToken::new().with_deadline(Instant::now());
        assert_eq!(token.check(), Err(CancelReason::TimedOut));
    }

    #[test]
    fn earlier_deadline_wins() {
        let soon = Instant::now();
        let token = CancelToken::new()
            .with_deadline(soon)
            .with_timeout(Duration::from_secs(60));
        assert_eq!(token.check(), Err(CancelReason::TimedOut));
    }
}
