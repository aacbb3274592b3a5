use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::VmError;

/// Cooperative cancellation flag shared between a query and everything it
/// calls. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(VmError::Cancelled)` once cancelled.
    pub fn check(&self) -> Result<(), VmError> {
        if self.is_cancelled() {
            return Err(VmError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(VmError::Cancelled)));
    }
}
