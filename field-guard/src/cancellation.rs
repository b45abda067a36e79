//! Cooperative cancellation shared between the caller and running units.
//!
//! ```rust
//! use field_guard::cancellation::CancellationToken;
//!
//! let token = CancellationToken::new();
//! let unit = token.child();
//! token.cancel();
//! assert!(unit.is_cancelled());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, Result};

/// A cloneable cancellation flag.
///
/// Clones share one flag. A [`child`](Self::child) token has its own flag but also
/// observes every ancestor, so cancelling a child stops one unit while cancelling
/// the root stops all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    parent: Option<Box<CancellationToken>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that is cancelled when either it or `self` is cancelled.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// Returns `Err(Cancelled)` once the token has been cancelled.
    ///
    /// Workers call this between chunks of work so they stop before producing
    /// partial state.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled { completed_units: 0 })
        } else {
            Ok(())
        }
    }
}

/// How many loop iterations a worker runs between cancellation checks.
pub(crate) const CHECK_INTERVAL: usize = 4096;
