//! Shutdown flag shared between the owning context and the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Predicate handed to the I/O backend; returns `true` once blocking calls
/// should abort.
pub type InterruptPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Cloneable one-way cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Cannot be undone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Interrupt predicate that observes this token
    pub fn interrupt_predicate(&self) -> InterruptPredicate {
        let token = self.clone();
        Arc::new(move || token.is_cancelled())
    }
}
