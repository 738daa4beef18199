//! Lifetime token for a view that consumes query results.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Marks whether the consumer of a query is still interested in its result.
///
/// Clones share the flag. Once closed, [`ViewScope::run`] discards whatever
/// its future produces.
#[derive(Debug, Clone)]
pub struct ViewScope {
    open: Arc<AtomicBool>,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewScope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// The view went away.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Await `fut`; yield its output only if the scope is still open.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        let output = fut.await;
        if self.is_open() {
            Some(output)
        } else {
            tracing::debug!("Discarding result for closed view");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_scope_yields_result() {
        let scope = ViewScope::new();
        assert_eq!(scope.run(async { 5 }).await, Some(5));
    }

    #[tokio::test]
    async fn test_closed_during_flight_discards_result() {
        let scope = ViewScope::new();
        let closer = scope.clone();
        let result = scope
            .run(async move {
                closer.close();
                "late"
            })
            .await;
        assert_eq!(result, None);
        assert!(!scope.is_open());
    }
}
