use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Tolerances and limits for one solver instance.
#[derive(Clone, Debug, PartialEq)]
pub struct PivotConfig {
    /// Zero test for pivot elements and reduced costs.
    pub eps1: f64,
    /// Zero test for basic values and ratio comparisons.
    pub eps2: f64,
    /// Number of product-form updates after which a floating-point basis is refactorised.
    pub refactor_interval: usize,
    pub max_pivots: Option<usize>,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            eps1: 1e-10,
            eps2: 1e-9,
            refactor_interval: 32,
            max_pivots: None,
        }
    }
}

impl PivotConfig {
    pub fn with_max_pivots(mut self, max_pivots: usize) -> Self {
        self.max_pivots = Some(max_pivots);
        self
    }

    pub fn pivot_limit_reached(&self, pivots: usize) -> bool {
        self.max_pivots.is_some_and(|max| pivots >= max)
    }
}

/**
 * Cooperative cancellation handle. Clones share the same flag; solvers poll it between pivots.
 */
#[derive(Clone, Debug, Default)]
pub struct Status {
    cancelled: Arc<AtomicBool>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
