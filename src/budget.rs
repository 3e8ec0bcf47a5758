//! Iteration budgets.
//!
//! Picking an iteration count from host capability is kept behind a trait
//! so engines can be given a fixed count in tests and a scaled one in
//! production.

use std::thread;

use crate::config::{MAX_CAPACITY, MIN_ITERATIONS};

/// Chooses the PBKDF2 iteration count when the caller does not.
pub trait IterationBudget: Send + Sync {
    /// Must return a value in `1..MAX_CAPACITY`.
    fn iterations(&self) -> u32;
}

/// Always returns the same count.
#[derive(Debug, Clone, Copy)]
pub struct FixedBudget(pub u32);

impl IterationBudget for FixedBudget {
    fn iterations(&self) -> u32 {
        self.0
    }
}

/// Scales [`MIN_ITERATIONS`] with the number of available cores.
#[derive(Debug, Clone, Copy)]
pub struct CoreScaledBudget {
    cores: usize,
}

impl CoreScaledBudget {
    pub fn new(cores: usize) -> Self {
        Self { cores: cores.max(1) }
    }

    pub fn detect() -> Self {
        Self::new(thread::available_parallelism().map_or(1, usize::from))
    }
}

impl Default for CoreScaledBudget {
    fn default() -> Self {
        Self::detect()
    }
}

impl IterationBudget for CoreScaledBudget {
    fn iterations(&self) -> u32 {
        let ceiling = MAX_CAPACITY - 1;
        let scaled = u64::from(MIN_ITERATIONS).saturating_mul(self.cores as u64).min(ceiling);
        u32::try_from(scaled).unwrap_or(MIN_ITERATIONS)
    }
}
