//! Numeric constants of the contact search.

use core::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{SolveError, SolveResult};

/// Constants governing convergence of [`ContactSolver`](crate::ContactSolver).
///
/// # Example
///
/// ```
/// use contact_ik::SolverConfig;
///
/// let config = SolverConfig::default().max_passes(5).max_error(1e-3);
/// assert_eq!(config.max_passes, 5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    /// Planar contact error (m) below which a solve has converged.
    pub max_error: f64,

    /// Initial magnitude of a line-search step (rad).
    pub step_size: f64,

    /// Factor applied to the step after a rejected attempt, in (0, 1).
    pub step_reduction: f64,

    /// Line-search attempts per joint per pass.
    pub max_line_search_attempts: usize,

    /// Full sweeps over the finger's joints before giving up.
    pub max_passes: usize,

    /// Finite-difference perturbation used to pick a direction (rad).
    pub probe_size: f64,

    /// Decimal places the world contact position is rounded to.
    pub position_decimals: u32,

    /// Decimal places the palm-to-world rotation is rounded to.
    pub rotation_decimals: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_error: 1e-4,
            step_size: PI / 75.,
            step_reduction: 0.25,
            max_line_search_attempts: 5,
            max_passes: 20,
            probe_size: 2e-4,
            position_decimals: 10,
            rotation_decimals: 5,
        }
    }
}

impl SolverConfig {
    #[must_use]
    pub const fn max_error(mut self, max_error: f64) -> Self {
        self.max_error = max_error;
        self
    }

    #[must_use]
    pub const fn step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    #[must_use]
    pub const fn step_reduction(mut self, factor: f64) -> Self {
        self.step_reduction = factor;
        self
    }

    #[must_use]
    pub const fn max_line_search_attempts(mut self, attempts: usize) -> Self {
        self.max_line_search_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes;
        self
    }

    #[must_use]
    pub const fn probe_size(mut self, probe_size: f64) -> Self {
        self.probe_size = probe_size;
        self
    }

    #[must_use]
    pub const fn position_decimals(mut self, decimals: u32) -> Self {
        self.position_decimals = decimals;
        self
    }

    #[must_use]
    pub const fn rotation_decimals(mut self, decimals: u32) -> Self {
        self.rotation_decimals = decimals;
        self
    }

    /// Reject constants the search cannot run with.
    pub fn validate(&self) -> SolveResult<()> {
        let positive = [
            ("max_error", self.max_error),
            ("step_size", self.step_size),
            ("probe_size", self.probe_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.) {
                return Err(SolveError::invalid_config(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if !(self.step_reduction > 0. && self.step_reduction < 1.) {
            return Err(SolveError::invalid_config(format!(
                "step_reduction must lie in (0, 1), got {}",
                self.step_reduction
            )));
        }
        if self.max_line_search_attempts == 0 {
            return Err(SolveError::invalid_config(
                "max_line_search_attempts must be at least 1",
            ));
        }
        // 10^k must stay representable when rounding
        for (name, decimals) in [
            ("position_decimals", self.position_decimals),
            ("rotation_decimals", self.rotation_decimals),
        ] {
            if decimals > 15 {
                return Err(SolveError::invalid_config(format!(
                    "{name} must be at most 15, got {decimals}"
                )));
            }
        }
        Ok(())
    }
}
