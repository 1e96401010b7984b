//! Direction probes: decide which way a single joint should move.
//!
//! A probe only sees the error as a function of an offset added to the
//! joint's current angle, so it works with nothing more than the error
//! functional. Probes are plain values; pick one with
//! [`ContactSolver::with_probe`](crate::ContactSolver::with_probe).

use crate::SolveResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    /// `magnitude` with this direction's sign.
    pub fn signed(self, magnitude: f64) -> f64 {
        match self {
            Direction::Increase => magnitude.abs(),
            Direction::Decrease => -magnitude.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub direction: Direction,
    /// offset left on the joint when the line search starts
    pub residual: f64,
}

pub trait DirectionProbe {
    /// Pick a direction for one joint.
    ///
    /// `baseline` is the error the line search will have to beat and
    /// `error_at` evaluates the error with the joint moved by an offset
    /// from its current angle.
    fn probe(
        &self,
        baseline: f64,
        error_at: &mut dyn FnMut(f64) -> SolveResult<f64>,
    ) -> SolveResult<ProbeOutcome>;

    /// Oracle calls made by one `probe`.
    fn evaluations(&self) -> usize;
}

/// One-sided difference: step forward by `size`, increase the angle if
/// that beat the baseline.
///
/// By default the perturbation stays on the joint and the line search
/// starts from the probed angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForwardDifference {
    pub size: f64,
    pub retain: bool,
}

impl ForwardDifference {
    pub fn new(size: f64) -> Self {
        Self { size, retain: true }
    }

    /// Probe that puts the joint back before the line search.
    pub fn restoring(size: f64) -> Self {
        Self {
            size,
            retain: false,
        }
    }
}

impl DirectionProbe for ForwardDifference {
    fn probe(
        &self,
        baseline: f64,
        error_at: &mut dyn FnMut(f64) -> SolveResult<f64>,
    ) -> SolveResult<ProbeOutcome> {
        let probed = error_at(self.size)?;
        let direction = if probed < baseline {
            Direction::Increase
        } else {
            Direction::Decrease
        };
        Ok(ProbeOutcome {
            direction,
            residual: if self.retain { self.size } else { 0. },
        })
    }

    fn evaluations(&self) -> usize {
        1
    }
}

/// Two-sided difference: compare the error `size` above and below the
/// current angle. Always restores the joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentralDifference {
    pub size: f64,
}

impl CentralDifference {
    pub fn new(size: f64) -> Self {
        Self { size }
    }
}

impl DirectionProbe for CentralDifference {
    fn probe(
        &self,
        _baseline: f64,
        error_at: &mut dyn FnMut(f64) -> SolveResult<f64>,
    ) -> SolveResult<ProbeOutcome> {
        let above = error_at(self.size)?;
        let below = error_at(-self.size)?;
        let direction = if above < below {
            Direction::Increase
        } else {
            Direction::Decrease
        };
        Ok(ProbeOutcome {
            direction,
            residual: 0.,
        })
    }

    fn evaluations(&self) -> usize {
        2
    }
}
