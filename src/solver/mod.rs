//! Contact solver: moves one finger's joints until a contact point fixed
//! on its distal link reaches a planar goal.
//!
//! The search is coordinate-wise. Each pass visits the finger's joints in
//! ascending index order; a [`DirectionProbe`] picks the direction for a
//! joint and [`backtracking_line_search`] looks for a step along it that
//! lowers the error. Passes repeat until the error drops below
//! [`SolverConfig::max_error`] or [`SolverConfig::max_passes`] is used up.

mod config;
mod functional;
mod hold;
mod line_search;
mod probe;

use std::cell::Cell;

use approx::abs_diff_eq;
use nalgebra::{Matrix4, Vector4};
use tracing::{debug, trace, warn};

pub use config::SolverConfig;
pub use functional::{homogeneous, ContactFunctional, GoalContactPose};
pub use hold::{solve_contacts, ContactTarget, ContactsOutcome, JointTarget};
pub use line_search::{backtracking_line_search, LineSearchOutcome};
pub use probe::{CentralDifference, Direction, DirectionProbe, ForwardDifference, ProbeOutcome};

use crate::{ForwardKinematics, HandDescription, SolveError, SolveResult};

/// Diagnostics of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    /// full passes completed before the solve ended
    pub passes: usize,
    /// error at the returned angles, or at the abandoned working angles
    pub final_error: f64,
    /// calls made to the kinematics oracle
    pub oracle_calls: usize,
    /// every accepted line-search step, in order
    pub accepted_steps: Vec<AcceptedStep>,
}

/// A line-search step that lowered the error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptedStep {
    pub pass: usize,
    pub joint: usize,
    /// error after the step
    pub error: f64,
}

/// Result of [`ContactSolver::solve`].
///
/// Not converging is a normal outcome; callers decide what to do with it,
/// typically keep their previous target.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Converged {
        joint_angles: Vec<f64>,
        report: SolveReport,
    },
    NotConverged {
        report: SolveReport,
    },
}

impl SolveOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, SolveOutcome::Converged { .. })
    }

    pub fn joint_angles(&self) -> Option<&[f64]> {
        match self {
            SolveOutcome::Converged { joint_angles, .. } => Some(joint_angles),
            SolveOutcome::NotConverged { .. } => None,
        }
    }

    pub fn into_joint_angles(self) -> Option<Vec<f64>> {
        match self {
            SolveOutcome::Converged { joint_angles, .. } => Some(joint_angles),
            SolveOutcome::NotConverged { .. } => None,
        }
    }

    pub fn report(&self) -> &SolveReport {
        match self {
            SolveOutcome::Converged { report, .. } | SolveOutcome::NotConverged { report } => {
                report
            }
        }
    }
}

/// Solver for one (finger, contact, goal) triple.
///
/// The solver keeps its own copy of the starting angles; [`solve`]
/// never touches the caller's vector and can be called repeatedly.
///
/// [`solve`]: ContactSolver::solve
#[derive(Debug, Clone)]
pub struct ContactSolver<'a, K: ?Sized, P = ForwardDifference> {
    kinematics: &'a K,
    functional: ContactFunctional,
    joints: Vec<usize>,
    starting_joint_angles: Vec<f64>,
    config: SolverConfig,
    probe: P,
}

impl<'a, K: ForwardKinematics + ?Sized> ContactSolver<'a, K> {
    /// Build a solver for `finger` of `hand`.
    ///
    /// `contact_in_distal` is a homogeneous point in the distal link frame
    /// and `goal` the world position the contact should reach; only its
    /// x and y are used.
    pub fn new(
        hand: &HandDescription,
        kinematics: &'a K,
        finger: &str,
        contact_in_distal: Vector4<f64>,
        goal: impl Into<GoalContactPose>,
        joint_angles: &[f64],
        config: SolverConfig,
    ) -> SolveResult<Self> {
        let goal = goal.into();
        config.validate()?;
        hand.validate()?;
        let joints = hand.finger_joints(finger)?;
        if joint_angles.len() != hand.dof {
            return Err(SolveError::JointCountMismatch {
                expected: hand.dof,
                actual: joint_angles.len(),
            });
        }
        if let Some(index) = joint_angles.iter().position(|q| !q.is_finite()) {
            return Err(SolveError::invalid_input(format!(
                "joint angle {index} is not finite"
            )));
        }
        if contact_in_distal.iter().any(|v| !v.is_finite())
            || !abs_diff_eq!(contact_in_distal.w, 1.0, epsilon = 1e-12)
        {
            return Err(SolveError::invalid_input(format!(
                "contact point {:?} is not a homogeneous point",
                contact_in_distal.as_slice()
            )));
        }
        if !(goal.x.is_finite() && goal.y.is_finite()) {
            return Err(SolveError::invalid_input(format!("goal {goal:?} is not finite")));
        }

        let palm_to_world = hand.palm_to_world(config.rotation_decimals);
        debug!(
            finger,
            contact_in_distal = ?contact_in_distal.as_slice(),
            goal = ?goal,
            "Contact solver ready, palm to world:{palm_to_world}"
        );

        Ok(Self {
            kinematics,
            functional: ContactFunctional {
                finger: finger.to_owned(),
                palm_to_world,
                contact_in_distal,
                goal,
                position_decimals: config.position_decimals,
            },
            joints,
            starting_joint_angles: joint_angles.to_vec(),
            config,
            probe: ForwardDifference::new(config.probe_size),
        })
    }
}

impl<'a, K: ForwardKinematics + ?Sized, P: DirectionProbe> ContactSolver<'a, K, P> {
    /// Swap the direction probe.
    pub fn with_probe<Q: DirectionProbe>(self, probe: Q) -> ContactSolver<'a, K, Q> {
        ContactSolver {
            kinematics: self.kinematics,
            functional: self.functional,
            joints: self.joints,
            starting_joint_angles: self.starting_joint_angles,
            config: self.config,
            probe,
        }
    }

    pub fn finger(&self) -> &str {
        &self.functional.finger
    }

    /// Active joint indices, in the order they are visited.
    pub fn joints(&self) -> &[usize] {
        &self.joints
    }

    pub fn starting_joint_angles(&self) -> &[f64] {
        &self.starting_joint_angles
    }

    pub fn palm_to_world(&self) -> &Matrix4<f64> {
        &self.functional.palm_to_world
    }

    pub fn goal(&self) -> GoalContactPose {
        self.functional.goal
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn functional(&self) -> &ContactFunctional {
        &self.functional
    }

    /// Upper bound on oracle calls made by one [`solve`](Self::solve).
    pub fn max_oracle_calls(&self) -> usize {
        let per_joint = self.probe.evaluations() + self.config.max_line_search_attempts;
        self.config.max_passes + 1 + self.config.max_passes * self.joints.len() * per_joint
    }

    /// Planar distance between the contact and the goal for `joint_angles`.
    pub fn delta_calculator(&self, joint_angles: &[f64]) -> SolveResult<f64> {
        self.functional.delta_calculator(self.kinematics, joint_angles)
    }

    /// Run the search from the starting angles.
    ///
    /// The error a step must beat carries over from pass to pass, so the
    /// accepted errors never increase. A retained probe offset can leave
    /// the working angles slightly worse than that error; on convergence
    /// the angles that reached it are returned.
    ///
    /// Returns [`SolveOutcome::NotConverged`] when the pass budget runs
    /// out, and an error only if the oracle fails.
    pub fn solve(&self) -> SolveResult<SolveOutcome> {
        let calls = Cell::new(0);
        let evaluate = |angles: &[f64]| -> SolveResult<f64> {
            calls.set(calls.get() + 1);
            self.delta_calculator(angles)
        };

        let mut angles = self.starting_joint_angles.clone();
        // lowest error seen so far and the angles that produced it
        let mut baseline = f64::INFINITY;
        let mut best = angles.clone();
        let mut accepted_steps = vec![];
        let mut passes = 0;
        loop {
            let error = evaluate(&angles)?;
            if error < baseline {
                baseline = error;
                best.copy_from_slice(&angles);
            }
            if baseline < self.config.max_error {
                debug!(
                    finger = %self.functional.finger,
                    passes,
                    error = baseline,
                    "Contact solver converged"
                );
                let report = SolveReport {
                    passes,
                    final_error: baseline,
                    oracle_calls: calls.get(),
                    accepted_steps,
                };
                return Ok(SolveOutcome::Converged {
                    joint_angles: best,
                    report,
                });
            }
            if passes >= self.config.max_passes {
                warn!(
                    finger = %self.functional.finger,
                    passes,
                    error,
                    best_error = baseline,
                    "Contact solver exhausted its pass budget"
                );
                let report = SolveReport {
                    passes,
                    final_error: error,
                    oracle_calls: calls.get(),
                    accepted_steps,
                };
                return Ok(SolveOutcome::NotConverged { report });
            }

            for &joint in &self.joints {
                if let Some(error) = self.step_joint(&evaluate, &mut angles, joint, baseline)? {
                    baseline = error;
                    best.copy_from_slice(&angles);
                    accepted_steps.push(AcceptedStep {
                        pass: passes,
                        joint,
                        error,
                    });
                }
            }
            passes += 1;
            debug!(pass = passes, error = baseline, "Finished contact search pass");
        }
    }

    /// Probe and line-search a single joint. Returns the new error when a
    /// step was accepted.
    fn step_joint(
        &self,
        evaluate: &dyn Fn(&[f64]) -> SolveResult<f64>,
        angles: &mut [f64],
        joint: usize,
        baseline: f64,
    ) -> SolveResult<Option<f64>> {
        let start = angles[joint];
        let probe = self.probe.probe(baseline, &mut |offset| {
            angles[joint] = start + offset;
            evaluate(angles)
        })?;

        let probed = start + probe.residual;
        let step = probe.direction.signed(self.config.step_size);
        let search = backtracking_line_search(
            baseline,
            step,
            self.config.max_line_search_attempts,
            self.config.step_reduction,
            &mut |step| {
                angles[joint] = probed + step;
                evaluate(angles)
            },
        )?;

        angles[joint] = match search.accepted_step {
            Some(step) => probed + step,
            None => probed,
        };
        trace!(
            joint,
            direction = ?probe.direction,
            step = ?search.accepted_step,
            attempts = search.attempts,
            error = search.error,
            "Joint search"
        );
        Ok(search.accepted_step.map(|_| search.error))
    }
}
