//! Solving several fingers and holding the last good joint target.

use nalgebra::Vector4;
use tracing::{debug, info};

use super::{ContactSolver, GoalContactPose, SolveOutcome, SolverConfig};
use crate::{ForwardKinematics, HandDescription, SolveError, SolveResult};

/// Contact to place for one finger.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactTarget {
    pub finger: String,
    pub contact_in_distal: Vector4<f64>,
    pub goal: GoalContactPose,
}

impl ContactTarget {
    pub fn new(
        finger: impl Into<String>,
        contact_in_distal: Vector4<f64>,
        goal: impl Into<GoalContactPose>,
    ) -> Self {
        Self {
            finger: finger.into(),
            contact_in_distal,
            goal: goal.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactsOutcome {
    /// starting angles with every converged finger's joints replaced
    pub joint_angles: Vec<f64>,
    /// per-finger outcome, in target order
    pub fingers: Vec<(String, SolveOutcome)>,
}

impl ContactsOutcome {
    pub fn all_converged(&self) -> bool {
        self.fingers.iter().all(|(_, outcome)| outcome.is_converged())
    }

    pub fn outcome(&self, finger: &str) -> Option<&SolveOutcome> {
        self.fingers
            .iter()
            .find(|(name, _)| name == finger)
            .map(|(_, outcome)| outcome)
    }
}

/// Solve every target with its own solver, all starting from
/// `joint_angles`, and merge the fingers that converged.
///
/// Fingers are not coupled: each solve only sees its own copy of the
/// starting angles. A finger that does not converge keeps its starting
/// angles in the merged vector.
pub fn solve_contacts<K: ForwardKinematics + ?Sized>(
    hand: &HandDescription,
    kinematics: &K,
    targets: &[ContactTarget],
    joint_angles: &[f64],
    config: SolverConfig,
) -> SolveResult<ContactsOutcome> {
    let mut merged = joint_angles.to_vec();
    let mut fingers: Vec<(String, SolveOutcome)> = Vec::with_capacity(targets.len());
    for target in targets {
        if fingers.iter().any(|(name, _)| *name == target.finger) {
            return Err(SolveError::invalid_input(format!(
                "finger {} has more than one target",
                target.finger
            )));
        }
        let solver = ContactSolver::new(
            hand,
            kinematics,
            &target.finger,
            target.contact_in_distal,
            target.goal,
            joint_angles,
            config,
        )?;
        let outcome = solver.solve()?;
        if let Some(solved) = outcome.joint_angles() {
            for &joint in solver.joints() {
                merged[joint] = solved[joint];
            }
        }
        fingers.push((target.finger.clone(), outcome));
    }
    Ok(ContactsOutcome {
        joint_angles: merged,
        fingers,
    })
}

/// Joint target handed to the position controller.
///
/// Only converged solves move the target; after a failed solve the
/// previous target is held.
#[derive(Debug, Clone, PartialEq)]
pub struct JointTarget {
    target: Vec<f64>,
}

impl JointTarget {
    pub fn new(initial: Vec<f64>) -> Self {
        Self { target: initial }
    }

    pub fn get(&self) -> &[f64] {
        &self.target
    }

    /// Adopt `finger`'s joints from `outcome` if it converged. Returns
    /// whether the target moved.
    pub fn update(
        &mut self,
        hand: &HandDescription,
        finger: &str,
        outcome: &SolveOutcome,
    ) -> SolveResult<bool> {
        let joints = hand.finger_joints(finger)?;
        if self.target.len() != hand.dof {
            return Err(SolveError::JointCountMismatch {
                expected: hand.dof,
                actual: self.target.len(),
            });
        }
        let Some(solved) = outcome.joint_angles() else {
            info!(finger, "Solve did not converge, holding previous target");
            return Ok(false);
        };
        if solved.len() != hand.dof {
            return Err(SolveError::JointCountMismatch {
                expected: hand.dof,
                actual: solved.len(),
            });
        }
        for joint in joints {
            self.target[joint] = solved[joint];
        }
        debug!(finger, target = ?self.target, "Joint target updated");
        Ok(true)
    }

    /// Apply every finger of a multi-finger solve.
    pub fn update_all(&mut self, hand: &HandDescription, outcome: &ContactsOutcome) -> SolveResult<usize> {
        let mut moved = 0;
        for (finger, finger_outcome) in &outcome.fingers {
            if self.update(hand, finger, finger_outcome)? {
                moved += 1;
            }
        }
        Ok(moved)
    }
}
