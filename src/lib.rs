//! # contact-ik places a finger's contact point on a planar goal.
//! contact-ik = contact + inverse kinematics
//!
//! Only forward kinematics is needed: [`ContactSolver`] searches the
//! finger's joints one at a time with a finite-difference direction probe
//! and a backtracking line search, and gives up after a fixed number of
//! passes.

// #![deny(missing_docs)]
#![deny(unsafe_code)]

mod error;
mod hand;
mod kinematics;
mod multi_body;
mod solver;

pub use error::{KinematicsError, SolveError, SolveResult};
pub use hand::HandDescription;
pub use kinematics::{FingerTransforms, ForwardKinematics, Memoized};
pub use multi_body::{ChainJoint, FingerChain, HandModel, JointMotion, Link, MultiBody};
pub use solver::{
    backtracking_line_search, homogeneous, solve_contacts, AcceptedStep, CentralDifference,
    ContactFunctional, ContactSolver, ContactTarget, ContactsOutcome, Direction, DirectionProbe,
    ForwardDifference, GoalContactPose, JointTarget, LineSearchOutcome, ProbeOutcome, SolveOutcome,
    SolveReport, SolverConfig,
};
