//! Error types for contact solving and forward kinematics.

use thiserror::Error;

/// Result type alias for solver operations.
pub type SolveResult<T> = Result<T, SolveError>;

/// Errors raised by a kinematics oracle.
///
/// The solver never inspects these; it wraps them unchanged in
/// [`SolveError::Kinematics`] and aborts the solve.
#[derive(Debug, Error)]
pub enum KinematicsError {
    /// The URDF could not be read or parsed.
    #[error("urdf error: {0}")]
    Urdf(#[from] urdf_rs::UrdfError),

    /// A link name does not exist in the robot description.
    #[error("unknown link: {0}")]
    UnknownLink(String),

    /// The distal link is not reachable from the palm link.
    #[error("link {distal} is not a descendant of {palm}")]
    Disconnected {
        /// Chain start.
        palm: String,
        /// Chain end.
        distal: String,
    },

    /// A joint type the chain evaluator cannot move.
    #[error("unsupported joint type {joint_type} on joint {joint}")]
    UnsupportedJoint {
        /// Joint name.
        joint: String,
        /// Debug rendering of the URDF joint type.
        joint_type: String,
    },

    /// The oracle output has no transform for the requested finger.
    #[error("no transform for finger {0}")]
    MissingFinger(String),

    /// The joint-angle vector does not cover every degree of freedom.
    #[error("expected {expected} joint angles, got {actual}")]
    JointCount {
        /// Degrees of freedom of the model.
        expected: usize,
        /// Length of the vector passed in.
        actual: usize,
    },

    /// Any other oracle failure, e.g. from a user supplied closure.
    #[error("{0}")]
    Other(String),
}

impl KinematicsError {
    /// Create an oracle failure with a free-form message.
    #[must_use]
    pub fn other(details: impl Into<String>) -> Self {
        Self::Other(details.into())
    }
}

/// Errors that abort a contact solve.
///
/// Running out of passes is not an error; see [`crate::SolveOutcome`].
#[derive(Debug, Error)]
pub enum SolveError {
    /// The finger is not part of the hand description.
    #[error("unknown finger: {0}")]
    UnknownFinger(String),

    /// The joint-angle vector length differs from the hand's DOF count.
    #[error("joint vector has {actual} entries, hand has {expected} degrees of freedom")]
    JointCountMismatch {
        /// Hand DOF count.
        expected: usize,
        /// Length of the vector passed in.
        actual: usize,
    },

    /// A finger references a joint index outside the hand.
    #[error("finger {finger} references joint {index}, hand has {dof} degrees of freedom")]
    JointIndexOutOfRange {
        /// Finger name.
        finger: String,
        /// Offending index.
        index: usize,
        /// Hand DOF count.
        dof: usize,
    },

    /// Malformed contact point, goal, angles or mounting pose.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A solver constant is out of range.
    #[error("invalid solver config: {0}")]
    InvalidConfig(String),

    /// The kinematics oracle failed.
    #[error("forward kinematics failed: {0}")]
    Kinematics(#[from] KinematicsError),
}

impl SolveError {
    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(details: impl Into<String>) -> Self {
        Self::InvalidInput(details.into())
    }

    /// Create an invalid config error.
    #[must_use]
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig(details.into())
    }

    /// True for caller mistakes caught before any search ran.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::Kinematics(_))
    }
}
