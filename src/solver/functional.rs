//! Planar contact error of one finger.

use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

use crate::hand::round_to;
use crate::{ForwardKinematics, KinematicsError, SolveError, SolveResult};

/// Target planar position of the contact point. Height is ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalContactPose {
    pub x: f64,
    pub y: f64,
}

impl GoalContactPose {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for GoalContactPose {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 3]> for GoalContactPose {
    fn from([x, y, _]: [f64; 3]) -> Self {
        Self { x, y }
    }
}

impl From<Vector3<f64>> for GoalContactPose {
    fn from(v: Vector3<f64>) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// Homogeneous point `[x, y, z, 1]`.
pub fn homogeneous(point: [f64; 3]) -> Vector4<f64> {
    Vector4::new(point[0], point[1], point[2], 1.)
}

/// Maps a contact fixed in a finger's distal frame to the world and
/// measures its planar distance to the goal.
#[derive(Debug, Clone)]
pub struct ContactFunctional {
    pub(crate) finger: String,
    pub(crate) palm_to_world: Matrix4<f64>,
    pub(crate) contact_in_distal: Vector4<f64>,
    pub(crate) goal: GoalContactPose,
    pub(crate) position_decimals: u32,
}

impl ContactFunctional {
    /// World position of the contact, rounded to `position_decimals`.
    pub fn contact_in_world<K: ForwardKinematics + ?Sized>(
        &self,
        kinematics: &K,
        joint_angles: &[f64],
    ) -> SolveResult<Vector4<f64>> {
        let transforms = kinematics.forward_kinematics(joint_angles)?;
        let transform = transforms
            .get(&self.finger)
            .ok_or_else(|| SolveError::from(KinematicsError::MissingFinger(self.finger.clone())))?;
        Ok((self.palm_to_world * transform * self.contact_in_distal)
            .map(|v| round_to(v, self.position_decimals)))
    }

    /// Planar distance between the contact and the goal.
    pub fn delta_calculator<K: ForwardKinematics + ?Sized>(
        &self,
        kinematics: &K,
        joint_angles: &[f64],
    ) -> SolveResult<f64> {
        let contact = self.contact_in_world(kinematics, joint_angles)?;
        Ok(Vector2::new(contact.x - self.goal.x, contact.y - self.goal.y).norm())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::FingerTransforms;
    use approx::assert_relative_eq;

    fn functional(goal: GoalContactPose) -> ContactFunctional {
        ContactFunctional {
            finger: "finger0".into(),
            palm_to_world: Matrix4::new_translation(&Vector3::new(0., 0., 0.04)),
            contact_in_distal: homogeneous([0.01, 0., 0.]),
            goal,
            position_decimals: 10,
        }
    }

    fn slider(q: &[f64]) -> Result<FingerTransforms, KinematicsError> {
        let mut out = FingerTransforms::new();
        out.insert(
            "finger0".into(),
            Matrix4::new_translation(&Vector3::new(q[0], q[1], 0.)),
        );
        Ok(out)
    }

    #[test]
    fn test_goal_conversions() {
        assert_eq!(GoalContactPose::from([1., 2.]), GoalContactPose::new(1., 2.));
        assert_eq!(GoalContactPose::from([1., 2., 9.]), GoalContactPose::new(1., 2.));
        assert_eq!(
            GoalContactPose::from(Vector3::new(1., 2., 9.)),
            GoalContactPose::new(1., 2.)
        );
    }

    #[test]
    fn test_contact_in_world() {
        let f = functional(GoalContactPose::new(0., 0.));
        let p = f.contact_in_world(&slider, &[0.1, 0.2]).unwrap();
        assert_relative_eq!(p, Vector4::new(0.11, 0.2, 0.04, 1.));
    }

    #[test]
    fn test_delta_is_planar_distance() {
        let f = functional(GoalContactPose::new(0.01, 0.));
        let delta = f.delta_calculator(&slider, &[0.03, 0.04]).unwrap();
        assert_relative_eq!(delta, 0.05, epsilon = 1e-12);
        // height of the contact does not matter
        let f = ContactFunctional {
            contact_in_distal: homogeneous([0.01, 0., 5.]),
            ..f
        };
        assert_relative_eq!(
            f.delta_calculator(&slider, &[0.03, 0.04]).unwrap(),
            0.05,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_delta_zero_at_goal() {
        let f = functional(GoalContactPose::new(0.11, 0.2));
        assert_eq!(f.delta_calculator(&slider, &[0.1, 0.2]).unwrap(), 0.);
    }

    #[test]
    fn test_rounding_removes_noise() {
        let f = functional(GoalContactPose::new(0.11, 0.2));
        let delta = f.delta_calculator(&slider, &[0.1 + 1e-13, 0.2]).unwrap();
        assert_eq!(delta, 0.);
    }

    #[test]
    fn test_missing_finger() {
        let f = ContactFunctional {
            finger: "finger7".into(),
            ..functional(GoalContactPose::new(0., 0.))
        };
        let err = f.delta_calculator(&slider, &[0., 0.]).unwrap_err();
        assert!(matches!(
            err,
            SolveError::Kinematics(KinematicsError::MissingFinger(name)) if name == "finger7"
        ));
    }
}
