use std::collections::BTreeMap;

use approx::abs_diff_eq;
use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{SolveError, SolveResult};

/// What the solver needs to know about a hand: which joints each finger
/// moves and where the palm is mounted in the world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HandDescription {
    /// finger name -> indices into the full joint-angle vector
    pub fingers: BTreeMap<String, Vec<usize>>,
    /// length of the full joint-angle vector
    pub dof: usize,
    /// palm origin in the world frame
    pub position: [f64; 3],
    /// palm orientation in the world frame, `[x, y, z, w]`
    pub orientation: [f64; 4],
}

impl HandDescription {
    /// A hand mounted at the world origin with identity orientation.
    pub fn new(dof: usize) -> Self {
        Self {
            fingers: BTreeMap::new(),
            dof,
            position: [0., 0., 0.],
            orientation: [0., 0., 0., 1.],
        }
    }

    pub fn with_finger(mut self, name: impl Into<String>, joint_indices: Vec<usize>) -> Self {
        self.fingers.insert(name.into(), joint_indices);
        self
    }

    pub fn with_mount(mut self, position: [f64; 3], orientation: [f64; 4]) -> Self {
        self.position = position;
        self.orientation = orientation;
        self
    }

    /// Joint indices of `finger`, sorted ascending and deduplicated.
    pub fn finger_joints(&self, finger: &str) -> SolveResult<Vec<usize>> {
        let indices = self
            .fingers
            .get(finger)
            .ok_or_else(|| SolveError::UnknownFinger(finger.to_owned()))?;
        let mut indices = indices.clone();
        indices.sort_unstable();
        indices.dedup();
        if let Some(&index) = indices.iter().find(|&&i| i >= self.dof) {
            return Err(SolveError::JointIndexOutOfRange {
                finger: finger.to_owned(),
                index,
                dof: self.dof,
            });
        }
        Ok(indices)
    }

    pub fn validate(&self) -> SolveResult<()> {
        if self.position.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::invalid_input(format!(
                "mounting position {:?} is not finite",
                self.position
            )));
        }
        let [x, y, z, w] = self.orientation;
        let norm = (x * x + y * y + z * z + w * w).sqrt();
        if !norm.is_finite() || abs_diff_eq!(norm, 0.0, epsilon = 1e-12) {
            return Err(SolveError::invalid_input(format!(
                "mounting orientation {:?} is not a usable quaternion",
                self.orientation
            )));
        }
        for finger in self.fingers.keys() {
            self.finger_joints(finger)?;
        }
        Ok(())
    }

    /// Palm-to-world transform. The rotation entries are rounded to
    /// `rotation_decimals` places so that near-zero terms of the
    /// quaternion conversion become exact zeros.
    pub fn palm_to_world(&self, rotation_decimals: u32) -> Matrix4<f64> {
        let [x, y, z, w] = self.orientation;
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z))
            .to_rotation_matrix()
            .into_inner()
            .map(|v| round_to(v, rotation_decimals));
        let mut transform = Matrix4::identity();
        transform
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation);
        transform
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&Vector3::from(self.position));
        transform
    }
}

/// Round half to even at `decimals` places.
pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    let rounded = (value * scale).round_ties_even() / scale;
    // -0.0 and 0.0 must compare and print the same
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use core::f64::consts::FRAC_PI_2;
    use nalgebra::Vector4;

    fn two_finger() -> HandDescription {
        HandDescription::new(4)
            .with_finger("finger0", vec![1, 0])
            .with_finger("finger1", vec![2, 3])
    }

    #[test]
    fn test_finger_joints_sorted() {
        let hand = two_finger();
        assert_eq!(hand.finger_joints("finger0").unwrap(), vec![0, 1]);
        assert_eq!(hand.finger_joints("finger1").unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_unknown_finger() {
        let err = two_finger().finger_joints("thumb").unwrap_err();
        assert!(matches!(err, SolveError::UnknownFinger(name) if name == "thumb"));
    }

    #[test]
    fn test_index_out_of_range() {
        let hand = two_finger().with_finger("finger2", vec![4]);
        let err = hand.validate().unwrap_err();
        assert!(matches!(
            err,
            SolveError::JointIndexOutOfRange { index: 4, dof: 4, .. }
        ));
    }

    #[test]
    fn test_zero_quaternion_rejected() {
        let hand = two_finger().with_mount([0., 0., 0.], [0., 0., 0., 0.]);
        assert!(matches!(hand.validate(), Err(SolveError::InvalidInput(_))));
    }

    #[test]
    fn test_palm_to_world_identity_mount() {
        let hand = two_finger().with_mount([0.1, 0.2, 0.04], [0., 0., 0., 1.]);
        let t = hand.palm_to_world(5);
        let p = t * Vector4::new(0., 0., 0., 1.);
        assert_relative_eq!(p, Vector4::new(0.1, 0.2, 0.04, 1.));
        assert_eq!(t.fixed_view::<3, 3>(0, 0).into_owned(), nalgebra::Matrix3::identity());
    }

    #[test]
    fn test_palm_to_world_rotation_is_rounded() {
        // quarter turn about z
        let half = (FRAC_PI_2 / 2.).sin();
        let hand = two_finger().with_mount([0., 0., 0.], [0., 0., half, (FRAC_PI_2 / 2.).cos()]);
        let t = hand.palm_to_world(5);
        assert_eq!(t[(0, 0)], 0.0);
        assert_eq!(t[(1, 1)], 0.0);
        assert_eq!(t[(0, 1)], -1.0);
        assert_eq!(t[(1, 0)], 1.0);
        let p = t * Vector4::new(1., 0., 0., 1.);
        assert_relative_eq!(p, Vector4::new(0., 1., 0., 1.));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.234_567_891_26, 10), 1.234_567_891_3);
        assert_eq!(round_to(-1e-12, 5), 0.0);
        assert!(round_to(-1e-12, 5).is_sign_positive());
        assert_eq!(round_to(0.125, 2), 0.12);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json() {
        let json = r#"{
            "fingers": {"finger0": [0, 1], "finger1": [2, 3]},
            "dof": 4,
            "position": [0.0, 0.0, 0.04],
            "orientation": [0.0, 0.0, 0.0, 1.0]
        }"#;
        let hand: HandDescription = serde_json::from_str(json).unwrap();
        assert_eq!(hand.dof, 4);
        assert_eq!(hand.finger_joints("finger1").unwrap(), vec![2, 3]);
        hand.validate().unwrap();
    }
}
