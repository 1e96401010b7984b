use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use nalgebra::{Isometry3, Matrix4, Translation3, Unit, UnitQuaternion, Vector3};
use tracing::debug;
use urdf_rs::{read_file, read_from_string};

use crate::{FingerTransforms, ForwardKinematics, HandDescription, KinematicsError};

#[derive(Debug, Clone)]
pub struct Link {
    /// pose of this link's joint frame in the parent link frame
    pub local_zero_pose: Isometry3<f64>,
    /// index into the full joint-angle vector, `None` for fixed joints and the root
    pub dof_index: Option<usize>,

    pub joint: Option<urdf_rs::Joint>,
    pub urdf_link: urdf_rs::Link,
}

/// Link tree of a robot loaded from URDF.
#[derive(Debug, Clone)]
pub struct MultiBody {
    // link index graph
    graph: petgraph::graphmap::DiGraphMap<usize, ()>,
    // map index -> link
    pub link_map: HashMap<usize, Link>,
    pub name: String,
    /// non-fixed joint names in URDF order; position = dof index
    pub dof_joints: Vec<String>,
}

impl MultiBody {
    pub fn from_urdf(path: impl AsRef<Path>) -> Result<MultiBody, KinematicsError> {
        let robot = read_file(path)?;
        parse_robot(robot)
    }

    pub fn from_urdf_str(xml: &str) -> Result<MultiBody, KinematicsError> {
        let robot = read_from_string(xml)?;
        parse_robot(robot)
    }

    pub fn dof(&self) -> usize {
        self.dof_joints.len()
    }

    pub fn get_link(&self, index: usize) -> Option<&Link> {
        self.link_map.get(&index)
    }

    pub fn find_link(&self, name: &str) -> Result<usize, KinematicsError> {
        self.link_map
            .iter()
            .find(|(_, link)| link.urdf_link.name == name)
            .map(|(index, _)| *index)
            .ok_or_else(|| KinematicsError::UnknownLink(name.to_owned()))
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.graph
            .neighbors_directed(index, petgraph::Direction::Incoming)
            .next()
    }

    /// Joint chain from `palm` (exclusive) down to `distal` (inclusive).
    pub fn get_finger_chain(&self, palm: &str, distal: &str) -> Result<FingerChain, KinematicsError> {
        let start = self.find_link(palm)?;
        let end = self.find_link(distal)?;
        let disconnected = || KinematicsError::Disconnected {
            palm: palm.to_owned(),
            distal: distal.to_owned(),
        };

        let mut chain = vec![];
        let mut current = end;
        while current != start {
            // a walk longer than the tree has links is stuck in a joint cycle
            if chain.len() >= self.link_map.len() {
                return Err(disconnected());
            }
            chain.push(current);
            current = self.parent(current).ok_or_else(disconnected)?;
        }
        chain.reverse();

        let joints = chain
            .iter()
            .map(|index| -> Result<ChainJoint, KinematicsError> {
                let link = self.get_link(*index).ok_or_else(disconnected)?;
                let joint = link.joint.as_ref().ok_or_else(disconnected)?;
                Ok(ChainJoint {
                    origin: link.local_zero_pose,
                    motion: joint_motion(joint)?,
                    dof_index: link.dof_index,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FingerChain {
            joints,
            dof: self.dof(),
        })
    }
}

fn parse_robot(robot: urdf_rs::Robot) -> Result<MultiBody, KinematicsError> {
    let dof_joints: Vec<String> = robot
        .joints
        .iter()
        .filter(|joint| joint.joint_type != urdf_rs::JointType::Fixed)
        .map(|joint| joint.name.clone())
        .collect();

    // link name -> (link index, joint, link)
    let map: HashMap<String, (usize, Option<urdf_rs::Joint>, urdf_rs::Link)> = robot
        .links
        .into_iter()
        .enumerate()
        .map(|(index, link)| {
            let j = robot
                .joints
                .iter()
                .find(|joint| joint.child.link == link.name);
            (link.name.clone(), (index, j.cloned(), link))
        })
        .collect();

    for joint in &robot.joints {
        for name in [&joint.parent.link, &joint.child.link] {
            if !map.contains_key(name) {
                return Err(KinematicsError::UnknownLink(name.clone()));
            }
        }
    }

    if !map.values().any(|(_, joint, _)| joint.is_none()) {
        return Err(KinematicsError::other("urdf has no root link"));
    }

    let mut graph = petgraph::graphmap::DiGraphMap::new();
    for (index, _, _) in map.values() {
        graph.add_node(*index);
    }
    for (child_index, joint, _) in map.values() {
        if let Some(joint) = joint {
            let (parent_index, _, _) = &map[&joint.parent.link];
            graph.add_edge(*parent_index, *child_index, ());
        }
    }

    let link_map = map
        .into_values()
        .map(|(i, j, l)| {
            let dof_index = j
                .as_ref()
                .and_then(|j| dof_joints.iter().position(|name| *name == j.name));
            let local_zero_pose = j
                .as_ref()
                .map(|j| origin_to_isometry(&j.origin))
                .unwrap_or_else(Isometry3::identity);
            (
                i,
                Link {
                    local_zero_pose,
                    dof_index,
                    urdf_link: l,
                    joint: j,
                },
            )
        })
        .collect::<HashMap<_, _>>();

    let multi_body = MultiBody {
        graph,
        link_map,
        name: robot.name,
        dof_joints,
    };
    debug!(
        robot = %multi_body.name,
        links = multi_body.link_map.len(),
        dof = multi_body.dof(),
        "Loaded multi-body"
    );
    Ok(multi_body)
}

fn joint_motion(joint: &urdf_rs::Joint) -> Result<JointMotion, KinematicsError> {
    let axis = || {
        let axis = Vector3::new(joint.axis.xyz[0], joint.axis.xyz[1], joint.axis.xyz[2]);
        Unit::try_new(axis, 1e-12).ok_or_else(|| {
            KinematicsError::other(format!("joint {} has a zero axis", joint.name))
        })
    };
    match joint.joint_type {
        urdf_rs::JointType::Fixed => Ok(JointMotion::Fixed),
        urdf_rs::JointType::Revolute | urdf_rs::JointType::Continuous => {
            Ok(JointMotion::Revolute(axis()?))
        }
        urdf_rs::JointType::Prismatic => Ok(JointMotion::Prismatic(axis()?)),
        ref other => Err(KinematicsError::UnsupportedJoint {
            joint: joint.name.clone(),
            joint_type: format!("{other:?}"),
        }),
    }
}

fn origin_to_isometry(origin: &urdf_rs::Pose) -> Isometry3<f64> {
    let rpy = origin.rpy.0;
    let xyz = origin.xyz.0;
    Isometry3::from_parts(
        Translation3::new(xyz[0], xyz[1], xyz[2]),
        UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointMotion {
    Fixed,
    Revolute(Unit<Vector3<f64>>),
    Prismatic(Unit<Vector3<f64>>),
}

impl JointMotion {
    fn displacement(&self, q: f64) -> Isometry3<f64> {
        match self {
            JointMotion::Fixed => Isometry3::identity(),
            JointMotion::Revolute(axis) => {
                Isometry3::from_parts(Translation3::identity(), UnitQuaternion::from_axis_angle(axis, q))
            }
            JointMotion::Prismatic(axis) => {
                Isometry3::from_parts((axis.into_inner() * q).into(), UnitQuaternion::identity())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChainJoint {
    pub origin: Isometry3<f64>,
    pub motion: JointMotion,
    pub dof_index: Option<usize>,
}

/// Serial chain from a palm link to a finger's distal link.
#[derive(Debug, Clone)]
pub struct FingerChain {
    pub(crate) joints: Vec<ChainJoint>,
    pub(crate) dof: usize,
}

impl FingerChain {
    /// Pose of the distal link frame in the palm frame.
    pub fn fk(&self, joint_angles: &[f64]) -> Result<Isometry3<f64>, KinematicsError> {
        if joint_angles.len() != self.dof {
            return Err(KinematicsError::JointCount {
                expected: self.dof,
                actual: joint_angles.len(),
            });
        }
        let mut pose = Isometry3::identity();
        for joint in &self.joints {
            let q = joint.dof_index.map_or(0., |i| joint_angles[i]);
            pose *= joint.origin * joint.motion.displacement(q);
        }
        Ok(pose)
    }

    /// Full joint-angle indices this chain moves, in chain order.
    pub fn dof_indices(&self) -> Vec<usize> {
        self.joints.iter().filter_map(|j| j.dof_index).collect()
    }
}

/// URDF backed kinematics oracle with one chain per finger.
#[derive(Debug, Clone)]
pub struct HandModel {
    multi_body: MultiBody,
    chains: BTreeMap<String, FingerChain>,
}

impl HandModel {
    pub fn new(multi_body: MultiBody) -> Self {
        Self {
            multi_body,
            chains: BTreeMap::new(),
        }
    }

    /// Register `finger` as the chain from `palm` to `distal`.
    pub fn with_finger(
        mut self,
        finger: impl Into<String>,
        palm: &str,
        distal: &str,
    ) -> Result<Self, KinematicsError> {
        let chain = self.multi_body.get_finger_chain(palm, distal)?;
        self.chains.insert(finger.into(), chain);
        Ok(self)
    }

    pub fn multi_body(&self) -> &MultiBody {
        &self.multi_body
    }

    pub fn chain(&self, finger: &str) -> Option<&FingerChain> {
        self.chains.get(finger)
    }

    /// Description of this hand mounted at `position` with `orientation`
    /// (`[x, y, z, w]`).
    pub fn hand_description(&self, position: [f64; 3], orientation: [f64; 4]) -> HandDescription {
        self.chains
            .iter()
            .fold(
                HandDescription::new(self.multi_body.dof()),
                |hand, (finger, chain)| hand.with_finger(finger.clone(), chain.dof_indices()),
            )
            .with_mount(position, orientation)
    }
}

impl ForwardKinematics for HandModel {
    fn forward_kinematics(&self, joint_angles: &[f64]) -> Result<FingerTransforms, KinematicsError> {
        self.chains
            .iter()
            .map(|(finger, chain)| -> Result<(String, Matrix4<f64>), KinematicsError> {
                let pose: Matrix4<f64> = chain.fk(joint_angles)?.to_homogeneous();
                Ok((finger.clone(), pose))
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use approx::assert_relative_eq;
    use core::f64::consts::FRAC_PI_2;
    use nalgebra::{Point3, Vector4};

    /// Planar two-finger gripper: each finger is a proximal and a distal
    /// link rotating about z.
    pub(crate) const TWO_FINGER_URDF: &str = r#"<?xml version="1.0"?>
<robot name="two_finger">
  <link name="palm"/>
  <link name="finger0_proximal"/>
  <link name="finger0_distal"/>
  <link name="finger1_proximal"/>
  <link name="finger1_distal"/>
  <link name="camera_mount"/>
  <joint name="finger0_base" type="revolute">
    <parent link="palm"/>
    <child link="finger0_proximal"/>
    <origin xyz="-0.03 0 0" rpy="0 0 0"/>
    <axis xyz="0 0 1"/>
    <limit lower="-3.14" upper="3.14" effort="10" velocity="1"/>
  </joint>
  <joint name="finger0_mid" type="revolute">
    <parent link="finger0_proximal"/>
    <child link="finger0_distal"/>
    <origin xyz="0 0.05 0" rpy="0 0 0"/>
    <axis xyz="0 0 1"/>
    <limit lower="-3.14" upper="3.14" effort="10" velocity="1"/>
  </joint>
  <joint name="camera" type="fixed">
    <parent link="palm"/>
    <child link="camera_mount"/>
    <origin xyz="0 0 0.02" rpy="0 0 0"/>
  </joint>
  <joint name="finger1_base" type="revolute">
    <parent link="palm"/>
    <child link="finger1_proximal"/>
    <origin xyz="0.03 0 0" rpy="0 0 0"/>
    <axis xyz="0 0 1"/>
    <limit lower="-3.14" upper="3.14" effort="10" velocity="1"/>
  </joint>
  <joint name="finger1_mid" type="revolute">
    <parent link="finger1_proximal"/>
    <child link="finger1_distal"/>
    <origin xyz="0 0.05 0" rpy="0 0 0"/>
    <axis xyz="0 0 1"/>
    <limit lower="-3.14" upper="3.14" effort="10" velocity="1"/>
  </joint>
</robot>
"#;

    pub(crate) fn two_finger_model() -> HandModel {
        let multi_body = MultiBody::from_urdf_str(TWO_FINGER_URDF).unwrap();
        HandModel::new(multi_body)
            .with_finger("finger0", "palm", "finger0_distal")
            .unwrap()
            .with_finger("finger1", "palm", "finger1_distal")
            .unwrap()
    }

    #[test]
    fn test_from_urdf_str() {
        let multi_body = MultiBody::from_urdf_str(TWO_FINGER_URDF).unwrap();
        assert_eq!(multi_body.name, "two_finger");
        assert_eq!(multi_body.dof(), 4);
        assert_eq!(
            multi_body.dof_joints,
            vec!["finger0_base", "finger0_mid", "finger1_base", "finger1_mid"]
        );
        let palm = multi_body.find_link("palm").unwrap();
        let distal = multi_body.find_link("finger1_distal").unwrap();
        let proximal = multi_body.parent(distal).unwrap();
        assert_eq!(multi_body.parent(proximal), Some(palm));
        assert_eq!(multi_body.parent(palm), None);
        let link = multi_body.get_link(distal).unwrap();
        assert_eq!(link.dof_index, Some(3));
        assert_relative_eq!(link.local_zero_pose.translation.vector, Vector3::new(0., 0.05, 0.));
    }

    #[test]
    fn test_from_urdf_file() {
        let multi_body = MultiBody::from_urdf(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/demos/urdf/two_finger.urdf"
        ))
        .unwrap();
        assert_eq!(multi_body.dof(), 4);
        assert!(MultiBody::from_urdf("demos/urdf/missing.urdf").is_err());
    }

    #[test]
    fn test_unknown_link() {
        let multi_body = MultiBody::from_urdf_str(TWO_FINGER_URDF).unwrap();
        let err = multi_body.get_finger_chain("palm", "thumb_distal").unwrap_err();
        assert!(matches!(err, KinematicsError::UnknownLink(name) if name == "thumb_distal"));
    }

    #[test]
    fn test_disconnected_chain() {
        let multi_body = MultiBody::from_urdf_str(TWO_FINGER_URDF).unwrap();
        let err = multi_body
            .get_finger_chain("finger0_proximal", "finger1_distal")
            .unwrap_err();
        assert!(matches!(err, KinematicsError::Disconnected { .. }));
    }

    #[test]
    fn test_joint_cycle_is_disconnected() {
        let xml = r#"<?xml version="1.0"?>
<robot name="looped">
  <link name="palm"/>
  <link name="a"/>
  <link name="b"/>
  <joint name="a_to_b" type="fixed">
    <parent link="a"/>
    <child link="b"/>
  </joint>
  <joint name="b_to_a" type="fixed">
    <parent link="b"/>
    <child link="a"/>
  </joint>
</robot>"#;
        let multi_body = MultiBody::from_urdf_str(xml).unwrap();
        let err = multi_body.get_finger_chain("palm", "b").unwrap_err();
        assert!(matches!(err, KinematicsError::Disconnected { .. }));
    }

    #[test]
    fn test_chain_dof_indices() {
        let model = two_finger_model();
        assert_eq!(model.chain("finger0").unwrap().dof_indices(), vec![0, 1]);
        assert_eq!(model.chain("finger1").unwrap().dof_indices(), vec![2, 3]);

        let hand = model.hand_description([0., 0., 0.04], [0., 0., 0., 1.]);
        assert_eq!(hand.dof, 4);
        assert_eq!(hand.finger_joints("finger1").unwrap(), vec![2, 3]);
        assert_eq!(hand.position, [0., 0., 0.04]);
    }

    #[test]
    fn test_fk_zero() {
        let model = two_finger_model();
        let out = model.forward_kinematics(&[0.; 4]).unwrap();
        let p = out["finger0"] * Vector4::new(0., 0., 0., 1.);
        assert_relative_eq!(p, Vector4::new(-0.03, 0.05, 0., 1.));
        let p = out["finger1"] * Vector4::new(0., 0.04, 0., 1.);
        assert_relative_eq!(p, Vector4::new(0.03, 0.09, 0., 1.), epsilon = 1e-12);
    }

    #[test]
    fn test_fk_quarter_turn() {
        let chain = two_finger_model().chain("finger0").unwrap().clone();
        let pose = chain.fk(&[FRAC_PI_2, 0., 0., 0.]).unwrap();
        assert_relative_eq!(
            pose * Point3::origin(),
            Point3::new(-0.08, 0., 0.),
            epsilon = 1e-12
        );
        let pose = chain.fk(&[FRAC_PI_2, -FRAC_PI_2, 0., 0.]).unwrap();
        // contact 0.04 along the distal y axis now points back along +y
        assert_relative_eq!(
            pose * Point3::new(0., 0.04, 0.),
            Point3::new(-0.08, 0.04, 0.),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_fk_joint_count() {
        let chain = two_finger_model().chain("finger0").unwrap().clone();
        let err = chain.fk(&[0., 0.]).unwrap_err();
        assert!(matches!(
            err,
            KinematicsError::JointCount {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_prismatic_joint() {
        let motion = JointMotion::Prismatic(Vector3::x_axis());
        let pose = motion.displacement(0.2);
        assert_relative_eq!(pose * Point3::origin(), Point3::new(0.2, 0., 0.));
    }
}
