use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use nalgebra::Matrix4;

use crate::KinematicsError;

/// Palm-to-distal transform of every finger, keyed by finger name.
pub type FingerTransforms = HashMap<String, Matrix4<f64>>;

/// Forward kinematics of a hand.
///
/// Implementations must be deterministic and free of side effects: the
/// solver calls them many times per solve with the full joint-angle
/// vector and assumes equal inputs give equal outputs.
pub trait ForwardKinematics {
    fn forward_kinematics(&self, joint_angles: &[f64]) -> Result<FingerTransforms, KinematicsError>;
}

impl<F> ForwardKinematics for F
where
    F: Fn(&[f64]) -> Result<FingerTransforms, KinematicsError>,
{
    fn forward_kinematics(&self, joint_angles: &[f64]) -> Result<FingerTransforms, KinematicsError> {
        self(joint_angles)
    }
}

/// Caches the transforms of an expensive oracle, keyed on the exact bit
/// pattern of the joint-angle vector.
///
/// Errors are not cached. When `capacity` entries are stored the cache is
/// cleared before the next insert.
#[derive(Debug)]
pub struct Memoized<K> {
    inner: K,
    capacity: usize,
    cache: RefCell<HashMap<Vec<u64>, FingerTransforms>>,
    hits: Cell<usize>,
}

impl<K: ForwardKinematics> Memoized<K> {
    pub fn new(inner: K) -> Self {
        Self::with_capacity(inner, 4096)
    }

    pub fn with_capacity(inner: K, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            cache: RefCell::new(HashMap::new()),
            hits: Cell::new(0),
        }
    }

    /// Number of calls answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    pub fn into_inner(self) -> K {
        self.inner
    }
}

impl<K: ForwardKinematics> ForwardKinematics for Memoized<K> {
    fn forward_kinematics(&self, joint_angles: &[f64]) -> Result<FingerTransforms, KinematicsError> {
        let key: Vec<u64> = joint_angles.iter().map(|q| q.to_bits()).collect();
        if let Some(transforms) = self.cache.borrow().get(&key) {
            self.hits.set(self.hits.get() + 1);
            return Ok(transforms.clone());
        }
        let transforms = self.inner.forward_kinematics(joint_angles)?;
        let mut cache = self.cache.borrow_mut();
        if cache.len() >= self.capacity {
            cache.clear();
        }
        cache.insert(key, transforms.clone());
        Ok(transforms)
    }
}
