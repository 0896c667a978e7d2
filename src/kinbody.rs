//! The host kinematic body and its live entities.
//!
//! A [`KinBody`] owns ordered collections of links, joints, manipulators,
//! attached sensors and gripper descriptors. Entities are shared through
//! `Rc<RefCell<_>>` so connected bodies can keep aliases to the ones they
//! contributed. Forward kinematics is not computed here: link poses are pushed
//! in from outside through [`Link::set_transform`].

use crate::descriptor::{AttachedSensorInfo, GripperInfo, JointInfo, LinkInfo, ManipulatorInfo};
use crate::pose::Pose;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

pub type LinkPtr = Rc<RefCell<Link>>;
pub type JointPtr = Rc<RefCell<Joint>>;
pub type ManipulatorPtr = Rc<RefCell<Manipulator>>;
pub type AttachedSensorPtr = Rc<RefCell<AttachedSensor>>;
pub type GripperInfoPtr = Rc<RefCell<GripperInfo>>;

/// A live rigid body of the host.
#[derive(Clone, Debug, Default)]
pub struct Link {
    pub info: LinkInfo,
    index: usize,
    /// Current world pose. `info.transform` keeps the zero-configuration pose.
    transform: Pose,
}

impl Link {
    pub fn new(info: LinkInfo) -> Self {
        let transform = info.transform;
        Self {
            info,
            index: 0,
            transform,
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Position of this link in the host's link list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn transform(&self) -> Pose {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Pose) {
        self.transform = transform;
    }

    /// Descriptor with the current live pose written back into it.
    pub fn update_and_get_info(&mut self) -> LinkInfo {
        self.info.transform = self.transform;
        self.info.clone()
    }
}

/// A live joint of the host.
#[derive(Clone, Debug, Default)]
pub struct Joint {
    pub info: JointInfo,
    values: Vec<f32>,
}

impl Joint {
    pub fn new(info: JointInfo) -> Self {
        let values = vec![0.0; info.joint_type.dof()];
        Self { info, values }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn dof(&self) -> usize {
        self.info.joint_type.dof()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// A live manipulator of the host.
#[derive(Clone, Debug, Default)]
pub struct Manipulator {
    pub info: ManipulatorInfo,
}

impl Manipulator {
    pub fn new(info: ManipulatorInfo) -> Self {
        Self { info }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }
}

/// A live sensor mounted on one of the host's links.
#[derive(Clone, Debug, Default)]
pub struct AttachedSensor {
    pub info: AttachedSensorInfo,
}

impl AttachedSensor {
    pub fn new(info: AttachedSensorInfo) -> Self {
        Self { info }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }
}

/// The host kinematic body.
#[derive(Debug, Default)]
pub struct KinBody {
    name: String,
    pub(crate) links: Vec<LinkPtr>,
    pub(crate) joints: Vec<JointPtr>,
    pub(crate) passive_joints: Vec<JointPtr>,
    pub(crate) manipulators: Vec<ManipulatorPtr>,
    pub(crate) attached_sensors: Vec<AttachedSensorPtr>,
    pub(crate) gripper_infos: Vec<GripperInfoPtr>,
    /// Link name pairs, smaller name first.
    pub(crate) forced_adjacent: BTreeSet<(String, String)>,
    hierarchy_computed: bool,
}

impl KinBody {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn links(&self) -> &[LinkPtr] {
        &self.links
    }

    /// Joints that count toward the degrees of freedom.
    pub fn joints(&self) -> &[JointPtr] {
        &self.joints
    }

    pub fn passive_joints(&self) -> &[JointPtr] {
        &self.passive_joints
    }

    pub fn manipulators(&self) -> &[ManipulatorPtr] {
        &self.manipulators
    }

    pub fn attached_sensors(&self) -> &[AttachedSensorPtr] {
        &self.attached_sensors
    }

    pub fn gripper_infos(&self) -> &[GripperInfoPtr] {
        &self.gripper_infos
    }

    /// Whether the structural hierarchy is computed, i.e. the robot is live in
    /// an environment and its structure may not change.
    pub fn is_hierarchy_computed(&self) -> bool {
        self.hierarchy_computed
    }

    pub(crate) fn set_hierarchy_computed(&mut self, computed: bool) {
        self.hierarchy_computed = computed;
    }

    // --- LOOKUP ---

    pub fn link(&self, name: &str) -> Option<LinkPtr> {
        self.links.iter().find(|l| l.borrow().name() == name).cloned()
    }

    /// Looks up active joints first, then passive ones.
    pub fn joint(&self, name: &str) -> Option<JointPtr> {
        self.joints
            .iter()
            .chain(self.passive_joints.iter())
            .find(|j| j.borrow().name() == name)
            .cloned()
    }

    pub fn manipulator(&self, name: &str) -> Option<ManipulatorPtr> {
        self.manipulators
            .iter()
            .find(|m| m.borrow().name() == name)
            .cloned()
    }

    pub fn attached_sensor(&self, name: &str) -> Option<AttachedSensorPtr> {
        self.attached_sensors
            .iter()
            .find(|s| s.borrow().name() == name)
            .cloned()
    }

    pub fn gripper_info(&self, name: &str) -> Option<GripperInfoPtr> {
        self.gripper_infos
            .iter()
            .find(|g| g.borrow().name == name)
            .cloned()
    }

    /// Current world pose of the named link.
    pub fn link_transform(&self, name: &str) -> Option<Pose> {
        self.link(name).map(|l| l.borrow().transform())
    }

    // --- APPEND / REMOVE ---

    pub fn add_link(&mut self, info: LinkInfo) -> LinkPtr {
        let link = Rc::new(RefCell::new(Link::new(info)));
        self.push_link(link.clone());
        link
    }

    pub(crate) fn push_link(&mut self, link: LinkPtr) {
        link.borrow_mut().index = self.links.len();
        self.links.push(link);
    }

    /// Adds the joint to the active or passive list depending on `is_active`.
    pub fn add_joint(&mut self, info: JointInfo) -> JointPtr {
        let joint = Rc::new(RefCell::new(Joint::new(info)));
        self.push_joint(joint.clone());
        joint
    }

    pub(crate) fn push_joint(&mut self, joint: JointPtr) {
        if joint.borrow().info.is_active {
            self.joints.push(joint);
        } else {
            self.passive_joints.push(joint);
        }
    }

    pub fn add_manipulator(&mut self, info: ManipulatorInfo) -> ManipulatorPtr {
        let manip = Rc::new(RefCell::new(Manipulator::new(info)));
        self.manipulators.push(manip.clone());
        manip
    }

    pub fn remove_manipulator(&mut self, name: &str) -> bool {
        let before = self.manipulators.len();
        self.manipulators.retain(|m| m.borrow().name() != name);
        before != self.manipulators.len()
    }

    pub fn add_attached_sensor(&mut self, info: AttachedSensorInfo) -> AttachedSensorPtr {
        let sensor = Rc::new(RefCell::new(AttachedSensor::new(info)));
        self.attached_sensors.push(sensor.clone());
        sensor
    }

    pub fn remove_attached_sensor(&mut self, name: &str) -> bool {
        let before = self.attached_sensors.len();
        self.attached_sensors.retain(|s| s.borrow().name() != name);
        before != self.attached_sensors.len()
    }

    pub fn add_gripper_info(&mut self, info: GripperInfo) -> GripperInfoPtr {
        let gripper = Rc::new(RefCell::new(info));
        self.gripper_infos.push(gripper.clone());
        gripper
    }

    pub fn remove_gripper_info(&mut self, name: &str) -> bool {
        let before = self.gripper_infos.len();
        self.gripper_infos.retain(|g| g.borrow().name != name);
        before != self.gripper_infos.len()
    }

    /// Rewrites every link's index to its current position.
    pub(crate) fn reindex_links(&mut self) {
        for (index, link) in self.links.iter().enumerate() {
            link.borrow_mut().index = index;
        }
    }

    // --- ADJACENCY ---

    /// Returns `false` when the pair was already recorded.
    pub fn set_forced_adjacent_links(&mut self, a: &str, b: &str) -> bool {
        self.forced_adjacent.insert(ordered_pair(a, b))
    }

    pub fn remove_forced_adjacent_links(&mut self, a: &str, b: &str) -> bool {
        self.forced_adjacent.remove(&ordered_pair(a, b))
    }

    pub fn are_forced_adjacent(&self, a: &str, b: &str) -> bool {
        self.forced_adjacent.contains(&ordered_pair(a, b))
    }

    pub fn forced_adjacent_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forced_adjacent
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
    }

    // --- CONFIGURATION ---

    /// Total degrees of freedom of the active joints.
    pub fn dof(&self) -> usize {
        self.joints.iter().map(|j| j.borrow().dof()).sum()
    }

    pub fn dof_values(&self) -> Vec<f32> {
        self.joints
            .iter()
            .flat_map(|j| j.borrow().values.clone())
            .collect()
    }

    /// Sets the active joint values in joint order. Missing trailing values
    /// are left untouched.
    pub fn set_dof_values(&mut self, values: &[f32]) {
        let mut rest = values;
        for joint in &self.joints {
            let mut joint = joint.borrow_mut();
            let n = joint.values.len().min(rest.len());
            joint.values[..n].copy_from_slice(&rest[..n]);
            rest = &rest[n..];
        }
    }

    /// Zeroes every joint and puts each link back at its descriptor pose.
    pub fn set_zero_configuration(&mut self) {
        for joint in self.joints.iter().chain(self.passive_joints.iter()) {
            joint.borrow_mut().values.fill(0.0);
        }
        for link in &self.links {
            let mut link = link.borrow_mut();
            link.transform = link.info.transform;
        }
    }

    pub fn link_enable_states(&self) -> Vec<bool> {
        self.links.iter().map(|l| l.borrow().info.is_enabled).collect()
    }

    /// Saves link poses and joint values, restoring them when the returned
    /// guard is dropped.
    pub fn save_state(&mut self) -> KinBodyStateSaver<'_> {
        let transforms = self.links.iter().map(|l| l.borrow().transform).collect();
        let values = self
            .joints
            .iter()
            .chain(self.passive_joints.iter())
            .map(|j| j.borrow().values.clone())
            .collect();
        KinBodyStateSaver {
            body: self,
            transforms,
            values,
        }
    }
}

fn ordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Restores link poses and joint values of a [`KinBody`] on drop.
pub struct KinBodyStateSaver<'a> {
    body: &'a mut KinBody,
    transforms: Vec<Pose>,
    values: Vec<Vec<f32>>,
}

impl Deref for KinBodyStateSaver<'_> {
    type Target = KinBody;

    fn deref(&self) -> &KinBody {
        self.body
    }
}

impl DerefMut for KinBodyStateSaver<'_> {
    fn deref_mut(&mut self) -> &mut KinBody {
        self.body
    }
}

impl Drop for KinBodyStateSaver<'_> {
    fn drop(&mut self) {
        for (link, transform) in self.body.links.iter().zip(&self.transforms) {
            link.borrow_mut().transform = *transform;
        }
        let joints = self.body.joints.iter().chain(self.body.passive_joints.iter());
        for (joint, values) in joints.zip(&self.values) {
            joint.borrow_mut().values.clone_from(values);
        }
    }
}
