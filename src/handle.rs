//! Runtime handle binding one [`ConnectedBodyInfo`] to one host.
//!
//! The handle owns the resolution tables filled by the composer: for every
//! contributed entity, the name it was given on the host and a shared alias to
//! the live entity. The reference back to the host is weak, the host owns its
//! connected bodies.

use crate::connected_body_info::{ConnectedBodyInfo, TripleActivation};
use crate::descriptor::GripperInfo;
use crate::error::{ConnectedBodyError, Result};
use crate::kinbody::{
    AttachedSensor, AttachedSensorPtr, GripperInfoPtr, Joint, JointPtr, KinBody, Link, LinkPtr,
    Manipulator, ManipulatorPtr,
};
use crate::pose::Pose;
use std::cell::{OnceCell, RefCell};
use std::rc::{Rc, Weak};
use tracing::debug;

/// Outcome of [`ConnectedBody::update_from_info`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateFromInfoResult {
    /// Nothing differs.
    NoChange,
    /// The difference was applied in place.
    Success,
    /// The body has to be detached and attached again.
    RequireReinitialize,
    /// The host must leave its environment before the change can be applied.
    RequireRemoveFromEnvironment,
}

/// One row of a resolution table.
#[derive(Debug)]
pub struct ResolvedEntry<T> {
    /// Name of the entity on the host. Empty while not merged.
    pub name: String,
    /// Live entity, kept across unmerge so it can be reused.
    pub entity: Option<Rc<RefCell<T>>>,
}

impl<T> Default for ResolvedEntry<T> {
    fn default() -> Self {
        Self {
            name: String::new(),
            entity: None,
        }
    }
}

impl<T> Clone for ResolvedEntry<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            entity: self.entity.clone(),
        }
    }
}

/// A connected body attached to a host robot.
#[derive(Debug)]
pub struct ConnectedBody {
    info: Rc<ConnectedBodyInfo>,
    robot: Weak<RefCell<KinBody>>,
    attached_link: Weak<RefCell<Link>>,
    transform_epsilon: f32,
    hash: OnceCell<String>,

    pub(crate) name_prefix: String,
    pub(crate) resolved_links: Vec<ResolvedEntry<Link>>,
    pub(crate) resolved_joints: Vec<ResolvedEntry<Joint>>,
    pub(crate) resolved_manipulators: Vec<ResolvedEntry<Manipulator>>,
    pub(crate) resolved_attached_sensors: Vec<ResolvedEntry<AttachedSensor>>,
    pub(crate) resolved_gripper_infos: Vec<ResolvedEntry<GripperInfo>>,
    pub(crate) dummy_joint_name: String,
    pub(crate) dummy_joint_cache: Option<JointPtr>,
    /// Forced-adjacent pairs this body inserted into the host.
    pub(crate) added_forced_adjacent: Vec<(String, String)>,
}

impl ConnectedBody {
    /// Binds `info` to `robot`.
    ///
    /// Fails when the robot is gone or does not have the attach link.
    pub fn new(
        robot: Weak<RefCell<KinBody>>,
        info: ConnectedBodyInfo,
        transform_epsilon: f32,
    ) -> Result<Self> {
        let Some(body) = robot.upgrade() else {
            return Err(ConnectedBodyError::MissingRobot {
                body: info.name.clone(),
            });
        };
        let attached_link = body.borrow().link(&info.link_name).ok_or_else(|| {
            ConnectedBodyError::MissingAttachLink {
                body: info.name.clone(),
                robot: body.borrow().name().to_string(),
                link: info.link_name.clone(),
            }
        })?;

        Ok(Self {
            info: Rc::new(info),
            robot,
            attached_link: Rc::downgrade(&attached_link),
            transform_epsilon,
            hash: OnceCell::new(),
            name_prefix: String::new(),
            resolved_links: Vec::new(),
            resolved_joints: Vec::new(),
            resolved_manipulators: Vec::new(),
            resolved_attached_sensors: Vec::new(),
            resolved_gripper_infos: Vec::new(),
            dummy_joint_name: String::new(),
            dummy_joint_cache: None,
            added_forced_adjacent: Vec::new(),
        })
    }

    /// Copies this handle onto `robot`, which must already carry the merged
    /// entities (e.g. a clone of the original host). Every live reference is
    /// looked up again by its resolved name.
    pub fn rebind(&self, robot: &Rc<RefCell<KinBody>>) -> Result<Self> {
        let body = robot.borrow();
        let link_name = self
            .attached_link
            .upgrade()
            .map(|l| l.borrow().name().to_string())
            .unwrap_or_else(|| self.info.link_name.clone());
        let attached_link =
            body.link(&link_name)
                .ok_or_else(|| ConnectedBodyError::MissingAttachLink {
                    body: self.name().to_string(),
                    robot: body.name().to_string(),
                    link: link_name.clone(),
                })?;

        Ok(Self {
            info: self.info.clone(),
            robot: Rc::downgrade(robot),
            attached_link: Rc::downgrade(&attached_link),
            transform_epsilon: self.transform_epsilon,
            hash: self.hash.clone(),
            name_prefix: self.name_prefix.clone(),
            resolved_links: rebind_table(&self.resolved_links, |n| body.link(n)),
            resolved_joints: rebind_table(&self.resolved_joints, |n| body.joint(n)),
            resolved_manipulators: rebind_table(&self.resolved_manipulators, |n| {
                body.manipulator(n)
            }),
            resolved_attached_sensors: rebind_table(&self.resolved_attached_sensors, |n| {
                body.attached_sensor(n)
            }),
            resolved_gripper_infos: rebind_table(&self.resolved_gripper_infos, |n| {
                body.gripper_info(n)
            }),
            dummy_joint_name: self.dummy_joint_name.clone(),
            dummy_joint_cache: body.joint(&self.dummy_joint_name),
            added_forced_adjacent: self.added_forced_adjacent.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &ConnectedBodyInfo {
        &self.info
    }

    /// A copy of the descriptor this body was built from.
    pub fn extract_info(&self) -> ConnectedBodyInfo {
        (*self.info).clone()
    }

    /// `name + "_"`, recorded by the composer. Empty before the first merge.
    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub fn robot(&self) -> Option<Rc<RefCell<KinBody>>> {
        self.robot.upgrade()
    }

    pub fn attaching_link(&self) -> Option<LinkPtr> {
        self.attached_link.upgrade()
    }

    pub fn relative_transform(&self) -> Pose {
        self.info.relative_transform
    }

    /// World pose of the connected body frame.
    pub fn transform(&self) -> Option<Pose> {
        self.attaching_link()
            .map(|link| link.borrow().transform() * self.info.relative_transform)
    }

    // --- ACTIVATION ---

    pub fn activation(&self) -> TripleActivation {
        self.info.activation
    }

    pub fn is_active(&self) -> bool {
        self.info.activation.is_active()
    }

    /// Changes the activation state. Returns whether anything changed.
    ///
    /// While the host hierarchy is computed, switching between active and
    /// inactive is rejected; switching between the two active states is not.
    pub fn set_active(&mut self, activation: TripleActivation) -> Result<bool> {
        if self.info.activation == activation {
            return Ok(false);
        }
        self.check_activation(activation)?;
        Rc::make_mut(&mut self.info).activation = activation;
        Ok(true)
    }

    /// Fails when [`set_active`](Self::set_active) would reject `activation`.
    pub fn check_activation(&self, activation: TripleActivation) -> Result<()> {
        let Some(body) = self.robot.upgrade() else {
            return Ok(());
        };
        let body = body.borrow();
        if body.is_hierarchy_computed() && self.info.activation.is_active() != activation.is_active()
        {
            return Err(ConnectedBodyError::HierarchyComputed {
                robot: body.name().to_string(),
                action: format!(
                    "set connected body '{}' active to {}",
                    self.name(),
                    activation.as_i8()
                ),
            });
        }
        Ok(())
    }

    // --- LINK FLAGS ---

    /// Enables or disables collision checking on every resolved link.
    /// Returns whether any link changed.
    pub fn set_link_enable(&self, enable: bool) -> bool {
        self.for_each_resolved_link(|link| {
            let changed = link.info.is_enabled != enable;
            link.info.is_enabled = enable;
            changed
        })
    }

    /// Shows or hides every resolved link. Returns whether any link changed.
    pub fn set_link_visible(&self, visible: bool) -> bool {
        self.for_each_resolved_link(|link| {
            let changed = link.info.is_visible != visible;
            link.info.is_visible = visible;
            changed
        })
    }

    fn for_each_resolved_link(&self, mut apply: impl FnMut(&mut Link) -> bool) -> bool {
        let Some(body) = self.robot.upgrade() else {
            return false;
        };
        let body = body.borrow();
        let mut changed = false;
        for entry in &self.resolved_links {
            if let Some(link) = body.link(&entry.name) {
                changed |= apply(&mut link.borrow_mut());
            }
        }
        changed
    }

    // --- RESOLVED ENTITIES ---

    pub fn resolved_link_names(&self) -> impl Iterator<Item = &str> {
        self.resolved_links.iter().map(|e| e.name.as_str())
    }

    pub fn resolved_joint_names(&self) -> impl Iterator<Item = &str> {
        self.resolved_joints.iter().map(|e| e.name.as_str())
    }

    pub fn resolved_manipulator_names(&self) -> impl Iterator<Item = &str> {
        self.resolved_manipulators.iter().map(|e| e.name.as_str())
    }

    pub fn resolved_attached_sensor_names(&self) -> impl Iterator<Item = &str> {
        self.resolved_attached_sensors.iter().map(|e| e.name.as_str())
    }

    pub fn resolved_gripper_info_names(&self) -> impl Iterator<Item = &str> {
        self.resolved_gripper_infos.iter().map(|e| e.name.as_str())
    }

    /// Live links contributed by this body, in descriptor order. Entries are
    /// `None` when not merged or when the host is gone.
    pub fn resolved_links(&self) -> Vec<Option<LinkPtr>> {
        self.lookup(&self.resolved_links, KinBody::link)
    }

    pub fn resolved_joints(&self) -> Vec<Option<JointPtr>> {
        self.lookup(&self.resolved_joints, KinBody::joint)
    }

    pub fn resolved_manipulators(&self) -> Vec<Option<ManipulatorPtr>> {
        self.lookup(&self.resolved_manipulators, KinBody::manipulator)
    }

    pub fn resolved_attached_sensors(&self) -> Vec<Option<AttachedSensorPtr>> {
        self.lookup(&self.resolved_attached_sensors, KinBody::attached_sensor)
    }

    pub fn resolved_gripper_infos(&self) -> Vec<Option<GripperInfoPtr>> {
        self.lookup(&self.resolved_gripper_infos, KinBody::gripper_info)
    }

    pub fn resolved_dummy_joint(&self) -> Option<JointPtr> {
        let body = self.robot.upgrade()?;
        let body = body.borrow();
        body.joint(&self.dummy_joint_name)
    }

    fn lookup<T, P>(
        &self,
        table: &[ResolvedEntry<T>],
        find: impl Fn(&KinBody, &str) -> Option<P>,
    ) -> Vec<Option<P>> {
        match self.robot.upgrade() {
            Some(body) => {
                let body = body.borrow();
                table.iter().map(|e| find(&body, &e.name)).collect()
            }
            None => table.iter().map(|_| None).collect(),
        }
    }

    /// Whether `resolved_name` is the name one of this body's manipulators
    /// gets once merged.
    pub fn can_provide_manipulator(&self, resolved_name: &str) -> bool {
        if self.info.manipulators.is_empty() || resolved_name.len() <= self.name_prefix.len() {
            return false;
        }
        let Some(local) = resolved_name.strip_prefix(self.name_prefix.as_str()) else {
            return false;
        };
        self.info.manipulators.iter().any(|m| m.name == local)
    }

    // --- IDENTITY & UPDATES ---

    /// Activation-independent content hash of the descriptor.
    ///
    /// Computed once and cached for the lifetime of the handle. The descriptor
    /// is only replaced through a new handle, so the cache never goes stale.
    pub fn info_hash(&self) -> Result<&str> {
        if let Some(hash) = self.hash.get() {
            return Ok(hash);
        }
        let hash = self.info.content_hash()?;
        Ok(self.hash.get_or_init(|| hash))
    }

    /// Decides how a replacement descriptor for the same body can be applied.
    ///
    /// Only an activation change is ever applied in place, and only while the
    /// host hierarchy is not computed.
    pub fn update_from_info(&mut self, info: &ConnectedBodyInfo) -> Result<UpdateFromInfoResult> {
        if info.id != self.info.id {
            return Err(ConnectedBodyError::IdMismatch {
                expected: self.info.id.clone(),
                actual: info.id.clone(),
            });
        }

        let id = &self.info.id;
        let current = &*self.info;
        let changed = if current.name != info.name {
            Some("name")
        } else if current.link_name != info.link_name {
            Some("link name")
        } else if !current
            .relative_transform
            .approx_eq(&info.relative_transform, self.transform_epsilon)
        {
            Some("relative transform")
        } else if current.links != info.links {
            Some("links")
        } else if current.joints != info.joints {
            Some("joints")
        } else if current.manipulators != info.manipulators {
            Some("manipulators")
        } else if current.attached_sensors != info.attached_sensors {
            Some("attached sensors")
        } else if current.gripper_infos != info.gripper_infos {
            Some("gripper infos")
        } else {
            None
        };
        if let Some(what) = changed {
            debug!("connected body {id} {what} changed");
            return Ok(UpdateFromInfoResult::RequireReinitialize);
        }

        if current.activation == info.activation {
            return Ok(UpdateFromInfoResult::NoChange);
        }

        debug!("connected body {id} is active changed");
        let hierarchy_computed = self
            .robot
            .upgrade()
            .map(|body| body.borrow().is_hierarchy_computed());
        match hierarchy_computed {
            Some(false) => {
                Rc::make_mut(&mut self.info).activation = info.activation;
                Ok(UpdateFromInfoResult::Success)
            }
            _ => Ok(UpdateFromInfoResult::RequireRemoveFromEnvironment),
        }
    }

    /// Resizes every table to the descriptor's list lengths, keeping cached
    /// live entities.
    pub(crate) fn size_tables(&mut self) {
        let info = &self.info;
        self.resolved_links.resize_with(info.links.len(), Default::default);
        self.resolved_joints.resize_with(info.joints.len(), Default::default);
        self.resolved_manipulators
            .resize_with(info.manipulators.len(), Default::default);
        self.resolved_attached_sensors
            .resize_with(info.attached_sensors.len(), Default::default);
        self.resolved_gripper_infos
            .resize_with(info.gripper_infos.len(), Default::default);
    }

    pub(crate) fn shared_info(&self) -> Rc<ConnectedBodyInfo> {
        self.info.clone()
    }
}

fn rebind_table<T>(
    table: &[ResolvedEntry<T>],
    lookup: impl Fn(&str) -> Option<Rc<RefCell<T>>>,
) -> Vec<ResolvedEntry<T>> {
    table
        .iter()
        .map(|e| ResolvedEntry {
            name: e.name.clone(),
            entity: if e.name.is_empty() { None } else { lookup(&e.name) },
        })
        .collect()
}
