//! Descriptor payloads contributed by a connected body.
//!
//! These are the serializable "info" halves of the host's live entities. The
//! composer copies, renames and relinks them but does not interpret their
//! physical meaning.

use crate::pose::Pose;
use glam::Vec3;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A descriptor that lives in a name-keyed list.
pub trait NamedInfo: Clone + PartialEq + Serialize + DeserializeOwned {
    /// Human readable category used in logs and errors.
    const CATEGORY: &'static str;

    fn name(&self) -> &str;
}

/// Geometric primitive of a link geometry. Carried as-is through a merge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapePrimitive {
    /// A box defined by half-extents (x, y, z).
    Box(Vec3),
    /// A cylinder defined by radius and height (aligned along Y axis).
    Cylinder { radius: f32, height: f32 },
    /// A sphere defined by radius.
    Sphere(f32),
    /// A capsule defined by radius and height (aligned along Y axis).
    Capsule { radius: f32, height: f32 },
}

/// One collision/visual shape of a link, expressed in the link frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryInfo {
    #[serde(default)]
    pub name: String,
    pub shape: ShapePrimitive,
    #[serde(default)]
    pub transform: Pose,
}

/// Descriptor of a rigid body segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkInfo {
    pub id: String,
    pub name: String,

    /// Pose of the link. Relative to the connected body frame inside a
    /// descriptor, world-space once spliced into a host.
    pub transform: Pose,

    pub geometries: Vec<GeometryInfo>,

    /// Mass in kg.
    pub mass: f32,

    /// Density in kg/m³.
    pub density: f32,

    /// Links that are always treated as kinematically adjacent to this one.
    pub forced_adjacent_links: Vec<String>,

    /// Links this one never collides with.
    pub noncolliding_links: Vec<String>,

    pub is_enabled: bool,
    pub is_visible: bool,
    pub is_static: bool,
}

impl Default for LinkInfo {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            transform: Pose::IDENTITY,
            geometries: Vec::new(),
            mass: 0.0,
            density: 0.0,
            forced_adjacent_links: Vec::new(),
            noncolliding_links: Vec::new(),
            is_enabled: true,
            is_visible: true,
            is_static: false,
        }
    }
}

impl LinkInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Records `link` as never colliding with this one. Idempotent.
    pub fn set_noncolliding_link(&mut self, link: &str) {
        if !self.noncolliding_links.iter().any(|l| l == link) {
            self.noncolliding_links.push(link.to_string());
        }
    }
}

impl NamedInfo for LinkInfo {
    const CATEGORY: &'static str = "link";

    fn name(&self) -> &str {
        &self.name
    }
}

/// Types of mechanical joints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JointType {
    /// Fixed connection (welded).
    Fixed,
    /// Rotates around a single axis (e.g., knee, elbow).
    #[default]
    Hinge,
    /// Ball and socket (3 degrees of freedom).
    Ball,
    /// Slides along a single axis (linear actuator).
    Prismatic,
}

impl JointType {
    /// Number of degrees of freedom this joint type contributes.
    pub fn dof(self) -> usize {
        match self {
            Self::Fixed => 0,
            Self::Hinge | Self::Prismatic => 1,
            Self::Ball => 3,
        }
    }
}

/// Limits for a joint's motion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointLimit {
    /// Minimum angle (radians) or distance (meters).
    pub min: f32,
    /// Maximum angle (radians) or distance (meters).
    pub max: f32,
    /// Maximum torque (Nm) or force (N) the joint motor can apply.
    pub effort: f32,
    /// Maximum velocity (rad/s or m/s).
    pub velocity: f32,
}

impl JointLimit {
    pub const ZERO: Self = Self {
        min: 0.0,
        max: 0.0,
        effort: 0.0,
        velocity: 0.0,
    };
}

/// Equations making a joint follow other joints.
///
/// `equations` holds the position, velocity and acceleration expressions, in
/// that order. Joint names appear verbatim inside the expression text.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MimicInfo {
    pub equations: Vec<String>,
}

/// Descriptor of a kinematic connection between two links.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JointInfo {
    pub id: String,
    pub name: String,

    /// The type of mechanical connection.
    #[serde(rename = "type")]
    pub joint_type: JointType,

    /// The parent link (the one closer to the root).
    #[serde(rename = "parentLinkName")]
    pub link_name0: String,

    /// The child link.
    #[serde(rename = "childLinkName")]
    pub link_name1: String,

    /// The anchor point in the parent link frame.
    pub anchor: Vec3,

    /// The axis of rotation/translation in the parent link frame.
    pub axis: Vec3,

    /// Physical limits of the joint.
    pub limits: Option<JointLimit>,

    /// Maximum acceleration (rad/s² or m/s²).
    pub max_acceleration: f32,

    pub mimic: Option<MimicInfo>,

    /// Active joints count toward the robot's degrees of freedom.
    pub is_active: bool,
}

impl Default for JointInfo {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            joint_type: JointType::Hinge,
            link_name0: String::new(),
            link_name1: String::new(),
            anchor: Vec3::ZERO,
            axis: Vec3::X,
            limits: None,
            max_acceleration: 0.0,
            mimic: None,
            is_active: true,
        }
    }
}

impl JointInfo {
    pub fn new(
        name: impl Into<String>,
        joint_type: JointType,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            joint_type,
            link_name0: parent.into(),
            link_name1: child.into(),
            ..Default::default()
        }
    }
}

impl NamedInfo for JointInfo {
    const CATEGORY: &'static str = "joint";

    fn name(&self) -> &str {
        &self.name
    }
}

/// Descriptor of a manipulator (tool) built on the robot's links.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManipulatorInfo {
    pub id: String,
    pub name: String,
    pub base_link_name: String,
    pub ik_chain_end_link_name: String,
    pub effector_link_name: String,
    /// May point at a link outside the contributing connected body.
    pub tool_changer_link_name: String,
    pub gripper_name: String,
    pub gripper_joint_names: Vec<String>,
    pub local_tool_transform: Pose,
}

impl NamedInfo for ManipulatorInfo {
    const CATEGORY: &'static str = "manipulator";

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum SensorType {
    #[default]
    Camera,
    Lidar,
    Touch,
    IMU,
    Ultrasonic,
}

/// Descriptor of a sensor mounted on a link.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachedSensorInfo {
    pub id: String,
    pub name: String,
    pub link_name: String,
    /// Another attached sensor whose data this one builds on.
    pub reference_attached_sensor_name: String,
    pub sensor_type: SensorType,
    /// Pose relative to the mounting link.
    pub transform: Pose,
}

impl NamedInfo for AttachedSensorInfo {
    const CATEGORY: &'static str = "attached sensor";

    fn name(&self) -> &str {
        &self.name
    }
}

/// Descriptor of a gripper.
///
/// Beyond the fixed fields a gripper carries an open-ended metadata document;
/// its keys are stored flat alongside the fixed ones in JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GripperInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "grippertype")]
    pub gripper_type: String,
    pub gripper_joint_names: Vec<String>,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NamedInfo for GripperInfo {
    const CATEGORY: &'static str = "gripper info";

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noncolliding_link_is_recorded_once() {
        let mut link = LinkInfo::new("palm");
        link.set_noncolliding_link("finger");
        link.set_noncolliding_link("finger");
        assert_eq!(link.noncolliding_links, vec!["finger".to_string()]);
    }

    #[test]
    fn geometry_shape_json() {
        let geometry: GeometryInfo = serde_json::from_value(serde_json::json!({
            "shape": {"cylinder": {"radius": 0.1, "height": 0.4}}
        }))
        .unwrap();
        assert_eq!(
            geometry.shape,
            ShapePrimitive::Cylinder {
                radius: 0.1,
                height: 0.4
            }
        );
        assert_eq!(geometry.transform, Pose::IDENTITY);
    }

    #[test]
    fn partial_joint_document_keeps_defaults() {
        let joint: JointInfo = serde_json::from_value(serde_json::json!({
            "name": "j0",
            "parentLinkName": "base",
            "childLinkName": "arm"
        }))
        .unwrap();
        assert!(joint.is_active);
        assert_eq!(joint.joint_type, JointType::Hinge);
        assert_eq!(joint.link_name1, "arm");
    }

    #[test]
    fn gripper_metadata_is_flattened() {
        let gripper: GripperInfo = serde_json::from_value(serde_json::json!({
            "name": "g",
            "gripperJointNames": ["j1"],
            "fingerLinkNames": ["f1", "f2"]
        }))
        .unwrap();
        assert_eq!(gripper.gripper_joint_names, vec!["j1".to_string()]);
        assert_eq!(
            gripper.metadata.get("fingerLinkNames"),
            Some(&serde_json::json!(["f1", "f2"]))
        );
    }
}
