//! The serializable descriptor of a connected body.

use crate::descriptor::{AttachedSensorInfo, GripperInfo, JointInfo, LinkInfo, ManipulatorInfo};
use crate::error::{ConnectedBodyError, Result};
use crate::json::update_or_create_with_name_check;
use crate::kinbody::KinBody;
use crate::pose::Pose;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Activation state of a connected body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum TripleActivation {
    /// Contributes nothing to the host.
    #[default]
    Inactive = 0,
    /// Contributes all its entities.
    Active = 1,
    /// Active, and never collides with other `ActiveShared` siblings.
    ActiveShared = -1,
}

impl TripleActivation {
    pub fn is_active(self) -> bool {
        self != Self::Inactive
    }

    pub fn as_i8(self) -> i8 {
        self as i8
    }
}

impl TryFrom<i64> for TripleActivation {
    type Error = ConnectedBodyError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Inactive),
            1 => Ok(Self::Active),
            -1 => Ok(Self::ActiveShared),
            other => Err(ConnectedBodyError::InvalidActivation(other)),
        }
    }
}

/// Options controlling the JSON form of a [`ConnectedBodyInfo`].
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonOptions {
    /// Write the reference URI under `uriHint` instead of `uri`.
    pub reference_uri_hint: bool,
    /// Do not read `uri` when deserializing.
    pub ignore_reference_uri: bool,
}

/// Everything a connected body contributes to a host.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectedBodyInfo {
    pub id: String,
    /// Unique among the connected bodies of one host. Also the name prefix.
    pub name: String,
    /// Host link the body is attached to.
    pub link_name: String,
    /// Where the descriptor came from.
    pub uri: String,
    /// Pose of the connected body frame in the attach link frame.
    pub relative_transform: Pose,
    pub links: Vec<LinkInfo>,
    pub joints: Vec<JointInfo>,
    pub manipulators: Vec<ManipulatorInfo>,
    pub attached_sensors: Vec<AttachedSensorInfo>,
    pub gripper_infos: Vec<GripperInfo>,
    pub activation: TripleActivation,
}

impl ConnectedBodyInfo {
    pub fn new(name: impl Into<String>, link_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link_name: link_name.into(),
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Captures a standalone body so it can be reused as a connected body.
    ///
    /// Joints are zeroed while capturing so link poses do not depend on the
    /// body's current configuration; the body's state is restored afterwards.
    pub fn init_from_body(&mut self, body: &mut KinBody) {
        self.links.clear();
        self.joints.clear();
        self.manipulators.clear();
        self.attached_sensors.clear();
        self.gripper_infos.clear();

        let mut saver = body.save_state();
        saver.set_zero_configuration();

        self.links = saver
            .links()
            .iter()
            .map(|l| l.borrow_mut().update_and_get_info())
            .collect();
        self.joints = saver
            .joints()
            .iter()
            .chain(saver.passive_joints())
            .map(|j| j.borrow().info.clone())
            .collect();
        self.manipulators = saver
            .manipulators()
            .iter()
            .map(|m| m.borrow().info.clone())
            .collect();
        self.attached_sensors = saver
            .attached_sensors()
            .iter()
            .map(|s| s.borrow().info.clone())
            .collect();
        self.gripper_infos = saver
            .gripper_infos()
            .iter()
            .map(|g| g.borrow().clone())
            .collect();
    }

    // --- JSON ---

    pub fn to_json(&self, options: &JsonOptions) -> Result<Value> {
        let mut doc = Map::new();
        doc.insert("id".into(), Value::String(self.id.clone()));
        doc.insert("name".into(), Value::String(self.name.clone()));
        doc.insert("linkName".into(), Value::String(self.link_name.clone()));
        if !self.uri.is_empty() {
            let key = if options.reference_uri_hint {
                "uriHint"
            } else {
                "uri"
            };
            doc.insert(key.into(), Value::String(self.uri.clone()));
        }
        doc.insert("transform".into(), encode("transform", &self.relative_transform)?);

        insert_list(&mut doc, "links", &self.links)?;
        insert_list(&mut doc, "joints", &self.joints)?;
        insert_list(&mut doc, "tools", &self.manipulators)?;
        insert_list(&mut doc, "attachedSensors", &self.attached_sensors)?;
        insert_list(&mut doc, "gripperInfos", &self.gripper_infos)?;

        doc.insert("isActive".into(), Value::from(self.activation.as_i8()));
        Ok(Value::Object(doc))
    }

    pub fn from_json(value: &Value, options: &JsonOptions) -> Result<Self> {
        let mut info = Self::default();
        info.update_from_json(value, options)?;
        Ok(info)
    }

    /// Loads `value` on top of this descriptor. Keys that are absent leave the
    /// current values alone and list entries merge by name.
    pub fn update_from_json(&mut self, value: &Value, options: &JsonOptions) -> Result<()> {
        let Some(doc) = value.as_object() else {
            return Err(ConnectedBodyError::MalformedDocument(
                "connected body is not an object".into(),
            ));
        };

        load_string(doc, "name", &mut self.name)?;
        load_string(doc, "id", &mut self.id)?;
        load_string(doc, "linkName", &mut self.link_name)?;
        if !options.ignore_reference_uri {
            load_string(doc, "uri", &mut self.uri)?;
        }
        if let Some(transform) = doc.get("transform") {
            self.relative_transform =
                serde_json::from_value(transform.clone()).map_err(|source| {
                    ConnectedBodyError::Decode {
                        what: "transform",
                        source,
                    }
                })?;
        }

        merge_list(doc, "links", &mut self.links)?;
        merge_list(doc, "joints", &mut self.joints)?;
        merge_list(doc, "tools", &mut self.manipulators)?;
        merge_list(doc, "attachedSensors", &mut self.attached_sensors)?;
        merge_list(doc, "gripperInfos", &mut self.gripper_infos)?;

        if let Some(active) = doc.get("isActive") {
            let raw = active.as_i64().ok_or_else(|| {
                ConnectedBodyError::MalformedDocument("isActive is not an integer".into())
            })?;
            self.activation = TripleActivation::try_from(raw)?;
        }
        Ok(())
    }

    /// Hex SHA-256 of the canonical JSON form with the activation flag pinned,
    /// so toggling activation never changes the hash.
    pub fn content_hash(&self) -> Result<String> {
        let mut doc = self.to_json(&JsonOptions::default())?;
        if let Some(object) = doc.as_object_mut() {
            object.insert(
                "isActive".into(),
                Value::from(TripleActivation::ActiveShared.as_i8()),
            );
        }
        let bytes = serde_json::to_vec(&doc).map_err(|source| ConnectedBodyError::Decode {
            what: "connected body",
            source,
        })?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

fn encode<T: Serialize>(what: &'static str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|source| ConnectedBodyError::Decode { what, source })
}

fn insert_list<T: Serialize>(doc: &mut Map<String, Value>, key: &'static str, infos: &[T]) -> Result<()> {
    if !infos.is_empty() {
        doc.insert(key.into(), encode(key, &infos)?);
    }
    Ok(())
}

fn merge_list<T: crate::descriptor::NamedInfo>(
    doc: &Map<String, Value>,
    key: &str,
    infos: &mut Vec<T>,
) -> Result<()> {
    if let Some(Value::Array(entries)) = doc.get(key) {
        infos.reserve(entries.len());
        for entry in entries {
            update_or_create_with_name_check(infos, entry)?;
        }
    }
    Ok(())
}

fn load_string(doc: &Map<String, Value>, key: &str, target: &mut String) -> Result<()> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(s)) => {
            target.clone_from(s);
            Ok(())
        }
        Some(_) => Err(ConnectedBodyError::MalformedDocument(format!(
            "{key} is not a string"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_lists_and_uri_are_omitted() {
        let info = ConnectedBodyInfo::new("cb", "base");
        let doc = info.to_json(&JsonOptions::default()).unwrap();
        let object = doc.as_object().unwrap();
        for key in ["links", "joints", "tools", "attachedSensors", "gripperInfos", "uri"] {
            assert!(!object.contains_key(key), "{key} should be omitted");
        }
        assert_eq!(object["isActive"], json!(0));
    }

    #[test]
    fn uri_hint_mode() {
        let mut info = ConnectedBodyInfo::new("cb", "base");
        info.uri = "file:/gripper.json".into();
        let hinted = info
            .to_json(&JsonOptions {
                reference_uri_hint: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hinted["uriHint"], json!("file:/gripper.json"));
        assert!(hinted.get("uri").is_none());
    }

    #[test]
    fn ignore_reference_uri_skips_uri() {
        let doc = json!({"name": "cb", "uri": "file:/x"});
        let options = JsonOptions {
            ignore_reference_uri: true,
            ..Default::default()
        };
        let info = ConnectedBodyInfo::from_json(&doc, &options).unwrap();
        assert!(info.uri.is_empty());
        assert_eq!(info.name, "cb");
    }

    #[test]
    fn activation_out_of_range_is_rejected() {
        let err = ConnectedBodyInfo::from_json(&json!({"isActive": 2}), &JsonOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConnectedBodyError::InvalidActivation(2)));
    }

    #[test]
    fn reset_clears_everything() {
        let mut info = ConnectedBodyInfo::new("cb", "base");
        info.links.push(LinkInfo::new("l"));
        info.activation = TripleActivation::Active;
        info.reset();
        assert_eq!(info, ConnectedBodyInfo::default());
    }
}
