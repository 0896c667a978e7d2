// tests/descriptor_json.rs
use connected_body::{
    AttachedSensorInfo, ConnectedBodyInfo, GeometryInfo, GripperInfo, JointInfo, JointLimit,
    JointType, JsonOptions, KinBody, LinkInfo, ManipulatorInfo, MimicInfo, Pose, SensorType,
    ShapePrimitive, TripleActivation,
};
use glam::{Quat, Vec3};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

fn sample() -> ConnectedBodyInfo {
    let mut info = ConnectedBodyInfo::new("cam_head", "flange");
    info.id = "head-7".into();
    info.uri = "file:/heads/cam.json".into();
    info.relative_transform = Pose::new(
        Quat::from_rotation_z(0.5),
        Vec3::new(0.1, -0.2, 0.3),
    );
    let mut housing = LinkInfo::new("housing");
    housing.mass = 0.4;
    housing.geometries.push(GeometryInfo {
        name: "shell".into(),
        shape: ShapePrimitive::Box(Vec3::new(0.05, 0.05, 0.1)),
        transform: Pose::IDENTITY,
    });
    info.links.push(housing);
    info.links.push(LinkInfo::new("lens"));
    let mut tilt = JointInfo::new("tilt", JointType::Hinge, "housing", "lens");
    tilt.limits = Some(JointLimit {
        min: -1.0,
        max: 1.0,
        effort: 2.0,
        velocity: 3.0,
    });
    tilt.mimic = Some(MimicInfo {
        equations: vec!["pan*0.5".into()],
    });
    info.joints.push(tilt);
    let mut grip = GripperInfo {
        name: "none".into(),
        gripper_type: "dummy".into(),
        ..Default::default()
    };
    grip.metadata.insert("toolName".into(), json!("lens"));
    info.gripper_infos.push(grip);
    info.manipulators.push(ManipulatorInfo {
        name: "aim".into(),
        ik_chain_end_link_name: "lens".into(),
        effector_link_name: "lens".into(),
        tool_changer_link_name: "flange".into(),
        gripper_name: "none".into(),
        gripper_joint_names: vec!["tilt".into()],
        local_tool_transform: Pose::from_translation(Vec3::Z),
        ..Default::default()
    });
    info.attached_sensors.push(AttachedSensorInfo {
        name: "depth".into(),
        link_name: "lens".into(),
        reference_attached_sensor_name: "rgb".into(),
        sensor_type: SensorType::Lidar,
        ..Default::default()
    });
    info.activation = TripleActivation::ActiveShared;
    info
}

#[test]
fn test_document_round_trip() {
    let info = sample();
    let doc = info.to_json(&JsonOptions::default()).unwrap();
    assert_eq!(doc["isActive"], json!(-1));
    assert_eq!(doc["linkName"], json!("flange"));
    assert_eq!(doc["joints"][0]["parentLinkName"], json!("housing"));
    assert_eq!(doc["gripperInfos"][0]["grippertype"], json!("dummy"));
    assert_eq!(doc["gripperInfos"][0]["toolName"], json!("lens"));
    assert_eq!(doc["tools"][0]["toolChangerLinkName"], json!("flange"));
    assert_eq!(doc["attachedSensors"][0]["referenceAttachedSensorName"], json!("rgb"));

    let back = ConnectedBodyInfo::from_json(&doc, &JsonOptions::default()).unwrap();
    assert_eq!(back, info);
}

#[test]
fn test_text_round_trip() {
    let info = sample();
    let text = serde_json::to_string(&info.to_json(&JsonOptions::default()).unwrap()).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    let back = ConnectedBodyInfo::from_json(&doc, &JsonOptions::default()).unwrap();
    assert_eq!(back, info);
}

#[test]
fn test_partial_update_merges_by_name() {
    let mut info = sample();
    info.update_from_json(
        &json!({
            "links": [
                {"name": "lens", "isVisible": false},
                {"name": "hood"}
            ],
            "joints": [{"name": "tilt", "__deleted__": true}]
        }),
        &JsonOptions::default(),
    )
    .unwrap();

    assert_eq!(info.name, "cam_head");
    let names: Vec<&str> = info.links.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["housing", "lens", "hood"]);
    assert!(!info.links[1].is_visible);
    assert!(info.joints.is_empty());
}

#[test]
fn test_malformed_documents_are_invalid_arguments() {
    let options = JsonOptions::default();
    for doc in [
        json!([1, 2]),
        json!({"name": 5}),
        json!({"isActive": "yes"}),
        json!({"links": [{"name": "a", "mass": "heavy"}]}),
    ] {
        let err = ConnectedBodyInfo::from_json(&doc, &options).unwrap_err();
        assert_eq!(err.kind(), connected_body::ErrorKind::InvalidArguments, "{doc}");
    }
}

#[test]
fn test_hash_ignores_activation_only() {
    let mut info = sample();
    let shared = info.content_hash().unwrap();
    assert_eq!(shared.len(), 64);
    assert!(shared.chars().all(|c| c.is_ascii_hexdigit()));

    info.activation = TripleActivation::Inactive;
    assert_eq!(info.content_hash().unwrap(), shared);

    let edits: [fn(&mut ConnectedBodyInfo); 5] = [
        |i| i.links[1].name = "lens2".into(),
        |i| i.joints[0].joint_type = JointType::Prismatic,
        |i| i.manipulators[0].gripper_joint_names.clear(),
        |i| i.attached_sensors[0].reference_attached_sensor_name = "ir".into(),
        |i| {
            i.gripper_infos[0]
                .metadata
                .insert("toolName".into(), json!("hood"));
        },
    ];
    for edit in edits {
        let mut changed = info.clone();
        edit(&mut changed);
        assert_ne!(changed.content_hash().unwrap(), shared);
    }
}

#[test]
fn test_init_from_body_captures_zero_configuration() {
    let mut body = KinBody::new("head");
    let mut housing = LinkInfo::new("housing");
    housing.transform = Pose::from_translation(Vec3::Y);
    let housing = body.add_link(housing);
    body.add_link(LinkInfo::new("lens"));
    body.add_joint(JointInfo::new("tilt", JointType::Hinge, "housing", "lens"));
    let mut passive = JointInfo::new("cable", JointType::Fixed, "housing", "lens");
    passive.is_active = false;
    body.add_joint(passive);

    body.set_dof_values(&[0.4]);
    housing
        .borrow_mut()
        .set_transform(Pose::from_translation(Vec3::X));

    let mut info = ConnectedBodyInfo::new("cam_head", "flange");
    info.init_from_body(&mut body);

    assert_eq!(info.links.len(), 2);
    assert_eq!(info.links[0].transform, Pose::from_translation(Vec3::Y));
    let joints: Vec<&str> = info.joints.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(joints, vec!["tilt", "cable"]);

    // live state is untouched
    assert_eq!(body.dof_values(), vec![0.4]);
    assert_eq!(housing.borrow().transform(), Pose::from_translation(Vec3::X));
}

fn activation() -> impl Strategy<Value = TripleActivation> {
    prop_oneof![
        Just(TripleActivation::Inactive),
        Just(TripleActivation::Active),
        Just(TripleActivation::ActiveShared),
    ]
}

proptest! {
    #[test]
    fn prop_hash_is_activation_independent(
        name in "[a-z]{1,8}",
        link in "[a-z]{1,8}",
        a in activation(),
        b in activation(),
    ) {
        let mut info = ConnectedBodyInfo::new(name, "flange");
        info.links.push(LinkInfo::new(link));
        info.activation = a;
        let first = info.content_hash().unwrap();
        info.activation = b;
        prop_assert_eq!(first, info.content_hash().unwrap());
    }

    #[test]
    fn prop_round_trip_preserves_names(
        links in proptest::collection::btree_set("[a-z]{1,6}", 0..5),
        x in -10.0f32..10.0,
    ) {
        let mut info = ConnectedBodyInfo::new("cb", "flange");
        info.relative_transform = Pose::from_translation(Vec3::new(x, 0.0, 0.0));
        info.links = links.iter().map(LinkInfo::new).collect();
        let doc = info.to_json(&JsonOptions::default()).unwrap();
        let back = ConnectedBodyInfo::from_json(&doc, &JsonOptions::default()).unwrap();
        prop_assert_eq!(back, info);
    }
}
