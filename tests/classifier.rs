// tests/classifier.rs
use connected_body::*;
use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::rc::Rc;

fn host() -> Robot {
    let robot = Robot::new("arm");
    robot.body().borrow_mut().add_link(LinkInfo::new("flange"));
    robot
}

fn tool() -> ConnectedBodyInfo {
    let mut info = ConnectedBodyInfo::new("t", "flange");
    info.id = "tool-1".into();
    info.relative_transform = Pose::new(Quat::from_rotation_x(0.3), Vec3::new(0.0, 0.0, 0.05));
    info.links.push(LinkInfo::new("body"));
    info.links.push(LinkInfo::new("tip"));
    info.joints
        .push(JointInfo::new("spin", JointType::Hinge, "body", "tip"));
    info.activation = TripleActivation::Active;
    info
}

fn attached() -> Robot {
    let mut robot = host();
    robot.add_connected_body(tool(), false).unwrap();
    robot
}

fn classify(robot: &mut Robot, info: &ConnectedBodyInfo) -> UpdateFromInfoResult {
    robot
        .connected_body_mut("t")
        .unwrap()
        .update_from_info(info)
        .unwrap()
}

#[test]
fn test_identical_descriptor_is_no_change() {
    let mut robot = attached();
    assert_eq!(classify(&mut robot, &tool()), UpdateFromInfoResult::NoChange);
}

#[test]
fn test_id_mismatch_is_an_error() {
    let mut robot = attached();
    let mut other = tool();
    other.id = "tool-2".into();
    let err = robot
        .connected_body_mut("t")
        .unwrap()
        .update_from_info(&other)
        .unwrap_err();
    assert!(matches!(err, ConnectedBodyError::IdMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidArguments);
}

#[test]
fn test_structural_changes_require_reinitialize() {
    let mut robot = attached();

    let mut renamed = tool();
    renamed.name = "t2".into();
    let mut relinked = tool();
    relinked.link_name = "base".into();
    let mut moved = tool();
    moved.relative_transform.translation.z += 0.01;
    let mut new_link = tool();
    new_link.links.push(LinkInfo::new("extra"));
    let mut new_joint_type = tool();
    new_joint_type.joints[0].joint_type = JointType::Prismatic;
    let mut new_sensor = tool();
    new_sensor.attached_sensors.push(Default::default());

    for changed in [renamed, relinked, moved, new_link, new_joint_type, new_sensor] {
        assert_eq!(
            classify(&mut robot, &changed),
            UpdateFromInfoResult::RequireReinitialize
        );
    }
}

#[test]
fn test_transform_tolerance_and_quaternion_sign() {
    let mut robot = attached();

    let mut nudged = tool();
    nudged.relative_transform.translation.z += 1e-8;
    assert_eq!(classify(&mut robot, &nudged), UpdateFromInfoResult::NoChange);

    let mut flipped = tool();
    flipped.relative_transform.rotation = -flipped.relative_transform.rotation;
    assert_eq!(classify(&mut robot, &flipped), UpdateFromInfoResult::NoChange);
}

#[test]
fn test_activation_change_applies_in_place_when_detached() {
    let mut robot = attached();
    let mut off = tool();
    off.activation = TripleActivation::Inactive;

    assert_eq!(classify(&mut robot, &off), UpdateFromInfoResult::Success);
    let cb = robot.connected_body("t").unwrap();
    assert_eq!(cb.activation(), TripleActivation::Inactive);
    assert_eq!(classify(&mut robot, &off), UpdateFromInfoResult::NoChange);
}

#[test]
fn test_activation_change_needs_removal_when_computed() {
    let mut robot = attached();
    robot.compute_hierarchy().unwrap();

    let mut off = tool();
    off.activation = TripleActivation::Inactive;
    assert_eq!(
        classify(&mut robot, &off),
        UpdateFromInfoResult::RequireRemoveFromEnvironment
    );
    assert_eq!(
        robot.connected_body("t").unwrap().activation(),
        TripleActivation::Active
    );
}

#[test]
fn test_activation_change_needs_removal_when_host_is_gone() {
    let body = Rc::new(RefCell::new(KinBody::new("arm")));
    body.borrow_mut().add_link(LinkInfo::new("flange"));
    let mut cb = ConnectedBody::new(Rc::downgrade(&body), tool(), 1e-6).unwrap();
    drop(body);

    assert!(cb.robot().is_none());
    assert!(cb.transform().is_none());
    assert!(cb.resolved_links().is_empty());

    let mut off = tool();
    off.activation = TripleActivation::ActiveShared;
    assert_eq!(
        cb.update_from_info(&off).unwrap(),
        UpdateFromInfoResult::RequireRemoveFromEnvironment
    );
}

#[test]
fn test_hash_is_cached_and_activation_free() {
    let mut robot = attached();
    let before = robot
        .connected_body("t")
        .unwrap()
        .info_hash()
        .unwrap()
        .to_string();

    let cb = robot.connected_body_mut("t").unwrap();
    cb.set_active(TripleActivation::Inactive).unwrap();
    assert_eq!(cb.info_hash().unwrap(), before);
    assert_eq!(cb.info().content_hash().unwrap(), before);
}

#[test]
fn test_rebind_resolves_on_new_host() {
    let mut robot = attached();
    robot.compute_hierarchy().unwrap();

    // A structural copy of the merged host
    let copy = Rc::new(RefCell::new(KinBody::new("arm_copy")));
    {
        let source = robot.body().borrow();
        let mut copy = copy.borrow_mut();
        for link in source.links() {
            copy.add_link(link.borrow().info.clone());
        }
        for joint in source.joints().iter().chain(source.passive_joints()) {
            copy.add_joint(joint.borrow().info.clone());
        }
    }

    let cb = robot.connected_body("t").unwrap();
    let rebound = cb.rebind(&copy).unwrap();
    assert!(Rc::ptr_eq(&rebound.robot().unwrap(), &copy));
    assert_eq!(rebound.name_prefix(), "t_");

    let tip = rebound.resolved_links()[1].clone().unwrap();
    assert!(Rc::ptr_eq(&tip, &copy.borrow().link("t_tip").unwrap()));
    assert!(!Rc::ptr_eq(&tip, &cb.resolved_links()[1].clone().unwrap()));
    assert!(rebound.resolved_dummy_joint().is_some());
    assert_eq!(
        rebound.attaching_link().unwrap().borrow().name(),
        "flange"
    );
}

#[test]
fn test_rebind_fails_without_attach_link() {
    let robot = attached();
    let empty = Rc::new(RefCell::new(KinBody::new("bare")));
    let err = robot
        .connected_body("t")
        .unwrap()
        .rebind(&empty)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArguments);
}
