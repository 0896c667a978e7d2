//! Splices connected bodies into their host.
//!
//! The entry point is [`Robot::compute_connected_bodies_information`]. Every
//! active connected body, in attachment order, has its links, joints,
//! manipulators, attached sensors and gripper descriptors renamed with the
//! body's name prefix, their cross-references rewritten to the new names, and
//! the results appended to the host's live collections.

use crate::config::ConnectedBodyConfig;
use crate::connected_body_info::TripleActivation;
use crate::descriptor::{JointInfo, JointLimit, JointType};
use crate::error::{ConnectedBodyError, Result};
use crate::handle::{ConnectedBody, ResolvedEntry};
use crate::kinbody::{AttachedSensor, Joint, JointPtr, KinBody, Link, Manipulator};
use crate::naming::{NameSubstitution, prefix_reference_fields};
use crate::robot::Robot;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, trace, warn};

impl Robot {
    /// Merges every active connected body into the host structure.
    ///
    /// Does nothing when the hierarchy is already computed; run
    /// [`deinitialize_connected_bodies_information`](Self::deinitialize_connected_bodies_information)
    /// first to merge again.
    ///
    /// # Failure
    ///
    /// The pass is all-or-nothing. If any connected body fails to resolve,
    /// everything spliced so far is removed again before the error is returned,
    /// leaving the host collections as they were before the call.
    pub fn compute_connected_bodies_information(&mut self) -> Result<()> {
        if self.connected_bodies.is_empty() {
            return Ok(());
        }
        if self.body.borrow().is_hierarchy_computed() {
            return Ok(());
        }

        let result = self.compose_all();
        if let Err(err) = &result {
            warn!(
                "merging connected bodies into robot {} failed, rolling back: {err}",
                self.name()
            );
            self.deinitialize_connected_bodies_information();
        }
        result
    }

    fn compose_all(&mut self) -> Result<()> {
        let body = self.body.clone();
        let mut body = body.borrow_mut();
        for index in 0..self.connected_bodies.len() {
            let (processed, rest) = self.connected_bodies.split_at_mut(index);
            let Some((current, remaining)) = rest.split_first_mut() else {
                break;
            };
            compose_connected_body(&mut body, &self.config, processed, current, remaining)?;
        }
        Ok(())
    }
}

/// Names used in error messages.
struct MergeContext {
    robot: String,
    body: String,
}

impl MergeContext {
    fn unresolved(&self, entity: String, reference: &'static str, target: &str) -> ConnectedBodyError {
        ConnectedBodyError::UnresolvedReference {
            body: self.body.clone(),
            robot: self.robot.clone(),
            entity,
            reference,
            target: target.to_string(),
        }
    }

    fn collision(&self, category: &'static str, name: &str) -> ConnectedBodyError {
        ConnectedBodyError::NameCollision {
            body: self.body.clone(),
            robot: self.robot.clone(),
            category,
            name: name.to_string(),
        }
    }
}

/// Looks `name` up among the original names of a connected body and returns
/// the name it resolved to.
fn resolve(names: &[(&str, String)], name: &str) -> Option<String> {
    names
        .iter()
        .find(|(original, _)| *original == name)
        .map(|(_, resolved)| resolved.clone())
}

/// Reuses the entity cached in `slot` when there is one.
fn reuse_or_create<T>(slot: &mut Option<Rc<RefCell<T>>>, value: T) -> Rc<RefCell<T>> {
    match slot {
        Some(existing) => {
            *existing.borrow_mut() = value;
            existing.clone()
        }
        None => {
            let created = Rc::new(RefCell::new(value));
            *slot = Some(created.clone());
            created
        }
    }
}

fn compose_connected_body(
    body: &mut KinBody,
    config: &ConnectedBodyConfig,
    processed: &[ConnectedBody],
    cb: &mut ConnectedBody,
    remaining: &[ConnectedBody],
) -> Result<()> {
    let info = cb.shared_info();
    let ctx = MergeContext {
        robot: body.name().to_string(),
        body: info.name.clone(),
    };

    // 1. Preconditions
    let Some(attach_link) = cb.attaching_link() else {
        return Err(ConnectedBodyError::MissingAttachLink {
            body: ctx.body,
            robot: ctx.robot,
            link: info.link_name.clone(),
        });
    };
    if info.name.is_empty() {
        return Err(ConnectedBodyError::EmptyName {
            robot: ctx.robot,
            link: info.link_name.clone(),
        });
    }
    if remaining.iter().any(|other| other.name() == info.name) {
        return Err(ConnectedBodyError::DuplicateBody {
            robot: ctx.robot,
            body: ctx.body,
        });
    }

    cb.name_prefix = format!("{}_", info.name);
    if !info.activation.is_active() {
        trace!("robot {}: connected body {} is inactive", ctx.robot, ctx.body);
        return Ok(());
    }
    if info.links.is_empty() {
        warn!(
            "connected body {} for robot {} has no link infos, so cannot add anything",
            ctx.body, ctx.robot
        );
        return Ok(());
    }
    if body.link(&info.link_name).is_none() {
        return Err(ConnectedBodyError::MissingAttachLink {
            body: ctx.body,
            robot: ctx.robot,
            link: info.link_name.clone(),
        });
    }

    // 2. Everything the body contributes is placed relative to its attach frame
    let world_attach = attach_link.borrow().transform() * info.relative_transform;
    let prefix = cb.name_prefix.clone();
    cb.size_tables();

    // 3. Links
    for (index, link_info) in info.links.iter().enumerate() {
        let mut resolved = link_info.clone();
        resolved.name = format!("{prefix}{}", link_info.name);
        resolved.transform = world_attach * link_info.transform;
        for name in resolved
            .forced_adjacent_links
            .iter_mut()
            .chain(resolved.noncolliding_links.iter_mut())
        {
            name.insert_str(0, &prefix);
        }
        if body.link(&resolved.name).is_some() {
            return Err(ctx.collision("link", &resolved.name));
        }

        let entry = &mut cb.resolved_links[index];
        let link = reuse_or_create(&mut entry.entity, Link::new(resolved));
        body.push_link(link.clone());
        entry.name = link.borrow().name().to_string();

        // Interchangeable accessories may both be present in the model while
        // only one is mounted, so they must never report collisions with
        // each other.
        if info.activation == TripleActivation::ActiveShared {
            let name = entry.name.clone();
            for prev in processed
                .iter()
                .filter(|p| p.activation() == TripleActivation::ActiveShared)
            {
                for prev_entry in &prev.resolved_links {
                    if let Some(prev_link) = &prev_entry.entity
                        && !prev_entry.name.is_empty()
                    {
                        link.borrow_mut().info.set_noncolliding_link(&prev_entry.name);
                        prev_link.borrow_mut().info.set_noncolliding_link(&name);
                        if body.set_forced_adjacent_links(&name, &prev_entry.name) {
                            cb.added_forced_adjacent
                                .push((name.clone(), prev_entry.name.clone()));
                        }
                    }
                }
            }
        }
    }

    let link_names: Vec<(&str, String)> = info
        .links
        .iter()
        .map(|l| l.name.as_str())
        .zip(cb.resolved_links.iter().map(|e| e.name.clone()))
        .collect();

    // 4. Joints
    let mut new_joints: Vec<JointPtr> = Vec::with_capacity(info.joints.len());
    for (index, joint_info) in info.joints.iter().enumerate() {
        let mut resolved = joint_info.clone();
        resolved.name = format!("{prefix}{}", joint_info.name);
        resolved.link_name0 = resolve(&link_names, &joint_info.link_name0).ok_or_else(|| {
            ctx.unresolved(
                format!("joint '{}'", resolved.name),
                "linkname0",
                &joint_info.link_name0,
            )
        })?;
        resolved.link_name1 = resolve(&link_names, &joint_info.link_name1).ok_or_else(|| {
            ctx.unresolved(
                format!("joint '{}'", resolved.name),
                "linkname1",
                &joint_info.link_name1,
            )
        })?;
        if body.joint(&resolved.name).is_some()
            || new_joints.iter().any(|j| j.borrow().name() == resolved.name)
        {
            return Err(ctx.collision("joint", &resolved.name));
        }

        let entry = &mut cb.resolved_joints[index];
        entry.name = resolved.name.clone();
        new_joints.push(reuse_or_create(&mut entry.entity, Joint::new(resolved)));
    }

    let joint_names: Vec<(&str, String)> = info
        .joints
        .iter()
        .map(|j| j.name.as_str())
        .zip(cb.resolved_joints.iter().map(|e| e.name.clone()))
        .collect();

    let substitution =
        NameSubstitution::new(joint_names.iter().map(|(from, to)| (*from, to.as_str())));
    for joint in new_joints {
        if let Some(substitution) = &substitution
            && let Some(mimic) = joint.borrow_mut().info.mimic.as_mut()
        {
            for equation in &mut mimic.equations {
                *equation = substitution.apply(equation);
            }
        }
        body.push_joint(joint);
    }

    // 5. Manipulators
    let base_link_name = body.links.first().map(|l| l.borrow().name().to_string());
    for (index, manip_info) in info.manipulators.iter().enumerate() {
        let mut resolved = manip_info.clone();
        resolved.name = format!("{prefix}{}", manip_info.name);
        if !resolved.gripper_name.is_empty() {
            resolved.gripper_name.insert_str(0, &prefix);
        }

        if body.manipulator(&resolved.name).is_some() {
            info!(
                "when adding connected body {} for robot {}, got resolved manipulator with same name '{}'. Perhaps trying to overwrite? For now, passing through.",
                ctx.body, ctx.robot, resolved.name
            );
            cb.resolved_manipulators[index] = ResolvedEntry::default();
            continue;
        }

        resolved.base_link_name =
            base_link_name
                .clone()
                .ok_or_else(|| ConnectedBodyError::MissingBaseLink {
                    body: ctx.body.clone(),
                    robot: ctx.robot.clone(),
                    manipulator: resolved.name.clone(),
                })?;

        let entity = format!("manipulator '{}'", resolved.name);
        if !manip_info.ik_chain_end_link_name.is_empty() {
            resolved.ik_chain_end_link_name =
                resolve(&link_names, &manip_info.ik_chain_end_link_name).ok_or_else(|| {
                    ctx.unresolved(
                        entity.clone(),
                        "ikChainEndLink",
                        &manip_info.ik_chain_end_link_name,
                    )
                })?;
        }
        if !manip_info.effector_link_name.is_empty() {
            resolved.effector_link_name = resolve(&link_names, &manip_info.effector_link_name)
                .ok_or_else(|| {
                    ctx.unresolved(
                        entity.clone(),
                        "effectorLink",
                        &manip_info.effector_link_name,
                    )
                })?;
        }
        if !manip_info.tool_changer_link_name.is_empty() {
            // may name a link outside this connected body
            match resolve(&link_names, &manip_info.tool_changer_link_name) {
                Some(name) => resolved.tool_changer_link_name = name,
                None => trace!(
                    "manipulator {} keeps tool changer link {}",
                    resolved.name, manip_info.tool_changer_link_name
                ),
            }
        }
        for joint_name in &mut resolved.gripper_joint_names {
            *joint_name = resolve(&joint_names, joint_name)
                .ok_or_else(|| ctx.unresolved(entity.clone(), "gripper joint", joint_name))?;
        }

        let entry = &mut cb.resolved_manipulators[index];
        entry.name = resolved.name.clone();
        let manip = reuse_or_create(&mut entry.entity, Manipulator::new(resolved));
        body.manipulators.push(manip);
    }

    // 6. Attached sensors
    for (index, sensor_info) in info.attached_sensors.iter().enumerate() {
        let mut resolved = sensor_info.clone();
        resolved.name = format!("{prefix}{}", sensor_info.name);
        if body.attached_sensor(&resolved.name).is_some() {
            return Err(ctx.collision("attached sensor", &resolved.name));
        }
        if !resolved.reference_attached_sensor_name.is_empty() {
            resolved.reference_attached_sensor_name.insert_str(0, &prefix);
        }
        resolved.link_name = resolve(&link_names, &sensor_info.link_name).ok_or_else(|| {
            ctx.unresolved(
                format!("attached sensor '{}'", resolved.name),
                "linkname",
                &sensor_info.link_name,
            )
        })?;

        let entry = &mut cb.resolved_attached_sensors[index];
        entry.name = resolved.name.clone();
        let sensor = reuse_or_create(&mut entry.entity, AttachedSensor::new(resolved));
        body.attached_sensors.push(sensor);
    }

    // 7. Gripper infos
    for (index, gripper_info) in info.gripper_infos.iter().enumerate() {
        let mut resolved = gripper_info.clone();
        resolved.name = format!("{prefix}{}", gripper_info.name);
        if body.gripper_info(&resolved.name).is_some() {
            return Err(ctx.collision("gripper info", &resolved.name));
        }
        let entity = format!("gripper info '{}'", resolved.name);
        for joint_name in &mut resolved.gripper_joint_names {
            *joint_name = resolve(&joint_names, joint_name)
                .ok_or_else(|| ctx.unresolved(entity.clone(), "gripper joint", joint_name))?;
        }

        let mut metadata = Value::Object(std::mem::take(&mut resolved.metadata));
        prefix_reference_fields(&mut metadata, &prefix, &config.reference_field_suffixes);
        if let Value::Object(metadata) = metadata {
            resolved.metadata = metadata;
        }

        let entry = &mut cb.resolved_gripper_infos[index];
        entry.name = resolved.name.clone();
        let gripper = reuse_or_create(&mut entry.entity, resolved);
        body.gripper_infos.push(gripper);
    }

    // 8. Keep the merged subtree connected even without real joints
    cb.dummy_joint_name = format!("{prefix}{}", config.dummy_joint_suffix);
    let dummy = JointInfo {
        name: cb.dummy_joint_name.clone(),
        joint_type: JointType::Prismatic,
        link_name0: info.link_name.clone(),
        link_name1: cb.resolved_links[0].name.clone(),
        limits: Some(JointLimit::ZERO),
        max_acceleration: 0.0,
        is_active: false,
        ..Default::default()
    };
    let dummy = reuse_or_create(&mut cb.dummy_joint_cache, Joint::new(dummy));
    body.push_joint(dummy);

    debug!(
        "robot {}: connected body {} added {} links, {} joints, {} manipulators, {} attached sensors, {} gripper infos",
        ctx.robot,
        ctx.body,
        info.links.len(),
        info.joints.len(),
        cb.resolved_manipulators
            .iter()
            .filter(|e| !e.name.is_empty())
            .count(),
        info.attached_sensors.len(),
        info.gripper_infos.len(),
    );
    Ok(())
}
