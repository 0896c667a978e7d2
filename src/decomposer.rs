//! Removes everything the composer spliced into a host.

use crate::robot::Robot;
use std::collections::HashSet;
use tracing::debug;

impl Robot {
    /// Removes every entity contributed by a connected body from the host.
    ///
    /// Entities are matched by the names recorded in the resolution tables.
    /// Surviving host entities keep their relative order and links are
    /// re-indexed. Forced-adjacent pairs are only removed when the composer
    /// inserted them. The tables keep their cached live entities so a later merge
    /// reuses them, but every recorded name is cleared.
    pub fn deinitialize_connected_bodies_information(&mut self) {
        if self.connected_bodies.is_empty() {
            return;
        }

        let body = self.body.clone();
        let mut body = body.borrow_mut();

        let mut removed_links: HashSet<String> = HashSet::new();
        let mut removed_joints: HashSet<String> = HashSet::new();
        let mut removed_others = 0usize;

        for cb in &mut self.connected_bodies {
            for entry in &mut cb.resolved_links {
                if !entry.name.is_empty() {
                    removed_links.insert(std::mem::take(&mut entry.name));
                }
            }
            for entry in &mut cb.resolved_joints {
                if !entry.name.is_empty() {
                    removed_joints.insert(std::mem::take(&mut entry.name));
                }
            }
            // only what the composer recorded; host-declared pairs stay
            for (a, b) in cb.added_forced_adjacent.drain(..) {
                if body.remove_forced_adjacent_links(&a, &b) {
                    removed_others += 1;
                }
            }
            if !cb.dummy_joint_name.is_empty() {
                removed_joints.insert(std::mem::take(&mut cb.dummy_joint_name));
            }

            for entry in &mut cb.resolved_manipulators {
                if !entry.name.is_empty() && body.remove_manipulator(&entry.name) {
                    removed_others += 1;
                }
                entry.name.clear();
            }
            for entry in &mut cb.resolved_attached_sensors {
                if !entry.name.is_empty() && body.remove_attached_sensor(&entry.name) {
                    removed_others += 1;
                }
                entry.name.clear();
            }
            for entry in &mut cb.resolved_gripper_infos {
                if !entry.name.is_empty() && body.remove_gripper_info(&entry.name) {
                    removed_others += 1;
                }
                entry.name.clear();
            }
        }

        if removed_links.is_empty() && removed_joints.is_empty() && removed_others == 0 {
            return;
        }

        let link_count = body.links.len();
        let joint_count = body.joints.len() + body.passive_joints.len();
        body.links
            .retain(|l| !removed_links.contains(l.borrow().name()));
        body.joints
            .retain(|j| !removed_joints.contains(j.borrow().name()));
        body.passive_joints
            .retain(|j| !removed_joints.contains(j.borrow().name()));
        body.reindex_links();

        debug!(
            "robot {}: removed {} links, {} joints and {} other entities contributed by connected bodies",
            body.name(),
            link_count - body.links.len(),
            joint_count - body.joints.len() - body.passive_joints.len(),
            removed_others,
        );
    }
}
