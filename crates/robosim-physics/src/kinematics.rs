//! Forward kinematics over the link tree.

use std::collections::{BTreeMap, HashSet, VecDeque};

use nalgebra::Isometry3;
use slotmap::SlotMap;

use crate::error::ModelError;
use crate::joint::{Joint, JointKey};
use crate::link::{Link, LinkKey};
use crate::scene::Scene;

/// Joints ordered so that every joint comes after the joint that places its
/// parent link. Links reached twice keep their first placement.
pub fn topological_order(links: &SlotMap<LinkKey, Link>, joints: &SlotMap<JointKey, Joint>) -> Vec<JointKey> {
    let mut by_parent: BTreeMap<LinkKey, Vec<JointKey>> = BTreeMap::new();
    let mut children = HashSet::new();
    for (key, joint) in joints {
        by_parent.entry(joint.parent).or_default().push(key);
        children.insert(joint.child);
    }
    for list in by_parent.values_mut() {
        list.sort_by(|a, b| joints[*a].name.cmp(&joints[*b].name));
    }

    let mut queue: VecDeque<LinkKey> = links.keys().filter(|k| !children.contains(k)).collect();
    let mut placed: HashSet<LinkKey> = queue.iter().copied().collect();
    let mut order = Vec::with_capacity(joints.len());

    while let Some(link) = queue.pop_front() {
        for &key in by_parent.get(&link).into_iter().flatten() {
            let child = joints[key].child;
            if placed.insert(child) {
                order.push(key);
                queue.push_back(child);
            }
        }
    }
    order
}

/// Move a link and every body it owns to a new pose.
pub fn move_link(link: &mut Link, scene: &mut Scene, pose: Isometry3<f64>) {
    let delta = pose * link.world_pose().inverse();
    for key in link.bodies().collect::<Vec<_>>() {
        if let Some(current) = scene.world_transform(key) {
            if let Err(err) = scene.set_world_transform(key, delta * current) {
                tracing::warn!("Link '{}': {}", link.name, err);
            }
        }
    }
    link.set_world_pose(pose);
}

/// Recompute child link poses from joint positions, root links first.
///
/// A joint whose parent or child link no longer exists is an error.
pub fn update_link_poses(
    links: &mut SlotMap<LinkKey, Link>,
    joints: &SlotMap<JointKey, Joint>,
    scene: &mut Scene,
) -> Result<(), ModelError> {
    for (_, joint) in joints {
        for (key, name) in [(joint.parent, &joint.parent_name), (joint.child, &joint.child_name)] {
            if !links.contains_key(key) {
                return Err(ModelError::DanglingLink {
                    joint: joint.name.clone(),
                    link: name.clone(),
                });
            }
        }
    }

    for key in topological_order(links, joints) {
        let joint = &joints[key];
        let parent_pose = *links[joint.parent].world_pose();
        let pose = joint.child_pose(&parent_pose, joint.position());
        move_link(&mut links[joint.child], scene, pose);
    }
    Ok(())
}

/// Put every link back at its base pose.
pub fn reset_link_poses(links: &mut SlotMap<LinkKey, Link>, scene: &mut Scene) {
    for (_, link) in links.iter_mut() {
        let base = *link.base_pose();
        move_link(link, scene, base);
    }
}
