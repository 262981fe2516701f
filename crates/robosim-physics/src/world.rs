//! Physics world management using Rapier3d.
//!
//! A [`PhysicsWorld`] is realized from a built [`Model`]: one rigid body per
//! weld-cluster anchor of the scene, one collider per body with geometry,
//! and one impulse joint per model joint. Joint drives flow from the model
//! into Rapier motors; body poses and measured joint states flow back.

use std::collections::{BTreeMap, HashMap};

use nalgebra::{Isometry3, Vector3};
use rapier3d::dynamics::{
    CCDSolver, GenericJointBuilder, ImpulseJointHandle, ImpulseJointSet, IntegrationParameters, IslandManager,
    JointAxesMask, MultibodyJointSet, RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RigidBodyType,
};
use rapier3d::geometry::{
    BroadPhaseMultiSap, Collider, ColliderBuilder, ColliderSet, Group, InteractionGroups, NarrowPhase,
};
use rapier3d::pipeline::{PhysicsPipeline, QueryPipeline};
use robosim_description::JointKind;

use crate::collision::{CollisionChannel, CollisionEnabled, CollisionSettings};
use crate::colliders::geometry_to_shape;
use crate::config::{PhysicsConfig, DEFAULT_BODY_MASS};
use crate::error::PhysicsError;
use crate::joints::{apply_drive, joint_axis, joint_frames, measure_position, model_joint_to_rapier, MotorGains};
use crate::model::Model;
use crate::pose::{from_physics, to_physics, vector_to_physics};
use crate::scene::{BodyKey, BodyRole, Scene, SceneBody};

/// Interaction group of a collision channel.
pub fn channel_group(channel: CollisionChannel) -> Group {
    match channel {
        CollisionChannel::WorldStatic => Group::GROUP_1,
        CollisionChannel::WorldDynamic => Group::GROUP_2,
        CollisionChannel::RobotSelf => Group::GROUP_3,
        CollisionChannel::Grasp => Group::GROUP_4,
    }
}

/// Rapier collision groups for a body's collision settings.
///
/// The body is a member of its object channel's group and filters on every
/// channel it does not ignore.
pub fn interaction_groups(settings: &CollisionSettings) -> InteractionGroups {
    let filter = settings
        .interacting_channels()
        .fold(Group::empty(), |groups, channel| groups | channel_group(channel));
    InteractionGroups::new(channel_group(settings.object_channel), filter)
}

#[derive(Debug, Clone, Copy)]
struct RealizedJoint {
    handle: ImpulseJointHandle,
    kind: JointKind,
    position: f64,
}

/// Physics simulation world.
pub struct PhysicsWorld {
    // Rapier components
    pipeline: PhysicsPipeline,
    gravity: Vector3<f32>,
    integration_params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    config: PhysicsConfig,

    // Mapping from the model to Rapier
    anchor_to_body: HashMap<BodyKey, RigidBodyHandle>,
    body_offsets: HashMap<BodyKey, (BodyKey, Isometry3<f64>)>,
    link_offsets: HashMap<String, (BodyKey, Isometry3<f64>)>,
    joints: BTreeMap<String, RealizedJoint>,
    grasp_joints: HashMap<BodyKey, ImpulseJointHandle>,

    // Time stepped since the last sync
    elapsed: f64,
}

impl PhysicsWorld {
    /// Create a physics world from a loaded model.
    pub fn from_model(model: &Model, config: &PhysicsConfig) -> Result<Self, PhysicsError> {
        let scene = model.scene();
        if scene.is_empty() {
            return Err(PhysicsError::EmptyModel(model.name().to_string()));
        }

        let mut world = Self::new(config.clone());
        let fixed_anchor = if config.fix_root {
            scene.root().map(|root| scene.physics_anchor(root))
        } else {
            None
        };

        // Group bodies by the rigid body that moves them
        let mut clusters: BTreeMap<BodyKey, Vec<BodyKey>> = BTreeMap::new();
        for (key, _) in scene.iter() {
            clusters.entry(scene.physics_anchor(key)).or_default().push(key);
        }

        for (anchor, members) in &clusters {
            let Some(anchor_body) = scene.get(*anchor) else {
                continue;
            };
            let anchor_pose = *anchor_body.transform();

            let body_type = if Some(*anchor) == fixed_anchor {
                RigidBodyType::Fixed
            } else if anchor_body.simulate_physics {
                RigidBodyType::Dynamic
            } else {
                RigidBodyType::KinematicPositionBased
            };

            let mut colliders = Vec::new();
            for member in members {
                let Some(body) = scene.get(*member) else {
                    continue;
                };
                let offset = anchor_pose.inverse() * body.transform();
                world.body_offsets.insert(*member, (*anchor, offset));
                if let Some(collider) = world.build_collider(body, &offset) {
                    colliders.push(collider);
                }
            }

            // Rapier only takes extra solver iterations per body; the
            // velocity iteration count has no per-body counterpart.
            let base_iterations = world.integration_params.num_solver_iterations.get();
            let additional_iterations = (anchor_body.solver_iterations.position as usize).saturating_sub(base_iterations);
            let gravity_scale = if anchor_body.gravity_enabled { 1.0 } else { 0.0 };

            let mut builder = RigidBodyBuilder::new(body_type)
                .position(to_physics(&anchor_pose))
                .gravity_scale(gravity_scale)
                .additional_solver_iterations(additional_iterations);
            if body_type.is_dynamic() && colliders.iter().all(|c: &Collider| c.is_sensor()) {
                builder = builder.additional_mass(DEFAULT_BODY_MASS as f32);
            }

            let handle = world.bodies.insert(builder.build());
            for collider in colliders {
                world.colliders.insert_with_parent(collider, handle, &mut world.bodies);
            }
            world.anchor_to_body.insert(*anchor, handle);
        }

        for (name, link) in model.links() {
            let Some(body) = link.anchor_body() else {
                continue;
            };
            let anchor = scene.physics_anchor(body);
            if let Some(anchor_pose) = scene.world_transform(anchor) {
                world
                    .link_offsets
                    .insert(name.to_string(), (anchor, anchor_pose.inverse() * link.world_pose()));
            }
        }

        world.create_joints(model);

        tracing::info!(
            "Physics world for '{}': {} rigid bodies, {} colliders, {} joints",
            model.name(),
            world.bodies.len(),
            world.colliders.len(),
            world.joints.len()
        );
        Ok(world)
    }

    /// Create an empty physics world.
    fn new(config: PhysicsConfig) -> Self {
        let [x, y, z] = config.gravity;
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector_to_physics(&Vector3::new(x, y, z)),
            integration_params: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            config,
            anchor_to_body: HashMap::new(),
            body_offsets: HashMap::new(),
            link_offsets: HashMap::new(),
            joints: BTreeMap::new(),
            grasp_joints: HashMap::new(),
            elapsed: 0.0,
        }
    }

    fn build_collider(&self, body: &SceneBody, offset: &Isometry3<f64>) -> Option<Collider> {
        let geometry = body.geometry.as_ref()?;
        if body.collision.ignores_everything() {
            return None;
        }

        let (shape, shape_offset) = match geometry_to_shape(geometry, self.config.collider_strategy, &body.name) {
            Ok(shape) => shape,
            Err(err) => {
                tracing::warn!("No collider for '{}': {}", body.name, err);
                return None;
            }
        };

        let sensor = body.collision.is_overlap_only() || body.collision.enabled == CollisionEnabled::QueryOnly;
        let builder = ColliderBuilder::new(shape)
            .position(to_physics(offset) * shape_offset)
            .friction(self.config.friction as f32)
            .restitution(self.config.restitution as f32)
            .collision_groups(interaction_groups(&body.collision))
            .sensor(sensor);
        let builder = match body.mass_override {
            Some(mass) => builder.mass(mass as f32),
            None => builder.density(self.config.density as f32),
        };
        Some(builder.build())
    }

    fn create_joints(&mut self, model: &Model) {
        let scene = model.scene();
        for (name, joint) in model.joints() {
            let (Some(parent_link), Some(child_link)) = (model.link_by_key(joint.parent), model.link_by_key(joint.child))
            else {
                tracing::warn!("Joint '{}' has a missing link, not simulated", name);
                continue;
            };
            let (Some(parent_body), Some(child_body)) = (parent_link.anchor_body(), child_link.anchor_body()) else {
                tracing::warn!("Joint '{}' connects a link without bodies, not simulated", name);
                continue;
            };

            let parent_anchor = scene.physics_anchor(parent_body);
            let child_anchor = scene.physics_anchor(child_body);
            if parent_anchor == child_anchor {
                tracing::debug!("Joint '{}' links bodies of one rigid cluster", name);
                continue;
            }

            let (Some(&body1), Some(&body2)) = (
                self.anchor_to_body.get(&parent_anchor),
                self.anchor_to_body.get(&child_anchor),
            ) else {
                continue;
            };
            let (Some(parent_pose), Some(child_pose)) =
                (scene.world_transform(parent_anchor), scene.world_transform(child_anchor))
            else {
                continue;
            };

            let (frame1, frame2) = joint_frames(
                joint,
                parent_link.world_pose(),
                child_link.world_pose(),
                &parent_pose,
                &child_pose,
            );
            let data = model_joint_to_rapier(joint, &frame1, &frame2);
            let handle = self.impulse_joints.insert(body1, body2, data, true);
            self.joints.insert(
                name.to_string(),
                RealizedJoint {
                    handle,
                    kind: joint.kind,
                    position: joint.position(),
                },
            );
        }
    }

    /// Copy joint drives to motors and follow scene edits made by the model.
    ///
    /// Kinematic bodies are moved to their scene pose, and props welded to
    /// or detached from a gripper gain or lose their fixed joint.
    pub fn apply_drives(&mut self, model: &Model) {
        let gains = MotorGains {
            kinematic_stiffness: self.config.kinematic_stiffness,
            kinematic_damping: self.config.kinematic_damping,
        };
        for (name, realized) in &self.joints {
            let Some(joint) = model.joint(name) else {
                continue;
            };
            if let Some(rapier_joint) = self.impulse_joints.get_mut(realized.handle, true) {
                apply_drive(&mut rapier_joint.data, realized.kind, &joint.drive, gains);
            }
        }

        let scene = model.scene();
        self.follow_kinematic_bodies(scene);
        self.sync_grasp_joints(scene);
    }

    fn follow_kinematic_bodies(&mut self, scene: &Scene) {
        for (anchor, handle) in &self.anchor_to_body {
            let Some(body) = self.bodies.get_mut(*handle) else {
                continue;
            };
            if !body.is_kinematic() {
                continue;
            }
            if let Some(pose) = scene.world_transform(*anchor) {
                body.set_next_kinematic_position(to_physics(&pose));
            }
        }
    }

    fn sync_grasp_joints(&mut self, scene: &Scene) {
        let released: Vec<BodyKey> = self
            .grasp_joints
            .keys()
            .filter(|prop| scene.get(**prop).map_or(true, |body| body.weld_parent().is_none()))
            .copied()
            .collect();
        for prop in released {
            if let Some(handle) = self.grasp_joints.remove(&prop) {
                self.impulse_joints.remove(handle, true);
                tracing::debug!("Grasp joint for {:?} removed", prop);
            }
        }

        for (prop, body) in scene.bodies_with_role(BodyRole::Prop) {
            let Some(holder) = body.weld_parent() else {
                continue;
            };
            if self.grasp_joints.contains_key(&prop) {
                continue;
            }
            let (Some(&holder_handle), Some(&prop_handle)) = (
                self.anchor_to_body.get(&scene.physics_anchor(holder)),
                self.anchor_to_body.get(&prop),
            ) else {
                continue;
            };
            let (Some(holder_body), Some(prop_body)) = (self.bodies.get(holder_handle), self.bodies.get(prop_handle))
            else {
                continue;
            };

            let data = GenericJointBuilder::new(JointAxesMask::LOCKED_FIXED_AXES)
                .local_frame1(holder_body.position().inverse() * prop_body.position())
                .contacts_enabled(false)
                .build();
            let handle = self.impulse_joints.insert(holder_handle, prop_handle, data, true);
            self.grasp_joints.insert(prop, handle);
            tracing::debug!("Grasp joint for '{}' created", body.name);
        }
    }

    /// Step the physics simulation by dt seconds.
    pub fn step(&mut self, dt: f64) {
        self.integration_params.dt = dt as f32;

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        self.elapsed += dt;
    }

    /// Write simulated body poses, link poses and joint states back.
    ///
    /// Joints whose drive is kinematic keep the state their controller
    /// integrated.
    pub fn sync_to_model(&mut self, model: &mut Model) {
        let (scene, links, joints) = model.parts_mut();

        for (key, (anchor, offset)) in &self.body_offsets {
            let Some(pose) = self.anchor_pose(*anchor) else {
                continue;
            };
            if scene.contains(*key) {
                if let Err(err) = scene.set_world_transform(*key, pose * offset) {
                    tracing::warn!("Body sync failed: {}", err);
                }
            }
        }

        for (_, link) in links.iter_mut() {
            let Some((anchor, offset)) = self.link_offsets.get(&link.name) else {
                continue;
            };
            if let Some(pose) = self.anchor_pose(*anchor) {
                link.set_world_pose(pose * offset);
            }
        }

        let elapsed = std::mem::take(&mut self.elapsed);
        let dt = self.integration_params.dt as f64;
        for (_, joint) in joints.iter_mut() {
            if !joint.is_movable() {
                continue;
            }
            let Some(realized) = self.joints.get_mut(&joint.name) else {
                continue;
            };
            let Some(rapier_joint) = self.impulse_joints.get(realized.handle) else {
                continue;
            };
            let (Some(body1), Some(body2)) = (self.bodies.get(rapier_joint.body1), self.bodies.get(rapier_joint.body2))
            else {
                continue;
            };

            let frame1 = from_physics(&(body1.position() * rapier_joint.data.local_frame1));
            let frame2 = from_physics(&(body2.position() * rapier_joint.data.local_frame2));
            let position = measure_position(realized.kind, &(frame1.inverse() * frame2), realized.position);
            let velocity = if elapsed > 0.0 {
                (position - realized.position) / elapsed
            } else {
                0.0
            };
            let impulse = rapier_joint.impulses[joint_axis(realized.kind) as usize] as f64;
            let effort = if dt > 0.0 { impulse / dt } else { 0.0 };
            realized.position = position;

            if joint.drive.kinematic {
                continue;
            }
            joint.set_state(position, velocity);
            joint.set_effort(effort);
        }
    }

    fn anchor_pose(&self, anchor: BodyKey) -> Option<Isometry3<f64>> {
        let handle = self.anchor_to_body.get(&anchor)?;
        self.bodies.get(*handle).map(|body| from_physics(body.position()))
    }

    /// Simulated world pose of a scene body.
    pub fn body_pose(&self, key: BodyKey) -> Option<Isometry3<f64>> {
        let (anchor, offset) = self.body_offsets.get(&key)?;
        self.anchor_pose(*anchor).map(|pose| pose * offset)
    }

    /// Whether a prop is currently held by a grasp joint.
    pub fn holds(&self, prop: BodyKey) -> bool {
        self.grasp_joints.contains_key(&prop)
    }

    /// Set gravity vector.
    pub fn set_gravity(&mut self, gravity: Vector3<f64>) {
        self.gravity = vector_to_physics(&gravity);
    }

    /// Settings the world was built with.
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Number of Rapier rigid bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of Rapier colliders.
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Names of the simulated joints, in lexical order.
    pub fn joint_names(&self) -> impl Iterator<Item = &str> {
        self.joints.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::CollisionResponse;

    #[test]
    fn robot_bodies_without_self_collision_skip_each_other() {
        let mut robot = CollisionSettings::default();
        robot.object_channel = CollisionChannel::RobotSelf;
        robot.set_response(CollisionChannel::RobotSelf, CollisionResponse::Ignore);

        let mut prop = CollisionSettings::default();
        prop.object_channel = CollisionChannel::WorldDynamic;

        let robot_groups = interaction_groups(&robot);
        let prop_groups = interaction_groups(&prop);
        assert!(!robot_groups.test(robot_groups));
        assert!(robot_groups.test(prop_groups));
    }

    #[test]
    fn ignore_all_has_an_empty_filter() {
        let mut settings = CollisionSettings::default();
        settings.set_response_to_all(CollisionResponse::Ignore);
        assert_eq!(interaction_groups(&settings).filter, Group::empty());
    }
}
