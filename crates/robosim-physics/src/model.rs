//! The model: link/joint registry, controller registry and the tick loop.

use std::collections::BTreeMap;

use nalgebra::Isometry3;
use robosim_description::ModelDescription;
use serde::Serialize;
use slotmap::SlotMap;

use crate::collision::{CollisionChannel, CollisionResponse};
use crate::config::SimConfig;
use crate::controller::{
    ControllerKey, GripperCommand, GripperContext, GripperController, GripperControllerParameters, GripperEvent,
    JointController, JointControllerSettings, ModelView,
};
use crate::error::{BuildError, ModelError};
use crate::factory::{BuildContext, JointFactory, LinkFactory};
use crate::geometry::{BodyGeometry, GeometryProvider};
use crate::joint::{Joint, JointKey, JointStateSnapshot};
use crate::kinematics;
use crate::link::{Link, LinkKey};
use crate::scene::{BodyKey, BodyRole, Scene};

/// Outcome of [`Model::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoadReport {
    /// Links added to the model.
    pub links_built: usize,
    /// Link descriptions that produced no link.
    pub links_skipped: usize,
    /// Joints added to the model.
    pub joints_built: usize,
    /// Joint descriptions that produced no joint.
    pub joints_skipped: usize,
    /// Collision and visual shapes skipped for empty geometry.
    pub shapes_skipped: usize,
}

/// A robot instance.
///
/// The model exclusively owns its links, joints and scene bodies. Joint
/// controllers and grippers refer to them through handles resolved by
/// [`Model::init_controllers`]. [`Model::tick`] is the single entry point
/// sequencing one frame: joint controllers, forward kinematics, grippers.
#[derive(Debug)]
pub struct Model {
    name: String,
    config: SimConfig,
    scene: Scene,
    links: SlotMap<LinkKey, Link>,
    link_names: BTreeMap<String, LinkKey>,
    joints: SlotMap<JointKey, Joint>,
    joint_names: BTreeMap<String, JointKey>,
    controllers: SlotMap<ControllerKey, JointController>,
    controller_names: BTreeMap<String, ControllerKey>,
    grippers: BTreeMap<String, GripperController>,
    events: Vec<GripperEvent>,
    loaded: bool,
    initialized: bool,
    halted: Option<String>,
}

impl Model {
    /// Empty model.
    pub fn new(name: impl Into<String>, config: SimConfig) -> Self {
        Self {
            name: name.into(),
            config,
            scene: Scene::new(),
            links: SlotMap::with_key(),
            link_names: BTreeMap::new(),
            joints: SlotMap::with_key(),
            joint_names: BTreeMap::new(),
            controllers: SlotMap::with_key(),
            controller_names: BTreeMap::new(),
            grippers: BTreeMap::new(),
            events: Vec::new(),
            loaded: false,
            initialized: false,
            halted: None,
        }
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the model was created with.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Scene holding every body of the model.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable scene access.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Replace links and joints with those built from `description`.
    ///
    /// Links and joints that cannot be built are logged and skipped. Props
    /// and registered controllers survive; controllers must be initialized
    /// again before the next tick.
    pub fn load(
        &mut self,
        description: &ModelDescription,
        geometry: &dyn GeometryProvider,
    ) -> Result<LoadReport, ModelError> {
        self.clear_robot();
        let mut report = LoadReport::default();
        let factory = LinkFactory::new(self.config.build.collisionless_links);

        for link_description in &description.links {
            if self.link_names.contains_key(&link_description.name) {
                tracing::error!("Duplicate link '{}' in '{}' skipped", link_description.name, description.name);
                report.links_skipped += 1;
                continue;
            }

            let ctx = BuildContext {
                scene: &mut self.scene,
                geometry,
                config: &self.config.build,
            };
            match factory.load(Some(ctx), Some(link_description)) {
                Ok(link) => {
                    report.shapes_skipped += link.skipped_shapes.len();
                    self.add_link(link)?;
                    report.links_built += 1;
                }
                Err(BuildError::Unsupported { link, reason }) => {
                    tracing::warn!("Link '{}' skipped: {}", link, reason);
                    report.links_skipped += 1;
                }
                Err(err) => {
                    tracing::error!("Link '{}' failed: {}", link_description.name, err);
                    report.links_skipped += 1;
                }
            }
        }

        for joint_description in &description.joints {
            if self.joint_names.contains_key(&joint_description.name) {
                tracing::error!("Duplicate joint '{}' in '{}' skipped", joint_description.name, description.name);
                report.joints_skipped += 1;
                continue;
            }
            match JointFactory.load(&self.links, &self.link_names, joint_description) {
                Ok(joint) => {
                    self.add_joint(joint)?;
                    report.joints_built += 1;
                }
                Err(err) => {
                    tracing::warn!("Joint '{}' skipped: {}", joint_description.name, err);
                    report.joints_skipped += 1;
                }
            }
        }

        kinematics::update_link_poses(&mut self.links, &self.joints, &mut self.scene)?;
        self.loaded = true;

        tracing::info!(
            "Loaded model '{}': {} links ({} skipped), {} joints ({} skipped)",
            self.name,
            report.links_built,
            report.links_skipped,
            report.joints_built,
            report.joints_skipped
        );
        Ok(report)
    }

    fn clear_robot(&mut self) {
        let robot_bodies: Vec<BodyKey> = self
            .scene
            .iter()
            .filter(|(_, body)| body.role != BodyRole::Prop)
            .map(|(key, _)| key)
            .collect();
        for key in robot_bodies {
            self.scene.remove(key);
        }
        self.links.clear();
        self.link_names.clear();
        self.joints.clear();
        self.joint_names.clear();
        self.events.clear();
        self.loaded = false;
        self.initialized = false;
        self.halted = None;
    }

    /// Insert a link. Names are unique; a duplicate is rejected.
    pub fn add_link(&mut self, link: Link) -> Result<LinkKey, ModelError> {
        if self.link_names.contains_key(&link.name) {
            return Err(ModelError::DuplicateLink(link.name));
        }
        let name = link.name.clone();
        let key = self.links.insert(link);
        self.link_names.insert(name, key);
        Ok(key)
    }

    /// Insert a joint. Names are unique; a duplicate is rejected.
    pub fn add_joint(&mut self, joint: Joint) -> Result<JointKey, ModelError> {
        if self.joint_names.contains_key(&joint.name) {
            return Err(ModelError::DuplicateJoint(joint.name));
        }
        let name = joint.name.clone();
        let key = self.joints.insert(joint);
        self.joint_names.insert(name, key);
        Ok(key)
    }

    /// Remove a link and its bodies.
    pub fn remove_link(&mut self, name: &str) -> Result<Link, ModelError> {
        let key = self
            .link_names
            .remove(name)
            .ok_or_else(|| ModelError::LinkNotFound(name.to_string()))?;
        let link = self
            .links
            .remove(key)
            .ok_or_else(|| ModelError::LinkNotFound(name.to_string()))?;
        for body in link.bodies() {
            self.scene.remove(body);
        }
        Ok(link)
    }

    /// Remove a joint.
    pub fn remove_joint(&mut self, name: &str) -> Result<Joint, ModelError> {
        let key = self
            .joint_names
            .remove(name)
            .ok_or_else(|| ModelError::JointNotFound(name.to_string()))?;
        self.joints
            .remove(key)
            .ok_or_else(|| ModelError::JointNotFound(name.to_string()))
    }

    /// Link by name.
    pub fn link(&self, name: &str) -> Option<&Link> {
        self.link_names.get(name).and_then(|key| self.links.get(*key))
    }

    /// Link by handle.
    pub fn link_by_key(&self, key: LinkKey) -> Option<&Link> {
        self.links.get(key)
    }

    /// Joint by name.
    pub fn joint(&self, name: &str) -> Option<&Joint> {
        self.joint_names.get(name).and_then(|key| self.joints.get(*key))
    }

    /// Mutable joint by name.
    pub fn joint_mut(&mut self, name: &str) -> Option<&mut Joint> {
        let key = *self.joint_names.get(name)?;
        self.joints.get_mut(key)
    }

    /// Links in lexical name order.
    pub fn links(&self) -> impl Iterator<Item = (&str, &Link)> {
        self.link_names
            .iter()
            .filter_map(|(name, key)| self.links.get(*key).map(|link| (name.as_str(), link)))
    }

    /// Joints in lexical name order.
    pub fn joints(&self) -> impl Iterator<Item = (&str, &Joint)> {
        self.joint_names
            .iter()
            .filter_map(|(name, key)| self.joints.get(*key).map(|joint| (name.as_str(), joint)))
    }

    /// Number of links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Number of joints.
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Instantaneous state of every joint.
    pub fn get_joint_state(&self) -> JointStateSnapshot {
        self.joints()
            .map(|(name, joint)| (name.to_string(), joint.state()))
            .collect()
    }

    /// Register a joint controller.
    pub fn add_joint_controller(
        &mut self,
        name: impl Into<String>,
        settings: JointControllerSettings,
    ) -> Result<ControllerKey, ModelError> {
        let name = name.into();
        if self.controller_names.contains_key(&name) {
            return Err(ModelError::DuplicateController(name));
        }
        settings.validate(&name)?;
        let key = self.controllers.insert(JointController::new(name.clone(), settings));
        self.controller_names.insert(name, key);
        self.initialized = false;
        Ok(key)
    }

    /// Register a gripper controller.
    pub fn add_gripper(&mut self, params: GripperControllerParameters) -> Result<(), ModelError> {
        if self.grippers.contains_key(&params.name) {
            return Err(ModelError::DuplicateController(params.name));
        }
        params.validate()?;
        self.grippers.insert(params.name.clone(), GripperController::new(params));
        self.initialized = false;
        Ok(())
    }

    /// Replace all controllers with the ones listed in `config`.
    pub fn configure_controllers(&mut self, config: &SimConfig) -> Result<(), ModelError> {
        self.controllers.clear();
        self.controller_names.clear();
        self.grippers.clear();
        for (name, settings) in &config.joint_controllers {
            self.add_joint_controller(name.clone(), settings.clone())?;
        }
        for gripper in &config.grippers {
            self.add_gripper(gripper.clone())?;
        }
        Ok(())
    }

    /// Joint controller by name.
    pub fn joint_controller(&self, name: &str) -> Option<&JointController> {
        self.controller_names.get(name).and_then(|key| self.controllers.get(*key))
    }

    /// Mutable joint controller by name.
    pub fn joint_controller_mut(&mut self, name: &str) -> Option<&mut JointController> {
        let key = *self.controller_names.get(name)?;
        self.controllers.get_mut(key)
    }

    /// Gripper controller by name.
    pub fn gripper(&self, name: &str) -> Option<&GripperController> {
        self.grippers.get(name)
    }

    /// Gripper controllers in lexical name order.
    pub fn grippers(&self) -> impl Iterator<Item = &GripperController> {
        self.grippers.values()
    }

    /// Queue a command for a gripper.
    pub fn command_gripper(&mut self, name: &str, command: GripperCommand) -> Result<(), ModelError> {
        let gripper = self
            .grippers
            .get_mut(name)
            .ok_or_else(|| ModelError::ControllerNotFound(name.to_string()))?;
        gripper.command(command);
        Ok(())
    }

    /// Resolve every controller handle. The model does not tick until this
    /// succeeds.
    pub fn init_controllers(&mut self) -> Result<(), ModelError> {
        self.initialized = false;
        if !self.loaded {
            return Err(ModelError::NotLoaded(self.name.clone()));
        }

        for key in self.controller_names.values() {
            if let Some(controller) = self.controllers.get_mut(*key) {
                controller.init(&self.joints, &self.joint_names)?;
            }
        }

        let view = ModelView {
            links: &self.links,
            link_names: &self.link_names,
            joints: &self.joints,
            joint_names: &self.joint_names,
            controllers: &self.controllers,
            controller_names: &self.controller_names,
        };
        for gripper in self.grippers.values_mut() {
            gripper.init(&view)?;
        }

        self.initialized = true;
        tracing::debug!(
            "Model '{}': {} joint controllers and {} grippers initialized",
            self.name,
            self.controllers.len(),
            self.grippers.len()
        );
        Ok(())
    }

    /// Handles view of the registries.
    pub fn view(&self) -> ModelView<'_> {
        ModelView {
            links: &self.links,
            link_names: &self.link_names,
            joints: &self.joints,
            joint_names: &self.joint_names,
            controllers: &self.controllers,
            controller_names: &self.controller_names,
        }
    }

    /// Advance one frame of `dt` seconds.
    ///
    /// Joint controllers run first in lexical order, then the kinematic
    /// forward pass, then grippers in lexical order. An error halts the
    /// model; every later tick fails with [`ModelError::Halted`].
    pub fn tick(&mut self, dt: f64) -> Result<(), ModelError> {
        if let Some(cause) = &self.halted {
            return Err(ModelError::Halted {
                model: self.name.clone(),
                cause: cause.clone(),
            });
        }
        if !dt.is_finite() || dt < 0.0 {
            return Err(ModelError::InvalidDeltaTime(dt));
        }
        if !self.loaded {
            return Err(ModelError::NotLoaded(self.name.clone()));
        }
        if !self.initialized {
            return Err(ModelError::ControllersNotInitialized(self.name.clone()));
        }

        if let Err(err) = self.step_controllers(dt) {
            tracing::error!("Model '{}' halted: {}", self.name, err);
            self.halted = Some(err.to_string());
            return Err(err);
        }
        Ok(())
    }

    fn step_controllers(&mut self, dt: f64) -> Result<(), ModelError> {
        for key in self.controller_names.values() {
            if let Some(controller) = self.controllers.get_mut(*key) {
                controller.tick(dt, &mut self.joints)?;
            }
        }

        kinematics::update_link_poses(&mut self.links, &self.joints, &mut self.scene)?;

        let mut ctx = GripperContext {
            links: &self.links,
            joints: &self.joints,
            controllers: &mut self.controllers,
            scene: &mut self.scene,
        };
        for gripper in self.grippers.values_mut() {
            let events = gripper.tick(dt, &mut ctx)?;
            self.events.extend(events);
        }
        Ok(())
    }

    /// Place a graspable sphere in the scene.
    pub fn spawn_prop(
        &mut self,
        name: impl Into<String>,
        pose: Isometry3<f64>,
        radius: f64,
    ) -> Result<BodyKey, ModelError> {
        let name = name.into();
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ModelError::InvalidProp {
                name,
                reason: format!("radius must be positive, got {}", radius),
            });
        }
        let key = self.scene.spawn(name, BodyRole::Prop);
        self.scene.set_world_transform(key, pose).map_err(BuildError::from)?;
        if let Some(body) = self.scene.get_mut(key) {
            body.geometry = Some(BodyGeometry::Ball { radius });
            body.simulate_physics = true;
            body.gravity_enabled = true;
            body.collision.object_channel = CollisionChannel::WorldDynamic;
            body.collision.set_response_to_all(CollisionResponse::Block);
        }
        Ok(key)
    }

    /// Take the gripper events produced since the last call.
    pub fn drain_gripper_events(&mut self) -> Vec<GripperEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether a description has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether controllers are initialized.
    pub fn controllers_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether a tick error stopped the model.
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Scene, &mut SlotMap<LinkKey, Link>, &mut SlotMap<JointKey, Joint>) {
        (&mut self.scene, &mut self.links, &mut self.joints)
    }
}
