//! Gripper controllers: close a gripper joint until a grasp is detected,
//! hold the grasped object and release it on command.

use serde::{Deserialize, Serialize};

use super::grasp::{GraspComponent, GraspComponentSetting};
use super::joint::JointTarget;
use super::{GripperContext, ModelView};
use crate::controller::ControllerKey;
use crate::error::ControllerError;
use crate::joint::JointKey;
use crate::link::LinkKey;

/// How a gripper decides that it holds something.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraspStrategy {
    /// The jaw stalled while the grasp component is engaged.
    #[default]
    Stall,
    /// The grasp component is engaged; jaw motion is not considered.
    Contact,
    /// The jaw stalled after closing at least `threshold` of its travel.
    Position {
        /// Fraction of the open-to-closed travel, in `(0, 1]`.
        threshold: f64,
    },
}

/// Gripper configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GripperControllerParameters {
    /// Controller name.
    pub name: String,
    /// Joint that opens and closes the jaw.
    pub gripper_joint_name: String,
    /// Name of the owned grasp component.
    pub grasp_component_name: String,
    /// Joint controller driving the gripper joint.
    pub joint_controller: String,
    /// Invert the grasp condition.
    pub invert_grasp_condition: bool,
    /// Grasp detection strategy.
    pub strategy: GraspStrategy,
    /// Grasp component placement.
    pub grasp_comp_setting: GraspComponentSetting,
    /// Open jaw position; defaults to the joint's lower limit.
    pub open_position: Option<f64>,
    /// Closed jaw position; defaults to the joint's upper limit.
    pub closed_position: Option<f64>,
    /// Largest per-tick motion still counted as a stall.
    pub stall_tolerance: f64,
    /// Distance from the open position at which releasing is complete.
    pub open_tolerance: f64,
}

impl Default for GripperControllerParameters {
    fn default() -> Self {
        Self {
            name: String::new(),
            gripper_joint_name: String::new(),
            grasp_component_name: String::new(),
            joint_controller: String::new(),
            invert_grasp_condition: false,
            strategy: GraspStrategy::Stall,
            grasp_comp_setting: GraspComponentSetting::default(),
            open_position: None,
            closed_position: None,
            stall_tolerance: 1.0e-6,
            open_tolerance: 1.0e-3,
        }
    }
}

impl GripperControllerParameters {
    /// Reject parameters the controller cannot work with.
    pub fn validate(&self) -> Result<(), ControllerError> {
        let invalid = |reason: &str| ControllerError::InvalidParameters {
            controller: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.is_empty() {
            return Err(invalid("empty gripper name"));
        }
        if self.gripper_joint_name.is_empty() {
            return Err(invalid("empty gripper joint name"));
        }
        if self.joint_controller.is_empty() {
            return Err(invalid("empty joint controller name"));
        }
        if self.grasp_comp_setting.gripper_name.is_empty() {
            return Err(invalid("grasp component has no gripper link"));
        }
        if !(self.grasp_comp_setting.radius > 0.0) {
            return Err(invalid("grasp radius must be positive"));
        }
        if !(self.stall_tolerance >= 0.0) || !(self.open_tolerance >= 0.0) {
            return Err(invalid("tolerances must be non-negative"));
        }
        if let GraspStrategy::Position { threshold } = self.strategy {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(invalid("position threshold must be in (0, 1]"));
            }
        }
        if [self.open_position, self.closed_position]
            .iter()
            .flatten()
            .any(|p| !p.is_finite())
        {
            return Err(invalid("jaw positions must be finite"));
        }
        Ok(())
    }
}

/// Gripper state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum GripperState {
    /// Open and waiting.
    #[default]
    Idle,
    /// Closing until a grasp is detected.
    Closing,
    /// Holding.
    Grasped,
    /// Opening.
    Releasing,
}

/// External gripper commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GripperCommand {
    /// Start closing.
    Close,
    /// Open and let go.
    Open,
}

/// Grasp and release notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GripperEvent {
    /// A grasp was detected.
    Grasped {
        /// Gripper controller name.
        gripper: String,
        /// Fixated object, if one was in reach.
        object: Option<String>,
    },
    /// The gripper let go.
    Released {
        /// Gripper controller name.
        gripper: String,
        /// Detached object, if one was held.
        object: Option<String>,
    },
}

/// Drives one gripper joint through its joint controller and owns the
/// grasp component at the tool center point.
///
/// Every tick evaluates the state machine against the jaw position sampled
/// on the previous tick and then samples the position once, so a stall is
/// "no motion since last tick".
#[derive(Debug, Clone)]
pub struct GripperController {
    params: GripperControllerParameters,
    state: GripperState,
    grasp_component: GraspComponent,
    joint: Option<JointKey>,
    joint_controller: Option<ControllerKey>,
    grasp_link: Option<LinkKey>,
    open_position: f64,
    closed_position: f64,
    old_position: Option<f64>,
    grasp_inversion: bool,
    pending: Option<GripperCommand>,
    initialized: bool,
}

impl Default for GripperController {
    fn default() -> Self {
        Self::new(GripperControllerParameters::default())
    }
}

impl GripperController {
    /// Controller bound to parameters; call [`init`](Self::init) before use.
    pub fn new(params: GripperControllerParameters) -> Self {
        let grasp_component = GraspComponent::new(
            params.grasp_component_name.clone(),
            params.grasp_comp_setting.clone(),
        );
        let grasp_inversion = params.invert_grasp_condition;
        Self {
            params,
            state: GripperState::Idle,
            grasp_component,
            joint: None,
            joint_controller: None,
            grasp_link: None,
            open_position: 0.0,
            closed_position: 0.0,
            old_position: None,
            grasp_inversion,
            pending: None,
            initialized: false,
        }
    }

    /// Replace the parameters. Takes effect on the next [`init`](Self::init).
    pub fn set_controller_parameters(&mut self, params: GripperControllerParameters) {
        *self = Self::new(params);
    }

    /// Parameters.
    pub fn params(&self) -> &GripperControllerParameters {
        &self.params
    }

    /// Controller name.
    pub fn name(&self) -> &str {
        &self.params.name
    }

    /// State machine state.
    pub fn state(&self) -> GripperState {
        self.state
    }

    /// The owned grasp component.
    pub fn grasp_component(&self) -> &GraspComponent {
        &self.grasp_component
    }

    /// Jaw position sampled on the last tick.
    pub fn old_position(&self) -> Option<f64> {
        self.old_position
    }

    /// Whether [`init`](Self::init) succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Resolve the gripper joint, its joint controller and the grasp link.
    pub fn init(&mut self, view: &ModelView<'_>) -> Result<(), ControllerError> {
        self.initialized = false;
        self.params.validate()?;
        let name = self.params.name.clone();

        let joint_key = view
            .joint_names
            .get(&self.params.gripper_joint_name)
            .copied()
            .filter(|key| view.joints.contains_key(*key))
            .ok_or_else(|| ControllerError::JointNotFound {
                controller: name.clone(),
                joint: self.params.gripper_joint_name.clone(),
            })?;

        let controller_key = view
            .controller_names
            .get(&self.params.joint_controller)
            .copied()
            .filter(|key| view.controllers.contains_key(*key))
            .ok_or_else(|| ControllerError::JointControllerNotFound {
                controller: name.clone(),
                joint_controller: self.params.joint_controller.clone(),
            })?;
        if !view.controllers[controller_key].controls(&self.params.gripper_joint_name) {
            return Err(ControllerError::JointNotControlled {
                controller: self.params.joint_controller.clone(),
                joint: self.params.gripper_joint_name.clone(),
            });
        }

        let joint = &view.joints[joint_key];
        let open = self.params.open_position.unwrap_or(joint.open_limit());
        let closed = self.params.closed_position.unwrap_or(joint.closed_limit());
        if !open.is_finite() || !closed.is_finite() || open == closed {
            return Err(ControllerError::InvalidParameters {
                controller: name,
                reason: format!(
                    "gripper joint '{}' needs distinct finite open and closed positions",
                    joint.name
                ),
            });
        }

        self.grasp_component.init(view.links, view.link_names)?;

        self.joint = Some(joint_key);
        self.joint_controller = Some(controller_key);
        self.grasp_link = self.grasp_component.link();
        self.open_position = open;
        self.closed_position = closed;
        self.old_position = None;
        self.grasp_inversion = self.params.invert_grasp_condition;
        self.state = GripperState::Idle;
        self.pending = None;
        self.initialized = true;
        tracing::debug!(
            "Gripper '{}' drives '{}' between {} and {}",
            self.params.name,
            self.params.gripper_joint_name,
            open,
            closed
        );
        Ok(())
    }

    /// Queue a command; it is applied at the start of the next tick.
    pub fn command(&mut self, command: GripperCommand) {
        self.pending = Some(command);
    }

    /// Whether the jaw motion and the grasp component indicate a grasp.
    ///
    /// Needs a position sampled on an earlier tick. The grasp condition of
    /// the strategy is XORed with the inversion flag; the stall requirement
    /// is not.
    pub fn grasp(&self, ctx: &GripperContext<'_>) -> bool {
        let Some(old) = self.old_position else {
            return false;
        };
        let Some(joint) = self.joint.and_then(|key| ctx.joints.get(key)) else {
            return false;
        };
        let current = joint.position();
        let stalled = (current - old).abs() <= self.params.stall_tolerance;

        let (needs_stall, condition) = match self.params.strategy {
            GraspStrategy::Stall => (true, self.grasp_component.is_engaged()),
            GraspStrategy::Contact => (false, self.grasp_component.is_engaged()),
            GraspStrategy::Position { threshold } => (true, self.closing_progress(current) >= threshold),
        };

        (!needs_stall || stalled) && (condition != self.grasp_inversion)
    }

    /// Open the jaw, drop any held object and forget the position sample.
    ///
    /// Returns the name of the released object.
    pub fn release(&mut self, ctx: &mut GripperContext<'_>) -> Result<Option<String>, ControllerError> {
        self.require_init()?;
        let open = self.open_position;
        self.joint_controller_mut(ctx)?
            .set_target(&self.params.gripper_joint_name, JointTarget::Position(open))?;
        let object = self.grasp_component.try_to_detach(ctx.scene);
        self.old_position = None;
        self.grasp_inversion = self.params.invert_grasp_condition;
        Ok(object)
    }

    /// Advance the state machine by one tick.
    pub fn tick(&mut self, _dt: f64, ctx: &mut GripperContext<'_>) -> Result<Vec<GripperEvent>, ControllerError> {
        self.require_init()?;
        let mut events = Vec::new();

        let current = self.current_position(ctx)?;

        let link_key = self.grasp_link.ok_or_else(|| ControllerError::NotInitialized(self.params.name.clone()))?;
        let link_pose = *ctx
            .links
            .get(link_key)
            .ok_or_else(|| ControllerError::DanglingLink {
                component: self.grasp_component.name().to_string(),
                link: self.params.grasp_comp_setting.gripper_name.clone(),
            })?
            .world_pose();
        self.grasp_component.update(ctx.scene, &link_pose);

        if let Some(command) = self.pending.take() {
            self.apply(command, ctx, &mut events)?;
        }

        match self.state {
            GripperState::Closing => {
                if self.grasp(ctx) {
                    let object = match ctx.links.get(link_key) {
                        Some(link) => self.grasp_component.try_to_fixate(ctx.scene, link),
                        None => None,
                    };
                    tracing::info!("Gripper '{}' grasped {:?}", self.params.name, object);
                    events.push(GripperEvent::Grasped {
                        gripper: self.params.name.clone(),
                        object,
                    });
                    self.state = GripperState::Grasped;
                }
            }
            GripperState::Releasing => {
                if (current - self.open_position).abs() <= self.params.open_tolerance {
                    tracing::debug!("Gripper '{}' is open", self.params.name);
                    self.state = GripperState::Idle;
                }
            }
            GripperState::Idle | GripperState::Grasped => {}
        }

        self.old_position = Some(current);
        Ok(events)
    }

    fn apply(
        &mut self,
        command: GripperCommand,
        ctx: &mut GripperContext<'_>,
        events: &mut Vec<GripperEvent>,
    ) -> Result<(), ControllerError> {
        match (command, self.state) {
            (GripperCommand::Close, GripperState::Grasped | GripperState::Closing) => {}
            (GripperCommand::Close, GripperState::Idle | GripperState::Releasing) => {
                let closed = self.closed_position;
                self.joint_controller_mut(ctx)?
                    .set_target(&self.params.gripper_joint_name, JointTarget::Position(closed))?;
                self.old_position = None;
                self.state = GripperState::Closing;
            }
            (GripperCommand::Open, GripperState::Releasing) => {}
            (GripperCommand::Open, previous) => {
                let object = self.release(ctx)?;
                if previous == GripperState::Grasped || object.is_some() {
                    tracing::info!("Gripper '{}' released {:?}", self.params.name, object);
                    events.push(GripperEvent::Released {
                        gripper: self.params.name.clone(),
                        object,
                    });
                }
                self.state = GripperState::Releasing;
            }
        }
        Ok(())
    }

    /// Fraction of the open-to-closed travel covered at `position`.
    fn closing_progress(&self, position: f64) -> f64 {
        (position - self.open_position) / (self.closed_position - self.open_position)
    }

    fn current_position(&self, ctx: &GripperContext<'_>) -> Result<f64, ControllerError> {
        let key = self.joint.ok_or_else(|| ControllerError::NotInitialized(self.params.name.clone()))?;
        let joint = ctx.joints.get(key).ok_or_else(|| ControllerError::DanglingJoint {
            controller: self.params.name.clone(),
            joint: self.params.gripper_joint_name.clone(),
        })?;
        let state = joint.state();
        if !state.is_finite() {
            return Err(ControllerError::NonFiniteState {
                joint: joint.name.clone(),
                position: state.position,
                velocity: state.velocity,
            });
        }
        Ok(state.position)
    }

    fn joint_controller_mut<'c>(
        &self,
        ctx: &'c mut GripperContext<'_>,
    ) -> Result<&'c mut super::JointController, ControllerError> {
        self.joint_controller
            .and_then(|key| ctx.controllers.get_mut(key))
            .ok_or_else(|| ControllerError::JointControllerNotFound {
                controller: self.params.name.clone(),
                joint_controller: self.params.joint_controller.clone(),
            })
    }

    fn require_init(&self) -> Result<(), ControllerError> {
        if self.initialized {
            Ok(())
        } else {
            Err(ControllerError::NotInitialized(self.params.name.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{JointController, JointControllerSettings};
    use crate::geometry::BodyGeometry;
    use crate::joint::Joint;
    use crate::link::Link;
    use crate::scene::{BodyRole, Scene};
    use nalgebra::{Isometry3, Vector3};
    use robosim_description::{JointKind, JointLimits};
    use slotmap::SlotMap;
    use std::collections::BTreeMap;

    struct Rig {
        scene: Scene,
        links: SlotMap<LinkKey, Link>,
        link_names: BTreeMap<String, LinkKey>,
        joints: SlotMap<JointKey, Joint>,
        joint_names: BTreeMap<String, JointKey>,
        controllers: SlotMap<ControllerKey, JointController>,
        controller_names: BTreeMap<String, ControllerKey>,
    }

    impl Rig {
        fn new(with_prop: bool) -> Self {
            let mut scene = Scene::new();
            let mut links = SlotMap::with_key();
            let mut link_names = BTreeMap::new();
            for name in ["palm", "finger"] {
                let mut link = Link::new(name, Isometry3::identity());
                link.collisions.push(scene.spawn(format!("{}_c", name), BodyRole::Collision));
                link_names.insert(name.to_string(), links.insert(link));
            }

            let mut limits = JointLimits::new(0.0, 0.04);
            limits.velocity = 0.1;
            let mut joints = SlotMap::with_key();
            let finger = joints.insert(Joint::new(
                "finger_joint".to_string(),
                JointKind::Prismatic,
                (link_names["palm"], "palm".to_string()),
                (link_names["finger"], "finger".to_string()),
                Vector3::y_axis(),
                Isometry3::identity(),
                limits,
                Isometry3::identity(),
            ));
            let joint_names = BTreeMap::from([("finger_joint".to_string(), finger)]);

            let mut controller = JointController::new("hand", JointControllerSettings::default());
            controller.init(&joints, &joint_names).unwrap();
            let mut controllers = SlotMap::with_key();
            let controller_names = BTreeMap::from([("hand".to_string(), controllers.insert(controller))]);

            if with_prop {
                let cube = scene.spawn("cube", BodyRole::Prop);
                scene.set_world_transform(cube, Isometry3::translation(0.15, 0.0, 0.0)).unwrap();
                scene.get_mut(cube).unwrap().geometry = Some(BodyGeometry::Ball { radius: 0.02 });
            }

            Self {
                scene,
                links,
                link_names,
                joints,
                joint_names,
                controllers,
                controller_names,
            }
        }

        fn view(&self) -> ModelView<'_> {
            ModelView {
                links: &self.links,
                link_names: &self.link_names,
                joints: &self.joints,
                joint_names: &self.joint_names,
                controllers: &self.controllers,
                controller_names: &self.controller_names,
            }
        }

        fn ctx(&mut self) -> GripperContext<'_> {
            GripperContext {
                links: &self.links,
                joints: &self.joints,
                controllers: &mut self.controllers,
                scene: &mut self.scene,
            }
        }

        fn step(&mut self, gripper: &mut GripperController) -> Vec<GripperEvent> {
            for (_, controller) in self.controllers.iter_mut() {
                controller.tick(0.1, &mut self.joints).unwrap();
            }
            gripper.tick(0.1, &mut self.ctx()).unwrap()
        }

        fn finger(&self) -> f64 {
            self.joints[self.joint_names["finger_joint"]].position()
        }
    }

    fn params() -> GripperControllerParameters {
        GripperControllerParameters {
            name: "gripper".to_string(),
            gripper_joint_name: "finger_joint".to_string(),
            grasp_component_name: "grasp".to_string(),
            joint_controller: "hand".to_string(),
            grasp_comp_setting: GraspComponentSetting {
                gripper_name: "palm".to_string(),
                ..GraspComponentSetting::default()
            },
            ..GripperControllerParameters::default()
        }
    }

    fn gripper(rig: &Rig, params: GripperControllerParameters) -> GripperController {
        let mut gripper = GripperController::new(params);
        gripper.init(&rig.view()).unwrap();
        gripper
    }

    fn close_until_done(rig: &mut Rig, gripper: &mut GripperController) -> Vec<GripperEvent> {
        gripper.command(GripperCommand::Close);
        let mut events = Vec::new();
        for _ in 0..10 {
            events.extend(rig.step(gripper));
        }
        events
    }

    #[test]
    fn holding_position_while_engaged_grasps() {
        let mut rig = Rig::new(true);
        let mut plain = gripper(&rig, params());
        let mut inverted = gripper(
            &rig,
            GripperControllerParameters {
                invert_grasp_condition: true,
                ..params()
            },
        );

        // Two ticks with a stationary jaw give a fresh, identical sample.
        for _ in 0..2 {
            rig.step(&mut plain);
            rig.step(&mut inverted);
        }
        let ctx = rig.ctx();
        assert!(plain.grasp(&ctx));
        assert!(!inverted.grasp(&ctx));
    }

    #[test]
    fn no_grasp_without_a_sample() {
        let mut rig = Rig::new(true);
        let plain = gripper(&rig, params());
        assert!(plain.old_position().is_none());
        assert!(!plain.grasp(&rig.ctx()));
    }

    #[test]
    fn closing_stalls_on_the_object_and_grasps() {
        let mut rig = Rig::new(true);
        let mut gripper = gripper(&rig, params());

        let events = close_until_done(&mut rig, &mut gripper);
        assert_eq!(gripper.state(), GripperState::Grasped);
        assert_eq!(rig.finger(), 0.04);
        assert_eq!(
            events,
            vec![GripperEvent::Grasped {
                gripper: "gripper".to_string(),
                object: Some("cube".to_string())
            }]
        );
        let cube = gripper.grasp_component().grasped_object().unwrap();
        assert_eq!(rig.scene.get(cube).unwrap().weld_parent(), rig.links[rig.link_names["palm"]].get_collision());
    }

    #[test]
    fn inverted_condition_grasps_empty_air_only() {
        let mut with_object = Rig::new(true);
        let inverted = GripperControllerParameters {
            invert_grasp_condition: true,
            ..params()
        };
        let mut gripper_a = gripper(&with_object, inverted.clone());
        close_until_done(&mut with_object, &mut gripper_a);
        assert_eq!(gripper_a.state(), GripperState::Closing);

        let mut empty = Rig::new(false);
        let mut gripper_b = gripper(&empty, inverted);
        let events = close_until_done(&mut empty, &mut gripper_b);
        assert_eq!(gripper_b.state(), GripperState::Grasped);
        assert_eq!(
            events,
            vec![GripperEvent::Grasped {
                gripper: "gripper".to_string(),
                object: None
            }]
        );
    }

    #[test]
    fn release_discards_the_position_sample() {
        let mut rig = Rig::new(true);
        let mut gripper = gripper(&rig, params());
        close_until_done(&mut rig, &mut gripper);
        assert!(gripper.grasp(&rig.ctx()));

        let released = gripper.release(&mut rig.ctx()).unwrap();
        assert_eq!(released, Some("cube".to_string()));
        assert!(gripper.old_position().is_none());
        assert!(!gripper.grasp(&rig.ctx()));
        assert_eq!(
            rig.controllers[rig.controller_names["hand"]].target("finger_joint"),
            Some(JointTarget::Position(0.0))
        );
    }

    #[test]
    fn open_releases_and_returns_to_idle() {
        let mut rig = Rig::new(true);
        let mut gripper = gripper(&rig, params());
        close_until_done(&mut rig, &mut gripper);

        gripper.command(GripperCommand::Open);
        let events = rig.step(&mut gripper);
        assert_eq!(
            events,
            vec![GripperEvent::Released {
                gripper: "gripper".to_string(),
                object: Some("cube".to_string())
            }]
        );
        assert_eq!(gripper.state(), GripperState::Releasing);

        for _ in 0..10 {
            rig.step(&mut gripper);
        }
        assert_eq!(gripper.state(), GripperState::Idle);
        assert_eq!(rig.finger(), 0.0);
        assert!(gripper.grasp_component().grasped_object().is_none());
    }

    #[test]
    fn contact_strategy_ignores_jaw_motion() {
        let mut rig = Rig::new(true);
        let mut gripper = gripper(
            &rig,
            GripperControllerParameters {
                strategy: GraspStrategy::Contact,
                ..params()
            },
        );
        gripper.command(GripperCommand::Close);
        rig.step(&mut gripper);
        assert_eq!(gripper.state(), GripperState::Closing);
        rig.step(&mut gripper);
        assert_eq!(gripper.state(), GripperState::Grasped);
        assert!(rig.finger() < 0.04);
    }

    #[test]
    fn position_strategy_needs_enough_travel() {
        let mut rig = Rig::new(false);
        let mut gripper = gripper(
            &rig,
            GripperControllerParameters {
                strategy: GraspStrategy::Position { threshold: 0.9 },
                closed_position: Some(0.02),
                ..params()
            },
        );
        close_until_done(&mut rig, &mut gripper);
        // Progress is measured against the configured closed position.
        assert_eq!(gripper.state(), GripperState::Grasped);
        assert_eq!(rig.finger(), 0.02);
    }

    #[test]
    fn init_failures_are_reported() {
        let rig = Rig::new(false);
        let mut gripper = GripperController::new(GripperControllerParameters {
            gripper_joint_name: "thumb".to_string(),
            ..params()
        });
        assert!(matches!(
            gripper.init(&rig.view()),
            Err(ControllerError::JointNotFound { .. })
        ));
        assert!(!gripper.is_initialized());

        let mut gripper = GripperController::new(GripperControllerParameters {
            joint_controller: "arm".to_string(),
            ..params()
        });
        assert!(matches!(
            gripper.init(&rig.view()),
            Err(ControllerError::JointControllerNotFound { .. })
        ));

        let mut gripper = GripperController::new(GripperControllerParameters {
            grasp_comp_setting: GraspComponentSetting {
                gripper_name: "wrist".to_string(),
                ..GraspComponentSetting::default()
            },
            ..params()
        });
        assert!(matches!(
            gripper.init(&rig.view()),
            Err(ControllerError::LinkNotFound { .. })
        ));
    }

    #[test]
    fn tick_before_init_fails() {
        let mut rig = Rig::new(false);
        let mut gripper = GripperController::new(params());
        assert_eq!(
            gripper.tick(0.1, &mut rig.ctx()),
            Err(ControllerError::NotInitialized("gripper".to_string()))
        );
    }

    #[test]
    fn parameter_validation() {
        assert!(params().validate().is_ok());
        let bad = GripperControllerParameters {
            strategy: GraspStrategy::Position { threshold: 1.5 },
            ..params()
        };
        assert!(bad.validate().is_err());
        let bad = GripperControllerParameters {
            gripper_joint_name: String::new(),
            ..params()
        };
        assert!(bad.validate().is_err());
    }
}
