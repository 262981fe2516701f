//! Joint controllers: drive a group of joints toward position or velocity
//! targets.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::error::ControllerError;
use crate::joint::{DriveMode, Joint, JointDrive, JointKey};

/// How a controller moves its joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerMode {
    /// Integrate joint states directly; the physics host only follows.
    #[default]
    Kinematic,
    /// Leave motor commands for the physics host, which measures the state.
    Dynamic,
}

/// Joint controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointControllerSettings {
    /// Joints driven by the controller. Empty means every movable joint.
    pub joints: Vec<String>,
    /// Drive mode.
    pub mode: ControllerMode,
    /// Motor stiffness.
    pub stiffness: f64,
    /// Motor damping.
    pub damping: f64,
    /// Maximum motor force; zero falls back to the joint's effort limit.
    pub max_force: f64,
}

impl Default for JointControllerSettings {
    fn default() -> Self {
        Self {
            joints: Vec::new(),
            mode: ControllerMode::Kinematic,
            stiffness: 1.0e4,
            damping: 1.0e2,
            max_force: 0.0,
        }
    }
}

impl JointControllerSettings {
    /// Check the settings of the controller called `name`.
    pub fn validate(&self, name: &str) -> Result<(), ControllerError> {
        let invalid = |reason: String| ControllerError::InvalidParameters {
            controller: name.to_string(),
            reason,
        };
        for (label, value) in [
            ("stiffness", self.stiffness),
            ("damping", self.damping),
            ("max_force", self.max_force),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{} must be a non-negative number, got {}", label, value)));
            }
        }
        let mut seen = BTreeSet::new();
        for joint in &self.joints {
            if joint.is_empty() {
                return Err(invalid("empty joint name".to_string()));
            }
            if !seen.insert(joint.as_str()) {
                return Err(invalid(format!("joint '{}' listed twice", joint)));
            }
        }
        Ok(())
    }
}

/// A drive target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum JointTarget {
    /// Track a position.
    Position(f64),
    /// Track a velocity.
    Velocity(f64),
}

impl JointTarget {
    fn value(self) -> f64 {
        match self {
            JointTarget::Position(v) | JointTarget::Velocity(v) => v,
        }
    }
}

#[derive(Debug, Clone)]
struct ControlledJoint {
    name: String,
    key: JointKey,
    target: Option<JointTarget>,
}

/// Drives a group of joints.
///
/// Joint handles are resolved once by [`JointController::init`]. Joints are
/// visited in lexical name order on every tick.
#[derive(Debug, Clone)]
pub struct JointController {
    name: String,
    settings: JointControllerSettings,
    joints: Vec<ControlledJoint>,
    initialized: bool,
}

impl JointController {
    /// Uninitialized controller.
    pub fn new(name: impl Into<String>, settings: JointControllerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            joints: Vec::new(),
            initialized: false,
        }
    }

    /// Controller name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Controller settings.
    pub fn settings(&self) -> &JointControllerSettings {
        &self.settings
    }

    /// Whether [`init`](Self::init) succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Resolve the configured joints. Any unknown name fails the whole init.
    pub fn init(
        &mut self,
        joints: &SlotMap<JointKey, Joint>,
        names: &BTreeMap<String, JointKey>,
    ) -> Result<(), ControllerError> {
        self.initialized = false;
        self.settings.validate(&self.name)?;

        let wanted: Vec<String> = if self.settings.joints.is_empty() {
            names
                .iter()
                .filter(|(_, key)| joints.get(**key).is_some_and(Joint::is_movable))
                .map(|(name, _)| name.clone())
                .collect()
        } else {
            let mut list = self.settings.joints.clone();
            list.sort();
            list
        };

        let mut resolved = Vec::with_capacity(wanted.len());
        for name in wanted {
            let key = names
                .get(&name)
                .copied()
                .filter(|key| joints.contains_key(*key))
                .ok_or_else(|| ControllerError::JointNotFound {
                    controller: self.name.clone(),
                    joint: name.clone(),
                })?;
            resolved.push(ControlledJoint {
                name,
                key,
                target: None,
            });
        }

        tracing::debug!("Joint controller '{}' drives {} joints", self.name, resolved.len());
        self.joints = resolved;
        self.initialized = true;
        Ok(())
    }

    /// Whether the controller drives the named joint.
    pub fn controls(&self, joint: &str) -> bool {
        self.joints.iter().any(|j| j.name == joint)
    }

    /// Names of the driven joints, in tick order.
    pub fn joint_names(&self) -> impl Iterator<Item = &str> {
        self.joints.iter().map(|j| j.name.as_str())
    }

    /// Current targets, in tick order.
    pub fn targets(&self) -> impl Iterator<Item = (&str, Option<JointTarget>)> {
        self.joints.iter().map(|j| (j.name.as_str(), j.target))
    }

    /// Target of one joint.
    pub fn target(&self, joint: &str) -> Option<JointTarget> {
        self.joints.iter().find(|j| j.name == joint).and_then(|j| j.target)
    }

    /// Set the target of a driven joint.
    pub fn set_target(&mut self, joint: &str, target: JointTarget) -> Result<(), ControllerError> {
        if !target.value().is_finite() {
            return Err(ControllerError::InvalidParameters {
                controller: self.name.clone(),
                reason: format!("non-finite target for joint '{}'", joint),
            });
        }
        self.controlled_mut(joint)?.target = Some(target);
        Ok(())
    }

    /// Drop the target of a driven joint; its drive turns off.
    pub fn release(&mut self, joint: &str) -> Result<(), ControllerError> {
        self.controlled_mut(joint)?.target = None;
        Ok(())
    }

    /// Advance every driven joint by `dt` seconds.
    pub fn tick(&mut self, dt: f64, joints: &mut SlotMap<JointKey, Joint>) -> Result<(), ControllerError> {
        if !self.initialized {
            return Err(ControllerError::NotInitialized(self.name.clone()));
        }

        for controlled in &self.joints {
            let joint = joints
                .get_mut(controlled.key)
                .ok_or_else(|| ControllerError::DanglingJoint {
                    controller: self.name.clone(),
                    joint: controlled.name.clone(),
                })?;

            let state = joint.state();
            if !state.is_finite() {
                return Err(ControllerError::NonFiniteState {
                    joint: controlled.name.clone(),
                    position: state.position,
                    velocity: state.velocity,
                });
            }

            let max_force = if self.settings.max_force > 0.0 {
                self.settings.max_force
            } else {
                joint.limits.effort
            };
            let mut drive = JointDrive {
                stiffness: self.settings.stiffness,
                damping: self.settings.damping,
                max_force,
                ..JointDrive::default()
            };

            match self.settings.mode {
                ControllerMode::Kinematic => {
                    let position = integrate(joint, controlled.target, dt);
                    let velocity = if dt > 0.0 { (position - state.position) / dt } else { 0.0 };
                    joint.set_state(position, velocity);
                    drive.mode = DriveMode::Position;
                    drive.target_position = joint.position();
                    drive.target_velocity = velocity;
                    drive.kinematic = true;
                }
                ControllerMode::Dynamic => match controlled.target {
                    None => drive.mode = DriveMode::Off,
                    Some(JointTarget::Position(target)) => {
                        drive.mode = DriveMode::Position;
                        drive.target_position = joint.clamp_to_limits(target);
                    }
                    Some(JointTarget::Velocity(target)) => {
                        drive.mode = DriveMode::Velocity;
                        drive.target_velocity = limit_speed(joint, target);
                    }
                },
            }

            tracing::trace!(
                "{}: joint '{}' at {:.6}, drive {:?}",
                self.name,
                controlled.name,
                joint.position(),
                drive.mode
            );
            joint.drive = drive;
        }
        Ok(())
    }

    fn controlled_mut(&mut self, joint: &str) -> Result<&mut ControlledJoint, ControllerError> {
        if !self.initialized {
            return Err(ControllerError::NotInitialized(self.name.clone()));
        }
        let name = &self.name;
        self.joints
            .iter_mut()
            .find(|j| j.name == joint)
            .ok_or_else(|| ControllerError::JointNotControlled {
                controller: name.clone(),
                joint: joint.to_string(),
            })
    }
}

fn limit_speed(joint: &Joint, speed: f64) -> f64 {
    let max = joint.limits.velocity;
    if max > 0.0 {
        speed.clamp(-max, max)
    } else {
        speed
    }
}

/// Next kinematic position. Without a target the joint holds; position
/// targets are approached at no more than the velocity limit.
fn integrate(joint: &Joint, target: Option<JointTarget>, dt: f64) -> f64 {
    let current = joint.position();
    let next = match target {
        None => current,
        Some(JointTarget::Position(target)) => {
            let error = joint.clamp_to_limits(target) - current;
            let max = joint.limits.velocity;
            if max > 0.0 {
                current + error.clamp(-max * dt, max * dt)
            } else {
                current + error
            }
        }
        Some(JointTarget::Velocity(speed)) => current + limit_speed(joint, speed) * dt,
    };
    joint.clamp_to_limits(next)
}
