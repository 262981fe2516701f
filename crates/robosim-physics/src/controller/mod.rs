//! Joint and gripper controllers.
//!
//! Controllers never own links or joints. They resolve handles once in
//! `init` from a [`ModelView`] and fail fast when a handle goes stale.

mod grasp;
mod gripper;
mod joint;

pub use grasp::{GraspComponent, GraspComponentSetting};
pub use gripper::{
    GraspStrategy, GripperCommand, GripperController, GripperControllerParameters, GripperEvent, GripperState,
};
pub use joint::{ControllerMode, JointController, JointControllerSettings, JointTarget};

use std::collections::BTreeMap;

use slotmap::{new_key_type, SlotMap};

use crate::joint::{Joint, JointKey};
use crate::link::{Link, LinkKey};
use crate::scene::Scene;

new_key_type! {
    /// Handle to a joint controller in a model.
    pub struct ControllerKey;
}

/// Read-only view of a model's registries, used to resolve handles.
#[derive(Clone, Copy)]
pub struct ModelView<'a> {
    /// Links.
    pub links: &'a SlotMap<LinkKey, Link>,
    /// Link names.
    pub link_names: &'a BTreeMap<String, LinkKey>,
    /// Joints.
    pub joints: &'a SlotMap<JointKey, Joint>,
    /// Joint names.
    pub joint_names: &'a BTreeMap<String, JointKey>,
    /// Joint controllers.
    pub controllers: &'a SlotMap<ControllerKey, JointController>,
    /// Joint controller names.
    pub controller_names: &'a BTreeMap<String, ControllerKey>,
}

/// What a gripper touches while ticking.
pub struct GripperContext<'a> {
    /// Links, for the grasp link pose.
    pub links: &'a SlotMap<LinkKey, Link>,
    /// Joints, for the jaw position.
    pub joints: &'a SlotMap<JointKey, Joint>,
    /// Joint controllers, to command the jaw.
    pub controllers: &'a mut SlotMap<ControllerKey, JointController>,
    /// Scene, for grasp sensing and fixation.
    pub scene: &'a mut Scene,
}
