//! Joints between links and their runtime state.

use std::collections::BTreeMap;

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use robosim_description::{JointKind, JointLimits};
use serde::Serialize;
use slotmap::new_key_type;

use crate::link::LinkKey;

new_key_type! {
    /// Handle to a joint in a model.
    pub struct JointKey;
}

/// Measured joint state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct JointState {
    /// Position (rad or m).
    pub position: f64,
    /// Velocity (rad/s or m/s).
    pub velocity: f64,
    /// Applied effort (Nm or N).
    pub effort: f64,
}

impl JointState {
    /// True when position and velocity are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

/// Joint states keyed by joint name.
pub type JointStateSnapshot = BTreeMap<String, JointState>;

/// What a joint drive tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DriveMode {
    /// Joint is free.
    #[default]
    Off,
    /// Track `target_position`.
    Position,
    /// Track `target_velocity`.
    Velocity,
}

/// Drive command a joint controller leaves for the physics host.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct JointDrive {
    /// Tracked quantity.
    pub mode: DriveMode,
    /// Position target.
    pub target_position: f64,
    /// Velocity target.
    pub target_velocity: f64,
    /// Spring stiffness.
    pub stiffness: f64,
    /// Damping.
    pub damping: f64,
    /// Maximum force or torque; zero means unbounded.
    pub max_force: f64,
    /// The joint state is written by the controller, not measured.
    pub kinematic: bool,
}

/// A built joint.
///
/// `rest_offset` is the child link's base pose expressed in the parent link's
/// base frame; `pose` is the joint frame in the child link frame. Motion is
/// applied about (or along) `axis` in the joint frame.
#[derive(Debug, Clone)]
pub struct Joint {
    /// Joint name.
    pub name: String,
    /// Joint kind.
    pub kind: JointKind,
    /// Parent link.
    pub parent: LinkKey,
    /// Child link.
    pub child: LinkKey,
    /// Parent link name.
    pub parent_name: String,
    /// Child link name.
    pub child_name: String,
    /// Unit motion axis in the joint frame.
    pub axis: Unit<Vector3<f64>>,
    /// Joint frame in the child link frame.
    pub pose: Isometry3<f64>,
    /// Normalized limits.
    pub limits: JointLimits,
    /// Drive command.
    pub drive: JointDrive,
    rest_offset: Isometry3<f64>,
    state: JointState,
}

impl Joint {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        kind: JointKind,
        parent: (LinkKey, String),
        child: (LinkKey, String),
        axis: Unit<Vector3<f64>>,
        pose: Isometry3<f64>,
        limits: JointLimits,
        rest_offset: Isometry3<f64>,
    ) -> Self {
        let mut joint = Self {
            name,
            kind,
            parent: parent.0,
            child: child.0,
            parent_name: parent.1,
            child_name: child.1,
            axis,
            pose,
            limits,
            drive: JointDrive::default(),
            rest_offset,
            state: JointState::default(),
        };
        joint.state.position = joint.clamp_to_limits(0.0);
        joint
    }

    /// Current state.
    pub fn state(&self) -> JointState {
        self.state
    }

    /// Current position.
    pub fn position(&self) -> f64 {
        self.state.position
    }

    /// Overwrite the state. The position is clamped to the limits.
    pub fn set_state(&mut self, position: f64, velocity: f64) {
        self.state.position = self.clamp_to_limits(position);
        self.state.velocity = velocity;
    }

    /// Record the applied effort.
    pub fn set_effort(&mut self, effort: f64) {
        self.state.effort = effort;
    }

    /// Whether the joint has a degree of freedom.
    pub fn is_movable(&self) -> bool {
        self.kind != JointKind::Fixed
    }

    /// Whether the joint has finite position limits.
    pub fn is_bounded(&self) -> bool {
        self.limits.lower.is_finite() && self.limits.upper.is_finite()
    }

    /// Clamp a position into the limits.
    pub fn clamp_to_limits(&self, position: f64) -> f64 {
        position.clamp(self.limits.lower, self.limits.upper)
    }

    /// Fully open gripper position (the lower limit).
    pub fn open_limit(&self) -> f64 {
        self.limits.lower
    }

    /// Fully closed gripper position (the upper limit).
    pub fn closed_limit(&self) -> f64 {
        self.limits.upper
    }

    /// Whether the joint position is within `tolerance` of `position`.
    pub fn is_at(&self, position: f64, tolerance: f64) -> bool {
        (self.state.position - position).abs() <= tolerance
    }

    /// Child base pose relative to the parent base pose at rest.
    pub fn rest_offset(&self) -> &Isometry3<f64> {
        &self.rest_offset
    }

    /// Motion of the joint frame at a given position.
    pub fn motion(&self, position: f64) -> Isometry3<f64> {
        match self.kind {
            JointKind::Fixed => Isometry3::identity(),
            JointKind::Revolute | JointKind::Continuous => Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&self.axis, position),
            ),
            JointKind::Prismatic => Isometry3::from_parts(
                Translation3::from(self.axis.into_inner() * position),
                UnitQuaternion::identity(),
            ),
        }
    }

    /// Child link pose for a parent link pose at the given joint position.
    pub fn child_pose(&self, parent_pose: &Isometry3<f64>, position: f64) -> Isometry3<f64> {
        parent_pose * self.rest_offset * self.pose * self.motion(position) * self.pose.inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use slotmap::SlotMap;
    use std::f64::consts::FRAC_PI_2;

    fn joint(kind: JointKind, limits: JointLimits) -> Joint {
        let mut links: SlotMap<LinkKey, ()> = SlotMap::with_key();
        let parent = links.insert(());
        let child = links.insert(());
        Joint::new(
            "j".to_string(),
            kind,
            (parent, "parent".to_string()),
            (child, "child".to_string()),
            Vector3::z_axis(),
            Isometry3::identity(),
            limits,
            Isometry3::translation(0.0, 0.0, 1.0),
        )
    }

    #[test]
    fn state_is_clamped_to_limits() {
        let mut j = joint(JointKind::Revolute, JointLimits::new(-1.0, 1.0));
        j.set_state(2.5, 0.3);
        assert_eq!(j.position(), 1.0);
        assert_eq!(j.state().velocity, 0.3);
        assert!(j.is_at(0.99, 0.02));
        assert!(!j.is_at(0.5, 0.02));
    }

    #[test]
    fn initial_position_respects_offset_limits() {
        let j = joint(JointKind::Prismatic, JointLimits::new(0.1, 0.5));
        assert_eq!(j.position(), 0.1);
    }

    #[test]
    fn revolute_child_pose_rotates_about_axis() {
        let mut j = joint(JointKind::Revolute, JointLimits::new(-3.0, 3.0));
        j.pose = Isometry3::translation(1.0, 0.0, 0.0);

        let child = j.child_pose(&Isometry3::identity(), FRAC_PI_2);
        // The child origin swings around the joint frame at (1, 0, 1).
        assert_relative_eq!(child * Point3::origin(), Point3::new(1.0, -1.0, 1.0), epsilon = 1e-9);
        assert_relative_eq!(
            j.child_pose(&Isometry3::identity(), 0.0) * Point3::origin(),
            Point3::new(0.0, 0.0, 1.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn prismatic_child_pose_translates_along_axis() {
        let j = joint(JointKind::Prismatic, JointLimits::new(0.0, 1.0));
        let child = j.child_pose(&Isometry3::translation(2.0, 0.0, 0.0), 0.25);
        assert_relative_eq!(child * Point3::origin(), Point3::new(2.0, 0.0, 1.25), epsilon = 1e-9);
    }

    #[test]
    fn fixed_joints_do_not_move() {
        let j = joint(JointKind::Fixed, JointLimits::new(0.0, 0.0));
        assert!(!j.is_movable());
        assert_eq!(j.motion(1.0), Isometry3::identity());
    }
}
