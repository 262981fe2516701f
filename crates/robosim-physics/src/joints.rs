//! Joint conversion from model joints to Rapier.
//!
//! Every Rapier joint frame is the model joint frame turned so that its
//! local X axis is the joint axis. The single free degree of freedom is then
//! always `AngX` (revolute, continuous) or `LinX` (prismatic), and positions
//! read back from the relative frame pose are in joint coordinates.

use std::f64::consts::PI;

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use rapier3d::dynamics::{GenericJoint, GenericJointBuilder, JointAxesMask, JointAxis, MotorModel};
use robosim_description::JointKind;

use crate::joint::{DriveMode, Joint, JointDrive};
use crate::pose::to_physics;

/// Force limit used when a drive leaves it unbounded.
pub const DEFAULT_MAX_FORCE: f32 = 1.0e6;

/// The Rapier axis carrying a joint's degree of freedom.
pub fn joint_axis(kind: JointKind) -> JointAxis {
    match kind {
        JointKind::Revolute | JointKind::Continuous => JointAxis::AngX,
        JointKind::Prismatic | JointKind::Fixed => JointAxis::LinX,
    }
}

/// Rotation taking local X onto `axis`.
pub fn axis_alignment(axis: &Unit<Vector3<f64>>) -> UnitQuaternion<f64> {
    UnitQuaternion::rotation_between(&Vector3::x(), axis)
        .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI))
}

/// Joint frames relative to the parent and child rigid bodies.
///
/// The parent side is the joint frame at zero motion, the child side the
/// joint frame at the current position, so the relative pose Rapier starts
/// from is exactly the current joint position.
pub fn joint_frames(
    joint: &Joint,
    parent_link: &Isometry3<f64>,
    child_link: &Isometry3<f64>,
    parent_body: &Isometry3<f64>,
    child_body: &Isometry3<f64>,
) -> (Isometry3<f64>, Isometry3<f64>) {
    let align = Isometry3::from_parts(Translation3::identity(), axis_alignment(&joint.axis));
    let on_parent = parent_link * joint.rest_offset() * joint.pose * align;
    let on_child = child_link * joint.pose * align;
    (parent_body.inverse() * on_parent, child_body.inverse() * on_child)
}

/// Create a Rapier joint for a model joint between two body frames.
pub fn model_joint_to_rapier(joint: &Joint, frame1: &Isometry3<f64>, frame2: &Isometry3<f64>) -> GenericJoint {
    let mask = match joint.kind {
        JointKind::Fixed => JointAxesMask::LOCKED_FIXED_AXES,
        JointKind::Revolute | JointKind::Continuous => JointAxesMask::LOCKED_REVOLUTE_AXES,
        JointKind::Prismatic => JointAxesMask::LOCKED_PRISMATIC_AXES,
    };
    let mut builder = GenericJointBuilder::new(mask)
        .local_frame1(to_physics(frame1))
        .local_frame2(to_physics(frame2))
        .contacts_enabled(false);

    if joint.is_movable() {
        let axis = joint_axis(joint.kind);
        if joint.is_bounded() {
            builder = builder.limits(axis, [joint.limits.lower as f32, joint.limits.upper as f32]);
        }
        // Enable motor for position control
        builder = builder
            .motor_model(axis, MotorModel::AccelerationBased)
            .motor_max_force(axis, DEFAULT_MAX_FORCE);
    }

    builder.build()
}

/// Joint position encoded in the relative pose of the two joint frames.
///
/// Angles are in `(-π, π]`; continuous joints unwrap them against the
/// previous position.
pub fn measure_position(kind: JointKind, relative: &Isometry3<f64>, previous: f64) -> f64 {
    match kind {
        JointKind::Fixed => 0.0,
        JointKind::Prismatic => relative.translation.x,
        JointKind::Revolute => relative.rotation.scaled_axis().x,
        JointKind::Continuous => {
            let angle = relative.rotation.scaled_axis().x;
            previous + wrap_angle(angle - previous)
        }
    }
}

/// Map an angle into `(-π, π]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

/// Motor gains used for a drive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorGains {
    /// Stiffness for kinematically driven joints.
    pub kinematic_stiffness: f64,
    /// Damping for kinematically driven joints.
    pub kinematic_damping: f64,
}

/// Copy a joint drive onto the Rapier motor of its axis.
pub fn apply_drive(data: &mut GenericJoint, kind: JointKind, drive: &JointDrive, gains: MotorGains) {
    if kind == JointKind::Fixed {
        return;
    }
    let axis = joint_axis(kind);
    let max_force = if drive.max_force > 0.0 {
        drive.max_force as f32
    } else {
        DEFAULT_MAX_FORCE
    };

    match drive.mode {
        DriveMode::Off => {
            data.set_motor(axis, 0.0, 0.0, 0.0, 0.0);
        }
        DriveMode::Position if drive.kinematic => {
            data.set_motor(
                axis,
                drive.target_position as f32,
                drive.target_velocity as f32,
                gains.kinematic_stiffness as f32,
                gains.kinematic_damping as f32,
            );
        }
        DriveMode::Position => {
            data.set_motor_position(
                axis,
                drive.target_position as f32,
                drive.stiffness as f32,
                drive.damping as f32,
            );
        }
        DriveMode::Velocity => {
            data.set_motor_velocity(axis, drive.target_velocity as f32, drive.damping as f32);
        }
    }
    data.set_motor_max_force(axis, max_force);
}
