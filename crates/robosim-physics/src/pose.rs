//! Pose composition and conversions between description, core and Rapier
//! precision.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use robosim_description::Pose;

/// World pose of a child placed at `local` inside a frame posed at `parent`.
///
/// Location offsets are rotated into the parent frame, then translated;
/// rotations compose multiplicatively (`parent * local`).
pub fn compose(parent: &Isometry3<f64>, local: &Isometry3<f64>) -> Isometry3<f64> {
    let location = parent.rotation * local.translation.vector + parent.translation.vector;
    let rotation = parent.rotation * local.rotation;
    Isometry3::from_parts(Translation3::from(location), rotation)
}

/// Compose a description pose onto a core pose.
pub fn compose_pose(parent: &Isometry3<f64>, local: &Pose) -> Isometry3<f64> {
    compose(parent, &local.to_isometry())
}

/// Narrow a core pose to Rapier's `f32` precision.
pub fn to_physics(iso: &Isometry3<f64>) -> Isometry3<f32> {
    let t = iso.translation.vector;
    let q = iso.rotation;
    Isometry3::from_parts(
        Translation3::new(t.x as f32, t.y as f32, t.z as f32),
        UnitQuaternion::new_normalize(Quaternion::new(
            q.w as f32, q.i as f32, q.j as f32, q.k as f32,
        )),
    )
}

/// Widen a Rapier pose to core precision.
pub fn from_physics(iso: &Isometry3<f32>) -> Isometry3<f64> {
    let t = iso.translation.vector;
    let q = iso.rotation;
    Isometry3::from_parts(
        Translation3::new(t.x as f64, t.y as f64, t.z as f64),
        UnitQuaternion::new_normalize(Quaternion::new(
            q.w as f64, q.i as f64, q.j as f64, q.k as f64,
        )),
    )
}

/// Narrow a vector to `f32`.
pub fn vector_to_physics(v: &Vector3<f64>) -> Vector3<f32> {
    Vector3::new(v.x as f32, v.y as f32, v.z as f32)
}
