//! Robot description tree for the robosim model layer.
//!
//! This crate defines the already-parsed description a robot model is built
//! from: links with their collision and visual shapes, inertials, and the
//! joints connecting them. It is purely declarative: it holds no simulation state and
//! no geometry data beyond shape parameters and mesh references.
//!
//! Descriptions can be read from JSON or TOML (the native formats) or
//! imported from URDF.

mod error;
pub mod urdf;

use std::path::Path;

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

pub use error::DescriptionError;

/// 3D vector with f64 components (meters unless stated otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Convert to an nalgebra vector.
    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl From<Vector3<f64>> for Vec3 {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Rotation quaternion, scalar first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    /// Scalar part.
    pub w: f64,
    /// X component of the vector part.
    pub x: f64,
    /// Y component of the vector part.
    pub y: f64,
    /// Z component of the vector part.
    pub z: f64,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    /// The identity rotation.
    pub const IDENTITY: Quat = Quat {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create a quaternion from raw components. The value is normalized when
    /// converted to a rotation, so callers may pass non-unit input.
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation from fixed-axis roll/pitch/yaw in radians (URDF/SDF convention).
    pub fn from_rpy(roll: f64, pitch: f64, yaw: f64) -> Self {
        UnitQuaternion::from_euler_angles(roll, pitch, yaw).into()
    }

    /// Rotation of `angle` radians about `axis`.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let axis = nalgebra::Unit::new_normalize(axis.to_vector());
        UnitQuaternion::from_axis_angle(&axis, angle).into()
    }

    /// Convert to a unit quaternion. A zero quaternion maps to identity.
    pub fn to_unit(self) -> UnitQuaternion<f64> {
        let q = Quaternion::new(self.w, self.x, self.y, self.z);
        if q.norm() <= f64::EPSILON {
            return UnitQuaternion::identity();
        }
        UnitQuaternion::from_quaternion(q)
    }
}

impl From<UnitQuaternion<f64>> for Quat {
    fn from(q: UnitQuaternion<f64>) -> Self {
        Self::new(q.w, q.i, q.j, q.k)
    }
}

/// A rigid placement: location plus rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Translation.
    #[serde(default)]
    pub location: Vec3,
    /// Orientation.
    #[serde(default)]
    pub rotation: Quat,
}

impl Pose {
    /// Identity pose.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a pose from location and rotation.
    pub fn new(location: Vec3, rotation: Quat) -> Self {
        Self { location, rotation }
    }

    /// Pure translation.
    pub fn from_location(x: f64, y: f64, z: f64) -> Self {
        Self::new(Vec3::new(x, y, z), Quat::IDENTITY)
    }

    /// Convert to an nalgebra isometry.
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.location.to_vector()),
            self.rotation.to_unit(),
        )
    }

    /// Convert from an nalgebra isometry.
    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self::new(iso.translation.vector.into(), iso.rotation.into())
    }
}

/// Shape parameters of a collision or visual element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// Axis-aligned box centered at the shape origin.
    Box {
        /// Full edge lengths.
        size: Vec3,
    },
    /// Cylinder along the local Z axis.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Full length along Z.
        length: f64,
    },
    /// Sphere centered at the shape origin.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// External mesh resolved by a geometry provider.
    Mesh {
        /// Mesh URI (file path or `package://` reference).
        uri: String,
        /// Per-axis scale applied to the mesh.
        #[serde(default)]
        scale: Option<Vec3>,
    },
    /// No geometry. Shapes with this geometry resolve to empty.
    #[default]
    None,
}

/// A collision element of a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionDescription {
    /// Element name, unique within the link.
    pub name: String,
    /// Pose relative to the link frame.
    #[serde(default)]
    pub pose: Pose,
    /// Shape.
    pub geometry: Geometry,
}

/// A visual element of a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualDescription {
    /// Element name, unique within the link.
    pub name: String,
    /// Pose relative to the link frame.
    #[serde(default)]
    pub pose: Pose,
    /// Shape.
    pub geometry: Geometry,
}

/// Mass properties of a link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InertialDescription {
    /// Mass in kilograms.
    pub mass: f64,
    /// Center-of-mass pose relative to the link frame.
    #[serde(default)]
    pub pose: Pose,
}

fn default_true() -> bool {
    true
}

/// A link: one rigid segment of the robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDescription {
    /// Link name, unique within the model.
    pub name: String,
    /// Pose in the model frame.
    #[serde(default)]
    pub pose: Pose,
    /// Collision elements, in order. The first one anchors the link.
    #[serde(default)]
    pub collisions: Vec<CollisionDescription>,
    /// Visual elements, in order.
    #[serde(default)]
    pub visuals: Vec<VisualDescription>,
    /// Whether the link may collide with other links of the same robot.
    #[serde(default)]
    pub self_collide: bool,
    /// Whether gravity acts on the link.
    #[serde(default = "default_true")]
    pub gravity: bool,
    /// Optional mass override.
    #[serde(default)]
    pub inertial: Option<InertialDescription>,
}

impl LinkDescription {
    /// Create an empty link at the given pose with gravity enabled.
    pub fn new(name: impl Into<String>, pose: Pose) -> Self {
        Self {
            name: name.into(),
            pose,
            collisions: Vec::new(),
            visuals: Vec::new(),
            self_collide: false,
            gravity: true,
            inertial: None,
        }
    }

    /// Builder-style helper appending a collision element.
    pub fn with_collision(mut self, name: impl Into<String>, pose: Pose, geometry: Geometry) -> Self {
        self.collisions.push(CollisionDescription {
            name: name.into(),
            pose,
            geometry,
        });
        self
    }

    /// Builder-style helper appending a visual element.
    pub fn with_visual(mut self, name: impl Into<String>, pose: Pose, geometry: Geometry) -> Self {
        self.visuals.push(VisualDescription {
            name: name.into(),
            pose,
            geometry,
        });
        self
    }
}

/// Kind of joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointKind {
    /// Rigid connection.
    Fixed,
    /// Rotation about the axis, bounded by limits.
    Revolute,
    /// Unbounded rotation about the axis.
    Continuous,
    /// Translation along the axis, bounded by limits.
    Prismatic,
}

/// Joint limits (radians or meters, rad/s or m/s).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    /// Lower position bound.
    pub lower: f64,
    /// Upper position bound.
    pub upper: f64,
    /// Maximum effort (Nm or N). Zero means unbounded.
    #[serde(default)]
    pub effort: f64,
    /// Maximum speed. Zero means unbounded.
    #[serde(default)]
    pub velocity: f64,
}

impl JointLimits {
    /// Limits with the given position range and no effort/velocity bound.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            effort: 0.0,
            velocity: 0.0,
        }
    }
}

fn default_axis() -> Vec3 {
    Vec3::new(1.0, 0.0, 0.0)
}

/// A joint relating a parent and a child link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDescription {
    /// Joint name, unique within the model.
    pub name: String,
    /// Joint kind.
    pub kind: JointKind,
    /// Parent link name.
    pub parent: String,
    /// Child link name.
    pub child: String,
    /// Joint frame relative to the child link frame.
    #[serde(default)]
    pub pose: Pose,
    /// Motion axis in the joint frame.
    #[serde(default = "default_axis")]
    pub axis: Vec3,
    /// Position/effort/velocity limits.
    #[serde(default)]
    pub limits: Option<JointLimits>,
}

impl JointDescription {
    /// Create a joint with identity pose, X axis and no limits.
    pub fn new(
        name: impl Into<String>,
        kind: JointKind,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: parent.into(),
            child: child.into(),
            pose: Pose::identity(),
            axis: default_axis(),
            limits: None,
        }
    }

    /// Builder-style axis setter.
    pub fn with_axis(mut self, axis: Vec3) -> Self {
        self.axis = axis;
        self
    }

    /// Builder-style limits setter.
    pub fn with_limits(mut self, limits: JointLimits) -> Self {
        self.limits = Some(limits);
        self
    }
}

/// A complete robot description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelDescription {
    /// Robot name.
    pub name: String,
    /// Links, in declaration order.
    #[serde(default)]
    pub links: Vec<LinkDescription>,
    /// Joints, in declaration order.
    #[serde(default)]
    pub joints: Vec<JointDescription>,
}

impl ModelDescription {
    /// Create an empty description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            links: Vec::new(),
            joints: Vec::new(),
        }
    }

    /// Find a link by name.
    pub fn link(&self, name: &str) -> Option<&LinkDescription> {
        self.links.iter().find(|l| l.name == name)
    }

    /// Find a joint by name.
    pub fn joint(&self, name: &str) -> Option<&JointDescription> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deserialize from TOML string.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a description file, choosing the format by extension
    /// (`.json`, `.toml` or `.urdf`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DescriptionError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "json" => Ok(Self::from_json(&std::fs::read_to_string(path)?)?),
            "toml" => Ok(Self::from_toml(&std::fs::read_to_string(path)?)?),
            "urdf" => urdf::from_urdf_file(path),
            other => Err(DescriptionError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> ModelDescription {
        let mut doc = ModelDescription::new("arm");
        doc.links.push(
            LinkDescription::new("base", Pose::identity()).with_collision(
                "base_collision",
                Pose::identity(),
                Geometry::Box {
                    size: Vec3::new(0.2, 0.2, 0.1),
                },
            ),
        );
        doc.links.push(
            LinkDescription::new("forearm", Pose::from_location(0.0, 0.0, 0.3)).with_visual(
                "forearm_visual",
                Pose::identity(),
                Geometry::Mesh {
                    uri: "package://arm/forearm.stl".to_string(),
                    scale: None,
                },
            ),
        );
        doc.joints.push(
            JointDescription::new("shoulder", JointKind::Revolute, "base", "forearm")
                .with_axis(Vec3::new(0.0, 0.0, 1.0))
                .with_limits(JointLimits::new(-1.57, 1.57)),
        );
        doc
    }

    #[test]
    fn json_roundtrip_keeps_shapes_and_joints() {
        let doc = sample();
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"type\": \"box\""));

        let parsed = ModelDescription::from_json(&json).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn toml_defaults_fill_missing_fields() {
        let text = r#"
            name = "gripper"

            [[links]]
            name = "palm"

            [[links.collisions]]
            name = "palm_collision"
            geometry = { type = "sphere", radius = 0.05 }

            [[joints]]
            name = "finger"
            kind = "prismatic"
            parent = "palm"
            child = "finger_link"
        "#;

        let doc = ModelDescription::from_toml(text).unwrap();
        let palm = doc.link("palm").unwrap();
        assert!(palm.gravity);
        assert!(!palm.self_collide);
        assert_eq!(palm.pose, Pose::identity());
        assert_eq!(palm.collisions.len(), 1);

        let finger = doc.joint("finger").unwrap();
        assert_eq!(finger.axis, Vec3::new(1.0, 0.0, 0.0));
        assert!(finger.limits.is_none());
    }

    #[test]
    fn rpy_matches_axis_angle() {
        let q = Quat::from_rpy(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let expected = Quat::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(q.w, expected.w, epsilon = 1e-12);
        assert_relative_eq!(q.z, expected.z, epsilon = 1e-12);
    }

    #[test]
    fn zero_quaternion_is_identity() {
        let q = Quat::new(0.0, 0.0, 0.0, 0.0).to_unit();
        assert_eq!(q, UnitQuaternion::identity());
    }

    #[test]
    fn load_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arm.json");
        std::fs::write(&path, sample().to_json().unwrap()).unwrap();
        assert_eq!(ModelDescription::load(&path).unwrap(), sample());

        let bad = dir.path().join("arm.sdf");
        std::fs::write(&bad, "<sdf/>").unwrap();
        assert!(matches!(
            ModelDescription::load(&bad),
            Err(DescriptionError::UnsupportedFormat(_))
        ));
    }
}
