//! Links: rigid-body clusters of collision and visual bodies.

use nalgebra::Isometry3;
use robosim_description::InertialDescription;
use slotmap::new_key_type;

use crate::scene::BodyKey;

new_key_type! {
    /// Handle to a link in a model.
    pub struct LinkKey;
}

/// One rigid segment of a robot.
///
/// The first collision body is the primary body: it anchors attachment of
/// every other body of the link, carries the link's mass and is the only body
/// gravity may act on.
#[derive(Debug, Clone)]
pub struct Link {
    /// Link name.
    pub name: String,
    /// Collision bodies in description order. Index 0 is the primary body.
    pub collisions: Vec<BodyKey>,
    /// Visual bodies in description order.
    pub visuals: Vec<BodyKey>,
    /// Whether the link may collide with the rest of the robot.
    pub self_collide: bool,
    /// Whether gravity acts on the primary body.
    pub gravity: bool,
    /// Mass override from the description.
    pub inertial: Option<InertialDescription>,
    /// Shapes skipped because their geometry resolved to empty.
    pub skipped_shapes: Vec<String>,
    /// Built by the virtual (collision-less) builder.
    pub is_virtual: bool,
    base_pose: Isometry3<f64>,
    world_pose: Isometry3<f64>,
}

impl Link {
    /// Empty link with its base pose.
    pub fn new(name: impl Into<String>, base_pose: Isometry3<f64>) -> Self {
        Self {
            name: name.into(),
            collisions: Vec::new(),
            visuals: Vec::new(),
            self_collide: false,
            gravity: true,
            inertial: None,
            skipped_shapes: Vec::new(),
            is_virtual: false,
            base_pose,
            world_pose: base_pose,
        }
    }

    /// The primary collision body.
    pub fn get_collision(&self) -> Option<BodyKey> {
        self.collisions.first().copied()
    }

    /// The first visual body.
    pub fn get_visual(&self) -> Option<BodyKey> {
        self.visuals.first().copied()
    }

    /// Body whose pose stands for the link pose: the primary collision body,
    /// or the first visual body of a collision-less link.
    pub fn anchor_body(&self) -> Option<BodyKey> {
        self.get_collision().or_else(|| self.get_visual())
    }

    /// All bodies, collisions first.
    pub fn bodies(&self) -> impl Iterator<Item = BodyKey> + '_ {
        self.collisions.iter().chain(self.visuals.iter()).copied()
    }

    /// Pose the link was built at (model frame).
    pub fn base_pose(&self) -> &Isometry3<f64> {
        &self.base_pose
    }

    /// Current pose of the link frame.
    pub fn world_pose(&self) -> &Isometry3<f64> {
        &self.world_pose
    }

    pub(crate) fn set_world_pose(&mut self, pose: Isometry3<f64>) {
        self.world_pose = pose;
    }
}
