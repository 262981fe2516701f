//! Link and joint construction.
//!
//! [`LinkFactory`] picks a [`LinkBuilder`] for each link description and
//! drives it; [`JointFactory`] connects already-built links. The shared
//! per-link passes (collision profile, gravity, inertial) are free functions
//! so that every builder variant applies the same policy.

mod joint;
mod standard;
mod virtual_link;

pub use joint::JointFactory;
pub use standard::StandardLinkBuilder;
pub use virtual_link::VirtualLinkBuilder;

use robosim_description::{InertialDescription, LinkDescription};

use crate::collision::{CollisionChannel, CollisionEnabled, CollisionResponse};
use crate::config::{BuildConfig, CollisionlessLinkPolicy};
use crate::error::BuildError;
use crate::geometry::GeometryProvider;
use crate::link::Link;
use crate::scene::Scene;

/// Everything a builder needs from the model it builds into.
pub struct BuildContext<'a> {
    /// Scene receiving the new bodies.
    pub scene: &'a mut Scene,
    /// Geometry source for shapes.
    pub geometry: &'a dyn GeometryProvider,
    /// Build settings.
    pub config: &'a BuildConfig,
}

/// Builder variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderKind {
    /// Links with at least one collision shape.
    Standard,
    /// Links without collision shapes.
    Virtual,
}

impl BuilderKind {
    /// Builder variant for a description under the given policy.
    pub fn select(
        description: &LinkDescription,
        policy: CollisionlessLinkPolicy,
    ) -> Result<BuilderKind, BuildError> {
        if !description.collisions.is_empty() {
            return Ok(BuilderKind::Standard);
        }
        match policy {
            CollisionlessLinkPolicy::Virtual => Ok(BuilderKind::Virtual),
            CollisionlessLinkPolicy::Skip => Err(BuildError::Unsupported {
                link: description.name.clone(),
                reason: "no collision shapes and virtual links are disabled".to_string(),
            }),
        }
    }
}

/// Builds exactly one link.
pub trait LinkBuilder<'a> {
    /// Which variant this is.
    fn kind(&self) -> BuilderKind;

    /// Bind the builder to its target scene and description.
    fn init(&mut self, ctx: BuildContext<'a>, description: &'a LinkDescription);

    /// Produce the link. A builder produces a single link; later calls fail.
    fn new_link(&mut self) -> Result<Link, BuildError>;
}

/// Selects and drives link builders.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkFactory {
    policy: CollisionlessLinkPolicy,
}

impl LinkFactory {
    /// Factory applying the given collision-less link policy.
    pub fn new(policy: CollisionlessLinkPolicy) -> Self {
        Self { policy }
    }

    /// Build one link. Fails when either input is absent or no builder
    /// variant applies.
    pub fn load<'a>(
        &self,
        ctx: Option<BuildContext<'a>>,
        description: Option<&'a LinkDescription>,
    ) -> Result<Link, BuildError> {
        let ctx = ctx.ok_or(BuildError::MissingInput("build context"))?;
        let description = description.ok_or(BuildError::MissingInput("link description"))?;

        let mut builder = self.create_builder(description)?;
        builder.init(ctx, description);
        builder.new_link()
    }

    /// Instantiate the builder variant for a description.
    pub fn create_builder<'a>(
        &self,
        description: &LinkDescription,
    ) -> Result<Box<dyn LinkBuilder<'a> + 'a>, BuildError> {
        Ok(match BuilderKind::select(description, self.policy)? {
            BuilderKind::Standard => Box::new(StandardLinkBuilder::default()),
            BuilderKind::Virtual => Box::new(VirtualLinkBuilder::default()),
        })
    }
}

/// Apply collision filtering to every body of a link.
///
/// Visual bodies ignore everything. Collision bodies sit on the robot
/// channel; they only overlap when the link has no visuals, otherwise they
/// block. Without self-collision they also ignore the robot channel.
pub fn set_collision_profile(scene: &mut Scene, link: &Link, self_collide: bool) {
    for &key in &link.visuals {
        if let Some(body) = scene.get_mut(key) {
            body.collision.object_channel = CollisionChannel::RobotSelf;
            body.collision.set_response_to_all(CollisionResponse::Ignore);
        }
    }

    let response = if link.visuals.is_empty() {
        CollisionResponse::Overlap
    } else {
        CollisionResponse::Block
    };

    for &key in &link.collisions {
        if let Some(body) = scene.get_mut(key) {
            body.collision.object_channel = CollisionChannel::RobotSelf;
            body.collision.enabled = CollisionEnabled::QueryAndPhysics;
            body.collision.set_response_to_all(response);
            if !self_collide {
                body.collision
                    .set_response(CollisionChannel::RobotSelf, CollisionResponse::Ignore);
            }
        }
    }
}

/// Apply the gravity policy: only the primary collision body may feel
/// gravity, and only when `use_gravity` is set.
pub fn set_simulate_gravity(scene: &mut Scene, link: &Link, use_gravity: bool) {
    for key in link.bodies() {
        if let Some(body) = scene.get_mut(key) {
            body.gravity_enabled = false;
        }
    }
    if let Some(body) = link.get_collision().and_then(|k| scene.get_mut(k)) {
        body.gravity_enabled = use_gravity;
    }
}

/// Assign masses: every body gets `default_mass`, then the primary collision
/// body takes the inertial mass when one is given.
pub fn set_inertial(
    scene: &mut Scene,
    link: &Link,
    inertial: Option<&InertialDescription>,
    default_mass: f64,
) {
    for key in link.bodies() {
        if let Some(body) = scene.get_mut(key) {
            body.mass_override = Some(default_mass);
        }
    }
    if let (Some(inertial), Some(body)) = (inertial, link.get_collision().and_then(|k| scene.get_mut(k))) {
        body.mass_override = Some(inertial.mass);
    }
}
