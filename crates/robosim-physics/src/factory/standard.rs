//! Builder for links with collision shapes.

use robosim_description::{CollisionDescription, LinkDescription, VisualDescription};

use super::{set_collision_profile, set_inertial, set_simulate_gravity, BuildContext, BuilderKind, LinkBuilder};
use crate::error::BuildError;
use crate::link::Link;
use crate::pose::compose_pose;
use crate::scene::{BodyRole, SolverIterations};

/// Builds a link whose first collision body becomes the simulated primary
/// body and anchors every other body of the link.
#[derive(Default)]
pub struct StandardLinkBuilder<'a> {
    ctx: Option<BuildContext<'a>>,
    description: Option<&'a LinkDescription>,
}

impl<'a> StandardLinkBuilder<'a> {
    /// Builder bound to a context and description.
    pub fn new(ctx: BuildContext<'a>, description: &'a LinkDescription) -> Self {
        Self {
            ctx: Some(ctx),
            description: Some(description),
        }
    }

    fn set_collision(ctx: &mut BuildContext<'_>, link: &mut Link, shape: &CollisionDescription) -> Result<(), BuildError> {
        let Some(geometry) = ctx.geometry.resolve(&shape.name, &shape.geometry) else {
            tracing::error!("Collision mesh for '{}' on link '{}' not valid", shape.name, link.name);
            link.skipped_shapes.push(shape.name.clone());
            return Ok(());
        };

        let scene = &mut *ctx.scene;
        let key = scene.spawn(shape.name.clone(), BodyRole::Collision);
        if scene.root().is_none() {
            scene.set_root(key)?;
        }
        scene.set_world_transform(key, compose_pose(link.world_pose(), &shape.pose))?;

        if let Some(body) = scene.get_mut(key) {
            body.owner = Some(link.name.clone());
            body.geometry = Some(geometry);
            body.visible = false;
            body.solver_iterations = SolverIterations {
                position: ctx.config.position_solver_iterations,
                velocity: ctx.config.velocity_solver_iterations,
            };
        }

        match link.get_collision() {
            None => {
                if let Some(body) = scene.get_mut(key) {
                    body.simulate_physics = true;
                }
                if let Some(root) = scene.root().filter(|root| *root != key) {
                    scene.attach_to(key, root)?;
                }
            }
            Some(primary) => scene.weld_to(key, primary)?,
        }

        link.collisions.push(key);
        Ok(())
    }

    fn set_visual(ctx: &mut BuildContext<'_>, link: &mut Link, shape: &VisualDescription) -> Result<(), BuildError> {
        let Some(geometry) = ctx.geometry.resolve(&shape.name, &shape.geometry) else {
            tracing::error!("Visual mesh for '{}' on link '{}' not valid", shape.name, link.name);
            link.skipped_shapes.push(shape.name.clone());
            return Ok(());
        };

        let scene = &mut *ctx.scene;
        let key = scene.spawn(shape.name.clone(), BodyRole::Visual);
        scene.set_world_transform(key, compose_pose(link.world_pose(), &shape.pose))?;
        if let Some(body) = scene.get_mut(key) {
            body.owner = Some(link.name.clone());
            body.geometry = Some(geometry);
        }

        match link.get_visual() {
            None => {
                if let Some(body) = scene.get_mut(key) {
                    body.auto_weld = false;
                }
                if let Some(primary) = link.get_collision() {
                    scene.attach_to(key, primary)?;
                }
            }
            Some(first) => scene.weld_to(key, first)?,
        }

        link.visuals.push(key);
        Ok(())
    }
}

impl<'a> LinkBuilder<'a> for StandardLinkBuilder<'a> {
    fn kind(&self) -> BuilderKind {
        BuilderKind::Standard
    }

    fn init(&mut self, ctx: BuildContext<'a>, description: &'a LinkDescription) {
        self.ctx = Some(ctx);
        self.description = Some(description);
    }

    fn new_link(&mut self) -> Result<Link, BuildError> {
        let mut ctx = self.ctx.take().ok_or(BuildError::MissingInput("build context"))?;
        let description = self
            .description
            .take()
            .ok_or(BuildError::MissingInput("link description"))?;

        let mut link = Link::new(&description.name, description.pose.to_isometry());
        link.self_collide = description.self_collide;
        link.gravity = description.gravity;
        link.inertial = description.inertial.clone();

        for shape in &description.collisions {
            Self::set_collision(&mut ctx, &mut link, shape)?;
        }
        if link.collisions.is_empty() {
            return Err(BuildError::Unsupported {
                link: link.name,
                reason: "every collision shape resolved to empty geometry".to_string(),
            });
        }
        for shape in &description.visuals {
            Self::set_visual(&mut ctx, &mut link, shape)?;
        }

        set_collision_profile(ctx.scene, &link, description.self_collide);
        if ctx.config.apply_inertial {
            set_inertial(ctx.scene, &link, description.inertial.as_ref(), ctx.config.default_mass);
        }
        set_simulate_gravity(ctx.scene, &link, description.gravity);

        tracing::debug!(
            "Built link '{}' ({} collision, {} visual bodies)",
            link.name,
            link.collisions.len(),
            link.visuals.len()
        );
        Ok(link)
    }
}
