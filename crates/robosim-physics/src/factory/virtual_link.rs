//! Builder for links without collision shapes.

use robosim_description::LinkDescription;

use super::{set_collision_profile, set_simulate_gravity, BuildContext, BuilderKind, LinkBuilder};
use crate::error::BuildError;
use crate::link::Link;
use crate::pose::compose_pose;
use crate::scene::BodyRole;

/// Builds a visual-only link. The first visual body is free-standing and
/// later visuals weld to it; the link itself is moved kinematically.
#[derive(Default)]
pub struct VirtualLinkBuilder<'a> {
    ctx: Option<BuildContext<'a>>,
    description: Option<&'a LinkDescription>,
}

impl<'a> LinkBuilder<'a> for VirtualLinkBuilder<'a> {
    fn kind(&self) -> BuilderKind {
        BuilderKind::Virtual
    }

    fn init(&mut self, ctx: BuildContext<'a>, description: &'a LinkDescription) {
        self.ctx = Some(ctx);
        self.description = Some(description);
    }

    fn new_link(&mut self) -> Result<Link, BuildError> {
        let ctx = self.ctx.take().ok_or(BuildError::MissingInput("build context"))?;
        let description = self
            .description
            .take()
            .ok_or(BuildError::MissingInput("link description"))?;

        let mut link = Link::new(&description.name, description.pose.to_isometry());
        link.is_virtual = true;
        link.self_collide = description.self_collide;
        link.gravity = description.gravity;
        link.inertial = description.inertial.clone();

        for shape in &description.visuals {
            let Some(geometry) = ctx.geometry.resolve(&shape.name, &shape.geometry) else {
                tracing::error!("Visual mesh for '{}' on link '{}' not valid", shape.name, link.name);
                link.skipped_shapes.push(shape.name.clone());
                continue;
            };

            let key = ctx.scene.spawn(shape.name.clone(), BodyRole::Visual);
            ctx.scene
                .set_world_transform(key, compose_pose(link.world_pose(), &shape.pose))?;
            if let Some(body) = ctx.scene.get_mut(key) {
                body.owner = Some(link.name.clone());
                body.geometry = Some(geometry);
            }
            match link.get_visual() {
                None => {
                    if let Some(body) = ctx.scene.get_mut(key) {
                        body.auto_weld = false;
                    }
                }
                Some(first) => ctx.scene.weld_to(key, first)?,
            }
            link.visuals.push(key);
        }

        set_collision_profile(ctx.scene, &link, description.self_collide);
        set_simulate_gravity(ctx.scene, &link, false);

        tracing::debug!("Built virtual link '{}' ({} visual bodies)", link.name, link.visuals.len());
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildConfig, CollisionlessLinkPolicy};
    use crate::factory::LinkFactory;
    use crate::geometry::PrimitiveGeometry;
    use crate::scene::Scene;
    use robosim_description::{Geometry, Pose};

    #[test]
    fn visual_only_link_is_built_without_physics() {
        let mut scene = Scene::new();
        let provider = PrimitiveGeometry::new();
        let config = BuildConfig {
            collisionless_links: CollisionlessLinkPolicy::Virtual,
            ..BuildConfig::default()
        };
        let description = LinkDescription::new("camera", Pose::from_location(0.0, 0.0, 0.5))
            .with_visual("lens", Pose::identity(), Geometry::Sphere { radius: 0.02 })
            .with_visual("body", Pose::identity(), Geometry::Sphere { radius: 0.05 });
        let ctx = BuildContext {
            scene: &mut scene,
            geometry: &provider,
            config: &config,
        };

        let link = LinkFactory::new(config.collisionless_links)
            .load(Some(ctx), Some(&description))
            .unwrap();

        assert!(link.is_virtual);
        assert!(link.collisions.is_empty());
        assert_eq!(link.anchor_body(), Some(link.visuals[0]));
        assert_eq!(scene.root(), None);

        let lens = scene.get(link.visuals[0]).unwrap();
        assert!(!lens.simulate_physics);
        assert!(!lens.gravity_enabled);
        assert!(lens.collision.ignores_everything());
        assert_eq!(lens.attach_parent(), None);
        assert_eq!(scene.get(link.visuals[1]).unwrap().weld_parent(), Some(link.visuals[0]));
    }

    #[test]
    fn empty_virtual_link_is_a_bare_frame() {
        let mut scene = Scene::new();
        let provider = PrimitiveGeometry::new();
        let config = BuildConfig::default();
        let description = LinkDescription::new("tool0", Pose::from_location(0.0, 0.0, 1.0));
        let mut builder = VirtualLinkBuilder::default();
        builder.init(
            BuildContext {
                scene: &mut scene,
                geometry: &provider,
                config: &config,
            },
            &description,
        );

        let link = builder.new_link().unwrap();
        assert!(link.bodies().next().is_none());
        assert_eq!(link.world_pose().translation.vector.z, 1.0);
    }
}
