//! Scene graph arena.
//!
//! The host engine's component hierarchy is modelled as a flat arena of
//! [`SceneBody`] records addressed by [`BodyKey`]. Link construction writes
//! attachment, weld, collision, gravity, mass and solver settings here; the
//! physics host reads them back to build its rigid bodies.

use nalgebra::Isometry3;
use slotmap::{new_key_type, SlotMap};

use crate::collision::CollisionSettings;
use crate::error::SceneError;
use crate::geometry::BodyGeometry;

new_key_type! {
    /// Handle to a body in a [`Scene`].
    pub struct BodyKey;
}

/// What a scene body represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRole {
    /// Collision shape of a link.
    Collision,
    /// Visual-only shape of a link.
    Visual,
    /// Free object in the environment that grippers can pick up.
    Prop,
}

/// Constraint solver iteration counts for a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverIterations {
    /// Position iterations.
    pub position: u32,
    /// Velocity iterations. The Rapier host has no per-body velocity count
    /// and leaves this unmapped.
    pub velocity: u32,
}

impl Default for SolverIterations {
    fn default() -> Self {
        Self {
            position: 8,
            velocity: 1,
        }
    }
}

/// One component of the scene graph.
#[derive(Debug, Clone)]
pub struct SceneBody {
    /// Component name.
    pub name: String,
    /// Name of the link that owns the body, if any.
    pub owner: Option<String>,
    /// What the body represents.
    pub role: BodyRole,
    /// Resolved geometry.
    pub geometry: Option<BodyGeometry>,
    /// Whether the body is driven by the physics simulation.
    pub simulate_physics: bool,
    /// Whether the body is rendered.
    pub visible: bool,
    /// Whether gravity acts on the body.
    pub gravity_enabled: bool,
    /// Mass override in kilograms.
    pub mass_override: Option<f64>,
    /// Solver iteration counts.
    pub solver_iterations: SolverIterations,
    /// Collision filtering.
    pub collision: CollisionSettings,
    /// Whether attaching this body to a simulated parent welds it implicitly.
    pub auto_weld: bool,
    transform: Isometry3<f64>,
    attach_parent: Option<BodyKey>,
    weld_parent: Option<BodyKey>,
}

impl SceneBody {
    fn new(name: String, role: BodyRole) -> Self {
        Self {
            name,
            owner: None,
            role,
            geometry: None,
            simulate_physics: false,
            visible: true,
            gravity_enabled: true,
            mass_override: None,
            solver_iterations: SolverIterations::default(),
            collision: CollisionSettings::default(),
            auto_weld: true,
            transform: Isometry3::identity(),
            attach_parent: None,
            weld_parent: None,
        }
    }

    /// World transform.
    pub fn transform(&self) -> &Isometry3<f64> {
        &self.transform
    }

    /// Body this one is attached to.
    pub fn attach_parent(&self) -> Option<BodyKey> {
        self.attach_parent
    }

    /// Body this one is welded to.
    pub fn weld_parent(&self) -> Option<BodyKey> {
        self.weld_parent
    }
}

/// Arena of scene bodies with a designated root.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    bodies: SlotMap<BodyKey, SceneBody>,
    root: Option<BodyKey>,
}

impl Scene {
    /// Empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a body at the world origin.
    pub fn spawn(&mut self, name: impl Into<String>, role: BodyRole) -> BodyKey {
        self.bodies.insert(SceneBody::new(name.into(), role))
    }

    /// Remove a body. Bodies attached or welded to it are detached in place.
    pub fn remove(&mut self, key: BodyKey) -> Option<SceneBody> {
        let body = self.bodies.remove(key)?;
        for (_, other) in self.bodies.iter_mut() {
            if other.attach_parent == Some(key) {
                other.attach_parent = None;
            }
            if other.weld_parent == Some(key) {
                other.weld_parent = None;
            }
        }
        if self.root == Some(key) {
            self.root = None;
        }
        Some(body)
    }

    /// Drop every body.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.root = None;
    }

    /// Body lookup.
    pub fn get(&self, key: BodyKey) -> Option<&SceneBody> {
        self.bodies.get(key)
    }

    /// Mutable body lookup.
    pub fn get_mut(&mut self, key: BodyKey) -> Option<&mut SceneBody> {
        self.bodies.get_mut(key)
    }

    /// Whether the key refers to a live body.
    pub fn contains(&self, key: BodyKey) -> bool {
        self.bodies.contains_key(key)
    }

    /// Number of bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// True when the scene has no bodies.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Iterate over all bodies.
    pub fn iter(&self) -> impl Iterator<Item = (BodyKey, &SceneBody)> {
        self.bodies.iter()
    }

    /// Root component of the scene.
    pub fn root(&self) -> Option<BodyKey> {
        self.root
    }

    /// Make a body the root component.
    pub fn set_root(&mut self, key: BodyKey) -> Result<(), SceneError> {
        self.body(key)?;
        self.root = Some(key);
        Ok(())
    }

    /// World transform of a body.
    pub fn world_transform(&self, key: BodyKey) -> Option<Isometry3<f64>> {
        self.bodies.get(key).map(|b| b.transform)
    }

    /// Place a body in the world.
    pub fn set_world_transform(&mut self, key: BodyKey, transform: Isometry3<f64>) -> Result<(), SceneError> {
        self.body_mut(key)?.transform = transform;
        Ok(())
    }

    /// Attach `child` below `parent`, keeping the child's world transform.
    pub fn attach_to(&mut self, child: BodyKey, parent: BodyKey) -> Result<(), SceneError> {
        self.check_no_cycle(child, parent)?;
        self.body_mut(child)?.attach_parent = Some(parent);
        Ok(())
    }

    /// Attach `child` below `parent` and merge it into the parent's rigid body.
    pub fn weld_to(&mut self, child: BodyKey, parent: BodyKey) -> Result<(), SceneError> {
        self.check_no_cycle(child, parent)?;
        let body = self.body_mut(child)?;
        body.attach_parent = Some(parent);
        body.weld_parent = Some(parent);
        Ok(())
    }

    /// Undo attachment and weld of a body.
    pub fn detach(&mut self, key: BodyKey) -> Result<(), SceneError> {
        let body = self.body_mut(key)?;
        body.attach_parent = None;
        body.weld_parent = None;
        Ok(())
    }

    /// The body anchoring `key`'s weld cluster (follows weld parents).
    pub fn weld_root(&self, key: BodyKey) -> BodyKey {
        let mut current = key;
        while let Some(parent) = self.bodies.get(current).and_then(|b| b.weld_parent) {
            current = parent;
        }
        current
    }

    /// Every body in `anchor`'s weld cluster, anchor included.
    pub fn weld_cluster(&self, anchor: BodyKey) -> Vec<BodyKey> {
        let root = self.weld_root(anchor);
        self.bodies
            .keys()
            .filter(|k| self.weld_root(*k) == root)
            .collect()
    }

    /// The body whose motion `key` follows in simulation.
    ///
    /// Simulated bodies move on their own. Welded bodies move with their weld
    /// root, and non-simulated attached bodies ride along with their parent.
    pub fn physics_anchor(&self, key: BodyKey) -> BodyKey {
        let mut current = key;
        loop {
            let Some(body) = self.bodies.get(current) else {
                return current;
            };
            if let Some(parent) = body.weld_parent {
                current = parent;
            } else if body.simulate_physics {
                return current;
            } else if let Some(parent) = body.attach_parent {
                current = parent;
            } else {
                return current;
            }
        }
    }

    /// Bodies directly attached to `parent`.
    pub fn children(&self, parent: BodyKey) -> impl Iterator<Item = BodyKey> + '_ {
        self.bodies
            .iter()
            .filter(move |(_, b)| b.attach_parent == Some(parent))
            .map(|(k, _)| k)
    }

    /// Bodies with the given role.
    pub fn bodies_with_role(&self, role: BodyRole) -> impl Iterator<Item = (BodyKey, &SceneBody)> {
        self.bodies.iter().filter(move |(_, b)| b.role == role)
    }

    fn body(&self, key: BodyKey) -> Result<&SceneBody, SceneError> {
        self.bodies
            .get(key)
            .ok_or_else(|| SceneError::UnknownBody(format!("{:?}", key)))
    }

    fn body_mut(&mut self, key: BodyKey) -> Result<&mut SceneBody, SceneError> {
        self.bodies
            .get_mut(key)
            .ok_or_else(|| SceneError::UnknownBody(format!("{:?}", key)))
    }

    fn check_no_cycle(&self, child: BodyKey, parent: BodyKey) -> Result<(), SceneError> {
        let child_name = self.body(child)?.name.clone();
        self.body(parent)?;

        let mut current = Some(parent);
        while let Some(key) = current {
            if key == child {
                return Err(SceneError::Cycle {
                    child: child_name,
                    parent: self.body(parent)?.name.clone(),
                });
            }
            current = self.bodies.get(key).and_then(|b| b.attach_parent);
        }
        Ok(())
    }
}
