//! Simulation configuration.
//!
//! Everything the engine used to expose as editable properties lives here as
//! plain serde structs, loaded from TOML and checked by [`SimConfig::validate`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::colliders::ColliderStrategy;
use crate::controller::{GripperControllerParameters, JointControllerSettings};
use crate::error::ConfigError;

/// Default position solver iterations for link collision bodies.
pub const DEFAULT_POSITION_ITERATIONS: u32 = 20;
/// Default velocity solver iterations for link collision bodies.
pub const DEFAULT_VELOCITY_ITERATIONS: u32 = 8;
/// Negligible mass given to every body before inertial overrides.
pub const DEFAULT_BODY_MASS: f64 = 0.001;

/// What the link factory does with links that have no collision shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionlessLinkPolicy {
    /// Report the link as unsupported and leave it out of the model.
    #[default]
    Skip,
    /// Build a visual-only link with the virtual link builder.
    Virtual,
}

/// Link construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Handling of links without collision shapes.
    pub collisionless_links: CollisionlessLinkPolicy,
    /// Position solver iterations for collision bodies.
    pub position_solver_iterations: u32,
    /// Velocity solver iterations for collision bodies.
    pub velocity_solver_iterations: u32,
    /// Mass assigned to every body by the inertial pass.
    pub default_mass: f64,
    /// Run the inertial pass as part of building each link.
    pub apply_inertial: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            collisionless_links: CollisionlessLinkPolicy::Skip,
            position_solver_iterations: DEFAULT_POSITION_ITERATIONS,
            velocity_solver_iterations: DEFAULT_VELOCITY_ITERATIONS,
            default_mass: DEFAULT_BODY_MASS,
            apply_inertial: false,
        }
    }
}

/// Rapier host settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity vector in m/s².
    pub gravity: [f64; 3],
    /// Pin the model root body to the world.
    pub fix_root: bool,
    /// Physics steps per model tick.
    pub substeps: u32,
    /// How mesh geometry becomes collision shapes.
    pub collider_strategy: ColliderStrategy,
    /// Contact friction coefficient.
    pub friction: f64,
    /// Contact restitution coefficient.
    pub restitution: f64,
    /// Density (kg/m³) of colliders without a mass override.
    pub density: f64,
    /// Motor stiffness used to hold kinematically driven joints.
    pub kinematic_stiffness: f64,
    /// Motor damping used to hold kinematically driven joints.
    pub kinematic_damping: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, 0.0, -9.81],
            fix_root: true,
            substeps: 1,
            collider_strategy: ColliderStrategy::ConvexHull,
            friction: 0.5,
            restitution: 0.1,
            density: 1000.0,
            kinematic_stiffness: 1.0e4,
            kinematic_damping: 1.0e2,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Link construction.
    pub build: BuildConfig,
    /// Physics host.
    pub physics: PhysicsConfig,
    /// Joint controllers keyed by controller name.
    pub joint_controllers: BTreeMap<String, JointControllerSettings>,
    /// Gripper controllers.
    pub grippers: Vec<GripperControllerParameters>,
}

impl SimConfig {
    /// Parse and validate a TOML config.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let build = &self.build;
        if build.position_solver_iterations == 0 || build.velocity_solver_iterations == 0 {
            return Err(ConfigError::Invalid(
                "solver iteration counts must be at least 1".to_string(),
            ));
        }
        if !(build.default_mass > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "default_mass must be positive, got {}",
                build.default_mass
            )));
        }

        let physics = &self.physics;
        if physics.substeps == 0 {
            return Err(ConfigError::Invalid("substeps must be at least 1".to_string()));
        }
        if physics.gravity.iter().any(|g| !g.is_finite()) {
            return Err(ConfigError::Invalid("gravity must be finite".to_string()));
        }
        if !(physics.density > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "density must be positive, got {}",
                physics.density
            )));
        }
        if physics.friction < 0.0 || physics.restitution < 0.0 {
            return Err(ConfigError::Invalid(
                "friction and restitution must be non-negative".to_string(),
            ));
        }

        for (name, settings) in &self.joint_controllers {
            settings
                .validate(name)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        let mut gripper_names = std::collections::HashSet::new();
        for gripper in &self.grippers {
            gripper
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if !gripper_names.insert(gripper.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate gripper name '{}'",
                    gripper.name
                )));
            }
            if !self.joint_controllers.contains_key(&gripper.joint_controller) {
                return Err(ConfigError::Invalid(format!(
                    "gripper '{}' references unknown joint controller '{}'",
                    gripper.name, gripper.joint_controller
                )));
            }
        }

        Ok(())
    }
}
