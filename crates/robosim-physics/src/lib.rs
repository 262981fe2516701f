#![warn(missing_docs)]

//! Robot model construction and joint/grasp simulation for robosim.
//!
//! This crate turns a declarative [`ModelDescription`] into a live,
//! tickable robot model: a scene of collision and visual bodies with
//! composed transforms, weld topology, collision filtering and
//! gravity/mass overrides, plus the joint and gripper controllers that
//! drive it every frame. The scene can be ticked kinematically on its own
//! or hosted in a Rapier3d physics world.
//!
//! # Features
//!
//! - Link construction through a pluggable [`LinkFactory`] / [`LinkBuilder`]
//! - Joint controllers in kinematic or dynamic (motor) mode
//! - Gripper state machine with stall, contact and position grasp strategies
//! - Physics hosting with convex hull, trimesh or AABB colliders
//!
//! # Example
//!
//! ```ignore
//! use robosim_physics::{PrimitiveGeometry, SimConfig, Simulation};
//!
//! let description = robosim_description::ModelDescription::from_json(&json_str)?;
//! let config = SimConfig::load("sim.toml")?;
//!
//! let mut sim = Simulation::new(description, PrimitiveGeometry::new(), config, true)?;
//! sim.step(1.0 / 60.0)?;
//! println!("{:?}", sim.observe().joints);
//! ```
//!
//! [`ModelDescription`]: robosim_description::ModelDescription

mod colliders;
mod collision;
mod config;
pub mod controller;
mod error;
pub mod factory;
mod geometry;
mod joint;
mod joints;
pub mod kinematics;
mod link;
mod model;
pub mod pose;
mod scene;
mod simulation;
mod world;

pub use colliders::{geometry_to_shape, mesh_to_collider, ColliderStrategy};
pub use collision::{CollisionChannel, CollisionEnabled, CollisionResponse, CollisionSettings};
pub use config::{
    BuildConfig, CollisionlessLinkPolicy, PhysicsConfig, SimConfig, DEFAULT_BODY_MASS, DEFAULT_POSITION_ITERATIONS,
    DEFAULT_VELOCITY_ITERATIONS,
};
pub use controller::{
    ControllerKey, ControllerMode, GraspComponent, GraspComponentSetting, GraspStrategy, GripperCommand,
    GripperController, GripperControllerParameters, GripperEvent, GripperState, JointController,
    JointControllerSettings, JointTarget,
};
pub use error::{BuildError, ConfigError, ControllerError, ModelError, PhysicsError, SceneError};
pub use factory::{BuildContext, BuilderKind, JointFactory, LinkBuilder, LinkFactory};
pub use geometry::{BodyGeometry, GeometryProvider, MeshData, PrimitiveGeometry};
pub use joint::{DriveMode, Joint, JointDrive, JointKey, JointState, JointStateSnapshot};
pub use link::{Link, LinkKey};
pub use model::{LoadReport, Model};
pub use scene::{BodyKey, BodyRole, Scene, SceneBody, SolverIterations};
pub use simulation::{GripperObservation, Observation, Simulation};
pub use world::{interaction_groups, PhysicsWorld};
