//! Simulation driver tying a model to an optional physics world.

use std::collections::BTreeMap;

use nalgebra::Isometry3;
use robosim_description::ModelDescription;
use serde::Serialize;

use crate::config::SimConfig;
use crate::controller::{GripperCommand, GripperEvent, GripperState, JointTarget};
use crate::error::{ModelError, PhysicsError};
use crate::geometry::GeometryProvider;
use crate::joint::JointStateSnapshot;
use crate::model::{LoadReport, Model};
use crate::scene::BodyKey;
use crate::world::PhysicsWorld;

/// Gripper status in an observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GripperObservation {
    /// State machine state.
    pub state: GripperState,
    /// Name of the held object.
    pub grasped_object: Option<String>,
}

/// Snapshot of the simulation after a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    /// Steps taken since the last reset.
    pub frame: u64,
    /// Simulated time since the last reset (seconds).
    pub time: f64,
    /// Joint states by joint name.
    pub joints: JointStateSnapshot,
    /// Gripper status by gripper name.
    pub grippers: BTreeMap<String, GripperObservation>,
}

#[derive(Debug, Clone)]
struct PropSpec {
    name: String,
    pose: Isometry3<f64>,
    radius: f64,
}

/// A model built from a description, ticked alone or hosted in Rapier.
pub struct Simulation {
    description: ModelDescription,
    geometry: Box<dyn GeometryProvider>,
    config: SimConfig,
    physics: bool,
    model: Model,
    world: Option<PhysicsWorld>,
    props: Vec<PropSpec>,
    report: LoadReport,
    frame: u64,
    time: f64,
}

impl Simulation {
    /// Build the model, register and initialize its controllers, and create
    /// a physics world when `physics` is set.
    pub fn new(
        description: ModelDescription,
        geometry: impl GeometryProvider + 'static,
        config: SimConfig,
        physics: bool,
    ) -> Result<Self, PhysicsError> {
        let geometry: Box<dyn GeometryProvider> = Box::new(geometry);
        let (model, report) = build_model(&description, geometry.as_ref(), &config)?;
        let world = if physics {
            Some(PhysicsWorld::from_model(&model, &config.physics)?)
        } else {
            None
        };

        Ok(Self {
            description,
            geometry,
            config,
            physics,
            model,
            world,
            props: Vec::new(),
            report,
            frame: 0,
            time: 0.0,
        })
    }

    /// Advance one frame of `dt` seconds and return the gripper events it
    /// produced.
    ///
    /// The model ticks first; with physics, drives are then copied to Rapier,
    /// the world steps `substeps` times and the result is written back.
    pub fn step(&mut self, dt: f64) -> Result<Vec<GripperEvent>, PhysicsError> {
        self.model.tick(dt)?;

        if let Some(world) = &mut self.world {
            world.apply_drives(&self.model);
            if dt > 0.0 {
                let substeps = self.config.physics.substeps.max(1);
                let h = dt / substeps as f64;
                for _ in 0..substeps {
                    world.step(h);
                }
            }
            world.sync_to_model(&mut self.model);
        }

        self.frame += 1;
        self.time += dt;
        Ok(self.model.drain_gripper_events())
    }

    /// Rebuild everything from the stored description.
    ///
    /// Props placed with [`Simulation::spawn_prop`] are placed again.
    pub fn reset(&mut self) -> Result<Observation, PhysicsError> {
        let (mut model, report) = build_model(&self.description, self.geometry.as_ref(), &self.config)?;
        for prop in &self.props {
            model.spawn_prop(prop.name.clone(), prop.pose, prop.radius)?;
        }
        self.world = if self.physics {
            Some(PhysicsWorld::from_model(&model, &self.config.physics)?)
        } else {
            None
        };
        self.model = model;
        self.report = report;
        self.frame = 0;
        self.time = 0.0;
        tracing::debug!("Simulation '{}' reset", self.description.name);
        Ok(self.observe())
    }

    /// Current observation without stepping.
    pub fn observe(&self) -> Observation {
        let grippers = self
            .model
            .grippers()
            .map(|gripper| {
                (
                    gripper.name().to_string(),
                    GripperObservation {
                        state: gripper.state(),
                        grasped_object: gripper.grasp_component().grasped_object_name().map(str::to_string),
                    },
                )
            })
            .collect();

        Observation {
            frame: self.frame,
            time: self.time,
            joints: self.model.get_joint_state(),
            grippers,
        }
    }

    /// Place a graspable sphere. The physics world is rebuilt to include it.
    pub fn spawn_prop(
        &mut self,
        name: impl Into<String>,
        pose: Isometry3<f64>,
        radius: f64,
    ) -> Result<BodyKey, PhysicsError> {
        let name = name.into();
        let key = self.model.spawn_prop(name.clone(), pose, radius)?;
        self.props.push(PropSpec { name, pose, radius });
        if self.physics {
            self.world = Some(PhysicsWorld::from_model(&self.model, &self.config.physics)?);
        }
        Ok(key)
    }

    /// Set a joint target through a joint controller.
    pub fn set_joint_target(&mut self, controller: &str, joint: &str, target: JointTarget) -> Result<(), ModelError> {
        let controller = self
            .model
            .joint_controller_mut(controller)
            .ok_or_else(|| ModelError::ControllerNotFound(controller.to_string()))?;
        controller.set_target(joint, target)?;
        Ok(())
    }

    /// Queue a gripper command.
    pub fn command_gripper(&mut self, gripper: &str, command: GripperCommand) -> Result<(), ModelError> {
        self.model.command_gripper(gripper, command)
    }

    /// The simulated model.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Mutable model access.
    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    /// The physics world, when physics is enabled.
    pub fn world(&self) -> Option<&PhysicsWorld> {
        self.world.as_ref()
    }

    /// Outcome of the last model build.
    pub fn load_report(&self) -> LoadReport {
        self.report
    }

    /// Steps taken since the last reset.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulated time since the last reset.
    pub fn time(&self) -> f64 {
        self.time
    }
}

fn build_model(
    description: &ModelDescription,
    geometry: &dyn GeometryProvider,
    config: &SimConfig,
) -> Result<(Model, LoadReport), ModelError> {
    let mut model = Model::new(description.name.clone(), config.clone());
    let report = model.load(description, geometry)?;
    model.configure_controllers(config)?;
    model.init_controllers()?;
    Ok((model, report))
}
