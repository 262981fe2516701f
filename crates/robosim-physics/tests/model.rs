mod common;

use approx::assert_relative_eq;
use nalgebra::{Isometry3, Vector3};
use robosim_description::{Geometry, Pose};
use robosim_physics::{
    BodyRole, CollisionlessLinkPolicy, ControllerError, ControllerMode, GripperCommand, GripperEvent, GripperState,
    JointTarget, Link, LoadReport, Model, ModelError, PrimitiveGeometry, SimConfig, Simulation,
};

use common::{arm_config, arm_description, cube, hand_config, hand_description, solid_link};

fn loaded(config: SimConfig) -> Model {
    let mut model = Model::new("arm", config.clone());
    model.load(&arm_description(), &PrimitiveGeometry::new()).unwrap();
    model.configure_controllers(&config).unwrap();
    model
}

#[test]
fn collisionless_links_are_skipped_by_default() {
    let mut model = Model::new("arm", SimConfig::default());
    let report = model.load(&arm_description(), &PrimitiveGeometry::new()).unwrap();

    assert_eq!(
        report,
        LoadReport {
            links_built: 2,
            links_skipped: 1,
            joints_built: 1,
            joints_skipped: 1,
            shapes_skipped: 0,
        }
    );
    assert!(model.link("sensor").is_none());
    assert!(model.joint("sensor_mount").is_none());
    assert_eq!(model.links().map(|(name, _)| name).collect::<Vec<_>>(), vec!["arm", "base"]);
}

#[test]
fn virtual_policy_builds_visual_only_links() {
    let mut config = SimConfig::default();
    config.build.collisionless_links = CollisionlessLinkPolicy::Virtual;
    let mut model = Model::new("arm", config);
    let report = model.load(&arm_description(), &PrimitiveGeometry::new()).unwrap();

    assert_eq!(report.links_built, 3);
    assert_eq!(report.joints_built, 2);
    let sensor = model.link("sensor").unwrap();
    assert!(sensor.is_virtual);
    assert!(sensor.collisions.is_empty());
    let body = model.scene().get(sensor.visuals[0]).unwrap();
    assert!(!body.simulate_physics);
    assert!(!body.gravity_enabled);
}

#[test]
fn first_collision_body_becomes_the_scene_root() {
    let model = loaded(SimConfig::default());
    let base = model.link("base").unwrap();
    let arm = model.link("arm").unwrap();
    let root = model.scene().root().unwrap();

    assert_eq!(base.get_collision(), Some(root));
    assert_eq!(model.scene().get(arm.collisions[0]).unwrap().attach_parent(), Some(root));
    assert_relative_eq!(
        model.scene().world_transform(arm.collisions[0]).unwrap().translation.vector,
        Vector3::new(0.0, 0.0, 0.5),
        epsilon = 1e-12
    );
}

#[test]
fn empty_shapes_are_counted_and_skipped() {
    let mut description = arm_description();
    description.links[0] = description.links[0].clone().with_collision("ghost", Pose::identity(), Geometry::None);

    let mut model = Model::new("arm", SimConfig::default());
    let report = model.load(&description, &PrimitiveGeometry::new()).unwrap();

    assert_eq!(report.shapes_skipped, 1);
    assert_eq!(model.link("base").unwrap().skipped_shapes, vec!["ghost".to_string()]);
    assert_eq!(model.link("base").unwrap().collisions.len(), 1);
}

#[test]
fn duplicate_names_are_rejected() {
    let mut description = arm_description();
    description
        .links
        .push(solid_link("arm", Pose::from_location(5.0, 0.0, 0.0), cube(0.1)));

    let mut model = Model::new("arm", SimConfig::default());
    let report = model.load(&description, &PrimitiveGeometry::new()).unwrap();
    assert_eq!(report.links_skipped, 2);
    assert_relative_eq!(
        model.link("arm").unwrap().world_pose().translation.vector,
        Vector3::new(0.0, 0.0, 0.5)
    );

    let result = model.add_link(Link::new("base", Isometry3::identity()));
    assert_eq!(result.unwrap_err(), ModelError::DuplicateLink("base".to_string()));
}

#[test]
fn reload_keeps_props_and_drops_robot_bodies() {
    let mut model = loaded(SimConfig::default());
    let robot_bodies = model.scene().len();
    model
        .spawn_prop("cube", Isometry3::translation(1.0, 0.0, 0.0), 0.02)
        .unwrap();

    model.load(&arm_description(), &PrimitiveGeometry::new()).unwrap();
    assert_eq!(model.scene().len(), robot_bodies + 1);
    assert_eq!(model.scene().bodies_with_role(BodyRole::Prop).count(), 1);
    assert!(!model.controllers_initialized());
}

#[test]
fn tick_requires_load_and_init() {
    let mut model = Model::new("arm", SimConfig::default());
    assert_eq!(model.tick(0.01), Err(ModelError::NotLoaded("arm".to_string())));
    assert_eq!(model.init_controllers(), Err(ModelError::NotLoaded("arm".to_string())));

    let mut model = loaded(arm_config(ControllerMode::Kinematic));
    assert_eq!(model.tick(0.01), Err(ModelError::ControllersNotInitialized("arm".to_string())));

    model.init_controllers().unwrap();
    assert_eq!(model.tick(f64::NAN).unwrap_err().to_string(), "Invalid delta time: NaN");
    assert!(!model.is_halted());
    model.tick(0.01).unwrap();
}

#[test]
fn kinematic_controller_moves_child_link() {
    let mut model = loaded(arm_config(ControllerMode::Kinematic));
    model.init_controllers().unwrap();
    model
        .joint_controller_mut("arm_controller")
        .unwrap()
        .set_target("shoulder", JointTarget::Position(0.5))
        .unwrap();

    for _ in 0..10 {
        model.tick(0.1).unwrap();
    }

    let state = model.get_joint_state();
    assert_relative_eq!(state["shoulder"].position, 0.5, epsilon = 1e-12);

    // The arm swings about Y around the joint at z = 0.2.
    let arm = model.link("arm").unwrap().world_pose();
    assert_relative_eq!(arm.rotation.scaled_axis(), Vector3::new(0.0, 0.5, 0.0), epsilon = 1e-12);
    assert_relative_eq!(
        arm.translation.vector,
        Vector3::new(0.3 * 0.5f64.sin(), 0.0, 0.2 + 0.3 * 0.5f64.cos()),
        epsilon = 1e-12
    );
    let body = model.link("arm").unwrap().collisions[0];
    assert_relative_eq!(model.scene().world_transform(body).unwrap(), *arm, epsilon = 1e-12);
}

#[test]
fn removed_joint_halts_the_model() {
    let mut model = loaded(arm_config(ControllerMode::Kinematic));
    model.init_controllers().unwrap();
    model.remove_joint("shoulder").unwrap();

    let err = model.tick(0.01).unwrap_err();
    assert_eq!(
        err,
        ModelError::Controller(ControllerError::DanglingJoint {
            controller: "arm_controller".to_string(),
            joint: "shoulder".to_string(),
        })
    );
    assert!(model.is_halted());
    assert!(matches!(model.tick(0.01), Err(ModelError::Halted { .. })));
}

#[test]
fn removed_link_halts_the_model() {
    let mut model = loaded(arm_config(ControllerMode::Kinematic));
    model.init_controllers().unwrap();
    model.remove_link("arm").unwrap();

    let err = model.tick(0.01).unwrap_err();
    assert_eq!(
        err,
        ModelError::DanglingLink {
            joint: "shoulder".to_string(),
            link: "arm".to_string(),
        }
    );
    assert!(model.is_halted());
    assert!(matches!(model.tick(0.01), Err(ModelError::Halted { .. })));
}

#[test]
fn unknown_controller_joint_fails_init() {
    let mut config = arm_config(ControllerMode::Kinematic);
    config
        .joint_controllers
        .get_mut("arm_controller")
        .unwrap()
        .joints = vec!["elbow".to_string()];
    let mut model = loaded(config);

    assert_eq!(
        model.init_controllers(),
        Err(ModelError::Controller(ControllerError::JointNotFound {
            controller: "arm_controller".to_string(),
            joint: "elbow".to_string(),
        }))
    );
    assert!(matches!(model.tick(0.01), Err(ModelError::ControllersNotInitialized(_))));
}

#[test]
fn gripper_grasps_and_releases_a_prop() {
    let mut sim = Simulation::new(hand_description(), PrimitiveGeometry::new(), hand_config(), false).unwrap();
    sim.spawn_prop("cube", Isometry3::translation(0.15, 0.0, 1.0), 0.02).unwrap();
    sim.command_gripper("gripper", GripperCommand::Close).unwrap();

    let mut events = Vec::new();
    for _ in 0..20 {
        events.extend(sim.step(0.1).unwrap());
    }
    assert_eq!(
        events,
        vec![GripperEvent::Grasped {
            gripper: "gripper".to_string(),
            object: Some("cube".to_string()),
        }]
    );
    let observation = sim.observe();
    assert_eq!(observation.grippers["gripper"].state, GripperState::Grasped);
    assert_eq!(observation.grippers["gripper"].grasped_object.as_deref(), Some("cube"));
    assert_relative_eq!(observation.joints["finger_joint"].position, 0.04, epsilon = 1e-12);

    sim.command_gripper("gripper", GripperCommand::Open).unwrap();
    let released = sim.step(0.1).unwrap();
    assert_eq!(
        released,
        vec![GripperEvent::Released {
            gripper: "gripper".to_string(),
            object: Some("cube".to_string()),
        }]
    );
    for _ in 0..10 {
        sim.step(0.1).unwrap();
    }
    assert_eq!(sim.model().gripper("gripper").unwrap().state(), GripperState::Idle);
}

#[test]
fn empty_hand_closes_without_grasping() {
    let mut sim = Simulation::new(hand_description(), PrimitiveGeometry::new(), hand_config(), false).unwrap();
    sim.command_gripper("gripper", GripperCommand::Close).unwrap();

    for _ in 0..20 {
        assert!(sim.step(0.1).unwrap().is_empty());
    }
    assert_eq!(sim.model().gripper("gripper").unwrap().state(), GripperState::Closing);
}

#[test]
fn reset_restores_the_initial_state() {
    let mut sim =
        Simulation::new(arm_description(), PrimitiveGeometry::new(), arm_config(ControllerMode::Kinematic), false)
            .unwrap();
    sim.set_joint_target("arm_controller", "shoulder", JointTarget::Position(1.0))
        .unwrap();
    for _ in 0..5 {
        sim.step(0.1).unwrap();
    }
    assert!(sim.observe().joints["shoulder"].position > 0.5);

    let observation = sim.reset().unwrap();
    assert_eq!(observation.frame, 0);
    assert_eq!(observation.joints["shoulder"].position, 0.0);
    assert_eq!(sim.load_report().links_built, 2);
}

#[test]
fn config_file_drives_the_simulation() {
    let config = SimConfig::from_toml_str(
        r#"
        [physics]
        gravity = [0.0, 0.0, 0.0]

        [joint_controllers.hand]
        joints = ["finger_joint"]

        [[grippers]]
        name = "gripper"
        gripper_joint_name = "finger_joint"
        grasp_component_name = "grasp"
        joint_controller = "hand"
        strategy = { type = "contact" }

        [grippers.grasp_comp_setting]
        gripper_name = "palm"
        "#,
    )
    .unwrap();

    let mut sim = Simulation::new(hand_description(), PrimitiveGeometry::new(), config, false).unwrap();
    sim.spawn_prop("cube", Isometry3::translation(0.15, 0.0, 1.0), 0.02).unwrap();
    sim.command_gripper("gripper", GripperCommand::Close).unwrap();

    // Contact needs a sample from a previous tick but no stall.
    assert!(sim.step(0.1).unwrap().is_empty());
    let events = sim.step(0.1).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(sim.observe().grippers["gripper"].state, GripperState::Grasped);
}
