#![allow(dead_code)]

use robosim_description::{Geometry, JointDescription, JointKind, JointLimits, LinkDescription, ModelDescription, Pose, Vec3};
use robosim_physics::{
    ControllerMode, GraspComponentSetting, GripperControllerParameters, JointControllerSettings, SimConfig,
};

pub fn cube(size: f64) -> Geometry {
    Geometry::Box {
        size: Vec3::new(size, size, size),
    }
}

pub fn slab(x: f64, y: f64, z: f64) -> Geometry {
    Geometry::Box { size: Vec3::new(x, y, z) }
}

/// Box link with a matching visual.
pub fn solid_link(name: &str, pose: Pose, geometry: Geometry) -> LinkDescription {
    LinkDescription::new(name, pose)
        .with_collision(format!("{}_collision", name), Pose::identity(), geometry.clone())
        .with_visual(format!("{}_visual", name), Pose::identity(), geometry)
}

/// Base, arm and a collision-less sensor link.
///
/// `shoulder` turns `arm` about Y at the top of the base; `sensor_mount`
/// points at the sensor link, which is not built unless virtual links are
/// enabled.
pub fn arm_description() -> ModelDescription {
    let mut description = ModelDescription::new("arm");
    description.links.push(solid_link("base", Pose::identity(), cube(0.2)));
    description.links.push(solid_link(
        "arm",
        Pose::from_location(0.0, 0.0, 0.5),
        slab(0.05, 0.05, 0.4),
    ));
    description.links.push(
        LinkDescription::new("sensor", Pose::from_location(0.0, 0.0, 0.75)).with_visual(
            "sensor_visual",
            Pose::identity(),
            cube(0.02),
        ),
    );

    let mut shoulder = JointDescription::new("shoulder", JointKind::Revolute, "base", "arm")
        .with_axis(Vec3::new(0.0, 1.0, 0.0))
        .with_limits(JointLimits {
            lower: -1.5,
            upper: 1.5,
            effort: 100.0,
            velocity: 2.0,
        });
    shoulder.pose = Pose::from_location(0.0, 0.0, -0.3);
    description.joints.push(shoulder);
    description
        .joints
        .push(JointDescription::new("sensor_mount", JointKind::Fixed, "arm", "sensor"));
    description
}

/// Palm with a prismatic finger, at 1 m height.
pub fn hand_description() -> ModelDescription {
    let mut description = ModelDescription::new("hand");
    description
        .links
        .push(solid_link("palm", Pose::from_location(0.0, 0.0, 1.0), cube(0.05)));
    description.links.push(solid_link(
        "finger",
        Pose::from_location(0.0, 0.1, 1.0),
        cube(0.02),
    ));
    description.joints.push(
        JointDescription::new("finger_joint", JointKind::Prismatic, "palm", "finger").with_limits(JointLimits {
            lower: 0.0,
            upper: 0.04,
            effort: 10.0,
            velocity: 0.1,
        }),
    );
    description
}

/// Kinematic `hand` controller and a stall gripper on the palm.
pub fn hand_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.physics.gravity = [0.0, 0.0, 0.0];
    config.joint_controllers.insert(
        "hand".to_string(),
        JointControllerSettings {
            joints: vec!["finger_joint".to_string()],
            mode: ControllerMode::Kinematic,
            ..JointControllerSettings::default()
        },
    );
    config.grippers.push(GripperControllerParameters {
        name: "gripper".to_string(),
        gripper_joint_name: "finger_joint".to_string(),
        grasp_component_name: "grasp".to_string(),
        joint_controller: "hand".to_string(),
        grasp_comp_setting: GraspComponentSetting {
            gripper_name: "palm".to_string(),
            ..GraspComponentSetting::default()
        },
        ..GripperControllerParameters::default()
    });
    config
}

/// Single controller over every movable joint.
pub fn arm_config(mode: ControllerMode) -> SimConfig {
    let mut config = SimConfig::default();
    config.physics.gravity = [0.0, 0.0, 0.0];
    config.joint_controllers.insert(
        "arm_controller".to_string(),
        JointControllerSettings {
            mode,
            ..JointControllerSettings::default()
        },
    );
    config
}
