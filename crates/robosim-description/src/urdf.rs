//! URDF import.
//!
//! URDF places links implicitly through joint origins, while the model layer
//! expects every link to carry its pose in the model frame. The importer walks
//! the joint tree from the root link and composes joint origins to recover
//! those poses.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use nalgebra::Isometry3;

use crate::{
    CollisionDescription, DescriptionError, Geometry, InertialDescription, JointDescription,
    JointKind, JointLimits, LinkDescription, ModelDescription, Pose, Quat, Vec3,
    VisualDescription,
};

/// Parse URDF text into a model description.
pub fn from_urdf_str(xml: &str) -> Result<ModelDescription, DescriptionError> {
    let robot = urdf_rs::read_from_string(xml).map_err(|e| DescriptionError::Urdf(e.to_string()))?;
    convert_robot(&robot)
}

/// Read and parse a URDF file into a model description.
pub fn from_urdf_file(path: impl AsRef<Path>) -> Result<ModelDescription, DescriptionError> {
    let robot = urdf_rs::read_file(path).map_err(|e| DescriptionError::Urdf(e.to_string()))?;
    convert_robot(&robot)
}

fn convert_robot(robot: &urdf_rs::Robot) -> Result<ModelDescription, DescriptionError> {
    if robot.links.is_empty() {
        return Err(DescriptionError::Empty(robot.name.clone()));
    }

    let mut seen = HashSet::new();
    for link in &robot.links {
        if !seen.insert(link.name.as_str()) {
            return Err(DescriptionError::DuplicateLink(link.name.clone()));
        }
    }

    let link_poses = compute_link_poses(robot);

    let links = robot
        .links
        .iter()
        .map(|link| {
            let pose = link_poses
                .get(link.name.as_str())
                .copied()
                .unwrap_or_else(Isometry3::identity);
            convert_link(link, Pose::from_isometry(&pose))
        })
        .collect();

    let joints = robot.joints.iter().filter_map(convert_joint).collect();

    Ok(ModelDescription {
        name: robot.name.clone(),
        links,
        joints,
    })
}

/// Model-frame pose of every link reachable from a root link.
fn compute_link_poses(robot: &urdf_rs::Robot) -> HashMap<&str, Isometry3<f64>> {
    let children: HashSet<&str> = robot.joints.iter().map(|j| j.child.link.as_str()).collect();

    let mut by_parent: HashMap<&str, Vec<&urdf_rs::Joint>> = HashMap::new();
    for joint in &robot.joints {
        by_parent
            .entry(joint.parent.link.as_str())
            .or_default()
            .push(joint);
    }

    let mut poses = HashMap::new();
    let mut queue = VecDeque::new();
    for link in &robot.links {
        if !children.contains(link.name.as_str()) {
            poses.insert(link.name.as_str(), Isometry3::identity());
            queue.push_back(link.name.as_str());
        }
    }

    while let Some(parent) = queue.pop_front() {
        let parent_pose = poses[parent];
        for joint in by_parent.get(parent).map(Vec::as_slice).unwrap_or(&[]) {
            let child = joint.child.link.as_str();
            if poses.contains_key(child) {
                tracing::warn!("URDF link '{}' reached twice, keeping first pose", child);
                continue;
            }
            poses.insert(child, parent_pose * convert_pose(&joint.origin).to_isometry());
            queue.push_back(child);
        }
    }

    for link in &robot.links {
        if !poses.contains_key(link.name.as_str()) {
            tracing::warn!("URDF link '{}' is not reachable from a root link", link.name);
        }
    }

    poses
}

fn convert_pose(pose: &urdf_rs::Pose) -> Pose {
    Pose::new(
        convert_vec(&pose.xyz),
        Quat::from_rpy(pose.rpy.0[0], pose.rpy.0[1], pose.rpy.0[2]),
    )
}

fn convert_vec(v: &urdf_rs::Vec3) -> Vec3 {
    Vec3::new(v.0[0], v.0[1], v.0[2])
}

fn convert_geometry(geometry: &urdf_rs::Geometry) -> Geometry {
    match geometry {
        urdf_rs::Geometry::Box { size } => Geometry::Box {
            size: convert_vec(size),
        },
        urdf_rs::Geometry::Cylinder { radius, length } => Geometry::Cylinder {
            radius: *radius,
            length: *length,
        },
        // Capsules are approximated by their enclosing cylinder.
        urdf_rs::Geometry::Capsule { radius, length } => Geometry::Cylinder {
            radius: *radius,
            length: *length + 2.0 * *radius,
        },
        urdf_rs::Geometry::Sphere { radius } => Geometry::Sphere { radius: *radius },
        urdf_rs::Geometry::Mesh { filename, scale } => Geometry::Mesh {
            uri: filename.clone(),
            scale: scale.as_ref().map(convert_vec),
        },
    }
}

fn convert_link(link: &urdf_rs::Link, pose: Pose) -> LinkDescription {
    let collisions = link
        .collision
        .iter()
        .enumerate()
        .map(|(i, c)| CollisionDescription {
            name: c
                .name
                .clone()
                .unwrap_or_else(|| format!("{}_collision_{}", link.name, i)),
            pose: convert_pose(&c.origin),
            geometry: convert_geometry(&c.geometry),
        })
        .collect();

    let visuals = link
        .visual
        .iter()
        .enumerate()
        .map(|(i, v)| VisualDescription {
            name: v
                .name
                .clone()
                .unwrap_or_else(|| format!("{}_visual_{}", link.name, i)),
            pose: convert_pose(&v.origin),
            geometry: convert_geometry(&v.geometry),
        })
        .collect();

    let mass = link.inertial.mass.value;
    let inertial = (mass > 0.0).then(|| InertialDescription {
        mass,
        pose: convert_pose(&link.inertial.origin),
    });

    LinkDescription {
        name: link.name.clone(),
        pose,
        collisions,
        visuals,
        self_collide: false,
        gravity: true,
        inertial,
    }
}

fn convert_joint(joint: &urdf_rs::Joint) -> Option<JointDescription> {
    let kind = match joint.joint_type {
        urdf_rs::JointType::Fixed => JointKind::Fixed,
        urdf_rs::JointType::Revolute => JointKind::Revolute,
        urdf_rs::JointType::Continuous => JointKind::Continuous,
        urdf_rs::JointType::Prismatic => JointKind::Prismatic,
        ref other => {
            tracing::warn!("Skipping URDF joint '{}': unsupported type {:?}", joint.name, other);
            return None;
        }
    };

    let limits = matches!(kind, JointKind::Revolute | JointKind::Prismatic).then(|| JointLimits {
        lower: joint.limit.lower,
        upper: joint.limit.upper,
        effort: joint.limit.effort,
        velocity: joint.limit.velocity,
    });

    Some(JointDescription {
        name: joint.name.clone(),
        kind,
        parent: joint.parent.link.clone(),
        child: joint.child.link.clone(),
        // URDF joint frames coincide with the child link frame.
        pose: Pose::identity(),
        axis: convert_vec(&joint.axis.xyz),
        limits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TWO_LINK: &str = r#"
        <robot name="two_link">
          <link name="base">
            <inertial>
              <mass value="2.0"/>
              <inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/>
            </inertial>
            <collision>
              <geometry><box size="0.2 0.2 0.1"/></geometry>
            </collision>
          </link>
          <link name="arm">
            <visual name="arm_visual">
              <origin xyz="0 0 0.1" rpy="0 0 0"/>
              <geometry><cylinder radius="0.02" length="0.2"/></geometry>
            </visual>
          </link>
          <link name="tool"/>
          <joint name="shoulder" type="revolute">
            <parent link="base"/>
            <child link="arm"/>
            <origin xyz="0 0 0.5" rpy="0 0 1.5707963267948966"/>
            <axis xyz="0 0 1"/>
            <limit lower="-1" upper="1" effort="10" velocity="2"/>
          </joint>
          <joint name="wrist" type="fixed">
            <parent link="arm"/>
            <child link="tool"/>
            <origin xyz="1 0 0" rpy="0 0 0"/>
          </joint>
        </robot>
    "#;

    #[test]
    fn link_poses_compose_along_the_chain() {
        let doc = from_urdf_str(TWO_LINK).unwrap();
        assert_eq!(doc.name, "two_link");
        assert_eq!(doc.links.len(), 3);

        let arm = doc.link("arm").unwrap();
        assert_relative_eq!(arm.pose.location.z, 0.5, epsilon = 1e-12);

        // The 90 degree yaw at the shoulder turns the wrist offset onto +Y.
        let tool = doc.link("tool").unwrap();
        assert_relative_eq!(tool.pose.location.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(tool.pose.location.y, 1.0, epsilon = 1e-9);
        assert_relative_eq!(tool.pose.location.z, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn shapes_inertials_and_limits_are_converted() {
        let doc = from_urdf_str(TWO_LINK).unwrap();

        let base = doc.link("base").unwrap();
        assert_eq!(base.collisions.len(), 1);
        assert_eq!(base.collisions[0].name, "base_collision_0");
        assert_eq!(base.inertial.map(|i| i.mass), Some(2.0));

        let arm = doc.link("arm").unwrap();
        assert!(arm.collisions.is_empty());
        assert_eq!(arm.visuals[0].name, "arm_visual");
        assert!(arm.inertial.is_none());

        let shoulder = doc.joint("shoulder").unwrap();
        assert_eq!(shoulder.kind, JointKind::Revolute);
        assert_eq!(shoulder.axis, Vec3::new(0.0, 0.0, 1.0));
        let limits = shoulder.limits.unwrap();
        assert_eq!((limits.lower, limits.upper), (-1.0, 1.0));
        assert_eq!(limits.velocity, 2.0);

        assert!(doc.joint("wrist").unwrap().limits.is_none());
    }

    #[test]
    fn empty_robot_is_rejected() {
        let result = from_urdf_str(r#"<robot name="nothing"></robot>"#);
        assert!(matches!(result, Err(DescriptionError::Empty(_))));
    }
}
