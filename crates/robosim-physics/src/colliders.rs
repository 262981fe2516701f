//! Collision shape generation from scene body geometry.

use std::f32::consts::FRAC_PI_2;

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use parry3d::shape::{ConvexPolyhedron, SharedShape, TriMesh};
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::geometry::{BodyGeometry, MeshData};

/// Strategy for generating collision shapes from meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColliderStrategy {
    /// Use convex hull (fast, approximate).
    #[default]
    ConvexHull,
    /// Use triangle mesh (accurate, slower).
    TriMesh,
    /// Use axis-aligned bounding box (fastest, rough).
    Aabb,
}

/// Generate a collision shape for a body's geometry.
///
/// Returns the shape together with its pose in the body frame. Primitives
/// sit at the body origin except cylinders, which Rapier builds along Y
/// and are turned onto the body's Z axis.
pub fn geometry_to_shape(
    geometry: &BodyGeometry,
    strategy: ColliderStrategy,
    name: &str,
) -> Result<(SharedShape, Isometry3<f32>), PhysicsError> {
    match geometry {
        BodyGeometry::Cuboid { half_extents } => {
            let [x, y, z] = *half_extents;
            Ok((SharedShape::cuboid(x as f32, y as f32, z as f32), Isometry3::identity()))
        }
        BodyGeometry::Cylinder {
            radius,
            half_height,
        } => {
            let along_z = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
            Ok((
                SharedShape::cylinder(*half_height as f32, *radius as f32),
                Isometry3::from_parts(Translation3::identity(), along_z),
            ))
        }
        BodyGeometry::Ball { radius } => Ok((SharedShape::ball(*radius as f32), Isometry3::identity())),
        BodyGeometry::TriMesh(mesh) => mesh_to_collider(mesh, strategy, name),
    }
}

/// Generate a collision shape from a triangle mesh.
///
/// # Arguments
///
/// * `mesh` - The triangle mesh to convert (meters)
/// * `strategy` - The collision shape strategy to use
/// * `name` - Name for error messages
pub fn mesh_to_collider(
    mesh: &MeshData,
    strategy: ColliderStrategy,
    name: &str,
) -> Result<(SharedShape, Isometry3<f32>), PhysicsError> {
    if mesh.is_empty() {
        return Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: "Empty mesh".to_string(),
        });
    }

    match strategy {
        ColliderStrategy::ConvexHull => create_convex_hull(mesh, name),
        ColliderStrategy::TriMesh => create_trimesh(mesh, name).map(|s| (s, Isometry3::identity())),
        ColliderStrategy::Aabb => Ok(create_aabb(mesh)),
    }
}

fn points(mesh: &MeshData) -> Vec<Point3<f32>> {
    mesh.vertices
        .chunks_exact(3)
        .map(|v| Point3::new(v[0], v[1], v[2]))
        .collect()
}

fn create_convex_hull(mesh: &MeshData, name: &str) -> Result<(SharedShape, Isometry3<f32>), PhysicsError> {
    let points = points(mesh);

    if points.len() < 4 {
        return Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: "Need at least 4 points for convex hull".to_string(),
        });
    }

    match ConvexPolyhedron::from_convex_hull(&points) {
        Some(hull) => Ok((SharedShape::new(hull), Isometry3::identity())),
        None => {
            // Degenerate (flat) geometry has no hull.
            tracing::debug!("Convex hull failed for '{}', using its bounding box", name);
            Ok(create_aabb(mesh))
        }
    }
}

fn create_trimesh(mesh: &MeshData, name: &str) -> Result<SharedShape, PhysicsError> {
    let vertex_count = mesh.vertices.len() / 3;
    let indices: Vec<[u32; 3]> = mesh
        .indices
        .chunks_exact(3)
        .map(|i| [i[0], i[1], i[2]])
        .collect();

    if indices.is_empty() {
        return Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: "No triangles in mesh".to_string(),
        });
    }
    if let Some(bad) = indices.iter().flatten().find(|i| **i as usize >= vertex_count) {
        return Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: format!("Index {} out of range for {} vertices", bad, vertex_count),
        });
    }

    match TriMesh::new(points(mesh), indices) {
        Ok(trimesh) => Ok(SharedShape::new(trimesh)),
        Err(e) => Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: format!("Failed to create trimesh: {:?}", e),
        }),
    }
}

fn create_aabb(mesh: &MeshData) -> (SharedShape, Isometry3<f32>) {
    let mut min = Vector3::repeat(f32::INFINITY);
    let mut max = Vector3::repeat(f32::NEG_INFINITY);

    for p in points(mesh) {
        min = min.inf(&p.coords);
        max = max.sup(&p.coords);
    }

    // Flat meshes still get a sliver of thickness.
    let half_extents = ((max - min) / 2.0).map(|h| h.max(1.0e-4));
    let center = (max + min) / 2.0;

    (
        SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
        Isometry3::translation(center.x, center.y, center.z),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn simple_cube_mesh() -> MeshData {
        // 10 cm cube with one corner at the origin
        let s = 0.1;
        MeshData {
            vertices: vec![
                // Front face
                0.0, 0.0, s, s, 0.0, s, s, s, s, 0.0, s, s, // Back face
                0.0, 0.0, 0.0, 0.0, s, 0.0, s, s, 0.0, s, 0.0, 0.0,
            ],
            indices: vec![
                // Front
                0, 1, 2, 0, 2, 3, // Back
                4, 5, 6, 4, 6, 7, // Top
                3, 2, 6, 3, 6, 5, // Bottom
                0, 7, 1, 0, 4, 7, // Right
                1, 7, 6, 1, 6, 2, // Left
                0, 3, 5, 0, 5, 4,
            ],
        }
    }

    #[test]
    fn test_convex_hull() {
        let (shape, offset) =
            mesh_to_collider(&simple_cube_mesh(), ColliderStrategy::ConvexHull, "test").unwrap();
        assert!(shape.as_convex_polyhedron().is_some());
        assert_eq!(offset, Isometry3::identity());
    }

    #[test]
    fn test_trimesh() {
        let (shape, _) = mesh_to_collider(&simple_cube_mesh(), ColliderStrategy::TriMesh, "test").unwrap();
        assert!(shape.as_trimesh().is_some());
    }

    #[test]
    fn test_aabb_is_centered_on_the_mesh() {
        let (shape, offset) = mesh_to_collider(&simple_cube_mesh(), ColliderStrategy::Aabb, "test").unwrap();
        let cuboid = shape.as_cuboid().unwrap();
        assert_relative_eq!(cuboid.half_extents, Vector3::repeat(0.05), epsilon = 1e-6);
        assert_relative_eq!(offset.translation.vector, Vector3::repeat(0.05), epsilon = 1e-6);
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let result = mesh_to_collider(&MeshData::default(), ColliderStrategy::ConvexHull, "empty");
        assert!(matches!(result, Err(PhysicsError::CollisionShape { .. })));
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let mut mesh = simple_cube_mesh();
        mesh.indices[0] = 99;
        let result = mesh_to_collider(&mesh, ColliderStrategy::TriMesh, "broken");
        assert!(matches!(result, Err(PhysicsError::CollisionShape { .. })));
    }

    #[test]
    fn test_cylinder_is_turned_onto_z() {
        let geometry = BodyGeometry::Cylinder {
            radius: 0.05,
            half_height: 0.2,
        };
        let (shape, offset) = geometry_to_shape(&geometry, ColliderStrategy::default(), "cyl").unwrap();
        let cylinder = shape.as_cylinder().unwrap();
        assert_relative_eq!(cylinder.half_height, 0.2);
        assert_relative_eq!(offset * Vector3::y(), Vector3::z(), epsilon = 1e-6);
    }

    #[test]
    fn test_mesh_geometry_uses_strategy() {
        let geometry = BodyGeometry::TriMesh(Arc::new(simple_cube_mesh()));
        let (shape, _) = geometry_to_shape(&geometry, ColliderStrategy::Aabb, "mesh").unwrap();
        assert!(shape.as_cuboid().is_some());
    }
}
