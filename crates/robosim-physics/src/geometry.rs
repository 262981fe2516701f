//! Geometry providers.
//!
//! Shape descriptions only name geometry; a [`GeometryProvider`] turns them
//! into concrete [`BodyGeometry`] the scene and the physics host can use. The
//! core never looks inside a provider and treats `None` as "empty geometry".

use std::collections::HashMap;
use std::sync::Arc;

use robosim_description::{Geometry, Vec3};

/// Indexed triangle mesh with flat `f32` buffers (meters).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    /// Vertex positions as `[x0, y0, z0, x1, ...]`.
    pub vertices: Vec<f32>,
    /// Triangle indices, three per triangle.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// True when the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Copy of the mesh scaled per axis.
    pub fn scaled(&self, scale: Vec3) -> MeshData {
        let factors = [scale.x as f32, scale.y as f32, scale.z as f32];
        let vertices = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, v)| v * factors[i % 3])
            .collect();
        MeshData {
            vertices,
            indices: self.indices.clone(),
        }
    }

    /// Distance from the mesh origin to its farthest vertex.
    pub fn bounding_radius(&self) -> f64 {
        self.vertices
            .chunks(3)
            .map(|v| ((v[0] * v[0] + v[1] * v[1] + v[2] * v[2]) as f64).sqrt())
            .fold(0.0, f64::max)
    }
}

/// Resolved geometry of a scene body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyGeometry {
    /// Box with half extents.
    Cuboid {
        /// Half edge lengths.
        half_extents: [f64; 3],
    },
    /// Cylinder along local Z.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Half length along Z.
        half_height: f64,
    },
    /// Sphere.
    Ball {
        /// Radius.
        radius: f64,
    },
    /// Triangle mesh shared between bodies.
    TriMesh(Arc<MeshData>),
}

impl BodyGeometry {
    /// Radius of a sphere around the body origin enclosing the geometry.
    pub fn bounding_radius(&self) -> f64 {
        match self {
            BodyGeometry::Cuboid { half_extents } => {
                let [x, y, z] = *half_extents;
                (x * x + y * y + z * z).sqrt()
            }
            BodyGeometry::Cylinder {
                radius,
                half_height,
            } => (radius * radius + half_height * half_height).sqrt(),
            BodyGeometry::Ball { radius } => *radius,
            BodyGeometry::TriMesh(mesh) => mesh.bounding_radius(),
        }
    }
}

/// Supplies body geometry for shape descriptions.
pub trait GeometryProvider {
    /// Resolve the geometry of a shape owned by `owner` (the shape name).
    ///
    /// Returns `None` when the geometry resolves to empty.
    fn resolve(&self, owner: &str, geometry: &Geometry) -> Option<BodyGeometry>;
}

/// Provider for analytic primitives plus a registry of preloaded meshes.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveGeometry {
    meshes: HashMap<String, Arc<MeshData>>,
}

impl PrimitiveGeometry {
    /// Provider with no registered meshes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mesh under a URI.
    pub fn with_mesh(mut self, uri: impl Into<String>, mesh: MeshData) -> Self {
        self.register_mesh(uri, mesh);
        self
    }

    /// Register a mesh under a URI.
    pub fn register_mesh(&mut self, uri: impl Into<String>, mesh: MeshData) {
        self.meshes.insert(uri.into(), Arc::new(mesh));
    }
}

fn positive(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite() && *v > 0.0)
}

impl GeometryProvider for PrimitiveGeometry {
    fn resolve(&self, owner: &str, geometry: &Geometry) -> Option<BodyGeometry> {
        match geometry {
            Geometry::Box { size } if positive(&[size.x, size.y, size.z]) => {
                Some(BodyGeometry::Cuboid {
                    half_extents: [size.x / 2.0, size.y / 2.0, size.z / 2.0],
                })
            }
            Geometry::Cylinder { radius, length } if positive(&[*radius, *length]) => {
                Some(BodyGeometry::Cylinder {
                    radius: *radius,
                    half_height: length / 2.0,
                })
            }
            Geometry::Sphere { radius } if positive(&[*radius]) => {
                Some(BodyGeometry::Ball { radius: *radius })
            }
            Geometry::Mesh { uri, scale } => {
                let Some(mesh) = self.meshes.get(uri) else {
                    tracing::debug!("No mesh registered for '{}' ({})", uri, owner);
                    return None;
                };
                if mesh.is_empty() {
                    return None;
                }
                match scale {
                    Some(s) if *s != Vec3::new(1.0, 1.0, 1.0) => {
                        Some(BodyGeometry::TriMesh(Arc::new(mesh.scaled(*s))))
                    }
                    _ => Some(BodyGeometry::TriMesh(Arc::clone(mesh))),
                }
            }
            _ => None,
        }
    }
}
