use std::f32::consts::{PI, TAU};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::scene_graph::MeshShape;

/// Per-instance data for billboarded points.
///
/// Positions and colors come straight from the point field; `phase` carries
/// the auxiliary channel the shading program desynchronises with.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PointInstance {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub phase: f32,
}

impl PointInstance {
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }

    /// Interleave parallel attribute arrays.
    pub fn interleave(positions: &[f32], colors: &[f32], phases: &[f32]) -> Vec<PointInstance> {
        positions
            .chunks_exact(3)
            .zip(colors.chunks_exact(3))
            .zip(phases.iter().copied().chain(std::iter::repeat(0.0)))
            .map(|((p, c), phase)| PointInstance {
                position: [p[0], p[1], p[2]],
                color: [c[0], c[1], c[2]],
                phase,
            })
            .collect()
    }
}

/// Vertex for line segments and CPU point clouds.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl ColorVertex {
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ColorVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12, // [f32; 3] is 12 bytes
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }

    pub fn interleave(positions: &[f32], colors: &[f32]) -> Vec<ColorVertex> {
        positions
            .chunks_exact(3)
            .zip(colors.chunks_exact(3))
            .map(|(p, c)| ColorVertex {
                position: [p[0], p[1], p[2]],
                color: [c[0], c[1], c[2]],
            })
            .collect()
    }
}

/// Vertex for lit meshes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.normalize_or_zero().to_array(),
        }
    }

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Indexed triangle list for a shape.
pub fn tessellate(shape: &MeshShape) -> (Vec<MeshVertex>, Vec<u16>) {
    match *shape {
        MeshShape::Sphere {
            radius,
            width_segments,
            height_segments,
        } => sphere(radius, width_segments.max(3), height_segments.max(2)),
        MeshShape::Torus {
            radius,
            tube,
            radial_segments,
            tubular_segments,
        } => torus(radius, tube, radial_segments.max(3), tubular_segments.max(3)),
        MeshShape::Cylinder {
            radius_top,
            radius_bottom,
            height,
            radial_segments,
        } => cylinder(radius_top, radius_bottom, height, radial_segments.max(3)),
    }
}

/// Quad grid indices for a `(rows + 1) x (cols + 1)` vertex lattice.
fn grid_indices(rows: u32, cols: u32, indices: &mut Vec<u16>, base: u16) {
    for row in 0..rows {
        for col in 0..cols {
            let first = base + (row * (cols + 1) + col) as u16;
            let second = first + cols as u16 + 1;

            // Two triangles per quad
            indices.extend_from_slice(&[first, second, first + 1]);
            indices.extend_from_slice(&[second, second + 1, first + 1]);
        }
    }
}

fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> (Vec<MeshVertex>, Vec<u16>) {
    let mut vertices = Vec::with_capacity(((width_segments + 1) * (height_segments + 1)) as usize);
    for lat in 0..=height_segments {
        let theta = PI * lat as f32 / height_segments as f32;
        for lon in 0..=width_segments {
            let phi = TAU * lon as f32 / width_segments as f32;
            let n = Vec3::new(phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin());
            vertices.push(MeshVertex::new(n * radius, n));
        }
    }

    let mut indices = Vec::new();
    grid_indices(height_segments, width_segments, &mut indices, 0);
    (vertices, indices)
}

/// Torus in the XY plane, ring around Z.
fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> (Vec<MeshVertex>, Vec<u16>) {
    let mut vertices = Vec::with_capacity(((radial_segments + 1) * (tubular_segments + 1)) as usize);
    for j in 0..=radial_segments {
        let v = TAU * j as f32 / radial_segments as f32;
        for i in 0..=tubular_segments {
            let u = TAU * i as f32 / tubular_segments as f32;
            let center = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
            let position = Vec3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            );
            vertices.push(MeshVertex::new(position, position - center));
        }
    }

    let mut indices = Vec::new();
    grid_indices(radial_segments, tubular_segments, &mut indices, 0);
    (vertices, indices)
}

/// Capped cylinder along Y, centered on the origin.
fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, radial_segments: u32) -> (Vec<MeshVertex>, Vec<u16>) {
    let half = height / 2.0;
    let slope = (radius_bottom - radius_top) / height;
    let mut vertices = Vec::new();

    // Side wall: top ring then bottom ring.
    for (y, r) in [(half, radius_top), (-half, radius_bottom)] {
        for s in 0..=radial_segments {
            let theta = TAU * s as f32 / radial_segments as f32;
            let (sin, cos) = theta.sin_cos();
            vertices.push(MeshVertex::new(
                Vec3::new(r * sin, y, r * cos),
                Vec3::new(sin, slope, cos),
            ));
        }
    }
    let mut indices = Vec::new();
    grid_indices(1, radial_segments, &mut indices, 0);

    // Caps: center vertex followed by a rim.
    for (y, r, up) in [(half, radius_top, 1.0f32), (-half, radius_bottom, -1.0)] {
        if r <= 0.0 {
            continue;
        }
        let center = vertices.len() as u16;
        vertices.push(MeshVertex::new(Vec3::new(0.0, y, 0.0), Vec3::Y * up));
        for s in 0..=radial_segments {
            let theta = TAU * s as f32 / radial_segments as f32;
            vertices.push(MeshVertex::new(
                Vec3::new(r * theta.sin(), y, r * theta.cos()),
                Vec3::Y * up,
            ));
        }
        for s in 0..radial_segments as u16 {
            let a = center + 1 + s;
            if up > 0.0 {
                indices.extend_from_slice(&[center, a, a + 1]);
            } else {
                indices.extend_from_slice(&[center, a + 1, a]);
            }
        }
    }

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(vertices: &[MeshVertex], indices: &[u16]) {
        assert_eq!(indices.len() % 3, 0);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn test_sphere_counts_and_radius() {
        let (vertices, indices) = tessellate(&MeshShape::Sphere {
            radius: 2.8,
            width_segments: 32,
            height_segments: 32,
        });
        assert_eq!(vertices.len(), 33 * 33);
        assert_eq!(indices.len(), 32 * 32 * 6);
        assert_valid(&vertices, &indices);
        for v in &vertices {
            assert!((Vec3::from(v.position).length() - 2.8).abs() < 1e-4);
        }
    }

    #[test]
    fn test_halved_segments_quarter_triangles() {
        let full = tessellate(&MeshShape::Sphere { radius: 1.0, width_segments: 32, height_segments: 32 });
        let reduced = tessellate(&MeshShape::Sphere { radius: 1.0, width_segments: 16, height_segments: 16 });
        assert_eq!(full.1.len(), reduced.1.len() * 4);
    }

    #[test]
    fn test_torus_stays_on_tube() {
        let (vertices, indices) = tessellate(&MeshShape::Torus {
            radius: 3.0,
            tube: 0.1,
            radial_segments: 8,
            tubular_segments: 32,
        });
        assert_eq!(vertices.len(), 9 * 33);
        assert_valid(&vertices, &indices);
        for v in &vertices {
            let p = Vec3::from(v.position);
            let ring = Vec3::new(p.x, p.y, 0.0).normalize() * 3.0;
            assert!(((p - ring).length() - 0.1).abs() < 1e-4);
        }
    }

    #[test]
    fn test_cylinder_extent() {
        let (vertices, indices) = tessellate(&MeshShape::Cylinder {
            radius_top: 0.02,
            radius_bottom: 0.05,
            height: 6.0,
            radial_segments: 8,
        });
        assert_valid(&vertices, &indices);
        let max_y = vertices.iter().map(|v| v.position[1]).fold(f32::MIN, f32::max);
        let min_y = vertices.iter().map(|v| v.position[1]).fold(f32::MAX, f32::min);
        assert_eq!((min_y, max_y), (-3.0, 3.0));
    }

    #[test]
    fn test_interleave() {
        let instances = PointInstance::interleave(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[0.1; 6], &[0.5]);
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[1].position, [4.0, 5.0, 6.0]);
        assert_eq!(instances[0].phase, 0.5);
        assert_eq!(instances[1].phase, 0.0);
        assert_eq!(std::mem::size_of::<PointInstance>(), 28);
    }
}
