//! GPU mirror of the scene graph.
//!
//! [`GpuScene`] keeps one set of wgpu buffers per renderable entity. Buffers
//! are created when an entity first appears, dropped when it disappears, and
//! rewritten only when the entity's attribute buffers were flagged dirty.
//! Uniforms (transform, time, material) are cheap and written every frame.

use std::collections::{BTreeSet, HashMap};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::gpu::mesh::{tessellate, ColorVertex, PointInstance};
use crate::gpu::pipeline::{PipelineLayouts, Pipelines};
use crate::material::{BlendMode, MeshMaterial, ProgramId};
use crate::quality::CameraConfig;
use crate::scene_graph::{EntityId, SceneEntity, SceneGraph};

const NEAR: f32 = 0.1;
const FAR: f32 = 1000.0;

/// Projection and view matrices for the frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraMatrices {
    pub projection: Mat4,
    pub view: Mat4,
}

impl CameraMatrices {
    /// Camera at the configured position looking at the origin.
    pub fn from_config(camera: &CameraConfig, aspect: f32) -> Self {
        Self {
            projection: Mat4::perspective_rh(camera.fov_degrees.to_radians(), aspect, NEAR, FAR),
            view: Mat4::look_at_rh(Vec3::from(camera.position), Vec3::ZERO, Vec3::Y),
        }
    }
}

/// Per-draw view uniforms, matching `View` in every WGSL program.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ViewUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    /// xy: projection scale so billboards keep a world-space size.
    pub billboard: [f32; 4],
}

impl ViewUniforms {
    pub fn new(camera: &CameraMatrices, model: Mat4) -> Self {
        Self {
            view_proj: (camera.projection * camera.view).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            billboard: [camera.projection.x_axis.x, camera.projection.y_axis.y, 0.0, 0.0],
        }
    }
}

/// Matches `MeshUniforms` in `mesh.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshUniforms {
    /// rgb + opacity.
    pub color: [f32; 4],
    /// rgb + intensity.
    pub emissive: [f32; 4],
    /// x: lit.
    pub flags: [f32; 4],
}

impl From<&MeshMaterial> for MeshUniforms {
    fn from(material: &MeshMaterial) -> Self {
        let [r, g, b] = material.color;
        let [er, eg, eb] = material.emissive;
        Self {
            color: [r, g, b, material.opacity],
            emissive: [er, eg, eb, material.emissive_intensity],
            flags: [if material.lit { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

/// Matches `LineUniforms` in `line.wgsl` and `CloudUniforms` in `cloud.wgsl`
/// (`a` is size for clouds, unused for lines).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FlatUniforms {
    pub first: f32,
    pub second: f32,
    pub _padding: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrimitiveKind {
    ShaderPoints(ProgramId),
    Cloud(BlendMode),
    Lines(BlendMode),
    Mesh { double_sided: bool },
}

struct GpuPrimitive {
    kind: PrimitiveKind,
    view_buffer: wgpu::Buffer,
    view_bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    /// Instances for points, vertices for lines, indices for meshes.
    count: u32,
}

/// What one [`GpuScene::sync`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub released: usize,
    pub reuploaded: usize,
}

/// Vertex bytes and counts for an entity, `None` for groups.
fn vertex_data(entity: &SceneEntity) -> Option<(PrimitiveKind, Vec<u8>, Option<Vec<u8>>, u32)> {
    match entity {
        SceneEntity::Group => None,
        SceneEntity::ShaderPoints(points) => {
            let field = points.geometry();
            let instances = PointInstance::interleave(&field.positions, &field.colors, &field.auxiliary);
            let count = instances.len() as u32;
            Some((
                PrimitiveKind::ShaderPoints(points.program().id),
                bytemuck::cast_slice(&instances).to_vec(),
                None,
                count,
            ))
        }
        SceneEntity::Points(cloud) => {
            let instances = PointInstance::interleave(cloud.positions.as_slice(), cloud.colors.as_slice(), &[]);
            let count = instances.len() as u32;
            Some((
                PrimitiveKind::Cloud(cloud.material.blend_mode),
                bytemuck::cast_slice(&instances).to_vec(),
                None,
                count,
            ))
        }
        SceneEntity::Lines(lines) => {
            let vertices = ColorVertex::interleave(lines.positions.as_slice(), lines.colors.as_slice());
            let count = vertices.len() as u32;
            Some((
                PrimitiveKind::Lines(lines.material.blend_mode),
                bytemuck::cast_slice(&vertices).to_vec(),
                None,
                count,
            ))
        }
        SceneEntity::Mesh(mesh) => {
            let (vertices, indices) = tessellate(&mesh.shape);
            let count = indices.len() as u32;
            Some((
                PrimitiveKind::Mesh {
                    double_sided: mesh.material.double_sided,
                },
                bytemuck::cast_slice(&vertices).to_vec(),
                Some(bytemuck::cast_slice(&indices).to_vec()),
                count,
            ))
        }
    }
}

/// Uniform bytes for the primitive slot (bind group 1).
fn uniform_data(entity: &SceneEntity) -> Vec<u8> {
    match entity {
        SceneEntity::Group => Vec::new(),
        SceneEntity::ShaderPoints(points) => points.uniforms().to_bytes(),
        SceneEntity::Points(cloud) => bytemuck::bytes_of(&FlatUniforms {
            first: cloud.material.size,
            second: cloud.material.opacity,
            _padding: [0.0; 2],
        })
        .to_vec(),
        SceneEntity::Lines(lines) => bytemuck::bytes_of(&FlatUniforms {
            first: lines.material.opacity,
            second: 0.0,
            _padding: [0.0; 2],
        })
        .to_vec(),
        SceneEntity::Mesh(mesh) => bytemuck::bytes_of(&MeshUniforms::from(&mesh.material)).to_vec(),
    }
}

fn uniform_buffer(device: &wgpu::Device, label: &str, contents: &[u8]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

fn bind_group(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, buffer: &wgpu::Buffer) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: None,
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

/// GPU buffers for every renderable entity.
#[derive(Default)]
pub struct GpuScene {
    primitives: HashMap<EntityId, GpuPrimitive>,
    /// Scene traversal order from the last sync, visible entities only.
    draw_order: Vec<EntityId>,
}

impl GpuScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Bring GPU state in line with `scene` and clear its dirty flags.
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &PipelineLayouts,
        scene: &mut SceneGraph,
        camera: &CameraMatrices,
    ) -> SyncReport {
        let mut report = SyncReport::default();

        let before = self.primitives.len();
        self.primitives.retain(|id, _| scene.exists(*id));
        report.released = before - self.primitives.len();

        self.draw_order.clear();
        let roots: Vec<EntityId> = scene.roots().to_vec();
        for id in roots.into_iter().flat_map(|root| scene.descendants(root)) {
            let Some(node) = scene.get(id) else {
                continue;
            };
            if !self.primitives.contains_key(&id) {
                if let Some(primitive) = Self::create(device, layouts, &node.entity) {
                    self.primitives.insert(id, primitive);
                    report.created += 1;
                }
            }
            if self.primitives.contains_key(&id) && scene.is_visible(id) {
                self.draw_order.push(id);
            }
        }

        // Fresh buffers already hold current data.
        let dirty: BTreeSet<EntityId> = scene.take_dirty().into_iter().map(|(id, _)| id).collect();
        for id in dirty {
            let (Some(primitive), Some(node)) = (self.primitives.get(&id), scene.get(id)) else {
                continue;
            };
            if let (Some(buffer), Some((_, bytes, _, _))) = (&primitive.vertex_buffer, vertex_data(&node.entity)) {
                queue.write_buffer(buffer, 0, &bytes);
                report.reuploaded += 1;
            }
        }

        for (&id, primitive) in &self.primitives {
            let Some(node) = scene.get(id) else {
                continue;
            };
            let view = ViewUniforms::new(camera, scene.world_matrix(id));
            queue.write_buffer(&primitive.view_buffer, 0, bytemuck::bytes_of(&view));
            queue.write_buffer(&primitive.uniform_buffer, 0, &uniform_data(&node.entity));
        }

        if report.created + report.released > 0 {
            log::debug!(
                "gpu sync: {} created, {} released, {} reuploaded",
                report.created,
                report.released,
                report.reuploaded
            );
        }
        report
    }

    fn create(device: &wgpu::Device, layouts: &PipelineLayouts, entity: &SceneEntity) -> Option<GpuPrimitive> {
        let (kind, vertices, indices, count) = vertex_data(entity)?;

        let view_buffer = uniform_buffer(device, "View Buffer", bytemuck::bytes_of(&ViewUniforms::zeroed()));
        let view_bind_group = bind_group(device, &layouts.view, &view_buffer);
        let uniform_buffer = uniform_buffer(device, "Primitive Uniform Buffer", &uniform_data(entity));
        let uniform_bind_group = bind_group(device, &layouts.primitive, &uniform_buffer);

        let vertex_buffer = (!vertices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Primitive Vertex Buffer"),
                contents: &vertices,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            })
        });
        let index_buffer = indices.filter(|i| !i.is_empty()).map(|indices| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Primitive Index Buffer"),
                contents: &indices,
                usage: wgpu::BufferUsages::INDEX,
            })
        });

        Some(GpuPrimitive {
            kind,
            view_buffer,
            view_bind_group,
            uniform_buffer,
            uniform_bind_group,
            vertex_buffer,
            index_buffer,
            count,
        })
    }

    /// Record draws for every visible primitive, in scene order.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, pipelines: &Pipelines, lighting: &wgpu::BindGroup) {
        for id in &self.draw_order {
            let Some(primitive) = self.primitives.get(id) else {
                continue;
            };
            let Some(vertex_buffer) = &primitive.vertex_buffer else {
                continue;
            };
            let pipeline = match primitive.kind {
                PrimitiveKind::ShaderPoints(program) => pipelines.shader_points(program),
                PrimitiveKind::Cloud(blend) => pipelines.cloud(blend),
                PrimitiveKind::Lines(blend) => pipelines.lines(blend),
                PrimitiveKind::Mesh { double_sided } => Some(pipelines.mesh(double_sided)),
            };
            let Some(pipeline) = pipeline else {
                log::trace!("no pipeline for {:?}", primitive.kind);
                continue;
            };

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &primitive.view_bind_group, &[]);
            pass.set_bind_group(1, &primitive.uniform_bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));

            match primitive.kind {
                PrimitiveKind::ShaderPoints(_) | PrimitiveKind::Cloud(_) => {
                    pass.draw(0..6, 0..primitive.count);
                }
                PrimitiveKind::Lines(_) => {
                    pass.draw(0..primitive.count, 0..1);
                }
                PrimitiveKind::Mesh { .. } => {
                    let Some(index_buffer) = &primitive.index_buffer else {
                        continue;
                    };
                    pass.set_bind_group(2, lighting, &[]);
                    pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                    pass.draw_indexed(0..primitive.count, 0, 0..1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityProfile;

    #[test]
    fn test_uniform_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<ViewUniforms>(), 144);
        assert_eq!(std::mem::size_of::<MeshUniforms>(), 48);
        assert_eq!(std::mem::size_of::<FlatUniforms>(), 16);
    }

    #[test]
    fn test_mesh_uniforms_from_material() {
        let material = MeshMaterial::glowing(0xFF0000, 0.6, 0.3);
        let uniforms = MeshUniforms::from(&material);
        assert_eq!(uniforms.color, [1.0, 0.0, 0.0, 0.6]);
        assert_eq!(uniforms.emissive[3], 0.3);
        assert_eq!(uniforms.flags[0], 1.0);
    }

    #[test]
    fn test_camera_looks_at_origin() {
        let camera = CameraMatrices::from_config(&QualityProfile::full().camera, 16.0 / 9.0);
        let origin = camera.projection.project_point3(camera.view.transform_point3(Vec3::ZERO));
        assert!(origin.x.abs() < 1e-5 && origin.y.abs() < 1e-5);

        let view = ViewUniforms::new(&camera, Mat4::IDENTITY);
        assert!(view.billboard[1] > view.billboard[0]);
    }
}
