//! Render pipelines for the four primitive kinds.
//!
//! Bind groups: 0 = view, 1 = per-primitive uniforms, 2 = lighting (meshes only).

use std::collections::HashMap;

use crate::gpu::mesh::{ColorVertex, MeshVertex, PointInstance};
use crate::material::{BlendMode, ProgramId, ShaderLibrary, ShaderProgram};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Bind group layout holding one uniform buffer.
pub fn create_uniform_layout(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Shared layouts used by every pipeline.
pub struct PipelineLayouts {
    pub view: wgpu::BindGroupLayout,
    pub primitive: wgpu::BindGroupLayout,
    pub lighting: wgpu::BindGroupLayout,
    unlit: wgpu::PipelineLayout,
    lit: wgpu::PipelineLayout,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let all = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let view = create_uniform_layout(device, "View Bind Group Layout", all);
        let primitive = create_uniform_layout(device, "Primitive Bind Group Layout", all);
        let lighting = create_uniform_layout(device, "Lighting Bind Group Layout", wgpu::ShaderStages::FRAGMENT);

        let unlit = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Unlit Pipeline Layout"),
            bind_group_layouts: &[&view, &primitive],
            push_constant_ranges: &[],
        });
        let lit = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lit Pipeline Layout"),
            bind_group_layouts: &[&view, &primitive, &lighting],
            push_constant_ranges: &[],
        });

        Self {
            view,
            primitive,
            lighting,
            unlit,
            lit,
        }
    }
}

fn depth_state(depth_write: bool) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: depth_write,
        depth_compare: wgpu::CompareFunction::LessEqual,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

#[allow(clippy::too_many_arguments)]
fn build(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    entries: (&str, &str),
    buffers: &[wgpu::VertexBufferLayout<'_>],
    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
    blend_mode: BlendMode,
    depth_write: bool,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(entries.0),
            buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(entries.1),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(blend_mode.to_blend_state()),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(depth_state(depth_write)),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

/// Pipeline for a shader-driven point program. Draws 6 vertices per instance.
pub fn create_shader_points_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    program: &ShaderProgram,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(program.id),
        source: wgpu::ShaderSource::Wgsl(program.source.into()),
    });
    let label = format!("{} v{} Pipeline", program.id, program.version);
    build(
        device,
        &label,
        &layouts.unlit,
        &shader,
        (program.vertex_entry, program.fragment_entry),
        &[PointInstance::desc()],
        wgpu::PrimitiveTopology::TriangleList,
        None,
        program.blend_mode,
        program.depth_write,
        color_format,
    )
}

/// Pipeline for CPU-driven point clouds.
pub fn create_cloud_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    blend_mode: BlendMode,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::include_wgsl!("cloud.wgsl"));
    build(
        device,
        "Cloud Pipeline",
        &layouts.unlit,
        &shader,
        ("vs_main", "fs_main"),
        &[PointInstance::desc()],
        wgpu::PrimitiveTopology::TriangleList,
        None,
        blend_mode,
        !blend_mode.is_transparent(),
        color_format,
    )
}

pub fn create_line_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    blend_mode: BlendMode,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::include_wgsl!("line.wgsl"));
    build(
        device,
        "Line Pipeline",
        &layouts.unlit,
        &shader,
        ("vs_main", "fs_main"),
        &[ColorVertex::desc()],
        wgpu::PrimitiveTopology::LineList,
        None,
        blend_mode,
        !blend_mode.is_transparent(),
        color_format,
    )
}

/// Translucent mesh pipeline. Double-sided meshes disable culling.
pub fn create_mesh_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    double_sided: bool,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::include_wgsl!("mesh.wgsl"));
    let (label, cull_mode) = if double_sided {
        ("Mesh Pipeline (double sided)", None)
    } else {
        ("Mesh Pipeline", Some(wgpu::Face::Back))
    };
    build(
        device,
        label,
        &layouts.lit,
        &shader,
        ("vs_main", "fs_main"),
        &[MeshVertex::desc()],
        wgpu::PrimitiveTopology::TriangleList,
        cull_mode,
        BlendMode::AlphaBlend,
        false,
        color_format,
    )
}

/// Every pipeline the renderer needs, built once per device.
pub struct Pipelines {
    shader_points: HashMap<ProgramId, wgpu::RenderPipeline>,
    clouds: HashMap<BlendMode, wgpu::RenderPipeline>,
    lines: HashMap<BlendMode, wgpu::RenderPipeline>,
    mesh: wgpu::RenderPipeline,
    mesh_double_sided: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        shaders: &ShaderLibrary,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let blends = [BlendMode::Opaque, BlendMode::AlphaBlend, BlendMode::Additive];
        Self {
            shader_points: shaders
                .iter()
                .map(|program| (program.id, create_shader_points_pipeline(device, layouts, program, color_format)))
                .collect(),
            clouds: blends
                .iter()
                .map(|&blend| (blend, create_cloud_pipeline(device, layouts, blend, color_format)))
                .collect(),
            lines: blends
                .iter()
                .map(|&blend| (blend, create_line_pipeline(device, layouts, blend, color_format)))
                .collect(),
            mesh: create_mesh_pipeline(device, layouts, false, color_format),
            mesh_double_sided: create_mesh_pipeline(device, layouts, true, color_format),
        }
    }

    pub fn shader_points(&self, program: ProgramId) -> Option<&wgpu::RenderPipeline> {
        self.shader_points.get(program)
    }

    pub fn cloud(&self, blend: BlendMode) -> Option<&wgpu::RenderPipeline> {
        self.clouds.get(&blend)
    }

    pub fn lines(&self, blend: BlendMode) -> Option<&wgpu::RenderPipeline> {
        self.lines.get(&blend)
    }

    pub fn mesh(&self, double_sided: bool) -> &wgpu::RenderPipeline {
        if double_sided {
            &self.mesh_double_sided
        } else {
            &self.mesh
        }
    }
}
