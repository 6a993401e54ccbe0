use wgpu::util::DeviceExt;

use crate::gpu::buffers::{CameraMatrices, GpuScene, SyncReport};
use crate::gpu::pipeline::{PipelineLayouts, Pipelines, DEPTH_FORMAT};
use crate::lighting::LightingUniforms;
use crate::material::ShaderLibrary;
use crate::stream::CognitionStream;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.01,
    g: 0.01,
    b: 0.03,
    a: 1.0,
};

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Draws a [`CognitionStream`] into a color target.
pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    width: u32,
    height: u32,
    depth_view: wgpu::TextureView,
    layouts: PipelineLayouts,
    pipelines: Pipelines,
    lighting_buffer: wgpu::Buffer,
    lighting_bind_group: wgpu::BindGroup,
    gpu_scene: GpuScene,
}

impl Renderer {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        shaders: &ShaderLibrary,
    ) -> Self {
        let layouts = PipelineLayouts::new(&device);
        let pipelines = Pipelines::new(&device, &layouts, shaders, format);

        let lighting_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lighting Buffer"),
            contents: bytemuck::bytes_of(&<LightingUniforms as bytemuck::Zeroable>::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let lighting_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lighting Bind Group"),
            layout: &layouts.lighting,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: lighting_buffer.as_entire_binding(),
            }],
        });

        Self {
            depth_view: create_depth_view(&device, width, height),
            device,
            queue,
            width,
            height,
            layouts,
            pipelines,
            lighting_buffer,
            lighting_bind_group,
            gpu_scene: GpuScene::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.depth_view = create_depth_view(&self.device, width, height);
    }

    /// Sync GPU buffers with the stream's scene and draw one frame.
    pub fn render(&mut self, target: &wgpu::TextureView, stream: &mut CognitionStream) -> SyncReport {
        let aspect = self.width.max(1) as f32 / self.height.max(1) as f32;
        let camera = CameraMatrices::from_config(&stream.profile().camera, aspect);

        let lighting = stream.lights().to_uniforms();
        self.queue.write_buffer(&self.lighting_buffer, 0, bytemuck::bytes_of(&lighting));

        let report = self
            .gpu_scene
            .sync(&self.device, &self.queue, &self.layouts, stream.scene_mut(), &camera);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.gpu_scene.draw(&mut pass, &self.pipelines, &self.lighting_bind_group);
        }
        self.queue.submit(Some(encoder.finish()));
        report
    }
}
