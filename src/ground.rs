use wgpu::util::DeviceExt as _;

use crate::{
    config::GroundConfig,
    model::{ModelVertex, Vertex},
    render_pipeline::{PipelineOptions, create_render_pipeline},
    texture,
};

const INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GroundUniform {
    opacity: f32,
    _padding: [f32; 3],
}

/// Horizontal square of side `size` at height `y`, facing up.
pub fn plane_vertices(size: f32, y: f32) -> [ModelVertex; 4] {
    let h = size / 2.0;
    let normal = [0.0, 1.0, 0.0];
    [
        ModelVertex {
            position: [-h, y, -h],
            tex_coords: [0.0, 0.0],
            normal,
        },
        ModelVertex {
            position: [-h, y, h],
            tex_coords: [0.0, 1.0],
            normal,
        },
        ModelVertex {
            position: [h, y, h],
            tex_coords: [1.0, 1.0],
            normal,
        },
        ModelVertex {
            position: [h, y, -h],
            tex_coords: [1.0, 0.0],
            normal,
        },
    ]
}

/// Shadow catcher: transparent everywhere except where the model's shadow lands.
pub struct Ground {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    render_pipeline: wgpu::RenderPipeline,
}

impl Ground {
    pub fn new(
        device: &wgpu::Device,
        config: &GroundConfig,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
        bind_group_layouts: &[&wgpu::BindGroupLayout; 3],
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ground Vertex Buffer"),
            contents: bytemuck::cast_slice(&plane_vertices(config.size, config.height)),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ground Index Buffer"),
            contents: bytemuck::cast_slice(&INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let uniform = GroundUniform {
            opacity: config.shadow_opacity,
            _padding: [0.0; 3],
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ground Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("ground_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("ground_bind_group"),
        });

        let [camera, light, shadow] = *bind_group_layouts;
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Ground Pipeline Layout"),
            bind_group_layouts: &[camera, light, shadow, &bind_group_layout],
            push_constant_ranges: &[],
        });
        let shader = wgpu::ShaderModuleDescriptor {
            label: Some("Ground Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("./ground.wgsl").into()),
        };
        let render_pipeline = create_render_pipeline(
            device,
            &layout,
            Some(color_format),
            Some(texture::Texture::DEPTH_FORMAT),
            &[ModelVertex::desc()],
            shader,
            PipelineOptions {
                sample_count,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                depth_write: false,
                cull_mode: None,
                ..Default::default()
            },
        );

        Self {
            vertex_buffer,
            index_buffer,
            bind_group,
            render_pipeline,
        }
    }

    /// Expects camera, light and shadow bind groups at 0, 1 and 2.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.render_pipeline);
        pass.set_bind_group(3, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..INDICES.len() as u32, 0, 0..1);
    }
}
