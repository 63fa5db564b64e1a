use cgmath::{EuclideanSpace as _, Matrix4, Point3, Vector3};
use wgpu::util::DeviceExt as _;

use crate::{camera::OPENGL_TO_WGPU_MATRIX, config::LightConfig};

/// Directional light plus the ambient term. Layout matches `Light` in the shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub position: [f32; 3],
    pub intensity: f32,
    pub color: [f32; 3],
    pub ambient_intensity: f32,
    pub ambient_color: [f32; 3],
    _padding: u32,
    pub view_proj: [[f32; 4]; 4],
}

impl LightUniform {
    pub fn new(config: &LightConfig) -> Self {
        let view_proj = light_view_proj(
            config.position.into(),
            config.shadow_extent,
            config.shadow_near,
            config.shadow_far,
        );
        Self {
            position: config.position,
            intensity: config.intensity,
            color: config.color,
            ambient_intensity: config.ambient_intensity,
            ambient_color: config.ambient_color,
            _padding: 0,
            view_proj: view_proj.into(),
        }
    }
}

/// Orthographic view-projection of a directional light at `position`
/// shining towards the origin.
pub fn light_view_proj(position: Point3<f32>, extent: f32, near: f32, far: f32) -> Matrix4<f32> {
    let direction = Point3::origin() - position;
    // look_at breaks down when the light sits straight above the target.
    let up = if direction.x.abs() < f32::EPSILON && direction.z.abs() < f32::EPSILON {
        Vector3::unit_z()
    } else {
        Vector3::unit_y()
    };
    let view = Matrix4::look_at_rh(position, Point3::origin(), up);
    let proj = cgmath::ortho(-extent, extent, -extent, extent, near, far);
    OPENGL_TO_WGPU_MATRIX * proj * view
}

pub struct Light {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl Light {
    pub fn new(device: &wgpu::Device, uniform: LightUniform) -> Self {
        let buffer: wgpu::Buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("light_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("light_bind_group"),
        });

        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }
}
