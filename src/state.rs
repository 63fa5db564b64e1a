use std::sync::Arc;

use anyhow::Context as _;
use wgpu::util::DeviceExt as _;
use winit::{dpi::PhysicalSize, event::WindowEvent, window::Window};

use crate::{
    camera::{Camera, CameraUniform, Projection},
    config::ViewerConfig,
    controller::{FollowController, ModelRotation},
    ground::Ground,
    light::{Light, LightUniform},
    model::{self, DrawGeometry as _, DrawModel as _, Vertex as _},
    render_pipeline::{PipelineOptions, create_render_pipeline},
    resources::ModelLoader,
    shadow::ShadowMap,
    texture,
};

/// Minimised windows report a zero size, which the surface cannot be configured with.
fn is_renderable(size: PhysicalSize<u32>) -> bool {
    size.width > 0 && size.height > 0
}

pub struct WindowState {
    pub window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    is_surface_configured: bool,
    sample_count: u32,
    msaa_view: Option<wgpu::TextureView>,
    depth_texture: texture::Texture,
    clear_color: wgpu::Color,

    camera: Camera,
    projection: Projection,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,

    light: Light,
    shadow: ShadowMap,
    ground: Ground,

    material_layout: wgpu::BindGroupLayout,
    render_pipeline: wgpu::RenderPipeline,
    model: Option<model::Model>,
    loader: Option<ModelLoader>,
    rotation: ModelRotation,
    instance_buffer: wgpu::Buffer,
    pub follow_controller: FollowController,
}

impl WindowState {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable graphics adapter")?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let transparent = viewer.render.transparent
            && surface_caps
                .alpha_modes
                .contains(&wgpu::CompositeAlphaMode::PreMultiplied);
        if viewer.render.transparent && !transparent {
            log::info!("Surface does not support transparency, using the clear colour");
        }
        let alpha_mode = if transparent {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_caps.alpha_modes[0]
        };
        let [r, g, b, a] = viewer.render.clear_color;
        let clear_color = if transparent {
            wgpu::Color::TRANSPARENT
        } else {
            wgpu::Color { r, g, b, a }
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps.present_modes[0],
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let sample_count = if adapter
            .get_texture_format_features(surface_format)
            .flags
            .sample_count_supported(viewer.render.msaa_samples)
        {
            viewer.render.msaa_samples
        } else {
            log::warn!(
                "{}x MSAA unsupported for {:?}, antialiasing disabled",
                viewer.render.msaa_samples,
                surface_format
            );
            1
        };

        let camera = Camera::facing_origin(viewer.camera.distance);
        let projection = Projection::from_config(size.width, size.height, &viewer.camera);
        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera, &projection);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
                label: Some("camera_bind_group_layout"),
            });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let light = Light::new(&device, LightUniform::new(&viewer.light));
        let shadow = ShadowMap::new(
            &device,
            viewer.light.shadow_map_size,
            &light.bind_group_layout,
        );
        let ground = Ground::new(
            &device,
            &viewer.ground,
            config.format,
            sample_count,
            &[
                &camera_bind_group_layout,
                &light.bind_group_layout,
                &shadow.bind_group_layout,
            ],
        );

        let material_layout = model::Material::bind_group_layout(&device);
        let render_pipeline = {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Model Pipeline Layout"),
                bind_group_layouts: &[
                    &camera_bind_group_layout,
                    &light.bind_group_layout,
                    &shadow.bind_group_layout,
                    &material_layout,
                ],
                push_constant_ranges: &[],
            });
            let shader = wgpu::ShaderModuleDescriptor {
                label: Some("Model Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("./shader.wgsl").into()),
            };
            create_render_pipeline(
                &device,
                &layout,
                Some(config.format),
                Some(texture::Texture::DEPTH_FORMAT),
                &[model::ModelVertex::desc(), model::InstanceRaw::desc()],
                shader,
                PipelineOptions {
                    sample_count,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    ..Default::default()
                },
            )
        };

        let follow_controller = {
            let logical = size.to_logical::<f64>(window.scale_factor());
            FollowController::new(&viewer.follow, logical.width, logical.height)
        };
        let rotation = follow_controller.initial_rotation();
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: bytemuck::cast_slice(&[model::InstanceRaw::from_matrix(rotation.matrix())]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            config.width,
            config.height,
            sample_count,
            "depth_texture",
        );
        let msaa_view = (sample_count > 1)
            .then(|| texture::Texture::create_msaa_view(&device, &config, sample_count));

        log::info!("Loading {}", viewer.model_path.display());
        let loader = ModelLoader::spawn(viewer.model_path.clone());

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            is_surface_configured: false,
            sample_count,
            msaa_view,
            depth_texture,
            clear_color,
            camera,
            projection,
            camera_uniform,
            camera_buffer,
            camera_bind_group,
            light,
            shadow,
            ground,
            material_layout,
            render_pipeline,
            model: None,
            loader: Some(loader),
            rotation,
            instance_buffer,
            follow_controller,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if !is_renderable(new_size) {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.is_surface_configured = true;

        self.depth_texture = texture::Texture::create_depth_texture(
            &self.device,
            new_size.width,
            new_size.height,
            self.sample_count,
            "depth_texture",
        );
        if self.sample_count > 1 {
            self.msaa_view = Some(texture::Texture::create_msaa_view(
                &self.device,
                &self.config,
                self.sample_count,
            ));
        }

        self.projection.resize(new_size.width, new_size.height);
        self.camera_uniform
            .update_view_proj(&self.camera, &self.projection);
        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[self.camera_uniform]),
        );

        let logical = new_size.to_logical::<f64>(self.window.scale_factor());
        self.follow_controller.resize(logical.width, logical.height);
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    /// Returns true when the event was consumed.
    pub fn window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f64>(self.window.scale_factor());
                self.follow_controller.handle_cursor(logical.x, logical.y);
                true
            }
            _ => false,
        }
    }

    pub fn update(&mut self) {
        if let Some(result) = self.loader.as_ref().and_then(ModelLoader::poll) {
            let path = self.loader.take().map(|l| l.path().display().to_string());
            match result {
                Ok(data) => {
                    log::info!(
                        "Loaded {}: {} meshes, {} triangles",
                        path.unwrap_or_default(),
                        data.meshes.len(),
                        data.triangle_count()
                    );
                    self.model = Some(model::Model::upload(
                        &self.device,
                        &self.queue,
                        &data,
                        &self.material_layout,
                    ));
                }
                Err(e) => {
                    log::error!(
                        "Unable to load {}: {:#}",
                        path.unwrap_or_default(),
                        anyhow::Error::new(e)
                    );
                }
            }
        }

        if self
            .follow_controller
            .track(&mut self.rotation, self.model.is_some())
        {
            self.queue.write_buffer(
                &self.instance_buffer,
                0,
                bytemuck::cast_slice(&[model::InstanceRaw::from_matrix(self.rotation.matrix())]),
            );
        }
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.window.request_redraw();

        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            // Always cleared so the ground has a valid map before the model arrives.
            let mut shadow_pass = self.shadow.begin_pass(&mut encoder);
            if let Some(model) = &self.model {
                shadow_pass.set_pipeline(&self.shadow.render_pipeline);
                shadow_pass.set_bind_group(0, &self.light.bind_group, &[]);
                shadow_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                shadow_pass.draw_model_geometry(model, 0..1);
            }
        }

        {
            let (target, resolve_target) = match &self.msaa_view {
                Some(msaa_view) => (msaa_view, Some(&view)),
                None => (&view, None),
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            render_pass.set_bind_group(1, &self.light.bind_group, &[]);
            render_pass.set_bind_group(2, &self.shadow.bind_group, &[]);

            if let Some(model) = &self.model {
                render_pass.set_pipeline(&self.render_pipeline);
                render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                render_pass.draw_model_instanced(model, 0..1);
            }
            self.ground.draw(&mut render_pass);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sizes_are_not_renderable() {
        assert!(!is_renderable(PhysicalSize::new(0, 0)));
        assert!(!is_renderable(PhysicalSize::new(800, 0)));
        assert!(!is_renderable(PhysicalSize::new(0, 600)));
        assert!(is_renderable(PhysicalSize::new(1, 1)));
        assert!(is_renderable(PhysicalSize::new(1920, 1080)));
    }
}
