pub struct PipelineOptions {
    pub sample_count: u32,
    pub blend: Option<wgpu::BlendState>,
    pub depth_write: bool,
    pub depth_bias: wgpu::DepthBiasState,
    pub cull_mode: Option<wgpu::Face>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            sample_count: 1,
            blend: Some(wgpu::BlendState::REPLACE),
            depth_write: true,
            depth_bias: wgpu::DepthBiasState::default(),
            cull_mode: Some(wgpu::Face::Back),
        }
    }
}

/// Builds a pipeline with `vs_main`/`fs_main` entry points. Without a colour
/// format the pipeline is depth only and has no fragment stage.
pub fn create_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: Option<wgpu::TextureFormat>,
    depth_format: Option<wgpu::TextureFormat>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: wgpu::ShaderModuleDescriptor,
    options: PipelineOptions,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(shader);
    let targets = color_format.map(|format| {
        [Some(wgpu::ColorTargetState {
            format,
            blend: options.blend,
            write_mask: wgpu::ColorWrites::ALL,
        })]
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Render Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: targets.as_ref().map(|targets| wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: options.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: options.depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: options.depth_bias,
        }),
        multisample: wgpu::MultisampleState {
            count: options.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}
