use std::sync::Arc;

use clap::Parser as _;
use winit::{
    application::ApplicationHandler,
    event::{self, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::Window,
};

use model_viewer::{
    config::{Args, ViewerConfig},
    state::WindowState,
};

struct App {
    viewer: ViewerConfig,
    window_state: Option<WindowState>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window_state.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(self.viewer.title.clone())
            .with_transparent(self.viewer.render.transparent);
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Unable to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(WindowState::new(window.clone(), &self.viewer)) {
            Ok(mut window_state) => {
                window_state.resize(window.inner_size());
                self.window_state = Some(window_state);
            }
            Err(e) => {
                log::error!("Unable to initialise renderer: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _: winit::window::WindowId,
        event: event::WindowEvent,
    ) {
        if let Some(window_state) = self.window_state.as_mut() {
            match event {
                WindowEvent::Resized(size) => {
                    window_state.resize(size);
                }
                WindowEvent::RedrawRequested => {
                    window_state.update();
                    match window_state.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            window_state.resize(window_state.size());
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("Out of memory");
                            event_loop.exit();
                        }
                        Err(e) => {
                            log::error!("Unable to render {}", e);
                        }
                    }
                }
                WindowEvent::CloseRequested => {
                    event_loop.exit();
                }
                _ => {
                    window_state.window_event(&event);
                }
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,wgpu_core=warn,wgpu_hal=warn,naga=warn"),
    )
    .init();

    let args = Args::parse();
    let viewer = ViewerConfig::from_args(&args)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        viewer,
        window_state: None,
    };
    event_loop.run_app(&mut app)?;
    Ok(())
}
