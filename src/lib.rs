pub mod camera;
pub mod config;
pub mod controller;
pub mod ground;
pub mod light;
pub mod model;
pub mod render_pipeline;
pub mod resources;
pub mod shadow;
pub mod state;
pub mod texture;
