use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use clap::Parser;
use serde::Deserialize;

/// Command line parameters
#[derive(Parser, Debug, Default)]
#[command(name = "model_viewer", about = "Shows a model that follows the mouse")]
pub struct Args {
    /// Path to a .gltf, .glb or .obj file
    #[arg(value_name = "MODEL")]
    pub model: Option<PathBuf>,

    /// TOML file with viewer settings. Command line flags win over it.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub title: Option<String>,

    /// Multisample count, either 1 or 4
    #[arg(long)]
    pub msaa: Option<u32>,

    /// Draw the clear colour instead of a transparent background
    #[arg(long)]
    pub opaque: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub model_path: PathBuf,
    pub title: String,
    pub camera: CameraConfig,
    pub follow: FollowConfig,
    pub light: LightConfig,
    pub ground: GroundConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Distance from the origin along +Z
    pub distance: f32,
    pub fovy_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    /// Radians per pixel of cursor offset from the viewport centre
    pub rotation_speed: f32,
    /// Scale applied to `rotation_speed` on the vertical axis
    pub vertical_factor: f32,
    pub base_tilt_degrees: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub intensity: f32,
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub shadow_map_size: u32,
    /// Half width of the orthographic shadow frustum
    pub shadow_extent: f32,
    pub shadow_near: f32,
    pub shadow_far: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GroundConfig {
    pub size: f32,
    pub height: f32,
    pub shadow_opacity: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub msaa_samples: u32,
    pub transparent: bool,
    pub clear_color: [f64; 4],
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("public/coffe_cup/scene.gltf"),
            title: "Model Viewer".to_string(),
            camera: CameraConfig::default(),
            follow: FollowConfig::default(),
            light: LightConfig::default(),
            ground: GroundConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            distance: 1.5,
            fovy_degrees: 75.0,
            znear: 0.1,
            zfar: 1000.0,
        }
    }
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            rotation_speed: 0.005,
            vertical_factor: 0.5,
            base_tilt_degrees: 30.0,
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        // 0x404040
        let ambient = 64.0 / 255.0;
        Self {
            position: [10.0, 10.0, 10.0],
            color: [1.0, 1.0, 1.0],
            intensity: 1.5,
            ambient_color: [ambient, ambient, ambient],
            ambient_intensity: 1.0,
            shadow_map_size: 2048,
            shadow_extent: 5.0,
            shadow_near: 0.5,
            shadow_far: 500.0,
        }
    }
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            size: 500.0,
            height: -0.3,
            shadow_opacity: 0.8,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            msaa_samples: 4,
            transparent: true,
            clear_color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("Invalid viewer config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read config {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Reads the config file named by `args` (if any) and applies the flags on top.
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(model) = &args.model {
            config.model_path = model.clone();
        }
        if let Some(title) = &args.title {
            config.title = title.clone();
        }
        if let Some(msaa) = args.msaa {
            config.render.msaa_samples = msaa;
        }
        if args.opaque {
            config.render.transparent = false;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.render.msaa_samples, 1 | 4) {
            bail!(
                "msaa_samples must be 1 or 4, got {}",
                self.render.msaa_samples
            );
        }
        if self.light.shadow_map_size == 0 {
            bail!("shadow_map_size must be positive");
        }
        if !(self.camera.fovy_degrees > 0.0 && self.camera.fovy_degrees < 180.0) {
            bail!("fovy_degrees must be within (0, 180)");
        }
        if self.camera.znear <= 0.0 || self.camera.zfar <= self.camera.znear {
            bail!("camera clip planes must satisfy 0 < znear < zfar");
        }
        if self.light.shadow_near <= 0.0 || self.light.shadow_far <= self.light.shadow_near {
            bail!("shadow clip planes must satisfy 0 < shadow_near < shadow_far");
        }
        if !(0.0..=1.0).contains(&self.ground.shadow_opacity) {
            bail!("shadow_opacity must be within [0, 1]");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ViewerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.camera.distance, 1.5);
        assert_eq!(config.follow.rotation_speed, 0.005);
        assert_eq!(config.render.msaa_samples, 4);
        assert!(config.render.transparent);
    }

    #[test]
    fn opaque_can_come_from_file() {
        let config = ViewerConfig::from_toml_str("[render]\ntransparent = false\n").unwrap();
        assert!(!config.render.transparent);
        assert_eq!(config.render.clear_color, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ViewerConfig::from_toml_str(
            r#"
            model_path = "assets/teapot.obj"

            [light]
            intensity = 2.0

            [ground]
            shadow_opacity = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.model_path, PathBuf::from("assets/teapot.obj"));
        assert_eq!(config.light.intensity, 2.0);
        assert_eq!(config.light.position, [10.0, 10.0, 10.0]);
        assert_eq!(config.ground.shadow_opacity, 0.5);
        assert_eq!(config.ground.height, -0.3);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn rejects_bad_msaa() {
        let err = ViewerConfig::from_toml_str("[render]\nmsaa_samples = 2\n").unwrap_err();
        assert!(err.to_string().contains("msaa_samples"));
    }

    #[test]
    fn rejects_bad_clip_planes() {
        assert!(ViewerConfig::from_toml_str("[camera]\nznear = 0.0\n").is_err());
        assert!(ViewerConfig::from_toml_str("[camera]\nzfar = 0.05\n").is_err());
    }

    #[test]
    fn rejects_unparsable_toml() {
        assert!(ViewerConfig::from_toml_str("model_path = [").is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "model_viewer",
            "models/cup.glb",
            "--title",
            "Cup",
            "--msaa",
            "1",
            "--opaque",
        ]);
        let config = ViewerConfig::from_args(&args).unwrap();

        assert_eq!(config.model_path, PathBuf::from("models/cup.glb"));
        assert_eq!(config.title, "Cup");
        assert_eq!(config.render.msaa_samples, 1);
        assert!(!config.render.transparent);
    }

    #[test]
    fn flags_override_config_file() {
        let path = std::env::temp_dir().join("model_viewer_flags_override.toml");
        std::fs::write(&path, "title = \"From file\"\n[render]\nmsaa_samples = 1\n").unwrap();

        let args = Args::parse_from([
            "model_viewer",
            "--config",
            path.to_str().unwrap(),
            "--msaa",
            "4",
        ]);
        let config = ViewerConfig::from_args(&args).unwrap();

        assert_eq!(config.title, "From file");
        assert_eq!(config.render.msaa_samples, 4);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn invalid_flag_value_is_rejected() {
        let args = Args::parse_from(["model_viewer", "--msaa", "8"]);
        assert!(ViewerConfig::from_args(&args).is_err());
    }
}
