use cgmath::{Deg, Matrix4, Rad};

use crate::config::FollowConfig;

/// Euler angles of the displayed model, applied X first then Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRotation {
    pub pitch: Rad<f32>,
    pub yaw: Rad<f32>,
}

impl ModelRotation {
    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::from_angle_x(self.pitch) * Matrix4::from_angle_y(self.yaw)
    }
}

/// Turns the model so it follows the cursor.
///
/// Both angles are derived from the cursor's offset from the viewport centre
/// every frame, so the model snaps to wherever the cursor currently is rather
/// than accumulating motion. Coordinates are logical pixels.
pub struct FollowController {
    cursor_x: f64,
    cursor_y: f64,
    width: f64,
    height: f64,
    rotation_speed: f32,
    vertical_factor: f32,
    base_tilt: Rad<f32>,
}

impl FollowController {
    pub fn new(config: &FollowConfig, width: f64, height: f64) -> Self {
        Self {
            cursor_x: width / 2.0,
            cursor_y: height / 2.0,
            width,
            height,
            rotation_speed: config.rotation_speed,
            vertical_factor: config.vertical_factor,
            base_tilt: Deg(config.base_tilt_degrees).into(),
        }
    }

    pub fn handle_cursor(&mut self, x: f64, y: f64) {
        self.cursor_x = x;
        self.cursor_y = y;
    }

    /// The last cursor position is kept, only the centre moves.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn initial_rotation(&self) -> ModelRotation {
        ModelRotation {
            pitch: self.base_tilt,
            yaw: Rad(0.0),
        }
    }

    /// Updates `rotation` only when there is a model to turn. Returns whether
    /// it was updated.
    pub fn track(&self, rotation: &mut ModelRotation, model_loaded: bool) -> bool {
        if model_loaded {
            self.update_rotation(rotation);
        }
        model_loaded
    }

    pub fn update_rotation(&self, rotation: &mut ModelRotation) {
        let dx = (self.cursor_x - self.width / 2.0) as f32;
        let dy = (self.cursor_y - self.height / 2.0) as f32;
        rotation.yaw = Rad(dx * self.rotation_speed);
        rotation.pitch = self.base_tilt + Rad(dy * self.rotation_speed * self.vertical_factor);
    }
}
