use std::f32::consts::FRAC_PI_2;

use cgmath::{Deg, Matrix4, Point3, Rad, SquareMatrix, Vector3};

use crate::config::CameraConfig;

// cgmath builds projections for OpenGL's [-1, 1] depth range, wgpu wants [0, 1].
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: aspect_ratio(width, height),
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn from_config(width: u32, height: u32, config: &CameraConfig) -> Self {
        Self::new(
            width,
            height,
            Deg(config.fovy_degrees),
            config.znear,
            config.zfar,
        )
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width as f32 / height.max(1) as f32
}

pub struct Camera {
    pub position: Point3<f32>,
    yaw: Rad<f32>,
    pitch: Rad<f32>,
}

impl Camera {
    pub fn new<V: Into<Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        position: V,
        yaw: Y,
        pitch: P,
    ) -> Self {
        Self {
            position: position.into(),
            yaw: yaw.into(),
            pitch: pitch.into(),
        }
    }

    /// Camera on the +Z axis looking back at the origin.
    pub fn facing_origin(distance: f32) -> Self {
        Self::new((0.0, 0.0, distance), Rad(-FRAC_PI_2), Rad(0.0))
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        let (sin_p, cos_p) = self.pitch.0.sin_cos();
        let (sin_y, cos_y) = self.yaw.0.sin_cos();
        Matrix4::look_to_rh(
            self.position,
            Vector3::new(cos_p * cos_y, sin_p, cos_p * sin_y),
            Vector3::unit_y(),
        )
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{EuclideanSpace, Vector4};

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn resize_updates_aspect() {
        let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
        assert_close(projection.aspect(), 800.0 / 600.0);

        projection.resize(1920, 1080);
        assert_close(projection.aspect(), 1920.0 / 1080.0);
    }

    #[test]
    fn zero_height_does_not_divide_by_zero() {
        let projection = Projection::new(800, 0, Deg(75.0), 0.1, 1000.0);
        assert!(projection.aspect().is_finite());
    }

    #[test]
    fn camera_looks_at_origin() {
        let camera = Camera::facing_origin(1.5);
        let origin = camera.calc_matrix() * Point3::origin().to_homogeneous();

        assert_close(origin.x, 0.0);
        assert_close(origin.y, 0.0);
        assert_close(origin.z, -1.5);
    }

    #[test]
    fn origin_lands_inside_wgpu_depth_range() {
        let projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
        let camera = Camera::facing_origin(1.5);
        let clip = projection.calc_matrix() * camera.calc_matrix() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let ndc_z = clip.z / clip.w;

        assert!(clip.w > 0.0);
        assert!((0.0..=1.0).contains(&ndc_z), "depth {ndc_z}");
        assert_close(clip.x / clip.w, 0.0);
        assert_close(clip.y / clip.w, 0.0);
    }

    #[test]
    fn uniform_tracks_camera_position() {
        let projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
        let camera = Camera::facing_origin(2.0);
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, &projection);

        assert_eq!(uniform.view_position, [0.0, 0.0, 2.0, 1.0]);
    }
}
