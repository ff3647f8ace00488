//! Orbital camera shared by all scenes

use glam::{Mat4, Vec2, Vec3};

/// 3D perspective camera with orbital controls
#[derive(Debug, Clone)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    // Orbital parameters
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
}

impl Camera3D {
    pub fn new(aspect_ratio: f32) -> Self {
        Self::framing(aspect_ratio, 10.0, 0.0, 0.3)
    }

    /// Camera looking at the origin from the given orbital placement
    pub fn framing(aspect_ratio: f32, distance: f32, yaw: f32, pitch: f32) -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 45.0f32.to_radians(),
            aspect_ratio,
            near: 0.1,
            far: 1000.0,
            distance,
            yaw,
            pitch,
        };
        camera.update_orbital();
        camera
    }

    /// Update camera position based on orbital parameters
    pub fn update_orbital(&mut self) {
        self.position = self.target
            + Vec3::new(
                self.distance * self.pitch.cos() * self.yaw.sin(),
                self.distance * self.pitch.sin(),
                self.distance * self.pitch.cos() * self.yaw.cos(),
            );
    }

    /// Orbit the camera around the target
    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-1.5, 1.5);
        self.update_orbital();
    }

    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance - delta).max(1.0);
        self.update_orbital();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Screen-aligned right and up axes, used to face billboards at the camera
    pub fn billboard_axes(&self) -> (Vec3, Vec3) {
        let forward = (self.target - self.position).normalize_or_zero();
        let right = forward.cross(self.up).normalize_or_zero();
        let up = right.cross(forward);
        (right, up)
    }

    /// Project a world point to screen coordinates (origin top-left).
    /// Returns `None` for points behind the camera.
    pub fn project_to_screen(&self, point: Vec3, width: f32, height: f32) -> Option<Vec2> {
        let clip = self.view_projection() * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * width,
            (1.0 - ndc.y) * 0.5 * height,
        ))
    }

    pub fn update_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }
}

/// Camera uniform data for shaders
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub position: [f32; 4],
    pub right: [f32; 4],
    pub up: [f32; 4],
}

impl CameraUniform {
    pub fn from_camera_3d(camera: &Camera3D) -> Self {
        let (right, up) = camera.billboard_axes();
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            position: camera.position.extend(1.0).to_array(),
            right: right.extend(0.0).to_array(),
            up: up.extend(0.0).to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_is_clamped_while_orbiting() {
        let mut camera = Camera3D::new(1.0);
        camera.orbit(0.0, 10.0);
        assert!((camera.pitch - 1.5).abs() < 1e-6);
    }

    #[test]
    fn target_projects_to_screen_center() {
        let camera = Camera3D::framing(16.0 / 9.0, 8.0, 0.4, 0.2);
        let p = camera.project_to_screen(Vec3::ZERO, 1600.0, 900.0).unwrap();
        assert!((p.x - 800.0).abs() < 0.5);
        assert!((p.y - 450.0).abs() < 0.5);
    }

    #[test]
    fn points_behind_camera_are_not_projected() {
        let camera = Camera3D::framing(1.0, 5.0, 0.0, 0.0);
        assert!(camera
            .project_to_screen(Vec3::new(0.0, 0.0, 20.0), 100.0, 100.0)
            .is_none());
    }
}
