use glam::{Mat4, Vec2, Vec3, Vec4};
use wgpu::util::DeviceExt;

pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Viewing setup matching the character viewer: 45 degree fov, near 1,
    /// far 2000, eye well above and behind the ground origin.
    pub fn character_viewer() -> Camera {
        Camera {
            eye: Vec3::new(100.0, 150.0, 300.0),
            target: Vec3::new(0.0, 50.0, 0.0),
            up: Vec3::Y,
            fov_y_degrees: 45.0,
            near: 1.0,
            far: 2000.0,
        }
    }

    /// Aspect ratio is recomputed from the viewport on every call, so a
    /// resize only has to pass the new resolution through.
    pub fn get_vp_matrix(&self, resolution: Vec2) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target, self.up);
        let projection = Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            resolution.x / resolution.y,
            self.near,
            self.far,
        );
        projection * view
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct CameraUniform {
    view_proj: Mat4,
    /// xyz = eye position (fog is distance based), w unused.
    eye: Vec4,
}

impl CameraUniform {
    pub fn update(&mut self, resolution: winit::dpi::PhysicalSize<u32>, camera: &Camera) {
        self.view_proj =
            camera.get_vp_matrix(Vec2::new(resolution.width as f32, resolution.height as f32));
        self.eye = camera.eye.extend(0.0);
    }

    pub fn create_buffer(&self, device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: bytemuck::cast_slice(&[*self]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn update_buffer(&self, queue: &wgpu::Queue, buffer: &wgpu::Buffer) {
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[*self]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_target_projects_to_screen_center() {
        let camera = Camera::character_viewer();
        let vp = camera.get_vp_matrix(Vec2::new(1920.0, 1080.0));

        let clip = vp * camera.target.extend(1.0);
        let ndc = clip / clip.w;

        assert!(ndc.x.abs() < 1e-4);
        assert!(ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
