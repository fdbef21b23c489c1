//! Fixed lighting and fog environment of the viewer scene: one
//! hemisphere light, one shadow-casting directional light, linear fog
//! matching the background color.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use wgpu::util::DeviceExt;

pub const BACKGROUND_COLOR: Vec3 = Vec3::new(0.102, 0.102, 0.102);

const SUN_POSITION: Vec3 = Vec3::new(0.0, 200.0, 100.0);
const HEMI_POSITION: Vec3 = Vec3::new(0.0, 200.0, 0.0);
const LIGHT_INTENSITY: f32 = 1.5;

// Orthographic extents of the sun's shadow camera.
const SHADOW_LEFT: f32 = -120.0;
const SHADOW_RIGHT: f32 = 120.0;
const SHADOW_BOTTOM: f32 = -100.0;
const SHADOW_TOP: f32 = 180.0;
const SHADOW_NEAR: f32 = 0.5;
const SHADOW_FAR: f32 = 500.0;

const FOG_NEAR: f32 = 200.0;
const FOG_FAR: f32 = 1000.0;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct EnvironmentUniform {
    light_view_proj: Mat4,
    /// xyz = direction towards the sun.
    sun_direction: Vec4,
    sun_color: Vec4,
    /// xyz = direction towards the hemisphere zenith.
    hemi_direction: Vec4,
    hemi_sky_color: Vec4,
    hemi_ground_color: Vec4,
    /// rgb = fog color, w = fog near.
    fog_color_near: Vec4,
    /// x = fog far.
    fog_params: Vec4,
}

impl EnvironmentUniform {
    pub fn character_viewer() -> EnvironmentUniform {
        EnvironmentUniform {
            light_view_proj: sun_view_proj(),
            sun_direction: SUN_POSITION.normalize().extend(0.0),
            sun_color: (Vec3::ONE * LIGHT_INTENSITY).extend(0.0),
            hemi_direction: HEMI_POSITION.normalize().extend(0.0),
            hemi_sky_color: (Vec3::ONE * LIGHT_INTENSITY).extend(0.0),
            hemi_ground_color: (srgb_to_linear(Vec3::splat(0.267)) * LIGHT_INTENSITY).extend(0.0),
            fog_color_near: srgb_to_linear(BACKGROUND_COLOR).extend(FOG_NEAR),
            fog_params: Vec4::new(FOG_FAR, 0.0, 0.0, 0.0),
        }
    }

    pub fn create_buffer(&self, device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Environment Uniform Buffer"),
            contents: bytemuck::cast_slice(&[*self]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }
}

/// Lighting math happens in linear space; authored colors are sRGB.
pub fn srgb_to_linear(srgb: Vec3) -> Vec3 {
    srgb.map(|c| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    })
}

fn sun_view_proj() -> Mat4 {
    let view = Mat4::look_at_rh(SUN_POSITION, Vec3::ZERO, Vec3::Y);
    let projection = Mat4::orthographic_rh(
        SHADOW_LEFT,
        SHADOW_RIGHT,
        SHADOW_BOTTOM,
        SHADOW_TOP,
        SHADOW_NEAR,
        SHADOW_FAR,
    );
    projection * view
}
