use glam::{Mat4, Vec4};
use id_arena::Arena;
use wgpu::BufferUsages;

use crate::rendering::render_model::RenderModel;
use crate::scene_graph::scene::Scene;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Instance {
    pub model: Mat4,
    /// x = receive shadows, rest unused.
    pub flags: Vec4,
}

impl Instance {
    pub fn descriptor() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<Instance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Per-model instance list for one frame. Shadow-casting instances are
/// kept at the front so the shadow pass can draw a prefix of the buffer.
pub struct Instances {
    instances: Vec<Instance>,
    caster_count: usize,
}

impl Instances {
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            caster_count: 0,
        }
    }

    pub fn add(&mut self, instance: Instance, casts_shadow: bool) {
        // The GPU-side buffer has a fixed capacity; anything past it is
        // dropped rather than overflowing the write.
        if self.instances.len() >= InstanceBuffer::MAX_INSTANCES as usize {
            log::warn!(
                "Instance list full ({} instances), dropping an instance",
                self.instances.len()
            );
            return;
        }

        if casts_shadow {
            self.instances.insert(self.caster_count, instance);
            self.caster_count += 1;
        } else {
            self.instances.push(instance);
        }
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.caster_count = 0;
    }

    pub fn write_to_buffer(&self, queue: &wgpu::Queue, instance_buffer: &InstanceBuffer) {
        queue.write_buffer(
            instance_buffer.buffer(),
            0,
            bytemuck::cast_slice(&self.instances),
        );
    }

    pub fn should_render(&self) -> bool {
        !self.instances.is_empty()
    }

    pub fn len(&self) -> u32 {
        self.instances.len() as u32
    }

    pub fn caster_count(&self) -> u32 {
        self.caster_count as u32
    }
}

pub struct InstanceBuffer(wgpu::Buffer);

impl InstanceBuffer {
    const MAX_INSTANCES: u64 = 128;

    pub fn new(device: &wgpu::Device, name: impl Into<String>) -> Self {
        let name: String = name.into();

        let descriptor = Self::descriptor(&name);
        let buffer = device.create_buffer(&descriptor);

        Self(buffer)
    }

    fn descriptor(name: &str) -> wgpu::BufferDescriptor<'static> {
        // Damned lifetimes! Nothing a nice controlled memory leak can't fix.
        let label = format!("Instance buffer ({})", name);
        let label = label.into_boxed_str();
        let label = Box::leak(label);

        wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<Instance>() as u64 * Self::MAX_INSTANCES,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.0
    }
}

/// Collects world matrices of every object referencing a model into that
/// model's instance list. Call after world transforms are up to date.
pub fn gather_instances(scene: &Scene, render_models: &mut Arena<RenderModel>) {
    for (_, render_model) in render_models.iter_mut() {
        render_model.instances.clear();
    }

    for (_, object) in scene.objects.iter() {
        let Some(model_id) = object.model_id else {
            continue;
        };
        let Some(render_model_id) = scene
            .models
            .get(model_id)
            .and_then(|scene_model| scene_model.render_model)
        else {
            continue;
        };
        let Some(render_model) = render_models.get_mut(render_model_id) else {
            continue;
        };

        let instance = Instance {
            model: *object.transform.get_world_matrix(),
            flags: Vec4::new(object.receive_shadow as u32 as f32, 0.0, 0.0, 0.0),
        };
        render_model.instances.add(instance, object.cast_shadow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> Instance {
        Instance {
            model: Mat4::IDENTITY,
            flags: Vec4::ZERO,
        }
    }

    #[test]
    fn casters_are_kept_at_the_front() {
        let mut instances = Instances::new();
        instances.add(instance(), false);
        instances.add(instance(), true);
        instances.add(instance(), false);
        instances.add(instance(), true);

        assert_eq!(instances.len(), 4);
        assert_eq!(instances.caster_count(), 2);
    }

    #[test]
    fn instance_list_is_capped_at_the_buffer_size() {
        let mut instances = Instances::new();
        for _ in 0..InstanceBuffer::MAX_INSTANCES + 10 {
            instances.add(instance(), false);
        }
        instances.add(instance(), true);

        assert_eq!(instances.len() as u64, InstanceBuffer::MAX_INSTANCES);
        // The caster did not fit either.
        assert_eq!(instances.caster_count(), 0);
    }

    #[test]
    fn clear_resets_the_caster_prefix() {
        let mut instances = Instances::new();
        instances.add(instance(), true);
        instances.clear();

        assert!(!instances.should_render());
        assert_eq!(instances.caster_count(), 0);
    }
}
