use anyhow::Context;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use gltf::buffer;
use itertools::izip;

use crate::math::bounds::Aabb;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    /// Stored as a plain array: glam's `Vec4` is 16-byte aligned, which
    /// would introduce padding after the two `Vec3` fields.
    pub color: [f32; 4],
}

/// Which pipeline a primitive is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveStyle {
    /// Opaque lit triangles.
    Lit,
    /// Lit triangles with depth writes disabled, so the grid drawn on top
    /// of the ground plane does not z-fight with it.
    Ground,
    /// Alpha-blended unlit line list.
    GridLine,
}

pub struct ModelPrimitive {
    pub index: usize,
    pub style: PrimitiveStyle,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl ModelPrimitive {
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|vertex| vertex.position))
    }
}

pub struct Model {
    pub name: String,
    pub primitives: Vec<ModelPrimitive>,
}

pub type Buffers<'a> = &'a [buffer::Data];

impl Model {
    pub fn from_gltf(
        name: impl Into<String>,
        mesh: gltf::Mesh,
        buffers: Buffers,
    ) -> anyhow::Result<Model> {
        let mut model = Model {
            name: name.into(),
            primitives: Vec::new(),
        };

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                return Err(anyhow::anyhow!(
                    "Unsupported primitive mode: {:?}",
                    primitive.mode()
                ));
            }

            let base_color = primitive
                .material()
                .pbr_metallic_roughness()
                .base_color_factor();

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let position_reader = reader.read_positions().context("Failed to read positions")?;
            let normal_reader = reader.read_normals().context("Failed to read normals")?;

            let vertices = izip!(position_reader, normal_reader)
                .map(|(position, normal)| Vertex {
                    position: Vec3::from(position),
                    normal: Vec3::from(normal),
                    color: base_color,
                })
                .collect::<Vec<Vertex>>();

            let indices = match reader.read_indices() {
                Some(index_reader) => index_reader.into_u32().collect::<Vec<u32>>(),
                None => (0..vertices.len() as u32).collect(),
            };

            model.primitives.push(ModelPrimitive {
                index: primitive.index(),
                style: PrimitiveStyle::Lit,
                vertices,
                indices,
            });
        }

        if model.primitives.is_empty() {
            return Err(anyhow::anyhow!("Mesh without primitives: {}", model.name));
        }

        Ok(model)
    }

    /// A flat quad at y = 0, facing up.
    pub fn ground_plane(name: impl Into<String>, size: f32, color: Vec4) -> Model {
        let half = size * 0.5;
        let normal = Vec3::Y;
        let color = color.to_array();

        let vertices = [
            Vec3::new(-half, 0.0, -half),
            Vec3::new(half, 0.0, -half),
            Vec3::new(half, 0.0, half),
            Vec3::new(-half, 0.0, half),
        ]
        .map(|position| Vertex {
            position,
            normal,
            color,
        })
        .to_vec();

        Model {
            name: name.into(),
            primitives: vec![ModelPrimitive {
                index: 0,
                style: PrimitiveStyle::Ground,
                vertices,
                indices: vec![0, 2, 1, 0, 3, 2],
            }],
        }
    }

    /// Reference grid on the ground plane: `divisions + 1` lines along each
    /// horizontal axis.
    pub fn grid(name: impl Into<String>, size: f32, divisions: u32, color: Vec4) -> Model {
        let half = size * 0.5;
        let step = size / divisions as f32;
        let normal = Vec3::Y;
        let color = color.to_array();

        let mut vertices = Vec::with_capacity(((divisions + 1) * 4) as usize);
        for line in 0..=divisions {
            let offset = -half + line as f32 * step;

            for position in [
                Vec3::new(offset, 0.0, -half),
                Vec3::new(offset, 0.0, half),
                Vec3::new(-half, 0.0, offset),
                Vec3::new(half, 0.0, offset),
            ] {
                vertices.push(Vertex {
                    position,
                    normal,
                    color,
                });
            }
        }

        let indices = (0..vertices.len() as u32).collect();

        Model {
            name: name.into(),
            primitives: vec![ModelPrimitive {
                index: 0,
                style: PrimitiveStyle::GridLine,
                vertices,
                indices,
            }],
        }
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.primitives
            .iter()
            .filter_map(|primitive| primitive.bounds())
            .reduce(|a, b| a.union(&b))
    }
}
