use std::sync::Arc;

use wgpu::{
    DepthBiasState, MultisampleState, PipelineCompilationOptions, RenderPass,
    RenderPassDescriptor, ShaderSource, StencilState,
};

use crate::model::PrimitiveStyle;
use crate::rendering::environment::{srgb_to_linear, BACKGROUND_COLOR};
use crate::rendering::instance::Instance;
use crate::rendering::render_common::RenderCommon;
use crate::rendering::render_model::RENDER_MODEL_VBL;
use crate::rendering::texture::{self, ShadowMap};

/// Forward pass drawing the whole scene: ground plane first (no depth
/// writes), then the grid lines on top of it, then the lit model.
const DRAW_ORDER: [PrimitiveStyle; 3] = [
    PrimitiveStyle::Ground,
    PrimitiveStyle::GridLine,
    PrimitiveStyle::Lit,
];

pub struct ScenePass {
    pipelines: [(PrimitiveStyle, wgpu::RenderPipeline); 3],
    camera_bind_group: wgpu::BindGroup,
    environment_bind_group: wgpu::BindGroup,
}

pub struct ScenePassTextureViews {
    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,
}

impl ScenePass {
    pub fn create(
        device: &wgpu::Device,
        common: Arc<RenderCommon>,
        shadow_map: &ShadowMap,
    ) -> anyhow::Result<ScenePass> {
        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("camera_bind_group_layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: common.camera_uniform_buffer.as_entire_binding(),
            }],
        });

        let environment_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("environment_bind_group_layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                        count: None,
                    },
                ],
            });

        let environment_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("environment_bind_group"),
            layout: &environment_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: common.environment_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_map.sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&camera_bind_group_layout, &environment_bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: ShaderSource::Wgsl(include_str!("../../shaders/scene.wgsl").into()),
        });

        let surface_format = common.output_surface_config.read().unwrap().format;

        let make_pipeline = |style: PrimitiveStyle| {
            let (label, entry_point, topology, blend, depth_write) = match style {
                PrimitiveStyle::Lit => (
                    "Scene Pipeline (lit)",
                    "fs_lit",
                    wgpu::PrimitiveTopology::TriangleList,
                    wgpu::BlendState::REPLACE,
                    true,
                ),
                PrimitiveStyle::Ground => (
                    "Scene Pipeline (ground)",
                    "fs_lit",
                    wgpu::PrimitiveTopology::TriangleList,
                    wgpu::BlendState::REPLACE,
                    false,
                ),
                PrimitiveStyle::GridLine => (
                    "Scene Pipeline (grid)",
                    "fs_unlit",
                    wgpu::PrimitiveTopology::LineList,
                    wgpu::BlendState::ALPHA_BLENDING,
                    false,
                ),
            };

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[RENDER_MODEL_VBL, Instance::descriptor()],
                    compilation_options: PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry_point),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: texture::DEPTH_FORMAT,
                    depth_write_enabled: depth_write,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: StencilState::default(),
                    bias: DepthBiasState::default(),
                }),
                multisample: MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let pipelines = DRAW_ORDER.map(|style| (style, make_pipeline(style)));

        Ok(ScenePass {
            pipelines,
            camera_bind_group,
            environment_bind_group,
        })
    }

    /// Clears the targets and draws every style in back-to-front order.
    /// The callback issues the draw calls for one style at a time, with
    /// the matching pipeline already bound.
    pub fn render<F>(
        &self,
        texture_views: &ScenePassTextureViews,
        encoder: &mut wgpu::CommandEncoder,
        mut render_callback: F,
    ) where
        F: FnMut(&mut RenderPass, PrimitiveStyle),
    {
        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &texture_views.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color()),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &texture_views.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_bind_group(1, &self.environment_bind_group, &[]);

        for (style, pipeline) in &self.pipelines {
            render_pass.set_pipeline(pipeline);
            render_callback(&mut render_pass, *style);
        }
    }
}

// The surface is sRGB, so the clear value has to be the linearized
// background color.
fn clear_color() -> wgpu::Color {
    let linear = srgb_to_linear(BACKGROUND_COLOR);
    wgpu::Color {
        r: linear.x as f64,
        g: linear.y as f64,
        b: linear.z as f64,
        a: 1.0,
    }
}
