use std::sync::Arc;

use id_arena::Arena;
use wgpu::CommandEncoderDescriptor;
use winit::window::Window;

use crate::camera::CameraUniform;
use crate::rendering::instance::gather_instances;
use crate::rendering::overlay::OverlayRenderer;
use crate::rendering::passes::pass::Pass;
use crate::rendering::passes::scene_pass::{ScenePass, ScenePassTextureViews};
use crate::rendering::passes::shadow_pass::{ShadowPass, ShadowPassTextureViews};
use crate::rendering::render_common::RenderCommon;
use crate::rendering::render_model::RenderModel;
use crate::rendering::texture::{DepthTexture, ShadowMap};
use crate::scene_graph::scene::Scene;
use crate::viewer::ViewerState;

pub struct Renderer {
    pub window: Arc<Window>,
    pub size: winit::dpi::PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,

    common: Arc<RenderCommon>,
    depth_texture: DepthTexture,
    shadow_map: ShadowMap,
    render_models: Arena<RenderModel>,

    camera_uniform: CameraUniform,

    shadow_pass: ShadowPass,
    scene_pass: ScenePass,
    overlay_renderer: OverlayRenderer,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        viewer: &ViewerState,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let mut camera_uniform = CameraUniform::default();
        camera_uniform.update(size, &viewer.camera);
        let camera_uniform_buffer = camera_uniform.create_buffer(&device);

        let common = RenderCommon::new(&device, &adapter, &surface, size, camera_uniform_buffer);
        let common = Arc::new(common);

        let depth_texture = DepthTexture::new(
            &device,
            &common.output_surface_config.read().unwrap(),
            "Depth Texture",
        );
        let shadow_map = ShadowMap::new(&device);

        let shadow_pass = ShadowPass::create(&device, common.clone())?;
        let scene_pass = ScenePass::create(&device, common.clone(), &shadow_map)?;

        let surface_format = common.output_surface_config.read().unwrap().format;
        let overlay_renderer =
            OverlayRenderer::new(&device, &queue, surface_format, imgui_context);

        Ok(Self {
            window,
            size,
            surface,
            device,
            queue,
            common,
            depth_texture,
            shadow_map,
            render_models: Arena::new(),
            camera_uniform,
            shadow_pass,
            scene_pass,
            overlay_renderer,
        })
    }

    /// Uploads GPU buffers for scene models that do not have them yet.
    /// New models appear whenever an asset load completes.
    pub fn upload_new_models(&mut self, scene: &mut Scene) {
        for (_id, scene_model) in scene.models.iter_mut() {
            if scene_model.render_model.is_some() {
                continue;
            }

            let render_model = RenderModel::from_model(&self.device, &scene_model.model);
            let render_model_id = self.render_models.alloc(render_model);
            scene_model.render_model = Some(render_model_id);

            log::debug!(
                "Uploaded model {} with {} primitives",
                scene_model.model.name,
                scene_model.model.primitives.len()
            );
        }
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        let common = self.common.as_ref();
        let mut config = common.output_surface_config.write().unwrap();

        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            config.width = new_size.width;
            config.height = new_size.height;
            self.surface.configure(&self.device, &config);
            self.depth_texture.resize(&self.device, &config);
        }
    }

    pub fn render(
        &mut self,
        viewer: &mut ViewerState,
        imgui_context: &mut imgui::Context,
    ) -> Result<(), wgpu::SurfaceError> {
        // Aspect ratio follows the current surface size.
        self.camera_uniform.update(self.size, &viewer.camera);
        self.camera_uniform
            .update_buffer(&self.queue, &self.common.camera_uniform_buffer);

        gather_instances(&viewer.scene, &mut self.render_models);
        for (_, render_model) in self.render_models.iter() {
            if render_model.instances.should_render() {
                render_model
                    .instances
                    .write_to_buffer(&self.queue, &render_model.instance_buffer);
            }
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.shadow_pass.render(
            &ShadowPassTextureViews {
                shadow_depth: self.shadow_map.view.clone(),
            },
            &mut encoder,
            |render_pass| {
                for (_, render_model) in self.render_models.iter() {
                    render_model.draw_style(
                        render_pass,
                        crate::model::PrimitiveStyle::Lit,
                        render_model.instances.caster_count(),
                    );
                }
            },
        );

        self.scene_pass.render(
            &ScenePassTextureViews {
                color: view.clone(),
                depth: self.depth_texture.view().clone(),
            },
            &mut encoder,
            |render_pass, style| {
                for (_, render_model) in self.render_models.iter() {
                    if !render_model.instances.should_render() {
                        continue;
                    }

                    render_model.draw_style(render_pass, style, render_model.instances.len());
                }
            },
        );

        self.overlay_renderer.render(
            &view,
            imgui_context,
            &self.device,
            &self.queue,
            &mut encoder,
        );

        let command_buffer = encoder.finish();

        self.queue.submit([command_buffer]);

        output.present();

        Ok(())
    }
}
