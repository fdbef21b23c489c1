//! Loading/error overlay drawn on top of the scene with imgui.

use imgui::{Condition, WindowFlags};
use imgui_wgpu::RendererConfig;
use wgpu::{CommandEncoder, TextureView};

use crate::viewer::Overlay;

const ERROR_TEXT_COLOR: [f32; 4] = [1.0, 0.25, 0.25, 1.0];

/// Builds this frame's overlay UI. Hidden overlays draw nothing at all.
pub fn draw_overlay(ui: &imgui::Ui, overlay: &Overlay, resolution: [f32; 2]) {
    let text: &str = match overlay {
        Overlay::Hidden => return,
        Overlay::Loading => "Loading model...",
        Overlay::Failed(message) => message,
    };

    ui.window("##loading-overlay")
        .position(
            [resolution[0] * 0.5, resolution[1] * 0.5],
            Condition::Always,
        )
        .position_pivot([0.5, 0.5])
        .flags(
            WindowFlags::NO_DECORATION | WindowFlags::ALWAYS_AUTO_RESIZE | WindowFlags::NO_INPUTS,
        )
        .build(|| match overlay {
            Overlay::Failed(_) => ui.text_colored(ERROR_TEXT_COLOR, text),
            _ => ui.text(text),
        });
}

pub struct OverlayRenderer {
    renderer: imgui_wgpu::Renderer,
}

impl OverlayRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture_format: wgpu::TextureFormat,
        context: &mut imgui::Context,
    ) -> OverlayRenderer {
        let renderer_config = RendererConfig {
            texture_format,
            ..Default::default()
        };

        let renderer = imgui_wgpu::Renderer::new(context, device, queue, renderer_config);

        OverlayRenderer { renderer }
    }

    pub fn render(
        &mut self,
        view: &TextureView,
        context: &mut imgui::Context,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut CommandEncoder,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Overlay Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let draw_data = context.render();

        // Workaround for memory safety related crash in imgui-rs
        // https://github.com/imgui-rs/imgui-rs/issues/325
        if draw_data.draw_lists_count() == 0 {
            return;
        }

        self.renderer
            .render(draw_data, queue, device, &mut render_pass)
            .expect("Rendering overlay failed");
    }
}
