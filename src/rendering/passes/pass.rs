use wgpu::RenderPass;

/// A render pass over a fixed set of target views, with the actual draw
/// calls supplied by the caller.
pub(crate) trait Pass {
    type TextureViews;

    fn render<'a, F>(
        &self,
        texture_views: &Self::TextureViews,
        encoder: &mut wgpu::CommandEncoder,
        render_callback: F,
    ) where
        F: FnOnce(&mut RenderPass) + 'a;
}
