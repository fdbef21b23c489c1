pub mod pass;
pub mod scene_pass;
pub mod shadow_pass;
