pub mod environment;
pub mod instance;
pub mod overlay;
pub mod passes;
pub mod render_common;
pub mod render_model;
pub mod renderer;
pub mod texture;
