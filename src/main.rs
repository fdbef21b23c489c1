use anyhow::Result;

mod animation;
mod camera;
mod loader;
mod math;
mod model;
mod normalize;
mod rendering;
mod scene_graph;
mod viewer;
mod window;

fn main() -> Result<()> {
    pretty_env_logger::init();

    pollster::block_on(window::run())?;

    Ok(())
}
