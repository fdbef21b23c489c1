use std::path::{Path, PathBuf};
use std::time::Duration;

use glam::Vec4;

use crate::animation::{extract_clips, Mixer};
use crate::camera::Camera;
use crate::loader::{AssetLoader, LoadEvent, LoadedAsset};
use crate::model::Model;
use crate::normalize::{apply_shadow_policy, normalize_placement};
use crate::rendering::environment::srgb_to_linear;
use crate::scene_graph::scene::Scene;

pub const DEFAULT_ASSET_PATH: &str = "assets/character.glb";

const GROUND_SIZE: f32 = 2000.0;
const GRID_DIVISIONS: u32 = 20;
const LOAD_ERROR_MESSAGE: &str = "Error loading model";

/// What the overlay region shows this frame.
pub enum Overlay {
    Loading,
    Hidden,
    Failed(String),
}

/// Render-loop variant. Starts static; switches to animated at most once,
/// when a loaded asset carries at least one clip. There is no way back.
pub enum Playback {
    Static,
    Animated(Mixer),
}

impl Playback {
    fn begin(&mut self, mixer: Mixer) {
        if let Playback::Static = self {
            log::info!("Playing animation clip '{}'", mixer.clip_name());
            *self = Playback::Animated(mixer);
        }
    }
}

pub struct ViewerState {
    pub camera: Camera,
    pub scene: Scene,
    pub playback: Playback,
    pub overlay: Overlay,
    asset_path: PathBuf,
    loader: Option<AssetLoader>,
}

impl ViewerState {
    pub fn new(asset_path: impl Into<PathBuf>) -> ViewerState {
        let asset_path = asset_path.into();
        let mut scene = Scene::new();

        let ground_color = srgb_to_linear(glam::Vec3::splat(0.067)).extend(1.0);
        scene.spawn_model(Model::ground_plane("Ground", GROUND_SIZE, ground_color), true);
        scene.spawn_model(
            Model::grid(
                "Grid",
                GROUND_SIZE,
                GRID_DIVISIONS,
                Vec4::new(0.0, 0.0, 0.0, 0.2),
            ),
            false,
        );

        let loader = AssetLoader::spawn(asset_path.clone());

        ViewerState {
            camera: Camera::character_viewer(),
            scene,
            playback: Playback::Static,
            overlay: Overlay::Loading,
            asset_path,
            loader: Some(loader),
        }
    }

    /// Per-frame update: drain loader events, then advance the mixer by the
    /// elapsed wall-clock time if playback has gone animated.
    pub fn update(&mut self, delta: Duration) {
        self.poll_loader();

        if let Playback::Animated(mixer) = &mut self.playback {
            mixer.advance(&mut self.scene, delta);
        }

        self.scene.update_world_transforms();
    }

    fn poll_loader(&mut self) {
        let Some(loader) = &self.loader else {
            return;
        };

        let mut finished = None;
        for event in loader.poll() {
            match event {
                LoadEvent::Progress { loaded, total } => {
                    log::info!(
                        "{:.0}% loaded",
                        LoadEvent::progress_percent(loaded, total)
                    );
                }
                LoadEvent::Finished(result) => {
                    finished = Some(result);
                }
            }
        }

        if let Some(result) = finished {
            // Terminal either way; the worker is done.
            self.loader = None;

            match result {
                Ok(asset) => self.on_asset_loaded(asset),
                Err(error) => {
                    log::error!("Failed to load {}: {:#}", self.asset_path.display(), error);
                    self.overlay = Overlay::Failed(LOAD_ERROR_MESSAGE.to_string());
                }
            }
        }
    }

    fn on_asset_loaded(&mut self, asset: LoadedAsset) {
        let Some(gltf_scene) = asset.document.scenes().next() else {
            log::error!(
                "Failed to load {}: no scenes in document",
                self.asset_path.display()
            );
            self.overlay = Overlay::Failed(LOAD_ERROR_MESSAGE.to_string());
            return;
        };

        let wrapper_name = self
            .asset_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Model".to_string());

        let root = match self
            .scene
            .spawn_gltf_scene(wrapper_name, &asset.buffers, &gltf_scene)
        {
            Ok(root) => root,
            Err(error) => {
                log::error!("Failed to load {}: {:#}", self.asset_path.display(), error);
                self.overlay = Overlay::Failed(LOAD_ERROR_MESSAGE.to_string());
                return;
            }
        };

        normalize_placement(&mut self.scene, root);
        apply_shadow_policy(&mut self.scene, root);

        let mut clips = extract_clips(&asset.document, &asset.buffers);
        if !clips.is_empty() {
            if clips.len() > 1 {
                log::debug!("Asset has {} clips; playing the first", clips.len());
            }
            let clip = clips.swap_remove(0);
            self.playback.begin(Mixer::bind(clip, &self.scene, root));
        }

        self.overlay = Overlay::Hidden;
    }
}

pub fn asset_path_from_args() -> PathBuf {
    std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(DEFAULT_ASSET_PATH).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{AnimationClip, Mixer};
    use crate::scene_graph::object3d::Object3D;
    use std::collections::HashMap;

    fn named_mixer(name: &str, scene: &Scene, root: crate::scene_graph::object3d::ObjectId) -> Mixer {
        let clip = AnimationClip {
            name: name.to_string(),
            duration: 1.0,
            translation_tracks: HashMap::new(),
            rotation_tracks: HashMap::new(),
            scale_tracks: HashMap::new(),
        };
        Mixer::bind(clip, scene, root)
    }

    #[test]
    fn failed_load_shows_the_error_overlay() {
        let mut viewer = ViewerState::new("/nonexistent/character.glb");

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while viewer.loader.is_some() {
            assert!(
                std::time::Instant::now() < deadline,
                "load never finished"
            );
            viewer.update(Duration::from_millis(1));
            std::thread::sleep(Duration::from_millis(1));
        }

        match &viewer.overlay {
            Overlay::Failed(message) => assert_eq!(message, LOAD_ERROR_MESSAGE),
            _ => panic!("A failed load must surface in the overlay"),
        }
    }

    #[test]
    fn playback_transition_is_one_way() {
        let mut scene = Scene::new();
        let root = scene.add_object(Object3D::default());

        let mut playback = Playback::Static;
        playback.begin(named_mixer("First", &scene, root));
        playback.begin(named_mixer("Second", &scene, root));

        match playback {
            Playback::Animated(mixer) => assert_eq!(mixer.clip_name(), "First"),
            Playback::Static => panic!("Playback never left the static state"),
        }
    }
}
