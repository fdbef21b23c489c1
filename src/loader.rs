//! Background loading of the model asset.
//!
//! The file is read and parsed on a worker thread; the main loop polls the
//! channel once per frame and keeps rendering while the load is pending.
//! A load produces zero or more progress events followed by exactly one
//! terminal `Finished` event.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;

use anyhow::Context;

const READ_CHUNK_SIZE: usize = 64 * 1024;

pub struct LoadedAsset {
    pub document: gltf::Document,
    pub buffers: Vec<gltf::buffer::Data>,
}

pub enum LoadEvent {
    Progress { loaded: u64, total: u64 },
    Finished(anyhow::Result<LoadedAsset>),
}

impl LoadEvent {
    pub fn progress_percent(loaded: u64, total: u64) -> f32 {
        if total == 0 {
            return 0.0;
        }
        (loaded as f64 / total as f64 * 100.0) as f32
    }
}

/// Handle to one in-flight asset load. Dropping it detaches the worker;
/// the receiver going away just makes the worker's sends fail silently.
pub struct AssetLoader {
    receiver: Receiver<LoadEvent>,
    _worker: JoinHandle<()>,
}

impl AssetLoader {
    pub fn spawn(path: impl Into<PathBuf>) -> AssetLoader {
        let path = path.into();
        let (sender, receiver) = channel();

        let worker = std::thread::spawn(move || {
            let result = load_asset(&path, &sender);
            // The receiver may already be gone during shutdown.
            let _ = sender.send(LoadEvent::Finished(result));
        });

        AssetLoader {
            receiver,
            _worker: worker,
        }
    }

    /// Drains every event the worker has produced since the last poll.
    pub fn poll(&self) -> impl Iterator<Item = LoadEvent> + '_ {
        self.receiver.try_iter()
    }

    #[cfg(test)]
    fn recv_blocking(&self) -> Option<LoadEvent> {
        self.receiver.recv().ok()
    }
}

fn load_asset(path: &Path, events: &Sender<LoadEvent>) -> anyhow::Result<LoadedAsset> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open asset {}", path.display()))?;
    let total = file
        .metadata()
        .with_context(|| format!("Failed to stat asset {}", path.display()))?
        .len();

    let mut bytes = Vec::with_capacity(total as usize);
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let read = file
            .read(&mut chunk)
            .with_context(|| format!("Failed to read asset {}", path.display()))?;
        if read == 0 {
            break;
        }

        bytes.extend_from_slice(&chunk[..read]);
        let _ = events.send(LoadEvent::Progress {
            loaded: bytes.len() as u64,
            total,
        });
    }

    let (document, buffers, _images) = gltf::import_slice(&bytes)
        .with_context(|| format!("Failed to parse asset {}", path.display()))?;

    Ok(LoadedAsset { document, buffers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Minimal valid glTF-binary container: header plus a single padded
    /// JSON chunk, no buffers.
    fn minimal_glb() -> Vec<u8> {
        let json = br#"{"asset":{"version":"2.0"}} "#; // padded to 28 bytes
        assert_eq!(json.len() % 4, 0);

        let total = 12 + 8 + json.len() as u32;
        let mut glb = Vec::new();
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&total.to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(json);
        glb
    }

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("charview-test-{}-{}", std::process::id(), name));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    fn drain(loader: &AssetLoader) -> (Vec<(u64, u64)>, anyhow::Result<LoadedAsset>) {
        let mut progress = Vec::new();
        loop {
            match loader.recv_blocking() {
                Some(LoadEvent::Progress { loaded, total }) => progress.push((loaded, total)),
                Some(LoadEvent::Finished(result)) => return (progress, result),
                None => panic!("Worker hung up without a Finished event"),
            }
        }
    }

    #[test]
    fn load_of_valid_container_succeeds() {
        let path = temp_file("valid.glb", &minimal_glb());
        let loader = AssetLoader::spawn(&path);
        let (progress, result) = drain(&loader);
        std::fs::remove_file(&path).ok();

        let asset = result.unwrap();
        assert_eq!(asset.document.animations().count(), 0);

        let (loaded, total) = *progress.last().unwrap();
        assert_eq!(loaded, total);
    }

    #[test]
    fn load_of_missing_file_fails_terminally() {
        let loader = AssetLoader::spawn("/nonexistent/character.glb");
        let (progress, result) = drain(&loader);

        assert!(progress.is_empty());
        assert!(result.is_err());
    }

    #[test]
    fn load_of_malformed_asset_fails() {
        let path = temp_file("garbage.glb", b"not a gltf container");
        let loader = AssetLoader::spawn(&path);
        let (_, result) = drain(&loader);
        std::fs::remove_file(&path).ok();

        assert!(result.is_err());
    }

    #[test]
    fn progress_percent_is_guarded_against_empty_files() {
        assert_eq!(LoadEvent::progress_percent(0, 0), 0.0);
        assert_eq!(LoadEvent::progress_percent(50, 200), 25.0);
        assert_eq!(LoadEvent::progress_percent(200, 200), 100.0);
    }
}
