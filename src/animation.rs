//! Keyframed animation playback.
//!
//! Clips are extracted from the glTF document as per-node TRS tracks and
//! advanced by wall-clock delta time, writing sampled local transforms back
//! into the scene graph each frame.

use std::collections::HashMap;
use std::time::Duration;

use glam::{Quat, Vec3};

use crate::model::Buffers;
use crate::scene_graph::object3d::ObjectId;
use crate::scene_graph::scene::Scene;

pub struct TrackVec3 {
    pub times: Vec<f32>,
    pub values: Vec<Vec3>,
}

pub struct TrackQuat {
    pub times: Vec<f32>,
    pub values: Vec<Quat>,
}

/// One animation clip: TRS keyframe tracks keyed by glTF node index.
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub translation_tracks: HashMap<usize, TrackVec3>,
    pub rotation_tracks: HashMap<usize, TrackQuat>,
    pub scale_tracks: HashMap<usize, TrackVec3>,
}

impl AnimationClip {
    fn animated_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        let mut nodes: Vec<usize> = self
            .translation_tracks
            .keys()
            .chain(self.rotation_tracks.keys())
            .chain(self.scale_tracks.keys())
            .copied()
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes.into_iter()
    }
}

/// Extracts every animation clip in document order. Weight (morph target)
/// channels are skipped.
pub fn extract_clips(document: &gltf::Document, buffers: Buffers) -> Vec<AnimationClip> {
    let mut clips = Vec::new();

    for animation in document.animations() {
        let name = animation.name().unwrap_or("Unnamed").to_string();
        let mut clip = AnimationClip {
            name,
            duration: 0.0,
            translation_tracks: HashMap::new(),
            rotation_tracks: HashMap::new(),
            scale_tracks: HashMap::new(),
        };

        for channel in animation.channels() {
            let node_index = channel.target().node().index();
            let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));

            let Some(inputs) = reader.read_inputs() else {
                continue;
            };
            let times: Vec<f32> = inputs.collect();
            if let Some(&last) = times.last() {
                clip.duration = clip.duration.max(last);
            }

            let Some(outputs) = reader.read_outputs() else {
                continue;
            };

            use gltf::animation::util::ReadOutputs;
            match outputs {
                ReadOutputs::Translations(values) => {
                    clip.translation_tracks.insert(
                        node_index,
                        TrackVec3 {
                            times,
                            values: values.map(Vec3::from).collect(),
                        },
                    );
                }
                ReadOutputs::Rotations(values) => {
                    clip.rotation_tracks.insert(
                        node_index,
                        TrackQuat {
                            times,
                            values: values
                                .into_f32()
                                .map(|v| Quat::from_array(v).normalize())
                                .collect(),
                        },
                    );
                }
                ReadOutputs::Scales(values) => {
                    clip.scale_tracks.insert(
                        node_index,
                        TrackVec3 {
                            times,
                            values: values.map(Vec3::from).collect(),
                        },
                    );
                }
                ReadOutputs::MorphTargetWeights(_) => {}
            }
        }

        clips.push(clip);
    }

    clips
}

fn sample_vec3(track: &TrackVec3, t: f32, default: Vec3) -> Vec3 {
    if track.times.is_empty() {
        return default;
    }
    if t <= track.times[0] {
        return track.values[0];
    }
    if t >= *track.times.last().unwrap() {
        return *track.values.last().unwrap();
    }

    let i = segment_index(&track.times, t);
    let f = segment_fraction(&track.times, i, t);
    track.values[i].lerp(track.values[i + 1], f)
}

fn sample_quat(track: &TrackQuat, t: f32, default: Quat) -> Quat {
    if track.times.is_empty() {
        return default;
    }
    if t <= track.times[0] {
        return track.values[0];
    }
    if t >= *track.times.last().unwrap() {
        return *track.values.last().unwrap();
    }

    let i = segment_index(&track.times, t);
    let f = segment_fraction(&track.times, i, t);
    track.values[i].slerp(track.values[i + 1], f)
}

fn segment_index(times: &[f32], t: f32) -> usize {
    let mut i = 0;
    while i + 1 < times.len() && t > times[i + 1] {
        i += 1;
    }
    i
}

fn segment_fraction(times: &[f32], i: usize, t: f32) -> f32 {
    let t0 = times[i];
    let t1 = times[i + 1];
    (t - t0) / (t1 - t0)
}

/// Drives one clip over the scene objects it targets. Untracked TRS
/// components keep the object's current (base pose) value.
pub struct Mixer {
    clip: AnimationClip,
    bindings: HashMap<usize, ObjectId>,
    time: f32,
}

impl Mixer {
    /// Binds the clip's node indices to the objects spawned from them.
    /// Tracks targeting nodes outside the subtree are silently dropped.
    pub fn bind(clip: AnimationClip, scene: &Scene, root: ObjectId) -> Mixer {
        let objects_by_node = scene.collect_node_bindings(root);

        let bindings = clip
            .animated_nodes()
            .filter_map(|node_index| {
                objects_by_node
                    .get(&node_index)
                    .map(|&object_id| (node_index, object_id))
            })
            .collect();

        Mixer {
            clip,
            bindings,
            time: 0.0,
        }
    }

    pub fn clip_name(&self) -> &str {
        &self.clip.name
    }

    /// Advances the playback clock by the given wall-clock delta and writes
    /// the sampled pose into the scene. The clock wraps modulo the clip
    /// duration, so playback loops indefinitely.
    pub fn advance(&mut self, scene: &mut Scene, delta: Duration) {
        self.time += delta.as_secs_f32();

        let time = if self.clip.duration > 0.0 {
            self.time % self.clip.duration
        } else {
            0.0
        };

        for (&node_index, &object_id) in &self.bindings {
            let Some(object) = scene.get_object(object_id) else {
                continue;
            };

            let base_translation = object.transform.translation();
            let base_rotation = object.transform.rotation();
            let base_scale = object.transform.scale();

            let translation = self
                .clip
                .translation_tracks
                .get(&node_index)
                .map(|track| sample_vec3(track, time, base_translation))
                .unwrap_or(base_translation);
            let rotation = self
                .clip
                .rotation_tracks
                .get(&node_index)
                .map(|track| sample_quat(track, time, base_rotation))
                .unwrap_or(base_rotation);
            let scale = self
                .clip
                .scale_tracks
                .get(&node_index)
                .map(|track| sample_vec3(track, time, base_scale))
                .unwrap_or(base_scale);

            scene.set_object_transform(object_id, translation, rotation, scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::object3d::Object3D;
    use approx::assert_relative_eq;

    fn ramp_track() -> TrackVec3 {
        TrackVec3 {
            times: vec![0.0, 1.0, 3.0],
            values: vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 4.0, 0.0)],
        }
    }

    #[test]
    fn sampling_clamps_outside_the_key_range() {
        let track = ramp_track();
        assert_eq!(sample_vec3(&track, -1.0, Vec3::ZERO), Vec3::ZERO);
        assert_eq!(sample_vec3(&track, 5.0, Vec3::ZERO), Vec3::new(1.0, 4.0, 0.0));
    }

    #[test]
    fn sampling_interpolates_between_keys() {
        let track = ramp_track();

        let mid = sample_vec3(&track, 0.5, Vec3::ZERO);
        assert_relative_eq!(mid.x, 0.5);

        // Second segment spans two seconds.
        let late = sample_vec3(&track, 2.0, Vec3::ZERO);
        assert_relative_eq!(late.y, 2.0);
    }

    #[test]
    fn empty_track_returns_default() {
        let track = TrackVec3 {
            times: vec![],
            values: vec![],
        };
        assert_eq!(sample_vec3(&track, 0.5, Vec3::Y), Vec3::Y);
    }

    #[test]
    fn quat_sampling_interpolates_midway() {
        let track = TrackQuat {
            times: vec![0.0, 1.0],
            values: vec![
                Quat::IDENTITY,
                Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            ],
        };

        let mid = sample_quat(&track, 0.5, Quat::IDENTITY);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(mid.dot(expected).abs() > 0.9999);
    }

    fn single_node_clip(duration: f32, track: TrackVec3) -> AnimationClip {
        let mut translation_tracks = HashMap::new();
        translation_tracks.insert(0, track);
        AnimationClip {
            name: "Test".to_string(),
            duration,
            translation_tracks,
            rotation_tracks: HashMap::new(),
            scale_tracks: HashMap::new(),
        }
    }

    fn scene_with_node_zero() -> (Scene, ObjectId, ObjectId) {
        let mut scene = Scene::new();
        let root = scene.add_object(Object3D::default());
        let animated = scene.add_object(Object3D {
            node_index: Some(0),
            ..Object3D::default()
        });
        scene.set_object_parent(animated, Some(root));
        (scene, root, animated)
    }

    #[test]
    fn mixer_writes_sampled_pose_into_scene() {
        let (mut scene, root, animated) = scene_with_node_zero();
        let clip = single_node_clip(
            2.0,
            TrackVec3 {
                times: vec![0.0, 2.0],
                values: vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)],
            },
        );

        let mut mixer = Mixer::bind(clip, &scene, root);
        mixer.advance(&mut scene, Duration::from_secs_f32(0.5));

        let translation = scene.get_object(animated).unwrap().transform.translation();
        assert_relative_eq!(translation.x, 0.5);
    }

    #[test]
    fn mixer_clock_wraps_at_clip_duration() {
        let (mut scene, root, animated) = scene_with_node_zero();
        let clip = single_node_clip(
            2.0,
            TrackVec3 {
                times: vec![0.0, 2.0],
                values: vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)],
            },
        );

        let mut mixer = Mixer::bind(clip, &scene, root);
        mixer.advance(&mut scene, Duration::from_secs_f32(2.5));

        let translation = scene.get_object(animated).unwrap().transform.translation();
        assert_relative_eq!(translation.x, 0.5);
    }

    #[test]
    fn tracks_for_nodes_outside_the_subtree_are_dropped() {
        let (scene, root, _) = scene_with_node_zero();
        let mut clip = single_node_clip(
            1.0,
            TrackVec3 {
                times: vec![0.0, 1.0],
                values: vec![Vec3::ZERO, Vec3::X],
            },
        );
        clip.translation_tracks.insert(
            99,
            TrackVec3 {
                times: vec![0.0, 1.0],
                values: vec![Vec3::ZERO, Vec3::X],
            },
        );

        let mixer = Mixer::bind(clip, &scene, root);
        assert_eq!(mixer.bindings.len(), 1);
    }
}
