//! Placement normalization for freshly loaded models.
//!
//! Assets arrive in wildly different authoring units and with arbitrary
//! pivots; this centers the model horizontally, rescales it into a usable
//! viewport size band, and rests it on the ground plane, without any
//! per-asset configuration.

use glam::Vec3;

use crate::scene_graph::object3d::ObjectId;
use crate::scene_graph::scene::Scene;

/// Models whose largest dimension falls outside this band are rescaled.
pub const MIN_DISPLAY_SIZE: f32 = 10.0;
pub const MAX_DISPLAY_SIZE: f32 = 500.0;

/// Largest dimension after a rescale.
pub const TARGET_SIZE: f32 = 150.0;

/// Centers `root` horizontally, rescales it into the display band if
/// needed, and translates it so its lowest point sits on y = 0. Mutates
/// the root transform in place; the subtree below is untouched.
///
/// The vertical part of the centering translation is applied too, but its
/// effect is always overwritten by the ground placement step, so only the
/// x/z centering is observable. A zero-extent subtree would produce an
/// infinite scale factor; callers are expected to pass real geometry.
pub fn normalize_placement(scene: &mut Scene, root: ObjectId) {
    let Some(bounds) = scene.compute_world_bounds(root) else {
        log::warn!("Skipping placement normalization: subtree has no geometry");
        return;
    };

    let center = bounds.center();
    scene.translate_object(root, -center);

    let max_dim = bounds.max_dimension();
    if max_dim > MAX_DISPLAY_SIZE || max_dim < MIN_DISPLAY_SIZE {
        let scale_factor = TARGET_SIZE / max_dim;
        scene.set_object_scale(root, Vec3::splat(scale_factor));
    }

    // The box must be recomputed: the scale above changed it.
    if let Some(bounds) = scene.compute_world_bounds(root) {
        scene.translate_object(root, Vec3::new(0.0, -bounds.min.y, 0.0));
    }
}

/// Fixed rendering policy: every object carrying mesh geometry under
/// `root` both casts and receives shadows. Expressed as a visitor over the
/// plain hierarchy traversal, so the walk itself stays rendering-agnostic.
pub fn apply_shadow_policy(scene: &mut Scene, root: ObjectId) {
    scene.visit_hierarchy(root, &mut |object| {
        if object.model_id.is_some() {
            object.cast_shadow = true;
            object.receive_shadow = true;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::bounds::Aabb;
    use crate::scene_graph::object3d::Object3D;
    use crate::scene_graph::scene::tests::{box_from_bounds, test_box};
    use approx::assert_relative_eq;
    use glam::Vec3;

    fn spawn_wrapped_box(scene: &mut Scene, size: Vec3, center: Vec3) -> ObjectId {
        let half = size * 0.5;
        let model = box_from_bounds(Aabb::new(center - half, center + half));

        // Same shape as a loaded asset: geometry under a wrapper object.
        let wrapper = scene.add_object(Object3D::default());
        let inner = scene.spawn_model(model, false);
        scene.set_object_parent(inner, Some(wrapper));
        wrapper
    }

    #[test]
    fn in_range_model_keeps_unit_scale() {
        let mut scene = Scene::new();
        let root = spawn_wrapped_box(&mut scene, Vec3::new(100.0, 40.0, 60.0), Vec3::splat(7.0));

        normalize_placement(&mut scene, root);

        let scale = scene.get_object(root).unwrap().transform.scale();
        assert_eq!(scale, Vec3::ONE);

        let bounds = scene.compute_world_bounds(root).unwrap();
        assert_relative_eq!(bounds.center().x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(bounds.center().z, 0.0, epsilon = 1e-4);
        assert_relative_eq!(bounds.min.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn oversized_model_is_rescaled_to_target() {
        let mut scene = Scene::new();
        let root = spawn_wrapped_box(
            &mut scene,
            Vec3::new(1000.0, 200.0, 50.0),
            Vec3::new(50.0, 100.0, 10.0),
        );

        normalize_placement(&mut scene, root);

        let scale = scene.get_object(root).unwrap().transform.scale();
        assert_relative_eq!(scale.x, 0.15);
        assert_relative_eq!(scale.y, 0.15);
        assert_relative_eq!(scale.z, 0.15);

        let bounds = scene.compute_world_bounds(root).unwrap();
        assert_relative_eq!(bounds.max_dimension(), 150.0, epsilon = 1e-3);
        assert_relative_eq!(bounds.min.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn undersized_model_is_rescaled_to_target() {
        let mut scene = Scene::new();
        let root = spawn_wrapped_box(&mut scene, Vec3::splat(5.0), Vec3::ZERO);

        normalize_placement(&mut scene, root);

        let scale = scene.get_object(root).unwrap().transform.scale();
        assert_relative_eq!(scale.x, 30.0);

        let bounds = scene.compute_world_bounds(root).unwrap();
        assert_relative_eq!(bounds.max_dimension(), 150.0, epsilon = 1e-3);
        assert_relative_eq!(bounds.min.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn boundary_dimensions_are_left_alone() {
        for max_dim in [10.0, 500.0] {
            let mut scene = Scene::new();
            let root = spawn_wrapped_box(&mut scene, Vec3::splat(max_dim), Vec3::ZERO);

            normalize_placement(&mut scene, root);

            let scale = scene.get_object(root).unwrap().transform.scale();
            assert_eq!(scale, Vec3::ONE, "max dim {} must not rescale", max_dim);
        }
    }

    #[test]
    fn repeated_normalization_reproduces_the_transform() {
        let mut scene = Scene::new();
        let root = spawn_wrapped_box(&mut scene, Vec3::new(100.0, 40.0, 60.0), Vec3::splat(13.0));

        normalize_placement(&mut scene, root);
        let first = scene.get_object(root).unwrap().transform.clone();

        normalize_placement(&mut scene, root);
        let second = scene.get_object(root).unwrap().transform.clone();

        // The box is already within the display band, so the second pass
        // must be an exact no-op.
        assert_eq!(first.translation(), second.translation());
        assert_eq!(first.scale(), second.scale());
    }

    #[test]
    fn rescaled_model_stays_grounded_on_second_pass() {
        let mut scene = Scene::new();
        let root = spawn_wrapped_box(&mut scene, Vec3::splat(5.0), Vec3::new(1.0, 2.0, 3.0));

        normalize_placement(&mut scene, root);
        normalize_placement(&mut scene, root);

        let scale = scene.get_object(root).unwrap().transform.scale();
        assert_relative_eq!(scale.x, 30.0);

        let bounds = scene.compute_world_bounds(root).unwrap();
        assert_relative_eq!(bounds.max_dimension(), 150.0, epsilon = 1e-3);
        assert_relative_eq!(bounds.min.y, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn normalization_of_empty_subtree_is_a_no_op() {
        let mut scene = Scene::new();
        let root = scene.add_object(Object3D::default());

        normalize_placement(&mut scene, root);

        let transform = &scene.get_object(root).unwrap().transform;
        assert_eq!(transform.translation(), Vec3::ZERO);
        assert_eq!(transform.scale(), Vec3::ONE);
    }

    #[test]
    fn shadow_policy_marks_meshes_only() {
        let mut scene = Scene::new();
        let wrapper = scene.add_object(Object3D::default());
        let mesh = scene.spawn_model(test_box(2.0, Vec3::ZERO), false);
        let empty = scene.add_object(Object3D::default());
        scene.set_object_parent(mesh, Some(wrapper));
        scene.set_object_parent(empty, Some(wrapper));

        apply_shadow_policy(&mut scene, wrapper);

        let mesh = scene.get_object(mesh).unwrap();
        assert!(mesh.cast_shadow);
        assert!(mesh.receive_shadow);

        let wrapper = scene.get_object(wrapper).unwrap();
        assert!(!wrapper.cast_shadow);

        let empty = scene.get_object(empty).unwrap();
        assert!(!empty.cast_shadow && !empty.receive_shadow);
    }
}
