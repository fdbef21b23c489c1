use glam::{Mat4, Quat, Vec3};
use id_arena::Arena;
use std::collections::HashMap;

use crate::math::bounds::Aabb;
use crate::model::{Buffers, Model};
use crate::scene_graph::object3d::{Object3D, ObjectId};
use crate::scene_graph::scene_model::{SceneModel, SceneModelId};

pub struct Scene {
    pub objects: Arena<Object3D>,
    pub models: Arena<SceneModel>,
    gltf_mesh_to_model: HashMap<usize, SceneModelId>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Arena::new(),
            models: Arena::new(),
            gltf_mesh_to_model: HashMap::new(),
        }
    }

    pub fn add_object(&mut self, object: Object3D) -> ObjectId {
        self.objects.alloc(object)
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id)
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Option<&mut Object3D> {
        self.objects.get_mut(id)
    }

    #[allow(dead_code)]
    pub fn get_object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, object)| object.name == name)
            .map(|(id, _)| id)
    }

    pub fn add_model(&mut self, model: SceneModel) -> SceneModelId {
        self.models.alloc(model)
    }

    /// Adds a free-standing object carrying the given model at the origin.
    /// Used for the ground plane and the reference grid.
    pub fn spawn_model(&mut self, model: Model, receive_shadow: bool) -> ObjectId {
        let name = model.name.clone();
        let model_id = self.add_model(SceneModel::new(model));

        self.add_object(Object3D {
            name,
            model_id: Some(model_id),
            receive_shadow,
            ..Object3D::default()
        })
    }

    /// Spawns a glTF scene under a fresh wrapper object and returns the
    /// wrapper's id. Placement normalization mutates the wrapper only, so a
    /// clip animating the glTF root nodes cannot clobber it.
    ///
    /// A mesh the decoder rejects (missing normals, non-triangle topology)
    /// fails the whole spawn; the caller treats it as a load failure.
    pub fn spawn_gltf_scene(
        &mut self,
        wrapper_name: impl Into<String>,
        buffers: Buffers,
        scene: &gltf::Scene,
    ) -> anyhow::Result<ObjectId> {
        let wrapper_id = self.add_object(Object3D {
            name: wrapper_name.into(),
            ..Object3D::default()
        });

        for node in scene.nodes() {
            self.spawn_gltf_node(buffers, &node, Some(wrapper_id))?;
        }

        Ok(wrapper_id)
    }

    fn spawn_gltf_node(
        &mut self,
        buffers: Buffers,
        node: &gltf::Node,
        parent: Option<ObjectId>,
    ) -> anyhow::Result<ObjectId> {
        let mut object = Object3D::default();
        let node_name = node.name().unwrap_or("Unnamed").to_string();
        object.name = node_name.clone();
        object.node_index = Some(node.index());

        let (translation, rotation, scale) = node.transform().decomposed();
        object.transform.set_transform(
            translation.into(),
            Quat::from_array(rotation),
            Vec3::from_array(scale),
        );

        if let Some(mesh) = node.mesh() {
            let mesh_index = mesh.index();

            let mesh_id = match self.gltf_mesh_to_model.get(&mesh_index).copied() {
                Some(mesh_id) => mesh_id,
                None => {
                    let mesh_name = mesh
                        .name()
                        .map(String::from)
                        .unwrap_or_else(|| format!("{} (Mesh)", node_name));

                    let model = Model::from_gltf(mesh_name, mesh, buffers)?;
                    let mesh_id = self.add_model(SceneModel::new(model));
                    self.gltf_mesh_to_model.insert(mesh_index, mesh_id);

                    mesh_id
                }
            };

            object.model_id = Some(mesh_id);
        }

        let object_id = self.add_object(object);

        if let Some(parent_id) = parent {
            self.set_object_parent(object_id, Some(parent_id));
        }

        for child in node.children() {
            self.spawn_gltf_node(buffers, &child, Some(object_id))?;
        }

        Ok(object_id)
    }

    /// Updates all object world transforms in hierarchical order.
    pub fn update_world_transforms(&self) {
        let root_objects = self.objects.iter().filter_map(|(id, object)| {
            if object.parent_id.is_none() {
                Some(id)
            } else {
                None
            }
        });

        for root_id in root_objects {
            self.update_object_transform_recursive(root_id, Mat4::IDENTITY);
        }
    }

    fn update_object_transform_recursive(&self, object_id: ObjectId, parent_world_matrix: Mat4) {
        if let Some(object) = self.objects.get(object_id) {
            if object.transform.is_world_dirty() {
                let local_matrix = *object.transform.get_local_matrix();
                let world_matrix = parent_world_matrix * local_matrix;
                object.transform.set_world_matrix(world_matrix);
            }

            let world_matrix = *object.transform.get_world_matrix();
            for &child_id in &object.child_ids {
                self.update_object_transform_recursive(child_id, world_matrix);
            }
        }
    }

    /// Invalidates world transforms for an object and all its descendants.
    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        if let Some(object) = self.objects.get(object_id) {
            object.transform.invalidate_world();

            for &child_id in &object.child_ids {
                self.invalidate_object_hierarchy(child_id);
            }
        }
    }

    /// Sets the parent of an object and updates child relationships.
    pub fn set_object_parent(&mut self, child_id: ObjectId, new_parent_id: Option<ObjectId>) {
        if let Some(child) = self.objects.get(child_id) {
            if let Some(old_parent_id) = child.parent_id {
                if let Some(old_parent) = self.objects.get_mut(old_parent_id) {
                    old_parent.child_ids.retain(|&id| id != child_id);
                }
            }
        }

        if let Some(child) = self.objects.get_mut(child_id) {
            child.parent_id = new_parent_id;

            if let Some(new_parent_id) = new_parent_id {
                if let Some(new_parent) = self.objects.get_mut(new_parent_id) {
                    new_parent.child_ids.push(child_id);
                }
            }
        }

        self.invalidate_object_hierarchy(child_id);
    }

    pub fn set_object_transform(
        &mut self,
        object_id: ObjectId,
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_transform(translation, rotation, scale);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn translate_object(&mut self, object_id: ObjectId, delta: Vec3) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.translate(delta);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn set_object_scale(&mut self, object_id: ObjectId, scale: Vec3) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_scale(scale);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    /// Pre-order traversal of a subtree, handing each object to the
    /// visitor. The visitor decides what to do with a node; the traversal
    /// knows nothing about meshes or rendering flags.
    pub fn visit_hierarchy(&mut self, root: ObjectId, visit: &mut dyn FnMut(&mut Object3D)) {
        let child_ids = match self.objects.get_mut(root) {
            Some(object) => {
                visit(object);
                object.child_ids.clone()
            }
            None => return,
        };

        for child_id in child_ids {
            self.visit_hierarchy(child_id, visit);
        }
    }

    /// Maps glTF node indices to the objects spawned from them, for the
    /// subtree under `root`.
    pub fn collect_node_bindings(&self, root: ObjectId) -> HashMap<usize, ObjectId> {
        let mut bindings = HashMap::new();
        self.collect_node_bindings_recursive(root, &mut bindings);
        bindings
    }

    fn collect_node_bindings_recursive(
        &self,
        object_id: ObjectId,
        bindings: &mut HashMap<usize, ObjectId>,
    ) {
        if let Some(object) = self.objects.get(object_id) {
            if let Some(node_index) = object.node_index {
                bindings.insert(node_index, object_id);
            }

            for &child_id in &object.child_ids {
                self.collect_node_bindings_recursive(child_id, bindings);
            }
        }
    }

    /// World-space bounds of all geometry under (and including) `root`.
    /// Freshly computed from current transforms; `None` if the subtree
    /// carries no geometry.
    pub fn compute_world_bounds(&self, root: ObjectId) -> Option<Aabb> {
        self.update_world_transforms();
        self.subtree_bounds(root)
    }

    fn subtree_bounds(&self, object_id: ObjectId) -> Option<Aabb> {
        let object = self.objects.get(object_id)?;

        let mut bounds = object.model_id.and_then(|model_id| {
            let model = &self.models.get(model_id)?.model;
            let world_matrix = *object.transform.get_world_matrix();
            model.bounds().map(|aabb| aabb.transform(&world_matrix))
        });

        for &child_id in &object.child_ids {
            bounds = match (bounds, self.subtree_bounds(child_id)) {
                (Some(a), Some(b)) => Some(a.union(&b)),
                (a, b) => a.or(b),
            };
        }

        bounds
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::Model;
    use approx::assert_relative_eq;

    fn scene_with_box(size: f32, center: Vec3) -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let model = test_box(size, center);
        let root = scene.spawn_model(model, false);
        (scene, root)
    }

    /// A cube of the given size centered on `center`, as raw vertices.
    pub(crate) fn test_box(size: f32, center: Vec3) -> Model {
        let half = Vec3::splat(size * 0.5);
        let aabb = Aabb::new(center - half, center + half);

        box_from_bounds(aabb)
    }

    pub(crate) fn box_from_bounds(aabb: Aabb) -> Model {
        use crate::model::{ModelPrimitive, PrimitiveStyle, Vertex};

        let vertices = aabb
            .corners()
            .map(|position| Vertex {
                position,
                normal: Vec3::Y,
                color: [1.0; 4],
            })
            .to_vec();

        Model {
            name: "Box".to_string(),
            primitives: vec![ModelPrimitive {
                index: 0,
                style: PrimitiveStyle::Lit,
                vertices,
                indices: (0..8).collect(),
            }],
        }
    }

    #[test]
    fn world_bounds_follow_object_transform() {
        let (mut scene, root) = scene_with_box(2.0, Vec3::ZERO);
        scene.translate_object(root, Vec3::new(10.0, 5.0, 0.0));

        let bounds = scene.compute_world_bounds(root).unwrap();
        assert_relative_eq!(bounds.center().x, 10.0);
        assert_relative_eq!(bounds.center().y, 5.0);
        assert_relative_eq!(bounds.max_dimension(), 2.0);
    }

    #[test]
    fn world_bounds_compose_parent_and_child() {
        let mut scene = Scene::new();
        let parent = scene.add_object(Object3D::default());
        let child = scene.spawn_model(test_box(2.0, Vec3::ZERO), false);
        scene.set_object_parent(child, Some(parent));

        scene.set_object_scale(parent, Vec3::splat(3.0));
        scene.translate_object(child, Vec3::X);

        let bounds = scene.compute_world_bounds(parent).unwrap();
        // Child translation happens inside the scaled parent frame.
        assert_relative_eq!(bounds.center().x, 3.0);
        assert_relative_eq!(bounds.max_dimension(), 6.0);
    }

    #[test]
    fn world_bounds_of_empty_subtree() {
        let mut scene = Scene::new();
        let root = scene.add_object(Object3D::default());
        assert!(scene.compute_world_bounds(root).is_none());
    }

    /// A glTF-binary asset whose single mesh has a POSITION attribute but
    /// no normals. `gltf::import_slice` accepts it; the mesh decoder must
    /// not.
    fn positions_only_glb() -> Vec<u8> {
        let mut json = br#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":36}],"bufferViews":[{"buffer":0,"byteOffset":0,"byteLength":36}],"accessors":[{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,1,0]}],"meshes":[{"primitives":[{"attributes":{"POSITION":0}}]}],"nodes":[{"mesh":0}],"scenes":[{"nodes":[0]}],"scene":0}"#.to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let bin = [0u8; 36];

        let total = (12 + 8 + json.len() + 8 + bin.len()) as u32;
        let mut glb = Vec::new();
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&total.to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    #[test]
    fn undecodable_mesh_fails_the_spawn() {
        let glb = positions_only_glb();
        let (document, buffers, _images) =
            gltf::import_slice(&glb).expect("container itself is valid");
        let gltf_scene = document.scenes().next().unwrap();

        let mut scene = Scene::new();
        let result = scene.spawn_gltf_scene("Asset", &buffers, &gltf_scene);

        let error = result.unwrap_err();
        assert!(error.to_string().contains("normals"), "got: {:#}", error);
    }

    #[test]
    fn visit_hierarchy_reaches_all_descendants() {
        let mut scene = Scene::new();
        let root = scene.add_object(Object3D::default());
        let child = scene.add_object(Object3D::default());
        let grandchild = scene.add_object(Object3D::default());
        scene.set_object_parent(child, Some(root));
        scene.set_object_parent(grandchild, Some(child));

        let mut visited = 0;
        scene.visit_hierarchy(root, &mut |object| {
            object.cast_shadow = true;
            visited += 1;
        });

        assert_eq!(visited, 3);
        assert!(scene.get_object(grandchild).unwrap().cast_shadow);
    }
}
