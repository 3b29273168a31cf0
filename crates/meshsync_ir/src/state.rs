//! Receiver-side scene state
//!
//! Entities are keyed by path and shared through `Arc`, so copying the
//! state when a transaction opens only bumps reference counts.

use std::collections::BTreeMap;
use std::sync::Arc;

use meshsync_scene::{
    split_mesh, AnimationClipData, ConstraintData, Entity, Identifier, MaterialData, SceneData,
    TextureData, INVALID_ID, UNBOUNDED_SPLIT_UNIT,
};

use crate::message::DeleteMessage;
use crate::registry::IdentityRegistry;

/// Counts of what a Set or Delete changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub ignored: usize,
}

#[derive(Debug, Clone)]
pub struct SceneState {
    registry: IdentityRegistry,
    objects: BTreeMap<String, Arc<Entity>>,
    materials: BTreeMap<i32, Arc<MaterialData>>,
    textures: BTreeMap<i32, Arc<TextureData>>,
    constraints: BTreeMap<String, ConstraintData>,
    clips: BTreeMap<String, AnimationClipData>,
    mesh_split_unit: u32,
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new(UNBOUNDED_SPLIT_UNIT)
    }
}

impl SceneState {
    pub fn new(mesh_split_unit: u32) -> Self {
        Self {
            registry: IdentityRegistry::new(),
            objects: BTreeMap::new(),
            materials: BTreeMap::new(),
            textures: BTreeMap::new(),
            constraints: BTreeMap::new(),
            clips: BTreeMap::new(),
            mesh_split_unit,
        }
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn mesh_split_unit(&self) -> u32 {
        self.mesh_split_unit
    }

    /// Merge a Set payload.
    ///
    /// References are only recorded here; call [`settle_references`]
    /// once the batch is complete.
    ///
    /// [`settle_references`]: SceneState::settle_references
    pub fn apply_set(&mut self, scene: &SceneData) -> ApplyStats {
        let mut stats = ApplyStats::default();

        for entity in &scene.objects {
            let path = entity.path();
            if path.is_empty() {
                log::warn!("Set: entity without path ignored");
                stats.ignored += 1;
                continue;
            }

            let (id, created) = self.registry.resolve_or_insert(path);
            let mut entity = entity.clone();
            entity.transform_mut().id = id;
            if let Some(mesh) = entity.as_mesh_mut() {
                split_mesh(mesh, self.mesh_split_unit);
                // splitting drops channels that do not line up with the points
                mesh.refresh_flags();
            }
            if let Some(target) = entity.transform().reference.as_deref() {
                self.registry.defer_reference(path, target);
            }

            if created {
                stats.created += 1;
            } else {
                stats.updated += 1;
            }
            self.objects.insert(path.to_string(), Arc::new(entity));
        }

        for material in &scene.materials {
            if material.id == INVALID_ID {
                log::warn!("Set: material '{}' without id ignored", material.name);
                stats.ignored += 1;
                continue;
            }
            self.materials.insert(material.id, Arc::new(material.clone()));
        }
        for texture in &scene.textures {
            if texture.id == INVALID_ID {
                log::warn!("Set: texture '{}' without id ignored", texture.name);
                stats.ignored += 1;
                continue;
            }
            self.textures.insert(texture.id, Arc::new(texture.clone()));
        }
        for constraint in &scene.constraints {
            self.constraints.insert(constraint.path.clone(), constraint.clone());
        }
        for clip in &scene.animation_clips {
            self.clips.insert(clip.name.clone(), clip.clone());
        }

        log::debug!(
            "Set '{}': {} created, {} updated, {} ignored",
            scene.name,
            stats.created,
            stats.updated,
            stats.ignored
        );
        stats
    }

    /// Resolve references recorded since the last settle; dangling ones
    /// are cleared so the entity behaves as a plain transform
    pub fn settle_references(&mut self) {
        for (owner, target) in self.registry.settle() {
            if target.is_some() {
                continue;
            }
            if let Some(entity) = self.objects.get_mut(&owner) {
                Arc::make_mut(entity).transform_mut().reference = None;
            }
        }
    }

    /// Remove the entities and materials named by a Delete; unknown
    /// identifiers are ignored
    pub fn apply_delete(&mut self, delete: &DeleteMessage) -> ApplyStats {
        let mut stats = ApplyStats::default();

        for ident in &delete.targets {
            match self.registry.find_for_delete(ident) {
                Some(path) => {
                    self.registry.remove_by_path(&path);
                    self.objects.remove(&path);
                    self.constraints.remove(&path);
                    stats.deleted += 1;
                    log::debug!("Deleted {}", path);
                }
                None => {
                    log::debug!("Delete of unknown entity {} ignored", ident);
                    stats.ignored += 1;
                }
            }
        }

        for ident in &delete.materials {
            match self.find_material_for_delete(ident) {
                Some(id) => {
                    self.materials.remove(&id);
                    stats.deleted += 1;
                }
                None => {
                    log::debug!("Delete of unknown material {} ignored", ident);
                    stats.ignored += 1;
                }
            }
        }
        stats
    }

    fn find_material_for_delete(&self, ident: &Identifier) -> Option<i32> {
        if self.materials.contains_key(&ident.id) {
            return Some(ident.id);
        }
        self.materials
            .values()
            .find(|m| m.name == ident.name)
            .map(|m| m.id)
    }

    pub fn get(&self, path: &str) -> Option<&Arc<Entity>> {
        self.objects.get(path)
    }

    pub fn id_of(&self, path: &str) -> Option<i32> {
        self.registry.lookup_path(path)
    }

    /// Entity referenced by the one at `path`.
    ///
    /// `None` when there is no reference or its target has been deleted.
    pub fn resolve_reference(&self, path: &str) -> Option<&Arc<Entity>> {
        let target = self.objects.get(path)?.transform().reference.as_deref()?;
        self.objects.get(target)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.objects.values()
    }

    pub fn material(&self, id: i32) -> Option<&Arc<MaterialData>> {
        self.materials.get(&id)
    }

    pub fn materials(&self) -> impl Iterator<Item = &Arc<MaterialData>> {
        self.materials.values()
    }

    pub fn texture(&self, id: i32) -> Option<&Arc<TextureData>> {
        self.textures.get(&id)
    }

    pub fn constraint(&self, path: &str) -> Option<&ConstraintData> {
        self.constraints.get(path)
    }

    pub fn clip(&self, name: &str) -> Option<&AnimationClipData> {
        self.clips.get(name)
    }

    /// Every entity path, sorted
    pub fn all_nodes(&self) -> Vec<&str> {
        self.objects.keys().map(String::as_str).collect()
    }

    /// Paths whose parent is not itself a synced entity
    pub fn root_nodes(&self) -> Vec<&str> {
        self.objects
            .values()
            .map(|e| e.transform())
            .filter(|t| match t.parent_path() {
                Some(parent) => !self.objects.contains_key(parent),
                None => true,
            })
            .map(|t| t.path.as_str())
            .collect()
    }

    /// Rebuild a SceneData snapshot of the current state
    pub fn to_scene_data(&self, name: impl Into<String>) -> SceneData {
        SceneData {
            name: name.into(),
            objects: self.objects.values().map(|e| (**e).clone()).collect(),
            materials: self.materials.values().map(|m| (**m).clone()).collect(),
            textures: self.textures.values().map(|t| (**t).clone()).collect(),
            constraints: self.constraints.values().cloned().collect(),
            animation_clips: self.clips.values().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsync_scene::{MeshData, SubmeshData, TransformData};

    fn scene_with(paths: &[&str]) -> SceneData {
        let mut scene = SceneData::new("batch");
        for path in paths {
            scene.upsert_object(TransformData::new(*path).into());
        }
        scene
    }

    #[test]
    fn test_set_assigns_stable_ids() {
        let mut state = SceneState::default();
        let stats = state.apply_set(&scene_with(&["/root", "/root/a"]));
        assert_eq!(stats.created, 2);
        let id = state.id_of("/root/a").unwrap();

        let stats = state.apply_set(&scene_with(&["/root/a"]));
        assert_eq!(stats.updated, 1);
        assert_eq!(state.id_of("/root/a"), Some(id));
        assert_eq!(state.get("/root/a").unwrap().id(), id);
    }

    #[test]
    fn test_root_and_all_nodes() {
        let mut state = SceneState::default();
        state.apply_set(&scene_with(&["/root", "/root/a", "/other/b"]));
        assert_eq!(state.all_nodes(), vec!["/other/b", "/root", "/root/a"]);
        assert_eq!(state.root_nodes(), vec!["/other/b", "/root"]);
    }

    #[test]
    fn test_meshes_split_on_set() {
        let mut state = SceneState::new(3);
        let mut mesh = MeshData::new("/m");
        mesh.points = vec![[0.0; 3]; 6];
        mesh.add_submesh(SubmeshData::triangles(0, vec![0, 1, 2]));
        mesh.add_submesh(SubmeshData::triangles(1, vec![3, 4, 5]));
        let mut scene = SceneData::new("s");
        scene.upsert_object(mesh.into());

        state.apply_set(&scene);
        let stored = state.get("/m").unwrap().as_mesh().unwrap();
        assert_eq!(stored.splits.len(), 2);
        assert!(stored.flags.points());
    }

    #[test]
    fn test_flags_follow_split_relayout() {
        let mut state = SceneState::new(3);
        let mut mesh = MeshData::new("/m");
        mesh.points = vec![[0.0; 3]; 6];
        mesh.uv0 = vec![[0.0; 2]; 4];
        mesh.normals = vec![[0.0, 0.0, 1.0]; 6];
        mesh.add_submesh(SubmeshData::triangles(0, vec![0, 1, 2]));
        mesh.add_submesh(SubmeshData::triangles(1, vec![3, 4, 5]));
        let mut scene = SceneData::new("s");
        scene.upsert_object(mesh.into());

        state.apply_set(&scene);
        let stored = state.get("/m").unwrap().as_mesh().unwrap();
        assert_eq!(stored.splits.len(), 2);
        assert!(stored.uv0.is_empty());
        assert!(!stored.flags.uv0());
        assert!(stored.flags.normals());
    }

    #[test]
    fn test_reference_forward_and_dangling() {
        let mut state = SceneState::default();
        let mut scene = SceneData::new("s");
        scene.upsert_object(TransformData::new("/inst").with_reference("/src").into());
        scene.upsert_object(TransformData::new("/src").into());
        scene.upsert_object(TransformData::new("/lost").with_reference("/nowhere").into());
        state.apply_set(&scene);
        state.settle_references();

        assert_eq!(state.resolve_reference("/inst").map(|e| e.path()), Some("/src"));
        assert!(state.get("/lost").unwrap().transform().reference.is_none());

        state.apply_delete(&DeleteMessage {
            targets: vec![Identifier::from_name("/src")],
            materials: vec![],
        });
        assert!(state.resolve_reference("/inst").is_none());
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let mut state = SceneState::default();
        state.apply_set(&scene_with(&["/a"]));
        let stats = state.apply_delete(&DeleteMessage {
            targets: vec![Identifier::new(42, "ghost")],
            materials: vec![Identifier::new(3, "none")],
        });
        assert_eq!(stats.ignored, 2);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_materials_by_id_and_delete_by_name() {
        let mut state = SceneState::default();
        let mut scene = SceneData::new("s");
        scene.upsert_material(MaterialData::new(0, "Steel"));
        scene.upsert_material(MaterialData::new(-1, "NoId"));
        let stats = state.apply_set(&scene);
        assert_eq!(stats.ignored, 1);
        assert!(state.material(0).is_some());

        state.apply_delete(&DeleteMessage {
            targets: vec![],
            materials: vec![Identifier::from_name("Steel")],
        });
        assert!(state.material(0).is_none());
    }
}
