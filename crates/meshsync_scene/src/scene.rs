//! Scene snapshots

use serde::{Deserialize, Serialize};

use crate::animation::AnimationClipData;
use crate::constraint::ConstraintData;
use crate::flags::GetFlags;
use crate::material::MaterialData;
use crate::texture::TextureData;
use crate::transform::{Entity, TransformData};

/// Everything carried by a single Set message
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneData {
    pub name: String,
    pub objects: Vec<Entity>,
    pub materials: Vec<MaterialData>,
    pub textures: Vec<TextureData>,
    pub constraints: Vec<ConstraintData>,
    pub animation_clips: Vec<AnimationClipData>,
}

impl SceneData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
            && self.materials.is_empty()
            && self.textures.is_empty()
            && self.constraints.is_empty()
            && self.animation_clips.is_empty()
    }

    pub fn find_object(&self, path: &str) -> Option<&Entity> {
        self.objects.iter().find(|e| e.path() == path)
    }

    pub fn find_material(&self, id: i32) -> Option<&MaterialData> {
        self.materials.iter().find(|m| m.id == id)
    }

    pub fn find_texture(&self, id: i32) -> Option<&TextureData> {
        self.textures.iter().find(|t| t.id == id)
    }

    /// Add or replace the object at the same path
    pub fn upsert_object(&mut self, entity: Entity) {
        match self.objects.iter_mut().find(|e| e.path() == entity.path()) {
            Some(existing) => *existing = entity,
            None => self.objects.push(entity),
        }
    }

    /// Add or replace the material with the same id
    pub fn upsert_material(&mut self, material: MaterialData) {
        match self.materials.iter_mut().find(|m| m.id == material.id) {
            Some(existing) => *existing = material,
            None => self.materials.push(material),
        }
    }

    /// Add or replace the texture with the same id
    pub fn upsert_texture(&mut self, texture: TextureData) {
        match self.textures.iter_mut().find(|t| t.id == texture.id) {
            Some(existing) => *existing = texture,
            None => self.textures.push(texture),
        }
    }

    /// Copy reduced to the channels a Get request asked for
    pub fn filtered(&self, request: &GetFlags) -> SceneData {
        let mut scene = self.clone();
        for entity in &mut scene.objects {
            if let Entity::Mesh(mesh) = entity {
                *mesh = mesh.filtered(request);
            }
            if !request.transform() {
                let t = entity.transform_mut();
                let reset = TransformData::default();
                t.position = reset.position;
                t.rotation = reset.rotation;
                t.scale = reset.scale;
            }
        }
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshData;

    #[test]
    fn test_upsert_replaces_by_path() {
        let mut scene = SceneData::new("test");
        scene.upsert_object(TransformData::new("/a").into());
        scene.upsert_object(TransformData::new("/a").with_position([1.0, 2.0, 3.0]).into());
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.find_object("/a").unwrap().transform().position, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_filtered_without_transform() {
        let mut scene = SceneData::new("test");
        let mut mesh = MeshData::new("/m");
        mesh.transform.position = [5.0, 0.0, 0.0];
        mesh.points = vec![[0.0; 3]];
        scene.upsert_object(mesh.into());

        let mut request = GetFlags::all();
        request.set_transform(false);
        let filtered = scene.filtered(&request);
        let entity = filtered.find_object("/m").unwrap();
        assert_eq!(entity.transform().position, [0.0; 3]);
        assert_eq!(entity.as_mesh().unwrap().num_points(), 1);
    }
}
