//! Scene entities
//!
//! Every object in a synced scene is a transform node. Cameras, lights,
//! meshes and point caches extend it with their own typed fields; the
//! [`Entity`] enum is the closed set of those kinds.

use serde::{Deserialize, Serialize};

use crate::error::SceneError;
use crate::id::INVALID_ID;
use crate::mesh::MeshData;
use crate::points::PointsData;

/// Kind of scene entity, with stable wire ordinals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityType {
    #[default]
    Unknown = 0,
    Transform = 1,
    Camera = 2,
    Light = 3,
    Mesh = 4,
    Points = 5,
}

impl TryFrom<u8> for EntityType {
    type Error = SceneError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Transform),
            2 => Ok(Self::Camera),
            3 => Ok(Self::Light),
            4 => Ok(Self::Mesh),
            5 => Ok(Self::Points),
            other => Err(SceneError::InvalidEntityType(other)),
        }
    }
}

/// Fields shared by every entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformData {
    /// Session handle, `INVALID_ID` until the receiver assigns one
    pub id: i32,
    /// Sibling order under the parent
    pub index: i32,
    /// '/'-delimited hierarchical path, the stable identity across edits
    pub path: String,
    pub position: [f32; 3],
    /// Quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub visible: bool,
    pub visible_hierarchy: bool,
    /// Path of the entity this one instances
    pub reference: Option<String>,
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            id: INVALID_ID,
            index: 0,
            path: String::new(),
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
            visible: true,
            visible_hierarchy: true,
            reference: None,
        }
    }
}

impl TransformData {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        leaf_name(&self.path)
    }

    /// Parent path, `None` for root nodes
    pub fn parent_path(&self) -> Option<&str> {
        parent_path(&self.path)
    }

    pub fn with_position(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: [f32; 4]) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Last segment of a '/'-delimited path
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Everything before the last '/' of a path, `None` at the root
pub fn parent_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => None,
        Some(pos) => Some(&trimmed[..pos]),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraData {
    pub transform: TransformData,
    pub orthographic: bool,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    /// Physical camera properties (mm)
    pub horizontal_aperture: f32,
    pub vertical_aperture: f32,
    pub focal_length: f32,
    pub focus_distance: f32,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            transform: TransformData::default(),
            orthographic: false,
            fov: 30.0,
            near_plane: 0.3,
            far_plane: 1000.0,
            horizontal_aperture: 36.0,
            vertical_aperture: 24.0,
            focal_length: 50.0,
            focus_distance: 5.0,
        }
    }
}

/// Light kinds, ordered as the receiving engines expect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum LightType {
    Spot = 0,
    #[default]
    Directional = 1,
    Point = 2,
    Area = 3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightData {
    pub transform: TransformData,
    pub light_type: LightType,
    /// Linear RGBA
    pub color: [f32; 4],
    pub intensity: f32,
    pub range: f32,
    /// Cone angle in degrees (spot lights)
    pub spot_angle: f32,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            transform: TransformData::default(),
            light_type: LightType::Directional,
            color: [1.0; 4],
            intensity: 1.0,
            range: 10.0,
            spot_angle: 30.0,
        }
    }
}

/// A scene object of one of the supported kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    Transform(TransformData),
    Camera(CameraData),
    Light(LightData),
    Mesh(MeshData),
    Points(PointsData),
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::Transform(_) => EntityType::Transform,
            Entity::Camera(_) => EntityType::Camera,
            Entity::Light(_) => EntityType::Light,
            Entity::Mesh(_) => EntityType::Mesh,
            Entity::Points(_) => EntityType::Points,
        }
    }

    /// Common transform fields
    pub fn transform(&self) -> &TransformData {
        match self {
            Entity::Transform(t) => t,
            Entity::Camera(c) => &c.transform,
            Entity::Light(l) => &l.transform,
            Entity::Mesh(m) => &m.transform,
            Entity::Points(p) => &p.transform,
        }
    }

    pub fn transform_mut(&mut self) -> &mut TransformData {
        match self {
            Entity::Transform(t) => t,
            Entity::Camera(c) => &mut c.transform,
            Entity::Light(l) => &mut l.transform,
            Entity::Mesh(m) => &mut m.transform,
            Entity::Points(p) => &mut p.transform,
        }
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.transform().path
    }

    #[inline]
    pub fn id(&self) -> i32 {
        self.transform().id
    }

    pub fn as_camera(&self) -> Option<&CameraData> {
        match self {
            Entity::Camera(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&LightData> {
        match self {
            Entity::Light(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&MeshData> {
        match self {
            Entity::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mesh_mut(&mut self) -> Option<&mut MeshData> {
        match self {
            Entity::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_points(&self) -> Option<&PointsData> {
        match self {
            Entity::Points(p) => Some(p),
            _ => None,
        }
    }
}

impl From<TransformData> for Entity {
    fn from(t: TransformData) -> Self {
        Entity::Transform(t)
    }
}

impl From<CameraData> for Entity {
    fn from(c: CameraData) -> Self {
        Entity::Camera(c)
    }
}

impl From<LightData> for Entity {
    fn from(l: LightData) -> Self {
        Entity::Light(l)
    }
}

impl From<MeshData> for Entity {
    fn from(m: MeshData) -> Self {
        Entity::Mesh(m)
    }
}

impl From<PointsData> for Entity {
    fn from(p: PointsData) -> Self {
        Entity::Points(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_helpers() {
        let t = TransformData::new("/root/arm/hand");
        assert_eq!(t.name(), "hand");
        assert_eq!(t.parent_path(), Some("/root/arm"));
        assert_eq!(TransformData::new("/root").parent_path(), None);
    }

    #[test]
    fn test_entity_views() {
        let camera: Entity = CameraData {
            transform: TransformData::new("/cam"),
            ..Default::default()
        }
        .into();
        assert_eq!(camera.entity_type(), EntityType::Camera);
        assert_eq!(camera.path(), "/cam");
        assert!(camera.as_camera().is_some());
        assert!(camera.as_mesh().is_none());
    }

    #[test]
    fn test_entity_type_from_u8() {
        assert_eq!(EntityType::try_from(4).unwrap(), EntityType::Mesh);
        assert!(EntityType::try_from(9).is_err());
    }
}
