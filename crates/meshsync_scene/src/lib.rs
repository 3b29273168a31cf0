//! # MeshSync Scene - Binary Scene Model
//!
//! Value types for everything a DCC tool can push to a receiving engine:
//! transforms, cameras, lights, meshes, point caches, materials, textures,
//! constraints and animation clips.
//!
//! ## Key Concepts
//!
//! - **Entity**: A tagged union over the scene object kinds, keyed by `path`
//! - **SceneData**: The aggregate snapshot carried by a single Set message
//! - **Splitter**: Partitions meshes into receiver-budget-sized chunks
//! - **Curves**: Sparse animation samples turned into keyframed curves

pub mod id;
pub mod flags;
pub mod transform;
pub mod mesh;
pub mod points;
pub mod material;
pub mod texture;
pub mod constraint;
pub mod animation;
pub mod scene;
pub mod split;
pub mod error;

pub use id::{Identifier, INVALID_ID};
pub use flags::{GetFlags, MeshDataFlags, PointsDataFlags};
pub use transform::{
    Entity, EntityType, TransformData, CameraData, LightData, LightType,
};
pub use mesh::{
    MeshData, Topology, SubmeshData, SplitData, Bounds, BlendShapeData, BlendShapeFrame,
    BoneWeights4,
};
pub use points::{PointsData, PointsCacheData};
pub use material::{MaterialData, MaterialProperty, MaterialKeyword, PropertyValue};
pub use texture::{TextureData, TextureType, TextureFormat, ElementType};
pub use constraint::{ConstraintData, ConstraintKind, ConstraintType, ParentOffset};
pub use animation::{
    AnimationClipData, AnimationData, AnimationKind, Channel, Curve, CurveBinding,
    Keyframe, TangentMode, InterpolationType, CurvePostProcess, TransformChannels,
    BlendShapeChannel, CameraChannels,
};
pub use scene::SceneData;
pub use split::{split_mesh, UNBOUNDED_SPLIT_UNIT};
pub use error::{SceneError, Result};
