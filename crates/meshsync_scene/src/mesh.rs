//! Mesh data
//!
//! Buffers are stored as separate per-channel arrays, one element per
//! vertex, with [`MeshDataFlags`] recording which channels carry data.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneError};
use crate::flags::{GetFlags, MeshDataFlags};
use crate::transform::TransformData;

const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

/// Primitive topology of a submesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Topology {
    Points = 0,
    Lines = 1,
    #[default]
    Triangles = 2,
    Quads = 3,
}

impl Topology {
    /// Indices per primitive
    pub fn index_stride(&self) -> usize {
        match self {
            Topology::Points => 1,
            Topology::Lines => 2,
            Topology::Triangles => 3,
            Topology::Quads => 4,
        }
    }
}

/// A run of indices sharing one material and topology
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubmeshData {
    pub topology: Topology,
    pub material_id: i32,
    pub indices: Vec<u32>,
}

impl SubmeshData {
    pub fn new(topology: Topology, material_id: i32, indices: Vec<u32>) -> Self {
        Self { topology, material_id, indices }
    }

    pub fn triangles(material_id: i32, indices: Vec<u32>) -> Self {
        Self::new(Topology::Triangles, material_id, indices)
    }

    #[inline]
    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub center: [f32; 3],
    pub size: [f32; 3],
}

impl Bounds {
    /// Bounds enclosing `points`, zero-sized at the origin when empty
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a [f32; 3]>,
    {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let mut any = false;

        for p in points {
            any = true;
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }

        if !any {
            return Self::default();
        }

        Self {
            center: [
                (min[0] + max[0]) * 0.5,
                (min[1] + max[1]) * 0.5,
                (min[2] + max[2]) * 0.5,
            ],
            size: [max[0] - min[0], max[1] - min[1], max[2] - min[2]],
        }
    }

    pub fn min(&self) -> [f32; 3] {
        [
            self.center[0] - self.size[0] * 0.5,
            self.center[1] - self.size[1] * 0.5,
            self.center[2] - self.size[2] * 0.5,
        ]
    }

    pub fn max(&self) -> [f32; 3] {
        [
            self.center[0] + self.size[0] * 0.5,
            self.center[1] + self.size[1] * 0.5,
            self.center[2] + self.size[2] * 0.5,
        ]
    }
}

/// A budget-bounded chunk of a mesh produced by the splitter.
///
/// Split vertices occupy `vertex_offset..vertex_offset + num_points` of the
/// mesh's vertex channels and the submesh indices are local to that range.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SplitData {
    pub num_points: u32,
    pub num_indices: u32,
    pub vertex_offset: u32,
    pub index_offset: u32,
    pub bounds: Bounds,
    pub submeshes: Vec<SubmeshData>,
    /// Split-local vertex -> vertex index in the source buffers
    pub vertex_map: Vec<u32>,
}

/// Up to four bone influences for one vertex
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoneWeights4 {
    pub weights: [f32; 4],
    pub indices: [i32; 4],
}

/// One target shape of a blendshape, as per-vertex deltas
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlendShapeFrame {
    pub weight: f32,
    pub points: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 3]>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlendShapeData {
    pub name: String,
    pub weight: f32,
    pub frames: Vec<BlendShapeFrame>,
}

/// Full mesh payload of a Set message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub transform: TransformData,
    pub flags: MeshDataFlags,

    pub points: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 4]>,
    pub uv0: Vec<[f32; 2]>,
    pub uv1: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    pub bone_weights: Vec<BoneWeights4>,
    pub indices: Vec<u32>,
    /// Vertices per face
    pub counts: Vec<i32>,
    /// Material per face
    pub material_ids: Vec<i32>,

    pub submeshes: Vec<SubmeshData>,
    pub splits: Vec<SplitData>,

    pub root_bone_path: Option<String>,
    pub bone_paths: Vec<String>,
    pub bindposes: Vec<[f32; 16]>,
    pub blendshapes: Vec<BlendShapeData>,

    pub local_to_world: [f32; 16],
    pub world_to_local: [f32; 16],
}

impl Default for MeshData {
    fn default() -> Self {
        Self {
            transform: TransformData::default(),
            flags: MeshDataFlags::empty(),
            points: Vec::new(),
            normals: Vec::new(),
            tangents: Vec::new(),
            uv0: Vec::new(),
            uv1: Vec::new(),
            colors: Vec::new(),
            bone_weights: Vec::new(),
            indices: Vec::new(),
            counts: Vec::new(),
            material_ids: Vec::new(),
            submeshes: Vec::new(),
            splits: Vec::new(),
            root_bone_path: None,
            bone_paths: Vec::new(),
            bindposes: Vec::new(),
            blendshapes: Vec::new(),
            local_to_world: IDENTITY,
            world_to_local: IDENTITY,
        }
    }
}

impl MeshData {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            transform: TransformData::new(path),
            ..Default::default()
        }
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }

    /// Bone count, zero unless bone paths and bindposes line up
    pub fn num_bones(&self) -> usize {
        if self.has_skeleton() {
            self.bone_paths.len()
        } else {
            0
        }
    }

    pub fn has_skeleton(&self) -> bool {
        !self.bone_paths.is_empty() && self.bone_paths.len() == self.bindposes.len()
    }

    /// Check that bone paths and bindposes are aligned
    pub fn validate_skeleton(&self) -> Result<()> {
        if self.bone_paths.len() != self.bindposes.len() {
            return Err(SceneError::SkeletonMismatch {
                bones: self.bone_paths.len(),
                bindposes: self.bindposes.len(),
            });
        }
        Ok(())
    }

    /// Append a submesh and its indices to the index buffer
    pub fn add_submesh(&mut self, submesh: SubmeshData) {
        self.indices.extend_from_slice(&submesh.indices);
        self.submeshes.push(submesh);
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(&self.points)
    }

    /// Recompute the has-X flags from the populated buffers.
    ///
    /// A skeleton with mismatched bone paths and bindposes is dropped here
    /// rather than rejected.
    pub fn refresh_flags(&mut self) {
        if !self.bone_paths.is_empty() && !self.has_skeleton() {
            log::warn!(
                "Mesh {}: {} bone paths vs {} bindposes, skeleton ignored",
                self.transform.path,
                self.bone_paths.len(),
                self.bindposes.len()
            );
            self.bone_paths.clear();
            self.bindposes.clear();
            self.bone_weights.clear();
            self.root_bone_path = None;
        } else if self.bone_paths.is_empty() && !self.bindposes.is_empty() {
            self.bindposes.clear();
        }

        let flags = &mut self.flags;
        flags.set_points(!self.points.is_empty());
        flags.set_normals(!self.normals.is_empty());
        flags.set_tangents(!self.tangents.is_empty());
        flags.set_uv0(!self.uv0.is_empty());
        flags.set_uv1(!self.uv1.is_empty());
        flags.set_colors(!self.colors.is_empty());
        flags.set_indices(!self.indices.is_empty());
        flags.set_counts(!self.counts.is_empty());
        flags.set_material_ids(!self.material_ids.is_empty());
        flags.set_bones(!self.bone_paths.is_empty());
        flags.set_blendshapes(!self.blendshapes.is_empty());
        flags.set_blendshape_weights(!self.blendshapes.is_empty());
    }

    /// Copy holding only the channels a Get request asked for
    pub fn filtered(&self, request: &GetFlags) -> MeshData {
        let mut mesh = self.clone();
        if !request.points() {
            mesh.points.clear();
        }
        if !request.normals() {
            mesh.normals.clear();
        }
        if !request.tangents() {
            mesh.tangents.clear();
        }
        if !request.uv0() {
            mesh.uv0.clear();
        }
        if !request.uv1() {
            mesh.uv1.clear();
        }
        if !request.colors() {
            mesh.colors.clear();
        }
        if !request.indices() {
            mesh.indices.clear();
            mesh.counts.clear();
            for submesh in &mut mesh.submeshes {
                submesh.indices.clear();
            }
            mesh.splits.clear();
        }
        if !request.material_ids() {
            mesh.material_ids.clear();
        }
        if !request.bones() {
            mesh.bone_weights.clear();
            mesh.bone_paths.clear();
            mesh.bindposes.clear();
            mesh.root_bone_path = None;
        }
        if !request.blendshapes() {
            mesh.blendshapes.clear();
        }
        mesh.refresh_flags();
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_from_points() {
        let points = [[-1.0, 0.0, 2.0], [3.0, 4.0, 2.0]];
        let bounds = Bounds::from_points(&points);
        assert_relative_eq!(bounds.center[0], 1.0);
        assert_relative_eq!(bounds.center[1], 2.0);
        assert_relative_eq!(bounds.size[0], 4.0);
        assert_relative_eq!(bounds.size[2], 0.0);
        assert_relative_eq!(bounds.min()[0], -1.0);
        assert_relative_eq!(bounds.max()[1], 4.0);
    }

    #[test]
    fn test_empty_bounds() {
        let bounds = Bounds::from_points(&[] as &[[f32; 3]]);
        assert_eq!(bounds, Bounds::default());
    }

    #[test]
    fn test_bindposes_without_bones_absent() {
        let mut mesh = MeshData::new("/m");
        mesh.bindposes.push(IDENTITY);
        assert_eq!(mesh.num_bones(), 0);
        mesh.refresh_flags();
        assert!(mesh.bindposes.is_empty());
        assert!(!mesh.flags.bones());
    }

    #[test]
    fn test_skeleton_mismatch() {
        let mut mesh = MeshData::new("/m");
        mesh.bone_paths = vec!["/root/hip".into(), "/root/hip/knee".into()];
        mesh.bindposes = vec![IDENTITY];
        assert!(mesh.validate_skeleton().is_err());
        assert_eq!(mesh.num_bones(), 0);

        mesh.bindposes.push(IDENTITY);
        assert!(mesh.validate_skeleton().is_ok());
        assert_eq!(mesh.num_bones(), 2);
    }

    #[test]
    fn test_filtered_strips_unrequested() {
        let mut mesh = MeshData::new("/m");
        mesh.points = vec![[0.0; 3]; 3];
        mesh.normals = vec![[0.0, 1.0, 0.0]; 3];
        mesh.add_submesh(SubmeshData::triangles(0, vec![0, 1, 2]));
        mesh.refresh_flags();

        let mut request = GetFlags::empty();
        request.set_points(true);
        let filtered = mesh.filtered(&request);
        assert_eq!(filtered.num_points(), 3);
        assert!(filtered.normals.is_empty());
        assert!(filtered.indices.is_empty());
        assert!(filtered.flags.points());
        assert!(!filtered.flags.normals());
    }
}
