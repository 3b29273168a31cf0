//! Mesh splitting
//!
//! Receivers often cap the number of vertices per draw (65535 for 16-bit
//! index buffers). The splitter partitions a mesh into [`SplitData`] chunks
//! under that cap without ever breaking a submesh across chunks.
//!
//! Splits are filled greedily in submesh order. A submesh whose unique
//! vertices do not fit in the current split starts a new one, and a
//! submesh larger than the cap gets a split of its own. When more than one
//! split is produced, the vertex channels are re-laid out so that each split
//! owns a contiguous vertex range; vertices shared across a split boundary
//! are duplicated and unreferenced vertices go to the last split.

use std::collections::{HashMap, HashSet};

use crate::mesh::{Bounds, MeshData, SplitData, SubmeshData, Topology};

/// Split unit for receivers without a vertex limit
pub const UNBOUNDED_SPLIT_UNIT: u32 = u32::MAX;

#[derive(Default)]
struct SplitBuilder {
    /// Local vertex -> source vertex
    vertex_map: Vec<u32>,
    local: HashMap<u32, u32>,
    submeshes: Vec<SubmeshData>,
}

impl SplitBuilder {
    fn is_empty(&self) -> bool {
        self.vertex_map.is_empty() && self.submeshes.is_empty()
    }

    /// Vertices of `submesh` this split does not hold yet
    fn new_vertices(&self, submesh: &SubmeshData) -> usize {
        submesh
            .indices
            .iter()
            .filter(|&&i| !self.local.contains_key(&i))
            .collect::<HashSet<_>>()
            .len()
    }

    fn add(&mut self, submesh: &SubmeshData) {
        let indices = submesh
            .indices
            .iter()
            .map(|&src| {
                *self.local.entry(src).or_insert_with(|| {
                    self.vertex_map.push(src);
                    (self.vertex_map.len() - 1) as u32
                })
            })
            .collect();
        self.submeshes.push(SubmeshData {
            topology: submesh.topology,
            material_id: submesh.material_id,
            indices,
        });
    }
}

/// Submeshes the splitter walks; a bare index buffer counts as one
/// triangle submesh. Submeshes indexing past the vertex buffer are dropped.
fn source_submeshes(mesh: &MeshData) -> Vec<SubmeshData> {
    let submeshes = if mesh.submeshes.is_empty() && !mesh.indices.is_empty() {
        vec![SubmeshData::new(Topology::Triangles, 0, mesh.indices.clone())]
    } else {
        mesh.submeshes.clone()
    };

    let num_points = mesh.num_points() as u32;
    submeshes
        .into_iter()
        .enumerate()
        .filter(|(i, sm)| {
            let valid = sm.indices.iter().all(|&idx| idx < num_points);
            if !valid {
                log::warn!(
                    "Mesh {}: submesh {} indexes past {} points, dropped",
                    mesh.transform.path,
                    i,
                    num_points
                );
            }
            valid
        })
        .map(|(_, sm)| sm)
        .collect()
}

fn gather<T: Copy>(src: &[T], order: &[u32], expected: usize) -> Vec<T> {
    if src.len() != expected {
        // channel not aligned with points; treated as absent
        return Vec::new();
    }
    order.iter().map(|&i| src[i as usize]).collect()
}

/// Partition `mesh` into splits of at most `unit` vertices.
///
/// Rewrites `mesh.splits` and returns the number of splits produced. The
/// operation is deterministic for identical input.
pub fn split_mesh(mesh: &mut MeshData, unit: u32) -> usize {
    let unit = unit.max(1) as usize;
    let num_points = mesh.num_points();
    let submeshes = source_submeshes(mesh);

    mesh.indices = submeshes.iter().flat_map(|sm| sm.indices.iter().copied()).collect();

    if num_points <= unit {
        mesh.splits = vec![SplitData {
            num_points: num_points as u32,
            num_indices: mesh.indices.len() as u32,
            vertex_offset: 0,
            index_offset: 0,
            bounds: mesh.bounds(),
            submeshes: submeshes.clone(),
            vertex_map: (0..num_points as u32).collect(),
        }];
        mesh.submeshes = submeshes;
        return 1;
    }

    let mut builders: Vec<SplitBuilder> = Vec::new();
    let mut current = SplitBuilder::default();
    for submesh in &submeshes {
        if !current.is_empty() && current.vertex_map.len() + current.new_vertices(submesh) > unit {
            builders.push(std::mem::take(&mut current));
        }
        current.add(submesh);
        if current.vertex_map.len() > unit {
            log::debug!(
                "Mesh {}: submesh with {} vertices exceeds split unit {}",
                mesh.transform.path,
                current.vertex_map.len(),
                unit
            );
            builders.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        builders.push(current);
    }

    let mut used = vec![false; num_points];
    for b in &builders {
        for &v in &b.vertex_map {
            used[v as usize] = true;
        }
    }
    let orphans: Vec<u32> = (0..num_points as u32).filter(|&v| !used[v as usize]).collect();
    if !orphans.is_empty() {
        if builders.is_empty() {
            builders.push(SplitBuilder::default());
        }
        if let Some(last) = builders.last_mut() {
            last.vertex_map.extend_from_slice(&orphans);
        }
    }

    let order: Vec<u32> = builders.iter().flat_map(|b| b.vertex_map.iter().copied()).collect();
    relayout(mesh, &order, num_points);

    let mut splits = Vec::with_capacity(builders.len());
    let mut global_submeshes = Vec::with_capacity(submeshes.len());
    let mut indices = Vec::with_capacity(mesh.indices.len());
    let mut vertex_offset = 0u32;

    for b in builders {
        let count = b.vertex_map.len() as u32;
        let index_offset = indices.len() as u32;
        for sm in &b.submeshes {
            let global: Vec<u32> = sm.indices.iter().map(|&i| i + vertex_offset).collect();
            indices.extend_from_slice(&global);
            global_submeshes.push(SubmeshData::new(sm.topology, sm.material_id, global));
        }
        let range = vertex_offset as usize..(vertex_offset + count) as usize;
        splits.push(SplitData {
            num_points: count,
            num_indices: indices.len() as u32 - index_offset,
            vertex_offset,
            index_offset,
            bounds: Bounds::from_points(&mesh.points[range]),
            submeshes: b.submeshes,
            vertex_map: b.vertex_map,
        });
        vertex_offset += count;
    }

    log::debug!(
        "Mesh {}: {} points split into {} chunks (unit {})",
        mesh.transform.path,
        num_points,
        splits.len(),
        unit
    );

    let produced = splits.len();
    mesh.indices = indices;
    mesh.submeshes = global_submeshes;
    mesh.splits = splits;
    produced
}

/// Reorder every per-vertex channel into `order`
fn relayout(mesh: &mut MeshData, order: &[u32], num_points: usize) {
    mesh.points = gather(&mesh.points, order, num_points);
    mesh.normals = gather(&mesh.normals, order, num_points);
    mesh.tangents = gather(&mesh.tangents, order, num_points);
    mesh.uv0 = gather(&mesh.uv0, order, num_points);
    mesh.uv1 = gather(&mesh.uv1, order, num_points);
    mesh.colors = gather(&mesh.colors, order, num_points);
    mesh.bone_weights = gather(&mesh.bone_weights, order, num_points);
    for shape in &mut mesh.blendshapes {
        for frame in &mut shape.frames {
            frame.points = gather(&frame.points, order, num_points);
            frame.normals = gather(&frame.normals, order, num_points);
            frame.tangents = gather(&frame.tangents, order, num_points);
        }
    }
}
