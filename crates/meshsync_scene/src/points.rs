//! Instanced point caches

use serde::{Deserialize, Serialize};

use crate::flags::PointsDataFlags;
use crate::mesh::Bounds;
use crate::transform::TransformData;

/// One time sample of a point cache
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointsCacheData {
    pub flags: PointsDataFlags,
    pub time: f32,
    pub bounds: Bounds,
    pub points: Vec<[f32; 3]>,
    pub rotations: Vec<[f32; 4]>,
    pub scales: Vec<[f32; 3]>,
    pub velocities: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub ids: Vec<i32>,
}

impl PointsCacheData {
    pub fn new(time: f32, points: Vec<[f32; 3]>) -> Self {
        let mut data = Self {
            time,
            points,
            ..Default::default()
        };
        data.refresh();
        data
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Recompute flags and bounds from the arrays
    pub fn refresh(&mut self) {
        self.flags.set_points(!self.points.is_empty());
        self.flags.set_rotations(!self.rotations.is_empty());
        self.flags.set_scales(!self.scales.is_empty());
        self.flags.set_velocities(!self.velocities.is_empty());
        self.flags.set_colors(!self.colors.is_empty());
        self.flags.set_ids(!self.ids.is_empty());
        self.bounds = Bounds::from_points(&self.points);
    }
}

/// A point cloud entity; one cache frame per sampled time
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointsData {
    pub transform: TransformData,
    pub data: Vec<PointsCacheData>,
}

impl PointsData {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            transform: TransformData::new(path),
            data: Vec::new(),
        }
    }

    /// Frame whose time is closest at or before `time`
    pub fn frame_at(&self, time: f32) -> Option<&PointsCacheData> {
        self.data
            .iter()
            .filter(|d| d.time <= time)
            .max_by(|a, b| a.time.total_cmp(&b.time))
            .or_else(|| self.data.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_sets_flags() {
        let mut cache = PointsCacheData::new(0.0, vec![[0.0; 3], [2.0, 2.0, 2.0]]);
        assert!(cache.flags.points());
        assert!(!cache.flags.ids());
        assert_eq!(cache.bounds.size, [2.0, 2.0, 2.0]);

        cache.ids = vec![7, 8];
        cache.refresh();
        assert!(cache.flags.ids());
    }

    #[test]
    fn test_frame_at() {
        let mut points = PointsData::new("/particles");
        points.data.push(PointsCacheData::new(0.0, vec![]));
        points.data.push(PointsCacheData::new(1.0, vec![]));
        assert_eq!(points.frame_at(0.5).map(|d| d.time), Some(0.0));
        assert_eq!(points.frame_at(2.0).map(|d| d.time), Some(1.0));
        assert_eq!(points.frame_at(-1.0).map(|d| d.time), Some(0.0));
    }
}
