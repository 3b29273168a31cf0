//! Fixed-width bit flags
//!
//! Bit positions are part of the wire contract and must not be reordered.

use serde::{Deserialize, Serialize};

macro_rules! bit_flags {
    (
        $(#[$meta:meta])*
        $name:ident; $count:literal {
            $($bit:expr => $get:ident, $set:ident;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Number of defined bits
            pub const BIT_COUNT: u32 = $count;
            const MASK: u32 = (1u32 << $count) - 1;

            /// No bits set
            pub const fn empty() -> Self {
                Self(0)
            }

            /// All defined bits set
            pub const fn all() -> Self {
                Self(Self::MASK)
            }

            /// Build from raw bits, dropping undefined ones
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits & Self::MASK)
            }

            #[inline]
            pub const fn bits(&self) -> u32 {
                self.0
            }

            /// Read bit `index`
            #[inline]
            pub fn get(&self, index: u32) -> bool {
                index < Self::BIT_COUNT && self.0 & (1 << index) != 0
            }

            /// Write bit `index`; out-of-range indices are ignored
            #[inline]
            pub fn set(&mut self, index: u32, value: bool) {
                if index >= Self::BIT_COUNT {
                    return;
                }
                if value {
                    self.0 |= 1 << index;
                } else {
                    self.0 &= !(1 << index);
                }
            }

            $(
                #[inline]
                pub fn $get(&self) -> bool {
                    self.get($bit)
                }

                #[inline]
                pub fn $set(&mut self, value: bool) {
                    self.set($bit, value)
                }
            )*
        }
    };
}

bit_flags! {
    /// Channels requested by a Get message
    GetFlags; 11 {
        0 => transform, set_transform;
        1 => points, set_points;
        2 => normals, set_normals;
        3 => tangents, set_tangents;
        4 => uv0, set_uv0;
        5 => uv1, set_uv1;
        6 => colors, set_colors;
        7 => indices, set_indices;
        8 => material_ids, set_material_ids;
        9 => bones, set_bones;
        10 => blendshapes, set_blendshapes;
    }
}

bit_flags! {
    /// Channels populated in a [`MeshData`](crate::MeshData)
    MeshDataFlags; 14 {
        0 => refine_settings, set_refine_settings;
        1 => indices, set_indices;
        2 => counts, set_counts;
        3 => points, set_points;
        4 => normals, set_normals;
        5 => tangents, set_tangents;
        6 => uv0, set_uv0;
        7 => uv1, set_uv1;
        8 => colors, set_colors;
        9 => material_ids, set_material_ids;
        10 => bones, set_bones;
        11 => blendshape_weights, set_blendshape_weights;
        12 => blendshapes, set_blendshapes;
        13 => apply_trs, set_apply_trs;
    }
}

bit_flags! {
    /// Channels populated in a point cache frame
    PointsDataFlags; 6 {
        0 => points, set_points;
        1 => rotations, set_rotations;
        2 => scales, set_scales;
        3 => velocities, set_velocities;
        4 => colors, set_colors;
        5 => ids, set_ids;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_flags_roundtrip_every_bit() {
        for bit in 0..GetFlags::BIT_COUNT {
            let mut flags = GetFlags::empty();
            flags.set(bit, true);
            for other in 0..GetFlags::BIT_COUNT {
                assert_eq!(flags.get(other), other == bit, "bit {} after setting {}", other, bit);
            }
            flags.set(bit, false);
            assert_eq!(flags, GetFlags::empty());
        }
    }

    #[test]
    fn test_mesh_flags_roundtrip_every_bit() {
        for bit in 0..MeshDataFlags::BIT_COUNT {
            let mut flags = MeshDataFlags::empty();
            flags.set(bit, true);
            assert!(flags.get(bit));
            assert_eq!(flags.bits().count_ones(), 1);
        }
    }

    #[test]
    fn test_bit_three_does_not_perturb_neighbours() {
        let mut flags = MeshDataFlags::empty();
        flags.set_points(true);
        assert_eq!(flags.bits(), 1 << 3);
        assert!(!flags.refine_settings());
        assert!(!flags.indices());
        assert!(!flags.counts());
        assert!(!flags.normals());
        assert!(!flags.apply_trs());
    }

    #[test]
    fn test_named_accessors_match_order() {
        let mut get = GetFlags::empty();
        get.set_blendshapes(true);
        assert_eq!(get.bits(), 1 << 10);

        let mut mesh = MeshDataFlags::empty();
        mesh.set_apply_trs(true);
        assert_eq!(mesh.bits(), 1 << 13);

        let mut points = PointsDataFlags::empty();
        points.set_ids(true);
        assert_eq!(points.bits(), 1 << 5);
    }

    #[test]
    fn test_bit_counts_and_masks() {
        assert_eq!(GetFlags::BIT_COUNT, 11);
        assert_eq!(MeshDataFlags::BIT_COUNT, 14);
        assert_eq!(PointsDataFlags::BIT_COUNT, 6);
        assert_eq!(GetFlags::all().bits(), 0x7ff);
        assert_eq!(MeshDataFlags::all().bits(), 0x3fff);
        assert_eq!(PointsDataFlags::all().bits(), 0x3f);
    }

    #[test]
    fn test_out_of_range_bits_ignored() {
        let mut flags = GetFlags::empty();
        flags.set(11, true);
        assert!(!flags.get(11));
        assert_eq!(GetFlags::from_bits(u32::MAX), GetFlags::all());
    }
}
