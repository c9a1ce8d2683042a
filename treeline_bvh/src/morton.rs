// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! 30-bit Morton (Z-order) keys for box centroids.
//!
//! Each axis contributes 10 bits, interleaved x-y-z. Centroids are
//! normalized against the scene box first, so keys preserve spatial
//! locality regardless of the input's absolute coordinates.

use crate::types::Aabb3;

/// Spread the low 10 bits of `v` so consecutive bits land 3 apart.
const fn expand_bits(v: u32) -> u32 {
    let mut v = v & 0x0000_03ff;
    v = (v | (v << 16)) & 0x0300_00ff;
    v = (v | (v << 8)) & 0x0300_f00f;
    v = (v | (v << 4)) & 0x030c_30c3;
    v = (v | (v << 2)) & 0x0924_9249;
    v
}

/// Interleave three coordinates in [0, 1] into a 30-bit Morton key.
fn morton3(x: f32, y: f32, z: f32) -> u32 {
    let quantize = |v: f32| -> u32 {
        let v = (v * 1024.0).clamp(0.0, 1023.0);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "clamped to [0, 1023] above"
        )]
        let q = v as u32;
        q
    };
    (expand_bits(quantize(x)) << 2) | (expand_bits(quantize(y)) << 1) | expand_bits(quantize(z))
}

/// Morton key of a box's centroid, normalized against the scene box.
///
/// Degenerate scene extents (all centroids on one plane) map to the
/// middle of the axis so the key stays well defined.
pub(crate) fn morton_key(bounds: &Aabb3, scene: &Aabb3) -> u32 {
    let c = bounds.centroid();
    let s_min = scene.min;
    let s_max = scene.max;
    let normalize = |v: f32, lo: f32, hi: f32| -> f32 {
        let extent = hi - lo;
        if extent > 0.0 { (v - lo) / extent } else { 0.5 }
    };
    morton3(
        normalize(c.x, s_min.x, s_max.x),
        normalize(c.y, s_min.y, s_max.y),
        normalize(c.z, s_min.z, s_max.z),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point3;

    #[test]
    fn expand_bits_spreads_every_third_bit() {
        assert_eq!(expand_bits(0b1), 0b1);
        assert_eq!(expand_bits(0b11), 0b1001);
        assert_eq!(expand_bits(0x3ff), 0x0924_9249);
    }

    #[test]
    fn morton_orders_along_an_axis() {
        // Centroids strictly increasing along x must produce increasing keys
        // when y and z are fixed.
        let k0 = morton3(0.1, 0.5, 0.5);
        let k1 = morton3(0.4, 0.5, 0.5);
        let k2 = morton3(0.9, 0.5, 0.5);
        assert!(k0 < k1, "key must grow with x");
        assert!(k1 < k2, "key must grow with x");
    }

    #[test]
    fn degenerate_scene_extent_is_well_defined() {
        // All centroids share a plane: the key must still be computable
        // and identical for identical centroids.
        let scene = Aabb3::from_corners(0.0, 0.0, 5.0, 10.0, 10.0, 5.0);
        let a = Aabb3::from_point(Point3::new(1.0, 1.0, 5.0));
        let b = Aabb3::from_point(Point3::new(1.0, 1.0, 5.0));
        assert_eq!(morton_key(&a, &scene), morton_key(&b, &scene));
    }

    #[test]
    fn keys_fit_in_30_bits() {
        assert!(morton3(1.0, 1.0, 1.0) < (1 << 30), "key must fit in 30 bits");
    }
}
