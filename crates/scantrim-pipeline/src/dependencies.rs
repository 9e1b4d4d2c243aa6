//! Dependency key for cached content boxes.
//!
//! A [`Dependencies`] value captures exactly the upstream state the
//! content box depends on: the working-area polygon. A cached box is
//! valid only while its stored key [`matches`](Dependencies::matches)
//! the key derived from the current upstream state.

use std::hash::Hasher;

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::transform::ImageTransform;
use crate::types::Point;

/// Immutable fingerprint of everything a content box depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependencies {
    rotated_page_outline: Vec<Point>,
}

impl Dependencies {
    /// Tolerance used by [`matches`](Self::matches): exact comparison.
    pub const EXACT: f64 = 0.0;

    /// Build a key directly from a working-area polygon.
    #[must_use]
    pub const fn new(rotated_page_outline: Vec<Point>) -> Self {
        Self {
            rotated_page_outline,
        }
    }

    /// Derive the key from the current upstream transform.
    #[must_use]
    pub fn from_transform(xform: &ImageTransform) -> Self {
        Self::new(xform.resulting_crop_area())
    }

    /// The working-area polygon this key was built from.
    #[must_use]
    pub fn rotated_page_outline(&self) -> &[Point] {
        &self.rotated_page_outline
    }

    /// Exact structural equality.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.matches_within(other, Self::EXACT)
    }

    /// Vertex-by-vertex comparison with an absolute `tolerance` in
    /// pixels. Polygons with different vertex counts never match.
    #[must_use]
    pub fn matches_within(&self, other: &Self, tolerance: f64) -> bool {
        self.rotated_page_outline.len() == other.rotated_page_outline.len()
            && self
                .rotated_page_outline
                .iter()
                .zip(&other.rotated_page_outline)
                .all(|(a, b)| (a.x - b.x).abs() <= tolerance && (a.y - b.y).abs() <= tolerance)
    }

    /// Stable 64-bit SipHash-1-3 fingerprint of the polygon.
    ///
    /// Used for compact logging and diagnostics only; cache validity is
    /// always decided by [`matches_within`](Self::matches_within).
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = SipHasher13::new();
        hasher.write_usize(self.rotated_page_outline.len());
        for p in &self.rotated_page_outline {
            hasher.write_u64(p.x.to_bits());
            hasher.write_u64(p.y.to_bits());
        }
        hasher.finish()
    }
}
