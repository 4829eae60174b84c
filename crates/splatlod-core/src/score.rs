//! Per-splat importance scoring
//!
//! Scores decide which splats survive a pruning step. The default scorer is a
//! viewpoint-independent proxy; a multi-view contribution estimate can be
//! plugged in through [`ImportanceScorer`].

use crate::PrimitiveSet;
use glam::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Falloff of the distance term in [`OriginDistanceScorer`]
pub const DISTANCE_FALLOFF: f32 = 0.1;

/// Computes one importance value per splat.
///
/// Implementations must return exactly `set.count` scores, index-aligned with
/// the set. Higher means more important.
pub trait ImportanceScorer: Send + Sync {
    fn score(&self, set: &PrimitiveSet) -> Vec<f32>;
}

/// `opacity * exp(-0.1 * |center|)`, with the scene origin at (0, 0, 0).
///
/// Opaque splats close to the origin of the normalized scene are kept
/// preferentially.
#[derive(Clone, Copy, Debug, Default)]
pub struct OriginDistanceScorer;

impl OriginDistanceScorer {
    #[inline]
    fn score_one(center: Vec3, opacity: f32) -> f32 {
        opacity * (-center.length() * DISTANCE_FALLOFF).exp()
    }
}

impl ImportanceScorer for OriginDistanceScorer {
    fn score(&self, set: &PrimitiveSet) -> Vec<f32> {
        #[cfg(feature = "parallel")]
        let scores = set
            .centers
            .par_iter()
            .zip(set.opacities.par_iter())
            .map(|(&c, &o)| Self::score_one(c, o))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let scores = set
            .centers
            .iter()
            .zip(&set.opacities)
            .map(|(&c, &o)| Self::score_one(c, o))
            .collect();

        scores
    }
}
