//! Score-threshold pruning with a guaranteed non-empty fallback
//!
//! Removes splats whose importance falls below a threshold. When a threshold
//! would remove everything, the highest-scoring tenth of the set is kept.
//! Opacity-percentile pruning drops a fixed share of the least opaque splats.

use crate::{LodError, PrimitiveSet, Result};
use log::{debug, warn};
use std::cmp::Ordering;

/// The fallback keeps one splat in this many when no splat reaches the threshold
pub const FALLBACK_DIVISOR: usize = 10;

/// Shares of the least opaque splats removed by [`PrimitiveSet::opacity_prune_variants`]
pub const OPACITY_PRUNE_PERCENTAGES: [u32; 5] = [10, 20, 30, 40, 50];

/// Statistics from a pruning step
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PruneStats {
    /// Number of splats before pruning
    pub original_count: usize,
    /// Number of splats after pruning
    pub final_count: usize,
    /// Threshold the step was run with
    pub threshold: f32,
    /// True when no splat reached the threshold and the top-scoring
    /// fallback was kept instead
    pub used_fallback: bool,
    /// Highest score seen
    pub max_score: f32,
    /// Lowest score seen
    pub min_score: f32,
    /// Mean score
    pub mean_score: f32,
}

/// Number of splats kept by the fallback: `max(1, floor(count * 0.1))`
pub fn fallback_count(count: usize) -> usize {
    (count / FALLBACK_DIVISOR).max(1)
}

impl PrimitiveSet {
    /// Prune splats scoring below `threshold`
    ///
    /// Returns a new set and statistics about the step; `self` is untouched.
    /// Splats scoring exactly `threshold` are kept, in their original order.
    /// If nothing survives, the `fallback_count` highest-scoring splats are
    /// kept in descending score order and `used_fallback` is set.
    ///
    /// Colors are not carried into the pruned set.
    pub fn prune(&self, scores: &[f32], threshold: f32) -> Result<(PrimitiveSet, PruneStats)> {
        if scores.len() != self.count {
            return Err(LodError::InvalidData(format!(
                "got {} scores for {} splats",
                scores.len(),
                self.count
            )));
        }

        let mut stats = PruneStats {
            original_count: self.count,
            threshold,
            ..Default::default()
        };

        stats.record_scores(scores);

        debug!(
            "Importance stats: max={:.6}, min={:.6}, avg={:.6}, tau={:.6}",
            stats.max_score, stats.min_score, stats.mean_score, threshold
        );

        let mut keep_indices: Vec<usize> = scores
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s >= threshold)
            .map(|(i, _)| i)
            .collect();

        if keep_indices.is_empty() && self.count > 0 {
            // Stable sort keeps index order among equal scores
            let mut ranked: Vec<usize> = (0..self.count).collect();
            ranked.sort_by(|&a, &b| descending_nan_last(scores[a], scores[b]));
            ranked.truncate(fallback_count(self.count));

            warn!(
                "No splat reached threshold {:.6}; keeping top {} of {} by importance",
                threshold,
                ranked.len(),
                self.count
            );

            keep_indices = ranked;
            stats.used_fallback = true;
        }

        let pruned = self.select(&keep_indices);
        stats.final_count = pruned.count;

        debug!(
            "Pruning: {} -> {} splats ({:.1}%)",
            stats.original_count,
            stats.final_count,
            percent(stats.final_count, stats.original_count)
        );

        Ok((pruned, stats))
    }

    /// Remove the least opaque `percent` of the splats
    ///
    /// `count * percent / 100` splats (rounded down) with the lowest opacity
    /// are dropped; survivors keep their original order. NaN opacities rank
    /// lowest. A non-empty set always keeps at least one splat, so 100
    /// keeps only the most opaque. `stats.threshold` is the lowest surviving
    /// opacity.
    pub fn prune_by_opacity_percent(&self, percent: u32) -> Result<(PrimitiveSet, PruneStats)> {
        if percent > 100 {
            return Err(LodError::InvalidConfiguration(format!(
                "cannot prune {}% of a scene",
                percent
            )));
        }
        self.validate()?;

        let mut stats = PruneStats {
            original_count: self.count,
            ..Default::default()
        };
        stats.record_scores(&self.opacities);

        let remove = (self.count * percent as usize / 100).min(self.count.saturating_sub(1));

        let mut ranked: Vec<usize> = (0..self.count).collect();
        ranked.sort_by(|&a, &b| descending_nan_last(self.opacities[b], self.opacities[a]));

        let mut keep_indices = ranked.split_off(remove);
        stats.threshold = keep_indices
            .first()
            .map_or(0.0, |&i| self.opacities[i]);
        keep_indices.sort_unstable();

        let pruned = self.select(&keep_indices);
        stats.final_count = pruned.count;

        debug!(
            "Opacity pruning {}%: {} -> {} splats (min kept opacity {:.6})",
            percent, stats.original_count, stats.final_count, stats.threshold
        );

        Ok((pruned, stats))
    }

    /// One opacity-pruned variant per entry of [`OPACITY_PRUNE_PERCENTAGES`]
    pub fn opacity_prune_variants(&self) -> Result<Vec<(u32, PrimitiveSet, PruneStats)>> {
        OPACITY_PRUNE_PERCENTAGES
            .iter()
            .map(|&pct| {
                let (set, stats) = self.prune_by_opacity_percent(pct)?;
                Ok((pct, set, stats))
            })
            .collect()
    }

    /// Compact the set down to `indices`, in the given order, without colors
    fn select(&self, indices: &[usize]) -> PrimitiveSet {
        let mut selected = PrimitiveSet::with_capacity(indices.len());
        for &i in indices {
            selected.centers.push(self.centers[i]);
            selected.covariances.push(self.covariances[i]);
            selected.opacities.push(self.opacities[i]);
        }
        selected.count = indices.len();
        selected
    }
}

impl PruneStats {
    fn record_scores(&mut self, scores: &[f32]) {
        if scores.is_empty() {
            return;
        }
        self.max_score = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        self.min_score = scores.iter().copied().fold(f32::INFINITY, f32::min);
        self.mean_score = scores.iter().sum::<f32>() / scores.len() as f32;
    }
}

/// Highest first; NaN after every number
fn descending_nan_last(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

fn percent(part: usize, whole: usize) -> f32 {
    if whole == 0 {
        0.0
    } else {
        part as f32 / whole as f32 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{ImportanceScorer, OriginDistanceScorer};
    use glam::Vec3;

    /// Helper to create a test set where splat `i` sits at x = i
    fn make_test_set(count: usize) -> PrimitiveSet {
        let mut set = PrimitiveSet::with_capacity(count);
        for i in 0..count {
            let v = i as f32;
            set.centers.push(Vec3::new(v, 0.0, 0.0));
            set.covariances.push([v, 0.0, 0.0, v, 0.0, v]);
            set.colors.push([1, 2, 3, 255]);
            set.opacities.push(1.0);
        }
        set.count = count;
        set
    }

    // ==================== Threshold Tests ====================

    #[test]
    fn test_prune_keeps_scores_at_or_above_threshold() {
        let set = make_test_set(5);
        let scores = [0.1, 0.5, 0.49, 0.9, 0.5];

        let (pruned, stats) = set.prune(&scores, 0.5).unwrap();

        assert_eq!(stats.original_count, 5);
        assert_eq!(stats.final_count, 3);
        assert!(!stats.used_fallback);
        // Original relative order preserved
        let xs: Vec<f32> = pruned.centers.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_prune_does_not_mutate_input() {
        let set = make_test_set(4);
        let before = set.clone();

        let _ = set.prune(&[0.0, 1.0, 0.0, 1.0], 0.5).unwrap();

        assert_eq!(set, before);
    }

    #[test]
    fn test_prune_keeps_attributes_aligned() {
        let set = make_test_set(6);
        let scores = [0.9, 0.0, 0.9, 0.0, 0.9, 0.0];

        let (pruned, _) = set.prune(&scores, 0.5).unwrap();

        assert!(pruned.validate().is_ok());
        assert_eq!(pruned.flat_centers().len(), 3 * pruned.count);
        assert_eq!(pruned.flat_covariances().len(), 6 * pruned.count);
        assert_eq!(pruned.opacities.len(), pruned.count);
        for (c, cov) in pruned.centers.iter().zip(&pruned.covariances) {
            assert_eq!(c.x, cov[0]);
        }
    }

    #[test]
    fn test_prune_drops_colors() {
        let set = make_test_set(3);

        let (pruned, _) = set.prune(&[1.0, 1.0, 1.0], 0.5).unwrap();

        assert_eq!(pruned.count, 3);
        assert!(pruned.colors.is_empty());
    }

    #[test]
    fn test_prune_score_statistics() {
        let set = make_test_set(4);

        let (_, stats) = set.prune(&[0.2, 0.4, 0.6, 0.8], 0.5).unwrap();

        assert_eq!(stats.max_score, 0.8);
        assert_eq!(stats.min_score, 0.2);
        assert!((stats.mean_score - 0.5).abs() < 1e-6);
        assert_eq!(stats.threshold, 0.5);
    }

    // ==================== Fallback Tests ====================

    #[test]
    fn test_fallback_keeps_top_tenth_in_ranked_order() {
        let set = make_test_set(20);
        // All below threshold; splat i scores i / 100
        let scores: Vec<f32> = (0..20).map(|i| i as f32 / 100.0).collect();

        let (pruned, stats) = set.prune(&scores, 1.0).unwrap();

        assert!(stats.used_fallback);
        assert_eq!(pruned.count, 2);
        assert_eq!(pruned.centers[0].x, 19.0);
        assert_eq!(pruned.centers[1].x, 18.0);
    }

    #[test]
    fn test_fallback_keeps_at_least_one() {
        let set = make_test_set(7);
        let scores = [0.1, 0.3, 0.2, 0.0, 0.0, 0.05, 0.01];

        let (pruned, stats) = set.prune(&scores, 0.5).unwrap();

        assert!(stats.used_fallback);
        assert_eq!(pruned.count, 1);
        assert_eq!(pruned.centers[0].x, 1.0);
    }

    #[test]
    fn test_fallback_count_floor() {
        assert_eq!(fallback_count(1), 1);
        assert_eq!(fallback_count(9), 1);
        assert_eq!(fallback_count(10), 1);
        assert_eq!(fallback_count(19), 1);
        assert_eq!(fallback_count(20), 2);
        assert_eq!(fallback_count(1000), 100);
    }

    #[test]
    fn test_uniform_scene_threshold_scenario() {
        let mut set = make_test_set(1000);
        set.centers.iter_mut().for_each(|c| *c = Vec3::ZERO);
        let scores = OriginDistanceScorer.score(&set);

        let (kept, stats) = set.prune(&scores, 0.5).unwrap();
        assert_eq!(kept.count, 1000);
        assert!(!stats.used_fallback);

        let (fallback, stats) = set.prune(&scores, 1.5).unwrap();
        assert_eq!(fallback.count, 100);
        assert!(stats.used_fallback);
    }

    #[test]
    fn test_fallback_ranks_nan_scores_last() {
        let set = make_test_set(10);
        let mut scores = vec![0.1; 10];
        scores[3] = f32::NAN;
        scores[7] = 0.4;

        let (pruned, stats) = set.prune(&scores, 1.0).unwrap();

        assert!(stats.used_fallback);
        assert_eq!(pruned.count, 1);
        assert_eq!(pruned.centers[0].x, 7.0);
    }

    // ==================== Opacity Percentile Tests ====================

    /// Splat `i` sits at x = i with opacity from `opacities[i]`
    fn make_opacity_set(opacities: &[f32]) -> PrimitiveSet {
        let mut set = make_test_set(opacities.len());
        set.opacities = opacities.to_vec();
        set
    }

    #[test]
    fn test_opacity_percent_removal_counts() {
        let opacities: Vec<f32> = (0..25).map(|i| ((i * 7) % 25) as f32 / 25.0).collect();
        let set = make_opacity_set(&opacities);

        let variants = set.opacity_prune_variants().unwrap();

        let counts: Vec<(u32, usize)> = variants.iter().map(|(p, s, _)| (*p, s.count)).collect();
        // 25 * pct / 100 rounded down is removed
        assert_eq!(counts, vec![(10, 23), (20, 20), (30, 18), (40, 15), (50, 13)]);
        for (_, pruned, stats) in &variants {
            assert!(pruned.validate().is_ok());
            assert_eq!(stats.original_count, 25);
            assert_eq!(stats.final_count, pruned.count);
            assert!(!stats.used_fallback);
        }
    }

    #[test]
    fn test_opacity_percent_keeps_most_opaque_in_order() {
        let set = make_opacity_set(&[0.9, 0.1, 0.5, 0.3, 0.7, 0.2, 0.8, 0.4, 0.6, 0.05]);

        let (pruned, stats) = set.prune_by_opacity_percent(50).unwrap();

        let xs: Vec<f32> = pruned.centers.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(pruned.opacities, vec![0.9, 0.5, 0.7, 0.8, 0.6]);
        assert_eq!(stats.threshold, 0.5);
        assert_eq!(stats.min_score, 0.05);
        assert_eq!(stats.max_score, 0.9);
    }

    #[test]
    fn test_opacity_percent_removes_nan_first() {
        let set = make_opacity_set(&[0.2, f32::NAN, 0.9, 0.1]);

        let (pruned, _) = set.prune_by_opacity_percent(50).unwrap();

        let xs: Vec<f32> = pruned.centers.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![0.0, 2.0]);
    }

    #[test]
    fn test_opacity_percent_bounds() {
        let set = make_opacity_set(&[0.3, 0.6, 0.1]);

        let (kept, _) = set.prune_by_opacity_percent(0).unwrap();
        assert_eq!(kept.count, 3);

        let (last, _) = set.prune_by_opacity_percent(100).unwrap();
        assert_eq!(last.count, 1);
        assert_eq!(last.opacities, vec![0.6]);

        let err = set.prune_by_opacity_percent(101).unwrap_err();
        assert!(matches!(err, LodError::InvalidConfiguration(_)));

        let (empty, _) = PrimitiveSet::default().prune_by_opacity_percent(50).unwrap();
        assert_eq!(empty.count, 0);
    }

    // ==================== Edge Cases ====================

    #[test]
    fn test_prune_rejects_score_length_mismatch() {
        let set = make_test_set(3);
        let err = set.prune(&[1.0, 1.0], 0.5).unwrap_err();
        assert!(matches!(err, LodError::InvalidData(_)));
    }

    #[test]
    fn test_prune_empty_set() {
        let set = PrimitiveSet::default();

        let (pruned, stats) = set.prune(&[], 0.5).unwrap();

        assert_eq!(pruned.count, 0);
        assert_eq!(stats.final_count, 0);
        assert!(!stats.used_fallback);
    }

    #[test]
    fn test_prune_count_bounds() {
        let set = make_test_set(50);
        for threshold in [0.0, 0.25, 0.5, 0.75, 1.0, 10.0] {
            let scores: Vec<f32> = (0..50).map(|i| (i % 10) as f32 / 10.0).collect();
            let (pruned, _) = set.prune(&scores, threshold).unwrap();
            assert!(pruned.count >= 1);
            assert!(pruned.count <= set.count);
        }
    }
}
