//! Level-of-detail construction
//!
//! For every configured viewing distance the builder copies the base set,
//! smooths it for that distance and then runs three score → prune → fine-tune
//! rounds with increasing thresholds (`0.2τ`, `0.6τ`, `τ`).

use crate::filter;
use crate::finetune::fine_tune;
use crate::score::{ImportanceScorer, OriginDistanceScorer};
use crate::{LodError, PrimitiveSet, PruneStats, Result};
use log::info;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Fractions of the base pruning threshold used by the three pruning rounds
pub const THRESHOLD_SCHEDULE: [f32; 3] = [0.2, 0.6, 1.0];

/// Configuration for LOD construction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LodConfig {
    /// Target viewing distance of each level, strictly ascending (default: [5, 10, 20, 50])
    pub distance_thresholds: Vec<f32>,
    /// Scale of the distance blur (default: 1.0)
    pub smoothing_factor: f32,
    /// Approximate focal length in pixels (default: 1000)
    pub focal_length: f32,
    /// Final pruning threshold τ; earlier rounds use 0.2τ and 0.6τ (default: 0.02)
    pub base_prune_threshold: f32,
    /// Fine-tuning steps after every pruning round (default: 100)
    pub fine_tune_steps: u32,
    /// Opacity compensation for the added blur (default: 0.1)
    pub diffusion_alpha: f32,
    /// Validation views for a multi-view scorer. The default scorer ignores it.
    pub validation_views: u32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            distance_thresholds: vec![5.0, 10.0, 20.0, 50.0],
            smoothing_factor: 1.0,
            focal_length: 1000.0,
            base_prune_threshold: 0.02,
            fine_tune_steps: 100,
            diffusion_alpha: 0.1,
            validation_views: 10,
        }
    }
}

impl LodConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reject configurations that cannot produce a meaningful build
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(LodError::InvalidConfiguration(msg));

        if self.distance_thresholds.is_empty() {
            return invalid("no distance thresholds given".into());
        }
        if let Some(d) = self
            .distance_thresholds
            .iter()
            .find(|d| !d.is_finite() || **d < 0.0)
        {
            return invalid(format!("distance threshold {} must be finite and non-negative", d));
        }
        if let Some(w) = self.distance_thresholds.windows(2).find(|w| w[0] >= w[1]) {
            return invalid(format!(
                "distance thresholds must be strictly ascending, got {} before {}",
                w[0], w[1]
            ));
        }
        if self.fine_tune_steps == 0 {
            return invalid("fine-tune step count must be positive".into());
        }
        if !self.focal_length.is_finite() || self.focal_length <= 0.0 {
            return invalid(format!("focal length {} must be positive", self.focal_length));
        }
        if !self.smoothing_factor.is_finite() {
            return invalid(format!("smoothing factor {} must be finite", self.smoothing_factor));
        }
        if !self.diffusion_alpha.is_finite() || self.diffusion_alpha < 0.0 {
            return invalid(format!(
                "diffusion alpha {} must be finite and non-negative",
                self.diffusion_alpha
            ));
        }
        if !self.base_prune_threshold.is_finite() {
            return invalid(format!(
                "pruning threshold {} must be finite",
                self.base_prune_threshold
            ));
        }
        Ok(())
    }

    /// The three pruning thresholds of one level, in application order
    pub fn threshold_schedule(&self) -> [f32; 3] {
        THRESHOLD_SCHEDULE.map(|f| f * self.base_prune_threshold)
    }
}

/// One finished detail level
#[derive(Clone, Debug)]
pub struct LodLevel {
    /// Position of this level in the configured distance list
    pub index: usize,
    /// Target viewing distance
    pub distance: f32,
    /// The reduced splats
    pub primitives: PrimitiveSet,
    /// Splat count of the base set
    pub original_count: usize,
    /// Splat count of this level
    pub final_count: usize,
    /// Statistics of the three pruning rounds, in order
    pub prune_steps: Vec<PruneStats>,
}

impl LodLevel {
    /// `final_count / original_count`
    pub fn reduction_ratio(&self) -> f32 {
        if self.original_count == 0 {
            0.0
        } else {
            self.final_count as f32 / self.original_count as f32
        }
    }

    /// Remaining splats as a percentage of the base set
    pub fn reduction_percent(&self) -> f32 {
        self.reduction_ratio() * 100.0
    }

    /// Thresholds at which pruning had to fall back to the top-scoring splats
    pub fn fallback_thresholds(&self) -> Vec<f32> {
        self.prune_steps
            .iter()
            .filter(|s| s.used_fallback)
            .map(|s| s.threshold)
            .collect()
    }
}

/// Builds detail levels from a base set
#[derive(Clone, Debug)]
pub struct LodBuilder<S = OriginDistanceScorer> {
    config: LodConfig,
    scorer: S,
}

impl LodBuilder {
    /// Create a builder with the default proxy scorer
    ///
    /// The configuration is validated here, before any level work.
    pub fn new(config: LodConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scorer: OriginDistanceScorer,
        })
    }
}

impl<S: ImportanceScorer> LodBuilder<S> {
    /// Replace the importance scorer
    pub fn with_scorer<T: ImportanceScorer>(self, scorer: T) -> LodBuilder<T> {
        LodBuilder {
            config: self.config,
            scorer,
        }
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    /// Build one level per configured distance.
    ///
    /// One seed per level is drawn from `rng` up front, in level order, so the
    /// result for a given `rng` state does not depend on how levels are
    /// scheduled. Levels are returned in configuration order.
    pub fn build<R: Rng + ?Sized>(&self, base: &PrimitiveSet, rng: &mut R) -> Result<Vec<LodLevel>> {
        if base.is_empty() {
            return Err(LodError::MissingInput("base splat set is empty".into()));
        }
        base.validate()?;

        let levels = self.config.distance_thresholds.len();
        info!("Building {} LOD levels from {} splats", levels, base.count);

        let jobs: Vec<(usize, f32, u64)> = self
            .config
            .distance_thresholds
            .iter()
            .enumerate()
            .map(|(i, &d)| (i, d, rng.random()))
            .collect();

        #[cfg(feature = "parallel")]
        let built = jobs
            .into_par_iter()
            .map(|(i, d, seed)| self.build_level(base, i, d, &mut ChaCha8Rng::seed_from_u64(seed)))
            .collect::<Result<Vec<_>>>()?;

        #[cfg(not(feature = "parallel"))]
        let built = jobs
            .into_iter()
            .map(|(i, d, seed)| self.build_level(base, i, d, &mut ChaCha8Rng::seed_from_u64(seed)))
            .collect::<Result<Vec<_>>>()?;

        info!("LOD construction finished: {} levels", built.len());
        Ok(built)
    }

    /// Build a single level for `distance` from its own copy of `base`
    pub fn build_level<R: Rng + ?Sized>(
        &self,
        base: &PrimitiveSet,
        index: usize,
        distance: f32,
        rng: &mut R,
    ) -> Result<LodLevel> {
        if base.is_empty() {
            return Err(LodError::MissingInput("base splat set is empty".into()));
        }
        base.validate()?;

        let total = self.config.distance_thresholds.len();
        info!(
            "Processing LOD level {}/{} (distance: {})",
            index + 1,
            total,
            distance
        );

        let mut working = base.clone();
        filter::apply(
            &mut working,
            distance,
            self.config.smoothing_factor,
            self.config.focal_length,
            self.config.diffusion_alpha,
        );

        let mut prune_steps = Vec::with_capacity(THRESHOLD_SCHEDULE.len());
        for tau in self.config.threshold_schedule() {
            info!("  Pruning with threshold {:.4}", tau);

            let scores = self.scorer.score(&working);
            let (mut pruned, stats) = working.prune(&scores, tau)?;
            fine_tune(&mut pruned, distance, self.config.fine_tune_steps, rng);

            working = pruned;
            prune_steps.push(stats);
        }

        let level = LodLevel {
            index,
            distance,
            original_count: base.count,
            final_count: working.count,
            primitives: working,
            prune_steps,
        };

        info!(
            "  LOD level complete: {} splats ({:.1}% of original)",
            level.final_count,
            level.reduction_percent()
        );

        Ok(level)
    }
}
