//! Closed-form opacity fine-tuning after a pruning step
//!
//! Each step samples a viewing distance near the level's target distance and
//! decays all opacities by a Gaussian of the sampling offset.

use crate::PrimitiveSet;
use rand::Rng;

/// Sampled distances lie in `[LOW * d, HIGH * d)`
const SAMPLE_LOW: f32 = 0.7;
const SAMPLE_HIGH: f32 = 1.3;

/// Falloff of the per-step decay factor
const DECAY_FALLOFF: f32 = 0.01;

/// Decay factor for one step: `exp(-0.01 * (d_sample - d)^2)`
#[inline]
pub fn step_factor(sampled_distance: f32, target_distance: f32) -> f32 {
    (-DECAY_FALLOFF * (sampled_distance - target_distance).powi(2)).exp()
}

/// Run `steps` fine-tuning steps on `set`, returning the combined factor.
///
/// Every step draws a single distance and scales all opacities by the same
/// factor. The factors are multiplied up first and applied in one pass.
pub fn fine_tune<R: Rng + ?Sized>(
    set: &mut PrimitiveSet,
    target_distance: f32,
    steps: u32,
    rng: &mut R,
) -> f32 {
    let mut combined = 1.0f32;
    for _ in 0..steps {
        let t: f32 = rng.random();
        let sampled = target_distance * (SAMPLE_LOW + t * (SAMPLE_HIGH - SAMPLE_LOW));
        combined *= step_factor(sampled, target_distance);
    }

    for opacity in &mut set.opacities {
        *opacity *= combined;
    }
    combined
}
