//! Distance-dependent smoothing filter (mip-style blur)
//!
//! Inflates every splat's footprint as if it were seen from a given distance
//! and attenuates opacity to compensate for the added coverage.

use crate::{Covariance, PrimitiveSet, COV_DIAGONAL};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Variance added to each diagonal covariance term: `(s * d / f)^2`
#[inline]
pub fn blur_amount(distance: f32, smoothing_factor: f32, focal_length: f32) -> f32 {
    (smoothing_factor * distance / focal_length).powi(2)
}

/// Opacity multiplier compensating for the blur: `exp(-α * (d / f)^2)`
#[inline]
pub fn opacity_attenuation(distance: f32, focal_length: f32, diffusion_alpha: f32) -> f32 {
    (-diffusion_alpha * (distance / focal_length).powi(2)).exp()
}

#[inline]
fn inflate(cov: &mut Covariance, blur: f32) {
    for i in COV_DIAGONAL {
        cov[i] += blur;
    }
}

/// Smooth `set` in place for viewing distance `distance`.
///
/// Covariance growth is unbounded: calling this twice on the same set blurs
/// it twice, so every level must start from its own copy of the base set.
pub fn apply(
    set: &mut PrimitiveSet,
    distance: f32,
    smoothing_factor: f32,
    focal_length: f32,
    diffusion_alpha: f32,
) {
    let blur = blur_amount(distance, smoothing_factor, focal_length);
    let attenuation = opacity_attenuation(distance, focal_length, diffusion_alpha);

    #[cfg(feature = "parallel")]
    {
        set.covariances
            .par_iter_mut()
            .for_each(|cov| inflate(cov, blur));
        set.opacities.par_iter_mut().for_each(|o| *o *= attenuation);
    }

    #[cfg(not(feature = "parallel"))]
    {
        set.covariances.iter_mut().for_each(|cov| inflate(cov, blur));
        set.opacities.iter_mut().for_each(|o| *o *= attenuation);
    }
}
