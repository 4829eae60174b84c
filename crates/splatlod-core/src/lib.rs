//! splatlod Core - Distance-based LOD construction for Gaussian splats
//!
//! This library provides functionality for:
//! - Holding extracted splat attributes as index-aligned arrays
//! - Smoothing splats for a target viewing distance (mip-style blur)
//! - Scoring and pruning splats with a three-step threshold schedule
//! - Opacity-percentile pruning variants
//! - Cheap opacity fine-tuning after every pruning step
//! - Summarizing the resulting levels for a metadata side-file

pub mod filter;
pub mod finetune;
pub mod lod;
pub mod prune;
pub mod score;
pub mod stats;
pub mod summary;

pub use lod::{LodBuilder, LodConfig, LodLevel};
pub use prune::PruneStats;
pub use score::{ImportanceScorer, OriginDistanceScorer};
pub use stats::SceneStats;
pub use summary::LodSummary;

use glam::{Mat3, Quat, Vec3};
use rand::Rng;
use thiserror::Error;

/// Errors that can occur during LOD construction
#[derive(Error, Debug)]
pub enum LodError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LodError>;

/// Symmetric 3x3 covariance stored as its upper triangle:
/// `[Σ00, Σ01, Σ02, Σ11, Σ12, Σ22]`.
pub type Covariance = [f32; 6];

/// Indices of the diagonal terms inside a [`Covariance`].
pub const COV_DIAGONAL: [usize; 3] = [0, 3, 5];

/// A collection of Gaussian primitives stored as parallel arrays.
///
/// Index `i` describes the same primitive in every array. `colors` is either
/// empty (pruned sets do not carry colors) or holds one entry per primitive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimitiveSet {
    /// Number of primitives
    pub count: usize,
    /// Gaussian centers (x, y, z)
    pub centers: Vec<Vec3>,
    /// Upper-triangle covariances
    pub covariances: Vec<Covariance>,
    /// RGBA colors; alpha is legacy once opacities are extracted
    pub colors: Vec<[u8; 4]>,
    /// Opacity values [0, 1]
    pub opacities: Vec<f32>,
}

impl PrimitiveSet {
    /// Create a new empty set with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            count: 0,
            centers: Vec::with_capacity(capacity),
            covariances: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
            opacities: Vec::with_capacity(capacity),
        }
    }

    /// Build a set from flat attribute arrays as produced by a scene extractor.
    ///
    /// `centers` holds 3 floats, `covariances` 6 floats and `colors` 4 bytes per
    /// primitive. Opacities are extracted from the color alpha channel.
    pub fn from_flat(centers: &[f32], covariances: &[f32], colors: &[u8]) -> Result<Self> {
        if centers.len() % 3 != 0 {
            return Err(LodError::InvalidData(format!(
                "center array length {} is not a multiple of 3",
                centers.len()
            )));
        }
        let count = centers.len() / 3;

        if covariances.len() != count * 6 {
            return Err(LodError::InvalidData(format!(
                "expected {} covariance values for {} splats, got {}",
                count * 6,
                count,
                covariances.len()
            )));
        }
        if colors.len() != count * 4 {
            return Err(LodError::InvalidData(format!(
                "expected {} color bytes for {} splats, got {}",
                count * 4,
                count,
                colors.len()
            )));
        }

        let colors: Vec<[u8; 4]> = colors
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();

        Ok(Self {
            count,
            centers: centers.chunks_exact(3).map(Vec3::from_slice).collect(),
            covariances: bytemuck::cast_slice::<f32, Covariance>(covariances).to_vec(),
            opacities: colors.iter().map(|c| c[3] as f32 / 255.0).collect(),
            colors,
        })
    }

    /// Build a set from per-splat scales and rotations.
    ///
    /// Each covariance is `R * S * S^T * R^T`, with `S` the diagonal scale
    /// matrix and `R` the rotation of the (normalized) quaternion.
    pub fn from_scale_rotation(
        centers: &[Vec3],
        scales: &[Vec3],
        rotations: &[Quat],
        colors: &[[u8; 4]],
    ) -> Result<Self> {
        let count = centers.len();
        if scales.len() != count || rotations.len() != count || colors.len() != count {
            return Err(LodError::InvalidData(format!(
                "attribute lengths differ: {} centers, {} scales, {} rotations, {} colors",
                count,
                scales.len(),
                rotations.len(),
                colors.len()
            )));
        }

        let covariances = scales
            .iter()
            .zip(rotations)
            .map(|(&scale, &rot)| {
                let m = Mat3::from_quat(rot.normalize()) * Mat3::from_diagonal(scale);
                let cov = m * m.transpose();
                [
                    cov.x_axis.x,
                    cov.y_axis.x,
                    cov.z_axis.x,
                    cov.y_axis.y,
                    cov.z_axis.y,
                    cov.z_axis.z,
                ]
            })
            .collect();

        Ok(Self {
            count,
            centers: centers.to_vec(),
            covariances,
            colors: colors.to_vec(),
            opacities: colors.iter().map(|c| c[3] as f32 / 255.0).collect(),
        })
    }

    /// Check that every attribute array is aligned with `count`
    /// Replace the alpha-derived opacities with sigmoid-activated logits,
    /// as stored by trained scenes.
    pub fn with_opacity_logits(mut self, logits: &[f32]) -> Result<Self> {
        if logits.len() != self.count {
            return Err(LodError::InvalidData(format!(
                "got {} opacity logits for {} splats",
                logits.len(),
                self.count
            )));
        }
        self.opacities = logits.iter().copied().map(opacity_from_logit).collect();
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let misaligned = self.centers.len() != self.count
            || self.covariances.len() != self.count
            || self.opacities.len() != self.count
            || !(self.colors.is_empty() || self.colors.len() == self.count);

        if misaligned {
            return Err(LodError::InvalidData(format!(
                "misaligned arrays for {} splats: {} centers, {} covariances, {} colors, {} opacities",
                self.count,
                self.centers.len(),
                self.covariances.len(),
                self.colors.len(),
                self.opacities.len()
            )));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Centers as a flat `[x0, y0, z0, x1, ...]` slice
    pub fn flat_centers(&self) -> &[f32] {
        bytemuck::cast_slice(&self.centers)
    }

    /// Covariances as a flat slice, 6 floats per splat
    pub fn flat_covariances(&self) -> &[f32] {
        bytemuck::cast_slice(&self.covariances)
    }

    /// Colors as a flat RGBA byte slice (empty for pruned sets)
    pub fn flat_colors(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }

    /// In-memory size of the attribute arrays in bytes
    pub fn byte_size(&self) -> usize {
        std::mem::size_of_val(self.centers.as_slice())
            + std::mem::size_of_val(self.covariances.as_slice())
            + std::mem::size_of_val(self.colors.as_slice())
            + std::mem::size_of_val(self.opacities.as_slice())
    }
}

/// Opacity of a stored opacity logit, `1 / (1 + e^-logit)`
pub fn opacity_from_logit(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}

/// Build every configured level for `base` with the default proxy scorer.
///
/// # Arguments
/// * `base` - The extracted base scene
/// * `config` - LOD configuration, validated before any work starts
/// * `rng` - Random source for the fine-tuning distance samples
///
/// # Returns
/// One level per configured distance, in configuration order
pub fn build_lods<R: Rng + ?Sized>(
    base: &PrimitiveSet,
    config: &LodConfig,
    rng: &mut R,
) -> Result<Vec<LodLevel>> {
    LodBuilder::new(config.clone())?.build(base, rng)
}
