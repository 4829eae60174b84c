//! WebAssembly bindings for splatlod
//!
//! This module provides JavaScript-accessible functions for building
//! distance-based detail levels from extracted splat arrays.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use splatlod_core::{
    LodBuilder, LodConfig, LodLevel, LodSummary, PrimitiveSet, PruneStats, SceneStats,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Initialize the WASM module (sets up panic hook for better error messages)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Options for LOD construction
#[wasm_bindgen]
#[derive(Clone)]
pub struct LodOptions {
    distance_thresholds: Vec<f32>,
    smoothing_factor: f32,
    focal_length: f32,
    base_prune_threshold: f32,
    fine_tune_steps: u32,
    diffusion_alpha: f32,
    validation_views: u32,
    seed: Option<u32>,
}

#[wasm_bindgen]
impl LodOptions {
    /// Create new LOD options with defaults
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        LodConfig::default().into()
    }

    /// Set target distances, strictly ascending (default: [5, 10, 20, 50])
    #[wasm_bindgen(setter, js_name = distanceThresholds)]
    pub fn set_distance_thresholds(&mut self, value: Vec<f32>) {
        self.distance_thresholds = value;
    }

    #[wasm_bindgen(getter, js_name = distanceThresholds)]
    pub fn distance_thresholds(&self) -> Vec<f32> {
        self.distance_thresholds.clone()
    }

    /// Set blur scale (default: 1.0)
    #[wasm_bindgen(setter, js_name = smoothingFactor)]
    pub fn set_smoothing_factor(&mut self, value: f32) {
        self.smoothing_factor = value;
    }

    #[wasm_bindgen(getter, js_name = smoothingFactor)]
    pub fn smoothing_factor(&self) -> f32 {
        self.smoothing_factor
    }

    /// Set focal length in pixels (default: 1000)
    #[wasm_bindgen(setter, js_name = focalLength)]
    pub fn set_focal_length(&mut self, value: f32) {
        self.focal_length = value;
    }

    #[wasm_bindgen(getter, js_name = focalLength)]
    pub fn focal_length(&self) -> f32 {
        self.focal_length
    }

    /// Set final pruning threshold (default: 0.02)
    #[wasm_bindgen(setter, js_name = basePruneThreshold)]
    pub fn set_base_prune_threshold(&mut self, value: f32) {
        self.base_prune_threshold = value;
    }

    #[wasm_bindgen(getter, js_name = basePruneThreshold)]
    pub fn base_prune_threshold(&self) -> f32 {
        self.base_prune_threshold
    }

    /// Set fine-tuning steps per pruning round (default: 100)
    #[wasm_bindgen(setter, js_name = fineTuneSteps)]
    pub fn set_fine_tune_steps(&mut self, value: u32) {
        self.fine_tune_steps = value;
    }

    #[wasm_bindgen(getter, js_name = fineTuneSteps)]
    pub fn fine_tune_steps(&self) -> u32 {
        self.fine_tune_steps
    }

    /// Set opacity compensation alpha (default: 0.1)
    #[wasm_bindgen(setter, js_name = diffusionAlpha)]
    pub fn set_diffusion_alpha(&mut self, value: f32) {
        self.diffusion_alpha = value;
    }

    #[wasm_bindgen(getter, js_name = diffusionAlpha)]
    pub fn diffusion_alpha(&self) -> f32 {
        self.diffusion_alpha
    }

    #[wasm_bindgen(setter, js_name = validationViews)]
    pub fn set_validation_views(&mut self, value: u32) {
        self.validation_views = value;
    }

    #[wasm_bindgen(getter, js_name = validationViews)]
    pub fn validation_views(&self) -> u32 {
        self.validation_views
    }

    /// Fix the fine-tuning random seed for reproducible output
    #[wasm_bindgen(js_name = setSeed)]
    pub fn set_seed(&mut self, seed: u32) {
        self.seed = Some(seed);
    }

    /// Draw a fresh seed on every build (default)
    #[wasm_bindgen(js_name = clearSeed)]
    pub fn clear_seed(&mut self) {
        self.seed = None;
    }

    #[wasm_bindgen(getter)]
    pub fn seed(&self) -> Option<u32> {
        self.seed
    }
}

impl Default for LodOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl From<LodConfig> for LodOptions {
    fn from(config: LodConfig) -> Self {
        LodOptions {
            distance_thresholds: config.distance_thresholds,
            smoothing_factor: config.smoothing_factor,
            focal_length: config.focal_length,
            base_prune_threshold: config.base_prune_threshold,
            fine_tune_steps: config.fine_tune_steps,
            diffusion_alpha: config.diffusion_alpha,
            validation_views: config.validation_views,
            seed: None,
        }
    }
}

impl From<&LodOptions> for LodConfig {
    fn from(opts: &LodOptions) -> Self {
        LodConfig {
            distance_thresholds: opts.distance_thresholds.clone(),
            smoothing_factor: opts.smoothing_factor,
            focal_length: opts.focal_length,
            base_prune_threshold: opts.base_prune_threshold,
            fine_tune_steps: opts.fine_tune_steps,
            diffusion_alpha: opts.diffusion_alpha,
            validation_views: opts.validation_views,
        }
    }
}

/// Statistics of one pruning round
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneStatsJs {
    pub threshold: f32,
    pub original_count: usize,
    pub final_count: usize,
    pub used_fallback: bool,
    pub max_score: f32,
    pub min_score: f32,
    pub mean_score: f32,
}

impl From<&PruneStats> for PruneStatsJs {
    fn from(stats: &PruneStats) -> Self {
        PruneStatsJs {
            threshold: stats.threshold,
            original_count: stats.original_count,
            final_count: stats.final_count,
            used_fallback: stats.used_fallback,
            max_score: stats.max_score,
            min_score: stats.min_score,
            mean_score: stats.mean_score,
        }
    }
}

/// Per-level statistics (the splat arrays are attached separately as typed arrays)
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStatsJs {
    pub index: usize,
    pub distance: f32,
    pub original_count: usize,
    pub final_count: usize,
    pub reduction_percent: f32,
    pub fallback_thresholds: Vec<f32>,
    pub prune_steps: Vec<PruneStatsJs>,
}

impl From<&LodLevel> for LevelStatsJs {
    fn from(level: &LodLevel) -> Self {
        LevelStatsJs {
            index: level.index,
            distance: level.distance,
            original_count: level.original_count,
            final_count: level.final_count,
            reduction_percent: level.reduction_percent(),
            fallback_thresholds: level.fallback_thresholds(),
            prune_steps: level.prune_steps.iter().map(PruneStatsJs::from).collect(),
        }
    }
}

/// Seed for the fine-tuning RNG: the fixed one, or a fresh one from `Math.random`
fn resolve_seed(opts: &LodOptions) -> u64 {
    match opts.seed {
        Some(seed) => seed as u64,
        None => (js_sys::Math::random() * u32::MAX as f64) as u64,
    }
}

fn set_property(target: &js_sys::Object, key: &str, value: &JsValue) -> Result<(), JsError> {
    js_sys::Reflect::set(target, &key.into(), value)
        .map(|_| ())
        .map_err(|e| JsError::new(&format!("Failed to set {}: {:?}", key, e)))
}

fn level_to_js(level: &LodLevel) -> Result<JsValue, JsError> {
    let stats: LevelStatsJs = level.into();
    let value = serde_wasm_bindgen::to_value(&stats).map_err(|e| JsError::new(&e.to_string()))?;
    let object: js_sys::Object = value.unchecked_into();

    let primitives = &level.primitives;
    set_property(
        &object,
        "centers",
        &js_sys::Float32Array::from(primitives.flat_centers()).into(),
    )?;
    set_property(
        &object,
        "covariances",
        &js_sys::Float32Array::from(primitives.flat_covariances()).into(),
    )?;
    set_property(
        &object,
        "opacities",
        &js_sys::Float32Array::from(primitives.opacities.as_slice()).into(),
    )?;

    Ok(object.into())
}

/// Build detail levels from extracted splat arrays
///
/// # Arguments
/// * `centers` - 3 floats per splat
/// * `covariances` - 6 floats per splat (upper triangle)
/// * `colors` - 4 bytes per splat; alpha is used as opacity
/// * `options` - Optional LOD options
///
/// # Returns
/// An object with `levels` (one per distance, each with typed arrays and
/// statistics) and `memory` (human-readable size of the base arrays)
#[wasm_bindgen(js_name = buildLods)]
pub fn build_lods(
    centers: &[f32],
    covariances: &[f32],
    colors: &[u8],
    options: Option<LodOptions>,
) -> Result<JsValue, JsError> {
    let opts = options.unwrap_or_default();

    let base = PrimitiveSet::from_flat(centers, covariances, colors)
        .map_err(|e| JsError::new(&e.to_string()))?;
    let mut stats = SceneStats::default();
    stats.record(&base);

    let builder = LodBuilder::new(LodConfig::from(&opts)).map_err(|e| JsError::new(&e.to_string()))?;
    let mut rng = ChaCha8Rng::seed_from_u64(resolve_seed(&opts));
    let levels = builder
        .build(&base, &mut rng)
        .map_err(|e| JsError::new(&e.to_string()))?;

    let js_levels = js_sys::Array::new();
    for level in &levels {
        js_levels.push(&level_to_js(level)?);
    }

    let js_result = js_sys::Object::new();
    set_property(&js_result, "levels", &js_levels.into())?;
    set_property(&js_result, "memory", &stats.formatted_memory().into())?;

    Ok(js_result.into())
}

/// Build detail levels and return only the metadata summary as a JSON string
///
/// # Arguments
/// * `base_name` - Name used for the level file names in the summary
/// * `centers`, `covariances`, `colors` - Extracted splat arrays as for `buildLods`
/// * `options` - Optional LOD options
#[wasm_bindgen(js_name = buildLodSummary)]
pub fn build_lod_summary(
    base_name: &str,
    centers: &[f32],
    covariances: &[f32],
    colors: &[u8],
    options: Option<LodOptions>,
) -> Result<String, JsError> {
    let opts = options.unwrap_or_default();
    let config = LodConfig::from(&opts);

    let base = PrimitiveSet::from_flat(centers, covariances, colors)
        .map_err(|e| JsError::new(&e.to_string()))?;
    let builder = LodBuilder::new(config.clone()).map_err(|e| JsError::new(&e.to_string()))?;
    let mut rng = ChaCha8Rng::seed_from_u64(resolve_seed(&opts));
    let levels = builder
        .build(&base, &mut rng)
        .map_err(|e| JsError::new(&e.to_string()))?;

    LodSummary::new(base_name, "ply", &config, &levels)
        .to_json()
        .map_err(|e| JsError::new(&e.to_string()))
}

/// Get the version of the splatlod WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
