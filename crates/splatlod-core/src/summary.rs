//! Metadata describing a set of built levels
//!
//! The summary is what a writer stores next to the level files so a viewer
//! can pick a level by distance without opening every file.

use crate::lod::{LodConfig, LodLevel};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Version of the summary layout
pub const SUMMARY_VERSION: &str = "1.0";

/// File name a writer should use for level `index`, e.g. `garden_lod_2_d20.ply`
pub fn level_file_name(base: &str, index: usize, distance: f32, extension: &str) -> String {
    format!("{}_lod_{}_d{}.{}", base, index, distance, extension)
}

/// File name of the summary itself, e.g. `garden_lod_metadata.json`
pub fn metadata_file_name(base: &str) -> String {
    format!("{}_lod_metadata.json", base)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSummary {
    pub distance: f32,
    pub file: String,
    pub splat_count: usize,
    /// Remaining splats as a percentage of the base scene
    pub reduction_percent: f32,
    /// Thresholds at which pruning fell back to the top-scoring splats
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_thresholds: Vec<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceRange {
    pub min: f32,
    pub max: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStatistics {
    pub total_levels: usize,
    pub distance_range: DistanceRange,
    /// Reduction of the coarsest level
    pub total_reduction_percent: f32,
}

/// Summary of one LOD build
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LodSummary {
    pub version: String,
    pub base_scene: String,
    pub original_count: usize,
    pub configuration: LodConfig,
    pub levels: Vec<LevelSummary>,
    pub statistics: SummaryStatistics,
}

impl LodSummary {
    /// Summarize `levels` built from the scene named `base`.
    ///
    /// Level file names follow [`level_file_name`] with `extension`.
    pub fn new(base: &str, extension: &str, config: &LodConfig, levels: &[LodLevel]) -> Self {
        let summaries: Vec<LevelSummary> = levels
            .iter()
            .map(|level| LevelSummary {
                distance: level.distance,
                file: level_file_name(base, level.index, level.distance, extension),
                splat_count: level.final_count,
                reduction_percent: level.reduction_percent(),
                fallback_thresholds: level.fallback_thresholds(),
            })
            .collect();

        let distance_range = if summaries.is_empty() {
            DistanceRange::default()
        } else {
            DistanceRange {
                min: summaries.iter().map(|l| l.distance).fold(f32::INFINITY, f32::min),
                max: summaries.iter().map(|l| l.distance).fold(f32::NEG_INFINITY, f32::max),
            }
        };

        let statistics = SummaryStatistics {
            total_levels: summaries.len(),
            distance_range,
            total_reduction_percent: summaries.last().map_or(0.0, |l| l.reduction_percent),
        };

        Self {
            version: SUMMARY_VERSION.into(),
            base_scene: base.into(),
            original_count: levels.first().map_or(0, |l| l.original_count),
            configuration: config.clone(),
            levels: summaries,
            statistics,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Index of the level to use at `distance`: the last level whose distance
    /// does not exceed it, or `None` when closer than the first level.
    pub fn level_for_distance(&self, distance: f32) -> Option<usize> {
        self.levels.iter().rposition(|l| l.distance <= distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrimitiveSet, PruneStats};

    fn make_level(index: usize, distance: f32, final_count: usize, fallback: bool) -> LodLevel {
        LodLevel {
            index,
            distance,
            primitives: PrimitiveSet::default(),
            original_count: 200,
            final_count,
            prune_steps: vec![PruneStats {
                threshold: 0.02,
                used_fallback: fallback,
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(level_file_name("garden", 2, 20.0, "ply"), "garden_lod_2_d20.ply");
        assert_eq!(level_file_name("garden", 0, 2.5, "ksplat"), "garden_lod_0_d2.5.ksplat");
        assert_eq!(metadata_file_name("out/garden"), "out/garden_lod_metadata.json");
    }

    #[test]
    fn test_summary_statistics() {
        let levels = vec![
            make_level(0, 5.0, 150, false),
            make_level(1, 10.0, 100, false),
            make_level(2, 50.0, 20, true),
        ];

        let summary = LodSummary::new("garden", "ply", &LodConfig::default(), &levels);

        assert_eq!(summary.version, "1.0");
        assert_eq!(summary.original_count, 200);
        assert_eq!(summary.statistics.total_levels, 3);
        assert_eq!(summary.statistics.distance_range.min, 5.0);
        assert_eq!(summary.statistics.distance_range.max, 50.0);
        assert!((summary.statistics.total_reduction_percent - 10.0).abs() < 1e-4);
        assert_eq!(summary.levels[0].file, "garden_lod_0_d5.ply");
        assert_eq!(summary.levels[1].reduction_percent, 50.0);
        assert!(summary.levels[0].fallback_thresholds.is_empty());
        assert_eq!(summary.levels[2].fallback_thresholds, vec![0.02]);
    }

    #[test]
    fn test_summary_empty_levels() {
        let summary = LodSummary::new("empty", "ply", &LodConfig::default(), &[]);

        assert_eq!(summary.statistics.total_levels, 0);
        assert_eq!(summary.statistics.distance_range, DistanceRange::default());
        assert_eq!(summary.statistics.total_reduction_percent, 0.0);
    }

    #[test]
    fn test_summary_json_layout() {
        let levels = vec![make_level(0, 5.0, 100, false)];
        let summary = LodSummary::new("garden", "ply", &LodConfig::default(), &levels);

        let json = summary.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["baseScene"], "garden");
        assert_eq!(value["levels"][0]["splatCount"], 100);
        assert_eq!(value["statistics"]["totalLevels"], 1);
        assert_eq!(value["configuration"]["fineTuneSteps"], 100);
        assert!(value["configuration"].get("fine-tune-steps").is_none());
        assert!(value["levels"][0].get("fallbackThresholds").is_none());

        assert_eq!(LodSummary::from_json(&json).unwrap(), summary);
    }

    #[test]
    fn test_level_for_distance() {
        let levels = vec![
            make_level(0, 5.0, 150, false),
            make_level(1, 10.0, 100, false),
            make_level(2, 50.0, 20, false),
        ];
        let summary = LodSummary::new("garden", "ply", &LodConfig::default(), &levels);

        assert_eq!(summary.level_for_distance(1.0), None);
        assert_eq!(summary.level_for_distance(5.0), Some(0));
        assert_eq!(summary.level_for_distance(30.0), Some(1));
        assert_eq!(summary.level_for_distance(1000.0), Some(2));
    }
}
