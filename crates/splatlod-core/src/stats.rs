//! Running totals over the scenes held in memory

use crate::PrimitiveSet;

/// Accumulated counts over loaded scenes.
///
/// Passed by reference to whatever loads or releases scenes; there is no
/// process-wide instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneStats {
    /// Number of scenes currently recorded
    pub scenes_loaded: usize,
    /// Splats across all recorded scenes
    pub total_splats: usize,
    /// Attribute memory across all recorded scenes, in bytes
    pub total_bytes: usize,
}

impl SceneStats {
    /// Add a loaded scene to the totals
    pub fn record(&mut self, set: &PrimitiveSet) {
        self.scenes_loaded += 1;
        self.total_splats += set.count;
        self.total_bytes += set.byte_size();
    }

    /// Remove a previously recorded scene from the totals
    pub fn release(&mut self, set: &PrimitiveSet) {
        self.scenes_loaded = self.scenes_loaded.saturating_sub(1);
        self.total_splats = self.total_splats.saturating_sub(set.count);
        self.total_bytes = self.total_bytes.saturating_sub(set.byte_size());
    }

    pub fn formatted_memory(&self) -> String {
        format_bytes(self.total_bytes)
    }
}

/// Human-readable byte count, e.g. `1.5 KB` or `12 MB`
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".into();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}
