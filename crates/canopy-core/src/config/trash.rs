//! Trash reaper configuration.

use serde::{Deserialize, Serialize};

/// Settings for the background job that physically removes content
/// pending deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashConfig {
    /// Whether the reaper is scheduled at startup.
    #[serde(default = "default_true")]
    pub reaper_enabled: bool,
    /// Six-field cron expression (seconds first).
    #[serde(default = "default_schedule")]
    pub reaper_schedule: String,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self {
            reaper_enabled: true,
            reaper_schedule: default_schedule(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_schedule() -> String {
    "0 0 3 * * *".to_string()
}
