//! System load average plugin.

use std::path::PathBuf;

use crate::plugins::{procfs, MetricPlugin, PluginError};
use crate::wire::Snapshot;

/// Reports the 1, 5 and 15 minute load averages.
#[derive(Debug, Clone)]
pub struct LoadAvgPlugin {
    path: PathBuf,
}

impl LoadAvgPlugin {
    pub fn new() -> Self {
        Self::with_path(procfs::LOADAVG_PATH)
    }

    /// Read load averages from a file other than `/proc/loadavg`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for LoadAvgPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricPlugin for LoadAvgPlugin {
    fn name(&self) -> &str {
        "loadavg"
    }

    fn snapshot(&self) -> Result<Snapshot, PluginError> {
        let content = procfs::read(&self.path)?;
        procfs::parse_loadavg(&content).map(Snapshot::LoadAvg)
    }
}
