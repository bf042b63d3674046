//! Swap usage plugin.

use std::path::PathBuf;

use crate::plugins::{procfs, MetricPlugin, PluginError};
use crate::wire::{Snapshot, Usage};

/// Reports total, used and free swap space.
#[derive(Debug, Clone)]
pub struct SwapPlugin {
    path: PathBuf,
}

impl SwapPlugin {
    pub fn new() -> Self {
        Self::with_path(procfs::MEMINFO_PATH)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for SwapPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricPlugin for SwapPlugin {
    fn name(&self) -> &str {
        "swap"
    }

    fn snapshot(&self) -> Result<Snapshot, PluginError> {
        let fields = procfs::parse_meminfo(&procfs::read(&self.path)?)?;
        let total = procfs::meminfo_field(&fields, "SwapTotal")?;
        let free = procfs::meminfo_field(&fields, "SwapFree")?;
        Ok(Snapshot::Usage(Usage::from_total_free(total, free)))
    }
}
