//! Physical memory usage plugin.

use std::path::PathBuf;

use crate::plugins::{procfs, MetricPlugin, PluginError};
use crate::wire::{Snapshot, Usage};

/// Reports total, used and free physical memory.
#[derive(Debug, Clone)]
pub struct MemPlugin {
    path: PathBuf,
}

impl MemPlugin {
    pub fn new() -> Self {
        Self::with_path(procfs::MEMINFO_PATH)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for MemPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricPlugin for MemPlugin {
    fn name(&self) -> &str {
        "mem"
    }

    fn snapshot(&self) -> Result<Snapshot, PluginError> {
        let fields = procfs::parse_meminfo(&procfs::read(&self.path)?)?;
        let total = procfs::meminfo_field(&fields, "MemTotal")?;
        let free = procfs::meminfo_field(&fields, "MemFree")?;
        Ok(Snapshot::Usage(Usage::from_total_free(total, free)))
    }
}
