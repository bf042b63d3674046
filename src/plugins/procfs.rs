//! Parsers for the Linux `/proc` files read by the built-in plugins.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::plugins::PluginError;
use crate::wire::LoadAvg;

pub const LOADAVG_PATH: &str = "/proc/loadavg";
pub const MEMINFO_PATH: &str = "/proc/meminfo";

/// Read a whole proc file into memory.
pub fn read(path: &Path) -> Result<String, PluginError> {
    fs::read_to_string(path).map_err(|source| PluginError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parse the first three fields of `/proc/loadavg`.
pub fn parse_loadavg(content: &str) -> Result<LoadAvg, PluginError> {
    let mut fields = content.split_whitespace();
    let mut next = |label: &str| -> Result<f64, PluginError> {
        let raw = fields.next().ok_or_else(|| PluginError::Parse {
            path: LOADAVG_PATH.to_string(),
            detail: format!("missing {} field", label),
        })?;
        let value: f64 = raw.parse().map_err(|_| PluginError::Parse {
            path: LOADAVG_PATH.to_string(),
            detail: format!("invalid {} value {:?}", label, raw),
        })?;
        Ok(if value.is_finite() { value } else { 0.0 })
    };

    Ok(LoadAvg {
        load1min: next("1 minute")?,
        load5min: next("5 minute")?,
        load15min: next("15 minute")?,
    })
}

/// Parse `/proc/meminfo` into byte counts keyed by field name.
///
/// Values are reported by the kernel in KiB.
pub fn parse_meminfo(content: &str) -> Result<HashMap<String, u64>, PluginError> {
    let mut fields = HashMap::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        let number = value.strip_suffix("kB").unwrap_or(value).trim();
        let kib: u64 = number.parse().map_err(|_| PluginError::Parse {
            path: MEMINFO_PATH.to_string(),
            detail: format!("invalid value {:?} for {}", value, key.trim()),
        })?;
        fields.insert(key.trim().to_string(), kib.saturating_mul(1024));
    }
    Ok(fields)
}

/// Fetch a required field from parsed meminfo.
pub fn meminfo_field(fields: &HashMap<String, u64>, key: &str) -> Result<u64, PluginError> {
    fields.get(key).copied().ok_or_else(|| PluginError::Parse {
        path: MEMINFO_PATH.to_string(),
        detail: format!("missing {} field", key),
    })
}
