//! GPU load and CPU temperature from sysfs.
//!
//! Both probes are vendor-specific and fail soft to [`Reading::Unknown`].

use std::fs;
use std::path::Path;

use taskd_core::Reading;
use tracing::debug;

/// GPU busy-percentage sources, probed in order (Adreno, then Mali/other).
pub const GPU_BUSY_PATHS: [&str; 2] = [
    "class/kgsl/kgsl-3d0/gpu_busy_percentage",
    "kernel/gpu/gpu_busy",
];

/// Substrings of a thermal zone `type` that mark it as a CPU sensor.
pub const CPU_ZONE_KEYWORDS: [&str; 3] = ["cpu", "soc", "cluster"];

/// Plausible CPU temperature range in whole degrees Celsius.
const TEMPERATURE_RANGE: std::ops::RangeInclusive<i64> = 5..=100;

/// Reads GPU load as a percentage.
///
/// The first source whose leading integer is strictly positive wins.
/// An idle GPU therefore reads as `unknown`, not `0`.
pub fn gpu_usage(sys_root: &Path) -> Reading {
    GPU_BUSY_PATHS
        .iter()
        .filter_map(|rel| fs::read_to_string(sys_root.join(rel)).ok())
        .filter_map(|text| leading_integer(&text))
        .find(|value| *value > 0)
        .into()
}

/// Reads the hottest CPU-related thermal zone in degrees Celsius.
pub fn cpu_temperature(sys_root: &Path) -> Reading {
    let thermal = sys_root.join("class/thermal");
    let entries = match fs::read_dir(&thermal) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %thermal.display(), error = %e, "No thermal zones");
            return Reading::Unknown;
        }
    };

    entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with("thermal_zone"))
        })
        .filter(|entry| {
            fs::read_to_string(entry.path().join("type"))
                .map(|kind| is_cpu_zone(&kind))
                .unwrap_or(false)
        })
        .filter_map(|entry| fs::read_to_string(entry.path().join("temp")).ok())
        .filter_map(|raw| leading_integer(&raw))
        .map(normalize_celsius)
        .filter(|celsius| TEMPERATURE_RANGE.contains(celsius))
        .max()
        .into()
}

fn is_cpu_zone(kind: &str) -> bool {
    let kind = kind.trim().to_ascii_lowercase();
    CPU_ZONE_KEYWORDS.iter().any(|keyword| kind.contains(keyword))
}

/// Zones report either whole degrees or millidegrees.
fn normalize_celsius(raw: i64) -> i64 {
    if raw > 1000 {
        raw / 1000
    } else {
        raw
    }
}

/// Parses the integer at the start of a sysfs value (`"37 %"` -> 37).
fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let digits_end = text
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
        .map_or(text.len(), |(i, _)| i);
    text.get(..digits_end)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_integer() {
        assert_eq!(leading_integer("37\n"), Some(37));
        assert_eq!(leading_integer("  12 %"), Some(12));
        assert_eq!(leading_integer("-4"), Some(-4));
        assert_eq!(leading_integer("abc"), None);
        assert_eq!(leading_integer(""), None);
    }

    #[test]
    fn test_normalize_celsius() {
        assert_eq!(normalize_celsius(45_300), 45);
        assert_eq!(normalize_celsius(52), 52);
        assert_eq!(normalize_celsius(1000), 1000);
    }

    #[test]
    fn test_cpu_zone_keywords() {
        assert!(is_cpu_zone("cpu-0-0-usr\n"));
        assert!(is_cpu_zone("SOC_THERM"));
        assert!(is_cpu_zone("cpuss-cluster0"));
        assert!(!is_cpu_zone("battery"));
        assert!(!is_cpu_zone("gpu0-usr"));
    }

    #[test]
    fn test_missing_sysfs_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(gpu_usage(dir.path()), Reading::Unknown);
        assert_eq!(cpu_temperature(dir.path()), Reading::Unknown);
    }
}
