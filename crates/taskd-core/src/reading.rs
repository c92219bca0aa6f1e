//! Sensor readings that may be unavailable on a given device.

use std::fmt;

/// A sensor value that may not be available on this device.
///
/// Displays as the bare integer, or `unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reading {
    /// A measured value
    Known(i64),
    /// No source produced a usable value
    #[default]
    Unknown,
}

impl From<Option<i64>> for Reading {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => write!(f, "{v}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Swap usage in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl SwapUsage {
    /// Builds usage from the `SwapTotal`/`SwapFree` meminfo counters, in bytes.
    pub fn from_totals(total_bytes: u64, free_bytes: u64) -> Self {
        Self {
            used_bytes: total_bytes.saturating_sub(free_bytes),
            total_bytes,
        }
    }
}
