//! CPU accounting samples and the metrics derived from them.

/// One read of the system-wide CPU accounting line (`cpu ...` in `/proc/stat`).
///
/// All values are cumulative tick counts since boot. Columns an older
/// kernel does not report are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuSample {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuSample {
    /// Sum of all tracked modes.
    pub fn total(&self) -> u64 {
        self.user
            .saturating_add(self.nice)
            .saturating_add(self.system)
            .saturating_add(self.idle)
            .saturating_add(self.iowait)
            .saturating_add(self.irq)
            .saturating_add(self.softirq)
            .saturating_add(self.steal)
    }

    /// Ticks spent doing anything but idling.
    pub fn active(&self) -> u64 {
        self.total().saturating_sub(self.idle)
    }

    /// CPU usage percentage between an earlier sample and this one.
    ///
    /// Always in `[0, 100]`. A zero total delta (identical samples, or a
    /// counter that went backwards) yields 0.
    pub fn usage_since(&self, earlier: &CpuSample) -> u8 {
        let total = self.total().saturating_sub(earlier.total());
        if total == 0 {
            return 0;
        }
        let active = self.active().saturating_sub(earlier.active());
        let usage = (active as f64 / total as f64) * 100.0;
        usage.clamp(0.0, 100.0) as u8
    }
}

/// Lifetime CPU percentage of a process.
///
/// `100 * busy_ticks / (uptime_ticks - start_ticks)`; returns 0 when the
/// elapsed tick count is not positive.
pub fn lifetime_cpu_percent(busy_ticks: u64, start_ticks: u64, uptime_ticks: u64) -> f32 {
    if uptime_ticks <= start_ticks {
        return 0.0;
    }
    let elapsed = uptime_ticks - start_ticks;
    (100.0 * busy_ticks as f64 / elapsed as f64) as f32
}

/// Seconds a process has been alive, given its start tick.
pub fn elapsed_seconds(start_ticks: u64, uptime_ticks: u64, ticks_per_second: u64) -> f32 {
    if ticks_per_second == 0 {
        return 0.0;
    }
    let elapsed = uptime_ticks.saturating_sub(start_ticks);
    (elapsed as f64 / ticks_per_second as f64) as f32
}

/// Converts `/proc/uptime` seconds into clock ticks.
pub fn uptime_ticks(uptime_secs: f64, ticks_per_second: u64) -> u64 {
    if !uptime_secs.is_finite() || uptime_secs <= 0.0 {
        return 0;
    }
    (uptime_secs * ticks_per_second as f64) as u64
}
