//! OS snapshot reader.
//!
//! Derives point-in-time system and process metrics from kernel counters
//! under a proc root (normally `/proc`) and a sys root (normally `/sys`).
//! Both roots are injectable so the reader can run against a fixture tree.
//!
//! Kernel records (`stat`, `status`, `meminfo`, `uptime`, ...) are parsed
//! by `procfs`; the sysfs sensors in [`sensors`] are plain text reads.
//!
//! # Blocking I/O
//!
//! Every method here performs synchronous filesystem reads, and
//! [`SnapshotReader::system_cpu_usage`] sleeps between its two samples.
//! Async callers must go through `spawn_blocking`.
//!
//! # Panic-Free Guarantees
//!
//! Reads fail soft: an unreadable source leaves the corresponding value at
//! zero/empty. The only reported failure is a process that has vanished.

mod sensors;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use procfs::process::{Process, Stat};
use procfs::{CpuTime, ExplicitSystemInfo, FromRead, FromReadSI, KernelStats, Meminfo, Uptime};
use taskd_core::{
    elapsed_seconds, lifetime_cpu_percent, uptime_ticks, CpuSample, ForegroundPolicy,
    OomScoreThreshold, Pid, ProcessRecord, Reading, SnapshotError, SnapshotResult, SwapUsage,
};
use tracing::{debug, trace};

pub use sensors::{cpu_temperature, gpu_usage};

// ============================================================================
// Constants
// ============================================================================

/// Default proc filesystem mount point.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Default sysfs mount point.
pub const DEFAULT_SYS_ROOT: &str = "/sys";

/// Default delay between the two system CPU samples.
pub const DEFAULT_CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

// ============================================================================
// Snapshot Reader
// ============================================================================

/// Reads process and system state from procfs/sysfs.
pub struct SnapshotReader {
    proc_root: PathBuf,
    sys_root: PathBuf,
    cpu_interval: Duration,
    ticks_per_second: u64,
    policy: Arc<dyn ForegroundPolicy>,
}

impl Default for SnapshotReader {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT, DEFAULT_SYS_ROOT)
    }
}

impl SnapshotReader {
    /// Creates a reader over the given roots with default tuning.
    pub fn new(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
            cpu_interval: DEFAULT_CPU_SAMPLE_INTERVAL,
            ticks_per_second: procfs::ticks_per_second(),
            policy: Arc::new(OomScoreThreshold::default()),
        }
    }

    #[must_use]
    pub fn with_cpu_interval(mut self, interval: Duration) -> Self {
        self.cpu_interval = interval;
        self
    }

    #[must_use]
    pub fn with_ticks_per_second(mut self, ticks_per_second: u64) -> Self {
        self.ticks_per_second = ticks_per_second;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: impl ForegroundPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    // ------------------------------------------------------------------------
    // System-wide metrics
    // ------------------------------------------------------------------------

    /// Reads the aggregate `cpu` line of `<proc>/stat`.
    ///
    /// A missing or malformed file gives an all-zero sample.
    pub fn read_cpu_sample(&self) -> CpuSample {
        let path = self.proc_root.join("stat");
        match KernelStats::from_file(&path, &self.system_info()) {
            Ok(stats) => cpu_sample(&stats.total),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No aggregate cpu line");
                CpuSample::default()
            }
        }
    }

    /// System CPU usage over one sample interval, in `[0, 100]`.
    ///
    /// Blocks the calling thread for the interval.
    pub fn system_cpu_usage(&self) -> u8 {
        let first = self.read_cpu_sample();
        std::thread::sleep(self.cpu_interval);
        let second = self.read_cpu_sample();
        second.usage_since(&first)
    }

    /// Swap usage from `<proc>/meminfo`; `(0, 0)` when unavailable.
    pub fn swap_usage(&self) -> SwapUsage {
        match Meminfo::from_file(self.proc_root.join("meminfo")) {
            Ok(meminfo) => SwapUsage::from_totals(meminfo.swap_total, meminfo.swap_free),
            Err(e) => {
                debug!(error = %e, "Swap counters unavailable");
                SwapUsage::default()
            }
        }
    }

    pub fn gpu_usage(&self) -> Reading {
        gpu_usage(&self.sys_root)
    }

    pub fn cpu_temperature(&self) -> Reading {
        cpu_temperature(&self.sys_root)
    }

    /// System uptime in clock ticks, from `<proc>/uptime`.
    pub fn uptime_ticks(&self) -> Option<u64> {
        let uptime = Uptime::from_file(self.proc_root.join("uptime")).ok()?;
        Some(uptime_ticks(uptime.uptime, self.ticks_per_second))
    }

    // ------------------------------------------------------------------------
    // Per-process metrics
    // ------------------------------------------------------------------------

    /// Lifetime CPU usage of a process in percent; 0 if unreadable.
    pub fn process_cpu_usage(&self, pid: Pid) -> f32 {
        let Ok(stat) = self.open_process(pid).and_then(|process| process.stat()) else {
            return 0.0;
        };
        match self.uptime_ticks() {
            Some(uptime) => lifetime_cpu_percent(busy_ticks(&stat), stat.starttime, uptime),
            None => 0.0,
        }
    }

    /// Builds a full record for one process.
    ///
    /// Each source file is read independently; whatever fails leaves its
    /// fields at their defaults. Fails only with [`SnapshotError::Vanished`]
    /// when the process directory is gone.
    pub fn read_process_record(&self, pid: Pid) -> SnapshotResult<ProcessRecord> {
        let process = self.open_process(pid).map_err(|e| {
            trace!(pid, error = %e, "Process directory unavailable");
            SnapshotError::Vanished { pid }
        })?;

        let mut record = ProcessRecord::new(pid);

        let stat = process.stat().ok();
        if let Some(stat) = &stat {
            record.name = stat.comm.clone();
            record.state = stat.state.to_string();
            record.parent_pid = Pid::try_from(stat.ppid).unwrap_or_default();
            record.threads = u32::try_from(stat.num_threads).unwrap_or_default();
            record.nice = i32::try_from(stat.nice).unwrap_or_default();
            record.start_time = stat.starttime;
        }

        if let Ok(status) = process.status() {
            if record.name.is_empty() {
                record.name = status.name;
            }
            record.uid = status.ruid;
            if let Ok(ppid) = Pid::try_from(status.ppid) {
                record.parent_pid = ppid;
            }
            if let Ok(threads) = u32::try_from(status.threads) {
                record.threads = threads;
            }
            // "S (sleeping)" -> "S"
            if let Some(code) = status.state.split_whitespace().next() {
                record.state = code.to_string();
            }
            record.resident_set_size_kb = status.vmrss.unwrap_or_default();
            record.virtual_memory_kb = status.vmsize.unwrap_or_default();
        }

        if let Ok(args) = process.cmdline() {
            record.cmd_line = args.join(" ");
        }

        if let (Some(stat), Some(uptime)) = (&stat, self.uptime_ticks()) {
            record.elapsed_time = elapsed_seconds(stat.starttime, uptime, self.ticks_per_second);
            record.cpu_usage = lifetime_cpu_percent(busy_ticks(stat), stat.starttime, uptime);
        }

        let oom_score_adj = process.oom_score_adj().ok().map(i32::from);
        record.is_foreground = self.policy.is_foreground(oom_score_adj);

        if let Some(group) = process.cgroups().ok().and_then(|groups| groups.0.into_iter().next()) {
            record.cgroup = group.pathname;
        }
        if let Ok(exe) = process.exe() {
            record.executable_path = exe.to_string_lossy().into_owned();
        }

        // Nothing readable and the directory is gone: the process exited mid-read.
        if stat.is_none() && !self.process_dir(pid).is_dir() {
            return Err(SnapshotError::Vanished { pid });
        }

        trace!(pid, name = %record.name, "Read process record");
        Ok(record)
    }

    fn process_dir(&self, pid: Pid) -> PathBuf {
        self.proc_root.join(pid.to_string())
    }

    fn open_process(&self, pid: Pid) -> procfs::ProcResult<Process> {
        Process::new_with_root(self.process_dir(pid))
    }

    /// Tick rate and page size for the procfs parsers; boot time is unused.
    fn system_info(&self) -> ExplicitSystemInfo {
        ExplicitSystemInfo {
            boot_time_secs: 0,
            ticks_per_second: self.ticks_per_second,
            page_size: procfs::page_size(),
            is_little_endian: cfg!(target_endian = "little"),
        }
    }
}

fn cpu_sample(time: &CpuTime) -> CpuSample {
    CpuSample {
        user: time.user,
        nice: time.nice,
        system: time.system,
        idle: time.idle,
        iowait: time.iowait.unwrap_or_default(),
        irq: time.irq.unwrap_or_default(),
        softirq: time.softirq.unwrap_or_default(),
        steal: time.steal.unwrap_or_default(),
    }
}

/// User plus system ticks of the process itself (children excluded).
fn busy_ticks(stat: &Stat) -> u64 {
    stat.utime.saturating_add(stat.stime)
}
