//! Per-process snapshot record.

/// Kernel process identifier.
pub type Pid = u32;

/// One process's point-in-time attributes.
///
/// Built fresh for every snapshot request and never mutated afterwards.
/// Every field falls back to zero/empty when its OS source could not be
/// read (the process may be racing exit), so a record with partial data
/// is still a valid record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessRecord {
    /// Process ID
    pub pid: Pid,

    /// Short name (`comm`)
    pub name: String,

    /// Parent process ID
    pub parent_pid: Pid,

    /// Real user ID of the owner
    pub uid: u32,

    /// Scheduling nice value
    pub nice: i32,

    /// Single-character lifecycle state code (`R`, `S`, `Z`, ...), empty if unknown
    pub state: String,

    /// Number of threads
    pub threads: u32,

    /// Start time in clock ticks since boot
    pub start_time: u64,

    /// Wall time since start, in seconds
    pub elapsed_time: f32,

    /// Resident set size in KiB
    pub resident_set_size_kb: u64,

    /// Virtual memory size in KiB
    pub virtual_memory_kb: u64,

    /// CPU utilisation averaged over the process lifetime (percent)
    pub cpu_usage: f32,

    /// Foreground classification from the configured policy
    pub is_foreground: bool,

    /// Control group path, empty if unknown
    pub cgroup: String,

    /// Resolved executable path, empty if unknown
    pub executable_path: String,

    /// Full command line with argument separators normalised to spaces
    pub cmd_line: String,
}

impl ProcessRecord {
    /// Creates an empty record for a process ID.
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            ..Self::default()
        }
    }

    /// Memory usage reported to the supervisor (same as resident set size).
    pub fn memory_usage_kb(&self) -> u64 {
        self.resident_set_size_kb
    }
}
