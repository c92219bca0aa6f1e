//! Snapshot reader and registry tests against fake proc/sys trees.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use taskd_agent::{ProcessRegistry, SnapshotReader};
use taskd_core::{OomScoreThreshold, Reading, SnapshotError, SwapUsage};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

struct Fixture {
    _temp_dir: TempDir,
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let proc_root = temp_dir.path().join("proc");
        let sys_root = temp_dir.path().join("sys");
        fs::create_dir_all(&proc_root).unwrap();
        fs::create_dir_all(&sys_root).unwrap();
        Self {
            _temp_dir: temp_dir,
            proc_root,
            sys_root,
        }
    }

    fn proc(&self, rel: &str, contents: &str) {
        write(&self.proc_root, rel, contents);
    }

    fn sys(&self, rel: &str, contents: &str) {
        write(&self.sys_root, rel, contents);
    }

    fn thermal_zone(&self, index: u32, kind: &str, temp: &str) {
        self.sys(&format!("class/thermal/thermal_zone{index}/type"), kind);
        self.sys(&format!("class/thermal/thermal_zone{index}/temp"), temp);
    }

    fn process(&self, pid: u32, comm: &str) {
        self.proc(&format!("{pid}/stat"), &stat_line(pid, comm, 'S', 1));
    }

    fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(&self.proc_root, &self.sys_root)
            .with_ticks_per_second(100)
            .with_cpu_interval(Duration::from_millis(5))
    }

    fn registry(&self) -> ProcessRegistry {
        ProcessRegistry::new(Arc::new(self.reader()))
    }
}

/// A full `/proc/<pid>/stat` line with fixed CPU times.
fn stat_line(pid: u32, comm: &str, state: char, ppid: u32) -> String {
    format!(
        "{pid} ({comm}) {state} {ppid} {pid} {pid} 0 -1 4194560 120 0 0 0 1 1 0 0 20 0 1 0 10 \
         1048576 64 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0\n"
    )
}

/// `/proc/meminfo` with every counter the kernel always reports.
fn meminfo(swap_total_kb: u64, swap_free_kb: u64) -> String {
    format!(
        "MemTotal:        8000000 kB\n\
         MemFree:         2000000 kB\n\
         Buffers:           10000 kB\n\
         Cached:          1000000 kB\n\
         SwapCached:            0 kB\n\
         Active:          3000000 kB\n\
         Inactive:        1500000 kB\n\
         SwapTotal:    {swap_total_kb} kB\n\
         SwapFree:     {swap_free_kb} kB\n\
         Dirty:                 4 kB\n\
         Writeback:             0 kB\n\
         Mapped:           400000 kB\n\
         Slab:             200000 kB\n\
         Committed_AS:    9000000 kB\n\
         VmallocTotal:  263061440 kB\n\
         VmallocUsed:       50000 kB\n\
         VmallocChunk:          0 kB\n"
    )
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_collect_all_orders_by_pid() {
    let fx = Fixture::new();
    for (pid, comm) in [(300, "c"), (2, "a"), (41, "b")] {
        fx.process(pid, comm);
    }
    fx.proc("self/stat", &stat_line(1, "ignored", 'S', 0));

    let records = fx.registry().collect_all();
    let summary: Vec<(u32, &str)> = records.iter().map(|r| (r.pid, r.name.as_str())).collect();
    assert_eq!(summary, vec![(2, "a"), (41, "b"), (300, "c")]);
}

#[test]
fn test_process_vanishing_between_listing_and_reading() {
    let fx = Fixture::new();
    fx.process(10, "stays");
    fx.process(11, "exits");

    let registry = fx.registry();
    let ids = registry.list_process_ids();
    assert_eq!(ids.iter().copied().collect::<Vec<_>>(), vec![10, 11]);

    fs::remove_dir_all(fx.proc_root.join("11")).unwrap();

    let records = registry.collect(ids);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pid, 10);
    assert_eq!(records[0].name, "stays");
}

#[test]
fn test_read_record_of_vanished_pid() {
    let fx = Fixture::new();
    assert_eq!(
        fx.reader().read_process_record(55),
        Err(SnapshotError::Vanished { pid: 55 })
    );
}

#[test]
fn test_name_with_slash_and_colon() {
    let fx = Fixture::new();
    fx.proc("9/stat", &stat_line(9, "kworker/0:1", 'I', 2));
    let record = fx.reader().read_process_record(9).unwrap();
    assert_eq!(record.name, "kworker/0:1");
    assert_eq!(record.state, "I");
    assert_eq!(record.parent_pid, 2);
}

#[test]
fn test_name_containing_parentheses_and_spaces() {
    let fx = Fixture::new();
    fx.proc("12/stat", &stat_line(12, "Web ) R (Content", 'S', 40));
    let record = fx.reader().read_process_record(12).unwrap();
    assert_eq!(record.name, "Web ) R (Content");
    assert_eq!(record.state, "S");
    assert_eq!(record.parent_pid, 40);
}

#[test]
fn test_foreground_threshold_is_configurable() {
    let fx = Fixture::new();
    fx.process(7, "svc");
    fx.proc("7/oom_score_adj", "200\n");

    assert!(!fx.reader().read_process_record(7).unwrap().is_foreground);
    let relaxed = fx.reader().with_policy(OomScoreThreshold::new(250));
    assert!(relaxed.read_process_record(7).unwrap().is_foreground);
}

// ============================================================================
// System metrics
// ============================================================================

#[test]
fn test_system_cpu_usage_is_bounded() {
    let fx = Fixture::new();
    fx.proc(
        "stat",
        "cpu  10 10 10 70 0 0 0 0\nctxt 1\nbtime 1700000000\nprocesses 1\n",
    );
    let usage = fx.reader().system_cpu_usage();
    assert!(usage <= 100);
    assert_eq!(usage, 0);
}

#[test]
fn test_swap_usage() {
    let fx = Fixture::new();
    fx.proc("meminfo", &meminfo(1000, 250));
    assert_eq!(
        fx.reader().swap_usage(),
        SwapUsage {
            used_bytes: 750 * 1024,
            total_bytes: 1000 * 1024,
        }
    );
}

#[test]
fn test_swap_missing_meminfo() {
    let fx = Fixture::new();
    assert_eq!(fx.reader().swap_usage(), SwapUsage::default());
}

// ============================================================================
// Sensors
// ============================================================================

#[test]
fn test_gpu_prefers_adreno_source() {
    let fx = Fixture::new();
    fx.sys("class/kgsl/kgsl-3d0/gpu_busy_percentage", "37 %\n");
    fx.sys("kernel/gpu/gpu_busy", "80\n");
    assert_eq!(fx.reader().gpu_usage(), Reading::Known(37));
}

#[test]
fn test_gpu_falls_back_when_first_source_is_zero() {
    let fx = Fixture::new();
    fx.sys("class/kgsl/kgsl-3d0/gpu_busy_percentage", "0 %\n");
    fx.sys("kernel/gpu/gpu_busy", "12\n");
    assert_eq!(fx.reader().gpu_usage(), Reading::Known(12));
}

#[test]
fn test_gpu_idle_is_unknown() {
    let fx = Fixture::new();
    fx.sys("kernel/gpu/gpu_busy", "0\n");
    assert_eq!(fx.reader().gpu_usage(), Reading::Unknown);
}

#[test]
fn test_cpu_temperature_takes_hottest_cpu_zone() {
    let fx = Fixture::new();
    fx.thermal_zone(0, "cpu-0-0-usr\n", "45300\n");
    fx.thermal_zone(1, "cluster1\n", "51\n");
    fx.thermal_zone(2, "battery\n", "70000\n");
    fx.thermal_zone(3, "soc_thermal\n", "150000\n"); // out of range
    fx.thermal_zone(4, "CPU-big\n", "2000\n"); // 2 C, out of range
    assert_eq!(fx.reader().cpu_temperature(), Reading::Known(51));
}

#[test]
fn test_cpu_temperature_without_cpu_zones() {
    let fx = Fixture::new();
    fx.thermal_zone(0, "battery\n", "30000\n");
    fx.sys("class/thermal/cooling_device0/type", "cpu\n");
    assert_eq!(fx.reader().cpu_temperature(), Reading::Unknown);
}
