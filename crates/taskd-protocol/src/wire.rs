//! Process-list wire schema.
//!
//! `WireProcess` is the explicit on-wire shape of one process entry in the
//! `LIST_PROCESS` reply. It is kept separate from [`ProcessRecord`] so the
//! in-memory layout can change without breaking supervisors; field order
//! in the struct is the key order on the wire.

use serde::{Deserialize, Serialize};
use taskd_core::ProcessRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProcess {
    pub pid: u32,
    pub name: String,
    pub nice: i32,
    pub uid: u32,
    pub cpu_usage: f32,
    pub parent_pid: u32,
    pub is_foreground: bool,
    pub memory_usage_kb: u64,
    pub cmd_line: String,
    pub state: String,
    pub threads: u32,
    pub start_time: u64,
    pub elapsed_time: f32,
    pub resident_set_size_kb: u64,
    pub virtual_memory_kb: u64,
    pub cgroup: String,
    pub executable_path: String,
}

impl From<&ProcessRecord> for WireProcess {
    fn from(record: &ProcessRecord) -> Self {
        Self {
            pid: record.pid,
            name: record.name.clone(),
            nice: record.nice,
            uid: record.uid,
            cpu_usage: record.cpu_usage,
            parent_pid: record.parent_pid,
            is_foreground: record.is_foreground,
            memory_usage_kb: record.memory_usage_kb(),
            cmd_line: record.cmd_line.clone(),
            state: record.state.clone(),
            threads: record.threads,
            start_time: record.start_time,
            elapsed_time: record.elapsed_time,
            resident_set_size_kb: record.resident_set_size_kb,
            virtual_memory_kb: record.virtual_memory_kb,
            cgroup: record.cgroup.clone(),
            executable_path: record.executable_path.clone(),
        }
    }
}

impl From<WireProcess> for ProcessRecord {
    fn from(wire: WireProcess) -> Self {
        Self {
            pid: wire.pid,
            name: wire.name,
            parent_pid: wire.parent_pid,
            uid: wire.uid,
            nice: wire.nice,
            state: wire.state,
            threads: wire.threads,
            start_time: wire.start_time,
            elapsed_time: wire.elapsed_time,
            resident_set_size_kb: wire.resident_set_size_kb,
            virtual_memory_kb: wire.virtual_memory_kb,
            cpu_usage: wire.cpu_usage,
            is_foreground: wire.is_foreground,
            cgroup: wire.cgroup,
            executable_path: wire.executable_path,
            cmd_line: wire.cmd_line,
        }
    }
}

/// Encodes records as a compact, single-line JSON array.
///
/// Control characters inside strings are escaped by the serializer, so the
/// result never contains a raw newline.
pub fn encode_process_list(records: &[ProcessRecord]) -> Result<String, serde_json::Error> {
    let wire: Vec<WireProcess> = records.iter().map(WireProcess::from).collect();
    serde_json::to_string(&wire)
}

/// Decodes a process-list payload produced by [`encode_process_list`].
pub fn decode_process_list(payload: &str) -> Result<Vec<WireProcess>, serde_json::Error> {
    serde_json::from_str(payload)
}
