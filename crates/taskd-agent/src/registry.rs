//! Process registry snapshot.
//!
//! Enumerates the live process IDs under the proc root and builds one
//! [`ProcessRecord`] per ID. Processes are created and destroyed while the
//! pass runs; an ID that vanishes between listing and reading is simply
//! left out.

use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use taskd_core::{Pid, ProcessRecord, SnapshotError};
use tracing::{debug, warn};

use crate::snapshot::SnapshotReader;

/// Builds process-list snapshots on top of a [`SnapshotReader`].
#[derive(Clone)]
pub struct ProcessRegistry {
    reader: Arc<SnapshotReader>,
}

impl ProcessRegistry {
    pub fn new(reader: Arc<SnapshotReader>) -> Self {
        Self { reader }
    }

    /// Numeric entries of the proc root, ascending.
    ///
    /// An unreadable root yields an empty set.
    pub fn list_process_ids(&self) -> BTreeSet<Pid> {
        let root = self.reader.proc_root();
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                let error = SnapshotError::Enumeration {
                    root: root.display().to_string(),
                    reason: e.to_string(),
                };
                warn!(error = %error, "Process enumeration failed");
                return BTreeSet::new();
            }
        };

        entries
            .flatten()
            .filter_map(|entry| parse_pid_entry(entry.file_name().to_str()?))
            .collect()
    }

    /// Reads a record for each ID, dropping those that have vanished.
    ///
    /// The result is ordered by pid.
    pub fn collect<I>(&self, ids: I) -> Vec<ProcessRecord>
    where
        I: IntoIterator<Item = Pid>,
    {
        let ids: BTreeSet<Pid> = ids.into_iter().collect();
        let mut records = Vec::with_capacity(ids.len());
        for pid in ids {
            match self.reader.read_process_record(pid) {
                Ok(record) => records.push(record),
                Err(e) => debug!(pid, error = %e, "Skipping process"),
            }
        }
        records
    }

    /// Snapshot of every live process, ordered by pid.
    pub fn collect_all(&self) -> Vec<ProcessRecord> {
        let records = self.collect(self.list_process_ids());
        debug!(count = records.len(), "Collected process list");
        records
    }
}

/// Accepts only the kernel's own spelling of a pid: plain decimal digits
/// with no sign or leading zero, so the name maps back to the same directory.
fn parse_pid_entry(name: &str) -> Option<Pid> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let pid: Pid = name.parse().ok()?;
    (pid.to_string() == name).then_some(pid)
}
