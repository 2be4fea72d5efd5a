//! In-memory partitioning backend for dry runs and tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{DeviceGeometry, PartitionTable, TableEntry, clamp_length, partition_node};
use crate::errors::OsforgeResult;

/// First sector handed out on a fresh label, matching the alignment
/// real partitioners reserve in front of the first entry.
const FIRST_USABLE_SECTOR: u64 = 2048;

struct DeviceState {
    geometry: DeviceGeometry,
    entries: Vec<TableEntry>,
    clear_count: u32,
    commit_count: u32,
}

/// A partitioning backend that never touches hardware.
///
/// Devices are declared up front with a synthetic geometry; opening,
/// staging, validation and commit then follow the same contract as
/// the sfdisk backend. Backs the dry-run planning path and the
/// engine's tests.
#[derive(Default)]
pub struct MemoryTable {
    devices: Mutex<HashMap<PathBuf, DeviceState>>,
    force_invalid: AtomicBool,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a simulated device so it can be opened.
    pub fn declare_device(&self, device: impl Into<PathBuf>, sector_size: u32, total_sectors: u64) {
        self.devices.lock().insert(
            device.into(),
            DeviceState {
                geometry: DeviceGeometry {
                    sector_size,
                    total_sectors,
                },
                entries: Vec::new(),
                clear_count: 0,
                commit_count: 0,
            },
        );
    }

    /// Make every subsequent `validate` report an inconsistent table.
    pub fn fail_validation(&self) {
        self.force_invalid.store(true, Ordering::Relaxed);
    }

    /// Entries currently staged for `device`, in stage order.
    pub fn entries(&self, device: &Path) -> Vec<TableEntry> {
        self.devices
            .lock()
            .get(device)
            .map_or_else(Vec::new, |state| state.entries.clone())
    }

    /// How often the table on `device` has been cleared.
    pub fn clear_count(&self, device: &Path) -> u32 {
        self.devices
            .lock()
            .get(device)
            .map_or(0, |state| state.clear_count)
    }

    /// How often the staged table for `device` has been committed.
    pub fn commit_count(&self, device: &Path) -> u32 {
        self.devices
            .lock()
            .get(device)
            .map_or(0, |state| state.commit_count)
    }

    fn with_device<T>(
        &self,
        device: &Path,
        f: impl FnOnce(&mut DeviceState) -> OsforgeResult<T>,
    ) -> OsforgeResult<T> {
        let mut devices = self.devices.lock();
        let state = devices.get_mut(device).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("device not declared: {}", device.display()),
            )
        })?;
        f(state)
    }
}

impl PartitionTable for MemoryTable {
    fn open_device(&self, device: &Path) -> OsforgeResult<DeviceGeometry> {
        self.with_device(device, |state| Ok(state.geometry))
    }

    fn clear_table(&self, device: &Path) -> OsforgeResult<()> {
        self.with_device(device, |state| {
            state.entries.clear();
            state.clear_count += 1;
            Ok(())
        })
    }

    fn free_region_start(&self, device: &Path) -> OsforgeResult<u64> {
        self.with_device(device, |state| {
            Ok(state
                .entries
                .last()
                .map_or(FIRST_USABLE_SECTOR, |entry| entry.end() + 1))
        })
    }

    fn add_table_entry(
        &self,
        device: &Path,
        start: u64,
        length: u64,
    ) -> OsforgeResult<TableEntry> {
        self.with_device(device, |state| {
            let length = clamp_length(device, start, length, state.geometry.total_sectors)?;
            let number = state.entries.len() as u32 + 1;
            let entry = TableEntry {
                number,
                start,
                length,
                node: partition_node(device, number),
            };
            state.entries.push(entry.clone());
            Ok(entry)
        })
    }

    fn validate(&self, device: &Path) -> OsforgeResult<bool> {
        if self.force_invalid.load(Ordering::Relaxed) {
            return Ok(false);
        }
        self.with_device(device, |state| {
            let ordered = state
                .entries
                .windows(2)
                .all(|pair| pair[0].end() < pair[1].start);
            Ok(ordered && state.entries.len() <= 4)
        })
    }

    fn commit_table(&self, device: &Path) -> OsforgeResult<()> {
        self.with_device(device, |state| {
            state.commit_count += 1;
            Ok(())
        })
    }
}
