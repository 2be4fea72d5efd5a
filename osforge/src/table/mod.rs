//! Partitioning-table backends.
//!
//! [`Disk`](crate::layout::Disk) drives a [`PartitionTable`] to query
//! device geometry, stage entries and finally write the table.
//! [`SfdiskTable`] shells out to the real tools; [`MemoryTable`]
//! simulates the same contract for dry runs and tests.

mod memory;
mod sfdisk;

pub use memory::MemoryTable;
pub use sfdisk::SfdiskTable;

use std::path::{Path, PathBuf};

use crate::errors::{LayoutError, OsforgeResult};

/// Geometry reported for an opened device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceGeometry {
    pub sector_size: u32,
    pub total_sectors: u64,
}

impl DeviceGeometry {
    pub fn total_bytes(&self) -> u64 {
        self.total_sectors * u64::from(self.sector_size)
    }
}

/// One staged partition-table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// Entry number in the table, 1-based.
    pub number: u32,
    /// First sector.
    pub start: u64,
    /// Length in sectors, always at least 1.
    pub length: u64,
    /// Device node the kernel exposes for this entry.
    pub node: PathBuf,
}

impl TableEntry {
    /// Last sector covered by this entry.
    pub fn end(&self) -> u64 {
        self.start + self.length - 1
    }
}

/// The partitioning backend a [`Disk`](crate::layout::Disk) drives.
///
/// `open_device` must be called for a device before any other method
/// touches it; `Disk::open_for_overwrite` guarantees that ordering.
/// Entries staged by `add_table_entry` only reach the device at
/// `commit_table`.
pub trait PartitionTable: Send + Sync {
    /// Query geometry and register the device with the backend.
    fn open_device(&self, device: &Path) -> OsforgeResult<DeviceGeometry>;

    /// Destroy any existing table, leaving a fresh empty label.
    fn clear_table(&self, device: &Path) -> OsforgeResult<()>;

    /// First usable sector of the free region.
    fn free_region_start(&self, device: &Path) -> OsforgeResult<u64>;

    /// Stage an entry. The backend may trim `length` to the device
    /// end; the returned entry reports the actual geometry.
    fn add_table_entry(&self, device: &Path, start: u64, length: u64)
    -> OsforgeResult<TableEntry>;

    /// Check structural consistency of the staged table.
    fn validate(&self, device: &Path) -> OsforgeResult<bool>;

    /// Write the staged table to the device.
    fn commit_table(&self, device: &Path) -> OsforgeResult<()>;
}

/// Device node for entry `number` on `device`.
///
/// Devices whose name ends in a digit get a `p` infix (`nvme0n1` →
/// `nvme0n1p1`, `loop0` → `loop0p1`); the rest append the number
/// directly (`vda` → `vda1`).
pub fn partition_node(device: &Path, number: u32) -> PathBuf {
    let name = device.as_os_str().to_string_lossy();
    if name.chars().next_back().is_some_and(|c| c.is_ascii_digit()) {
        PathBuf::from(format!("{name}p{number}"))
    } else {
        PathBuf::from(format!("{name}{number}"))
    }
}

/// Trim a staged entry to the device end.
///
/// Fails when `start` is already past the end or no usable sector
/// remains at it.
pub(crate) fn clamp_length(
    device: &Path,
    start: u64,
    length: u64,
    total_sectors: u64,
) -> Result<u64, LayoutError> {
    if start >= total_sectors {
        return Err(LayoutError::table_integrity(
            device.display().to_string(),
            format!("start sector {start} beyond device end {total_sectors}"),
        ));
    }
    let clamped = length.min(total_sectors - start);
    if clamped == 0 {
        return Err(LayoutError::table_integrity(
            device.display().to_string(),
            format!("no usable sectors at {start}"),
        ));
    }
    Ok(clamped)
}
