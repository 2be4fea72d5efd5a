//! One allocated partition on a disk.

use std::path::Path;

use crate::errors::LayoutError;
use crate::layout::fstype::FsKind;
use crate::layout::units::{self, SizeSpec};
use crate::table::TableEntry;

/// A partition allocated on its owning [`Disk`](crate::layout::Disk).
///
/// The size is provisional until the disk commits: the designated grow
/// partition is raised to absorb remaining free space then, and no
/// size changes after that. The table entry appears only once the
/// owning disk has committed.
#[derive(Debug, Clone)]
pub struct Partition {
    slot: u32,
    size_bytes: u64,
    grow: bool,
    fstype: FsKind,
    mount_path: Option<String>,
    table_entry: Option<TableEntry>,
}

impl Partition {
    pub(crate) fn new(
        slot: u32,
        size: SizeSpec,
        fstype: FsKind,
        mount_path: Option<String>,
    ) -> Self {
        Self {
            slot,
            size_bytes: size.bytes(),
            grow: size.grows(),
            fstype,
            mount_path,
            table_entry: None,
        }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn fstype(&self) -> FsKind {
        self.fstype
    }

    pub fn mount_path(&self) -> Option<&str> {
        self.mount_path.as_deref()
    }

    /// True when this partition absorbs its disk's free space at commit.
    pub fn grows(&self) -> bool {
        self.grow
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Whole sectors this partition occupies at the given sector size.
    pub fn size_sectors(&self, sector_size: u32) -> Result<u64, LayoutError> {
        units::bytes_to_sectors(self.size_bytes, sector_size)
    }

    /// The table entry allocated at commit, absent before then.
    pub fn table_entry(&self) -> Option<&TableEntry> {
        self.table_entry.as_ref()
    }

    /// Host device node for the committed partition.
    pub fn device_node(&self) -> Option<&Path> {
        self.table_entry.as_ref().map(|e| e.node.as_path())
    }

    /// Raise the provisional size to its final value.
    ///
    /// Called exactly once, by the owning disk while committing, and
    /// only on the grow partition.
    pub(crate) fn resolve_growth(&mut self, new_size_bytes: u64) {
        debug_assert!(self.grow, "growth resolved on a fixed-size partition");
        self.size_bytes = new_size_bytes;
    }

    pub(crate) fn set_table_entry(&mut self, entry: TableEntry) {
        self.table_entry = Some(entry);
    }
}
