//! The disk aggregate: allocation, the grow policy, and commit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{LayoutError, OsforgeResult, SpecError};
use crate::gateway::FilesystemGateway;
use crate::layout::fstype::FsKind;
use crate::layout::partition::Partition;
use crate::layout::units::SizeSpec;
use crate::table::{DeviceGeometry, PartitionTable};

/// Free space below this is not worth growing into; the grow
/// partition keeps its floor when less remains.
pub const GROW_DUST_THRESHOLD: u64 = 512;

/// Slots available in the 4-entry primary table.
const SLOT_RANGE: std::ops::RangeInclusive<u32> = 1..=4;

/// One device's partition layout, from empty table to committed state.
///
/// A disk is built up with [`add_partition`](Self::add_partition)
/// calls and finalized with a single [`commit`](Self::commit). All
/// accounting is in bytes against the device capacity reported at
/// open; sector geometry only exists once entries are staged through
/// the table backend.
pub struct Disk {
    id: u32,
    device: PathBuf,
    table: Arc<dyn PartitionTable>,
    geometry: DeviceGeometry,
    // kept sorted by slot
    partitions: Vec<Partition>,
    grow_slot: Option<u32>,
    committed: bool,
}

impl Disk {
    /// Open `device` for a destructive re-layout.
    ///
    /// Queries geometry through the table backend and clears any
    /// pre-existing partition table; whatever the device held before
    /// is unrecoverable after this call.
    pub fn open_for_overwrite(
        id: u32,
        device: impl Into<PathBuf>,
        table: Arc<dyn PartitionTable>,
    ) -> OsforgeResult<Self> {
        let device = device.into();
        let geometry = table.open_device(&device)?;
        if geometry.sector_size == 0 {
            return Err(LayoutError::InvalidSectorSize(0).into());
        }
        table.clear_table(&device)?;
        tracing::info!(
            disk = id,
            device = %device.display(),
            sector_size = geometry.sector_size,
            total_sectors = geometry.total_sectors,
            "opened device for overwrite"
        );
        Ok(Self {
            id,
            device,
            table,
            geometry,
            partitions: Vec::new(),
            grow_slot: None,
            committed: false,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn sector_size(&self) -> u32 {
        self.geometry.sector_size
    }

    pub fn total_sectors(&self) -> u64 {
        self.geometry.total_sectors
    }

    pub fn total_bytes(&self) -> u64 {
        self.geometry.total_bytes()
    }

    /// Bytes claimed by the current partitions (grow floors included).
    pub fn used_bytes(&self) -> u64 {
        self.partitions.iter().map(|p| p.size_bytes()).sum()
    }

    pub fn free_bytes(&self) -> u64 {
        self.total_bytes().saturating_sub(self.used_bytes())
    }

    /// Whole sectors claimed by the current partitions.
    pub fn used_sectors(&self) -> u64 {
        // sector_size is validated non-zero at open
        let sector_size = u64::from(self.geometry.sector_size);
        self.partitions
            .iter()
            .map(|p| p.size_bytes() / sector_size)
            .sum()
    }

    pub fn free_sectors(&self) -> u64 {
        self.geometry.total_sectors.saturating_sub(self.used_sectors())
    }

    /// Partitions in slot order.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn partition_by_slot(&self, slot: u32) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.slot() == slot)
    }

    /// Slot of the designated grow partition, if any.
    pub fn grow_slot(&self) -> Option<u32> {
        self.grow_slot
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    // ========================================================================
    // Layout assembly
    // ========================================================================

    /// Add a partition request to the layout.
    ///
    /// Checks run in a fixed order: size token, grow policy, slot,
    /// mount path, free space. Nothing mutates unless every check
    /// passes, so a failed call leaves the disk exactly as it was.
    pub fn add_partition(
        &mut self,
        slot: u32,
        size_token: &str,
        fstype: FsKind,
        mount_path: Option<&str>,
    ) -> OsforgeResult<()> {
        let size = SizeSpec::parse(size_token)?;

        if size.grows()
            && let Some(existing) = self.grow_slot
        {
            return Err(LayoutError::MultipleGrowPartitions {
                existing,
                requested: slot,
            }
            .into());
        }

        if !SLOT_RANGE.contains(&slot) {
            return Err(LayoutError::InvalidSlot(slot).into());
        }
        if self.partition_by_slot(slot).is_some() {
            return Err(LayoutError::DuplicateSlot(slot).into());
        }

        match mount_path {
            None if !fstype.is_swap() => return Err(SpecError::MissingMountPath.into()),
            Some(path) if fstype.is_swap() => {
                return Err(SpecError::InvalidMountPath(path.to_string()).into());
            }
            Some(path) if !path.starts_with('/') => {
                return Err(SpecError::InvalidMountPath(path.to_string()).into());
            }
            Some(path) => {
                if self.partitions.iter().any(|p| p.mount_path() == Some(path)) {
                    return Err(LayoutError::DuplicateMountPath(path.to_string()).into());
                }
            }
            None => {}
        }

        let free = self.free_bytes();
        if size.bytes() > free {
            return Err(LayoutError::InsufficientSpace {
                requested: size.bytes(),
                available: free,
            }
            .into());
        }

        tracing::debug!(
            disk = self.id,
            slot,
            bytes = size.bytes(),
            grow = size.grows(),
            fstype = %fstype,
            "partition added to layout"
        );
        if size.grows() {
            self.grow_slot = Some(slot);
        }
        let at = self.partitions.partition_point(|p| p.slot() < slot);
        self.partitions.insert(
            at,
            Partition::new(slot, size, fstype, mount_path.map(str::to_string)),
        );
        Ok(())
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Commit the layout to the device.
    ///
    /// One shot: growth resolution, table entries staged in slot
    /// order, backend verification, table write, then filesystem
    /// creation per partition. A second call fails with
    /// [`LayoutError::AlreadyCommitted`] whatever the first attempt
    /// returned, since the table may already have been rewritten.
    pub fn commit(&mut self, gateway: &dyn FilesystemGateway) -> OsforgeResult<()> {
        if self.committed {
            return Err(LayoutError::AlreadyCommitted.into());
        }
        self.committed = true;

        self.resolve_growth();

        tracing::info!(
            disk = self.id,
            device = %self.device.display(),
            partitions = self.partitions.len(),
            "committing partition layout"
        );

        let mut start = self.table.free_region_start(&self.device)?;
        let sector_size = self.geometry.sector_size;
        for partition in &mut self.partitions {
            let length = partition.size_sectors(sector_size)?;
            let entry = self.table.add_table_entry(&self.device, start, length)?;
            tracing::debug!(
                disk = self.id,
                slot = partition.slot(),
                start = entry.start,
                length = entry.length,
                node = %entry.node.display(),
                "table entry staged"
            );
            start = entry.end() + 1;
            partition.set_table_entry(entry);
        }

        if !self.table.validate(&self.device)? {
            return Err(LayoutError::table_integrity(
                self.device.display().to_string(),
                "backend rejected the staged table",
            )
            .into());
        }
        self.table.commit_table(&self.device)?;
        tracing::info!(disk = self.id, device = %self.device.display(), "partition table committed");

        self.create_filesystems(gateway)
    }

    /// Raise the grow partition to absorb remaining free space.
    ///
    /// The only point a partition's size changes after it was added.
    fn resolve_growth(&mut self) {
        let Some(slot) = self.grow_slot else {
            return;
        };
        let free = self.free_bytes();
        if free < GROW_DUST_THRESHOLD {
            tracing::debug!(
                disk = self.id,
                slot,
                free_bytes = free,
                "free space below dust threshold, grow partition keeps its floor"
            );
            return;
        }
        if let Some(partition) = self.partitions.iter_mut().find(|p| p.slot() == slot) {
            let new_size = partition.size_bytes() + free;
            tracing::info!(
                disk = self.id,
                slot,
                from_bytes = partition.size_bytes(),
                to_bytes = new_size,
                "growing partition to absorb free space"
            );
            partition.resolve_growth(new_size);
        }
    }

    fn create_filesystems(&self, gateway: &dyn FilesystemGateway) -> OsforgeResult<()> {
        for partition in &self.partitions {
            if let Some(entry) = partition.table_entry() {
                gateway
                    .create_filesystem(&entry.node, partition.fstype())
                    .map_err(|source| LayoutError::FilesystemCreation {
                        slot: partition.slot(),
                        source,
                    })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ExecError, OsforgeError};
    use crate::gateway::RecordingGateway;
    use crate::table::MemoryTable;

    const SECTOR: u32 = 512;

    fn disk_with_bytes(total_bytes: u64) -> (Disk, Arc<MemoryTable>) {
        let table = Arc::new(MemoryTable::new());
        table.declare_device("/dev/vda", SECTOR, total_bytes / u64::from(SECTOR));
        let disk = Disk::open_for_overwrite(0, "/dev/vda", table.clone()).unwrap();
        (disk, table)
    }

    #[test]
    fn test_open_clears_existing_table() {
        let (_disk, table) = disk_with_bytes(10_000_000_000);
        assert_eq!(table.clear_count(Path::new("/dev/vda")), 1);
    }

    #[test]
    fn test_add_partition_accounts_space() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "4000000000", FsKind::Ext4, Some("/"))
            .unwrap();
        assert_eq!(disk.used_bytes(), 4_000_000_000);
        assert_eq!(disk.free_bytes(), 6_000_000_000);
        assert_eq!(disk.used_sectors(), 4_000_000_000 / 512);
    }

    #[test]
    fn test_add_partition_rejects_bad_slots() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        for slot in [0, 5, 17] {
            let err = disk
                .add_partition(slot, "1g", FsKind::Ext4, Some("/data"))
                .unwrap_err();
            assert!(
                matches!(err, OsforgeError::Layout(LayoutError::InvalidSlot(s)) if s == slot),
                "slot {slot} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_add_partition_rejects_duplicate_slot() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "1g", FsKind::Ext4, Some("/")).unwrap();
        let err = disk
            .add_partition(1, "1g", FsKind::Ext3, Some("/var"))
            .unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Layout(LayoutError::DuplicateSlot(1))
        ));
    }

    #[test]
    fn test_add_partition_mount_path_rules() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);

        let err = disk.add_partition(1, "1g", FsKind::Ext4, None).unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Spec(SpecError::MissingMountPath)
        ));

        let err = disk
            .add_partition(1, "1g", FsKind::Ext4, Some("data"))
            .unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Spec(SpecError::InvalidMountPath(_))
        ));

        let err = disk
            .add_partition(1, "1g", FsKind::Swap, Some("/swap"))
            .unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Spec(SpecError::InvalidMountPath(_))
        ));
    }

    #[test]
    fn test_add_partition_rejects_duplicate_mount_path() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "1g", FsKind::Ext4, Some("/data"))
            .unwrap();
        let err = disk
            .add_partition(2, "1g", FsKind::Ext3, Some("/data"))
            .unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Layout(LayoutError::DuplicateMountPath(_))
        ));
    }

    #[test]
    fn test_two_swap_partitions_are_legal() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "512m", FsKind::Swap, None).unwrap();
        disk.add_partition(2, "512m", FsKind::Swap, None).unwrap();
        assert_eq!(disk.partitions().len(), 2);
    }

    #[test]
    fn test_add_partition_rejects_second_grow() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "1g+", FsKind::Ext4, Some("/")).unwrap();
        let err = disk
            .add_partition(2, "1g+", FsKind::Ext3, Some("/var"))
            .unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Layout(LayoutError::MultipleGrowPartitions {
                existing: 1,
                requested: 2,
            })
        ));
    }

    #[test]
    fn test_grow_conflict_is_checked_before_slot() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "1g+", FsKind::Ext4, Some("/")).unwrap();
        // slot 9 is also invalid, but the grow conflict wins
        let err = disk
            .add_partition(9, "1g+", FsKind::Ext3, Some("/var"))
            .unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Layout(LayoutError::MultipleGrowPartitions { .. })
        ));
    }

    #[test]
    fn test_add_partition_rejects_insufficient_space() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        let err = disk
            .add_partition(1, "20000000000", FsKind::Ext4, Some("/"))
            .unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Layout(LayoutError::InsufficientSpace {
                requested: 20_000_000_000,
                available: 10_000_000_000,
            })
        ));
        assert_eq!(disk.used_bytes(), 0);
        assert!(disk.partitions().is_empty());
    }

    #[test]
    fn test_exact_fit_is_accepted() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "10000000000", FsKind::Ext4, Some("/"))
            .unwrap();
        assert_eq!(disk.free_bytes(), 0);
    }

    #[test]
    fn test_failed_add_leaves_disk_unchanged() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "1g+", FsKind::Ext4, Some("/")).unwrap();
        let used_before = disk.used_bytes();

        // fails on the duplicate path, after the grow flag would have
        // been eligible for recording
        let err = disk
            .add_partition(2, "1g", FsKind::Ext3, Some("/"))
            .unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Layout(LayoutError::DuplicateMountPath(_))
        ));
        assert_eq!(disk.used_bytes(), used_before);
        assert_eq!(disk.partitions().len(), 1);
        assert_eq!(disk.grow_slot(), Some(1));
    }

    #[test]
    fn test_failed_grow_add_does_not_claim_grow_slot() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        let err = disk
            .add_partition(7, "1g+", FsKind::Ext4, Some("/"))
            .unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Layout(LayoutError::InvalidSlot(7))
        ));
        assert_eq!(disk.grow_slot(), None);

        // the slot is still available for a valid grow partition
        disk.add_partition(1, "1g+", FsKind::Ext4, Some("/")).unwrap();
        assert_eq!(disk.grow_slot(), Some(1));
    }

    #[test]
    fn test_partitions_iterate_in_slot_order() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(3, "1g", FsKind::Ext4, Some("/home"))
            .unwrap();
        disk.add_partition(1, "1g", FsKind::Ext4, Some("/")).unwrap();
        disk.add_partition(2, "1g", FsKind::Swap, None).unwrap();

        let slots: Vec<u32> = disk.partitions().iter().map(|p| p.slot()).collect();
        assert_eq!(slots, vec![1, 2, 3]);
        assert_eq!(disk.partition_by_slot(2).unwrap().fstype(), FsKind::Swap);
        assert!(disk.partition_by_slot(4).is_none());
    }

    #[test]
    fn test_commit_resolves_growth_to_all_free_space() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "4000000000", FsKind::Ext4, Some("/"))
            .unwrap();
        disk.add_partition(2, "1000000+", FsKind::Swap, None).unwrap();

        let gateway = RecordingGateway::new();
        disk.commit(&gateway).unwrap();

        let grown = disk.partition_by_slot(2).unwrap();
        assert_eq!(grown.size_bytes(), 10_000_000_000 - 4_000_000_000);
        assert_eq!(disk.free_bytes(), 0);
        assert!(disk.is_committed());
    }

    #[test]
    fn test_commit_skips_growth_below_dust_threshold() {
        let (mut disk, _table) = disk_with_bytes(1_073_741_824);
        disk.add_partition(1, "500000000", FsKind::Ext4, Some("/"))
            .unwrap();
        // leaves 300 bytes free, below the 512-byte threshold
        disk.add_partition(2, "573741524+", FsKind::Ext3, Some("/data"))
            .unwrap();
        assert_eq!(disk.free_bytes(), 300);

        let gateway = RecordingGateway::new();
        disk.commit(&gateway).unwrap();
        assert_eq!(
            disk.partition_by_slot(2).unwrap().size_bytes(),
            573_741_524
        );
    }

    #[test]
    fn test_commit_stages_entries_and_creates_filesystems_in_slot_order() {
        let (mut disk, table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(2, "512m", FsKind::Swap, None).unwrap();
        disk.add_partition(1, "1g", FsKind::Ext4, Some("/")).unwrap();

        let gateway = RecordingGateway::new();
        disk.commit(&gateway).unwrap();

        let device = Path::new("/dev/vda");
        let entries = table.entries(device);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start, 2048);
        assert_eq!(entries[0].length, (1u64 << 30) / 512);
        assert_eq!(entries[1].start, entries[0].end() + 1);
        assert_eq!(table.commit_count(device), 1);

        // slot 1 formatted before slot 2
        let created = gateway.created();
        assert_eq!(
            created,
            vec![
                (PathBuf::from("/dev/vda1"), FsKind::Ext4),
                (PathBuf::from("/dev/vda2"), FsKind::Swap),
            ]
        );

        // partitions carry their table entries after commit
        let root = disk.partition_by_slot(1).unwrap();
        assert_eq!(root.device_node(), Some(Path::new("/dev/vda1")));
    }

    #[test]
    fn test_commit_twice_fails() {
        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "1g", FsKind::Ext4, Some("/")).unwrap();

        let gateway = RecordingGateway::new();
        disk.commit(&gateway).unwrap();
        let err = disk.commit(&gateway).unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Layout(LayoutError::AlreadyCommitted)
        ));
    }

    #[test]
    fn test_failed_commit_is_not_reenterable() {
        let (mut disk, table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "1g", FsKind::Ext4, Some("/")).unwrap();
        table.fail_validation();

        let gateway = RecordingGateway::new();
        let err = disk.commit(&gateway).unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Layout(LayoutError::TableIntegrity { .. })
        ));
        assert!(gateway.created().is_empty());

        let err = disk.commit(&gateway).unwrap_err();
        assert!(matches!(
            err,
            OsforgeError::Layout(LayoutError::AlreadyCommitted)
        ));
    }

    #[test]
    fn test_filesystem_failure_names_slot_and_stops() {
        struct FailOnSecond {
            calls: parking_lot::Mutex<u32>,
        }

        impl FilesystemGateway for FailOnSecond {
            fn create_filesystem(&self, _device: &Path, _fstype: FsKind) -> Result<(), ExecError> {
                let mut calls = self.calls.lock();
                *calls += 1;
                if *calls >= 2 {
                    return Err(ExecError::failed("mkswap", Some(1), "device busy"));
                }
                Ok(())
            }

            fn check_filesystem(
                &self,
                _device: &Path,
                _fstype: FsKind,
                _passes: u32,
            ) -> Result<(), ExecError> {
                Ok(())
            }
        }

        let (mut disk, _table) = disk_with_bytes(10_000_000_000);
        disk.add_partition(1, "1g", FsKind::Ext4, Some("/")).unwrap();
        disk.add_partition(2, "512m", FsKind::Swap, None).unwrap();
        disk.add_partition(3, "1g", FsKind::Ext3, Some("/var")).unwrap();

        let gateway = FailOnSecond {
            calls: parking_lot::Mutex::new(0),
        };
        let err = disk.commit(&gateway).unwrap_err();
        match err {
            OsforgeError::Layout(LayoutError::FilesystemCreation { slot, .. }) => {
                assert_eq!(slot, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // slot 3 was never attempted
        assert_eq!(*gateway.calls.lock(), 2);
    }
}
