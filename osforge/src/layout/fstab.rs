//! fstab generation for the provisioned guest.
//!
//! The guest sees its disks as virtio block devices, so entries are
//! written against `/dev/vdXN` nodes derived from each disk's number
//! rather than the host-side nodes used for formatting.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::OsforgeResult;
use crate::layout::disk::Disk;
use crate::layout::fstype::FsKind;
use crate::layout::partition::Partition;

/// A single fstab line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_path: String,
    pub fstype: FsKind,
    pub options: &'static str,
    pub dump_freq: u8,
    pub fsck_pass: u8,
}

impl MountEntry {
    /// Build the entry for a partition on disk number `disk`.
    ///
    /// The root filesystem gets fsck pass 1, other mounted
    /// filesystems pass 2, swap is never checked.
    pub fn derive(disk: u32, partition: &Partition) -> Self {
        let fsck_pass = match partition.mount_path() {
            Some("/") => 1,
            Some(_) => 2,
            None => 0,
        };
        Self {
            device: guest_device_node(disk, partition.slot()),
            mount_path: partition.mount_path().unwrap_or("none").to_string(),
            fstype: partition.fstype(),
            options: "defaults",
            dump_freq: 0,
            fsck_pass,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{}\t\t{}\t\t{}\t{}\t{}\t{}\n",
            self.device,
            self.mount_path,
            self.fstype.as_str(),
            self.options,
            self.dump_freq,
            self.fsck_pass
        )
    }
}

/// Guest-visible device node for slot `slot` on disk number `disk`:
/// `/dev/vda1`, `/dev/vdb3`, and so on.
///
/// The hypervisor attaches every disk of the instance whether or not
/// it gets partitions, so the letter must track the disk number, not
/// the disk's position among the partitioned ones. Letters wrap after
/// `z`; providers do not hand out more than 26 disks in practice.
pub fn guest_device_node(disk: u32, slot: u32) -> String {
    let letter = (b'a' + (disk % 26) as u8) as char;
    format!("/dev/vd{letter}{slot}")
}

/// Render the whole fstab for a set of committed disks.
///
/// Disks are ordered as given and partitions within each disk in slot
/// order, so output is stable for a given layout.
pub fn render_fstab(disks: &[Disk]) -> String {
    let mut out = String::from("# created by osforge\n");
    out.push_str("proc\t\t/proc\t\tproc\tdefaults\t0\t0\n");
    out.push_str("sys\t\t/sys\t\tsysfs\tdefaults\t0\t0\n");
    for disk in disks {
        for partition in disk.partitions() {
            out.push_str(&MountEntry::derive(disk.id(), partition).render());
        }
    }
    out
}

/// Write the rendered fstab under `root`, creating `etc/` if needed.
/// Returns the path written.
pub fn write_fstab(root: &Path, disks: &[Disk]) -> OsforgeResult<PathBuf> {
    let etc = root.join("etc");
    fs::create_dir_all(&etc)?;
    let path = etc.join("fstab");
    fs::write(&path, render_fstab(disks))?;
    tracing::debug!(path = %path.display(), "fstab written");
    Ok(path)
}
