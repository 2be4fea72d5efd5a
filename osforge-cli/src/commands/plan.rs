//! Dry-run layout validation and preview over the in-memory backend.

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use comfy_table::{Table, presets};
use osforge::layout::units::display_bytes;
use osforge::{Disk, MemoryTable, MountEntry, PartitionSpec, RecordingGateway, SizeSpec, render_fstab};

const PLAN_SECTOR_SIZE: u32 = 512;
const DEFAULT_DEVICE_SIZE: &str = "10g";

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Partition spec, disk:slot:size:fstype[:path] (repeatable)
    #[arg(long = "disk", value_name = "SPEC", required = true)]
    pub disks: Vec<String>,

    /// Simulated capacity per disk ordinal (repeatable, defaults to 10g)
    #[arg(long = "device-size", value_name = "SIZE")]
    pub device_sizes: Vec<String>,
}

pub fn execute(args: PlanArgs) -> anyhow::Result<()> {
    let specs: Vec<PartitionSpec> = args
        .disks
        .iter()
        .map(|raw| raw.parse().with_context(|| format!("--disk {raw}")))
        .collect::<anyhow::Result<_>>()?;

    let disk_count = specs.iter().map(|s| s.disk + 1).max().unwrap_or(0);

    let table = Arc::new(MemoryTable::new());
    let mut disks = Vec::with_capacity(disk_count as usize);
    for ordinal in 0..disk_count {
        let size_token = args
            .device_sizes
            .get(ordinal as usize)
            .map_or(DEFAULT_DEVICE_SIZE, String::as_str);
        let bytes = SizeSpec::parse(size_token)
            .with_context(|| format!("--device-size {size_token}"))?
            .bytes();
        let node = format!("/dev/plan{ordinal}");
        table.declare_device(&node, PLAN_SECTOR_SIZE, bytes / u64::from(PLAN_SECTOR_SIZE));
        disks.push(Disk::open_for_overwrite(ordinal, &node, table.clone())?);
    }

    for spec in &specs {
        disks[spec.disk as usize]
            .add_partition(spec.slot, &spec.size, spec.fstype, spec.mount_path.as_deref())
            .with_context(|| format!("disk {} slot {}", spec.disk, spec.slot))?;
    }

    // commit against the simulated backend so grow sizes resolve
    let gateway = RecordingGateway::new();
    for disk in &mut disks {
        disk.commit(&gateway)?;
    }

    let mut layout = Table::new();
    layout.load_preset(presets::UTF8_FULL);
    layout.set_header(vec![
        "DISK", "SLOT", "DEVICE", "SIZE", "FSTYPE", "MOUNT", "FSCK",
    ]);
    for disk in &disks {
        for partition in disk.partitions() {
            let entry = MountEntry::derive(disk.id(), partition);
            let size = if partition.grows() {
                format!("{} (grow)", display_bytes(partition.size_bytes()))
            } else {
                display_bytes(partition.size_bytes())
            };
            layout.add_row(vec![
                disk.id().to_string(),
                partition.slot().to_string(),
                entry.device,
                size,
                entry.fstype.as_str().to_string(),
                entry.mount_path,
                entry.fsck_pass.to_string(),
            ]);
        }
    }

    println!("{layout}");
    println!();
    println!("fstab preview:");
    print!("{}", render_fstab(&disks));
    Ok(())
}
