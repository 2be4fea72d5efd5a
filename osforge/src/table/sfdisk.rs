//! Partitioning backend driving sfdisk and blockdev.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{DeviceGeometry, PartitionTable, TableEntry, clamp_length, partition_node};
use crate::errors::{ExecError, LayoutError, OsforgeError, OsforgeResult};
use crate::util::process::{self, ToolInvocation};

struct DeviceState {
    geometry: DeviceGeometry,
    entries: Vec<TableEntry>,
}

/// The real partitioning backend.
///
/// Geometry comes from `blockdev`; entries are staged in memory as an
/// sfdisk script per device and only written out at `commit_table`.
/// `validate` replays the same script through `sfdisk --no-act`, so a
/// table the tool would refuse never reaches the device.
#[derive(Default)]
pub struct SfdiskTable {
    devices: Mutex<HashMap<PathBuf, DeviceState>>,
}

impl SfdiskTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn script_for(&self, device: &Path) -> OsforgeResult<String> {
        let devices = self.devices.lock();
        let state = devices
            .get(device)
            .ok_or_else(|| device_not_opened(device))?;
        Ok(render_script(&state.entries))
    }
}

impl PartitionTable for SfdiskTable {
    fn open_device(&self, device: &Path) -> OsforgeResult<DeviceGeometry> {
        let sector_size = blockdev_number(device, "--getss")?;
        let size_bytes = blockdev_number(device, "--getsize64")?;

        let sector_size = u32::try_from(sector_size).map_err(|_| {
            OsforgeError::from(ExecError::unexpected_output(
                "blockdev",
                format!("implausible sector size {sector_size}"),
            ))
        })?;
        if sector_size == 0 {
            return Err(LayoutError::InvalidSectorSize(0).into());
        }

        let geometry = DeviceGeometry {
            sector_size,
            total_sectors: size_bytes / u64::from(sector_size),
        };
        tracing::debug!(
            device = %device.display(),
            sector_size,
            total_sectors = geometry.total_sectors,
            "queried device geometry"
        );
        self.devices.lock().insert(
            device.to_path_buf(),
            DeviceState {
                geometry,
                entries: Vec::new(),
            },
        );
        Ok(geometry)
    }

    fn clear_table(&self, device: &Path) -> OsforgeResult<()> {
        {
            let mut devices = self.devices.lock();
            let state = devices
                .get_mut(device)
                .ok_or_else(|| device_not_opened(device))?;
            state.entries.clear();
        }
        let inv = ToolInvocation::new("sfdisk").arg(device);
        process::run_with_stdin(&inv, "label: dos\n")?;
        tracing::info!(device = %device.display(), "cleared partition table");
        Ok(())
    }

    fn free_region_start(&self, device: &Path) -> OsforgeResult<u64> {
        {
            let devices = self.devices.lock();
            devices.get(device).ok_or_else(|| device_not_opened(device))?;
        }
        let inv = ToolInvocation::new("sfdisk").arg("-F").arg(device);
        let out = process::run(&inv)?;
        parse_free_region_start(&out.stdout).ok_or_else(|| {
            ExecError::unexpected_output(
                "sfdisk",
                format!("no free region row in output: {:?}", out.stdout.trim()),
            )
            .into()
        })
    }

    fn add_table_entry(
        &self,
        device: &Path,
        start: u64,
        length: u64,
    ) -> OsforgeResult<TableEntry> {
        let mut devices = self.devices.lock();
        let state = devices
            .get_mut(device)
            .ok_or_else(|| device_not_opened(device))?;

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
    }

    fn validate(&self, device: &Path) -> OsforgeResult<bool> {
        let script = self.script_for(device)?;
        let inv = ToolInvocation::new("sfdisk").arg("--no-act").arg(device);
        match process::run_with_stdin(&inv, &script) {
            Ok(_) => Ok(true),
            Err(ExecError::CommandFailed { stderr, .. }) => {
                tracing::warn!(
                    device = %device.display(),
                    stderr = %stderr,
                    "sfdisk rejected the staged table"
                );
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn commit_table(&self, device: &Path) -> OsforgeResult<()> {
        let script = self.script_for(device)?;
        tracing::debug!(device = %device.display(), script = %script, "writing partition table");
        let inv = ToolInvocation::new("sfdisk").arg(device);
        process::run_with_stdin(&inv, &script)?;
        tracing::info!(device = %device.display(), "partition table written");
        Ok(())
    }
}

fn device_not_opened(device: &Path) -> OsforgeError {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("device not opened: {}", device.display()),
    )
    .into()
}

fn blockdev_number(device: &Path, flag: &str) -> Result<u64, ExecError> {
    let inv = ToolInvocation::new("blockdev").arg(flag).arg(device);
    let out = process::run(&inv)?;
    out.stdout.trim().parse().map_err(|_| {
        ExecError::unexpected_output(
            "blockdev",
            format!("{flag} returned {:?}", out.stdout.trim()),
        )
    })
}

/// Render the staged entries as an sfdisk input script.
fn render_script(entries: &[TableEntry]) -> String {
    let mut script = String::from("label: dos\n");
    for entry in entries {
        script.push_str(&format!("start={}, size={}\n", entry.start, entry.length));
    }
    script
}

/// Pick the start sector out of `sfdisk -F` output.
///
/// The output carries a human header followed by aligned columns; the
/// first line whose leading token is a number is the first free-region
/// row, and its first column is the start sector.
fn parse_free_region_start(output: &str) -> Option<u64> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .find_map(|token| token.parse().ok())
}
