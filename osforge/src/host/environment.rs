//! The environment-variable contract with the virtualization
//! orchestrator.
//!
//! When an instance is created the orchestrator invokes the OS
//! install hook with the instance described entirely through
//! environment variables: identity in `INSTANCE_NAME` and friends,
//! then `DISK_COUNT`/`NIC_COUNT` with one indexed group per disk
//! (`DISK_0_PATH`, ...) and per NIC (`NIC_0_MAC`, ...).

use std::env;

use crate::errors::{OsforgeError, OsforgeResult};

/// One disk as described by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEnv {
    pub index: u32,
    pub path: Option<String>,
    pub access: Option<String>,
    pub frontend_type: Option<String>,
}

/// One network interface as described by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NicEnv {
    pub index: u32,
    pub mac: Option<String>,
    pub ip: Option<String>,
    pub bridge: Option<String>,
    pub frontend_type: Option<String>,
}

/// Everything the orchestrator tells the install hook about an
/// instance.
///
/// Only `INSTANCE_NAME` and the two counts are mandatory; the
/// per-item variables are passed through as the orchestrator set
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceEnv {
    pub api_version: Option<String>,
    pub instance_name: String,
    pub instance_os: Option<String>,
    pub hypervisor: Option<String>,
    pub debug_level: Option<String>,
    pub disks: Vec<DiskEnv>,
    pub nics: Vec<NicEnv>,
}

impl InstanceEnv {
    /// Collect the instance description from the process environment.
    pub fn from_env() -> OsforgeResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OsforgeResult<Self> {
        let instance_name = lookup("INSTANCE_NAME")
            .ok_or_else(|| OsforgeError::Environment("INSTANCE_NAME is not set".to_string()))?;
        let disk_count = parse_count(&lookup, "DISK_COUNT")?;
        let nic_count = parse_count(&lookup, "NIC_COUNT")?;

        let disks = (0..disk_count)
            .map(|i| DiskEnv {
                index: i,
                path: lookup(&format!("DISK_{i}_PATH")),
                access: lookup(&format!("DISK_{i}_ACCESS")),
                frontend_type: lookup(&format!("DISK_{i}_FRONTEND_TYPE")),
            })
            .collect();
        let nics = (0..nic_count)
            .map(|i| NicEnv {
                index: i,
                mac: lookup(&format!("NIC_{i}_MAC")),
                ip: lookup(&format!("NIC_{i}_IP")),
                bridge: lookup(&format!("NIC_{i}_BRIDGE")),
                frontend_type: lookup(&format!("NIC_{i}_FRONTEND_TYPE")),
            })
            .collect();

        Ok(Self {
            api_version: lookup("OS_API_VERSION"),
            instance_name,
            instance_os: lookup("INSTANCE_OS"),
            hypervisor: lookup("HYPERVISOR"),
            debug_level: lookup("DEBUG_LEVEL"),
            disks,
            nics,
        })
    }

    /// Device paths of the instance's disks, in index order.
    ///
    /// Every attached disk occupies its index whether or not later
    /// code partitions it, so a missing `DISK_n_PATH` is an error,
    /// never a gap to skip over.
    pub fn disk_paths(&self) -> OsforgeResult<Vec<&str>> {
        self.disks
            .iter()
            .map(|d| {
                d.path.as_deref().ok_or_else(|| {
                    OsforgeError::Environment(format!("DISK_{}_PATH is not set", d.index))
                })
            })
            .collect()
    }
}

fn parse_count(lookup: impl Fn(&str) -> Option<String>, name: &str) -> OsforgeResult<u32> {
    let value =
        lookup(name).ok_or_else(|| OsforgeError::Environment(format!("{name} is not set")))?;
    value
        .parse()
        .map_err(|_| OsforgeError::Environment(format!("{name} is not a number")))
}
