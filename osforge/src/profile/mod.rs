//! Named OS profiles: a reusable description of suite, packages and
//! disk layout, stored as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{OsforgeError, OsforgeResult};
use crate::layout::spec::PartitionSpec;

/// A provisioning profile.
///
/// `disks` holds `disk:slot:size:fstype[:path]` strings; they are
/// parsed on load and save so a stored profile never carries an
/// unusable layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsProfile {
    pub name: String,
    pub arch: String,
    pub suite: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chroot_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tarball_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    pub disks: Vec<String>,
}

impl OsProfile {
    /// Load and validate a profile from `path`.
    pub fn load(path: &Path) -> OsforgeResult<Self> {
        tracing::debug!(path = %path.display(), "loading profile");
        let raw = fs::read_to_string(path).map_err(|e| {
            OsforgeError::Profile(format!("cannot read {}: {e}", path.display()))
        })?;
        let profile: Self = serde_json::from_str(&raw).map_err(|e| {
            OsforgeError::Profile(format!("cannot parse {}: {e}", path.display()))
        })?;
        profile.validate()?;
        Ok(profile)
    }

    /// Validate and write the profile to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> OsforgeResult<()> {
        self.validate()?;
        let rendered = serde_json::to_string_pretty(self)
            .map_err(|e| OsforgeError::Profile(e.to_string()))?;
        fs::write(path, rendered)?;
        tracing::info!(path = %path.display(), name = %self.name, "profile written");
        Ok(())
    }

    /// Check the profile is complete and its disk specs parse.
    pub fn validate(&self) -> OsforgeResult<()> {
        for (field, value) in [
            ("name", &self.name),
            ("arch", &self.arch),
            ("suite", &self.suite),
        ] {
            if value.is_empty() {
                return Err(OsforgeError::Profile(format!("{field} is empty")));
            }
        }
        if self.disks.is_empty() {
            return Err(OsforgeError::Profile("no disks defined".to_string()));
        }
        for disk in &self.disks {
            disk.parse::<PartitionSpec>()
                .map_err(|e| OsforgeError::Profile(format!("disk spec {disk:?}: {e}")))?;
        }
        Ok(())
    }

    /// The parsed partition requests, in declaration order.
    pub fn partition_specs(&self) -> OsforgeResult<Vec<PartitionSpec>> {
        self.disks
            .iter()
            .map(|disk| {
                disk.parse::<PartitionSpec>()
                    .map_err(|e| OsforgeError::Profile(format!("disk spec {disk:?}: {e}")))
            })
            .collect()
    }
}
