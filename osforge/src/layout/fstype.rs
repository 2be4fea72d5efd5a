//! Supported filesystem kinds and their tool invocations.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::errors::SpecError;
use crate::util::process::ToolInvocation;

/// The filesystems a partition can be formatted with.
///
/// Adding a kind means teaching this enum its mkfs and fsck tools;
/// every dispatch site follows from the exhaustive matches below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsKind {
    Swap,
    Ext3,
    Ext4,
}

impl FsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsKind::Swap => "swap",
            FsKind::Ext3 => "ext3",
            FsKind::Ext4 => "ext4",
        }
    }

    /// True for swap, which mounts nowhere and is never checked.
    pub fn is_swap(&self) -> bool {
        matches!(self, FsKind::Swap)
    }

    /// The tool call that formats `device` with this filesystem.
    pub fn mkfs_invocation(&self, device: &Path) -> ToolInvocation {
        match self {
            FsKind::Swap => ToolInvocation::new("mkswap").arg(device),
            FsKind::Ext3 => ToolInvocation::new("mkfs.ext3").arg(device),
            FsKind::Ext4 => ToolInvocation::new("mkfs.ext4").arg(device),
        }
    }

    /// The tool call that checks `device`, or `None` when the kind has
    /// nothing to check.
    pub fn fsck_invocation(&self, device: &Path) -> Option<ToolInvocation> {
        match self {
            FsKind::Swap => None,
            FsKind::Ext3 => Some(ToolInvocation::new("fsck.ext3").arg("-y").arg(device)),
            FsKind::Ext4 => Some(ToolInvocation::new("fsck.ext4").arg("-y").arg(device)),
        }
    }
}

impl FromStr for FsKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "swap" => Ok(FsKind::Swap),
            "ext3" => Ok(FsKind::Ext3),
            "ext4" => Ok(FsKind::Ext4),
            other => Err(SpecError::UnsupportedFilesystem(other.to_string())),
        }
    }
}

impl fmt::Display for FsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
