//! Filesystem creation and checking on committed partitions.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::errors::ExecError;
use crate::layout::fstype::FsKind;
use crate::util::process::{self, ToolInvocation};

/// Creates and checks filesystems on partition device nodes.
pub trait FilesystemGateway: Send + Sync {
    /// Format `device` with `fstype`.
    fn create_filesystem(&self, device: &Path, fstype: FsKind) -> Result<(), ExecError>;

    /// Run `passes` consistency checks over `device`.
    ///
    /// Swap has nothing to check and always succeeds.
    fn check_filesystem(&self, device: &Path, fstype: FsKind, passes: u32)
    -> Result<(), ExecError>;
}

/// Gateway that runs the real mkfs/fsck tool family.
#[derive(Default)]
pub struct ToolGateway;

impl ToolGateway {
    pub fn new() -> Self {
        Self
    }
}

impl FilesystemGateway for ToolGateway {
    fn create_filesystem(&self, device: &Path, fstype: FsKind) -> Result<(), ExecError> {
        tracing::info!(device = %device.display(), fstype = %fstype, "creating filesystem");
        process::run(&fstype.mkfs_invocation(device))?;
        Ok(())
    }

    fn check_filesystem(
        &self,
        device: &Path,
        fstype: FsKind,
        passes: u32,
    ) -> Result<(), ExecError> {
        let Some(invocation) = fstype.fsck_invocation(device) else {
            return Ok(());
        };
        for pass in 1..=passes {
            tracing::info!(device = %device.display(), fstype = %fstype, pass, "checking filesystem");
            process::run(&invocation)?;
        }
        Ok(())
    }
}

/// Gateway that records calls instead of touching any device.
///
/// Backs the dry-run planning path and the engine tests.
#[derive(Default)]
pub struct RecordingGateway {
    created: Mutex<Vec<(PathBuf, FsKind)>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filesystems that would have been created, in call order.
    pub fn created(&self) -> Vec<(PathBuf, FsKind)> {
        self.created.lock().clone()
    }
}

impl FilesystemGateway for RecordingGateway {
    fn create_filesystem(&self, device: &Path, fstype: FsKind) -> Result<(), ExecError> {
        self.created.lock().push((device.to_path_buf(), fstype));
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

/// Mount `device` at `target`.
pub fn mount(device: &Path, target: &Path) -> Result<(), ExecError> {
    tracing::debug!(device = %device.display(), target = %target.display(), "mounting");
    process::run(&ToolInvocation::new("mount").arg(device).arg(target))?;
    Ok(())
}

/// Unmount whatever is mounted at `target`.
pub fn umount(target: &Path) -> Result<(), ExecError> {
    tracing::debug!(target = %target.display(), "unmounting");
    process::run(&ToolInvocation::new("umount").arg(target))?;
    Ok(())
}

/// Tear down kernel partition mappings for `device`.
pub fn unmap_partitions(device: &Path) -> Result<(), ExecError> {
    tracing::debug!(device = %device.display(), "removing partition mappings");
    process::run(
        &ToolInvocation::new("kpartx")
            .arg("-d")
            .arg("-v")
            .arg(device),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_gateway_keeps_call_order() {
        let gateway = RecordingGateway::new();
        gateway
            .create_filesystem(Path::new("/dev/vda1"), FsKind::Ext4)
            .unwrap();
        gateway
            .create_filesystem(Path::new("/dev/vda2"), FsKind::Swap)
            .unwrap();

        let created = gateway.created();
        assert_eq!(
            created,
            vec![
                (PathBuf::from("/dev/vda1"), FsKind::Ext4),
                (PathBuf::from("/dev/vda2"), FsKind::Swap),
            ]
        );
    }

    #[test]
    fn test_tool_gateway_skips_swap_checks() {
        // swap has no fsck tool; this must not spawn anything
        let gateway = ToolGateway::new();
        gateway
            .check_filesystem(Path::new("/dev/vda2"), FsKind::Swap, 4)
            .unwrap();
    }

    #[test]
    fn test_tool_gateway_zero_passes_is_a_noop() {
        let gateway = ToolGateway::new();
        gateway
            .check_filesystem(Path::new("/dev/vda1"), FsKind::Ext4, 0)
            .unwrap();
    }
}
