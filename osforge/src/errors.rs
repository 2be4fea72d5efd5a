//! Hierarchical error types for osforge.
//!
//! Errors are categorized by recovery path:
//! - [`SpecError`]: disk specification parsing (user-fixable input)
//! - [`LayoutError`]: disk assembly and commit failures
//! - [`ExecError`]: external tool invocations

use std::io;
use thiserror::Error;

/// Result alias used across the crate.
pub type OsforgeResult<T> = std::result::Result<T, OsforgeError>;

// ============================================================================
// Top-Level Error
// ============================================================================

/// Errors that can occur during provisioning operations.
///
/// Categorized into sub-enums for easier error handling:
/// ```ignore
/// match disk.add_partition(..) {
///     Err(OsforgeError::Spec(_)) => { /* user should fix the spec string */ }
///     Err(OsforgeError::Layout(_)) => { /* layout does not fit the device */ }
///     Err(OsforgeError::Exec(_)) => { /* external tool failed, inspect stderr */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Error)]
pub enum OsforgeError {
    /// Disk specification string is invalid (user-fixable).
    #[error("spec: {0}")]
    Spec(#[from] SpecError),

    /// Disk layout cannot be assembled or committed.
    #[error("layout: {0}")]
    Layout(#[from] LayoutError),

    /// External tool invocation failed.
    #[error("exec: {0}")]
    Exec(#[from] ExecError),

    /// Orchestrator environment is missing or malformed.
    #[error("environment: {0}")]
    Environment(String),

    /// OS profile could not be loaded or validated.
    #[error("profile: {0}")]
    Profile(String),

    /// Generic IO error (catch-all).
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Spec Errors (disk specification strings, user-fixable)
// ============================================================================

/// Errors raised while parsing `disk:slot:size:fstype[:path]` strings
/// and their size tokens.
#[derive(Debug, Error)]
pub enum SpecError {
    /// String does not have the expected field shape.
    #[error("malformed disk spec {0:?}")]
    MalformedSpec(String),

    /// Filesystem name is not one of the supported kinds.
    #[error("unsupported filesystem {0:?}")]
    UnsupportedFilesystem(String),

    /// Size token does not parse as `<number>[m|g|t][+]`.
    #[error("invalid size {0:?}")]
    InvalidSizeFormat(String),

    /// Non-swap partition without a mount path.
    #[error("mount path required for non-swap partitions")]
    MissingMountPath,

    /// Mount path is not absolute, or present on a swap partition.
    #[error("invalid mount path {0:?}")]
    InvalidMountPath(String),
}

// ============================================================================
// Layout Errors (disk assembly and commit)
// ============================================================================

/// Errors raised while assembling a disk layout or committing it
/// to a device.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Slot outside the primary partition range.
    #[error("partition slot {0} outside 1..=4")]
    InvalidSlot(u32),

    /// Slot already occupied on this disk.
    #[error("partition slot {0} already in use")]
    DuplicateSlot(u32),

    /// Mount path already claimed by another partition.
    #[error("mount path {0:?} already in use")]
    DuplicateMountPath(String),

    /// A disk admits at most one grow partition.
    #[error("slot {requested} cannot grow: slot {existing} already grows")]
    MultipleGrowPartitions { existing: u32, requested: u32 },

    /// Fixed sizes exceed the remaining device capacity.
    #[error("requested {requested} bytes with only {available} free")]
    InsufficientSpace { requested: u64, available: u64 },

    /// Device reported an unusable sector size.
    #[error("invalid sector size {0}")]
    InvalidSectorSize(u32),

    /// Commit was already attempted on this disk.
    #[error("disk already committed")]
    AlreadyCommitted,

    /// Partitioning backend rejected or could not stage the table.
    #[error("table integrity on {device}: {detail}")]
    TableIntegrity { device: String, detail: String },

    /// mkfs/mkswap failed for a committed partition.
    #[error("filesystem creation on slot {slot}: {source}")]
    FilesystemCreation {
        slot: u32,
        #[source]
        source: ExecError,
    },
}

// ============================================================================
// Exec Errors (external tools)
// ============================================================================

/// Errors raised when invoking external tools (sfdisk, blockdev,
/// mkfs.*, debootstrap, mount, ...).
#[derive(Debug, Error)]
pub enum ExecError {
    /// Tool could not be spawned or driven to completion.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// Tool ran but exited unsuccessfully.
    #[error("{tool} failed with exit code {}: {stderr}", .status.map_or_else(|| String::from("<signal>"), |c| c.to_string()))]
    CommandFailed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    /// Tool output could not be interpreted.
    #[error("unexpected output from {tool}: {detail}")]
    UnexpectedOutput { tool: String, detail: String },
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl LayoutError {
    /// Create a table integrity error.
    pub fn table_integrity(device: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TableIntegrity {
            device: device.into(),
            detail: detail.into(),
        }
    }
}

impl ExecError {
    /// Create a spawn error.
    pub fn spawn(tool: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }

    /// Create a command failure from an exit status and captured stderr.
    pub fn failed(tool: impl Into<String>, status: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            status,
            stderr: stderr.into(),
        }
    }

    /// Create an unexpected-output error.
    pub fn unexpected_output(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            tool: tool.into(),
            detail: detail.into(),
        }
    }
}
