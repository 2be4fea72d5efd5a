//! osforge - Disk layout and OS image provisioning for virtualization
//! hosts.
//!
//! The core is the [`Disk`] aggregate: partitions are requested
//! against free space, at most one may grow into what remains, and a
//! single commit writes the table and creates the filesystems through
//! pluggable backends. Around it sit the provisioning pieces a host
//! needs to turn a blank block device into a bootable guest root.

pub mod errors;
pub mod gateway;
pub mod host;
pub mod layout;
pub mod profile;
pub mod table;
pub mod util;

pub use errors::{ExecError, LayoutError, OsforgeError, OsforgeResult, SpecError};

// Disk layout
pub use layout::disk::{Disk, GROW_DUST_THRESHOLD};
pub use layout::fstab::{MountEntry, render_fstab, write_fstab};
pub use layout::fstype::FsKind;
pub use layout::partition::Partition;
pub use layout::spec::PartitionSpec;
pub use layout::units::SizeSpec;

// Partition table and filesystem backends
pub use gateway::{FilesystemGateway, RecordingGateway, ToolGateway};
pub use table::{DeviceGeometry, MemoryTable, PartitionTable, SfdiskTable, TableEntry};

// Host-side provisioning
pub use host::bootstrap::BootstrapSpec;
pub use host::environment::InstanceEnv;
pub use profile::OsProfile;
pub use util::cleanup::CleanupStack;
