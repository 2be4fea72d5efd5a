//! Disk layout: size parsing, partition specs, the disk aggregate,
//! and guest fstab rendering.

pub mod disk;
pub mod fstab;
pub mod fstype;
pub mod partition;
pub mod spec;
pub mod units;

pub use disk::{Disk, GROW_DUST_THRESHOLD};
pub use fstab::{MountEntry, render_fstab, write_fstab};
pub use fstype::FsKind;
pub use partition::Partition;
pub use spec::PartitionSpec;
pub use units::SizeSpec;
