pub mod cleanup;
pub mod process;

/// True when the process runs with an effective uid of 0.
///
/// Partitioning, mkfs and chroot all need root.
pub fn running_as_root() -> bool {
    let euid = unsafe { libc::geteuid() };
    euid == 0
}
