//! Host-side provisioning: debootstrap, guest network files, cluster
//! tooling, and the hypervisor environment contract.

pub mod bootstrap;
pub mod cluster;
pub mod environment;
pub mod netfiles;

pub use bootstrap::BootstrapSpec;
pub use environment::{DiskEnv, InstanceEnv, NicEnv};
