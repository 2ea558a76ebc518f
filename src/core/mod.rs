pub mod disk;
pub mod errors;
pub mod exec;
pub mod naming;
pub mod orchestrator;
pub mod pxe;
pub mod virt;

// exports for lazy devs like us
pub use disk::DiskProvisioner;
pub use errors::ProvisionError;
pub use exec::{CommandRunner, HostRunner};
pub use naming::{node_set, NetworkIdentity, Node, NodeRole, ReleaseVersion};
pub use orchestrator::{ensure_config_dir, ClusterProvisioner, ClusterShape, TeardownReport};
pub use pxe::{BootLease, BootTemplateBinder, BOOT_TARGET_PLACEHOLDER};
pub use virt::{VirtManager, VmSpec};
