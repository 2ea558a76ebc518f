pub mod cli;
pub mod config;
pub mod core;
pub mod utils;

// Re-exports
pub use crate::config::Settings;
pub use crate::core::{
    node_set, BootTemplateBinder, ClusterProvisioner, ClusterShape, CommandRunner,
    DiskProvisioner, HostRunner, NetworkIdentity, Node, NodeRole, ProvisionError, ReleaseVersion,
    TeardownReport, VirtManager, VmSpec,
};
pub use crate::utils::{Confirm, StdinConfirm};
