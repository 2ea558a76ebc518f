use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Operator declined: {0}")]
    ConfirmationDeclined(String),

    #[error("Disk image {path} already exists and overwrite was declined")]
    ResourceConflict { path: PathBuf },

    #[error("Privileged command `{command}` failed: {detail}")]
    PrivilegedCommandFailed { command: String, detail: String },

    #[error("Boot template {path} unavailable: {source}")]
    BootTemplate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Boot template {path} may still be bound to {node}: {detail}")]
    BindingLeakRisk {
        node: String,
        path: PathBuf,
        detail: String,
    },

    #[error("Cluster shape of {0} nodes exceeds the MAC sequence space (max 100)")]
    ShapeTooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ProvisionError {
    /// Exit status for the process. An operator answering "no" to a prompt is
    /// not the same condition as a broken qemu-img run.
    pub fn exit_status(&self) -> i32 {
        match self {
            ProvisionError::ConfirmationDeclined(_) | ProvisionError::ResourceConflict { .. } => 3,
            _ => 2,
        }
    }
}
