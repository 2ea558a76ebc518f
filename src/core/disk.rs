use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::errors::ProvisionError;
use crate::core::exec::CommandRunner;
use crate::utils::prompt::Confirm;

/// Allocates and reclaims the qcow2 backing image for each node under the
/// VM storage root. Paths are fully derived from the node name, so teardown
/// recomputes them instead of remembering anything.
pub struct DiskProvisioner {
    vm_home: PathBuf,
    runner: Arc<dyn CommandRunner>,
    confirm: Arc<dyn Confirm>,
}

impl DiskProvisioner {
    pub fn new(
        vm_home: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        Self {
            vm_home: vm_home.into(),
            runner,
            confirm,
        }
    }

    pub fn disk_path(&self, name: &str) -> PathBuf {
        self.vm_home.join(name).join(format!("{}-disk1.qcow2", name))
    }

    /// Makes sure the node's image exists at its derived path, sized
    /// `size_gb` GiB with metadata preallocation. An image already sitting at
    /// that path is only overwritten after the operator signs off on it.
    pub async fn ensure(&self, name: &str, size_gb: u64) -> Result<PathBuf, ProvisionError> {
        let dir = self.vm_home.join(name);
        let path = self.disk_path(name);

        if dir.is_dir() {
            info!("Path {} exists", dir.display());
        } else {
            warn!("Path {} does not exist, creating...", dir.display());
            let dir_arg = dir.display().to_string();
            self.runner
                .run("/usr/bin/mkdir", &["-p", dir_arg.as_str()])
                .await?;
        }

        if path.is_file() {
            warn!("File {} exists!", path.display());
            let question = format!(
                "Do you want to continue? This operation will destroy the data in {}",
                path.display()
            );
            if !self.confirm.confirm(&question) {
                return Err(ProvisionError::ResourceConflict { path });
            }
            info!("OK, validated, proceeding...");
        }

        info!("Creating {} disk in {}", name, path.display());
        let path_arg = path.display().to_string();
        let size_arg = format!("{}G", size_gb);
        self.runner
            .run(
                "/usr/bin/qemu-img",
                &[
                    "create",
                    "-f",
                    "qcow2",
                    "-o",
                    "preallocation=metadata",
                    path_arg.as_str(),
                    size_arg.as_str(),
                ],
            )
            .await?;

        Ok(path)
    }

    /// Removes the node's image. Already absent means there is nothing to
    /// reclaim, not a failure.
    pub async fn release(&self, name: &str) -> Result<(), ProvisionError> {
        let path = self.disk_path(name);
        if !path.is_file() {
            info!("Disk {} already absent", path.display());
            return Ok(());
        }
        info!("Removing disk {}", path.display());
        let path_arg = path.display().to_string();
        self.runner
            .run("/usr/bin/rm", &["-f", path_arg.as_str()])
            .await
    }
}
