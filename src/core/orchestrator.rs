use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

use crate::core::disk::DiskProvisioner;
use crate::core::errors::ProvisionError;
use crate::core::naming::{node_set, ReleaseVersion};
use crate::core::pxe::BootTemplateBinder;
use crate::core::virt::{VirtManager, VmSpec};
use crate::utils::prompt::Confirm;

// The MAC sequence octet is two zero-padded decimal digits.
const MAX_NODES: usize = 100;

/// Everything that defines one cluster's topology and per-node resources.
/// Teardown takes the same shape and re-derives every name, path and MAC
/// from it; nothing is persisted between runs.
#[derive(Debug, Clone)]
pub struct ClusterShape {
    pub prefix: String,
    pub masters: u32,
    pub workers: u32,
    pub disk_size_gb: u64,
    pub ram_gb: u64,
    pub vcpus: u32,
    pub version: ReleaseVersion,
}

impl ClusterShape {
    pub fn node_count(&self) -> usize {
        1 + self.masters as usize + self.workers as usize
    }

    fn validate(&self) -> Result<(), ProvisionError> {
        if self.node_count() > MAX_NODES {
            return Err(ProvisionError::ShapeTooLarge(self.node_count()));
        }
        Ok(())
    }
}

/// Per-node failure recorded during a best-effort teardown.
#[derive(Debug)]
pub struct TeardownFailure {
    pub subject: String,
    pub error: ProvisionError,
}

#[derive(Debug, Default)]
pub struct TeardownReport {
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sequences disk, boot-template and guest operations across the whole node
/// set. Strictly one node at a time: the boot templates are shared mutable
/// files, so bind/create/release never overlaps between nodes.
pub struct ClusterProvisioner {
    disks: DiskProvisioner,
    boot: BootTemplateBinder,
    virt: VirtManager,
}

impl ClusterProvisioner {
    pub fn new(disks: DiskProvisioner, boot: BootTemplateBinder, virt: VirtManager) -> Self {
        Self { disks, boot, virt }
    }

    /// Provisions bootstrap, then masters, then workers. The first node-level
    /// failure aborts the rest of the sequence; nodes already running are
    /// left running and reclaimed by an explicit teardown, never rolled back
    /// here.
    pub async fn provision(&self, shape: &ClusterShape) -> Result<(), ProvisionError> {
        shape.validate()?;
        info!(
            "Provisioning {} nodes (1 bootstrap, {} masters, {} workers)...",
            shape.node_count(),
            shape.masters,
            shape.workers
        );

        for node in node_set(&shape.prefix, shape.masters, shape.workers) {
            let identity = node.identity(shape.version);

            let disk_path = self.disks.ensure(&node.name, shape.disk_size_gb).await?;
            let lease = self.boot.bind(&identity.boot_file, &node.name)?;

            let spec = VmSpec {
                name: node.name.clone(),
                mac_address: identity.mac_address,
                ram_gb: shape.ram_gb,
                vcpus: shape.vcpus,
                disk_path,
            };
            let created = self.virt.create(&spec).await;
            // The template goes back to neutral no matter how the install
            // went; the next node's boot must not see this node's target.
            let released = lease.release();

            match (created, released) {
                (Ok(()), Ok(())) => {}
                (Ok(()), Err(release_err)) => return Err(release_err),
                (Err(create_err), Ok(())) => return Err(create_err),
                (Err(create_err), Err(release_err)) => {
                    error!("{}", release_err);
                    return Err(create_err);
                }
            }
        }

        Ok(())
    }

    /// Destroys every guest and reclaims every disk the same shape would have
    /// produced, then removes the generated cluster configuration. Individual
    /// failures are collected, not fatal; the point is maximal cleanup. Disks
    /// are only released after their guest is destroyed.
    pub async fn teardown(
        &self,
        shape: &ClusterShape,
        config_dir: &Path,
    ) -> Result<TeardownReport, ProvisionError> {
        shape.validate()?;
        let mut report = TeardownReport::default();

        for node in node_set(&shape.prefix, shape.masters, shape.workers) {
            if let Err(error) = self.virt.destroy(&node.name).await {
                warn!("Failed to destroy {}: {}", node.name, error);
                report.failures.push(TeardownFailure {
                    subject: node.name.clone(),
                    error,
                });
            }
            if let Err(error) = self.disks.release(&node.name).await {
                warn!("Failed to remove disk for {}: {}", node.name, error);
                report.failures.push(TeardownFailure {
                    subject: node.name.clone(),
                    error,
                });
            }
        }

        info!("Removing cluster config files...");
        if config_dir.exists() {
            if let Err(e) = fs::remove_dir_all(config_dir) {
                warn!("Failed to remove {}: {}", config_dir.display(), e);
                report.failures.push(TeardownFailure {
                    subject: config_dir.display().to_string(),
                    error: e.into(),
                });
            }
        }

        Ok(report)
    }
}

/// Pre-provisioning check on the generated-configuration directory. Reusing
/// one from an earlier install can surface expired-certificate problems, so
/// an existing path needs an explicit go-ahead.
pub fn ensure_config_dir(path: &Path, confirm: &dyn Confirm) -> Result<(), ProvisionError> {
    info!("Checking whether the cluster config path exists or not...");
    if path.is_dir() {
        warn!(
            "Path {} exists! A config path from a previous installation can run into cert issues.",
            path.display()
        );
        if !confirm.confirm("Do you want to continue?") {
            return Err(ProvisionError::ConfirmationDeclined(format!(
                "reuse of existing config path {}",
                path.display()
            )));
        }
        info!("OK, validated, proceeding...");
    } else {
        info!("Creating a new cluster config path...");
        fs::create_dir_all(path)?;
    }
    Ok(())
}
