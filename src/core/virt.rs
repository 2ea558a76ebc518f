use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::errors::ProvisionError;
use crate::core::exec::CommandRunner;

/// Resource shape for one PXE-installed guest.
#[derive(Debug, Clone)]
pub struct VmSpec {
    pub name: String,
    pub mac_address: String,
    pub ram_gb: u64,
    pub vcpus: u32,
    pub disk_path: PathBuf,
}

/// Drives guest creation and destruction through virt-install/virsh.
pub struct VirtManager {
    runner: Arc<dyn CommandRunner>,
    bridge: String,
}

impl VirtManager {
    pub fn new(runner: Arc<dyn CommandRunner>, bridge: impl Into<String>) -> Self {
        Self {
            runner,
            bridge: bridge.into(),
        }
    }

    /// PXE-boots a new guest with its prepared disk attached. virt-install
    /// blocks until the install completes or fails; a failure here is fatal
    /// for the node being provisioned.
    pub async fn create(&self, spec: &VmSpec) -> Result<(), ProvisionError> {
        info!("Installing {} ...", spec.name);
        let ram_mb = (spec.ram_gb * 1024).to_string();
        let vcpus = spec.vcpus.to_string();
        let disk = format!("--disk={},bus=virtio", spec.disk_path.display());
        let network = format!("--network=bridge={},mac={}", self.bridge, spec.mac_address);

        self.runner
            .run(
                "/usr/bin/virt-install",
                &[
                    "--pxe",
                    "-n",
                    spec.name.as_str(),
                    "--os-type=Linux",
                    "--ram",
                    ram_mb.as_str(),
                    "--vcpus",
                    vcpus.as_str(),
                    disk.as_str(),
                    network.as_str(),
                ],
            )
            .await
    }

    /// Stops and undefines the guest. A guest that is already stopped, or
    /// that libvirt has never heard of, counts as destroyed.
    pub async fn destroy(&self, name: &str) -> Result<(), ProvisionError> {
        info!("Destroying, undefining server {} ...", name);

        if let Err(e) = self.runner.run("/usr/bin/virsh", &["destroy", name]).await {
            debug!("virsh destroy {}: {}", name, e);
        }
        if let Err(e) = self.runner.run("/usr/bin/virsh", &["undefine", name]).await {
            debug!("virsh undefine {}: {}", name, e);
        }

        Ok(())
    }
}
