use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::core::errors::ProvisionError;

/// Token sitting at the boot-target position of every pxelinux template.
/// Binding swaps it for a node name; release swaps it back.
pub const BOOT_TARGET_PLACEHOLDER: &str = "VERSION";

/// Binds a node to its pxelinux config file for the duration of one
/// PXE install. The templates are shared, one per MAC-derived file name, and
/// every boot on the bridge consults them, so a binding must never outlive
/// the VM creation it was made for.
#[derive(Debug, Clone)]
pub struct BootTemplateBinder {
    tftp_root: PathBuf,
}

impl BootTemplateBinder {
    pub fn new(tftp_root: impl Into<PathBuf>) -> Self {
        Self {
            tftp_root: tftp_root.into(),
        }
    }

    pub fn template_path(&self, boot_file: &str) -> PathBuf {
        self.tftp_root.join(boot_file)
    }

    /// Points the template at `node_name`. The returned lease restores the
    /// template on `release`, or on drop if the caller bails out early.
    pub fn bind(&self, boot_file: &str, node_name: &str) -> Result<BootLease, ProvisionError> {
        let path = self.template_path(boot_file);
        info!("Binding boot template {} to {}", path.display(), node_name);
        rewrite(&path, BOOT_TARGET_PLACEHOLDER, node_name)?;
        Ok(BootLease {
            path,
            node_name: node_name.to_string(),
            released: false,
        })
    }
}

/// Exclusive hold on one boot template. Exactly one lease may exist per
/// template at a time; provisioning serializes bind/release pairs.
#[derive(Debug)]
pub struct BootLease {
    path: PathBuf,
    node_name: String,
    released: bool,
}

impl BootLease {
    /// Restores the template to its neutral state. Failing here leaves the
    /// shared file pointing at this node, which would misdirect the next
    /// machine to boot, so the error is loud and distinct.
    pub fn release(mut self) -> Result<(), ProvisionError> {
        self.released = true;
        rewrite(&self.path, &self.node_name, BOOT_TARGET_PLACEHOLDER).map_err(|e| {
            ProvisionError::BindingLeakRisk {
                node: self.node_name.clone(),
                path: self.path.clone(),
                detail: e.to_string(),
            }
        })
    }
}

impl Drop for BootLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Backstop for early exits that skipped release(). Drop cannot
        // propagate the error, only shout about it.
        if let Err(e) = rewrite(&self.path, &self.node_name, BOOT_TARGET_PLACEHOLDER) {
            error!(
                "Boot template {} may still be bound to {}: {}",
                self.path.display(),
                self.node_name,
                e
            );
        }
    }
}

fn rewrite(path: &Path, from: &str, to: &str) -> Result<(), ProvisionError> {
    let data = fs::read_to_string(path).map_err(|source| ProvisionError::BootTemplate {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, data.replace(from, to)).map_err(|source| ProvisionError::BootTemplate {
        path: path.to_path_buf(),
        source,
    })
}
