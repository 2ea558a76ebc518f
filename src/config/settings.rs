use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub storage: StorageSettings,
    pub pxe: PxeSettings,
    pub libvirt: LibvirtSettings,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Root under which every node gets `<name>/<name>-disk1.qcow2`.
    pub vm_home: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PxeSettings {
    /// pxelinux.cfg directory holding one template per MAC-derived file name.
    pub tftp_root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LibvirtSettings {
    pub bridge: String,
    /// qemu-img/virt-install/virsh need root on a stock host; turn this off
    /// when already running privileged.
    pub use_sudo: bool,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());

        info!("Loading configuration from path: {}", config_path);

        let config = Config::builder()
            // Start with default settings
            .set_default("storage.vm_home", "/home/VMs")?
            .set_default("pxe.tftp_root", "/var/lib/tftpboot/pxelinux.cfg")?
            .set_default("libvirt.bridge", "virbr0")?
            .set_default("libvirt.use_sudo", true)?
            // Add configuration from files
            .add_source(File::with_name(&format!("{}/default", config_path)).required(false))
            .add_source(File::with_name(&format!("{}/local", config_path)).required(false))
            // Add environment variables with prefix "UPI_"
            .add_source(Environment::with_prefix("UPI"))
            .build()?;

        config.try_deserialize()
    }

    pub fn new_from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from file: {}", path.display());

        let config = Config::builder()
            .set_default("storage.vm_home", "/home/VMs")?
            .set_default("pxe.tftp_root", "/var/lib/tftpboot/pxelinux.cfg")?
            .set_default("libvirt.bridge", "virbr0")?
            .set_default("libvirt.use_sudo", true)?
            .add_source(File::from(path))
            .build()?;

        config.try_deserialize()
    }
}

pub fn generate_default_config() -> Settings {
    Settings {
        storage: StorageSettings {
            vm_home: PathBuf::from("/home/VMs"),
        },
        pxe: PxeSettings {
            tftp_root: PathBuf::from("/var/lib/tftpboot/pxelinux.cfg"),
        },
        libvirt: LibvirtSettings {
            bridge: "virbr0".to_string(),
            use_sudo: true,
        },
    }
}
