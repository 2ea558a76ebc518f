use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{generate_default_config, Settings};
use crate::core::{
    ensure_config_dir, BootTemplateBinder, ClusterProvisioner, ClusterShape, CommandRunner,
    DiskProvisioner, HostRunner, ProvisionError, ReleaseVersion, VirtManager,
};
use crate::utils::{Confirm, StdinConfirm};

#[derive(Parser)]
#[command(name = "ocp4-upi-provisioner")]
#[command(about = "OCP4 UPI cluster VM provisioner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the cluster VMs (bootstrap first, then masters, then workers)
    Provision {
        #[command(flatten)]
        shape: ShapeArgs,
    },
    /// Destroy the cluster VMs and reclaim disks and generated configs
    Destroy {
        #[command(flatten)]
        shape: ShapeArgs,
    },
    /// Generate default configuration
    Init {
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct ShapeArgs {
    /// Number of masters to deploy
    #[arg(short, long)]
    masters: u32,

    /// Number of workers to deploy
    #[arg(short, long)]
    workers: u32,

    /// Virtual disk size in GiB (a trailing G/GB is accepted)
    #[arg(short = 's', long, value_parser = parse_gib)]
    disk_size: u64,

    /// RAM per node in GiB (a trailing G/GB is accepted)
    #[arg(short, long, value_parser = parse_gib)]
    ram: u64,

    /// Number of vCPUs per VM
    #[arg(short, long)]
    cpus: u32,

    /// Name of the cluster, used as the node name prefix
    #[arg(short, long)]
    prefix: String,

    /// Path where manifests, ignition and auth configs are kept
    #[arg(short = 'P', long = "path")]
    config_path: PathBuf,

    /// OpenShift release to deploy, e.g. 4.6
    #[arg(short = 'v', long)]
    version: ReleaseVersion,
}

impl ShapeArgs {
    fn cluster_shape(&self) -> ClusterShape {
        ClusterShape {
            prefix: self.prefix.clone(),
            masters: self.masters,
            workers: self.workers,
            disk_size_gb: self.disk_size,
            ram_gb: self.ram,
            vcpus: self.cpus,
            version: self.version,
        }
    }
}

// Accepts bare GiB counts as well as 25GB / 8G style values.
fn parse_gib(value: &str) -> Result<u64, String> {
    value
        .trim_end_matches("GB")
        .trim_end_matches('G')
        .parse()
        .map_err(|_| format!("invalid size `{}`, expected GiB like 25 or 25GB", value))
}

pub async fn run() -> Result<i32, ProvisionError> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::new_from_file(path)?,
        None => Settings::new()?,
    };

    match cli.command {
        Commands::Provision { shape } => {
            let confirm: Arc<dyn Confirm> = Arc::new(StdinConfirm);
            ensure_config_dir(&shape.config_path, confirm.as_ref())?;

            let provisioner = build_provisioner(&settings, Arc::clone(&confirm));
            let cluster = shape.cluster_shape();
            provisioner.provision(&cluster).await?;

            println!(
                "{} Cluster '{}' provisioned ({} nodes)",
                "✓".green(),
                cluster.prefix,
                cluster.node_count()
            );
            info!("Hand over to the installer to watch the bootstrap complete.");
            Ok(0)
        }
        Commands::Destroy { shape } => {
            let confirm: Arc<dyn Confirm> = Arc::new(StdinConfirm);
            let provisioner = build_provisioner(&settings, confirm);
            let cluster = shape.cluster_shape();
            let report = provisioner.teardown(&cluster, &shape.config_path).await?;

            if report.is_clean() {
                println!("{} Cluster '{}' destroyed", "✓".green(), cluster.prefix);
                Ok(0)
            } else {
                println!(
                    "{} Teardown finished with {} failure(s):",
                    "!".yellow(),
                    report.failures.len()
                );
                for failure in &report.failures {
                    println!("  - {}: {}", failure.subject, failure.error);
                }
                Ok(2)
            }
        }
        Commands::Init { force } => {
            handle_init_command(force)?;
            Ok(0)
        }
    }
}

fn build_provisioner(settings: &Settings, confirm: Arc<dyn Confirm>) -> ClusterProvisioner {
    let runner: Arc<dyn CommandRunner> = Arc::new(HostRunner::new(settings.libvirt.use_sudo));

    let disks = DiskProvisioner::new(
        settings.storage.vm_home.clone(),
        Arc::clone(&runner),
        confirm,
    );
    let boot = BootTemplateBinder::new(settings.pxe.tftp_root.clone());
    let virt = VirtManager::new(runner, settings.libvirt.bridge.clone());

    ClusterProvisioner::new(disks, boot, virt)
}

fn handle_init_command(force: bool) -> Result<(), ProvisionError> {
    let config_dir = PathBuf::from("config");
    if config_dir.join("default.toml").exists() && !force {
        error!("Configuration already exists. Use --force to overwrite.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    let default_config = generate_default_config();
    let config_str = toml::to_string_pretty(&default_config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(config_dir.join("default.toml"), config_str)?;

    println!("{} Default configuration generated", "✓".green());
    Ok(())
}
