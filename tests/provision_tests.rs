// Provisioning and teardown tests against a mock host: no libvirt, no sudo,
// every external command is recorded and interpreted on a tempdir.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use ocp4_upi_provisioner::core::naming::NetworkIdentity;
use ocp4_upi_provisioner::core::{
    ensure_config_dir, BootTemplateBinder, ClusterProvisioner, ClusterShape, CommandRunner,
    DiskProvisioner, ProvisionError, ReleaseVersion, VirtManager,
};
use ocp4_upi_provisioner::utils::Confirm;

const TEMPLATE: &str = "default menu.c32\nprompt 0\nlabel linux\n  kernel rhcos-live-kernel-x86_64\n  append initrd=rhcos-live-initramfs.x86_64.img coreos.inst.install_dev=/dev/vda coreos.inst.ignition_url=http://192.168.122.1/VERSION.ign\n";

/// Records every command and emulates the handful the provisioner drives.
/// Command lines containing any `fail_matching` substring error out instead.
#[derive(Default)]
struct MockHost {
    calls: Mutex<Vec<Vec<String>>>,
    fail_matching: Mutex<Vec<String>>,
}

impl MockHost {
    fn fail_when_matching(&self, needle: &str) {
        self.fail_matching.lock().unwrap().push(needle.to_string());
    }

    fn calls_for(&self, program: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call[0] == program)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CommandRunner for MockHost {
    async fn run(&self, program: &str, args: &[&str]) -> Result<(), ProvisionError> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().map(|a| a.to_string()));
        self.calls.lock().unwrap().push(call.clone());

        let line = call.join(" ");
        if self
            .fail_matching
            .lock()
            .unwrap()
            .iter()
            .any(|needle| line.contains(needle))
        {
            return Err(ProvisionError::PrivilegedCommandFailed {
                command: line,
                detail: "injected failure".to_string(),
            });
        }

        match program {
            "/usr/bin/mkdir" => {
                fs::create_dir_all(args[1])?;
            }
            "/usr/bin/qemu-img" => {
                // create -f qcow2 -o preallocation=metadata <path> <size>G
                fs::write(args[5], format!("qcow2 {}", args[6]))?;
            }
            "/usr/bin/rm" => {
                let _ = fs::remove_file(args[1]);
            }
            _ => {}
        }
        Ok(())
    }
}

struct Agree;
impl Confirm for Agree {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

struct Refuse;
impl Confirm for Refuse {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

struct Fixture {
    _tmp: TempDir,
    vm_home: PathBuf,
    tftp_root: PathBuf,
    config_dir: PathBuf,
    host: Arc<MockHost>,
}

impl Fixture {
    /// Lays out a vm home and one pxelinux template per node sequence.
    fn new(nodes: u32, version: ReleaseVersion) -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let vm_home = tmp.path().join("VMs");
        let tftp_root = tmp.path().join("pxelinux.cfg");
        let config_dir = tmp.path().join("ocp46.openshift.local");
        fs::create_dir_all(&vm_home)?;
        fs::create_dir_all(&tftp_root)?;

        for sequence in 0..nodes {
            let identity = NetworkIdentity::derive(sequence, version);
            fs::write(tftp_root.join(&identity.boot_file), TEMPLATE)?;
        }

        Ok(Self {
            _tmp: tmp,
            vm_home,
            tftp_root,
            config_dir,
            host: Arc::new(MockHost::default()),
        })
    }

    fn provisioner(&self, confirm: Arc<dyn Confirm>) -> ClusterProvisioner {
        let runner: Arc<dyn CommandRunner> = self.host.clone();
        let disks = DiskProvisioner::new(self.vm_home.clone(), Arc::clone(&runner), confirm);
        let boot = BootTemplateBinder::new(self.tftp_root.clone());
        let virt = VirtManager::new(runner, "virbr0");
        ClusterProvisioner::new(disks, boot, virt)
    }

    fn disk_path(&self, name: &str) -> PathBuf {
        self.vm_home.join(name).join(format!("{}-disk1.qcow2", name))
    }

    fn template(&self, sequence: u32, version: ReleaseVersion) -> Result<String> {
        let identity = NetworkIdentity::derive(sequence, version);
        Ok(fs::read_to_string(self.tftp_root.join(&identity.boot_file))?)
    }
}

fn shape(masters: u32, workers: u32) -> ClusterShape {
    ClusterShape {
        prefix: "ocp46".to_string(),
        masters,
        workers,
        disk_size_gb: 25,
        ram_gb: 8,
        vcpus: 4,
        version: "4.6".parse().unwrap(),
    }
}

fn installed_names(host: &MockHost) -> Vec<String> {
    host.calls_for("/usr/bin/virt-install")
        .iter()
        .map(|call| call[3].clone())
        .collect()
}

#[tokio::test]
async fn test_provision_full_topology() -> Result<()> {
    let cluster = shape(3, 2);
    let fx = Fixture::new(6, cluster.version)?;
    let provisioner = fx.provisioner(Arc::new(Agree));

    provisioner.provision(&cluster).await?;

    let expected = ["ocp46bs", "ocp46m1", "ocp46m2", "ocp46m3", "ocp46w1", "ocp46w2"];
    for name in expected {
        assert!(fx.disk_path(name).is_file(), "missing disk for {}", name);
    }
    assert_eq!(installed_names(&fx.host), expected);

    // Each install got its own MAC.
    let macs: Vec<String> = fx
        .host
        .calls_for("/usr/bin/virt-install")
        .iter()
        .map(|call| {
            let network = call.last().unwrap();
            network.split("mac=").last().unwrap().to_string()
        })
        .collect();
    let mut deduped = macs.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), macs.len());

    // Every template is back in its neutral state.
    for sequence in 0..6 {
        assert_eq!(fx.template(sequence, cluster.version)?, TEMPLATE);
    }
    Ok(())
}

#[tokio::test]
async fn test_provision_fail_fast_without_rollback() -> Result<()> {
    let cluster = shape(3, 2);
    let fx = Fixture::new(6, cluster.version)?;
    fx.host.fail_when_matching("virt-install --pxe -n ocp46m2");
    let provisioner = fx.provisioner(Arc::new(Agree));

    let err = provisioner.provision(&cluster).await.unwrap_err();
    assert!(matches!(err, ProvisionError::PrivilegedCommandFailed { .. }));
    assert_eq!(err.exit_status(), 2);

    // m2 stopped the run; m3 and the workers were never attempted.
    assert_eq!(installed_names(&fx.host), ["ocp46bs", "ocp46m1", "ocp46m2"]);
    for name in ["ocp46bs", "ocp46m1", "ocp46m2"] {
        assert!(fx.disk_path(name).is_file());
    }
    for name in ["ocp46m3", "ocp46w1", "ocp46w2"] {
        assert!(!fx.disk_path(name).exists(), "{} should not exist", name);
    }

    // The failed node's template was still released.
    assert_eq!(fx.template(2, cluster.version)?, TEMPLATE);
    Ok(())
}

#[tokio::test]
async fn test_disk_overwrite_declined_leaves_file_untouched() -> Result<()> {
    let version: ReleaseVersion = "4.6".parse().unwrap();
    let fx = Fixture::new(1, version)?;
    fs::create_dir_all(fx.vm_home.join("ocp46bs"))?;
    fs::write(fx.disk_path("ocp46bs"), "precious bytes")?;

    let runner: Arc<dyn CommandRunner> = fx.host.clone();
    let disks = DiskProvisioner::new(fx.vm_home.clone(), runner, Arc::new(Refuse));

    let err = disks.ensure("ocp46bs", 25).await.unwrap_err();
    assert!(matches!(err, ProvisionError::ResourceConflict { .. }));
    assert_eq!(err.exit_status(), 3);

    assert_eq!(fs::read_to_string(fx.disk_path("ocp46bs"))?, "precious bytes");
    assert!(fx.host.calls_for("/usr/bin/qemu-img").is_empty());
    Ok(())
}

#[tokio::test]
async fn test_disk_ensure_is_idempotent() -> Result<()> {
    let version: ReleaseVersion = "4.6".parse().unwrap();
    let fx = Fixture::new(1, version)?;
    let runner: Arc<dyn CommandRunner> = fx.host.clone();
    let disks = DiskProvisioner::new(fx.vm_home.clone(), runner, Arc::new(Agree));

    let first = disks.ensure("ocp46bs", 25).await?;
    let after_first = fs::read_to_string(&first)?;
    let second = disks.ensure("ocp46bs", 25).await?;
    let after_second = fs::read_to_string(&second)?;

    assert_eq!(first, second);
    assert_eq!(after_first, after_second);
    Ok(())
}

#[tokio::test]
async fn test_bind_release_restores_template() -> Result<()> {
    let version: ReleaseVersion = "4.6".parse().unwrap();
    let fx = Fixture::new(2, version)?;
    let binder = BootTemplateBinder::new(fx.tftp_root.clone());

    for name in ["ocp46bs", "ocp46m10"] {
        let identity = NetworkIdentity::derive(1, version);
        let lease = binder.bind(&identity.boot_file, name)?;

        let bound = fx.template(1, version)?;
        assert!(bound.contains(name));
        assert!(!bound.contains("VERSION"));

        lease.release()?;
        assert_eq!(fx.template(1, version)?, TEMPLATE);
    }
    Ok(())
}

#[tokio::test]
async fn test_dropped_lease_restores_template() -> Result<()> {
    let version: ReleaseVersion = "4.6".parse().unwrap();
    let fx = Fixture::new(1, version)?;
    let binder = BootTemplateBinder::new(fx.tftp_root.clone());
    let identity = NetworkIdentity::derive(0, version);

    let lease = binder.bind(&identity.boot_file, "ocp46bs")?;
    drop(lease);

    assert_eq!(fx.template(0, version)?, TEMPLATE);
    Ok(())
}

#[tokio::test]
async fn test_bind_missing_template_names_the_path() -> Result<()> {
    let version: ReleaseVersion = "4.6".parse().unwrap();
    let fx = Fixture::new(0, version)?;
    let binder = BootTemplateBinder::new(fx.tftp_root.clone());
    let identity = NetworkIdentity::derive(0, version);

    let err = binder.bind(&identity.boot_file, "ocp46bs").unwrap_err();
    match err {
        ProvisionError::BootTemplate { path, .. } => {
            assert!(path.ends_with(&identity.boot_file));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_destroy_absent_vm_is_ok() -> Result<()> {
    let version: ReleaseVersion = "4.6".parse().unwrap();
    let fx = Fixture::new(0, version)?;
    // virsh rejects both destroy and undefine for a name it has never seen.
    fx.host.fail_when_matching("virsh");

    let runner: Arc<dyn CommandRunner> = fx.host.clone();
    let virt = VirtManager::new(runner, "virbr0");
    virt.destroy("no-such-guest").await?;
    Ok(())
}

#[tokio::test]
async fn test_teardown_reclaims_everything() -> Result<()> {
    let cluster = shape(3, 2);
    let fx = Fixture::new(6, cluster.version)?;
    let provisioner = fx.provisioner(Arc::new(Agree));
    provisioner.provision(&cluster).await?;

    fs::create_dir_all(&fx.config_dir)?;
    fs::write(fx.config_dir.join("bootstrap.ign"), "{}")?;

    let report = provisioner.teardown(&cluster, &fx.config_dir).await?;
    assert!(report.is_clean());

    let expected = ["ocp46bs", "ocp46m1", "ocp46m2", "ocp46m3", "ocp46w1", "ocp46w2"];
    for name in expected {
        assert!(!fx.disk_path(name).exists(), "{} disk still present", name);
    }
    assert!(!fx.config_dir.exists());

    // Every guest was stopped and undefined, in topology order.
    let destroyed: Vec<String> = fx
        .host
        .calls_for("/usr/bin/virsh")
        .iter()
        .filter(|call| call[1] == "destroy")
        .map(|call| call[2].clone())
        .collect();
    assert_eq!(destroyed, expected);
    Ok(())
}

#[tokio::test]
async fn test_teardown_continues_past_failures() -> Result<()> {
    let cluster = shape(3, 2);
    let fx = Fixture::new(6, cluster.version)?;
    let provisioner = fx.provisioner(Arc::new(Agree));
    provisioner.provision(&cluster).await?;
    fs::create_dir_all(&fx.config_dir)?;

    fx.host.fail_when_matching("ocp46m2-disk1.qcow2");

    let report = provisioner.teardown(&cluster, &fx.config_dir).await?;
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].subject, "ocp46m2");

    // Everything else was still reclaimed.
    for name in ["ocp46bs", "ocp46m1", "ocp46m3", "ocp46w1", "ocp46w2"] {
        assert!(!fx.disk_path(name).exists(), "{} disk still present", name);
    }
    assert!(fx.disk_path("ocp46m2").exists());
    assert!(!fx.config_dir.exists());
    Ok(())
}

#[tokio::test]
async fn test_config_dir_checks() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let fresh = tmp.path().join("fresh");

    // A missing path is created without asking anyone.
    ensure_config_dir(&fresh, &Refuse)?;
    assert!(fresh.is_dir());

    // An existing path needs an explicit go-ahead.
    let err = ensure_config_dir(&fresh, &Refuse).unwrap_err();
    assert!(matches!(err, ProvisionError::ConfirmationDeclined(_)));
    assert_eq!(err.exit_status(), 3);

    ensure_config_dir(&fresh, &Agree)?;
    Ok(())
}

#[tokio::test]
async fn test_oversized_shape_is_rejected() -> Result<()> {
    let version: ReleaseVersion = "4.6".parse().unwrap();
    let fx = Fixture::new(0, version)?;
    let provisioner = fx.provisioner(Arc::new(Agree));

    let cluster = shape(60, 60);
    let err = provisioner.provision(&cluster).await.unwrap_err();
    assert!(matches!(err, ProvisionError::ShapeTooLarge(121)));
    assert!(fx.host.calls.lock().unwrap().is_empty());
    Ok(())
}
