use async_trait::async_trait;
use tracing::debug;

use crate::core::errors::ProvisionError;

/// Boundary for the external tools this manager drives (qemu-img,
/// virt-install, virsh, mkdir, rm). Kept behind a trait so the provisioning
/// logic can be exercised against a fake host in tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the program to completion. A non-zero exit or a spawn failure is
    /// an error carrying the command line and whatever stderr said.
    async fn run(&self, program: &str, args: &[&str]) -> Result<(), ProvisionError>;
}

/// Runs commands on the local host, optionally through sudo. Disk allocation
/// and libvirt operations are privileged on a stock install.
#[derive(Debug, Clone)]
pub struct HostRunner {
    use_sudo: bool,
}

impl HostRunner {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }
}

fn render(program: &str, args: &[&str]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[async_trait]
impl CommandRunner for HostRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<(), ProvisionError> {
        let command = render(program, args);
        debug!("Running: {}", command);

        let mut cmd = if self.use_sudo {
            let mut c = tokio::process::Command::new("/usr/bin/sudo");
            c.arg(program);
            c
        } else {
            tokio::process::Command::new(program)
        };
        cmd.args(args);

        let output = cmd
            .output()
            .await
            .map_err(|e| ProvisionError::PrivilegedCommandFailed {
                command: command.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ProvisionError::PrivilegedCommandFailed {
                command,
                detail: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(())
    }
}
