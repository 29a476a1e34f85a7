//! Built-in certificate update handlers.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use certdx_config::CertificationConfig;
use tokio::process::Command;
use tracing::{info, warn};

use crate::storage;
use crate::watch::{CertMaterial, CertUpdateHandler};

/// Writes the new chain and key to the save path, then runs the
/// certificate's reload command if one is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteCertAndRunCommand;

impl WriteCertAndRunCommand {
    pub fn shared() -> Arc<dyn CertUpdateHandler> {
        Arc::new(Self)
    }
}

#[async_trait]
impl CertUpdateHandler for WriteCertAndRunCommand {
    fn name(&self) -> &str {
        "write-cert-and-run-command"
    }

    async fn on_update(
        &self,
        config: &CertificationConfig,
        material: &CertMaterial,
    ) -> anyhow::Result<()> {
        let owned = config.clone();
        let chain = material.fullchain.clone();
        let key = material.key.clone();
        tokio::task::spawn_blocking(move || storage::save_cert(&owned, &chain, &key))
            .await
            .context("certificate writer panicked")?
            .with_context(|| format!("failed to save certificate {}", config.name))?;

        if let Some(command) = config.reload_command.as_deref().filter(|c| !c.trim().is_empty()) {
            run_command(&config.name, command).await?;
        }
        Ok(())
    }
}

async fn run_command(cert: &str, command: &str) -> anyhow::Result<()> {
    info!(cert = %cert, command = %command, "Running reload command");

    let output = shell(command)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("failed to spawn reload command `{command}`"))?;

    if output.status.success() {
        info!(cert = %cert, status = %output.status, "Reload command finished");
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    warn!(
        cert = %cert,
        status = %output.status,
        stderr = %stderr.trim(),
        "Reload command failed"
    );
    bail!("reload command `{command}` exited with {}", output.status)
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
