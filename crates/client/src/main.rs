//! certdx client - main entry point

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use certdx_client::Daemon;
use certdx_common::{observability, BUILD_INFO};
use certdx_config::ClientConfig;

/// certdx client - keeps local TLS certificates in sync with certdx servers
#[derive(Parser, Debug)]
#[command(name = "certdx-client")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Configuration file path
    #[arg(
        short = 'c',
        long = "conf",
        env = "CERTDX_CONFIG",
        default_value = "./client.toml"
    )]
    conf: PathBuf,

    /// Also append log output to this file
    #[arg(short = 'l', long = "log")]
    log: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose")]
    verbose: bool,

    /// Test configuration and exit
    #[arg(short = 't', long = "test")]
    test: bool,

    /// Print version and exit
    #[arg(short = 'V', long = "version")]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("certdx client {BUILD_INFO}");
        return Ok(());
    }

    observability::init_tracing(cli.verbose, cli.log.as_deref())?;

    let config = load_config(&cli.conf)?;

    if cli.test {
        println!(
            "certdx client: configuration file {} test is successful",
            cli.conf.display()
        );
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(Daemon::new(config).run())
}

/// Load and validate the configuration file.
fn load_config(path: &Path) -> Result<ClientConfig> {
    info!(path = %path.display(), "Loading configuration");
    let config = ClientConfig::from_file(path).context("Failed to load configuration file")?;

    let result = config.validate().context("Configuration validation failed")?;
    for warning in &result.warnings {
        warn!("{}", warning);
    }

    info!(
        mode = %config.server.mode,
        certifications = config.certifications.len(),
        "Configuration loaded"
    );
    Ok(config)
}
