// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use mdl_bootstrap::config::CONFIG_DIR_ENV;
use mdl_bootstrap::host::ensure_not_sudo;
use mdl_bootstrap::{
    Error, InstallSettings, Orchestrator, StdinPrompter, SystemHost, success_summary,
};
use std::path::PathBuf;
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "mdl-setup")]
#[command(author, version, about = "Install and configure the mdl server", long_about = None)]
struct Cli {
    /// mdl installation directory (default: current directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Configuration directory; repeat for several, the first is primary
    #[arg(short, long = "config-dir", value_name = "DIR")]
    config_dir: Vec<PathBuf>,

    /// systemd unit directory
    #[arg(long, default_value = "/etc/systemd/system")]
    systemd_dir: PathBuf,

    /// Python interpreter to check
    #[arg(long, default_value = "python3")]
    python: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(()) => {}
        Err(e) => {
            error!("{:#}", e);
            let status = match e.downcast_ref::<Error>() {
                Some(err) => {
                    eprintln!(
                        "\nERROR {} (exit status {}): {:#}",
                        err.code(),
                        err.exit_status(),
                        e
                    );
                    err.exit_status()
                }
                None => {
                    eprintln!("\nERROR: {:#}", e);
                    1
                }
            };
            std::process::exit(i32::from(status));
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    ensure_not_sudo(&SystemHost)?;

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("Install root {} is not accessible", root.display()))?;

    let mut settings = InstallSettings::new(&root)
        .with_config_dirs(cli.config_dir, std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from));
    settings.systemd_dir = cli.systemd_dir;
    settings.interpreter = cli.python;
    debug!("Install settings: {:?}", settings);

    let mut orchestrator = Orchestrator::new(settings, SystemHost, StdinPrompter);
    let report = orchestrator.run();

    for (stage, status) in report.summary() {
        println!("{:<20} {}", stage.name(), status);
    }

    let report = report.into_result()?;
    print!("{}", success_summary(&report));
    Ok(())
}
