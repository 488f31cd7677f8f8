//! CLI binary for the sandbox launcher

use anyhow::Context;
use clap::Parser;
use sandbox_launcher::{
    config::LauncherConfig,
    sandbox::{CoordinatorSettings, LaunchRequest},
    utils::{require_linux, DebugLogger},
    ContainerLauncher, DockerClient, LifecycleCoordinator, SandboxError, SandboxVerifier, VERSION,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "sandbox-launch")]
#[command(about = "Run a container under an enforced gVisor sandbox runtime", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Image to run
    image: String,

    /// Command to run in the container (defaults to the image command)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,

    /// Command as a single shell-quoted string
    #[arg(long, conflicts_with = "command")]
    command_line: Option<String>,

    /// Path to settings file (JSON or TOML)
    #[arg(short, long, env = "SANDBOX_LAUNCHER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Required runtime name (overrides config)
    #[arg(long)]
    runtime: Option<String>,

    /// Required runtime binary path (overrides config)
    #[arg(long)]
    runtime_path: Option<String>,

    /// Give up on the container after this many seconds
    #[arg(long)]
    wait_timeout: Option<u64>,

    /// Use the local image without pulling
    #[arg(long)]
    no_pull: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logger
    DebugLogger::init(cli.debug);

    // Run and exit with appropriate code
    let exit_code = run(cli).await.unwrap_or_else(|e| {
        eprintln!("Error: {:#}", e);
        e.downcast_ref::<SandboxError>()
            .map_or(1, SandboxError::exit_code)
    });

    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    require_linux()?;

    // Load configuration
    let mut config = match cli.settings {
        Some(ref settings_path) => LauncherConfig::from_file(settings_path)
            .with_context(|| format!("loading settings from {}", settings_path.display()))?,
        None => {
            let default_path = LauncherConfig::default_settings_path();
            if default_path.exists() {
                LauncherConfig::from_file(&default_path).with_context(|| {
                    format!("loading settings from {}", default_path.display())
                })?
            } else {
                LauncherConfig::default()
            }
        }
    };

    // Override with CLI arguments
    if let Some(runtime) = cli.runtime {
        config.sandbox.runtime_name = runtime;
    }
    if let Some(runtime_path) = cli.runtime_path {
        config.sandbox.binary_path = runtime_path;
    }
    if cli.wait_timeout.is_some() {
        config.wait_timeout_secs = cli.wait_timeout;
    }
    config.validate()?;

    let command = match cli.command_line {
        Some(line) => shell_words::split(&line)
            .map_err(|e| SandboxError::Config(format!("invalid --command-line: {}", e)))?,
        None => cli.command,
    };
    let request = LaunchRequest {
        pull: !cli.no_pull,
        ..LaunchRequest::new(cli.image, command)
    };

    let client = Arc::new(DockerClient::connect().await.map_err(SandboxError::from)?);

    // Nothing is created unless the host passes
    let sandbox = Arc::new(config.sandbox_configuration()?);
    let host = SandboxVerifier::new()
        .verify_host_environment(client.as_ref(), sandbox)
        .await
        .map_err(SandboxError::from)?;

    let coordinator = LifecycleCoordinator::new(
        ContainerLauncher::new(client, host),
        CoordinatorSettings::from(&config),
    );
    coordinator
        .violation_store()
        .subscribe(|violation| error!("{}", violation));

    let shutdown = CancellationToken::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, tearing the container down");
            interrupt.cancel();
        }
    });

    let mut progress = std::io::stderr();
    let report = coordinator.run(&request, &mut progress, &shutdown).await?;

    std::io::stdout().write_all(&report.logs.stdout)?;
    std::io::stderr().write_all(&report.logs.stderr)?;
    if report.logs.truncated {
        warn!("Container output was truncated");
    }

    Ok(i32::try_from(report.exit_code).unwrap_or(1))
}
