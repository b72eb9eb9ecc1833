//! Robin - iOS release automation CLI
//!
//! ## Commands
//!
//! - `build ios`: bump the build number, archive and export an IPA
//! - `init`: write a starter `robin.yml` for the current project

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use robin_core::{
    init_project, Credentials, ProjectType, RobinConfig, CONFIG_FILE, CREDENTIALS_FILE,
    DEFAULT_ENVIRONMENT,
};
use robin_ios::{BuildOrchestrator, IncrementOutcome, RunResult, SystemRunner, Toolchain};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "robin")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and export iOS apps from robin.yml", long_about = None)]
struct Cli {
    /// Enable verbose output (echoes xcodebuild output during builds)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and a JSON run report
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build app using the configuration from robin.yml
    Build {
        /// Target platform
        #[arg(value_enum)]
        platform: Platform,

        /// Environment under build.ios.environments
        #[arg(short, long, default_value = DEFAULT_ENVIRONMENT)]
        env: String,

        /// Build configuration file
        #[arg(long, default_value = CONFIG_FILE)]
        config: PathBuf,

        /// Credentials file
        #[arg(long, default_value = CREDENTIALS_FILE)]
        credentials: PathBuf,

        /// Kill any toolchain step running longer than this many seconds
        #[arg(long, env = "ROBIN_TIMEOUT_SECS")]
        timeout: Option<u64>,
    },

    /// Initialize Robin configuration for the project in PATH
    Init {
        /// Project directory (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing robin.yml
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Platform {
    Ios,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    robin_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Build {
            platform,
            env,
            config,
            credentials,
            timeout,
        } => match platform {
            Platform::Ios => {
                cmd_build_ios(
                    &config,
                    &credentials,
                    &env,
                    timeout.map(Duration::from_secs),
                    cli.verbose,
                    cli.json,
                )
                .await
            }
        },
        Commands::Init { path, force } => cmd_init(&path, force),
    }
}

async fn cmd_build_ios(
    config_path: &Path,
    credentials_path: &Path,
    environment: &str,
    timeout: Option<Duration>,
    verbose: bool,
    json: bool,
) -> Result<()> {
    let config = RobinConfig::load(config_path).context("Failed to load build configuration")?;
    let spec = config
        .ios_build_spec(environment, verbose, timeout)
        .context("Failed to resolve build environment")?;
    let credentials =
        Credentials::load(credentials_path).context("Failed to load credentials")?;

    println!("Building app: {}", spec.app_name);
    println!("Scheme: {} ({})", spec.scheme, environment);
    println!();

    let orchestrator =
        BuildOrchestrator::new(Arc::new(SystemRunner)).with_toolchain(Toolchain::from_env());

    let report = match orchestrator.run_ios_build(spec, &credentials).await {
        RunResult::Success(report) => report,
        RunResult::Failed(failure) => {
            if let Some(log) = &failure.log_path {
                eprintln!("✗ {} failed. Check logs: {}", failure.stage, log.display());
            }
            return Err(failure).context("iOS build failed");
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Run ID: {}", report.run_id);
    println!("Status: ✓ PASSED");
    println!("Duration: {}ms", report.duration_ms);
    match &report.build_number {
        IncrementOutcome::Skipped => {}
        IncrementOutcome::Incremented { version } => println!(
            "Build number: {}",
            version.as_deref().unwrap_or("incremented")
        ),
        IncrementOutcome::Failed { reason } => println!("Build number: not incremented ({reason})"),
    }
    println!("Archive: {}", report.paths.archive.display());
    println!("IPA:     {}", report.paths.export.display());
    info!(log = %report.paths.log.display(), "Toolchain log");

    Ok(())
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    let (project_type, written) = init_project(path, force)
        .with_context(|| format!("Failed to initialize Robin in {}", path.display()))?;

    match project_type {
        ProjectType::Expo => println!("Detected Expo project"),
        ProjectType::Unknown => {
            println!("Could not detect a known project type. Created a default configuration.")
        }
    }
    println!("Wrote {}", written.display());
    Ok(())
}
