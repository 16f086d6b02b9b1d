// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use snapcam::backends::camera::CameraBackendType;
use snapcam::config::PermissionSource;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "snapcam")]
#[command(about = "Take a photo once camera access is granted")]
#[command(version = snapcam::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.config/snapcam/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Camera backend
    #[arg(short, long, global = true)]
    backend: Option<BackendArg>,

    /// V4L2 device node
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Directory photos are written to (default: ~/Pictures/snapcam)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Where the camera access decision comes from
    #[arg(short, long, global = true)]
    permission: Option<PermissionArg>,

    /// Give up on a capture after this many milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Request access, take one photo and print where it was saved
    Photo,

    /// Interactive session driven from stdin
    Session,

    /// Show the camera permission status
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    V4l2,
    Virtual,
}

#[derive(Clone, Copy, ValueEnum)]
enum PermissionArg {
    Auto,
    Portal,
    Device,
    Granted,
    Denied,
}

impl From<BackendArg> for CameraBackendType {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::V4l2 => CameraBackendType::V4l2,
            BackendArg::Virtual => CameraBackendType::Virtual,
        }
    }
}

impl From<PermissionArg> for PermissionSource {
    fn from(arg: PermissionArg) -> Self {
        match arg {
            PermissionArg::Auto => PermissionSource::Auto,
            PermissionArg::Portal => PermissionSource::Portal,
            PermissionArg::Device => PermissionSource::Device,
            PermissionArg::Granted => PermissionSource::Granted,
            PermissionArg::Denied => PermissionSource::Denied,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=snapcam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let config = cli::load_config(cli::Overrides {
        config_path: cli.config,
        backend: cli.backend.map(Into::into),
        device: cli.device,
        output: cli.output,
        permission: cli.permission.map(Into::into),
        timeout_ms: cli.timeout_ms,
    });

    let result = match cli.command {
        Commands::Photo => cli::take_photo(config),
        Commands::Session => cli::run_session(config),
        Commands::Status => cli::show_status(&config),
    };
    result.map_err(Into::into)
}
