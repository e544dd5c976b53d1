use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vessel_core::config::VesselCfg;
use vessel_core::io::AvatarPaths;
use vessel_core::runtime::{Runtime, RuntimeError};
use vessel_world::sim::SimWorld;

/// Run one avatar's control loop against the built-in simulated world.
#[derive(Debug, Parser)]
#[command(name = "vessel", version)]
struct Args {
    /// Vessel root holding `avatars/` and `shared/`.
    #[arg(long, env = "VESSEL_ROOT", default_value = ".")]
    root: PathBuf,

    /// Avatar name; its directory is `<root>/avatars/<name>`.
    #[arg(long, env = "VESSEL_AVATAR")]
    avatar: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }

    let paths = AvatarPaths::new(&args.root, &args.avatar);
    paths.ensure()?;
    let cfg = Arc::new(VesselCfg::load(&paths.config())?);
    let username = cfg.username_for(&args.avatar);
    tracing::info!(avatar = %args.avatar, username = %username, root = %args.root.display(), "starting vessel");

    let world = Arc::new(SimWorld::new(username));
    let runtime = Runtime::new(cfg, paths, world);
    match runtime.run().await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(RuntimeError::FatalConnection(reason)) => {
            tracing::error!(reason = %reason, "disconnected, exiting for supervisor restart");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
