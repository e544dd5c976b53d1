use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vessel_core::capability::{ToolRegistry, catalog};
use vessel_core::config::VesselCfg;
use vessel_core::io::{AvatarPaths, Mailbox, read_json_retry};

const READ_ATTEMPTS: usize = 5;
const READ_DELAY: Duration = Duration::from_millis(50);
const WAIT_POLL: Duration = Duration::from_millis(200);

/// Operator side of a vessel avatar: submit commands and read its reports.
#[derive(Debug, Parser)]
#[command(name = "vessel-cli", version)]
struct Cli {
    #[arg(long, env = "VESSEL_ROOT", default_value = ".", global = true)]
    root: PathBuf,

    #[arg(long, env = "VESSEL_AVATAR", global = true, default_value = "bob")]
    avatar: String,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Queue an action script. Reads stdin when SCRIPT is `-` or omitted.
    Send {
        script: Option<String>,
        /// Replace a command that has not been picked up yet.
        #[arg(long)]
        force: bool,
        /// Wait up to this many seconds for the outcome and print it.
        #[arg(long, value_name = "SECS")]
        wait: Option<u64>,
    },
    /// Current status report.
    Status,
    /// Outcome of the last executed command.
    Outcome,
    /// Recent events, oldest first.
    Events,
    /// Recent chat lines, oldest first.
    Chat,
    /// Script of the last command taken from the inbox.
    Last,
    /// Markdown listing of every tool the avatar can call.
    Catalog,
    /// Effective configuration with descriptions.
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let cli = Cli::parse();
    let paths = AvatarPaths::new(&cli.root, &cli.avatar);

    match cli.command {
        Cmd::Send { script, force, wait } => send(&paths, script, force, wait).await,
        Cmd::Status => print_json(&paths.status()).await,
        Cmd::Outcome => print_json(&paths.outbox()).await,
        Cmd::Events => print_json(&paths.events()).await,
        Cmd::Chat => print_json(&paths.chat()).await,
        Cmd::Last => {
            match Mailbox::new(&paths).last_action()? {
                Some(script) => println!("{}", script.trim_end()),
                None => eprintln!("no command taken yet"),
            }
            Ok(())
        }
        Cmd::Catalog => {
            let cfg = VesselCfg::load(&paths.config())?;
            let registry = ToolRegistry::new(&paths, cfg.max_tool_depth);
            let summary = registry.load();
            if summary.failed > 0 {
                eprintln!("{} tool file(s) failed to load", summary.failed);
            }
            print!("{}", catalog::render(&registry.snapshot()));
            Ok(())
        }
        Cmd::Config => {
            let cfg = VesselCfg::load(&paths.config())?;
            let entries = cfg.to_entries();
            let width = entries.iter().map(|(k, _, _)| k.len()).max().unwrap_or(0);
            for (key, value, desc) in entries {
                println!("{key:<width$}  {value:<10}  {desc}");
            }
            Ok(())
        }
    }
}

async fn send(paths: &AvatarPaths, script: Option<String>, force: bool, wait: Option<u64>) -> anyhow::Result<()> {
    let script = match script.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("read script from stdin")?;
            buf
        }
        Some(s) => s.to_string(),
    };
    if script.trim().is_empty() {
        bail!("empty script");
    }

    let before = modified(&paths.outbox());
    Mailbox::new(paths).submit(&script, force)?;
    tracing::debug!(avatar = paths.name(), "command submitted");

    let Some(secs) = wait else {
        return Ok(());
    };
    let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(WAIT_POLL).await;
        if modified(&paths.outbox()) != before {
            return print_json(&paths.outbox()).await;
        }
    }
    bail!("no outcome after {secs}s")
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

async fn print_json(path: &Path) -> anyhow::Result<()> {
    let value: serde_json::Value = read_json_retry(path, READ_ATTEMPTS, READ_DELAY)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
