#![allow(missing_docs)]

//! convoke: batch membership runner CLI.
//!
//! Subcommands: `plan` validates a roster without touching any service,
//! `rehearse` replays a roster against the built-in deterministic backend
//! with real pacing, `presets` lists the delay strategies.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use convoke::config::ConvokeConfig;
use convoke::engine::delay::DelayPolicy;
use convoke::engine::BatchRunner;
use convoke::roster::load_roster;
use convoke::sim::SimService;
use convoke::types::{Group, GroupKind};

#[derive(Parser)]
#[command(name = "convoke", version, about = "Rate-limit-aware bulk membership runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and filter a roster file; show what a run would process.
    Plan {
        /// Roster file, one handle per line.
        roster: PathBuf,
        /// Emit the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run the full engine against the built-in deterministic backend.
    Rehearse {
        /// Roster file, one handle per line.
        roster: PathBuf,
        /// Delay preset; overrides the configured delay range.
        #[arg(long, value_enum)]
        preset: Option<Preset>,
        /// Title of the simulated destination group.
        #[arg(long, default_value = "rehearsal")]
        title: String,
        /// Kind of the simulated destination group.
        #[arg(long, value_enum, default_value_t = KindArg::Supergroup)]
        kind: KindArg,
        /// Send invite links to accounts that cannot be added directly.
        #[arg(long)]
        fallback: bool,
    },
    /// List the built-in delay presets.
    Presets,
}

/// Delay strategy presets.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// Fixed 1-3s. Fast but risky.
    Aggressive,
    /// Fixed 3-6s. Recommended.
    Balanced,
    /// Fixed 8-15s. Safest.
    Conservative,
    /// History-aware 2-8s base range.
    Adaptive,
}

impl Preset {
    fn policy(self) -> DelayPolicy {
        match self {
            Self::Aggressive => DelayPolicy::aggressive(),
            Self::Balanced => DelayPolicy::balanced(),
            Self::Conservative => DelayPolicy::conservative(),
            Self::Adaptive => DelayPolicy::adaptive(),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Group,
    Supergroup,
    Broadcast,
}

impl KindArg {
    fn kind(self) -> GroupKind {
        match self {
            Self::Group => GroupKind::Group,
            Self::Supergroup => GroupKind::Supergroup,
            Self::Broadcast => GroupKind::BroadcastChannel,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Plan { roster, json } => {
            convoke::logging::init_cli();
            plan(&roster, json)
        }
        Command::Rehearse {
            roster,
            preset,
            title,
            kind,
            fallback,
        } => rehearse(&roster, preset, title, kind, fallback).await,
        Command::Presets => {
            convoke::logging::init_cli();
            presets();
            Ok(())
        }
    }
}

fn plan(path: &Path, json: bool) -> Result<()> {
    let roster = load_roster(path).context("failed to load roster")?;
    if json {
        let out = serde_json::json!({
            "targets": roster.targets,
            "valid": roster.targets.len(),
            "ignored_lines": roster.ignored_lines,
            "rejected_lines": roster.rejected_lines,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "{}: {} valid handles ({} comment/blank lines ignored, {} rejected)",
            path.display(),
            roster.targets.len(),
            roster.ignored_lines,
            roster.rejected_lines,
        );
        for target in &roster.targets {
            println!("  {target}");
        }
    }
    Ok(())
}

async fn rehearse(
    path: &Path,
    preset: Option<Preset>,
    title: String,
    kind: KindArg,
    fallback: bool,
) -> Result<()> {
    let config = ConvokeConfig::load().context("failed to load configuration")?;
    let _logging_guard =
        convoke::logging::init_run(Path::new(&config.logging.dir), &config.logging.level)?;

    let roster = load_roster(path).context("failed to load roster")?;
    if roster.targets.is_empty() {
        warn!(path = %path.display(), "roster contains no valid handles");
        return Ok(());
    }

    let policy = match preset {
        Some(preset) => preset.policy(),
        None => config.delay.policy()?,
    };
    let fallback_enabled = fallback || config.fallback.enabled;

    let group = Group {
        id: 1,
        title,
        kind: kind.kind(),
        is_admin: true,
    };

    let backend = Arc::new(SimService::new());
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received shutdown signal, finishing current target");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let resolver: Arc<dyn convoke::api::IdentityResolver> = Arc::clone(&backend) as _;
    let membership: Arc<dyn convoke::api::MembershipApi> = Arc::clone(&backend) as _;
    let messaging: Arc<dyn convoke::api::MessagingApi> = backend;
    let mut runner = BatchRunner::new(resolver, membership, messaging)
        .with_cancel_flag(cancel)
        .with_invite_message(config.fallback.invite_message.clone());

    let report = runner
        .run(&roster.targets, &group, policy, fallback_enabled)
        .await;

    if let Some(cause) = &report.aborted {
        warn!(cause = %cause, "run stopped early; report covers partial progress");
    }
    info!(links_sent = report.links_sent, "rehearsal finished");

    println!("{}", report.summary().render());
    Ok(())
}

fn presets() {
    println!("available delay presets:");
    println!("  aggressive    fixed 1-3s per target (fast but risky)");
    println!("  balanced      fixed 3-6s per target (recommended)");
    println!("  conservative  fixed 8-15s per target (safest)");
    println!("  adaptive      2-8s base range, adjusts to outcome history");
}
