use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use opencode_starcraft::cache::{AssetCache, HttpFetcher, Provision};
use opencode_starcraft::catalog::{builtin_packs, Catalog};
use opencode_starcraft::config;
use opencode_starcraft::dispatcher::Dispatcher;
use opencode_starcraft::effect::{EffectRunner, ProcessRunner};
use opencode_starcraft::event::DaemonEvent;
use opencode_starcraft::intake;
use opencode_starcraft::paths;
use opencode_starcraft::telemetry::{HttpTransport, TelemetryTransport};

/// Plays StarCraft voice lines for OpenCode events read from stdin.
#[derive(Parser, Debug)]
#[command(name = "opencode-starcraft", version, about)]
struct Args {
    /// Settings file (defaults to ~/.config/opencode/opencode-starcraft.json)
    #[arg(long, env = "OPENCODE_STARCRAFT_CONFIG")]
    config: Option<PathBuf>,

    /// Sound cache directory (defaults to ~/.config/opencode/sounds/starcraft)
    #[arg(long, env = "OPENCODE_STARCRAFT_SOUNDS_DIR")]
    sounds_dir: Option<PathBuf>,

    /// Never download sound packs; use whatever is already cached
    #[arg(long)]
    skip_download: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = args.config.unwrap_or_else(paths::config_file_path);
    let config = config::load(&config_path);

    // Signals first: provisioning can take minutes and SIGUSR1's default action
    // would otherwise kill the process. Anything sent meanwhile waits in the queue.
    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(64);
    tokio::spawn(intake::watch_signals(event_tx.clone()));

    // ── Sound cache ───────────────────────────────────────────────────────────
    let cache = AssetCache::new(
        args.sounds_dir.unwrap_or_else(paths::sounds_dir),
        builtin_packs(),
    );
    if args.skip_download {
        if !cache.is_ready() {
            warn!("Sound cache incomplete and downloads disabled; missing: {}", cache.missing().join(", "));
        }
    } else {
        match HttpFetcher::new() {
            Ok(fetcher) => {
                if let Provision::Failed(e) = cache.ensure_ready(&fetcher).await {
                    warn!("Sound provisioning skipped: {e}");
                }
            }
            Err(e) => warn!("Failed to set up downloader: {e}"),
        }
    }

    // ── Dispatcher ────────────────────────────────────────────────────────────
    let runner: Arc<dyn EffectRunner> = Arc::new(ProcessRunner::new(config.sound.player.clone()));
    let transport: Arc<dyn TelemetryTransport> =
        Arc::new(HttpTransport::new().context("Failed to set up telemetry client")?);
    let mut dispatcher = Dispatcher::new(
        config,
        Catalog::builtin(),
        cache,
        runner,
        transport,
        StdRng::from_entropy(),
    );

    tokio::spawn(intake::read_events(BufReader::new(tokio::io::stdin()), event_tx));

    info!(
        "opencode-starcraft v{} ready (profile: {})",
        env!("CARGO_PKG_VERSION"),
        dispatcher.profile()
    );

    // ── Event loop ────────────────────────────────────────────────────────────
    dispatcher.run(&mut event_rx).await;

    // The stdin reader sits on a blocking thread that cannot be cancelled, so
    // returning from main would wait on it for as long as the host keeps the
    // pipe open. In-flight telemetry is abandoned.
    std::process::exit(0);
}

/// Logs go to stderr; stdout belongs to the host.
fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
