use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use burnote_store::{CipherEngine, Retrieval, SecretStore, StoreConfig};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "burnote", about = "Burnote — read-once secret store host", version)]
struct Cli {
    /// Log filter, e.g. `info` or `burnote_store=debug` ($BURNOTE_LOG_LEVEL)
    #[arg(long, env = "BURNOTE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host the store until interrupted, sweeping expired secrets
    Run {
        /// Override the sweep interval in seconds ($BURNOTE_SWEEP_INTERVAL_SECS)
        #[arg(long)]
        sweep_interval_secs: Option<u64>,
        /// How often to log store statistics, in seconds
        #[arg(long, default_value = "300")]
        stats_interval_secs: u64,
    },
    /// Validate configuration and time one encrypt/decrypt/hash cycle
    Check,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run {
            sweep_interval_secs,
            stats_interval_secs,
        } => cmd_run(sweep_interval_secs, stats_interval_secs).await,
        Commands::Check => cmd_check(),
    }
}

fn load_config(sweep_interval_secs: Option<u64>) -> Result<StoreConfig> {
    let mut config = StoreConfig::from_env().context("load store configuration")?;
    if let Some(secs) = sweep_interval_secs {
        config.sweep_interval = (secs > 0).then_some(Duration::from_secs(secs));
    }
    Ok(config)
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_run(sweep_interval_secs: Option<u64>, stats_interval_secs: u64) -> Result<()> {
    let config = load_config(sweep_interval_secs)?;
    info!(
        sweep_interval_secs = config.sweep_interval.map(|d| d.as_secs()),
        kdf_memory_kib = config.kdf.memory_kib,
        kdf_iterations = config.kdf.iterations,
        "opening secret store"
    );

    let store = SecretStore::open(config).context("open secret store")?;

    let mut stats_ticker = tokio::time::interval(Duration::from_secs(stats_interval_secs.max(1)));
    stats_ticker.tick().await; // skip first immediate tick

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = stats_ticker.tick() => {
                let stats = store.stats();
                info!(
                    total_records = stats.total_records,
                    expired_pending = stats.expired_pending,
                    "store stats"
                );
            }
            signal = &mut shutdown => {
                signal.context("listen for ctrl-c")?;
                info!("shutdown requested");
                break;
            }
        }
    }

    store.shutdown().await;
    let stats = store.stats();
    info!(
        discarded = stats.total_records,
        "secret store closed; remaining secrets are gone"
    );
    Ok(())
}

fn cmd_check() -> Result<()> {
    let config = load_config(Some(0))?;
    let kdf = config.kdf;
    let engine = CipherEngine::new(kdf).context("build cipher engine")?;
    let key = config.master_key.as_bytes();

    let started = Instant::now();
    let blob = engine
        .encrypt(b"burnote self-test", key)
        .context("encrypt self-test payload")?;
    let encrypt_ms = started.elapsed().as_millis();

    let started = Instant::now();
    let plaintext = engine
        .decrypt(&blob, key)
        .context("decrypt self-test payload")?;
    let decrypt_ms = started.elapsed().as_millis();
    anyhow::ensure!(
        plaintext.as_slice() == b"burnote self-test",
        "self-test payload did not round-trip"
    );

    let started = Instant::now();
    let record = engine.hash_password("self-test").context("hash password")?;
    anyhow::ensure!(
        engine.verify_password("self-test", &record)?,
        "password did not verify"
    );
    let password_ms = started.elapsed().as_millis();

    // Exercise the full store path once, with the sweeper disabled.
    let store = SecretStore::open(config).context("open secret store")?;
    let id = store.create("burnote self-test", Some("pw"), Some(1))?;
    let outcome = store.retrieve_and_consume(&id, Some("pw"))?;
    anyhow::ensure!(
        matches!(outcome, Retrieval::Revealed(_)) && !store.check_exists(&id).exists,
        "store self-test failed"
    );

    let report = serde_json::json!({
        "status": "ok",
        "kdf": {
            "memory_kib": kdf.memory_kib,
            "iterations": kdf.iterations,
            "parallelism": kdf.parallelism,
        },
        "timings_ms": {
            "encrypt": encrypt_ms,
            "decrypt": decrypt_ms,
            "hash_and_verify": password_ms,
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
