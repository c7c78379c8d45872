//! input-monitor entry point.
//!
//! ```text
//! input-monitor [CONFIG_PATH]
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- explicit path or platform config file
//!  └─ InputContext::new()      -- event system, subsystems, mappings
//!  └─ register producers
//!       └─ ScriptedProducer    (demo session or JSON-lines script)
//!  └─ Monitor::run             (blocking task, prints every event)
//!  └─ ctrl-c                   (clears the running flag)
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use input_core::{HeadlessBackend, InputContext};
use input_monitor::config::load_config;
use input_monitor::monitor::Monitor;
use input_monitor::script::{demo_session, ScriptedProducer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref()).context("loading configuration")?;

    // Initialise structured logging.  `RUST_LOG` overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.monitor.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(path = ?config_path, "input-monitor starting");

    let ctx = Arc::new(
        InputContext::new(config.core.clone(), Arc::new(HeadlessBackend::new()))
            .context("starting input context")?,
    );

    // ── Producers ─────────────────────────────────────────────────────────────
    let interval = Duration::from_millis(config.monitor.step_interval_ms);
    if let Some(script) = &config.monitor.script {
        let producer = ScriptedProducer::from_file(script, interval)?;
        info!(steps = producer.len(), path = %script.display(), "replaying script");
        ctx.add_producer(Box::new(producer))?;
    } else if config.monitor.demo {
        let producer = ScriptedProducer::new(demo_session(), interval);
        info!(steps = producer.len(), "replaying demo session");
        ctx.add_producer(Box::new(producer))?;
    } else {
        warn!("no producer configured; only Ctrl-C or the deadline will stop the monitor");
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    // ── Drain loop ────────────────────────────────────────────────────────────
    let deadline = config
        .monitor
        .run_seconds
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let monitor = Monitor::new(
        Arc::clone(&ctx),
        config.monitor.output,
        config.monitor.auto_open_controllers,
    );
    let summary = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        monitor.run(&running, deadline, &mut out)
    })
    .await
    .context("drain task panicked")??;

    info!(events = summary.events, reason = ?summary.reason, "input-monitor stopped");
    Ok(())
}
