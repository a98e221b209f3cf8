//! ChromaSync - music-reactive palette and animation signal engine
//!
//! Runs the palette engine against a simulated media host and publishes
//! styling variables to an in-memory store.
//!
//! Usage: `chromasync [config.toml]`

#![warn(missing_docs)]

mod config;
mod logging_setup;
mod simulator;

use anyhow::{Context, Result};
use chromasync_control::{AnalysisConfig, AnalysisService, UpdateSource};
use chromasync_core::variables::variable_name;
use chromasync_core::{EngineConfig, PaletteEngine, Settings, SharedVariableStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use config::{AppConfig, SimulationConfig, DEFAULT_CONFIG_FILE};
use simulator::{default_playlist, SimulatedHost};

/// Every n-th simulated host call times out
const HOST_FAIL_EVERY: usize = 7;

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn log_snapshot(store: &SharedVariableStore) {
    let snapshot = store.snapshot();
    let value = |suffix: &str| {
        snapshot
            .values
            .get(&variable_name(suffix))
            .map(String::as_str)
            .unwrap_or("-")
            .to_string()
    };
    info!(
        "[gen {}] primary {} secondary {} accent {} | mood {} | pulse {} breathing {}",
        snapshot.generation,
        value("primary"),
        value("secondary"),
        value("accent"),
        value("mood"),
        value("pulse-intensity"),
        value("breathing-scale"),
    );
}

async fn run(sim: &SimulationConfig, settings: Settings, store: SharedVariableStore) -> Result<()> {
    let host = Arc::new(SimulatedHost::new(
        default_playlist(),
        Duration::from_millis(sim.host_latency_ms),
        HOST_FAIL_EVERY,
    ));
    let analysis = AnalysisConfig {
        expressiveness: settings.expressiveness,
        ..AnalysisConfig::default()
    };
    let service = AnalysisService::spawn(host.clone(), analysis);
    let handle = service.handle();
    let mut updates = handle
        .subscribe()
        .await
        .context("Analysis service failed to start")?;

    let mut engine = PaletteEngine::new(settings, EngineConfig::default());

    let start = Instant::now();
    let deadline = sim.duration_secs.map(|secs| start + Duration::from_secs(secs));
    let mut frames = interval(Duration::from_millis(sim.frame_interval_ms.max(1)));
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut report = interval(Duration::from_secs(sim.report_interval_secs.max(1)));
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut skip = interval(Duration::from_secs(sim.track_secs.max(1)));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut next_index = 0usize;
    let mut playing: Option<(usize, Instant)> = None;
    let mut beats = 0u64;

    loop {
        tokio::select! {
            _ = frames.tick() => {
                let now_ms = start.elapsed().as_secs_f64() * 1000.0;
                if let Some((index, started)) = playing {
                    if let Some(track) = host.track(index) {
                        let energy = track.energy_at(started.elapsed().as_secs_f64() * 1000.0);
                        if engine.observe_energy(energy, now_ms) {
                            beats += 1;
                            trace!("Beat {} at {:.0}ms", beats, now_ms);
                        }
                    }
                }
                engine.publish_frame(now_ms, &store);
            }
            _ = skip.tick() => {
                if let Some(track) = host.track(next_index) {
                    info!("Now playing: {} ({})", track.title, track.id);
                    engine.set_extracted_color(track.artwork_color());
                    handle
                        .track_changed(track.id)
                        .await
                        .context("Analysis service stopped unexpectedly")?;
                    playing = Some((next_index, Instant::now()));
                }
                next_index += 1;
            }
            update = updates.recv() => match update {
                Some(update) => {
                    if update.source == UpdateSource::Fallback {
                        warn!("Using safe default features for {}", update.state.track_id);
                    }
                    debug!(
                        "Music update for {} ({:?}, mood {})",
                        update.state.track_id, update.source, update.state.mood
                    );
                    engine.on_music(update.state.as_ref().clone());
                }
                None => {
                    warn!("Analysis service closed its update stream");
                    break;
                }
            },
            _ = report.tick() => log_snapshot(&store),
            _ = sleep_until_deadline(deadline) => {
                info!("Run duration reached");
                break;
            }
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted");
                break;
            }
        }
    }

    if let Ok(stats) = handle.stats().await {
        info!(
            "Analysis: {} updates, {} fallbacks, cache hit rate {:.0}%",
            stats.published,
            stats.fallbacks,
            stats.cache.hit_rate() * 100.0
        );
    }
    info!("Declared {} beats", beats);
    service.shutdown().await;
    Ok(())
}

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = AppConfig::load_or_default(&config_path)?;

    let _log_guard = logging_setup::init(&config.log)?;

    info!("==========================================");
    info!("===     ChromaSync Session Started     ===");
    info!("==========================================");

    let (settings, healed) = Settings::load_map(&config.settings);
    if !healed.is_empty() && config_path.exists() {
        config.settings = settings.to_map();
        match config.save(&config_path) {
            Ok(()) => info!("Healed {} settings in {:?}", healed.len(), config_path),
            Err(e) => warn!("Could not persist healed settings: {:#}", e),
        }
    }
    info!(
        "Settings: rule {}, theme {}, expressiveness {}, quality {}",
        settings.harmony_rule.as_str(),
        settings.theme.as_str(),
        settings.expressiveness,
        settings.performance_quality
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    let store = SharedVariableStore::new();
    runtime.block_on(run(&config.simulation, settings, store.clone()))?;

    log_snapshot(&store);
    info!("--- ChromaSync Session Ended ---");
    Ok(())
}
