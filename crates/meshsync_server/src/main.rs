//! MeshSync receiver
//!
//! Listens for DCC connections and keeps a live copy of the synced scene.
//!
//! Run with: cargo run --bin meshsync [config.toml]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use meshsync_ir::{PollType, SceneState};
use meshsync_server::{ServerSettings, SyncSession, VERSION};

/// Target update rate of the consumer loop
const FRAME_TIME: Duration = Duration::from_millis(16);

#[derive(Serialize)]
struct SceneSummary<'a> {
    entities: usize,
    materials: usize,
    roots: Vec<&'a str>,
}

impl<'a> SceneSummary<'a> {
    fn of(state: &'a SceneState) -> Self {
        Self {
            entities: state.len(),
            materials: state.materials().count(),
            roots: state.root_nodes(),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    log::info!("MeshSync v{}", VERSION);

    // First positional argument overrides the config search
    let settings = match std::env::args().nth(1) {
        Some(path) => match ServerSettings::load_from_file(&path) {
            Ok(mut settings) => {
                log::info!("Loaded settings from {}", path);
                settings.apply_overrides(|key| std::env::var(key).ok());
                settings
            }
            Err(e) => {
                log::error!("Cannot load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => ServerSettings::load(),
    };

    let mut session = match SyncSession::start(settings) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        shutdown_flag.store(true, Ordering::Relaxed);
    }) {
        log::warn!("No signal handler installed: {}", e);
    }

    while !shutdown.load(Ordering::Relaxed) {
        let frame_start = Instant::now();

        session.update();
        if session.take_scene_update() {
            let live = session.live();
            match serde_json::to_string(&SceneSummary::of(&live)) {
                Ok(summary) => log::info!("Scene updated: {}", summary),
                Err(e) => log::warn!("Scene summary failed: {}", e),
            }
            session.notify_poll(PollType::SceneUpdate);
        }

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_TIME {
            std::thread::sleep(FRAME_TIME - elapsed);
        }
    }

    session.stop();
    log::info!("Shutdown complete");
}
