use engine::map::TmxMapSource;
use engine::sim::WorldConfig;
use engine::{resolve_app_paths, LoopConfig, Scene, StartupError};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::overworld::OverworldScene;
use super::settings::{load_settings, SettingsError};

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "=== Overworld Startup ===");

    let paths = resolve_app_paths()?;
    let settings = load_settings(&paths.settings_path)?;
    let world_config = WorldConfig::default();
    let config = LoopConfig {
        window_width: world_config.viewport_width,
        window_height: world_config.viewport_height,
        ..LoopConfig::default()
    };

    let maps = TmxMapSource::new(paths.maps_dir.clone());

    Ok(AppWiring {
        config,
        scene: Box::new(OverworldScene::new(settings, world_config, Box::new(maps))),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
