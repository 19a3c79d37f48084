use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use thiserror::Error;
use tilegrid_engine::app::{KeyBindingError, KeyBindings};
use tilegrid_engine::{
    resolve_app_paths, Config, ConfigError, ContentError, ContentLoader, Engine, LoopConfig,
    StartupError, Viewport,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::demo::{self, DemoConfig};

const SCENARIO_ENV_VAR: &str = "TILEGRID_SCENARIO";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_SCENARIO: &str = "scenarios/meadow.json";

type KeyTable = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    KeyBindings(#[from] KeyBindingError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) engine: Engine,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== tilegrid startup ===");

    let paths = resolve_app_paths()?;
    wire(&paths.assets_dir, scenario_from_env())
}

/// Loads the config and scenario under `assets_dir` and installs the demo
/// controls on a fresh engine.
fn wire(assets_dir: &Path, scenario_override: Option<String>) -> Result<AppWiring, BootstrapError> {
    let config = Config::load(&assets_dir.join(CONFIG_FILE))?;
    let loop_config = LoopConfig::from_config(&config)?;

    let scenario = match scenario_override {
        Some(path) => path,
        None => config.get_or("scenario", DEFAULT_SCENARIO.to_string())?,
    };
    let mut loader = ContentLoader::new(assets_dir);
    let loaded = loader.load_scenario(&scenario)?;

    let viewport = Viewport::new(loop_config.window_width, loop_config.window_height);
    let (state, atlases) = loaded.into_state(viewport);
    let mut engine = Engine::new(state, atlases);

    let keys: KeyTable = config.get_or("keys", KeyTable::new())?;
    let bindings = KeyBindings::from_table(&keys)?;
    let demo_config = DemoConfig::from_config(&config)?;
    demo::install(&mut engine, bindings, &demo_config);

    Ok(AppWiring {
        config: loop_config,
        engine,
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

fn scenario_from_env() -> Option<String> {
    env::var(SCENARIO_ENV_VAR)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
