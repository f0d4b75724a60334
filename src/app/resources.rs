use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use bevy::prelude::*;
use idle_economy::{FileStorage, Simulation};

pub const SAVE_DIR_VAR: &str = "IDLE_SAVE_DIR";
pub const DEFINITIONS_VAR: &str = "IDLE_DEFINITIONS";
pub const RUN_SECS_VAR: &str = "IDLE_RUN_SECS";

#[derive(Resource, Debug, Clone)]
pub struct RuntimeConfig {
    pub save_dir: PathBuf,
    /// Falls back to the bundled definitions when unset.
    pub definitions: Option<PathBuf>,
    /// Exit (after a final save) once this much app time has passed.
    pub run_secs: Option<f64>,
    pub status_interval_secs: f32,
    pub auto_buy: bool,
    pub start_paused: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("saves"),
            definitions: None,
            run_secs: None,
            status_interval_secs: 5.0,
            auto_buy: true,
            start_paused: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = env::var(SAVE_DIR_VAR) {
            config.save_dir = PathBuf::from(dir);
        }
        if let Ok(path) = env::var(DEFINITIONS_VAR) {
            config.definitions = Some(PathBuf::from(path));
        }
        config.run_secs = parse_var(RUN_SECS_VAR);
        config
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {name}={raw:?}: not a valid value");
            None
        }
    }
}

#[derive(Resource, Debug)]
pub struct SessionState {
    pub simulation: Simulation,
    pub storage: FileStorage,
    pub tick_timer: Option<Timer>,
    pub status_timer: Timer,
    pub status: String,
    pub exiting: bool,
}

impl SessionState {
    pub fn new(simulation: Simulation, storage: FileStorage, status_interval_secs: f32) -> Self {
        Self {
            simulation,
            storage,
            tick_timer: None,
            status_timer: Timer::from_seconds(status_interval_secs.max(0.1), TimerMode::Repeating),
            status: String::new(),
            exiting: false,
        }
    }

    /// Arms the repeating tick timer, tearing down any existing one first.
    pub fn add_tick_timer(&mut self) {
        self.remove_tick_timer();
        let period = (1.0 / self.simulation.params.ticks_per_sec).max(0.001) as f32;
        self.tick_timer = Some(Timer::from_seconds(period, TimerMode::Repeating));
    }

    pub fn remove_tick_timer(&mut self) {
        self.tick_timer = None;
    }
}
