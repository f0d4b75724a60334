use bevy::prelude::*;
use futures::executor::block_on;
use idle_economy::{
    FileStorage, Registry, Simulation, load_definitions, load_definitions_from_path, now_millis,
    restore,
};

use super::economy;
use super::resources::{RuntimeConfig, SessionState};
use super::{AppPhase, ClockState};

pub fn bootstrap_session(
    mut commands: Commands,
    config: Res<RuntimeConfig>,
    mut next_phase: ResMut<NextState<AppPhase>>,
    mut next_clock: ResMut<NextState<ClockState>>,
) {
    let mut registry = Registry::default();
    let definitions = match &config.definitions {
        Some(path) => load_definitions_from_path(path),
        None => load_definitions(),
    };
    match definitions {
        Ok(definitions) => definitions.install(&mut registry),
        Err(error) => warn!("starting without resource definitions: {error:#}"),
    }
    economy::install_hooks(&mut registry);

    let mut simulation = Simulation::new(registry);
    if config.auto_buy {
        simulation.set_state_tick(Some(Box::new(economy::auto_buy)));
    }

    let storage = FileStorage::new(&config.save_dir);
    match block_on(restore(&mut simulation, &storage, now_millis())) {
        Ok(true) => info!("restored save from {}", storage.dir().display()),
        Ok(false) => info!("no save found in {}, starting fresh", storage.dir().display()),
        Err(error) => warn!("ignoring unreadable save: {error:#}"),
    }

    let paused = config.start_paused || simulation.params.simulation_paused;
    let mut session = SessionState::new(simulation, storage, config.status_interval_secs);
    if !paused {
        session.add_tick_timer();
    }
    next_clock.set(if paused {
        ClockState::Paused
    } else {
        ClockState::Ticking
    });

    commands.insert_resource(session);
    next_phase.set(AppPhase::Simulating);
}
