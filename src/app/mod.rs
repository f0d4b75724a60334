mod economy;
mod resources;
mod setup;
mod simulation;

use bevy::prelude::*;

use resources::RuntimeConfig;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, States, Default)]
pub enum AppPhase {
    #[default]
    Boot,
    Simulating,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, States, Default)]
pub enum ClockState {
    #[default]
    Ticking,
    Paused,
}

pub struct IdleEconomyPlugin;

impl Plugin for IdleEconomyPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<RuntimeConfig>() {
            app.insert_resource(RuntimeConfig::from_env());
        }
        app.init_state::<AppPhase>()
            .init_state::<ClockState>()
            .add_systems(OnEnter(AppPhase::Boot), setup::bootstrap_session)
            .add_systems(OnEnter(ClockState::Ticking), simulation::mark_clock_ticking)
            .add_systems(OnEnter(ClockState::Paused), simulation::mark_clock_paused)
            .add_systems(
                Update,
                (
                    simulation::tick_simulation.run_if(in_state(ClockState::Ticking)),
                    simulation::report_status,
                    simulation::exit_after_run_time,
                )
                    .chain()
                    .run_if(in_state(AppPhase::Simulating)),
            );
    }
}
