use bevy::app::AppExit;
use bevy::prelude::*;
use futures::executor::block_on;
use idle_economy::core::TIMER_SOURCE;
use idle_economy::{
    FileStorage, FormatOptions, Formatter, PlainFormatter, Simulation, now_millis, persist,
};

use super::resources::{RuntimeConfig, SessionState};

pub fn tick_simulation(time: Res<Time>, mut session: ResMut<SessionState>) {
    let session = &mut *session;
    let Some(timer) = session.tick_timer.as_mut() else {
        return;
    };
    // The clock measures elapsed wall time itself, so one call covers every
    // period that finished this frame.
    if timer.tick(time.delta()).times_finished_this_tick() == 0 {
        return;
    }

    let now = now_millis();
    let storage = &session.storage;
    let status = &mut session.status;
    let mut on_save = |simulation: &mut Simulation| autosave(simulation, storage, now);
    let mut on_render = |simulation: &Simulation| *status = status_line(simulation);
    session
        .simulation
        .tick(now, TIMER_SOURCE, Some(&mut on_save), Some(&mut on_render));
}

pub fn report_status(time: Res<Time>, mut session: ResMut<SessionState>) {
    if session.status_timer.tick(time.delta()).just_finished() && !session.status.is_empty() {
        info!("{}", session.status);
    }
}

pub fn exit_after_run_time(
    time: Res<Time>,
    config: Res<RuntimeConfig>,
    mut session: ResMut<SessionState>,
    mut exit: EventWriter<AppExit>,
) {
    let Some(run_secs) = config.run_secs else {
        return;
    };
    if session.exiting || time.elapsed_secs_f64() < run_secs {
        return;
    }

    let session = &mut *session;
    session.exiting = true;
    session.remove_tick_timer();
    autosave(&mut session.simulation, &session.storage, now_millis());
    info!("{}", status_line(&session.simulation));
    exit.send(AppExit::Success);
}

pub fn mark_clock_ticking(session: Option<ResMut<SessionState>>) {
    if let Some(mut session) = session {
        session.simulation.params.simulation_paused = false;
        session.add_tick_timer();
    }
}

pub fn mark_clock_paused(session: Option<ResMut<SessionState>>) {
    if let Some(mut session) = session {
        session.simulation.params.simulation_paused = true;
        session.remove_tick_timer();
    }
}

fn autosave(simulation: &mut Simulation, storage: &FileStorage, now: u64) {
    if let Err(error) = block_on(persist(simulation, storage, now)) {
        warn!("autosave failed: {error:#}");
    }
}

fn status_line(simulation: &Simulation) -> String {
    let formatter = PlainFormatter::new(FormatOptions::from_map(
        &simulation.registry.settings.format_options,
    ));
    let mut visible: Vec<_> = simulation
        .registry
        .iter()
        .map(|(_, resource)| resource)
        .filter(|resource| resource.is_active() && !resource.hidden)
        .collect();
    visible.sort_by(|a, b| a.priority.total_cmp(&b.priority));

    visible
        .into_iter()
        .map(|resource| {
            format!(
                "{} {} ({})",
                formatter.format_name(resource, resource.count()),
                formatter.format_count(resource, resource.count()),
                formatter.format_rate(resource),
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
