use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::registry::Registry;
use super::tick::TickDeltas;

/// Source tag of the periodic timer. Only ticks from this source run the
/// state-level per-tick callback.
pub const TIMER_SOURCE: &str = "tick";

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub ticks_per_sec: f64,
    pub renders_per_sec: f64,
    pub save_frequency_secs: f64,
    pub min_update_secs: f64,
    pub max_update_secs: f64,
    pub max_tick_secs: f64,
    pub time_dilation: f64,
    pub simulation_paused: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            ticks_per_sec: 100.0,
            renders_per_sec: 30.0,
            save_frequency_secs: 60.0,
            min_update_secs: 0.01,
            max_update_secs: 24.0 * 60.0 * 60.0,
            max_tick_secs: 1.0,
            time_dilation: 1.0,
            simulation_paused: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionRecord {
    pub last_tick: u64,
    pub last_delta: f64,
    pub last_result: TickDeltas,
    pub tps: f64,
    pub fps: f64,
}

pub type StateTickFn = dyn FnMut(&mut Registry, f64) + Send + Sync;
pub type TickCompleteFn = dyn FnMut(f64, &str) + Send + Sync;

pub struct Simulation {
    pub registry: Registry,
    pub params: SimulationParams,
    pub last_reset: u64,
    pub last_saved: u64,
    pub last_loaded: u64,
    pub last_render: u64,
    pub last_tick: Option<u64>,
    pub execution: BTreeMap<String, ExecutionRecord>,
    on_tick_complete: Option<Box<TickCompleteFn>>,
    state_tick: Option<Box<StateTickFn>>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(Registry::default())
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("registry", &self.registry)
            .field("params", &self.params)
            .field("last_reset", &self.last_reset)
            .field("last_saved", &self.last_saved)
            .field("last_loaded", &self.last_loaded)
            .field("last_render", &self.last_render)
            .field("last_tick", &self.last_tick)
            .field("execution", &self.execution)
            .finish_non_exhaustive()
    }
}

// The upper bound wins when the bounds cross.
fn clamp_secs(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

impl Simulation {
    pub fn new(registry: Registry) -> Self {
        Self::starting_at(registry, now_millis())
    }

    pub fn starting_at(registry: Registry, now: u64) -> Self {
        Self {
            registry,
            params: SimulationParams::default(),
            last_reset: now,
            last_saved: 0,
            last_loaded: now,
            last_render: 0,
            last_tick: None,
            execution: BTreeMap::new(),
            on_tick_complete: None,
            state_tick: None,
        }
    }

    pub fn set_on_tick_complete(&mut self, callback: Option<Box<TickCompleteFn>>) {
        self.on_tick_complete = callback;
    }

    pub fn set_state_tick(&mut self, callback: Option<Box<StateTickFn>>) {
        self.state_tick = callback;
    }

    pub(crate) fn take_callbacks(&mut self, other: &mut Simulation) {
        self.on_tick_complete = other.on_tick_complete.take();
        self.state_tick = other.state_tick.take();
    }

    /// Advances the simulation to `now` (milliseconds).
    ///
    /// Elapsed time is clamped to `[0, max_update_secs]` and consumed in
    /// sub-ticks of at most `max_tick_secs`. Calls closer together than
    /// `min_update_secs` are ignored, except for the very first one. Returns
    /// the accumulated count changes for `source`.
    pub fn tick(
        &mut self,
        now: u64,
        source: &str,
        on_save: Option<&mut dyn FnMut(&mut Simulation)>,
        on_render: Option<&mut dyn FnMut(&Simulation)>,
    ) -> TickDeltas {
        let previous = self.last_tick.unwrap_or(now);
        let elapsed_ms = now.saturating_sub(previous) as f64;
        let mut dt = clamp_secs(elapsed_ms / 1000.0, 0.0, self.params.max_update_secs);
        if dt < self.params.min_update_secs && self.last_tick.is_some() {
            return TickDeltas::default();
        }

        let delta = dt;
        let scale = match self.params.time_dilation {
            dilation if dilation > 0.0 && dilation.is_finite() => 1.0 / dilation,
            _ => 1.0,
        };
        let mut results = TickDeltas::default();
        while dt > 0.0 {
            let step = match clamp_secs(dt, self.params.min_update_secs, self.params.max_tick_secs) {
                step if step > 0.0 => step,
                _ => dt,
            };
            dt -= step;
            let scaled = if self.params.simulation_paused {
                0.0
            } else {
                step * scale
            };
            trace!(source, step = scaled, "sub-tick");
            results = self.registry.tick_all(scaled, source, results);

            if source == TIMER_SOURCE
                && let Some(callback) = self.state_tick.as_mut()
            {
                callback(&mut self.registry, scaled);
            }
        }

        self.last_tick = Some(now);
        let ema = match self.registry.settings.rate_update_ema_factor {
            factor if factor > 0.0 => factor,
            _ => 0.25,
        };
        let record = self.execution.entry(source.to_string()).or_default();
        record.last_tick = now;
        record.last_delta = delta;
        record.last_result = results;
        if delta > 0.0 {
            record.tps = record.tps * (1.0 - ema) + (1.0 / delta) * ema;
        }

        if let Some(callback) = self.on_tick_complete.as_mut() {
            callback(delta, source);
        }

        let save_after = (self.params.save_frequency_secs * 1000.0) as u64;
        if let Some(on_save) = on_save
            && now.saturating_sub(self.last_saved) >= save_after
            && now.saturating_sub(self.last_loaded) >= save_after
        {
            self.last_saved = now;
            on_save(self);
        }

        if let Some(on_render) = on_render {
            let since_render = now.saturating_sub(self.last_render);
            if since_render as f64 >= 1000.0 / self.params.renders_per_sec {
                if let Some(record) = self.execution.get_mut(source) {
                    record.fps = record.fps * (1.0 - ema) + (1000.0 / since_render as f64) * ema;
                }
                self.last_render = now;
                on_render(self);
            }
        }

        self.execution
            .get(source)
            .map(|record| record.last_result.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::{Simulation, TIMER_SOURCE};
    use crate::core::hook::{Hook, OnTickFn};
    use crate::core::num::decimal_from_f64;
    use crate::core::{HookError, Registry};

    const EPSILON: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPSILON,
            "expected {expected}, got {actual}"
        );
    }

    /// A simulation with one linear accumulator that records every `dt` it sees.
    fn recording_simulation() -> (Simulation, Arc<Mutex<Vec<f64>>>) {
        let steps = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&steps);
        let mut registry = Registry::default();
        let ore = registry.get_or_create("ore");
        registry.get_mut(ore).hooks.on_tick =
            Some(Hook::<OnTickFn>::new(move |registry, id, dt, _| {
                seen.lock().map_err(|_| HookError::Eval("poisoned".into()))?.push(dt);
                let dt = decimal_from_f64(dt).ok_or_else(|| HookError::Eval("bad dt".into()))?;
                let next = registry.get(id).count() + dt;
                registry.set_value(id, next, "tick");
                Ok(())
            }));
        (Simulation::starting_at(registry, 0), steps)
    }

    fn ore(simulation: &Simulation) -> Decimal {
        simulation
            .registry
            .by_name("ore")
            .map(|resource| resource.count())
            .unwrap_or_default()
    }

    fn recorded(steps: &Arc<Mutex<Vec<f64>>>) -> Vec<f64> {
        steps.lock().map(|steps| steps.clone()).unwrap_or_default()
    }

    #[test]
    fn first_tick_only_anchors_the_clock() {
        let (mut simulation, steps) = recording_simulation();
        let result = simulation.tick(1_000, TIMER_SOURCE, None, None);

        assert!(result.is_empty());
        assert!(recorded(&steps).is_empty());
        assert_eq!(simulation.last_tick, Some(1_000));
        assert_eq!(simulation.execution[TIMER_SOURCE].last_tick, 1_000);
    }

    #[test]
    fn long_gaps_are_split_into_bounded_sub_ticks() {
        let (mut simulation, steps) = recording_simulation();
        simulation.tick(1_000, TIMER_SOURCE, None, None);
        let result = simulation.tick(3_500, TIMER_SOURCE, None, None);

        let steps = recorded(&steps);
        assert_eq!(steps.len(), 3);
        assert_close(steps[0], 1.0);
        assert_close(steps[1], 1.0);
        assert_close(steps[2], 0.5);
        assert_eq!(ore(&simulation), dec!(2.5));
        assert_eq!(result.get("ore"), Some(dec!(2.5)));
        assert_close(simulation.execution[TIMER_SOURCE].last_delta, 2.5);
    }

    #[test]
    fn ticks_closer_than_the_minimum_are_ignored() {
        let (mut simulation, steps) = recording_simulation();
        simulation.tick(1_000, TIMER_SOURCE, None, None);
        let result = simulation.tick(1_005, TIMER_SOURCE, None, None);

        assert!(result.is_empty());
        assert!(recorded(&steps).is_empty());
        assert_eq!(simulation.last_tick, Some(1_000));

        let result = simulation.tick(900, TIMER_SOURCE, None, None);
        assert!(result.is_empty());
        assert_eq!(simulation.last_tick, Some(1_000));
    }

    #[test]
    fn backlog_beyond_the_update_cap_is_discarded() {
        let (mut simulation, steps) = recording_simulation();
        simulation.params.max_update_secs = 3.0;
        simulation.tick(0, TIMER_SOURCE, None, None);
        simulation.tick(60_000, TIMER_SOURCE, None, None);

        assert_eq!(recorded(&steps).len(), 3);
        assert_eq!(ore(&simulation), dec!(3));
    }

    #[test]
    fn paused_and_dilated_time() {
        let (mut simulation, steps) = recording_simulation();
        simulation.tick(0, TIMER_SOURCE, None, None);

        simulation.params.simulation_paused = true;
        simulation.tick(1_000, TIMER_SOURCE, None, None);
        assert_eq!(recorded(&steps), vec![0.0]);
        assert_eq!(ore(&simulation), Decimal::ZERO);

        simulation.params.simulation_paused = false;
        simulation.params.time_dilation = 2.0;
        simulation.tick(2_000, TIMER_SOURCE, None, None);
        assert_close(recorded(&steps)[1], 0.5);
    }

    #[test]
    fn crossed_step_bounds_favour_the_tick_cap() {
        let (mut simulation, steps) = recording_simulation();
        simulation.params.min_update_secs = 2.0;
        simulation.params.max_tick_secs = 1.0;
        simulation.tick(0, TIMER_SOURCE, None, None);
        simulation.tick(5_000, TIMER_SOURCE, None, None);

        assert_eq!(recorded(&steps), vec![1.0; 5]);
        assert_eq!(ore(&simulation), dec!(5));
    }

    #[test]
    fn degenerate_params_do_not_stall_or_panic() {
        let (mut simulation, steps) = recording_simulation();
        simulation.params.min_update_secs = 0.0;
        simulation.params.max_tick_secs = 0.0;
        simulation.params.time_dilation = 0.0;
        simulation.tick(0, TIMER_SOURCE, None, None);
        simulation.tick(1_500, TIMER_SOURCE, None, None);
        assert_eq!(recorded(&steps), vec![1.5]);

        simulation.params.max_update_secs = -1.0;
        let result = simulation.tick(3_000, TIMER_SOURCE, None, None);
        assert!(result.is_empty());
        assert_eq!(simulation.last_tick, Some(1_500));
    }

    #[test]
    fn state_tick_runs_only_for_the_timer_source() {
        let (mut simulation, _) = recording_simulation();
        let calls = Arc::new(Mutex::new(0_usize));
        let counter = Arc::clone(&calls);
        simulation.set_state_tick(Some(Box::new(move |_, _| {
            if let Ok(mut calls) = counter.lock() {
                *calls += 1;
            }
        })));

        simulation.tick(0, "save", None, None);
        simulation.tick(2_000, "save", None, None);
        simulation.tick(4_000, TIMER_SOURCE, None, None);

        assert_eq!(calls.lock().map(|calls| *calls).unwrap_or_default(), 2);
        assert!(simulation.execution.contains_key("save"));
    }

    #[test]
    fn save_waits_for_the_save_frequency_after_load_and_save() {
        let (mut simulation, _) = recording_simulation();
        simulation.params.save_frequency_secs = 10.0;
        let mut saves = Vec::new();
        let mut on_save = |simulation: &mut Simulation| saves.push(simulation.last_tick);

        simulation.tick(0, TIMER_SOURCE, Some(&mut on_save), None);
        simulation.tick(5_000, TIMER_SOURCE, Some(&mut on_save), None);
        simulation.tick(10_000, TIMER_SOURCE, Some(&mut on_save), None);
        simulation.tick(15_000, TIMER_SOURCE, Some(&mut on_save), None);
        simulation.tick(20_000, TIMER_SOURCE, Some(&mut on_save), None);

        assert_eq!(saves, vec![Some(10_000), Some(20_000)]);
    }

    #[test]
    fn render_is_throttled_and_tracks_fps() {
        let (mut simulation, _) = recording_simulation();
        simulation.params.renders_per_sec = 10.0;
        let mut renders = 0;
        let mut on_render = |_: &Simulation| renders += 1;

        simulation.tick(1_000, TIMER_SOURCE, None, Some(&mut on_render));
        simulation.tick(1_050, TIMER_SOURCE, None, Some(&mut on_render));
        simulation.tick(1_100, TIMER_SOURCE, None, Some(&mut on_render));

        assert_eq!(renders, 2);
        assert_eq!(simulation.last_render, 1_100);
        assert!(simulation.execution[TIMER_SOURCE].fps > 0.0);
    }

    #[test]
    fn tps_is_smoothed_over_ticks() {
        let (mut simulation, _) = recording_simulation();
        simulation.tick(0, TIMER_SOURCE, None, None);
        simulation.tick(100, TIMER_SOURCE, None, None);
        assert_close(simulation.execution[TIMER_SOURCE].tps, 10.0 * 0.25);

        simulation.tick(200, TIMER_SOURCE, None, None);
        assert_close(simulation.execution[TIMER_SOURCE].tps, 2.5 * 0.75 + 2.5);
    }
}
