use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::debug;

use crate::core::{EconomySettings, Registry, ResourceDef, Simulation};

use super::{SAVE_VERSION, SaveData};

const RESOURCES_KEY: &str = "resources";

pub fn save_data_from_simulation(sim: &Simulation) -> SaveData {
    SaveData {
        version: SAVE_VERSION,
        params: sim.params.clone(),
        settings: sim.registry.settings.clone(),
        last_reset: sim.last_reset,
        last_saved: sim.last_saved,
        last_loaded: sim.last_loaded,
        last_render: sim.last_render,
        last_tick: sim.last_tick,
        execution: sim.execution.clone(),
        resources: sim.registry.save_all(),
    }
}

pub fn apply_save_data(sim: &mut Simulation, save: SaveData) {
    sim.params = save.params;
    sim.registry.settings = save.settings;
    sim.last_reset = save.last_reset;
    sim.last_saved = save.last_saved;
    sim.last_loaded = save.last_loaded;
    sim.last_render = save.last_render;
    sim.last_tick = save.last_tick;
    sim.execution = save.execution;
    sim.registry.load_all(save.resources);
}

/// Merges a partial state object into `sim`.
///
/// Object-valued fields merge shallowly, other fields overwrite, `null`
/// fields are skipped and `resources` is upserted entry by entry. Nothing is
/// applied unless the whole patch parses.
pub fn merge_state(sim: &mut Simulation, patch: &Value) -> Result<()> {
    let patch = match patch {
        Value::Null => return Ok(()),
        Value::Object(patch) => patch,
        other => bail!("state patch must be a JSON object, found {other}"),
    };

    let mut current = save_data_from_simulation(sim);
    current.resources.clear();
    let mut snapshot = serde_json::to_value(&current).context("failed to snapshot state")?;
    let fields = snapshot
        .as_object_mut()
        .context("state snapshot is not a JSON object")?;

    let mut resources = Vec::new();
    for (key, value) in patch {
        if value.is_null() {
            continue;
        }
        if key == RESOURCES_KEY {
            resources = parse_resources(value)?;
            continue;
        }
        match (fields.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                existing.extend(incoming.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            _ => {
                fields.insert(key.clone(), value.clone());
            }
        }
    }

    let mut merged: SaveData =
        serde_json::from_value(snapshot).context("failed to apply state patch")?;
    merged.resources = resources;
    debug!(resources = merged.resources.len(), "merged state patch");
    apply_save_data(sim, merged);
    Ok(())
}

fn parse_resources(value: &Value) -> Result<Vec<ResourceDef>> {
    match value {
        Value::Array(_) => {
            serde_json::from_value(value.clone()).context("failed to parse resource list")
        }
        Value::Object(entries) => entries
            .iter()
            .map(|(name, entry)| {
                let mut def: ResourceDef = serde_json::from_value(entry.clone())
                    .with_context(|| format!("failed to parse resource `{name}`"))?;
                if def.name.is_empty() {
                    def.name = name.clone();
                }
                Ok(def)
            })
            .collect(),
        other => bail!("resources must be a list or a map, found {other}"),
    }
}

impl Simulation {
    pub fn save(&mut self, now: u64) -> SaveData {
        self.last_saved = now;
        save_data_from_simulation(self)
    }

    pub fn load(&mut self, patch: &Value, now: u64) -> Result<()> {
        merge_state(self, patch)?;
        self.last_loaded = now;
        Ok(())
    }

    pub fn load_str(&mut self, json: &str, now: u64) -> Result<()> {
        let patch: Value = serde_json::from_str(json).context("failed to parse state JSON")?;
        self.load(&patch, now)
    }

    /// Replaces this simulation with a fresh one seeded from `seed`.
    ///
    /// The formula compiler and the registered callbacks carry over.
    pub fn reset(&mut self, seed: Option<&Value>, now: u64) -> Result<()> {
        let mut registry = Registry::new(EconomySettings::default());
        registry.set_compiler(self.registry.compiler());
        let mut fresh = Simulation::starting_at(registry, now);
        fresh.load(seed.unwrap_or(&Value::Null), now)?;
        fresh.take_callbacks(self);
        *self = fresh;
        Ok(())
    }
}
