use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{EconomySettings, ExecutionRecord, ResourceDef, SimulationParams};

pub const SAVE_VERSION: u32 = 1;

/// Persisted form of a whole simulation. Parameters and settings are stored
/// flat at the top level, next to the bookkeeping stamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveData {
    pub version: u32,
    #[serde(flatten)]
    pub params: SimulationParams,
    #[serde(flatten)]
    pub settings: EconomySettings,
    pub last_reset: u64,
    pub last_saved: u64,
    pub last_loaded: u64,
    pub last_render: u64,
    pub last_tick: Option<u64>,
    pub execution: BTreeMap<String, ExecutionRecord>,
    pub resources: Vec<ResourceDef>,
}

impl Default for SaveData {
    fn default() -> Self {
        Self {
            version: SAVE_VERSION,
            params: SimulationParams::default(),
            settings: EconomySettings::default(),
            last_reset: 0,
            last_saved: 0,
            last_loaded: 0,
            last_render: 0,
            last_tick: None,
            execution: BTreeMap::new(),
            resources: Vec::new(),
        }
    }
}
