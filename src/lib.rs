pub mod core;
pub mod data;
pub mod format;
pub mod save;

pub use core::{
    Cost, CountOverride, DisplayStyle, EconomySettings, ExecutionRecord, ExtraMap, Hook, HookDef,
    HookError, HookResult, PurchaseAmount, PurchaseCost, PurchaseOptions, PurchaseRange,
    PurchaseStyle, Registry, Resource, ResourceCount, ResourceDef, ResourceId, ResourceRef,
    Simulation, SimulationParams, TickDeltas, combine, now_millis,
};
pub use data::{
    DefinitionsFile, Formula, FormulaCompiler, FormulaValue, load_definitions,
    load_definitions_from_path,
};
pub use format::{FormatOptions, Formatter, PlainFormatter};
pub use save::{
    FileStorage, MemoryStorage, SaveData, Storage, apply_save_data, decode_payload,
    export_to_base64, import_from_base64, load_from_json_string, merge_state, persist, restore,
    save_data_from_simulation, save_to_json_string,
};
