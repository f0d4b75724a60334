mod definition;
mod hook;
pub mod num;
mod purchase;
mod registry;
mod resource;
mod simulation;
mod tick;
mod transaction;

pub use definition::{HookDef, ResourceDef};
pub use hook::{
    FactorFn, Hook, HookError, HookResult, OnChangeFn, OnPurchaseFn, OnTickFn, PurchaseCostFn,
    ResourceHooks, ShouldTickFn, UnlockCostFn, ValidateCountFn,
};
pub use purchase::{MAX_PURCHASE_STEPS, MAX_RANGE_AMOUNT, PurchaseOptions};
pub use registry::{EconomySettings, Registry, ResourceId};
pub use resource::{CountOverride, DisplayStyle, ExtraMap, Resource};
pub use simulation::{
    ExecutionRecord, Simulation, SimulationParams, StateTickFn, TIMER_SOURCE, TickCompleteFn,
    now_millis,
};
pub use tick::TickDeltas;
pub use transaction::{
    Cost, PurchaseAmount, PurchaseCost, PurchaseRange, PurchaseStyle, ResourceCount, ResourceRef,
    combine,
};
