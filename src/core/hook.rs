use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;

use super::registry::{Registry, ResourceId};
use super::transaction::{Cost, PurchaseCost};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HookError {
    #[error("formula `{body}` failed to compile: {message}")]
    Compile { body: String, message: String },
    #[error("hook evaluation failed: {0}")]
    Eval(String),
    #[error("hook returned {found}, expected {expected}")]
    Type {
        expected: &'static str,
        found: &'static str,
    },
}

pub type HookResult<T> = Result<T, HookError>;

pub type ValidateCountFn = dyn Fn(&Registry, ResourceId, Decimal) -> HookResult<Decimal> + Send + Sync;
pub type PurchaseCostFn = dyn Fn(&Registry, ResourceId, Decimal) -> HookResult<Vec<Cost>> + Send + Sync;
pub type UnlockCostFn = dyn Fn(&Registry, ResourceId) -> HookResult<Vec<Cost>> + Send + Sync;
pub type FactorFn = dyn Fn(&Registry, ResourceId, Decimal) -> HookResult<Decimal> + Send + Sync;
pub type ShouldTickFn = dyn Fn(&Registry, ResourceId, f64, &str) -> HookResult<bool> + Send + Sync;
pub type OnTickFn = dyn Fn(&mut Registry, ResourceId, f64, &str) -> HookResult<()> + Send + Sync;
pub type OnChangeFn =
    dyn Fn(&mut Registry, ResourceId, Decimal, &str) -> HookResult<()> + Send + Sync;
pub type OnPurchaseFn =
    dyn Fn(&mut Registry, ResourceId, &PurchaseCost) -> HookResult<()> + Send + Sync;

pub struct Hook<F: ?Sized> {
    func: Arc<F>,
    source: Option<String>,
}

impl<F: ?Sized> Hook<F> {
    pub fn func(&self) -> &F {
        &self.func
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub(crate) fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl<F: ?Sized> Clone for Hook<F> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
            source: self.source.clone(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Hook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Hook({source:?})"),
            None => f.write_str("Hook(<native>)"),
        }
    }
}

macro_rules! hook_constructor {
    ($alias:ident, ($($arg:ty),*) -> $ret:ty) => {
        impl Hook<$alias> {
            pub fn new<G>(func: G) -> Self
            where
                G: Fn($($arg),*) -> HookResult<$ret> + Send + Sync + 'static,
            {
                Self {
                    func: Arc::new(func),
                    source: None,
                }
            }
        }
    };
}

hook_constructor!(ValidateCountFn, (&Registry, ResourceId, Decimal) -> Decimal);
hook_constructor!(PurchaseCostFn, (&Registry, ResourceId, Decimal) -> Vec<Cost>);
hook_constructor!(UnlockCostFn, (&Registry, ResourceId) -> Vec<Cost>);
// `FactorFn` has the same signature as `ValidateCountFn` and shares its constructor.
hook_constructor!(ShouldTickFn, (&Registry, ResourceId, f64, &str) -> bool);
hook_constructor!(OnTickFn, (&mut Registry, ResourceId, f64, &str) -> ());
hook_constructor!(OnChangeFn, (&mut Registry, ResourceId, Decimal, &str) -> ());
hook_constructor!(OnPurchaseFn, (&mut Registry, ResourceId, &PurchaseCost) -> ());

#[derive(Debug, Clone, Default)]
pub struct ResourceHooks {
    pub validate_count: Option<Hook<ValidateCountFn>>,
    pub purchase_cost: Option<Hook<PurchaseCostFn>>,
    pub unlock_cost: Option<Hook<UnlockCostFn>>,
    pub gain_factor: Option<Hook<FactorFn>>,
    pub cost_factor: Option<Hook<FactorFn>>,
    pub should_tick: Option<Hook<ShouldTickFn>>,
    pub on_tick: Option<Hook<OnTickFn>>,
    pub on_change: Option<Hook<OnChangeFn>>,
    pub on_purchase: Option<Hook<OnPurchaseFn>>,
}
