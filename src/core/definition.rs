use std::fmt;
use std::marker::PhantomData;

use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::data::{FormulaCompiler, FormulaValue, compile_or_fail};

use super::hook::{
    FactorFn, Hook, OnChangeFn, OnPurchaseFn, OnTickFn, PurchaseCostFn, ShouldTickFn,
    UnlockCostFn, ValidateCountFn,
};
use super::registry::{Registry, ResourceId};
use super::resource::{DisplayStyle, ExtraMap, Resource};

type Compiler<'a> = Option<&'a (dyn FormulaCompiler + Send + Sync)>;

pub enum HookDef<F: ?Sized> {
    Native(Hook<F>),
    Text(String),
}

impl<F: ?Sized> HookDef<F> {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text(body.into())
    }
}

impl<F: ?Sized> From<Hook<F>> for HookDef<F> {
    fn from(hook: Hook<F>) -> Self {
        Self::Native(hook)
    }
}

impl<F: ?Sized> Clone for HookDef<F> {
    fn clone(&self) -> Self {
        match self {
            Self::Native(hook) => Self::Native(hook.clone()),
            Self::Text(body) => Self::Text(body.clone()),
        }
    }
}

impl<F: ?Sized> fmt::Debug for HookDef<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(hook) => fmt::Debug::fmt(hook, f),
            Self::Text(body) => f.debug_tuple("Text").field(body).finish(),
        }
    }
}

impl<F: ?Sized> Serialize for HookDef<F> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(body) => serializer.serialize_str(body),
            Self::Native(hook) => match hook.source() {
                Some(body) => serializer.serialize_str(body),
                None => serializer.serialize_none(),
            },
        }
    }
}

impl<'de, F: ?Sized> Deserialize<'de> for HookDef<F> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TextVisitor<F: ?Sized>(PhantomData<fn() -> Box<F>>);

        impl<F: ?Sized> Visitor<'_> for TextVisitor<F> {
            type Value = HookDef<F>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("formula text")
            }

            fn visit_str<E: de::Error>(self, body: &str) -> Result<Self::Value, E> {
                Ok(HookDef::Text(body.to_string()))
            }
        }

        deserializer.deserialize_str(TextVisitor(PhantomData))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub singular_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plural_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_unlock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_award: Option<bool>,

    #[serde(skip_serializing_if = "ExtraMap::is_empty")]
    pub extra: ExtraMap,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_count: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_count: Option<HookDef<ValidateCountFn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_cost: Option<HookDef<PurchaseCostFn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_cost: Option<HookDef<UnlockCostFn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_factor: Option<HookDef<FactorFn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_factor: Option<HookDef<FactorFn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_tick: Option<HookDef<ShouldTickFn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_tick: Option<HookDef<OnTickFn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_change: Option<HookDef<OnChangeFn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_purchase: Option<HookDef<OnPurchaseFn>>,
}

impl ResourceDef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_resource(resource: &Resource) -> Self {
        fn saved<F: ?Sized>(hook: &Option<Hook<F>>) -> Option<HookDef<F>> {
            hook.as_ref()
                .and_then(|hook| hook.source())
                .map(|body| HookDef::Text(body.to_string()))
        }

        let hooks = &resource.hooks;
        Self {
            name: resource.name().to_string(),
            description: resource.description.clone(),
            display: Some(resource.display),
            icon: resource.icon.clone(),
            singular_name: resource.singular_name.clone(),
            plural_name: resource.plural_name.clone(),
            priority: resource.priority.is_finite().then_some(resource.priority),
            locked: Some(resource.locked),
            disabled: Some(resource.disabled),
            hidden: Some(resource.hidden),
            auto_unlock: Some(resource.auto_unlock),
            auto_award: Some(resource.auto_award),
            extra: resource.extra.clone(),
            count: Some(resource.count()),
            max_count: resource.max_count,
            min_count: resource.min_count,
            rate: Some(resource.rate()),
            last_tick: Some(resource.last_tick()),
            validate_count: saved(&hooks.validate_count),
            purchase_cost: saved(&hooks.purchase_cost),
            unlock_cost: saved(&hooks.unlock_cost),
            gain_factor: saved(&hooks.gain_factor),
            cost_factor: saved(&hooks.cost_factor),
            should_tick: saved(&hooks.should_tick),
            on_tick: saved(&hooks.on_tick),
            on_change: saved(&hooks.on_change),
            on_purchase: saved(&hooks.on_purchase),
        }
    }
}

impl Registry {
    /// Creates or updates the resource named by `def.name`.
    ///
    /// `extra` merges key-wise, every other field present in `def` overwrites.
    /// Text hooks are compiled here; a hook that fails to compile is installed
    /// anyway and reports the failure when it is invoked.
    pub fn upsert(&mut self, def: ResourceDef) -> ResourceId {
        let id = self.get_or_create(&def.name);
        let compiler = self.compiler();
        let compiler = compiler.as_deref();
        let resource = self.get_mut(id);

        macro_rules! overwrite {
            ($($field:ident),*) => {
                $(if let Some(value) = def.$field {
                    resource.$field = value;
                })*
            };
        }
        overwrite!(display, priority, locked, disabled, hidden, auto_unlock, auto_award);

        if def.description.is_some() {
            resource.description = def.description;
        }
        if def.icon.is_some() {
            resource.icon = def.icon;
        }
        if def.singular_name.is_some() {
            resource.singular_name = def.singular_name;
        }
        if def.plural_name.is_some() {
            resource.plural_name = def.plural_name;
        }
        if def.max_count.is_some() {
            resource.max_count = def.max_count;
        }
        if def.min_count.is_some() {
            resource.min_count = def.min_count;
        }
        if let Some(count) = def.count {
            resource.count = count;
        }
        if def.rate.is_some() || def.last_tick.is_some() {
            resource.restore_rate(
                def.rate.unwrap_or(resource.rate()),
                def.last_tick.unwrap_or(resource.last_tick()),
            );
        }
        resource.extra.merge(&def.extra);

        let hooks = &mut resource.hooks;
        if let Some(hook) = def.validate_count {
            hooks.validate_count = Some(resolve_validate_count(hook, compiler));
        }
        if let Some(hook) = def.purchase_cost {
            hooks.purchase_cost = Some(resolve_purchase_cost(hook, compiler));
        }
        if let Some(hook) = def.unlock_cost {
            hooks.unlock_cost = Some(resolve_unlock_cost(hook, compiler));
        }
        if let Some(hook) = def.gain_factor {
            hooks.gain_factor = Some(resolve_factor(hook, compiler));
        }
        if let Some(hook) = def.cost_factor {
            hooks.cost_factor = Some(resolve_factor(hook, compiler));
        }
        if let Some(hook) = def.should_tick {
            hooks.should_tick = Some(resolve_should_tick(hook, compiler));
        }
        if let Some(hook) = def.on_tick {
            hooks.on_tick = Some(resolve_on_tick(hook, compiler));
        }
        if let Some(hook) = def.on_change {
            hooks.on_change = Some(resolve_on_change(hook, compiler));
        }
        if let Some(hook) = def.on_purchase {
            hooks.on_purchase = Some(resolve_on_purchase(hook, compiler));
        }

        id
    }

    pub fn load_all(&mut self, defs: impl IntoIterator<Item = ResourceDef>) {
        for def in defs {
            self.upsert(def);
        }
    }

    pub fn save_all(&self) -> Vec<ResourceDef> {
        self.iter()
            .map(|(_, resource)| ResourceDef::from_resource(resource))
            .collect()
    }
}

fn resolve_validate_count(def: HookDef<ValidateCountFn>, compiler: Compiler) -> Hook<ValidateCountFn> {
    match def {
        HookDef::Native(hook) => hook,
        HookDef::Text(body) => {
            let formula = compile_or_fail(compiler, &body, &["count"]);
            Hook::<ValidateCountFn>::new(move |registry, id, count| {
                formula(registry, id, &[FormulaValue::Number(count)])?.into_number()
            })
            .with_source(body)
        }
    }
}

fn resolve_purchase_cost(def: HookDef<PurchaseCostFn>, compiler: Compiler) -> Hook<PurchaseCostFn> {
    match def {
        HookDef::Native(hook) => hook,
        HookDef::Text(body) => {
            let formula = compile_or_fail(compiler, &body, &["count"]);
            Hook::<PurchaseCostFn>::new(move |registry, id, count| {
                formula(registry, id, &[FormulaValue::Number(count)])?.into_costs()
            })
            .with_source(body)
        }
    }
}

fn resolve_unlock_cost(def: HookDef<UnlockCostFn>, compiler: Compiler) -> Hook<UnlockCostFn> {
    match def {
        HookDef::Native(hook) => hook,
        HookDef::Text(body) => {
            let formula = compile_or_fail(compiler, &body, &[]);
            Hook::<UnlockCostFn>::new(move |registry, id| formula(registry, id, &[])?.into_costs())
                .with_source(body)
        }
    }
}

fn resolve_factor(def: HookDef<FactorFn>, compiler: Compiler) -> Hook<FactorFn> {
    match def {
        HookDef::Native(hook) => hook,
        HookDef::Text(body) => {
            let formula = compile_or_fail(compiler, &body, &["n"]);
            Hook::<FactorFn>::new(move |registry, id, n| {
                formula(registry, id, &[FormulaValue::Number(n)])?.into_number()
            })
            .with_source(body)
        }
    }
}

fn resolve_should_tick(def: HookDef<ShouldTickFn>, compiler: Compiler) -> Hook<ShouldTickFn> {
    match def {
        HookDef::Native(hook) => hook,
        HookDef::Text(body) => {
            let formula = compile_or_fail(compiler, &body, &["dt", "source"]);
            Hook::<ShouldTickFn>::new(move |registry, id, dt, source| {
                formula(registry, id, &tick_args(dt, source))?.into_bool()
            })
            .with_source(body)
        }
    }
}

// Effect formulas are evaluated read-only; a number they return becomes the
// owning resource's next count.
fn resolve_on_tick(def: HookDef<OnTickFn>, compiler: Compiler) -> Hook<OnTickFn> {
    match def {
        HookDef::Native(hook) => hook,
        HookDef::Text(body) => {
            let formula = compile_or_fail(compiler, &body, &["dt", "source"]);
            Hook::<OnTickFn>::new(move |registry, id, dt, source| {
                if let FormulaValue::Number(next) = formula(registry, id, &tick_args(dt, source))? {
                    registry.set_value(id, next, source);
                }
                Ok(())
            })
            .with_source(body)
        }
    }
}

// Change notifications fire from inside `set_value`, so their result is discarded.
fn resolve_on_change(def: HookDef<OnChangeFn>, compiler: Compiler) -> Hook<OnChangeFn> {
    match def {
        HookDef::Native(hook) => hook,
        HookDef::Text(body) => {
            let formula = compile_or_fail(compiler, &body, &["count", "source"]);
            Hook::<OnChangeFn>::new(move |registry, id, count, source| {
                let args = [FormulaValue::Number(count), FormulaValue::Text(source.to_string())];
                formula(registry, id, &args).map(|_| ())
            })
            .with_source(body)
        }
    }
}

fn resolve_on_purchase(def: HookDef<OnPurchaseFn>, compiler: Compiler) -> Hook<OnPurchaseFn> {
    match def {
        HookDef::Native(hook) => hook,
        HookDef::Text(body) => {
            let formula = compile_or_fail(compiler, &body, &["count"]);
            Hook::<OnPurchaseFn>::new(move |registry, id, purchase| {
                if let FormulaValue::Number(next) =
                    formula(registry, id, &[FormulaValue::Number(purchase.count)])?
                {
                    registry.set_value(id, next, "purchase");
                }
                Ok(())
            })
            .with_source(body)
        }
    }
}

fn tick_args(dt: f64, source: &str) -> [FormulaValue; 2] {
    [
        FormulaValue::Number(super::num::decimal_from_f64(dt).unwrap_or_default()),
        FormulaValue::Text(source.to_string()),
    ]
}
