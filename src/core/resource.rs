use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::hook::ResourceHooks;
use super::num::decimal_from_f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStyle {
    None,
    #[default]
    Number,
    Time,
    Percentage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtraMap(BTreeMap<String, Decimal>);

impl ExtraMap {
    pub fn get(&self, key: &str) -> Option<Decimal> {
        self.0.get(key).copied()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Decimal) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Decimal> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.0.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key-wise merge; entries in `other` win.
    pub fn merge(&mut self, other: &ExtraMap) {
        for (key, value) in other.iter() {
            self.set(key, value);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountOverride {
    Value(Decimal),
    Extra(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RateAnchor {
    time: f64,
    count: Decimal,
}

/// One named stock of the economy.
///
/// `count` and `rate` are read-only from outside the crate: counts change
/// through [`Registry::set_value`](super::Registry::set_value), which enforces
/// the bounds, and the rate only moves when ticks sample it.
#[derive(Debug, Clone)]
pub struct Resource {
    name: String,
    pub description: Option<String>,
    pub display: DisplayStyle,
    pub icon: Option<String>,
    pub singular_name: Option<String>,
    pub plural_name: Option<String>,
    pub priority: f64,

    pub locked: bool,
    pub disabled: bool,
    pub hidden: bool,
    pub auto_unlock: bool,
    pub auto_award: bool,

    pub extra: ExtraMap,

    pub(crate) count: Decimal,
    pub max_count: Option<Decimal>,
    pub min_count: Option<Decimal>,
    pub(crate) rate: Decimal,
    pub(crate) last_tick: f64,

    pub hooks: ResourceHooks,

    rate_anchor: Option<RateAnchor>,
}

impl Resource {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            display: DisplayStyle::default(),
            icon: None,
            singular_name: None,
            plural_name: None,
            priority: f64::INFINITY,
            locked: false,
            disabled: false,
            hidden: false,
            auto_unlock: false,
            auto_award: false,
            extra: ExtraMap::default(),
            count: Decimal::ZERO,
            max_count: None,
            min_count: None,
            rate: Decimal::ZERO,
            last_tick: 0.0,
            hooks: ResourceHooks::default(),
            rate_anchor: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> Decimal {
        self.count
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn last_tick(&self) -> f64 {
        self.last_tick
    }

    pub fn singular(&self) -> &str {
        self.singular_name.as_deref().unwrap_or(&self.name)
    }

    pub fn plural(&self) -> &str {
        self.plural_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_active(&self) -> bool {
        !self.locked && !self.disabled
    }

    pub fn count_with(&self, count_override: Option<&CountOverride>) -> Option<Decimal> {
        match count_override {
            None => Some(self.count),
            Some(CountOverride::Value(value)) => Some(*value),
            Some(CountOverride::Extra(key)) => self.extra.get(key),
        }
    }

    pub(crate) fn update_rate(&mut self, dt: f64, sample_secs: f64, ema_factor: f64) {
        self.last_tick += dt;
        let anchor = *self.rate_anchor.get_or_insert(RateAnchor {
            time: self.last_tick,
            count: self.count,
        });

        let elapsed = self.last_tick - anchor.time;
        if elapsed < sample_secs || elapsed <= 0.0 {
            return;
        }

        let (Some(elapsed), Some(alpha)) = (decimal_from_f64(elapsed), decimal_from_f64(ema_factor))
        else {
            return;
        };
        let Some(instant) = self
            .count
            .checked_sub(anchor.count)
            .and_then(|delta| delta.checked_div(elapsed))
        else {
            return;
        };

        let Some(rate) = (Decimal::ONE - alpha)
            .checked_mul(self.rate)
            .zip(instant.checked_mul(alpha))
            .and_then(|(kept, sampled)| kept.checked_add(sampled))
        else {
            return;
        };
        self.rate = rate;
        self.rate_anchor = Some(RateAnchor {
            time: self.last_tick,
            count: self.count,
        });
    }

    pub(crate) fn restore_rate(&mut self, rate: Decimal, last_tick: f64) {
        self.rate = rate;
        self.last_tick = last_tick;
        self.rate_anchor = None;
    }
}
