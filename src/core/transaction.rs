use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::definition::ResourceDef;
use super::registry::ResourceId;

#[derive(Debug, Clone)]
pub enum ResourceRef {
    Id(ResourceId),
    Name(String),
    Def(Box<ResourceDef>),
}

impl From<ResourceId> for ResourceRef {
    fn from(id: ResourceId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ResourceRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ResourceRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<ResourceDef> for ResourceRef {
    fn from(def: ResourceDef) -> Self {
        Self::Def(Box::new(def))
    }
}

#[derive(Debug, Clone)]
pub struct Cost {
    pub resource: ResourceRef,
    pub count: Decimal,
}

impl Cost {
    pub fn new(resource: impl Into<ResourceRef>, count: Decimal) -> Self {
        Self {
            resource: resource.into(),
            count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceCount {
    pub resource: ResourceId,
    pub count: Decimal,
}

impl ResourceCount {
    pub fn new(resource: ResourceId, count: Decimal) -> Self {
        Self { resource, count }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PurchaseStyle {
    Full,
    #[default]
    Partial,
    Free,
    DryFull,
    DryPartial,
}

impl PurchaseStyle {
    pub fn is_dry(self) -> bool {
        matches!(self, Self::DryFull | Self::DryPartial)
    }

    pub fn is_partial(self) -> bool {
        matches!(self, Self::Partial | Self::DryPartial)
    }

    pub fn is_full(self) -> bool {
        matches!(self, Self::Full | Self::DryFull)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRange {
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub increments: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseAmount {
    Fixed(Decimal),
    Range(PurchaseRange),
}

impl PurchaseAmount {
    pub fn negated(self) -> Self {
        match self {
            Self::Fixed(amount) => Self::Fixed(-amount),
            Self::Range(range) => Self::Range(PurchaseRange {
                min_amount: -range.min_amount,
                max_amount: -range.max_amount,
                increments: -range.increments,
            }),
        }
    }
}

impl Default for PurchaseAmount {
    fn default() -> Self {
        Self::Fixed(Decimal::ONE)
    }
}

impl From<Decimal> for PurchaseAmount {
    fn from(amount: Decimal) -> Self {
        Self::Fixed(amount)
    }
}

impl From<PurchaseRange> for PurchaseAmount {
    fn from(range: PurchaseRange) -> Self {
        Self::Range(range)
    }
}

/// The resolved outcome of a purchase or sale attempt.
///
/// A rejected request is a transaction with zero `count` and empty lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseCost {
    pub count: Decimal,
    pub style: PurchaseStyle,
    pub gain: Vec<ResourceCount>,
    pub cost: Vec<ResourceCount>,
}

impl PurchaseCost {
    pub fn none(style: PurchaseStyle) -> Self {
        Self {
            count: Decimal::ZERO,
            style,
            gain: Vec::new(),
            cost: Vec::new(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.count.is_zero() && self.gain.is_empty() && self.cost.is_empty()
    }

    pub fn gain_of(&self, resource: ResourceId) -> Decimal {
        amount_of(&self.gain, resource)
    }

    pub fn cost_of(&self, resource: ResourceId) -> Decimal {
        amount_of(&self.cost, resource)
    }

    pub fn merged(style: PurchaseStyle, parts: Vec<PurchaseCost>) -> Self {
        let mut count = Decimal::ZERO;
        let mut gain = Vec::new();
        let mut cost = Vec::new();
        for part in parts {
            count = count.saturating_add(part.count);
            gain.extend(part.gain);
            cost.extend(part.cost);
        }
        Self {
            count,
            style,
            gain: combine(gain),
            cost: combine(cost),
        }
    }
}

fn amount_of(list: &[ResourceCount], resource: ResourceId) -> Decimal {
    list.iter()
        .filter(|entry| entry.resource == resource)
        .map(|entry| entry.count)
        .sum()
}

/// Sums amounts per resource, keeping first-seen order and dropping net-zero entries.
pub fn combine(entries: impl IntoIterator<Item = ResourceCount>) -> Vec<ResourceCount> {
    let mut order = Vec::new();
    let mut totals: HashMap<ResourceId, Decimal> = HashMap::new();
    for entry in entries {
        let total = totals.entry(entry.resource).or_insert_with(|| {
            order.push(entry.resource);
            Decimal::ZERO
        });
        *total = total.saturating_add(entry.count);
    }

    order
        .into_iter()
        .filter_map(|resource| {
            let count = totals[&resource];
            (!count.is_zero()).then_some(ResourceCount { resource, count })
        })
        .collect()
}
