use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::FormulaCompiler;

use super::num::clamp;
use super::resource::Resource;
use super::transaction::{Cost, ResourceCount, ResourceRef, combine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(usize);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomySettings {
    pub gain_factor: Decimal,
    pub cost_factor: Decimal,
    pub sell_ratio: Decimal,
    pub rate_update_secs: f64,
    pub rate_update_ema_factor: f64,
    pub format_options: serde_json::Map<String, serde_json::Value>,
}

impl Default for EconomySettings {
    fn default() -> Self {
        Self {
            gain_factor: Decimal::ONE,
            cost_factor: Decimal::ONE,
            sell_ratio: Decimal::ONE,
            rate_update_secs: 0.25,
            rate_update_ema_factor: 0.25,
            format_options: serde_json::Map::new(),
        }
    }
}

#[derive(Default)]
pub struct Registry {
    resources: Vec<Resource>,
    by_name: HashMap<String, ResourceId>,
    pub settings: EconomySettings,
    compiler: Option<Arc<dyn FormulaCompiler + Send + Sync>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.resources)
            .field("settings", &self.settings)
            .field("compiler", &self.compiler.is_some())
            .finish()
    }
}

impl Registry {
    pub fn new(settings: EconomySettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn FormulaCompiler + Send + Sync>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn set_compiler(&mut self, compiler: Option<Arc<dyn FormulaCompiler + Send + Sync>>) {
        self.compiler = compiler;
    }

    pub(crate) fn compiler(&self) -> Option<Arc<dyn FormulaCompiler + Send + Sync>> {
        self.compiler.clone()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get_or_create(&mut self, name: &str) -> ResourceId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = ResourceId(self.resources.len());
        self.resources.push(Resource::new(name));
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn id(&self, name: &str) -> Option<ResourceId> {
        self.by_name.get(name).copied()
    }

    /// # Panics
    /// If `id` was issued by a different registry or before a [`reset`](Self::reset).
    pub fn get(&self, id: ResourceId) -> &Resource {
        &self.resources[id.0]
    }

    pub fn get_mut(&mut self, id: ResourceId) -> &mut Resource {
        &mut self.resources[id.0]
    }

    pub fn by_name(&self, name: &str) -> Option<&Resource> {
        self.id(name).map(|id| self.get(id))
    }

    pub fn name(&self, id: ResourceId) -> &str {
        self.get(id).name()
    }

    pub fn ids(&self) -> Vec<ResourceId> {
        (0..self.resources.len()).map(ResourceId).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
        self.resources
            .iter()
            .enumerate()
            .map(|(index, resource)| (ResourceId(index), resource))
    }

    pub fn reset(&mut self) {
        self.resources.clear();
        self.by_name.clear();
    }

    pub fn resolve(&mut self, resource: &ResourceRef) -> ResourceId {
        match resource {
            ResourceRef::Id(id) => *id,
            ResourceRef::Name(name) => self.get_or_create(name),
            ResourceRef::Def(def) => self.upsert(def.as_ref().clone()),
        }
    }

    pub fn resolve_all(&mut self, costs: &[Cost]) -> Vec<ResourceCount> {
        costs
            .iter()
            .filter(|cost| !cost.count.is_zero())
            .map(|cost| ResourceCount::new(self.resolve(&cost.resource), cost.count))
            .collect()
    }

    pub fn can_afford(&mut self, cost: &[Cost], to_spend: bool) -> bool {
        let resolved = self.resolve_all(cost);
        self.can_afford_resolved(&resolved, to_spend)
    }

    pub fn can_afford_resolved(&self, cost: &[ResourceCount], to_spend: bool) -> bool {
        combine(cost.iter().copied()).iter().all(|entry| {
            let resource = self.get(entry.resource);
            let floor = if to_spend {
                resource.min_count.unwrap_or(Decimal::ZERO)
            } else {
                Decimal::ZERO
            };
            !resource.locked && resource.count.saturating_sub(entry.count) >= floor
        })
    }

    /// Sets a resource's count, running `validate_count`, clamping to the
    /// bounds and notifying `on_change`. Returns the stored value.
    pub fn set_value(&mut self, id: ResourceId, value: Decimal, source: &str) -> Decimal {
        let mut value = value;
        if let Some(hook) = self.get(id).hooks.validate_count.clone() {
            match hook.func()(self, id, value) {
                Ok(validated) => value = validated,
                Err(error) => {
                    warn!(resource = self.name(id), %error, "validate_count hook failed");
                }
            }
        }

        let resource = self.get_mut(id);
        resource.count = clamp(value, resource.min_count, resource.max_count);
        let count = resource.count;

        if let Some(hook) = self.get(id).hooks.on_change.clone()
            && let Err(error) = hook.func()(self, id, count, source)
        {
            warn!(resource = self.name(id), %error, "on_change hook failed");
        }

        self.get(id).count
    }

    pub(crate) fn apply(
        &mut self,
        id: ResourceId,
        deltas: &[ResourceCount],
        source: &str,
    ) -> Vec<ResourceCount> {
        let mut realized = Vec::new();
        for delta in deltas.iter().filter(|delta| delta.resource == id) {
            let previous = self.get(id).count;
            let next = self.set_value(id, previous.saturating_add(delta.count), source);
            realized.push(ResourceCount::new(id, next.saturating_sub(previous)));
        }
        combine(realized)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal_macros::dec;

    use super::Registry;
    use crate::core::hook::{Hook, OnChangeFn, ValidateCountFn};
    use crate::core::transaction::Cost;

    #[test]
    fn get_or_create_returns_the_same_identity() {
        let mut registry = Registry::default();
        let first = registry.get_or_create("gold");
        let second = registry.get_or_create("gold");
        let other = registry.get_or_create("wood");

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.name(first), "gold");
    }

    #[test]
    fn set_value_validates_then_clamps_then_notifies() {
        let mut registry = Registry::default();
        let id = registry.get_or_create("gold");
        let changes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&changes);
        {
            let resource = registry.get_mut(id);
            resource.max_count = Some(dec!(10));
            resource.min_count = Some(dec!(2));
            resource.hooks.validate_count =
                Some(Hook::<ValidateCountFn>::new(|_, _, value| Ok(value.floor())));
            resource.hooks.on_change = Some(Hook::<OnChangeFn>::new(move |_, _, _, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        assert_eq!(registry.set_value(id, dec!(4.7), "test"), dec!(4));
        assert_eq!(registry.set_value(id, dec!(25), "test"), dec!(10));
        assert_eq!(registry.set_value(id, dec!(-3), "test"), dec!(2));
        assert_eq!(changes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn can_afford_honours_locks_and_spend_floor() {
        let mut registry = Registry::default();
        let gold = registry.get_or_create("gold");
        registry.set_value(gold, dec!(10), "test");
        registry.get_mut(gold).min_count = Some(dec!(5));

        assert!(registry.can_afford(&[Cost::new("gold", dec!(5))], true));
        assert!(!registry.can_afford(&[Cost::new("gold", dec!(6))], true));
        assert!(registry.can_afford(&[Cost::new("gold", dec!(6))], false));
        assert!(!registry.can_afford(
            &[Cost::new("gold", dec!(3)), Cost::new("gold", dec!(3))],
            true
        ));

        registry.get_mut(gold).locked = true;
        assert!(!registry.can_afford(&[Cost::new("gold", dec!(1))], false));
    }

    #[test]
    fn resolve_all_drops_zero_amounts_and_creates_missing_names() {
        let mut registry = Registry::default();
        let resolved = registry.resolve_all(&[
            Cost::new("gold", dec!(0)),
            Cost::new("wood", dec!(2)),
        ]);

        assert_eq!(resolved.len(), 1);
        assert_eq!(registry.name(resolved[0].resource), "wood");
        assert!(registry.id("gold").is_none());
    }
}
