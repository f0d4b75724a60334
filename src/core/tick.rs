use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::registry::{Registry, ResourceId};
use super::transaction::{Cost, PurchaseAmount};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickDeltas(BTreeMap<String, Decimal>);

impl TickDeltas {
    pub fn record(&mut self, name: &str, delta: Decimal) {
        if delta.is_zero() {
            return;
        }
        let total = self
            .0
            .get(name)
            .copied()
            .unwrap_or(Decimal::ZERO)
            .saturating_add(delta);
        if total.is_zero() {
            self.0.remove(name);
        } else {
            self.0.insert(name.to_string(), total);
        }
    }

    pub fn get(&self, name: &str) -> Option<Decimal> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.0.iter().map(|(name, delta)| (name.as_str(), *delta))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn reset(&mut self) {
        self.0.clear();
    }
}

impl Registry {
    /// Advances every resource by `dt` seconds and folds the resulting count
    /// changes into `cumulative`.
    ///
    /// Phases run in order: auto-unlock, per-resource `on_tick`, auto-award,
    /// rate sampling. Only resources that are unlocked and enabled once the
    /// auto-unlock phase is done take part in the later phases.
    pub fn tick_all(&mut self, dt: f64, source: &str, mut cumulative: TickDeltas) -> TickDeltas {
        self.auto_unlock();

        let active: Vec<ResourceId> = self
            .iter()
            .filter(|(_, resource)| resource.is_active())
            .map(|(id, _)| id)
            .collect();
        let before: Vec<Decimal> = active.iter().map(|id| self.get(*id).count()).collect();

        for &id in &active {
            self.run_tick_hooks(id, dt, source);
        }
        for &id in &active {
            self.auto_award(id);
        }

        let (sample_secs, ema_factor) = (
            self.settings.rate_update_secs,
            self.settings.rate_update_ema_factor,
        );
        for &id in &active {
            self.get_mut(id).update_rate(dt, sample_secs, ema_factor);
        }

        for (&id, previous) in active.iter().zip(before) {
            let delta = self.get(id).count().saturating_sub(previous);
            cumulative.record(self.name(id), delta);
        }
        cumulative
    }

    fn auto_unlock(&mut self) {
        for id in self.ids() {
            let resource = self.get(id);
            if !resource.auto_unlock || resource.disabled || !resource.locked {
                continue;
            }

            let hooks = &resource.hooks;
            let cost = match (hooks.unlock_cost.clone(), hooks.purchase_cost.clone()) {
                (Some(hook), _) => hook.func()(self, id),
                (None, Some(hook)) => hook.func()(self, id, Decimal::ONE),
                (None, None) => Ok(Vec::new()),
            };
            match cost {
                Ok(cost) if self.can_afford(&cost, false) => {
                    self.get_mut(id).locked = false;
                    debug!(resource = self.name(id), "auto-unlocked");
                }
                Ok(_) => {}
                Err(error) => warn!(resource = self.name(id), %error, "unlock cost hook failed"),
            }
        }
    }

    fn run_tick_hooks(&mut self, id: ResourceId, dt: f64, source: &str) {
        let hooks = &self.get(id).hooks;
        let (should_tick, on_tick) = (hooks.should_tick.clone(), hooks.on_tick.clone());

        if let Some(hook) = should_tick {
            match hook.func()(self, id, dt, source) {
                Ok(true) => {}
                Ok(false) => return,
                Err(error) => {
                    warn!(resource = self.name(id), %error, "should_tick hook failed");
                    return;
                }
            }
        }
        if let Some(hook) = on_tick
            && let Err(error) = hook.func()(self, id, dt, source)
        {
            warn!(resource = self.name(id), %error, "on_tick hook failed");
        }
    }

    fn auto_award(&mut self, id: ResourceId) {
        let resource = self.get(id);
        let below_max = resource
            .max_count
            .is_some_and(|max_count| resource.count() < max_count);
        if !resource.auto_award || resource.disabled || !below_max {
            return;
        }

        let next = resource.count().saturating_add(Decimal::ONE);
        let cost: Vec<Cost> = match resource.hooks.purchase_cost.clone() {
            Some(hook) => match hook.func()(self, id, next) {
                Ok(cost) => cost,
                Err(error) => {
                    warn!(resource = self.name(id), %error, "purchase_cost hook failed");
                    return;
                }
            },
            None => Vec::new(),
        };
        if self.can_afford(&cost, false) {
            self.award(id, PurchaseAmount::Fixed(Decimal::ONE));
        }
    }
}
