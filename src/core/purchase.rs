use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::hook::{FactorFn, Hook};
use super::num::{clamp, floor_to_i64, is_finite, sign};
use super::registry::{Registry, ResourceId};
use super::resource::CountOverride;
use super::transaction::{
    Cost, PurchaseAmount, PurchaseCost, PurchaseRange, PurchaseStyle, ResourceCount, combine,
};

/// Upper bound on integer steps walked by a single pricing call.
pub const MAX_PURCHASE_STEPS: i64 = 1000;
pub const MAX_RANGE_AMOUNT: Decimal = Decimal::ONE_THOUSAND;

const PURCHASE_SOURCE: &str = "purchase";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOptions {
    pub gain_factor: Decimal,
    pub cost_factor: Decimal,
    pub count_override: Option<CountOverride>,
}

impl Default for PurchaseOptions {
    fn default() -> Self {
        Self {
            gain_factor: Decimal::ONE,
            cost_factor: Decimal::ONE,
            count_override: None,
        }
    }
}

impl PurchaseOptions {
    pub fn with_factors(gain_factor: Decimal, cost_factor: Decimal) -> Self {
        Self {
            gain_factor,
            cost_factor,
            count_override: None,
        }
    }
}

impl Registry {
    /// Prices buying (positive `amount`) or selling (negative) units of `id`.
    ///
    /// Walks one integer step at a time from `floor(start)` to `floor(target)`,
    /// summing `purchase_cost(i + 1)` scaled by `cost_factor`. A sale is priced
    /// as the purchase walk over the same span with both factors negated and
    /// the cost factor scaled by the sell ratio. Nothing is mutated.
    pub fn get_purchase_cost(
        &mut self,
        id: ResourceId,
        amount: Decimal,
        style: PurchaseStyle,
        gain_factor: Decimal,
        cost_factor: Decimal,
        count_override: Option<&CountOverride>,
    ) -> PurchaseCost {
        if amount.is_zero() {
            return PurchaseCost::none(style);
        }

        let resource = self.get(id);
        let Some(start) = resource.count_with(count_override) else {
            debug!(resource = resource.name(), ?count_override, "count override not found");
            return PurchaseCost::none(style);
        };
        let Some(target) = start.checked_add(amount) else {
            return PurchaseCost::none(style);
        };
        let target = clamp(
            target,
            Some(resource.min_count.unwrap_or(Decimal::ZERO)),
            resource.max_count,
        );

        if style == PurchaseStyle::Free {
            let Some(diff) = target.checked_sub(start) else {
                return PurchaseCost::none(style);
            };
            let Some(gain) = diff.checked_mul(gain_factor) else {
                return PurchaseCost::none(style);
            };
            return PurchaseCost {
                count: diff,
                style,
                gain: combine([ResourceCount::new(id, gain)]),
                cost: Vec::new(),
            };
        }

        let (start, target, gain_factor, cost_factor) = if start > target {
            let Some(sell_factor) = cost_factor.checked_mul(self.settings.sell_ratio) else {
                return PurchaseCost::none(style);
            };
            (target, start, -gain_factor, -sell_factor)
        } else {
            (start, target, gain_factor, cost_factor)
        };

        let mut cost = Vec::new();
        if self.get(id).locked
            && let Some(hook) = self.get(id).hooks.unlock_cost.clone()
        {
            match hook.func()(self, id) {
                Ok(unlock) => cost = self.resolve_all(&unlock),
                Err(error) => {
                    warn!(resource = self.name(id), %error, "unlock_cost hook failed");
                    return PurchaseCost::none(style);
                }
            }
        }

        let (Some(first), Some(last)) = (floor_to_i64(start), floor_to_i64(target)) else {
            debug!(resource = self.name(id), "purchase endpoints overflow");
            return PurchaseCost::none(style);
        };
        let span = match last.checked_sub(first) {
            Some(span) if span <= MAX_PURCHASE_STEPS => span,
            _ => {
                debug!(resource = self.name(id), first, last, "purchase walk exceeds step cap");
                return PurchaseCost::none(style);
            }
        };

        let purchase_cost = self.get(id).hooks.purchase_cost.clone();
        let mut steps = 0_i64;
        for step in first..last {
            let unit = match &purchase_cost {
                Some(hook) => match hook.func()(self, id, Decimal::from(step + 1)) {
                    Ok(unit) => unit,
                    Err(error) => {
                        warn!(resource = self.name(id), %error, "purchase_cost hook failed");
                        return PurchaseCost::none(style);
                    }
                },
                None => Vec::new(),
            };

            let mut unit = self.resolve_all(&unit);
            for entry in &mut unit {
                let Some(scaled) = entry.count.checked_mul(cost_factor) else {
                    return PurchaseCost::none(style);
                };
                entry.count = scaled;
            }

            let running = combine(cost.iter().copied().chain(unit));
            if style.is_partial() && !self.can_afford_resolved(&running, true) {
                break;
            }
            steps += 1;
            cost = running;
        }

        if (!style.is_dry() && !self.can_afford_resolved(&cost, true))
            || (style.is_full() && steps != span)
        {
            return PurchaseCost::none(style);
        }

        let steps = Decimal::from(steps);
        let Some(gain) = gain_factor.checked_mul(steps) else {
            return PurchaseCost::none(style);
        };
        PurchaseCost {
            count: steps * sign(gain_factor),
            style,
            gain: combine([ResourceCount::new(id, gain)]),
            cost,
        }
    }

    /// Prices and, for live styles, applies each requested purchase in order.
    ///
    /// Gains are added to the purchased resource and costs deducted from the
    /// paying resources through [`set_value`](Self::set_value). A locked
    /// resource unlocks when its gain is realized if it declares an unlock
    /// cost; otherwise it yields nothing. The returned transaction reports the
    /// realized changes, with costs as positive amounts spent.
    pub fn purchase(
        &mut self,
        to_buy: &[Cost],
        style: PurchaseStyle,
        options: &PurchaseOptions,
    ) -> PurchaseCost {
        let (Some(gain_factor), Some(cost_factor)) = (
            self.settings.gain_factor.checked_mul(options.gain_factor),
            self.settings.cost_factor.checked_mul(options.cost_factor),
        ) else {
            return PurchaseCost::none(style);
        };

        let requested = self.resolve_all(to_buy);
        let mut parts = Vec::with_capacity(requested.len());
        for ResourceCount { resource: id, count } in requested {
            let hooks = &self.get(id).hooks;
            let (gain_hook, cost_hook) = (hooks.gain_factor.clone(), hooks.cost_factor.clone());
            let (Some(gain), Some(cost)) = (
                self.resource_factor(id, gain_hook, gain_factor),
                self.resource_factor(id, cost_hook, cost_factor),
            ) else {
                parts.push(PurchaseCost::none(style));
                continue;
            };

            let priced = self.get_purchase_cost(
                id,
                count,
                style,
                gain,
                cost,
                options.count_override.as_ref(),
            );
            if style.is_dry() || priced.count.is_zero() {
                parts.push(priced);
                continue;
            }

            let resource = self.get_mut(id);
            if resource.locked {
                if resource.hooks.unlock_cost.is_none() {
                    parts.push(PurchaseCost::none(style));
                    continue;
                }
                resource.locked = false;
            }

            let gain = self.apply(id, &priced.gain, PURCHASE_SOURCE);
            let mut spent = Vec::with_capacity(priced.cost.len());
            for entry in &priced.cost {
                let delta = [ResourceCount::new(entry.resource, -entry.count)];
                spent.extend(
                    self.apply(entry.resource, &delta, PURCHASE_SOURCE)
                        .into_iter()
                        .map(|realized| ResourceCount::new(realized.resource, -realized.count)),
                );
            }

            let realized = PurchaseCost {
                count: priced.count,
                style,
                gain,
                cost: combine(spent),
            };
            if let Some(hook) = self.get(id).hooks.on_purchase.clone()
                && let Err(error) = hook.func()(self, id, &realized)
            {
                warn!(resource = self.name(id), %error, "on_purchase hook failed");
            }
            parts.push(realized);
        }

        PurchaseCost::merged(style, parts)
    }

    pub fn purchase_all(
        &mut self,
        limits: &BTreeMap<String, Option<CountOverride>>,
        amount: PurchaseAmount,
        style: PurchaseStyle,
        options: &PurchaseOptions,
    ) -> PurchaseCost {
        let targets: Vec<(ResourceId, Option<CountOverride>)> = self
            .iter()
            .filter(|(_, resource)| resource.is_active())
            .filter(|(_, resource)| limits.is_empty() || limits.contains_key(resource.name()))
            .map(|(id, resource)| {
                let count_override = limits
                    .get(resource.name())
                    .cloned()
                    .flatten()
                    .or_else(|| options.count_override.clone());
                (id, count_override)
            })
            .collect();

        let parts = targets
            .into_iter()
            .map(|(id, count_override)| {
                let options = PurchaseOptions {
                    count_override,
                    ..options.clone()
                };
                self.buy(id, amount, style, &options)
            })
            .collect();
        PurchaseCost::merged(style, parts)
    }

    pub fn buy(
        &mut self,
        id: ResourceId,
        amount: PurchaseAmount,
        style: PurchaseStyle,
        options: &PurchaseOptions,
    ) -> PurchaseCost {
        match amount {
            PurchaseAmount::Fixed(amount) => self.purchase(&[Cost::new(id, amount)], style, options),
            PurchaseAmount::Range(range) => self
                .buy_range(id, range, style, options)
                .unwrap_or_else(|| PurchaseCost::none(style)),
        }
    }

    fn buy_range(
        &mut self,
        id: ResourceId,
        range: PurchaseRange,
        style: PurchaseStyle,
        options: &PurchaseOptions,
    ) -> Option<PurchaseCost> {
        let resource = self.get(id);
        let current = resource
            .count_with(options.count_override.as_ref())
            .filter(|current| is_finite(*current))?;
        if range.min_amount.abs() > range.max_amount.abs()
            || range.max_amount.abs() > MAX_RANGE_AMOUNT
            || range.increments.is_zero()
        {
            return None;
        }

        let min_count = resource.min_count.unwrap_or(Decimal::ZERO);
        let max_count = resource.max_count;
        let increment = range.increments;
        let adjust = |amount: Decimal| -> Option<Decimal> {
            let aligned = current
                .checked_add(amount)?
                .checked_div(increment)?
                .floor()
                .checked_mul(increment)?;
            clamp(aligned, Some(min_count), max_count).checked_sub(current)
        };

        let single = |registry: &mut Registry, amount: Decimal, style: PurchaseStyle| {
            registry.purchase(&[Cost::new(id, amount)], style, options)
        };

        let mut preview = single(self, adjust(range.max_amount)?, PurchaseStyle::DryPartial);
        if !(preview.count % increment).is_zero() {
            let realigned = single(self, adjust(preview.count)?, PurchaseStyle::DryPartial);
            // Partial styles may settle below an increment boundary when none is reachable.
            if !realigned.count.is_zero() || !style.is_partial() {
                preview = realigned;
            }
        }

        let out_of_range = preview.count.is_zero()
            || (!range.min_amount.is_sign_negative() && preview.count < range.min_amount)
            || (range.min_amount.is_sign_negative() && preview.count > range.min_amount);
        if out_of_range {
            if !style.is_dry() {
                return None;
            }
            let low = range.min_amount.min(range.max_amount);
            let high = range.min_amount.max(range.max_amount);
            let adjusted = adjust(increment.clamp(low, high))?;
            let unit = if adjusted.is_zero() {
                sign(increment)
            } else {
                adjusted
            };
            preview = single(self, unit, PurchaseStyle::DryFull);
        }

        if style.is_dry() {
            Some(preview)
        } else {
            Some(single(self, preview.count, style))
        }
    }

    pub fn sell(
        &mut self,
        id: ResourceId,
        amount: PurchaseAmount,
        style: PurchaseStyle,
        options: &PurchaseOptions,
    ) -> PurchaseCost {
        self.buy(id, amount.negated(), style, options)
    }

    pub fn can_buy(
        &mut self,
        id: ResourceId,
        amount: PurchaseAmount,
        cost_factor: Decimal,
        count_override: Option<CountOverride>,
    ) -> PurchaseCost {
        let options = PurchaseOptions {
            gain_factor: Decimal::ONE,
            cost_factor,
            count_override,
        };
        self.buy(id, amount, PurchaseStyle::DryPartial, &options)
    }

    pub fn award(&mut self, id: ResourceId, amount: PurchaseAmount) -> PurchaseCost {
        self.buy(id, amount, PurchaseStyle::Free, &PurchaseOptions::default())
    }

    fn resource_factor(
        &self,
        id: ResourceId,
        hook: Option<Hook<FactorFn>>,
        base: Decimal,
    ) -> Option<Decimal> {
        let Some(hook) = hook else {
            return Some(base);
        };
        match hook.func()(self, id, base) {
            Ok(factor) => Some(factor),
            Err(error) => {
                warn!(resource = self.name(id), %error, "factor hook failed");
                None
            }
        }
    }
}
