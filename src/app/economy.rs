use bevy::prelude::*;
use idle_economy::core::num::decimal_from_f64;
use idle_economy::core::{
    FactorFn, OnPurchaseFn, OnTickFn, PurchaseCostFn, UnlockCostFn, ValidateCountFn,
};
use idle_economy::{
    Cost, Hook, HookError, HookResult, PurchaseAmount, PurchaseOptions, PurchaseRange,
    PurchaseStyle, Registry,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};

pub const GOLD: &str = "gold";
pub const MINE: &str = "mine";
pub const FORGE: &str = "forge";
pub const RESEARCH: &str = "research";

/// `base * growth^(n - 1)`, the price of the n-th unit.
fn unit_price(base: Decimal, growth: Decimal, n: Decimal) -> HookResult<Decimal> {
    let exponent = (n - Decimal::ONE)
        .to_i64()
        .ok_or_else(|| HookError::Eval(format!("unit index {n} out of range")))?;
    growth
        .checked_powi(exponent)
        .and_then(|scale| scale.checked_mul(base))
        .ok_or_else(|| HookError::Eval(format!("price of unit {n} overflows")))
}

fn count_of(registry: &Registry, name: &str) -> Decimal {
    registry
        .by_name(name)
        .map(|resource| resource.count())
        .unwrap_or_default()
}

/// Attaches the native behaviour of the bundled economy. Resources missing
/// from the loaded definitions are created empty.
pub fn install_hooks(registry: &mut Registry) {
    let gold = registry.get_or_create(GOLD);
    let mine = registry.get_or_create(MINE);
    let forge = registry.get_or_create(FORGE);
    let research = registry.get_or_create(RESEARCH);

    let hooks = &mut registry.get_mut(mine).hooks;
    hooks.validate_count = Some(Hook::<ValidateCountFn>::new(|_, _, count| Ok(count.floor())));
    hooks.purchase_cost = Some(Hook::<PurchaseCostFn>::new(|_, _, n| {
        Ok(vec![Cost::new(GOLD, unit_price(Decimal::TEN, Decimal::new(115, 2), n)?)])
    }));
    hooks.gain_factor = Some(Hook::<FactorFn>::new(|registry, _, factor| {
        let bonus = if count_of(registry, RESEARCH) >= Decimal::ONE {
            Decimal::TWO
        } else {
            Decimal::ONE
        };
        Ok(factor * bonus)
    }));
    hooks.on_tick = Some(Hook::<OnTickFn>::new(move |registry, id, dt, source| {
        let dt = decimal_from_f64(dt).ok_or_else(|| HookError::Eval(format!("bad step {dt}")))?;
        let boost = Decimal::ONE + count_of(registry, FORGE) * Decimal::new(25, 2);
        let produced = registry.get(id).count().saturating_mul(boost).saturating_mul(dt);
        let next = registry.get(gold).count().saturating_add(produced);
        registry.set_value(gold, next, source);
        Ok(())
    }));

    let hooks = &mut registry.get_mut(forge).hooks;
    hooks.unlock_cost = Some(Hook::<UnlockCostFn>::new(|_, _| {
        Ok(vec![Cost::new(GOLD, Decimal::new(50, 0))])
    }));
    hooks.purchase_cost = Some(Hook::<PurchaseCostFn>::new(|_, _, n| {
        Ok(vec![
            Cost::new(GOLD, unit_price(Decimal::ONE_HUNDRED, Decimal::TWO, n)?),
            Cost::new(MINE, Decimal::ONE),
        ])
    }));

    let resource = registry.get_mut(research);
    resource.auto_award = true;
    resource.hooks.purchase_cost = Some(Hook::<PurchaseCostFn>::new(|_, _, _| {
        Ok(vec![Cost::new(GOLD, Decimal::new(500, 0))])
    }));
    resource.hooks.on_purchase = Some(Hook::<OnPurchaseFn>::new(|registry, id, _| {
        registry.get_mut(id).hidden = false;
        info!("research complete: mines now arrive in pairs");
        Ok(())
    }));
}

/// Buys as many mines as currently affordable, up to ten per call.
pub fn auto_buy(registry: &mut Registry, _dt: f64) {
    let Some(mine) = registry.id(MINE) else {
        return;
    };
    let range = PurchaseAmount::Range(PurchaseRange {
        min_amount: Decimal::ONE,
        max_amount: Decimal::TEN,
        increments: Decimal::ONE,
    });
    let bought = registry.buy(mine, range, PurchaseStyle::Partial, &PurchaseOptions::default());
    if !bought.is_none() {
        debug!(count = %bought.count, "auto-bought mines");
    }
}
