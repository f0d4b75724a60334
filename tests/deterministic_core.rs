use std::sync::{Arc, Mutex};

use idle_economy::core::num::decimal_from_f64;
use idle_economy::core::{OnTickFn, PurchaseCostFn, TIMER_SOURCE};
use idle_economy::{
    Cost, Hook, HookError, PurchaseAmount, PurchaseOptions, PurchaseRange, PurchaseStyle,
    Registry, ResourceId, Simulation, TickDeltas, save_to_json_string,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const EPSILON: f64 = 1e-9;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= EPSILON,
        "expected {expected}, got {actual}"
    );
}

fn seeded(registry: &mut Registry, name: &str, count: Decimal) -> ResourceId {
    let id = registry.get_or_create(name);
    registry.set_value(id, count, "test");
    id
}

fn priced_in(registry: &mut Registry, id: ResourceId, payer: &'static str) {
    registry.get_mut(id).hooks.purchase_cost =
        Some(Hook::<PurchaseCostFn>::new(move |_, _, _| Ok(vec![Cost::new(payer, dec!(1))])));
}

/// Adds `dt` to the resource every tick and records each step it saw.
fn linear_accumulator(registry: &mut Registry, id: ResourceId) -> Arc<Mutex<Vec<f64>>> {
    let steps = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&steps);
    registry.get_mut(id).hooks.on_tick = Some(Hook::<OnTickFn>::new(move |registry, id, dt, source| {
        seen.lock()
            .map_err(|_| HookError::Eval("step log poisoned".into()))?
            .push(dt);
        let dt = decimal_from_f64(dt).ok_or_else(|| HookError::Eval("bad dt".into()))?;
        let next = registry.get(id).count() + dt;
        registry.set_value(id, next, source);
        Ok(())
    }));
    steps
}

fn buy(registry: &mut Registry, name: &str, amount: Decimal, style: PurchaseStyle) -> bool {
    !registry
        .purchase(&[Cost::new(name, amount)], style, &PurchaseOptions::default())
        .is_none()
}

#[test]
fn simple_purchase_then_partial_purchase_never_overshoots() {
    let mut registry = Registry::default();
    let r1 = seeded(&mut registry, "r1", dec!(10));
    let r2 = seeded(&mut registry, "r2", dec!(0));
    priced_in(&mut registry, r2, "r1");

    assert!(buy(&mut registry, "r2", dec!(3), PurchaseStyle::Full));
    assert_eq!(registry.get(r1).count(), dec!(7));
    assert_eq!(registry.get(r2).count(), dec!(3));

    let partial = registry.purchase(
        &[Cost::new("r2", dec!(10))],
        PurchaseStyle::Partial,
        &PurchaseOptions::default(),
    );
    assert_eq!(partial.count, dec!(7));
    assert_eq!(registry.get(r1).count(), dec!(0));
    assert_eq!(registry.get(r2).count(), dec!(10));
}

#[test]
fn locked_resource_without_unlock_cost_is_a_no_op() {
    let mut registry = Registry::default();
    let r1 = seeded(&mut registry, "r1", dec!(10));
    let r2 = seeded(&mut registry, "r2", dec!(0));
    priced_in(&mut registry, r2, "r1");
    registry.get_mut(r2).locked = true;

    let result = registry.purchase(
        &[Cost::new("r2", dec!(3))],
        PurchaseStyle::Full,
        &PurchaseOptions::default(),
    );
    assert!(result.is_none());
    assert!(result.gain.is_empty() && result.cost.is_empty());
    assert_eq!(registry.get(r1).count(), dec!(10));
    assert_eq!(registry.get(r2).count(), dec!(0));
}

#[test]
fn ranged_buy_respects_full_and_partial_styles() {
    let range = PurchaseAmount::Range(PurchaseRange {
        min_amount: dec!(1),
        max_amount: dec!(10),
        increments: dec!(10),
    });

    let mut rich = Registry::default();
    seeded(&mut rich, "coin", dec!(20));
    let item = seeded(&mut rich, "item", dec!(100));
    priced_in(&mut rich, item, "coin");
    let bought = rich.buy(item, range, PurchaseStyle::Full, &PurchaseOptions::default());
    assert_eq!(bought.count, dec!(10));
    assert_eq!(rich.get(item).count(), dec!(110));

    let mut poor = Registry::default();
    let coin = seeded(&mut poor, "coin", dec!(7));
    let item = seeded(&mut poor, "item", dec!(100));
    priced_in(&mut poor, item, "coin");
    let full = poor.buy(item, range, PurchaseStyle::Full, &PurchaseOptions::default());
    assert!(full.is_none());
    assert_eq!(poor.get(coin).count(), dec!(7));

    let partial = poor.buy(item, range, PurchaseStyle::Partial, &PurchaseOptions::default());
    assert_eq!(partial.count, dec!(7));
    assert_eq!(poor.get(item).count(), dec!(107));
}

#[test]
fn long_ticks_are_sub_stepped_like_one_linear_step() {
    let mut registry = Registry::default();
    let ore = registry.get_or_create("ore");
    let steps = linear_accumulator(&mut registry, ore);
    let mut simulation = Simulation::starting_at(registry, 0);
    simulation.params.max_tick_secs = 1.0;

    simulation.tick(10_000, TIMER_SOURCE, None, None);
    let result = simulation.tick(12_500, TIMER_SOURCE, None, None);

    let steps = steps.lock().map(|steps| steps.clone()).unwrap_or_default();
    assert_eq!(steps.len(), 3);
    assert_close(steps[0], 1.0);
    assert_close(steps[1], 1.0);
    assert_close(steps[2], 0.5);
    assert_eq!(simulation.registry.get(ore).count(), dec!(2.5));
    assert_eq!(result.get("ore"), Some(dec!(2.5)));
}

#[test]
fn rate_converges_to_a_constant_income_without_overshooting() {
    let mut registry = Registry::default();
    let ore = registry.get_or_create("ore");
    linear_accumulator(&mut registry, ore);

    let mut deltas = TickDeltas::default();
    for _ in 0..40 {
        deltas = registry.tick_all(0.25, TIMER_SOURCE, deltas);
        assert!(registry.get(ore).rate() <= Decimal::ONE);
    }

    let rate = registry.get(ore).rate();
    assert!(rate > dec!(0.99), "rate only reached {rate}");
    assert_eq!(deltas.get("ore"), Some(dec!(10)));
}

#[test]
fn saved_state_reloads_counts_extras_and_bounds() {
    let mut registry = Registry::default();
    let ore = seeded(&mut registry, "ore", dec!(42.5));
    let vault = registry.get_or_create("vault");
    registry.get_mut(vault).max_count = Some(dec!(100));
    registry.get_mut(vault).min_count = Some(dec!(-5));
    registry.get_mut(ore).extra.set("boost", dec!(1.5));
    registry.set_value(vault, dec!(60), "test");

    let mut original = Simulation::starting_at(registry, 0);
    original.params.ticks_per_sec = 4.0;
    let json = save_to_json_string(&original.save(1_000)).expect("serialize save");

    let mut restored = Simulation::starting_at(Registry::default(), 0);
    restored.load_str(&json, 2_000).expect("load save");

    let ore = restored.registry.by_name("ore").expect("ore restored");
    assert_eq!(ore.count(), dec!(42.5));
    assert_eq!(ore.extra.get("boost"), Some(dec!(1.5)));
    let vault = restored.registry.by_name("vault").expect("vault restored");
    assert_eq!(vault.count(), dec!(60));
    assert_eq!(vault.max_count, Some(dec!(100)));
    assert_eq!(vault.min_count, Some(dec!(-5)));
    assert_close(restored.params.ticks_per_sec, 4.0);
    assert_eq!(restored.last_saved, 1_000);
    assert_eq!(restored.last_loaded, 2_000);
}

#[test]
fn dry_partial_previews_are_repeatable() {
    let mut registry = Registry::default();
    let r1 = seeded(&mut registry, "r1", dec!(4));
    let r2 = seeded(&mut registry, "r2", dec!(0));
    priced_in(&mut registry, r2, "r1");

    let first = registry.can_buy(r2, PurchaseAmount::Fixed(dec!(10)), dec!(1), None);
    let second = registry.can_buy(r2, PurchaseAmount::Fixed(dec!(10)), dec!(1), None);
    let third = registry.buy(
        r2,
        PurchaseAmount::Fixed(dec!(10)),
        PurchaseStyle::DryPartial,
        &PurchaseOptions::default(),
    );

    assert_eq!(first, second);
    assert_eq!(first, third);
    assert_eq!(first.count, dec!(4));
    assert_eq!(registry.get(r1).count(), dec!(4));
    assert_eq!(registry.get(r2).count(), dec!(0));
}

#[test]
fn overflowed_quantities_are_rejected_as_non_finite() {
    assert_eq!(decimal_from_f64(1e29), None);

    let mut registry = Registry::default();
    let coin = seeded(&mut registry, "coin", dec!(10));
    let saturated = seeded(&mut registry, "saturated", Decimal::MAX);
    priced_in(&mut registry, saturated, "coin");
    let range = PurchaseAmount::Range(PurchaseRange {
        min_amount: dec!(1),
        max_amount: dec!(5),
        increments: dec!(1),
    });
    let options = PurchaseOptions::default();
    assert!(!buy(&mut registry, "saturated", dec!(1), PurchaseStyle::Partial));
    assert!(registry.buy(saturated, range, PurchaseStyle::Partial, &options).is_none());
    assert!(registry.award(saturated, PurchaseAmount::Fixed(dec!(1))).is_none());
    assert_eq!(registry.get(coin).count(), dec!(10));

    // A unit price at the top of the range saturates the running total.
    let pricey = registry.get_or_create("pricey");
    registry.get_mut(pricey).hooks.purchase_cost = Some(Hook::<PurchaseCostFn>::new(|_, _, _| {
        Ok(vec![Cost::new("coin", Decimal::MAX)])
    }));
    assert!(!buy(&mut registry, "pricey", dec!(2), PurchaseStyle::Full));
    let scaled = PurchaseOptions::with_factors(dec!(1), dec!(2));
    assert!(
        registry
            .buy(pricey, PurchaseAmount::Fixed(dec!(1)), PurchaseStyle::DryFull, &scaled)
            .is_none()
    );

    // A hook that detects overflow itself rejects the purchase.
    let failing = registry.get_or_create("failing");
    registry.get_mut(failing).hooks.purchase_cost = Some(Hook::<PurchaseCostFn>::new(|_, _, n| {
        Err(HookError::Eval(format!("price of unit {n} overflows")))
    }));
    assert!(buy(&mut registry, "failing", dec!(1), PurchaseStyle::Free));
    assert!(!buy(&mut registry, "failing", dec!(1), PurchaseStyle::Full));
    assert_eq!(registry.get(coin).count(), dec!(10));
}

#[test]
fn production_saturates_at_the_top_of_the_range() {
    let mut registry = Registry::default();
    let ore = registry.get_or_create("ore");
    registry.get_mut(ore).hooks.on_tick = Some(Hook::<OnTickFn>::new(|registry, id, _, source| {
        let next = registry.get(id).count().saturating_add(Decimal::MAX);
        registry.set_value(id, next, source);
        Ok(())
    }));

    let mut deltas = TickDeltas::default();
    for _ in 0..3 {
        deltas = registry.tick_all(0.25, TIMER_SOURCE, deltas);
    }

    assert_eq!(registry.get(ore).count(), Decimal::MAX);
    assert_eq!(deltas.get("ore"), Some(Decimal::MAX));
    assert!(registry.award(ore, PurchaseAmount::Fixed(dec!(1))).is_none());
}

