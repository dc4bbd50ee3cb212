//! Per-minute rate arithmetic for a single recipe

use crate::error::CalcError;
use crate::models::{ItemAmount, Recipe};

/// Relative distance from an integer within which a multiplier counts as
/// that integer, so float noise such as `3.0000000000000004` does not add a
/// fourth machine while `3.0000000005` still does.
const WHOLE_MACHINE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct RateResult {
    pub machine_count: u64,
    /// Target rate divided by one machine's output at 100% clock
    pub multiplier: f64,
    pub per_minute_per_machine: f64,
    /// Ingredient demand per minute, in ingredient order
    pub input_rates: Vec<(String, f64)>,
    /// Other products emitted at the same multiplier
    pub byproduct_rates: Vec<(String, f64)>,
}

/// Units per minute one machine moves for `amount` units per cycle
pub fn per_minute(amount: u32, duration_seconds: f64) -> f64 {
    f64::from(amount) * 60.0 / duration_seconds
}

/// Machines and input demand needed for `recipe` to output `item` at
/// `target_rate_per_minute`.
///
/// Input rates scale with the continuous multiplier, not with the rounded
/// machine count: they track the requested rate exactly.
pub fn machines_and_inputs(
    recipe: &Recipe,
    item: &str,
    target_rate_per_minute: f64,
) -> Result<RateResult, CalcError> {
    if !(target_rate_per_minute.is_finite() && target_rate_per_minute > 0.0) {
        return Err(CalcError::InvalidTargetRate(target_rate_per_minute));
    }

    let produced_per_cycle =
        recipe
            .product_amount(item)
            .ok_or_else(|| CalcError::ProductNotInRecipe {
                recipe: recipe.class_id.clone(),
                item: item.to_string(),
            })?;

    let per_minute_per_machine = per_minute(produced_per_cycle, recipe.duration_seconds);
    if !(per_minute_per_machine.is_finite() && per_minute_per_machine > 0.0) {
        return Err(CalcError::DivideByZero {
            recipe: recipe.class_id.clone(),
            item: item.to_string(),
        });
    }

    let multiplier = target_rate_per_minute / per_minute_per_machine;
    let machine_count = whole_machines(multiplier);

    let scaled = |lines: &[ItemAmount], skip: Option<&str>| {
        let mut rates: Vec<(String, f64)> = Vec::new();
        for line in lines {
            if Some(line.item_class_id.as_str()) == skip {
                continue;
            }
            let rate = per_minute(line.amount, recipe.duration_seconds) * multiplier;
            match rates.iter_mut().find(|(id, _)| *id == line.item_class_id) {
                Some((_, total)) => *total += rate,
                None => rates.push((line.item_class_id.clone(), rate)),
            }
        }
        rates
    };

    Ok(RateResult {
        machine_count,
        multiplier,
        per_minute_per_machine,
        input_rates: scaled(&recipe.ingredients, None),
        byproduct_rates: scaled(&recipe.products, Some(item)),
    })
}

/// `ceil(multiplier)`, ignoring float noise just above an integer. Any
/// positive demand needs at least one machine.
fn whole_machines(multiplier: f64) -> u64 {
    let nearest = multiplier.round();
    let noise = WHOLE_MACHINE_EPSILON * nearest.abs().max(1.0);
    let count = if (multiplier - nearest).abs() <= noise {
        nearest
    } else {
        multiplier.ceil()
    };
    count.max(1.0) as u64
}
