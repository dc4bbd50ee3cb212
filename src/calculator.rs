//! Production chain calculator logic

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::config::ResolveOptions;
use crate::error::CalcError;
use crate::models::{
    Chain, InputRate, ProductionStep, Recipe, Terminal, TerminalReason,
};
use crate::rates::machines_and_inputs;

struct Pending {
    item: String,
    rate: f64,
    depth: usize,
}

/// Calculate the production steps for `root` at `target_rate` per minute.
///
/// Steps come out depth-first, pre-order, following ingredient order. Empty
/// when nothing produces the root item.
pub fn resolve(
    catalog: &Catalog,
    root: &str,
    target_rate: f64,
    options: &ResolveOptions,
) -> Result<Vec<ProductionStep>, CalcError> {
    resolve_chain(catalog, root, target_rate, options).map(|chain| chain.steps)
}

/// Like [`resolve`], but also reports where each branch stopped.
///
/// Uses an explicit work stack, so adversarial recipe graphs cannot
/// overflow the call stack. `visited` lives for this call only.
pub fn resolve_chain(
    catalog: &Catalog,
    root: &str,
    target_rate: f64,
    options: &ResolveOptions,
) -> Result<Chain, CalcError> {
    if !(target_rate.is_finite() && target_rate > 0.0) {
        return Err(CalcError::InvalidTargetRate(target_rate));
    }

    let mut chain = Chain::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack = vec![Pending {
        item: root.to_string(),
        rate: target_rate,
        depth: 0,
    }];

    while let Some(Pending { item, rate, depth }) = stack.pop() {
        let terminal = |reason| Terminal {
            item_name: catalog.item_name(&item).to_string(),
            item_class_id: item.clone(),
            rate_per_minute: rate,
            depth,
            reason,
        };

        if visited.contains(&item) {
            chain.terminals.push(terminal(TerminalReason::AlreadyVisited));
            continue;
        }
        if depth > options.max_depth {
            debug!(item = %item, depth, "depth limit reached");
            chain.terminals.push(terminal(TerminalReason::DepthLimit));
            continue;
        }
        if !(rate.is_finite() && rate > 0.0) {
            warn!(item = %item, rate, "demand out of range, branch not expanded");
            chain.terminals.push(terminal(TerminalReason::RateOutOfRange));
            continue;
        }
        visited.insert(item.clone());

        let recipe = match choose_recipe(catalog, &item, options) {
            Ok(recipe) => recipe,
            Err(CalcError::RecipeNotFound { .. }) => {
                chain.terminals.push(terminal(TerminalReason::BaseResource));
                continue;
            }
            Err(e) => return Err(e),
        };

        let rates = machines_and_inputs(recipe, &item, rate)?;
        if !rates.multiplier.is_finite() {
            warn!(item = %item, rate, recipe = %recipe.class_id, "machine count out of range");
            chain.terminals.push(terminal(TerminalReason::RateOutOfRange));
            continue;
        }
        let named = |lines: &[(String, f64)]| -> Vec<InputRate> {
            lines
                .iter()
                .map(|(id, r)| InputRate {
                    item_class_id: id.clone(),
                    item_name: catalog.item_name(id).to_string(),
                    rate_per_minute: *r,
                })
                .collect()
        };

        let machine_class_id = catalog.machine_for(recipe).map(str::to_string);
        let machine_name = match &machine_class_id {
            Some(id) => catalog.machine_name(id).to_string(),
            None => "(hand crafted)".to_string(),
        };

        for (input, input_rate) in rates.input_rates.iter().rev() {
            stack.push(Pending {
                item: input.clone(),
                rate: *input_rate,
                depth: depth + 1,
            });
        }

        chain.steps.push(ProductionStep {
            item_name: catalog.item_name(&item).to_string(),
            recipe_id: recipe.class_id.clone(),
            recipe_name: recipe.display_name.clone(),
            machine_class_id,
            machine_name,
            machines_required: rates.machine_count,
            multiplier: rates.multiplier,
            target_rate: rate,
            depth,
            input_rates: named(&rates.input_rates),
            byproducts: named(&rates.byproduct_rates),
            item_class_id: item,
        });
    }

    Ok(chain)
}

/// A pinned recipe wins when it exists and produces the item; otherwise the
/// ranked selection applies.
fn choose_recipe<'a>(
    catalog: &'a Catalog,
    item: &str,
    options: &ResolveOptions,
) -> Result<&'a Recipe, CalcError> {
    if let Some(pinned) = options.pins.get(item) {
        match catalog.index().recipe(pinned) {
            Some(recipe) if recipe.produces(item) => return Ok(recipe),
            Some(_) => warn!(item, recipe = %pinned, "pinned recipe does not produce item, ignoring"),
            None => warn!(item, recipe = %pinned, "pinned recipe not found, ignoring"),
        }
    }
    catalog.index().select_recipe(item, options.allow_alternates)
}

/// Format a production chain as an indented tree
pub fn format_production_chain(catalog: &Catalog, chain: &Chain) -> String {
    let mut output = String::new();

    for step in &chain.steps {
        let prefix = "  ".repeat(step.depth);
        output.push_str(&format!(
            "{}{}x {} -> {} @ {:.2}/min ({})\n",
            prefix,
            step.machines_required,
            step.machine_name,
            step.item_name,
            step.target_rate,
            step.recipe_name
        ));

        for input in &step.input_rates {
            let marker = if catalog.index().has_recipe(&input.item_class_id) {
                ""
            } else {
                " (base resource)"
            };
            output.push_str(&format!(
                "{}  needs {} @ {:.2}/min{}\n",
                prefix, input.item_name, input.rate_per_minute, marker
            ));
        }
        for byproduct in &step.byproducts {
            output.push_str(&format!(
                "{}  also yields {} @ {:.2}/min\n",
                prefix, byproduct.item_name, byproduct.rate_per_minute
            ));
        }
    }

    output
}

/// Summary of a production chain calculation
#[derive(Debug)]
pub struct ChainSummary {
    pub target_item: String,
    pub target_rate: f64,
    pub machine_counts: Vec<(String, u64)>,
    pub base_resources: Vec<(String, f64)>,
    pub byproducts: Vec<(String, f64)>,
    /// Demand that was not expanded: the item was already planned, lay
    /// beyond the depth limit, or its rate left the `f64` range
    pub unexpanded: Vec<(String, f64)>,
}

/// Generate a summary of the production chain
pub fn summarize_chain(chain: &Chain, target_item: &str, target_rate: f64) -> ChainSummary {
    let mut machines: BTreeMap<String, u64> = BTreeMap::new();
    let mut byproducts: BTreeMap<String, f64> = BTreeMap::new();
    let mut base: BTreeMap<String, f64> = BTreeMap::new();
    let mut unexpanded: BTreeMap<String, f64> = BTreeMap::new();

    for step in &chain.steps {
        *machines.entry(step.machine_name.clone()).or_default() += step.machines_required;
        for b in &step.byproducts {
            *byproducts.entry(b.item_name.clone()).or_default() += b.rate_per_minute;
        }
    }

    // A base resource demanded by several branches shows up once as
    // BaseResource and afterwards as AlreadyVisited; both count as raw demand.
    let base_items: HashSet<&str> = chain
        .terminals
        .iter()
        .filter(|t| t.reason == TerminalReason::BaseResource)
        .map(|t| t.item_class_id.as_str())
        .collect();

    for terminal in &chain.terminals {
        let bucket = if base_items.contains(terminal.item_class_id.as_str()) {
            &mut base
        } else {
            &mut unexpanded
        };
        *bucket.entry(terminal.item_name.clone()).or_default() += terminal.rate_per_minute;
    }

    ChainSummary {
        target_item: target_item.to_string(),
        target_rate,
        machine_counts: machines.into_iter().collect(),
        base_resources: base.into_iter().collect(),
        byproducts: byproducts.into_iter().collect(),
        unexpanded: unexpanded.into_iter().collect(),
    }
}

impl std::fmt::Display for ChainSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Production Summary ===")?;
        writeln!(f, "Target: {} @ {:.2}/min", self.target_item, self.target_rate)?;
        writeln!(f)?;

        writeln!(f, "Machines required:")?;
        for (name, count) in &self.machine_counts {
            writeln!(f, "  {}x {}", count, name)?;
        }
        writeln!(f)?;

        writeln!(f, "Base resources required:")?;
        for (name, rate) in &self.base_resources {
            writeln!(f, "  {} @ {:.2}/min", name, rate)?;
        }

        if !self.byproducts.is_empty() {
            writeln!(f)?;
            writeln!(f, "Byproducts:")?;
            for (name, rate) in &self.byproducts {
                writeln!(f, "  {} @ {:.2}/min", name, rate)?;
            }
        }

        if !self.unexpanded.is_empty() {
            writeln!(f)?;
            writeln!(f, "Not expanded:")?;
            for (name, rate) in &self.unexpanded {
                writeln!(f, "  {} @ {:.2}/min", name, rate)?;
            }
        }

        Ok(())
    }
}
