//! Data models for Satisfactory items, machines, recipes and production steps

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub class_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Machine {
    pub class_id: String,
    pub display_name: String,
}

/// One ingredient or product line of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemAmount {
    pub item_class_id: String,
    pub amount: u32,
}

impl ItemAmount {
    pub fn new(item_class_id: impl Into<String>, amount: u32) -> Self {
        Self {
            item_class_id: item_class_id.into(),
            amount,
        }
    }
}

/// A validated recipe. Construct through the index builder or [`Recipe::new`];
/// `duration_seconds > 0` and a non-empty product list are guaranteed by the
/// builder, not by this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub class_id: String,
    pub display_name: String,
    pub duration_seconds: f64,
    pub ingredients: Vec<ItemAmount>,
    pub products: Vec<ItemAmount>,
    pub produced_in: Vec<String>,
    pub is_alternate: bool,
}

impl Recipe {
    pub fn new(class_id: impl Into<String>, duration_seconds: f64) -> Self {
        let class_id = class_id.into();
        Self {
            display_name: class_id.clone(),
            is_alternate: is_alternate_name(&class_id, ""),
            class_id,
            duration_seconds,
            ingredients: Vec::new(),
            products: Vec::new(),
            produced_in: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self.is_alternate = is_alternate_name(&self.class_id, &self.display_name);
        self
    }

    pub fn with_ingredient(mut self, item: impl Into<String>, amount: u32) -> Self {
        self.ingredients.push(ItemAmount::new(item, amount));
        self
    }

    pub fn with_product(mut self, item: impl Into<String>, amount: u32) -> Self {
        self.products.push(ItemAmount::new(item, amount));
        self
    }

    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.produced_in.push(machine.into());
        self
    }

    pub fn alternate(mut self, is_alternate: bool) -> Self {
        self.is_alternate = is_alternate;
        self
    }

    /// Amount of `item` produced per cycle, if this recipe produces it
    pub fn product_amount(&self, item: &str) -> Option<u32> {
        let total: u32 = self
            .products
            .iter()
            .filter(|p| p.item_class_id == item)
            .map(|p| p.amount)
            .sum();
        (total > 0).then_some(total)
    }

    pub fn produces(&self, item: &str) -> bool {
        self.products.iter().any(|p| p.item_class_id == item)
    }
}

/// Alternate recipes are tagged in the class name (`Recipe_Alternate_*`) and
/// in the display name (`Alternate: ...`).
pub fn is_alternate_name(class_id: &str, display_name: &str) -> bool {
    class_id.contains("Alternate") || display_name.starts_with("Alternate")
}

/// Per-minute demand for one input of a production step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputRate {
    pub item_class_id: String,
    pub item_name: String,
    pub rate_per_minute: f64,
}

/// One node of a resolved production chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionStep {
    pub item_class_id: String,
    pub item_name: String,
    pub recipe_id: String,
    pub recipe_name: String,
    pub machine_class_id: Option<String>,
    pub machine_name: String,
    pub machines_required: u64,
    pub multiplier: f64,
    pub target_rate: f64,
    pub depth: usize,
    pub input_rates: Vec<InputRate>,
    pub byproducts: Vec<InputRate>,
}

/// Why a branch of the chain stopped expanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// No recipe produces the item
    BaseResource,
    AlreadyVisited,
    DepthLimit,
    /// Demand overflowed or underflowed `f64` on the way down
    RateOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Terminal {
    pub item_class_id: String,
    pub item_name: String,
    pub rate_per_minute: f64,
    pub depth: usize,
    pub reason: TerminalReason,
}

/// Result of a chain resolution: emitted steps in pre-order plus every point
/// where a branch ended
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Chain {
    pub steps: Vec<ProductionStep>,
    pub terminals: Vec<Terminal>,
}
