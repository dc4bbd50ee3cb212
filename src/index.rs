//! Product -> recipe index with deterministic ranking

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::error::CalcError;
use crate::models::Recipe;

/// Maps each produced item to the recipes that list it as a product.
///
/// Buckets are ranked: standard recipes before alternates, then fewer
/// ingredients first, then by recipe class id. Built once, read-only after.
#[derive(Debug, Clone, Default)]
pub struct RecipeIndex {
    recipes: Vec<Recipe>,
    by_class_id: HashMap<String, usize>,
    by_product: BTreeMap<String, Vec<usize>>,
}

impl RecipeIndex {
    /// Build the index. A class id seen twice keeps its last definition.
    /// Recipes without a positive duration, without products, or with a zero
    /// amount are dropped.
    pub fn build(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        let mut index = RecipeIndex::default();

        for recipe in recipes {
            if !is_usable(&recipe) {
                warn!(recipe = %recipe.class_id, "dropping recipe that cannot run");
                continue;
            }
            match index.by_class_id.get(&recipe.class_id) {
                Some(&slot) => index.recipes[slot] = recipe,
                None => {
                    index
                        .by_class_id
                        .insert(recipe.class_id.clone(), index.recipes.len());
                    index.recipes.push(recipe);
                }
            }
        }

        for (slot, recipe) in index.recipes.iter().enumerate() {
            for product in &recipe.products {
                let bucket = index
                    .by_product
                    .entry(product.item_class_id.clone())
                    .or_default();
                if !bucket.contains(&slot) {
                    bucket.push(slot);
                }
            }
        }

        let recipes = &index.recipes;
        for bucket in index.by_product.values_mut() {
            bucket.sort_by(|&a, &b| rank(&recipes[a], &recipes[b]));
        }

        index
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn recipe(&self, class_id: &str) -> Option<&Recipe> {
        self.by_class_id.get(class_id).map(|&slot| &self.recipes[slot])
    }

    /// Ranked candidates for `item`; empty when nothing produces it
    pub fn candidates<'a>(&'a self, item: &str) -> impl Iterator<Item = &'a Recipe> + 'a {
        self.by_product
            .get(item)
            .into_iter()
            .flatten()
            .map(|&slot| &self.recipes[slot])
    }

    pub fn has_recipe(&self, item: &str) -> bool {
        self.by_product.contains_key(item)
    }

    /// Item class ids that at least one recipe produces, sorted
    pub fn producible_items(&self) -> impl Iterator<Item = &str> {
        self.by_product.keys().map(String::as_str)
    }

    /// Pick the recipe used to produce `item`.
    ///
    /// With `allow_alternates` false, alternate recipes are filtered out. If
    /// that leaves nothing, selection falls back to the full candidate list:
    /// an item only craftable through alternates still resolves.
    pub fn select_recipe(&self, item: &str, allow_alternates: bool) -> Result<&Recipe, CalcError> {
        let not_found = || CalcError::RecipeNotFound {
            item: item.to_string(),
        };
        let first = self.candidates(item).next().ok_or_else(not_found)?;
        if allow_alternates {
            return Ok(first);
        }

        match self.candidates(item).find(|r| !r.is_alternate) {
            Some(recipe) => Ok(recipe),
            None => {
                debug!(
                    item,
                    recipe = %first.class_id,
                    "only alternate recipes produce item, falling back"
                );
                Ok(first)
            }
        }
    }
}

fn is_usable(recipe: &Recipe) -> bool {
    recipe.duration_seconds.is_finite()
        && recipe.duration_seconds > 0.0
        && !recipe.products.is_empty()
        && recipe
            .ingredients
            .iter()
            .chain(&recipe.products)
            .all(|line| line.amount > 0)
}

fn rank(a: &Recipe, b: &Recipe) -> Ordering {
    a.is_alternate
        .cmp(&b.is_alternate)
        .then_with(|| a.ingredients.len().cmp(&b.ingredients.len()))
        .then_with(|| a.class_id.cmp(&b.class_id))
}
