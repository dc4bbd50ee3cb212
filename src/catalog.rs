//! Immutable reference data shared by every resolution request

use std::collections::HashMap;

use crate::index::RecipeIndex;
use crate::models::{Item, Machine, Recipe};

/// Items, machines and the recipe index, built once from a dump or the
/// database and then only read. Pass it by reference into the resolver.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: HashMap<String, Item>,
    machines: HashMap<String, Machine>,
    index: RecipeIndex,
}

impl Catalog {
    pub fn new(
        items: impl IntoIterator<Item = Item>,
        machines: impl IntoIterator<Item = Machine>,
        recipes: impl IntoIterator<Item = Recipe>,
    ) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.class_id.clone(), i)).collect(),
            machines: machines
                .into_iter()
                .map(|m| (m.class_id.clone(), m))
                .collect(),
            index: RecipeIndex::build(recipes),
        }
    }

    pub fn index(&self) -> &RecipeIndex {
        &self.index
    }

    pub fn item(&self, class_id: &str) -> Option<&Item> {
        self.items.get(class_id)
    }

    pub fn machine(&self, class_id: &str) -> Option<&Machine> {
        self.machines.get(class_id)
    }

    /// Display name of an item, or its class id when the dump had none
    pub fn item_name<'a>(&'a self, class_id: &'a str) -> &'a str {
        self.item(class_id)
            .map(|i| i.display_name.as_str())
            .unwrap_or(class_id)
    }

    pub fn machine_name<'a>(&'a self, class_id: &'a str) -> &'a str {
        self.machine(class_id)
            .map(|m| m.display_name.as_str())
            .unwrap_or(class_id)
    }

    /// Items sorted by display name
    pub fn items(&self) -> Vec<&Item> {
        let mut items: Vec<_> = self.items.values().collect();
        items.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.class_id.cmp(&b.class_id))
        });
        items
    }

    /// Machines sorted by display name
    pub fn machines(&self) -> Vec<&Machine> {
        let mut machines: Vec<_> = self.machines.values().collect();
        machines.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.class_id.cmp(&b.class_id))
        });
        machines
    }

    /// The machine a recipe runs in: its first known manufacturer, else the
    /// first listed producer (workbench, build gun), else none.
    pub fn machine_for<'a>(&self, recipe: &'a Recipe) -> Option<&'a str> {
        recipe
            .produced_in
            .iter()
            .find(|id| self.machines.contains_key(id.as_str()))
            .or_else(|| recipe.produced_in.first())
            .map(String::as_str)
    }

    /// Resolve user input to an item class id.
    ///
    /// Exact class ids win; otherwise display names are matched
    /// case-insensitively, lowest class id first.
    pub fn find_item(&self, query: &str) -> Option<String> {
        let query = query.trim();
        if self.items.contains_key(query) || self.index.has_recipe(query) {
            return Some(query.to_string());
        }

        let mut matches: Vec<&Item> = self
            .items
            .values()
            .filter(|i| i.display_name.eq_ignore_ascii_case(query))
            .collect();
        matches.sort_by(|a, b| a.class_id.cmp(&b.class_id));
        matches.first().map(|i| i.class_id.clone())
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }
}
