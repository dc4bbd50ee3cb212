//! Extraction of items, machines and recipes from a Satisfactory dump
//!
//! The dump is a JSON array of `{ "NativeClass": ..., "Classes": [...] }`
//! blocks. Blocks are routed by tag; recipe fields that arrive as engine
//! property strings go through [`PropertyDecoder`]. Bad entries are counted
//! and sampled instead of aborting the load.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::config::TagConfig;
use crate::error::{DecodeError, DecodeReason, LoadError, RecipeError};
use crate::models::{is_alternate_name, Item, ItemAmount, Machine, Recipe};
use crate::property::{Amount, Decoded, PropertyDecoder};

const MAX_SAMPLES: usize = 5;

#[derive(Debug, Deserialize)]
struct DumpBlock {
    #[serde(rename = "NativeClass", alias = "NativeClassTag", default)]
    native_class: String,
    #[serde(rename = "Classes", default)]
    classes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawNamed {
    #[serde(rename = "ClassName")]
    class_name: String,
    #[serde(rename = "mDisplayName", alias = "DisplayName", default)]
    display_name: Option<String>,
}

impl RawNamed {
    fn display_name(&self) -> String {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.class_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRecipe {
    #[serde(rename = "ClassName", default)]
    class_name: Option<String>,
    #[serde(rename = "mDisplayName", alias = "DisplayName", default)]
    display_name: Option<String>,
    #[serde(rename = "mManufactoringDuration", alias = "Duration", default)]
    duration: Option<Scalar>,
    #[serde(rename = "mIngredients", alias = "Ingredients", default)]
    ingredients: Option<AmountList>,
    #[serde(rename = "mProduct", alias = "Products", default)]
    products: Option<AmountList>,
    #[serde(rename = "mProducedIn", alias = "ProducedIn", default)]
    produced_in: Option<RefList>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AmountList {
    Structured(Vec<RawAmount>),
    Encoded(String),
}

#[derive(Debug, Deserialize)]
struct RawAmount {
    #[serde(rename = "ItemClass", default)]
    item_class: Option<String>,
    #[serde(rename = "Amount", default)]
    amount: Option<Scalar>,
}

impl RawAmount {
    fn fragment(&self) -> String {
        let amount = match &self.amount {
            Some(Scalar::Number(n)) => n.to_string(),
            Some(Scalar::Text(s)) => s.clone(),
            None => String::new(),
        };
        format!(
            "(ItemClass={},Amount={})",
            self.item_class.as_deref().unwrap_or_default(),
            amount
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RefList {
    Many(Vec<String>),
    Encoded(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Item,
    Recipe,
    Machine,
}

/// Counters collected while building the catalog
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractStats {
    pub files: usize,
    pub items: usize,
    pub machines: usize,
    pub recipes: usize,
    pub excluded_recipes: usize,
    pub decode_errors: usize,
    pub ignored_blocks: usize,
    pub skipped_entries: usize,
    /// First few offending fragments, for diagnostics
    pub samples: Vec<String>,
}

impl ExtractStats {
    fn sample(&mut self, message: String) {
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(message);
        }
    }
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Extracted {} items, {} machines, {} recipes from {} file(s). Excluded recipes: {}, decode errors: {}, skipped entries: {}, ignored blocks: {}",
            self.items,
            self.machines,
            self.recipes,
            self.files,
            self.excluded_recipes,
            self.decode_errors,
            self.skipped_entries,
            self.ignored_blocks
        )?;
        for sample in &self.samples {
            write!(f, "\n  {}", sample)?;
        }
        Ok(())
    }
}

/// Single-pass builder from dump blocks to a [`Catalog`]
pub struct EntityIndexBuilder {
    decoder: PropertyDecoder,
    item_tags: HashSet<String>,
    recipe_tags: HashSet<String>,
    machine_tags: HashSet<String>,
    items: Vec<Item>,
    machines: Vec<Machine>,
    recipes: Vec<Recipe>,
    stats: ExtractStats,
}

impl EntityIndexBuilder {
    pub fn new(tags: &TagConfig) -> Result<Self, LoadError> {
        let decoder = PropertyDecoder::new()?;
        let normalize = |tags: &[String]| -> HashSet<String> {
            tags.iter().map(|t| decoder.class_name(t)).collect()
        };
        let item_tags = normalize(&tags.items);
        let recipe_tags = normalize(&tags.recipes);
        let machine_tags = normalize(&tags.machines);

        Ok(Self {
            decoder,
            item_tags,
            recipe_tags,
            machine_tags,
            items: Vec::new(),
            machines: Vec::new(),
            recipes: Vec::new(),
            stats: ExtractStats::default(),
        })
    }

    /// Add one dump file. Missing files and invalid JSON are fatal.
    pub fn add_file(&mut self, path: &Path) -> Result<(), LoadError> {
        info!(path = %path.display(), "reading dump");
        let content = read_dump_text(path)?;
        self.add_dump_str(&content, path)
    }

    /// Add the blocks of one dump document; `source` is used in errors only
    pub fn add_dump_str(&mut self, json: &str, source: &Path) -> Result<(), LoadError> {
        let blocks: Vec<DumpBlock> =
            serde_json::from_str(json).map_err(|e| LoadError::Json {
                path: source.to_path_buf(),
                source: e,
            })?;
        self.stats.files += 1;

        for block in blocks {
            let Some(category) = self.categorize(&block.native_class) else {
                debug!(tag = %block.native_class, "ignoring block");
                self.stats.ignored_blocks += 1;
                continue;
            };
            for entry in block.classes {
                self.add_entry(category, entry);
            }
        }
        Ok(())
    }

    pub fn finish(self) -> (Catalog, ExtractStats) {
        let mut stats = self.stats;
        let catalog = Catalog::new(self.items, self.machines, self.recipes);
        stats.items = catalog.item_count();
        stats.machines = catalog.machine_count();
        stats.recipes = catalog.index().len();
        info!(
            items = stats.items,
            machines = stats.machines,
            recipes = stats.recipes,
            excluded = stats.excluded_recipes,
            "catalog built"
        );
        (catalog, stats)
    }

    fn categorize(&self, tag: &str) -> Option<Category> {
        let name = self.decoder.class_name(tag);
        if self.recipe_tags.contains(&name) {
            Some(Category::Recipe)
        } else if self.machine_tags.contains(&name) {
            Some(Category::Machine)
        } else if self.item_tags.contains(&name) {
            Some(Category::Item)
        } else {
            None
        }
    }

    fn add_entry(&mut self, category: Category, entry: Value) {
        match category {
            Category::Item | Category::Machine => {
                let raw: RawNamed = match serde_json::from_value(entry) {
                    Ok(raw) => raw,
                    Err(e) => {
                        self.stats.skipped_entries += 1;
                        self.stats.sample(format!("skipped entry: {}", e));
                        return;
                    }
                };
                let display_name = raw.display_name();
                if category == Category::Item {
                    self.items.push(Item {
                        class_id: raw.class_name,
                        display_name,
                    });
                } else {
                    self.machines.push(Machine {
                        class_id: raw.class_name,
                        display_name,
                    });
                }
            }
            Category::Recipe => {
                let built = serde_json::from_value::<RawRecipe>(entry)
                    .map_err(|e| RecipeError::Malformed(e.to_string()))
                    .and_then(|raw| self.build_recipe(raw));
                match built {
                    Ok(recipe) => self.recipes.push(recipe),
                    Err(e) => {
                        warn!("excluding recipe: {}", e);
                        self.stats.excluded_recipes += 1;
                        self.stats.sample(e.to_string());
                    }
                }
            }
        }
    }

    fn build_recipe(&mut self, raw: RawRecipe) -> Result<Recipe, RecipeError> {
        let class_id = raw
            .class_name
            .filter(|c| !c.trim().is_empty())
            .ok_or(RecipeError::MissingClassName)?;

        let duration_seconds = match &raw.duration {
            Some(Scalar::Number(n)) => Some(*n),
            Some(Scalar::Text(s)) => s.trim().parse::<f64>().ok(),
            None => None,
        }
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| RecipeError::InvalidDuration {
            recipe: class_id.clone(),
            duration: match &raw.duration {
                Some(Scalar::Number(n)) => n.to_string(),
                Some(Scalar::Text(s)) => s.clone(),
                None => "missing".to_string(),
            },
        })?;

        let ingredients = self.amount_lines(&class_id, raw.ingredients.as_ref())?;
        let products = self.amount_lines(&class_id, raw.products.as_ref())?;
        if products.is_empty() {
            return Err(RecipeError::NoProducts { recipe: class_id });
        }

        let produced_in = match raw.produced_in {
            Some(RefList::Many(refs)) => refs
                .iter()
                .map(|r| self.decoder.class_name(r))
                .filter(|r| !r.is_empty())
                .collect(),
            Some(RefList::Encoded(text)) => {
                let decoded = self.decoder.decode_reference_list(&text);
                self.note_decode_errors(&class_id, &decoded.errors);
                decoded.values
            }
            None => Vec::new(),
        };

        let display_name = match raw.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => class_id.clone(),
        };

        Ok(Recipe {
            is_alternate: is_alternate_name(&class_id, &display_name),
            class_id,
            display_name,
            duration_seconds,
            ingredients,
            products,
            produced_in,
        })
    }

    /// Turn an ingredient or product field into typed lines.
    ///
    /// Elements that fail to decode are dropped and counted; an element that
    /// decodes but carries a non-positive or non-integer amount rejects the
    /// whole recipe.
    fn amount_lines(
        &mut self,
        recipe: &str,
        field: Option<&AmountList>,
    ) -> Result<Vec<ItemAmount>, RecipeError> {
        let mut raw_lines: Vec<(String, Amount)> = Vec::new();

        match field {
            None => {}
            Some(AmountList::Structured(entries)) => {
                let mut errors = Vec::new();
                for entry in entries {
                    let item = entry
                        .item_class
                        .as_deref()
                        .map(|c| self.decoder.class_name(c))
                        .filter(|c| !c.is_empty());
                    let Some(item) = item else {
                        errors.push(DecodeError::new(
                            DecodeReason::MissingField("ItemClass"),
                            entry.fragment(),
                        ));
                        continue;
                    };
                    let amount = match &entry.amount {
                        Some(Scalar::Number(n)) => Amount::from_number(*n),
                        Some(Scalar::Text(s)) => Amount::parse(s),
                        None => {
                            errors.push(DecodeError::new(
                                DecodeReason::MissingField("Amount"),
                                entry.fragment(),
                            ));
                            continue;
                        }
                    };
                    raw_lines.push((item, amount));
                }
                self.note_decode_errors(recipe, &errors);
            }
            Some(AmountList::Encoded(text)) => {
                let Decoded { values, mut errors } = self.decoder.decode(text);
                for record in values {
                    let fragment = || {
                        record
                            .fields
                            .iter()
                            .map(|(k, v)| format!("{}={}", k, v))
                            .collect::<Vec<_>>()
                            .join(",")
                    };
                    let Some(item) = record.get("ItemClass") else {
                        errors.push(DecodeError::new(
                            DecodeReason::MissingField("ItemClass"),
                            fragment(),
                        ));
                        continue;
                    };
                    let Some(amount) = record.get("Amount") else {
                        errors.push(DecodeError::new(
                            DecodeReason::MissingField("Amount"),
                            fragment(),
                        ));
                        continue;
                    };
                    raw_lines.push((item.to_string(), Amount::from(amount)));
                }
                self.note_decode_errors(recipe, &errors);
            }
        }

        raw_lines
            .into_iter()
            .map(|(item, amount)| match amount.positive() {
                Some(n) => Ok(ItemAmount::new(item, n)),
                None => Err(RecipeError::InvalidAmount {
                    recipe: recipe.to_string(),
                    item,
                    amount: amount.to_string(),
                }),
            })
            .collect()
    }

    fn note_decode_errors(&mut self, recipe: &str, errors: &[DecodeError]) {
        for e in errors {
            debug!(recipe, error = %e, "property element skipped");
            self.stats.decode_errors += 1;
            self.stats.sample(format!("{}: {}", recipe, e));
        }
    }
}

/// Read a dump, accepting UTF-8 (with or without BOM) and UTF-16 with BOM.
/// The game writes its docs file as UTF-16LE.
pub fn read_dump_text(path: &Path) -> Result<String, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let encoding_error = || LoadError::Encoding {
        path: path.to_path_buf(),
    };

    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(rest.to_vec()).map_err(|_| encoding_error());
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes).ok_or_else(encoding_error);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes).ok_or_else(encoding_error);
    }
    String::from_utf8(bytes).map_err(|_| encoding_error())
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

/// Find all `*.json` dump files under a directory, in path order
pub fn find_dump_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(LoadError::NoDumpFiles(dir.to_path_buf()));
    }
    Ok(files)
}

/// Load a dump file, or every dump file under a directory, into a catalog.
/// Later files replace earlier definitions with the same class id.
pub fn load_dump(path: &Path, tags: &TagConfig) -> Result<(Catalog, ExtractStats), LoadError> {
    let mut builder = EntityIndexBuilder::new(tags)?;

    if path.is_dir() {
        let files = find_dump_files(path)?;
        info!(count = files.len(), dir = %path.display(), "found dump files");
        for file in &files {
            builder.add_file(file)?;
        }
    } else {
        builder.add_file(path)?;
    }

    Ok(builder.finish())
}
