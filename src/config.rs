//! Calculator configuration: dump tags and resolver options
//!
//! Loaded from an optional TOML file; command-line flags override the
//! `[resolve]` values afterwards.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_MAX_DEPTH: usize = 6;
pub const DEFAULT_RATE_PER_MINUTE: f64 = 60.0;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tags: TagConfig,
    pub resolve: ResolveConfig,
}

/// Native-class tags that route dump blocks into each entity table.
///
/// Tags are compared by their trailing class name, so
/// `/Script/CoreUObject.Class'/Script/FactoryGame.FGRecipe'`,
/// `Class'/Script/FactoryGame.FGRecipe'` and `FGRecipe` are equivalent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagConfig {
    pub items: Vec<String>,
    pub recipes: Vec<String>,
    pub machines: Vec<String>,
}

impl Default for TagConfig {
    fn default() -> Self {
        let tag = |name: &str| format!("/Script/CoreUObject.Class'/Script/FactoryGame.{}'", name);
        Self {
            items: [
                "FGItemDescriptor",
                "FGResourceDescriptor",
                "FGItemDescriptorBiomass",
                "FGItemDescriptorNuclearFuel",
                "FGItemDescriptorPowerBoosterFuel",
                "FGPowerShardDescriptor",
                "FGConsumableDescriptor",
                "FGEquipmentDescriptor",
                "FGAmmoTypeProjectile",
                "FGAmmoTypeInstantHit",
                "FGAmmoTypeSpreadshot",
            ]
            .iter()
            .map(|n| tag(n))
            .collect(),
            recipes: vec![tag("FGRecipe")],
            machines: vec![
                tag("FGBuildableManufacturer"),
                tag("FGBuildableManufacturerVariablePower"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    pub allow_alternates: bool,
    pub max_depth: usize,
    pub default_rate: f64,
    /// item class id -> recipe class id
    pub pins: BTreeMap<String, String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            allow_alternates: false,
            max_depth: DEFAULT_MAX_DEPTH,
            default_rate: DEFAULT_RATE_PER_MINUTE,
            pins: BTreeMap::new(),
        }
    }
}

impl ResolveConfig {
    pub fn options(&self) -> ResolveOptions {
        ResolveOptions {
            allow_alternates: self.allow_alternates,
            max_depth: self.max_depth,
            pins: self.pins.clone(),
        }
    }
}

/// Per-request resolver options
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    pub allow_alternates: bool,
    pub max_depth: usize,
    pub pins: BTreeMap<String, String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveConfig::default().options()
    }
}

impl ResolveOptions {
    pub fn with_alternates(mut self, allow: bool) -> Self {
        self.allow_alternates = allow;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_pin(mut self, item: impl Into<String>, recipe: impl Into<String>) -> Self {
        self.pins.insert(item.into(), recipe.into());
        self
    }
}

impl Config {
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Read `path` if it exists, otherwise fall back to defaults
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Parse a `ITEM=RECIPE` pin given on the command line
pub fn parse_pin(raw: &str) -> Result<(String, String), ConfigError> {
    match raw.split_once('=') {
        Some((item, recipe)) if !item.trim().is_empty() && !recipe.trim().is_empty() => {
            Ok((item.trim().to_string(), recipe.trim().to_string()))
        }
        _ => Err(ConfigError::InvalidPin(raw.to_string())),
    }
}
