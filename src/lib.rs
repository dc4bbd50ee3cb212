//! Satisfactory Production Calculator
//!
//! Decodes the game's recipe dump and resolves production chains: which
//! machines and inputs are needed to make an item at a given rate per minute.

pub mod calculator;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod index;
pub mod logging;
pub mod models;
pub mod property;
pub mod rates;

pub use calculator::{resolve, resolve_chain};
pub use catalog::Catalog;
pub use config::{Config, ResolveOptions};
pub use models::{Chain, ProductionStep};
