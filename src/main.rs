//! Satisfactory Production Calculator
//!
//! A production chain calculator for Satisfactory recipe dumps.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use rusqlite::Connection;
use tracing::info;

use satisfactory_calculator::calculator::{
    format_production_chain, resolve_chain, summarize_chain,
};
use satisfactory_calculator::config::{Config, parse_pin};
use satisfactory_calculator::rates::per_minute;
use satisfactory_calculator::{Catalog, db, extract, logging};

const DEFAULT_CONFIG: &str = "calculator.toml";

#[derive(Parser)]
#[command(name = "satisfactory-calculator")]
#[command(about = "Production chain calculator for Satisfactory")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "factory_data.db")]
    database: PathBuf,

    /// TOML config file (calculator.toml is used when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract items, machines and recipes from a dump into the database
    Import {
        /// Dump file, or a directory of *.json dumps
        source: PathBuf,

        /// Clear existing data before import
        #[arg(long)]
        clear: bool,
    },

    /// Calculate the production chain for a target item
    Calc {
        /// Item class id (e.g. "Desc_IronPlate_C") or display name ("Iron Plate")
        item: String,

        /// Target production rate in items per minute
        #[arg(short, long, value_parser = parse_rate)]
        rate: Option<f64>,

        /// Allow alternate recipes
        #[arg(short, long)]
        alternates: bool,

        /// Maximum chain depth below the target item
        #[arg(long)]
        max_depth: Option<usize>,

        /// Force a recipe for an item, e.g. --use Desc_Wire_C=Recipe_Alternate_FusedWire_C
        #[arg(long = "use", value_name = "ITEM=RECIPE")]
        pins: Vec<String>,

        /// Print the production steps as JSON
        #[arg(long)]
        json: bool,

        /// Show the detailed production tree
        #[arg(short, long)]
        tree: bool,

        /// Read a dump directly instead of the database
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Show every recipe that produces an item, in selection order
    Recipes {
        item: String,

        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// List all items
    ListItems {
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// List all items some recipe produces
    ListProducible {
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Initialize empty database with schema
    Init,
}

fn parse_rate(raw: &str) -> std::result::Result<f64, String> {
    let rate: f64 = raw.parse().map_err(|_| format!("invalid rate: {raw}"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("rate must be positive, got {raw}"))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_file_or_default(Path::new(DEFAULT_CONFIG))?,
    };

    match cli.command {
        Commands::Import { source, clear } => {
            let mut conn = open_database(&cli.database)?;
            if clear {
                println!("Clearing existing data...");
                db::clear_catalog(&conn)?;
            }

            let (catalog, stats) = extract::load_dump(&source, &config.tags)
                .with_context(|| format!("failed to import {}", source.display()))?;
            db::save_catalog(&mut conn, &catalog)?;
            println!("{}", stats);

            let (items, machines, recipes) = db::counts(&conn)?;
            println!(
                "Database {} now holds {} items, {} machines, {} recipes",
                cli.database.display(),
                items,
                machines,
                recipes
            );
        }

        Commands::Calc {
            item,
            rate,
            alternates,
            max_depth,
            pins,
            json,
            tree,
            dump,
        } => {
            let catalog = open_catalog(&cli.database, dump.as_deref(), &config)?;
            let root = find_item(&catalog, &item)?;
            let rate = rate.unwrap_or(config.resolve.default_rate);

            let mut options = config.resolve.options();
            options.allow_alternates |= alternates;
            if let Some(depth) = max_depth {
                options.max_depth = depth;
            }
            for raw in &pins {
                let (pin_item, recipe) = parse_pin(raw)?;
                let pin_item = catalog.find_item(&pin_item).unwrap_or(pin_item);
                options.pins.insert(pin_item, recipe);
            }

            let chain = resolve_chain(&catalog, &root, rate, &options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&chain.steps)?);
                return Ok(());
            }

            let name = catalog.item_name(&root);
            if chain.steps.is_empty() {
                println!("No production chain found for {} (base resource?)", name);
                return Ok(());
            }

            if tree {
                println!("Production chain:\n");
                println!("{}", format_production_chain(&catalog, &chain));
            }
            println!("{}", summarize_chain(&chain, name, rate));
        }

        Commands::Recipes { item, dump } => {
            let catalog = open_catalog(&cli.database, dump.as_deref(), &config)?;
            let class_id = find_item(&catalog, &item)?;
            print_recipes(&catalog, &class_id);
        }

        Commands::ListItems { dump } => {
            let catalog = open_catalog(&cli.database, dump.as_deref(), &config)?;
            println!("{:<40} {}", "Item", "Class");
            println!("{}", "-".repeat(72));
            for item in catalog.items() {
                println!("{:<40} {}", item.display_name, item.class_id);
            }
        }

        Commands::ListProducible { dump } => {
            let catalog = open_catalog(&cli.database, dump.as_deref(), &config)?;
            println!("Producible items:");
            for class_id in catalog.index().producible_items() {
                println!("  {} ({})", catalog.item_name(class_id), class_id);
            }
        }

        Commands::Init => {
            open_database(&cli.database)?;
            println!("Database initialized at: {}", cli.database.display());
        }
    }

    Ok(())
}

fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    db::init_schema(&conn)?;
    Ok(conn)
}

/// Build the catalog from a dump when one is given, otherwise from the database
fn open_catalog(database: &Path, dump: Option<&Path>, config: &Config) -> Result<Catalog> {
    if let Some(dump) = dump {
        let (catalog, stats) = extract::load_dump(dump, &config.tags)
            .with_context(|| format!("failed to load {}", dump.display()))?;
        info!("{}", stats);
        return Ok(catalog);
    }

    let conn = open_database(database)?;
    let catalog = db::load_catalog(&conn)?;
    if catalog.index().is_empty() {
        bail!("No recipes in database. Run 'import' first or pass --dump.");
    }
    Ok(catalog)
}

fn find_item(catalog: &Catalog, query: &str) -> Result<String> {
    match catalog.find_item(query) {
        Some(class_id) => Ok(class_id),
        None => bail!("Item '{}' not found", query),
    }
}

fn print_recipes(catalog: &Catalog, class_id: &str) {
    let name = catalog.item_name(class_id);
    let selected = catalog.index().select_recipe(class_id, false).ok();
    let candidates: Vec<_> = catalog.index().candidates(class_id).collect();
    if candidates.is_empty() {
        println!("No recipe found for {}", name);
        return;
    }

    for recipe in candidates {
        let marker = if selected.is_some_and(|s| s.class_id == recipe.class_id) {
            " [default]"
        } else {
            ""
        };
        println!("Recipe: {} ({}){}", recipe.display_name, recipe.class_id, marker);
        println!("  Duration: {} seconds", recipe.duration_seconds);

        let machines: Vec<&str> = recipe
            .produced_in
            .iter()
            .map(|m| catalog.machine_name(m))
            .collect();
        println!("  Produced in: {}", machines.join(", "));

        println!("  Ingredients:");
        for line in &recipe.ingredients {
            println!(
                "    {} x{} ({:.2}/min)",
                catalog.item_name(&line.item_class_id),
                line.amount,
                per_minute(line.amount, recipe.duration_seconds)
            );
        }
        println!("  Products:");
        for line in &recipe.products {
            println!(
                "    {} x{} ({:.2}/min)",
                catalog.item_name(&line.item_class_id),
                line.amount,
                per_minute(line.amount, recipe.duration_seconds)
            );
        }
        println!();
    }
}
