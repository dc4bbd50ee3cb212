//! End-to-end tests: dump file -> catalog -> database -> production chain

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use satisfactory_calculator::calculator::{resolve_chain, summarize_chain};
use satisfactory_calculator::config::{ResolveOptions, TagConfig};
use satisfactory_calculator::error::LoadError;
use satisfactory_calculator::models::TerminalReason;
use satisfactory_calculator::{db, extract, resolve};

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample_dump.json")
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn fixture_loads_with_bad_entries_counted() {
    let (catalog, stats) = extract::load_dump(&fixture(), &TagConfig::default()).unwrap();

    assert_eq!(stats.files, 1);
    assert_eq!(stats.items, 10);
    assert_eq!(stats.machines, 4);
    assert_eq!(stats.recipes, 10);
    assert_eq!(stats.excluded_recipes, 1);
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.skipped_entries, 1);
    assert_eq!(stats.ignored_blocks, 1);

    assert!(catalog.index().recipe("Recipe_BrokenDuration_C").is_none());
    let workshop = catalog.index().recipe("Recipe_Workshop_IronPlate_C").unwrap();
    assert_eq!(workshop.ingredients.len(), 1);
    assert_eq!(workshop.ingredients[0].item_class_id, "Desc_IronIngot_C");
    assert_eq!(workshop.produced_in, vec!["BP_WorkBenchComponent_C", "FGBuildGun"]);

    let cast = catalog.index().recipe("Recipe_Alternate_CastScrew_C").unwrap();
    assert!(cast.is_alternate);
    assert_eq!(catalog.item_name("Desc_LiquidOil_C"), "Crude Oil");
}

#[test]
fn reinforced_plate_chain_from_fixture() {
    let (catalog, _) = extract::load_dump(&fixture(), &TagConfig::default()).unwrap();
    let chain = resolve_chain(
        &catalog,
        "Desc_IronPlateReinforced_C",
        5.0,
        &ResolveOptions::default(),
    )
    .unwrap();

    let order: Vec<&str> = chain.steps.iter().map(|s| s.item_class_id.as_str()).collect();
    assert_eq!(
        order,
        vec![
            "Desc_IronPlateReinforced_C",
            "Desc_IronPlate_C",
            "Desc_IronIngot_C",
            "Desc_IronScrew_C",
            "Desc_IronRod_C",
        ]
    );

    let root = &chain.steps[0];
    assert_eq!(root.machine_name, "Assembler");
    assert_eq!(root.machines_required, 1);
    assert_close(root.input_rates[0].rate_per_minute, 30.0);
    assert_close(root.input_rates[1].rate_per_minute, 60.0);

    let plate = &chain.steps[1];
    assert_eq!(plate.recipe_id, "Recipe_IronPlate_C");
    assert_eq!(plate.machine_name, "Constructor");
    assert_eq!(plate.machines_required, 2);
    assert_close(plate.multiplier, 1.5);

    let ingot = &chain.steps[2];
    assert_eq!(ingot.machine_name, "Smelter");
    assert_close(ingot.target_rate, 45.0);

    // The rod branch asks for ingots again; that demand is not re-expanded
    let revisit = chain
        .terminals
        .iter()
        .find(|t| t.reason == TerminalReason::AlreadyVisited)
        .unwrap();
    assert_eq!(revisit.item_class_id, "Desc_IronIngot_C");
    assert_close(revisit.rate_per_minute, 15.0);

    let summary = summarize_chain(&chain, "Reinforced Iron Plate", 5.0);
    assert_eq!(summary.base_resources.len(), 1);
    assert_eq!(summary.base_resources[0].0, "Iron Ore");
    assert_close(summary.base_resources[0].1, 45.0);
    assert_eq!(summary.unexpanded.len(), 1);
}

#[test]
fn refinery_chain_reports_byproducts() {
    let (catalog, _) = extract::load_dump(&fixture(), &TagConfig::default()).unwrap();
    let chain =
        resolve_chain(&catalog, "Desc_Rubber_C", 20.0, &ResolveOptions::default()).unwrap();

    let order: Vec<&str> = chain.steps.iter().map(|s| s.item_class_id.as_str()).collect();
    assert_eq!(
        order,
        vec!["Desc_Rubber_C", "Desc_Plastic_C", "Desc_HeavyOilResidue_C"]
    );

    let plastic = &chain.steps[1];
    assert_eq!(plastic.recipe_id, "Recipe_Plastic_C");
    assert_eq!(plastic.byproducts.len(), 1);
    assert_eq!(plastic.byproducts[0].item_class_id, "Desc_HeavyOilResidue_C");
    assert_close(plastic.byproducts[0].rate_per_minute, 10000.0);

    // Residue also comes from the standard plastic recipe, ranked ahead of the alternate
    let residue = &chain.steps[2];
    assert_eq!(residue.recipe_id, "Recipe_Plastic_C");
    assert_eq!(residue.machines_required, 2);
    assert_close(residue.input_rates[0].rate_per_minute, 60000.0);

    let summary = summarize_chain(&chain, "Rubber", 20.0);
    assert_eq!(summary.base_resources.len(), 1);
    assert_close(summary.base_resources[0].1, 90000.0);
    assert!(summary.unexpanded.is_empty());
    assert_eq!(summary.machine_counts, vec![("Refinery".to_string(), 4)]);
}

#[test]
fn pinned_alternate_replaces_default_recipe() {
    let (catalog, _) = extract::load_dump(&fixture(), &TagConfig::default()).unwrap();
    let options = ResolveOptions::default()
        .with_pin("Desc_HeavyOilResidue_C", "Recipe_Alternate_HeavyOilResidue_C");
    let chain = resolve_chain(&catalog, "Desc_Rubber_C", 20.0, &options).unwrap();

    let residue = chain
        .steps
        .iter()
        .find(|s| s.item_class_id == "Desc_HeavyOilResidue_C")
        .unwrap();
    assert_eq!(residue.recipe_id, "Recipe_Alternate_HeavyOilResidue_C");
    assert_eq!(residue.machines_required, 1);
    assert_close(residue.multiplier, 0.5);
    assert_close(residue.input_rates[0].rate_per_minute, 15000.0);
}

#[test]
fn directory_load_lets_later_files_override() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixture(), dir.path().join("a_base.json")).unwrap();
    fs::write(
        dir.path().join("b_patch.json"),
        r#"[{
            "NativeClass": "/Script/CoreUObject.Class'/Script/FactoryGame.FGRecipe'",
            "Classes": [{
                "ClassName": "Recipe_IronPlate_C",
                "mDisplayName": "Iron Plate",
                "mIngredients": "((ItemClass=\"/Game/FactoryGame/Resource/Parts/IronIngot/Desc_IronIngot.Desc_IronIngot_C\",Amount=3))",
                "mProduct": "((ItemClass=\"/Game/FactoryGame/Resource/Parts/IronPlate/Desc_IronPlate.Desc_IronPlate_C\",Amount=2))",
                "mManufactoringDuration": "3.000000",
                "mProducedIn": "(\"/Game/FactoryGame/Buildable/Factory/ConstructorMk1/Build_ConstructorMk1.Build_ConstructorMk1_C\")"
            }]
        }]"#,
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not a dump").unwrap();

    let (catalog, stats) = extract::load_dump(dir.path(), &TagConfig::default()).unwrap();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.recipes, 10);

    let plate = catalog.index().recipe("Recipe_IronPlate_C").unwrap();
    assert_close(plate.duration_seconds, 3.0);

    let steps = resolve(&catalog, "Desc_IronPlate_C", 60.0, &ResolveOptions::default()).unwrap();
    assert_eq!(steps[0].machines_required, 2);
    assert_close(steps[0].multiplier, 1.5);
}

#[test]
fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = extract::load_dump(dir.path(), &TagConfig::default()).unwrap_err();
    assert!(matches!(err, LoadError::NoDumpFiles(_)));
}

#[test]
fn database_round_trip_preserves_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("factory_data.db");
    let (catalog, _) = extract::load_dump(&fixture(), &TagConfig::default()).unwrap();

    {
        let mut conn = Connection::open(&db_path).unwrap();
        db::init_schema(&conn).unwrap();
        db::save_catalog(&mut conn, &catalog).unwrap();
    }

    let conn = Connection::open(&db_path).unwrap();
    assert_eq!(db::counts(&conn).unwrap(), (10, 4, 10));
    let loaded = db::load_catalog(&conn).unwrap();

    let options = ResolveOptions::default();
    for (item, rate) in [
        ("Desc_IronPlateReinforced_C", 5.0),
        ("Desc_Rubber_C", 20.0),
        ("Desc_IronScrew_C", 90.0),
    ] {
        assert_eq!(
            resolve_chain(&loaded, item, rate, &options).unwrap(),
            resolve_chain(&catalog, item, rate, &options).unwrap(),
            "chain for {item} changed after the round trip"
        );
    }
}

#[test]
fn lookup_by_display_name() {
    let (catalog, _) = extract::load_dump(&fixture(), &TagConfig::default()).unwrap();
    assert_eq!(catalog.find_item("screw").as_deref(), Some("Desc_IronScrew_C"));
    assert_eq!(
        catalog.find_item("Desc_IronRod_C").as_deref(),
        Some("Desc_IronRod_C")
    );
    assert_eq!(catalog.find_item("Unobtainium"), None);
}
