//! Database schema and operations

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::catalog::Catalog;
use crate::models::{Item, ItemAmount, Machine, Recipe};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            class_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS machines (
            class_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recipes (
            class_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            duration_seconds REAL NOT NULL CHECK (duration_seconds > 0),
            is_alternate INTEGER NOT NULL
        );

        -- Ingredient and product lines keep their declaration order
        CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            item_class_id TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0),
            PRIMARY KEY (recipe_id, position)
        );

        CREATE TABLE IF NOT EXISTS recipe_products (
            recipe_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            item_class_id TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0),
            PRIMARY KEY (recipe_id, position)
        );

        CREATE TABLE IF NOT EXISTS recipe_machines (
            recipe_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            machine_class_id TEXT NOT NULL,
            PRIMARY KEY (recipe_id, position)
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_products_item ON recipe_products(item_class_id);
        "#,
    )?;
    Ok(())
}

/// Clear all extracted data (for re-extraction)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_machines;
        DELETE FROM recipe_products;
        DELETE FROM recipe_ingredients;
        DELETE FROM recipes;
        DELETE FROM machines;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

/// Write a catalog in one transaction, replacing rows with the same class id
pub fn save_catalog(conn: &mut Connection, catalog: &Catalog) -> Result<()> {
    let tx = conn.transaction()?;

    for item in catalog.items() {
        tx.execute(
            "INSERT OR REPLACE INTO items (class_id, display_name) VALUES (?1, ?2)",
            params![item.class_id, item.display_name],
        )?;
    }

    for machine in catalog.machines() {
        tx.execute(
            "INSERT OR REPLACE INTO machines (class_id, display_name) VALUES (?1, ?2)",
            params![machine.class_id, machine.display_name],
        )?;
    }

    for recipe in catalog.index().recipes() {
        tx.execute(
            "INSERT OR REPLACE INTO recipes (class_id, display_name, duration_seconds, is_alternate)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                recipe.class_id,
                recipe.display_name,
                recipe.duration_seconds,
                recipe.is_alternate
            ],
        )?;
        for table in ["recipe_ingredients", "recipe_products", "recipe_machines"] {
            tx.execute(
                &format!("DELETE FROM {} WHERE recipe_id = ?1", table),
                [&recipe.class_id],
            )?;
        }
        for (position, line) in recipe.ingredients.iter().enumerate() {
            tx.execute(
                "INSERT INTO recipe_ingredients (recipe_id, position, item_class_id, amount)
                 VALUES (?1, ?2, ?3, ?4)",
                params![recipe.class_id, position as i64, line.item_class_id, line.amount],
            )?;
        }
        for (position, line) in recipe.products.iter().enumerate() {
            tx.execute(
                "INSERT INTO recipe_products (recipe_id, position, item_class_id, amount)
                 VALUES (?1, ?2, ?3, ?4)",
                params![recipe.class_id, position as i64, line.item_class_id, line.amount],
            )?;
        }
        for (position, machine) in recipe.produced_in.iter().enumerate() {
            tx.execute(
                "INSERT INTO recipe_machines (recipe_id, position, machine_class_id)
                 VALUES (?1, ?2, ?3)",
                params![recipe.class_id, position as i64, machine],
            )?;
        }
    }

    tx.commit()?;
    Ok(())
}

/// Load every stored item, machine and recipe into a catalog
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let items = query_named(conn, "SELECT class_id, display_name FROM items")?
        .into_iter()
        .map(|(class_id, display_name)| Item {
            class_id,
            display_name,
        });
    let machines = query_named(conn, "SELECT class_id, display_name FROM machines")?
        .into_iter()
        .map(|(class_id, display_name)| Machine {
            class_id,
            display_name,
        });

    let mut stmt = conn.prepare(
        "SELECT class_id, display_name, duration_seconds, is_alternate FROM recipes ORDER BY class_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Recipe {
            class_id: row.get(0)?,
            display_name: row.get(1)?,
            duration_seconds: row.get(2)?,
            is_alternate: row.get(3)?,
            ingredients: Vec::new(),
            products: Vec::new(),
            produced_in: Vec::new(),
        })
    })?;

    let mut recipes = Vec::new();
    for row in rows {
        let mut recipe = row?;
        recipe.ingredients = query_lines(conn, "recipe_ingredients", &recipe.class_id)?;
        recipe.products = query_lines(conn, "recipe_products", &recipe.class_id)?;
        recipe.produced_in = query_machines(conn, &recipe.class_id)?;
        recipes.push(recipe);
    }

    Ok(Catalog::new(items, machines, recipes))
}

fn query_named(conn: &Connection, sql: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn query_lines(conn: &Connection, table: &str, recipe_id: &str) -> Result<Vec<ItemAmount>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT item_class_id, amount FROM {} WHERE recipe_id = ?1 ORDER BY position",
        table
    ))?;
    let rows = stmt.query_map([recipe_id], |row| {
        Ok(ItemAmount {
            item_class_id: row.get(0)?,
            amount: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.with_context(|| format!("bad {} row for {}", table, recipe_id))?);
    }
    Ok(results)
}

fn query_machines(conn: &Connection, recipe_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT machine_class_id FROM recipe_machines WHERE recipe_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map([recipe_id], |row| row.get(0))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Counts of stored rows: (items, machines, recipes)
pub fn counts(conn: &Connection) -> Result<(usize, usize, usize)> {
    let count = |table: &str| -> Result<usize> {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(n as usize)
    };
    Ok((count("items")?, count("machines")?, count("recipes")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::resolve;
    use crate::config::ResolveOptions;

    fn sample_catalog() -> Catalog {
        Catalog::new(
            vec![
                Item {
                    class_id: "Desc_Wire_C".into(),
                    display_name: "Wire".into(),
                },
                Item {
                    class_id: "Desc_CopperIngot_C".into(),
                    display_name: "Copper Ingot".into(),
                },
            ],
            vec![Machine {
                class_id: "Build_ConstructorMk1_C".into(),
                display_name: "Constructor".into(),
            }],
            vec![
                Recipe::new("Recipe_Wire_C", 4.0)
                    .with_display_name("Wire")
                    .with_ingredient("Desc_CopperIngot_C", 1)
                    .with_product("Desc_Wire_C", 2)
                    .with_machine("Build_ConstructorMk1_C")
                    .with_machine("FGBuildGun"),
                Recipe::new("Recipe_Alternate_FusedWire_C", 20.0)
                    .with_display_name("Alternate: Fused Wire")
                    .with_ingredient("Desc_CopperIngot_C", 12)
                    .with_ingredient("Desc_CateriumIngot_C", 3)
                    .with_product("Desc_Wire_C", 90),
            ],
        )
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn catalog_survives_round_trip() {
        let mut conn = memory_db();
        let original = sample_catalog();
        save_catalog(&mut conn, &original).unwrap();

        let loaded = load_catalog(&conn).unwrap();
        assert_eq!(counts(&conn).unwrap(), (2, 1, 2));
        assert_eq!(loaded.item_name("Desc_CopperIngot_C"), "Copper Ingot");

        let fused = loaded.index().recipe("Recipe_Alternate_FusedWire_C").unwrap();
        assert_eq!(
            fused,
            original.index().recipe("Recipe_Alternate_FusedWire_C").unwrap()
        );
        let wire = loaded.index().recipe("Recipe_Wire_C").unwrap();
        assert_eq!(wire.produced_in, vec!["Build_ConstructorMk1_C", "FGBuildGun"]);

        let options = ResolveOptions::default();
        assert_eq!(
            resolve(&loaded, "Desc_Wire_C", 30.0, &options).unwrap(),
            resolve(&original, "Desc_Wire_C", 30.0, &options).unwrap()
        );
    }

    #[test]
    fn saving_twice_does_not_duplicate_lines() {
        let mut conn = memory_db();
        save_catalog(&mut conn, &sample_catalog()).unwrap();
        save_catalog(&mut conn, &sample_catalog()).unwrap();

        let loaded = load_catalog(&conn).unwrap();
        let fused = loaded.index().recipe("Recipe_Alternate_FusedWire_C").unwrap();
        assert_eq!(fused.ingredients.len(), 2);
    }

    #[test]
    fn clear_removes_everything() {
        let mut conn = memory_db();
        save_catalog(&mut conn, &sample_catalog()).unwrap();
        clear_catalog(&conn).unwrap();
        assert_eq!(counts(&conn).unwrap(), (0, 0, 0));
        assert!(load_catalog(&conn).unwrap().index().is_empty());
    }
}
