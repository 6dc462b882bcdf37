//! Database schema and catalog storage

use anyhow::Result;
use rusqlite::Connection;

use crate::models::{Catalog, Ingredient};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Item definitions
        CREATE TABLE IF NOT EXISTS items (
            name TEXT PRIMARY KEY,
            kind TEXT NOT NULL
        );

        -- Recipes; rowid order preserves insertion order, and the first
        -- recipe per item is the default one used for solving
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item TEXT NOT NULL,
            output_rate REAL NOT NULL,
            building TEXT
        );

        -- Per-recipe ingredient consumption rates
        CREATE TABLE IF NOT EXISTS recipe_inputs (
            recipe_id INTEGER,
            item TEXT,
            rate REAL NOT NULL,
            PRIMARY KEY (recipe_id, item)
        );

        CREATE INDEX IF NOT EXISTS idx_recipes_item ON recipes(item);
        "#,
    )?;
    Ok(())
}

/// Insert or replace an item
pub fn upsert_item(conn: &Connection, name: &str, kind: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (name, kind) VALUES (?1, ?2)",
        (name, kind),
    )?;
    Ok(())
}

/// Insert a recipe and its input rows
pub fn insert_recipe(
    conn: &Connection,
    item: &str,
    inputs: &[Ingredient],
    output_rate: f64,
    building: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO recipes (item, output_rate, building) VALUES (?1, ?2, ?3)",
        (item, output_rate, building),
    )?;
    let recipe_id = conn.last_insert_rowid();

    for input in inputs {
        conn.execute(
            "INSERT INTO recipe_inputs (recipe_id, item, rate) VALUES (?1, ?2, ?3)",
            (recipe_id, &input.item, input.rate),
        )?;
    }

    Ok(recipe_id)
}

/// Clear all catalog data (for re-import)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_inputs;
        DELETE FROM recipes;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

/// Load the full catalog into memory for solving
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut catalog = Catalog::new();

    let mut stmt = conn.prepare("SELECT name, kind FROM items")?;
    let items = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for item in items {
        let (name, kind) = item?;
        catalog.add_item(name, kind);
    }

    // id order keeps the first-inserted recipe as the default
    let mut stmt =
        conn.prepare("SELECT id, item, output_rate, building FROM recipes ORDER BY id")?;
    let recipes = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut input_stmt = conn.prepare(
        "SELECT item, rate FROM recipe_inputs WHERE recipe_id = ?1 ORDER BY rowid",
    )?;
    for recipe in recipes {
        let (id, item, output_rate, building) = recipe?;
        let rows = input_stmt.query_map([id], |row| {
            Ok(Ingredient {
                item: row.get(0)?,
                rate: row.get(1)?,
            })
        })?;
        let mut inputs = Vec::new();
        for row in rows {
            inputs.push(row?);
        }
        catalog.add_recipe(&item, inputs, output_rate, building)?;
    }

    Ok(catalog)
}

/// List all items with their recipe counts, ordered by name
pub fn list_items(conn: &Connection) -> Result<Vec<(String, String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT i.name, i.kind, COUNT(r.id)
         FROM items i
         LEFT JOIN recipes r ON r.item = i.name
         GROUP BY i.name, i.kind
         ORDER BY i.name",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}
