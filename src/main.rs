//! Factory Production Calculator
//!
//! A production chain calculator for factory building games.

mod db;
mod import;
mod models;
mod solver;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

#[derive(Parser)]
#[command(name = "factory-calculator")]
#[command(about = "Production chain calculator for factory building games")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "factory_data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import item and recipe sheets (items.csv, recipes.csv) from a directory
    Import {
        /// Directory to scan for sheet files
        sheet_dir: PathBuf,

        /// Clear existing catalog data before importing
        #[arg(long)]
        clear: bool,
    },

    /// Solve the production chain for target outputs
    Solve {
        /// Targets as ITEM=RATE (per minute); a bare ITEM means 1 per minute
        #[arg(required = true)]
        targets: Vec<String>,

        /// Allow fractional facility counts instead of rounding up
        #[arg(long)]
        fractional: bool,

        /// Show the per-item demand breakdown
        #[arg(short, long)]
        verbose: bool,
    },

    /// List all items in the catalog
    ListItems,

    /// Show the default recipe for an item
    Recipe {
        /// Item name
        item: String,
    },

    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing (without sheet files)
    LoadSample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Import { sheet_dir, clear } => {
            if clear {
                println!("Clearing existing catalog...");
                db::clear_catalog(&conn)?;
            }

            let stats = import::import_directory(&conn, &sheet_dir)?;
            println!("\n{}", stats);
        }

        Commands::Solve {
            targets,
            fractional,
            verbose,
        } => {
            let catalog = db::load_catalog(&conn)?;
            let target_list = targets
                .iter()
                .map(|spec| parse_target(spec))
                .collect::<Result<Vec<_>>>()?;

            let plan = solver::solve(&catalog, &target_list, !fractional)?;

            if verbose {
                println!("Demand breakdown:\n");
                println!("{}", solver::format_plan(&catalog, &plan));
            }

            let summary = solver::summarize_plan(&catalog, &plan, &target_list);
            println!("{}", summary);
        }

        Commands::ListItems => {
            let items = db::list_items(&conn)?;
            if items.is_empty() {
                println!("No items in catalog. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<30} {:<15} {:>8}", "Item", "Kind", "Recipes");
                println!("{}", "-".repeat(55));
                for (name, kind, recipes) in items {
                    println!("{:<30} {:<15} {:>8}", name, kind, recipes);
                }
            }
        }

        Commands::Recipe { item } => {
            let catalog = db::load_catalog(&conn)?;
            let entry = catalog
                .get(&item)
                .ok_or_else(|| anyhow!("item '{}' not found in catalog", item))?;

            match entry.default_recipe() {
                Some(recipe) => {
                    println!("Recipe for {} ({}):", entry.name, entry.kind);
                    if let Some(building) = &recipe.building {
                        println!("Building: {}", building);
                    }
                    print!("{}", recipe);
                    if entry.recipes.len() > 1 {
                        println!("({} alternate recipes not shown)", entry.recipes.len() - 1);
                    }
                }
                None => println!("{} is a raw resource; it has no recipe.", entry.name),
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}

/// Parse an `ITEM=RATE` target spec; the rate defaults to 1 per minute
fn parse_target(spec: &str) -> Result<(String, f64)> {
    match spec.split_once('=') {
        Some((item, rate)) => {
            let rate: f64 = rate
                .parse()
                .with_context(|| format!("bad rate in target '{}'", spec))?;
            Ok((item.trim().to_string(), rate))
        }
        None => Ok((spec.trim().to_string(), 1.0)),
    }
}

/// Load a small sample catalog for testing without sheet files
fn load_sample_data(conn: &Connection) -> Result<()> {
    use crate::models::Ingredient;

    db::clear_catalog(conn)?;

    let raw = ["IronOre", "CopperOre", "Limestone", "Coal"];
    for name in raw {
        db::upsert_item(conn, name, "Ore")?;
    }

    // (item, kind, inputs, output rate, building)
    let produced: &[(&str, &str, &[(&str, f64)], f64, &str)] = &[
        ("IronIngot", "Ingot", &[("IronOre", 30.0)], 30.0, "Smelter"),
        ("CopperIngot", "Ingot", &[("CopperOre", 30.0)], 30.0, "Smelter"),
        (
            "SteelIngot",
            "Ingot",
            &[("IronOre", 45.0), ("Coal", 45.0)],
            45.0,
            "Foundry",
        ),
        ("IronPlate", "Component", &[("IronIngot", 30.0)], 20.0, "Constructor"),
        ("IronRod", "Component", &[("IronIngot", 15.0)], 15.0, "Constructor"),
        ("Screw", "Component", &[("IronRod", 10.0)], 40.0, "Constructor"),
        ("Wire", "Component", &[("CopperIngot", 15.0)], 30.0, "Constructor"),
        ("Cable", "Component", &[("Wire", 60.0)], 30.0, "Constructor"),
        ("Concrete", "Component", &[("Limestone", 45.0)], 15.0, "Constructor"),
        (
            "ReinforcedIronPlate",
            "Component",
            &[("IronPlate", 30.0), ("Screw", 60.0)],
            5.0,
            "Assembler",
        ),
    ];

    for &(name, kind, inputs, output_rate, building) in produced {
        db::upsert_item(conn, name, kind)?;
        let inputs: Vec<Ingredient> = inputs
            .iter()
            .map(|&(item, rate)| Ingredient::new(item, rate))
            .collect();
        db::insert_recipe(conn, name, &inputs, output_rate, Some(building))?;
    }

    println!("Loaded {} sample items", raw.len() + produced.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_target_specs() {
        assert_eq!(
            parse_target("IronPlate=45").unwrap(),
            ("IronPlate".to_string(), 45.0)
        );
        assert_eq!(
            parse_target("IronPlate=2.5").unwrap(),
            ("IronPlate".to_string(), 2.5)
        );
        assert_eq!(parse_target("Cable").unwrap(), ("Cable".to_string(), 1.0));
        assert!(parse_target("IronPlate=lots").is_err());
    }

    #[test]
    fn sample_catalog_solves_end_to_end() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        load_sample_data(&conn).unwrap();

        let catalog = db::load_catalog(&conn).unwrap();
        let plan = solver::solve(
            &catalog,
            &[("ReinforcedIronPlate".to_string(), 10.0)],
            true,
        )
        .unwrap();

        // 2 assemblers: 60 plates/min and 120 screws/min upstream.
        assert_eq!(plan["ReinforcedIronPlate"].multiplier, 2.0);
        assert_eq!(plan["IronPlate"].required, 60.0);
        assert_eq!(plan["Screw"].required, 120.0);
        assert!(plan.values().all(|status| status.solved));
        assert!(plan.contains_key("IronOre"));
    }
}
