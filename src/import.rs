//! Tabular sheet ingestion
//!
//! Loads the catalog from two CSV sheets: `items.csv` (Name, Kind) and
//! `recipes.csv` (Output, Output rate, up to four Input/Number column
//! pairs, Building). The sheets may live anywhere under the import
//! directory; the first match of each wins.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use rusqlite::Connection;
use walkdir::WalkDir;

use crate::db;
use crate::models::Ingredient;

/// One parsed row of the recipes sheet, before database insertion
#[derive(Debug, Clone, PartialEq)]
struct RecipeRow {
    output: String,
    output_rate: f64,
    inputs: Vec<Ingredient>,
    building: Option<String>,
}

/// Counters reported after an import
#[derive(Debug, Default)]
pub struct ImportStats {
    pub items: usize,
    pub recipes: usize,
    pub ingredients: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Import complete:")?;
        writeln!(f, "  {} items", self.items)?;
        writeln!(f, "  {} recipes", self.recipes)?;
        write!(f, "  {} ingredient entries", self.ingredients)
    }
}

/// Find a sheet file by name anywhere under the import directory
fn find_sheet(dir: &Path, filename: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == filename)
        .map(|e| e.path().to_path_buf())
}

/// Split one CSV line into fields, honoring double-quoted cells
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn cell<'a>(fields: &'a [String], index: usize) -> Option<&'a str> {
    fields.get(index).map(String::as_str).filter(|s| !s.is_empty())
}

/// Parse the items sheet into (name, kind) pairs
fn parse_items_sheet(content: &str) -> Result<Vec<(String, String)>> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = split_csv_line(lines.next().context("items sheet is empty")?);

    let name_col = header
        .iter()
        .position(|h| h == "Name")
        .context("items sheet has no 'Name' column")?;
    let kind_col = header
        .iter()
        .position(|h| h == "Kind")
        .context("items sheet has no 'Kind' column")?;

    let mut items = Vec::new();
    for line in lines {
        let fields = split_csv_line(line);
        let name = cell(&fields, name_col)
            .with_context(|| format!("items sheet row without a name: '{}'", line))?;
        let kind = cell(&fields, kind_col).unwrap_or("");
        items.push((name.to_string(), kind.to_string()));
    }
    Ok(items)
}

/// Parse the recipes sheet. Input/Number column pairs are matched up by
/// their header index, so the sheet may carry them in any order; blank
/// cells mean the pair is unused on that row.
fn parse_recipes_sheet(content: &str) -> Result<Vec<RecipeRow>> {
    let input_re = Regex::new(r"^Input (\d+)$")?;
    let number_re = Regex::new(r"^Number (\d+)$")?;

    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = split_csv_line(lines.next().context("recipes sheet is empty")?);

    let output_col = header
        .iter()
        .position(|h| h == "Output")
        .context("recipes sheet has no 'Output' column")?;
    let rate_col = header
        .iter()
        .position(|h| h == "Output rate")
        .context("recipes sheet has no 'Output rate' column")?;
    let building_col = header.iter().position(|h| h == "Building");

    // (pair number, input column, number column), sorted by pair number
    let mut pairs: Vec<(u32, usize, usize)> = Vec::new();
    for (col, name) in header.iter().enumerate() {
        if let Some(cap) = input_re.captures(name) {
            let n: u32 = cap[1]
                .parse()
                .with_context(|| format!("bad column header '{}'", name))?;
            let number_col = header
                .iter()
                .position(|h| {
                    number_re
                        .captures(h)
                        .is_some_and(|c| c[1].parse::<u32>() == Ok(n))
                })
                .with_context(|| format!("'Input {}' column has no 'Number {}'", n, n))?;
            pairs.push((n, col, number_col));
        }
    }
    pairs.sort_by_key(|&(n, _, _)| n);

    let mut rows = Vec::new();
    for line in lines {
        let fields = split_csv_line(line);
        let output = cell(&fields, output_col)
            .with_context(|| format!("recipes sheet row without an output: '{}'", line))?;
        let output_rate: f64 = cell(&fields, rate_col)
            .with_context(|| format!("recipe for '{}' has no output rate", output))?
            .parse()
            .with_context(|| format!("bad output rate for '{}'", output))?;

        let mut inputs = Vec::new();
        for &(n, input_col, number_col) in &pairs {
            let (Some(item), Some(rate)) = (cell(&fields, input_col), cell(&fields, number_col))
            else {
                continue;
            };
            let rate: f64 = rate
                .parse()
                .with_context(|| format!("bad 'Number {}' for recipe '{}'", n, output))?;
            inputs.push(Ingredient::new(item, rate));
        }

        rows.push(RecipeRow {
            output: output.to_string(),
            output_rate,
            inputs,
            building: building_col.and_then(|c| cell(&fields, c)).map(String::from),
        });
    }
    Ok(rows)
}

/// Parse both sheets and load them into the database
fn import_sheets(conn: &Connection, items_csv: &str, recipes_csv: &str) -> Result<ImportStats> {
    let items = parse_items_sheet(items_csv)?;
    let recipes = parse_recipes_sheet(recipes_csv)?;

    let known: HashSet<&str> = items.iter().map(|(name, _)| name.as_str()).collect();
    let mut stats = ImportStats::default();

    for (name, kind) in &items {
        db::upsert_item(conn, name, kind)?;
        stats.items += 1;
    }

    for row in &recipes {
        // Input names are taken on trust (they may be raw resources), but
        // an undeclared output item is a broken sheet.
        if !known.contains(row.output.as_str()) {
            bail!("recipes sheet references unknown item '{}'", row.output);
        }
        db::insert_recipe(
            conn,
            &row.output,
            &row.inputs,
            row.output_rate,
            row.building.as_deref(),
        )?;
        stats.recipes += 1;
        stats.ingredients += row.inputs.len();
    }

    Ok(stats)
}

/// Locate the sheets under `dir` and import them
pub fn import_directory(conn: &Connection, dir: &Path) -> Result<ImportStats> {
    let items_path = find_sheet(dir, "items.csv")
        .ok_or_else(|| anyhow!("no items.csv found under {}", dir.display()))?;
    let recipes_path = find_sheet(dir, "recipes.csv")
        .ok_or_else(|| anyhow!("no recipes.csv found under {}", dir.display()))?;

    let items_csv = fs::read_to_string(&items_path)
        .with_context(|| format!("failed to read {}", items_path.display()))?;
    let recipes_csv = fs::read_to_string(&recipes_path)
        .with_context(|| format!("failed to read {}", recipes_path.display()))?;

    import_sheets(conn, &items_csv, &recipes_csv)
}
