//! Data models for items, recipes, and the catalog

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown item '{name}'")]
    UnknownItem { name: String },
}

/// One (item, rate) pair on either side of a recipe. Rates are per minute.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingredient {
    pub item: String,
    pub rate: f64,
}

impl Ingredient {
    pub fn new(item: impl Into<String>, rate: f64) -> Self {
        Self {
            item: item.into(),
            rate,
        }
    }
}

/// A conversion rule: consumes inputs at fixed rates, produces outputs at
/// fixed rates. Every recipe built through [`Catalog::add_recipe`] has
/// exactly one output (the owning item); the vector form exists because
/// that is how recipes are stored, not because the solver reads more than
/// the first output.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub inputs: Vec<Ingredient>,
    pub outputs: Vec<Ingredient>,
    pub building: Option<String>,
}

impl Recipe {
    /// Per-facility output rate of the recipe's declared product.
    pub fn output_rate(&self) -> f64 {
        self.outputs.first().map_or(0.0, |o| o.rate)
    }
}

fn write_ingredients(f: &mut fmt::Formatter<'_>, list: &[Ingredient]) -> fmt::Result {
    for ing in list {
        if ing.rate > 1.0 {
            writeln!(f, "{:>8}  {}s", ing.rate, ing.item)?;
        } else {
            writeln!(f, "{:>8}  {}", ing.rate, ing.item)?;
        }
    }
    Ok(())
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inputs.len() > 1 {
            writeln!(f, "Inputs:")?;
        } else {
            writeln!(f, "Input:")?;
        }
        write_ingredients(f, &self.inputs)?;

        if self.outputs.len() > 1 {
            writeln!(f, "Outputs:")?;
        } else {
            writeln!(f, "Output:")?;
        }
        write_ingredients(f, &self.outputs)
    }
}

/// A named product in the production graph. Recipes are kept in insertion
/// order; the first one is the designated recipe for solving.
#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub kind: String,
    pub recipes: Vec<Recipe>,
}

impl Item {
    pub fn default_recipe(&self) -> Option<&Recipe> {
        self.recipes.first()
    }

    /// An item with no recipe is a raw resource, treated as externally
    /// supplied in unlimited quantity.
    pub fn is_raw(&self) -> bool {
        self.recipes.is_empty()
    }
}

/// The full set of known items, keyed by name. Built once (from the
/// database or sample data) and read-only while solving.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: HashMap<String, Item>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an item. Re-adding an existing name keeps its recipes and
    /// updates the kind.
    pub fn add_item(&mut self, name: impl Into<String>, kind: impl Into<String>) {
        let name = name.into();
        let kind = kind.into();
        self.items
            .entry(name.clone())
            .and_modify(|i| i.kind = kind.clone())
            .or_insert(Item {
                name,
                kind,
                recipes: Vec::new(),
            });
    }

    /// Builds a recipe whose sole output is `(item, output_rate)` and
    /// appends it to the item's recipe list.
    ///
    /// Input rates are taken as given: duplicates, zero, or negative rates
    /// are not rejected here.
    pub fn add_recipe(
        &mut self,
        item: &str,
        inputs: Vec<Ingredient>,
        output_rate: f64,
        building: Option<String>,
    ) -> Result<&Recipe, CatalogError> {
        let entry = self
            .items
            .get_mut(item)
            .ok_or_else(|| CatalogError::UnknownItem {
                name: item.to_string(),
            })?;
        entry.recipes.push(Recipe {
            inputs,
            outputs: vec![Ingredient::new(item, output_rate)],
            building,
        });
        Ok(entry.recipes.last().expect("recipe just pushed"))
    }

    pub fn get(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// First recipe in insertion order, or `None` for raw items and names
    /// the catalog has never seen.
    pub fn default_recipe(&self, name: &str) -> Option<&Recipe> {
        self.items.get(name).and_then(Item::default_recipe)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
