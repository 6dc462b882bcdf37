//! Demand-propagation solver
//!
//! Turns a set of target output rates into a full production plan: for
//! every item the chain touches, how much is demanded, how much gets
//! produced, and how many facilities run its recipe. Demand is propagated
//! by fixed-point iteration: each pass recomputes facility counts from the
//! previous pass's aggregate demand and pushes the resulting input demand
//! one layer further down the graph, until supply covers demand everywhere.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::models::Catalog;

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("unknown target item '{name}'")]
    UnknownItem { name: String },
    #[error("demand did not converge after {passes} passes; the recipe graph contains a cycle")]
    NonConvergence { passes: usize },
}

/// Who is demanding an item: the caller's requested final output, or
/// another item's recipe consuming it as an ingredient.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Consumer {
    Output,
    Item(String),
}

impl fmt::Display for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consumer::Output => write!(f, "output"),
            Consumer::Item(name) => write!(f, "{}", name),
        }
    }
}

/// Per-item solver state, returned as the final plan entry for the item.
///
/// `required` is always the sum of `requirements`' values after a pass,
/// `leftover` is `supplied - required`, and `solved` tracks `leftover`'s
/// sign. `multiplier` stays 0 for raw items, which have no facilities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemandStatus {
    pub requirements: BTreeMap<Consumer, f64>,
    pub required: f64,
    pub supplied: f64,
    pub multiplier: f64,
    pub leftover: f64,
    pub solved: bool,
}

impl DemandStatus {
    fn demanded_by(consumer: Consumer, quantity: f64) -> Self {
        DemandStatus {
            requirements: BTreeMap::from([(consumer, quantity)]),
            required: quantity,
            ..DemandStatus::default()
        }
    }
}

/// A fully resolved production plan, keyed by item name.
pub type Plan = BTreeMap<String, DemandStatus>;

/// Solve the supply chain for the given target output rates.
///
/// With `integral` set, facility counts are rounded up to whole
/// facilities, so production never under-provisions; otherwise the
/// multiplier is the exact fractional capacity and supply matches demand
/// for every produced item.
///
/// The catalog is read-only; all working state is local to the call.
/// Items without a recipe are raw inputs: their supply is pegged to their
/// demand and they generate no further demand.
pub fn solve(catalog: &Catalog, targets: &[(String, f64)], integral: bool) -> Result<Plan, SolveError> {
    for (name, _) in targets {
        if !catalog.contains(name) {
            return Err(SolveError::UnknownItem { name: name.clone() });
        }
    }

    let mut plan = Plan::new();
    for (name, quantity) in targets {
        plan.insert(
            name.clone(),
            DemandStatus::demanded_by(Consumer::Output, *quantity),
        );
    }

    let mut passes = 0;
    loop {
        // An acyclic graph settles one dependency layer per pass, so it
        // converges well within one pass per tracked item. Running past
        // that bound means the recipe graph loops back on itself.
        if passes > plan.len() + 1 {
            return Err(SolveError::NonConvergence { passes });
        }
        passes += 1;

        // Snapshot-and-recompute: every update this pass reads the
        // previous pass's figures and writes the working copy.
        let mut next = plan.clone();
        for (name, status) in &plan {
            let Some(recipe) = catalog.default_recipe(name) else {
                next.get_mut(name).expect("tracked item").supplied = status.required;
                continue;
            };

            if status.supplied >= status.required {
                continue;
            }

            let output_rate = recipe.output_rate();
            let multiplier = if integral {
                (status.required / output_rate).ceil()
            } else {
                status.required / output_rate
            };

            let current = next.get_mut(name).expect("tracked item");
            current.multiplier = multiplier;
            current.supplied = output_rate * multiplier;

            for input in &recipe.inputs {
                let demand = input.rate * multiplier;
                next.entry(input.item.clone())
                    .and_modify(|s| {
                        s.requirements.insert(Consumer::Item(name.clone()), demand);
                    })
                    .or_insert_with(|| {
                        DemandStatus::demanded_by(Consumer::Item(name.clone()), demand)
                    });
            }
        }

        plan = next;

        let mut all_solved = true;
        for status in plan.values_mut() {
            status.required = status.requirements.values().sum();
            status.leftover = status.supplied - status.required;
            status.solved = status.leftover >= 0.0;
            all_solved &= status.solved;
        }
        if all_solved {
            return Ok(plan);
        }
    }
}

/// Format the full plan as a readable per-item breakdown.
pub fn format_plan(catalog: &Catalog, plan: &Plan) -> String {
    let mut output = String::new();

    for (name, status) in plan {
        if catalog.default_recipe(name).is_some() {
            output.push_str(&format!(
                "{} @ {:.3}/min ({:.2} facilities, {:.3}/min surplus)\n",
                name, status.supplied, status.multiplier, status.leftover
            ));
        } else {
            output.push_str(&format!("{} @ {:.3}/min (raw input)\n", name, status.supplied));
        }
        for (consumer, quantity) in &status.requirements {
            output.push_str(&format!("  {:.3}/min for {}\n", quantity, consumer));
        }
    }

    output
}

/// One produced item's facility requirement in a [`PlanSummary`].
#[derive(Debug, Clone)]
pub struct FacilityCount {
    pub item: String,
    pub count: f64,
    pub building: Option<String>,
}

/// Summary of a solved plan
#[derive(Debug)]
pub struct PlanSummary {
    pub targets: Vec<(String, f64)>,
    pub facilities: Vec<FacilityCount>,
    pub raw_inputs: Vec<(String, f64)>,
}

/// Condense a plan into facility counts for produced items and total
/// rates for raw inputs.
pub fn summarize_plan(catalog: &Catalog, plan: &Plan, targets: &[(String, f64)]) -> PlanSummary {
    let mut facilities = Vec::new();
    let mut raw_inputs = Vec::new();

    for (name, status) in plan {
        match catalog.default_recipe(name) {
            Some(recipe) => facilities.push(FacilityCount {
                item: name.clone(),
                count: status.multiplier,
                building: recipe.building.clone(),
            }),
            None => raw_inputs.push((name.clone(), status.required)),
        }
    }

    PlanSummary {
        targets: targets.to_vec(),
        facilities,
        raw_inputs,
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Production Plan ===")?;
        for (name, rate) in &self.targets {
            writeln!(f, "Target: {} @ {:.3}/min", name, rate)?;
        }
        writeln!(f)?;

        writeln!(f, "Facilities required:")?;
        for facility in &self.facilities {
            match &facility.building {
                Some(building) => {
                    writeln!(f, "  {:.2}x {} ({})", facility.count, facility.item, building)?
                }
                None => writeln!(f, "  {:.2}x {}", facility.count, facility.item)?,
            }
        }
        writeln!(f)?;

        writeln!(f, "Raw inputs required:")?;
        for (name, rate) in &self.raw_inputs {
            writeln!(f, "  {} @ {:.3}/min", name, rate)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ingredient;

    fn targets(list: &[(&str, f64)]) -> Vec<(String, f64)> {
        list.iter().map(|(n, q)| (n.to_string(), *q)).collect()
    }

    /// IronOre (raw) -> IronIngot (30/min from 30 ore/min)
    ///               -> IronPlate (20/min from 30 ingots/min)
    fn plate_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add_item("IronOre", "Ore");
        catalog.add_item("IronIngot", "Ingot");
        catalog.add_item("IronPlate", "Component");
        catalog
            .add_recipe(
                "IronIngot",
                vec![Ingredient::new("IronOre", 30.0)],
                30.0,
                Some("Smelter".to_string()),
            )
            .unwrap();
        catalog
            .add_recipe(
                "IronPlate",
                vec![Ingredient::new("IronIngot", 30.0)],
                20.0,
                Some("Constructor".to_string()),
            )
            .unwrap();
        catalog
    }

    /// Minimal version of the worked example: IronIngot is raw here.
    fn shallow_plate_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add_item("IronIngot", "Ingot");
        catalog.add_item("IronPlate", "Component");
        catalog
            .add_recipe(
                "IronPlate",
                vec![Ingredient::new("IronIngot", 30.0)],
                20.0,
                None,
            )
            .unwrap();
        catalog
    }

    fn assert_invariants(plan: &Plan) {
        for (name, status) in plan {
            let sum: f64 = status.requirements.values().sum();
            assert_eq!(status.required, sum, "conservation violated for {}", name);
            assert_eq!(status.leftover, status.supplied - status.required);
            assert!(status.solved, "{} left unsolved", name);
            assert!(
                status.supplied >= status.required,
                "{} under-supplied: {} < {}",
                name,
                status.supplied,
                status.required
            );
        }
    }

    #[test]
    fn integral_worked_example() {
        let catalog = shallow_plate_catalog();
        let plan = solve(&catalog, &targets(&[("IronPlate", 45.0)]), true).unwrap();

        let plate = &plan["IronPlate"];
        assert_eq!(plate.multiplier, 3.0);
        assert_eq!(plate.supplied, 60.0);
        assert_eq!(plate.required, 45.0);
        assert_eq!(plate.leftover, 15.0);

        let ingot = &plan["IronIngot"];
        assert_eq!(ingot.required, 90.0);
        assert_eq!(ingot.supplied, 90.0);
        assert!(ingot.solved);
        assert_invariants(&plan);
    }

    #[test]
    fn fractional_worked_example() {
        let catalog = shallow_plate_catalog();
        let plan = solve(&catalog, &targets(&[("IronPlate", 45.0)]), false).unwrap();

        let plate = &plan["IronPlate"];
        assert_eq!(plate.multiplier, 2.25);
        assert_eq!(plate.supplied, 45.0);
        assert_eq!(plate.leftover, 0.0);
        assert_eq!(plan["IronIngot"].required, 67.5);
        assert_invariants(&plan);
    }

    #[test]
    fn demand_propagates_through_two_levels() {
        let catalog = plate_catalog();
        let plan = solve(&catalog, &targets(&[("IronPlate", 45.0)]), true).unwrap();

        // 3 constructors need 90 ingots/min -> 3 smelters -> 90 ore/min.
        assert_eq!(plan["IronPlate"].multiplier, 3.0);
        assert_eq!(plan["IronIngot"].required, 90.0);
        assert_eq!(plan["IronIngot"].multiplier, 3.0);
        assert_eq!(plan["IronIngot"].supplied, 90.0);
        assert_eq!(plan["IronOre"].required, 90.0);
        assert_eq!(plan["IronOre"].supplied, 90.0);
        assert_invariants(&plan);
    }

    #[test]
    fn raw_item_short_circuits() {
        let catalog = plate_catalog();
        let plan = solve(&catalog, &targets(&[("IronOre", 12345.0)]), true).unwrap();

        let ore = &plan["IronOre"];
        assert_eq!(ore.supplied, 12345.0);
        assert_eq!(ore.required, 12345.0);
        assert_eq!(ore.multiplier, 0.0);
        assert!(ore.solved);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn shared_ingredient_aggregates_across_consumers() {
        // Rod and Plate both consume IronIngot; its demand must be the sum.
        let mut catalog = plate_catalog();
        catalog.add_item("IronRod", "Component");
        catalog
            .add_recipe(
                "IronRod",
                vec![Ingredient::new("IronIngot", 15.0)],
                15.0,
                Some("Constructor".to_string()),
            )
            .unwrap();

        let plan = solve(
            &catalog,
            &targets(&[("IronPlate", 40.0), ("IronRod", 30.0)]),
            true,
        )
        .unwrap();

        let ingot = &plan["IronIngot"];
        // 2 plate facilities x 30 + 2 rod facilities x 15
        assert_eq!(ingot.requirements[&Consumer::Item("IronPlate".to_string())], 60.0);
        assert_eq!(ingot.requirements[&Consumer::Item("IronRod".to_string())], 30.0);
        assert_eq!(ingot.required, 90.0);
        assert_invariants(&plan);
    }

    #[test]
    fn target_requirements_keep_output_sentinel() {
        let catalog = plate_catalog();
        let plan = solve(&catalog, &targets(&[("IronPlate", 45.0)]), true).unwrap();
        assert_eq!(plan["IronPlate"].requirements[&Consumer::Output], 45.0);
    }

    #[test]
    fn produced_target_also_consumed_midchain() {
        // Asking for ingots directly while plates also consume them.
        let catalog = plate_catalog();
        let plan = solve(
            &catalog,
            &targets(&[("IronPlate", 20.0), ("IronIngot", 30.0)]),
            true,
        )
        .unwrap();

        let ingot = &plan["IronIngot"];
        assert_eq!(ingot.requirements[&Consumer::Output], 30.0);
        assert_eq!(ingot.requirements[&Consumer::Item("IronPlate".to_string())], 30.0);
        assert_eq!(ingot.required, 60.0);
        assert_eq!(ingot.supplied, 60.0);
        assert_invariants(&plan);
    }

    #[test]
    fn fractional_supply_matches_demand_exactly() {
        let catalog = plate_catalog();
        let plan = solve(&catalog, &targets(&[("IronPlate", 45.0)]), false).unwrap();
        for (name, status) in &plan {
            if catalog.default_recipe(name).is_some() {
                assert_eq!(status.supplied, status.required, "{} over-supplied", name);
            }
        }
    }

    #[test]
    fn zero_rate_target_is_trivially_solved() {
        let catalog = plate_catalog();
        let plan = solve(&catalog, &targets(&[("IronPlate", 0.0)]), true).unwrap();
        let plate = &plan["IronPlate"];
        assert_eq!(plate.required, 0.0);
        assert!(plate.solved);
    }

    #[test]
    fn deep_chain_converges() {
        // A ten-stage refinement chain, 1:1 rates throughout.
        let mut catalog = Catalog::new();
        catalog.add_item("Stage0", "Raw");
        for i in 1..=10 {
            let name = format!("Stage{}", i);
            catalog.add_item(&name, "Intermediate");
            catalog
                .add_recipe(
                    &name,
                    vec![Ingredient::new(format!("Stage{}", i - 1), 10.0)],
                    10.0,
                    None,
                )
                .unwrap();
        }

        let plan = solve(&catalog, &targets(&[("Stage10", 25.0)]), true).unwrap();
        assert_eq!(plan.len(), 11);
        assert_eq!(plan["Stage0"].required, 30.0);
        assert_invariants(&plan);
    }

    #[test]
    fn cyclic_graph_fails_fast() {
        let mut catalog = Catalog::new();
        catalog.add_item("Chicken", "Animal");
        catalog.add_item("Egg", "Animal");
        catalog
            .add_recipe("Chicken", vec![Ingredient::new("Egg", 1.0)], 1.0, None)
            .unwrap();
        catalog
            .add_recipe("Egg", vec![Ingredient::new("Chicken", 2.0)], 1.0, None)
            .unwrap();

        let err = solve(&catalog, &targets(&[("Chicken", 5.0)]), true).unwrap_err();
        assert!(matches!(err, SolveError::NonConvergence { .. }));
    }

    #[test]
    fn unknown_target_is_rejected() {
        let catalog = plate_catalog();
        let err = solve(&catalog, &targets(&[("Plutonium", 1.0)]), true).unwrap_err();
        assert!(matches!(err, SolveError::UnknownItem { name } if name == "Plutonium"));
    }

    #[test]
    fn summary_splits_facilities_from_raw_inputs() {
        let catalog = plate_catalog();
        let target_list = targets(&[("IronPlate", 45.0)]);
        let plan = solve(&catalog, &target_list, true).unwrap();
        let summary = summarize_plan(&catalog, &plan, &target_list);

        let items: Vec<&str> = summary.facilities.iter().map(|f| f.item.as_str()).collect();
        assert_eq!(items, vec!["IronIngot", "IronPlate"]);
        assert_eq!(summary.raw_inputs, vec![("IronOre".to_string(), 90.0)]);

        let plate = summary
            .facilities
            .iter()
            .find(|f| f.item == "IronPlate")
            .unwrap();
        assert_eq!(plate.count, 3.0);
        assert_eq!(plate.building.as_deref(), Some("Constructor"));

        let text = summary.to_string();
        assert!(text.contains("Target: IronPlate @ 45.000/min"));
        assert!(text.contains("3.00x IronPlate (Constructor)"));
        assert!(text.contains("IronOre @ 90.000/min"));
    }
}
