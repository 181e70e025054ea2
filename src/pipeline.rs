//! Merge-and-aggregate pipeline: joins the four per-material aggregates,
//! reconciles reserved stock against open order lines, expands the
//! requested horizons, and applies the shortfall formulas.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use crate::calendar::nth_working_day_from;
use crate::config::{Paths, RunSpec};
use crate::loaders::{self, OrderLine, ReservedLine, StockFigures};
use crate::report;
use crate::shortfall::{to_be_produced_all, to_be_produced_gr_c};

/// A horizon in business days together with its resolved calendar cutoff.
#[derive(Debug, Clone, Copy)]
pub struct HorizonCutoff {
    pub days: u32,
    pub cutoff: NaiveDate,
}

/// Resolves each horizon to a dispatch-date cutoff counted from `today`.
pub fn horizon_cutoffs(today: NaiveDate, horizons: &[u32]) -> Result<Vec<HorizonCutoff>> {
    horizons
        .iter()
        .map(|&days| {
            let cutoff = nth_working_day_from(today, days)
                .with_context(|| format!("resolving the {days}-day horizon"))?;
            Ok(HorizonCutoff { days, cutoff })
        })
        .collect()
}

/// Orders/stock snapshot of one material under one horizon. Keeping these
/// as typed records (instead of suffix-named columns) means a missing
/// horizon is unrepresentable rather than a lookup failure.
#[derive(Debug, Clone, Copy)]
pub struct HorizonSnapshot {
    pub days: u32,
    pub orders_quantity: f64,
    pub stock_quantity: f64,
    pub to_be_produced_gr_c: f64,
}

/// One fully joined and calculated material row.
#[derive(Debug, Clone)]
pub struct MaterialRow {
    pub mat_number: String,
    pub orders_quantity: f64,
    pub stock_quantity: f64,
    pub safety_stock: f64,
    pub transit_quantity: f64,
    pub to_be_produced_all: f64,
    pub to_be_produced_gr_c: f64,
    pub horizons: Vec<HorizonSnapshot>,
}

/// The one-row summary appended to the tracking workbook: KPI label to
/// total, in column order, plus the line identifier.
#[derive(Debug, Clone)]
pub struct KpiSummary {
    pub line: String,
    pub values: Vec<(String, f64)>,
}

impl KpiSummary {
    pub fn value(&self, label: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| *v)
    }
}

/// Sums order quantities per material, optionally restricted to lines
/// dispatching on or before `cutoff`. Lines without a dispatch date fall
/// out of every cutoff-restricted aggregate.
pub fn aggregate_orders(
    lines: &[OrderLine],
    cutoff: Option<NaiveDate>,
) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for line in lines {
        if let Some(cutoff) = cutoff {
            match line.dispatch_date {
                Some(date) if date <= cutoff => {}
                _ => continue,
            }
        }
        *totals.entry(line.mat_number.clone()).or_insert(0.0) += line.orders_quantity;
    }
    totals
}

/// Inner-joins reserved stock against open order lines on
/// (material, customer order, order position) and sums the matched
/// quantity per material. The join keys themselves never leave this
/// function.
fn reserved_by_material(
    reserved: &[ReservedLine],
    lines: &[OrderLine],
    cutoff: Option<NaiveDate>,
) -> BTreeMap<String, f64> {
    let open_keys: HashSet<(&str, &str, &str)> = lines
        .iter()
        .filter(|line| match cutoff {
            Some(cutoff) => matches!(line.dispatch_date, Some(date) if date <= cutoff),
            None => true,
        })
        .map(|line| {
            (
                line.mat_number.as_str(),
                line.customer_order_number.as_str(),
                line.order_position.as_str(),
            )
        })
        .collect();

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for line in reserved {
        let key = (
            line.mat_number.as_str(),
            line.customer_order_number.as_str(),
            line.order_position.as_str(),
        );
        if open_keys.contains(&key) {
            *totals.entry(line.mat_number.clone()).or_insert(0.0) += line.reserved_quantity;
        }
    }
    totals
}

/// Builds the joined-and-calculated table.
///
/// Orders and stock are outer-joined (a material present in either source
/// gets a row), transit is left-joined onto the result, and every missing
/// quantity becomes a concrete zero before the formulas run. Reserved
/// stock matched to open order lines is folded into the stock figure, once
/// for the base columns and once per horizon against that horizon's order
/// lines.
pub fn build_material_rows(
    lines: &[OrderLine],
    stock: &BTreeMap<String, StockFigures>,
    transit: &BTreeMap<String, f64>,
    reserved: &[ReservedLine],
    cutoffs: &[HorizonCutoff],
) -> Vec<MaterialRow> {
    let orders_total = aggregate_orders(lines, None);
    let reserved_total = reserved_by_material(reserved, lines, None);

    let per_horizon: Vec<(HorizonCutoff, BTreeMap<String, f64>, BTreeMap<String, f64>)> = cutoffs
        .iter()
        .map(|&hc| {
            (
                hc,
                aggregate_orders(lines, Some(hc.cutoff)),
                reserved_by_material(reserved, lines, Some(hc.cutoff)),
            )
        })
        .collect();

    let materials: BTreeSet<&String> = orders_total.keys().chain(stock.keys()).collect();

    materials
        .into_iter()
        .map(|mat| {
            let orders_quantity = orders_total.get(mat).copied().unwrap_or(0.0);
            let figures = stock.get(mat).copied().unwrap_or_default();
            let transit_quantity = transit.get(mat).copied().unwrap_or(0.0);
            let stock_quantity =
                figures.stock_quantity + reserved_total.get(mat).copied().unwrap_or(0.0);

            let horizons = per_horizon
                .iter()
                .map(|(hc, orders_h, reserved_h)| {
                    let orders = orders_h.get(mat).copied().unwrap_or(0.0);
                    let stock_h =
                        figures.stock_quantity + reserved_h.get(mat).copied().unwrap_or(0.0);
                    HorizonSnapshot {
                        days: hc.days,
                        orders_quantity: orders,
                        stock_quantity: stock_h,
                        to_be_produced_gr_c: to_be_produced_gr_c(
                            orders,
                            stock_h,
                            transit_quantity,
                        ),
                    }
                })
                .collect();

            MaterialRow {
                mat_number: mat.clone(),
                orders_quantity,
                stock_quantity,
                safety_stock: figures.safety_stock,
                transit_quantity,
                to_be_produced_all: to_be_produced_all(
                    orders_quantity,
                    stock_quantity,
                    transit_quantity,
                    figures.safety_stock,
                ),
                to_be_produced_gr_c: to_be_produced_gr_c(
                    orders_quantity,
                    stock_quantity,
                    transit_quantity,
                ),
                horizons,
            }
        })
        .collect()
}

/// Collapses the detail table into the labelled KPI totals for one line.
pub fn summarize(line: &str, rows: &[MaterialRow], horizons: &[u32]) -> KpiSummary {
    let mut values = vec![
        (
            "ORDERS LEVEL (ALL)".to_string(),
            rows.iter().map(|r| r.to_be_produced_all).sum(),
        ),
        (
            "ORDERS LEVEL (GR C)".to_string(),
            rows.iter().map(|r| r.to_be_produced_gr_c).sum(),
        ),
    ];
    for &days in horizons {
        let total = rows
            .iter()
            .flat_map(|r| &r.horizons)
            .filter(|h| h.days == days)
            .map(|h| h.to_be_produced_gr_c)
            .sum();
        values.push((format!("ORDERS LEVEL (GR C - {days})"), total));
    }
    KpiSummary {
        line: line.to_string(),
        values,
    }
}

/// Runs one controller/line iteration end to end: load, join, calculate,
/// write the detail report, and return the KPI summary for the tracking
/// workbook.
pub fn calculate_order_level_kpis(
    paths: &Paths,
    run: &RunSpec,
    horizons: &[u32],
    today: NaiveDate,
) -> Result<KpiSummary> {
    let cutoffs = horizon_cutoffs(today, horizons)?;

    let lines = loaders::load_order_lines(
        &paths.orders,
        &run.controllers,
        run.material_prefixes.as_deref(),
    )
    .context("loading the orders extract")?;
    let stock = loaders::load_stock(&paths.stock, &run.controllers)
        .context("loading the stock extract")?;
    let transit =
        loaders::load_transit(&paths.transit).context("loading the in-transit extract")?;
    let reserved = loaders::load_reserved_lines(&paths.reserved)
        .context("loading the reserved-stock extract")?;

    info!(
        line = %run.line,
        order_lines = lines.len(),
        stock_materials = stock.len(),
        transit_materials = transit.len(),
        reserved_lines = reserved.len(),
        "extracts loaded"
    );

    let rows = build_material_rows(&lines, &stock, &transit, &reserved, &cutoffs);
    let detail = report::write_detail_report(&paths.output_dir, &run.controllers, &rows)?;
    info!(materials = rows.len(), report = %detail.display(), "detail report written");

    Ok(summarize(&run.line, &rows, horizons))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn order(mat: &str, qty: f64, dispatch: Option<NaiveDate>) -> OrderLine {
        OrderLine {
            mat_number: mat.to_string(),
            customer_order_number: "4711".to_string(),
            order_position: "10".to_string(),
            orders_quantity: qty,
            dispatch_date: dispatch,
        }
    }

    #[test]
    fn aggregation_yields_one_entry_per_material() {
        let lines = vec![
            order("A", 10.0, None),
            order("A", 5.0, None),
            order("B", 2.0, None),
        ];
        let totals = aggregate_orders(&lines, None);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals["A"], 15.0);
        assert_eq!(totals["B"], 2.0);
    }

    #[test]
    fn cutoff_drops_late_and_undated_lines() {
        let lines = vec![
            order("A", 10.0, Some(date(8))),
            order("A", 7.0, Some(date(20))),
            order("A", 3.0, None),
        ];
        let totals = aggregate_orders(&lines, Some(date(9)));
        assert_eq!(totals["A"], 10.0);
    }

    #[test]
    fn outer_join_keeps_disjoint_materials_with_zero_fill() {
        let lines = vec![order("A", 100.0, None)];
        let mut stock = BTreeMap::new();
        stock.insert(
            "B".to_string(),
            StockFigures {
                stock_quantity: 40.0,
                safety_stock: 5.0,
            },
        );

        let rows = build_material_rows(&lines, &stock, &BTreeMap::new(), &[], &[]);
        assert_eq!(rows.len(), 2);

        let a = rows.iter().find(|r| r.mat_number == "A").unwrap();
        assert_eq!(a.stock_quantity, 0.0);
        assert_eq!(a.safety_stock, 0.0);
        assert_eq!(a.to_be_produced_all, 100.0);

        // Material without orders: nothing to produce.
        let b = rows.iter().find(|r| r.mat_number == "B").unwrap();
        assert_eq!(b.orders_quantity, 0.0);
        assert_eq!(b.to_be_produced_gr_c, 0.0);
    }

    #[test]
    fn transit_is_left_joined_and_counts_as_supply() {
        let lines = vec![order("A", 100.0, None)];
        let mut stock = BTreeMap::new();
        stock.insert(
            "A".to_string(),
            StockFigures {
                stock_quantity: 30.0,
                safety_stock: 20.0,
            },
        );
        let mut transit = BTreeMap::new();
        transit.insert("A".to_string(), 10.0);
        // Transit for a material in no other source must not create a row.
        transit.insert("Z".to_string(), 99.0);

        let rows = build_material_rows(&lines, &stock, &transit, &[], &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].to_be_produced_all, 80.0);
        assert_eq!(rows[0].to_be_produced_gr_c, 60.0);
    }

    #[test]
    fn horizons_default_to_zero_instead_of_dropping_rows() {
        let lines = vec![
            order("A", 10.0, Some(date(8))),
            order("B", 20.0, None), // no dispatch date at all
        ];
        let cutoffs = [
            HorizonCutoff {
                days: 3,
                cutoff: date(9),
            },
            HorizonCutoff {
                days: 10,
                cutoff: date(20),
            },
        ];

        let rows =
            build_material_rows(&lines, &BTreeMap::new(), &BTreeMap::new(), &[], &cutoffs);
        let b = rows.iter().find(|r| r.mat_number == "B").unwrap();
        assert_eq!(b.horizons.len(), 2);
        assert!(b.horizons.iter().all(|h| h.orders_quantity == 0.0));
        assert!(b.horizons.iter().all(|h| h.to_be_produced_gr_c == 0.0));

        let a = rows.iter().find(|r| r.mat_number == "A").unwrap();
        assert_eq!(a.horizons[0].orders_quantity, 10.0);
        assert_eq!(a.horizons[1].orders_quantity, 10.0);
    }

    #[test]
    fn reserved_stock_needs_a_matching_open_order_line() {
        let lines = vec![order("A", 100.0, Some(date(8)))];
        let reserved = vec![
            ReservedLine {
                mat_number: "A".to_string(),
                customer_order_number: "4711".to_string(),
                order_position: "10".to_string(),
                reserved_quantity: 25.0,
            },
            // Different position: no open line, must not count.
            ReservedLine {
                mat_number: "A".to_string(),
                customer_order_number: "4711".to_string(),
                order_position: "20".to_string(),
                reserved_quantity: 500.0,
            },
        ];

        let rows =
            build_material_rows(&lines, &BTreeMap::new(), &BTreeMap::new(), &reserved, &[]);
        assert_eq!(rows[0].stock_quantity, 25.0);
        assert_eq!(rows[0].to_be_produced_gr_c, 75.0);
    }

    #[test]
    fn horizon_stock_only_sees_reserved_lines_within_the_cutoff() {
        let lines = vec![
            order("A", 10.0, Some(date(8))),
            OrderLine {
                mat_number: "A".to_string(),
                customer_order_number: "4712".to_string(),
                order_position: "10".to_string(),
                orders_quantity: 30.0,
                dispatch_date: Some(date(20)),
            },
        ];
        let reserved = vec![ReservedLine {
            mat_number: "A".to_string(),
            customer_order_number: "4712".to_string(),
            order_position: "10".to_string(),
            reserved_quantity: 12.0,
        }];
        let cutoffs = [HorizonCutoff {
            days: 3,
            cutoff: date(9),
        }];

        let rows =
            build_material_rows(&lines, &BTreeMap::new(), &BTreeMap::new(), &reserved, &cutoffs);
        let a = &rows[0];
        // Base figure matches against all open lines.
        assert_eq!(a.stock_quantity, 12.0);
        // The 3-day horizon only contains order 4711, so the reserved stock
        // tied to 4712 does not count there.
        assert_eq!(a.horizons[0].stock_quantity, 0.0);
        assert_eq!(a.horizons[0].orders_quantity, 10.0);
        assert_eq!(a.horizons[0].to_be_produced_gr_c, 10.0);
    }

    #[test]
    fn summary_totals_and_labels() {
        let lines = vec![order("A", 100.0, Some(date(8)))];
        let mut stock = BTreeMap::new();
        stock.insert(
            "A".to_string(),
            StockFigures {
                stock_quantity: 30.0,
                safety_stock: 20.0,
            },
        );
        let mut transit = BTreeMap::new();
        transit.insert("A".to_string(), 10.0);
        let cutoffs = [HorizonCutoff {
            days: 3,
            cutoff: date(9),
        }];

        let rows = build_material_rows(&lines, &stock, &transit, &[], &cutoffs);
        let summary = summarize("P100", &rows, &[3]);

        assert_eq!(summary.line, "P100");
        assert_eq!(summary.value("ORDERS LEVEL (ALL)"), Some(80.0));
        assert_eq!(summary.value("ORDERS LEVEL (GR C)"), Some(60.0));
        assert_eq!(summary.value("ORDERS LEVEL (GR C - 3)"), Some(60.0));
        assert_eq!(summary.value("ORDERS LEVEL (GR C - 10)"), None);
    }
}
