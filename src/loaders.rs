//! Loaders for the four spreadsheet extracts.
//!
//! Each loader opens one workbook, locates the localized column headers,
//! coerces cell values, and applies the caller's planner-scope filters.
//! The header strings are part of the contract with the SAP export layouts;
//! a missing header fails the load instead of silently producing an empty
//! aggregate.

use std::collections::BTreeMap;
use std::path::Path;

use calamine::{open_workbook, Data, DataType, Range, Reader, Xlsx};
use chrono::NaiveDate;

use crate::config::SOURCE_SHEET;
use crate::error::KpiError;

// ZSDKAP (outstanding customer orders) headers, German export.
const ORDERS_MAT_NUMBER: &str = "Materialnummer";
const ORDERS_MAT_DESCRIPTION: &str = "Artikeltext";
const ORDERS_ORDER_NUMBER: &str = "Auftrag";
const ORDERS_ORDER_POSITION: &str = "Position";
const ORDERS_MRP_CONTROLLER: &str = "Kontroler MRP";
const ORDERS_QUANTITY: &str = "Menge";
const ORDERS_DISPATCH_DATE: &str = "WA-Datum";

// ZSBE (stock / safety stock) headers, Polish export.
const STOCK_MAT_NUMBER: &str = "Materiał";
const STOCK_MRP_CONTROLLER: &str = "Kontroler MRP";
const STOCK_QUANTITY: &str = "dowolne użycie";
const STOCK_SAFETY: &str = "zapas bezpieczeństwa";

// MB5T (in-transit) headers, Polish export.
const TRANSIT_MAT_NUMBER: &str = "Materiał";
const TRANSIT_QUANTITY: &str = "Ilość zamówienia";

// Reserved unrestricted-use stock per sales-order item, Polish export.
const RESERVED_MAT_NUMBER: &str = "Materiał";
const RESERVED_ORDER_NUMBER: &str = "Zlecenie klienta";
const RESERVED_ORDER_POSITION: &str = "Pozycja";
const RESERVED_QUANTITY: &str = "Dowolne użycie";

/// One outstanding customer-order line after controller/prefix filtering.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub mat_number: String,
    pub customer_order_number: String,
    pub order_position: String,
    pub orders_quantity: f64,
    pub dispatch_date: Option<NaiveDate>,
}

/// Per-material stock figures from the ZSBE extract.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StockFigures {
    pub stock_quantity: f64,
    pub safety_stock: f64,
}

/// Unrestricted-use stock reserved for one sales-order line item.
#[derive(Debug, Clone)]
pub struct ReservedLine {
    pub mat_number: String,
    pub customer_order_number: String,
    pub order_position: String,
    pub reserved_quantity: f64,
}

/// Loads the ZSDKAP order lines for the given MRP controllers.
///
/// Aggregation happens downstream so the horizon expander can re-filter the
/// same lines by dispatch date. `material_prefixes`, when present, keeps
/// only lines whose material description starts with one of the prefixes.
pub fn load_order_lines(
    path: &Path,
    controllers: &[String],
    material_prefixes: Option<&[String]>,
) -> Result<Vec<OrderLine>, KpiError> {
    let range = open_range(path, SOURCE_SHEET)?;

    let mat = column_index(&range, ORDERS_MAT_NUMBER, path)?;
    let desc = column_index(&range, ORDERS_MAT_DESCRIPTION, path)?;
    let order = column_index(&range, ORDERS_ORDER_NUMBER, path)?;
    let position = column_index(&range, ORDERS_ORDER_POSITION, path)?;
    let controller = column_index(&range, ORDERS_MRP_CONTROLLER, path)?;
    let quantity = column_index(&range, ORDERS_QUANTITY, path)?;
    let dispatch = column_index(&range, ORDERS_DISPATCH_DATE, path)?;

    let mut lines = Vec::new();
    for row in range.rows().skip(1) {
        let Some(mat_number) = cell_str(row.get(mat)) else {
            continue;
        };
        let Some(ctrl) = cell_str(row.get(controller)) else {
            continue;
        };
        if !controllers.iter().any(|c| *c == ctrl) {
            continue;
        }
        if let Some(prefixes) = material_prefixes {
            let description = cell_str(row.get(desc)).unwrap_or_default();
            if !prefixes.iter().any(|p| description.starts_with(p.as_str())) {
                continue;
            }
        }

        lines.push(OrderLine {
            mat_number,
            customer_order_number: cell_str(row.get(order)).unwrap_or_default(),
            order_position: cell_str(row.get(position)).unwrap_or_default(),
            orders_quantity: cell_f64(row.get(quantity)).unwrap_or(0.0),
            dispatch_date: cell_date(row.get(dispatch)),
        });
    }

    Ok(lines)
}

/// Loads the ZSBE extract and sums stock and safety stock per material for
/// the given MRP controllers.
pub fn load_stock(
    path: &Path,
    controllers: &[String],
) -> Result<BTreeMap<String, StockFigures>, KpiError> {
    let range = open_range(path, SOURCE_SHEET)?;

    let mat = column_index(&range, STOCK_MAT_NUMBER, path)?;
    let controller = column_index(&range, STOCK_MRP_CONTROLLER, path)?;
    let quantity = column_index(&range, STOCK_QUANTITY, path)?;
    let safety = column_index(&range, STOCK_SAFETY, path)?;

    let mut figures: BTreeMap<String, StockFigures> = BTreeMap::new();
    for row in range.rows().skip(1) {
        let Some(mat_number) = cell_str(row.get(mat)) else {
            continue;
        };
        let Some(ctrl) = cell_str(row.get(controller)) else {
            continue;
        };
        if !controllers.iter().any(|c| *c == ctrl) {
            continue;
        }

        let entry = figures.entry(mat_number).or_default();
        entry.stock_quantity += cell_f64(row.get(quantity)).unwrap_or(0.0);
        entry.safety_stock += cell_f64(row.get(safety)).unwrap_or(0.0);
    }

    Ok(figures)
}

/// Loads the MB5T extract and sums in-transit quantity per material.
///
/// Transit has no controller column; scoping happens through the join with
/// the controller-filtered orders/stock aggregates.
pub fn load_transit(path: &Path) -> Result<BTreeMap<String, f64>, KpiError> {
    let range = open_range(path, SOURCE_SHEET)?;

    let mat = column_index(&range, TRANSIT_MAT_NUMBER, path)?;
    let quantity = column_index(&range, TRANSIT_QUANTITY, path)?;

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for row in range.rows().skip(1) {
        let Some(mat_number) = cell_str(row.get(mat)) else {
            continue;
        };
        *totals.entry(mat_number).or_insert(0.0) += cell_f64(row.get(quantity)).unwrap_or(0.0);
    }

    Ok(totals)
}

/// Loads the unrestricted-use stock reserved per sales-order line item.
///
/// Rows are kept at line-item granularity; the pipeline inner-joins them
/// against open order lines before anything is summed.
pub fn load_reserved_lines(path: &Path) -> Result<Vec<ReservedLine>, KpiError> {
    let range = open_range(path, SOURCE_SHEET)?;

    let mat = column_index(&range, RESERVED_MAT_NUMBER, path)?;
    let order = column_index(&range, RESERVED_ORDER_NUMBER, path)?;
    let position = column_index(&range, RESERVED_ORDER_POSITION, path)?;
    let quantity = column_index(&range, RESERVED_QUANTITY, path)?;

    let mut lines = Vec::new();
    for row in range.rows().skip(1) {
        let Some(mat_number) = cell_str(row.get(mat)) else {
            continue;
        };
        lines.push(ReservedLine {
            mat_number,
            customer_order_number: cell_str(row.get(order)).unwrap_or_default(),
            order_position: cell_str(row.get(position)).unwrap_or_default(),
            reserved_quantity: cell_f64(row.get(quantity)).unwrap_or(0.0),
        });
    }

    Ok(lines)
}

fn open_range(path: &Path, sheet: &str) -> Result<Range<Data>, KpiError> {
    let mut wb: Xlsx<_> = open_workbook(path).map_err(|source| KpiError::OpenWorkbook {
        path: path.to_path_buf(),
        source,
    })?;
    wb.worksheet_range(sheet)
        .map_err(|source| KpiError::MissingSheet {
            sheet: sheet.to_string(),
            path: path.to_path_buf(),
            source,
        })
}

fn column_index(range: &Range<Data>, header: &str, path: &Path) -> Result<usize, KpiError> {
    range
        .headers()
        .and_then(|headers| headers.iter().position(|h| h == header))
        .ok_or_else(|| KpiError::MissingColumn {
            header: header.to_string(),
            path: path.to_path_buf(),
        })
}

/// String coercion for identifier columns. Numeric cells are common when
/// material numbers are all digits; an integral float renders without the
/// trailing `.0`.
fn cell_str(cell: Option<&Data>) -> Option<String> {
    match cell? {
        Data::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Data::Float(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

fn cell_f64(cell: Option<&Data>) -> Option<f64> {
    let cell = cell?;
    cell.as_f64()
        .or_else(|| cell.get_string().and_then(|s| s.trim().parse().ok()))
}

/// Dispatch dates come in either as native Excel datetime cells or as ISO
/// strings, depending on how the extract was saved.
fn cell_date(cell: Option<&Data>) -> Option<NaiveDate> {
    let cell = cell?;
    if let Some(dt) = cell.as_datetime() {
        return Some(dt.date());
    }
    cell.get_string()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}
