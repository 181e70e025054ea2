//! Report outputs: the per-run detail workbook, the KPI row appended to
//! the shared tracking workbook, and the plain-text error log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use rust_xlsxwriter::{Format, Workbook};
use tracing::warn;
use umya_spreadsheet::Worksheet;

use crate::error::KpiError;
use crate::pipeline::{KpiSummary, MaterialRow};

/// Writes the full joined-and-calculated table to a new workbook named
/// after the controller set, e.g. `output_L1H_L41_L3H.xlsx`. Returns the
/// path of the written file.
pub fn write_detail_report(
    output_dir: &Path,
    controllers: &[String],
    rows: &[MaterialRow],
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    let path = output_dir.join(format!("output_{}.xlsx", controllers.join("_")));

    let horizons: Vec<u32> = rows
        .first()
        .map(|r| r.horizons.iter().map(|h| h.days).collect())
        .unwrap_or_default();

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let bold = Format::new().set_bold();
    for (col, header) in detail_headers(&horizons).iter().enumerate() {
        worksheet.write_with_format(0, col as u16, header.as_str(), &bold)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        let mut col = NextFreeCol::new(0);
        worksheet.write_string(r, col.get(), &row.mat_number)?;
        worksheet.write_number(r, col.get(), row.orders_quantity)?;
        for h in &row.horizons {
            worksheet.write_number(r, col.get(), h.orders_quantity)?;
        }
        worksheet.write_number(r, col.get(), row.stock_quantity)?;
        worksheet.write_number(r, col.get(), row.safety_stock)?;
        worksheet.write_number(r, col.get(), row.transit_quantity)?;
        for h in &row.horizons {
            worksheet.write_number(r, col.get(), h.stock_quantity)?;
        }
        worksheet.write_number(r, col.get(), row.to_be_produced_all)?;
        worksheet.write_number(r, col.get(), row.to_be_produced_gr_c)?;
        for h in &row.horizons {
            worksheet.write_number(r, col.get(), h.to_be_produced_gr_c)?;
        }
    }

    worksheet.autofit();
    workbook
        .save(&path)
        .with_context(|| format!("saving detail report {}", path.display()))?;
    Ok(path)
}

/// Column order of the detail report.
fn detail_headers(horizons: &[u32]) -> Vec<String> {
    let mut headers = vec!["mat_number".to_string(), "orders_quantity".to_string()];
    headers.extend(horizons.iter().map(|h| format!("orders_quantity_{h}_days")));
    headers.push("stock_quantity".to_string());
    headers.push("safety_stock".to_string());
    headers.push("transit_quantity".to_string());
    headers.extend(horizons.iter().map(|h| format!("stock_quantity_{h}_days")));
    headers.push("to_be_produced_all".to_string());
    headers.push("to_be_produced_gr_c".to_string());
    headers.extend(
        horizons
            .iter()
            .map(|h| format!("to_be_produced_gr_c_{h}_days")),
    );
    headers
}

// Hands out consecutive column indices; same trick as in any of our
// column-by-column writers.
struct NextFreeCol {
    inner: u16,
}

impl NextFreeCol {
    fn new(col: u16) -> Self {
        Self { inner: col }
    }

    fn get(&mut self) -> u16 {
        let res = self.inner;
        self.inner += 1;
        res
    }
}

/// Appends one KPI row to the shared tracking workbook, in place.
///
/// The row lands in the first fully-blank row inside the header-defined
/// column range (or right after the last used row). Border and wrap-text
/// formatting is copied from the row above so the framed table stays
/// intact. Values go into the column whose header matches their KPI label;
/// headers with no matching KPI get an empty string. Column A always
/// receives the run date.
pub fn append_kpi_row(
    path: &Path,
    sheet: &str,
    summary: &KpiSummary,
    today: NaiveDate,
) -> Result<()> {
    let mut book = umya_spreadsheet::reader::xlsx::read(path)
        .map_err(|e| anyhow!("cannot open tracking workbook {}: {e}", path.display()))?;
    let ws = book
        .get_sheet_by_name_mut(sheet)
        .ok_or_else(|| KpiError::MissingTrackingSheet {
            sheet: sheet.to_string(),
            path: path.to_path_buf(),
        })?;

    let (max_col, max_row) = ws.get_highest_column_and_row();
    let headers: Vec<String> = (1..=max_col).map(|col| ws.get_value((col, 1))).collect();

    let target = first_blank_row(ws, max_col, max_row);
    ws.insert_new_row(&target, &1);
    if target > 2 {
        copy_row_format(ws, target - 1, target, max_col);
    }

    ws.get_cell_mut((1, target))
        .set_value(today.format("%Y-%m-%d").to_string());
    for (idx, header) in headers.iter().enumerate().skip(1) {
        let col = idx as u32 + 1;
        let cell = ws.get_cell_mut((col, target));
        if header == "LINE" {
            cell.set_value(summary.line.clone());
        } else if let Some(value) = summary.value(header) {
            cell.set_value_number(value);
        } else {
            cell.set_value("");
        }
    }

    umya_spreadsheet::writer::xlsx::write(&book, path)
        .map_err(|e| anyhow!("cannot save tracking workbook {}: {e}", path.display()))
}

/// First row (from 2) whose cells are all blank across the header columns;
/// falls back to the row after the last used one.
fn first_blank_row(ws: &Worksheet, max_col: u32, max_row: u32) -> u32 {
    (2..=max_row)
        .find(|&row| (1..=max_col).all(|col| ws.get_value((col, row)).trim().is_empty()))
        .unwrap_or(max_row + 1)
}

/// Copies border and wrap-text formatting from `source_row` onto
/// `target_row`, leaving fonts, fills and number formats alone.
fn copy_row_format(ws: &mut Worksheet, source_row: u32, target_row: u32, max_col: u32) {
    for col in 1..=max_col {
        let Some(style) = ws.get_cell((col, source_row)).map(|c| c.get_style().clone()) else {
            continue;
        };
        let target_style = ws.get_cell_mut((col, target_row)).get_style_mut();
        if let Some(borders) = style.get_borders() {
            target_style.set_borders(borders.clone());
        }
        if let Some(alignment) = style.get_alignment() {
            target_style
                .get_alignment_mut()
                .set_wrap_text(*alignment.get_wrap_text());
        }
    }
}

/// Appends a timestamped entry to the plain-text error log. Logging must
/// never take the run down with it, so write failures only warn.
pub fn log_error(path: &Path, context: &str, err: &anyhow::Error) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| {
            writeln!(
                file,
                "{} - ERROR - {context}: {err:?}",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            )
        });
    if let Err(io_err) = result {
        warn!("could not write to error log {}: {io_err}", path.display());
    }
}
