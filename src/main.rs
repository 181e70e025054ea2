//! Batch entry point: runs the KPI pipeline for the fixed list of
//! line/controller combinations and appends each summary to the tracking
//! workbook. A failed run is logged and skipped; if anything failed the
//! process pauses for acknowledgment before exiting non-zero.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use tracing::{error, info};

use pps_kpis::config::{Paths, RunSpec, DEFAULT_HORIZONS, TRACKING_SHEET};
use pps_kpis::{logging, pipeline, report};

fn main() {
    logging::init();
    if let Err(err) = run() {
        error!("pipeline halted: {err:#}");
        pause();
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let paths = Paths::from_report_names(
        Path::new("excel_files"),
        "zsdkap2",
        "ZSBE_r4_r7",
        "MB5T_from_2101_to_all_plants",
        "MB52_by_order",
    );

    let runs = vec![
        RunSpec {
            line: "P100".to_string(),
            controllers: vec!["L1K".to_string()],
            material_prefixes: None,
        },
        RunSpec {
            line: "M200".to_string(),
            controllers: vec!["L1H".to_string(), "L41".to_string(), "L3H".to_string()],
            material_prefixes: Some(vec!["GR".to_string()]),
        },
    ];

    let today = Local::now().date_naive();
    let mut failures = 0;
    for run in &runs {
        match process(&paths, run, today) {
            Ok(()) => info!("KPIs updated successfully - {}", run.line),
            Err(err) => {
                failures += 1;
                error!("run {} failed: {err:#}", run.line);
                report::log_error(&paths.error_log, &format!("run {}", run.line), &err);
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} runs failed, see {}", runs.len(), paths.error_log.display());
    }
    Ok(())
}

fn process(paths: &Paths, run: &RunSpec, today: NaiveDate) -> Result<()> {
    let summary = pipeline::calculate_order_level_kpis(paths, run, &DEFAULT_HORIZONS, today)?;
    report::append_kpi_row(&paths.tracking_file, TRACKING_SHEET, &summary, today)
        .with_context(|| format!("appending KPIs for line {}", run.line))
}

fn pause() {
    print!("Press Enter to continue...");
    io::stdout().flush().ok();
    let mut ack = String::new();
    io::stdin().lock().read_line(&mut ack).ok();
}
