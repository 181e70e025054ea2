//! Run configuration: where the extracts live and which planner scopes to
//! process. Everything is an explicit value passed down the pipeline, there
//! is no global path state.

use std::path::{Path, PathBuf};

/// Forward-looking horizons, in business days.
pub const DEFAULT_HORIZONS: [u32; 3] = [3, 5, 10];

/// All four SAP extracts export onto this sheet.
pub const SOURCE_SHEET: &str = "Sheet1";

/// Sheet of the shared tracking workbook that receives the KPI rows.
pub const TRACKING_SHEET: &str = "LUB";

/// Resolved locations of the four input extracts and the run outputs.
#[derive(Debug, Clone)]
pub struct Paths {
    /// ZSDKAP outstanding customer orders.
    pub orders: PathBuf,
    /// ZSBE stock / safety-stock extract.
    pub stock: PathBuf,
    /// MB5T in-transit quantities.
    pub transit: PathBuf,
    /// Unrestricted-use stock tied to sales-order line items.
    pub reserved: PathBuf,
    /// Directory receiving the per-run detail workbooks.
    pub output_dir: PathBuf,
    /// Shared tracking workbook the KPI summary rows are appended to.
    pub tracking_file: PathBuf,
    /// Append-only plain-text error log.
    pub error_log: PathBuf,
}

impl Paths {
    /// Builds the path set from a base directory and the report names the
    /// extracts were saved under (without the `.xlsx` extension).
    pub fn from_report_names(
        base: &Path,
        orders_report: &str,
        stock_report: &str,
        transit_report: &str,
        reserved_report: &str,
    ) -> Self {
        Self {
            orders: base.join(format!("{orders_report}.xlsx")),
            stock: base.join(format!("{stock_report}.xlsx")),
            transit: base.join(format!("{transit_report}.xlsx")),
            reserved: base.join(format!("{reserved_report}.xlsx")),
            output_dir: base.join("output"),
            tracking_file: base.join("KPIs_source_data.xlsx"),
            error_log: base.join("error.log"),
        }
    }
}

/// One batch iteration: a production line and the planner scope that feeds it.
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Line identifier written into the tracking workbook's LINE column.
    pub line: String,
    /// MRP controller codes owning the materials of this line.
    pub controllers: Vec<String>,
    /// Optional material-description prefixes narrowing the orders extract.
    pub material_prefixes: Option<Vec<String>>,
}
