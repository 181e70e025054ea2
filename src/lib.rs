//! Production-planning KPIs ("to be produced" per material) computed from
//! four SAP spreadsheet extracts: outstanding customer orders, stock and
//! safety stock, in-transit quantities, and unrestricted-use stock tied to
//! specific sales-order line items.
//!
//! The flow is a straight line: load the extracts, expand the business-day
//! horizons, join everything per material number, apply the two shortfall
//! formulas, write the detail workbook, and append the KPI totals to the
//! shared tracking workbook.
//!
//! One invocation processes one line/controller combination at a time; the
//! tracking workbook has no locking, so concurrent invocations against the
//! same file must be serialized by the caller.

pub mod calendar;
pub mod config;
pub mod error;
pub mod loaders;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod shortfall;
