//! The two "to be produced" formulas, applied per material row.
//!
//! Inputs are expected to be zero-filled by the join step; neither formula
//! ever returns a negative quantity.

/// Policy "ALL": safety stock counts on top of the open orders.
///
/// If there is a safety-stock target and available supply already covers
/// orders plus that target, nothing needs to be produced. Otherwise produce
/// whatever is missing to reach orders + safety stock. The branch structure
/// mirrors the planning department's original rule, asymmetric against
/// [`to_be_produced_gr_c`] on purpose.
pub fn to_be_produced_all(orders: f64, stock: f64, transit: f64, safety_stock: f64) -> f64 {
    let available = stock + transit;
    if safety_stock > 0.0 && available - orders >= safety_stock {
        return 0.0;
    }
    (orders + safety_stock - available).max(0.0)
}

/// Policy "GR C": plain shortfall of orders against available supply.
pub fn to_be_produced_gr_c(orders: f64, stock: f64, transit: f64) -> f64 {
    (orders - (stock + transit)).max(0.0)
}
