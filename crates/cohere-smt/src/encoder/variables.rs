//! Variable naming conventions for the program encoding.
//!
//! - `exec_e`: event `e` executes
//! - `rf_w_r`: read `r` takes its value from write `w`
//! - `val_e`: value read, written or computed by event `e`
//! - `clk_e`: position of memory event `e` in the po-loc/rf approximation

use cohere_ir::EventId;

pub fn exec_var(event: EventId) -> String {
    format!("exec_{event}")
}

pub fn rf_var(write: EventId, read: EventId) -> String {
    format!("rf_{write}_{read}")
}

pub fn val_var(event: EventId) -> String {
    format!("val_{event}")
}

pub fn clock_var(event: EventId) -> String {
    format!("clk_{event}")
}

/// Inverse of [`rf_var`].
pub fn parse_rf_var(name: &str) -> Option<(EventId, EventId)> {
    let rest = name.strip_prefix("rf_")?;
    let (w, r) = rest.split_once('_')?;
    Some((w.parse().ok()?, r.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rf_names_round_trip() {
        assert_eq!(parse_rf_var(&rf_var(3, 17)), Some((3, 17)));
        assert_eq!(parse_rf_var("exec_3"), None);
        assert_eq!(parse_rf_var("rf_x_1"), None);
    }
}
