//! Deadline helpers for the refinement loop.

use std::time::{Duration, Instant};

pub(crate) fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    match deadline {
        Some(deadline) => Instant::now() >= deadline,
        None => false,
    }
}

pub(crate) fn deadline_from_timeout_secs(timeout_secs: u64) -> Option<Instant> {
    if timeout_secs == 0 {
        None
    } else {
        Instant::now().checked_add(Duration::from_secs(timeout_secs))
    }
}

pub(crate) fn timeout_unknown_reason(context: &str) -> String {
    format!("{context} timed out before completion.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_means_no_deadline() {
        assert_eq!(deadline_from_timeout_secs(0), None);
        assert!(!deadline_exceeded(None));
    }

    #[test]
    fn past_deadline_is_exceeded() {
        let past = Instant::now().checked_sub(Duration::from_millis(1));
        assert!(deadline_exceeded(past));
        assert!(!deadline_exceeded(deadline_from_timeout_secs(3600)));
    }
}
