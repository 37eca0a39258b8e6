//! Pure alert conditions, no state.

use watch_core::CrossDirection;

/// Fraction of the indicator value that counts as touching (1%)
pub const DEFAULT_BAND: f64 = 0.01;

/// Price within `band` (a fraction) of a moving-average value, bounds inclusive
pub fn touches_band(price: f64, ma: f64, band: f64) -> bool {
    let lower = ma * (1.0 - band);
    let upper = ma * (1.0 + band);
    lower <= price && price <= upper
}

/// Crossing of `target` between two consecutive observations.
///
/// Upward: `prev < target <= current`. Downward: `prev > target >= current`.
/// Without a previous observation nothing can cross.
pub fn crossing(previous: Option<f64>, current: f64, target: f64) -> Option<CrossDirection> {
    let prev = previous?;
    if prev < target && target <= current {
        Some(CrossDirection::Up)
    } else if prev > target && target >= current {
        Some(CrossDirection::Down)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges() {
        assert!(touches_band(101.0, 100.0, DEFAULT_BAND));
        assert!(touches_band(99.0, 100.0, DEFAULT_BAND));
        assert!(touches_band(100.0, 100.0, DEFAULT_BAND));
        assert!(!touches_band(101.01, 100.0, DEFAULT_BAND));
        assert!(!touches_band(98.99, 100.0, DEFAULT_BAND));
    }

    #[test]
    fn test_wider_band() {
        assert!(touches_band(102.5, 100.0, 0.03));
        assert!(!touches_band(102.5, 100.0, 0.02));
    }

    #[test]
    fn test_crossing_up() {
        assert_eq!(crossing(Some(48.0), 52.0, 50.0), Some(CrossDirection::Up));
        // Landing exactly on the target counts
        assert_eq!(crossing(Some(48.0), 50.0, 50.0), Some(CrossDirection::Up));
        assert_eq!(crossing(Some(45.0), 48.0, 50.0), None);
    }

    #[test]
    fn test_crossing_down() {
        assert_eq!(crossing(Some(52.0), 49.0, 50.0), Some(CrossDirection::Down));
        assert_eq!(crossing(Some(52.0), 50.0, 50.0), Some(CrossDirection::Down));
        assert_eq!(crossing(Some(55.0), 52.0, 50.0), None);
    }

    #[test]
    fn test_no_cross_without_previous_or_from_target() {
        assert_eq!(crossing(None, 52.0, 50.0), None);
        // Starting on the target and moving away is not a cross
        assert_eq!(crossing(Some(50.0), 52.0, 50.0), None);
        assert_eq!(crossing(Some(50.0), 48.0, 50.0), None);
    }
}
