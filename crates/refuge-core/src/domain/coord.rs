//! Geographic coordinate

use serde::{Deserialize, Serialize};

/// A WGS84 point in decimal degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub long: f64,
}

impl Coord {
    pub fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }

    /// Finite and within [-90, 90] x [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.long.is_finite()
            && self.lat.abs() <= 90.0
            && self.long.abs() <= 180.0
    }

    /// Total number of decimal digits carried by lat and long.
    ///
    /// Used to pick the more precise of two coordinates for the same place.
    pub fn precision(&self) -> usize {
        decimal_places(self.lat) + decimal_places(self.long)
    }
}

/// Decimal digits in the shortest round-trip representation of `value`.
pub fn decimal_places(value: f64) -> usize {
    if !value.is_finite() {
        return 0;
    }
    let text = value.to_string();
    match text.split_once('.') {
        Some((_, fraction)) => fraction.len(),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_places() {
        assert_eq!(decimal_places(42.8011), 4);
        assert_eq!(decimal_places(42.801), 3);
        assert_eq!(decimal_places(1.0), 0);
        assert_eq!(decimal_places(-0.12345678), 8);
        assert_eq!(decimal_places(f64::NAN), 0);
    }

    #[test]
    fn test_precision_sums_both_axes() {
        assert_eq!(Coord::new(42.8010, 0.6270).precision(), 6);
        assert_eq!(Coord::new(42.8011, 0.6271).precision(), 8);
    }

    #[test]
    fn test_validity() {
        assert!(Coord::new(42.5, 1.5).is_valid());
        assert!(Coord::new(-90.0, 180.0).is_valid());
        assert!(!Coord::new(91.0, 0.0).is_valid());
        assert!(!Coord::new(0.0, -180.5).is_valid());
        assert!(!Coord::new(f64::INFINITY, 0.0).is_valid());
    }
}
