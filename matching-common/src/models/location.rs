//! Geographic location value

use serde::{Deserialize, Serialize};

/// Mean earth radius used by the spherical approximation
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Default::default()
        }
    }

    /// Great-circle distance in kilometres (haversine)
    pub fn distance_km(&self, other: &Location) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }

    pub fn is_within_range(&self, other: &Location, max_distance_km: f64) -> bool {
        self.distance_km(other) <= max_distance_km
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let here = Location::new(31.2304, 121.4737);
        assert!(here.distance_km(&here).abs() < 1e-9);
    }

    #[test]
    fn test_known_city_distance() {
        // Shanghai to Beijing is roughly 1067 km along the great circle
        let shanghai = Location::new(31.2304, 121.4737);
        let beijing = Location::new(39.9042, 116.4074);
        let d = shanghai.distance_km(&beijing);
        assert!((d - 1067.0).abs() < 10.0, "got {}", d);
        assert!((beijing.distance_km(&shanghai) - d).abs() < 1e-9);
    }

    #[test]
    fn test_within_range() {
        let a = Location::new(0.0, 0.0);
        // One degree of longitude at the equator is ~111.2 km
        let b = Location::new(0.0, 1.0);
        assert!(a.is_within_range(&b, 120.0));
        assert!(!a.is_within_range(&b, 100.0));
    }
}
