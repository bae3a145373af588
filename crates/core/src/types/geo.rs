//! Geographic coordinates, distances and map-link parsing.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Errors produced when building [`Coordinates`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    #[error("latitude must be between -90 and 90 (got {0})")]
    LatitudeOutOfRange(f64),
    #[error("longitude must be between -180 and 180 (got {0})")]
    LongitudeOutOfRange(f64),
    #[error("expected \"lat,lng\"")]
    Malformed,
}

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build coordinates, rejecting out-of-range or non-finite values.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] when either component is out of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Build coordinates from two optional columns; both must be present.
    #[must_use]
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        Self::new(latitude?, longitude?).ok()
    }

    /// Great-circle distance in kilometres (haversine).
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lng = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }

    /// `"lat,lng"` form used by the Google Maps web services.
    #[must_use]
    pub fn to_query_value(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl std::str::FromStr for Coordinates {
    type Err = GeoError;

    /// Parse `"lat,lng"` (whitespace around either number is ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s.split_once(',').ok_or(GeoError::Malformed)?;
        let lat = lat.trim().parse::<f64>().map_err(|_| GeoError::Malformed)?;
        let lng = lng.trim().parse::<f64>().map_err(|_| GeoError::Malformed)?;
        Self::new(lat, lng)
    }
}

/// Place pin embedded in Google Maps place URLs (`!3d<lat>!4d<lng>`).
static PIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!3d(-?\d{1,3}(?:\.\d+)?)!4d(-?\d{1,3}(?:\.\d+)?)").expect("Invalid regex")
});

/// Coordinates passed as a query parameter (`q=`, `query=`, `ll=`, `destination=`, `daddr=`).
static QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[?&](?:q|query|ll|destination|daddr)=(-?\d{1,3}(?:\.\d+)?)(?:,|%2C)\s*(?:\+|%20)*(-?\d{1,3}(?:\.\d+)?)",
    )
    .expect("Invalid regex")
});

/// Viewport centre (`@<lat>,<lng>,<zoom>z`).
static VIEWPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(-?\d{1,3}(?:\.\d+)?),(-?\d{1,3}(?:\.\d+)?)").expect("Invalid regex")
});

/// Extract coordinates from a map link or a bare `"lat,lng"` string.
///
/// Patterns are tried from most to least precise: the place pin, an explicit
/// query parameter, then the viewport centre. Matches that fall outside the
/// valid coordinate range are skipped.
///
/// ```
/// use bazaar_core::extract_coordinates;
///
/// let url = "https://www.google.com/maps/place/Cubbon+Park/@12.9763,77.5929,17z";
/// let at = extract_coordinates(url).unwrap();
/// assert!((at.latitude - 12.9763).abs() < 1e-9);
/// ```
#[must_use]
pub fn extract_coordinates(input: &str) -> Option<Coordinates> {
    let input = input.trim();

    for re in [&*PIN_RE, &*QUERY_RE, &*VIEWPORT_RE] {
        for caps in re.captures_iter(input) {
            let (Some(lat), Some(lng)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if let (Ok(lat), Ok(lng)) = (lat.as_str().parse(), lng.as_str().parse())
                && let Ok(coords) = Coordinates::new(lat, lng)
            {
                return Some(coords);
            }
        }
    }

    input.parse().ok()
}

/// Whether `url` is a shortened map link that must be resolved first.
#[must_use]
pub fn is_short_map_link(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    without_scheme.starts_with("maps.app.goo.gl/")
        || without_scheme.starts_with("goo.gl/maps/")
        || without_scheme.starts_with("g.co/kgs/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_new_validates_range() {
        assert!(Coordinates::new(12.97, 77.59).is_ok());
        assert!(matches!(
            Coordinates::new(91.0, 0.0),
            Err(GeoError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            Coordinates::new(0.0, -180.5),
            Err(GeoError::LongitudeOutOfRange(_))
        ));
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_distance_one_degree_of_latitude() {
        let a = Coordinates::new(0.0, 0.0).unwrap();
        let b = Coordinates::new(1.0, 0.0).unwrap();
        assert!(close(a.distance_km(&b), 111.195, 0.01));
        assert!(close(a.distance_km(&a), 0.0, 1e-9));
    }

    #[test]
    fn test_distance_antipodal() {
        let a = Coordinates::new(0.0, 0.0).unwrap();
        let b = Coordinates::new(0.0, 180.0).unwrap();
        assert!(close(a.distance_km(&b), std::f64::consts::PI * EARTH_RADIUS_KM, 0.001));
    }

    #[test]
    fn test_parse_pair() {
        let c: Coordinates = " 12.9716 , 77.5946 ".parse().unwrap();
        assert!(close(c.latitude, 12.9716, 1e-9));
        assert!(close(c.longitude, 77.5946, 1e-9));
        assert_eq!("12.9".parse::<Coordinates>(), Err(GeoError::Malformed));
    }

    #[test]
    fn test_extract_prefers_place_pin_over_viewport() {
        let url = "https://www.google.com/maps/place/Lalbagh/@12.9500,77.5800,15z/data=!3m1!4b1!4m6!3m5!1s0x0:0x0!8m2!3d12.9507!4d77.5848";
        let c = extract_coordinates(url).unwrap();
        assert!(close(c.latitude, 12.9507, 1e-9));
        assert!(close(c.longitude, 77.5848, 1e-9));
    }

    #[test]
    fn test_extract_query_parameter() {
        let c = extract_coordinates("https://maps.google.com/?q=19.0760,72.8777").unwrap();
        assert!(close(c.latitude, 19.076, 1e-9));

        let c = extract_coordinates("https://www.google.com/maps/search/?api=1&query=28.6139%2C77.2090")
            .unwrap();
        assert!(close(c.longitude, 77.209, 1e-9));
    }

    #[test]
    fn test_extract_negative_and_bare() {
        let c = extract_coordinates("https://maps.google.com/@-33.8688,151.2093,12z").unwrap();
        assert!(close(c.latitude, -33.8688, 1e-9));
        assert!(extract_coordinates("-33.8688, 151.2093").is_some());
        assert!(extract_coordinates("https://example.com/no/coords").is_none());
        assert!(extract_coordinates("https://maps.google.com/@123.0,77.0,12z").is_none());
    }

    #[test]
    fn test_short_links() {
        assert!(is_short_map_link("https://maps.app.goo.gl/AbC123"));
        assert!(is_short_map_link("http://goo.gl/maps/xyz"));
        assert!(!is_short_map_link("https://www.google.com/maps/@1,2,3z"));
    }
}
