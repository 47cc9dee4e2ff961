//! Location collaborator contract and the location text sent with each request.

use serde::{Deserialize, Serialize};

pub const NO_LOCATION: &str = "No location";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Latitude {}, Longitude {}", self.latitude, self.longitude)
    }
}

/// Reverse-geocoding result. Any part may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placemark {
    pub name: Option<String>,
    pub locality: Option<String>,
    pub administrative_area: Option<String>,
    pub country: Option<String>,
}

impl Placemark {
    /// "name, locality, area, country" with missing parts skipped.
    pub fn formatted_address(&self) -> String {
        [
            &self.name,
            &self.locality,
            &self.administrative_area,
            &self.country,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Platform geolocation. Implemented by the presentation layer.
pub trait LocationResolver: Send + Sync {
    fn current_location(&self) -> Option<Coordinates>;
    fn reverse_geocode(&self, location: &Coordinates) -> Option<Placemark>;
}

/// A resolver that always reports the same fix, e.g. from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation {
    pub coordinates: Option<Coordinates>,
    pub placemark: Option<Placemark>,
}

impl LocationResolver for FixedLocation {
    fn current_location(&self) -> Option<Coordinates> {
        self.coordinates
    }

    fn reverse_geocode(&self, _location: &Coordinates) -> Option<Placemark> {
        self.placemark.clone()
    }
}

/// Text sent as `location`: the geocoded address when there is one, else the
/// raw coordinates, else "No location".
pub fn location_text(address: Option<&str>, coordinates: Option<Coordinates>) -> String {
    match (address.filter(|a| !a.trim().is_empty()), coordinates) {
        (Some(address), _) => address.to_string(),
        (None, Some(coords)) => coords.to_string(),
        (None, None) => NO_LOCATION.to_string(),
    }
}

/// Resolve the location text for a capture. Media-embedded coordinates win
/// over the resolver's current fix.
pub fn describe_location(resolver: &dyn LocationResolver, media_location: Option<Coordinates>) -> String {
    let coordinates = media_location.or_else(|| resolver.current_location());
    let address = coordinates
        .and_then(|c| resolver.reverse_geocode(&c))
        .map(|p| p.formatted_address());
    location_text(address.as_deref(), coordinates)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUSTIN: Coordinates = Coordinates {
        latitude: 30.2672,
        longitude: -97.7431,
    };

    #[test]
    fn placemark_skips_missing_parts() {
        let placemark = Placemark {
            name: Some("Congress Avenue Bridge".into()),
            locality: Some("Austin".into()),
            administrative_area: None,
            country: Some("United States".into()),
        };
        assert_eq!(
            placemark.formatted_address(),
            "Congress Avenue Bridge, Austin, United States"
        );
        assert_eq!(Placemark::default().formatted_address(), "");
    }

    #[test]
    fn location_text_prefers_address() {
        assert_eq!(location_text(Some("Austin, TX"), Some(AUSTIN)), "Austin, TX");
        assert_eq!(
            location_text(Some("  "), Some(AUSTIN)),
            "Latitude 30.2672, Longitude -97.7431"
        );
        assert_eq!(location_text(None, None), NO_LOCATION);
    }

    #[test]
    fn media_location_overrides_current_fix() {
        let resolver = FixedLocation {
            coordinates: Some(Coordinates {
                latitude: 1.0,
                longitude: 2.0,
            }),
            placemark: None,
        };
        assert_eq!(
            describe_location(&resolver, Some(AUSTIN)),
            "Latitude 30.2672, Longitude -97.7431"
        );
        assert_eq!(describe_location(&resolver, None), "Latitude 1, Longitude 2");
        assert_eq!(describe_location(&FixedLocation::default(), None), NO_LOCATION);
    }

    #[test]
    fn geocoded_address_is_used_when_available() {
        let resolver = FixedLocation {
            coordinates: Some(AUSTIN),
            placemark: Some(Placemark {
                locality: Some("Austin".into()),
                administrative_area: Some("TX".into()),
                ..Placemark::default()
            }),
        };
        assert_eq!(describe_location(&resolver, None), "Austin, TX");
    }
}
