#[cfg(feature = "json_dump")]
use serde::Serialize;

use crate::Edits;

/// A landmark shown next to the photo location on the map.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointOfInterest {
    pub name: &'static str,
    /// Signed decimal degrees, negative south of the equator.
    pub latitude: f64,
    /// Signed decimal degrees, negative west of Greenwich.
    pub longitude: f64,
}

pub static POINTS_OF_INTEREST: [PointOfInterest; 5] = [
    PointOfInterest {
        name: "Tour Eiffel",
        latitude: 48.8584,
        longitude: 2.2945,
    },
    PointOfInterest {
        name: "Grande Muraille de Chine",
        latitude: 40.4319,
        longitude: 116.5704,
    },
    PointOfInterest {
        name: "Machu Picchu",
        latitude: -13.1631,
        longitude: -72.5450,
    },
    PointOfInterest {
        name: "Sydney Opera House",
        latitude: -33.8568,
        longitude: 151.2153,
    },
    PointOfInterest {
        name: "Statue de la Liberté",
        latitude: 40.6892,
        longitude: -74.0445,
    },
];

impl PointOfInterest {
    /// Edits placing a photo at this landmark.
    pub fn gps_edits(&self) -> Edits {
        let mut edits = Edits::new();
        edits
            .set("GPSLatitude", self.latitude.to_string())
            .set("GPSLongitude", self.longitude.to_string());
        edits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, encode, testkit::jpeg_without_exif, GpsRef};

    #[test]
    fn tag_photo_at_landmarks() {
        let jpeg = jpeg_without_exif(true);
        for poi in POINTS_OF_INTEREST.iter() {
            let output = encode(&jpeg, &poi.gps_edits()).unwrap();
            let gps = decode(&output).unwrap().gps_info().unwrap().unwrap();

            assert!((gps.latitude_degrees() - poi.latitude).abs() < 1e-4, "{}", poi.name);
            assert!((gps.longitude_degrees() - poi.longitude).abs() < 1e-4, "{}", poi.name);
        }
    }

    #[test]
    fn machu_picchu_refs() {
        let poi = &POINTS_OF_INTEREST[2];
        let output = encode(&jpeg_without_exif(false), &poi.gps_edits()).unwrap();
        let gps = decode(&output).unwrap().gps_info().unwrap().unwrap();
        assert_eq!(gps.latitude_ref, GpsRef::South);
        assert_eq!(gps.longitude_ref, GpsRef::West);
    }

    #[cfg(feature = "json_dump")]
    #[test]
    fn serialize() {
        let s = serde_json::to_string(&POINTS_OF_INTEREST[0]).unwrap();
        assert_eq!(
            s,
            r#"{"name":"Tour Eiffel","latitude":48.8584,"longitude":2.2945}"#
        );
    }
}
