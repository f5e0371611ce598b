use std::{fmt::Display, sync::LazyLock};

use regex::Regex;
#[cfg(feature = "json_dump")]
use serde::Serialize;

use crate::values::URational;

/// Denominator used for the seconds component, keeps four decimal places.
const SECONDS_DENOMINATOR: u32 = 10_000;

#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GPSInfo {
    // N, S
    pub latitude_ref: GpsRef,
    // degree, minute, second,
    pub latitude: LatLng,

    // E, W
    pub longitude_ref: GpsRef,
    // degree, minute, second,
    pub longitude: LatLng,

    pub altitude_ref: u8,
    pub altitude: Option<URational>,
}

#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct LatLng(pub URational, pub URational, pub URational);

/// Which coordinate a value belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GpsAxis {
    Latitude,
    Longitude,
}

/// Hemisphere reference stored next to each coordinate.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GpsRef {
    North,
    South,
    East,
    West,
}

impl GpsRef {
    pub fn as_char(self) -> char {
        match self {
            GpsRef::North => 'N',
            GpsRef::South => 'S',
            GpsRef::East => 'E',
            GpsRef::West => 'W',
        }
    }

    pub fn axis(self) -> GpsAxis {
        match self {
            GpsRef::North | GpsRef::South => GpsAxis::Latitude,
            GpsRef::East | GpsRef::West => GpsAxis::Longitude,
        }
    }

    fn sign(self) -> f64 {
        match self {
            GpsRef::South | GpsRef::West => -1.0,
            GpsRef::North | GpsRef::East => 1.0,
        }
    }

    /// Parse a reference valid for `axis`; `S` is not a longitude reference.
    pub fn parse(s: &str, axis: GpsAxis) -> Option<GpsRef> {
        let r = GpsRef::try_from(s.trim().chars().next()?).ok()?;
        (s.trim().len() == 1 && r.axis() == axis).then_some(r)
    }
}

impl TryFrom<char> for GpsRef {
    type Error = crate::Error;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c.to_ascii_uppercase() {
            'N' => Ok(GpsRef::North),
            'S' => Ok(GpsRef::South),
            'E' => Ok(GpsRef::East),
            'W' => Ok(GpsRef::West),
            other => Err(crate::Error::invalid_field(
                "GPS reference",
                format!("expected one of N, S, E, W; got {other:?}"),
            )),
        }
    }
}

impl Display for GpsRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl GpsAxis {
    pub fn max_degrees(self) -> f64 {
        match self {
            GpsAxis::Latitude => 90.0,
            GpsAxis::Longitude => 180.0,
        }
    }

    fn refs(self) -> (GpsRef, GpsRef) {
        match self {
            GpsAxis::Latitude => (GpsRef::North, GpsRef::South),
            GpsAxis::Longitude => (GpsRef::East, GpsRef::West),
        }
    }
}

/// `±(degrees + minutes/60 + seconds/3600)`, negative for `S` and `W`.
pub fn to_decimal_degrees(latlng: &LatLng, reference: GpsRef) -> f64 {
    reference.sign() * latlng.unsigned_degrees()
}

/// Decompose signed decimal degrees into whole degrees, whole minutes and
/// seconds with four decimal places, plus the hemisphere reference.
pub fn from_decimal_degrees(value: f64, axis: GpsAxis) -> (LatLng, GpsRef) {
    let (positive, negative) = axis.refs();
    let reference = if value < 0.0 { negative } else { positive };

    let abs = value.abs();
    let mut degrees = abs.trunc() as u32;
    let minutes_f = abs.fract() * 60.0;
    let mut minutes = minutes_f.trunc() as u32;
    let mut seconds = (minutes_f.fract() * 60.0 * SECONDS_DENOMINATOR as f64).round() as u32;

    // rounding may produce 60 seconds
    if seconds >= 60 * SECONDS_DENOMINATOR {
        seconds -= 60 * SECONDS_DENOMINATOR;
        minutes += 1;
    }
    if minutes >= 60 {
        minutes -= 60;
        degrees += 1;
    }

    let latlng = LatLng(
        URational::from((degrees, 1)),
        URational::from((minutes, 1)),
        URational::from((seconds, SECONDS_DENOMINATOR)),
    );
    (latlng, reference)
}

static DMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s*(?<deg>\d+(?:\.\d+)?)\s*°\s*(?:(?<min>\d+(?:\.\d+)?)\s*'\s*)?(?:(?<sec>\d+(?:\.\d+)?)\s*(?:"|'')\s*)?(?<hemi>[NSEWnsew])?\s*$"#,
    )
    .expect("valid regex")
});

/// Parse a coordinate typed into a form: either signed decimal degrees
/// (`-13.1631`) or degrees/minutes/seconds (`13°9'47.16"S`). Returns signed
/// decimal degrees, range checked for `axis`.
pub fn parse_coordinate(s: &str, axis: GpsAxis) -> Result<f64, String> {
    let s = s.trim();
    let value = if let Ok(v) = s.parse::<f64>() {
        v
    } else if let Some(caps) = DMS_RE.captures(s) {
        let num = |name: &str| -> f64 {
            caps.name(name)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        let abs = num("deg") + num("min") / 60.0 + num("sec") / 3600.0;
        match caps.name("hemi") {
            Some(h) => {
                let r = GpsRef::parse(h.as_str(), axis)
                    .ok_or_else(|| format!("{} is not a valid reference here", h.as_str()))?;
                r.sign() * abs
            }
            None => abs,
        }
    } else {
        return Err(format!("not a coordinate: {s:?}"));
    };

    if !value.is_finite() || value.abs() > axis.max_degrees() {
        return Err(format!(
            "{value} is out of range [-{max}, {max}]",
            max = axis.max_degrees()
        ));
    }
    Ok(value)
}

impl LatLng {
    fn unsigned_degrees(&self) -> f64 {
        self.0.as_float() + self.1.as_float() / 60.0 + self.2.as_float() / 3600.0
    }
}

impl GPSInfo {
    /// Signed decimal latitude.
    pub fn latitude_degrees(&self) -> f64 {
        to_decimal_degrees(&self.latitude, self.latitude_ref)
    }

    /// Signed decimal longitude.
    pub fn longitude_degrees(&self) -> f64 {
        to_decimal_degrees(&self.longitude, self.longitude_ref)
    }

    /// Returns an ISO 6709 geographic point location string such as
    /// `+48.8577+002.295/`.
    ///
    /// ⚠️ Altitude information is ignored currently.
    pub fn to_iso6709(&self) -> String {
        let latitude = self.latitude.unsigned_degrees();
        let longitude = self.longitude.unsigned_degrees();
        format!(
            "{}{latitude:08.5}{}{longitude:09.5}/",
            if self.latitude_ref == GpsRef::North { '+' } else { '-' },
            if self.longitude_ref == GpsRef::East { '+' } else { '-' },
        )
    }
}

impl From<[(u32, u32); 3]> for LatLng {
    fn from(value: [(u32, u32); 3]) -> Self {
        let res: [URational; 3] = value.map(|x| x.into());
        res.into()
    }
}

impl From<[URational; 3]> for LatLng {
    fn from(value: [URational; 3]) -> Self {
        Self(value[0], value[1], value[2])
    }
}

impl From<LatLng> for Vec<URational> {
    fn from(value: LatLng) -> Self {
        vec![value.0, value.1, value.2]
    }
}

impl TryFrom<&[URational]> for LatLng {
    type Error = String;

    fn try_from(value: &[URational]) -> Result<Self, Self::Error> {
        match value {
            [d, m, s, ..] => Ok(Self(*d, *m, *s)),
            _ => Err(format!(
                "need 3 rationals (degrees, minutes, seconds), {} given",
                value.len()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use test_case::test_case;

    use super::*;

    #[test]
    fn gps_iso6709() {
        let palace = GPSInfo {
            latitude_ref: GpsRef::North,
            latitude: [(39, 1), (55, 1), (0, 1)].into(),
            longitude_ref: GpsRef::East,
            longitude: [(116, 1), (23, 1), (27, 1)].into(),
            altitude_ref: 0,
            altitude: None,
        };
        assert_eq!(palace.to_iso6709(), "+39.91667+116.39083/");

        let liberty = GPSInfo {
            latitude_ref: GpsRef::North,
            latitude: [(40, 1), (41, 1), (21, 1)].into(),
            longitude_ref: GpsRef::West,
            longitude: [(74, 1), (2, 1), (40, 1)].into(),
            altitude_ref: 0,
            altitude: None,
        };
        assert_eq!(liberty.to_iso6709(), "+40.68917-074.04444/");
    }

    #[test]
    fn paris_to_decimal() {
        let lat: LatLng = [(48, 1), (51, 1), (30, 1)].into();
        let v = to_decimal_degrees(&lat, GpsRef::North);
        assert!((v - 48.858333).abs() < 1e-6);
        assert!((to_decimal_degrees(&lat, GpsRef::South) + 48.858333).abs() < 1e-6);
    }

    #[test]
    fn machu_picchu_from_decimal() {
        let (lat, r) = from_decimal_degrees(-13.1631, GpsAxis::Latitude);
        assert_eq!(r, GpsRef::South);
        assert_eq!(lat, [(13, 1), (9, 1), (471600, 10000)].into());

        let (lon, r) = from_decimal_degrees(-72.5450, GpsAxis::Longitude);
        assert_eq!(r, GpsRef::West);
        assert_eq!(lon, [(72, 1), (32, 1), (420000, 10000)].into());
    }

    #[test]
    fn seconds_carry() {
        // 10.99999999 would round the seconds to 60
        let (lat, _) = from_decimal_degrees(10.999_999_999, GpsAxis::Latitude);
        assert_eq!(lat, [(11, 1), (0, 1), (0, 10000)].into());
    }

    #[test]
    fn idempotence() {
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            for (axis, max) in [(GpsAxis::Latitude, 90.0), (GpsAxis::Longitude, 180.0)] {
                let v: f64 = rng.gen_range(-max..=max);
                let (latlng, r) = from_decimal_degrees(v, axis);
                assert_eq!(r.axis(), axis);
                let back = to_decimal_degrees(&latlng, r);
                assert!((back - v).abs() < 1e-4, "{v} -> {latlng:?} {r} -> {back}");
            }
        }
        for v in [-90.0, 90.0, 0.0] {
            let (latlng, r) = from_decimal_degrees(v, GpsAxis::Latitude);
            assert!((to_decimal_degrees(&latlng, r) - v).abs() < 1e-4);
        }
    }

    #[test_case("-13.1631", GpsAxis::Latitude, -13.1631)]
    #[test_case("48.858333", GpsAxis::Latitude, 48.858333)]
    #[test_case("48°51'30\"N", GpsAxis::Latitude, 48.858333)]
    #[test_case("13° 9' 47.16\" S", GpsAxis::Latitude, -13.1631)]
    #[test_case("72°32'42\"W", GpsAxis::Longitude, -72.545)]
    #[test_case("2°17'40.2\"", GpsAxis::Longitude, 2.2945)]
    fn parse_coordinates(s: &str, axis: GpsAxis, expect: f64) {
        let v = parse_coordinate(s, axis).unwrap();
        assert!((v - expect).abs() < 1e-5, "{s} => {v}");
    }

    #[test_case("abc", GpsAxis::Latitude)]
    #[test_case("91", GpsAxis::Latitude)]
    #[test_case("-180.5", GpsAxis::Longitude)]
    #[test_case("48°51'30\"E", GpsAxis::Latitude)]
    #[test_case("NaN", GpsAxis::Latitude)]
    fn invalid_coordinates(s: &str, axis: GpsAxis) {
        assert!(parse_coordinate(s, axis).is_err());
    }

    #[test]
    fn refs() {
        assert_eq!(GpsRef::parse("S", GpsAxis::Latitude), Some(GpsRef::South));
        assert_eq!(GpsRef::parse("w", GpsAxis::Longitude), Some(GpsRef::West));
        assert_eq!(GpsRef::parse("S", GpsAxis::Longitude), None);
        assert_eq!(GpsRef::parse("North", GpsAxis::Latitude), None);
        assert_eq!(GpsRef::parse("", GpsAxis::Latitude), None);
    }
}
