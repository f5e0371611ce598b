use std::str::FromStr;

use chrono::NaiveDateTime;

use crate::{
    values::{parse_undefined, scalar_or_array, DataFormat, IRational, URational},
    EntryValue, ExifTag,
};

use super::{
    directory::{coordinate_ref, ExifDirectory, USER_COMMENT_ASCII},
    gps::{from_decimal_degrees, parse_coordinate, GpsAxis, GpsRef},
    tags::{registry, Group, TagId},
};

/// A single change to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Replace (or add) the field with a value typed as a string, the way a
    /// form submits it.
    Set(String),
    /// Delete the field.
    Remove,
}

/// An ordered set of field edits, keyed by tag name.
///
/// Names are resolved through the tag registry when the edits are applied,
/// so raw names like `0x9c9b` or `GPS.0x001f` work too. When a name is
/// edited twice, the last edit wins.
///
/// ```rust
/// use exif_codec::Edits;
///
/// let mut edits = Edits::new();
/// edits.set("Make", "Canon").set("GPSLatitude", "-13.1631");
/// edits.remove("UserComment");
/// assert_eq!(edits.len(), 3);
///
/// let edits: Edits = [("Model", "X100")].into_iter().collect();
/// assert!(!edits.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edits {
    items: Vec<(String, Edit)>,
}

impl Edits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.items.push((name.into(), Edit::Set(value.into())));
        self
    }

    pub fn remove(&mut self, name: impl Into<String>) -> &mut Self {
        self.items.push((name.into(), Edit::Remove));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Edit)> {
        self.items.iter().map(|(name, edit)| (name.as_str(), edit))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Edits {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut edits = Edits::new();
        for (k, v) in iter {
            edits.set(k, v);
        }
        edits
    }
}

const GPS_VERSION: [u8; 4] = [2, 3, 0, 0];

/// Apply `edits` to a copy of `dir`.
///
/// Only the last edit of each field counts, whichever name it was given.
/// Coordinates are applied after the other fields, so the reference derived
/// from their sign overrides any explicit reference edit in the same set.
#[tracing::instrument(skip_all, fields(edits = edits.len()))]
pub(crate) fn apply_edits(dir: &ExifDirectory, edits: &Edits) -> crate::Result<ExifDirectory> {
    let r = registry();
    let mut out = dir.clone();
    out.make_present();
    let had_gps = out.group(Group::Gps).next().is_some();

    let mut resolved: Vec<(TagId, &Edit)> = Vec::with_capacity(edits.len());
    for (name, edit) in edits.iter() {
        let id = r.id_for(name)?;
        if r.tag(id).is_some_and(ExifTag::is_sub_ifd_pointer) {
            return Err(crate::Error::invalid_field(
                r.name_for(id),
                "sub-IFD pointers are not editable",
            ));
        }
        resolved.retain(|(other, _)| *other != id);
        resolved.push((id, edit));
    }

    let mut coordinates = Vec::new();
    for (id, edit) in resolved {
        let tag = r.tag(id);
        let field = r.name_for(id);

        match edit {
            Edit::Remove => {
                tracing::debug!(%field, "remove");
                out.remove(id);
            }
            Edit::Set(s) => {
                if let Some((tag, (ref_tag, axis))) =
                    tag.and_then(|t| coordinate_ref(t).map(|r| (t, r)))
                {
                    coordinates.push((tag, ref_tag, axis, s.as_str()));
                    continue;
                }
                let value = coerce(tag, out.get_by_id(id), s)
                    .map_err(|reason| crate::Error::invalid_field(field.as_ref(), reason))?;
                tracing::debug!(%field, %value, "set");
                out.put(id, value);
            }
        }
    }

    for (tag, ref_tag, axis, s) in coordinates {
        let degrees =
            parse_coordinate(s, axis).map_err(|e| crate::Error::invalid_field(tag.name(), e))?;
        let (latlng, reference) = from_decimal_degrees(degrees, axis);
        tracing::debug!(field = tag.name(), degrees, %reference, "set coordinate");
        out.put(tag.id(), EntryValue::URationalArray(latlng.into()));
        out.put(ref_tag.id(), EntryValue::Text(reference.to_string()));
    }

    if !had_gps
        && out.group(Group::Gps).next().is_some()
        && out.get(ExifTag::GPSVersionID).is_none()
    {
        out.put(
            ExifTag::GPSVersionID.id(),
            EntryValue::U8Array(GPS_VERSION.to_vec()),
        );
    }

    Ok(out)
}

/// Coerce a form string into the value stored for `tag`.
///
/// The shape of an existing value wins over the registry format, so a
/// field written by a camera with an unusual type keeps that type.
/// A field submitted back exactly as displayed keeps its decoded value.
fn coerce(
    tag: Option<ExifTag>,
    existing: Option<&EntryValue>,
    s: &str,
) -> Result<EntryValue, String> {
    if let Some(v) = existing.filter(|v| v.to_string() == s) {
        return Ok(v.clone());
    }

    match tag {
        Some(t) if t.is_date_time() => return parse_date_time(s).map(EntryValue::Text),
        Some(ExifTag::UserComment) => {
            if let Some(bytes) = parse_undefined(s) {
                return bytes.map(EntryValue::Undefined);
            }
            let mut bytes = USER_COMMENT_ASCII.to_vec();
            bytes.extend_from_slice(s.as_bytes());
            return Ok(EntryValue::Undefined(bytes));
        }
        Some(ExifTag::GPSVersionID) => {
            return components(s, &['.', ','])
                .map(|p| parse_int::<u8>(p))
                .collect::<Result<Vec<_>, _>>()
                .and_then(non_empty)
                .map(EntryValue::U8Array);
        }
        Some(ExifTag::GPSLatitudeRef | ExifTag::GPSDestLatitudeRef) => {
            return parse_ref(s, GpsAxis::Latitude);
        }
        Some(ExifTag::GPSLongitudeRef | ExifTag::GPSDestLongitudeRef) => {
            return parse_ref(s, GpsAxis::Longitude);
        }
        _ => (),
    }

    let format = existing
        .map(EntryValue::data_format)
        .or(tag.map(ExifTag::data_format))
        .unwrap_or(DataFormat::Text);
    coerce_format(format, s)
}

fn coerce_format(format: DataFormat, s: &str) -> Result<EntryValue, String> {
    let v = match format {
        DataFormat::Text => {
            if s.contains('\0') {
                return Err("text must not contain NUL".to_string());
            }
            EntryValue::Text(s.to_string())
        }
        DataFormat::Undefined => match parse_undefined(s) {
            Some(bytes) => EntryValue::Undefined(bytes?),
            None => EntryValue::Undefined(s.as_bytes().to_vec()),
        },
        DataFormat::U8 => {
            scalar_or_array(parse_list(s, parse_int)?, EntryValue::U8, EntryValue::U8Array)
        }
        DataFormat::U16 => {
            scalar_or_array(parse_list(s, parse_int)?, EntryValue::U16, EntryValue::U16Array)
        }
        DataFormat::U32 => {
            scalar_or_array(parse_list(s, parse_int)?, EntryValue::U32, EntryValue::U32Array)
        }
        DataFormat::URational => scalar_or_array(
            parse_list(s, parse_urational)?,
            EntryValue::URational,
            EntryValue::URationalArray,
        ),
        DataFormat::IRational => scalar_or_array(
            parse_list(s, parse_irational)?,
            EntryValue::IRational,
            EntryValue::IRationalArray,
        ),
        DataFormat::I8 => {
            scalar_or_array(parse_list(s, parse_int)?, EntryValue::I8, EntryValue::I8Array)
        }
        DataFormat::I16 => {
            scalar_or_array(parse_list(s, parse_int)?, EntryValue::I16, EntryValue::I16Array)
        }
        DataFormat::I32 => {
            scalar_or_array(parse_list(s, parse_int)?, EntryValue::I32, EntryValue::I32Array)
        }
        DataFormat::F32 => {
            scalar_or_array(parse_list(s, parse_float)?, EntryValue::F32, EntryValue::F32Array)
        }
        DataFormat::F64 => {
            scalar_or_array(parse_list(s, parse_float)?, EntryValue::F64, EntryValue::F64Array)
        }
    };
    Ok(v)
}

fn components<'a>(s: &'a str, separators: &'a [char]) -> impl Iterator<Item = &'a str> {
    s.split(move |c: char| c.is_whitespace() || separators.contains(&c))
        .filter(|p| !p.is_empty())
}

fn parse_list<T>(s: &str, parse: fn(&str) -> Result<T, String>) -> Result<Vec<T>, String> {
    components(s, &[','])
        .map(parse)
        .collect::<Result<Vec<_>, _>>()
        .and_then(non_empty)
}

fn non_empty<T>(v: Vec<T>) -> Result<Vec<T>, String> {
    if v.is_empty() {
        Err("value is empty".to_string())
    } else {
        Ok(v)
    }
}

fn parse_int<T: FromStr>(s: &str) -> Result<T, String> {
    s.parse::<T>()
        .map_err(|_| format!("{s:?} is not a valid {}", std::any::type_name::<T>()))
}

fn parse_float<T: FromStr>(s: &str) -> Result<T, String> {
    s.parse::<T>().map_err(|_| format!("{s:?} is not a number"))
}

fn parse_urational(s: &str) -> Result<URational, String> {
    let (n, d) = parse_fraction(s)?;
    match (u32::try_from(n), u32::try_from(d)) {
        (Ok(n), Ok(d)) => Ok(URational::from((n, d))),
        _ => Err(format!("{s:?} is out of range for an unsigned rational")),
    }
}

fn parse_irational(s: &str) -> Result<IRational, String> {
    let (n, d) = parse_fraction(s)?;
    match (i32::try_from(n), i32::try_from(d)) {
        (Ok(n), Ok(d)) => Ok(IRational::from((n, d))),
        _ => Err(format!("{s:?} is out of range for a signed rational")),
    }
}

/// `n/d` is taken as is, a decimal gets a power of ten denominator,
/// reduced.
fn parse_fraction(s: &str) -> Result<(i64, i64), String> {
    if let Some((n, d)) = s.split_once('/') {
        let n = parse_int::<i64>(n.trim())?;
        let d = parse_int::<i64>(d.trim())?;
        if d == 0 {
            return Err(format!("{s:?} has a zero denominator"));
        }
        return Ok((n, d));
    }

    let invalid = || format!("{s:?} is not a number");
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if (int.is_empty() && frac.is_empty())
        || !int.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
        || frac.len() > 9
    {
        return Err(invalid());
    }

    let den = 10_i64.pow(frac.len() as u32);
    let int = if int.is_empty() { 0 } else { int.parse::<i64>().map_err(|_| invalid())? };
    let frac = if frac.is_empty() { 0 } else { frac.parse::<i64>().map_err(|_| invalid())? };
    let num = int
        .checked_mul(den)
        .and_then(|n| n.checked_add(frac))
        .ok_or_else(invalid)?;

    let g = gcd(num, den);
    let num = if negative { -num } else { num };
    Ok((num / g, den / g))
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs().max(1)
}

fn parse_date_time(s: &str) -> Result<String, String> {
    const FORMATS: [&str; 3] = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|t| t.format("%Y:%m:%d %H:%M:%S").to_string())
        .ok_or_else(|| format!("{s:?} is not a date, expected YYYY:MM:DD HH:MM:SS"))
}

fn parse_ref(s: &str, axis: GpsAxis) -> Result<EntryValue, String> {
    GpsRef::parse(s.trim(), axis)
        .map(|r| EntryValue::Text(r.to_string()))
        .ok_or_else(|| match axis {
            GpsAxis::Latitude => format!("{s:?} is not N or S"),
            GpsAxis::Longitude => format!("{s:?} is not E or W"),
        })
}
