use std::{collections::BTreeMap, fmt::Display};

use chrono::NaiveDateTime;
use nom::number::Endianness;

use crate::{EntryValue, ExifTag};

use super::{
    gps::{GPSInfo, GpsAxis, GpsRef, LatLng},
    tags::{registry, Group, TagId},
};

/// Whether the image carried an Exif segment at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryState {
    /// No Exif segment in the image.
    Absent,
    /// A parsed, editable directory.
    Present,
}

/// A per-entry problem found while decoding. The entry was skipped, the
/// rest of the directory is still usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeWarning {
    /// The entry (or sub-IFD pointer) concerned, `None` for the thumbnail IFD.
    pub tag: Option<TagId>,
    /// Offset relative to the TIFF header.
    pub offset: usize,
    pub reason: String,
}

impl Display for DecodeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tag {
            Some(id) => write!(
                f,
                "{} @ {:#x}: {}",
                registry().name_for(id),
                self.offset,
                self.reason
            ),
            None => write!(f, "thumbnail @ {:#x}: {}", self.offset, self.reason),
        }
    }
}

/// IFD1, kept as-is so that re-encoding never drops the embedded preview.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Thumbnail {
    /// Entries except the JPEG offset/length pair, which are rewritten.
    pub entries: BTreeMap<u16, EntryValue>,
    pub data: Vec<u8>,
}

/// The decoded Exif directory of an image: IFD0 plus the Exif and GPS
/// sub-IFDs, keyed by [`TagId`].
///
/// The directory is a standalone value owned by the caller; it never
/// references the image buffer it was decoded from.
///
/// ```rust
/// use exif_codec::*;
///
/// fn main() -> Result<()> {
///     // A JPEG without an Exif segment
///     let jpeg = [0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0x00, 0xFF, 0xD9];
///     let dir = decode(&jpeg)?;
///     assert_eq!(dir.state(), DirectoryState::Absent);
///     assert!(dir.is_empty());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExifDirectory {
    entries: BTreeMap<TagId, EntryValue>,
    endian: Option<Endianness>,
    thumbnail: Option<Thumbnail>,
    warnings: Vec<DecodeWarning>,
}

impl ExifDirectory {
    pub(crate) fn absent() -> Self {
        Self {
            entries: BTreeMap::new(),
            endian: None,
            thumbnail: None,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn present(endian: Endianness) -> Self {
        Self {
            endian: Some(endian),
            ..Self::absent()
        }
    }

    pub fn state(&self) -> DirectoryState {
        if self.endian.is_some() {
            DirectoryState::Present
        } else {
            DirectoryState::Absent
        }
    }

    /// Byte order of the TIFF block, big endian for a new directory.
    pub(crate) fn endian(&self) -> Endianness {
        self.endian.unwrap_or(Endianness::Big)
    }

    pub(crate) fn make_present(&mut self) {
        if self.endian.is_none() {
            self.endian = Some(Endianness::Big);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get entry value for a recognized `tag`.
    pub fn get(&self, tag: ExifTag) -> Option<&EntryValue> {
        self.entries.get(&tag.id())
    }

    pub fn get_by_id(&self, id: TagId) -> Option<&EntryValue> {
        self.entries.get(&id)
    }

    /// Get entry value by tag name, raw names such as `0x9c9b` included.
    pub fn get_by_name(&self, name: &str) -> crate::Result<Option<&EntryValue>> {
        let id = registry().id_for(name)?;
        Ok(self.get_by_id(id))
    }

    /// All entries, sorted by group then tag code.
    pub fn iter(&self) -> impl Iterator<Item = (TagId, &EntryValue)> {
        self.entries.iter().map(|(id, v)| (*id, v))
    }

    pub(crate) fn group(&self, group: Group) -> impl Iterator<Item = (u16, &EntryValue)> {
        self.entries
            .iter()
            .filter(move |(id, _)| id.group == group)
            .map(|(id, v)| (id.code, v))
    }

    pub(crate) fn put(&mut self, id: TagId, value: EntryValue) {
        self.entries.insert(id, value);
    }

    pub(crate) fn remove(&mut self, id: TagId) -> Option<EntryValue> {
        self.entries.remove(&id)
    }

    pub(crate) fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }

    pub(crate) fn set_thumbnail(&mut self, thumbnail: Thumbnail) {
        self.thumbnail = Some(thumbnail);
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail.is_some()
    }

    /// Problems found while decoding; each one cost a single entry.
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    pub(crate) fn set_warnings(&mut self, warnings: Vec<DecodeWarning>) {
        self.warnings = warnings;
    }

    /// Field name → display string, for pre-filling an edit form.
    ///
    /// GPS coordinates are rendered as signed decimal degrees (when their
    /// reference is valid) and binary values as `Undefined[0x01, 0x02]`.
    /// Both forms are accepted by [`crate::encode`], so unchanged fields can
    /// be submitted back as they are.
    pub fn form_fields(&self) -> BTreeMap<String, String> {
        let r = registry();
        self.entries
            .iter()
            .map(|(id, v)| {
                let value = r
                    .tag(*id)
                    .and_then(|tag| self.form_value(tag, v))
                    .unwrap_or_else(|| v.to_string());
                (r.name_for(*id).into_owned(), value)
            })
            .collect()
    }

    fn form_value(&self, tag: ExifTag, v: &EntryValue) -> Option<String> {
        match tag {
            ExifTag::UserComment => v
                .as_bytes()?
                .strip_prefix(USER_COMMENT_ASCII)
                .map(|text| String::from_utf8_lossy(text).trim_end_matches('\0').to_string()),
            _ => self.coordinate_degrees(tag).map(|deg| format!("{deg:.6}")),
        }
    }

    fn coordinate_degrees(&self, tag: ExifTag) -> Option<f64> {
        let (ref_tag, axis) = coordinate_ref(tag)?;
        let latlng = self.latlng(tag).ok()?;
        let reference = self.gps_ref(ref_tag, axis).ok()?;
        Some(super::gps::to_decimal_degrees(&latlng, reference))
    }

    /// Try to find and parse gps information.
    ///
    /// Returns:
    ///
    /// - An `Ok<Some<GPSInfo>>` if latitude and longitude are present.
    /// - An `Ok<None>` if there are no coordinates.
    /// - An `Err` if a coordinate is malformed or its reference is missing
    ///   or invalid. References are never defaulted.
    pub fn gps_info(&self) -> crate::Result<Option<GPSInfo>> {
        if self.get(ExifTag::GPSLatitude).is_none() && self.get(ExifTag::GPSLongitude).is_none() {
            return Ok(None);
        }

        let latitude = self.latlng(ExifTag::GPSLatitude)?;
        let longitude = self.latlng(ExifTag::GPSLongitude)?;
        let latitude_ref = self.gps_ref(ExifTag::GPSLatitudeRef, GpsAxis::Latitude)?;
        let longitude_ref = self.gps_ref(ExifTag::GPSLongitudeRef, GpsAxis::Longitude)?;

        let altitude_ref = self
            .get(ExifTag::GPSAltitudeRef)
            .and_then(|v| v.as_u8())
            .unwrap_or(0);
        let altitude = self
            .get(ExifTag::GPSAltitude)
            .and_then(|v| v.as_urational());

        Ok(Some(GPSInfo {
            latitude_ref,
            latitude,
            longitude_ref,
            longitude,
            altitude_ref,
            altitude,
        }))
    }

    fn latlng(&self, tag: ExifTag) -> crate::Result<LatLng> {
        let value = self
            .get(tag)
            .ok_or_else(|| crate::Error::invalid_field(tag.name(), "missing"))?;
        value
            .as_urational_array()
            .ok_or_else(|| format!("expected 3 rationals, got {value}"))
            .and_then(LatLng::try_from)
            .map_err(|e| crate::Error::invalid_field(tag.name(), e))
    }

    fn gps_ref(&self, tag: ExifTag, axis: GpsAxis) -> crate::Result<GpsRef> {
        let value = self
            .get(tag)
            .ok_or_else(|| crate::Error::invalid_field(tag.name(), "missing"))?;
        value
            .as_str()
            .and_then(|s| GpsRef::parse(s, axis))
            .ok_or_else(|| crate::Error::invalid_field(tag.name(), format!("invalid: {value}")))
    }

    /// `DateTimeOriginal` as a naive local time.
    pub fn date_time_original(&self) -> Option<NaiveDateTime> {
        self.get(ExifTag::DateTimeOriginal)
            .and_then(|v| v.as_str())
            .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), "%Y:%m:%d %H:%M:%S").ok())
    }
}

/// Character code prefix of an ASCII `UserComment`.
pub(crate) const USER_COMMENT_ASCII: &[u8; 8] = b"ASCII\0\0\0";

/// The reference tag paired with a coordinate tag.
pub(crate) fn coordinate_ref(tag: ExifTag) -> Option<(ExifTag, GpsAxis)> {
    match tag {
        ExifTag::GPSLatitude => Some((ExifTag::GPSLatitudeRef, GpsAxis::Latitude)),
        ExifTag::GPSLongitude => Some((ExifTag::GPSLongitudeRef, GpsAxis::Longitude)),
        ExifTag::GPSDestLatitude => Some((ExifTag::GPSDestLatitudeRef, GpsAxis::Latitude)),
        ExifTag::GPSDestLongitude => Some((ExifTag::GPSDestLongitudeRef, GpsAxis::Longitude)),
        _ => None,
    }
}

#[cfg(feature = "json_dump")]
impl serde::Serialize for ExifDirectory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let r = registry();
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, v) in &self.entries {
            map.serialize_entry(&r.name_for(*id), v)?;
        }
        map.end()
    }
}
