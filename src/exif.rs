use crate::jpeg::{self, Segment};

pub use directory::{DecodeWarning, DirectoryState, ExifDirectory};
pub use edit::{Edit, Edits};
pub use gps::{
    from_decimal_degrees, parse_coordinate, to_decimal_degrees, GPSInfo, GpsAxis, GpsRef, LatLng,
};
pub use tags::{registry, ExifTag, Group, TagId, TagRegistry};

pub(crate) use writer::MAX_TIFF_LEN;

mod directory;
mod edit;
mod gps;
mod parser;
mod tags;
mod writer;

/// Read the Exif directory of a JPEG image.
///
/// An image without an Exif segment is not an error, the returned
/// directory is then empty and in [`DirectoryState::Absent`] state.
///
/// Returns:
///
/// - [`Error::UnsupportedFormat`](crate::Error::UnsupportedFormat) if
///   `input` is not a JPEG image.
/// - [`Error::CorruptMetadata`](crate::Error::CorruptMetadata) if the
///   segment chain, the TIFF header or the IFD0 entry table is broken.
///   Problems with single entries are reported through
///   [`ExifDirectory::warnings`] instead.
///
/// ```rust
/// use exif_codec::*;
///
/// fn main() -> Result<()> {
///     let jpeg = [0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0x00, 0xFF, 0xD9];
///     let dir = decode(&jpeg)?;
///     assert_eq!(dir.state(), DirectoryState::Absent);
///
///     assert_eq!(decode(b"GIF89a"), Err(Error::UnsupportedFormat));
///     Ok(())
/// }
/// ```
#[tracing::instrument(skip_all, fields(len = input.len()))]
pub fn decode(input: &[u8]) -> crate::Result<ExifDirectory> {
    let (_, dir) = read_directory(input)?;
    Ok(dir)
}

/// Apply `edits` to the Exif directory of a JPEG image and return the new
/// image. Everything but the Exif segment is copied byte for byte, and
/// `input` is never modified, whatever the outcome.
///
/// Fields not named in `edits` keep their value. An image without Exif
/// data gets a new segment, inserted after SOI (or after a leading JFIF
/// APP0 segment), unless `edits` is empty: the input is then returned
/// unchanged.
///
/// ```rust
/// use exif_codec::*;
///
/// fn main() -> Result<()> {
///     let jpeg = [0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0x00, 0xFF, 0xD9];
///
///     let mut edits = Edits::new();
///     edits.set("Make", "Canon").set("GPSLatitude", "-13.1631");
///     let output = encode(&jpeg, &edits)?;
///
///     let dir = decode(&output)?;
///     assert_eq!(dir.get(ExifTag::Make).unwrap().as_str(), Some("Canon"));
///     assert_eq!(dir.get(ExifTag::GPSLatitudeRef).unwrap().as_str(), Some("S"));
///     assert!(output.ends_with(&jpeg[2..]));
///
///     let edits: Edits = [("FNumber", "not-a-number")].into_iter().collect();
///     assert!(matches!(
///         encode(&output, &edits),
///         Err(Error::InvalidFieldValue { .. })
///     ));
///     Ok(())
/// }
/// ```
#[tracing::instrument(skip_all, fields(len = input.len(), edits = edits.len()))]
pub fn encode(input: &[u8], edits: &crate::Edits) -> crate::Result<Vec<u8>> {
    let (segment, dir) = read_directory(input)?;
    if segment.is_none() && edits.is_empty() {
        return Ok(input.to_vec());
    }

    let dir = edit::apply_edits(&dir, edits)?;
    let tiff = writer::write_tiff(&dir);
    if tiff.len() > MAX_TIFF_LEN {
        return Err(crate::Error::MetadataTooLarge {
            size: tiff.len(),
            capacity: MAX_TIFF_LEN,
        });
    }

    let new_segment = jpeg::build_exif_segment(&tiff);
    let range = match segment {
        Some(segment) => segment.range,
        None => {
            let pos = jpeg::insert_position(input);
            pos..pos
        }
    };
    tracing::debug!(?range, new_len = new_segment.len(), "Replacing Exif segment");

    Ok(jpeg::splice(input, range, &new_segment))
}

fn read_directory(input: &[u8]) -> crate::Result<(Option<Segment<'_>>, ExifDirectory)> {
    let Some(segment) = jpeg::find_exif_segment(input)? else {
        tracing::debug!("Exif segment not found");
        return Ok((None, ExifDirectory::absent()));
    };

    let range = segment.tiff_range();
    let start = range.start;
    let dir = parser::parse_tiff(&input[range]).map_err(|e| match e {
        // report offsets in the image rather than in the TIFF block
        crate::Error::CorruptMetadata { offset, reason } => crate::Error::CorruptMetadata {
            offset: start + offset,
            reason,
        },
        e => e,
    })?;

    Ok((Some(segment), dir))
}

#[cfg(test)]
mod tests {
    use nom::number::Endianness;
    use test_case::test_case;

    use super::*;
    use crate::{
        testkit::*,
        values::{EntryValue, URational},
        Error,
    };

    fn edits(items: &[(&str, &str)]) -> Edits {
        items.iter().copied().collect()
    }

    #[test_case(Endianness::Big)]
    #[test_case(Endianness::Little)]
    fn round_trip(endian: Endianness) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let jpeg = jpeg_with_exif(&sample_tiff(endian), true);
        let output = encode(&jpeg, &Edits::new()).unwrap();
        assert_eq!(decode(&output).unwrap(), decode(&jpeg).unwrap());
    }

    #[test]
    fn partial_update() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let jpeg = jpeg_with_exif(&sample_tiff(Endianness::Little), false);
        let before = decode(&jpeg).unwrap();
        let output = encode(&jpeg, &edits(&[("Make", "Nikon"), ("Model", "D850")])).unwrap();
        let after = decode(&output).unwrap();

        assert_eq!(after.get(ExifTag::Make).unwrap().as_str(), Some("Nikon"));
        assert_eq!(after.get(ExifTag::Model).unwrap().as_str(), Some("D850"));
        for (id, v) in before.iter() {
            if id != ExifTag::Make.id() && id != ExifTag::Model.id() {
                assert_eq!(after.get_by_id(id), Some(v), "{id}");
            }
        }
        assert_eq!(after.len(), before.len());
        assert_eq!(after.endian(), Endianness::Little);
        // image data is untouched
        assert!(output.ends_with(SCAN));
    }

    #[test_case(false)]
    #[test_case(true)]
    fn no_exif(app0: bool) {
        let jpeg = jpeg_without_exif(app0);
        let dir = decode(&jpeg).unwrap();
        assert_eq!(dir.state(), DirectoryState::Absent);
        assert!(dir.is_empty());
        assert!(dir.form_fields().is_empty());

        // nothing to write
        assert_eq!(encode(&jpeg, &Edits::new()).unwrap(), jpeg);
    }

    #[test_case(false)]
    #[test_case(true)]
    fn insert_segment(app0: bool) {
        let jpeg = jpeg_without_exif(app0);
        let output = encode(&jpeg, &edits(&[("Make", "Canon")])).unwrap();

        let segment = jpeg::find_exif_segment(&output).unwrap().unwrap();
        let expected = if app0 { 2 + JFIF_APP0.len() } else { 2 };
        assert_eq!(segment.range.start, expected);

        // removing the new segment gives back the input
        assert_eq!(jpeg::splice(&output, segment.range.clone(), &[]), jpeg);

        let dir = decode(&output).unwrap();
        assert_eq!(dir.state(), DirectoryState::Present);
        assert_eq!(dir.get(ExifTag::Make).unwrap().as_str(), Some("Canon"));
        assert_eq!(&output[segment.tiff_range()][..2], b"MM");
    }

    #[test]
    fn invalid_value_leaves_input_untouched() {
        let jpeg = jpeg_with_exif(&sample_tiff(Endianness::Big), false);
        let copy = jpeg.clone();

        let res = encode(&jpeg, &edits(&[("FNumber", "not-a-number")]));
        assert!(matches!(
            res,
            Err(Error::InvalidFieldValue { field, .. }) if field == "FNumber"
        ));
        assert_eq!(jpeg, copy);
    }

    #[test]
    fn unknown_tag_name() {
        let jpeg = jpeg_with_exif(&sample_tiff(Endianness::Big), false);
        assert_eq!(
            encode(&jpeg, &edits(&[("NotARealField", "1")])),
            Err(Error::UnknownTagName("NotARealField".to_string()))
        );
    }

    #[test]
    fn gps_decode() {
        let jpeg = jpeg_with_exif(&sample_tiff(Endianness::Big), false);
        let dir = decode(&jpeg).unwrap();

        assert_eq!(
            dir.get(ExifTag::GPSLatitude),
            Some(&EntryValue::URationalArray(vec![
                URational::from((48, 1)),
                URational::from((51, 1)),
                URational::from((30, 1)),
            ]))
        );
        let gps = dir.gps_info().unwrap().unwrap();
        assert_eq!(gps.latitude_ref, GpsRef::North);
        assert!((gps.latitude_degrees() - 48.858333).abs() < 1e-6);
        assert_eq!(dir.form_fields()["GPSLatitude"], "48.858333");
    }

    #[test]
    fn gps_encode() {
        let jpeg = jpeg_with_exif(&sample_tiff(Endianness::Big), false);
        let output = encode(&jpeg, &edits(&[("GPSLatitude", "-13.1631")])).unwrap();
        let dir = decode(&output).unwrap();

        assert_eq!(dir.get(ExifTag::GPSLatitudeRef).unwrap().as_str(), Some("S"));
        assert_eq!(
            dir.get(ExifTag::GPSLatitude),
            Some(&EntryValue::URationalArray(vec![
                URational::from((13, 1)),
                URational::from((9, 1)),
                URational::from((471600, 10000)),
            ]))
        );
        // 13°9'47.16"
        let gps = dir.gps_info().unwrap().unwrap();
        assert!((gps.latitude_degrees() + 13.1631).abs() < 1e-4);
        // longitude untouched
        assert!((gps.longitude_degrees() - 2.2945).abs() < 1e-6);
    }

    fn camera_tiff() -> Vec<u8> {
        let mut b = TiffBuilder::new(Endianness::Little);
        b.ifd0(vec![
            TestEntry::text(ExifTag::Make.code(), "Canon"),
            // XPTitle
            TestEntry::bytes(0x9c9b, &[0x41, 0x00, 0x42, 0x00]),
            // a private signed short pair
            TestEntry::raw(0xc000, 8, 2, vec![0xfe, 0xff, 0x05, 0x00]),
            TestEntry::raw(0xc001, 4, 0, vec![]),
        ]);
        b.exif(vec![
            TestEntry::rationals(ExifTag::FNumber.code(), &[(28, 10)]),
            TestEntry::raw(ExifTag::ComponentsConfiguration.code(), 7, 4, vec![1, 2, 3, 0]),
            TestEntry::raw(ExifTag::MakerNote.code(), 7, 12, (0..12).map(|x| x * 20).collect()),
            TestEntry::raw(ExifTag::UserComment.code(), 7, 10, b"ASCII\0\0\0hi".to_vec()),
            TestEntry::text(ExifTag::DateTimeOriginal.code(), "2023:07:09 20:36:33"),
        ]);
        b.gps(vec![
            TestEntry::text(ExifTag::GPSLatitudeRef.code(), "N"),
            TestEntry::rationals(ExifTag::GPSLatitude.code(), &[(48, 1), (51, 1), (30, 1)]),
            TestEntry::text(ExifTag::GPSLongitudeRef.code(), "E"),
            TestEntry::rationals(ExifTag::GPSLongitude.code(), &[(2, 1), (17, 1), (402, 10)]),
        ]);
        b.build()
    }

    #[test]
    fn uncommon_entries_survive_rewrite() {
        let jpeg = jpeg_with_exif(&camera_tiff(), false);
        let dir = decode(&jpeg).unwrap();
        assert!(dir.warnings().is_empty(), "{:?}", dir.warnings());

        let output = encode(&jpeg, &Edits::new()).unwrap();
        let after = decode(&output).unwrap();
        assert_eq!(after, dir);
        assert_eq!(
            after.get_by_name("0xc000").unwrap(),
            Some(&EntryValue::I16Array(vec![-2, 5]))
        );
        assert_eq!(
            after.get_by_name("0xc001").unwrap(),
            Some(&EntryValue::U32Array(vec![]))
        );
    }

    #[test]
    fn form_fields_resubmit() {
        // submitting the pre-filled form back unchanged keeps every value
        let jpeg = jpeg_with_exif(&camera_tiff(), false);
        let dir = decode(&jpeg).unwrap();
        let fields = dir.form_fields();
        assert_eq!(
            fields["ComponentsConfiguration"],
            "Undefined[0x01, 0x02, 0x03, 0x00]"
        );

        let output = encode(&jpeg, &fields.into_iter().collect()).unwrap();
        let after = decode(&output).unwrap();

        assert_eq!(after.len(), dir.len());
        for (id, v) in dir.iter() {
            if id == ExifTag::GPSLatitude.id() || id == ExifTag::GPSLongitude.id() {
                continue;
            }
            assert_eq!(after.get_by_id(id), Some(v), "{id}");
        }
        // coordinates go through decimal degrees
        let gps = after.gps_info().unwrap().unwrap();
        assert!((gps.latitude_degrees() - 48.858333).abs() < 1e-6);
        assert!((gps.longitude_degrees() - 2.2945).abs() < 1e-6);
    }

    #[test]
    fn metadata_too_large() {
        let jpeg = jpeg_with_exif(&sample_tiff(Endianness::Big), false);
        let comment = "x".repeat(MAX_TIFF_LEN);
        let res = encode(&jpeg, &edits(&[("ImageDescription", comment.as_str())]));

        assert!(matches!(
            res,
            Err(Error::MetadataTooLarge { size, capacity })
                if size > MAX_TIFF_LEN && capacity == 65527
        ));
    }

    #[test]
    fn removal() {
        let jpeg = jpeg_with_exif(&sample_tiff(Endianness::Big), false);
        let mut e = Edits::new();
        e.remove("Model").remove("GPSLatitude").remove("GPSLatitudeRef");
        let dir = decode(&encode(&jpeg, &e).unwrap()).unwrap();

        assert!(dir.get(ExifTag::Model).is_none());
        assert!(dir.get(ExifTag::GPSLatitude).is_none());
        assert!(dir.get(ExifTag::GPSLongitude).is_some());
        assert!(dir.gps_info().is_err());
    }

    #[test]
    fn thumbnail_is_kept() {
        let mut b = TiffBuilder::new(Endianness::Little);
        b.ifd0(vec![TestEntry::text(ExifTag::Make.code(), "Canon")]);
        b.ifd1(vec![TestEntry::short(0x0103, 6)], THUMBNAIL.to_vec());
        let jpeg = jpeg_with_exif(&b.build(), false);

        let output = encode(&jpeg, &edits(&[("Make", "A much longer make")])).unwrap();
        let dir = decode(&output).unwrap();
        assert_eq!(dir.get(ExifTag::Make).unwrap().as_str(), Some("A much longer make"));
        assert_eq!(dir.thumbnail().unwrap().data, THUMBNAIL);
        assert!(dir.warnings().is_empty());
    }

    #[test]
    fn corrupt_entries() {
        let mut b = TiffBuilder::new(Endianness::Big);
        b.ifd0(vec![
            TestEntry::text(ExifTag::Make.code(), "Canon"),
            TestEntry::raw(ExifTag::Model.code(), 0, 1, vec![0, 0, 0, 0]),
        ]);
        let jpeg = jpeg_with_exif(&b.build(), false);

        let dir = decode(&jpeg).unwrap();
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.warnings().len(), 1);
        assert_eq!(dir.warnings()[0].tag, Some(ExifTag::Model.id()));

        // the skipped entry is dropped on write
        let dir = decode(&encode(&jpeg, &Edits::new()).unwrap()).unwrap();
        assert!(dir.warnings().is_empty());
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn corrupt_header() {
        let jpeg = jpeg_with_exif(b"XX\x00\x2a\x00\x00\x00\x08", false);
        let start = jpeg::find_exif_segment(&jpeg).unwrap().unwrap().tiff_range().start;

        let e = decode(&jpeg).unwrap_err();
        assert!(matches!(e, Error::CorruptMetadata { offset, .. } if offset == start));
        assert_eq!(encode(&jpeg, &edits(&[("Make", "A")])), Err(e));
    }

    #[test]
    fn unsupported_format() {
        assert_eq!(decode(b"\x89PNG\r\n\x1a\n"), Err(Error::UnsupportedFormat));
        assert_eq!(
            encode(b"GIF89a", &edits(&[("Make", "A")])),
            Err(Error::UnsupportedFormat)
        );
    }
}
