//! exif-codec reads and edits the Exif directory embedded in JPEG images,
//! written in pure Rust with [nom](https://github.com/rust-bakery/nom).
//!
//! ## Key Features
//!
//! - Named fields: entries of IFD0, the Exif sub-IFD and the GPS sub-IFD
//!   are decoded into an [`ExifDirectory`] keyed by [`TagId`], and every
//!   id has a name ([`TagRegistry`]). Unknown tags keep a raw name such as
//!   `0x9c9b` or `GPS.0x001f`, so nothing is lost.
//!
//! - Form friendly editing: [`encode`] takes `name → string` [`Edits`] and
//!   coerces each string to the field's EXIF type. GPS coordinates accept
//!   signed decimal degrees or DMS strings, and their `N`/`S`/`E`/`W`
//!   reference is derived from the sign.
//!
//! - Non destructive: only the APP1 Exif segment is rewritten. Pixel data,
//!   other segments, untouched fields and the embedded thumbnail are kept
//!   as they are, and the input buffer is never modified.
//!
//! - Robustness: a single corrupt entry costs that entry only, see
//!   [`ExifDirectory::warnings`]. The decoder is fuzzed with
//!   [afl.rs](https://github.com/rust-fuzz/afl.rs).
//!
//! ## Usage
//!
//! ```rust
//! use exif_codec::*;
//!
//! fn main() -> Result<()> {
//!     // SOI, SOS and EOI: a JPEG without Exif data
//!     let jpeg = [0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0x00, 0xFF, 0xD9];
//!
//!     let mut edits = Edits::new();
//!     edits
//!         .set("Make", "Canon")
//!         .set("FNumber", "2.8")
//!         .set("DateTimeOriginal", "2023-07-09T20:36:33")
//!         .set("GPSLatitude", "48°51'30\"N")
//!         .set("GPSLongitude", "2.2945");
//!     let output = encode(&jpeg, &edits)?;
//!
//!     let dir = decode(&output)?;
//!     assert_eq!(dir.get(ExifTag::Make).unwrap().to_string(), "Canon");
//!     assert_eq!(dir.get(ExifTag::FNumber).unwrap().to_string(), "14/5");
//!
//!     // Values as a form would display them
//!     let fields = dir.form_fields();
//!     assert_eq!(fields["DateTimeOriginal"], "2023:07:09 20:36:33");
//!     assert_eq!(fields["GPSLatitude"], "48.858333");
//!     assert_eq!(fields["GPSLatitudeRef"], "N");
//!
//!     let gps = dir.gps_info()?.unwrap();
//!     assert_eq!(gps.to_iso6709(), "+48.85833+002.29450/");
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! [`decode`] and [`encode`] report [`Error::UnsupportedFormat`] for
//! anything but a JPEG, and [`Error::CorruptMetadata`] when the Exif
//! structure itself can't be read. [`encode`] additionally reports
//! [`Error::UnknownTagName`], [`Error::InvalidFieldValue`] and
//! [`Error::MetadataTooLarge`]; none of them produce a partial output.
//!
//! ## Features
//!
//! - `json_dump`: `serde::Serialize` for [`ExifDirectory`], [`EntryValue`]
//!   and [`PointOfInterest`].

pub use exif::{
    decode, encode, from_decimal_degrees, parse_coordinate, registry, to_decimal_degrees,
    DecodeWarning, DirectoryState, Edit, Edits, ExifDirectory, ExifTag, GPSInfo, GpsAxis, GpsRef,
    Group, LatLng, TagId, TagRegistry,
};
pub use poi::{PointOfInterest, POINTS_OF_INTEREST};
pub use values::{DataFormat, EntryValue, IRational, Rational, URational};

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

mod error;
mod exif;
mod jpeg;
mod poi;
mod values;

#[cfg(test)]
mod testkit;
