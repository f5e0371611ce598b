//! Define exif tags and the name registry, see
//! https://exiftool.org/TagNames/EXIF.html

use std::{
    borrow::Cow,
    collections::HashMap,
    fmt::Display,
    sync::LazyLock,
};

#[cfg(feature = "json_dump")]
use serde::Serialize;

use crate::values::DataFormat;

/// The directory a tag lives in. GPS tag codes overlap IFD0 codes, so a
/// code alone does not identify a tag.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum Group {
    /// IFD0, the main image directory
    Image,
    /// Exif sub-IFD
    Exif,
    /// GPS sub-IFD
    Gps,
}

impl Group {
    fn prefix(self) -> &'static str {
        match self {
            Group::Image => "",
            Group::Exif => "Exif.",
            Group::Gps => "GPS.",
        }
    }
}

/// Numeric tag identifier: directory group plus raw tag code.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct TagId {
    pub group: Group,
    pub code: u16,
}

impl TagId {
    pub const fn new(group: Group, code: u16) -> Self {
        Self { group, code }
    }

    /// Parse a raw identifier such as `0x9c9b`, `40091`, `Exif.0xa431` or
    /// `GPS.0x001f`. Unprefixed identifiers belong to [`Group::Image`].
    pub fn parse_raw(s: &str) -> Option<TagId> {
        let (group, code) = if let Some(rest) = s.strip_prefix("Exif.") {
            (Group::Exif, rest)
        } else if let Some(rest) = s.strip_prefix("GPS.") {
            (Group::Gps, rest)
        } else if let Some(rest) = s.strip_prefix("Image.") {
            (Group::Image, rest)
        } else {
            (Group::Image, s)
        };

        let code = match code
            .strip_prefix("0x")
            .or_else(|| code.strip_prefix("0X"))
        {
            Some(hex) => u16::from_str_radix(hex, 16).ok()?,
            None => code.parse::<u16>().ok()?,
        };
        Some(TagId::new(group, code))
    }
}

impl Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}0x{:04x}", self.group.prefix(), self.code)
    }
}

impl From<ExifTag> for TagId {
    fn from(tag: ExifTag) -> Self {
        tag.id()
    }
}

macro_rules! exif_tags {
    ($( $name:ident = $code:literal, $group:ident, $format:ident; )*) => {
        /// Defines recognized Exif tags. All tags can be decoded, no matter
        /// if it is defined here; unrecognized ones are keyed by their raw
        /// [`TagId`].
        #[allow(unused)]
        #[cfg_attr(feature = "json_dump", derive(Serialize))]
        #[derive(Debug, Eq, PartialEq, Hash, Clone, Copy)]
        pub enum ExifTag {
            $( $name = $code, )*
        }

        impl ExifTag {
            pub const ALL: &'static [ExifTag] = &[ $( ExifTag::$name, )* ];

            pub const fn name(self) -> &'static str {
                match self {
                    $( ExifTag::$name => stringify!($name), )*
                }
            }

            pub const fn group(self) -> Group {
                match self {
                    $( ExifTag::$name => Group::$group, )*
                }
            }

            /// The format a newly inserted value of this tag is encoded with.
            pub const fn data_format(self) -> DataFormat {
                match self {
                    $( ExifTag::$name => DataFormat::$format, )*
                }
            }
        }
    };
}

exif_tags! {
    ImageWidth = 0x0100, Image, U32;
    ImageHeight = 0x0101, Image, U32;
    ImageDescription = 0x010e, Image, Text;
    Make = 0x010f, Image, Text;
    Model = 0x0110, Image, Text;
    Orientation = 0x0112, Image, U16;
    XResolution = 0x011a, Image, URational;
    YResolution = 0x011b, Image, URational;
    ResolutionUnit = 0x0128, Image, U16;
    Software = 0x0131, Image, Text;
    ModifyDate = 0x0132, Image, Text;
    Artist = 0x013b, Image, Text;
    HostComputer = 0x013c, Image, Text;
    WhitePoint = 0x013e, Image, URational;
    PrimaryChromaticities = 0x013f, Image, URational;
    YCbCrCoefficients = 0x0211, Image, URational;
    YCbCrPositioning = 0x0213, Image, U16;
    ReferenceBlackWhite = 0x0214, Image, URational;
    Copyright = 0x8298, Image, Text;

    // sub ifd
    ExifOffset = 0x8769, Image, U32;
    GPSInfo = 0x8825, Image, U32;
    InteropOffset = 0xa005, Exif, U32;

    ExposureTime = 0x829a, Exif, URational;
    FNumber = 0x829d, Exif, URational;
    ExposureProgram = 0x8822, Exif, U16;
    SpectralSensitivity = 0x8824, Exif, Text;
    ISOSpeedRatings = 0x8827, Exif, U16;
    OECF = 0x8828, Exif, Undefined;
    SensitivityType = 0x8830, Exif, U16;
    RecommendedExposureIndex = 0x8832, Exif, U32;
    ExifVersion = 0x9000, Exif, Undefined;
    DateTimeOriginal = 0x9003, Exif, Text;
    CreateDate = 0x9004, Exif, Text;
    OffsetTime = 0x9010, Exif, Text;
    OffsetTimeOriginal = 0x9011, Exif, Text;
    OffsetTimeDigitized = 0x9012, Exif, Text;
    ComponentsConfiguration = 0x9101, Exif, Undefined;
    ShutterSpeedValue = 0x9201, Exif, IRational;
    ApertureValue = 0x9202, Exif, URational;
    BrightnessValue = 0x9203, Exif, IRational;
    ExposureBiasValue = 0x9204, Exif, IRational;
    MaxApertureValue = 0x9205, Exif, URational;
    SubjectDistance = 0x9206, Exif, URational;
    MeteringMode = 0x9207, Exif, U16;
    LightSource = 0x9208, Exif, U16;
    Flash = 0x9209, Exif, U16;
    FocalLength = 0x920a, Exif, URational;
    SubjectArea = 0x9214, Exif, U16;
    MakerNote = 0x927c, Exif, Undefined;
    UserComment = 0x9286, Exif, Undefined;
    SubSecTime = 0x9290, Exif, Text;
    SubSecTimeOriginal = 0x9291, Exif, Text;
    SubSecTimeDigitized = 0x9292, Exif, Text;
    FlashPixVersion = 0xa000, Exif, Undefined;
    ColorSpace = 0xa001, Exif, U16;
    ExifImageWidth = 0xa002, Exif, U32;
    ExifImageHeight = 0xa003, Exif, U32;
    RelatedSoundFile = 0xa004, Exif, Text;
    FlashEnergy = 0xa20b, Exif, URational;
    FocalPlaneXResolution = 0xa20e, Exif, URational;
    FocalPlaneYResolution = 0xa20f, Exif, URational;
    FocalPlaneResolutionUnit = 0xa210, Exif, U16;
    SubjectLocation = 0xa214, Exif, U16;
    ExposureIndex = 0xa215, Exif, URational;
    SensingMethod = 0xa217, Exif, U16;
    FileSource = 0xa300, Exif, Undefined;
    SceneType = 0xa301, Exif, Undefined;
    CFAPattern = 0xa302, Exif, Undefined;
    CustomRendered = 0xa401, Exif, U16;
    ExposureMode = 0xa402, Exif, U16;
    WhiteBalanceMode = 0xa403, Exif, U16;
    DigitalZoomRatio = 0xa404, Exif, URational;
    FocalLengthIn35mmFilm = 0xa405, Exif, U16;
    SceneCaptureType = 0xa406, Exif, U16;
    GainControl = 0xa407, Exif, U16;
    Contrast = 0xa408, Exif, U16;
    Saturation = 0xa409, Exif, U16;
    Sharpness = 0xa40a, Exif, U16;
    DeviceSettingDescription = 0xa40b, Exif, Undefined;
    SubjectDistanceRange = 0xa40c, Exif, U16;
    ImageUniqueID = 0xa420, Exif, Text;
    LensSpecification = 0xa432, Exif, URational;
    LensMake = 0xa433, Exif, Text;
    LensModel = 0xa434, Exif, Text;
    Gamma = 0xa500, Exif, URational;

    GPSVersionID = 0x0000, Gps, U8;
    GPSLatitudeRef = 0x0001, Gps, Text;
    GPSLatitude = 0x0002, Gps, URational;
    GPSLongitudeRef = 0x0003, Gps, Text;
    GPSLongitude = 0x0004, Gps, URational;
    GPSAltitudeRef = 0x0005, Gps, U8;
    GPSAltitude = 0x0006, Gps, URational;
    GPSTimeStamp = 0x0007, Gps, URational;
    GPSSatellites = 0x0008, Gps, Text;
    GPSStatus = 0x0009, Gps, Text;
    GPSMeasureMode = 0x000a, Gps, Text;
    GPSDOP = 0x000b, Gps, URational;
    GPSSpeedRef = 0x000c, Gps, Text;
    GPSSpeed = 0x000d, Gps, URational;
    GPSTrackRef = 0x000e, Gps, Text;
    GPSTrack = 0x000f, Gps, URational;
    GPSImgDirectionRef = 0x0010, Gps, Text;
    GPSImgDirection = 0x0011, Gps, URational;
    GPSMapDatum = 0x0012, Gps, Text;
    GPSDestLatitudeRef = 0x0013, Gps, Text;
    GPSDestLatitude = 0x0014, Gps, URational;
    GPSDestLongitudeRef = 0x0015, Gps, Text;
    GPSDestLongitude = 0x0016, Gps, URational;
    GPSDestBearingRef = 0x0017, Gps, Text;
    GPSDestBearing = 0x0018, Gps, URational;
    GPSDestDistanceRef = 0x0019, Gps, Text;
    GPSDestDistance = 0x001a, Gps, URational;
    GPSProcessingMethod = 0x001b, Gps, Undefined;
    GPSAreaInformation = 0x001c, Gps, Undefined;
    GPSDateStamp = 0x001d, Gps, Text;
    GPSDifferential = 0x001e, Gps, U16;
}

impl ExifTag {
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub const fn id(self) -> TagId {
        TagId::new(self.group(), self.code())
    }

    /// Pointer entries which only describe the directory layout. They are
    /// never exposed as values.
    pub const fn is_sub_ifd_pointer(self) -> bool {
        matches!(
            self,
            ExifTag::ExifOffset | ExifTag::GPSInfo | ExifTag::InteropOffset
        )
    }

    /// Date fields stored as `YYYY:MM:DD HH:MM:SS`.
    pub(crate) const fn is_date_time(self) -> bool {
        matches!(
            self,
            ExifTag::DateTimeOriginal | ExifTag::CreateDate | ExifTag::ModifyDate
        )
    }
}

impl Display for ExifTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name().fmt(f)
    }
}

impl From<ExifTag> for &str {
    fn from(value: ExifTag) -> Self {
        value.name()
    }
}

/// Bidirectional mapping between [`TagId`]s and tag names, built once per
/// process.
pub struct TagRegistry {
    by_id: HashMap<TagId, ExifTag>,
    by_name: HashMap<&'static str, ExifTag>,
}

static REGISTRY: LazyLock<TagRegistry> = LazyLock::new(TagRegistry::build);

/// The process-wide registry.
pub fn registry() -> &'static TagRegistry {
    &REGISTRY
}

impl TagRegistry {
    fn build() -> Self {
        let by_id = ExifTag::ALL.iter().map(|t| (t.id(), *t)).collect();
        let by_name = ExifTag::ALL.iter().map(|t| (t.name(), *t)).collect();
        Self { by_id, by_name }
    }

    /// Get the recognized tag for `id`, if any.
    pub fn tag(&self, id: TagId) -> Option<ExifTag> {
        self.by_id.get(&id).copied()
    }

    /// Canonical name of `id`, or the id itself rendered as a name when it
    /// isn't recognized (see [`TagId::parse_raw`]).
    pub fn name_for(&self, id: TagId) -> Cow<'static, str> {
        match self.tag(id) {
            Some(tag) => Cow::Borrowed(tag.name()),
            None => Cow::Owned(id.to_string()),
        }
    }

    /// Resolve a name back to its id. Raw numeric names are accepted;
    /// anything else fails with [`crate::Error::UnknownTagName`].
    pub fn id_for(&self, name: &str) -> crate::Result<TagId> {
        let name = name.trim();
        if let Some(tag) = self.by_name.get(name) {
            return Ok(tag.id());
        }
        TagId::parse_raw(name).ok_or_else(|| crate::Error::UnknownTagName(name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
