use thiserror::Error;

/// Errors reported by [`decode`](crate::decode) and [`encode`](crate::encode).
///
/// None of them leave a caller-held buffer in a modified state: both
/// functions only ever read their input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The input is not a JPEG file. Reported before any metadata parsing.
    #[error("unsupported file format; only JPEG is supported")]
    UnsupportedFormat,

    /// The TIFF header or the IFD0 entry table is unreadable. The image
    /// itself is still usable, only its metadata is lost.
    #[error("corrupt metadata at offset {offset:#x}; {reason}")]
    CorruptMetadata { offset: usize, reason: String },

    /// An edit references a name which is neither registered nor a numeric
    /// tag identifier.
    #[error("unknown tag name: {0}")]
    UnknownTagName(String),

    /// A value can't be coerced to the type required by its field.
    #[error("invalid value for field {field}; {reason}")]
    InvalidFieldValue { field: String, reason: String },

    /// The re-serialized directory doesn't fit in a JPEG APP1 segment.
    #[error("metadata too large; {size} bytes exceeds capacity of {capacity} bytes")]
    MetadataTooLarge { size: usize, capacity: usize },
}

impl Error {
    pub(crate) fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::InvalidFieldValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Error {
        Error::CorruptMetadata {
            offset,
            reason: reason.into(),
        }
    }
}

/// Converts a nom error raised while reading the TIFF block at `offset`.
pub(crate) fn convert_parse_error(
    e: nom::Err<nom::error::Error<&[u8]>>,
    offset: usize,
    message: &str,
) -> Error {
    let s = match e {
        nom::Err::Incomplete(_) => format!("data is truncated; {message}"),
        nom::Err::Error(e) => format!("{}; {message}", e.code.description()),
        nom::Err::Failure(e) => format!("{}; {message}", e.code.description()),
    };

    Error::corrupt(offset, s)
}
