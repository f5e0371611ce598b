use std::{
    collections::{BTreeMap, HashSet},
    fmt::Debug,
};

use nom::{
    branch::alt,
    bytes::complete::{tag, take},
    combinator,
    number::{complete, Endianness},
    sequence, IResult, Needed,
};

use crate::{
    error::convert_parse_error,
    values::{DataFormat, EntryData, ParseEntryError},
    EntryValue, ExifTag,
};

use super::{
    directory::{DecodeWarning, ExifDirectory, Thumbnail},
    tags::{registry, Group, TagId},
};

pub(crate) const TIFF_HEADER_LEN: usize = 8;
pub(crate) const IFD_ENTRY_SIZE: usize = 12;

// IFD1 tags describing where the thumbnail lives
pub(crate) const THUMBNAIL_OFFSET: u16 = 0x0201;
pub(crate) const THUMBNAIL_LENGTH: u16 = 0x0202;
const STRIP_OFFSETS: u16 = 0x0111;

/// TIFF Header
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct TiffHeader {
    pub endian: Endianness,
    pub ifd0_offset: u32,
}

impl Debug for TiffHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endian_str = match self.endian {
            Endianness::Big => "Big",
            Endianness::Little => "Little",
            Endianness::Native => "Native",
        };
        f.debug_struct("TiffHeader")
            .field("endian", &endian_str)
            .field("ifd0_offset", &format!("{:#x}", self.ifd0_offset))
            .finish()
    }
}

impl TiffHeader {
    pub fn parse(input: &[u8]) -> IResult<&[u8], TiffHeader> {
        let (remain, endian) = TiffHeader::parse_endian(input)?;
        let (remain, (_, offset)) = sequence::tuple((
            combinator::verify(complete::u16(endian), |magic| *magic == 0x2a),
            complete::u32(endian),
        ))(remain)?;

        let header = Self {
            endian,
            ifd0_offset: offset,
        };

        Ok((remain, header))
    }

    /// Parse the entry count and make sure the whole entry table follows.
    pub fn parse_ifd_entry_num(input: &[u8], endian: Endianness) -> IResult<&[u8], u16> {
        let (remain, num) = complete::u16(endian)(input)?;

        // 12 bytes per entry
        let size = num as usize * IFD_ENTRY_SIZE;
        if size > remain.len() {
            return Err(nom::Err::Incomplete(Needed::new(size - remain.len())));
        }

        Ok((remain, num))
    }

    fn parse_endian(input: &[u8]) -> IResult<&[u8], Endianness> {
        combinator::map(alt((tag("MM"), tag("II"))), |endian_marker| {
            if endian_marker == b"MM" {
                Endianness::Big
            } else {
                Endianness::Little
            }
        })(input)
    }
}

/// An IFD entry header, value not decoded yet.
///
/// ```txt
/// | 2   | 2           | 4              | 4                      |
/// | tag | data format | components num | data (value or offset) |
/// ```
#[derive(Debug, Clone)]
struct RawEntry<'a> {
    tag: u16,
    data_format: u16,
    components_num: u32,
    value_or_offset: u32,
    // the last 4 bytes of the entry, holds the value when it fits
    inline: &'a [u8],
    // position of the entry, relative to the TIFF header
    pos: usize,
}

#[derive(Debug)]
struct RawIfd<'a> {
    entries: Vec<RawEntry<'a>>,
    next_ifd_offset: u32,
}

struct TiffParser<'a> {
    data: &'a [u8],
    endian: Endianness,
    visited: HashSet<u32>,
    warnings: Vec<DecodeWarning>,
}

/// Decode a TIFF block (the Exif segment payload after `Exif\0\0`).
///
/// A broken header or IFD0 entry table is fatal. Anything below that costs
/// at most the affected entry or sub-IFD and is recorded as a warning.
#[tracing::instrument(skip_all, fields(len = data.len()))]
pub(crate) fn parse_tiff(data: &[u8]) -> crate::Result<ExifDirectory> {
    let (_, header) =
        TiffHeader::parse(data).map_err(|e| convert_parse_error(e, 0, "invalid TIFF header"))?;
    tracing::debug!(?header, "Got TIFF header");

    let mut parser = TiffParser {
        data,
        endian: header.endian,
        visited: HashSet::new(),
        warnings: Vec::new(),
    };
    let mut dir = ExifDirectory::present(header.endian);

    let ifd0 = parser.read_ifd(header.ifd0_offset)?;
    let mut sub_ifds = Vec::new();
    for entry in &ifd0.entries {
        let id = TagId::new(Group::Image, entry.tag);
        match registry().tag(id) {
            Some(ExifTag::ExifOffset) => sub_ifds.push((Group::Exif, entry)),
            Some(ExifTag::GPSInfo) => sub_ifds.push((Group::Gps, entry)),
            _ => parser.decode_into(&mut dir, id, entry),
        }
    }

    for (group, pointer) in sub_ifds {
        let offset = pointer.value_or_offset;
        tracing::debug!(?group, offset = format!("{offset:#010x}"), "sub-ifd");
        match parser.read_ifd(offset) {
            Ok(ifd) => {
                for entry in &ifd.entries {
                    let id = TagId::new(group, entry.tag);
                    if registry().tag(id).is_some_and(ExifTag::is_sub_ifd_pointer) {
                        tracing::debug!(?id, "Ignored: nested sub-ifd pointer");
                        continue;
                    }
                    parser.decode_into(&mut dir, id, entry);
                }
            }
            Err(e) => {
                let id = TagId::new(Group::Image, pointer.tag);
                parser.warn(Some(id), offset as usize, e.to_string());
            }
        }
    }

    if ifd0.next_ifd_offset != 0 {
        match parser.read_thumbnail(ifd0.next_ifd_offset) {
            Ok(thumbnail) => dir.set_thumbnail(thumbnail),
            Err(e) => parser.warn(None, ifd0.next_ifd_offset as usize, e.to_string()),
        }
    }

    dir.set_warnings(parser.warnings);
    Ok(dir)
}

impl<'a> TiffParser<'a> {
    #[tracing::instrument(skip(self))]
    fn read_ifd(&mut self, offset: u32) -> crate::Result<RawIfd<'a>> {
        let pos = offset as usize;
        if pos < TIFF_HEADER_LEN {
            return Err(crate::Error::corrupt(pos, "IFD offset points into the header"));
        }
        if !self.visited.insert(offset) {
            return Err(crate::Error::corrupt(pos, "IFD offset loops back"));
        }

        let data = self.data;
        let input = data
            .get(pos..)
            .ok_or_else(|| crate::Error::corrupt(pos, "IFD offset is out of bounds"))?;
        let (mut remain, entry_num) = TiffHeader::parse_ifd_entry_num(input, self.endian)
            .map_err(|e| convert_parse_error(e, pos, "IFD entry table"))?;
        tracing::debug!(entry_num, "Got IFD");

        let mut entries = Vec::with_capacity(entry_num as usize);
        for _ in 0..entry_num {
            let entry_pos = data.len() - remain.len();
            let (rem, entry_data) = take::<_, _, nom::error::Error<_>>(IFD_ENTRY_SIZE)(remain)
                .map_err(|e| convert_parse_error(e, entry_pos, "IFD entry"))?;
            remain = rem;
            let entry = self
                .parse_entry_header(entry_data, entry_pos)
                .map_err(|e| convert_parse_error(e, entry_pos, "IFD entry"))?;
            entries.push(entry);
        }

        // some writers drop the trailing next-IFD offset
        let next_ifd_offset = complete::u32::<_, nom::error::Error<_>>(self.endian)(remain)
            .map(|(_, next)| next)
            .unwrap_or_default();

        Ok(RawIfd {
            entries,
            next_ifd_offset,
        })
    }

    fn parse_entry_header(
        &self,
        entry_data: &'a [u8],
        pos: usize,
    ) -> Result<RawEntry<'a>, nom::Err<nom::error::Error<&'a [u8]>>> {
        let endian = self.endian;
        let (inline, (tag, data_format, components_num)) = sequence::tuple((
            complete::u16(endian),
            complete::u16(endian),
            complete::u32(endian),
        ))(entry_data)?;
        let (_, value_or_offset) = complete::u32(endian)(inline)?;

        Ok(RawEntry {
            tag,
            data_format,
            components_num,
            value_or_offset,
            inline,
            pos,
        })
    }

    /// Resolve the bytes holding an entry's value.
    fn entry_data(&self, entry: &RawEntry<'a>) -> Result<EntryData<'a>, ParseEntryError> {
        let data_format = DataFormat::from_code(entry.data_format).ok_or_else(|| {
            ParseEntryError::InvalidData(format!("data format {}", entry.data_format))
        })?;

        // get entry data
        let size = (entry.components_num as usize)
            .checked_mul(data_format.component_size())
            .ok_or(ParseEntryError::EntryOutOfBounds)?;
        let data = if size <= 4 {
            &entry.inline[..size] // Safe-slice
        } else {
            let start = entry.value_or_offset as usize;
            start
                .checked_add(size)
                .and_then(|end| self.data.get(start..end))
                .ok_or(ParseEntryError::EntryOutOfBounds)?
        };

        Ok(EntryData {
            endian: self.endian,
            data,
            data_format,
            components_num: entry.components_num,
        })
    }

    fn decode(&mut self, id: TagId, entry: &RawEntry<'a>) -> Option<EntryValue> {
        match self
            .entry_data(entry)
            .and_then(|data| EntryValue::parse(&data))
        {
            Ok(v) => Some(v),
            Err(e) => {
                self.warn(Some(id), entry.pos, e.to_string());
                None
            }
        }
    }

    fn decode_into(&mut self, dir: &mut ExifDirectory, id: TagId, entry: &RawEntry<'a>) {
        if let Some(v) = self.decode(id, entry) {
            dir.put(id, v);
        }
    }

    /// Thumbnail offset and length may be SHORT or LONG.
    fn decode_usize(&mut self, entry: &RawEntry<'a>) -> Option<usize> {
        let id = TagId::new(Group::Image, entry.tag);
        let v = self.decode(id, entry)?;
        match v.as_u32() {
            Some(x) => Some(x as usize),
            None => {
                self.warn(Some(id), entry.pos, format!("expected an integer, got {v}"));
                None
            }
        }
    }

    #[tracing::instrument(skip(self))]
    fn read_thumbnail(&mut self, offset: u32) -> crate::Result<Thumbnail> {
        let ifd = self.read_ifd(offset)?;
        let mut entries = BTreeMap::new();
        let (mut start, mut len) = (None, None);

        for entry in &ifd.entries {
            match entry.tag {
                THUMBNAIL_OFFSET => start = self.decode_usize(entry),
                THUMBNAIL_LENGTH => len = self.decode_usize(entry),
                STRIP_OFFSETS => {
                    return Err(crate::Error::corrupt(
                        entry.pos,
                        "uncompressed thumbnails are not supported",
                    ))
                }
                code => {
                    if let Some(v) = self.decode(TagId::new(Group::Image, code), entry) {
                        entries.insert(code, v);
                    }
                }
            }
        }

        let data = match (start, len) {
            (Some(start), Some(len)) => start
                .checked_add(len)
                .and_then(|end| self.data.get(start..end))
                .ok_or_else(|| crate::Error::corrupt(start, "thumbnail data is out of bounds"))?
                .to_vec(),
            _ => Vec::new(),
        };
        tracing::debug!(entries = entries.len(), data_len = data.len(), "Got thumbnail");

        Ok(Thumbnail { entries, data })
    }

    fn warn(&mut self, tag: Option<TagId>, offset: usize, reason: impl Into<String>) {
        let warning = DecodeWarning {
            tag,
            offset,
            reason: reason.into(),
        };
        tracing::warn!(%warning, "Skipped entry");
        self.warnings.push(warning);
    }
}
