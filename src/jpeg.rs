use std::ops::Range;

use bytes::{BufMut, BytesMut};
use nom::{
    bytes::complete::{tag, take, take_while},
    combinator::fail,
    number,
    sequence::{preceded, tuple},
    IResult,
};

/// Identifier at the start of an APP1 payload carrying Exif data.
pub(crate) const EXIF_IDENT: &[u8; 6] = b"Exif\0\0";
const JFIF_IDENT: &[u8; 5] = b"JFIF\0";

/// A marker segment, positions are absolute offsets in the JPEG buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment<'a> {
    pub marker_code: u8,
    /// From the `0xFF` marker byte to the end of the payload.
    pub range: Range<usize>,
    pub payload: &'a [u8],
}

impl Segment<'_> {
    fn is_exif(&self) -> bool {
        self.marker_code == MarkerCode::APP1.code() && self.payload.starts_with(EXIF_IDENT)
    }

    fn is_jfif(&self) -> bool {
        self.marker_code == MarkerCode::APP0.code() && self.payload.starts_with(JFIF_IDENT)
    }

    /// Where the TIFF block lives.
    pub fn tiff_range(&self) -> Range<usize> {
        let payload_start = self.range.end - self.payload.len();
        payload_start + EXIF_IDENT.len()..self.range.end
    }
}

/// Check the SOI marker `[0xFF, 0xD8]`.
pub(crate) fn check_jpeg(input: &[u8]) -> crate::Result<()> {
    let soi: IResult<&[u8], &[u8]> = tag([0xFF, MarkerCode::Soi.code()])(input);
    soi.map(|_| ()).map_err(|_| crate::Error::UnsupportedFormat)
}

/// Find the APP1 Exif segment; the search stops at SOS, image data is
/// never scanned.
pub(crate) fn find_exif_segment(input: &[u8]) -> crate::Result<Option<Segment<'_>>> {
    let segment = travel_until(input, |s| {
        s.is_exif()
            || s.marker_code == MarkerCode::Sos.code() // searching stop at SOS
            || s.marker_code == MarkerCode::Eoi.code()
    })?;
    Ok(segment.filter(Segment::is_exif))
}

/// Where a new Exif segment goes in an image which has none: right after
/// SOI, or after a JFIF APP0 segment directly following it.
pub(crate) fn insert_position(input: &[u8]) -> usize {
    let soi_end = 2;
    match parse_segment(input, soi_end) {
        Ok(Some(segment)) if segment.is_jfif() => segment.range.end,
        _ => soi_end,
    }
}

/// Build an APP1 segment wrapping `tiff`. `tiff` must fit, see
/// [`MAX_TIFF_LEN`](crate::exif::MAX_TIFF_LEN).
pub(crate) fn build_exif_segment(tiff: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(tiff.len() + 10);
    buf.put_u8(0xFF);
    buf.put_u8(MarkerCode::APP1.code());
    // size contains the two bytes of `size` itself
    buf.put_u16((2 + EXIF_IDENT.len() + tiff.len()) as u16);
    buf.put_slice(EXIF_IDENT);
    buf.put_slice(tiff);
    buf.to_vec()
}

/// Copy `input`, with `range` replaced by `segment`.
pub(crate) fn splice(input: &[u8], range: Range<usize>, segment: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(input.len() - range.len() + segment.len());
    buf.put_slice(&input[..range.start]); // Safe-slice
    buf.put_slice(segment);
    buf.put_slice(&input[range.end..]); // Safe-slice
    buf.to_vec()
}

#[tracing::instrument(skip_all)]
fn travel_until<'a, F>(input: &'a [u8], mut predicate: F) -> crate::Result<Option<Segment<'a>>>
where
    F: FnMut(&Segment<'a>) -> bool,
{
    check_jpeg(input)?;

    // SOI has no payload
    let mut pos = 2;
    loop {
        let Some(segment) = parse_segment(input, pos)? else {
            return Ok(None);
        };
        tracing::debug!(
            marker_code = format!("{:#04x}", segment.marker_code),
            start = segment.range.start,
            len = segment.payload.len(),
            "Got segment."
        );
        // Sanity check
        debug_assert!(segment.range.end > pos);
        pos = segment.range.end;

        if predicate(&segment) {
            return Ok(Some(segment));
        }
    }
}

/// Parse the segment starting at `pos`. `None` at a clean end of data.
fn parse_segment(input: &[u8], pos: usize) -> crate::Result<Option<Segment<'_>>> {
    let Some(rem) = input.get(pos..).filter(|rem| !rem.is_empty()) else {
        return Ok(None);
    };

    let (after, (marker_code, payload)) = segment_header(rem).map_err(|_| {
        crate::Error::corrupt(pos, "broken JPEG segment before the image data")
    })?;
    let end = input.len() - after.len();

    Ok(Some(Segment {
        marker_code,
        range: pos..end,
        payload: payload.unwrap_or_default(),
    }))
}

fn segment_header(input: &[u8]) -> IResult<&[u8], (u8, Option<&[u8]>)> {
    // 0xFF fill bytes may precede a marker
    let (remain, code) = preceded(
        tuple((tag([0xFF]), take_while(|b| b == 0xFF))),
        number::complete::u8,
    )(input)?;
    if MarkerCode::is_standalone(code) {
        return Ok((remain, (code, None)));
    }

    let (remain, size) = number::complete::be_u16(remain)?;
    if size < 2 {
        return fail(remain);
    }
    // size contains the two bytes of `size` itself
    let (remain, payload) = take(size - 2)(remain)?;
    Ok((remain, (code, Some(payload))))
}

/// A marker code is a byte following 0xFF that indicates the kind of marker.
enum MarkerCode {
    // Start of Image
    Soi = 0xD8,

    // JFIF marker
    APP0 = 0xE0,

    // APP1 marker
    APP1 = 0xE1,

    // Start of Scan
    Sos = 0xDA,

    // End of Image
    Eoi = 0xD9,
}

impl MarkerCode {
    fn code(self) -> u8 {
        self as u8
    }

    /// Markers without a length field: TEM, RSTn, SOI and EOI.
    fn is_standalone(code: u8) -> bool {
        matches!(code, 0x01 | 0xD0..=0xD9)
    }
}
