use bytes::{BufMut, BytesMut};
use nom::number::Endianness;

use crate::{
    values::{put_u16, put_u32},
    EntryValue, ExifTag,
};

use super::{
    directory::ExifDirectory,
    parser::{IFD_ENTRY_SIZE, THUMBNAIL_LENGTH, THUMBNAIL_OFFSET, TIFF_HEADER_LEN},
    tags::Group,
};

/// Largest TIFF block an APP1 segment can carry: the segment length field
/// covers itself (2 bytes) and the `Exif\0\0` identifier (6 bytes).
pub(crate) const MAX_TIFF_LEN: usize = u16::MAX as usize - 2 - 6;

type Entries = Vec<(u16, EntryValue)>;

/// Serialize a directory into a TIFF block.
///
/// Layout is IFD0, Exif IFD, GPS IFD, IFD1 then the thumbnail data, each
/// IFD directly followed by its out-of-line values. Every IFD and every
/// value starts on a word boundary.
#[tracing::instrument(skip_all)]
pub(crate) fn write_tiff(dir: &ExifDirectory) -> Vec<u8> {
    let endian = dir.endian();

    let mut ifd0: Entries = collect(dir, Group::Image);
    let exif: Entries = collect(dir, Group::Exif);
    let gps: Entries = collect(dir, Group::Gps);

    // Pointer values are patched once sizes are known, their own size
    // doesn't depend on the value.
    if !exif.is_empty() {
        ifd0.push((ExifTag::ExifOffset.code(), EntryValue::U32(0)));
    }
    if !gps.is_empty() {
        ifd0.push((ExifTag::GPSInfo.code(), EntryValue::U32(0)));
    }
    ifd0.sort_by_key(|(code, _)| *code);

    let mut ifd1 = dir.thumbnail().map(|t| {
        let mut entries: Entries = t
            .entries
            .iter()
            .map(|(code, v)| (*code, v.clone()))
            .collect();
        if !t.data.is_empty() {
            entries.push((THUMBNAIL_OFFSET, EntryValue::U32(0)));
            entries.push((THUMBNAIL_LENGTH, EntryValue::U32(t.data.len() as u32)));
        }
        entries.sort_by_key(|(code, _)| *code);
        (entries, t.data.as_slice())
    });

    let exif_offset = TIFF_HEADER_LEN + ifd_size(&ifd0);
    let gps_offset = exif_offset + optional_size(&exif);
    let ifd1_offset = gps_offset + optional_size(&gps);

    set_value(&mut ifd0, ExifTag::ExifOffset.code(), exif_offset);
    set_value(&mut ifd0, ExifTag::GPSInfo.code(), gps_offset);
    if let Some((entries, _)) = ifd1.as_mut() {
        let thumbnail_offset = ifd1_offset + ifd_size(entries);
        set_value(entries, THUMBNAIL_OFFSET, thumbnail_offset);
    }

    let mut buf = BytesMut::with_capacity(ifd1_offset);
    match endian {
        Endianness::Little => buf.put_slice(b"II"),
        _ => buf.put_slice(b"MM"),
    }
    put_u16(&mut buf, 0x2a, endian);
    put_u32(&mut buf, TIFF_HEADER_LEN as u32, endian);

    let next = if ifd1.is_some() { ifd1_offset } else { 0 };
    write_ifd(&mut buf, &ifd0, next, endian);
    if !exif.is_empty() {
        write_ifd(&mut buf, &exif, 0, endian);
    }
    if !gps.is_empty() {
        write_ifd(&mut buf, &gps, 0, endian);
    }
    if let Some((entries, data)) = ifd1 {
        write_ifd(&mut buf, &entries, 0, endian);
        buf.put_slice(data);
    }

    tracing::debug!(len = buf.len(), "Wrote TIFF block");
    buf.to_vec()
}

fn collect(dir: &ExifDirectory, group: Group) -> Entries {
    dir.group(group)
        .map(|(code, v)| (code, v.clone()))
        .collect()
}

fn set_value(entries: &mut Entries, code: u16, offset: usize) {
    if let Some((_, v)) = entries.iter_mut().find(|(c, _)| *c == code) {
        *v = EntryValue::U32(offset as u32);
    }
}

fn value_size(v: &EntryValue) -> usize {
    v.components_num() as usize * v.data_format().component_size()
}

fn ifd_size(entries: &[(u16, EntryValue)]) -> usize {
    let data_len: usize = entries
        .iter()
        .map(|(_, v)| value_size(v))
        .filter(|size| *size > 4)
        .map(|size| size + size % 2)
        .sum();
    2 + entries.len() * IFD_ENTRY_SIZE + 4 + data_len
}

fn optional_size(entries: &[(u16, EntryValue)]) -> usize {
    if entries.is_empty() {
        0
    } else {
        ifd_size(entries)
    }
}

/// Append an IFD at the end of `buf`, values larger than 4 bytes go to the
/// data area right after the next-IFD offset.
fn write_ifd(buf: &mut BytesMut, entries: &[(u16, EntryValue)], next: usize, endian: Endianness) {
    let start = buf.len();
    let mut data_offset = start + 2 + entries.len() * IFD_ENTRY_SIZE + 4;
    let mut data_area = BytesMut::new();

    put_u16(buf, entries.len() as u16, endian);
    for (code, v) in entries {
        put_u16(buf, *code, endian);
        put_u16(buf, v.data_format().code(), endian);
        put_u32(buf, v.components_num(), endian);

        let bytes = v.to_bytes(endian);
        if bytes.len() <= 4 {
            buf.put_slice(&bytes);
            buf.put_bytes(0, 4 - bytes.len());
        } else {
            put_u32(buf, data_offset as u32, endian);
            data_area.put_slice(&bytes);
            if bytes.len() % 2 == 1 {
                data_area.put_u8(0);
            }
            data_offset = start + 2 + entries.len() * IFD_ENTRY_SIZE + 4 + data_area.len();
        }
    }
    put_u32(buf, next as u32, endian);
    buf.put_slice(&data_area);

    debug_assert_eq!(buf.len() - start, ifd_size(entries));
}
