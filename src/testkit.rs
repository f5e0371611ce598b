//! Synthetic JPEG fixtures. TIFF blocks are laid out here by hand, without
//! going through the crate's writer, so that decoding is tested against
//! an independent encoding.

use nom::number::Endianness;

use crate::exif::ExifTag;

/// A JFIF APP0 segment, marker included.
pub const JFIF_APP0: &[u8] = &[
    0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00,
    0x01, 0x00, 0x00,
];

/// A quantization table segment.
pub const DQT: &[u8] = &[0xFF, 0xDB, 0x00, 0x05, 0x00, 0x01, 0x02];

/// SOS header, some entropy coded data (with a stuffed 0xFF) and EOI.
pub const SCAN: &[u8] = &[
    0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, 0x12, 0x34, 0xFF, 0x00, 0x56,
    0xFF, 0xD9,
];

pub const THUMBNAIL: &[u8] = &[0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x03, 0x00, 0xFF, 0xD9];

pub fn jpeg_without_exif(app0: bool) -> Vec<u8> {
    let mut buf = vec![0xFF, 0xD8];
    if app0 {
        buf.extend(JFIF_APP0);
    }
    buf.extend(DQT);
    buf.extend(SCAN);
    buf
}

pub fn jpeg_with_exif(tiff: &[u8], app0: bool) -> Vec<u8> {
    let mut buf = vec![0xFF, 0xD8];
    if app0 {
        buf.extend(JFIF_APP0);
    }
    buf.extend([0xFF, 0xE1]);
    buf.extend(((tiff.len() + 8) as u16).to_be_bytes());
    buf.extend(b"Exif\0\0");
    buf.extend(tiff);
    buf.extend(DQT);
    buf.extend(SCAN);
    buf
}

/// IFD0, Exif and GPS IFDs with a typical camera's entries; the location
/// is 48°51'30"N 2°17'40.2"E.
pub fn sample_tiff(endian: Endianness) -> Vec<u8> {
    let mut b = TiffBuilder::new(endian);
    b.ifd0(vec![
        TestEntry::text(ExifTag::Make.code(), "Canon"),
        TestEntry::text(ExifTag::Model.code(), "X100"),
        TestEntry::short(ExifTag::Orientation.code(), 1),
        TestEntry::rationals(ExifTag::XResolution.code(), &[(72, 1)]),
        // XPTitle, not a registered tag
        TestEntry::bytes(0x9c9b, &[0x41, 0x00, 0x42, 0x00]),
    ]);
    b.exif(vec![
        TestEntry::rationals(ExifTag::ExposureTime.code(), &[(1, 250)]),
        TestEntry::rationals(ExifTag::FNumber.code(), &[(28, 10)]),
        TestEntry::short(ExifTag::ISOSpeedRatings.code(), 400),
        TestEntry::raw(ExifTag::ExifVersion.code(), 7, 4, b"0232".to_vec()),
        TestEntry::text(ExifTag::DateTimeOriginal.code(), "2023:07:09 20:36:33"),
    ]);
    b.gps(vec![
        TestEntry::bytes(ExifTag::GPSVersionID.code(), &[2, 3, 0, 0]),
        TestEntry::text(ExifTag::GPSLatitudeRef.code(), "N"),
        TestEntry::rationals(ExifTag::GPSLatitude.code(), &[(48, 1), (51, 1), (30, 1)]),
        TestEntry::text(ExifTag::GPSLongitudeRef.code(), "E"),
        TestEntry::rationals(ExifTag::GPSLongitude.code(), &[(2, 1), (17, 1), (402, 10)]),
    ]);
    b.build()
}

#[derive(Debug, Clone)]
enum Payload {
    Bytes(Vec<u8>),
    Shorts(Vec<u16>),
    Longs(Vec<u32>),
    Rationals(Vec<(u32, u32)>),
    /// Value field holds this offset, nothing is written at it.
    Offset(u32),
}

#[derive(Debug, Clone)]
pub struct TestEntry {
    tag: u16,
    format: u16,
    count: u32,
    payload: Payload,
}

impl TestEntry {
    pub fn text(tag: u16, s: &str) -> Self {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        Self::raw(tag, 2, bytes.len() as u32, bytes)
    }

    pub fn bytes(tag: u16, v: &[u8]) -> Self {
        Self::raw(tag, 1, v.len() as u32, v.to_vec())
    }

    pub fn short(tag: u16, v: u16) -> Self {
        Self {
            tag,
            format: 3,
            count: 1,
            payload: Payload::Shorts(vec![v]),
        }
    }

    pub fn long(tag: u16, v: u32) -> Self {
        Self {
            tag,
            format: 4,
            count: 1,
            payload: Payload::Longs(vec![v]),
        }
    }

    pub fn rationals(tag: u16, v: &[(u32, u32)]) -> Self {
        Self {
            tag,
            format: 5,
            count: v.len() as u32,
            payload: Payload::Rationals(v.to_vec()),
        }
    }

    /// Arbitrary header fields, `data` is used as the value bytes.
    pub fn raw(tag: u16, format: u16, count: u32, data: Vec<u8>) -> Self {
        Self {
            tag,
            format,
            count,
            payload: Payload::Bytes(data),
        }
    }

    /// Arbitrary header fields with a value offset pointing anywhere.
    pub fn raw_offset(tag: u16, format: u16, count: u32, offset: u32) -> Self {
        Self {
            tag,
            format,
            count,
            payload: Payload::Offset(offset),
        }
    }

    fn value_bytes(&self, endian: Endianness) -> Vec<u8> {
        let u16_bytes = |v: u16| match endian {
            Endianness::Little => v.to_le_bytes(),
            _ => v.to_be_bytes(),
        };
        let u32_bytes = |v: u32| match endian {
            Endianness::Little => v.to_le_bytes(),
            _ => v.to_be_bytes(),
        };
        match &self.payload {
            Payload::Bytes(v) => v.clone(),
            Payload::Shorts(v) => v.iter().flat_map(|x| u16_bytes(*x)).collect(),
            Payload::Longs(v) => v.iter().flat_map(|x| u32_bytes(*x)).collect(),
            Payload::Rationals(v) => v
                .iter()
                .flat_map(|(n, d)| [u32_bytes(*n), u32_bytes(*d)])
                .flatten()
                .collect(),
            Payload::Offset(v) => u32_bytes(*v).to_vec(),
        }
    }

    fn out_of_line_len(&self, endian: Endianness) -> usize {
        match self.payload {
            Payload::Offset(_) => 0,
            _ => {
                let len = self.value_bytes(endian).len();
                if len > 4 {
                    len + len % 2
                } else {
                    0
                }
            }
        }
    }
}

pub struct TiffBuilder {
    endian: Endianness,
    ifd0: Vec<TestEntry>,
    exif: Vec<TestEntry>,
    gps: Vec<TestEntry>,
    ifd1: Option<(Vec<TestEntry>, Vec<u8>)>,
}

impl TiffBuilder {
    pub fn new(endian: Endianness) -> Self {
        Self {
            endian,
            ifd0: Vec::new(),
            exif: Vec::new(),
            gps: Vec::new(),
            ifd1: None,
        }
    }

    /// Entries are written in the given order, unsorted.
    pub fn ifd0(&mut self, entries: Vec<TestEntry>) -> &mut Self {
        self.ifd0 = entries;
        self
    }

    pub fn exif(&mut self, entries: Vec<TestEntry>) -> &mut Self {
        self.exif = entries;
        self
    }

    pub fn gps(&mut self, entries: Vec<TestEntry>) -> &mut Self {
        self.gps = entries;
        self
    }

    /// Thumbnail IFD. The JPEG offset/length entries are added on build
    /// unless `entries` holds an offset entry; its value is patched either
    /// way.
    pub fn ifd1(&mut self, entries: Vec<TestEntry>, data: Vec<u8>) -> &mut Self {
        self.ifd1 = Some((entries, data));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let endian = self.endian;
        let size = |entries: &[TestEntry]| -> usize {
            if entries.is_empty() {
                return 0;
            }
            2 + 12 * entries.len()
                + 4
                + entries.iter().map(|e| e.out_of_line_len(endian)).sum::<usize>()
        };

        let mut ifd0 = self.ifd0.clone();
        if !self.exif.is_empty() {
            ifd0.push(TestEntry::long(ExifTag::ExifOffset.code(), 0));
        }
        if !self.gps.is_empty() {
            ifd0.push(TestEntry::long(ExifTag::GPSInfo.code(), 0));
        }
        let mut ifd1 = self.ifd1.clone().map(|(mut entries, data)| {
            if !entries.iter().any(|e| e.tag == 0x0201) {
                entries.push(TestEntry::long(0x0201, 0));
                entries.push(TestEntry::long(0x0202, data.len() as u32));
            }
            (entries, data)
        });

        let ifd0_offset = 8;
        let exif_offset = ifd0_offset + size(&ifd0).max(6);
        let gps_offset = exif_offset + size(&self.exif);
        let ifd1_offset = gps_offset + size(&self.gps);

        for e in ifd0.iter_mut() {
            if e.tag == ExifTag::ExifOffset.code() && !self.exif.is_empty() {
                e.payload = Payload::Longs(vec![exif_offset as u32]);
            } else if e.tag == ExifTag::GPSInfo.code() && !self.gps.is_empty() {
                e.payload = Payload::Longs(vec![gps_offset as u32]);
            }
        }
        if let Some((entries, _)) = ifd1.as_mut() {
            let data_offset = ifd1_offset + size(entries);
            if let Some(e) = entries.iter_mut().find(|e| e.tag == 0x0201) {
                e.payload = match e.format {
                    3 => Payload::Shorts(vec![data_offset as u16]),
                    _ => Payload::Longs(vec![data_offset as u32]),
                };
            }
        }

        let mut buf = match endian {
            Endianness::Little => b"II\x2a\x00".to_vec(),
            _ => b"MM\x00\x2a".to_vec(),
        };
        buf.extend(self.u32_bytes(ifd0_offset as u32));

        let next = if ifd1.is_some() { ifd1_offset as u32 } else { 0 };
        self.write_ifd(&mut buf, &ifd0, next);
        self.write_ifd(&mut buf, &self.exif, 0);
        self.write_ifd(&mut buf, &self.gps, 0);
        if let Some((entries, data)) = ifd1 {
            self.write_ifd(&mut buf, &entries, 0);
            buf.extend(data);
        }
        buf
    }

    fn write_ifd(&self, buf: &mut Vec<u8>, entries: &[TestEntry], next: u32) {
        if entries.is_empty() && buf.len() > 8 {
            return;
        }
        let start = buf.len();
        let mut data = Vec::new();
        let data_start = start + 2 + 12 * entries.len() + 4;

        buf.extend(self.u16_bytes(entries.len() as u16));
        for e in entries {
            buf.extend(self.u16_bytes(e.tag));
            buf.extend(self.u16_bytes(e.format));
            buf.extend(self.u32_bytes(e.count));

            let bytes = e.value_bytes(self.endian);
            if matches!(e.payload, Payload::Offset(_)) || bytes.len() <= 4 {
                let mut inline = bytes;
                inline.resize(4, 0);
                buf.extend(inline);
            } else {
                buf.extend(self.u32_bytes((data_start + data.len()) as u32));
                data.extend(&bytes);
                if bytes.len() % 2 == 1 {
                    data.push(0);
                }
            }
        }
        buf.extend(self.u32_bytes(next));
        buf.extend(data);
    }

    fn u16_bytes(&self, v: u16) -> [u8; 2] {
        match self.endian {
            Endianness::Little => v.to_le_bytes(),
            _ => v.to_be_bytes(),
        }
    }

    fn u32_bytes(&self, v: u32) -> [u8; 4] {
        match self.endian {
            Endianness::Little => v.to_le_bytes(),
            _ => v.to_be_bytes(),
        }
    }
}
