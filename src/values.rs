use std::{fmt::Display, string::FromUtf8Error};

use bytes::{BufMut, BytesMut};
use nom::number::Endianness;
#[cfg(feature = "json_dump")]
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Represent a decoded entry value.
///
/// Every variant maps back to exactly one EXIF data format, so a value can
/// always be re-encoded with the format it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    Text(String),
    URational(URational),
    IRational(IRational),

    U8(u8),
    U16(u16),
    U32(u32),

    I8(i8),
    I16(i16),
    I32(i32),

    F32(f32),
    F64(f64),

    Undefined(Vec<u8>),

    U8Array(Vec<u8>),
    U16Array(Vec<u16>),
    U32Array(Vec<u32>),
    URationalArray(Vec<URational>),

    I8Array(Vec<i8>),
    I16Array(Vec<i16>),
    I32Array(Vec<i32>),
    IRationalArray(Vec<IRational>),

    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct EntryData<'a> {
    pub endian: Endianness,
    pub data: &'a [u8],
    pub data_format: DataFormat,
    pub components_num: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ParseEntryError {
    #[error("value lies outside of the metadata block")]
    EntryOutOfBounds,

    #[error("data is invalid: {0}")]
    InvalidData(String),

    #[error("data format is unsupported: {0}")]
    Unsupported(String),
}

use ParseEntryError as Error;

impl EntryData<'_> {
    fn components<T: TryFromBytes>(&self) -> Result<Vec<T>, Error> {
        let size = std::mem::size_of::<T>();
        (0..self.components_num as usize)
            .map(|i| T::try_from_bytes(&self.data[i * size..], self.endian)) // Safe-slice
            .collect()
    }

    fn try_as_rationals<T: TryFromBytes>(&self) -> Result<Vec<Rational<T>>, Error> {
        let mut vec = Vec::with_capacity(self.components_num as usize);
        for i in 0..self.components_num {
            let rational = decode_rational::<T>(&self.data[i as usize * 8..], self.endian)?; // Safe-slice
            vec.push(rational);
        }
        Ok(vec)
    }
}

impl EntryValue {
    /// Parse an IFD entry value.
    ///
    /// # Structure of IFD Entry
    ///
    /// ```txt
    /// | 2   | 2           | 4              | 4                      |
    /// | tag | data format | components num | data (value or offset) |
    /// ```
    ///
    /// `entry.data` must already hold `components_num * component_size`
    /// bytes, resolved from the offset when the size is greater than 4.
    pub(crate) fn parse(entry: &EntryData) -> Result<EntryValue, Error> {
        let data_format = entry.data_format;
        let data = entry.data;
        let components_num = entry.components_num;

        if data.len() < components_num as usize * data_format.component_size() {
            return Err(Error::InvalidData(format!(
                "{} bytes for {components_num} components",
                data.len()
            )));
        }
        let bytes = &data[..components_num as usize]; // Safe-slice

        // Zero components decode to an empty array, so the entry survives a
        // rewrite.
        let v = match data_format {
            DataFormat::Text => EntryValue::Text(
                get_cstr(data).map_err(|e| Error::InvalidData(e.to_string()))?,
            ),
            DataFormat::Undefined => Self::Undefined(bytes.to_vec()),
            DataFormat::U8 => scalar_or_array(bytes.to_vec(), Self::U8, Self::U8Array),
            DataFormat::I8 => scalar_or_array(
                bytes.iter().map(|b| *b as i8).collect(),
                Self::I8,
                Self::I8Array,
            ),
            DataFormat::U16 => scalar_or_array(entry.components()?, Self::U16, Self::U16Array),
            DataFormat::U32 => scalar_or_array(entry.components()?, Self::U32, Self::U32Array),
            DataFormat::I16 => scalar_or_array(entry.components()?, Self::I16, Self::I16Array),
            DataFormat::I32 => scalar_or_array(entry.components()?, Self::I32, Self::I32Array),
            DataFormat::F32 => scalar_or_array(entry.components()?, Self::F32, Self::F32Array),
            DataFormat::F64 => scalar_or_array(entry.components()?, Self::F64, Self::F64Array),
            DataFormat::URational => scalar_or_array(
                entry.try_as_rationals()?,
                Self::URational,
                Self::URationalArray,
            ),
            DataFormat::IRational => scalar_or_array(
                entry.try_as_rationals()?,
                Self::IRational,
                Self::IRationalArray,
            ),
        };
        Ok(v)
    }

    /// The EXIF data format this value is stored with.
    pub fn data_format(&self) -> DataFormat {
        match self {
            EntryValue::Text(_) => DataFormat::Text,
            EntryValue::URational(_) | EntryValue::URationalArray(_) => DataFormat::URational,
            EntryValue::IRational(_) | EntryValue::IRationalArray(_) => DataFormat::IRational,
            EntryValue::U8(_) | EntryValue::U8Array(_) => DataFormat::U8,
            EntryValue::U16(_) | EntryValue::U16Array(_) => DataFormat::U16,
            EntryValue::U32(_) | EntryValue::U32Array(_) => DataFormat::U32,
            EntryValue::I8(_) | EntryValue::I8Array(_) => DataFormat::I8,
            EntryValue::I16(_) | EntryValue::I16Array(_) => DataFormat::I16,
            EntryValue::I32(_) | EntryValue::I32Array(_) => DataFormat::I32,
            EntryValue::F32(_) | EntryValue::F32Array(_) => DataFormat::F32,
            EntryValue::F64(_) | EntryValue::F64Array(_) => DataFormat::F64,
            EntryValue::Undefined(_) => DataFormat::Undefined,
        }
    }

    /// Number of components written to the entry header.
    pub fn components_num(&self) -> u32 {
        let n = match self {
            // ASCII values are NUL terminated
            EntryValue::Text(v) => v.len() + 1,
            EntryValue::Undefined(v) | EntryValue::U8Array(v) => v.len(),
            EntryValue::U16Array(v) => v.len(),
            EntryValue::U32Array(v) => v.len(),
            EntryValue::URationalArray(v) => v.len(),
            EntryValue::I8Array(v) => v.len(),
            EntryValue::I16Array(v) => v.len(),
            EntryValue::I32Array(v) => v.len(),
            EntryValue::IRationalArray(v) => v.len(),
            EntryValue::F32Array(v) => v.len(),
            EntryValue::F64Array(v) => v.len(),
            _ => 1,
        };
        n as u32
    }

    /// Encoded value bytes, without the entry header.
    pub(crate) fn to_bytes(&self, endian: Endianness) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(
            self.components_num() as usize * self.data_format().component_size(),
        );
        match self {
            EntryValue::Text(v) => {
                buf.put_slice(v.as_bytes());
                buf.put_u8(0);
            }
            EntryValue::URational(v) => put_urational(&mut buf, v, endian),
            EntryValue::IRational(v) => put_irational(&mut buf, v, endian),
            EntryValue::U8(v) => buf.put_u8(*v),
            EntryValue::U16(v) => put_u16(&mut buf, *v, endian),
            EntryValue::U32(v) => put_u32(&mut buf, *v, endian),
            EntryValue::I8(v) => buf.put_i8(*v),
            EntryValue::I16(v) => put_u16(&mut buf, *v as u16, endian),
            EntryValue::I32(v) => put_u32(&mut buf, *v as u32, endian),
            EntryValue::F32(v) => put_u32(&mut buf, v.to_bits(), endian),
            EntryValue::F64(v) => put_u64(&mut buf, v.to_bits(), endian),
            EntryValue::Undefined(v) | EntryValue::U8Array(v) => buf.put_slice(v),
            EntryValue::U16Array(v) => v.iter().for_each(|x| put_u16(&mut buf, *x, endian)),
            EntryValue::U32Array(v) => v.iter().for_each(|x| put_u32(&mut buf, *x, endian)),
            EntryValue::URationalArray(v) => {
                v.iter().for_each(|x| put_urational(&mut buf, x, endian))
            }
            EntryValue::I8Array(v) => v.iter().for_each(|x| buf.put_i8(*x)),
            EntryValue::I16Array(v) => v.iter().for_each(|x| put_u16(&mut buf, *x as u16, endian)),
            EntryValue::I32Array(v) => v.iter().for_each(|x| put_u32(&mut buf, *x as u32, endian)),
            EntryValue::IRationalArray(v) => {
                v.iter().for_each(|x| put_irational(&mut buf, x, endian))
            }
            EntryValue::F32Array(v) => {
                v.iter().for_each(|x| put_u32(&mut buf, x.to_bits(), endian))
            }
            EntryValue::F64Array(v) => {
                v.iter().for_each(|x| put_u64(&mut buf, x.to_bits(), endian))
            }
        }
        buf.to_vec()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EntryValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            EntryValue::U8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            EntryValue::U16(v) => Some(*v),
            _ => None,
        }
    }

    /// Unsigned integer value of any width.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            EntryValue::U8(v) => Some(*v as u32),
            EntryValue::U16(v) => Some(*v as u32),
            EntryValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_urational(&self) -> Option<URational> {
        if let EntryValue::URational(v) = self {
            Some(*v)
        } else {
            None
        }
    }

    pub fn as_irational(&self) -> Option<IRational> {
        if let EntryValue::IRational(v) = self {
            Some(*v)
        } else {
            None
        }
    }

    pub fn as_urational_array(&self) -> Option<&[URational]> {
        if let EntryValue::URationalArray(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            EntryValue::Undefined(v) | EntryValue::U8Array(v) => Some(v),
            _ => None,
        }
    }
}

pub(crate) fn put_u16(buf: &mut BytesMut, v: u16, endian: Endianness) {
    match endian {
        Endianness::Little => buf.put_u16_le(v),
        _ => buf.put_u16(v),
    }
}

pub(crate) fn put_u32(buf: &mut BytesMut, v: u32, endian: Endianness) {
    match endian {
        Endianness::Little => buf.put_u32_le(v),
        _ => buf.put_u32(v),
    }
}

fn put_u64(buf: &mut BytesMut, v: u64, endian: Endianness) {
    match endian {
        Endianness::Little => buf.put_u64_le(v),
        _ => buf.put_u64(v),
    }
}

fn put_urational(buf: &mut BytesMut, v: &URational, endian: Endianness) {
    put_u32(buf, v.0, endian);
    put_u32(buf, v.1, endian);
}

fn put_irational(buf: &mut BytesMut, v: &IRational, endian: Endianness) {
    put_u32(buf, v.0 as u32, endian);
    put_u32(buf, v.1 as u32, endian);
}

/// # Exif Data format
///
/// ```txt
/// | Value           |             1 |             2 |              3 |               4 |                 5 |            6 |
/// |-----------------+---------------+---------------+----------------+-----------------+-------------------+--------------|
/// | Format          | unsigned byte | ascii strings | unsigned short |   unsigned long | unsigned rational |  signed byte |
/// | Bytes/component |             1 |             1 |              2 |               4 |                 8 |            1 |
///
/// | Value           |             7 |             8 |              9 |              10 |                11 |           12 |
/// |-----------------+---------------+---------------+----------------+-----------------+-------------------+--------------|
/// | Format          |     undefined |  signed short |    signed long | signed rational |      single float | double float |
/// | Bytes/component |             1 |             2 |              4 |               8 |                 4 |            8 |
/// ```
///
/// See: [Exif](https://www.media.mit.edu/pia/Research/deepview/exif.html).
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataFormat {
    U8 = 1,
    Text = 2,
    U16 = 3,
    U32 = 4,
    URational = 5,
    I8 = 6,
    Undefined = 7,
    I16 = 8,
    I32 = 9,
    IRational = 10,
    F32 = 11,
    F64 = 12,
}

impl DataFormat {
    pub fn component_size(&self) -> usize {
        match self {
            Self::U8 | Self::I8 | Self::Text | Self::Undefined => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::URational | Self::IRational | Self::F64 => 8,
        }
    }

    pub const fn code(self) -> u16 {
        self as u16
    }

    pub(crate) fn from_code(code: u16) -> Option<Self> {
        let df = match code {
            1 => Self::U8,
            2 => Self::Text,
            3 => Self::U16,
            4 => Self::U32,
            5 => Self::URational,
            6 => Self::I8,
            7 => Self::Undefined,
            8 => Self::I16,
            9 => Self::I32,
            10 => Self::IRational,
            11 => Self::F32,
            12 => Self::F64,
            _ => return None,
        };
        Some(df)
    }
}

#[cfg(feature = "json_dump")]
impl Serialize for EntryValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Renders values in the same syntax the form coercion accepts, so a
/// displayed value can be submitted back unchanged.
impl Display for EntryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryValue::Text(v) => f.write_str(v),
            EntryValue::URational(v) => Display::fmt(v, f),
            EntryValue::IRational(v) => Display::fmt(v, f),
            EntryValue::U32(v) => Display::fmt(&v, f),
            EntryValue::U16(v) => Display::fmt(&v, f),
            EntryValue::I16(v) => Display::fmt(&v, f),
            EntryValue::I32(v) => Display::fmt(&v, f),
            EntryValue::F32(v) => Display::fmt(&v, f),
            EntryValue::F64(v) => Display::fmt(&v, f),
            EntryValue::U8(v) => Display::fmt(&v, f),
            EntryValue::I8(v) => Display::fmt(&v, f),
            EntryValue::Undefined(v) => {
                if !v.is_empty() && v.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
                    return f.write_str(&String::from_utf8_lossy(v));
                }
                write!(f, "{UNDEFINED_PREFIX}[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "0x{x:02x}")?;
                }
                f.write_str("]")
            }
            EntryValue::U8Array(v) => f.write_str(&join(v)),
            EntryValue::U16Array(v) => f.write_str(&join(v)),
            EntryValue::U32Array(v) => f.write_str(&join(v)),
            EntryValue::URationalArray(v) => f.write_str(&join(v)),
            EntryValue::I8Array(v) => f.write_str(&join(v)),
            EntryValue::I16Array(v) => f.write_str(&join(v)),
            EntryValue::I32Array(v) => f.write_str(&join(v)),
            EntryValue::IRationalArray(v) => f.write_str(&join(v)),
            EntryValue::F32Array(v) => f.write_str(&join(v)),
            EntryValue::F64Array(v) => f.write_str(&join(v)),
        }
    }
}

const UNDEFINED_PREFIX: &str = "Undefined";

/// Parse the `Undefined[0x01, 0x02]` rendering of binary bytes back, `None`
/// when `s` isn't in that form.
pub(crate) fn parse_undefined(s: &str) -> Option<Result<Vec<u8>, String>> {
    let inner = s
        .trim()
        .strip_prefix(UNDEFINED_PREFIX)?
        .strip_prefix('[')?
        .strip_suffix(']')?;
    let bytes = inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.strip_prefix("0x")
                .or_else(|| p.strip_prefix("0X"))
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| format!("{p:?} is not a hex byte"))
        })
        .collect();
    Some(bytes)
}

pub(crate) fn scalar_or_array<T>(
    mut v: Vec<T>,
    scalar: fn(T) -> EntryValue,
    array: fn(Vec<T>) -> EntryValue,
) -> EntryValue {
    match v.len() {
        1 => scalar(v.remove(0)),
        _ => array(v),
    }
}

fn join<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<u8> for EntryValue {
    fn from(value: u8) -> Self {
        EntryValue::U8(value)
    }
}
impl From<u16> for EntryValue {
    fn from(value: u16) -> Self {
        EntryValue::U16(value)
    }
}
impl From<u32> for EntryValue {
    fn from(value: u32) -> Self {
        EntryValue::U32(value)
    }
}

impl From<String> for EntryValue {
    fn from(value: String) -> Self {
        EntryValue::Text(value)
    }
}

impl From<&str> for EntryValue {
    fn from(value: &str) -> Self {
        value.to_owned().into()
    }
}

impl From<(u32, u32)> for EntryValue {
    fn from(value: (u32, u32)) -> Self {
        Self::URational(value.into())
    }
}

impl From<(i32, i32)> for EntryValue {
    fn from(value: (i32, i32)) -> Self {
        Self::IRational((value.0, value.1).into())
    }
}

pub type URational = Rational<u32>;
pub type IRational = Rational<i32>;

#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Rational<T>(pub T, pub T);

impl<T> Rational<T>
where
    T: Copy + Into<f64>,
{
    pub fn as_float(&self) -> f64 {
        std::convert::Into::<f64>::into(self.0) / std::convert::Into::<f64>::into(self.1)
    }
}

impl<T: Display> Display for Rational<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, self.1)
    }
}

impl<T> From<(T, T)> for Rational<T>
where
    T: Copy,
{
    fn from(value: (T, T)) -> Self {
        Self(value.0, value.1)
    }
}

impl<T> From<Rational<T>> for (T, T)
where
    T: Copy,
{
    fn from(value: Rational<T>) -> Self {
        (value.0, value.1)
    }
}

fn get_cstr(data: &[u8]) -> std::result::Result<String, FromUtf8Error> {
    String::from_utf8(
        data.iter()
            .take_while(|b| **b != 0)
            .cloned()
            .collect::<Vec<u8>>(),
    )
}

pub(crate) trait TryFromBytes: Sized {
    fn try_from_bytes(bs: &[u8], endian: Endianness) -> Result<Self, Error>;
}

macro_rules! impl_try_from_bytes {
    ($($t:ty),*) => {
        $(
            impl TryFromBytes for $t {
                fn try_from_bytes(bs: &[u8], endian: Endianness) -> Result<Self, Error> {
                    fn make_err<T>() -> Error {
                        Error::InvalidData(format!(
                            "data is too small to convert to {}",
                            std::any::type_name::<T>(),
                        ))
                    }
                    let (int_bytes, _) = bs
                        .split_at_checked(std::mem::size_of::<Self>())
                        .ok_or_else(make_err::<Self>)?;
                    let int_bytes = int_bytes.try_into().map_err(|_| make_err::<Self>())?;
                    match endian {
                        Endianness::Little => Ok(Self::from_le_bytes(int_bytes)),
                        _ => Ok(Self::from_be_bytes(int_bytes)),
                    }
                }
            }
        )*
    };
}

impl_try_from_bytes!(u16, i16, u32, i32, f32, f64);

pub(crate) fn decode_rational<T: TryFromBytes>(
    data: &[u8],
    endian: Endianness,
) -> Result<Rational<T>, Error> {
    if data.len() < 8 {
        return Err(Error::InvalidData(
            "data is too small to decode a rational".to_string(),
        ));
    }

    let numerator = T::try_from_bytes(data, endian)?;
    let denominator = T::try_from_bytes(&data[4..], endian)?; // Safe-slice
    Ok(Rational::<T>(numerator, denominator))
}
