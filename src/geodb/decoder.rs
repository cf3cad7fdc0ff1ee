//! Binary record decoder
//!
//! Interprets the fixed-width columns of one database row. Every read is
//! bounds-checked against the buffer; a row or string pointer that runs past
//! the end yields [`IpGeoError::Decode`] instead of a panic.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::Serialize;

use crate::errors::{IpGeoError, Result};

/// Column encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    U32,
    U64,
    F32,
    F64,
    /// 4-byte pointer into the string pool; the length byte sits at `pointer + skip`
    Str { skip: u32 },
    Ipv4,
    Ipv6,
}

impl FieldType {
    /// Bytes occupied inside the row
    pub const fn width(self) -> usize {
        match self {
            FieldType::U8 => 1,
            FieldType::U32 | FieldType::F32 | FieldType::Str { .. } | FieldType::Ipv4 => 4,
            FieldType::U64 | FieldType::F64 => 8,
            FieldType::Ipv6 => 16,
        }
    }
}

/// One column of a row, `offset` is relative to the row start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub offset: usize,
}

impl FieldSpec {
    pub const fn new(name: &'static str, ty: FieldType, offset: usize) -> Self {
        Self { name, ty, offset }
    }
}

/// Decoded column value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Float(f64),
    Int(u64),
    Ip(IpAddr),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ip(&self) -> Option<IpAddr> {
        match self {
            Value::Ip(ip) => Some(*ip),
            _ => None,
        }
    }
}

/// Field name → value mapping for one matched row
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AddressRecord {
    fields: BTreeMap<&'static str, Value>,
}

impl AddressRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &'static str, value: Value) {
        self.fields.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    pub fn get_ip(&self, name: &str) -> Option<IpAddr> {
        self.get(name).and_then(Value::as_ip)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }
}

/// Decode the row starting at `base` according to `schema`
pub fn decode_record(buf: &[u8], schema: &[FieldSpec], base: usize) -> Result<AddressRecord> {
    let mut record = AddressRecord::new();
    for field in schema {
        let offset = base
            .checked_add(field.offset)
            .ok_or_else(|| IpGeoError::decode(format!("offset overflow in field {}", field.name)))?;
        let value = decode_field(buf, field.ty, offset)
            .map_err(|e| IpGeoError::decode(format!("field {}: {}", field.name, e.message())))?;
        record.insert(field.name, value);
    }
    Ok(record)
}

fn decode_field(buf: &[u8], ty: FieldType, offset: usize) -> Result<Value> {
    let value = match ty {
        FieldType::U8 => Value::Int(read_array::<1>(buf, offset)?[0] as u64),
        FieldType::U32 => Value::Int(read_u32(buf, offset)? as u64),
        FieldType::U64 => Value::Int(u64::from_le_bytes(read_array::<8>(buf, offset)?)),
        FieldType::F32 => {
            let raw = f32::from_le_bytes(read_array::<4>(buf, offset)?);
            Value::Float(round_coordinate(raw as f64))
        }
        FieldType::F64 => Value::Float(f64::from_le_bytes(read_array::<8>(buf, offset)?)),
        FieldType::Str { skip } => {
            let pointer = read_u32(buf, offset)? as usize;
            let target = pointer
                .checked_add(skip as usize)
                .ok_or_else(|| IpGeoError::decode("string pointer overflow"))?;
            Value::Str(read_string(buf, target)?)
        }
        FieldType::Ipv4 => Value::Ip(IpAddr::V4(Ipv4Addr::from(read_u32(buf, offset)?))),
        FieldType::Ipv6 => Value::Ip(IpAddr::V6(Ipv6Addr::from(read_u128(buf, offset)?))),
    };
    Ok(value)
}

// 浮点坐标保留 6 位小数，与官方库输出保持一致
fn round_coordinate(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

#[inline]
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    let end = offset
        .checked_add(N)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| {
            IpGeoError::decode(format!(
                "read of {} bytes at {} exceeds buffer of {} bytes",
                N,
                offset,
                buf.len()
            ))
        })?;
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..end]);
    Ok(out)
}

#[inline]
pub(crate) fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array::<4>(buf, offset)?))
}

#[inline]
pub(crate) fn read_u128(buf: &[u8], offset: usize) -> Result<u128> {
    Ok(u128::from_le_bytes(read_array::<16>(buf, offset)?))
}

/// Length-prefixed string (one length byte)
pub(crate) fn read_string(buf: &[u8], offset: usize) -> Result<String> {
    let len = read_array::<1>(buf, offset)?[0] as usize;
    let start = offset + 1;
    let bytes = buf.get(start..start + len).ok_or_else(|| {
        IpGeoError::decode(format!(
            "string of {} bytes at {} exceeds buffer of {} bytes",
            len,
            offset,
            buf.len()
        ))
    })?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}
