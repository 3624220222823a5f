//! Primitive data types for Property, Range and Qualifier values.
//!
//! A [`DataType`] governs how text is parsed into a native [`PrimitiveValue`]
//! and how that value is printed back.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};
use lazy_static::lazy_static;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

use crate::error::ValueError;
use crate::util::XsdDuration;

/// Primitive value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Boolean,
    /// Signed 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Short,
    /// Signed 32-bit integer.
    Int,
    /// Signed 64-bit integer.
    Long,
    /// `xs:integer`, stored as a signed 64-bit integer.
    Integer,
    UnsignedByte,
    UnsignedShort,
    UnsignedInt,
    UnsignedLong,
    Float,
    Double,
    Decimal,
    DateTime,
    Date,
    Time,
    AnyUri,
    Base64Binary,
    Duration,
}

lazy_static! {
    /// Lookup by short name (`Double`) and XSD name (`xs:double`).
    static ref DATA_TYPES_BY_NAME: FxHashMap<&'static str, DataType> = {
        let mut map = FxHashMap::default();
        for data_type in DataType::ALL {
            map.insert(data_type.name(), *data_type);
            map.insert(data_type.xsd_name(), *data_type);
        }
        map
    };
}

impl DataType {
    /// Every data type, in declaration order.
    pub const ALL: &'static [DataType] = &[
        DataType::String,
        DataType::Boolean,
        DataType::Byte,
        DataType::Short,
        DataType::Int,
        DataType::Long,
        DataType::Integer,
        DataType::UnsignedByte,
        DataType::UnsignedShort,
        DataType::UnsignedInt,
        DataType::UnsignedLong,
        DataType::Float,
        DataType::Double,
        DataType::Decimal,
        DataType::DateTime,
        DataType::Date,
        DataType::Time,
        DataType::AnyUri,
        DataType::Base64Binary,
        DataType::Duration,
    ];

    /// Returns the short name used in JSON (`"Double"`).
    pub fn name(self) -> &'static str {
        match self {
            DataType::String => "String",
            DataType::Boolean => "Boolean",
            DataType::Byte => "Byte",
            DataType::Short => "Short",
            DataType::Int => "Int",
            DataType::Long => "Long",
            DataType::Integer => "Integer",
            DataType::UnsignedByte => "UnsignedByte",
            DataType::UnsignedShort => "UnsignedShort",
            DataType::UnsignedInt => "UnsignedInt",
            DataType::UnsignedLong => "UnsignedLong",
            DataType::Float => "Float",
            DataType::Double => "Double",
            DataType::Decimal => "Decimal",
            DataType::DateTime => "DateTime",
            DataType::Date => "Date",
            DataType::Time => "Time",
            DataType::AnyUri => "AnyURI",
            DataType::Base64Binary => "Base64Binary",
            DataType::Duration => "Duration",
        }
    }

    /// Returns the XML Schema name used in XML (`"xs:double"`).
    pub fn xsd_name(self) -> &'static str {
        match self {
            DataType::String => "xs:string",
            DataType::Boolean => "xs:boolean",
            DataType::Byte => "xs:byte",
            DataType::Short => "xs:short",
            DataType::Int => "xs:int",
            DataType::Long => "xs:long",
            DataType::Integer => "xs:integer",
            DataType::UnsignedByte => "xs:unsignedByte",
            DataType::UnsignedShort => "xs:unsignedShort",
            DataType::UnsignedInt => "xs:unsignedInt",
            DataType::UnsignedLong => "xs:unsignedLong",
            DataType::Float => "xs:float",
            DataType::Double => "xs:double",
            DataType::Decimal => "xs:decimal",
            DataType::DateTime => "xs:dateTime",
            DataType::Date => "xs:date",
            DataType::Time => "xs:time",
            DataType::AnyUri => "xs:anyURI",
            DataType::Base64Binary => "xs:base64Binary",
            DataType::Duration => "xs:duration",
        }
    }

    /// Parses either the short or the XSD name.
    pub fn from_name(name: &str) -> Option<DataType> {
        DATA_TYPES_BY_NAME.get(name).copied()
    }

    /// Returns true for integer types (signed and unsigned).
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::Byte
                | DataType::Short
                | DataType::Int
                | DataType::Long
                | DataType::Integer
                | DataType::UnsignedByte
                | DataType::UnsignedShort
                | DataType::UnsignedInt
                | DataType::UnsignedLong
        )
    }

    /// Returns true for every type written as a JSON number.
    pub fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, DataType::Float | DataType::Double | DataType::Decimal)
    }

    /// Parses lexical text into a native value of this type.
    pub fn parse(self, text: &str) -> Result<PrimitiveValue, ValueError> {
        let mismatch = || ValueError::TypeMismatch {
            data_type: self,
            text: text.to_string(),
        };
        let t = text.trim();
        let value = match self {
            // String-like types keep their text verbatim
            DataType::String => PrimitiveValue::String(text.to_string()),
            DataType::AnyUri => PrimitiveValue::AnyUri(text.to_string()),
            DataType::Boolean => match t {
                "true" | "1" => PrimitiveValue::Boolean(true),
                "false" | "0" => PrimitiveValue::Boolean(false),
                _ => return Err(mismatch()),
            },
            DataType::Byte => PrimitiveValue::Byte(t.parse().map_err(|_| mismatch())?),
            DataType::Short => PrimitiveValue::Short(t.parse().map_err(|_| mismatch())?),
            DataType::Int => PrimitiveValue::Int(t.parse().map_err(|_| mismatch())?),
            DataType::Long => PrimitiveValue::Long(t.parse().map_err(|_| mismatch())?),
            DataType::Integer => PrimitiveValue::Integer(t.parse().map_err(|_| mismatch())?),
            DataType::UnsignedByte => {
                PrimitiveValue::UnsignedByte(t.parse().map_err(|_| mismatch())?)
            }
            DataType::UnsignedShort => {
                PrimitiveValue::UnsignedShort(t.parse().map_err(|_| mismatch())?)
            }
            DataType::UnsignedInt => {
                PrimitiveValue::UnsignedInt(t.parse().map_err(|_| mismatch())?)
            }
            DataType::UnsignedLong => {
                PrimitiveValue::UnsignedLong(t.parse().map_err(|_| mismatch())?)
            }
            DataType::Float => PrimitiveValue::Float(
                parse_special_float(t)
                    .map(|f| f as f32)
                    .or_else(|| parse_plain_float(t))
                    .ok_or_else(mismatch)?,
            ),
            DataType::Double => PrimitiveValue::Double(
                parse_special_float(t)
                    .or_else(|| parse_plain_float(t))
                    .ok_or_else(mismatch)?,
            ),
            DataType::Decimal => PrimitiveValue::Decimal(t.parse().map_err(|_| mismatch())?),
            DataType::DateTime => PrimitiveValue::DateTime(parse_date_time(t).ok_or_else(mismatch)?),
            DataType::Date => PrimitiveValue::Date(
                NaiveDate::parse_from_str(t, "%Y-%m-%d").map_err(|_| mismatch())?,
            ),
            DataType::Time => PrimitiveValue::Time(
                NaiveTime::parse_from_str(t, "%H:%M:%S%.f").map_err(|_| mismatch())?,
            ),
            DataType::Base64Binary => {
                PrimitiveValue::Base64Binary(BASE64.decode(t).map_err(|_| mismatch())?)
            }
            DataType::Duration => PrimitiveValue::Duration(t.parse().map_err(|_| mismatch())?),
        };
        Ok(value)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// XSD spells the IEEE specials `INF`, `-INF` and `NaN`.
fn parse_special_float(t: &str) -> Option<f64> {
    match t {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => None,
    }
}

/// Parses a finite float; Rust's own `inf`/`nan` spellings are rejected, as
/// are tokens that overflow the target width.
fn parse_plain_float<T: std::str::FromStr + Into<f64> + Copy>(t: &str) -> Option<T> {
    if t.bytes().any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E') {
        return None;
    }
    let value: T = t.parse().ok()?;
    value.into().is_finite().then_some(value)
}

/// Accepts RFC 3339 and zone-less `xs:dateTime` (taken as UTC).
fn parse_date_time(t: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    let utc = FixedOffset::east_opt(0)?;
    Some(naive.and_utc().with_timezone(&utc))
}

fn format_float(value: f64, debug: impl fmt::Debug) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        format!("{:?}", debug)
    }
}

/// A native value of one [`DataType`].
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    String(String),
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Integer(i64),
    UnsignedByte(u8),
    UnsignedShort(u16),
    UnsignedInt(u32),
    UnsignedLong(u64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    AnyUri(String),
    Base64Binary(Vec<u8>),
    Duration(XsdDuration),
}

impl PrimitiveValue {
    /// Returns the data type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            PrimitiveValue::String(_) => DataType::String,
            PrimitiveValue::Boolean(_) => DataType::Boolean,
            PrimitiveValue::Byte(_) => DataType::Byte,
            PrimitiveValue::Short(_) => DataType::Short,
            PrimitiveValue::Int(_) => DataType::Int,
            PrimitiveValue::Long(_) => DataType::Long,
            PrimitiveValue::Integer(_) => DataType::Integer,
            PrimitiveValue::UnsignedByte(_) => DataType::UnsignedByte,
            PrimitiveValue::UnsignedShort(_) => DataType::UnsignedShort,
            PrimitiveValue::UnsignedInt(_) => DataType::UnsignedInt,
            PrimitiveValue::UnsignedLong(_) => DataType::UnsignedLong,
            PrimitiveValue::Float(_) => DataType::Float,
            PrimitiveValue::Double(_) => DataType::Double,
            PrimitiveValue::Decimal(_) => DataType::Decimal,
            PrimitiveValue::DateTime(_) => DataType::DateTime,
            PrimitiveValue::Date(_) => DataType::Date,
            PrimitiveValue::Time(_) => DataType::Time,
            PrimitiveValue::AnyUri(_) => DataType::AnyUri,
            PrimitiveValue::Base64Binary(_) => DataType::Base64Binary,
            PrimitiveValue::Duration(_) => DataType::Duration,
        }
    }

    /// Returns the lexical text form.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Returns the value as f64 for numeric types.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PrimitiveValue::Byte(v) => Some(*v as f64),
            PrimitiveValue::Short(v) => Some(*v as f64),
            PrimitiveValue::Int(v) => Some(*v as f64),
            PrimitiveValue::Long(v) | PrimitiveValue::Integer(v) => Some(*v as f64),
            PrimitiveValue::UnsignedByte(v) => Some(*v as f64),
            PrimitiveValue::UnsignedShort(v) => Some(*v as f64),
            PrimitiveValue::UnsignedInt(v) => Some(*v as f64),
            PrimitiveValue::UnsignedLong(v) => Some(*v as f64),
            PrimitiveValue::Float(v) => Some(*v as f64),
            PrimitiveValue::Double(v) => Some(*v),
            PrimitiveValue::Decimal(v) => v.to_string().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::String(s) | PrimitiveValue::AnyUri(s) => f.write_str(s),
            PrimitiveValue::Boolean(v) => write!(f, "{}", v),
            PrimitiveValue::Byte(v) => write!(f, "{}", v),
            PrimitiveValue::Short(v) => write!(f, "{}", v),
            PrimitiveValue::Int(v) => write!(f, "{}", v),
            PrimitiveValue::Long(v) | PrimitiveValue::Integer(v) => write!(f, "{}", v),
            PrimitiveValue::UnsignedByte(v) => write!(f, "{}", v),
            PrimitiveValue::UnsignedShort(v) => write!(f, "{}", v),
            PrimitiveValue::UnsignedInt(v) => write!(f, "{}", v),
            PrimitiveValue::UnsignedLong(v) => write!(f, "{}", v),
            PrimitiveValue::Float(v) => f.write_str(&format_float(*v as f64, v)),
            PrimitiveValue::Double(v) => f.write_str(&format_float(*v, v)),
            PrimitiveValue::Decimal(v) => write!(f, "{}", v),
            PrimitiveValue::DateTime(v) => {
                f.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            PrimitiveValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            PrimitiveValue::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
            PrimitiveValue::Base64Binary(bytes) => f.write_str(&BASE64.encode(bytes)),
            PrimitiveValue::Duration(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for PrimitiveValue {
    fn from(v: bool) -> Self {
        PrimitiveValue::Boolean(v)
    }
}

impl From<i32> for PrimitiveValue {
    fn from(v: i32) -> Self {
        PrimitiveValue::Int(v)
    }
}

impl From<i64> for PrimitiveValue {
    fn from(v: i64) -> Self {
        PrimitiveValue::Long(v)
    }
}

impl From<f64> for PrimitiveValue {
    fn from(v: f64) -> Self {
        PrimitiveValue::Double(v)
    }
}

impl From<Decimal> for PrimitiveValue {
    fn from(v: Decimal) -> Self {
        PrimitiveValue::Decimal(v)
    }
}

impl From<&str> for PrimitiveValue {
    fn from(v: &str) -> Self {
        PrimitiveValue::String(v.to_string())
    }
}

impl From<String> for PrimitiveValue {
    fn from(v: String) -> Self {
        PrimitiveValue::String(v)
    }
}
