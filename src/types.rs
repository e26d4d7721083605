//! Static type metadata for expression nodes.
//!
//! This module provides:
//! - `FieldType`: column and result types as reported by the catalog
//! - `ItemResult`: the evaluation domain a type belongs to
//! - `Decimals`: the scale of a result, either fixed or unbounded
//! - `Value`: literal constants appearing in expressions

use serde::Deserialize;
use std::fmt;

/// Largest representable display length. Length inference saturates here.
pub const MAX_FIELD_LENGTH: u32 = u32::MAX;

/// Raw scale value used on the wire for "decimals not fixed".
pub const NOT_FIXED_DEC: u32 = 31;

/// Maximum precision of a fixed-point value.
pub const DECIMAL_MAX_PRECISION: u32 = 65;

/// Maximum scale of a fixed-point value.
pub const DECIMAL_MAX_SCALE: u32 = 30;

/// Column and result types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Decimal = 0,
    Tiny = 1,
    Short = 2,
    Long = 3,
    Float = 4,
    Double = 5,
    Null = 6,
    Timestamp = 7,
    LongLong = 8,
    Int24 = 9,
    Date = 10,
    Time = 11,
    DateTime = 12,
    Year = 13,
    Varchar = 15,
    Bit = 16,
    NewDecimal = 246,
    Enum = 247,
    Set = 248,
    Blob = 252,
    VarString = 253,
    String = 254,
    Geometry = 255,
}

impl FieldType {
    /// Decode a wire type code
    pub fn from_u8(code: u8) -> Option<Self> {
        let field_type = match code {
            0 => FieldType::Decimal,
            1 => FieldType::Tiny,
            2 => FieldType::Short,
            3 => FieldType::Long,
            4 => FieldType::Float,
            5 => FieldType::Double,
            6 => FieldType::Null,
            7 => FieldType::Timestamp,
            8 => FieldType::LongLong,
            9 => FieldType::Int24,
            10 => FieldType::Date,
            11 => FieldType::Time,
            12 => FieldType::DateTime,
            13 => FieldType::Year,
            15 => FieldType::Varchar,
            16 => FieldType::Bit,
            246 => FieldType::NewDecimal,
            247 => FieldType::Enum,
            248 => FieldType::Set,
            252 => FieldType::Blob,
            253 => FieldType::VarString,
            254 => FieldType::String,
            255 => FieldType::Geometry,
            _ => return None,
        };
        Some(field_type)
    }

    /// Evaluation domain of values of this type
    pub fn result_type(self) -> ItemResult {
        match self {
            FieldType::Tiny
            | FieldType::Short
            | FieldType::Long
            | FieldType::LongLong
            | FieldType::Int24
            | FieldType::Year
            | FieldType::Bit => ItemResult::Int,
            FieldType::Float | FieldType::Double => ItemResult::Real,
            FieldType::Decimal | FieldType::NewDecimal => ItemResult::Decimal,
            _ => ItemResult::String,
        }
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            FieldType::Timestamp | FieldType::Date | FieldType::Time | FieldType::DateTime
        )
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self.result_type(),
            ItemResult::Int | ItemResult::Real | ItemResult::Decimal
        )
    }

    pub fn is_string(self) -> bool {
        matches!(
            self,
            FieldType::Varchar
                | FieldType::VarString
                | FieldType::String
                | FieldType::Enum
                | FieldType::Set
                | FieldType::Blob
        )
    }

    /// Display width used when the catalog does not give one
    pub fn default_length(self) -> u32 {
        match self {
            FieldType::Tiny => 4,
            FieldType::Short => 6,
            FieldType::Int24 => 9,
            FieldType::Long => 11,
            FieldType::LongLong => 20,
            FieldType::Float => 12,
            FieldType::Double => 22,
            FieldType::Decimal | FieldType::NewDecimal => 11,
            FieldType::Year => 4,
            FieldType::Date | FieldType::Time => 10,
            FieldType::DateTime | FieldType::Timestamp => 19,
            FieldType::Bit => 1,
            FieldType::Null => 0,
            FieldType::Varchar | FieldType::VarString | FieldType::String => 255,
            FieldType::Enum | FieldType::Set => 255,
            FieldType::Blob | FieldType::Geometry => 65535,
        }
    }

    /// Scale used when the catalog does not give one
    pub fn default_decimals(self) -> Decimals {
        match self.result_type() {
            ItemResult::Int | ItemResult::Decimal => Decimals::Fixed(0),
            _ if self.is_temporal() => Decimals::Fixed(0),
            _ => Decimals::NotFixed,
        }
    }
}

/// Evaluation domain of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemResult {
    String,
    Real,
    Int,
    Decimal,
    Row,
}

impl ItemResult {
    /// Domain two operands of an arithmetic operation are evaluated in
    pub fn numeric_merge(self, other: ItemResult) -> ItemResult {
        match (self, other) {
            (ItemResult::Int, ItemResult::Int) => ItemResult::Int,
            (ItemResult::Real, _) | (_, ItemResult::Real) => ItemResult::Real,
            (ItemResult::String, _) | (_, ItemResult::String) => ItemResult::Real,
            (ItemResult::Row, _) | (_, ItemResult::Row) => ItemResult::Real,
            _ => ItemResult::Decimal,
        }
    }

    /// Result field type representing this domain
    pub fn field_type(self) -> FieldType {
        match self {
            ItemResult::Int => FieldType::LongLong,
            ItemResult::Real => FieldType::Double,
            ItemResult::Decimal => FieldType::NewDecimal,
            ItemResult::String | ItemResult::Row => FieldType::VarString,
        }
    }
}

/// Scale of a numeric result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decimals {
    Fixed(u32),
    /// Unbounded; once reached it is never narrowed again
    NotFixed,
}

impl Decimals {
    /// Decode a raw scale, where anything at or above `NOT_FIXED_DEC` is unbounded
    pub fn from_raw(raw: u32) -> Self {
        if raw >= NOT_FIXED_DEC {
            Decimals::NotFixed
        } else {
            Decimals::Fixed(raw)
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            Decimals::Fixed(n) => n,
            Decimals::NotFixed => NOT_FIXED_DEC,
        }
    }

    pub fn is_fixed(self) -> bool {
        matches!(self, Decimals::Fixed(_))
    }

    pub fn scale(self) -> Option<u32> {
        match self {
            Decimals::Fixed(n) => Some(n),
            Decimals::NotFixed => None,
        }
    }

    /// Wider of two scales; unbounded wins
    pub fn max(self, other: Decimals) -> Decimals {
        match (self, other) {
            (Decimals::Fixed(a), Decimals::Fixed(b)) => Decimals::Fixed(a.max(b)),
            _ => Decimals::NotFixed,
        }
    }

    /// Scale clamped into the fixed-point domain
    pub fn fixed_point_scale(self) -> u32 {
        match self {
            Decimals::Fixed(n) => n.min(DECIMAL_MAX_SCALE),
            Decimals::NotFixed => DECIMAL_MAX_SCALE,
        }
    }
}

impl Default for Decimals {
    fn default() -> Self {
        Decimals::Fixed(0)
    }
}

/// Literal constant
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    /// Fixed-point number kept in its textual form, e.g. "12.50"
    Decimal(String),
    String(String),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Null => FieldType::Null,
            Value::Int(_) => FieldType::LongLong,
            Value::Real(_) => FieldType::Double,
            Value::Decimal(_) => FieldType::NewDecimal,
            Value::String(_) => FieldType::VarString,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is numerically zero
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Int(v) => *v == 0,
            Value::Real(v) => *v == 0.0,
            Value::Decimal(text) => text
                .trim_start_matches(['-', '+'])
                .chars()
                .all(|c| c == '0' || c == '.'),
            Value::Null | Value::String(_) => false,
        }
    }

    /// Display length of the value
    pub fn max_length(&self) -> u32 {
        match self {
            Value::Null => 0,
            Value::String(s) => s.chars().count() as u32,
            Value::Decimal(text) => text.trim_start_matches(['-', '+']).replace('.', "").len() as u32,
            other => other.to_string().len() as u32,
        }
    }

    pub fn decimals(&self) -> Decimals {
        match self {
            Value::Null | Value::Int(_) => Decimals::Fixed(0),
            Value::Real(_) | Value::String(_) => Decimals::NotFixed,
            Value::Decimal(text) => Decimals::Fixed(
                text.split_once('.')
                    .map(|(_, frac)| frac.len() as u32)
                    .unwrap_or(0),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{:?}", v),
            Value::Decimal(text) => write!(f, "{}", text),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_types() {
        assert_eq!(FieldType::Long.result_type(), ItemResult::Int);
        assert_eq!(FieldType::Double.result_type(), ItemResult::Real);
        assert_eq!(FieldType::NewDecimal.result_type(), ItemResult::Decimal);
        assert_eq!(FieldType::Varchar.result_type(), ItemResult::String);
        assert_eq!(FieldType::DateTime.result_type(), ItemResult::String);

        assert!(FieldType::Timestamp.is_temporal());
        assert!(!FieldType::Year.is_temporal());
        assert!(FieldType::Tiny.is_numeric());
        assert!(!FieldType::Date.is_numeric());
        assert!(FieldType::Varchar.is_string());
    }

    #[test]
    fn test_from_u8() {
        assert_eq!(FieldType::from_u8(8), Some(FieldType::LongLong));
        assert_eq!(FieldType::from_u8(246), Some(FieldType::NewDecimal));
        assert_eq!(FieldType::from_u8(FieldType::Geometry as u8), Some(FieldType::Geometry));
        assert_eq!(FieldType::from_u8(14), None);
    }

    #[test]
    fn test_numeric_merge() {
        assert_eq!(
            ItemResult::Int.numeric_merge(ItemResult::Int),
            ItemResult::Int
        );
        assert_eq!(
            ItemResult::Int.numeric_merge(ItemResult::Decimal),
            ItemResult::Decimal
        );
        assert_eq!(
            ItemResult::Decimal.numeric_merge(ItemResult::Real),
            ItemResult::Real
        );
        assert_eq!(
            ItemResult::String.numeric_merge(ItemResult::Int),
            ItemResult::Real
        );
    }

    #[test]
    fn test_decimals() {
        assert_eq!(Decimals::from_raw(2), Decimals::Fixed(2));
        assert_eq!(Decimals::from_raw(NOT_FIXED_DEC), Decimals::NotFixed);
        assert_eq!(Decimals::NotFixed.as_raw(), NOT_FIXED_DEC);

        assert_eq!(Decimals::Fixed(2).max(Decimals::Fixed(5)), Decimals::Fixed(5));
        assert_eq!(Decimals::Fixed(2).max(Decimals::NotFixed), Decimals::NotFixed);
        assert_eq!(Decimals::NotFixed.max(Decimals::Fixed(9)), Decimals::NotFixed);

        assert_eq!(Decimals::Fixed(40).fixed_point_scale(), DECIMAL_MAX_SCALE);
        assert_eq!(Decimals::NotFixed.fixed_point_scale(), DECIMAL_MAX_SCALE);
    }

    #[test]
    fn test_value_metadata() {
        assert_eq!(Value::Int(-123).max_length(), 4);
        assert_eq!(Value::Int(7).decimals(), Decimals::Fixed(0));

        let dec = Value::Decimal("12.50".to_string());
        assert_eq!(dec.max_length(), 4);
        assert_eq!(dec.decimals(), Decimals::Fixed(2));
        assert!(!dec.is_zero());
        assert!(Value::Decimal("0.00".to_string()).is_zero());

        assert_eq!(Value::String("héllo".to_string()).max_length(), 5);
        assert_eq!(Value::Real(1.5).decimals(), Decimals::NotFixed);
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Real(2.0).to_string(), "2.0");
        assert_eq!(Value::String("it's".to_string()).to_string(), "'it''s'");
    }
}
