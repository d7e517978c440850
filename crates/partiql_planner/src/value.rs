use std::fmt;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use partiql_ast::Literal;

use crate::types::StaticType;

/// A constant value embedded in a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Missing,
    Bool(bool),
    Int64(i64),
    Decimal { mantissa: i128, scale: u32 },
    Float64(f64),
    String(String),
    Date(NaiveDate),
    Time { time: NaiveTime, offset: FixedOffset },
    Timestamp {
        timestamp: NaiveDateTime,
        offset: Option<FixedOffset>,
    },
}

impl ScalarValue {
    /// Convert an AST literal, applying `default_timezone` to times without
    /// an explicit offset.
    pub fn from_literal(literal: &Literal, default_timezone: FixedOffset) -> Self {
        match literal {
            Literal::Null => ScalarValue::Null,
            Literal::Missing => ScalarValue::Missing,
            Literal::Boolean(b) => ScalarValue::Bool(*b),
            Literal::Integer(i) => ScalarValue::Int64(*i),
            Literal::Decimal { mantissa, scale } => ScalarValue::Decimal {
                mantissa: *mantissa,
                scale: *scale,
            },
            Literal::Float(f) => ScalarValue::Float64(*f),
            Literal::String(s) => ScalarValue::String(s.clone()),
            Literal::Date(d) => ScalarValue::Date(*d),
            Literal::Time { time, offset } => ScalarValue::Time {
                time: *time,
                offset: offset.unwrap_or(default_timezone),
            },
            Literal::Timestamp { timestamp, offset } => ScalarValue::Timestamp {
                timestamp: *timestamp,
                offset: *offset,
            },
        }
    }

    pub fn static_type(&self) -> StaticType {
        match self {
            ScalarValue::Null => StaticType::Null,
            ScalarValue::Missing => StaticType::Missing,
            ScalarValue::Bool(_) => StaticType::Bool,
            ScalarValue::Int64(_) => StaticType::Int64,
            ScalarValue::Decimal { .. } => StaticType::Decimal,
            ScalarValue::Float64(_) => StaticType::Float64,
            ScalarValue::String(_) => StaticType::String,
            ScalarValue::Date(_) => StaticType::Date,
            ScalarValue::Time { .. } => StaticType::Time,
            ScalarValue::Timestamp { .. } => StaticType::Timestamp,
        }
    }

    pub fn try_as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn try_as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub const fn is_absent(&self) -> bool {
        matches!(self, ScalarValue::Null | ScalarValue::Missing)
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int64(i) => Some(*i as f64),
            ScalarValue::Float64(f) => Some(*f),
            ScalarValue::Decimal { mantissa, scale } => {
                Some(*mantissa as f64 / 10_f64.powi(*scale as i32))
            }
            _ => None,
        }
    }

    /// Evaluate `self = other`.
    ///
    /// MISSING on either side produces MISSING, otherwise NULL on either side
    /// produces NULL. Values of unrelated types are never equal.
    pub fn equals(&self, other: &ScalarValue) -> ScalarValue {
        match (self, other) {
            (ScalarValue::Missing, _) | (_, ScalarValue::Missing) => ScalarValue::Missing,
            (ScalarValue::Null, _) | (_, ScalarValue::Null) => ScalarValue::Null,
            (ScalarValue::Int64(a), ScalarValue::Int64(b)) => ScalarValue::Bool(a == b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => ScalarValue::Bool(a == b),
                _ => ScalarValue::Bool(a == b),
            },
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Bool(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::String(value.to_string())
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Missing => write!(f, "MISSING"),
            ScalarValue::Bool(b) => write!(f, "{b}"),
            ScalarValue::Int64(i) => write!(f, "{i}"),
            ScalarValue::Decimal { mantissa, scale } => {
                if *scale == 0 {
                    return write!(f, "{mantissa}");
                }
                let divisor = 10_i128.pow(*scale);
                let sign = if *mantissa < 0 { "-" } else { "" };
                let abs = mantissa.unsigned_abs();
                let divisor = divisor.unsigned_abs();
                write!(
                    f,
                    "{sign}{}.{:0width$}",
                    abs / divisor,
                    abs % divisor,
                    width = *scale as usize
                )
            }
            ScalarValue::Float64(v) => write!(f, "{v}"),
            ScalarValue::String(s) => write!(f, "'{s}'"),
            ScalarValue::Date(d) => write!(f, "DATE '{d}'"),
            ScalarValue::Time { time, offset } => write!(f, "TIME '{time}{offset}'"),
            ScalarValue::Timestamp { timestamp, offset } => match offset {
                Some(offset) => write!(f, "TIMESTAMP '{timestamp}{offset}'"),
                None => write!(f, "TIMESTAMP '{timestamp}'"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_gets_default_timezone() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let lit = Literal::Time {
            time: NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
            offset: None,
        };

        let val = ScalarValue::from_literal(&lit, tz);
        assert_eq!(
            ScalarValue::Time {
                time: NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
                offset: tz,
            },
            val
        );
    }

    #[test]
    fn explicit_offset_kept() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let explicit = FixedOffset::west_opt(7200).unwrap();
        let lit = Literal::Time {
            time: NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            offset: Some(explicit),
        };

        match ScalarValue::from_literal(&lit, tz) {
            ScalarValue::Time { offset, .. } => assert_eq!(explicit, offset),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn equals_semantics() {
        assert_eq!(ScalarValue::Bool(true), ScalarValue::from(1_i64).equals(&1_i64.into()));
        assert_eq!(
            ScalarValue::Bool(true),
            ScalarValue::Int64(2).equals(&ScalarValue::Float64(2.0))
        );
        assert_eq!(ScalarValue::Bool(false), ScalarValue::from("a").equals(&1_i64.into()));
        assert_eq!(ScalarValue::Null, ScalarValue::Null.equals(&1_i64.into()));
        assert_eq!(ScalarValue::Missing, ScalarValue::Null.equals(&ScalarValue::Missing));
    }

    #[test]
    fn display_decimal() {
        let v = ScalarValue::Decimal {
            mantissa: -1205,
            scale: 2,
        };
        assert_eq!("-12.05", v.to_string());
    }
}
