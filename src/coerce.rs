//! Conversions from dynamic script values to typed cells.
//!
//! Coercion follows ECMAScript-style semantics: `ToNumber` for the numeric
//! targets, `ToInt32` wrapping for integers, truthiness for booleans. The
//! script-level null (`()`) converts to a null cell for every target.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rhai::Dynamic;
use rust_decimal::{
    prelude::{FromPrimitive, ToPrimitive},
    Decimal,
};
use serde::Serialize;

use crate::error::{Error, Result};

/// Target type of a declared result-set column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// UTF-8 text.
    String,
    /// 32-bit signed integer.
    Integer,
    /// IEEE-754 double.
    Double,
    /// Fixed-precision decimal.
    Decimal,
    /// Boolean.
    Boolean,
    /// Calendar date and time, no timezone.
    DateTime,
}

impl ColumnType {
    /// Map a wire type tag to a column type. Unknown tags fall back to
    /// `String` rather than erroring.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "string" => Self::String,
            "integer" => Self::Integer,
            "double" => Self::Double,
            "decimal" => Self::Decimal,
            "boolean" => Self::Boolean,
            "datetime" => Self::DateTime,
            _ => Self::String,
        }
    }

    /// Canonical lowercase name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
        }
    }
}

/// A single typed cell value. Cells are `Option<CellValue>`; `None` is the
/// SQL-style null.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// A string cell.
    Text(String),
    /// A 32-bit integer cell.
    Int(i32),
    /// A double cell.
    Float(f64),
    /// A decimal cell.
    Decimal(Decimal),
    /// A boolean cell.
    Bool(bool),
    /// A datetime cell.
    DateTime(NaiveDateTime),
}

/// Convert a script value to a cell of the given column type.
///
/// The script-level null (`()`) yields `Ok(None)` regardless of target.
/// Only `Decimal` and `DateTime` can fail; the other targets are total.
pub fn coerce(value: &Dynamic, target: ColumnType) -> Result<Option<CellValue>> {
    if value.is_unit() {
        return Ok(None);
    }
    let cell = match target {
        ColumnType::String => CellValue::Text(value.to_string()),
        ColumnType::Integer => CellValue::Int(to_int32(to_number(value))),
        ColumnType::Double => CellValue::Float(to_number(value)),
        ColumnType::Decimal => {
            let n = to_number(value);
            let decimal = Decimal::from_f64(n).ok_or_else(|| Error::Coercion {
                value: value.to_string(),
                target: ColumnType::Decimal.as_str(),
            })?;
            CellValue::Decimal(decimal)
        }
        ColumnType::Boolean => CellValue::Bool(to_truthy(value)),
        ColumnType::DateTime => {
            let text = value.to_string();
            let parsed = parse_datetime(&text).ok_or_else(|| Error::Coercion {
                value: text,
                target: ColumnType::DateTime.as_str(),
            })?;
            CellValue::DateTime(parsed)
        }
    };
    Ok(Some(cell))
}

/// ECMAScript `ToNumber` over the value kinds rhai scripts produce.
/// Non-numeric input yields NaN, never an error.
fn to_number(value: &Dynamic) -> f64 {
    if let Ok(i) = value.as_int() {
        return i as f64;
    }
    if let Ok(f) = value.as_float() {
        return f;
    }
    if let Ok(b) = value.as_bool() {
        return if b { 1.0 } else { 0.0 };
    }
    if let Ok(d) = value.as_decimal() {
        return d.to_f64().unwrap_or(f64::NAN);
    }
    if value.is_string() {
        let text = value.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return 0.0;
        }
        return trimmed.parse::<f64>().unwrap_or(f64::NAN);
    }
    f64::NAN
}

/// ECMAScript `ToInt32`: truncate, wrap modulo 2^32, reinterpret signed.
/// NaN and infinities map to 0.
fn to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let modulus = 4_294_967_296.0_f64;
    let mut m = n.trunc() % modulus;
    if m < 0.0 {
        m += modulus;
    }
    // m is integral and within [0, 2^32), so the cast is exact.
    (m as u32) as i32
}

/// ECMAScript truthiness: false, zero, NaN, and the empty string are falsy;
/// arrays and maps are truthy. Callers handle `()` before this.
fn to_truthy(value: &Dynamic) -> bool {
    if let Ok(b) = value.as_bool() {
        return b;
    }
    if let Ok(i) = value.as_int() {
        return i != 0;
    }
    if let Ok(f) = value.as_float() {
        return f != 0.0 && !f.is_nan();
    }
    if let Ok(d) = value.as_decimal() {
        return !d.is_zero();
    }
    if value.is_string() {
        return !value.to_string().is_empty();
    }
    true
}

/// Locale-independent datetime parsing: RFC 3339 first, then a fixed set of
/// ISO-ish formats, then a bare calendar date at midnight.
fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
