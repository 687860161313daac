//! SQL Server type mapping to Rust types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tiberius::{ColumnType, FromSql, Row};
use uuid::Uuid;

/// A nullable scalar cell. `Null` serializes to JSON `null`, never to `""`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    U8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    String(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::U8(v) => write!(f, "{}", v),
            SqlValue::I16(v) => write!(f, "{}", v),
            SqlValue::I32(v) => write!(f, "{}", v),
            SqlValue::I64(v) => write!(f, "{}", v),
            SqlValue::F32(v) => write!(f, "{}", v),
            SqlValue::F64(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Uuid(v) => write!(f, "{}", v),
            SqlValue::Date(v) => write!(f, "{}", v),
            SqlValue::Time(v) => write!(f, "{}", v),
            SqlValue::DateTime(v) => write!(f, "{}", v),
            SqlValue::DateTimeUtc(v) => f.write_str(&v.to_rfc3339()),
            SqlValue::String(v) => f.write_str(v),
            SqlValue::Bytes(v) => {
                f.write_str("0x")?;
                v.iter().try_for_each(|b| write!(f, "{:02X}", b))
            }
        }
    }
}

/// Converts tiberius rows into [`SqlValue`] cells.
pub struct TypeMapper;

impl TypeMapper {
    /// All cells of a row, in column order.
    pub fn row_values(row: &Row) -> Vec<SqlValue> {
        (0..row.columns().len())
            .map(|idx| Self::extract_column(row, idx))
            .collect()
    }

    /// Extract one cell, dispatching on the declared column type.
    pub fn extract_column(row: &Row, idx: usize) -> SqlValue {
        let Some(column) = row.columns().get(idx) else {
            return SqlValue::Null;
        };

        let value = match column.column_type() {
            ColumnType::Null => Some(SqlValue::Null),
            ColumnType::Bit | ColumnType::Bitn => get::<bool>(row, idx).map(SqlValue::Bool),
            ColumnType::Int1 => get::<u8>(row, idx).map(SqlValue::U8),
            ColumnType::Int2 => get::<i16>(row, idx).map(SqlValue::I16),
            ColumnType::Int4 => get::<i32>(row, idx).map(SqlValue::I32),
            ColumnType::Int8 => get::<i64>(row, idx).map(SqlValue::I64),
            // Variable-width integers report their width only through the value.
            ColumnType::Intn => get::<i32>(row, idx)
                .map(SqlValue::I32)
                .or_else(|| get::<i64>(row, idx).map(SqlValue::I64))
                .or_else(|| get::<i16>(row, idx).map(SqlValue::I16))
                .or_else(|| get::<u8>(row, idx).map(SqlValue::U8)),
            ColumnType::Float4 => get::<f32>(row, idx).map(SqlValue::F32),
            ColumnType::Float8 | ColumnType::Floatn => get::<f64>(row, idx)
                .map(SqlValue::F64)
                .or_else(|| get::<f32>(row, idx).map(SqlValue::F32)),
            ColumnType::Money | ColumnType::Money4 => get::<f64>(row, idx)
                .map(SqlValue::F64)
                .or_else(|| get::<Decimal>(row, idx).map(SqlValue::Decimal)),
            ColumnType::Decimaln | ColumnType::Numericn => {
                get::<Decimal>(row, idx).map(SqlValue::Decimal)
            }
            ColumnType::Guid => get::<Uuid>(row, idx).map(SqlValue::Uuid),
            ColumnType::Daten => get::<NaiveDate>(row, idx).map(SqlValue::Date),
            ColumnType::Timen => get::<NaiveTime>(row, idx).map(SqlValue::Time),
            ColumnType::Datetime
            | ColumnType::Datetime4
            | ColumnType::Datetimen
            | ColumnType::Datetime2 => get::<NaiveDateTime>(row, idx).map(SqlValue::DateTime),
            ColumnType::DatetimeOffsetn => {
                get::<DateTime<Utc>>(row, idx).map(SqlValue::DateTimeUtc)
            }
            ColumnType::BigVarBin | ColumnType::BigBinary | ColumnType::Image => {
                get::<&[u8]>(row, idx).map(|v| SqlValue::Bytes(v.to_vec()))
            }
            _ => None,
        };

        // Character types, XML and anything unmapped fall back to text.
        value
            .or_else(|| get::<&str>(row, idx).map(|v| SqlValue::String(v.to_string())))
            .unwrap_or(SqlValue::Null)
    }
}

fn get<'a, T>(row: &'a Row, idx: usize) -> Option<T>
where
    T: FromSql<'a>,
{
    row.try_get::<T, usize>(idx).ok().flatten()
}
