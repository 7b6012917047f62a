use keel_core::Value;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use time::{format_description::BorrowedFormatItem, macros::format_description};

pub(crate) const DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
pub(crate) const TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond]");
pub(crate) const TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
pub(crate) const TIMESTAMP_WITH_TIMEZONE: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
);

/// Binds a [`Value`] as a SQLite parameter.
///
/// Integers, booleans and integral decimals are stored as INTEGER, other decimals as REAL,
/// uuids and temporal values as TEXT.
#[derive(Debug)]
pub(crate) struct SqliteValue<'a>(pub(crate) &'a Value);

impl ToSql for SqliteValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self.0 {
            Value::Boolean(Some(v)) => integer(*v as i64),
            Value::Int8(Some(v)) => integer(*v as i64),
            Value::Int16(Some(v)) => integer(*v as i64),
            Value::Int32(Some(v)) => integer(*v as i64),
            Value::Int64(Some(v)) => integer(*v),
            Value::UInt8(Some(v)) => integer(*v as i64),
            Value::UInt16(Some(v)) => integer(*v as i64),
            Value::UInt32(Some(v)) => integer(*v as i64),
            Value::UInt64(Some(v)) => i64::try_from(*v)
                .map(|v| ToSqlOutput::Owned(SqlValue::Integer(v)))
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e))),
            Value::Float32(Some(v)) => Ok(ToSqlOutput::Owned(SqlValue::Real(*v as f64))),
            Value::Float64(Some(v)) => Ok(ToSqlOutput::Owned(SqlValue::Real(*v))),
            Value::Decimal(Some(v), ..) => Ok(ToSqlOutput::Owned(numeric(v))),
            Value::Varchar(Some(v)) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes()))),
            Value::Blob(Some(v)) => Ok(ToSqlOutput::Borrowed(ValueRef::Blob(&v[..]))),
            Value::Date(Some(v)) => formatted(v.format(DATE)),
            Value::Time(Some(v)) => formatted(v.format(TIME)),
            Value::Timestamp(Some(v)) => formatted(v.format(TIMESTAMP)),
            Value::TimestampWithTimezone(Some(v)) => formatted(v.format(TIMESTAMP_WITH_TIMEZONE)),
            Value::Uuid(Some(v)) => text(v.hyphenated().to_string()),
            _ => Ok(ToSqlOutput::Owned(SqlValue::Null)),
        }
    }
}

fn integer(value: i64) -> rusqlite::Result<ToSqlOutput<'static>> {
    Ok(ToSqlOutput::Owned(SqlValue::Integer(value)))
}

/// Keeps decimals comparable and sortable against NUMERIC columns.
fn numeric(value: &Decimal) -> SqlValue {
    match (value.fract().is_zero(), value.to_i64(), value.to_f64()) {
        (true, Some(v), _) => SqlValue::Integer(v),
        (_, _, Some(v)) => SqlValue::Real(v),
        _ => SqlValue::Text(value.to_string()),
    }
}

fn text(value: String) -> rusqlite::Result<ToSqlOutput<'static>> {
    Ok(ToSqlOutput::Owned(SqlValue::Text(value)))
}

fn formatted(value: Result<String, time::error::Format>) -> rusqlite::Result<ToSqlOutput<'static>> {
    value
        .map(|v| ToSqlOutput::Owned(SqlValue::Text(v)))
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Converts a column of a result row, the entity decoder narrows it to the field type.
pub(crate) fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int64(Some(v)),
        ValueRef::Real(v) => Value::Float64(Some(v)),
        ValueRef::Text(v) => Value::Varchar(Some(String::from_utf8_lossy(v).into_owned())),
        ValueRef::Blob(v) => Value::Blob(Some(v.into())),
    }
}
