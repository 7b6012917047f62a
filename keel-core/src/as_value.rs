use crate::{Error, Result, Value, truncate_long};
use anyhow::Context;
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::{any, borrow::Cow, str::FromStr};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, macros::format_description};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// It backs both directions of the mapping: entity fields become parameter
/// bindings through [`AsValue::as_value`] and row values become fields through
/// [`AsValue::try_from_value`].
///
/// # Error semantics
/// - Integer conversions accept any integer variant and fail when the value is
///   out of range for the target type.
/// - Text values (`Value::Varchar`) are parsed for types that drivers commonly
///   store as text: numbers, decimals, uuids and temporal types.
///
/// # Examples
/// ```rust
/// use keel_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert!(matches!(v, Value::Int32(Some(42))));
/// let n: i32 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// The NULL of this type, used as the column prototype.
    fn as_empty_value() -> Value;
    /// Convert this value into its owned [`Value`] representation.
    fn as_value(self) -> Value;
    /// Attempt to convert a dynamic [`Value`] into `Self`.
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
    /// Whether the type accepts NULL.
    fn nullable() -> bool {
        false
    }
    /// Parse the textual representation of `Self`.
    fn parse(input: impl AsRef<str>) -> Result<Self>
    where
        Self: Sized,
    {
        Err(Error::msg(format!(
            "Cannot parse `{}` as {}",
            truncate_long!(input.as_ref()),
            any::type_name::<Self>()
        )))
    }
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn conversion_error<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {value:?} to {}",
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value_integer {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                let wide: i128 = match &value {
                    Value::Int8(Some(v)) => *v as _,
                    Value::Int16(Some(v)) => *v as _,
                    Value::Int32(Some(v)) => *v as _,
                    Value::Int64(Some(v)) => *v as _,
                    Value::UInt8(Some(v)) => *v as _,
                    Value::UInt16(Some(v)) => *v as _,
                    Value::UInt32(Some(v)) => *v as _,
                    Value::UInt64(Some(v)) => *v as _,
                    Value::Boolean(Some(v)) => *v as _,
                    Value::Decimal(Some(v), ..) => {
                        if !v.is_integer() {
                            return Err(Error::msg(format!(
                                "Value {v}: Decimal is not an integer"
                            )));
                        }
                        v.to_i128().ok_or_else(|| conversion_error::<Self>(&value))?
                    }
                    Value::Varchar(Some(v)) => return <Self as AsValue>::parse(v),
                    _ => return Err(conversion_error::<Self>(&value)),
                };
                <$source>::try_from(wide).map_err(|_| {
                    Error::msg(format!(
                        "Value {wide} is out of range for {}",
                        any::type_name::<Self>()
                    ))
                })
            }
            fn parse(input: impl AsRef<str>) -> Result<Self> {
                let input = input.as_ref();
                input.trim().parse::<$source>().with_context(|| {
                    format!(
                        "Cannot parse `{}` as {}",
                        truncate_long!(input),
                        any::type_name::<Self>()
                    )
                })
            }
        }
    };
}
impl_as_value_integer!(i8, Value::Int8);
impl_as_value_integer!(i16, Value::Int16);
impl_as_value_integer!(i32, Value::Int32);
impl_as_value_integer!(i64, Value::Int64);
impl_as_value_integer!(u8, Value::UInt8);
impl_as_value_integer!(u16, Value::UInt16);
impl_as_value_integer!(u32, Value::UInt32);
impl_as_value_integer!(u64, Value::UInt64);

macro_rules! impl_as_value_float {
    ($source:ty, $destination:path, $from_decimal:ident) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match &value {
                    Value::Float32(Some(v)) => Ok(*v as _),
                    Value::Float64(Some(v)) => Ok(*v as _),
                    Value::Int8(Some(v)) => Ok(*v as _),
                    Value::Int16(Some(v)) => Ok(*v as _),
                    Value::Int32(Some(v)) => Ok(*v as _),
                    Value::Int64(Some(v)) => Ok(*v as _),
                    Value::UInt8(Some(v)) => Ok(*v as _),
                    Value::UInt16(Some(v)) => Ok(*v as _),
                    Value::UInt32(Some(v)) => Ok(*v as _),
                    Value::UInt64(Some(v)) => Ok(*v as _),
                    Value::Decimal(Some(v), ..) => v
                        .$from_decimal()
                        .ok_or_else(|| conversion_error::<Self>(&value)),
                    Value::Varchar(Some(v)) => <Self as AsValue>::parse(v),
                    _ => Err(conversion_error::<Self>(&value)),
                }
            }
            fn parse(input: impl AsRef<str>) -> Result<Self> {
                let input = input.as_ref();
                input.trim().parse::<$source>().with_context(|| {
                    format!(
                        "Cannot parse `{}` as {}",
                        truncate_long!(input),
                        any::type_name::<Self>()
                    )
                })
            }
        }
    };
}
impl_as_value_float!(f32, Value::Float32, to_f32);
impl_as_value_float!(f64, Value::Float64, to_f64);

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Boolean(Some(v)) => Ok(*v),
            Value::Int8(Some(v)) => Ok(*v != 0),
            Value::Int16(Some(v)) => Ok(*v != 0),
            Value::Int32(Some(v)) => Ok(*v != 0),
            Value::Int64(Some(v)) => Ok(*v != 0),
            Value::UInt8(Some(v)) => Ok(*v != 0),
            Value::UInt16(Some(v)) => Ok(*v != 0),
            Value::UInt32(Some(v)) => Ok(*v != 0),
            Value::UInt64(Some(v)) => Ok(*v != 0),
            Value::Varchar(Some(v)) => <Self as AsValue>::parse(v),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        match input.as_ref().trim() {
            x if x.eq_ignore_ascii_case("true") || x.eq_ignore_ascii_case("t") || x == "1" => {
                Ok(true)
            }
            x if x.eq_ignore_ascii_case("false") || x.eq_ignore_ascii_case("f") || x == "0" => {
                Ok(false)
            }
            x => Err(Error::msg(format!(
                "Cannot parse boolean from `{}`",
                truncate_long!(x)
            ))),
        }
    }
}

impl AsValue for Decimal {
    fn as_empty_value() -> Value {
        Value::Decimal(None, 0, 0)
    }
    fn as_value(self) -> Value {
        Value::Decimal(Some(self), 0, self.scale() as _)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Decimal(Some(v), ..) => Ok(*v),
            Value::Int8(Some(v)) => Ok(Decimal::from(*v)),
            Value::Int16(Some(v)) => Ok(Decimal::from(*v)),
            Value::Int32(Some(v)) => Ok(Decimal::from(*v)),
            Value::Int64(Some(v)) => Ok(Decimal::from(*v)),
            Value::UInt8(Some(v)) => Ok(Decimal::from(*v)),
            Value::UInt16(Some(v)) => Ok(Decimal::from(*v)),
            Value::UInt32(Some(v)) => Ok(Decimal::from(*v)),
            Value::UInt64(Some(v)) => Ok(Decimal::from(*v)),
            Value::Float32(Some(v)) => {
                Decimal::from_f32(*v).ok_or_else(|| conversion_error::<Self>(&value))
            }
            Value::Float64(Some(v)) => {
                Decimal::from_f64(*v).ok_or_else(|| conversion_error::<Self>(&value))
            }
            Value::Varchar(Some(v)) => <Self as AsValue>::parse(v),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        let input = input.as_ref();
        Decimal::from_str(input.trim())
            .with_context(|| format!("Cannot parse `{}` as Decimal", truncate_long!(input)))
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            Value::Uuid(Some(v)) => Ok(v.to_string()),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        Ok(input.as_ref().to_owned())
    }
}

impl<'a> AsValue for Cow<'a, str> {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self.into()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        String::try_from_value(value).map(Into::into)
    }
}

impl AsValue for Box<[u8]> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v),
            Value::Varchar(Some(v)) => Ok(v.into_bytes().into_boxed_slice()),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}

impl AsValue for Vec<u8> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self.into_boxed_slice()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        <Box<[u8]>>::try_from_value(value).map(Into::into)
    }
}

impl AsValue for Uuid {
    fn as_empty_value() -> Value {
        Value::Uuid(None)
    }
    fn as_value(self) -> Value {
        Value::Uuid(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Uuid(Some(v)) => Ok(*v),
            Value::Varchar(Some(v)) => <Self as AsValue>::parse(v),
            Value::Blob(Some(v)) => Uuid::from_slice(v)
                .with_context(|| format!("Cannot convert a {} bytes blob to Uuid", v.len())),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        let input = input.as_ref();
        Uuid::parse_str(input.trim())
            .with_context(|| format!("Cannot parse `{}` as Uuid", truncate_long!(input)))
    }
}

macro_rules! parse_time {
    ($ty:ty, $input:expr, $($format:tt),+ $(,)?) => {{
        let input: &str = $input.trim();
        let mut result = None;
        $(
            if result.is_none() {
                result = <$ty>::parse(input, format_description!($format)).ok();
            }
        )+
        result.ok_or_else(|| {
            Error::msg(format!(
                "Cannot parse `{}` as {}",
                truncate_long!(input),
                any::type_name::<$ty>()
            ))
        })
    }};
}

macro_rules! impl_as_value_temporal {
    ($source:ty, $destination:path, $parse:expr $(, $pat_rest:pat => $expr_rest:expr)* $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    $($pat_rest => $expr_rest,)*
                    Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
                    _ => Err(conversion_error::<Self>(&value)),
                }
            }
            fn parse(input: impl AsRef<str>) -> Result<Self> {
                $parse(input.as_ref())
            }
        }
    };
}
impl_as_value_temporal!(Date, Value::Date, |v: &str| parse_time!(
    Date,
    v,
    "[year]-[month]-[day]"
));
impl_as_value_temporal!(Time, Value::Time, |v: &str| parse_time!(
    Time,
    v,
    "[hour]:[minute]:[second].[subsecond]",
    "[hour]:[minute]:[second]",
    "[hour]:[minute]",
));
impl_as_value_temporal!(
    PrimitiveDateTime,
    Value::Timestamp,
    |v: &str| parse_time!(
        PrimitiveDateTime,
        v,
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]",
        "[year]-[month]-[day]T[hour]:[minute]:[second]",
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]",
        "[year]-[month]-[day] [hour]:[minute]:[second]",
        "[year]-[month]-[day] [hour]:[minute]",
    ),
    Value::TimestampWithTimezone(Some(v)) => {
        let v = v.to_offset(time::UtcOffset::UTC);
        Ok(PrimitiveDateTime::new(v.date(), v.time()))
    },
);
impl_as_value_temporal!(
    OffsetDateTime,
    Value::TimestampWithTimezone,
    |v: &str| parse_time!(
        OffsetDateTime,
        v,
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]",
        "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]",
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]",
        "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]",
    )
    .or_else(|_| <PrimitiveDateTime as AsValue>::parse(v).map(|v| v.assume_utc())),
    Value::Timestamp(Some(v)) => Ok(v.assume_utc()),
);

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(if value.is_null() {
            None
        } else {
            Some(<T as AsValue>::try_from_value(value)?)
        })
    }
    fn nullable() -> bool {
        true
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        if input.as_ref().trim().eq_ignore_ascii_case("null") {
            return Ok(None);
        }
        T::parse(input).map(Some)
    }
}

impl<T: AsValue> AsValue for Box<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        (*self).as_value()
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(Self::new(<T as AsValue>::try_from_value(value)?))
    }
    fn nullable() -> bool {
        T::nullable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};

    #[test]
    fn temporal_text() {
        assert_eq!(<Date as AsValue>::parse(" 2024-02-29 ").unwrap(), date!(2024-02-29));
        for (input, expected) in [
            ("08:30:05.25", time!(08:30:05.25)),
            ("08:30:05", time!(08:30:05)),
            ("08:30", time!(08:30)),
        ] {
            assert_eq!(<Time as AsValue>::parse(input).unwrap(), expected);
        }
        for (input, expected) in [
            ("2024-02-29T08:30:05.5", datetime!(2024-02-29 08:30:05.5)),
            ("2024-02-29T08:30:05", datetime!(2024-02-29 08:30:05)),
            ("2024-02-29 08:30:05.5", datetime!(2024-02-29 08:30:05.5)),
            ("2024-02-29 08:30:05", datetime!(2024-02-29 08:30:05)),
            ("2024-02-29 08:30", datetime!(2024-02-29 08:30)),
        ] {
            assert_eq!(<PrimitiveDateTime as AsValue>::parse(input).unwrap(), expected);
        }
        for (input, expected) in [
            ("2024-02-29T08:30:05.5+02:00", datetime!(2024-02-29 08:30:05.5 +2)),
            ("2024-02-29T08:30:05-01:30", datetime!(2024-02-29 08:30:05 -1:30)),
            ("2024-02-29 08:30:05.5+00:00", datetime!(2024-02-29 08:30:05.5 UTC)),
            ("2024-02-29 08:30:05+02:00", datetime!(2024-02-29 08:30:05 +2)),
            ("2024-02-29 08:30:05", datetime!(2024-02-29 08:30:05 UTC)),
        ] {
            assert_eq!(<OffsetDateTime as AsValue>::parse(input).unwrap(), expected);
        }
        assert!(<Date as AsValue>::parse("29/02/2024").is_err());
        assert!(<Time as AsValue>::parse("noon").is_err());
    }

    #[test]
    fn temporal_values() {
        let stored = Value::Varchar(Some("2024-02-29 08:30:05".into()));
        assert_eq!(
            PrimitiveDateTime::try_from_value(stored).unwrap(),
            datetime!(2024-02-29 08:30:05)
        );
        let aware = Value::TimestampWithTimezone(Some(datetime!(2024-02-29 10:30 +2)));
        assert_eq!(
            PrimitiveDateTime::try_from_value(aware).unwrap(),
            datetime!(2024-02-29 08:30)
        );
    }
}
