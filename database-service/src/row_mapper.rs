//! Converts driver rows into JSON records.
//!
//! Values are decoded by the driver's type name. Prepared statements return
//! Postgres values in binary form, so a Postgres type without a decoder
//! here becomes `null` with a warning; it is never read as text unless its
//! binary form is the text itself (enums, `citext`, `xml`).

use common::errors::{AppError, AppResult};
use common::models::{ColumnInfo, Record};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Number, Value};
use sqlx::mysql::{MySql, MySqlRow};
use sqlx::postgres::types::{Oid, PgInterval, PgMoney};
use sqlx::postgres::{PgHasArrayType, PgRow, PgTypeInfo, PgTypeKind, PgValueFormat, Postgres};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::{Decimal, JsonValue, Uuid};
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo, ValueRef};

/// Largest digit count an f64 carries without rounding.
const F64_EXACT_DIGITS: u32 = 15;

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Extracts column metadata in result order.
pub fn column_info<C: Column>(columns: &[C]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|c| ColumnInfo {
            name: c.name().to_string(),
            data_type: c.type_info().name().to_string(),
            ordinal: c.ordinal(),
        })
        .collect()
}

/// Converts a PostgreSQL row into a record.
pub fn postgres_record(row: &PgRow) -> AppResult<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        let value = postgres_value(row, column.ordinal(), column.type_info())?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

/// Converts a MySQL row into a record.
pub fn mysql_record(row: &MySqlRow) -> AppResult<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        let value = mysql_value(row, column.ordinal(), column.type_info().name())?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

fn postgres_value(row: &PgRow, idx: usize, type_info: &PgTypeInfo) -> AppResult<Value> {
    if is_null(row, idx)? {
        return Ok(Value::Null);
    }

    let value = match type_info.name() {
        "BOOL" => Value::Bool(decode(row, idx)?),
        "INT2" => Value::from(decode::<i16, _>(row, idx)?),
        "INT4" => Value::from(decode::<i32, _>(row, idx)?),
        "INT8" => Value::from(decode::<i64, _>(row, idx)?),
        "OID" => Value::from(decode::<Oid, _>(row, idx)?.0),
        "FLOAT4" => float_value(f64::from(decode::<f32, _>(row, idx)?)),
        "FLOAT8" => float_value(decode(row, idx)?),
        "NUMERIC" => postgres_numeric(row, idx)?,
        "MONEY" => decimal_value(decode::<PgMoney, _>(row, idx)?.to_decimal(2)),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::String(decode(row, idx)?),
        "CITEXT" | "XML" => Value::String(unchecked_text(row, idx)?),
        "UUID" => Value::String(decode::<Uuid, _>(row, idx)?.to_string()),
        "JSON" | "JSONB" => decode::<JsonValue, _>(row, idx)?,
        "DATE" => date_value(decode(row, idx)?),
        "TIME" => time_value(decode(row, idx)?),
        "TIMESTAMP" => datetime_value(decode(row, idx)?),
        "TIMESTAMPTZ" => timestamptz_value(decode(row, idx)?),
        "INTERVAL" => interval_value(decode(row, idx)?),
        "INET" => network_value(decode(row, idx)?, true),
        "CIDR" => network_value(decode(row, idx)?, false),
        "BYTEA" => bytes_value(decode(row, idx)?),
        "BOOL[]" => array_value::<bool, _>(row, idx, Value::Bool)?,
        "INT2[]" => array_value::<i16, _>(row, idx, Value::from)?,
        "INT4[]" => array_value::<i32, _>(row, idx, Value::from)?,
        "INT8[]" => array_value::<i64, _>(row, idx, Value::from)?,
        "FLOAT4[]" => array_value::<f32, _>(row, idx, |v| float_value(f64::from(v)))?,
        "FLOAT8[]" => array_value::<f64, _>(row, idx, float_value)?,
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
            array_value::<String, _>(row, idx, Value::String)?
        }
        "UUID[]" => array_value::<Uuid, _>(row, idx, |v| Value::String(v.to_string()))?,
        "DATE[]" => array_value::<NaiveDate, _>(row, idx, date_value)?,
        "TIMESTAMP[]" => array_value::<NaiveDateTime, _>(row, idx, datetime_value)?,
        "TIMESTAMPTZ[]" => array_value::<DateTime<Utc>, _>(row, idx, timestamptz_value)?,
        other => match type_info.kind() {
            PgTypeKind::Enum(_) => Value::String(unchecked_text(row, idx)?),
            _ => {
                tracing::warn!(column = idx, data_type = other, "Unsupported column type, returning null");
                Value::Null
            }
        },
    };
    Ok(value)
}

fn mysql_value(row: &MySqlRow, idx: usize, type_name: &str) -> AppResult<Value> {
    if is_null(row, idx)? {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOLEAN" => Value::Bool(decode(row, idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::from(decode::<i64, _>(row, idx)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => Value::from(decode::<u64, _>(row, idx)?),
        "YEAR" => Value::from(
            row.try_get_unchecked::<u16, _>(idx)
                .map_err(|e| decode_error(idx, e))?,
        ),
        "FLOAT" => float_value(f64::from(decode::<f32, _>(row, idx)?)),
        "DOUBLE" => float_value(decode(row, idx)?),
        // DECIMAL travels as text in both protocols.
        "DECIMAL" => numeric_value(&unchecked_text(row, idx)?),
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            Value::String(decode(row, idx)?)
        }
        "JSON" => decode::<JsonValue, _>(row, idx)?,
        "DATE" => mysql_temporal::<NaiveDate>(row, idx, date_value, mysql_date_text)?,
        "TIME" => mysql_time(row, idx)?,
        "DATETIME" => {
            mysql_temporal::<NaiveDateTime>(row, idx, datetime_value, mysql_datetime_text)?
        }
        "TIMESTAMP" => {
            mysql_temporal::<DateTime<Utc>>(row, idx, timestamptz_value, mysql_datetime_text)?
        }
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            bytes_value(decode(row, idx)?)
        }
        // Remaining MySQL types (BIT, GEOMETRY, ...) arrive as length-encoded bytes.
        other => match row.try_get_unchecked::<Vec<u8>, _>(idx) {
            Ok(bytes) => bytes_value(bytes),
            Err(e) => {
                tracing::warn!(column = idx, data_type = other, error = %e, "Unsupported column type, returning null");
                Value::Null
            }
        },
    };
    Ok(value)
}

fn is_null<R>(row: &R, idx: usize) -> AppResult<bool>
where
    R: Row,
    usize: ColumnIndex<R>,
{
    row.try_get_raw(idx)
        .map(|raw| raw.is_null())
        .map_err(|e| decode_error(idx, e))
}

fn decode<'r, T, R>(row: &'r R, idx: usize) -> AppResult<T>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get(idx).map_err(|e| decode_error(idx, e))
}

/// Reads the value bytes as text without a type check.
fn unchecked_text<'r, R>(row: &'r R, idx: usize) -> AppResult<String>
where
    R: Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database>,
{
    row.try_get_unchecked(idx).map_err(|e| decode_error(idx, e))
}

fn decode_error(idx: usize, e: sqlx::Error) -> AppError {
    AppError::DatabaseQuery(format!("failed to decode column {}: {}", idx, e))
}

fn array_value<T, F>(row: &PgRow, idx: usize, to_json: F) -> AppResult<Value>
where
    T: for<'a> Decode<'a, Postgres> + Type<Postgres>,
    Option<T>: PgHasArrayType,
    F: Fn(T) -> Value,
{
    let items: Vec<Option<T>> = decode(row, idx)?;
    Ok(Value::Array(
        items
            .into_iter()
            .map(|item| item.map_or(Value::Null, &to_json))
            .collect(),
    ))
}

/// NUMERIC is read from its wire form so that NaN, infinities and values
/// wider than `Decimal` survive.
fn postgres_numeric(row: &PgRow, idx: usize) -> AppResult<Value> {
    let raw = row.try_get_raw(idx).map_err(|e| decode_error(idx, e))?;
    let text = match raw.format() {
        PgValueFormat::Binary => raw.as_bytes().ok().and_then(pg_numeric_text),
        PgValueFormat::Text => raw.as_str().ok().map(str::to_string),
    };
    text.map(|t| numeric_value(&t)).ok_or_else(|| {
        AppError::DatabaseQuery(format!("failed to decode column {}: malformed NUMERIC", idx))
    })
}

/// Renders a binary NUMERIC (base-10000 digit groups) as exact decimal text.
fn pg_numeric_text(bytes: &[u8]) -> Option<String> {
    let word = |i: usize| bytes.get(i..i + 2).map(|b| u16::from_be_bytes([b[0], b[1]]));

    let ndigits = usize::from(word(0)?);
    let weight = i64::from(word(2)? as i16);
    let sign = word(4)?;
    let dscale = usize::from(word(6)?);

    match sign {
        NUMERIC_NAN => return Some("NaN".to_string()),
        NUMERIC_PINF => return Some("Infinity".to_string()),
        NUMERIC_NINF => return Some("-Infinity".to_string()),
        _ => {}
    }

    let groups = (0..ndigits)
        .map(|i| word(8 + 2 * i))
        .collect::<Option<Vec<u16>>>()?;
    let group = |i: i64| {
        usize::try_from(i)
            .ok()
            .and_then(|i| groups.get(i).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == NUMERIC_NEG {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&group(0).to_string());
        for i in 1..=weight {
            text.push_str(&format!("{:04}", group(i)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::new();
        let mut i = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", group(i)));
            i += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }
    Some(text)
}

/// Exact decimal text to JSON: a number when an f64 holds it exactly,
/// the text itself otherwise.
fn numeric_value(text: &str) -> Value {
    match Decimal::from_str_exact(text) {
        Ok(d) => decimal_value(d),
        Err(_) => Value::String(text.to_string()),
    }
}

fn decimal_value(d: Decimal) -> Value {
    let d = d.normalize();
    let digits = d
        .mantissa()
        .unsigned_abs()
        .checked_ilog10()
        .map_or(1, |n| n + 1);
    if digits <= F64_EXACT_DIGITS {
        if let Some(n) = d.to_f64().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(d.to_string())
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

fn date_value(d: NaiveDate) -> Value {
    Value::String(d.format("%Y-%m-%d").to_string())
}

fn time_value(t: NaiveTime) -> Value {
    Value::String(t.format("%H:%M:%S%.f").to_string())
}

fn datetime_value(dt: NaiveDateTime) -> Value {
    Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn timestamptz_value(dt: DateTime<Utc>) -> Value {
    Value::String(dt.to_rfc3339())
}

fn interval_value(iv: PgInterval) -> Value {
    json!({
        "months": iv.months,
        "days": iv.days,
        "microseconds": iv.microseconds,
    })
}

/// `inet` host addresses drop the full-length prefix, as Postgres prints them.
fn network_value(net: IpNetwork, host_form: bool) -> Value {
    let full_prefix = if net.is_ipv4() { 32 } else { 128 };
    if host_form && net.prefix() == full_prefix {
        Value::String(net.ip().to_string())
    } else {
        Value::String(net.to_string())
    }
}

/// UTF-8 text when valid, otherwise `\x`-prefixed hex.
fn bytes_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(e) => {
            let hex: String = e.as_bytes().iter().map(|b| format!("{:02x}", b)).collect();
            Value::String(format!("\\x{}", hex))
        }
    }
}

/// Decodes a MySQL date value, falling back to its binary fields when
/// chrono cannot hold it (zero dates, zero months or days).
fn mysql_temporal<'r, T>(
    row: &'r MySqlRow,
    idx: usize,
    typed: fn(T) -> Value,
    raw: fn(&[u8]) -> Option<String>,
) -> AppResult<Value>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    match row.try_get::<T, _>(idx) {
        Ok(v) => Ok(typed(v)),
        Err(err) => {
            let bytes = row
                .try_get_unchecked::<&[u8], _>(idx)
                .map_err(|e| decode_error(idx, e))?;
            raw(bytes)
                .map(Value::String)
                .ok_or_else(|| decode_error(idx, err))
        }
    }
}

/// TIME spans -838:59:59 to 838:59:59, so its binary fields are read
/// directly; chrono only handles a value those fields do not describe.
fn mysql_time(row: &MySqlRow, idx: usize) -> AppResult<Value> {
    let bytes = row
        .try_get_unchecked::<&[u8], _>(idx)
        .map_err(|e| decode_error(idx, e))?;
    match mysql_time_text(bytes) {
        Some(text) => Ok(Value::String(text)),
        None => Ok(time_value(decode(row, idx)?)),
    }
}

/// Fields of a binary-protocol DATE/DATETIME/TIMESTAMP (length-prefixed).
struct MySqlDateFields {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    micros: u32,
}

impl MySqlDateFields {
    fn parse(bytes: &[u8]) -> Option<Self> {
        let (&len, body) = bytes.split_first()?;
        let body = body.get(..usize::from(len))?;
        let byte = |i: usize| body.get(i).copied().unwrap_or(0);
        Some(Self {
            year: body.get(0..2).map_or(0, |b| u16::from_le_bytes([b[0], b[1]])),
            month: byte(2),
            day: byte(3),
            hour: byte(4),
            minute: byte(5),
            second: byte(6),
            micros: body
                .get(7..11)
                .map_or(0, |b| u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        })
    }

    fn date(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

fn mysql_date_text(bytes: &[u8]) -> Option<String> {
    MySqlDateFields::parse(bytes).map(|f| f.date())
}

fn mysql_datetime_text(bytes: &[u8]) -> Option<String> {
    let f = MySqlDateFields::parse(bytes)?;
    let mut text = format!("{}T{:02}:{:02}:{:02}", f.date(), f.hour, f.minute, f.second);
    if f.micros > 0 {
        text.push_str(&format!(".{:06}", f.micros));
    }
    Some(text)
}

/// Binary-protocol TIME: sign, days, hours, minutes, seconds, micros.
fn mysql_time_text(bytes: &[u8]) -> Option<String> {
    let (&len, body) = bytes.split_first()?;
    let body = body.get(..usize::from(len))?;
    if body.is_empty() {
        return Some("00:00:00".to_string());
    }

    let negative = body[0] != 0;
    let days = u32::from_le_bytes(body.get(1..5)?.try_into().ok()?);
    let hours = u64::from(days) * 24 + u64::from(*body.get(5)?);
    let minutes = *body.get(6)?;
    let seconds = *body.get(7)?;

    let mut text = format!(
        "{}{:02}:{:02}:{:02}",
        if negative { "-" } else { "" },
        hours,
        minutes,
        seconds
    );
    if let Some(micros) = body.get(8..12) {
        let micros = u32::from_le_bytes([micros[0], micros[1], micros[2], micros[3]]);
        if micros > 0 {
            text.push_str(&format!(".{:06}", micros));
        }
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_floats_become_null() {
        assert_eq!(float_value(f64::NAN), Value::Null);
        assert_eq!(float_value(1.5), json!(1.5));
    }

    #[test]
    fn test_decimal_as_number() {
        let d: Decimal = "12.50".parse().unwrap();
        assert_eq!(decimal_value(d), json!(12.5));
        assert_eq!(numeric_value("-0.001"), json!(-0.001));
    }

    #[test]
    fn test_wide_numeric_kept_as_text() {
        assert_eq!(
            numeric_value("12345678901234567890.123456789012345"),
            json!("12345678901234567890.123456789012345")
        );
        assert_eq!(numeric_value("1234567890.1234567"), json!("1234567890.1234567"));
        assert_eq!(numeric_value("NaN"), json!("NaN"));
    }

    #[test]
    fn test_binary_numeric_text() {
        // 12.50: two groups [12, 5000], weight 0, scale 2.
        let bytes = [0, 2, 0, 0, 0, 0, 0, 2, 0, 12, 0x13, 0x88];
        assert_eq!(pg_numeric_text(&bytes).as_deref(), Some("12.50"));

        // -0.001: one group [10], weight -1, scale 3.
        let bytes = [0, 1, 0xff, 0xff, 0x40, 0, 0, 3, 0, 10];
        assert_eq!(pg_numeric_text(&bytes).as_deref(), Some("-0.001"));

        // 10000: one group [1], weight 1.
        let bytes = [0, 1, 0, 1, 0, 0, 0, 0, 0, 1];
        assert_eq!(pg_numeric_text(&bytes).as_deref(), Some("10000"));

        let nan = [0, 0, 0, 0, 0xc0, 0, 0, 0];
        assert_eq!(pg_numeric_text(&nan).as_deref(), Some("NaN"));
        let neg_inf = [0, 0, 0, 0, 0xf0, 0, 0, 0];
        assert_eq!(pg_numeric_text(&neg_inf).as_deref(), Some("-Infinity"));

        assert_eq!(pg_numeric_text(&[0, 2, 0, 0]), None);
    }

    #[test]
    fn test_interval_and_network_values() {
        let iv = PgInterval {
            months: 0,
            days: 1,
            microseconds: 7_200_000_000,
        };
        assert_eq!(
            interval_value(iv),
            json!({"months": 0, "days": 1, "microseconds": 7_200_000_000i64})
        );

        let host: IpNetwork = "10.0.0.1/32".parse().unwrap();
        assert_eq!(network_value(host, true), json!("10.0.0.1"));
        let net: IpNetwork = "10.0.0.0/8".parse().unwrap();
        assert_eq!(network_value(net, false), json!("10.0.0.0/8"));
        assert_eq!(network_value(host, false), json!("10.0.0.1/32"));
    }

    #[test]
    fn test_bytes_text_or_hex() {
        assert_eq!(bytes_value(b"abc".to_vec()), json!("abc"));
        assert_eq!(bytes_value(vec![0xff, 0x00]), json!("\\xff00"));
    }

    #[test]
    fn test_temporal_formats() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(date_value(d), json!("2024-03-09"));
        let dt = d.and_hms_opt(8, 5, 0).unwrap();
        assert_eq!(datetime_value(dt), json!("2024-03-09T08:05:00"));
        let t = NaiveTime::from_hms_opt(23, 59, 1).unwrap();
        assert_eq!(time_value(t), json!("23:59:01"));
    }

    #[test]
    fn test_mysql_time_beyond_a_day() {
        // -26:03:04 as sign, 1 day, 2 hours.
        let bytes = [8, 1, 1, 0, 0, 0, 2, 3, 4];
        assert_eq!(mysql_time_text(&bytes).as_deref(), Some("-26:03:04"));

        // 838:59:59.5 as 34 days, 22 hours.
        let bytes = [12, 0, 34, 0, 0, 0, 22, 59, 59, 0x20, 0xa1, 0x07, 0];
        assert_eq!(mysql_time_text(&bytes).as_deref(), Some("838:59:59.500000"));

        assert_eq!(mysql_time_text(&[0]).as_deref(), Some("00:00:00"));
        assert_eq!(mysql_time_text(&[8, 0, 1]), None);
    }

    #[test]
    fn test_mysql_zero_dates() {
        assert_eq!(mysql_date_text(&[0]).as_deref(), Some("0000-00-00"));
        assert_eq!(
            mysql_datetime_text(&[0]).as_deref(),
            Some("0000-00-00T00:00:00")
        );
        // 2020-00-00
        assert_eq!(
            mysql_date_text(&[4, 0xe4, 0x07, 0, 0]).as_deref(),
            Some("2020-00-00")
        );
        // 2024-03-09 08:05:00.000250
        let bytes = [11, 0xe8, 0x07, 3, 9, 8, 5, 0, 0xfa, 0, 0, 0];
        assert_eq!(
            mysql_datetime_text(&bytes).as_deref(),
            Some("2024-03-09T08:05:00.000250")
        );
    }
}
