//! Conversion of provider shapes into JSON-only values.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde_json::{Map, Number, Value, json};

use crate::params::DATE_FORMAT;
use crate::provider::{Cell, PriceBar, Row, SearchMatch};

/// How timestamps are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStyle {
    /// `YYYY-MM-DD`.
    DateOnly,
    /// RFC 3339 with the UTC offset, e.g. `2024-05-01T09:30:00-04:00`.
    DateTime,
}

/// Finite floats become JSON numbers; NaN and infinities become null.
#[must_use]
pub fn number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn optional_number(value: Option<f64>) -> Value {
    value.map_or(Value::Null, number)
}

#[must_use]
pub fn timestamp(value: &DateTime<FixedOffset>, style: TimeStyle) -> Value {
    let rendered = match style {
        TimeStyle::DateOnly => value.format(DATE_FORMAT).to_string(),
        TimeStyle::DateTime => value.to_rfc3339_opts(SecondsFormat::Secs, false),
    };
    Value::String(rendered)
}

#[must_use]
pub fn cell(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(value) => Value::Bool(*value),
        Cell::Int(value) => Value::from(*value),
        Cell::Float(value) => number(*value),
        Cell::Text(value) => Value::String(value.clone()),
        Cell::Date(value) => Value::String(value.format(DATE_FORMAT).to_string()),
        Cell::Timestamp(value) => timestamp(value, TimeStyle::DateTime),
        Cell::Json(value) => value.clone(),
    }
}

/// Flattens a provider row, prefixing the queried symbol.
#[must_use]
pub fn row(symbol: &str, row: &Row) -> Value {
    let mut object = Map::with_capacity(row.len() + 1);
    object.insert("symbol".to_string(), Value::String(symbol.to_string()));
    for (column, value) in row.cells() {
        object.insert(column.to_string(), cell(value));
    }
    Value::Object(object)
}

#[must_use]
pub fn price_bar(symbol: &str, bar: &PriceBar, style: TimeStyle) -> Value {
    json!({
        "symbol": symbol,
        "date": timestamp(&bar.timestamp, style),
        "open": optional_number(bar.open),
        "high": optional_number(bar.high),
        "low": optional_number(bar.low),
        "close": optional_number(bar.close),
        "volume": bar.volume,
        "adjclose": optional_number(bar.adjclose),
    })
}

#[must_use]
pub fn search_match(found: &SearchMatch) -> Value {
    json!({
        "symbol": found.symbol,
        "name": found.name,
        "type": found.quote_type,
        "exchange": found.exchange,
    })
}

/// Marker stored in place of a symbol's result when its lookup failed.
#[must_use]
pub fn error_marker(message: &str) -> Value {
    json!({ "error": message })
}

#[must_use]
pub fn error_row(symbol: &str, message: &str) -> Value {
    json!({ "symbol": symbol, "error": message })
}
