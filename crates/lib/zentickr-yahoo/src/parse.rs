//! Decoding of Yahoo Finance response bodies into provider shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::{Map, Value};
use zentickr_core::params::DATE_FORMAT;
use zentickr_core::provider::{Cell, PriceBar, Record, Row, SearchMatch};

use crate::error::YahooError;

/// Bookkeeping field Yahoo attaches to every module.
const MAX_AGE: &str = "maxAge";

/// Extracts the `error.description` Yahoo embeds under the top-level key.
pub fn api_error(body: &Value) -> Option<String> {
    let Value::Object(root) = body else {
        return None;
    };
    root.values().find_map(|section| {
        let error = section.get("error")?;
        if error.is_null() {
            return None;
        }
        let message = error
            .get("description")
            .and_then(Value::as_str)
            .or_else(|| error.get("code").and_then(Value::as_str))
            .unwrap_or("unknown vendor error");
        Some(message.to_string())
    })
}

fn date_from_fmt(wrapper: &Map<String, Value>) -> Option<NaiveDate> {
    wrapper
        .get("fmt")
        .and_then(Value::as_str)
        .and_then(|fmt| NaiveDate::parse_from_str(fmt, DATE_FORMAT).ok())
}

fn is_wrapped(object: &Map<String, Value>) -> bool {
    object.contains_key("raw")
}

/// Unwraps `{raw, fmt}` pairs, maps the empty-object sentinel to null and
/// drops `maxAge`, recursively.
pub fn flatten(value: &Value) -> Value {
    match value {
        Value::Object(object) if object.is_empty() => Value::Null,
        Value::Object(object) if is_wrapped(object) => date_from_fmt(object).map_or_else(
            || object.get("raw").cloned().unwrap_or(Value::Null),
            |date| Value::String(date.format(DATE_FORMAT).to_string()),
        ),
        Value::Object(object) => Value::Object(flatten_record(object)),
        Value::Array(items) => Value::Array(items.iter().map(flatten).collect()),
        other => other.clone(),
    }
}

pub fn flatten_record(object: &Map<String, Value>) -> Record {
    object
        .iter()
        .filter(|(key, _)| key.as_str() != MAX_AGE)
        .map(|(key, value)| (key.clone(), flatten(value)))
        .collect()
}

pub fn cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(flag) => Cell::Bool(*flag),
        Value::Number(number) => number
            .as_i64()
            .map_or_else(|| number.as_f64().map_or(Cell::Null, Cell::Float), Cell::Int),
        Value::String(text) => Cell::Text(text.clone()),
        Value::Object(object) if object.is_empty() => Cell::Null,
        Value::Object(object) if is_wrapped(object) => match date_from_fmt(object) {
            Some(date) => Cell::Date(date),
            None => object.get("raw").map_or(Cell::Null, cell),
        },
        other => Cell::Json(flatten(other)),
    }
}

fn object_row(object: &Map<String, Value>) -> Row {
    let mut row = Row::new();
    for (key, value) in object {
        if key != MAX_AGE {
            row.push(key.as_str(), cell(value));
        }
    }
    row
}

/// Converts the list stored under `field` of a quote-summary module into rows.
pub fn table_rows(module: &Value, field: &str) -> Vec<Row> {
    module
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(object_row)
                .collect()
        })
        .unwrap_or_default()
}

/// Returns the module map of a quote-summary response.
///
/// # Errors
/// Returns `YahooError::MissingData` when the response carries no result.
pub fn quote_summary(body: &Value, symbol: &str) -> Result<Map<String, Value>, YahooError> {
    body.pointer("/quoteSummary/result/0")
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| YahooError::missing(format!("no quote summary for {symbol}")))
}

/// Looks up a module, treating an absent or empty module as missing data.
///
/// # Errors
/// Returns `YahooError::MissingData` when the module is not present.
pub fn module<'a>(
    modules: &'a Map<String, Value>,
    name: &str,
    symbol: &str,
) -> Result<&'a Value, YahooError> {
    match modules.get(name) {
        Some(value @ Value::Object(object)) if !object.is_empty() => Ok(value),
        _ => Err(YahooError::missing(format!("no {name} data for {symbol}"))),
    }
}

/// Extracts `finance.result` from recommendation and insight responses.
///
/// # Errors
/// Returns `YahooError::MissingData` when the result is absent or empty.
pub fn finance_result(body: &Value, symbol: &str) -> Result<Record, YahooError> {
    let result = match body.pointer("/finance/result") {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };
    match result {
        Some(Value::Object(object)) if !object.is_empty() => Ok(flatten_record(object)),
        _ => Err(YahooError::missing(format!("no data found for {symbol}"))),
    }
}

fn series_f64(series: Option<&Value>, index: usize) -> Option<f64> {
    series
        .and_then(|values| values.get(index))
        .and_then(Value::as_f64)
}

/// Builds price bars from a chart response, stamped in the exchange offset.
///
/// # Errors
/// Returns `YahooError::MissingData` for an absent chart result and
/// `YahooError::Api` for an out-of-range exchange offset.
pub fn chart_bars(body: &Value, symbol: &str) -> Result<Vec<PriceBar>, YahooError> {
    let result = body
        .pointer("/chart/result/0")
        .ok_or_else(|| YahooError::missing(format!("no price data for {symbol}")))?;
    let gmtoffset = result
        .pointer("/meta/gmtoffset")
        .and_then(Value::as_i64)
        .unwrap_or_default();
    let offset = i32::try_from(gmtoffset)
        .ok()
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| YahooError::Api(format!("invalid exchange offset {gmtoffset}")))?;

    let Some(timestamps) = result.get("timestamp").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    let quote = result.pointer("/indicators/quote/0");
    let adjclose = result.pointer("/indicators/adjclose/0/adjclose");

    let mut bars = Vec::with_capacity(timestamps.len());
    for (index, stamp) in timestamps.iter().enumerate() {
        let Some(at) = stamp
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
        else {
            continue;
        };
        let field = |name: &str| series_f64(quote.and_then(|quote| quote.get(name)), index);
        bars.push(PriceBar {
            timestamp: at.with_timezone(&offset),
            open: field("open"),
            high: field("high"),
            low: field("low"),
            close: field("close"),
            volume: quote
                .and_then(|quote| quote.get("volume"))
                .and_then(|volume| volume.get(index))
                .and_then(Value::as_u64),
            adjclose: series_f64(adjclose, index),
        });
    }
    Ok(bars)
}

#[derive(Default)]
struct ReportingPeriod {
    period_type: Option<String>,
    currency: Option<String>,
    items: BTreeMap<String, f64>,
}

/// Pivots fundamentals timeseries into one row per `asOfDate`.
///
/// `prefix` is the frequency prefix of the requested types (`annual`,
/// `quarterly`); `items` lists line items without it, in column order.
///
/// # Errors
/// Returns `YahooError::MissingData` when no data points were returned.
pub fn timeseries_rows(
    body: &Value,
    prefix: &str,
    items: &[&str],
    symbol: &str,
) -> Result<Vec<Row>, YahooError> {
    let results = body
        .pointer("/timeseries/result")
        .and_then(Value::as_array)
        .ok_or_else(|| YahooError::missing(format!("no fundamentals for {symbol}")))?;

    let mut periods: BTreeMap<NaiveDate, ReportingPeriod> = BTreeMap::new();
    for result in results {
        let Some(series_type) = result.pointer("/meta/type/0").and_then(Value::as_str) else {
            continue;
        };
        let item = series_type.strip_prefix(prefix).unwrap_or(series_type);
        let Some(points) = result.get(series_type).and_then(Value::as_array) else {
            continue;
        };
        for point in points {
            let Some(date) = point
                .get("asOfDate")
                .and_then(Value::as_str)
                .and_then(|raw| NaiveDate::parse_from_str(raw, DATE_FORMAT).ok())
            else {
                continue;
            };
            let entry = periods.entry(date).or_default();
            if entry.period_type.is_none() {
                entry.period_type = point.get("periodType").and_then(Value::as_str).map(str::to_string);
            }
            if entry.currency.is_none() {
                entry.currency = point.get("currencyCode").and_then(Value::as_str).map(str::to_string);
            }
            if let Some(value) = point.pointer("/reportedValue/raw").and_then(Value::as_f64) {
                entry.items.insert(item.to_string(), value);
            }
        }
    }

    if periods.is_empty() {
        return Err(YahooError::missing(format!("no fundamentals for {symbol}")));
    }

    Ok(periods
        .into_iter()
        .map(|(date, period)| {
            let mut row = Row::new()
                .with("asOfDate", date)
                .with("periodType", period.period_type)
                .with("currencyCode", period.currency);
            for item in items {
                row.push(*item, period.items.get(*item).copied());
            }
            row
        })
        .collect())
}

fn text_field(quote: &Value, name: &str) -> Option<String> {
    quote
        .get(name)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Reads search quotes, preferring the long name over the short name.
pub fn search_matches(body: &Value, limit: usize) -> Vec<SearchMatch> {
    body.get("quotes")
        .and_then(Value::as_array)
        .map(|quotes| {
            quotes
                .iter()
                .take(limit)
                .map(|quote| SearchMatch {
                    symbol: text_field(quote, "symbol").unwrap_or_default(),
                    name: text_field(quote, "longname")
                        .or_else(|| text_field(quote, "shortname"))
                        .unwrap_or_default(),
                    quote_type: text_field(quote, "quoteType").unwrap_or_default(),
                    exchange: text_field(quote, "exchange").unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default()
}
