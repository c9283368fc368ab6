//! Turns tool invocations into normalized JSON results.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::catalog::{Operation, ParamKind, ToolCatalog, ToolDescriptor};
use crate::error::{ProviderError, ProviderResult, ToolError};
use crate::normalize::{self, TimeStyle};
use crate::params::{
    Frequency,
    HistoryQuery,
    HistoryRange,
    Interval,
    Period,
    parse_date,
    split_symbols,
};
use crate::provider::{DataProvider, Record};

/// JSON value built only from primitives, objects and arrays.
pub type NormalizedResult = Value;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
pub const SEARCH_RESULT_LIMIT: usize = 10;
const DEFAULT_LOOKBACK_DAYS: u64 = 365;

/// A single inbound tool call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolInvocation {
    pub tool: String,
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arguments: Map::new(),
        }
    }

    #[must_use]
    pub fn with_arguments(tool: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            arguments,
        }
    }

    #[must_use]
    pub fn arg(mut self, name: &str, value: impl Into<String>) -> Self {
        self.arguments
            .insert(name.to_string(), Value::String(value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ArgValue {
    Text(String),
    Choice(String),
    Date(NaiveDate),
    Symbols(Vec<String>),
}

/// Arguments after validation and default substitution.
#[derive(Debug)]
struct Arguments<'a> {
    tool: &'a str,
    values: HashMap<&'static str, ArgValue>,
}

impl<'a> Arguments<'a> {
    fn validate(
        descriptor: &'a ToolDescriptor,
        supplied: &Map<String, Value>,
    ) -> Result<Self, ToolError> {
        let mut values = HashMap::with_capacity(descriptor.params.len());
        for spec in &descriptor.params {
            let given = match supplied.get(spec.name) {
                None | Some(Value::Null) => None,
                Some(Value::String(raw)) if !spec.required && raw.trim().is_empty() => None,
                Some(Value::String(raw)) => Some(raw.trim()),
                Some(other) => {
                    return Err(ToolError::invalid(
                        spec.name,
                        format!("expected a string, got {other}"),
                    ));
                }
            };
            let raw = match (given, spec.default) {
                (Some(raw), _) | (None, Some(raw)) => raw,
                (None, None) if spec.required => {
                    return Err(ToolError::MissingParameter {
                        tool: descriptor.name.clone(),
                        parameter: spec.name.to_string(),
                    });
                }
                (None, None) => continue,
            };
            let value = match spec.kind {
                ParamKind::Text if raw.is_empty() => {
                    return Err(ToolError::invalid(spec.name, "must not be empty"));
                }
                ParamKind::Text => ArgValue::Text(raw.to_string()),
                ParamKind::Choice(accepted) => {
                    if !accepted.iter().any(|value| *value == raw) {
                        return Err(ToolError::invalid(
                            spec.name,
                            format!("`{raw}` is not one of {}", accepted.join(", ")),
                        ));
                    }
                    ArgValue::Choice(raw.to_string())
                }
                ParamKind::Date => ArgValue::Date(
                    parse_date(raw).map_err(|reason| ToolError::invalid(spec.name, reason))?,
                ),
                ParamKind::SymbolList => {
                    let symbols = split_symbols(raw);
                    if symbols.is_empty() {
                        return Err(ToolError::invalid(spec.name, "symbol list is empty"));
                    }
                    ArgValue::Symbols(symbols)
                }
            };
            values.insert(spec.name, value);
        }
        Ok(Self {
            tool: &descriptor.name,
            values,
        })
    }

    fn missing(&self, name: &str) -> ToolError {
        ToolError::MissingParameter {
            tool: self.tool.to_string(),
            parameter: name.to_string(),
        }
    }

    fn symbols(&self) -> Result<&[String], ToolError> {
        match self.values.get("symbols") {
            Some(ArgValue::Symbols(symbols)) => Ok(symbols),
            _ => Err(self.missing("symbols")),
        }
    }

    fn text(&self, name: &str) -> Result<&str, ToolError> {
        match self.values.get(name) {
            Some(ArgValue::Text(text)) => Ok(text),
            _ => Err(self.missing(name)),
        }
    }

    fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.values.get(name) {
            Some(ArgValue::Date(date)) => Some(*date),
            _ => None,
        }
    }

    fn choice<T>(&self, name: &str) -> Result<Option<T>, ToolError>
    where
        T: FromStr<Err = String>,
    {
        match self.values.get(name) {
            Some(ArgValue::Choice(raw)) => raw
                .parse()
                .map(Some)
                .map_err(|reason| ToolError::invalid(name, reason)),
            _ => Ok(None),
        }
    }
}

/// Resolves the requested price window.
///
/// A period is used only when no explicit dates were given; otherwise the
/// range ends today and starts one year before its end unless overridden.
fn history_query(args: &Arguments<'_>, today: NaiveDate) -> Result<HistoryQuery, ToolError> {
    let interval = args.choice::<Interval>("interval")?.unwrap_or(Interval::OneDay);
    let period = args.choice::<Period>("period")?;
    let start = args.date("start_date");
    let end = args.date("end_date");

    let range = match (period, start, end) {
        (Some(period), None, None) => HistoryRange::Period(period),
        _ => {
            let end = end.unwrap_or(today);
            let start = match start {
                Some(start) => start,
                None => end
                    .checked_sub_days(Days::new(DEFAULT_LOOKBACK_DAYS))
                    .ok_or_else(|| ToolError::invalid("end_date", "date out of range"))?,
            };
            if start > end {
                return Err(ToolError::invalid(
                    "start_date",
                    format!("start_date {start} is after end_date {end}"),
                ));
            }
            HistoryRange::Dates { start, end }
        }
    };
    Ok(HistoryQuery { interval, range })
}

fn dedup(symbols: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(symbols.len());
    symbols
        .iter()
        .filter(|symbol| seen.insert(symbol.as_str()))
        .cloned()
        .collect()
}

/// Fails the whole call when every symbol failed.
fn ensure_any_success<T>(results: &[(&str, ProviderResult<T>)]) -> Result<(), ToolError> {
    if results.iter().any(|(_, result)| result.is_ok()) {
        return Ok(());
    }
    if let [(_, Err(err))] = results {
        return Err(err.clone().into());
    }
    let message = results
        .iter()
        .filter_map(|(symbol, result)| {
            result
                .as_ref()
                .err()
                .map(|err| format!("{symbol}: {err}"))
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(ProviderError::new(message).into())
}

/// Dispatches tool invocations to a data provider.
pub struct RequestHandler {
    catalog: Arc<ToolCatalog>,
    provider: Arc<dyn DataProvider>,
    timeout: Duration,
}

impl RequestHandler {
    #[must_use]
    pub fn new(catalog: Arc<ToolCatalog>, provider: Arc<dyn DataProvider>) -> Self {
        Self {
            catalog,
            provider,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Validates the invocation, calls the provider and normalizes its output.
    ///
    /// # Errors
    /// Returns `ToolError` for unknown tools, missing or invalid parameters,
    /// and provider failures that left no symbol with a result.
    pub async fn handle(
        &self,
        invocation: ToolInvocation,
    ) -> Result<NormalizedResult, ToolError> {
        let descriptor = self
            .catalog
            .lookup(&invocation.tool)
            .map_err(|_| ToolError::UnknownTool(invocation.tool.clone()))?;
        let args = Arguments::validate(descriptor, &invocation.arguments)?;
        debug!(tool = %descriptor.name, "handling tool call");

        let provider = self.provider.as_ref();
        match descriptor.operation {
            Operation::Record(kind) => {
                let symbols = dedup(args.symbols()?);
                let results = self
                    .fan_out(&symbols, |symbol| provider.record(kind, symbol))
                    .await;
                Self::keyed(results)
            }
            Operation::Table(kind) => {
                let results = self
                    .fan_out(args.symbols()?, |symbol| provider.table(kind, symbol))
                    .await;
                Self::rows(results, |symbol, rows| {
                    rows.iter().map(|row| normalize::row(symbol, row)).collect()
                })
            }
            Operation::Statement(kind) => {
                let frequency = args
                    .choice::<Frequency>("frequency")?
                    .unwrap_or(Frequency::Annual);
                let results = self
                    .fan_out(args.symbols()?, |symbol| {
                        provider.statement(kind, symbol, frequency)
                    })
                    .await;
                Self::rows(results, |symbol, rows| {
                    rows.iter().map(|row| normalize::row(symbol, row)).collect()
                })
            }
            Operation::History => {
                let query = history_query(&args, Utc::now().date_naive())?;
                let style = if query.interval.is_intraday() {
                    TimeStyle::DateTime
                } else {
                    TimeStyle::DateOnly
                };
                let query = &query;
                let results = self
                    .fan_out(args.symbols()?, |symbol| provider.history(symbol, query))
                    .await;
                Self::rows(results, |symbol, bars| {
                    bars.iter()
                        .map(|bar| normalize::price_bar(symbol, bar, style))
                        .collect()
                })
            }
            Operation::Search => {
                let query = args.text("query")?;
                let matches = self
                    .bounded(provider.search(query, SEARCH_RESULT_LIMIT))
                    .await?;
                Ok(Value::Array(
                    matches
                        .iter()
                        .take(SEARCH_RESULT_LIMIT)
                        .map(normalize::search_match)
                        .collect(),
                ))
            }
        }
    }

    async fn bounded<T, F>(&self, call: F) -> ProviderResult<T>
    where
        F: Future<Output = ProviderResult<T>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or_else(|_| Err(ProviderError::timeout(self.timeout)))
    }

    /// Runs one provider call per symbol concurrently, each under the timeout.
    async fn fan_out<'a, T, F, Fut>(
        &self,
        symbols: &'a [String],
        call: F,
    ) -> Vec<(&'a str, ProviderResult<T>)>
    where
        F: Fn(&'a str) -> Fut,
        Fut: Future<Output = ProviderResult<T>> + 'a,
    {
        let pending = symbols.iter().map(|symbol| {
            let symbol = symbol.as_str();
            let lookup = call(symbol);
            async move {
                let result = self.bounded(lookup).await;
                if let Err(err) = &result {
                    warn!(symbol, error = %err, "provider lookup failed");
                }
                (symbol, result)
            }
        });
        join_all(pending).await
    }

    fn keyed(results: Vec<(&str, ProviderResult<Record>)>) -> Result<NormalizedResult, ToolError> {
        ensure_any_success(&results)?;
        let mut output = Map::with_capacity(results.len());
        for (symbol, result) in results {
            let value = match result {
                Ok(record) => Value::Object(record),
                Err(err) => normalize::error_marker(err.message()),
            };
            output.insert(symbol.to_string(), value);
        }
        Ok(Value::Object(output))
    }

    fn rows<T>(
        results: Vec<(&str, ProviderResult<T>)>,
        flatten: impl Fn(&str, &T) -> Vec<Value>,
    ) -> Result<NormalizedResult, ToolError> {
        ensure_any_success(&results)?;
        let mut output = Vec::new();
        for (symbol, result) in results {
            match result {
                Ok(rows) => output.extend(flatten(symbol, &rows)),
                Err(err) => output.push(normalize::error_row(symbol, err.message())),
            }
        }
        Ok(Value::Array(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_args(pairs: &[(&str, &str)]) -> Result<HistoryQuery, ToolError> {
        let catalog = ToolCatalog::standard();
        let descriptor = catalog.lookup("get_historical_prices").unwrap();
        let mut invocation = ToolInvocation::new("get_historical_prices").arg("symbols", "AAPL");
        for (name, value) in pairs {
            invocation = invocation.arg(name, *value);
        }
        let args = Arguments::validate(descriptor, &invocation.arguments)?;
        history_query(&args, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
    }

    #[test]
    fn period_wins_without_dates() {
        let query = history_args(&[("period", "6mo")]).unwrap();
        assert_eq!(query.range, HistoryRange::Period(Period::SixMonths));
        assert_eq!(query.interval, Interval::OneDay);
    }

    #[test]
    fn dates_default_to_trailing_year() {
        let query = history_args(&[]).unwrap();
        assert_eq!(
            query.range,
            HistoryRange::Dates {
                start: NaiveDate::from_ymd_opt(2023, 6, 16).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            }
        );
    }

    #[test]
    fn explicit_dates_override_period() {
        let query = history_args(&[
            ("period", "1y"),
            ("start_date", "2024-01-02"),
            ("interval", "1wk"),
        ])
        .unwrap();
        assert_eq!(query.interval, Interval::OneWeek);
        assert_eq!(
            query.range,
            HistoryRange::Dates {
                start: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            }
        );
    }

    #[test]
    fn inverted_dates_are_invalid() {
        let err = history_args(&[("start_date", "2024-03-01"), ("end_date", "2024-02-01")])
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
    }

    #[test]
    fn blank_optional_is_treated_as_absent() {
        let query = history_args(&[("period", "5d"), ("start_date", "  ")]).unwrap();
        assert_eq!(query.range, HistoryRange::Period(Period::FiveDays));
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let symbols = vec!["MSFT".to_string(), "AAPL".to_string(), "MSFT".to_string()];
        assert_eq!(dedup(&symbols), vec!["MSFT", "AAPL"]);
    }
}
