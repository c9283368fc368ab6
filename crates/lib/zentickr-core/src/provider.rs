//! The data provider capability consumed by the request handler.
//!
//! Each provider operation declares its result shape up front: a per-symbol
//! [`Record`], a sequence of tabular [`Row`]s, price bars, or search matches.
//! The handler normalizes by shape and never inspects values at runtime to
//! decide how to reshape them.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::{Map, Value};

use crate::error::ProviderResult;
use crate::params::{Frequency, HistoryQuery};

/// JSON object returned for a single symbol.
pub type Record = Map<String, Value>;

/// Per-symbol lookups that return a single nested object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    FinancialData,
    Price,
    SummaryDetail,
    CompanyProfile,
    Recommendations,
    Earnings,
    EarningsTrend,
    MajorHolders,
    EsgScores,
    CalendarEvents,
    TechnicalInsights,
}

/// Per-symbol lookups that return a table of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    CompanyOfficers,
    ValuationMeasures,
    RecommendationTrend,
    InstitutionOwnership,
    InsiderHolders,
    InsiderTransactions,
    FundOwnership,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Income,
    BalanceSheet,
    CashFlow,
}

/// A single table cell before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Vendor reported the value as not available.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<FixedOffset>),
    Json(Value),
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime<FixedOffset>> for Cell {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One row of a provider table, columns in provider order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    #[must_use]
    pub const fn new() -> Self {
        Self { cells: Vec::new() }
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, cell: impl Into<Cell>) -> Self {
        self.push(column, cell);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, cell: impl Into<Cell>) {
        self.cells.push((column.into(), cell.into()));
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// One OHLCV bar stamped in the exchange's local offset.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: DateTime<FixedOffset>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
    pub adjclose: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub symbol: String,
    pub name: String,
    pub quote_type: String,
    pub exchange: String,
}

/// Market data capability.
///
/// Lookups are per symbol; the handler fans multi-symbol requests out and
/// assembles the results, so a provider never has to report partial success.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn record(&self, kind: RecordKind, symbol: &str) -> ProviderResult<Record>;

    async fn table(&self, kind: TableKind, symbol: &str) -> ProviderResult<Vec<Row>>;

    async fn statement(
        &self,
        kind: StatementKind,
        symbol: &str,
        frequency: Frequency,
    ) -> ProviderResult<Vec<Row>>;

    async fn history(&self, symbol: &str, query: &HistoryQuery) -> ProviderResult<Vec<PriceBar>>;

    async fn search(&self, query: &str, limit: usize) -> ProviderResult<Vec<SearchMatch>>;
}
