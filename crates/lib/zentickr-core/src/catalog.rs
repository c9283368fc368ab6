//! Declarations of every callable tool and its parameter contract.

use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::error::CatalogError;
use crate::params::{Frequency, Interval, Period};
use crate::provider::{RecordKind, StatementKind, TableKind};

/// Semantic type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Choice(&'static [&'static str]),
    Date,
    SymbolList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<&'static str>,
    pub description: &'static str,
}

impl ParameterSpec {
    #[must_use]
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description,
        }
    }

    #[must_use]
    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            description,
        }
    }

    #[must_use]
    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    fn json_schema(&self) -> Value {
        let mut schema = json!({
            "type": "string",
            "description": self.description,
        });
        if let ParamKind::Choice(values) = self.kind {
            schema["enum"] = json!(values);
        }
        if self.kind == ParamKind::Date {
            schema["format"] = json!("date");
        }
        if let Some(default) = self.default {
            schema["default"] = json!(default);
        }
        schema
    }
}

/// Shape of a tool's normalized result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// Object keyed by requested symbol.
    Keyed,
    /// Array of flat row objects.
    Rows,
    /// Array of search matches.
    Matches,
}

/// Provider operation a tool dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Record(RecordKind),
    Table(TableKind),
    Statement(StatementKind),
    History,
    Search,
}

impl Operation {
    #[must_use]
    pub const fn shape(self) -> ResultShape {
        match self {
            Self::Record(_) => ResultShape::Keyed,
            Self::Table(_) | Self::Statement(_) | Self::History => ResultShape::Rows,
            Self::Search => ResultShape::Matches,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParameterSpec>,
    pub operation: Operation,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            operation,
        }
    }

    #[must_use]
    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.params.push(spec);
        self
    }

    #[must_use]
    pub fn param_spec(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|spec| spec.name == name)
    }

    /// JSON schema object describing the tool's arguments.
    #[must_use]
    pub fn input_schema(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        for spec in &self.params {
            properties.insert(spec.name.to_string(), spec.json_schema());
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.name)
            .collect();
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("required".to_string(), json!(required));
        schema
    }
}

/// Registry of tool descriptors, read-only once populated.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool.
    ///
    /// # Errors
    /// Returns `CatalogError::DuplicateTool` if the name is already taken.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), CatalogError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(CatalogError::DuplicateTool(descriptor.name));
        }
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    /// All tools in registration order.
    #[must_use]
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// # Errors
    /// Returns `CatalogError::UnknownTool` if no tool has this name.
    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor, CatalogError> {
        self.index
            .get(name)
            .map(|&position| &self.tools[position])
            .ok_or_else(|| CatalogError::UnknownTool(name.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The full set of Yahoo Finance tools.
    ///
    /// # Panics
    /// Panics if two standard tools share a name.
    #[must_use]
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for descriptor in standard_tools() {
            catalog
                .register(descriptor)
                .expect("standard tool names are distinct");
        }
        catalog
    }
}

const SYMBOLS_HELP: &str = "Comma-separated list of stock symbols (e.g. \"AAPL,GOOGL,MSFT\")";

fn symbols() -> ParameterSpec {
    ParameterSpec::required("symbols", ParamKind::SymbolList, SYMBOLS_HELP)
}

fn frequency() -> ParameterSpec {
    ParameterSpec::optional(
        "frequency",
        ParamKind::Choice(Frequency::NAMES),
        "Statement frequency: \"annual\" or \"quarterly\"",
    )
    .with_default("annual")
}

fn record_tool(name: &str, description: &str, kind: RecordKind) -> ToolDescriptor {
    ToolDescriptor::new(name, description, Operation::Record(kind)).param(symbols())
}

fn table_tool(name: &str, description: &str, kind: TableKind) -> ToolDescriptor {
    ToolDescriptor::new(name, description, Operation::Table(kind)).param(symbols())
}

fn statement_tool(name: &str, description: &str, kind: StatementKind) -> ToolDescriptor {
    ToolDescriptor::new(name, description, Operation::Statement(kind))
        .param(symbols())
        .param(frequency())
}

fn standard_tools() -> Vec<ToolDescriptor> {
    vec![
        record_tool(
            "get_financial_data",
            "Get financial data for given stock symbols.",
            RecordKind::FinancialData,
        ),
        statement_tool(
            "get_balance_sheet",
            "Get balance sheet data for given stock symbols.",
            StatementKind::BalanceSheet,
        ),
        statement_tool(
            "get_cash_flow",
            "Get cash flow statement for given stock symbols.",
            StatementKind::CashFlow,
        ),
        statement_tool(
            "get_income_statement",
            "Get income statement for given stock symbols.",
            StatementKind::Income,
        ),
        table_tool(
            "get_valuation_measures",
            "Get valuation measures for given stock symbols.",
            TableKind::ValuationMeasures,
        ),
        record_tool(
            "get_earnings",
            "Get earnings data for given stock symbols.",
            RecordKind::Earnings,
        ),
        record_tool(
            "get_earnings_trend",
            "Get earnings trend data for given stock symbols.",
            RecordKind::EarningsTrend,
        ),
        record_tool(
            "get_major_holders",
            "Get major holders information for given stock symbols.",
            RecordKind::MajorHolders,
        ),
        table_tool(
            "get_institution_ownership",
            "Get institutional ownership data for given stock symbols.",
            TableKind::InstitutionOwnership,
        ),
        table_tool(
            "get_insider_holders",
            "Get insider holders information for given stock symbols.",
            TableKind::InsiderHolders,
        ),
        table_tool(
            "get_insider_transactions",
            "Get insider transactions for given stock symbols.",
            TableKind::InsiderTransactions,
        ),
        table_tool(
            "get_fund_ownership",
            "Get fund ownership data for given stock symbols.",
            TableKind::FundOwnership,
        ),
        record_tool(
            "get_recommendations",
            "Get analyst recommendations for given stock symbols.",
            RecordKind::Recommendations,
        ),
        table_tool(
            "get_recommendation_trend",
            "Get recommendation trends for given stock symbols.",
            TableKind::RecommendationTrend,
        ),
        record_tool(
            "get_price_data",
            "Get current price data for given stock symbols.",
            RecordKind::Price,
        ),
        record_tool(
            "get_summary_detail",
            "Get summary details for given stock symbols.",
            RecordKind::SummaryDetail,
        ),
        record_tool(
            "get_company_profile",
            "Get company profile information for given stock symbols.",
            RecordKind::CompanyProfile,
        ),
        table_tool(
            "get_company_officers",
            "Get company officers information for given stock symbols.",
            TableKind::CompanyOfficers,
        ),
        record_tool(
            "get_technical_insights",
            "Get technical insights for given stock symbols.",
            RecordKind::TechnicalInsights,
        ),
        record_tool(
            "get_calendar_events",
            "Get calendar events for given stock symbols.",
            RecordKind::CalendarEvents,
        ),
        record_tool(
            "get_esg_scores",
            "Get ESG (Environmental, Social, Governance) scores for given stock symbols.",
            RecordKind::EsgScores,
        ),
        ToolDescriptor::new(
            "get_historical_prices",
            "Get historical price data for given stock symbols. Use either period or start_date/end_date.",
            Operation::History,
        )
        .param(symbols())
        .param(ParameterSpec::optional(
            "period",
            ParamKind::Choice(Period::NAMES),
            "Time period, used when no dates are given",
        ))
        .param(ParameterSpec::optional(
            "start_date",
            ParamKind::Date,
            "Start date in YYYY-MM-DD format (defaults to one year before end_date)",
        ))
        .param(ParameterSpec::optional(
            "end_date",
            ParamKind::Date,
            "End date in YYYY-MM-DD format (defaults to today)",
        ))
        .param(
            ParameterSpec::optional("interval", ParamKind::Choice(Interval::NAMES), "Data interval")
                .with_default("1d"),
        ),
        ToolDescriptor::new(
            "search_symbols",
            "Search for stock symbols by company name or partial symbol.",
            Operation::Search,
        )
        .param(ParameterSpec::required(
            "query",
            ParamKind::Text,
            "Search query (company name or partial symbol)",
        )),
    ]
}
