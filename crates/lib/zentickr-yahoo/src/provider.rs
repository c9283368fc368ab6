use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::{Map, Value};
use zentickr_core::params::{Frequency, HistoryQuery, HistoryRange};
use zentickr_core::provider::{
    DataProvider,
    PriceBar,
    Record,
    RecordKind,
    Row,
    SearchMatch,
    StatementKind,
    TableKind,
};
use zentickr_core::ProviderResult;

use crate::client::YahooProvider;
use crate::error::YahooError;
use crate::parse;

/// Earliest `period1` accepted by the fundamentals endpoint.
const FUNDAMENTALS_EPOCH: i64 = 493_590_046;

const INCOME_ITEMS: &[&str] = &[
    "TotalRevenue",
    "CostOfRevenue",
    "GrossProfit",
    "ResearchAndDevelopment",
    "SellingGeneralAndAdministration",
    "OperatingExpense",
    "OperatingIncome",
    "InterestExpense",
    "PretaxIncome",
    "TaxProvision",
    "NetIncome",
    "BasicEPS",
    "DilutedEPS",
    "BasicAverageShares",
    "DilutedAverageShares",
    "EBIT",
    "EBITDA",
];

const BALANCE_SHEET_ITEMS: &[&str] = &[
    "TotalAssets",
    "CurrentAssets",
    "CashAndCashEquivalents",
    "AccountsReceivable",
    "Inventory",
    "NetPPE",
    "Goodwill",
    "TotalLiabilitiesNetMinorityInterest",
    "CurrentLiabilities",
    "AccountsPayable",
    "LongTermDebt",
    "TotalDebt",
    "StockholdersEquity",
    "RetainedEarnings",
    "WorkingCapital",
    "OrdinarySharesNumber",
];

const CASH_FLOW_ITEMS: &[&str] = &[
    "OperatingCashFlow",
    "InvestingCashFlow",
    "FinancingCashFlow",
    "CapitalExpenditure",
    "FreeCashFlow",
    "RepurchaseOfCapitalStock",
    "CashDividendsPaid",
    "DepreciationAndAmortization",
    "StockBasedCompensation",
    "ChangeInWorkingCapital",
    "EndCashPosition",
];

const VALUATION_ITEMS: &[&str] = &[
    "MarketCap",
    "EnterpriseValue",
    "PeRatio",
    "ForwardPeRatio",
    "PegRatio",
    "PsRatio",
    "PbRatio",
    "EnterprisesValueRevenueRatio",
    "EnterprisesValueEBITDARatio",
];

const fn record_module(kind: RecordKind) -> Option<&'static str> {
    match kind {
        RecordKind::FinancialData => Some("financialData"),
        RecordKind::Price => Some("price"),
        RecordKind::SummaryDetail => Some("summaryDetail"),
        RecordKind::Earnings => Some("earnings"),
        RecordKind::EarningsTrend => Some("earningsTrend"),
        RecordKind::MajorHolders => Some("majorHoldersBreakdown"),
        RecordKind::EsgScores => Some("esgScores"),
        RecordKind::CalendarEvents => Some("calendarEvents"),
        RecordKind::CompanyProfile | RecordKind::Recommendations | RecordKind::TechnicalInsights => {
            None
        }
    }
}

/// Quote-summary module and the list field holding the table.
const fn table_source(kind: TableKind) -> Option<(&'static str, &'static str)> {
    match kind {
        TableKind::CompanyOfficers => Some(("assetProfile", "companyOfficers")),
        TableKind::RecommendationTrend => Some(("recommendationTrend", "trend")),
        TableKind::InstitutionOwnership => Some(("institutionOwnership", "ownershipList")),
        TableKind::InsiderHolders => Some(("insiderHolders", "holders")),
        TableKind::InsiderTransactions => Some(("insiderTransactions", "transactions")),
        TableKind::FundOwnership => Some(("fundOwnership", "ownershipList")),
        TableKind::ValuationMeasures => None,
    }
}

const fn statement_items(kind: StatementKind) -> &'static [&'static str] {
    match kind {
        StatementKind::Income => INCOME_ITEMS,
        StatementKind::BalanceSheet => BALANCE_SHEET_ITEMS,
        StatementKind::CashFlow => CASH_FLOW_ITEMS,
    }
}

fn epoch(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::default()).and_utc().timestamp()
}

impl YahooProvider {
    async fn modules(
        &self,
        symbol: &str,
        names: &[&str],
    ) -> Result<Map<String, Value>, YahooError> {
        let body = self
            .get_json_with_crumb(
                self.symbol_url("/v10/finance/quoteSummary", symbol)?,
                &[("modules", names.join(","))],
            )
            .await?;
        parse::quote_summary(&body, symbol)
    }

    async fn company_profile(&self, symbol: &str) -> Result<Record, YahooError> {
        let modules = self.modules(symbol, &["assetProfile", "summaryProfile"]).await?;
        let mut record = Record::new();
        record.insert(
            "asset_profile".to_string(),
            parse::flatten(parse::module(&modules, "assetProfile", symbol)?),
        );
        record.insert(
            "summary_profile".to_string(),
            modules.get("summaryProfile").map_or(Value::Null, parse::flatten),
        );
        Ok(record)
    }

    async fn fetch_record(&self, kind: RecordKind, symbol: &str) -> Result<Record, YahooError> {
        if let Some(name) = record_module(kind) {
            let modules = self.modules(symbol, &[name]).await?;
            return match parse::module(&modules, name, symbol)? {
                Value::Object(object) => Ok(parse::flatten_record(object)),
                _ => Err(YahooError::missing(format!("no {name} data for {symbol}"))),
            };
        }
        match kind {
            RecordKind::CompanyProfile => self.company_profile(symbol).await,
            RecordKind::Recommendations => {
                let body = self
                    .get_json(
                        self.symbol_url("/v6/finance/recommendationsbysymbol", symbol)?,
                        &[],
                    )
                    .await?;
                parse::finance_result(&body, symbol)
            }
            _ => {
                let body = self
                    .get_json(
                        self.url("/ws/insights/v2/finance/insights")?,
                        &[("symbol", symbol.to_string())],
                    )
                    .await?;
                parse::finance_result(&body, symbol)
            }
        }
    }

    async fn timeseries(
        &self,
        symbol: &str,
        prefix: &str,
        items: &[&str],
    ) -> Result<Vec<Row>, YahooError> {
        let types = items
            .iter()
            .map(|item| format!("{prefix}{item}"))
            .collect::<Vec<_>>()
            .join(",");
        let body = self
            .get_json(
                self.symbol_url("/ws/fundamentals-timeseries/v1/finance/timeseries", symbol)?,
                &[
                    ("symbol", symbol.to_string()),
                    ("type", types),
                    ("period1", FUNDAMENTALS_EPOCH.to_string()),
                    ("period2", Utc::now().timestamp().to_string()),
                ],
            )
            .await?;
        parse::timeseries_rows(&body, prefix, items, symbol)
    }

    async fn fetch_table(&self, kind: TableKind, symbol: &str) -> Result<Vec<Row>, YahooError> {
        let Some((name, field)) = table_source(kind) else {
            return self.timeseries(symbol, "quarterly", VALUATION_ITEMS).await;
        };
        let modules = self.modules(symbol, &[name]).await?;
        Ok(parse::table_rows(parse::module(&modules, name, symbol)?, field))
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<PriceBar>, YahooError> {
        let mut params = vec![
            ("interval", query.interval.as_str().to_string()),
            ("includeAdjustedClose", "true".to_string()),
            ("events", "div,splits".to_string()),
        ];
        match query.range {
            HistoryRange::Period(period) => params.push(("range", period.as_str().to_string())),
            HistoryRange::Dates { start, end } => {
                // period2 is exclusive; extend it past the end date.
                let after_end = end.succ_opt().unwrap_or(end);
                params.push(("period1", epoch(start).to_string()));
                params.push(("period2", epoch(after_end).to_string()));
            }
        }
        let body = self
            .get_json(self.symbol_url("/v8/finance/chart", symbol)?, &params)
            .await?;
        parse::chart_bars(&body, symbol)
    }
}

#[async_trait]
impl DataProvider for YahooProvider {
    async fn record(&self, kind: RecordKind, symbol: &str) -> ProviderResult<Record> {
        Ok(self.fetch_record(kind, symbol).await?)
    }

    async fn table(&self, kind: TableKind, symbol: &str) -> ProviderResult<Vec<Row>> {
        Ok(self.fetch_table(kind, symbol).await?)
    }

    async fn statement(
        &self,
        kind: StatementKind,
        symbol: &str,
        frequency: Frequency,
    ) -> ProviderResult<Vec<Row>> {
        Ok(self
            .timeseries(symbol, frequency.as_str(), statement_items(kind))
            .await?)
    }

    async fn history(&self, symbol: &str, query: &HistoryQuery) -> ProviderResult<Vec<PriceBar>> {
        Ok(self.fetch_history(symbol, query).await?)
    }

    async fn search(&self, query: &str, limit: usize) -> ProviderResult<Vec<SearchMatch>> {
        let body = self
            .get_json(
                self.url("/v1/finance/search")?,
                &[
                    ("q", query.to_string()),
                    ("quotesCount", limit.to_string()),
                    ("newsCount", "0".to_string()),
                ],
            )
            .await?;
        Ok(parse::search_matches(&body, limit))
    }
}
