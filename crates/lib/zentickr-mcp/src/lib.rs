//! MCP server implementation for zentickr.
//!
//! The advertised tool list is built once from the [`ToolCatalog`] held by the
//! [`RequestHandler`]: names, descriptions and input schemas all come from the
//! catalog. Every `tools/call` passes its raw arguments to the handler, which
//! owns validation, provider calls and result normalization.

mod helpers;
pub mod server;

use std::future::Future;
use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParams,
    CallToolResult,
    JsonObject,
    ListToolsResult,
    PaginatedRequestParams,
    ServerCapabilities,
    ServerInfo,
    Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};
use tracing::debug;
use zentickr_core::{RequestHandler, ToolCatalog, ToolInvocation};

const SERVER_INSTRUCTIONS: &str = r#"zentickr provides MCP tools for Yahoo Finance market data.

Usage:
1. Pass `symbols` as a comma-separated list of tickers, e.g. `AAPL,MSFT`. Symbols are
   case-insensitive and each one is fetched independently.
2. Snapshot tools (`get_price_data`, `get_financial_data`, `get_summary_detail`, ...) return an
   object keyed by symbol. Table tools (`get_balance_sheet`, `get_insider_transactions`, ...)
   return a flat list of rows, each tagged with its `symbol`.
3. A symbol that fails does not fail the call: keyed results carry `{ "error": ... }` for that
   symbol and row results carry a `{ "symbol", "error" }` row. The call only fails when every
   symbol fails.
4. Statements accept `frequency` of `annual` (default) or `quarterly`.
5. `get_historical_prices` takes either `period` (1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, max)
   or `start_date`/`end_date` in YYYY-MM-DD format, plus an optional `interval` (default 1d).
   Daily and longer intervals report dates; intraday intervals report timestamps with offset.
6. Use `search_symbols` to resolve a company name to tickers; it returns at most 10 matches."#;

/// Builds the protocol tool list from the catalog, in registration order.
#[must_use]
pub fn advertised_tools(catalog: &ToolCatalog) -> Vec<Tool> {
    catalog
        .list()
        .iter()
        .map(|descriptor| {
            Tool::new(
                descriptor.name.clone(),
                descriptor.description.clone(),
                Arc::new(descriptor.input_schema()),
            )
        })
        .collect()
}

/// MCP server wrapper around the request handler.
#[derive(Clone)]
pub struct ZentickrMcp {
    tools: Arc<[Tool]>,
    handler: Arc<RequestHandler>,
}

impl ZentickrMcp {
    /// Creates a new server owning the request handler.
    #[must_use]
    pub fn new(handler: RequestHandler) -> Self {
        Self::with_handler(Arc::new(handler))
    }

    /// Creates a new server using a shared request handler.
    #[must_use]
    pub fn with_handler(handler: Arc<RequestHandler>) -> Self {
        let tools = advertised_tools(handler.catalog()).into();
        Self { tools, handler }
    }

    /// Tools advertised to clients.
    #[must_use]
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Runs one tool call through the request handler.
    ///
    /// # Errors
    /// Returns `ErrorData` for unknown tools and rejected arguments. Provider
    /// failures are reported as tool results flagged as errors.
    pub async fn call(
        &self,
        tool: &str,
        arguments: JsonObject,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(tool, "mcp tool call");
        match self
            .handler
            .handle(ToolInvocation::with_arguments(tool, arguments))
            .await
        {
            Ok(result) => helpers::success(result),
            Err(err) => helpers::map_tool_err(&err),
        }
    }
}

impl ServerHandler for ZentickrMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(self.tools.to_vec())))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            let arguments = request.arguments.unwrap_or_default();
            self.call(&request.name, arguments).await
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rmcp::model::ErrorCode;
    use serde_json::{Value, json};
    use zentickr_core::params::{Frequency, HistoryQuery};
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
    use zentickr_core::{ProviderError, ProviderResult};

    use super::*;

    struct PriceOnly;

    #[async_trait]
    impl DataProvider for PriceOnly {
        async fn record(&self, _kind: RecordKind, symbol: &str) -> ProviderResult<Record> {
            if symbol == "AAPL" {
                let mut record = Record::new();
                record.insert("regularMarketPrice".to_string(), json!(189.5));
                Ok(record)
            } else {
                Err(ProviderError::new(format!("Quote not found for symbol: {symbol}")))
            }
        }

        async fn table(&self, _kind: TableKind, _symbol: &str) -> ProviderResult<Vec<Row>> {
            Err(ProviderError::new("unsupported"))
        }

        async fn statement(
            &self,
            _kind: StatementKind,
            _symbol: &str,
            _frequency: Frequency,
        ) -> ProviderResult<Vec<Row>> {
            Err(ProviderError::new("unsupported"))
        }

        async fn history(
            &self,
            _symbol: &str,
            _query: &HistoryQuery,
        ) -> ProviderResult<Vec<PriceBar>> {
            Err(ProviderError::new("unsupported"))
        }

        async fn search(&self, _query: &str, _limit: usize) -> ProviderResult<Vec<SearchMatch>> {
            Ok(Vec::new())
        }
    }

    fn server() -> ZentickrMcp {
        ZentickrMcp::new(RequestHandler::new(
            Arc::new(ToolCatalog::standard()),
            Arc::new(PriceOnly),
        ))
    }

    fn arguments(value: Value) -> JsonObject {
        match value {
            Value::Object(arguments) => arguments,
            other => panic!("arguments must be an object, got {other}"),
        }
    }

    fn body(result: &CallToolResult) -> Value {
        let text = result.content[0].as_text().expect("json content is text");
        serde_json::from_str(&text.text).expect("content is json")
    }

    #[test]
    fn advertised_tools_mirror_the_catalog() {
        let catalog = ToolCatalog::standard();
        let mcp = server();
        assert_eq!(mcp.tools().len(), catalog.len());
        for (tool, descriptor) in mcp.tools().iter().zip(catalog.list()) {
            assert_eq!(tool.name, descriptor.name);
            assert_eq!(tool.description.as_deref(), Some(descriptor.description.as_str()));
            assert_eq!(*tool.input_schema, descriptor.input_schema(), "tool {}", tool.name);
        }
    }

    #[test]
    fn advertised_schemas_carry_enums_and_defaults() {
        let mcp = server();
        let history = mcp
            .tools()
            .iter()
            .find(|tool| tool.name == "get_historical_prices")
            .expect("history tool advertised");
        let interval = &history.input_schema["properties"]["interval"];
        assert_eq!(interval["default"], json!("1d"));
        assert_eq!(interval["enum"][0], json!("1m"));
        assert_eq!(history.input_schema["required"], json!(["symbols"]));

        let balance = mcp
            .tools()
            .iter()
            .find(|tool| tool.name == "get_balance_sheet")
            .expect("balance sheet tool advertised");
        assert_eq!(
            balance.input_schema["properties"]["frequency"]["enum"],
            json!(["annual", "quarterly"])
        );
    }

    #[tokio::test]
    async fn call_returns_keyed_json() {
        let result = server()
            .call("get_price_data", arguments(json!({"symbols": "aapl, missing"})))
            .await
            .expect("partial success is a result");
        assert_ne!(result.is_error, Some(true));
        let body = body(&result);
        assert_eq!(body["AAPL"]["regularMarketPrice"], json!(189.5));
        assert_eq!(
            body["MISSING"]["error"],
            json!("Quote not found for symbol: MISSING")
        );
    }

    #[tokio::test]
    async fn call_flags_provider_failures() {
        let result = server()
            .call("get_price_data", arguments(json!({"symbols": "INVALIDTICKER"})))
            .await
            .expect("provider failures are tool results");
        assert_eq!(result.is_error, Some(true));
        assert_eq!(body(&result)["kind"], "provider_error");
    }

    #[tokio::test]
    async fn call_rejects_bad_frequency() {
        let err = server()
            .call(
                "get_income_statement",
                arguments(json!({"symbols": "AAPL", "frequency": "monthly"})),
            )
            .await
            .expect_err("monthly is not a frequency");
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data.expect("payload")["kind"], "invalid_parameter");
    }

    #[tokio::test]
    async fn missing_symbols_reach_the_handler_validation() {
        let err = server()
            .call("get_price_data", JsonObject::new())
            .await
            .expect_err("symbols is required");
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data.expect("payload")["kind"], "missing_parameter");
    }

    #[tokio::test]
    async fn non_string_symbols_are_invalid_parameters() {
        let err = server()
            .call("get_price_data", arguments(json!({"symbols": ["AAPL"]})))
            .await
            .expect_err("symbols must be a string");
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data.expect("payload")["kind"], "invalid_parameter");
    }

    #[tokio::test]
    async fn unknown_tools_are_method_not_found() {
        let err = server()
            .call("get_weather", JsonObject::new())
            .await
            .expect_err("not a catalog tool");
        assert_eq!(err.code, ErrorCode::METHOD_NOT_FOUND);
    }
}
