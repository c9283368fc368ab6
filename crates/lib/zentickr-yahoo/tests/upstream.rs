use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use zentickr_core::DataProvider;
use zentickr_core::params::{Frequency, HistoryQuery, HistoryRange, Interval, Period};
use zentickr_core::provider::{RecordKind, StatementKind};
use zentickr_yahoo::{YahooConfig, YahooProvider};

const QUOTE_SUMMARY: &str = "/v10/finance/quoteSummary/";

/// Local stand-in for the Yahoo endpoints that records every request target.
#[derive(Clone)]
struct Upstream {
    accepted_crumb: &'static str,
    crumbs_issued: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Uri>>>,
}

impl Upstream {
    fn accepting(accepted_crumb: &'static str) -> Self {
        Self {
            accepted_crumb,
            crumbs_issued: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn crumbs_issued(&self) -> usize {
        self.crumbs_issued.load(Ordering::SeqCst)
    }

    fn requests_under(&self, prefix: &str) -> Vec<Uri> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|uri| uri.path().starts_with(prefix))
            .cloned()
            .collect()
    }

    async fn spawn(&self) -> YahooProvider {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind local upstream");
        let addr = listener.local_addr().expect("local address");
        let app = Router::new().fallback(respond).with_state(self.clone());
        tokio::spawn(async move { axum::serve(listener, app).await });

        let base = format!("http://{addr}");
        let config = YahooConfig::new(base.as_str()).with_cookie_url(format!("{base}/cookie"));
        YahooProvider::new(config).expect("client should build")
    }
}

async fn respond(State(upstream): State<Upstream>, uri: Uri) -> Response {
    upstream.requests.lock().unwrap().push(uri.clone());
    let query = uri.query().unwrap_or_default();

    if uri.path() == "/v1/test/getcrumb" {
        let issued = upstream.crumbs_issued.fetch_add(1, Ordering::SeqCst) + 1;
        return format!("crumb-{issued}").into_response();
    }
    if uri.path().starts_with(QUOTE_SUMMARY) {
        if query.contains(&format!("crumb={}", upstream.accepted_crumb)) {
            let body = json!({
                "quoteSummary": {
                    "result": [{
                        "price": {
                            "regularMarketPrice": {"raw": 189.5, "fmt": "189.50"},
                            "currency": "USD"
                        }
                    }],
                    "error": null
                }
            });
            return Json(body).into_response();
        }
        let body = json!({
            "finance": {
                "result": null,
                "error": {"code": "Unauthorized", "description": "Invalid Crumb"}
            }
        });
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }
    let body = json!({
        "chart": {
            "result": null,
            "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
        }
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

#[tokio::test]
async fn rejected_crumb_is_refreshed_and_retried_once() {
    let upstream = Upstream::accepting("crumb-2");
    let provider = upstream.spawn().await;

    let record = provider
        .record(RecordKind::Price, "AAPL")
        .await
        .expect("second crumb is accepted");
    assert_eq!(record["regularMarketPrice"], json!(189.5));
    assert_eq!(upstream.crumbs_issued(), 2);

    let attempts = upstream.requests_under(QUOTE_SUMMARY);
    assert_eq!(attempts.len(), 2);
    assert!(attempts[0].query().unwrap_or_default().contains("crumb=crumb-1"));
    assert!(attempts[1].query().unwrap_or_default().contains("crumb=crumb-2"));

    // The refreshed crumb is cached for later calls.
    provider
        .record(RecordKind::Price, "MSFT")
        .await
        .expect("cached crumb is reused");
    assert_eq!(upstream.crumbs_issued(), 2);
    assert_eq!(upstream.requests_under(QUOTE_SUMMARY).len(), 3);
}

#[tokio::test]
async fn persistent_rejection_fails_after_a_single_retry() {
    let upstream = Upstream::accepting("never-issued");
    let provider = upstream.spawn().await;

    let err = provider
        .record(RecordKind::Price, "AAPL")
        .await
        .expect_err("no crumb is ever accepted");
    assert!(err.message().contains("Invalid Crumb"), "{}", err.message());
    assert_eq!(upstream.crumbs_issued(), 2);
    assert_eq!(upstream.requests_under(QUOTE_SUMMARY).len(), 2);
}

#[tokio::test]
async fn symbols_stay_inside_one_path_segment() {
    let upstream = Upstream::accepting("crumb-1");
    let provider = upstream.spawn().await;
    let symbol = "BRK/B?INTERVAL=1M#";
    let escaped = "BRK%2FB%3FINTERVAL=1M%23";

    let query = HistoryQuery {
        interval: Interval::OneDay,
        range: HistoryRange::Period(Period::OneMonth),
    };
    provider
        .history(symbol, &query)
        .await
        .expect_err("upstream has no chart for it");
    provider
        .statement(StatementKind::Income, symbol, Frequency::Annual)
        .await
        .expect_err("upstream has no fundamentals for it");
    provider
        .record(RecordKind::Recommendations, symbol)
        .await
        .expect_err("upstream has no recommendations for it");
    provider
        .record(RecordKind::Price, symbol)
        .await
        .expect("quote summary answers any symbol");

    let chart = upstream.requests_under("/v8/finance/chart/");
    assert_eq!(chart.len(), 1);
    assert_eq!(chart[0].path(), format!("/v8/finance/chart/{escaped}"));
    let chart_query = chart[0].query().unwrap_or_default();
    assert!(chart_query.contains("interval=1d"), "{chart_query}");
    assert!(chart_query.contains("range=1mo"), "{chart_query}");
    assert!(!chart_query.contains("INTERVAL"), "{chart_query}");

    for prefix in [
        "/ws/fundamentals-timeseries/v1/finance/timeseries/",
        "/v6/finance/recommendationsbysymbol/",
        QUOTE_SUMMARY,
    ] {
        let requests = upstream.requests_under(prefix);
        assert_eq!(requests.len(), 1, "{prefix}");
        assert_eq!(requests[0].path(), format!("{prefix}{escaped}"));
    }
}

#[tokio::test]
async fn dot_symbols_never_reach_the_network() {
    let upstream = Upstream::accepting("crumb-1");
    let provider = upstream.spawn().await;

    let err = provider
        .record(RecordKind::Recommendations, "..")
        .await
        .expect_err("dot segments are not symbols");
    assert!(err.message().contains("not a valid path segment"), "{}", err.message());
    assert!(upstream.requests_under("/v6/").is_empty());
}
