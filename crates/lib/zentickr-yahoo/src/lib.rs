//! Yahoo Finance data provider for zentickr.
//!
//! Implements [`zentickr_core::DataProvider`] over the public Yahoo Finance
//! JSON endpoints: quote-summary modules, chart, fundamentals timeseries,
//! search, recommendations and insights.

mod client;
pub mod error;
pub mod parse;
mod provider;

pub use client::{
    DEFAULT_BASE_URL,
    DEFAULT_COOKIE_URL,
    DEFAULT_USER_AGENT,
    YahooConfig,
    YahooProvider,
};
pub use error::YahooError;
