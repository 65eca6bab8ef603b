//! HTTP-backed rate source implementations

pub mod http;
pub mod market_api;
pub mod oracle;
pub mod rate_api;

pub use http::JsonClient;
pub use market_api::MarketApiProvider;
pub use oracle::OracleProvider;
pub use rate_api::RateApiProvider;
