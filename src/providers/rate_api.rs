//! Internal rate and tracker service provider

use crate::{
    config::EngineConfig,
    constants::RATE_DECIMALS,
    error::ProviderError,
    provider::RateSource,
    providers::http::JsonClient,
    types::{PlatformFeeQuote, RateValue, TrackerRate},
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ruint::aliases::U256;
use serde::Deserialize;
use std::collections::HashMap;

const NATIVE_RATES_ENDPOINT: &str = "/rates/native";
const USD_RATES_ENDPOINT: &str = "/rates/usd";
const PLATFORM_FEE_ENDPOINT: &str = "/platform-fee";
const TRACKER_RATES_ENDPOINT: &str = "/change24h";

/// Rate list envelope: `{"error": false, "data": [...]}`
#[derive(Debug, Deserialize)]
struct RateListResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    data: Vec<RateDto>,
}

#[derive(Debug, Deserialize)]
struct RateDto {
    source: String,
    dest: String,
    /// Decimal string of the 18-decimal fixed-point rate
    rate: String,
}

/// Tracker payload, keyed by `{NATIVE}_{SYMBOL}`
#[derive(Debug, Deserialize)]
struct TrackerResponse(HashMap<String, TrackerDto>);

#[derive(Debug, Deserialize)]
struct TrackerDto {
    token_symbol: String,
    #[serde(default)]
    rate_eth_now: f64,
    #[serde(default)]
    rate_usd_now: f64,
    #[serde(default)]
    change_eth_24h: f64,
    #[serde(default)]
    change_usd_24h: f64,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PlatformFeeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    fee: i64,
}

/// Provider for the internal rate service and the tracker service
pub struct RateApiProvider {
    rates: JsonClient,
    tracker: JsonClient,
}

impl RateApiProvider {
    /// Creates a new provider from the configured service URLs
    pub fn new(config: &EngineConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            rates: JsonClient::new("rate-api", &config.rate_api_url, config.request_timeout())?,
            tracker: JsonClient::new("tracker-api", &config.tracker_api_url, config.request_timeout())?,
        })
    }

    async fn fetch_rate_list(&self, endpoint: &str) -> Result<Vec<RateValue>, ProviderError> {
        let response: RateListResponse = self.rates.get(endpoint, &[]).await?;
        if response.error {
            return Err(ProviderError::ApiError(format!(
                "{} reported an error",
                endpoint
            )));
        }
        Ok(parse_rate_list(response.data))
    }
}

/// Converts rate DTOs, dropping entries whose rate is not a decimal integer
fn parse_rate_list(data: Vec<RateDto>) -> Vec<RateValue> {
    data.into_iter()
        .filter_map(|dto| match dto.rate.parse::<U256>() {
            Ok(raw) => Some(RateValue::new(dto.source, dto.dest, raw, RATE_DECIMALS)),
            Err(e) => {
                tracing::debug!(
                    source = %dto.source,
                    dest = %dto.dest,
                    rate = %dto.rate,
                    error = %e,
                    "Dropping non-numeric rate"
                );
                None
            }
        })
        .collect()
}

fn parse_tracker(response: TrackerResponse) -> Vec<TrackerRate> {
    response
        .0
        .into_values()
        .map(|dto| TrackerRate {
            symbol: dto.token_symbol,
            rate_native: dto.rate_eth_now,
            rate_usd: dto.rate_usd_now,
            change_native_24h: dto.change_eth_24h,
            change_usd_24h: dto.change_usd_24h,
            updated_at: dto
                .timestamp
                .and_then(timestamp_to_utc)
                .unwrap_or_else(Utc::now),
        })
        .collect()
}

/// Tracker timestamps are in milliseconds
fn timestamp_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

#[async_trait]
impl RateSource for RateApiProvider {
    async fn fetch_native_rates(&self) -> Result<Vec<RateValue>, ProviderError> {
        self.fetch_rate_list(NATIVE_RATES_ENDPOINT).await
    }

    async fn fetch_usd_rates(&self) -> Result<Vec<RateValue>, ProviderError> {
        self.fetch_rate_list(USD_RATES_ENDPOINT).await
    }

    async fn fetch_tracker_rates(&self) -> Result<Vec<TrackerRate>, ProviderError> {
        let response: TrackerResponse = self.tracker.get(TRACKER_RATES_ENDPOINT, &[]).await?;
        let rates = parse_tracker(response);

        if rates.is_empty() {
            return Err(ProviderError::invalid("No tracker rates returned"));
        }

        tracing::debug!(count = rates.len(), "Successfully fetched tracker rates");
        Ok(rates)
    }

    async fn fetch_platform_fee(&self) -> Result<PlatformFeeQuote, ProviderError> {
        let response: PlatformFeeResponse = self.rates.get(PLATFORM_FEE_ENDPOINT, &[]).await?;
        Ok(PlatformFeeQuote {
            success: response.success,
            fee: response.fee,
        })
    }

    fn provider_name(&self) -> &'static str {
        "rate-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate_list_drops_malformed() {
        let response: RateListResponse = serde_json::from_str(
            r#"{"error":false,"data":[
                {"source":"KNC","dest":"ETH","rate":"1500000000000000"},
                {"source":"DAI","dest":"ETH","rate":"n/a"}
            ]}"#,
        )
        .unwrap();

        let rates = parse_rate_list(response.data);
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].source, "KNC");
        assert_eq!(rates[0].rate_raw, U256::from(1_500_000_000_000_000u64));
        assert_eq!(rates[0].decimals, 18);
    }

    #[test]
    fn test_parse_tracker_payload() {
        let response: TrackerResponse = serde_json::from_str(
            r#"{"ETH_KNC":{"token_symbol":"KNC","rate_eth_now":0.0015,"rate_usd_now":0.45,
                "change_eth_24h":-1.5,"change_usd_24h":2.0,"timestamp":1546300800000}}"#,
        )
        .unwrap();

        let rates = parse_tracker(response);
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].symbol, "KNC");
        assert_eq!(rates[0].rate_usd, 0.45);
        assert_eq!(rates[0].change_native_24h, -1.5);
        assert_eq!(rates[0].updated_at.timestamp(), 1_546_300_800);
    }

    #[test]
    fn test_platform_fee_defaults_to_failure() {
        let response: PlatformFeeResponse = serde_json::from_str("{}").unwrap();
        assert!(!response.success);
    }
}
