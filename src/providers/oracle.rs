//! Price-oracle bridge provider

use crate::{
    config::EngineConfig,
    constants::RATE_DECIMALS,
    error::ProviderError,
    provider::BridgeRateSource,
    providers::http::JsonClient,
    types::RateValue,
};
use async_trait::async_trait;
use ruint::aliases::U256;
use serde::Deserialize;

const BRIDGE_RATE_ENDPOINT: &str = "/rate";
const PRODUCTION_RATES_ENDPOINT: &str = "/rates";

#[derive(Debug, Deserialize)]
struct BridgeRateResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    rate: f64,
}

#[derive(Debug, Deserialize)]
struct ProductionRatesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<ProductionRateDto>,
}

#[derive(Debug, Deserialize)]
struct ProductionRateDto {
    source: String,
    dest: String,
    rate: String,
    #[serde(default = "default_decimals")]
    decimals: u8,
}

fn default_decimals() -> u8 {
    RATE_DECIMALS
}

/// Bridge rate provider backed by the production rate oracle
pub struct OracleProvider {
    client: JsonClient,
}

impl OracleProvider {
    /// Creates a new oracle provider
    pub fn new(config: &EngineConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: JsonClient::new("oracle", &config.oracle_api_url, config.request_timeout())?,
        })
    }
}

fn parse_production_rates(data: Vec<ProductionRateDto>) -> Vec<RateValue> {
    data.into_iter()
        .filter_map(|dto| {
            let raw = dto.rate.parse::<U256>().ok()?;
            Some(RateValue::new(dto.source, dto.dest, raw, dto.decimals))
        })
        .collect()
}

#[async_trait]
impl BridgeRateSource for OracleProvider {
    async fn fetch_bridge_rate(&self, symbol: &str) -> Result<f64, ProviderError> {
        let response: BridgeRateResponse = self
            .client
            .get(BRIDGE_RATE_ENDPOINT, &[("symbol", symbol)])
            .await?;

        if !response.success {
            return Err(ProviderError::UnsupportedSymbol(symbol.to_string()));
        }
        Ok(response.rate)
    }

    async fn fetch_production_rates(&self) -> Result<Vec<RateValue>, ProviderError> {
        let response: ProductionRatesResponse =
            self.client.get(PRODUCTION_RATES_ENDPOINT, &[]).await?;

        if !response.success {
            return Err(ProviderError::ApiError(
                "Oracle reported an unsuccessful production rate list".to_string(),
            ));
        }

        let rates = parse_production_rates(response.data);
        tracing::debug!(count = rates.len(), "Successfully fetched production rates");
        Ok(rates)
    }

    fn provider_name(&self) -> &'static str {
        "oracle"
    }
}
