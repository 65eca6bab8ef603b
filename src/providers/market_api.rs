//! Market list provider

use crate::{
    config::EngineConfig,
    error::ProviderError,
    provider::MarketSource,
    providers::http::JsonClient,
    types::MarketEntry,
};
use async_trait::async_trait;
use serde::Deserialize;

const MARKET_ENDPOINT: &str = "/market";

#[derive(Debug, Deserialize)]
struct MarketResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    data: Vec<MarketDto>,
}

#[derive(Debug, Deserialize)]
struct MarketDto {
    pair: String,
    #[serde(default, alias = "current_bid")]
    buy_price: f64,
    #[serde(default, alias = "current_ask")]
    sell_price: f64,
    #[serde(default, alias = "eth_24h_volume")]
    volume: f64,
}

/// Market list provider
pub struct MarketApiProvider {
    client: JsonClient,
}

impl MarketApiProvider {
    /// Creates a new market provider
    pub fn new(config: &EngineConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: JsonClient::new("market-api", &config.market_api_url, config.request_timeout())?,
        })
    }
}

fn parse_markets(data: Vec<MarketDto>) -> Vec<MarketEntry> {
    data.into_iter()
        .filter(|dto| dto.pair.contains('_'))
        .map(|dto| MarketEntry::new(dto.pair, dto.buy_price, dto.sell_price, dto.volume))
        .collect()
}

#[async_trait]
impl MarketSource for MarketApiProvider {
    async fn fetch_markets(&self) -> Result<Vec<MarketEntry>, ProviderError> {
        let response: MarketResponse = self.client.get(MARKET_ENDPOINT, &[]).await?;
        if response.error {
            return Err(ProviderError::ApiError("Market service reported an error".to_string()));
        }

        let markets = parse_markets(response.data);
        if markets.is_empty() {
            return Err(ProviderError::invalid("No markets returned"));
        }

        tracing::debug!(count = markets.len(), "Successfully fetched markets");
        Ok(markets)
    }

    fn provider_name(&self) -> &'static str {
        "market-api"
    }
}
