use std::sync::Arc;
use std::time::Duration;
use token_rate_sdk::{
    constants::RATE_DECIMALS, display_rate, EngineConfig, RateCoordinator, RateEvent,
    StaticTokenRegistry, TokenInfo, TokenRegistry,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("token_rate_sdk=info")),
        )
        .init();

    println!("Token Rate Monitor");
    println!("==================");

    let registry = Arc::new(StaticTokenRegistry::new(vec![
        TokenInfo::native("ETH", 18),
        TokenInfo::new("WETH", 18),
        TokenInfo::new("KNC", 18),
        TokenInfo::new("DAI", 18),
        TokenInfo::new("USDC", 6),
    ]));

    let coordinator = RateCoordinator::from_config(EngineConfig::from_env(), registry.clone())?;
    coordinator.set_focused_pair("KNC", "ETH").await;
    let mut events = coordinator.subscribe();
    coordinator.resume();

    // Watch loop
    for _ in 0..10 {
        match tokio::time::timeout(Duration::from_secs(45), events.recv()).await {
            Ok(Ok(RateEvent::RatesUpdated { .. })) => {}
            Ok(Ok(event)) => {
                println!("[{}] {}", event.id(), event);
                continue;
            }
            Ok(Err(e)) => {
                eprintln!("Event stream lagged: {}", e);
                continue;
            }
            Err(_) => {
                println!("No rate update within 45s");
                continue;
            }
        }

        println!("\n{:-<50}", "");
        for (from, to) in [("KNC", "ETH"), ("ETH", "KNC"), ("KNC", "DAI"), ("ETH", "USDC")] {
            // Production rates are scaled by the destination token's decimals
            let decimals = registry
                .token_by_symbol(to)
                .map(|token| token.decimals)
                .unwrap_or(RATE_DECIMALS);
            match coordinator.get_cached_production_rate(from, to).await {
                Some(raw) => println!("{:<10} {}", format!("{}/{}", from, to), display_rate(raw, decimals)),
                None => println!("{:<10} n/a", format!("{}/{}", from, to)),
            }
        }
        println!("{:<10} {:.2}", "ETH_KNC vol", coordinator.get_market_volume("ETH_KNC").await);
    }

    let health = coordinator.health_check().await;
    println!("\nHealth: {:?} ({})", health.status, health.message.unwrap_or_default());
    coordinator.pause();

    Ok(())
}
