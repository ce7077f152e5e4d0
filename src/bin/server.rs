use std::{net::SocketAddr, sync::Arc};

use coinboard::{
    demo_spotlight, demo_state, init_logging, listing_router, log_app_bind, log_app_start,
    log_source_selected, logging_config_from_env, InMemoryPreferenceStore, ListingAppState,
    LiveCoinDetailSource, LiveCoinListingSource, LiveExchangeListingSource, LiveNewsSource,
    MarketApiConfig,
    MarketClient, PollingSpotlightSource, PreferenceStore, SqlitePreferenceStore,
    SPOTLIGHT_REFRESH_INTERVAL,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let addr: SocketAddr = std::env::var("COINBOARD_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    let prefs = prefs_from_env()?;
    // Blocking HTTP clients are built off the async runtime.
    let state = tokio::task::spawn_blocking(move || state_from_env(prefs)).await??;
    let app = listing_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn prefs_from_env() -> Result<Arc<dyn PreferenceStore>, Box<dyn std::error::Error + Send + Sync>> {
    match std::env::var("COINBOARD_PREFS_PATH") {
        Ok(path) if !path.trim().is_empty() => Ok(Arc::new(SqlitePreferenceStore::open(path)?)),
        _ => Ok(Arc::new(InMemoryPreferenceStore::new())),
    }
}

fn state_from_env(
    prefs: Arc<dyn PreferenceStore>,
) -> Result<ListingAppState, Box<dyn std::error::Error + Send + Sync>> {
    let force_demo = std::env::var("COINBOARD_USE_DEMO")
        .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if force_demo {
        log_source_selected("demo", Some("COINBOARD_USE_DEMO"), None);
        return Ok(demo_state(prefs));
    }

    let cfg = MarketApiConfig::default();
    log_source_selected(
        "live_market",
        None,
        Some(SPOTLIGHT_REFRESH_INTERVAL.as_millis() as u64),
    );

    let spotlight_client = MarketClient::new(cfg.clone())?;
    let spotlight = PollingSpotlightSource::spawn(demo_spotlight(), SPOTLIGHT_REFRESH_INTERVAL, {
        let symbol = demo_spotlight().coin.name;
        move || spotlight_client.live_quote(&symbol)
    });

    Ok(ListingAppState {
        coins: Arc::new(LiveCoinListingSource::new(MarketClient::new(cfg.clone())?)),
        exchanges: Arc::new(LiveExchangeListingSource::new(MarketClient::new(cfg.clone())?)),
        detail: Arc::new(LiveCoinDetailSource::new(MarketClient::new(cfg.clone())?)),
        news: Arc::new(LiveNewsSource::new(MarketClient::new(cfg)?)),
        spotlight: Arc::new(spotlight),
        prefs,
    })
}
