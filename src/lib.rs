//! Coinboard core crate.
//!
//! Server-rendered crypto market tables backed by the CryptoCompare
//! public API:
//! - row reconciliation and pagination for the coin and exchange lists
//! - column visibility policy with a mobile cap
//! - durable user preferences (favorites, columns, theme)
//! - pinned-asset spotlight with interval refresh

mod columns;
mod listing;
mod market;
mod observability;
mod prefs;
mod reconcile;
mod spotlight;

pub use columns::{
    ColumnLayout, ColumnSpec, Viewport, COIN_COLUMNS, EXCHANGE_COLUMNS, MOBILE_BREAKPOINT_PX,
};
pub use listing::{
    demo_articles, demo_coins, demo_exchanges, demo_spotlight, demo_state, listing_router,
    without_pinned, CoinDetailSource, CoinListingSnapshot, CoinListingSource,
    ExchangeListingSource, InMemoryCoinDetailSource, InMemoryCoinListingSource,
    InMemoryExchangeListingSource, InMemoryNewsSource, ListingAppState, ListingKind,
    ListingQueryParams, LiveCoinDetailSource, LiveCoinListingSource, LiveExchangeListingSource,
    LiveNewsSource, NewsSource, RemoveCoinRequest, RequestGuard, TableSession, TableView,
};
pub use market::{
    articles_from_payload, collect_coin_universe, exchange_rows_from_payload,
    history_points_from_payload, quote_from_pricemultifull, CoinInfo, CoinMarketRow, CoinPage,
    CoinPageMeta, DisplayQuotes, ExchangeRow, HistoryPoint, MarketApiConfig, MarketApiError,
    MarketClient, NewsArticle, QuoteDisplay, VideoItem, DEFAULT_API_BASE,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_source_selected, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use prefs::{
    load_id_list, load_id_list_opt, load_theme, store_id_list, store_theme,
    InMemoryPreferenceStore, PreferenceStore, PrefsOpenError, SqlitePreferenceStore, Theme,
    PREF_KEY_COIN_COLUMNS, PREF_KEY_COIN_FAVORITES, PREF_KEY_EXCHANGE_COLUMNS,
    PREF_KEY_EXCHANGE_FAVORITES, PREF_KEY_THEME,
};
pub use reconcile::{
    pages_for_count, reconcile_page, ListEntity, ListedRow, PagePlan, PaginationMode,
    ReconcileInput, PAGE_SIZE,
};
pub use spotlight::{
    FixedSpotlightSource, PollingSpotlightSource, SpotlightSnapshot, SpotlightSource,
    SPOTLIGHT_REFRESH_INTERVAL,
};
