//! Composed listing tables and their HTTP surface.
//!
//! A [`TableSession`] ties the reconciliation engine, the column policy
//! and the preference store together for one listing; the axum router
//! renders the coin and exchange tables server-side from URL state
//! (`page`, `q`, `favorites`, `width`) plus whatever the session loaded
//! from the store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::columns::{ColumnLayout, ColumnSpec, Viewport, COIN_COLUMNS, EXCHANGE_COLUMNS};
use crate::market::{
    CoinInfo, CoinMarketRow, DisplayQuotes, ExchangeRow, HistoryPoint, MarketClient, NewsArticle,
    QuoteDisplay,
};
use crate::prefs::{
    load_id_list_opt, load_theme, store_id_list, PreferenceStore, Theme, PREF_KEY_COIN_COLUMNS,
    PREF_KEY_COIN_FAVORITES, PREF_KEY_EXCHANGE_COLUMNS, PREF_KEY_EXCHANGE_FAVORITES,
};
use crate::reconcile::{
    pages_for_count, reconcile_page, ListEntity, ListedRow, PaginationMode, ReconcileInput,
    PAGE_SIZE,
};
use crate::spotlight::{SpotlightSnapshot, SpotlightSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Coins,
    Exchanges,
}

impl ListingKind {
    pub fn favorites_key(self) -> &'static str {
        match self {
            ListingKind::Coins => PREF_KEY_COIN_FAVORITES,
            ListingKind::Exchanges => PREF_KEY_EXCHANGE_FAVORITES,
        }
    }

    pub fn columns_key(self) -> &'static str {
        match self {
            ListingKind::Coins => PREF_KEY_COIN_COLUMNS,
            ListingKind::Exchanges => PREF_KEY_EXCHANGE_COLUMNS,
        }
    }

    pub fn layout(self) -> ColumnLayout {
        match self {
            ListingKind::Coins => COIN_COLUMNS,
            ListingKind::Exchanges => EXCHANGE_COLUMNS,
        }
    }
}

/// Per-listing user state: search text, filters, favorites and column
/// selection. Favorites and columns load from the store on creation and
/// persist on every mutation; search and filters live only in the URL.
pub struct TableSession {
    kind: ListingKind,
    store: Arc<dyn PreferenceStore>,
    search: String,
    favorites_only: bool,
    viewport: Viewport,
    favorites: Vec<String>,
    selection: Vec<String>,
}

impl TableSession {
    pub fn new(kind: ListingKind, store: Arc<dyn PreferenceStore>) -> Self {
        let layout = kind.layout();
        let favorites = load_id_list_opt(store.as_ref(), kind.favorites_key()).unwrap_or_default();
        let selection = match load_id_list_opt(store.as_ref(), kind.columns_key()) {
            Some(persisted) => layout.sanitize_selection(&persisted),
            None => layout.default_selection(),
        };
        Self {
            kind,
            store,
            search: String::new(),
            favorites_only: false,
            viewport: Viewport::Desktop,
            favorites,
            selection,
        }
    }

    pub fn set_search(&mut self, raw: &str) {
        self.search = raw.trim().to_string();
    }

    pub fn set_favorites_only(&mut self, on: bool) {
        self.favorites_only = on;
    }

    /// Viewport changes re-run the column policy and persist the result.
    pub fn set_viewport_width(&mut self, width_px: u32) {
        self.viewport = Viewport::from_width(width_px);
        self.selection = self.kind.layout().apply_viewport(self.viewport, &self.selection);
        self.persist_selection();
    }

    pub fn toggle_column(&mut self, column_id: &str) {
        self.selection = self
            .kind
            .layout()
            .toggle(self.viewport, &self.selection, column_id);
        self.persist_selection();
    }

    pub fn toggle_favorite(&mut self, entity_id: &str) {
        if let Some(position) = self.favorites.iter().position(|id| id == entity_id) {
            self.favorites.remove(position);
        } else {
            self.favorites.push(entity_id.to_string());
        }
        self.persist_favorites();
    }

    /// The watchlist-removal write path. Returns false when the id was
    /// not a favorite, leaving the store untouched.
    pub fn remove_favorite(&mut self, entity_id: &str) -> bool {
        let Some(position) = self.favorites.iter().position(|id| id == entity_id) else {
            return false;
        };
        self.favorites.remove(position);
        self.persist_favorites();
        true
    }

    pub fn favorites(&self) -> &[String] {
        &self.favorites
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn is_favorite(&self, entity_id: &str) -> bool {
        self.favorites.iter().any(|id| id == entity_id)
    }

    pub fn visible_columns(&self) -> Vec<&'static ColumnSpec> {
        self.kind.layout().visible_columns(&self.selection)
    }

    /// One full reconciliation pass under this session's filters.
    pub fn plan<E>(
        &self,
        current_page: &[E],
        universe: Option<&[E]>,
        requested_page: u32,
        server_total_pages: u32,
    ) -> TableView<E>
    where
        E: ListEntity + Clone,
    {
        let favorites: HashSet<String> = self.favorites.iter().cloned().collect();
        let plan = reconcile_page(&ReconcileInput {
            current_page,
            universe,
            search: &self.search,
            favorites_only: self.favorites_only,
            favorites: &favorites,
            requested_page,
            server_total_pages,
        });
        TableView {
            mode: plan.mode,
            total_pages: plan.total_pages,
            columns: self.visible_columns(),
            rows: plan.rows,
        }
    }

    fn persist_selection(&self) {
        store_id_list(self.store.as_ref(), self.kind.columns_key(), &self.selection);
    }

    fn persist_favorites(&self) {
        store_id_list(self.store.as_ref(), self.kind.favorites_key(), &self.favorites);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableView<E> {
    pub mode: PaginationMode,
    pub total_pages: u32,
    pub columns: Vec<&'static ColumnSpec>,
    pub rows: Vec<ListedRow<E>>,
}

/// Monotonic generation counter used to discard stale fetch results: a
/// result is only committed when no newer pass has begun since its token
/// was taken.
#[derive(Debug, Default)]
pub struct RequestGuard {
    current: AtomicU64,
}

impl RequestGuard {
    pub fn begin(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.current.load(Ordering::SeqCst) == token
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoinListingSnapshot {
    pub page_rows: Vec<CoinMarketRow>,
    pub universe: Vec<CoinMarketRow>,
    pub total_pages: u32,
}

pub trait CoinListingSource: Send + Sync + 'static {
    /// `page` is 0-based here, matching the upstream API.
    fn page(&self, page: u32) -> CoinListingSnapshot;
}

pub trait ExchangeListingSource: Send + Sync + 'static {
    fn all(&self) -> Vec<ExchangeRow>;
}

pub trait NewsSource: Send + Sync + 'static {
    fn latest(&self) -> Vec<NewsArticle>;
}

/// Backs the per-coin detail page: live quote plus a recent price series.
pub trait CoinDetailSource: Send + Sync + 'static {
    fn quote(&self, symbol: &str) -> QuoteDisplay;
    fn history(&self, symbol: &str) -> Vec<HistoryPoint>;
}

/// Fixture-backed coin source for demo mode and tests.
pub struct InMemoryCoinListingSource {
    all: Vec<CoinMarketRow>,
}

impl InMemoryCoinListingSource {
    pub fn new(all: Vec<CoinMarketRow>) -> Self {
        Self { all }
    }

    pub fn demo() -> Self {
        Self::new(demo_coins())
    }
}

impl CoinListingSource for InMemoryCoinListingSource {
    fn page(&self, page: u32) -> CoinListingSnapshot {
        let start = (page as usize).saturating_mul(PAGE_SIZE);
        let page_rows = self.all.iter().skip(start).take(PAGE_SIZE).cloned().collect();
        CoinListingSnapshot {
            page_rows,
            universe: self.all.clone(),
            total_pages: pages_for_count(self.all.len() as u32, PAGE_SIZE as u32),
        }
    }
}

/// Live coin source: requested page plus the exhaustively paged universe.
/// A failed page fetch renders empty; a failed universe fetch degrades
/// search and favorites to the current page. The cached universe is only
/// replaced when no newer request began while the exhaustive fetch ran.
pub struct LiveCoinListingSource {
    client: MarketClient,
    universe_cache: RwLock<Vec<CoinMarketRow>>,
    guard: RequestGuard,
}

impl LiveCoinListingSource {
    pub fn new(client: MarketClient) -> Self {
        Self {
            client,
            universe_cache: RwLock::new(Vec::new()),
            guard: RequestGuard::default(),
        }
    }
}

impl CoinListingSource for LiveCoinListingSource {
    fn page(&self, page: u32) -> CoinListingSnapshot {
        let token = self.guard.begin();

        let first = match self.client.top_coins(page) {
            Ok(first) => first,
            Err(err) => {
                warn!(component = "listing", event = "listing.page_fetch_failed", page, error = %err);
                return CoinListingSnapshot::default();
            }
        };
        let total_pages = first.total_pages(self.client.config().page_size);

        let universe = match self.client.all_coins() {
            Ok(universe) => {
                if self.guard.is_current(token) {
                    let mut cache = self
                        .universe_cache
                        .write()
                        .expect("universe cache lock should not be poisoned");
                    *cache = universe.clone();
                    universe
                } else {
                    // A newer navigation superseded this fetch; serve the
                    // cached universe instead of committing a stale one.
                    self.universe_cache
                        .read()
                        .expect("universe cache lock should not be poisoned")
                        .clone()
                }
            }
            Err(err) => {
                warn!(component = "listing", event = "listing.universe_fetch_failed", error = %err);
                Vec::new()
            }
        };

        CoinListingSnapshot {
            page_rows: first.data,
            universe,
            total_pages,
        }
    }
}

pub struct InMemoryExchangeListingSource {
    all: Vec<ExchangeRow>,
}

impl InMemoryExchangeListingSource {
    pub fn new(all: Vec<ExchangeRow>) -> Self {
        Self { all }
    }

    pub fn demo() -> Self {
        Self::new(demo_exchanges())
    }
}

impl ExchangeListingSource for InMemoryExchangeListingSource {
    fn all(&self) -> Vec<ExchangeRow> {
        self.all.clone()
    }
}

pub struct LiveExchangeListingSource {
    client: MarketClient,
}

impl LiveExchangeListingSource {
    pub fn new(client: MarketClient) -> Self {
        Self { client }
    }
}

impl ExchangeListingSource for LiveExchangeListingSource {
    fn all(&self) -> Vec<ExchangeRow> {
        match self.client.exchanges() {
            Ok(all) => all,
            Err(err) => {
                warn!(component = "listing", event = "listing.exchanges_fetch_failed", error = %err);
                Vec::new()
            }
        }
    }
}

/// Demo detail source: quotes from the coin fixtures, history synthesized
/// at a 10-minute cadence.
pub struct InMemoryCoinDetailSource {
    coins: Vec<CoinMarketRow>,
}

impl InMemoryCoinDetailSource {
    pub fn new(coins: Vec<CoinMarketRow>) -> Self {
        Self { coins }
    }

    pub fn demo() -> Self {
        Self::new(demo_coins())
    }

    fn find(&self, symbol: &str) -> Option<&CoinMarketRow> {
        self.coins
            .iter()
            .find(|row| row.coin_info.name.eq_ignore_ascii_case(symbol))
    }
}

impl CoinDetailSource for InMemoryCoinDetailSource {
    fn quote(&self, symbol: &str) -> QuoteDisplay {
        self.find(symbol).map(CoinMarketRow::quote).unwrap_or_default()
    }

    fn history(&self, symbol: &str) -> Vec<HistoryPoint> {
        if self.find(symbol).is_none() {
            return Vec::new();
        }
        (0..6)
            .map(|i| HistoryPoint {
                time: 1_755_900_000 + i * 600,
                open: 100.0 + i as f64,
                high: 101.0 + i as f64,
                low: 99.0 + i as f64,
                close: 100.5 + i as f64,
            })
            .collect()
    }
}

pub struct LiveCoinDetailSource {
    client: MarketClient,
}

impl LiveCoinDetailSource {
    pub fn new(client: MarketClient) -> Self {
        Self { client }
    }
}

impl CoinDetailSource for LiveCoinDetailSource {
    fn quote(&self, symbol: &str) -> QuoteDisplay {
        match self.client.live_quote(symbol) {
            Ok(quote) => quote,
            Err(err) => {
                warn!(component = "listing", event = "listing.quote_fetch_failed", symbol, error = %err);
                QuoteDisplay::default()
            }
        }
    }

    fn history(&self, symbol: &str) -> Vec<HistoryPoint> {
        match self.client.minute_history(symbol) {
            Ok(points) => points,
            Err(err) => {
                warn!(component = "listing", event = "listing.history_fetch_failed", symbol, error = %err);
                Vec::new()
            }
        }
    }
}

pub struct InMemoryNewsSource {
    articles: Vec<NewsArticle>,
}

impl InMemoryNewsSource {
    pub fn new(articles: Vec<NewsArticle>) -> Self {
        Self { articles }
    }

    pub fn demo() -> Self {
        Self::new(demo_articles())
    }
}

impl NewsSource for InMemoryNewsSource {
    fn latest(&self) -> Vec<NewsArticle> {
        self.articles.clone()
    }
}

pub struct LiveNewsSource {
    client: MarketClient,
}

impl LiveNewsSource {
    pub fn new(client: MarketClient) -> Self {
        Self { client }
    }
}

impl NewsSource for LiveNewsSource {
    fn latest(&self) -> Vec<NewsArticle> {
        match self.client.latest_news() {
            Ok(articles) => articles,
            Err(err) => {
                warn!(component = "listing", event = "listing.news_fetch_failed", error = %err);
                Vec::new()
            }
        }
    }
}

#[derive(Clone)]
pub struct ListingAppState {
    pub coins: Arc<dyn CoinListingSource>,
    pub exchanges: Arc<dyn ExchangeListingSource>,
    pub detail: Arc<dyn CoinDetailSource>,
    pub news: Arc<dyn NewsSource>,
    pub spotlight: Arc<dyn SpotlightSource>,
    pub prefs: Arc<dyn PreferenceStore>,
}

/// URL state shared by the table pages. `width` is the viewport hint
/// feeding the column policy; absent means unmeasured (desktop rules).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQueryParams {
    pub page: Option<u32>,
    pub q: Option<String>,
    pub favorites: Option<String>,
    pub width: Option<u32>,
}

impl ListingQueryParams {
    fn requested_page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    fn favorites_only(&self) -> bool {
        self.favorites
            .as_deref()
            .map(|raw| matches!(raw, "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveCoinRequest {
    #[serde(rename = "coinId")]
    pub coin_id: String,
}

pub fn listing_router(state: ListingAppState) -> Router {
    Router::new()
        .route("/", get(get_coins_html))
        .route("/coins/snapshot", get(get_coins_snapshot))
        .route("/coins/{symbol}", get(get_coin_detail_html))
        .route("/exchanges", get(get_exchanges_html))
        .route("/exchanges/snapshot", get(get_exchanges_snapshot))
        .route("/news", get(get_news_html))
        .route("/news/snapshot", get(get_news_snapshot))
        .route("/watchlist/remove", post(post_watchlist_remove))
        .with_state(state)
}

fn session_for(
    kind: ListingKind,
    prefs: &Arc<dyn PreferenceStore>,
    params: &ListingQueryParams,
) -> TableSession {
    let mut session = TableSession::new(kind, Arc::clone(prefs));
    if let Some(width) = params.width {
        session.set_viewport_width(width);
    }
    session.set_search(params.q.as_deref().unwrap_or(""));
    session.set_favorites_only(params.favorites_only());
    session
}

async fn coins_view(
    state: &ListingAppState,
    params: &ListingQueryParams,
) -> (TableSession, TableView<CoinMarketRow>) {
    let requested_page = params.requested_page();
    let source = Arc::clone(&state.coins);
    let snapshot =
        tokio::task::spawn_blocking(move || source.page(requested_page.saturating_sub(1)))
            .await
            .unwrap_or_default();

    let pinned = state.spotlight.snapshot();
    let page_rows = without_pinned(snapshot.page_rows, &pinned.coin);

    let session = session_for(ListingKind::Coins, &state.prefs, params);
    let universe = if snapshot.universe.is_empty() {
        None
    } else {
        Some(snapshot.universe.as_slice())
    };
    let view = session.plan(&page_rows, universe, requested_page, snapshot.total_pages);
    (session, view)
}

async fn exchanges_view(
    state: &ListingAppState,
    params: &ListingQueryParams,
) -> (TableSession, TableView<ExchangeRow>) {
    let requested_page = params.requested_page();
    let source = Arc::clone(&state.exchanges);
    let all = tokio::task::spawn_blocking(move || source.all())
        .await
        .unwrap_or_default();

    // The exchange endpoint has no upstream pagination; the server page
    // is cut locally the same way the upstream would.
    let start = (requested_page.saturating_sub(1) as usize).saturating_mul(PAGE_SIZE);
    let page_rows: Vec<ExchangeRow> = all.iter().skip(start).take(PAGE_SIZE).cloned().collect();
    let total_pages = pages_for_count(all.len() as u32, PAGE_SIZE as u32);

    let session = session_for(ListingKind::Exchanges, &state.prefs, params);
    let universe = if all.is_empty() { None } else { Some(all.as_slice()) };
    let view = session.plan(&page_rows, universe, requested_page, total_pages);
    (session, view)
}

async fn get_coins_html(
    State(state): State<ListingAppState>,
    Query(params): Query<ListingQueryParams>,
) -> impl IntoResponse {
    let (session, view) = coins_view(&state, &params).await;
    let spotlight = state.spotlight.snapshot();
    let theme = load_theme(state.prefs.as_ref()).unwrap_or(Theme::Light);
    Html(render_coins_html(&view, &session, &spotlight, &params, theme))
}

async fn get_coins_snapshot(
    State(state): State<ListingAppState>,
    Query(params): Query<ListingQueryParams>,
) -> impl IntoResponse {
    let (_, view) = coins_view(&state, &params).await;
    info!(
        component = "listing",
        event = "http.snapshot.request",
        listing = "coins",
        page = params.requested_page(),
        rows = view.rows.len()
    );
    Json(view)
}

async fn get_exchanges_html(
    State(state): State<ListingAppState>,
    Query(params): Query<ListingQueryParams>,
) -> impl IntoResponse {
    let (session, view) = exchanges_view(&state, &params).await;
    let theme = load_theme(state.prefs.as_ref()).unwrap_or(Theme::Light);
    Html(render_exchanges_html(&view, &session, &params, theme))
}

async fn get_exchanges_snapshot(
    State(state): State<ListingAppState>,
    Query(params): Query<ListingQueryParams>,
) -> impl IntoResponse {
    let (_, view) = exchanges_view(&state, &params).await;
    info!(
        component = "listing",
        event = "http.snapshot.request",
        listing = "exchanges",
        page = params.requested_page(),
        rows = view.rows.len()
    );
    Json(view)
}

async fn get_coin_detail_html(
    State(state): State<ListingAppState>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    let detail = Arc::clone(&state.detail);
    let fetch_symbol = symbol.clone();
    let (quote, history) = tokio::task::spawn_blocking(move || {
        (detail.quote(&fetch_symbol), detail.history(&fetch_symbol))
    })
    .await
    .unwrap_or_default();

    let theme = load_theme(state.prefs.as_ref()).unwrap_or(Theme::Light);
    Html(render_coin_detail_html(&symbol, &quote, &history, theme))
}

async fn get_news_html(State(state): State<ListingAppState>) -> impl IntoResponse {
    let source = Arc::clone(&state.news);
    let articles = tokio::task::spawn_blocking(move || source.latest())
        .await
        .unwrap_or_default();
    let theme = load_theme(state.prefs.as_ref()).unwrap_or(Theme::Light);
    Html(render_news_html(&articles, theme))
}

async fn get_news_snapshot(State(state): State<ListingAppState>) -> impl IntoResponse {
    let source = Arc::clone(&state.news);
    let articles = tokio::task::spawn_blocking(move || source.latest())
        .await
        .unwrap_or_default();
    Json(articles)
}

async fn post_watchlist_remove(
    State(state): State<ListingAppState>,
    Json(request): Json<RemoveCoinRequest>,
) -> Response {
    let mut session = TableSession::new(ListingKind::Coins, Arc::clone(&state.prefs));
    if session.remove_favorite(&request.coin_id) {
        Json(json!({ "coinIds": session.favorites() })).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Couldn't find coin in watchlist" })),
        )
            .into_response()
    }
}

/// Drops the pinned spotlight coin from the table rows, matching by
/// symbol or full name like the upstream page does.
pub fn without_pinned(rows: Vec<CoinMarketRow>, pinned: &CoinInfo) -> Vec<CoinMarketRow> {
    let symbol = pinned.name.to_lowercase();
    let full = pinned.full_name.to_lowercase();
    rows.into_iter()
        .filter(|row| {
            let name = row.coin_info.name.to_lowercase();
            let full_name = row.coin_info.full_name.to_lowercase();
            name != symbol && !(!full.is_empty() && full_name.contains(&full))
        })
        .collect()
}

// ---------------------------------------------------------------------
// HTML rendering
// ---------------------------------------------------------------------

fn render_coins_html(
    view: &TableView<CoinMarketRow>,
    session: &TableSession,
    spotlight: &SpotlightSnapshot,
    params: &ListingQueryParams,
    theme: Theme,
) -> String {
    let mut body = String::new();
    push_spotlight_row(&mut body, spotlight);
    push_search_controls(&mut body, "/", params);
    push_pagination(&mut body, "/", view.total_pages, params);

    body.push_str("<section class=\"card\"><table id=\"coins-table\">\n<thead><tr>");
    for col in &view.columns {
        body.push_str("<th>");
        body.push_str(&escape_html(col.label));
        body.push_str("</th>");
    }
    body.push_str("</tr></thead><tbody>\n");

    for row in &view.rows {
        let coin = &row.entity;
        let quote = coin.quote();
        body.push_str("<tr>");
        for col in &view.columns {
            match col.id {
                "favorite" => {
                    let marker = if session.is_favorite(&coin.coin_info.id) {
                        "★"
                    } else {
                        "☆"
                    };
                    body.push_str(&format!("<td class=\"fav\">{marker}</td>"));
                }
                "index" => body.push_str(&format!("<td class=\"num\">{}</td>", row.ordinal)),
                "name" => {
                    body.push_str("<td><a href=\"/coins/");
                    body.push_str(&escape_html(&coin.coin_info.name));
                    body.push_str("\">");
                    body.push_str(&escape_html(&coin.coin_info.full_name));
                    body.push_str(" <span class=\"sym\">");
                    body.push_str(&escape_html(&coin.coin_info.name));
                    body.push_str("</span></a></td>");
                }
                "price" => push_text_cell(&mut body, &quote.price),
                "hour1Change" => push_text_cell(&mut body, &quote.change_pct_hour),
                "hour24Change" => push_text_cell(&mut body, &quote.change_pct_24h),
                "marketCap" => push_text_cell(&mut body, &quote.market_cap),
                "volume24" => push_text_cell(&mut body, &quote.volume_24h),
                "supply" => push_text_cell(&mut body, &quote.supply),
                "last7Days" => {
                    body.push_str(&format!(
                        "<td><img src=\"https://images.cryptocompare.com/sparkchart/{}/USD/latest.png\" alt=\"\" height=\"35\" width=\"150\"></td>",
                        escape_html(&coin.coin_info.name)
                    ));
                }
                _ => body.push_str("<td></td>"),
            }
        }
        body.push_str("</tr>\n");
    }

    body.push_str("</tbody></table></section>\n");
    push_pagination(&mut body, "/", view.total_pages, params);
    page_shell("Coins", theme, &body)
}

fn render_exchanges_html(
    view: &TableView<ExchangeRow>,
    session: &TableSession,
    params: &ListingQueryParams,
    theme: Theme,
) -> String {
    let mut body = String::new();
    body.push_str("<h1>Exchanges List</h1>\n");
    push_search_controls(&mut body, "/exchanges", params);
    push_pagination(&mut body, "/exchanges", view.total_pages, params);

    body.push_str("<section class=\"card\"><table id=\"exchanges-table\">\n<thead><tr>");
    for col in &view.columns {
        body.push_str("<th>");
        body.push_str(&escape_html(col.label));
        body.push_str("</th>");
    }
    body.push_str("</tr></thead><tbody>\n");

    for row in &view.rows {
        let exchange = &row.entity;
        body.push_str("<tr>");
        for col in &view.columns {
            match col.id {
                "favorite" => {
                    let marker = if session.is_favorite(&exchange.id) { "★" } else { "☆" };
                    body.push_str(&format!("<td class=\"fav\">{marker}</td>"));
                }
                "index" => body.push_str(&format!("<td class=\"num\">{}</td>", row.ordinal)),
                "name" => push_text_cell(&mut body, &exchange.name),
                "country" => push_text_cell(&mut body, &exchange.country),
                "grade" => push_text_cell(&mut body, &exchange.grade),
                "gradePoints" => {
                    body.push_str(&format!("<td class=\"num\">{}</td>", exchange.grade_points));
                }
                "affiliateUrl" => {
                    if exchange.affiliate_url.is_empty() {
                        body.push_str("<td>—</td>");
                    } else {
                        body.push_str("<td><a class=\"visit-btn\" target=\"_blank\" rel=\"noopener noreferrer\" href=\"");
                        body.push_str(&escape_html(&exchange.affiliate_url));
                        body.push_str("\">Visit Exchange</a></td>");
                    }
                }
                _ => body.push_str("<td></td>"),
            }
        }
        body.push_str("</tr>\n");
    }

    body.push_str("</tbody></table></section>\n");
    push_pagination(&mut body, "/exchanges", view.total_pages, params);
    page_shell("Exchanges", theme, &body)
}

fn render_coin_detail_html(
    symbol: &str,
    quote: &QuoteDisplay,
    history: &[HistoryPoint],
    theme: Theme,
) -> String {
    let display_symbol = symbol.to_uppercase();
    let mut body = String::new();

    if *quote == QuoteDisplay::default() && history.is_empty() {
        body.push_str("<h1>Coin not found</h1>\n<p class=\"empty\">No data for \"");
        body.push_str(&escape_html(&display_symbol));
        body.push_str("\". <a href=\"/\">Back to all coins</a>.</p>\n");
        return page_shell(&display_symbol, theme, &body);
    }

    body.push_str("<h1>");
    body.push_str(&escape_html(&display_symbol));
    if !quote.price.is_empty() {
        body.push_str(" <span class=\"sym\">");
        body.push_str(&escape_html(&quote.price));
        body.push_str("</span>");
    }
    body.push_str("</h1>\n");

    body.push_str("<section class=\"card\"><table><tbody>");
    for (label, value) in [
        ("Price", &quote.price),
        ("1h%", &quote.change_pct_hour),
        ("24h%", &quote.change_pct_24h),
        ("Market Cap", &quote.market_cap),
        ("Volume(24h)", &quote.volume_24h),
        ("Circulating Supply", &quote.supply),
    ] {
        body.push_str("<tr><th>");
        body.push_str(label);
        body.push_str("</th>");
        push_text_cell(&mut body, value);
        body.push_str("</tr>");
    }
    body.push_str("</tbody></table></section>\n");

    if !history.is_empty() {
        body.push_str("<h2>Last 24 Hours</h2>\n<section class=\"card\"><table id=\"history-table\">");
        body.push_str("<thead><tr><th>Time</th><th>Open</th><th>High</th><th>Low</th><th>Close</th></tr></thead><tbody>");
        for point in history {
            body.push_str(&format!(
                "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
                format_published(point.time),
                point.open,
                point.high,
                point.low,
                point.close
            ));
        }
        body.push_str("</tbody></table></section>\n");
    }

    page_shell(&display_symbol, theme, &body)
}

fn render_news_html(articles: &[NewsArticle], theme: Theme) -> String {
    let mut body = String::new();
    body.push_str("<h1>Latest Crypto News</h1>\n");
    if articles.is_empty() {
        body.push_str("<p class=\"empty\">No news right now. Try again in a moment.</p>\n");
    }
    for article in articles {
        body.push_str("<article class=\"card news\"><h2><a target=\"_blank\" rel=\"noopener noreferrer\" href=\"");
        body.push_str(&escape_html(&article.url));
        body.push_str("\">");
        body.push_str(&escape_html(&article.title));
        body.push_str("</a></h2><p class=\"meta\">");
        body.push_str(&escape_html(&article.source));
        let published = format_published(article.published_on);
        if !published.is_empty() {
            body.push_str(" · ");
            body.push_str(&published);
        }
        body.push_str("</p><p>");
        body.push_str(&escape_html(&preview(&article.body)));
        body.push_str("</p></article>\n");
    }
    page_shell("News", theme, &body)
}

fn format_published(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|published| published.format("%b %e, %Y %H:%M UTC").to_string())
        .unwrap_or_default()
}

fn preview(body: &str) -> String {
    const PREVIEW_CHARS: usize = 220;
    if body.chars().count() <= PREVIEW_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}

fn push_spotlight_row(out: &mut String, spotlight: &SpotlightSnapshot) {
    out.push_str("<section class=\"spotlight\"><table><tbody><tr>");
    out.push_str("<td class=\"fav\">♥</td><td><a href=\"/coins/");
    out.push_str(&escape_html(&spotlight.coin.name));
    out.push_str("\">");
    out.push_str(&escape_html(&spotlight.coin.full_name));
    out.push_str(" <span class=\"sym\">");
    out.push_str(&escape_html(&spotlight.coin.name));
    out.push_str("</span></a></td>");
    for value in [
        &spotlight.quote.price,
        &spotlight.quote.change_pct_hour,
        &spotlight.quote.change_pct_24h,
        &spotlight.quote.market_cap,
        &spotlight.quote.volume_24h,
        &spotlight.quote.supply,
    ] {
        push_text_cell(out, value);
    }
    out.push_str("</tr></tbody></table></section>\n");
}

fn push_search_controls(out: &mut String, base: &str, params: &ListingQueryParams) {
    out.push_str("<form class=\"search\" method=\"get\" action=\"");
    out.push_str(base);
    out.push_str("\"><input type=\"text\" name=\"q\" placeholder=\"Search by name...\" value=\"");
    out.push_str(&escape_html(params.q.as_deref().unwrap_or("")));
    out.push_str("\"><button type=\"submit\">Search</button></form>\n");

    let (label, class, target) = if params.favorites_only() {
        ("My Favorite", "fav-toggle on", base.to_string())
    } else {
        ("My Favorite", "fav-toggle", format!("{base}?favorites=1"))
    };
    out.push_str(&format!(
        "<a class=\"{class}\" href=\"{}\">{label}</a>\n",
        escape_html(&target)
    ));
}

fn push_pagination(out: &mut String, base: &str, total_pages: u32, params: &ListingQueryParams) {
    out.push_str("<nav class=\"pagination\">");
    let current = params.requested_page();
    for page in 1..=total_pages {
        let class = if page == current { "page current" } else { "page" };
        out.push_str(&format!(
            "<a class=\"{class}\" href=\"{}\">{page}</a>",
            escape_html(&page_href(base, page, params))
        ));
    }
    out.push_str("</nav>\n");
}

/// Builds a pagination link preserving the other URL state. Page 1 drops
/// the `page` parameter entirely.
fn page_href(base: &str, page: u32, params: &ListingQueryParams) -> String {
    let mut query: Vec<String> = Vec::new();
    if page > 1 {
        query.push(format!("page={page}"));
    }
    if let Some(q) = params.q.as_deref() {
        if !q.is_empty() {
            query.push(format!("q={q}"));
        }
    }
    if params.favorites_only() {
        query.push("favorites=1".to_string());
    }
    if let Some(width) = params.width {
        query.push(format!("width={width}"));
    }
    if query.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", query.join("&"))
    }
}

fn push_text_cell(out: &mut String, value: &str) {
    if value.is_empty() {
        out.push_str("<td>—</td>");
    } else {
        out.push_str("<td>");
        out.push_str(&escape_html(value));
        out.push_str("</td>");
    }
}

fn page_shell(title: &str, theme: Theme, body: &str) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html data-theme=\"");
    out.push_str(theme.as_str());
    out.push_str("\"><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str(&format!("<title>Coinboard — {}</title>\n", escape_html(title)));
    out.push_str("<style>:root{--bg:#ffffff;--ink:#1a2026;--line:#d7dce1;--accent:#2563eb}[data-theme=dark]{--bg:#14181d;--ink:#e8edf2;--line:#2c343c;--accent:#60a5fa}body{margin:0;background:var(--bg);color:var(--ink);font-family:\"Segoe UI\",sans-serif}main{max-width:1200px;margin:0 auto;padding:16px}table{width:100%;border-collapse:collapse}th,td{padding:8px 10px;border-bottom:1px solid var(--line);text-align:left}th{text-transform:uppercase;font-size:.8rem}.num{text-align:right}.fav{text-align:center;color:#eab308}.sym{color:#6b7280}.pagination{display:flex;gap:6px;justify-content:center;margin:12px 0}.page{padding:4px 9px;border:1px solid var(--line);border-radius:6px;text-decoration:none;color:var(--ink)}.page.current{background:var(--accent);color:#fff}.search{display:inline-flex;gap:8px;margin:12px 0}.fav-toggle{margin-left:10px}.fav-toggle.on{font-weight:700}.spotlight{margin:12px 0;border:1px solid var(--line);border-radius:8px}.visit-btn{color:var(--accent)}</style>\n");
    out.push_str("</head><body><main>\n");
    out.push_str(body);
    out.push_str("</main></body></html>\n");
    out
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// ---------------------------------------------------------------------
// Demo fixtures
// ---------------------------------------------------------------------

pub fn demo_coins() -> Vec<CoinMarketRow> {
    let coins = [
        ("1182", "BTC", "Bitcoin", "$ 93,241.1", "$ 1,845.2 B"),
        ("7605", "ETH", "Ethereum", "$ 3,312.6", "$ 398.5 B"),
        ("3808", "LTC", "Litecoin", "$ 104.55", "$ 7.9 B"),
        ("5031", "XRP", "XRP", "$ 2.19", "$ 125.3 B"),
        ("934443", "SOL", "Solana", "$ 186.40", "$ 90.1 B"),
        ("204788", "ADA", "Cardano", "$ 0.742", "$ 26.7 B"),
    ];
    coins
        .iter()
        .map(|(id, name, full_name, price, market_cap)| CoinMarketRow {
            coin_info: CoinInfo {
                id: id.to_string(),
                name: name.to_string(),
                full_name: full_name.to_string(),
                image_url: format!("/media/demo/{}.png", name.to_lowercase()),
            },
            display: Some(DisplayQuotes {
                usd: QuoteDisplay {
                    price: price.to_string(),
                    market_cap: market_cap.to_string(),
                    ..QuoteDisplay::default()
                },
            }),
        })
        .collect()
}

pub fn demo_exchanges() -> Vec<ExchangeRow> {
    vec![
        ExchangeRow {
            id: "2431".to_string(),
            name: "Bitstamp".to_string(),
            image_url: "/media/37748052/bitstamp.png".to_string(),
            country: "United Kingdom".to_string(),
            grade: "AA".to_string(),
            grade_points: 83.3,
            affiliate_url: "https://www.bitstamp.net/".to_string(),
        },
        ExchangeRow {
            id: "2434".to_string(),
            name: "Kraken".to_string(),
            image_url: String::new(),
            country: "United States".to_string(),
            grade: "AA".to_string(),
            grade_points: 82.1,
            affiliate_url: String::new(),
        },
        ExchangeRow {
            id: "9901".to_string(),
            name: "Coinwharf".to_string(),
            image_url: String::new(),
            country: String::new(),
            grade: String::new(),
            grade_points: 0.0,
            affiliate_url: String::new(),
        },
    ]
}

pub fn demo_articles() -> Vec<NewsArticle> {
    vec![
        NewsArticle {
            id: "1".to_string(),
            title: "Bitcoin holds above its weekly range".to_string(),
            url: "https://example.com/news/1".to_string(),
            source: "demo".to_string(),
            published_on: 1_755_900_000,
            ..NewsArticle::default()
        },
        NewsArticle {
            id: "2".to_string(),
            title: "Exchange volumes pick up across majors".to_string(),
            url: "https://example.com/news/2".to_string(),
            source: "demo".to_string(),
            published_on: 1_755_903_600,
            ..NewsArticle::default()
        },
    ]
}

pub fn demo_spotlight() -> SpotlightSnapshot {
    let rows = demo_coins();
    let litecoin = rows
        .iter()
        .find(|row| row.coin_info.name == "LTC")
        .cloned()
        .unwrap_or_else(|| rows[0].clone());
    SpotlightSnapshot {
        quote: litecoin.quote(),
        coin: litecoin.coin_info,
    }
}

/// Fully in-memory application state for demo mode and router tests.
pub fn demo_state(prefs: Arc<dyn PreferenceStore>) -> ListingAppState {
    ListingAppState {
        coins: Arc::new(InMemoryCoinListingSource::demo()),
        exchanges: Arc::new(InMemoryExchangeListingSource::demo()),
        detail: Arc::new(InMemoryCoinDetailSource::demo()),
        news: Arc::new(InMemoryNewsSource::demo()),
        spotlight: Arc::new(crate::spotlight::FixedSpotlightSource::new(demo_spotlight())),
        prefs,
    }
}
