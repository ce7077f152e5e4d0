//! Upstream market-data client (CryptoCompare-shaped REST API).
//!
//! Serde models keep the upstream field names; every field the UI merely
//! displays defaults to empty when the payload is missing it, so a
//! partially shaped response renders as blanks instead of failing.
//! Pagination and payload-flattening logic is separated from transport
//! behind plain fetch closures so it tests without HTTP.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::reconcile::{pages_for_count, ListEntity};

pub const DEFAULT_API_BASE: &str = "https://min-api.cryptocompare.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketApiConfig {
    pub base_url: String,
    pub quote_symbol: String,
    pub page_size: u32,
    pub http_timeout_ms: u64,
}

impl Default for MarketApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            quote_symbol: "USD".to_string(),
            page_size: 100,
            http_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum MarketApiError {
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),
    #[error("HTTP request failed for {url}: {message}")]
    HttpRequest { url: String, message: String },
    #[error("unexpected payload from {url}: {message}")]
    Payload { url: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInfo {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "FullName")]
    pub full_name: String,
    #[serde(rename = "ImageUrl", default)]
    pub image_url: String,
}

/// Pre-formatted display strings for one quote currency, exactly as the
/// upstream sends them (`$93,241.11` style). Never parsed locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDisplay {
    #[serde(rename = "PRICE", default)]
    pub price: String,
    #[serde(rename = "CHANGEPCTHOUR", default)]
    pub change_pct_hour: String,
    #[serde(rename = "CHANGEPCT24HOUR", default)]
    pub change_pct_24h: String,
    #[serde(rename = "MKTCAP", default)]
    pub market_cap: String,
    #[serde(rename = "TOTALVOLUME24HTO", default)]
    pub volume_24h: String,
    #[serde(rename = "SUPPLY", default)]
    pub supply: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayQuotes {
    #[serde(rename = "USD", default)]
    pub usd: QuoteDisplay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinMarketRow {
    #[serde(rename = "CoinInfo")]
    pub coin_info: CoinInfo,
    #[serde(rename = "DISPLAY", default)]
    pub display: Option<DisplayQuotes>,
}

impl CoinMarketRow {
    pub fn quote(&self) -> QuoteDisplay {
        self.display
            .as_ref()
            .map(|display| display.usd.clone())
            .unwrap_or_default()
    }
}

impl ListEntity for CoinMarketRow {
    fn entity_id(&self) -> &str {
        &self.coin_info.id
    }

    fn symbol_name(&self) -> &str {
        &self.coin_info.name
    }

    fn full_name(&self) -> &str {
        &self.coin_info.full_name
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinPageMeta {
    #[serde(rename = "Count", default)]
    pub count: u32,
}

/// One server page of the top-coins listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinPage {
    #[serde(rename = "Data", default)]
    pub data: Vec<CoinMarketRow>,
    #[serde(rename = "MetaData", default)]
    pub meta: CoinPageMeta,
}

impl CoinPage {
    pub fn total_pages(&self, page_size: u32) -> u32 {
        pages_for_count(self.meta.count, page_size)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRow {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub country: String,
    pub grade: String,
    pub grade_points: f64,
    pub affiliate_url: String,
}

impl ListEntity for ExchangeRow {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn symbol_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub published_on: i64,
    #[serde(default)]
    pub imageurl: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub categories: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub open: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
    #[serde(default)]
    pub close: f64,
}

/// Output contract of the headless video-discovery routine. The scraper
/// itself lives outside this crate; only its result shape is relied on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoItem {
    pub title: String,
    pub watch_link: String,
}

/// Fetches the full cross-page coin universe by exhausting the upstream
/// pagination. The first page must succeed (it carries the total count);
/// a later page failure degrades to the pages gathered so far.
pub fn collect_coin_universe<F>(
    page_size: u32,
    mut fetch_page: F,
) -> Result<Vec<CoinMarketRow>, MarketApiError>
where
    F: FnMut(u32) -> Result<CoinPage, MarketApiError>,
{
    let first = fetch_page(0)?;
    let total_pages = first.total_pages(page_size);
    let mut all = first.data;

    for page in 1..total_pages {
        match fetch_page(page) {
            Ok(next) => all.extend(next.data),
            Err(err) => {
                warn!(
                    component = "market",
                    event = "market.universe.partial",
                    failed_page = page,
                    gathered = all.len(),
                    error = %err
                );
                break;
            }
        }
    }

    Ok(all)
}

/// Flattens the exchange-listing payload (a JSON map of id -> record)
/// into rows with defensive defaults, ordered by grade points descending
/// with name as the tie-break so pagination stays deterministic.
pub fn exchange_rows_from_payload(payload: &Value) -> Vec<ExchangeRow> {
    let Some(entries) = payload.get("Data").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut rows: Vec<ExchangeRow> = entries
        .iter()
        .map(|(key, raw)| ExchangeRow {
            id: str_field(raw, "Id").unwrap_or_else(|| key.clone()),
            name: str_field(raw, "Name")
                .or_else(|| str_field(raw, "InternalName"))
                .unwrap_or_else(|| "Unknown Exchange".to_string()),
            image_url: str_field(raw, "LogoUrl").unwrap_or_default(),
            country: str_field(raw, "Country").unwrap_or_default(),
            grade: str_field(raw, "Grade").unwrap_or_default(),
            grade_points: raw.get("GradePoints").and_then(Value::as_f64).unwrap_or(0.0),
            affiliate_url: str_field(raw, "AffiliateURL").unwrap_or_default(),
        })
        .collect();

    rows.sort_by(|a, b| {
        b.grade_points
            .partial_cmp(&a.grade_points)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

/// Extracts the single-symbol live quote from a `pricemultifull` payload.
/// Missing nesting yields an all-empty quote, not an error.
pub fn quote_from_pricemultifull(payload: &Value, symbol: &str, quote_symbol: &str) -> QuoteDisplay {
    payload
        .get("DISPLAY")
        .and_then(|display| display.get(symbol))
        .and_then(|by_symbol| by_symbol.get(quote_symbol))
        .and_then(|raw| serde_json::from_value(raw.clone()).ok())
        .unwrap_or_default()
}

/// Extracts the ordered `(time, priceFields)` series from a history
/// payload (`Data.Data`). Malformed shapes yield an empty series.
pub fn history_points_from_payload(payload: &Value) -> Vec<HistoryPoint> {
    payload
        .get("Data")
        .and_then(|data| data.get("Data"))
        .and_then(|inner| serde_json::from_value(inner.clone()).ok())
        .unwrap_or_default()
}

/// Extracts the article list from a news payload. Failure shapes yield
/// an empty list.
pub fn articles_from_payload(payload: &Value) -> Vec<NewsArticle> {
    payload
        .get("Data")
        .and_then(|data| serde_json::from_value(data.clone()).ok())
        .unwrap_or_default()
}

fn str_field(raw: &Value, field: &str) -> Option<String> {
    raw.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

/// Blocking HTTP client over the upstream endpoints.
pub struct MarketClient {
    cfg: MarketApiConfig,
    http: reqwest::blocking::Client,
}

impl MarketClient {
    pub fn new(cfg: MarketApiConfig) -> Result<Self, MarketApiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.http_timeout_ms))
            .build()
            .map_err(|err| MarketApiError::HttpClientBuild(err.to_string()))?;
        Ok(Self { cfg, http })
    }

    pub fn config(&self) -> &MarketApiConfig {
        &self.cfg
    }

    /// One server page of the top-coins listing. `page` is 0-based, the
    /// upstream convention.
    pub fn top_coins(&self, page: u32) -> Result<CoinPage, MarketApiError> {
        let url = format!(
            "{}/data/top/totaltoptiervolfull?limit={}&tsym={}&page={}",
            self.cfg.base_url, self.cfg.page_size, self.cfg.quote_symbol, page
        );
        self.get_json_as(&url)
    }

    pub fn all_coins(&self) -> Result<Vec<CoinMarketRow>, MarketApiError> {
        collect_coin_universe(self.cfg.page_size, |page| self.top_coins(page))
    }

    pub fn exchanges(&self) -> Result<Vec<ExchangeRow>, MarketApiError> {
        let url = format!("{}/data/exchanges/general", self.cfg.base_url);
        let payload = self.get_json(&url)?;
        Ok(exchange_rows_from_payload(&payload))
    }

    pub fn live_quote(&self, symbol: &str) -> Result<QuoteDisplay, MarketApiError> {
        let url = format!(
            "{}/data/pricemultifull?fsyms={}&tsyms={}",
            self.cfg.base_url, symbol, self.cfg.quote_symbol
        );
        let payload = self.get_json(&url)?;
        Ok(quote_from_pricemultifull(
            &payload,
            symbol,
            &self.cfg.quote_symbol,
        ))
    }

    /// Minute-resolution history for the detail chart: 10-minute
    /// aggregates covering roughly the last day.
    pub fn minute_history(&self, symbol: &str) -> Result<Vec<HistoryPoint>, MarketApiError> {
        let url = format!(
            "{}/data/v2/histominute?aggregate=10&e=CCCAGG&fsym={}&limit=144&tryConversion=false&tsym={}",
            self.cfg.base_url, symbol, self.cfg.quote_symbol
        );
        let payload = self.get_json(&url)?;
        Ok(history_points_from_payload(&payload))
    }

    pub fn latest_news(&self) -> Result<Vec<NewsArticle>, MarketApiError> {
        let url = format!("{}/data/v2/news/?lang=EN", self.cfg.base_url);
        let payload = self.get_json(&url)?;
        Ok(articles_from_payload(&payload))
    }

    fn get_json(&self, url: &str) -> Result<Value, MarketApiError> {
        debug!(component = "market", event = "market.fetch", url);
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|err| MarketApiError::HttpRequest {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        let response = response
            .error_for_status()
            .map_err(|err| MarketApiError::HttpRequest {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        response.json().map_err(|err| MarketApiError::Payload {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    fn get_json_as<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, MarketApiError> {
        let payload = self.get_json(url)?;
        serde_json::from_value(payload).map_err(|err| MarketApiError::Payload {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_with(count: u32, ids: &[&str]) -> CoinPage {
        CoinPage {
            data: ids
                .iter()
                .map(|id| CoinMarketRow {
                    coin_info: CoinInfo {
                        id: id.to_string(),
                        name: id.to_string(),
                        full_name: format!("Coin {id}"),
                        image_url: String::new(),
                    },
                    display: None,
                })
                .collect(),
            meta: CoinPageMeta { count },
        }
    }

    #[test]
    fn coin_page_parses_upstream_field_names() {
        let payload = json!({
            "Data": [{
                "CoinInfo": {
                    "Id": "1182",
                    "Name": "BTC",
                    "FullName": "Bitcoin",
                    "ImageUrl": "/media/37746251/btc.png"
                },
                "DISPLAY": {
                    "USD": {
                        "PRICE": "$ 93,241.1",
                        "CHANGEPCTHOUR": "0.12",
                        "MKTCAP": "$ 1,845.2 B"
                    }
                }
            }],
            "MetaData": { "Count": 3524 }
        });

        let page: CoinPage = serde_json::from_value(payload).unwrap();
        assert_eq!(page.meta.count, 3524);
        assert_eq!(page.data[0].coin_info.name, "BTC");
        let quote = page.data[0].quote();
        assert_eq!(quote.price, "$ 93,241.1");
        assert_eq!(quote.change_pct_24h, "");
        assert_eq!(page.total_pages(100), 36);
    }

    #[test]
    fn coin_row_without_display_yields_empty_quote() {
        let payload = json!({
            "Data": [{ "CoinInfo": { "Id": "7", "Name": "ETH", "FullName": "Ethereum" } }]
        });
        let page: CoinPage = serde_json::from_value(payload).unwrap();
        assert_eq!(page.data[0].quote(), QuoteDisplay::default());
        assert_eq!(page.meta.count, 0);
    }

    #[test]
    fn universe_collection_exhausts_reported_pages() {
        let mut fetched: Vec<u32> = Vec::new();
        let all = collect_coin_universe(100, |page| {
            fetched.push(page);
            Ok(page_with(250, &[&format!("c{page}")]))
        })
        .unwrap();

        assert_eq!(fetched, vec![0, 1, 2]);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn universe_collection_degrades_on_late_page_failure() {
        let all = collect_coin_universe(100, |page| {
            if page == 2 {
                Err(MarketApiError::HttpRequest {
                    url: "http://x".to_string(),
                    message: "boom".to_string(),
                })
            } else {
                Ok(page_with(350, &[&format!("c{page}")]))
            }
        })
        .unwrap();

        assert_eq!(all.len(), 2);
    }

    #[test]
    fn universe_collection_requires_first_page() {
        let err = collect_coin_universe(100, |_page| {
            Err(MarketApiError::HttpRequest {
                url: "http://x".to_string(),
                message: "down".to_string(),
            })
        })
        .unwrap_err();

        assert!(matches!(err, MarketApiError::HttpRequest { .. }));
    }

    #[test]
    fn exchange_payload_flattens_with_defaults_and_ranking() {
        let payload = json!({
            "Data": {
                "2431": {
                    "Id": "2431",
                    "Name": "Bitstamp",
                    "LogoUrl": "/media/37748052/bitstamp.png",
                    "Country": "United Kingdom",
                    "GradePoints": 83.3,
                    "Grade": "AA",
                    "AffiliateURL": "https://www.bitstamp.net/"
                },
                "9999": { "InternalName": "NoName" },
                "777": {}
            }
        });

        let rows = exchange_rows_from_payload(&payload);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].name, "Bitstamp");
        assert_eq!(rows[0].grade_points, 83.3);
        assert_eq!(rows[1].name, "NoName");
        assert_eq!(rows[1].id, "9999");
        assert_eq!(rows[2].name, "Unknown Exchange");
        assert_eq!(rows[2].id, "777");
    }

    #[test]
    fn exchange_payload_without_data_is_empty() {
        assert!(exchange_rows_from_payload(&json!({})).is_empty());
        assert!(exchange_rows_from_payload(&json!({"Data": [1, 2]})).is_empty());
    }

    #[test]
    fn pricemultifull_quote_extraction_is_defensive() {
        let payload = json!({
            "DISPLAY": {
                "LTC": {
                    "USD": {
                        "PRICE": "$ 104.55",
                        "CHANGEPCT24HOUR": "-1.02",
                        "SUPPLY": "75,1M"
                    }
                }
            }
        });

        let quote = quote_from_pricemultifull(&payload, "LTC", "USD");
        assert_eq!(quote.price, "$ 104.55");
        assert_eq!(quote.change_pct_24h, "-1.02");
        assert_eq!(quote.market_cap, "");

        let empty = quote_from_pricemultifull(&payload, "BTC", "USD");
        assert_eq!(empty, QuoteDisplay::default());
        assert_eq!(quote_from_pricemultifull(&json!(null), "LTC", "USD"), QuoteDisplay::default());
    }

    #[test]
    fn video_item_round_trips_its_contract_shape() {
        let raw = json!({ "title": "Market recap", "watch_link": "https://example.com/w/1" });
        let item: VideoItem = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(item.title, "Market recap");
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn history_and_news_payload_extraction_is_defensive() {
        let history = json!({
            "Data": { "Data": [
                { "time": 1700000000, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5 },
                { "time": 1700000600, "high": 2.5 }
            ]}
        });
        let points = history_points_from_payload(&history);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].time, 1_700_000_000);
        assert_eq!(points[1].open, 0.0);
        assert!(history_points_from_payload(&json!({"Data": 42})).is_empty());

        let news = json!({
            "Data": [{ "id": "1", "title": "Markets move", "published_on": 1700000000 }]
        });
        let articles = articles_from_payload(&news);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Markets move");
        assert!(articles_from_payload(&json!({"Data": "nope"})).is_empty());
    }
}
