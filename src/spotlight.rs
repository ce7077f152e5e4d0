//! Pinned-asset spotlight: one highlighted coin whose live quote is
//! refreshed on a fixed interval, independent of the listing tables.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::market::{CoinInfo, MarketApiError, QuoteDisplay};

/// Observed upstream refresh cadence for the highlighted asset.
pub const SPOTLIGHT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SpotlightSnapshot {
    pub coin: CoinInfo,
    pub quote: QuoteDisplay,
}

pub trait SpotlightSource: Send + Sync + 'static {
    fn snapshot(&self) -> SpotlightSnapshot;
}

/// Static snapshot for demo mode and tests.
pub struct FixedSpotlightSource {
    snapshot: SpotlightSnapshot,
}

impl FixedSpotlightSource {
    pub fn new(snapshot: SpotlightSnapshot) -> Self {
        Self { snapshot }
    }
}

impl SpotlightSource for FixedSpotlightSource {
    fn snapshot(&self) -> SpotlightSnapshot {
        self.snapshot.clone()
    }
}

/// Refreshes the pinned asset's quote on a fixed interval.
///
/// The caller-supplied initial snapshot is readable immediately; the
/// first refresh fires right away rather than waiting one interval. A
/// failed fetch keeps the previous snapshot and the ticker running.
/// Dropping the source aborts the background task, so no timer outlives
/// its panel.
pub struct PollingSpotlightSource {
    inner: Arc<RwLock<SpotlightSnapshot>>,
    task: tokio::task::JoinHandle<()>,
}

impl PollingSpotlightSource {
    pub fn spawn<F>(initial: SpotlightSnapshot, refresh_interval: Duration, fetch_quote: F) -> Self
    where
        F: Fn() -> Result<QuoteDisplay, MarketApiError> + Send + Sync + 'static,
    {
        let inner = Arc::new(RwLock::new(initial));
        let task = tokio::spawn(refresh_loop(
            Arc::clone(&inner),
            refresh_interval,
            Arc::new(fetch_quote),
        ));
        Self { inner, task }
    }
}

impl SpotlightSource for PollingSpotlightSource {
    fn snapshot(&self) -> SpotlightSnapshot {
        self.inner
            .read()
            .expect("spotlight snapshot lock should not be poisoned")
            .clone()
    }
}

impl Drop for PollingSpotlightSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn refresh_loop<F>(
    inner: Arc<RwLock<SpotlightSnapshot>>,
    refresh_interval: Duration,
    fetch_quote: Arc<F>,
) where
    F: Fn() -> Result<QuoteDisplay, MarketApiError> + Send + Sync + 'static,
{
    // The first tick of a tokio interval completes immediately, which is
    // exactly the refresh-on-mount behavior the panel needs.
    let mut ticker = tokio::time::interval(refresh_interval);

    loop {
        ticker.tick().await;

        let fetch = Arc::clone(&fetch_quote);
        let fetched = tokio::task::spawn_blocking(move || fetch()).await;

        match fetched {
            Ok(Ok(quote)) => {
                let mut guard = inner
                    .write()
                    .expect("spotlight snapshot lock should not be poisoned");
                guard.quote = quote;
                debug!(component = "spotlight", event = "spotlight.refreshed");
            }
            Ok(Err(err)) => {
                warn!(
                    component = "spotlight",
                    event = "spotlight.refresh_failed",
                    error = %err
                );
            }
            Err(err) => {
                warn!(
                    component = "spotlight",
                    event = "spotlight.refresh_panicked",
                    error = %err
                );
            }
        }
    }
}
