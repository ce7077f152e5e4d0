use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use coinboard::{
    CoinInfo, MarketApiError, PollingSpotlightSource, QuoteDisplay, SpotlightSnapshot,
    SpotlightSource,
};

fn initial(price: &str) -> SpotlightSnapshot {
    SpotlightSnapshot {
        coin: CoinInfo {
            id: "3808".to_string(),
            name: "LTC".to_string(),
            full_name: "Litecoin".to_string(),
            image_url: String::new(),
        },
        quote: QuoteDisplay {
            price: price.to_string(),
            ..QuoteDisplay::default()
        },
    }
}

fn fetch_error() -> MarketApiError {
    MarketApiError::HttpRequest {
        url: "http://test.invalid".to_string(),
        message: "offline".to_string(),
    }
}

#[tokio::test]
async fn first_refresh_fires_without_waiting_a_full_interval() {
    let source = PollingSpotlightSource::spawn(
        initial("$ 0.00"),
        Duration::from_secs(3600),
        || {
            Ok(QuoteDisplay {
                price: "$ 104.55".to_string(),
                ..QuoteDisplay::default()
            })
        },
    );

    // Only the immediate first tick can have run; the next is an hour out.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(source.snapshot().quote.price, "$ 104.55");
    assert_eq!(source.snapshot().coin.name, "LTC");
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot_and_ticker() {
    let calls = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&calls);

    let source =
        PollingSpotlightSource::spawn(initial("$ 103.90"), Duration::from_millis(20), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(fetch_error())
        });

    tokio::time::sleep(Duration::from_millis(300)).await;

    // Several failed fetches later the initial quote still stands.
    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(source.snapshot().quote.price, "$ 103.90");
}

#[tokio::test]
async fn refresh_overwrites_quote_but_not_coin_identity() {
    let calls = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&calls);

    let source =
        PollingSpotlightSource::spawn(initial("$ 1.00"), Duration::from_millis(20), move || {
            let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(QuoteDisplay {
                price: format!("$ {n}.00"),
                ..QuoteDisplay::default()
            })
        });

    tokio::time::sleep(Duration::from_millis(300)).await;

    let snapshot = source.snapshot();
    assert_ne!(snapshot.quote.price, "$ 1.00");
    assert_eq!(snapshot.coin.full_name, "Litecoin");
}

#[tokio::test]
async fn dropping_the_source_stops_the_refresh_task() {
    let calls = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&calls);

    let source =
        PollingSpotlightSource::spawn(initial("$ 1.00"), Duration::from_millis(20), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(QuoteDisplay::default())
        });

    tokio::time::sleep(Duration::from_millis(150)).await;
    drop(source);

    // Let any in-flight fetch drain, then confirm the counter has settled.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), settled);
}
