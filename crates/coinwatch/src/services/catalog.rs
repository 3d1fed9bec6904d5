use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::api::ApiClient;
use crate::error::ClientResult;
use crate::models::{Coin, CoinDetail, CoinId, Currency, PricePoint};
use crate::sequence::RequestSeq;

#[derive(Debug, Default)]
struct CatalogState {
    coins: Vec<Coin>,
    error: Option<String>,
    in_flight: usize,
}

/// Fetches and caches the coin catalog. Coins are read-only on this side.
#[derive(Debug)]
pub struct CatalogFetcher {
    api: ApiClient,
    state: Mutex<CatalogState>,
    seq: RequestSeq,
}

/// Everything the single-coin page shows.
#[derive(Debug, Clone)]
pub struct CoinPage {
    pub detail: CoinDetail,
    pub history: Vec<PricePoint>,
}

/// Header figures for a price chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub first: f64,
    pub last: f64,
    pub min: f64,
    pub max: f64,
    /// `None` when the series starts at zero.
    pub change_pct: Option<f64>,
}

impl CatalogFetcher {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Mutex::new(CatalogState::default()),
            seq: RequestSeq::new(),
        }
    }

    /// Loads the full catalog. A failure yields an empty list and records the
    /// error instead of returning it.
    pub async fn list_coins(&self) -> Vec<Coin> {
        let ticket = self.seq.next();
        let _loading = self.start_loading();

        let result = self.api.list_coins().await;

        if !self.seq.is_latest(ticket) {
            tracing::debug!("Discarding stale catalog response #{ticket}");
            return self.coins();
        }

        let mut state = self.lock();
        match result {
            Ok(coins) => {
                tracing::debug!("Fetched {} cryptocurrencies", coins.len());
                state.coins = coins;
                state.error = None;
            }
            Err(e) => {
                tracing::warn!("Error fetching cryptocurrencies: {e}");
                state.coins.clear();
                state.error = Some(e.user_message());
            }
        }
        state.coins.clone()
    }

    pub fn coins(&self) -> Vec<Coin> {
        self.lock().coins.clone()
    }

    pub fn find(&self, id: CoinId) -> Option<Coin> {
        self.lock().coins.iter().find(|c| c.id == id).cloned()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().in_flight > 0
    }

    pub async fn get_coin(&self, id: CoinId) -> ClientResult<CoinDetail> {
        self.api.coin(id).await
    }

    pub async fn get_history(&self, id: CoinId, currency: &Currency) -> ClientResult<Vec<PricePoint>> {
        self.api.price_history(id, &currency.name).await
    }

    /// Fetches detail and history side by side. `progress` receives 50 when
    /// the first of the two lands and 100 when both have.
    pub async fn load_coin_page<F>(&self, id: CoinId, currency: &Currency, progress: F) -> ClientResult<CoinPage>
    where
        F: Fn(u8),
    {
        let done = AtomicU8::new(0);
        let report = || progress(done.fetch_add(50, Ordering::SeqCst) + 50);
        progress(0);

        let (detail, history) = tokio::join!(
            async {
                let r = self.get_coin(id).await;
                report();
                r
            },
            async {
                let r = self.get_history(id, currency).await;
                report();
                r
            }
        );

        Ok(CoinPage {
            detail: detail?,
            history: history?,
        })
    }

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_loading(&self) -> LoadingGuard<'_> {
        self.lock().in_flight += 1;
        LoadingGuard { fetcher: self }
    }
}

struct LoadingGuard<'a> {
    fetcher: &'a CatalogFetcher,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.fetcher.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

/// Summarizes a series sorted oldest first.
pub fn history_summary(points: &[PricePoint]) -> Option<HistorySummary> {
    let first = points.first()?;
    let last = points.last()?;
    let (min, max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.price), hi.max(p.price))
        });
    let change_pct = (first.price != 0.0).then(|| (last.price - first.price) / first.price * 100.0);

    Some(HistorySummary {
        start: first.recorded_at,
        end: last.recorded_at,
        first: first.price,
        last: last.price,
        min,
        max,
        change_pct,
    })
}
