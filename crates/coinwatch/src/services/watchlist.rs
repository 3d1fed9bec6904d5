use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::ApiClient;
use crate::auth::session::SessionStore;
use crate::error::{ClientError, ClientResult};
use crate::models::{CoinId, WatchlistEntry};
use crate::sequence::RequestSeq;

#[derive(Debug, Default)]
struct WatchlistState {
    entries: HashMap<CoinId, WatchlistEntry>,
    // user id the cache was loaded for; None means unloaded
    owner: Option<i64>,
    error: Option<String>,
}

/// Local mirror of the logged-in user's watchlist. The server is the only
/// authority: every successful mutation is followed by a full refetch.
#[derive(Debug)]
pub struct WatchlistReconciler {
    api: ApiClient,
    session: Arc<SessionStore>,
    state: Mutex<WatchlistState>,
    seq: RequestSeq,
}

impl WatchlistReconciler {
    pub fn new(api: ApiClient, session: Arc<SessionStore>) -> Self {
        Self {
            api,
            session,
            state: Mutex::new(WatchlistState::default()),
            seq: RequestSeq::new(),
        }
    }

    /// Replaces the cache with the server's list. Anonymous sessions get an
    /// empty list without a request. On failure a cache already loaded for
    /// this user is kept; otherwise the list stays empty.
    pub async fn fetch_watchlist(&self) -> Vec<WatchlistEntry> {
        let ticket = self.seq.next();

        let Some(user) = self.session.user() else {
            let mut state = self.lock();
            *state = WatchlistState::default();
            return Vec::new();
        };

        let result = self.api.watchlist().await;

        if !self.seq.is_latest(ticket) {
            tracing::debug!("Discarding stale watchlist response #{ticket}");
            return self.entries();
        }

        if self.session.user().map(|u| u.id) != Some(user.id) {
            tracing::debug!("Session changed while fetching watchlist; dropping response");
            *self.lock() = WatchlistState::default();
            return Vec::new();
        }

        {
            let mut state = self.lock();
            if state.owner.is_some_and(|owner| owner != user.id) {
                *state = WatchlistState::default();
            }
            match result {
                Ok(entries) => {
                    tracing::debug!("Fetched {} watchlist entries for {}", entries.len(), user.username);
                    state.entries = entries
                        .into_iter()
                        .map(|e| (e.cryptocurrency_id, e))
                        .collect();
                    state.owner = Some(user.id);
                    state.error = None;
                }
                Err(e) => {
                    tracing::warn!("Error fetching watchlist: {e}");
                    state.error = Some(e.user_message());
                }
            }
        }
        self.entries()
    }

    /// Membership by stable coin id, as of the last successful fetch.
    pub fn is_watched(&self, coin_id: CoinId) -> bool {
        self.lock().entries.contains_key(&coin_id)
    }

    pub fn alert_price(&self, coin_id: CoinId) -> Option<f64> {
        self.lock()
            .entries
            .get(&coin_id)
            .and_then(|e| e.alert_price)
    }

    /// Cached entries ordered by coin id.
    pub fn entries(&self) -> Vec<WatchlistEntry> {
        let mut entries: Vec<_> = self.lock().entries.values().cloned().collect();
        entries.sort_by_key(|e| e.cryptocurrency_id);
        entries
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().owner.is_some()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub async fn add(&self, coin_id: CoinId, alert_price: &str) -> ClientResult<()> {
        let alert_price = alert_price.trim();
        if alert_price.is_empty() {
            return Err(ClientError::Validation("You need to enter a value!".to_string()));
        }
        self.require_user()?;

        self.api.add_watch(coin_id, alert_price).await?;
        tracing::info!("Added coin {coin_id} to watchlist (alert at {alert_price})");
        self.fetch_watchlist().await;
        Ok(())
    }

    /// Removing an entry the server does not have surfaces its rejection;
    /// the cache is left as is.
    pub async fn remove(&self, coin_id: CoinId) -> ClientResult<()> {
        self.require_user()?;

        self.api.remove_watch(coin_id).await?;
        tracing::info!("Removed coin {coin_id} from watchlist");
        self.fetch_watchlist().await;
        Ok(())
    }

    fn require_user(&self) -> ClientResult<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::Auth("Not logged in".to_string()))
        }
    }

    fn lock(&self) -> MutexGuard<'_, WatchlistState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
