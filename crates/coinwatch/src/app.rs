use std::sync::Arc;

use crate::api::ApiClient;
use crate::auth::session::SessionStore;
use crate::auth::token::TokenStore;
use crate::config::Config;
use crate::error::ClientResult;
use crate::models::Currency;
use crate::services::catalog::CatalogFetcher;
use crate::services::watchlist::WatchlistReconciler;

/// The top-level provider. Views get this by reference and go through the
/// stores for every change.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub session: Arc<SessionStore>,
    pub catalog: Arc<CatalogFetcher>,
    pub watchlist: Arc<WatchlistReconciler>,
    pub currency: Currency,
}

impl AppContext {
    pub fn new(config: Config) -> ClientResult<Self> {
        let api = ApiClient::new(&config)?;
        let tokens = TokenStore::new(config.token_path.clone());

        let session = Arc::new(SessionStore::new(api.clone(), tokens));
        let catalog = Arc::new(CatalogFetcher::new(api.clone()));
        let watchlist = Arc::new(WatchlistReconciler::new(api, session.clone()));
        let currency = Currency::from_name(&config.currency);

        Ok(Self {
            config,
            session,
            catalog,
            watchlist,
            currency,
        })
    }

    /// Start-up sequence: session check and catalog load run together, then
    /// the watchlist is fetched for whoever turned out to be logged in.
    pub async fn bootstrap(&self) {
        let (user, coins) = tokio::join!(self.session.check_session(), self.catalog.list_coins());
        tracing::debug!(
            "Bootstrapped: user={:?} coins={}",
            user.as_ref().map(|u| u.username.as_str()),
            coins.len()
        );
        self.watchlist.fetch_watchlist().await;
    }

    /// Loads the catalog and watchlist for a session that is already
    /// resolved, without checking it again.
    pub async fn load_data(&self) {
        let (coins, entries) = tokio::join!(self.catalog.list_coins(), self.watchlist.fetch_watchlist());
        tracing::debug!("Loaded {} coins, {} watched", coins.len(), entries.len());
    }

    pub fn set_currency(&mut self, currency: Currency) {
        self.currency = currency;
    }
}
