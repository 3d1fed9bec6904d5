use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    AddWatchRequest, Coin, CoinDetail, CoinId, ErrorBody, LoginRequest, LoginResponse,
    PricePoint, RawPricePoint, RegisterRequest, SessionResponse, User, WatchlistEntry,
};

const USER_AGENT: &str = "coinwatch/0.1";

/// Typed access to the watchlist backend. Cloning is cheap and clones share
/// the bearer token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(config: &Config) -> ClientResult<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: config.api_url.clone(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // ---- auth ----

    /// POST /login. Every rejection is an auth failure.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<LoginResponse> {
        let resp = self
            .http
            .post(self.url("/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        if !resp.status().is_success() {
            let message = error_message(resp)
                .await
                .unwrap_or_else(|| "Login failed".to_string());
            return Err(ClientError::Auth(message));
        }
        decode(resp, "login").await
    }

    /// POST /logout with an explicit credential, since the caller clears
    /// its own copy before the request goes out.
    pub async fn logout(&self, token: Option<&str>) -> ClientResult<()> {
        let mut request = self.http.post(self.url("/logout"));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;
        expect_success(resp, "Logout failed").await
    }

    /// GET /check-session
    pub async fn check_session(&self) -> ClientResult<User> {
        if self.token().is_none() {
            return Err(ClientError::Auth("No token found".to_string()));
        }
        let resp = self
            .authed(self.http.get(self.url("/check-session")))
            .send()
            .await?;
        let resp = ensure_success(resp, "Session expired").await?;
        let body: SessionResponse = decode(resp, "session").await?;
        Ok(body.user)
    }

    /// POST /register
    pub async fn register(&self, username: &str, email: &str, password: &str) -> ClientResult<()> {
        let resp = self
            .http
            .post(self.url("/register"))
            .json(&RegisterRequest {
                username,
                email,
                password,
            })
            .send()
            .await?;
        expect_success(resp, "Registration failed").await
    }

    // ---- catalog ----

    /// GET /cryptocurrencies. Coins the client cannot read are skipped.
    pub async fn list_coins(&self) -> ClientResult<Vec<Coin>> {
        tracing::debug!("GET /cryptocurrencies");
        let resp = self.http.get(self.url("/cryptocurrencies")).send().await?;
        let resp = ensure_success(resp, "Failed to fetch data from backend").await?;
        let raw: Option<Vec<serde_json::Value>> = decode(resp, "coin list").await?;

        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<Coin>(v) {
                Ok(coin) => Some(coin),
                Err(e) => {
                    tracing::debug!("Skipping unreadable coin: {e}");
                    None
                }
            })
            .collect())
    }

    /// GET /cryptocurrencies/:id
    pub async fn coin(&self, id: CoinId) -> ClientResult<CoinDetail> {
        tracing::debug!("GET /cryptocurrencies/{id}");
        let resp = self
            .http
            .get(self.url(&format!("/cryptocurrencies/{id}")))
            .send()
            .await?;
        let resp = ensure_success(resp, "Failed to load coin").await?;
        decode(resp, "coin detail").await
    }

    /// GET /price-history/:id, sorted oldest first. Entries the client
    /// cannot read are skipped.
    pub async fn price_history(&self, id: CoinId, currency: &str) -> ClientResult<Vec<PricePoint>> {
        tracing::debug!("GET /price-history/{id} ({currency})");
        let resp = self
            .http
            .get(self.url(&format!("/price-history/{id}")))
            .query(&[("currency", currency)])
            .send()
            .await?;
        let resp = ensure_success(resp, "Failed to load price history").await?;
        let raw: Option<Vec<serde_json::Value>> = decode(resp, "price history").await?;

        let mut points: Vec<PricePoint> = raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| serde_json::from_value::<RawPricePoint>(v).ok())
            .filter_map(RawPricePoint::into_point)
            .collect();
        points.sort_by_key(|p| p.recorded_at);
        Ok(points)
    }

    // ---- watchlist ----

    /// GET /user-cryptocurrencies
    pub async fn watchlist(&self) -> ClientResult<Vec<WatchlistEntry>> {
        tracing::debug!("GET /user-cryptocurrencies");
        let resp = self
            .authed(self.http.get(self.url("/user-cryptocurrencies")))
            .send()
            .await?;
        let resp = ensure_success(resp, "Failed to fetch watchlist").await?;
        let entries: Option<Vec<WatchlistEntry>> = decode(resp, "watchlist").await?;
        Ok(entries.unwrap_or_default())
    }

    /// POST /user-cryptocurrencies
    pub async fn add_watch(&self, id: CoinId, alert_price: &str) -> ClientResult<()> {
        tracing::debug!("POST /user-cryptocurrencies crypto_id={id}");
        let resp = self
            .authed(self.http.post(self.url("/user-cryptocurrencies")))
            .json(&AddWatchRequest {
                crypto_id: id,
                alert_price,
            })
            .send()
            .await?;
        expect_success(resp, "Failed to add to watchlist.").await
    }

    /// DELETE /user-cryptocurrencies/:id
    pub async fn remove_watch(&self, id: CoinId) -> ClientResult<()> {
        tracing::debug!("DELETE /user-cryptocurrencies/{id}");
        let resp = self
            .authed(self.http.delete(self.url(&format!("/user-cryptocurrencies/{id}"))))
            .send()
            .await?;
        expect_success(resp, "Failed to remove from watchlist.").await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> ClientResult<T> {
    resp.json::<T>()
        .await
        .map_err(|e| ClientError::Decode(format!("{what} parse failed: {e}")))
}

async fn error_message(resp: Response) -> Option<String> {
    resp.json::<ErrorBody>().await.ok().and_then(ErrorBody::into_message)
}

/// Passes 2xx responses through; turns anything else into an error that
/// keeps the server's message when it sent one.
async fn ensure_success(resp: Response, fallback: &str) -> ClientResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = error_message(resp)
        .await
        .unwrap_or_else(|| fallback.to_string());
    tracing::debug!("Request rejected with {status}: {message}");
    if status == StatusCode::UNAUTHORIZED {
        Err(ClientError::Auth(message))
    } else {
        Err(ClientError::Server { status, message })
    }
}

async fn expect_success(resp: Response, fallback: &str) -> ClientResult<()> {
    ensure_success(resp, fallback).await.map(|_| ())
}
