//! In-process stand-in for the watchlist backend, serving the same routes
//! and error bodies on an ephemeral local port.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde_json::{json, Value};

use coinwatch::{AppContext, Config};

pub const EMAIL: &str = "alice@example.com";
pub const PASSWORD: &str = "hunter22";

type Reply = (StatusCode, Json<Value>);
type BearerAuth = Option<TypedHeader<Authorization<Bearer>>>;

#[derive(Debug, Clone)]
struct MockUser {
    id: i64,
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Default)]
struct Inner {
    users: Vec<MockUser>,
    tokens: HashMap<String, i64>,
    coins: Vec<Value>,
    details: HashMap<i64, Value>,
    history: HashMap<i64, Value>,
    watch: HashMap<i64, BTreeMap<i64, f64>>,
    hits: HashMap<&'static str, usize>,
    session_delays: VecDeque<Duration>,
    watchlist_delays: VecDeque<Duration>,
    catalog_delays: VecDeque<Duration>,
    fail_catalog: bool,
    fail_watchlist: bool,
    blank_login_failure: bool,
    fail_logout: bool,
}

#[derive(Debug, Clone)]
pub struct MockBackend {
    inner: Arc<Mutex<Inner>>,
    pub url: String,
}

impl MockBackend {
    /// Starts a backend with one registered user and three coins.
    pub async fn start() -> Self {
        let backend = Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            url: String::new(),
        };
        {
            let mut inner = backend.lock();
            inner.users.push(MockUser {
                id: 1,
                username: "alice".into(),
                email: EMAIL.into(),
                password: PASSWORD.into(),
            });
            inner.coins = vec![
                json!({"id": 1, "name": "Bitcoin", "symbol": "btc", "market_price": 64000.5, "market_cap": 1250000000000.0, "logo_url": "https://img/btc.png"}),
                json!({"id": 2, "name": "Ethereum", "symbol": "eth", "market_price": 3100.25, "market_cap": 0.0, "logo_url": null}),
                json!({"id": 3, "name": "Bitcoin Cash", "symbol": "bch", "market_price": "410.10"}),
            ];
        }

        let app = Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/check-session", get(check_session))
            .route("/cryptocurrencies", get(list_coins))
            .route("/cryptocurrencies/{id}", get(coin_detail))
            .route("/price-history/{id}", get(price_history))
            .route("/user-cryptocurrencies", get(list_watch).post(add_watch))
            .route("/user-cryptocurrencies/{id}", delete(remove_watch))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            ..backend
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn context(&self) -> AppContext {
        AppContext::new(Config::for_api(&self.url)).unwrap()
    }

    pub fn hits(&self, route: &str) -> usize {
        self.lock().hits.get(route).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.lock().hits.values().sum()
    }

    pub fn set_coins(&self, coins: Vec<Value>) {
        self.lock().coins = coins;
    }

    pub fn set_detail(&self, id: i64, detail: Value) {
        self.lock().details.insert(id, detail);
    }

    pub fn set_history(&self, id: i64, history: Value) {
        self.lock().history.insert(id, history);
    }

    pub fn add_user(&self, id: i64, username: &str, email: &str, password: &str) {
        self.lock().users.push(MockUser {
            id,
            username: username.into(),
            email: email.into(),
            password: password.into(),
        });
    }

    /// Puts an entry straight into the server-side list.
    pub fn seed_watch(&self, user_id: i64, coin_id: i64, alert_price: f64) {
        self.lock()
            .watch
            .entry(user_id)
            .or_default()
            .insert(coin_id, alert_price);
    }

    pub fn server_watch(&self, user_id: i64) -> Vec<i64> {
        self.lock()
            .watch
            .get(&user_id)
            .map(|w| w.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn revoke_tokens(&self) {
        self.lock().tokens.clear();
    }

    /// Tokens the server would still accept.
    pub fn live_tokens(&self) -> usize {
        self.lock().tokens.len()
    }

    pub fn delay_session_checks(&self, delays: &[Duration]) {
        self.lock().session_delays.extend(delays.iter().copied());
    }

    pub fn delay_watchlist(&self, delays: &[Duration]) {
        self.lock().watchlist_delays.extend(delays.iter().copied());
    }

    pub fn delay_catalog(&self, delays: &[Duration]) {
        self.lock().catalog_delays.extend(delays.iter().copied());
    }

    pub fn fail_catalog(&self, fail: bool) {
        self.lock().fail_catalog = fail;
    }

    pub fn fail_watchlist(&self, fail: bool) {
        self.lock().fail_watchlist = fail;
    }

    pub fn blank_login_failure(&self, blank: bool) {
        self.lock().blank_login_failure = blank;
    }

    pub fn fail_logout(&self, fail: bool) {
        self.lock().fail_logout = fail;
    }

    fn hit(&self, route: &'static str) {
        *self.lock().hits.entry(route).or_default() += 1;
    }

    fn user_for(&self, auth: BearerAuth) -> Result<i64, Reply> {
        let Some(TypedHeader(Authorization(bearer))) = auth else {
            return Err(error(StatusCode::UNAUTHORIZED, "Authorization header missing"));
        };
        self.lock()
            .tokens
            .get(bearer.token())
            .copied()
            .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
    }
}

/// A URL nothing listens on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub async fn logged_in(backend: &MockBackend) -> AppContext {
    let ctx = backend.context();
    ctx.session.login(EMAIL, PASSWORD).await.unwrap();
    ctx
}

fn error(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "error": message })))
}

fn user_json(user: &MockUser) -> Value {
    json!({"id": user.id, "username": user.username, "email": user.email})
}

async fn register(State(backend): State<MockBackend>, Json(body): Json<Value>) -> Reply {
    backend.hit("register");
    let field = |k: &str| body.get(k).and_then(Value::as_str).unwrap_or("").to_string();
    let (username, email, password) = (field("username"), field("email"), field("password"));
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Missing username, email, or password");
    }
    let mut inner = backend.lock();
    if inner.users.iter().any(|u| u.username == username || u.email == email) {
        return error(StatusCode::CONFLICT, "User already exists");
    }
    let id = inner.users.len() as i64 + 1;
    inner.users.push(MockUser {
        id,
        username,
        email,
        password,
    });
    (StatusCode::CREATED, Json(json!({"message": "User registered successfully"})))
}

async fn login(State(backend): State<MockBackend>, Json(body): Json<Value>) -> Reply {
    backend.hit("login");
    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");

    let mut inner = backend.lock();
    let user = inner
        .users
        .iter()
        .find(|u| u.email == email && u.password == password)
        .cloned();
    let Some(user) = user else {
        if inner.blank_login_failure {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})));
        }
        return error(StatusCode::UNAUTHORIZED, "Invalid email or password");
    };
    let token = uuid::Uuid::new_v4().to_string();
    inner.tokens.insert(token.clone(), user.id);
    (
        StatusCode::OK,
        Json(json!({"message": "Login successful", "user": user_json(&user), "token": token})),
    )
}

async fn logout(State(backend): State<MockBackend>, auth: BearerAuth) -> Reply {
    backend.hit("logout");
    if backend.lock().fail_logout {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "boom");
    }
    if let Some(TypedHeader(Authorization(bearer))) = auth {
        backend.lock().tokens.remove(bearer.token());
    }
    (StatusCode::OK, Json(json!({"message": "Logout successful"})))
}

async fn check_session(State(backend): State<MockBackend>, auth: BearerAuth) -> Reply {
    backend.hit("check-session");
    // resolve before any delay so the reply reflects state at arrival
    let reply = match backend.user_for(auth) {
        Ok(id) => {
            let inner = backend.lock();
            let user = inner.users.iter().find(|u| u.id == id).cloned();
            match user {
                Some(user) => (StatusCode::OK, Json(json!({"user": user_json(&user)}))),
                None => error(StatusCode::UNAUTHORIZED, "User not found"),
            }
        }
        Err(reply) => reply,
    };
    let delay = backend.lock().session_delays.pop_front();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    reply
}

async fn list_coins(State(backend): State<MockBackend>) -> Reply {
    backend.hit("cryptocurrencies");
    let (reply, delay) = {
        let mut inner = backend.lock();
        let reply = if inner.fail_catalog {
            error(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable")
        } else {
            (StatusCode::OK, Json(Value::Array(inner.coins.clone())))
        };
        (reply, inner.catalog_delays.pop_front())
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    reply
}

async fn coin_detail(State(backend): State<MockBackend>, Path(id): Path<i64>) -> Reply {
    backend.hit("cryptocurrency");
    let inner = backend.lock();
    if let Some(detail) = inner.details.get(&id) {
        return (StatusCode::OK, Json(detail.clone()));
    }
    match inner.coins.iter().find(|c| c["id"] == json!(id)) {
        Some(coin) => (StatusCode::OK, Json(coin.clone())),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Cryptocurrency not found"})),
        ),
    }
}

async fn price_history(State(backend): State<MockBackend>, Path(id): Path<i64>) -> Reply {
    backend.hit("price-history");
    let history = backend.lock().history.get(&id).cloned();
    (StatusCode::OK, Json(history.unwrap_or_else(|| json!([]))))
}

async fn list_watch(State(backend): State<MockBackend>, auth: BearerAuth) -> Reply {
    backend.hit("user-cryptocurrencies");
    let user_id = match backend.user_for(auth) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let (reply, delay) = {
        let mut inner = backend.lock();
        let reply = if inner.fail_watchlist {
            error(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable")
        } else {
            let entries: Vec<Value> = inner
                .watch
                .get(&user_id)
                .map(|w| {
                    w.iter()
                        .map(|(coin, price)| {
                            json!({"id": coin * 10, "user_id": user_id, "cryptocurrency_id": coin, "alert_price": price})
                        })
                        .collect()
                })
                .unwrap_or_default();
            (StatusCode::OK, Json(Value::Array(entries)))
        };
        (reply, inner.watchlist_delays.pop_front())
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    reply
}

async fn add_watch(State(backend): State<MockBackend>, auth: BearerAuth, Json(body): Json<Value>) -> Reply {
    backend.hit("add-watch");
    let user_id = match backend.user_for(auth) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let crypto_id = body.get("crypto_id").and_then(Value::as_i64);
    let alert_price = body.get("alert_price").and_then(Value::as_str).unwrap_or("");
    let (Some(crypto_id), false) = (crypto_id, alert_price.is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "Missing crypto_id or alert_price");
    };
    let Ok(alert_price) = alert_price.parse::<f64>() else {
        return error(StatusCode::BAD_REQUEST, "Alert price must be a valid number");
    };

    let mut inner = backend.lock();
    let list = inner.watch.entry(user_id).or_default();
    if list.contains_key(&crypto_id) {
        return error(StatusCode::CONFLICT, "Cryptocurrency already in watchlist");
    }
    list.insert(crypto_id, alert_price);
    (
        StatusCode::CREATED,
        Json(json!({"message": "Cryptocurrency added to user watchlist"})),
    )
}

async fn remove_watch(State(backend): State<MockBackend>, auth: BearerAuth, Path(id): Path<i64>) -> Reply {
    backend.hit("remove-watch");
    let user_id = match backend.user_for(auth) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let mut inner = backend.lock();
    let removed = inner
        .watch
        .get_mut(&user_id)
        .and_then(|list| list.remove(&id));
    match removed {
        Some(_) => (
            StatusCode::OK,
            Json(json!({"message": "Cryptocurrency removed from watchlist"})),
        ),
        None => error(StatusCode::NOT_FOUND, "Cryptocurrency not found in your watchlist"),
    }
}
