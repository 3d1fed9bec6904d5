mod number;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub use number::lenient_f64;

/// Stable coin identifier assigned by the backend.
pub type CoinId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub id: CoinId,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_cap: Option<f64>,
}

/// Single-coin view. Every market figure is optional; the backend sends
/// whichever subset it has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinDetail {
    pub id: CoinId,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub high_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub low_24h: Option<f64>,
}

impl CoinDetail {
    pub fn price(&self) -> Option<f64> {
        self.current_price.or(self.market_price)
    }

    pub fn image(&self) -> Option<&str> {
        self.image_url.as_deref().or(self.logo_url.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub recorded_at: DateTime<Utc>,
    pub price: f64,
}

/// History entry as the backend sends it. Prices arrive as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPricePoint {
    #[serde(default)]
    pub recorded_at: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
}

impl RawPricePoint {
    /// `None` when either field is missing or unreadable.
    pub fn into_point(self) -> Option<PricePoint> {
        let price = self.price?;
        let recorded_at = match self.recorded_at? {
            serde_json::Value::String(s) => parse_timestamp(&s)?,
            serde_json::Value::Number(n) => DateTime::from_timestamp(n.as_i64()?, 0)?,
            _ => return None,
        };
        Some(PricePoint { recorded_at, price })
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Python's isoformat() omits the zone for naive datetimes
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub cryptocurrency_id: CoinId,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub alert_price: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct AddWatchRequest<'a> {
    pub crypto_id: CoinId,
    pub alert_price: &'a str,
}

/// Error payload; the backend uses either key.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.trim().is_empty())
    }
}

/// Display currency. Pure preference, never sent to the backend as state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub name: String,
    pub symbol: String,
}

impl Currency {
    pub const PRESETS: [(&'static str, &'static str); 3] = [("usd", "$"), ("eur", "€"), ("inr", "₹")];

    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
        }
    }

    /// Looks up a preset by name; unknown names keep their name as the symbol.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        match Self::PRESETS.iter().find(|(n, _)| *n == name) {
            Some((n, s)) => Self::new(*n, *s),
            None => Self::new(name.clone(), name.to_uppercase() + " "),
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::new("usd", "$")
    }
}
