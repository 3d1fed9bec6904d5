use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Reads a number that may arrive as a JSON number, a numeric string, or
/// null. Anything unreadable becomes `None` rather than a decode failure.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
    .filter(|n| n.is_finite()))
}
