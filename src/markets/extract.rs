use crate::error::MarketGenError;
use serde_json::Value;

/// Parse backend text as JSON, tolerating prose around one outer object.
pub fn extract_json_object(raw: &str) -> Result<Value, MarketGenError> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let (Some(first), Some(last)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        return Err(MarketGenError::InvalidJson);
    };
    if last <= first {
        return Err(MarketGenError::InvalidJson);
    }
    serde_json::from_str(&trimmed[first..=last]).map_err(|_| MarketGenError::InvalidJson)
}
