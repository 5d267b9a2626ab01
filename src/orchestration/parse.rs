// Parsing contracts for free-form model output

use serde::de::DeserializeOwned;

/// Result of reading a typed value out of model text
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply<T> {
    Parsed(T),
    ParseFailed(String),
}

impl<T: DeserializeOwned> ModelReply<T> {
    /// Parse `raw` as `T`, accepting a JSON object wrapped in prose or code fences
    pub fn from_text(raw: &str) -> Self {
        if let Ok(value) = serde_json::from_str(raw.trim()) {
            return ModelReply::Parsed(value);
        }

        match extract_json_object(raw).and_then(|json| serde_json::from_str(json).ok()) {
            Some(value) => ModelReply::Parsed(value),
            None => ModelReply::ParseFailed(raw.to_string()),
        }
    }
}

/// Text between the first `{` and the last `}`, inclusive
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Best-effort structured view of a sub-agent's output
pub fn extract_structured_data(output: &str) -> serde_json::Value {
    extract_json_object(output)
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_else(|| serde_json::json!({ "raw_text": output }))
}
