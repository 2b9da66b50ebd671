use serde::{Serialize, Deserialize};

/// Error body returned by the election backend for any non-success status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    #[serde(default)]
    pub detail: String,
}

impl ErrorResponse {
    /// Parses an error body, falling back to a generic message when the body
    /// is empty or not the expected shape.
    pub fn from_body(body: &str, status: u16) -> Self {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(parsed) if !parsed.detail.is_empty() => parsed,
            _ => Self {
                detail: format!("Request failed with status {}", status),
            },
        }
    }
}
