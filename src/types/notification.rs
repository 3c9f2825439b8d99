use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

pub const DEFAULT_TITLE: &str = "News Update";
pub const DEFAULT_BODY: &str = "Check out the latest news.";
pub const DEFAULT_URL: &str = "/";

/// Canonical notification sent to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub url: String,
    pub image: Option<String>,
}

impl NotificationPayload {
    /// Builds the payload from a loosely typed request.
    ///
    /// `message` becomes `body`. Missing, empty or non-string fields take their
    /// defaults and unknown fields are ignored, so this never fails.
    pub fn from_request(request: &Value) -> Self {
        Self {
            title: text_field(request, "title")
                .unwrap_or_else(|| String::from(DEFAULT_TITLE)),
            body: text_field(request, "message")
                .unwrap_or_else(|| String::from(DEFAULT_BODY)),
            url: text_field(request, "url")
                .unwrap_or_else(|| String::from(DEFAULT_URL)),
            image: text_field(request, "image"),
        }
    }

    pub fn to_wire(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for NotificationPayload {
    fn default() -> Self {
        Self::from_request(&Value::Null)
    }
}

fn text_field(request: &Value, key: &str) -> Option<String> {
    request
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
