use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Mode;

/// A network response observed by the automation layer. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: Option<Vec<u8>>,
    /// Request resource type reported by the browser, e.g. `xhr` or `document`.
    pub resource_kind: String,
}

impl CapturedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Lossy UTF-8 view of the body, if any.
    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        self.body.as_deref().map(String::from_utf8_lossy)
    }

    pub fn is_json(&self) -> bool {
        let mime = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        mime == "application/json" || mime.ends_with("+json")
    }
}

/// Selects the captured responses an operation cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMatcher {
    pub url_fragment: String,
    pub resource_kind: String,
}

impl ResponseMatcher {
    pub fn new(url_fragment: impl Into<String>, resource_kind: impl Into<String>) -> Self {
        Self {
            url_fragment: url_fragment.into(),
            resource_kind: resource_kind.into(),
        }
    }

    /// Background endpoints the platform calls for each mode.
    pub fn default_for(mode: Mode) -> Self {
        match mode {
            Mode::Paginated => Self::new("/UserTweets", "xhr"),
            Mode::SingleRecord => Self::new("/UserByScreenName", "xhr"),
        }
    }

    pub fn matches(&self, response: &CapturedResponse) -> bool {
        response.url.contains(&self.url_fragment)
            && response.resource_kind.eq_ignore_ascii_case(&self.resource_kind)
    }
}
