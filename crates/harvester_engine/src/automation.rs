//! Seams to the browser-automation layer.
//!
//! The engine never talks to a browser directly. A [`Browser`] hands out
//! sessions, a [`BrowserSession`] opens pages and logs in, and a
//! [`BrowserPage`] navigates, reports what it shows and streams the background
//! responses it observed.

use std::future::Future;
use std::time::Duration;

use harvester_core::{CapturedResponse, PageSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutomationError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("marker {selector} not found")]
    MarkerNotFound { selector: String },
    #[error("page already closed")]
    PageClosed,
    #[error("session failure: {0}")]
    Session(String),
}

/// Result of a login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    LoggedIn,
    #[default]
    Failed,
    /// The flow finished but neither success nor failure could be confirmed.
    Uncertain,
}

impl AuthStatus {
    pub fn is_ready(self, accept_uncertain: bool) -> bool {
        match self {
            AuthStatus::LoggedIn => true,
            AuthStatus::Uncertain => accept_uncertain,
            AuthStatus::Failed => false,
        }
    }
}

#[async_trait::async_trait]
pub trait Browser: Send + Sync {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, AutomationError>;
}

#[async_trait::async_trait]
pub trait BrowserSession: Send {
    async fn authenticate(&mut self) -> Result<AuthStatus, AutomationError>;
    async fn open_page(&mut self) -> Result<Box<dyn BrowserPage>, AutomationError>;
    async fn close(&mut self) -> Result<(), AutomationError>;
}

#[async_trait::async_trait]
pub trait BrowserPage: Send {
    /// Subscribes to responses observed from now on. Calling it again
    /// replaces the previous subscription.
    fn responses(&mut self) -> mpsc::UnboundedReceiver<CapturedResponse>;
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), AutomationError>;
    async fn wait_for_marker(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), AutomationError>;
    async fn snapshot(&mut self) -> Result<PageSnapshot, AutomationError>;
    /// Scrolls or otherwise asks the page for more content.
    async fn advance(&mut self) -> Result<(), AutomationError>;
    async fn close(&mut self) -> Result<(), AutomationError>;
}

/// Caps `operation` at `limit` even if the automation layer ignores its own timeout.
pub(crate) async fn bounded<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, AutomationError>>,
) -> Result<T, AutomationError> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(AutomationError::Timeout(limit)),
    }
}
