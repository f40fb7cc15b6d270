//! Scripted automation backend.
//!
//! A [`ReplayScript`] describes, per URL, what successive visits look like:
//! page text, final URL, which markers render, and the background responses
//! emitted on load and after each advance. The last visit of a URL repeats
//! once the script runs out. Used for offline runs and tests.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use harvester_core::{CapturedResponse, PageSnapshot};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::automation::{AuthStatus, AutomationError, Browser, BrowserPage, BrowserSession};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("could not read replay script {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid replay script {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReplayScript {
    pub login: AuthStatus,
    /// Keyed by the exact URL navigated to.
    pub pages: HashMap<String, Vec<VisitScript>>,
}

impl Default for ReplayScript {
    fn default() -> Self {
        Self {
            login: AuthStatus::LoggedIn,
            pages: HashMap::new(),
        }
    }
}

impl ReplayScript {
    pub fn with_page(mut self, url: impl Into<String>, visits: Vec<VisitScript>) -> Self {
        self.pages.insert(url.into(), visits);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VisitScript {
    pub navigation_error: Option<String>,
    /// Simulated load time; longer than the navigation timeout means a timeout.
    pub load_delay_ms: u64,
    pub text: Option<String>,
    pub final_url: Option<String>,
    pub markers: Vec<String>,
    pub on_load: Vec<ScriptedResponse>,
    /// Batch `i` is emitted by the `i`-th advance of the visit.
    pub on_advance: Vec<Vec<ScriptedResponse>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptedResponse {
    pub url: String,
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// A JSON string is sent verbatim, any other value as serialized JSON.
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default = "default_resource_kind")]
    pub resource_kind: String,
}

fn default_status() -> u16 {
    200
}

fn default_content_type() -> String {
    "application/json".to_string()
}

fn default_resource_kind() -> String {
    "xhr".to_string()
}

impl ScriptedResponse {
    /// A 200 `application/json` xhr response carrying `body`.
    pub fn json(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            status: default_status(),
            content_type: default_content_type(),
            body: Some(body),
            resource_kind: default_resource_kind(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_text(mut self, content_type: &str, text: &str) -> Self {
        self.content_type = content_type.to_string();
        self.body = Some(Value::String(text.to_string()));
        self
    }

    fn to_captured(&self) -> CapturedResponse {
        let body = self.body.as_ref().map(|body| match body {
            Value::String(text) => text.clone().into_bytes(),
            other => other.to_string().into_bytes(),
        });
        CapturedResponse {
            url: self.url.clone(),
            status: self.status,
            content_type: self.content_type.clone(),
            body,
            resource_kind: self.resource_kind.clone(),
        }
    }
}

/// What the scripted backend was asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayLog {
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub logins: usize,
    pub pages_opened: usize,
    pub pages_closed: usize,
    pub navigations: Vec<String>,
    pub advances: usize,
}

#[derive(Debug)]
struct ReplayState {
    script: ReplayScript,
    cursors: HashMap<String, usize>,
    log: ReplayLog,
}

impl ReplayState {
    fn next_visit(&mut self, url: &str) -> Option<VisitScript> {
        let visits = self.script.pages.get(url)?;
        let cursor = self.cursors.entry(url.to_string()).or_insert(0);
        let visit = visits.get((*cursor).min(visits.len().checked_sub(1)?))?;
        *cursor += 1;
        Some(visit.clone())
    }
}

type SharedState = Arc<Mutex<ReplayState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, ReplayState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
pub struct ScriptedBrowser {
    state: SharedState,
}

impl ScriptedBrowser {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            state: Arc::new(Mutex::new(ReplayState {
                script,
                cursors: HashMap::new(),
                log: ReplayLog::default(),
            })),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ReplayError> {
        let raw = fs::read_to_string(path).map_err(|source| ReplayError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let script = serde_json::from_str(&raw).map_err(|source| ReplayError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(script))
    }

    pub fn log(&self) -> ReplayLog {
        lock(&self.state).log.clone()
    }
}

#[async_trait::async_trait]
impl Browser for ScriptedBrowser {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, AutomationError> {
        lock(&self.state).log.sessions_opened += 1;
        Ok(Box::new(ScriptedSession {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct ScriptedSession {
    state: SharedState,
    closed: bool,
}

impl ScriptedSession {
    fn ensure_open(&self) -> Result<(), AutomationError> {
        if self.closed {
            return Err(AutomationError::Session("session already closed".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserSession for ScriptedSession {
    async fn authenticate(&mut self) -> Result<AuthStatus, AutomationError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.log.logins += 1;
        Ok(state.script.login)
    }

    async fn open_page(&mut self) -> Result<Box<dyn BrowserPage>, AutomationError> {
        self.ensure_open()?;
        lock(&self.state).log.pages_opened += 1;
        Ok(Box::new(ScriptedPage {
            state: Arc::clone(&self.state),
            sender: None,
            url: String::new(),
            visit: None,
            advances: 0,
            closed: false,
        }))
    }

    async fn close(&mut self) -> Result<(), AutomationError> {
        if !self.closed {
            self.closed = true;
            lock(&self.state).log.sessions_closed += 1;
        }
        Ok(())
    }
}

struct ScriptedPage {
    state: SharedState,
    sender: Option<mpsc::UnboundedSender<CapturedResponse>>,
    url: String,
    visit: Option<VisitScript>,
    advances: usize,
    closed: bool,
}

impl ScriptedPage {
    fn ensure_open(&self) -> Result<(), AutomationError> {
        if self.closed {
            return Err(AutomationError::PageClosed);
        }
        Ok(())
    }

    fn emit(&self, batch: &[ScriptedResponse]) {
        let Some(sender) = &self.sender else {
            return;
        };
        for response in batch {
            if sender.send(response.to_captured()).is_err() {
                break;
            }
        }
    }
}

#[async_trait::async_trait]
impl BrowserPage for ScriptedPage {
    fn responses(&mut self) -> mpsc::UnboundedReceiver<CapturedResponse> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.sender = Some(sender);
        receiver
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), AutomationError> {
        self.ensure_open()?;
        let visit = {
            let mut state = lock(&self.state);
            state.log.navigations.push(url.to_string());
            state.next_visit(url)
        };
        let Some(visit) = visit else {
            return Err(AutomationError::Navigation {
                url: url.to_string(),
                message: "no scripted page".into(),
            });
        };

        let delay = Duration::from_millis(visit.load_delay_ms);
        if delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(AutomationError::Timeout(timeout));
        }
        tokio::time::sleep(delay).await;

        if let Some(message) = &visit.navigation_error {
            return Err(AutomationError::Navigation {
                url: url.to_string(),
                message: message.clone(),
            });
        }

        self.url = url.to_string();
        self.advances = 0;
        self.emit(&visit.on_load);
        self.visit = Some(visit);
        Ok(())
    }

    async fn wait_for_marker(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), AutomationError> {
        self.ensure_open()?;
        let present = self
            .visit
            .as_ref()
            .is_some_and(|visit| visit.markers.iter().any(|marker| marker == selector));
        if present {
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err(AutomationError::MarkerNotFound {
            selector: selector.to_string(),
        })
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, AutomationError> {
        self.ensure_open()?;
        let visit = self.visit.as_ref();
        Ok(PageSnapshot {
            url: visit
                .and_then(|visit| visit.final_url.clone())
                .unwrap_or_else(|| self.url.clone()),
            text: visit.and_then(|visit| visit.text.clone()),
        })
    }

    async fn advance(&mut self) -> Result<(), AutomationError> {
        self.ensure_open()?;
        lock(&self.state).log.advances += 1;
        let batch = self
            .visit
            .as_ref()
            .and_then(|visit| visit.on_advance.get(self.advances))
            .cloned();
        self.advances += 1;
        if let Some(batch) = batch {
            self.emit(&batch);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AutomationError> {
        if !self.closed {
            self.closed = true;
            self.sender = None;
            lock(&self.state).log.pages_closed += 1;
        }
        Ok(())
    }
}
