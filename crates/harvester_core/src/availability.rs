use std::fmt;

use url::Url;

/// Text shown on suspended accounts.
pub const SUSPENDED_MARKERS: &[&str] = &["Account suspended", "This account is suspended"];

/// Text shown when the account or its content does not exist.
pub const MISSING_MARKERS: &[&str] = &[
    "This account doesn’t exist",
    "Hmm...this page doesn’t exist.",
    "Profile not found",
    "These posts aren't available",
    "This profile is not available",
];

/// Paths the platform redirects to for unavailable or restricted accounts.
pub const UNAVAILABLE_PATHS: &[&str] = &["/i/unavailable", "/i/suspend", "/notifications/restricted"];

/// What the page looked like when it was inspected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSnapshot {
    pub url: String,
    /// Visible body text; `None` when the page could not be read.
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    Suspended { marker: &'static str },
    Missing { marker: &'static str },
    RedirectedTo { url: String },
    /// The primary content never rendered and the page showed no explanation.
    ContentNeverRendered,
    /// The expected background endpoint was never called.
    EndpointSilent,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::Suspended { marker } => write!(f, "suspended ('{marker}')"),
            UnavailableReason::Missing { marker } => write!(f, "not found ('{marker}')"),
            UnavailableReason::RedirectedTo { url } => write!(f, "redirected to {url}"),
            UnavailableReason::ContentNeverRendered => {
                write!(f, "primary content never rendered")
            }
            UnavailableReason::EndpointSilent => write!(f, "no response from expected endpoint"),
        }
    }
}

type AvailabilityRule = fn(&PageSnapshot) -> Option<UnavailableReason>;

/// Rules checked in order against a page snapshot.
pub const AVAILABILITY_RULES: &[(&str, AvailabilityRule)] = &[
    ("suspended_text", suspended_text),
    ("missing_text", missing_text),
    ("unavailable_url", unavailable_url),
];

/// Returns the first permanent-unavailability marker found on the page.
pub fn detect_unavailable(snapshot: &PageSnapshot) -> Option<UnavailableReason> {
    AVAILABILITY_RULES
        .iter()
        .find_map(|(_, rule)| rule(snapshot))
}

fn suspended_text(snapshot: &PageSnapshot) -> Option<UnavailableReason> {
    find_marker(snapshot, SUSPENDED_MARKERS).map(|marker| UnavailableReason::Suspended { marker })
}

fn missing_text(snapshot: &PageSnapshot) -> Option<UnavailableReason> {
    find_marker(snapshot, MISSING_MARKERS).map(|marker| UnavailableReason::Missing { marker })
}

fn unavailable_url(snapshot: &PageSnapshot) -> Option<UnavailableReason> {
    let path = Url::parse(&snapshot.url)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| snapshot.url.clone());
    UNAVAILABLE_PATHS
        .iter()
        .any(|fragment| path.contains(fragment))
        .then(|| UnavailableReason::RedirectedTo {
            url: snapshot.url.clone(),
        })
}

fn find_marker(snapshot: &PageSnapshot, markers: &[&'static str]) -> Option<&'static str> {
    let text = normalize(snapshot.text.as_deref()?);
    markers
        .iter()
        .copied()
        .find(|marker| text.contains(&normalize(marker)))
}

// Pages mix straight and typographic apostrophes.
fn normalize(text: &str) -> String {
    text.to_lowercase().replace('’', "'")
}
