use harvester_core::{detect_unavailable, PageSnapshot, UnavailableReason};

fn page(url: &str, text: Option<&str>) -> PageSnapshot {
    PageSnapshot {
        url: url.to_string(),
        text: text.map(str::to_string),
    }
}

#[test]
fn suspended_text_is_detected_case_insensitively() {
    let reason = detect_unavailable(&page("https://x.com/alice", Some("ACCOUNT SUSPENDED\nx")));
    assert_eq!(
        reason,
        Some(UnavailableReason::Suspended { marker: "Account suspended" })
    );
}

#[test]
fn missing_text_matches_either_apostrophe() {
    for text in ["This account doesn’t exist", "This account doesn't exist"] {
        let reason = detect_unavailable(&page("https://x.com/ghost", Some(text)));
        assert!(matches!(reason, Some(UnavailableReason::Missing { .. })), "{text}");
    }
}

#[test]
fn suspension_outranks_missing_text() {
    let reason = detect_unavailable(&page(
        "https://x.com/a",
        Some("Profile not found. This account is suspended"),
    ));
    assert!(matches!(reason, Some(UnavailableReason::Suspended { .. })));
}

#[test]
fn redirect_paths_are_detected() {
    for url in [
        "https://x.com/i/unavailable",
        "https://x.com/i/suspend?x=1",
        "https://x.com/notifications/restricted",
    ] {
        assert_eq!(
            detect_unavailable(&page(url, Some("Home"))),
            Some(UnavailableReason::RedirectedTo { url: url.to_string() })
        );
    }
}

#[test]
fn unreadable_healthy_page_is_not_unavailable() {
    assert_eq!(detect_unavailable(&page("https://x.com/alice", None)), None);
    assert_eq!(
        detect_unavailable(&page("https://x.com/alice", Some("Posts Replies Media"))),
        None
    );
}
