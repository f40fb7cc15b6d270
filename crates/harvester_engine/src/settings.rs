use std::time::Duration;

use harvester_core::{Mode, ResponseMatcher, RetryState};

/// Every tunable of a harvesting run. Defaults mirror the production values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    pub desired_count: usize,

    pub local_max_attempts: u32,
    pub local_base_delay: Duration,
    pub local_increment: Duration,
    pub generic_retry_delay: Duration,

    pub global_max_attempts: u32,
    pub global_retry_delay: Duration,

    pub paginated_timeout: Duration,
    pub single_record_timeout: Duration,
    pub navigation_cap: Duration,
    pub content_wait_cap: Duration,
    pub content_wait_buffer: Duration,
    pub min_content_wait: Duration,
    pub settle_pause: Duration,
    pub availability_settle: Duration,
    pub loop_reserve: Duration,

    pub no_progress_threshold: u32,
    pub initial_advance_pause: Duration,
    pub advance_pause: Duration,
    pub poll_interval: Duration,
    pub single_record_min_wait: Duration,
    pub inter_subject_pause: Duration,

    pub content_marker: String,
    /// `{subject}` is replaced with the subject handle.
    pub profile_url_template: String,
    pub paginated_matcher: ResponseMatcher,
    pub single_record_matcher: ResponseMatcher,
    pub accept_uncertain_login: bool,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            desired_count: 200,
            local_max_attempts: 3,
            local_base_delay: Duration::from_secs(180),
            local_increment: Duration::from_secs(60),
            generic_retry_delay: Duration::from_secs(30),
            global_max_attempts: 1,
            global_retry_delay: Duration::from_secs(300),
            paginated_timeout: Duration::from_secs(480),
            single_record_timeout: Duration::from_secs(90),
            navigation_cap: Duration::from_secs(60),
            content_wait_cap: Duration::from_secs(15),
            content_wait_buffer: Duration::from_secs(1),
            min_content_wait: Duration::from_secs(1),
            settle_pause: Duration::from_millis(2500),
            availability_settle: Duration::from_millis(1500),
            loop_reserve: Duration::from_secs(10),
            no_progress_threshold: 6,
            initial_advance_pause: Duration::from_secs(3),
            advance_pause: Duration::from_millis(4500),
            poll_interval: Duration::from_millis(500),
            single_record_min_wait: Duration::from_secs(20),
            inter_subject_pause: Duration::from_secs(10),
            content_marker: "[data-testid='primaryColumn']".to_string(),
            profile_url_template: "https://x.com/{subject}".to_string(),
            paginated_matcher: ResponseMatcher::default_for(Mode::Paginated),
            single_record_matcher: ResponseMatcher::default_for(Mode::SingleRecord),
            accept_uncertain_login: true,
        }
    }
}

impl HarvestSettings {
    pub fn profile_url(&self, handle: &str) -> String {
        self.profile_url_template.replace("{subject}", handle)
    }

    pub fn operation_timeout(&self, mode: Mode) -> Duration {
        match mode {
            Mode::Paginated => self.paginated_timeout,
            Mode::SingleRecord => self.single_record_timeout,
        }
    }

    pub fn matcher(&self, mode: Mode) -> &ResponseMatcher {
        match mode {
            Mode::Paginated => &self.paginated_matcher,
            Mode::SingleRecord => &self.single_record_matcher,
        }
    }

    pub fn local_retry_state(&self) -> RetryState {
        RetryState::new(
            self.local_max_attempts,
            self.local_base_delay,
            self.local_increment,
        )
    }
}
