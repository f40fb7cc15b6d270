//! RON overrides for [`HarvestSettings`].
//!
//! Every field is optional; missing ones keep the built-in defaults.
//! Durations are given in seconds as floats:
//!
//! ```ron
//! (
//!     desired_count: 50,
//!     local_base_delay_secs: 90.0,
//!     accept_uncertain_login: false,
//! )
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use engine_logging::engine_info;
use harvester_core::ResponseMatcher;
use harvester_engine::HarvestSettings;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub desired_count: usize,

    pub local_max_attempts: u32,
    pub local_base_delay_secs: f64,
    pub local_increment_secs: f64,
    pub generic_retry_delay_secs: f64,

    pub global_max_attempts: u32,
    pub global_retry_delay_secs: f64,

    pub paginated_timeout_secs: f64,
    pub single_record_timeout_secs: f64,
    pub navigation_cap_secs: f64,
    pub content_wait_cap_secs: f64,
    pub content_wait_buffer_secs: f64,
    pub min_content_wait_secs: f64,
    pub settle_pause_secs: f64,
    pub availability_settle_secs: f64,
    pub loop_reserve_secs: f64,

    pub no_progress_threshold: u32,
    pub initial_advance_pause_secs: f64,
    pub advance_pause_secs: f64,
    pub poll_interval_secs: f64,
    pub single_record_min_wait_secs: f64,
    pub inter_subject_pause_secs: f64,

    pub content_marker: String,
    pub profile_url_template: String,
    pub paginated_matcher: ResponseMatcher,
    pub single_record_matcher: ResponseMatcher,
    pub accept_uncertain_login: bool,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let s = HarvestSettings::default();
        Self {
            desired_count: s.desired_count,
            local_max_attempts: s.local_max_attempts,
            local_base_delay_secs: s.local_base_delay.as_secs_f64(),
            local_increment_secs: s.local_increment.as_secs_f64(),
            generic_retry_delay_secs: s.generic_retry_delay.as_secs_f64(),
            global_max_attempts: s.global_max_attempts,
            global_retry_delay_secs: s.global_retry_delay.as_secs_f64(),
            paginated_timeout_secs: s.paginated_timeout.as_secs_f64(),
            single_record_timeout_secs: s.single_record_timeout.as_secs_f64(),
            navigation_cap_secs: s.navigation_cap.as_secs_f64(),
            content_wait_cap_secs: s.content_wait_cap.as_secs_f64(),
            content_wait_buffer_secs: s.content_wait_buffer.as_secs_f64(),
            min_content_wait_secs: s.min_content_wait.as_secs_f64(),
            settle_pause_secs: s.settle_pause.as_secs_f64(),
            availability_settle_secs: s.availability_settle.as_secs_f64(),
            loop_reserve_secs: s.loop_reserve.as_secs_f64(),
            no_progress_threshold: s.no_progress_threshold,
            initial_advance_pause_secs: s.initial_advance_pause.as_secs_f64(),
            advance_pause_secs: s.advance_pause.as_secs_f64(),
            poll_interval_secs: s.poll_interval.as_secs_f64(),
            single_record_min_wait_secs: s.single_record_min_wait.as_secs_f64(),
            inter_subject_pause_secs: s.inter_subject_pause.as_secs_f64(),
            content_marker: s.content_marker,
            profile_url_template: s.profile_url_template,
            paginated_matcher: s.paginated_matcher,
            single_record_matcher: s.single_record_matcher,
            accept_uncertain_login: s.accept_uncertain_login,
        }
    }
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|err| anyhow!("invalid settings: {err}"))
    }

    pub fn into_settings(self) -> Result<HarvestSettings> {
        if self.desired_count == 0 {
            return Err(anyhow!("desired_count must be at least 1"));
        }
        if !self.profile_url_template.contains("{subject}") {
            return Err(anyhow!(
                "profile_url_template must contain {{subject}}: {}",
                self.profile_url_template
            ));
        }
        Ok(HarvestSettings {
            desired_count: self.desired_count,
            local_max_attempts: self.local_max_attempts,
            local_base_delay: secs("local_base_delay_secs", self.local_base_delay_secs)?,
            local_increment: secs("local_increment_secs", self.local_increment_secs)?,
            generic_retry_delay: secs("generic_retry_delay_secs", self.generic_retry_delay_secs)?,
            global_max_attempts: self.global_max_attempts,
            global_retry_delay: secs("global_retry_delay_secs", self.global_retry_delay_secs)?,
            paginated_timeout: secs("paginated_timeout_secs", self.paginated_timeout_secs)?,
            single_record_timeout: secs(
                "single_record_timeout_secs",
                self.single_record_timeout_secs,
            )?,
            navigation_cap: secs("navigation_cap_secs", self.navigation_cap_secs)?,
            content_wait_cap: secs("content_wait_cap_secs", self.content_wait_cap_secs)?,
            content_wait_buffer: secs("content_wait_buffer_secs", self.content_wait_buffer_secs)?,
            min_content_wait: secs("min_content_wait_secs", self.min_content_wait_secs)?,
            settle_pause: secs("settle_pause_secs", self.settle_pause_secs)?,
            availability_settle: secs("availability_settle_secs", self.availability_settle_secs)?,
            loop_reserve: secs("loop_reserve_secs", self.loop_reserve_secs)?,
            no_progress_threshold: self.no_progress_threshold,
            initial_advance_pause: secs(
                "initial_advance_pause_secs",
                self.initial_advance_pause_secs,
            )?,
            advance_pause: secs("advance_pause_secs", self.advance_pause_secs)?,
            poll_interval: secs("poll_interval_secs", self.poll_interval_secs)?,
            single_record_min_wait: secs(
                "single_record_min_wait_secs",
                self.single_record_min_wait_secs,
            )?,
            inter_subject_pause: secs("inter_subject_pause_secs", self.inter_subject_pause_secs)?,
            content_marker: self.content_marker,
            profile_url_template: self.profile_url_template,
            paginated_matcher: self.paginated_matcher,
            single_record_matcher: self.single_record_matcher,
            accept_uncertain_login: self.accept_uncertain_login,
        })
    }
}

fn secs(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|err| anyhow!("{field} = {value}: {err}"))
}

/// Built-in defaults, overridden by `path` when given.
pub fn load_settings(path: Option<&Path>) -> Result<HarvestSettings> {
    let Some(path) = path else {
        return Ok(HarvestSettings::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let settings = ConfigFile::parse(&text)
        .and_then(ConfigFile::into_settings)
        .with_context(|| format!("loading settings from {}", path.display()))?;
    engine_info!("settings loaded from {}", path.display());
    Ok(settings)
}
