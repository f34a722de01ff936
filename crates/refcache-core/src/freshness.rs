//! Freshness windows: how long a cached outcome may be served without a fetch.

use std::time::{Duration, SystemTime};

use crate::config::FreshnessConfig;
use crate::record::Status;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Maps a cached status to the time it stays fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessPolicy {
    success: Duration,
    permanent_redirect: Duration,
    temporary_redirect: Duration,
    not_found: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::from_config(&FreshnessConfig::default())
    }
}

impl FreshnessPolicy {
    pub fn from_config(cfg: &FreshnessConfig) -> Self {
        Self {
            success: Duration::from_secs(cfg.success_secs),
            permanent_redirect: Duration::from_secs(cfg.permanent_redirect_secs),
            temporary_redirect: Duration::from_secs(cfg.temporary_redirect_secs),
            not_found: Duration::from_secs(cfg.not_found_secs),
        }
    }

    /// Window for `status`, or `None` if such a record is never fresh.
    pub fn window(&self, status: Status) -> Option<Duration> {
        match status {
            Status::Success => Some(self.success),
            Status::Redirect(_) if status.is_permanent_redirect() => Some(self.permanent_redirect),
            Status::Redirect(_) => Some(self.temporary_redirect),
            Status::NotFound => Some(self.not_found),
            Status::Other(_) => None,
        }
    }

    /// A record of age `age` is fresh while `age < window`.
    pub fn is_fresh(&self, status: Status, age: Duration) -> bool {
        self.window(status).is_some_and(|window| age < window)
    }
}

/// Age of something last modified at `modified`, as seen at `now`.
/// A modification time in the future counts as age zero.
pub fn age_at(modified: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}

/// Human-readable age with the coarsest unit that still shows at least two of it.
pub fn format_age(age: Duration) -> String {
    let sec = age.as_secs();
    if sec < 2 * MINUTE {
        format!("{sec} seconds")
    } else if sec < 2 * HOUR {
        format!("{} minutes", sec / MINUTE)
    } else if sec < 2 * DAY {
        format!("{} hours", sec / HOUR)
    } else {
        format!("{} days", sec / DAY)
    }
}
