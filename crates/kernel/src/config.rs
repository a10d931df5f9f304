//! Engine configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result, bail};
use chrono::{FixedOffset, Offset, Utc};

use crate::index::LINK_SOURCE_ID_FIELD;

/// Default number of items per page when a list has no limit configured.
pub const DEFAULT_LIMIT: usize = 10;

/// Maximum items per page.
pub const MAX_LIMIT: usize = 100;

/// Offset `minutes` east of UTC, or `None` when out of range.
fn timezone_offset(minutes: i32) -> Option<FixedOffset> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt)
}

/// List engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Items per page for lists without a configured limit (default: 10).
    pub default_limit: usize,

    /// Upper bound on items per page (default: 100).
    pub max_limit: usize,

    /// Minutes east of UTC used to turn date filter days into timestamps.
    pub timezone_offset_minutes: i32,

    /// Index field holding each item's own entity id.
    pub self_id_field: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            timezone_offset_minutes: 0,
            self_id_field: LINK_SOURCE_ID_FIELD.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let default_limit = env::var("LIST_PAGES_DEFAULT_LIMIT")
            .unwrap_or_else(|_| DEFAULT_LIMIT.to_string())
            .parse()
            .context("LIST_PAGES_DEFAULT_LIMIT must be a valid usize")?;

        let max_limit = env::var("LIST_PAGES_MAX_LIMIT")
            .unwrap_or_else(|_| MAX_LIMIT.to_string())
            .parse()
            .context("LIST_PAGES_MAX_LIMIT must be a valid usize")?;

        let timezone_offset_minutes: i32 = env::var("LIST_PAGES_TIMEZONE_OFFSET")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .context("LIST_PAGES_TIMEZONE_OFFSET must be a number of minutes")?;

        if timezone_offset(timezone_offset_minutes).is_none() {
            bail!("LIST_PAGES_TIMEZONE_OFFSET out of range: {timezone_offset_minutes}");
        }

        let self_id_field = env::var("LIST_PAGES_SELF_ID_FIELD")
            .unwrap_or_else(|_| LINK_SOURCE_ID_FIELD.to_string());

        Ok(Self {
            default_limit,
            max_limit,
            timezone_offset_minutes,
            self_id_field,
        })
    }

    /// Timezone used for date filters.
    pub fn timezone(&self) -> FixedOffset {
        timezone_offset(self.timezone_offset_minutes).unwrap_or(Utc.fix())
    }

    /// Resolve the page size for a configured limit.
    pub fn effective_limit(&self, configured: Option<usize>) -> usize {
        let limit = configured.filter(|l| *l > 0).unwrap_or(self.default_limit);
        if limit > self.max_limit {
            tracing::warn!(
                requested = limit,
                capped = self.max_limit,
                "list limit exceeds maximum, capping"
            );
            return self.max_limit;
        }
        limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_limit_defaults_and_caps() {
        let config = EngineConfig::default();
        assert_eq!(config.effective_limit(None), 10);
        assert_eq!(config.effective_limit(Some(0)), 10);
        assert_eq!(config.effective_limit(Some(25)), 25);
        assert_eq!(config.effective_limit(Some(500)), 100);
    }

    #[test]
    fn timezone_from_offset() {
        let config = EngineConfig {
            timezone_offset_minutes: 60,
            ..Default::default()
        };
        assert_eq!(config.timezone().local_minus_utc(), 3600);
    }

    #[test]
    fn out_of_range_offsets_are_rejected() {
        assert!(timezone_offset(24 * 60).is_none());
        assert!(timezone_offset(40_000_000).is_none());
        assert!(timezone_offset(i32::MIN).is_none());
        assert_eq!(timezone_offset(-300).map(|o| o.local_minus_utc()), Some(-18_000));
    }

    #[test]
    fn out_of_range_timezone_falls_back_to_utc() {
        let config = EngineConfig {
            timezone_offset_minutes: 40_000_000,
            ..Default::default()
        };
        assert_eq!(config.timezone().local_minus_utc(), 0);
    }
}
