//! Permissions of the configured API key.

use serde::Deserialize;
use tracing::warn;

use crate::error::{ApiError, Result};

/// Capability bit allowing a key to feed METARs.
pub const CAPABILITY_FEED_METARS: u64 = 1;

/// Key information as reported by the API. Negative quota and rate limit
/// values mean unlimited.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct KeyInfo {
    pub quota: i64,
    pub rate_limit: i64,
    pub capabilities: u64,
}

impl KeyInfo {
    pub fn can_feed_metars(&self) -> bool {
        self.capabilities & CAPABILITY_FEED_METARS != 0
    }

    /// Check the key is usable for harvesting.
    ///
    /// The key must have neither a quota nor a rate limit. Feeding requested
    /// without the matching capability is turned off with a warning; since
    /// feeding is the only job of the harvester, that is an error as well.
    pub fn validate(&self, feed_metars: bool) -> Result<()> {
        if self.quota >= 0 {
            return Err(ApiError::LimitedQuota(self.quota));
        }
        if self.rate_limit >= 0 {
            return Err(ApiError::RateLimited(self.rate_limit));
        }

        let mut feed_metars = feed_metars;
        if feed_metars && !self.can_feed_metars() {
            warn!("METAR feeding disabled due to lack of required key capability");
            feed_metars = false;
        }
        if !feed_metars {
            return Err(ApiError::FeedingDisabled);
        }
        Ok(())
    }
}
