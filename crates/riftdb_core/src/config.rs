//! Resolver configuration.

/// Configuration for a [`crate::resolver::ConflictResolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum number of transaction ids per status-oracle round-trip.
    /// Owners discovered in one scan round are coalesced into chunks of
    /// this size rather than queried one by one.
    pub status_batch_limit: usize,

    /// Upper bound on wait-queue suspend/rescan iterations for a single
    /// resolution call. Exceeding it surfaces a timeout failure instead of
    /// spinning while the conflict set keeps changing.
    pub max_wait_rounds: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            status_batch_limit: 128,
            max_wait_rounds: 64,
        }
    }
}

impl ResolverConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the status-oracle batch limit.
    #[must_use]
    pub const fn status_batch_limit(mut self, limit: usize) -> Self {
        self.status_batch_limit = limit;
        self
    }

    /// Sets the wait-round bound.
    #[must_use]
    pub const fn max_wait_rounds(mut self, rounds: usize) -> Self {
        self.max_wait_rounds = rounds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = ResolverConfig::new().status_batch_limit(4).max_wait_rounds(2);
        assert_eq!(config.status_batch_limit, 4);
        assert_eq!(config.max_wait_rounds, 2);
    }
}
