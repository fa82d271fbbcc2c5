//! Runtime tunables for the query execution core.
//!
//! The original hardcodes these as magic numbers scattered through the
//! optimizer; we collect them into one struct so tests can shrink the
//! takeover thresholds instead of inserting thousands of documents.

/// Tunable constants for the planner, racer, and cursor subsystems.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreConfig {
    /// Matches from a single in-order plan that trigger takeover.
    pub match_takeover: u64,
    /// Records scanned by any plan that trigger takeover.
    pub scan_takeover: u64,
    /// Entries a `DupSet` holds inline before upgrading to a hash set.
    pub dupset_array_capacity: usize,
    /// Idle timeout, in seconds, after which a `ClientCursor` is dropped.
    pub idle_cursor_timeout_secs: u64,
    /// Writes to a namespace after which its `PlanCache` entries are
    /// invalidated.
    pub plan_cache_invalidate_after_writes: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            match_takeover: 101,
            scan_takeover: 120,
            dupset_array_capacity: 540,
            idle_cursor_timeout_secs: 600,
            plan_cache_invalidate_after_writes: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_design_constants() {
        let config = CoreConfig::default();
        assert_eq!(config.match_takeover, 101);
        assert_eq!(config.scan_takeover, 120);
        assert_eq!(config.dupset_array_capacity, 540);
        assert_eq!(config.idle_cursor_timeout_secs, 600);
        assert_eq!(config.plan_cache_invalidate_after_writes, 1000);
    }

    #[test]
    fn test_overridable_for_tests() {
        let config = CoreConfig { match_takeover: 3, scan_takeover: 5, ..CoreConfig::default() };
        assert_eq!(config.match_takeover, 3);
        assert_eq!(config.scan_takeover, 5);
    }
}
