//! Duration Policy Module
//!
//! Classifies cache keys into volatility classes and returns the
//! applicable time-to-live. Keys are free-form strings composed by
//! callers, so classification is by substring match against an ordered
//! class table: more specific classes are tested before more general
//! ones, otherwise a key like `validation_teams_report` would pick up the
//! organizational-data TTL just for containing `teams`.

// == TTL Constants ==
/// TTL for validation lookup data (5 minutes)
pub const VALIDATION_TTL_MS: u64 = 5 * 60 * 1000;

/// TTL for live status / presence data (30 seconds)
pub const LIVE_STATUS_TTL_MS: u64 = 30 * 1000;

/// TTL for static organizational data (2 hours)
pub const STATIC_TTL_MS: u64 = 2 * 60 * 60 * 1000;

/// Fallback TTL for dynamic data (10 minutes)
pub const DYNAMIC_TTL_MS: u64 = 10 * 60 * 1000;

/// Ordered volatility classes, most specific first. Each class is a set
/// of key substrings and the TTL applied when one of them matches.
const VOLATILITY_CLASSES: &[(&[&str], u64)] = &[
    (&["validation"], VALIDATION_TTL_MS),
    (&["live_status", "presence", "realtime"], LIVE_STATUS_TTL_MS),
    (
        &["teams", "org_structure", "departments", "holidays"],
        STATIC_TTL_MS,
    ),
];

// == Duration Policy ==
/// Resolves a cache key to a TTL in milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationPolicy;

impl DurationPolicy {
    /// Creates a new policy resolver.
    pub fn new() -> Self {
        Self
    }

    // == Resolve ==
    /// Returns the TTL for a key by volatility class.
    ///
    /// Classes are tested in declaration order; the first class with a
    /// matching substring wins. Keys matching no class fall back to the
    /// dynamic-data TTL.
    pub fn resolve(&self, key: &str) -> u64 {
        for (needles, ttl) in VOLATILITY_CLASSES {
            if needles.iter().any(|needle| key.contains(needle)) {
                return *ttl;
            }
        }
        DYNAMIC_TTL_MS
    }

    // == Resolve With Frequency ==
    /// Returns the TTL for a key, honoring an observed change frequency.
    ///
    /// When a frequency is supplied it takes precedence over class
    /// matching: `ttl = dynamic_base / max(0.1, frequency)`, so higher
    /// observed churn linearly shortens the TTL. The result is clamped to
    /// `[dynamic_base / 10, dynamic_base * 10]`: churn can never drive
    /// the TTL to zero, and a near-frozen source can never pin an entry
    /// for more than 10x the baseline.
    ///
    /// # Arguments
    /// * `key` - The cache key
    /// * `change_frequency` - Observed changes per baseline window, if known
    pub fn resolve_with_frequency(&self, key: &str, change_frequency: Option<f64>) -> u64 {
        match change_frequency {
            Some(freq) => {
                let scaled = DYNAMIC_TTL_MS as f64 / freq.max(0.1);
                let floor = DYNAMIC_TTL_MS as f64 / 10.0;
                let ceil = DYNAMIC_TTL_MS as f64 * 10.0;
                scaled.clamp(floor, ceil) as u64
            }
            None => self.resolve(key),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_class() {
        let policy = DurationPolicy::new();
        assert_eq!(policy.resolve("teams_list"), STATIC_TTL_MS);
        assert_eq!(policy.resolve("org_structure_tree"), STATIC_TTL_MS);
        assert_eq!(policy.resolve("holidays_2026"), STATIC_TTL_MS);
    }

    #[test]
    fn test_live_status_class() {
        let policy = DurationPolicy::new();
        assert_eq!(policy.resolve("live_status_board"), LIVE_STATUS_TTL_MS);
        assert_eq!(policy.resolve("user_presence_7"), LIVE_STATUS_TTL_MS);
    }

    #[test]
    fn test_dynamic_fallback() {
        let policy = DurationPolicy::new();
        assert_eq!(policy.resolve("sprint_burndown_12"), DYNAMIC_TTL_MS);
        assert_eq!(policy.resolve("availability_week_3"), DYNAMIC_TTL_MS);
    }

    #[test]
    fn test_classification_precedence() {
        let policy = DurationPolicy::new();

        // Contains both "validation" and "teams"; the more specific
        // validation class must win over the organizational class.
        assert_eq!(policy.resolve("validation_teams_report"), VALIDATION_TTL_MS);
    }

    #[test]
    fn test_live_status_beats_static() {
        let policy = DurationPolicy::new();
        assert_eq!(policy.resolve("teams_live_status"), LIVE_STATUS_TTL_MS);
    }

    #[test]
    fn test_frequency_override_takes_precedence() {
        let policy = DurationPolicy::new();

        // A static-class key with an observed frequency uses the dynamic
        // baseline formula, not the class TTL.
        let ttl = policy.resolve_with_frequency("teams_list", Some(2.0));
        assert_eq!(ttl, DYNAMIC_TTL_MS / 2);
    }

    #[test]
    fn test_frequency_none_falls_back_to_class() {
        let policy = DurationPolicy::new();
        assert_eq!(
            policy.resolve_with_frequency("teams_list", None),
            STATIC_TTL_MS
        );
    }

    #[test]
    fn test_frequency_floor() {
        let policy = DurationPolicy::new();

        // Very high churn bottoms out at 10% of the dynamic baseline
        let ttl = policy.resolve_with_frequency("availability", Some(1000.0));
        assert_eq!(ttl, DYNAMIC_TTL_MS / 10);
    }

    #[test]
    fn test_frequency_ceiling() {
        let policy = DurationPolicy::new();

        // Near-zero churn is capped at 10x the dynamic baseline
        let ttl = policy.resolve_with_frequency("availability", Some(0.01));
        assert_eq!(ttl, DYNAMIC_TTL_MS * 10);
    }

    #[test]
    fn test_class_table_has_no_empty_needles() {
        for (needles, _) in VOLATILITY_CLASSES {
            for needle in *needles {
                assert!(!needle.is_empty(), "empty needle would match every key");
            }
        }
    }
}
