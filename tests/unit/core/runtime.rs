//! Unit tests for refresh runtime helpers

use cropledger::core::runtime::{FallbackTracker, RuntimeConfig};

#[test]
fn test_runtime_config_default() {
    let config = RuntimeConfig::default();
    assert_eq!(config.refresh_interval_seconds, 30);
    assert_eq!(config.fallback_warn_after, 3);
}

#[test]
fn test_fallback_tracker_warns_once_at_threshold() {
    let mut tracker = FallbackTracker::new(3);
    let serre = vec!["serre".to_string()];

    assert!(tracker.observe(&serre).is_empty());
    assert!(tracker.observe(&serre).is_empty());
    assert_eq!(tracker.observe(&serre), serre);
    assert!(tracker.observe(&serre).is_empty());
    assert_eq!(tracker.streak("serre"), 4);
}

#[test]
fn test_fallback_tracker_resets_streak_on_clean_cycle() {
    let mut tracker = FallbackTracker::new(2);
    let all = vec!["all".to_string()];

    tracker.observe(&all);
    tracker.observe(&[]);
    assert_eq!(tracker.streak("all"), 0);
    assert!(tracker.observe(&all).is_empty());
    assert_eq!(tracker.observe(&all), all);
}

#[test]
fn test_fallback_tracker_zero_threshold_never_warns() {
    let mut tracker = FallbackTracker::new(0);
    for _ in 0..5 {
        assert!(tracker.observe(&["all".to_string()]).is_empty());
    }
}
