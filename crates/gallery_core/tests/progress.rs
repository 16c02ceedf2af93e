use gallery_core::{ProgressState, ProgressTracker, DEFAULT_STEP_CEILING};

#[test]
fn parses_counter_text() {
    assert_eq!(
        ProgressState::parse("3/12"),
        ProgressState {
            current: 3,
            total: Some(12)
        }
    );
    assert_eq!(
        ProgressState::parse("  Photo 2 / 7 "),
        ProgressState {
            current: 2,
            total: Some(7)
        }
    );
}

#[test]
fn other_text_has_unknown_total() {
    for text in ["", "gallery", "7", "/", "next ›"] {
        let state = ProgressState::parse(text);
        assert_eq!(state.total, None, "text {text:?}");
        assert!(!state.is_known());
        assert!(!state.indicator_complete());
    }
}

#[test]
fn indicator_complete_at_or_past_total() {
    assert!(ProgressState::parse("5/5").indicator_complete());
    assert!(ProgressState::parse("6/5").indicator_complete());
    assert!(!ProgressState::parse("4/5").indicator_complete());
    assert_eq!(ProgressState::parse("0/0"), ProgressState::unknown());
}

#[test]
fn ceiling_defaults_to_ten_and_grows_with_observed_totals() {
    let mut tracker = ProgressTracker::new();
    assert_eq!(tracker.ceiling(), DEFAULT_STEP_CEILING);

    tracker.observe(&ProgressState::parse("1/4"));
    assert_eq!(tracker.ceiling(), 10);

    tracker.observe(&ProgressState::parse("1/23"));
    tracker.observe(&ProgressState::parse("2/5"));
    tracker.observe(&ProgressState::unknown());
    assert_eq!(tracker.ceiling(), 23);
}

#[test]
fn unknown_total_completes_only_at_ceiling() {
    let tracker = ProgressTracker::new();
    let unknown = ProgressState::unknown();
    assert!(!tracker.is_complete(&unknown, 9));
    assert!(tracker.is_complete(&unknown, 10));
}

#[test]
fn known_total_completes_on_indicator() {
    let mut tracker = ProgressTracker::new();
    let state = ProgressState::parse("3/3");
    tracker.observe(&state);
    assert!(tracker.is_complete(&state, 0));
}
