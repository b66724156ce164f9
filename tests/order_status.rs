use night_market_api::services::seller_service::{ORDER_STATUSES, status_transition_allowed};

#[test]
fn happy_path_reaches_completed() {
    assert!(status_transition_allowed("pending", "confirmed"));
    assert!(status_transition_allowed("confirmed", "preparing"));
    assert!(status_transition_allowed("preparing", "ready"));
    assert!(status_transition_allowed("ready", "completed"));
}

#[test]
fn cancellation_is_allowed_until_ready() {
    assert!(status_transition_allowed("pending", "cancelled"));
    assert!(status_transition_allowed("confirmed", "cancelled"));
    assert!(status_transition_allowed("preparing", "cancelled"));
    assert!(!status_transition_allowed("ready", "cancelled"));
}

#[test]
fn terminal_states_have_no_exits() {
    for to in ORDER_STATUSES {
        assert!(!status_transition_allowed("completed", to));
        assert!(!status_transition_allowed("cancelled", to));
    }
}

#[test]
fn skipping_states_is_rejected() {
    assert!(!status_transition_allowed("pending", "ready"));
    assert!(!status_transition_allowed("pending", "completed"));
    assert!(!status_transition_allowed("confirmed", "completed"));
}

#[test]
fn same_state_is_not_a_transition() {
    for status in ORDER_STATUSES {
        assert!(!status_transition_allowed(status, status));
    }
}
