/// Lifecycle of one unit's association
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Negotiating,
    Associated,
    Sending,
    Releasing,
    Closed,
    /// Association could not be established or negotiated
    Failed,
}

impl SessionState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Negotiating)
                | (Connecting, Failed)
                | (Negotiating, Associated)
                | (Negotiating, Failed)
                | (Associated, Sending)
                | (Sending, Releasing)
                | (Releasing, Closed)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
