//! Request tokens and the per-stream coordinator that drops superseded results.
//!
//! Workers may answer in any order. Each logical query stream keeps the last token it issued;
//! a response is applied only when it carries exactly that token.

use std::fmt;

/// Identifies one request on one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken {
    pub request_id: u64,
    pub generation: u64,
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@g{}", self.request_id, self.generation)
    }
}

/// The logical query streams of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Downsample,
    Aggregate,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Downsample => f.write_str("downsample"),
            StreamKind::Aggregate => f.write_str("aggregate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Pending(RequestToken),
    Resolved(RequestToken),
}

/// Verdict for an incoming response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Accepted,
    /// Token is not the latest issued one, or it was already resolved.
    Stale,
    /// Current token, but an empty result arrived where rows were expected.
    SuppressedEmpty,
}

/// True when `token` is the most recently issued token.
#[inline]
pub fn is_current(last_issued: Option<RequestToken>, token: RequestToken) -> bool {
    last_issued == Some(token)
}

/// Token bookkeeping for one logical query stream.
#[derive(Debug, Clone)]
pub struct StreamCoordinator {
    kind: StreamKind,
    next_request_id: u64,
    generation: u64,
    last_issued: Option<RequestToken>,
    last_resolved: Option<RequestToken>,
    expect_non_empty: bool,
}

impl StreamCoordinator {
    pub fn new(kind: StreamKind) -> Self {
        StreamCoordinator {
            kind,
            next_request_id: 0,
            generation: 0,
            last_issued: None,
            last_resolved: None,
            expect_non_empty: false,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Mints the token for a new request; any earlier pending request is superseded.
    ///
    /// `expect_non_empty` records whether the caller knows the answer must contain rows.
    pub fn issue(&mut self, expect_non_empty: bool) -> RequestToken {
        self.next_request_id += 1;
        self.generation += 1;
        let token = RequestToken {
            request_id: self.next_request_id,
            generation: self.generation,
        };
        self.last_issued = Some(token);
        self.expect_non_empty = expect_non_empty;
        token
    }

    /// Supersedes whatever is in flight without issuing a new request.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.last_issued = None;
    }

    /// Decides whether a response for `token` should be delivered, and records it if so.
    pub fn accept(&mut self, token: RequestToken, result_is_empty: bool) -> Acceptance {
        if !is_current(self.last_issued, token) || self.last_resolved == Some(token) {
            return Acceptance::Stale;
        }
        if self.kind == StreamKind::Downsample && self.expect_non_empty && result_is_empty {
            return Acceptance::SuppressedEmpty;
        }
        self.last_resolved = Some(token);
        Acceptance::Accepted
    }

    pub fn state(&self) -> StreamState {
        match (self.last_issued, self.last_resolved) {
            (None, _) => StreamState::Idle,
            (Some(issued), Some(resolved)) if issued == resolved => StreamState::Resolved(issued),
            (Some(issued), _) => StreamState::Pending(issued),
        }
    }

    pub fn last_issued(&self) -> Option<RequestToken> {
        self.last_issued
    }

    pub fn last_resolved(&self) -> Option<RequestToken> {
        self.last_resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_monotonic() {
        let mut c = StreamCoordinator::new(StreamKind::Aggregate);
        let t1 = c.issue(true);
        let t2 = c.issue(true);
        assert!(t2.request_id > t1.request_id);
        assert!(t2.generation > t1.generation);
    }

    #[test]
    fn test_state_transitions() {
        let mut c = StreamCoordinator::new(StreamKind::Aggregate);
        assert_eq!(c.state(), StreamState::Idle);
        let t1 = c.issue(true);
        assert_eq!(c.state(), StreamState::Pending(t1));
        assert_eq!(c.accept(t1, false), Acceptance::Accepted);
        assert_eq!(c.state(), StreamState::Resolved(t1));
        // duplicate delivery is not applied twice
        assert_eq!(c.accept(t1, false), Acceptance::Stale);
    }

    #[test]
    fn test_only_latest_token_applies_in_either_order() {
        let mut c = StreamCoordinator::new(StreamKind::Downsample);
        let t1 = c.issue(true);
        let t2 = c.issue(true);
        assert_eq!(c.accept(t2, false), Acceptance::Accepted);
        assert_eq!(c.accept(t1, false), Acceptance::Stale);

        let mut c = StreamCoordinator::new(StreamKind::Downsample);
        let t1 = c.issue(true);
        let t2 = c.issue(true);
        assert_eq!(c.accept(t1, false), Acceptance::Stale);
        assert_eq!(c.accept(t2, false), Acceptance::Accepted);
        assert_eq!(c.last_resolved(), Some(t2));
    }

    #[test]
    fn test_empty_downsample_suppressed_when_rows_expected() {
        let mut c = StreamCoordinator::new(StreamKind::Downsample);
        let t = c.issue(true);
        assert_eq!(c.accept(t, true), Acceptance::SuppressedEmpty);
        assert_eq!(c.state(), StreamState::Pending(t));

        let t = c.issue(false);
        assert_eq!(c.accept(t, true), Acceptance::Accepted);
    }

    #[test]
    fn test_empty_aggregate_is_never_suppressed() {
        let mut c = StreamCoordinator::new(StreamKind::Aggregate);
        let t = c.issue(true);
        assert_eq!(c.accept(t, true), Acceptance::Accepted);
    }

    #[test]
    fn test_invalidate_drops_in_flight() {
        let mut c = StreamCoordinator::new(StreamKind::Aggregate);
        let t = c.issue(true);
        c.invalidate();
        assert_eq!(c.state(), StreamState::Idle);
        assert_eq!(c.accept(t, false), Acceptance::Stale);
        let t2 = c.issue(true);
        assert!(t2.generation > t.generation + 1);
    }

    #[test]
    fn test_is_current() {
        let t = RequestToken { request_id: 4, generation: 9 };
        assert!(is_current(Some(t), t));
        assert!(!is_current(None, t));
        assert!(!is_current(Some(RequestToken { request_id: 4, generation: 10 }), t));
    }
}
