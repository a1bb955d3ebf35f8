//! Loading-state container for asynchronous registry requests.
//!
//! [`RemoteData`] is the four-state snapshot a view renders from.
//! [`Remote`] owns one such snapshot plus a generation counter, and only
//! accepts results carried by the [`Ticket`] of its most recent `start`.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::ApiError;

/// Lifecycle of one asynchronous fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteData<T, E = ApiError> {
    /// No request has been made yet.
    NotAsked,
    /// A request is in flight. Earlier results are not retained.
    Loading,
    /// The request completed with an error.
    Failed(E),
    /// The request completed successfully.
    Ready(T),
}

impl<T, E> Default for RemoteData<T, E> {
    fn default() -> Self {
        RemoteData::NotAsked
    }
}

impl<T, E> RemoteData<T, E> {
    /// True before any request was made.
    pub fn is_not_asked(&self) -> bool {
        matches!(self, RemoteData::NotAsked)
    }

    /// True while a request is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, RemoteData::Loading)
    }

    /// True once a value is available.
    pub fn is_ready(&self) -> bool {
        matches!(self, RemoteData::Ready(_))
    }

    /// True when the last request failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, RemoteData::Failed(_))
    }

    /// Borrow the loaded value, if any.
    pub fn ready(&self) -> Option<&T> {
        match self {
            RemoteData::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the failure cause, if any.
    pub fn error(&self) -> Option<&E> {
        match self {
            RemoteData::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Borrow both payloads.
    pub fn as_ref(&self) -> RemoteData<&T, &E> {
        match self {
            RemoteData::NotAsked => RemoteData::NotAsked,
            RemoteData::Loading => RemoteData::Loading,
            RemoteData::Failed(error) => RemoteData::Failed(error),
            RemoteData::Ready(value) => RemoteData::Ready(value),
        }
    }

    /// Transform the ready value, keeping every other state as is.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RemoteData<U, E> {
        match self {
            RemoteData::NotAsked => RemoteData::NotAsked,
            RemoteData::Loading => RemoteData::Loading,
            RemoteData::Failed(error) => RemoteData::Failed(error),
            RemoteData::Ready(value) => RemoteData::Ready(f(value)),
        }
    }

    /// Short label for logs and status lines.
    pub fn label(&self) -> &'static str {
        match self {
            RemoteData::NotAsked => "not-asked",
            RemoteData::Loading => "loading",
            RemoteData::Failed(_) => "failed",
            RemoteData::Ready(_) => "ready",
        }
    }
}

impl<T, E> From<Result<T, E>> for RemoteData<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => RemoteData::Ready(value),
            Err(error) => RemoteData::Failed(error),
        }
    }
}

// Shared across all slots so a ticket minted by one slot never matches another.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Proof that a request was started on a [`Remote`].
///
/// Only [`Remote::start`] mints tickets, so results cannot be applied to a
/// slot that was never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    /// Generation number this ticket was issued for.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Owned loading slot with a generation guard against stale responses.
#[derive(Debug, Clone)]
pub struct Remote<T, E = ApiError> {
    state: RemoteData<T, E>,
    generation: u64,
}

impl<T, E> Default for Remote<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Remote<T, E> {
    /// A slot in the `NotAsked` state.
    pub fn new() -> Self {
        Self {
            state: RemoteData::NotAsked,
            generation: 0,
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> &RemoteData<T, E> {
        &self.state
    }

    /// Borrow the loaded value, if any.
    pub fn ready(&self) -> Option<&T> {
        self.state.ready()
    }

    /// Begin a new request, superseding any request still in flight.
    pub fn start(&mut self) -> Ticket {
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        self.generation = generation;
        self.state = RemoteData::Loading;
        Ticket { generation }
    }

    /// Start only if nothing was requested yet.
    pub fn ensure_started(&mut self) -> Option<Ticket> {
        if self.state.is_not_asked() {
            Some(self.start())
        } else {
            None
        }
    }

    /// Whether a result carried by `ticket` would still be accepted.
    pub fn accepts(&self, ticket: Ticket) -> bool {
        ticket.generation == self.generation && self.state.is_loading()
    }

    /// Complete the request identified by `ticket` with a value.
    ///
    /// Returns `false` and drops the value when the ticket was superseded.
    pub fn succeed(&mut self, ticket: Ticket, value: T) -> bool {
        if !self.accepts(ticket) {
            debug!(
                generation = ticket.generation,
                current = self.generation,
                "discarding stale response"
            );
            return false;
        }
        self.state = RemoteData::Ready(value);
        true
    }

    /// Complete the request identified by `ticket` with an error.
    pub fn fail(&mut self, ticket: Ticket, error: E) -> bool {
        if !self.accepts(ticket) {
            debug!(
                generation = ticket.generation,
                current = self.generation,
                "discarding stale failure"
            );
            return false;
        }
        self.state = RemoteData::Failed(error);
        true
    }

    /// Apply either outcome of the request identified by `ticket`.
    pub fn resolve(&mut self, ticket: Ticket, result: Result<T, E>) -> bool {
        match result {
            Ok(value) => self.succeed(ticket, value),
            Err(error) => self.fail(ticket, error),
        }
    }

    /// Forget any state and invalidate outstanding tickets.
    pub fn reset(&mut self) {
        self.generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        self.state = RemoteData::NotAsked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_asked() {
        let slot: Remote<u32> = Remote::new();
        assert!(slot.state().is_not_asked());
        assert_eq!(slot.state().label(), "not-asked");
    }

    #[test]
    fn succeed_yields_the_exact_value() {
        let mut slot: Remote<Vec<String>> = Remote::new();
        let ticket = slot.start();
        let value = vec!["lightyear".to_string(), "tomladder".to_string()];
        assert!(slot.succeed(ticket, value.clone()));
        assert_eq!(slot.state(), &RemoteData::Ready(value));
    }

    #[test]
    fn start_discards_previous_value_and_error() {
        let mut slot: Remote<u32> = Remote::new();
        let ticket = slot.start();
        slot.succeed(ticket, 7);
        slot.start();
        assert_eq!(slot.state(), &RemoteData::Loading);
        assert!(slot.ready().is_none());

        let ticket = slot.start();
        slot.fail(ticket, ApiError::Transport("refused".into()));
        assert!(slot.state().is_failed());
        slot.start();
        assert!(slot.state().error().is_none());
        assert!(!slot.accepts(ticket));
    }

    #[test]
    fn late_response_from_superseded_request_is_ignored() {
        let mut slot: Remote<&'static str> = Remote::new();
        let first = slot.start();
        let second = slot.start();

        assert!(slot.succeed(second, "second"));
        assert!(!slot.succeed(first, "first"));
        assert_eq!(slot.state(), &RemoteData::Ready("second"));

        let third = slot.start();
        assert!(!slot.fail(second, ApiError::Transport("late".into())));
        assert!(slot.state().is_loading());
        assert!(slot.succeed(third, "third"));
        assert_eq!(slot.ready(), Some(&"third"));
    }

    #[test]
    fn first_response_arriving_after_second_start_cannot_win_in_either_order() {
        let mut slot: Remote<u8> = Remote::new();
        let first = slot.start();
        let second = slot.start();
        assert!(!slot.fail(first, ApiError::Transport("slow".into())));
        assert!(slot.state().is_loading());
        assert!(slot.succeed(second, 2));
        assert_eq!(slot.ready(), Some(&2));
    }

    #[test]
    fn a_ticket_resolves_at_most_once() {
        let mut slot: Remote<u8> = Remote::new();
        let ticket = slot.start();
        assert!(slot.succeed(ticket, 1));
        assert!(!slot.succeed(ticket, 2));
        assert!(!slot.fail(ticket, ApiError::Transport("again".into())));
        assert_eq!(slot.ready(), Some(&1));
    }

    #[test]
    fn tickets_do_not_cross_slots() {
        let mut left: Remote<u8> = Remote::new();
        let mut right: Remote<u8> = Remote::new();
        let left_ticket = left.start();
        right.start();
        assert!(!right.succeed(left_ticket, 9));
        assert!(right.state().is_loading());
    }

    #[test]
    fn ensure_started_is_idempotent() {
        let mut slot: Remote<u8> = Remote::new();
        let ticket = slot.ensure_started().expect("first call starts");
        assert!(slot.ensure_started().is_none());
        slot.succeed(ticket, 3);
        assert!(slot.ensure_started().is_none());
        assert_eq!(slot.ready(), Some(&3));
    }

    #[test]
    fn reset_invalidates_in_flight_requests() {
        let mut slot: Remote<u8> = Remote::new();
        let ticket = slot.start();
        slot.reset();
        assert!(!slot.succeed(ticket, 1));
        assert!(slot.state().is_not_asked());
    }

    #[test]
    fn mixed_sequences_always_end_in_one_consistent_state() {
        let mut slot: Remote<u32> = Remote::new();
        let mut tickets = Vec::new();
        let mut expected: RemoteData<u32> = RemoteData::NotAsked;
        let mut live: Option<Ticket> = None;

        // Deterministic pseudo-random walk over start/succeed/fail.
        let mut seed: u32 = 0x2545_f491;
        for step in 0..500u32 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            match seed % 3 {
                0 => {
                    let ticket = slot.start();
                    tickets.push(ticket);
                    live = Some(ticket);
                    expected = RemoteData::Loading;
                }
                1 if !tickets.is_empty() => {
                    let ticket = tickets[(seed as usize / 3) % tickets.len()];
                    let applied = slot.succeed(ticket, step);
                    if live == Some(ticket) && expected.is_loading() {
                        assert!(applied);
                        expected = RemoteData::Ready(step);
                    } else {
                        assert!(!applied);
                    }
                }
                2 if !tickets.is_empty() => {
                    let ticket = tickets[(seed as usize / 3) % tickets.len()];
                    let error = ApiError::Transport(format!("step {step}"));
                    let applied = slot.fail(ticket, error.clone());
                    if live == Some(ticket) && expected.is_loading() {
                        assert!(applied);
                        expected = RemoteData::Failed(error);
                    } else {
                        assert!(!applied);
                    }
                }
                _ => {}
            }
            assert_eq!(slot.state(), &expected);
        }
    }

    #[test]
    fn map_and_conversions_preserve_state_shape() {
        let ready: RemoteData<u8> = Ok(2).into();
        assert_eq!(ready.map(|v| v * 2), RemoteData::Ready(4));
        let failed: RemoteData<u8> = Err(ApiError::Decode("bad".into())).into();
        assert!(failed.clone().map(|v| v + 1).is_failed());
        assert_eq!(
            failed.as_ref().error().map(|e| e.to_string()),
            Some("unexpected response: bad".to_string())
        );
    }
}
