//! Append-only negotiation event log
//!
//! Each participant's state machine owns exactly one `EventLog` and reasons
//! over it as a whole: guards are queries over the log, and a peer's view
//! arrives as a wholesale replacement rather than a diff. The log preserves
//! insertion order and accepts at most one `offer` and one `answer`
//! (keep-first: a duplicate is rejected and the caller drops it).

use crate::event::NegotiationEvent;

/// Ordered log of negotiation events owned by one participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<NegotiationEvent>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, preserving insertion order
    ///
    /// Returns `false` without appending when the log already holds an
    /// `offer` (for an offer) or an `answer` (for an answer). Candidate and
    /// gathered events are always accepted.
    pub fn append(&mut self, event: NegotiationEvent) -> bool {
        match &event {
            NegotiationEvent::Offer { .. } if self.offer_description().is_some() => return false,
            NegotiationEvent::Answer { .. } if self.answer_description().is_some() => return false,
            _ => {}
        }
        self.events.push(event);
        true
    }

    /// Replace the whole log with a peer-supplied view
    ///
    /// This is the SET_EVENTS semantics: replace, not merge. Events the
    /// incoming batch does not include are forgotten.
    pub fn replace(&mut self, events: Vec<NegotiationEvent>) {
        self.events = events;
    }

    /// All events in insertion order
    pub fn events(&self) -> &[NegotiationEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The offer's session description, if an offer has been accepted
    pub fn offer_description(&self) -> Option<&str> {
        self.events.iter().find_map(|event| match event {
            NegotiationEvent::Offer {
                session_description,
                ..
            } => Some(session_description.as_str()),
            _ => None,
        })
    }

    /// The answer's session description, if an answer has been accepted
    pub fn answer_description(&self) -> Option<&str> {
        self.events.iter().find_map(|event| match event {
            NegotiationEvent::Answer {
                session_description,
                ..
            } => Some(session_description.as_str()),
            _ => None,
        })
    }

    /// All candidate events as `(sender, candidate)`, in log order
    pub fn candidates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.events.iter().filter_map(|event| match event {
            NegotiationEvent::Candidate { sender, candidate } => {
                Some((sender.as_str(), candidate.as_str()))
            }
            _ => None,
        })
    }

    /// Candidates from every sender except `username`, in log order
    pub fn peer_candidates<'a>(
        &'a self,
        username: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.candidates().filter(move |(sender, _)| *sender != username)
    }

    /// Whether `sender` has emitted its gathered sentinel
    pub fn gathered_by(&self, sender: &str) -> bool {
        self.events.iter().any(|event| {
            matches!(event, NegotiationEvent::Gathered { sender: s } if s == sender)
        })
    }

    /// Whether any sender other than `sender` has emitted its gathered sentinel
    pub fn gathered_by_other(&self, sender: &str) -> bool {
        self.events.iter().any(|event| {
            matches!(event, NegotiationEvent::Gathered { sender: s } if s != sender)
        })
    }
}
