//! Negotiation state machine
//!
//! An explicit finite-state machine, one instance per local participant.
//! `handle` is the transition function: it consumes a [`Command`], mutates
//! `(state, log)` when the command's guard holds, and returns the
//! [`Effect`]s for the driver to execute. Guards are pure predicates over
//! the participant's role and the event log; a command whose guard fails is
//! a silent no-op: no transition, no error, no log entry.
//!
//! The `connecting.offering` / `connecting.answering` / `connecting.peering`
//! hierarchy of the negotiation protocol is kept as composite state tags
//! rather than nested machines.

use std::fmt;

use tracing::{debug, warn};

use pairlink_protocol::{EventLog, NegotiationEvent};

/// Phase of one side's offer/answer production
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherPhase {
    /// Waiting for the connection object to produce the description
    Creating,
    /// Description applied locally; candidates arriving incrementally
    Gathering,
    /// Candidate gathering finished for this side
    Gathered,
}

/// Negotiation progress of one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// No action taken yet
    Disconnected,
    /// Host path: producing the offer and its candidates
    Offering(GatherPhase),
    /// Guest path: producing the answer and its candidates
    Answering(GatherPhase),
    /// Host only: applying the final descriptions and peer candidates
    Peering,
    /// Terminal
    Connected,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = |p: &GatherPhase| match p {
            GatherPhase::Creating => "creating",
            GatherPhase::Gathering => "gathering",
            GatherPhase::Gathered => "gathered",
        };
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Offering(p) => write!(f, "connecting.offering.{}", phase(p)),
            Self::Answering(p) => write!(f, "connecting.answering.{}", phase(p)),
            Self::Peering => write!(f, "connecting.peering"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Input to the transition function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the host path (guard: host role)
    CreateOffer,
    /// Start the guest path (guard: guest role, offer present, host gathered)
    CreateAnswer,
    /// Host finalization (guard: host role, offer + answer + guest gathered)
    AddAnswer,
    /// Driver feedback: offer created and applied locally
    OfferCreated {
        /// The serialized description the connection produced
        session_description: String,
    },
    /// Driver feedback: answer created and applied locally
    AnswerCreated {
        /// The serialized description the connection produced
        session_description: String,
    },
    /// Driver feedback: the connection produced one local candidate
    CandidateGathered {
        /// The serialized candidate
        candidate: String,
    },
    /// Driver feedback: local candidate gathering finished
    GatheringComplete,
    /// Driver feedback: final descriptions and peer candidates applied
    AnswerApplied,
    /// Wholesale log replacement with a peer's view (any state)
    SetEvents(Vec<NegotiationEvent>),
}

/// Work the driver must perform after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Create an offer and apply it as the local description
    CreateOffer,
    /// Apply the remote offer, create an answer, apply it locally, and add
    /// the peer candidates currently in the log
    CreateAnswer,
    /// Apply offer as local, answer as remote, and every peer candidate in
    /// log order
    ApplyAnswer,
    /// Push this full log snapshot to the relay
    PublishEvents(Vec<NegotiationEvent>),
}

/// One participant's negotiation state machine
#[derive(Debug, Clone)]
pub struct NegotiationMachine {
    host: String,
    username: String,
    state: NegotiationState,
    log: EventLog,
}

impl NegotiationMachine {
    /// Create a machine for a participant in the session identified by `host`
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            state: NegotiationState::Disconnected,
            log: EventLog::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Whether this participant plays the offering role
    pub fn is_host(&self) -> bool {
        self.username == self.host
    }

    fn is_guest(&self) -> bool {
        self.username != self.host
    }

    fn can_create_offer(&self) -> bool {
        self.state == NegotiationState::Disconnected && self.is_host()
    }

    fn can_create_answer(&self) -> bool {
        self.state == NegotiationState::Disconnected
            && self.is_guest()
            && self.log.offer_description().is_some()
            && self.log.gathered_by(&self.host)
    }

    fn can_add_answer(&self) -> bool {
        self.state == NegotiationState::Offering(GatherPhase::Gathered)
            && self.is_host()
            && self.log.offer_description().is_some()
            && self.log.answer_description().is_some()
            && self.log.gathered_by_other(&self.host)
    }

    /// The guarded command the driver should dispatch next, if any
    ///
    /// This is the reactive probe: after every handled command the driver
    /// asks again, so a log update immediately unlocks whatever transition
    /// it enabled.
    pub fn next_ready_command(&self) -> Option<Command> {
        if self.can_create_offer() {
            Some(Command::CreateOffer)
        } else if self.can_create_answer() {
            Some(Command::CreateAnswer)
        } else if self.can_add_answer() {
            Some(Command::AddAnswer)
        } else {
            None
        }
    }

    /// Transition function
    ///
    /// Returns the effects the driver must execute. An unsatisfied guard or
    /// a command that does not apply in the current state returns no
    /// effects and changes nothing.
    pub fn handle(&mut self, command: Command) -> Vec<Effect> {
        use GatherPhase::*;
        use NegotiationState::*;

        match command {
            Command::CreateOffer => {
                if !self.can_create_offer() {
                    return self.rejected("CREATE_OFFER");
                }
                self.transition(Offering(Creating));
                vec![Effect::CreateOffer]
            }

            Command::CreateAnswer => {
                if !self.can_create_answer() {
                    return self.rejected("CREATE_ANSWER");
                }
                self.transition(Answering(Creating));
                vec![Effect::CreateAnswer]
            }

            Command::AddAnswer => {
                if !self.can_add_answer() {
                    return self.rejected("ADD_ANSWER");
                }
                self.transition(Peering);
                vec![Effect::ApplyAnswer]
            }

            Command::OfferCreated {
                session_description,
            } => {
                if self.state != Offering(Creating) {
                    return self.rejected("OFFER_CREATED");
                }
                let event = NegotiationEvent::offer(self.username.as_str(), session_description);
                self.transition(Offering(Gathering));
                self.record(event)
            }

            Command::AnswerCreated {
                session_description,
            } => {
                if self.state != Answering(Creating) {
                    return self.rejected("ANSWER_CREATED");
                }
                let event = NegotiationEvent::answer(self.username.as_str(), session_description);
                self.transition(Answering(Gathering));
                self.record(event)
            }

            Command::CandidateGathered { candidate } => {
                match self.state {
                    Offering(Gathering) | Answering(Gathering) => {}
                    _ => return self.rejected("CANDIDATE_GATHERED"),
                }
                let event = NegotiationEvent::candidate(self.username.as_str(), candidate);
                self.record(event)
            }

            Command::GatheringComplete => {
                match self.state {
                    Offering(Gathering) => self.transition(Offering(Gathered)),
                    Answering(Gathering) => self.transition(Answering(Gathered)),
                    _ => return self.rejected("GATHERING_COMPLETE"),
                }
                let event = NegotiationEvent::gathered(self.username.as_str());
                self.record(event)
            }

            Command::AnswerApplied => {
                if self.state != Peering {
                    return self.rejected("ANSWER_APPLIED");
                }
                self.transition(Connected);
                vec![]
            }

            Command::SetEvents(events) => {
                debug!(count = events.len(), "replacing event log with peer view");
                self.log.replace(events);
                vec![]
            }
        }
    }

    fn transition(&mut self, next: NegotiationState) {
        debug!(from = %self.state, to = %next, username = %self.username, "transition");
        self.state = next;
    }

    fn record(&mut self, event: NegotiationEvent) -> Vec<Effect> {
        if !self.log.append(event.clone()) {
            warn!(kind = event.kind(), "duplicate event dropped");
        }
        vec![Effect::PublishEvents(self.log.events().to_vec())]
    }

    fn rejected(&self, command: &str) -> Vec<Effect> {
        debug!(command, state = %self.state, "command not permitted, ignoring");
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer_from_host(machine: &mut NegotiationMachine) {
        machine.handle(Command::CreateOffer);
        machine.handle(Command::OfferCreated {
            session_description: "offer-sdp".into(),
        });
    }

    #[test]
    fn host_walks_the_offering_path() {
        let mut machine = NegotiationMachine::new("h1", "h1");
        assert_eq!(machine.state(), NegotiationState::Disconnected);

        let effects = machine.handle(Command::CreateOffer);
        assert_eq!(effects, [Effect::CreateOffer]);
        assert_eq!(
            machine.state(),
            NegotiationState::Offering(GatherPhase::Creating)
        );

        machine.handle(Command::OfferCreated {
            session_description: "offer-sdp".into(),
        });
        assert_eq!(
            machine.state(),
            NegotiationState::Offering(GatherPhase::Gathering)
        );
        assert_eq!(machine.log().offer_description(), Some("offer-sdp"));

        machine.handle(Command::CandidateGathered {
            candidate: "c0".into(),
        });
        machine.handle(Command::CandidateGathered {
            candidate: "c1".into(),
        });
        assert_eq!(
            machine.state(),
            NegotiationState::Offering(GatherPhase::Gathering)
        );

        machine.handle(Command::GatheringComplete);
        assert_eq!(
            machine.state(),
            NegotiationState::Offering(GatherPhase::Gathered)
        );
        assert!(machine.log().gathered_by("h1"));
    }

    #[test]
    fn create_offer_never_transitions_for_guests() {
        for username in ["g1", "guest", "h2", ""] {
            let mut machine = NegotiationMachine::new("h1", username);
            let effects = machine.handle(Command::CreateOffer);
            assert!(effects.is_empty());
            assert_eq!(machine.state(), NegotiationState::Disconnected);
            assert!(machine.log().is_empty());
        }
    }

    #[test]
    fn create_answer_requires_offer_and_host_gathered() {
        let mut machine = NegotiationMachine::new("h1", "g1");
        assert!(machine.handle(Command::CreateAnswer).is_empty());

        machine.handle(Command::SetEvents(vec![NegotiationEvent::offer(
            "h1", "offer-sdp",
        )]));
        assert!(machine.handle(Command::CreateAnswer).is_empty());

        machine.handle(Command::SetEvents(vec![
            NegotiationEvent::offer("h1", "offer-sdp"),
            NegotiationEvent::gathered("h1"),
        ]));
        let effects = machine.handle(Command::CreateAnswer);
        assert_eq!(effects, [Effect::CreateAnswer]);
        assert_eq!(
            machine.state(),
            NegotiationState::Answering(GatherPhase::Creating)
        );
    }

    #[test]
    fn host_role_never_takes_the_answering_path() {
        let mut machine = NegotiationMachine::new("h1", "h1");
        machine.handle(Command::SetEvents(vec![
            NegotiationEvent::offer("h1", "offer-sdp"),
            NegotiationEvent::gathered("h1"),
        ]));

        // Still disconnected, offer and host-gathered both present: only
        // the role guard stands between the host and CREATE_ANSWER.
        assert!(machine.handle(Command::CreateAnswer).is_empty());
        assert_eq!(machine.state(), NegotiationState::Disconnected);
    }

    #[test]
    fn add_answer_requires_answer_and_guest_gathered() {
        let mut machine = NegotiationMachine::new("h1", "h1");
        offer_from_host(&mut machine);
        machine.handle(Command::GatheringComplete);
        assert_eq!(
            machine.state(),
            NegotiationState::Offering(GatherPhase::Gathered)
        );

        assert!(machine.handle(Command::AddAnswer).is_empty());

        // Peer view arrives: answer plus the guest's gathered sentinel.
        machine.handle(Command::SetEvents(vec![
            NegotiationEvent::offer("h1", "offer-sdp"),
            NegotiationEvent::gathered("h1"),
            NegotiationEvent::answer("g1", "answer-sdp"),
            NegotiationEvent::gathered("g1"),
        ]));
        assert_eq!(machine.next_ready_command(), Some(Command::AddAnswer));

        let effects = machine.handle(Command::AddAnswer);
        assert_eq!(effects, [Effect::ApplyAnswer]);
        assert_eq!(machine.state(), NegotiationState::Peering);

        machine.handle(Command::AnswerApplied);
        assert_eq!(machine.state(), NegotiationState::Connected);
    }

    #[test]
    fn guest_path_ends_at_gathered() {
        let mut machine = NegotiationMachine::new("h1", "g1");
        machine.handle(Command::SetEvents(vec![
            NegotiationEvent::offer("h1", "offer-sdp"),
            NegotiationEvent::gathered("h1"),
        ]));
        machine.handle(Command::CreateAnswer);
        machine.handle(Command::AnswerCreated {
            session_description: "answer-sdp".into(),
        });
        machine.handle(Command::CandidateGathered {
            candidate: "gc0".into(),
        });
        machine.handle(Command::GatheringComplete);

        assert_eq!(
            machine.state(),
            NegotiationState::Answering(GatherPhase::Gathered)
        );
        assert_eq!(machine.next_ready_command(), None);
    }

    #[test]
    fn candidates_outside_gathering_are_dropped() {
        let mut machine = NegotiationMachine::new("h1", "h1");
        let effects = machine.handle(Command::CandidateGathered {
            candidate: "early".into(),
        });
        assert!(effects.is_empty());
        assert!(machine.log().is_empty());
    }

    #[test]
    fn set_events_replays_idempotently() {
        let view = vec![
            NegotiationEvent::offer("h1", "offer-sdp"),
            NegotiationEvent::gathered("h1"),
        ];
        let mut machine = NegotiationMachine::new("h1", "g1");
        machine.handle(Command::SetEvents(view.clone()));
        let log_once = machine.log().clone();
        machine.handle(Command::SetEvents(view));
        assert_eq!(machine.log(), &log_once);
    }

    #[test]
    fn every_local_append_publishes_the_full_log() {
        let mut machine = NegotiationMachine::new("h1", "h1");
        machine.handle(Command::CreateOffer);
        let effects = machine.handle(Command::OfferCreated {
            session_description: "offer-sdp".into(),
        });
        assert_eq!(
            effects,
            [Effect::PublishEvents(vec![NegotiationEvent::offer(
                "h1",
                "offer-sdp"
            )])]
        );

        let effects = machine.handle(Command::CandidateGathered {
            candidate: "c0".into(),
        });
        match &effects[..] {
            [Effect::PublishEvents(events)] => assert_eq!(events.len(), 2),
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[test]
    fn state_paths_render_hierarchically() {
        assert_eq!(NegotiationState::Disconnected.to_string(), "disconnected");
        assert_eq!(
            NegotiationState::Offering(GatherPhase::Gathering).to_string(),
            "connecting.offering.gathering"
        );
        assert_eq!(NegotiationState::Peering.to_string(), "connecting.peering");
        assert_eq!(NegotiationState::Connected.to_string(), "connected");
    }
}
