//! Negotiation driver
//!
//! The async shell around the state machine. It owns the connection
//! capability and the signaling handle, executes the machine's effects
//! (awaiting every connection operation before the resulting event is
//! appended, so guard evaluation always sees a consistent log), and runs
//! the reactive loop: after every handled command it asks the machine
//! which guarded command is now enabled and dispatches it.
//!
//! Envelope handling mirrors the client protocol: an envelope whose sender
//! is the local username is the relay echoing us back and is discarded; a
//! `get` is answered with the full local log; a `send` replaces the log
//! wholesale and lets the machine re-evaluate.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use pairlink_protocol::Envelope;

use crate::connection::{ConnectionEvent, PeerConnectionApi};
use crate::error::{Error, Result};
use crate::machine::{Command, Effect, NegotiationMachine, NegotiationState};
use crate::signaling::SignalingHandle;

/// Drives one participant's negotiation to completion
pub struct NegotiationDriver {
    machine: NegotiationMachine,
    connection: Arc<dyn PeerConnectionApi>,
    connection_events: mpsc::Receiver<ConnectionEvent>,
    signaling: SignalingHandle,
    inbound: mpsc::Receiver<Envelope>,
}

impl NegotiationDriver {
    /// Assemble a driver from its collaborators
    ///
    /// `connection_events` carries the connection object's candidate
    /// callbacks; `inbound` carries validated envelopes from the signaling
    /// transport.
    pub fn new(
        machine: NegotiationMachine,
        connection: Arc<dyn PeerConnectionApi>,
        connection_events: mpsc::Receiver<ConnectionEvent>,
        signaling: SignalingHandle,
        inbound: mpsc::Receiver<Envelope>,
    ) -> Self {
        Self {
            machine,
            connection,
            connection_events,
            signaling,
            inbound,
        }
    }

    pub fn machine(&self) -> &NegotiationMachine {
        &self.machine
    }

    /// Announce ourselves to the session and kick off the local role
    ///
    /// A guest requests the current event log from the session; the host
    /// has nothing to ask for and immediately starts offering.
    pub async fn start(&mut self) -> Result<()> {
        if !self.machine.is_host() {
            debug!("requesting current event log from session");
            self.signaling.get_events().await?;
        }
        self.drive().await
    }

    /// Dispatch the next enabled guarded command, if any
    pub async fn drive(&mut self) -> Result<()> {
        if let Some(command) = self.machine.next_ready_command() {
            self.dispatch(command).await?;
        }
        Ok(())
    }

    /// Run until the signaling connection closes
    ///
    /// Returns the final machine so callers can inspect where the
    /// negotiation ended up. There is no timeout: a peer that never shows
    /// up leaves the negotiation parked, by design.
    pub async fn run(mut self) -> Result<NegotiationMachine> {
        self.start().await?;
        let mut connection_closed = false;
        loop {
            tokio::select! {
                envelope = self.inbound.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(envelope).await?,
                    None => break,
                },
                event = self.connection_events.recv(), if !connection_closed => match event {
                    Some(event) => self.handle_connection_event(event).await?,
                    None => connection_closed = true,
                },
            }
            if self.machine.state() == NegotiationState::Connected {
                info!(username = %self.machine.username(), "negotiation complete");
                break;
            }
        }
        Ok(self.machine)
    }

    /// Apply one envelope received from the relay
    pub async fn handle_envelope(&mut self, envelope: Envelope) -> Result<()> {
        if envelope.sender() == self.machine.username() {
            trace!("discarding relay echo of our own envelope");
            return Ok(());
        }
        match envelope {
            Envelope::Get { sender } => {
                debug!(%sender, "peer requested our event log");
                self.signaling
                    .send_events(self.machine.log().events().to_vec())
                    .await
            }
            Envelope::Send { sender, events } => {
                debug!(%sender, count = events.len(), "received peer events");
                self.dispatch(Command::SetEvents(events)).await
            }
        }
    }

    /// Apply one callback event from the connection object
    pub async fn handle_connection_event(&mut self, event: ConnectionEvent) -> Result<()> {
        match event {
            ConnectionEvent::Candidate(candidate) => {
                self.dispatch(Command::CandidateGathered { candidate }).await
            }
            ConnectionEvent::GatheringComplete => {
                self.dispatch(Command::GatheringComplete).await
            }
        }
    }

    /// Feed a command through the machine and execute what falls out
    ///
    /// Effects may enqueue follow-up commands (an offer created, an answer
    /// applied); when the queue drains, the machine is probed once more so
    /// a newly enabled guard fires without waiting for external input.
    pub async fn dispatch(&mut self, command: Command) -> Result<()> {
        let mut queue = VecDeque::from([command]);
        while let Some(command) = queue.pop_front() {
            for effect in self.machine.handle(command) {
                self.execute(effect, &mut queue).await?;
            }
            if queue.is_empty() {
                if let Some(next) = self.machine.next_ready_command() {
                    queue.push_back(next);
                }
            }
        }
        Ok(())
    }

    async fn execute(&mut self, effect: Effect, queue: &mut VecDeque<Command>) -> Result<()> {
        match effect {
            Effect::CreateOffer => {
                let offer = self.connection.create_offer().await?;
                self.connection.set_local_description(&offer).await?;
                queue.push_back(Command::OfferCreated {
                    session_description: offer,
                });
            }

            Effect::CreateAnswer => {
                // The guest applies whatever peer candidates are in the log
                // at this moment and never revisits them; it has no peering
                // step. Asymmetric with the host path, deliberately.
                let offer = self
                    .machine
                    .log()
                    .offer_description()
                    .ok_or(Error::MissingEvent("offer"))?
                    .to_owned();
                self.connection.set_remote_description(&offer).await?;
                let answer = self.connection.create_answer().await?;
                self.connection.set_local_description(&answer).await?;
                self.apply_peer_candidates().await?;
                queue.push_back(Command::AnswerCreated {
                    session_description: answer,
                });
            }

            Effect::ApplyAnswer => {
                let offer = self
                    .machine
                    .log()
                    .offer_description()
                    .ok_or(Error::MissingEvent("offer"))?
                    .to_owned();
                let answer = self
                    .machine
                    .log()
                    .answer_description()
                    .ok_or(Error::MissingEvent("answer"))?
                    .to_owned();
                self.connection.set_local_description(&offer).await?;
                self.connection.set_remote_description(&answer).await?;
                self.apply_peer_candidates().await?;
                queue.push_back(Command::AnswerApplied);
            }

            Effect::PublishEvents(events) => {
                self.signaling.send_events(events).await?;
            }
        }
        Ok(())
    }

    /// Feed every non-self candidate into the connection, in log order
    async fn apply_peer_candidates(&mut self) -> Result<()> {
        let username = self.machine.username().to_owned();
        let candidates: Vec<(String, String)> = self
            .machine
            .log()
            .peer_candidates(&username)
            .map(|(sender, candidate)| (sender.to_owned(), candidate.to_owned()))
            .collect();
        for (sender, candidate) in candidates {
            self.connection.add_ice_candidate(&candidate).await?;
            debug!(%username, from = %sender, "added peer candidate");
        }
        Ok(())
    }
}
