//! Session state store: the authoritative local view of a chat session.
//!
//! [`SessionState`] holds the active conversation, the visible message list,
//! the typing indicator and the FIFO of sends still awaiting a reply. All
//! user actions and inbound events go through its methods, which are the
//! only place these fields change. Every change is published on the
//! [`EventBus`].
//!
//! # Send cycle
//!
//! ```text
//! Idle ──send(non-empty, Open)──▶ Awaiting ──Message / Error / Malformed──▶ Idle
//!                                    │  ▲
//!                                    └──┘ Typing
//! ```
//!
//! Each send is tagged with the conversation active when it was made. A
//! reply that resolves a send from a conversation that is no longer active
//! is dropped from the view. Pending sends resolve in FIFO order; the typing
//! indicator stays on while any send is unresolved.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use uuid::Uuid;

use super::{Conversation, ConversationId, Diagnostic, EventBus, Message, SessionEvent};
use crate::domain::ConnectionState;
use crate::error::ChatError;
use crate::ws::{FrameSink, InboundEvent, OutboundFrame};

/// A transmitted send that has not been answered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    /// Send tag.
    pub id: Uuid,
    /// Conversation active when the send was made.
    pub conversation_id: Option<ConversationId>,
    /// When the frame was handed to the connection.
    pub sent_at: Instant,
}

/// Result of a send attempt. Rejections leave the session untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Appended optimistically and transmitted.
    Sent {
        /// Tag of the new pending send.
        send_id: Uuid,
    },
    /// Nothing to send.
    EmptyInput,
    /// The connection was not open; the message was dropped, not queued.
    NotConnected(ConnectionState),
    /// The connection was open but the frame could not be handed to it.
    TransmitFailed {
        /// Rendered cause.
        reason: String,
    },
}

impl SendOutcome {
    /// Returns `true` if the message went out (the caller may clear its
    /// input box).
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// Mutable state of one chat session.
#[derive(Debug)]
pub struct SessionState {
    active_conversation_id: Option<ConversationId>,
    messages: Vec<Message>,
    typing: bool,
    pending: VecDeque<PendingSend>,
    /// Set when the server signalled typing with no send outstanding.
    typing_since: Option<Instant>,
    events: EventBus,
}

impl SessionState {
    /// Creates an empty session publishing on `events`.
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            active_conversation_id: None,
            messages: Vec::new(),
            typing: false,
            pending: VecDeque::new(),
            typing_since: None,
            events,
        }
    }

    /// Conversation currently shown, if one was selected.
    #[must_use]
    pub fn active_conversation_id(&self) -> Option<&ConversationId> {
        self.active_conversation_id.as_ref()
    }

    /// Visible messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Typing indicator.
    #[must_use]
    pub const fn is_typing(&self) -> bool {
        self.typing
    }

    /// Sends awaiting a reply, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &PendingSend> {
        self.pending.iter()
    }

    /// Sends a user message through `sink`.
    ///
    /// Empty input or a connection that is not open is a no-op reported in
    /// the returned [`SendOutcome`]. On success the message is appended,
    /// the send becomes pending and the typing indicator turns on.
    pub fn send(&mut self, input: &str, sink: &impl FrameSink) -> SendOutcome {
        if input.is_empty() {
            return SendOutcome::EmptyInput;
        }
        let state = sink.state();
        if !state.is_open() {
            tracing::debug!(%state, "send dropped: connection not open");
            return SendOutcome::NotConnected(state);
        }

        let frame = OutboundFrame::user(self.active_conversation_id.clone(), input);
        if let Err(err) = sink.transmit(&frame) {
            tracing::warn!(error = %err, "send dropped: transmit failed");
            return match err {
                ChatError::NotConnected(state) => SendOutcome::NotConnected(state),
                other => SendOutcome::TransmitFailed {
                    reason: other.to_string(),
                },
            };
        }

        let send_id = Uuid::new_v4();
        self.pending.push_back(PendingSend {
            id: send_id,
            conversation_id: self.active_conversation_id.clone(),
            sent_at: Instant::now(),
        });
        self.push(Message::user(input));
        self.set_typing(true);
        tracing::debug!(%send_id, pending = self.pending.len(), "message sent");
        SendOutcome::Sent { send_id }
    }

    /// Applies one decoded inbound event.
    pub fn apply(&mut self, event: InboundEvent) {
        if event.is_resolving() && self.pending.is_empty() {
            tracing::debug!(kind = event.kind_str(), "unsolicited frame");
        }
        let message = match event {
            InboundEvent::Typing => {
                if self.pending.is_empty() && self.typing_since.is_none() {
                    self.typing_since = Some(Instant::now());
                }
                self.set_typing(true);
                return;
            }
            InboundEvent::Unrecognized { kind } => {
                tracing::debug!(?kind, "ignoring unrecognized frame");
                return;
            }
            InboundEvent::Message { role, content } => Message { role, content },
            InboundEvent::Error { detail } => recovered(&ChatError::ServerReported(detail)),
            InboundEvent::Malformed { raw } => {
                tracing::debug!(len = raw.len(), "malformed frame shown verbatim");
                Message::bot(raw)
            }
        };
        self.resolve(message);
    }

    /// Replaces the visible messages with `conversation`'s stored history
    /// and makes it active. Pending sends are left alone.
    pub fn switch_to(&mut self, conversation: &Conversation) {
        self.active_conversation_id = Some(conversation.id.clone());
        self.messages.clone_from(&conversation.messages);
        tracing::debug!(
            conversation_id = %conversation.id,
            messages = self.messages.len(),
            "conversation switched"
        );
        let _ = self.events.publish(SessionEvent::ConversationSwitched {
            conversation_id: conversation.id.clone(),
            messages: self.messages.clone(),
            timestamp: Utc::now(),
        });
    }

    /// Appends a message that does not take part in the send cycle
    /// (attachment notices, request diagnostics).
    pub fn append(&mut self, message: Message) {
        self.push(message);
    }

    /// Resolves every pending send older than `timeout` as a server error,
    /// and clears a server typing signal that has gone quiet for as long.
    ///
    /// Returns the number of sends that timed out.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> usize {
        let mut expired = 0_usize;
        while self
            .pending
            .front()
            .is_some_and(|p| elapsed(p.sent_at, timeout, now))
        {
            self.resolve(recovered(&ChatError::ReplyTimeout {
                timeout_secs: timeout.as_secs(),
            }));
            expired = expired.saturating_add(1);
        }
        if self
            .typing_since
            .is_some_and(|since| elapsed(since, timeout, now))
        {
            self.typing_since = None;
            self.set_typing(!self.pending.is_empty());
        }
        expired
    }

    /// Earliest instant at which [`SessionState::expire`] has work to do.
    /// `None` when nothing is pending or the deadline is not representable.
    #[must_use]
    pub fn next_deadline(&self, timeout: Duration) -> Option<Instant> {
        let oldest_send = self.pending.front().map(|p| p.sent_at);
        let since = match (oldest_send, self.typing_since) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return None,
        };
        since.checked_add(timeout)
    }

    /// The connection went away: nothing pending can be answered anymore.
    /// Appends `diagnostic` when the loss should be surfaced.
    pub fn connection_lost(&mut self, diagnostic: Option<Diagnostic>) {
        if !self.pending.is_empty() {
            tracing::info!(dropped = self.pending.len(), "dropping unanswered sends");
        }
        self.pending.clear();
        self.typing_since = None;
        if let Some(diagnostic) = diagnostic {
            self.push(diagnostic.into());
        }
        self.set_typing(false);
    }

    /// Resolves the oldest pending send (if any) with `message`.
    fn resolve(&mut self, message: Message) {
        self.typing_since = None;
        let resolved = self.pending.pop_front();
        match resolved {
            Some(send) if send.conversation_id != self.active_conversation_id => {
                tracing::debug!(
                    send_id = %send.id,
                    conversation_id = ?send.conversation_id,
                    "reply for inactive conversation discarded"
                );
                let _ = self.events.publish(SessionEvent::ReplyDiscarded {
                    send_id: send.id,
                    conversation_id: send.conversation_id,
                    timestamp: Utc::now(),
                });
            }
            _ => self.push(message),
        }
        self.set_typing(!self.pending.is_empty());
    }

    fn push(&mut self, message: Message) {
        let index = self.messages.len();
        self.messages.push(message.clone());
        let _ = self.events.publish(SessionEvent::MessageAppended {
            message,
            index,
            timestamp: Utc::now(),
        });
    }

    fn set_typing(&mut self, typing: bool) {
        if self.typing != typing {
            self.typing = typing;
            let _ = self.events.publish(SessionEvent::TypingChanged {
                typing,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Whether `timeout` has run out for something started at `since`. A
/// deadline past the clock's range never runs out.
fn elapsed(since: Instant, timeout: Duration, now: Instant) -> bool {
    since.checked_add(timeout).is_some_and(|deadline| deadline <= now)
}

/// Message surfaced for an error recovered inside the session.
fn recovered(err: &ChatError) -> Message {
    tracing::warn!(error = %err, "recovered in session");
    err.diagnostic()
        .map_or_else(|| Message::bot(err.to_string()), Message::from)
}
