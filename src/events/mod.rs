//! Typed notifications emitted by the session manager.
//!
//! Collaborators (decorations, status bar, comment threads) subscribe to an
//! [`EventBus`] and re-query the manager when something they display changes.
//! Payloads are snapshots; mutating them has no effect on the session.

use crate::{Change, ReviewNote, ReviewSession, ReviewSummary};

/// Every state transition of the review session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SessionStarted(ReviewSession),
    SessionRestored(ReviewSession),
    SessionEnded(ReviewSummary),
    ChangeAccepted(Change),
    ChangeRejected(Change),
    /// Emitted after every accept or reject, alongside the specific event.
    ChangeUpdated(Change),
    /// The change the cursor now points at, if any is pending.
    CurrentChangeUpdated(Option<Change>),
    NoteAdded(ReviewNote),
    NoteUpdated(ReviewNote),
    NoteResolved(ReviewNote),
    NoteDeleted(ReviewNote),
    /// Emitted after any note mutation or note line remapping.
    NotesUpdated,
    /// Pending change anchors in this file moved.
    LineMappingUpdated { file_path: String },
}

impl SessionEvent {
    /// Stable event name, used in log output.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted(_) => "sessionStarted",
            SessionEvent::SessionRestored(_) => "sessionRestored",
            SessionEvent::SessionEnded(_) => "sessionEnded",
            SessionEvent::ChangeAccepted(_) => "changeAccepted",
            SessionEvent::ChangeRejected(_) => "changeRejected",
            SessionEvent::ChangeUpdated(_) => "changeUpdated",
            SessionEvent::CurrentChangeUpdated(_) => "currentChangeUpdated",
            SessionEvent::NoteAdded(_) => "noteAdded",
            SessionEvent::NoteUpdated(_) => "noteUpdated",
            SessionEvent::NoteResolved(_) => "noteResolved",
            SessionEvent::NoteDeleted(_) => "noteDeleted",
            SessionEvent::NotesUpdated => "notesUpdated",
            SessionEvent::LineMappingUpdated { .. } => "lineMappingUpdated",
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&SessionEvent)>;

/// Synchronous fan-out of [`SessionEvent`]s to registered listeners.
///
/// Listeners run in subscription order on the caller's stack, after the
/// session has been mutated and persisted. The bus is owned by the manager and
/// borrowed mutably while it dispatches, so a listener cannot call back into a
/// mutating manager operation.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SessionEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn publish(&mut self, event: SessionEvent) {
        log::debug!("event {}", event.name());
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
