use crate::events::{EventBus, SessionEvent};
use crate::mapping::{EditEvent, shift_line};
use crate::state::SessionStore;
use crate::{
    Change, ChangeStatus, NoteStatus, ReviewNote, ReviewSession, ReviewSummary, SelectionRange,
    SessionStats,
};
use chrono::Utc;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Store key of the single persisted session slot.
pub const SESSION_STATE_KEY: &str = "commitReview.activeSession";

const SHORT_HASH_LEN: usize = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a review session for commit {0} is already active")]
    AlreadyActive(String),
}

/// Identity of the commit under review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub short_hash: String,
    pub message: String,
    /// Parent commit the rejected changes revert to.
    pub base_hash: String,
}

impl CommitInfo {
    /// Build commit info, abbreviating the hash the way `git log --oneline` does.
    pub fn new(
        hash: impl Into<String>,
        message: impl Into<String>,
        base_hash: impl Into<String>,
    ) -> Self {
        let hash = hash.into();
        let short_hash = hash.chars().take(SHORT_HASH_LEN).collect();
        Self {
            hash,
            short_hash,
            message: message.into(),
            base_hash: base_hash.into(),
        }
    }
}

/// Owner of the one active review session.
///
/// Every mutation updates the in-memory session, writes the whole session to
/// the store under [`SESSION_STATE_KEY`], then publishes events. Lookups of
/// unknown ids, already resolved changes, or calls without an active session
/// return `None`/`false`/zero instead of failing. Store failures are logged
/// and never roll back the in-memory state.
pub struct SessionManager<S: SessionStore> {
    store: S,
    session: Option<ReviewSession>,
    events: EventBus,
}

impl<S: SessionStore> SessionManager<S> {
    /// Create a manager and restore a previously persisted session, if any.
    ///
    /// Listeners already subscribed on `events` receive `SessionRestored`.
    pub fn new(store: S, events: EventBus) -> Self {
        let mut manager = Self {
            store,
            session: None,
            events,
        };
        manager.restore();
        manager
    }

    fn restore(&mut self) {
        let raw = match self.store.get(SESSION_STATE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(err) => {
                log::warn!("failed to read persisted review session: {}", err);
                return;
            }
        };

        match serde_json::from_str::<ReviewSession>(&raw) {
            Ok(session) => {
                log::info!(
                    "restored review session for {} ({} changes, {} notes)",
                    session.short_hash,
                    session.changes.len(),
                    session.notes.len()
                );
                self.session = Some(session.clone());
                self.events.publish(SessionEvent::SessionRestored(session));
            }
            Err(err) => log::warn!("ignoring unreadable persisted review session: {}", err),
        }
    }

    /// Event bus, for subscribing to session events.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Underlying store holding the persisted session.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<&ReviewSession> {
        self.session.as_ref()
    }

    /// Whether a review session is active.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Begin reviewing `changes`. Fails if a session is already active.
    pub fn start(&mut self, commit: CommitInfo, changes: Vec<Change>) -> Result<(), SessionError> {
        if let Some(active) = &self.session {
            return Err(SessionError::AlreadyActive(active.short_hash.clone()));
        }

        let session = ReviewSession {
            commit_hash: commit.hash,
            short_hash: commit.short_hash,
            commit_message: commit.message,
            base_commit_hash: commit.base_hash,
            changes,
            notes: Vec::new(),
            current_index: 0,
            last_jumped_index: None,
            started_at: Utc::now(),
        };
        log::info!(
            "started review of {} with {} changes",
            session.short_hash,
            session.changes.len()
        );

        self.session = Some(session.clone());
        self.persist();
        self.events.publish(SessionEvent::SessionStarted(session));
        Ok(())
    }

    /// End the active session, returning its final counts.
    pub fn end(&mut self) -> Option<ReviewSummary> {
        let session = self.session.take()?;
        let summary = summarize(&session.changes);

        if let Err(err) = self.store.remove(SESSION_STATE_KEY) {
            log::warn!("failed to clear persisted review session: {}", err);
        }
        log::info!(
            "ended review of {}: {} accepted, {} rejected, {} pending",
            session.short_hash,
            summary.accepted,
            summary.rejected,
            summary.pending
        );

        self.events.publish(SessionEvent::SessionEnded(summary));
        Some(summary)
    }

    /// Mark a pending change as kept. Returns the updated change.
    pub fn accept(&mut self, change_id: &str) -> Option<Change> {
        self.resolve(change_id, ChangeStatus::Accepted)
    }

    /// Mark a pending change as reverted. Returns the updated change.
    ///
    /// Restoring the old text in the working copy is up to the caller.
    pub fn reject(&mut self, change_id: &str) -> Option<Change> {
        self.resolve(change_id, ChangeStatus::Rejected)
    }

    fn resolve(&mut self, change_id: &str, status: ChangeStatus) -> Option<Change> {
        let session = self.session.as_mut()?;
        let change = session.changes.iter_mut().find(|c| c.id == change_id)?;
        if !change.is_pending() {
            log::debug!("change {} already resolved as {:?}", change_id, change.status);
            return None;
        }

        change.status = status;
        let change = change.clone();
        normalize_cursor(session);
        log::debug!("change {} -> {:?}", change_id, status);

        self.persist();
        self.publish_resolved(&change);
        Some(change)
    }

    /// Accept every pending change. Returns how many were accepted.
    pub fn accept_all(&mut self) -> usize {
        self.accept_where(|_| true)
    }

    /// Accept every pending change in one file. Returns how many were accepted.
    pub fn accept_file(&mut self, file_path: &str) -> usize {
        self.accept_where(|change| same_path(&change.file_path, file_path))
    }

    fn accept_where(&mut self, filter: impl Fn(&Change) -> bool) -> usize {
        let Some(session) = self.session.as_mut() else {
            return 0;
        };

        let mut accepted = Vec::new();
        for change in session
            .changes
            .iter_mut()
            .filter(|change| change.is_pending() && filter(&**change))
        {
            change.status = ChangeStatus::Accepted;
            accepted.push(change.clone());
        }
        if accepted.is_empty() {
            return 0;
        }
        normalize_cursor(session);

        self.persist();
        for change in &accepted {
            self.publish_resolved(change);
        }
        accepted.len()
    }

    fn publish_resolved(&mut self, change: &Change) {
        let specific = match change.status {
            ChangeStatus::Rejected => SessionEvent::ChangeRejected(change.clone()),
            _ => SessionEvent::ChangeAccepted(change.clone()),
        };
        self.events.publish(specific);
        self.events.publish(SessionEvent::ChangeUpdated(change.clone()));
    }

    /// The change under the cursor, if any change is pending.
    pub fn current_change(&self) -> Option<&Change> {
        let session = self.session.as_ref()?;
        let index = pending_cursor(session)?;
        session.changes.iter().filter(|c| c.is_pending()).nth(index)
    }

    /// Jump the cursor to a change by id.
    ///
    /// The jump position is remembered until the next `next_change`/
    /// `prev_change`, so resolving changes after a jump continues with the
    /// following pending change in list order (the rest of the same file
    /// first), wrapping to the first pending change at the end.
    pub fn set_current_change(&mut self, change_id: &str) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(position) = session.changes.iter().position(|c| c.id == change_id) else {
            return false;
        };

        session.last_jumped_index = Some(position);
        normalize_cursor(session);

        self.persist();
        let current = self.current_change().cloned();
        self.events.publish(SessionEvent::CurrentChangeUpdated(current));
        true
    }

    /// Move to the next pending change, wrapping at the end.
    pub fn next_change(&mut self) -> Option<Change> {
        self.step_cursor(true)
    }

    /// Move to the previous pending change, wrapping at the start.
    pub fn prev_change(&mut self) -> Option<Change> {
        self.step_cursor(false)
    }

    fn step_cursor(&mut self, forward: bool) -> Option<Change> {
        let session = self.session.as_mut()?;
        let pending = pending_count(session);
        if pending == 0 {
            return None;
        }

        let from = match session.last_jumped_index {
            Some(_) => pending_cursor(session).unwrap_or(0),
            None => session.current_index % pending,
        };
        session.current_index = if forward {
            (from + 1) % pending
        } else {
            (from + pending - 1) % pending
        };
        session.last_jumped_index = None;

        self.persist();
        let current = self.current_change().cloned();
        self.events.publish(SessionEvent::CurrentChangeUpdated(current.clone()));
        current
    }

    /// Every change of the session in list order, whatever its status.
    pub fn all_changes(&self) -> &[Change] {
        self.session
            .as_ref()
            .map(|s| s.changes.as_slice())
            .unwrap_or_default()
    }

    /// Look up a change by id.
    pub fn change(&self, change_id: &str) -> Option<&Change> {
        self.all_changes().iter().find(|c| c.id == change_id)
    }

    /// Changes still awaiting a decision, in list order.
    pub fn pending_changes(&self) -> Vec<&Change> {
        self.all_changes().iter().filter(|c| c.is_pending()).collect()
    }

    /// All changes in one file.
    pub fn changes_for_file(&self, file_path: &str) -> Vec<&Change> {
        self.all_changes()
            .iter()
            .filter(|c| same_path(&c.file_path, file_path))
            .collect()
    }

    /// Pending changes in one file.
    pub fn pending_changes_for_file(&self, file_path: &str) -> Vec<&Change> {
        self.all_changes()
            .iter()
            .filter(|c| c.is_pending() && same_path(&c.file_path, file_path))
            .collect()
    }

    /// Distinct files touched by the session, in change order.
    pub fn changed_files(&self) -> Vec<String> {
        crate::parser::changed_files(self.all_changes())
    }

    /// Counts by status, file progress and open notes. Zeroes without a session.
    pub fn stats(&self) -> SessionStats {
        let Some(session) = &self.session else {
            return SessionStats::default();
        };

        let summary = summarize(&session.changes);
        let mut files = HashSet::new();
        let mut files_remaining = HashSet::new();
        for change in &session.changes {
            files.insert(change.file_path.as_str());
            if change.is_pending() {
                files_remaining.insert(change.file_path.as_str());
            }
        }

        SessionStats {
            total: session.changes.len(),
            accepted: summary.accepted,
            rejected: summary.rejected,
            pending: summary.pending,
            total_files: files.len(),
            files_remaining: files_remaining.len(),
            active_notes: session.notes.iter().filter(|n| n.is_active()).count(),
        }
    }

    /// Attach a note to a line of a file. Returns the new note.
    pub fn add_note(
        &mut self,
        file_path: &str,
        line: u32,
        content: &str,
        selection_range: Option<SelectionRange>,
    ) -> Option<ReviewNote> {
        let session = self.session.as_mut()?;
        let now = Utc::now();
        let note = ReviewNote {
            id: Uuid::new_v4().to_string(),
            file_path: file_path.replace('\\', "/"),
            line: line.max(1),
            content: content.to_string(),
            status: NoteStatus::Active,
            created_at: now,
            updated_at: now,
            selection_range,
        };
        session.notes.push(note.clone());

        self.persist();
        self.publish_note(SessionEvent::NoteAdded(note.clone()));
        Some(note)
    }

    /// Replace the text of a note. Returns the updated note.
    pub fn update_note(&mut self, note_id: &str, content: &str) -> Option<ReviewNote> {
        let note = self.note_mut(note_id)?;
        note.content = content.to_string();
        note.updated_at = Utc::now();
        let note = note.clone();

        self.persist();
        self.publish_note(SessionEvent::NoteUpdated(note.clone()));
        Some(note)
    }

    /// Mark a note resolved. Resolved notes stay in the session but drop out
    /// of the per-file and unresolved views.
    pub fn resolve_note(&mut self, note_id: &str) -> Option<ReviewNote> {
        let note = self.note_mut(note_id)?;
        if !note.is_active() {
            return None;
        }
        note.status = NoteStatus::Resolved;
        note.updated_at = Utc::now();
        let note = note.clone();

        self.persist();
        self.publish_note(SessionEvent::NoteResolved(note.clone()));
        Some(note)
    }

    /// Remove a note from the session. Returns the removed note.
    pub fn delete_note(&mut self, note_id: &str) -> Option<ReviewNote> {
        let session = self.session.as_mut()?;
        let position = session.notes.iter().position(|n| n.id == note_id)?;
        let note = session.notes.remove(position);

        self.persist();
        self.publish_note(SessionEvent::NoteDeleted(note.clone()));
        Some(note)
    }

    fn note_mut(&mut self, note_id: &str) -> Option<&mut ReviewNote> {
        self.session
            .as_mut()?
            .notes
            .iter_mut()
            .find(|n| n.id == note_id)
    }

    fn publish_note(&mut self, event: SessionEvent) {
        self.events.publish(event);
        self.events.publish(SessionEvent::NotesUpdated);
    }

    /// Every note, active or resolved.
    pub fn all_notes(&self) -> &[ReviewNote] {
        self.session
            .as_ref()
            .map(|s| s.notes.as_slice())
            .unwrap_or_default()
    }

    /// Look up a note by id.
    pub fn note(&self, note_id: &str) -> Option<&ReviewNote> {
        self.all_notes().iter().find(|n| n.id == note_id)
    }

    /// Active notes in one file.
    pub fn notes_for_file(&self, file_path: &str) -> Vec<&ReviewNote> {
        self.all_notes()
            .iter()
            .filter(|n| n.is_active() && same_path(&n.file_path, file_path))
            .collect()
    }

    /// Active notes across all files.
    pub fn unresolved_notes(&self) -> Vec<&ReviewNote> {
        self.all_notes().iter().filter(|n| n.is_active()).collect()
    }

    /// Shift pending change anchors and active note lines of `file_path` to
    /// follow edits made to the live file.
    ///
    /// Edits are applied in order. Only anchors strictly below an edit's end
    /// line move; anchors inside or above the edited range stay put, and
    /// resolved changes and notes are never touched. Returns whether anything
    /// moved; nothing is persisted or published otherwise.
    pub fn update_line_mapping(&mut self, file_path: &str, edits: &[EditEvent]) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        let mut changes_moved = false;
        let mut notes_moved = false;
        for edit in edits {
            let delta = edit.line_delta();
            if delta == 0 {
                continue;
            }

            for change in session.changes.iter_mut().filter(|c| {
                c.is_pending() && same_path(&c.file_path, file_path) && edit.shifts(c.new_line_start)
            }) {
                change.new_line_start = shift_line(change.new_line_start, delta);
                changes_moved = true;
            }

            for note in session.notes.iter_mut().filter(|n| {
                n.is_active() && same_path(&n.file_path, file_path) && edit.shifts(n.line)
            }) {
                note.line = shift_line(note.line, delta);
                notes_moved = true;
            }
        }

        if !changes_moved && !notes_moved {
            return false;
        }
        log::debug!("remapped lines in {} after {} edits", file_path, edits.len());

        self.persist();
        if changes_moved {
            self.events.publish(SessionEvent::LineMappingUpdated {
                file_path: file_path.to_string(),
            });
        }
        if notes_moved {
            self.events.publish(SessionEvent::NotesUpdated);
        }
        true
    }

    fn persist(&mut self) {
        let Some(session) = &self.session else {
            return;
        };

        let result = serde_json::to_string(session)
            .map_err(crate::state::StateError::from)
            .and_then(|raw| self.store.set(SESSION_STATE_KEY, &raw));
        if let Err(err) = result {
            log::warn!("failed to persist review session: {}", err);
        }
    }
}

fn summarize(changes: &[Change]) -> ReviewSummary {
    changes
        .iter()
        .fold(ReviewSummary::default(), |mut summary, change| {
            match change.status {
                ChangeStatus::Accepted => summary.accepted += 1,
                ChangeStatus::Rejected => summary.rejected += 1,
                ChangeStatus::Pending => summary.pending += 1,
            }
            summary
        })
}

fn pending_count(session: &ReviewSession) -> usize {
    session.changes.iter().filter(|c| c.is_pending()).count()
}

/// Index of the current change within the pending view.
///
/// After a jump, that is the first pending change at or after the jump
/// position, wrapping to 0 when none follows. Otherwise it is the stored
/// `current_index`, or `None` when that is out of range.
fn pending_cursor(session: &ReviewSession) -> Option<usize> {
    let pending = pending_count(session);
    if pending == 0 {
        return None;
    }

    match session.last_jumped_index {
        Some(anchor) => {
            let before = session
                .changes
                .iter()
                .take(anchor)
                .filter(|c| c.is_pending())
                .count();
            Some(if before < pending { before } else { 0 })
        }
        None => (session.current_index < pending).then_some(session.current_index),
    }
}

/// Re-derive `current_index` after the pending view changed.
fn normalize_cursor(session: &mut ReviewSession) {
    session.current_index = pending_cursor(session).unwrap_or(0);
}

fn same_path(a: &str, b: &str) -> bool {
    a == b || a.replace('\\', "/") == b.replace('\\', "/")
}
