pub mod cli;
pub mod config;
pub mod events;
pub mod mapping;
pub mod parser;
pub mod session;
pub mod state;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of an atomic change extracted from a diff hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Delete,
    Modify,
}

/// Disposition of a change in the review process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A contiguous block of added, deleted or modified lines.
///
/// Line numbers are 1-indexed. `new_line_start` is the anchor used to locate
/// the change in the live file and is the only position updated after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub id: String,
    pub kind: ChangeKind,
    pub file_path: String,
    pub old_line_start: u32,
    pub old_line_count: u32,
    pub new_line_start: u32,
    pub new_line_count: u32,
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,
    pub status: ChangeStatus,
}

impl Change {
    pub fn is_pending(&self) -> bool {
        self.status == ChangeStatus::Pending
    }
}

/// All changes parsed from one file section of a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Repository-relative path on the new side.
    pub file_path: String,
    pub is_new: bool,
    pub is_deleted: bool,
    pub is_renamed: bool,
    pub old_file_path: Option<String>,
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    Active,
    Resolved,
}

/// Editor selection a note was created from (0-indexed, as editors report it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRange {
    pub start_line: u32,
    pub start_character: u32,
    pub end_line: u32,
    pub end_character: u32,
}

/// Free-text annotation attached to a line of a reviewed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNote {
    pub id: String,
    pub file_path: String,
    pub line: u32,
    pub content: String,
    pub status: NoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_range: Option<SelectionRange>,
}

impl ReviewNote {
    pub fn is_active(&self) -> bool {
        self.status == NoteStatus::Active
    }
}

/// The single review in progress for one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSession {
    pub commit_hash: String,
    pub short_hash: String,
    pub commit_message: String,
    /// Parent commit, used by whoever reverts rejected changes.
    pub base_commit_hash: String,
    /// Parse order; entries are never removed during a session.
    pub changes: Vec<Change>,
    #[serde(default)]
    pub notes: Vec<ReviewNote>,
    /// Position within the pending-only view of `changes`.
    pub current_index: usize,
    /// Absolute position in `changes` of the last explicit jump, if the cursor
    /// has not been moved by next/prev since.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_jumped_index: Option<usize>,
    pub started_at: DateTime<Utc>,
}

/// Final counts returned when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub pending: usize,
}

/// Review progress for the active session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub pending: usize,
    pub total_files: usize,
    pub files_remaining: usize,
    pub active_notes: usize,
}
