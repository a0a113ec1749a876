use serde::{Deserialize, Serialize};

/// A single text replacement applied to a file while it is under review.
///
/// `start_line` and `end_line` are the 1-indexed lines of the replaced range
/// (equal for an insertion or a single-line edit); `text` is what replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditEvent {
    pub start_line: u32,
    pub end_line: u32,
    pub text: String,
}

impl EditEvent {
    pub fn new(start_line: u32, end_line: u32, text: impl Into<String>) -> Self {
        Self {
            start_line,
            end_line: end_line.max(start_line),
            text: text.into(),
        }
    }

    /// Insert `text` at `line` without replacing anything.
    pub fn insert(line: u32, text: impl Into<String>) -> Self {
        Self::new(line, line, text)
    }

    /// Line breaks removed by the replaced range.
    pub fn lines_removed(&self) -> i64 {
        i64::from(self.end_line) - i64::from(self.start_line)
    }

    /// Line breaks introduced by the replacement text.
    pub fn lines_added(&self) -> i64 {
        self.text.split('\n').count() as i64 - 1
    }

    /// Net change in line count below the edited range.
    pub fn line_delta(&self) -> i64 {
        self.lines_added() - self.lines_removed()
    }

    /// Whether an anchor at `line` sits below the edit and therefore moves.
    ///
    /// Anchors inside the edited range stay where they are.
    pub fn shifts(&self, line: u32) -> bool {
        line > self.end_line
    }
}

/// Apply `delta` to a 1-indexed line, never going below line 1.
pub fn shift_line(line: u32, delta: i64) -> u32 {
    (i64::from(line) + delta).clamp(1, i64::from(u32::MAX)) as u32
}
