use crate::{Change, ChangeKind, ChangeStatus, Hunk};
use std::collections::HashSet;
use uuid::Uuid;

/// Extensions whose contents cannot be reviewed line by line.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd", "pdf", "zip", "tar", "gz",
    "tgz", "bz2", "xz", "7z", "rar", "jar", "war", "class", "exe", "dll", "so", "dylib", "a", "o",
    "obj", "lib", "bin", "wasm", "pyc", "woff", "woff2", "ttf", "otf", "eot", "mp3", "mp4", "wav",
    "ogg", "flac", "avi", "mov", "mkv", "webm", "db", "sqlite", "sqlite3",
];

/// How many lines after `diff --git` are searched for new/deleted/renamed markers.
const HEADER_SCAN_LINES: usize = 10;

/// A hunk body line classified by its prefix, with the prefix stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLine<'a> {
    Context(&'a str),
    Added(&'a str),
    Removed(&'a str),
}

impl<'a> DiffLine<'a> {
    /// Classify one raw line of a hunk body.
    ///
    /// Returns `None` for lines carrying no file content, such as
    /// `\ No newline at end of file`. An empty line is treated as context
    /// because some tools strip the trailing space of blank context lines.
    pub fn classify(line: &'a str) -> Option<Self> {
        if let Some(text) = line.strip_prefix('+') {
            Some(DiffLine::Added(text))
        } else if let Some(text) = line.strip_prefix('-') {
            Some(DiffLine::Removed(text))
        } else if let Some(text) = line.strip_prefix(' ') {
            Some(DiffLine::Context(text))
        } else if line.is_empty() {
            Some(DiffLine::Context(""))
        } else {
            None
        }
    }

    fn added(&self) -> Option<&'a str> {
        match *self {
            DiffLine::Added(text) => Some(text),
            _ => None,
        }
    }

    fn removed(&self) -> Option<&'a str> {
        match *self {
            DiffLine::Removed(text) => Some(text),
            _ => None,
        }
    }
}

/// Parse raw unified diff output into per-file hunks of reviewable changes.
///
/// Best effort: sections without an `a/... b/...` header, binary sections and
/// sections for binary file types are skipped, as are malformed hunk headers.
/// Files that end up with no changes are not returned. Every change gets a
/// fresh id, status `Pending`, and an absolute path under `root_path`.
pub fn parse_diff(input: &str, root_path: &str) -> Vec<Hunk> {
    let root = normalize_root(root_path);

    split_sections(input)
        .iter()
        .filter_map(|section| parse_section(section, &root))
        .filter(|hunk| !hunk.changes.is_empty())
        .collect()
}

/// Concatenate the changes of all hunks, keeping per-hunk order.
pub fn flatten_hunks(hunks: Vec<Hunk>) -> Vec<Change> {
    hunks.into_iter().flat_map(|hunk| hunk.changes).collect()
}

/// Distinct file paths touched by `changes`, in first-seen order.
pub fn changed_files(changes: &[Change]) -> Vec<String> {
    let mut seen = HashSet::new();
    changes
        .iter()
        .filter(|change| seen.insert(change.file_path.as_str()))
        .map(|change| change.file_path.clone())
        .collect()
}

/// Whether a path's extension marks it as a binary file.
pub fn is_binary_path(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Split the input into file sections, each starting at its `diff --git` line.
fn split_sections(input: &str) -> Vec<Vec<&str>> {
    let mut sections: Vec<Vec<&str>> = Vec::new();

    for line in input.lines() {
        if line.starts_with("diff --git ") {
            sections.push(vec![line]);
        } else if let Some(section) = sections.last_mut() {
            section.push(line);
        }
    }

    sections
}

fn parse_section(lines: &[&str], root: &str) -> Option<Hunk> {
    let (old_path, new_path) = parse_file_header(lines.first()?)?;

    let mut is_new = false;
    let mut is_deleted = false;
    let mut renamed_from: Option<String> = None;
    for line in lines.iter().skip(1).take(HEADER_SCAN_LINES) {
        if line.starts_with("new file mode") {
            is_new = true;
        } else if line.starts_with("deleted file mode") {
            is_deleted = true;
        } else if let Some(from) = line.strip_prefix("rename from ") {
            renamed_from = Some(from.to_string());
        }
    }
    let is_renamed = renamed_from.is_some() || old_path != new_path;

    if lines.iter().any(|line| line.starts_with("Binary files ")) || is_binary_path(&new_path) {
        return None;
    }

    let file_path = join_root(root, &new_path);
    let mut changes = Vec::new();
    let mut current: Option<HunkCursor> = None;
    let mut body: Vec<DiffLine> = Vec::new();

    for line in &lines[1..] {
        if line.starts_with("@@") {
            if let Some(cursor) = current.take() {
                changes.extend(parse_hunk_body(
                    &body,
                    cursor.old_start,
                    cursor.new_start,
                    &file_path,
                ));
            }
            body.clear();
            // A malformed header leaves `current` empty, so its body is skipped.
            current = parse_hunk_header(line).map(HunkCursor::from_header);
            continue;
        }

        // Lines past the header's counts, such as a `format-patch` signature,
        // are not part of the hunk.
        if let Some(cursor) = current.as_mut()
            && !cursor.is_exhausted()
            && let Some(diff_line) = DiffLine::classify(line)
        {
            cursor.consume(&diff_line);
            body.push(diff_line);
        }
    }

    if let Some(cursor) = current {
        changes.extend(parse_hunk_body(&body, cursor.old_start, cursor.new_start, &file_path));
    }

    Some(Hunk {
        file_path: new_path,
        is_new,
        is_deleted,
        is_renamed,
        old_file_path: if is_renamed {
            renamed_from.or(Some(old_path))
        } else {
            None
        },
        changes,
    })
}

/// Extract `(old, new)` relative paths from `diff --git a/<old> b/<new>`.
fn parse_file_header(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("diff --git ")?.trim_end();
    if !rest.starts_with("a/") {
        return None;
    }

    // Unrenamed files have identical halves; prefer that split so paths
    // containing " b/" still parse.
    if rest.len() % 2 == 1 {
        let mid = rest.len() / 2;
        if rest.is_char_boundary(mid) {
            let (left, right) = rest.split_at(mid);
            if let (Some(old), Some(new)) = (left.strip_prefix("a/"), right.strip_prefix(" b/"))
                && old == new
            {
                return Some((old.to_string(), new.to_string()));
            }
        }
    }

    let pos = rest.rfind(" b/")?;
    let old = &rest[2..pos];
    let new = &rest[pos + 3..];
    if old.is_empty() || new.is_empty() {
        return None;
    }
    Some((old.to_string(), new.to_string()))
}

/// Start lines of a hunk and how many body lines its header still expects.
#[derive(Debug, Clone, Copy)]
struct HunkCursor {
    old_start: u32,
    new_start: u32,
    old_left: u32,
    new_left: u32,
}

impl HunkCursor {
    fn from_header((old_start, old_count, new_start, new_count): (u32, u32, u32, u32)) -> Self {
        Self {
            old_start,
            new_start,
            old_left: old_count,
            new_left: new_count,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.old_left == 0 && self.new_left == 0
    }

    fn consume(&mut self, line: &DiffLine) {
        match line {
            DiffLine::Context(_) => {
                self.old_left = self.old_left.saturating_sub(1);
                self.new_left = self.new_left.saturating_sub(1);
            }
            DiffLine::Removed(_) => self.old_left = self.old_left.saturating_sub(1),
            DiffLine::Added(_) => self.new_left = self.new_left.saturating_sub(1),
        }
    }
}

/// Parse `@@ -old_start[,old_count] +new_start[,new_count] @@ [context]`.
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32)> {
    let header = line.strip_prefix("@@ ")?;
    let header = &header[..header.find(" @@")?];
    let mut parts = header.split(' ');

    let (old_start, old_count) = parse_range(parts.next()?.strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(parts.next()?.strip_prefix('+')?)?;

    Some((old_start, old_count, new_start, new_count))
}

/// Parse a range like "start,count" or "start" (count defaults to 1).
fn parse_range(s: &str) -> Option<(u32, u32)> {
    match s.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}

/// Group a hunk body into one change per contiguous block of non-context lines.
///
/// A removal run directly followed by an addition run becomes a single
/// `Modify`, whatever the two run lengths are.
fn parse_hunk_body(
    lines: &[DiffLine],
    old_start: u32,
    new_start: u32,
    file_path: &str,
) -> Vec<Change> {
    let mut changes = Vec::new();
    let mut old_line = old_start;
    let mut new_line = new_start;
    let mut i = 0;

    while i < lines.len() {
        match lines[i] {
            DiffLine::Context(_) => {
                old_line = old_line.saturating_add(1);
                new_line = new_line.saturating_add(1);
                i += 1;
            }
            DiffLine::Removed(_) => {
                let (anchor_old, anchor_new) = (old_line, new_line);
                let removed = take_run(lines, &mut i, DiffLine::removed);
                old_line = old_line.saturating_add(removed.len() as u32);
                let added = take_run(lines, &mut i, DiffLine::added);
                new_line = new_line.saturating_add(added.len() as u32);

                let kind = if added.is_empty() {
                    ChangeKind::Delete
                } else {
                    ChangeKind::Modify
                };
                changes.push(new_change(kind, file_path, anchor_old, removed, anchor_new, added));
            }
            DiffLine::Added(_) => {
                let (anchor_old, anchor_new) = (old_line, new_line);
                let added = take_run(lines, &mut i, DiffLine::added);
                new_line = new_line.saturating_add(added.len() as u32);
                changes.push(new_change(
                    ChangeKind::Add,
                    file_path,
                    anchor_old,
                    Vec::new(),
                    anchor_new,
                    added,
                ));
            }
        }
    }

    changes
}

/// Collect the text of consecutive lines matched by `pick`, advancing `i` past them.
fn take_run<'a>(
    lines: &[DiffLine<'a>],
    i: &mut usize,
    pick: fn(&DiffLine<'a>) -> Option<&'a str>,
) -> Vec<String> {
    let mut run = Vec::new();
    while let Some(text) = lines.get(*i).and_then(pick) {
        run.push(text.to_string());
        *i += 1;
    }
    run
}

fn new_change(
    kind: ChangeKind,
    file_path: &str,
    old_line_start: u32,
    old_lines: Vec<String>,
    new_line_start: u32,
    new_lines: Vec<String>,
) -> Change {
    Change {
        id: Uuid::new_v4().to_string(),
        kind,
        file_path: file_path.to_string(),
        old_line_start,
        old_line_count: old_lines.len() as u32,
        new_line_start,
        new_line_count: new_lines.len() as u32,
        old_lines,
        new_lines,
        status: ChangeStatus::Pending,
    }
}

fn normalize_root(root: &str) -> String {
    let root = root.replace('\\', "/");
    match root.trim_end_matches('/') {
        "" if root.starts_with('/') => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn join_root(root: &str, relative: &str) -> String {
    match root {
        "" => relative.to_string(),
        "/" => format!("/{}", relative),
        _ => format!("{}/{}", root, relative),
    }
}
