use anyhow::{Context, Result, bail};
use std::io::Read;
use std::path::Path;

use commit_review::cli::{self, Commands, ListArgs, NoteAction, RemapArgs, StartArgs};
use commit_review::config;
use commit_review::events::EventBus;
use commit_review::mapping::EditEvent;
use commit_review::parser::{flatten_hunks, parse_diff};
use commit_review::session::{CommitInfo, SessionManager};
use commit_review::state::ReviewDb;
use commit_review::{Change, ChangeKind, ChangeStatus, ReviewNote};

type Manager = SessionManager<ReviewDb>;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = cli::parse_args();
    let cwd = config::current_dir()?;
    let db_path = config::state_db_path(args.db.as_deref(), &cwd);
    let db = ReviewDb::open(&db_path)
        .with_context(|| format!("Failed to open review state at {}", db_path.display()))?;
    let mut manager = SessionManager::new(db, EventBus::new());

    match args.command {
        Commands::Start(start_args) => handle_start(&mut manager, start_args, &cwd)?,
        Commands::Status => handle_status(&manager),
        Commands::List(list_args) => handle_list(&manager, &list_args)?,
        Commands::Current => {
            require_session(&manager)?;
            match manager.current_change() {
                Some(change) => print_change_detail(change),
                None => println!("No pending changes"),
            }
        }
        Commands::Next => {
            require_session(&manager)?;
            match manager.next_change() {
                Some(change) => print_change_detail(&change),
                None => println!("No pending changes"),
            }
        }
        Commands::Prev => {
            require_session(&manager)?;
            match manager.prev_change() {
                Some(change) => print_change_detail(&change),
                None => println!("No pending changes"),
            }
        }
        Commands::Jump { id } => {
            require_session(&manager)?;
            if !manager.set_current_change(&id) {
                bail!("No change with id {}", id);
            }
            if let Some(change) = manager.current_change() {
                print_change_detail(change);
            }
        }
        Commands::Accept(resolve_args) => {
            handle_resolve(&mut manager, resolve_args.id, ChangeStatus::Accepted)?
        }
        Commands::Reject(resolve_args) => {
            handle_resolve(&mut manager, resolve_args.id, ChangeStatus::Rejected)?
        }
        Commands::AcceptFile { path } => {
            require_session(&manager)?;
            let path = absolute_review_path(&manager, &path);
            let count = manager.accept_file(&path);
            println!("✓ Accepted {} changes in {}", count, path);
        }
        Commands::AcceptAll => {
            require_session(&manager)?;
            let count = manager.accept_all();
            println!("✓ Accepted {} changes", count);
        }
        Commands::Remap(remap_args) => handle_remap(&mut manager, remap_args)?,
        Commands::Note { action } => handle_note(&mut manager, action)?,
        Commands::End => match manager.end() {
            Some(summary) => {
                println!("Review finished");
                println!("  Accepted: {}", summary.accepted);
                println!("  Rejected: {}", summary.rejected);
                println!("  Pending:  {}", summary.pending);
            }
            None => println!("No active review"),
        },
    }

    Ok(())
}

/// Parse the diff and open a new session for it.
fn handle_start(manager: &mut Manager, args: StartArgs, cwd: &Path) -> Result<()> {
    if let Some(session) = manager.session() {
        bail!(
            "Review of {} already in progress; run `commit-review end` first",
            session.short_hash
        );
    }

    let diff_text = read_diff(args.diff.as_deref())?;
    let root = match args.root {
        Some(root) => root,
        None => config::default_review_root(cwd),
    };

    let changes = flatten_hunks(parse_diff(&diff_text, &root.to_string_lossy()));
    if changes.is_empty() {
        println!("No changes to review");
        return Ok(());
    }

    let mut commit = CommitInfo::new(args.commit, args.message, args.base);
    if let Some(short) = args.short {
        commit.short_hash = short;
    }
    let short_hash = commit.short_hash.clone();
    let count = changes.len();
    manager.start(commit, changes)?;

    println!("✓ Started review of {} ({} changes)", short_hash, count);
    if let Some(change) = manager.current_change() {
        print_change_detail(change);
    }
    Ok(())
}

fn read_diff(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read diff from {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read diff from stdin")?;
            Ok(text)
        }
    }
}

fn handle_status(manager: &Manager) {
    let Some(session) = manager.session() else {
        println!("No active review");
        return;
    };

    let stats = manager.stats();
    let first_line = session.commit_message.lines().next().unwrap_or("");
    println!("Review of {} {}", session.short_hash, first_line);
    println!("─────────────────────────────────────");
    println!(
        "  Resolved:   {}/{} changes ({:.0}%)",
        stats.accepted + stats.rejected,
        stats.total,
        if stats.total > 0 {
            ((stats.accepted + stats.rejected) as f64 / stats.total as f64) * 100.0
        } else {
            0.0
        }
    );
    println!("  Accepted:   {}", stats.accepted);
    println!("  Rejected:   {}", stats.rejected);
    println!("  Pending:    {}", stats.pending);
    println!(
        "  Files:      {}/{} remaining",
        stats.files_remaining, stats.total_files
    );
    println!("  Notes:      {} open", stats.active_notes);

    if stats.pending == 0 {
        println!("\n✓ All changes resolved! Run `commit-review end` to finish.");
    }
}

fn handle_list(manager: &Manager, args: &ListArgs) -> Result<()> {
    require_session(manager)?;

    let changes: Vec<&Change> = match (&args.file, args.pending) {
        (Some(file), true) => manager.pending_changes_for_file(&absolute_review_path(manager, file)),
        (Some(file), false) => manager.changes_for_file(&absolute_review_path(manager, file)),
        (None, true) => manager.pending_changes(),
        (None, false) => manager.all_changes().iter().collect(),
    };

    let current_id = manager.current_change().map(|c| c.id.clone());
    for change in changes {
        let marker = if Some(&change.id) == current_id.as_ref() {
            ">"
        } else {
            " "
        };
        println!("{} {}", marker, change_summary(change));
    }
    Ok(())
}

fn handle_resolve(manager: &mut Manager, id: Option<String>, status: ChangeStatus) -> Result<()> {
    require_session(manager)?;

    let id = match id {
        Some(id) => id,
        None => match manager.current_change() {
            Some(change) => change.id.clone(),
            None => bail!("No pending change to resolve"),
        },
    };

    let resolved = match status {
        ChangeStatus::Rejected => manager.reject(&id),
        _ => manager.accept(&id),
    };
    let Some(change) = resolved else {
        match manager.change(&id) {
            Some(change) => bail!("Change {} is already {}", id, status_label(change.status)),
            None => bail!("No change with id {}", id),
        }
    };

    println!("✓ {} {}", status_label(change.status), change_summary(&change));
    if change.status == ChangeStatus::Rejected {
        println!("  {}", restore_hint(&change));
        for line in &change.old_lines {
            println!("    {}", line);
        }
    }
    match manager.current_change() {
        Some(next) => println!("Next: {}", change_summary(next)),
        None => println!("\n✓ All changes resolved! Run `commit-review end` to finish."),
    }
    Ok(())
}

fn handle_remap(manager: &mut Manager, args: RemapArgs) -> Result<()> {
    require_session(manager)?;

    let path = absolute_review_path(manager, &args.path);
    let edit = EditEvent::new(args.start, args.end.unwrap_or(args.start), args.text);
    if manager.update_line_mapping(&path, &[edit]) {
        println!("✓ Updated positions in {}", path);
    } else {
        println!("Nothing to update in {}", path);
    }
    Ok(())
}

fn handle_note(manager: &mut Manager, action: NoteAction) -> Result<()> {
    require_session(manager)?;

    match action {
        NoteAction::Add {
            path,
            line,
            content,
        } => {
            let path = absolute_review_path(manager, &path);
            if let Some(note) = manager.add_note(&path, line, &content, None) {
                println!("✓ Added note {}", note.id);
            }
        }
        NoteAction::Edit { id, content } => match manager.update_note(&id, &content) {
            Some(note) => println!("✓ Updated note {}", note.id),
            None => bail!("No note with id {}", id),
        },
        NoteAction::Resolve { id } => match manager.resolve_note(&id) {
            Some(note) => println!("✓ Resolved note {}", note.id),
            None => bail!("No open note with id {}", id),
        },
        NoteAction::Delete { id } => match manager.delete_note(&id) {
            Some(note) => println!("✓ Deleted note {}", note.id),
            None => bail!("No note with id {}", id),
        },
        NoteAction::List { file } => {
            let notes = match file {
                Some(file) => manager.notes_for_file(&absolute_review_path(manager, &file)),
                None => manager.unresolved_notes(),
            };
            for note in notes {
                print_note(note);
            }
        }
    }
    Ok(())
}

fn require_session(manager: &Manager) -> Result<()> {
    if !manager.is_active() {
        bail!("No active review; start one with `commit-review start`");
    }
    Ok(())
}

/// Map a path given on the command line onto the absolute paths the session uses.
fn absolute_review_path(manager: &Manager, path: &str) -> String {
    let path = path.replace('\\', "/");
    if path.starts_with('/') || manager.changed_files().contains(&path) {
        return path;
    }
    manager
        .changed_files()
        .into_iter()
        .find(|file| file.ends_with(&format!("/{}", path)))
        .unwrap_or(path)
}

fn status_label(status: ChangeStatus) -> &'static str {
    match status {
        ChangeStatus::Pending => "pending",
        ChangeStatus::Accepted => "accepted",
        ChangeStatus::Rejected => "rejected",
    }
}

fn change_summary(change: &Change) -> String {
    let kind = match change.kind {
        ChangeKind::Add => "add",
        ChangeKind::Delete => "delete",
        ChangeKind::Modify => "modify",
    };
    format!(
        "{} {:<6} {}:{} (-{} +{}) [{}]",
        change.id,
        kind,
        change.file_path,
        change.new_line_start,
        change.old_line_count,
        change.new_line_count,
        status_label(change.status)
    )
}

/// Where the old text of a rejected change goes back into the working copy.
fn restore_hint(change: &Change) -> String {
    let start = change.new_line_start;
    match change.new_line_count {
        0 => format!("Insert at line {} of {}:", start, change.file_path),
        1 => format!("Restore line {} of {} to:", start, change.file_path),
        count => format!(
            "Restore lines {}-{} of {} to:",
            start,
            start.saturating_add(count - 1),
            change.file_path
        ),
    }
}

fn print_change_detail(change: &Change) {
    println!("{}", change_summary(change));
    for line in &change.old_lines {
        println!("  -{}", line);
    }
    for line in &change.new_lines {
        println!("  +{}", line);
    }
}

fn print_note(note: &ReviewNote) {
    println!(
        "{} {}:{} {}",
        note.id, note.file_path, note.line, note.content
    );
}
