use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DB_ENV_VAR;

#[derive(Parser, Debug)]
#[command(
    name = "commit-review",
    about = "Accept or reject the changes of a commit one by one"
)]
pub struct Cli {
    /// Session database (default: .git/review-state/session.db).
    #[arg(long, global = true, env = DB_ENV_VAR)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start reviewing a commit from its unified diff.
    Start(StartArgs),
    /// Print review progress.
    Status,
    /// List the changes of the active review.
    List(ListArgs),
    /// Show the change under the cursor.
    Current,
    /// Move to the next pending change.
    Next,
    /// Move to the previous pending change.
    Prev,
    /// Move the cursor to a change by id.
    Jump { id: String },
    /// Keep a change (defaults to the current one).
    Accept(ResolveArgs),
    /// Mark a change for revert (defaults to the current one).
    Reject(ResolveArgs),
    /// Accept every pending change in a file.
    AcceptFile { path: String },
    /// Accept every pending change.
    AcceptAll,
    /// Shift change and note positions after a file was edited.
    Remap(RemapArgs),
    /// Manage review notes.
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },
    /// Finish the review and print the summary.
    End,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Full hash of the commit under review.
    #[arg(long)]
    pub commit: String,

    /// Parent commit the rejected changes revert to.
    #[arg(long)]
    pub base: String,

    /// Commit message.
    #[arg(short, long, default_value = "")]
    pub message: String,

    /// Abbreviated hash (default: first 7 characters of --commit).
    #[arg(long)]
    pub short: Option<String>,

    /// Directory the diff paths are relative to (default: repository root).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// File holding the unified diff. Reads stdin when omitted or "-".
    pub diff: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show pending changes.
    #[arg(short, long)]
    pub pending: bool,

    /// Only show changes in this file.
    #[arg(short, long)]
    pub file: Option<String>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Change id. Defaults to the current change.
    pub id: Option<String>,
}

#[derive(Args, Debug)]
pub struct RemapArgs {
    /// File that was edited.
    pub path: String,

    /// First line of the replaced range (1-indexed).
    #[arg(long)]
    pub start: u32,

    /// Last line of the replaced range (default: same as --start).
    #[arg(long)]
    pub end: Option<u32>,

    /// Replacement text.
    #[arg(long, default_value = "")]
    pub text: String,
}

#[derive(Subcommand, Debug)]
pub enum NoteAction {
    /// Attach a note to a line.
    Add {
        path: String,
        line: u32,
        content: String,
    },
    /// Replace the text of a note.
    Edit { id: String, content: String },
    /// Mark a note resolved.
    Resolve { id: String },
    /// Delete a note.
    Delete { id: String },
    /// List unresolved notes.
    List {
        /// Only notes in this file.
        #[arg(short, long)]
        file: Option<String>,
    },
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
