use commit_review::events::{EventBus, SessionEvent};
use commit_review::mapping::EditEvent;
use commit_review::parser::{changed_files, flatten_hunks, parse_diff};
use commit_review::session::{CommitInfo, SESSION_STATE_KEY, SessionManager};
use commit_review::state::{ReviewDb, SessionStore};
use commit_review::{ChangeKind, ChangeStatus, SelectionRange};
use std::cell::RefCell;
use std::rc::Rc;

const DIFF: &str = r#"diff --git a/src/a.rs b/src/a.rs
index 1111111..2222222 100644
--- a/src/a.rs
+++ b/src/a.rs
@@ -1,4 +1,5 @@
 fn a() {
-    old_a();
+    new_a();
+    extra_a();
 }
@@ -20,3 +21,2 @@ fn later() {
 keep
-drop_me
 keep
diff --git a/src/b.rs b/src/b.rs
new file mode 100644
index 0000000..3333333
--- /dev/null
+++ b/src/b.rs
@@ -0,0 +1,2 @@
+fn b() {}
+fn c() {}
diff --git a/logo.png b/logo.png
index 4444444..5555555 100644
Binary files a/logo.png and b/logo.png differ
diff --git a/src/c.rs b/src/c.rs
index 6666666..7777777 100644
--- a/src/c.rs
+++ b/src/c.rs
@@ -7 +7,2 @@
-let x = 1;
+let x = 2;
+let y = 3;
"#;

fn commit() -> CommitInfo {
    CommitInfo::new(
        "9f8e7d6c5b4a39281706f5e4d3c2b1a098765432",
        "Refactor a, add b",
        "1a2b3c4d5e6f708192a3b4c5d6e7f80912345678",
    )
}

fn open_db(dir: &tempfile::TempDir) -> ReviewDb {
    ReviewDb::open(&dir.path().join("session.db")).unwrap()
}

fn started(dir: &tempfile::TempDir) -> SessionManager<ReviewDb> {
    let mut manager = SessionManager::new(open_db(dir), EventBus::new());
    let changes = flatten_hunks(parse_diff(DIFF, "/work/repo"));
    manager.start(commit(), changes).unwrap();
    manager
}

fn ids_of_file(manager: &SessionManager<ReviewDb>, file: &str) -> Vec<String> {
    manager
        .changes_for_file(file)
        .iter()
        .map(|c| c.id.clone())
        .collect()
}

#[test]
fn parsed_diff_becomes_session_changes() {
    let dir = tempfile::tempdir().unwrap();
    let manager = started(&dir);

    let kinds: Vec<ChangeKind> = manager.all_changes().iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ChangeKind::Modify,
            ChangeKind::Delete,
            ChangeKind::Add,
            ChangeKind::Modify
        ]
    );
    assert_eq!(
        changed_files(manager.all_changes()),
        vec![
            "/work/repo/src/a.rs".to_string(),
            "/work/repo/src/b.rs".to_string(),
            "/work/repo/src/c.rs".to_string(),
        ]
    );

    let delete = &manager.all_changes()[1];
    assert_eq!(delete.old_line_start, 21);
    assert_eq!(delete.new_line_start, 22);
    assert_eq!(delete.old_lines, vec!["drop_me"]);
}

#[test]
fn full_walkthrough_with_summary() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = started(&dir);

    while let Some(current) = manager.current_change().cloned() {
        if current.kind == ChangeKind::Delete {
            manager.reject(&current.id).unwrap();
        } else {
            manager.accept(&current.id).unwrap();
        }
    }

    let stats = manager.stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.files_remaining, 0);

    let summary = manager.end().unwrap();
    assert_eq!(summary.accepted, 3);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.pending, 0);
}

#[test]
fn session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let (session_before, a_ids) = {
        let mut manager = started(&dir);
        let a_ids = ids_of_file(&manager, "/work/repo/src/a.rs");
        manager.accept(&a_ids[0]).unwrap();
        manager
            .add_note(
                "/work/repo/src/c.rs",
                7,
                "why 2?",
                Some(SelectionRange {
                    start_line: 6,
                    start_character: 0,
                    end_line: 6,
                    end_character: 10,
                }),
            )
            .unwrap();
        manager.next_change().unwrap();
        (manager.session().unwrap().clone(), a_ids)
    };

    let restored_events = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&restored_events);
    let mut bus = EventBus::new();
    bus.subscribe(move |event| {
        if let SessionEvent::SessionRestored(_) = event {
            *sink.borrow_mut() += 1;
        }
    });

    let manager = SessionManager::new(open_db(&dir), bus);
    let session = manager.session().unwrap();
    assert_eq!(session, &session_before);
    assert_eq!(session.started_at, session_before.started_at);
    assert_eq!(
        manager.change(&a_ids[0]).unwrap().status,
        ChangeStatus::Accepted
    );
    assert_eq!(manager.unresolved_notes().len(), 1);
    assert_eq!(*restored_events.borrow(), 1);
}

#[test]
fn end_clears_persisted_slot() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = started(&dir);
    assert!(manager.store().get(SESSION_STATE_KEY).unwrap().is_some());

    manager.end().unwrap();
    assert!(manager.store().get(SESSION_STATE_KEY).unwrap().is_none());

    let reopened = SessionManager::new(open_db(&dir), EventBus::new());
    assert!(!reopened.is_active());
}

#[test]
fn jump_into_file_then_resolve_continues_there() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = started(&dir);
    let a_ids = ids_of_file(&manager, "/work/repo/src/a.rs");
    let b_ids = ids_of_file(&manager, "/work/repo/src/b.rs");

    assert!(manager.set_current_change(&a_ids[0]));
    manager.reject(&a_ids[0]).unwrap();
    assert_eq!(manager.current_change().unwrap().id, a_ids[1]);

    manager.accept(&a_ids[1]).unwrap();
    assert_eq!(manager.current_change().unwrap().id, b_ids[0]);
}

#[test]
fn edits_above_changes_shift_them() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = started(&dir);
    let a_ids = ids_of_file(&manager, "/work/repo/src/a.rs");
    manager.accept(&a_ids[0]).unwrap();

    // Replacing line 2 with three lines pushes the later delete down by two.
    let moved = manager.update_line_mapping(
        "/work/repo/src/a.rs",
        &[EditEvent::new(2, 2, "one\ntwo\nthree")],
    );
    assert!(moved);
    assert_eq!(manager.change(&a_ids[0]).unwrap().new_line_start, 2);
    assert_eq!(manager.change(&a_ids[1]).unwrap().new_line_start, 24);

    let persisted = manager.store().get(SESSION_STATE_KEY).unwrap().unwrap();
    assert!(persisted.contains("\"newLineStart\":24"));
}

#[test]
fn persisted_form_uses_camel_case_and_iso_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let manager = started(&dir);
    let raw = manager.store().get(SESSION_STATE_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(value["shortHash"], "9f8e7d6");
    assert_eq!(value["currentIndex"], 0);
    assert_eq!(value["changes"][0]["status"], "pending");
    assert_eq!(value["changes"][2]["kind"], "add");
    assert!(value["notes"].as_array().unwrap().is_empty());

    let started_at = value["startedAt"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(started_at).is_ok());
}
