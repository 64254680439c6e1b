use super::*;
use crate::host::TerminalHost;
use std::fs;

fn create(path: &str, content: &str) -> FileAction {
    FileAction::Create {
        path: path.to_string(),
        content: content.to_string(),
    }
}

fn delete(path: &str) -> FileAction {
    FileAction::Delete {
        path: path.to_string(),
    }
}

#[test]
fn creates_files_with_missing_parents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = TerminalHost::new(Some(dir.path().to_path_buf()));

    let results = execute(&[create("./src/deep/a.txt", "hello")], dir.path(), &host);

    assert_eq!(results.len(), 1);
    assert!(results[0].succeeded());
    assert_eq!(results[0].path, "src/deep/a.txt");
    assert_eq!(
        fs::read_to_string(dir.path().join("src/deep/a.txt")).expect("read"),
        "hello"
    );
}

#[test]
fn modify_overwrites_the_whole_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("b.txt"), "old content that is long").expect("seed");
    let host = TerminalHost::new(None);

    let action = FileAction::Modify {
        path: "b.txt".to_string(),
        content: "new".to_string(),
    };
    execute(&[action], dir.path(), &host);

    assert_eq!(fs::read_to_string(dir.path().join("b.txt")).expect("read"), "new");
}

#[test]
fn escaping_path_fails_without_aborting_the_batch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = TerminalHost::new(None);

    let results = execute(
        &[create("../../etc/passwd", "x"), create("ok.txt", "fine")],
        dir.path(),
        &host,
    );

    assert!(!results[0].succeeded());
    assert_eq!(results[0].path, "../../etc/passwd");
    assert!(results[1].succeeded());
    assert!(dir.path().join("ok.txt").is_file());
}

#[test]
fn every_action_is_reported_to_the_host() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = TerminalHost::new(None);

    execute(
        &[create("a.txt", "x"), create("../out.txt", "x"), delete("gone.txt")],
        dir.path(),
        &host,
    );

    let notifications = host.take_notifications();
    assert_eq!(notifications.len(), 3);
    assert!(!notifications[0].is_error());
    assert!(notifications[1].is_error());
    assert!(!notifications[2].is_error());
}

#[test]
fn deleting_a_missing_file_succeeds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = TerminalHost::new(None);

    let results = execute(&[delete("never/existed.txt")], dir.path(), &host);

    assert!(results[0].succeeded());
}

#[test]
fn delete_prunes_empty_parents_but_keeps_the_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("project");
    fs::create_dir_all(root.join("a/b")).expect("mkdir");
    fs::write(root.join("a/b/c.txt"), "x").expect("seed");
    let host = TerminalHost::new(Some(root.clone()));

    let results = execute(&[delete("a/b/c.txt")], &root, &host);

    assert!(results[0].succeeded());
    assert!(!root.join("a").exists());
    assert!(root.is_dir());
}

#[test]
fn delete_keeps_non_empty_parents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    fs::create_dir_all(root.join("a/b")).expect("mkdir");
    fs::write(root.join("a/b/c.txt"), "x").expect("seed");
    fs::write(root.join("a/keep.txt"), "x").expect("seed");
    let host = TerminalHost::new(None);

    execute(&[delete("a/b/c.txt")], root, &host);

    assert!(!root.join("a/b").exists());
    assert!(root.join("a/keep.txt").is_file());
}

#[test]
fn delete_closes_the_open_document_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().expect("canonical");
    fs::write(root.join("open.rs"), "fn x() {}").expect("seed");
    let host = TerminalHost::new(Some(root.clone()));
    host.open_document(&root.join("open.rs")).expect("open");

    execute(&[delete("open.rs")], &root, &host);

    assert!(host.active_document().is_none());
    assert!(!root.join("open.rs").exists());
}

#[test]
fn repeating_a_create_gives_the_same_result_and_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = TerminalHost::new(None);
    let actions = [create("docs/readme.md", "# Title")];

    let first = execute(&actions, dir.path(), &host);
    let second = execute(&actions, dir.path(), &host);

    assert_eq!(first, second);
    assert!(second[0].succeeded());
    assert_eq!(
        fs::read_to_string(dir.path().join("docs/readme.md")).expect("read"),
        "# Title"
    );
}
