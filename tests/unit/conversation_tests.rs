use super::*;
use crate::backend::Role;
use crate::backend::scripted::ScriptedBackend;
use crate::error::BackendError;
use crate::host::TerminalHost;
use crate::models::{Model, Provider};
use std::fs;
use std::sync::Arc;

fn session(mode: Mode) -> SessionState {
    SessionState::new(mode, ModelCatalog::with_selection(Some("m1".to_string())))
}

fn conversation(
    replies: Vec<Result<String, BackendError>>,
) -> (Conversation, Arc<ScriptedBackend>) {
    let backend = Arc::new(ScriptedBackend::new(replies));
    (Conversation::new(Arc::clone(&backend) as Arc<dyn ChatBackend>), backend)
}

fn ok(text: &str) -> Result<String, BackendError> {
    Ok(text.to_string())
}

fn transport_failure() -> Result<String, BackendError> {
    Err(BackendError::Transport {
        url: "http://backend".to_string(),
        message: "connection refused".to_string(),
    })
}

#[test]
fn ask_turn_appends_user_and_assistant_turns() {
    let (mut chat, backend) = conversation(vec![ok("4")]);
    let host = TerminalHost::new(None);
    let state = session(Mode::Ask);

    let reply = chat.handle_turn("2+2?", &state, &host).expect("reply");

    assert_eq!(reply.text, "4");
    assert_eq!(
        chat.history(),
        &[ConversationTurn::user("2+2?"), ConversationTurn::assistant("4")]
    );
    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let (messages, model) = &requests[0];
    assert_eq!(model.as_deref(), Some("m1"));
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages.last(), Some(&ChatMessage::user("2+2?")));
    assert!(host.take_notifications().is_empty());
}

#[test]
fn ask_sends_only_the_recent_history_window() {
    let replies = (0..8).map(|i| ok(&format!("answer {i}"))).collect();
    let (mut chat, backend) = conversation(replies);
    let host = TerminalHost::new(None);
    let state = session(Mode::Ask);

    for i in 0..8 {
        chat.handle_turn(&format!("question {i}"), &state, &host)
            .expect("reply");
    }

    let requests = backend.requests();
    let (last, _) = requests.last().expect("last request");
    assert_eq!(last.len(), 1 + DEFAULT_HISTORY_WINDOW + 1);
    assert_eq!(last[1], ChatMessage::assistant("answer 4"));
    assert_eq!(last[6], ChatMessage::user("question 7"));
    assert_eq!(chat.history().len(), 16);
}

#[test]
fn backend_failure_rolls_back_the_user_turn() {
    let (mut chat, _backend) = conversation(vec![ok("first"), transport_failure()]);
    let host = TerminalHost::new(None);
    let state = session(Mode::Ask);
    chat.handle_turn("one", &state, &host).expect("first turn");

    let err = chat
        .handle_turn("two", &state, &host)
        .expect_err("second turn fails");

    assert!(matches!(err, ConversationError::Backend(_)));
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(
        chat.history(),
        &[ConversationTurn::user("one"), ConversationTurn::assistant("first")]
    );
}

#[test]
fn missing_model_is_rejected_before_any_request() {
    let (mut chat, backend) = conversation(vec![ok("unused")]);
    let host = TerminalHost::new(None);
    let state = SessionState::default();

    let err = chat
        .handle_turn("hello", &state, &host)
        .expect_err("no model");

    assert!(matches!(err, ConversationError::NoModelSelected));
    assert!(chat.history().is_empty());
    assert!(backend.requests().is_empty());
}

#[test]
fn listed_models_supply_the_fallback_selection() {
    let (mut chat, backend) = conversation(vec![ok("hi")]);
    let host = TerminalHost::new(None);
    let mut catalog = ModelCatalog::default();
    catalog.replace(vec![Model::new("listed", Provider::Remote)]);
    let state = SessionState::new(Mode::Ask, catalog);

    chat.handle_turn("hello", &state, &host).expect("reply");

    assert_eq!(backend.requests()[0].1.as_deref(), Some("listed"));
}

#[test]
fn edit_without_document_fails_and_rolls_back() {
    let (mut chat, backend) = conversation(vec![ok("unused")]);
    let host = TerminalHost::new(None);
    let state = session(Mode::Edit);

    let err = chat
        .handle_turn("rename", &state, &host)
        .expect_err("no document");

    assert!(matches!(err, ConversationError::NoActiveDocument));
    assert!(chat.history().is_empty());
    assert!(backend.requests().is_empty());
}

#[test]
fn edit_replaces_the_document_with_the_first_code_block() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("lib.rs");
    fs::write(&file, "pub fn a() {}\n").expect("seed");
    let host = TerminalHost::new(None);
    host.open_document(&file).expect("open");
    let (mut chat, backend) = conversation(vec![ok(
        "Renamed.\n```rust\npub fn b() {}\n```\n```rust\nignored\n```",
    )]);
    let state = session(Mode::Edit);

    let reply = chat
        .handle_turn("rename a to b", &state, &host)
        .expect("reply");

    assert_eq!(fs::read_to_string(&file).expect("read"), "pub fn b() {}");
    assert!(reply.edited.is_some());
    assert!(reply.text.starts_with("Updated "));
    assert_eq!(chat.history()[1].content, reply.text);
    let requests = backend.requests();
    let (messages, _) = &requests[0];
    assert_eq!(messages.len(), 1);
    assert!(messages[0].content.contains("pub fn a() {}"));
}

#[test]
fn edit_writes_only_the_code_under_a_symbolic_language_tag() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("Program.cs");
    fs::write(&file, "var x = 0;\n").expect("seed");
    let host = TerminalHost::new(None);
    host.open_document(&file).expect("open");
    let (mut chat, _backend) = conversation(vec![ok("```c#\nvar x = 1;\n```")]);
    let state = session(Mode::Edit);

    chat.handle_turn("bump x", &state, &host).expect("reply");

    assert_eq!(fs::read_to_string(&file).expect("read"), "var x = 1;");
}

#[test]
fn edit_reply_without_code_block_leaves_the_document_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("notes.md");
    fs::write(&file, "original").expect("seed");
    let host = TerminalHost::new(None);
    host.open_document(&file).expect("open");
    let (mut chat, _backend) = conversation(vec![ok("I cannot do that.")]);
    let state = session(Mode::Edit);

    let reply = chat.handle_turn("rewrite", &state, &host).expect("reply");

    assert_eq!(reply.text, "I cannot do that.");
    assert!(reply.edited.is_none());
    assert_eq!(fs::read_to_string(&file).expect("read"), "original");
}

#[test]
fn agent_applies_directives_under_the_workspace_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_path_buf();
    fs::write(root.join("old.txt"), "bye").expect("seed");
    let raw = "Doing it.\nCREATE_FILE: src/new.rs\n```rust\nfn new() {}\n```\nDELETE_FILE: old.txt\n";
    let (mut chat, backend) = conversation(vec![ok(raw)]);
    let host = TerminalHost::new(Some(root.clone()));
    let state = session(Mode::Agent);

    let reply = chat
        .handle_turn("add new.rs", &state, &host)
        .expect("reply");

    assert_eq!(reply.text, raw);
    assert_eq!(reply.actions.len(), 2);
    assert!(reply.actions.iter().all(ActionResult::succeeded));
    assert_eq!(
        fs::read_to_string(root.join("src/new.rs")).expect("read"),
        "fn new() {}"
    );
    assert!(!root.join("old.txt").exists());
    assert_eq!(host.take_notifications().len(), 2);
    let requests = backend.requests();
    let (messages, _) = &requests[0];
    assert!(messages[0].content.contains("old.txt"));
    assert!(messages[0].content.contains("add new.rs"));
}

#[test]
fn agent_falls_back_to_the_active_document_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().expect("canonical");
    fs::write(root.join("main.py"), "print(1)").expect("seed");
    let host = TerminalHost::new(None);
    host.open_document(&root.join("main.py")).expect("open");
    let (mut chat, _backend) = conversation(vec![ok("CREATE_FILE: util.py\n```\nx = 1\n```")]);
    let state = session(Mode::Agent);

    chat.handle_turn("add util", &state, &host).expect("reply");

    assert!(root.join("util.py").is_file());
}

#[test]
fn agent_without_any_root_asks_for_a_folder() {
    let (mut chat, backend) = conversation(vec![ok("unused")]);
    let host = TerminalHost::new(None);
    let state = session(Mode::Agent);

    let err = chat
        .handle_turn("do things", &state, &host)
        .expect_err("no root");

    assert!(matches!(err, ConversationError::NoProjectRoot));
    assert!(err.to_string().contains("Open a folder"));
    assert!(chat.history().is_empty());
    assert!(backend.requests().is_empty());
}

#[test]
fn agent_reports_escaping_paths_without_touching_them() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("project");
    fs::create_dir_all(&root).expect("mkdir");
    let (mut chat, _backend) = conversation(vec![ok(
        "CREATE_FILE: ../escape.txt\n```\nnope\n```\nCREATE_FILE: inside.txt\n```\nyes\n```",
    )]);
    let host = TerminalHost::new(Some(root.clone()));
    let state = session(Mode::Agent);

    let reply = chat.handle_turn("go", &state, &host).expect("reply");

    assert!(!reply.actions[0].succeeded());
    assert!(reply.actions[1].succeeded());
    assert!(!dir.path().join("escape.txt").exists());
    assert!(root.join("inside.txt").is_file());
}

#[test]
fn clear_wipes_history() {
    let (mut chat, _backend) = conversation(vec![ok("a")]);
    let host = TerminalHost::new(None);
    chat.handle_turn("q", &session(Mode::Ask), &host)
        .expect("reply");

    chat.clear();

    assert!(chat.history().is_empty());
}
