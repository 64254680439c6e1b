use super::*;
use crate::backend::scripted::ScriptedBackend;
use crate::models::{Model, Provider};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn services(dir: &Path, backend: ScriptedBackend) -> Services {
    let root = dir.canonicalize().expect("canonical root");
    Services {
        adapter: TurnAdapter::new(Conversation::new(Arc::new(backend))),
        host: TerminalHost::new(Some(root.clone())),
        store: ConfigStore::at(root.join(".arkchat-test.toml")),
        config: AppConfig::default(),
        root,
    }
}

fn app() -> App {
    App::new(
        initial_session(&AppConfig::default(), Mode::Ask, Some("m1".to_string())),
        "scripted",
    )
}

fn pump_until(app: &mut App, services: &mut Services, done: impl Fn(&App) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        pump_background(app, services);
        if done(app) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for the worker");
        thread::sleep(Duration::from_millis(5));
    }
}

fn last_entry(app: &App) -> &app::TranscriptEntry {
    app.transcript().last().expect("transcript entry")
}

#[test]
fn message_runs_a_turn_and_shows_the_reply() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(dir.path(), ScriptedBackend::new(vec![Ok("pong".to_string())]));
    let mut app = app();

    handle_submission(&mut app, &mut services, "ping");
    assert!(app.is_busy());
    assert_eq!(last_entry(&app).speaker, Speaker::You);

    pump_until(&mut app, &mut services, |app| !app.is_busy());
    assert_eq!(last_entry(&app).speaker, Speaker::Assistant);
    assert_eq!(last_entry(&app).text, "pong");
}

#[test]
fn second_message_while_waiting_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(
        dir.path(),
        ScriptedBackend::new(vec![Ok("one".to_string()), Ok("two".to_string())]),
    );
    let mut app = app();

    handle_submission(&mut app, &mut services, "first");
    handle_submission(&mut app, &mut services, "second");

    assert_eq!(last_entry(&app).speaker, Speaker::Error);
    assert!(last_entry(&app).text.contains("already in progress"));
    pump_until(&mut app, &mut services, |app| !app.is_busy());
    assert!(
        !app.transcript()
            .iter()
            .any(|entry| entry.speaker == Speaker::You && entry.text == "second")
    );
}

#[test]
fn turn_errors_are_shown_and_clear_the_busy_flag() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(dir.path(), ScriptedBackend::default());
    let mut app = app();

    handle_submission(&mut app, &mut services, "/edit tidy this up");

    assert_eq!(app.session.mode, Mode::Edit);
    pump_until(&mut app, &mut services, |app| !app.is_busy());
    assert_eq!(last_entry(&app).speaker, Speaker::Error);
    assert!(last_entry(&app).text.contains("active document"));
}

#[test]
fn mode_command_without_text_only_switches() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(dir.path(), ScriptedBackend::default());
    let mut app = app();

    handle_submission(&mut app, &mut services, "/agent");

    assert_eq!(app.session.mode, Mode::Agent);
    assert!(!app.is_busy());
    assert!(last_entry(&app).text.starts_with("Agent mode"));
}

#[test]
fn agent_file_actions_reach_the_transcript() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(
        dir.path(),
        ScriptedBackend::new(vec![Ok(
            "Creating it.\nCREATE_FILE: notes/a.txt\n```\nhello\n```".to_string(),
        )]),
    );
    let mut app = app();
    app.session.mode = Mode::Agent;

    handle_submission(&mut app, &mut services, "make a note");
    pump_until(&mut app, &mut services, |app| !app.is_busy());

    assert_eq!(
        fs::read_to_string(dir.path().join("notes/a.txt")).expect("created"),
        "hello"
    );
    assert!(
        app.transcript()
            .iter()
            .any(|entry| entry.text == "Created notes/a.txt")
    );
    assert_eq!(
        app.last_reply().map(|reply| reply.actions.len()),
        Some(1)
    );
}

#[test]
fn open_and_close_track_the_active_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("src")).expect("mkdir");
    fs::write(dir.path().join("src/lib.rs"), "pub fn a() {}").expect("seed");
    let mut services = services(dir.path(), ScriptedBackend::default());
    let mut app = app();

    handle_submission(&mut app, &mut services, "/open src/lib.rs");
    assert_eq!(app.document(), Some("src/lib.rs"));
    assert_eq!(last_entry(&app).text, "Opened src/lib.rs (rust)");

    handle_submission(&mut app, &mut services, "/close");
    assert_eq!(app.document(), None);
    assert_eq!(last_entry(&app).text, "Closed src/lib.rs");

    handle_submission(&mut app, &mut services, "/close");
    assert_eq!(last_entry(&app).text, "No document is open.");
}

#[test]
fn opening_a_missing_file_reports_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(dir.path(), ScriptedBackend::default());
    let mut app = app();

    handle_submission(&mut app, &mut services, "/open nope.rs");

    assert_eq!(last_entry(&app).speaker, Speaker::Error);
    assert_eq!(app.document(), None);
}

#[test]
fn model_command_selects_and_persists_the_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(dir.path(), ScriptedBackend::default());
    let mut app = app();

    handle_submission(&mut app, &mut services, "/model llama3");

    assert_eq!(app.session.catalog.current(), Some("llama3"));
    assert_eq!(last_entry(&app).text, "Using model llama3.");
    let saved = services.store.load().expect("reload");
    assert_eq!(saved.backend.model().as_deref(), Some("llama3"));
}

#[test]
fn selecting_an_unlisted_model_warns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let services = services(dir.path(), ScriptedBackend::default());
    let mut app = app();
    app.session
        .catalog
        .replace(vec![Model::new("listed", Provider::Remote)]);

    select_model(&mut app, &services, "ghost");

    assert_eq!(last_entry(&app).speaker, Speaker::Error);
    assert!(last_entry(&app).text.contains("not in the model list"));
}

#[test]
fn models_command_opens_the_picker_once_the_listing_arrives() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = ScriptedBackend::default().with_models(vec![
        Model::new("m1", Provider::Remote),
        Model::new("m2", Provider::Local),
    ]);
    let mut services = services(dir.path(), backend);
    let mut app = app();

    handle_submission(&mut app, &mut services, "/models");
    pump_until(&mut app, &mut services, App::is_picker_open);

    assert_eq!(app.picker_models().len(), 2);
    assert_eq!(app.session.catalog.models().len(), 2);
}

#[test]
fn empty_listing_reports_instead_of_opening_the_picker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(dir.path(), ScriptedBackend::default());
    let mut app = app();

    handle_submission(&mut app, &mut services, "/models");
    pump_until(&mut app, &mut services, |app| {
        app.transcript()
            .last()
            .is_some_and(|entry| entry.text == "No models available.")
    });

    assert!(!app.is_picker_open());
}

#[test]
fn clear_wipes_history_and_transcript() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(dir.path(), ScriptedBackend::new(vec![Ok("a".to_string())]));
    let mut app = app();
    handle_submission(&mut app, &mut services, "q");
    pump_until(&mut app, &mut services, |app| !app.is_busy());

    handle_submission(&mut app, &mut services, "/clear");

    assert_eq!(
        services
            .adapter
            .conversation()
            .map(|conversation| conversation.history().len()),
        Some(0)
    );
    assert_eq!(app.transcript().len(), 1);
    assert_eq!(last_entry(&app).text, "Chat history cleared.");
}

#[test]
fn connect_switches_backend_and_persists_the_url() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(dir.path(), ScriptedBackend::default());
    let mut app = app();

    handle_submission(&mut app, &mut services, "/connect http://127.0.0.1:9/");

    assert_eq!(app.backend_label(), "remote http://127.0.0.1:9");
    assert_eq!(last_entry(&app).text, "Connected to http://127.0.0.1:9");
    assert_eq!(services.config.backend.url, "http://127.0.0.1:9");
    let saved = services.store.load().expect("reload");
    assert_eq!(saved.backend.url, "http://127.0.0.1:9");
}

#[test]
fn malformed_commands_are_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(dir.path(), ScriptedBackend::default());
    let mut app = app();

    handle_submission(&mut app, &mut services, "/open");
    assert_eq!(last_entry(&app).text, "Usage: /open <path>");

    handle_submission(&mut app, &mut services, "/bogus");
    assert_eq!(last_entry(&app).speaker, Speaker::Error);
    assert!(last_entry(&app).text.contains("/bogus"));

    handle_submission(&mut app, &mut services, "/quit");
    assert!(!app.running);
}

#[test]
fn display_path_is_relative_to_the_root_when_possible() {
    assert_eq!(
        display_path(Path::new("/work/src/a.rs"), Path::new("/work")),
        "src/a.rs"
    );
    assert_eq!(
        display_path(Path::new("/elsewhere/b.rs"), Path::new("/work")),
        "/elsewhere/b.rs"
    );
}

#[test]
fn cli_parses_launch_options_and_subcommands() {
    let cli = Cli::try_parse_from([
        "arkchat",
        "--mode",
        "agent",
        "--model",
        "m1",
        "--send-file",
        "prompt.txt",
    ])
    .expect("launch options");
    assert_eq!(cli.mode, Some(Mode::Agent));
    assert_eq!(cli.model.as_deref(), Some("m1"));
    assert!(cli.command.is_none());

    let cli = Cli::try_parse_from([
        "arkchat", "run", "--mode", "edit", "--file", "a.rs", "make", "it", "faster",
    ])
    .expect("run");
    match cli.command {
        Some(CliCommand::Run { mode, file, prompt }) => {
            assert_eq!(mode, Some(Mode::Edit));
            assert_eq!(file, Some(PathBuf::from("a.rs")));
            assert_eq!(prompt.join(" "), "make it faster");
        }
        other => panic!("unexpected command {other:?}"),
    }

    let cli = Cli::try_parse_from(["arkchat", "refactor", "a.py", "--kind", "optimize"])
        .expect("refactor");
    assert!(matches!(
        cli.command,
        Some(CliCommand::Refactor {
            kind: RefactorKind::Optimize,
            ..
        })
    ));
    let cli = Cli::try_parse_from(["arkchat", "generate", "sort", "a", "list"]).expect("generate");
    match cli.command {
        Some(CliCommand::Generate { language, prompt }) => {
            assert_eq!(language, "python");
            assert_eq!(prompt.join(" "), "sort a list");
        }
        other => panic!("unexpected command {other:?}"),
    }

    assert!(Cli::try_parse_from(["arkchat", "run"]).is_err());
    assert!(Cli::try_parse_from(["arkchat", "refactor", "a.py", "--kind", "shrink"]).is_err());
    assert!(Cli::try_parse_from(["arkchat", "--mode", "chat"]).is_err());
}

#[test]
fn refactor_rewrites_the_open_document_through_the_worker() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("calc.py"), "def add(a,b):\n  return a+b\n").expect("seed");
    let mut services = services(
        dir.path(),
        ScriptedBackend::new(vec![Ok("def add(a, b):\n    return a + b\n".to_string())]),
    );
    let mut app = app();
    handle_submission(&mut app, &mut services, "/open calc.py");

    handle_submission(&mut app, &mut services, "/refactor optimize");
    assert!(app.is_busy());
    assert_eq!(last_entry(&app).text, "Refactoring the open document (optimize).");
    pump_until(&mut app, &mut services, |app| !app.is_busy());

    assert_eq!(
        fs::read_to_string(dir.path().join("calc.py")).expect("read"),
        "def add(a, b):\n    return a + b\n"
    );
    assert_eq!(last_entry(&app).speaker, Speaker::System);
    assert_eq!(last_entry(&app).text, "Refactored calc.py (optimize).");
}

#[test]
fn generate_shows_the_code_as_an_assistant_reply() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(
        dir.path(),
        ScriptedBackend::new(vec![Ok("print('hi')".to_string())]),
    );
    let mut app = app();

    handle_submission(&mut app, &mut services, "/generate python say hi");
    pump_until(&mut app, &mut services, |app| !app.is_busy());

    assert_eq!(last_entry(&app).speaker, Speaker::Assistant);
    assert_eq!(last_entry(&app).text, "```python\nprint('hi')\n```");
    assert_eq!(
        services
            .adapter
            .conversation()
            .map(|conversation| conversation.history().len()),
        Some(0)
    );
}

#[test]
fn tools_report_failures_and_refuse_to_overlap() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut services = services(dir.path(), ScriptedBackend::default());
    let mut app = app();

    handle_submission(&mut app, &mut services, "/health");
    handle_submission(&mut app, &mut services, "/explain");
    assert!(last_entry(&app).text.contains("already in progress"));

    pump_until(&mut app, &mut services, |app| !app.is_busy());
    assert_eq!(last_entry(&app).speaker, Speaker::Error);
    assert!(last_entry(&app).text.contains("does not offer health checks"));

    handle_submission(&mut app, &mut services, "/explain");
    pump_until(&mut app, &mut services, |app| !app.is_busy());
    assert!(last_entry(&app).text.starts_with("/explain needs an active document"));
}
