use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use crossterm::cursor::SetCursorStyle;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use tracing::{info, warn};

mod adapter;
mod app;
mod backend;
mod code_tools;
mod config;
mod conversation;
mod default_config;
mod directives;
mod error;
mod events;
mod executor;
mod fs_io;
mod host;
mod logging;
mod models;
mod paths;
mod project_listing;
mod prompts;
mod segments;
mod text_layout;
mod theme;
mod todos;
mod ui;

use adapter::{AgentEvent, TurnAdapter};
use app::{App, Command, Pane, Speaker, help_text, parse_command};
use code_tools::{RefactorKind, ToolOutput, ToolRequest};
use config::{AppConfig, ConfigStore, expand_home};
use conversation::{Conversation, Mode, SessionState};
use events::AppEvent;
use host::TerminalHost;
use models::ModelCatalog;
use theme::Theme;

const MAX_ADAPTER_EVENTS_PER_LOOP: usize = 128;
const PAGE_SCROLL_LINES: u16 = 5;

#[derive(Debug, Parser)]
#[command(name = "arkchat", version, about = "Terminal LLM client with ask, edit and agent modes")]
struct Cli {
    /// Config file to use instead of ~/.arkchat/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Project folder for agent mode. Defaults to the current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Model id, overriding the configured default.
    #[arg(long, global = true)]
    model: Option<String>,
    /// Mode the UI starts in.
    #[arg(long, value_enum)]
    mode: Option<Mode>,
    /// Send the contents of this file as the first message.
    #[arg(long)]
    send_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Run a single turn without the UI and print the reply.
    Run {
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Document to edit in edit mode.
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(required = true)]
        prompt: Vec<String>,
    },
    /// Print the display segments of a saved reply as JSON.
    Segment { file: PathBuf },
    /// List the models the configured backends offer.
    Models,
    /// Ask the backend to write code for a prompt.
    Generate {
        #[arg(long, default_value = "python")]
        language: String,
        #[arg(required = true)]
        prompt: Vec<String>,
    },
    /// Ask the backend to explain a file.
    Explain { file: PathBuf },
    /// Refactor a file in place.
    Refactor {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = RefactorKind::Clean)]
        kind: RefactorKind,
    },
    /// Report whether the backend and its Ollama connection are up.
    Health,
}

/// Everything a slash command or a submitted message may touch besides
/// the UI state.
struct Services {
    adapter: TurnAdapter,
    host: TerminalHost,
    store: ConfigStore,
    config: AppConfig,
    root: PathBuf,
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();
    match cli.command.take() {
        Some(CliCommand::Segment { file }) => {
            logging::init_stderr();
            print_segments(&file)
        }
        Some(CliCommand::Run { mode, file, prompt }) => {
            logging::init_stderr();
            let store = config_store(cli.config.as_deref())?;
            let config = store.load()?;
            let root = resolve_root(cli.root)?;
            let mode = mode.unwrap_or(config.conversation.default_mode);
            run_headless(&config, root, mode, cli.model, file, &prompt.join(" "))
        }
        Some(CliCommand::Models) => {
            logging::init_stderr();
            let config = config_store(cli.config.as_deref())?.load()?;
            print_models(&config, cli.model)
        }
        Some(CliCommand::Generate { language, prompt }) => {
            let request = ToolRequest::Generate {
                language,
                prompt: prompt.join(" "),
            };
            run_tool_headless(&cli, request, None)
        }
        Some(CliCommand::Explain { file }) => {
            run_tool_headless(&cli, ToolRequest::Explain, Some(&file))
        }
        Some(CliCommand::Refactor { file, kind }) => {
            run_tool_headless(&cli, ToolRequest::Refactor(kind), Some(&file))
        }
        Some(CliCommand::Health) => run_tool_headless(&cli, ToolRequest::Health, None),
        None => run_tui(cli),
    }
}

fn config_store(path: Option<&Path>) -> Result<ConfigStore> {
    match path {
        Some(path) => Ok(ConfigStore::at(path)),
        None => Ok(ConfigStore::user_default()?),
    }
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    root.canonicalize()
        .with_context(|| format!("cannot open project folder {}", root.display()))
}

fn initial_session(config: &AppConfig, mode: Mode, model: Option<String>) -> SessionState {
    let selection = model.or_else(|| config.backend.model());
    SessionState::new(mode, ModelCatalog::with_selection(selection))
}

fn print_segments(file: &Path) -> Result<()> {
    let text = fs_io::read_text_file(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let segments = segments::segment(&text);
    println!("{}", serde_json::to_string_pretty(&segments)?);
    Ok(())
}

fn print_models(config: &AppConfig, model: Option<String>) -> Result<()> {
    let backend = backend::from_config(config)?;
    let mut catalog = ModelCatalog::with_selection(model.or_else(|| config.backend.model()));
    catalog.replace(backend.list_models()?);
    if catalog.models().is_empty() {
        println!("No models available from {}", backend.describe());
        return Ok(());
    }
    for model in catalog.models() {
        let marker = if catalog.current() == Some(model.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {}\t{}", model.id, model.provider.as_str());
    }
    Ok(())
}

fn run_headless(
    config: &AppConfig,
    root: PathBuf,
    mode: Mode,
    model: Option<String>,
    file: Option<PathBuf>,
    prompt: &str,
) -> Result<()> {
    if prompt.trim().is_empty() {
        bail!("the prompt is empty");
    }
    let backend = backend::from_config(config)?;
    let host = TerminalHost::new(Some(root));
    if let Some(file) = file {
        host.open_document(&file)
            .with_context(|| format!("cannot open {}", file.display()))?;
    }

    let mut session = initial_session(config, mode, model);
    if session.catalog.current().is_none() {
        match backend.list_models() {
            Ok(models) => session.catalog.replace(models),
            Err(err) => warn!(error = %err, "model listing failed"),
        }
    }

    let mut conversation = Conversation::new(backend).with_limits(
        config.conversation.history_window,
        config.conversation.listing_depth,
    );
    let reply = conversation.handle_turn(prompt, &session, &host)?;
    println!("{}", reply.text);
    for result in &reply.actions {
        match &result.outcome {
            Ok(()) => println!("{} {}", result.action.past_tense(), result.path),
            Err(message) => eprintln!("failed {}: {message}", result.path),
        }
    }
    if reply.actions.iter().any(|result| !result.succeeded()) {
        bail!("some file actions failed");
    }
    Ok(())
}

fn run_tool_headless(cli: &Cli, request: ToolRequest, file: Option<&Path>) -> Result<()> {
    logging::init_stderr();
    let config = config_store(cli.config.as_deref())?.load()?;
    let root = resolve_root(cli.root.clone())?;
    let backend = backend::from_config(&config)?;
    let host = TerminalHost::new(Some(root.clone()));
    if let Some(file) = file {
        host.open_document(file)
            .with_context(|| format!("cannot open {}", file.display()))?;
    }
    let model = cli.model.clone().or_else(|| config.backend.model());

    let output = code_tools::run_tool(backend.as_ref(), &request, model.as_deref(), &host)?;
    println!("{}", output.render(|path| display_path(path, &root)));
    match &output {
        ToolOutput::Health(health) if !health.is_healthy() => {
            bail!("backend is {}", health.status)
        }
        _ => Ok(()),
    }
}

fn run_tui(cli: Cli) -> Result<()> {
    let store = config_store(cli.config.as_deref())?;
    let config = store.load()?;
    let log_path = config::app_dir()?.join("arkchat.log");
    if let Err(err) = logging::init(&log_path) {
        eprintln!("Failed to open log file '{}': {err}", log_path.display());
    }
    let startup_message = cli
        .send_file
        .as_deref()
        .map(fs_io::read_text_file)
        .transpose()
        .context("cannot read --send-file")?;

    let root = resolve_root(cli.root)?;
    let backend = backend::from_config(&config)?;
    let conversation = Conversation::new(backend).with_limits(
        config.conversation.history_window,
        config.conversation.listing_depth,
    );
    let session = initial_session(
        &config,
        cli.mode.unwrap_or(config.conversation.default_mode),
        cli.model,
    );
    let adapter = TurnAdapter::new(conversation);
    let app = App::new(session, adapter.backend_label());
    let theme = Theme::from_config(&config.theme);
    let services = Services {
        adapter,
        host: TerminalHost::new(Some(root.clone())),
        store,
        config,
        root,
    };
    info!(
        root = %services.root.display(),
        config = %services.store.path().display(),
        "starting ui"
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        SetCursorStyle::SteadyBar
    )?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    let result = run_app(
        &mut terminal,
        app,
        services,
        &theme,
        startup_message.as_deref(),
    );

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        SetCursorStyle::DefaultUserShape,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    mut services: Services,
    theme: &Theme,
    startup_message: Option<&str>,
) -> Result<()> {
    services.adapter.refresh_models();
    if let Some(message) = startup_message {
        handle_submission(&mut app, &mut services, message);
    }

    while app.running {
        pump_background(&mut app, &mut services);
        terminal.draw(|frame| ui::render(frame, &app, theme))?;

        let size = terminal.size()?;
        let screen = Rect::new(0, 0, size.width, size.height);
        match events::next_event()? {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Quit => app.quit(),
            AppEvent::Cancel => app.close_picker(),
            AppEvent::NextPane => {
                if !app.autocomplete_top_command() {
                    app.next_pane();
                }
            }
            AppEvent::MoveUp => {
                if app.is_picker_open() {
                    app.picker_move_up();
                } else if app.active_pane == Pane::Transcript {
                    app.cursor_up(ui::input_text_width(screen, &app));
                } else {
                    app.scroll_up(1, max_scroll(screen, &app));
                }
            }
            AppEvent::MoveDown => {
                if app.is_picker_open() {
                    app.picker_move_down();
                } else if app.active_pane == Pane::Transcript {
                    app.cursor_down(ui::input_text_width(screen, &app));
                } else {
                    app.scroll_down(1, max_scroll(screen, &app));
                }
            }
            AppEvent::CursorLeft => app.cursor_left(),
            AppEvent::CursorRight => app.cursor_right(),
            AppEvent::CursorHome => app.cursor_home(),
            AppEvent::CursorEnd => app.cursor_end(),
            AppEvent::ScrollUp => app.scroll_up(1, max_scroll(screen, &app)),
            AppEvent::ScrollDown => app.scroll_down(1, max_scroll(screen, &app)),
            AppEvent::PageUp => app.scroll_up(PAGE_SCROLL_LINES, max_scroll(screen, &app)),
            AppEvent::PageDown => app.scroll_down(PAGE_SCROLL_LINES, max_scroll(screen, &app)),
            AppEvent::InputChar(c) => {
                if !app.is_picker_open() {
                    app.active_pane = Pane::Transcript;
                    app.input_char(c);
                }
            }
            AppEvent::Newline => {
                if !app.is_picker_open() {
                    app.input_char('\n');
                }
            }
            AppEvent::Backspace => app.backspace(),
            AppEvent::Submit => {
                if app.is_picker_open() {
                    if let Some(model) = app.take_picked_model() {
                        select_model(&mut app, &services, &model.id);
                    }
                } else if let Some(message) = app.take_input() {
                    handle_submission(&mut app, &mut services, &message);
                }
            }
        }
    }
    Ok(())
}

fn max_scroll(screen: Rect, app: &App) -> u16 {
    match app.active_pane {
        Pane::Transcript => ui::transcript_max_scroll(screen, app),
        Pane::Insights => ui::insights_max_scroll(screen, app),
    }
}

/// Applies finished turns, model listings and host notifications.
fn pump_background(app: &mut App, services: &mut Services) {
    for event in services
        .adapter
        .drain_events_limited(MAX_ADAPTER_EVENTS_PER_LOOP)
    {
        handle_agent_event(app, event, &services.root);
    }
    for notification in services.host.take_notifications() {
        app.push_notification(&notification);
    }
    app.set_document(
        services
            .host
            .active_path()
            .map(|path| display_path(&path, &services.root)),
    );
}

fn handle_agent_event(app: &mut App, event: AgentEvent, root: &Path) {
    match event {
        AgentEvent::TurnCompleted(Ok(reply)) => {
            app.set_busy(false);
            app.apply_reply(reply);
        }
        AgentEvent::TurnCompleted(Err(err)) => {
            app.set_busy(false);
            app.push(Speaker::Error, err.to_string());
        }
        AgentEvent::ModelsLoaded(Ok(models)) => {
            app.session.catalog.replace(models);
            if app.take_picker_request() {
                let models = app.session.catalog.models().to_vec();
                if models.is_empty() {
                    app.push(Speaker::System, "No models available.");
                } else {
                    app.open_model_picker(models);
                }
            }
        }
        AgentEvent::ModelsLoaded(Err(err)) => {
            warn!(error = %err, "model listing failed");
            if app.take_picker_request() {
                app.push(Speaker::Error, format!("Could not list models: {err}"));
            }
        }
        AgentEvent::ToolCompleted(Ok(output)) => {
            app.finish_tool();
            let speaker = match output {
                ToolOutput::Generated { .. } | ToolOutput::Explained { .. } => Speaker::Assistant,
                ToolOutput::Health(ref health) if !health.is_healthy() => Speaker::Error,
                ToolOutput::Health(_) | ToolOutput::Refactored { .. } => Speaker::System,
            };
            app.push(speaker, output.render(|path| display_path(path, root)));
        }
        AgentEvent::ToolCompleted(Err(err)) => {
            app.finish_tool();
            app.push(Speaker::Error, err.to_string());
        }
    }
}

fn handle_submission(app: &mut App, services: &mut Services, input: &str) {
    match parse_command(input) {
        Command::Message(text) => send_message(app, services, text),
        Command::SetMode(mode, text) => {
            app.session.mode = mode;
            match text {
                Some(text) => send_message(app, services, text),
                None => app.push(Speaker::System, mode_hint(mode, app.document())),
            }
        }
        Command::ListModels => {
            app.request_model_picker();
            services.adapter.refresh_models();
        }
        Command::SelectModel(id) => select_model(app, services, &id),
        Command::Open(raw) => open_document(app, services, &raw),
        Command::Close => match services.host.close_active() {
            Some(path) => {
                app.set_document(None);
                app.push(
                    Speaker::System,
                    format!("Closed {}", display_path(&path, &services.root)),
                );
            }
            None => app.push(Speaker::System, "No document is open."),
        },
        Command::Connect(url) => connect(app, services, &url),
        Command::Tool(request) => start_tool(app, services, request),
        Command::Clear => match services.adapter.conversation_mut() {
            Ok(conversation) => {
                let turns = conversation.history().len();
                conversation.clear();
                info!(turns, "chat history cleared");
                app.clear_transcript();
                app.push(Speaker::System, "Chat history cleared.");
            }
            Err(err) => app.push(Speaker::Error, format!("Cannot clear now: {err}")),
        },
        Command::Help => app.push(Speaker::System, help_text()),
        Command::Quit => app.quit(),
        Command::MissingArgument(usage) => app.push(Speaker::Error, format!("Usage: {usage}")),
        Command::Unknown(name) => app.push(
            Speaker::Error,
            format!("Unknown command {name}. /help lists commands."),
        ),
    }
}

const BUSY_MESSAGE: &str =
    "A request is already in progress. Wait for the reply before sending another.";

fn send_message(app: &mut App, services: &mut Services, text: String) {
    if app.is_busy() || services.adapter.is_busy() {
        app.push(Speaker::Error, BUSY_MESSAGE);
        return;
    }
    app.push(Speaker::You, text.clone());
    match services.adapter.submit(text, &app.session, &services.host) {
        Ok(()) => app.set_busy(true),
        Err(err) => app.push(Speaker::Error, err.to_string()),
    }
}

fn start_tool(app: &mut App, services: &Services, request: ToolRequest) {
    if app.is_busy() || services.adapter.is_busy() {
        app.push(Speaker::Error, BUSY_MESSAGE);
        return;
    }
    app.push(Speaker::System, request.progress_label());
    app.begin_tool();
    let model = app.session.catalog.current().map(str::to_string);
    services.adapter.run_tool(request, model, &services.host);
}

fn mode_hint(mode: Mode, document: Option<&str>) -> String {
    match (mode, document) {
        (Mode::Ask, _) => "Ask mode: questions go straight to the model.".to_string(),
        (Mode::Edit, Some(document)) => {
            format!("Edit mode: instructions rewrite {document}.")
        }
        (Mode::Edit, None) => "Edit mode: open a document first with /open <path>.".to_string(),
        (Mode::Agent, _) => {
            "Agent mode: the model may create, modify and delete files in the project.".to_string()
        }
    }
}

fn select_model(app: &mut App, services: &Services, id: &str) {
    app.session.catalog.select(id);
    let Some(current) = app.session.catalog.current().map(str::to_string) else {
        app.push(Speaker::System, "Model selection cleared.");
        return;
    };
    if !app.session.catalog.models().is_empty() && !app.session.catalog.contains(&current) {
        app.push(
            Speaker::Error,
            format!("{current} is not in the model list. Use /models to see what is available."),
        );
    } else {
        app.push(Speaker::System, format!("Using model {current}."));
    }
    if let Err(err) = services
        .store
        .set_value("backend", "default_model", current.as_str())
    {
        warn!(error = %err, "could not persist default model");
        app.push(Speaker::Error, format!("Could not save the default model: {err}"));
    }
}

fn open_document(app: &mut App, services: &Services, raw: &str) {
    let path = match expand_home(raw) {
        Ok(path) if path.is_relative() => services.root.join(path),
        Ok(path) => path,
        Err(err) => {
            app.push(Speaker::Error, err.to_string());
            return;
        }
    };
    match services.host.open_document(&path) {
        Ok(document) => {
            let label = display_path(&document.path, &services.root);
            app.push(
                Speaker::System,
                format!("Opened {label} ({})", document.language),
            );
            app.set_document(Some(label));
        }
        Err(err) => app.push(
            Speaker::Error,
            format!("Could not open {}: {err}", path.display()),
        ),
    }
}

fn connect(app: &mut App, services: &mut Services, url: &str) {
    let mut config = services.config.clone();
    config.backend.url = url.trim_end_matches('/').to_string();
    let backend = match backend::from_config(&config) {
        Ok(backend) => backend,
        Err(err) => {
            app.push(Speaker::Error, format!("Could not connect: {err}"));
            return;
        }
    };
    if let Err(err) = services.adapter.replace_backend(backend) {
        app.push(Speaker::Error, format!("Cannot switch backends now: {err}"));
        return;
    }
    if let Err(err) = services
        .store
        .set_value("backend", "url", config.backend.url.as_str())
    {
        warn!(error = %err, "could not persist backend url");
        app.push(Speaker::Error, format!("Could not save the backend URL: {err}"));
    }
    info!(url = %config.backend.url, "backend switched");
    app.set_backend_label(services.adapter.backend_label());
    app.push(Speaker::System, format!("Connected to {}", config.backend.url));
    services.config = config;
    services.adapter.refresh_models();
    app.begin_tool();
    services
        .adapter
        .run_tool(ToolRequest::Health, None, &services.host);
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
#[path = "../tests/unit/main_tests.rs"]
mod tests;
