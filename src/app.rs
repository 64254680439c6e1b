use crate::code_tools::{RefactorKind, ToolRequest};
use crate::conversation::{Mode, SessionState, TurnReply};
use crate::host::Notification;
use crate::models::Model;
use crate::text_layout::{WrappedText, wrap_text};

const COMMAND_INDEX: [(&str, &str); 16] = [
    ("/ask", "Chat with the model"),
    ("/edit", "Rewrite the open document"),
    ("/agent", "Let the model create, modify and delete project files"),
    ("/model", "Select a model by id"),
    ("/models", "Pick a model"),
    ("/open", "Open a document"),
    ("/close", "Close the open document"),
    ("/generate", "Generate code: /generate <language> <prompt>"),
    ("/explain", "Explain the open document"),
    ("/refactor", "Refactor the open document: clean, optimize or modernize"),
    ("/connect", "Use another backend URL"),
    ("/health", "Check the backend"),
    ("/clear", "Clear the chat history"),
    ("/help", "List commands"),
    ("/quit", "Quit app"),
    ("/exit", "Quit app"),
];
const MAX_TRANSCRIPT_ENTRIES: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSuggestion {
    pub command: &'static str,
    pub description: &'static str,
}

/// What a line of input asks for once slash commands are recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message(String),
    /// Switches mode; any trailing text is sent as a message in that mode.
    SetMode(Mode, Option<String>),
    ListModels,
    SelectModel(String),
    Open(String),
    Close,
    Connect(String),
    Tool(ToolRequest),
    Clear,
    Help,
    Quit,
    MissingArgument(&'static str),
    Unknown(String),
}

pub fn parse_command(input: &str) -> Command {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Command::Message(trimmed.to_string());
    }
    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (trimmed, ""),
    };
    let argument = (!rest.is_empty()).then(|| rest.to_string());

    match name {
        "/ask" => Command::SetMode(Mode::Ask, argument),
        "/edit" => Command::SetMode(Mode::Edit, argument),
        "/agent" => Command::SetMode(Mode::Agent, argument),
        "/models" => Command::ListModels,
        "/model" => argument.map_or(
            Command::MissingArgument("/model <id>"),
            Command::SelectModel,
        ),
        "/open" => argument.map_or(Command::MissingArgument("/open <path>"), Command::Open),
        "/close" => Command::Close,
        "/connect" => argument.map_or(Command::MissingArgument("/connect <url>"), Command::Connect),
        "/generate" => parse_generate(rest),
        "/explain" => Command::Tool(ToolRequest::Explain),
        "/refactor" => parse_refactor(rest),
        "/health" => Command::Tool(ToolRequest::Health),
        "/clear" => Command::Clear,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

fn parse_generate(rest: &str) -> Command {
    match rest.split_once(char::is_whitespace) {
        Some((language, prompt)) if !prompt.trim().is_empty() => {
            Command::Tool(ToolRequest::Generate {
                language: language.to_ascii_lowercase(),
                prompt: prompt.trim().to_string(),
            })
        }
        _ => Command::MissingArgument("/generate <language> <prompt>"),
    }
}

fn parse_refactor(rest: &str) -> Command {
    if rest.is_empty() {
        return Command::Tool(ToolRequest::Refactor(RefactorKind::default()));
    }
    RefactorKind::parse(rest).map_or(
        Command::MissingArgument("/refactor [clean|optimize|modernize]"),
        |kind| Command::Tool(ToolRequest::Refactor(kind)),
    )
}

pub fn help_text() -> String {
    COMMAND_INDEX
        .iter()
        .map(|(command, description)| format!("{command:<9} {description}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    You,
    Assistant,
    System,
    Error,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Self::You => "You",
            Self::Assistant => "Assistant",
            Self::System => "System",
            Self::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Transcript,
    Insights,
}

#[derive(Debug, Clone)]
struct ModelPicker {
    models: Vec<Model>,
    selected: usize,
}

#[derive(Debug)]
pub struct App {
    pub running: bool,
    pub ticks: u64,
    pub active_pane: Pane,
    pub session: SessionState,
    transcript: Vec<TranscriptEntry>,
    input: String,
    cursor: usize,
    cursor_goal_col: Option<u16>,
    /// Rows scrolled back from the newest transcript line.
    transcript_offset: u16,
    insights_scroll: u16,
    last_reply: Option<TurnReply>,
    busy: bool,
    tools_in_flight: usize,
    picker: Option<ModelPicker>,
    picker_requested: bool,
    document: Option<String>,
    backend_label: String,
}

impl App {
    pub fn new(session: SessionState, backend_label: impl Into<String>) -> Self {
        let mut app = Self {
            running: true,
            ticks: 0,
            active_pane: Pane::Transcript,
            session,
            transcript: Vec::new(),
            input: String::new(),
            cursor: 0,
            cursor_goal_col: None,
            transcript_offset: 0,
            insights_scroll: 0,
            last_reply: None,
            busy: false,
            tools_in_flight: 0,
            picker: None,
            picker_requested: false,
            document: None,
            backend_label: backend_label.into(),
        };
        app.push(
            Speaker::System,
            "Ask a question, /open a file to /edit it, or switch to /agent to work on the project. /help lists commands.",
        );
        app
    }

    pub fn on_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn next_pane(&mut self) {
        self.active_pane = match self.active_pane {
            Pane::Transcript => Pane::Insights,
            Pane::Insights => Pane::Transcript,
        };
    }

    #[cfg(test)]
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_layout(&self, width: u16) -> WrappedText {
        wrap_text(&self.input, width)
    }

    pub fn cursor_row_col(&self, width: u16) -> (u16, u16) {
        self.input_layout(width).cursor(self.cursor)
    }

    pub fn input_char(&mut self, c: char) {
        let byte_idx = char_to_byte_idx(&self.input, self.cursor);
        self.input.insert(byte_idx, c);
        self.cursor += 1;
        self.cursor_goal_col = None;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let start = char_to_byte_idx(&self.input, self.cursor - 1);
        let end = char_to_byte_idx(&self.input, self.cursor);
        self.input.drain(start..end);
        self.cursor -= 1;
        self.cursor_goal_col = None;
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
        self.cursor_goal_col = None;
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
        self.cursor_goal_col = None;
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
        self.cursor_goal_col = None;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
        self.cursor_goal_col = None;
    }

    /// Moves the cursor one wrapped row up. Returns false when it is
    /// already on the first row.
    pub fn cursor_up(&mut self, width: u16) -> bool {
        let layout = self.input_layout(width);
        let (row, col) = layout.cursor(self.cursor);
        if row == 0 {
            return false;
        }
        self.move_to_row(&layout, row - 1, col)
    }

    pub fn cursor_down(&mut self, width: u16) -> bool {
        let layout = self.input_layout(width);
        let (row, col) = layout.cursor(self.cursor);
        self.move_to_row(&layout, row + 1, col)
    }

    fn move_to_row(&mut self, layout: &WrappedText, row: u16, col: u16) -> bool {
        let goal = self.cursor_goal_col.unwrap_or(col);
        let Some(idx) = layout.index_at(row, goal) else {
            return false;
        };
        self.cursor = idx;
        self.cursor_goal_col = Some(goal);
        true
    }

    /// Empties the input and returns it trimmed, or None when it was blank.
    pub fn take_input(&mut self) -> Option<String> {
        let message = self.input.trim().to_string();
        self.input.clear();
        self.cursor = 0;
        self.cursor_goal_col = None;
        (!message.is_empty()).then_some(message)
    }

    pub fn command_suggestions(&self) -> Vec<CommandSuggestion> {
        let Some(query) = command_query(&self.input) else {
            return Vec::new();
        };
        COMMAND_INDEX
            .iter()
            .filter(|(command, _)| command.starts_with(query))
            .map(|(command, description)| CommandSuggestion {
                command,
                description,
            })
            .collect()
    }

    pub fn should_show_command_index(&self) -> bool {
        self.picker.is_none() && !self.command_suggestions().is_empty()
    }

    pub fn autocomplete_top_command(&mut self) -> bool {
        if self.picker.is_some() {
            return false;
        }
        let Some(top) = self.command_suggestions().first().copied() else {
            return false;
        };
        if self.input.trim() == top.command {
            return false;
        }
        self.input = top.command.to_string();
        self.cursor_end();
        true
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            speaker,
            text: text.into(),
        });
        if self.transcript.len() > MAX_TRANSCRIPT_ENTRIES {
            let overflow = self.transcript.len() - MAX_TRANSCRIPT_ENTRIES;
            self.transcript.drain(..overflow);
        }
    }

    pub fn push_notification(&mut self, notification: &Notification) {
        let speaker = if notification.is_error() {
            Speaker::Error
        } else {
            Speaker::System
        };
        self.push(speaker, notification.summary());
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
        self.last_reply = None;
        self.transcript_offset = 0;
        self.insights_scroll = 0;
    }

    /// Records a finished turn: the transcript gets the readable part and
    /// the insights pane gets the rest.
    pub fn apply_reply(&mut self, reply: TurnReply) {
        self.push(Speaker::Assistant, transcript_text(&reply));
        self.last_reply = Some(reply);
        self.insights_scroll = 0;
        self.transcript_offset = 0;
    }

    pub fn last_reply(&self) -> Option<&TurnReply> {
        self.last_reply.as_ref()
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn is_busy(&self) -> bool {
        self.busy || self.tools_in_flight > 0
    }

    pub fn begin_tool(&mut self) {
        self.tools_in_flight += 1;
    }

    pub fn finish_tool(&mut self) {
        self.tools_in_flight = self.tools_in_flight.saturating_sub(1);
    }

    pub fn set_document(&mut self, label: Option<String>) {
        self.document = label;
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn set_backend_label(&mut self, label: impl Into<String>) {
        self.backend_label = label.into();
    }

    pub fn backend_label(&self) -> &str {
        &self.backend_label
    }

    pub fn model_label(&self) -> String {
        self.session
            .catalog
            .resolve()
            .unwrap_or_else(|_| "no model".to_string())
    }

    pub fn request_model_picker(&mut self) {
        self.picker_requested = true;
    }

    pub fn take_picker_request(&mut self) -> bool {
        std::mem::take(&mut self.picker_requested)
    }

    pub fn open_model_picker(&mut self, models: Vec<Model>) {
        if models.is_empty() {
            self.picker = None;
            return;
        }
        let selected = self
            .session
            .catalog
            .current()
            .and_then(|current| models.iter().position(|model| model.id == current))
            .unwrap_or(0);
        self.picker = Some(ModelPicker { models, selected });
    }

    pub fn is_picker_open(&self) -> bool {
        self.picker.is_some()
    }

    pub fn picker_models(&self) -> &[Model] {
        match self.picker.as_ref() {
            Some(picker) => &picker.models,
            None => &[],
        }
    }

    pub fn picker_selected_index(&self) -> usize {
        self.picker.as_ref().map_or(0, |picker| picker.selected)
    }

    pub fn picker_move_up(&mut self) {
        if let Some(picker) = self.picker.as_mut() {
            picker.selected = picker.selected.saturating_sub(1);
        }
    }

    pub fn picker_move_down(&mut self) {
        if let Some(picker) = self.picker.as_mut()
            && picker.selected + 1 < picker.models.len()
        {
            picker.selected += 1;
        }
    }

    pub fn close_picker(&mut self) {
        self.picker = None;
    }

    pub fn take_picked_model(&mut self) -> Option<Model> {
        let picker = self.picker.take()?;
        picker.models.into_iter().nth(picker.selected)
    }

    pub fn transcript_offset(&self) -> u16 {
        self.transcript_offset
    }

    pub fn insights_scroll(&self) -> u16 {
        self.insights_scroll
    }

    pub fn scroll_up(&mut self, rows: u16, max_scroll: u16) {
        match self.active_pane {
            Pane::Transcript => {
                self.transcript_offset = self.transcript_offset.saturating_add(rows).min(max_scroll);
            }
            Pane::Insights => self.insights_scroll = self.insights_scroll.saturating_sub(rows),
        }
    }

    pub fn scroll_down(&mut self, rows: u16, max_scroll: u16) {
        match self.active_pane {
            Pane::Transcript => {
                self.transcript_offset = self.transcript_offset.saturating_sub(rows);
            }
            Pane::Insights => {
                self.insights_scroll = self.insights_scroll.saturating_add(rows).min(max_scroll);
            }
        }
    }
}

/// Edit replies already carry a summary; otherwise prefer the prose when
/// the structured parts are shown separately.
fn transcript_text(reply: &TurnReply) -> String {
    if reply.edited.is_some() {
        return reply.text.clone();
    }
    let prose = reply.segments.prose.trim();
    if reply.segments.has_insights() && !prose.is_empty() {
        prose.to_string()
    } else {
        reply.text.clone()
    }
}

fn char_to_byte_idx(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(s.len())
}

fn command_query(input: &str) -> Option<&str> {
    let trimmed = input.trim_start();
    if !trimmed.starts_with('/') || trimmed.contains(char::is_whitespace) {
        return None;
    }
    Some(trimmed)
}

#[cfg(test)]
#[path = "../tests/unit/app_tests.rs"]
mod tests;
