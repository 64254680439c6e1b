use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, ChatMessage};
use crate::directives::extract;
use crate::error::ConversationError;
use crate::executor::{ActionResult, execute};
use crate::host::EditorHost;
use crate::models::ModelCatalog;
use crate::project_listing::{list_project, render_listing};
use crate::prompts::{
    build_agent_prompt, build_ask_preamble, build_edit_prompt, edit_success_message,
};
use crate::segments::{ResponseSegments, segment};

pub const DEFAULT_HISTORY_WINDOW: usize = 5;
pub const DEFAULT_LISTING_DEPTH: usize = 3;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Ask,
    Edit,
    Agent,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ask => "Ask",
            Self::Edit => "Edit",
            Self::Agent => "Agent",
        }
    }
}

pub type ConversationTurn = ChatMessage;

/// Per-session selection state handed to every turn.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub mode: Mode,
    pub catalog: ModelCatalog,
}

impl SessionState {
    pub fn new(mode: Mode, catalog: ModelCatalog) -> Self {
        Self { mode, catalog }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub mode: Mode,
    pub model: String,
    /// What the transcript shows as the assistant turn.
    pub text: String,
    pub segments: ResponseSegments,
    pub actions: Vec<ActionResult>,
    pub edited: Option<PathBuf>,
}

/// Owns the chat history and runs one turn at a time against the backend.
pub struct Conversation {
    backend: Arc<dyn ChatBackend>,
    history: Vec<ConversationTurn>,
    history_window: usize,
    listing_depth: usize,
}

impl Conversation {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            history: Vec::new(),
            history_window: DEFAULT_HISTORY_WINDOW,
            listing_depth: DEFAULT_LISTING_DEPTH,
        }
    }

    pub fn with_limits(mut self, history_window: usize, listing_depth: usize) -> Self {
        self.history_window = history_window;
        self.listing_depth = listing_depth.max(1);
        self
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        Arc::clone(&self.backend)
    }

    /// Points later turns at another backend; the history is kept.
    pub fn set_backend(&mut self, backend: Arc<dyn ChatBackend>) {
        self.backend = backend;
    }

    /// Runs one turn. On any failure the history is left exactly as it was
    /// before the call.
    pub fn handle_turn(
        &mut self,
        text: &str,
        session: &SessionState,
        host: &dyn EditorHost,
    ) -> Result<TurnReply, ConversationError> {
        let model = session.catalog.resolve()?;
        info!(mode = session.mode.label(), %model, "turn started");
        self.history.push(ConversationTurn::user(text));

        let outcome = match session.mode {
            Mode::Ask => self.ask(&model),
            Mode::Edit => self.edit(text, &model, host),
            Mode::Agent => self.agent(text, &model, host),
        };

        match outcome {
            Ok(reply) => {
                self.history
                    .push(ConversationTurn::assistant(reply.text.clone()));
                info!(
                    mode = reply.mode.label(),
                    actions = reply.actions.len(),
                    "turn finished"
                );
                Ok(reply)
            }
            Err(err) => {
                self.history.pop();
                warn!(error = %err, "turn failed, user turn rolled back");
                Err(err)
            }
        }
    }

    fn ask(&self, model: &str) -> Result<TurnReply, ConversationError> {
        let (prior, current) = self.history.split_at(self.history.len().saturating_sub(1));
        let window = &prior[prior.len().saturating_sub(self.history_window)..];
        let mut messages = Vec::with_capacity(window.len() + 2);
        messages.push(ChatMessage::system(build_ask_preamble()));
        messages.extend_from_slice(window);
        messages.extend_from_slice(current);

        let reply = self.backend.send_chat(&messages, Some(model))?;
        Ok(TurnReply {
            mode: Mode::Ask,
            model: model.to_string(),
            segments: segment(&reply),
            text: reply,
            actions: Vec::new(),
            edited: None,
        })
    }

    fn edit(
        &self,
        instruction: &str,
        model: &str,
        host: &dyn EditorHost,
    ) -> Result<TurnReply, ConversationError> {
        let document = host
            .active_document()
            .ok_or(ConversationError::NoActiveDocument)?;
        let prompt = build_edit_prompt(&document, instruction);
        debug!(chars = prompt.len(), path = %document.path.display(), "edit prompt built");

        let reply = self.single_shot(prompt, model)?;
        let segments = segment(&reply);
        let code = segments.first_code_block().map(|block| block.code.clone());
        let Some(code) = code else {
            return Ok(TurnReply {
                mode: Mode::Edit,
                model: model.to_string(),
                text: reply,
                segments,
                actions: Vec::new(),
                edited: None,
            });
        };

        host.replace_document(&document.path, &code)
            .map_err(|message| ConversationError::DocumentWrite {
                path: document.path.clone(),
                message,
            })?;
        info!(path = %document.path.display(), "document replaced");
        Ok(TurnReply {
            mode: Mode::Edit,
            model: model.to_string(),
            text: edit_success_message(&document.path, &document.language),
            segments,
            actions: Vec::new(),
            edited: Some(document.path),
        })
    }

    fn agent(
        &self,
        task: &str,
        model: &str,
        host: &dyn EditorHost,
    ) -> Result<TurnReply, ConversationError> {
        let root = project_root(host).ok_or(ConversationError::NoProjectRoot)?;
        let listing = render_listing(&list_project(&root, self.listing_depth));
        let prompt = build_agent_prompt(&root, &listing, task);
        debug!(chars = prompt.len(), root = %root.display(), "agent prompt built");

        let reply = self.single_shot(prompt, model)?;
        let actions = extract(&reply);
        let results = execute(&actions, &root, host);
        Ok(TurnReply {
            mode: Mode::Agent,
            model: model.to_string(),
            segments: segment(&reply),
            text: reply,
            actions: results,
            edited: None,
        })
    }

    fn single_shot(&self, prompt: String, model: &str) -> Result<String, ConversationError> {
        Ok(self
            .backend
            .send_chat(&[ChatMessage::user(prompt)], Some(model))?)
    }
}

/// The workspace root, or failing that the active document's directory.
pub fn project_root(host: &dyn EditorHost) -> Option<PathBuf> {
    host.workspace_root().or_else(|| {
        host.active_document()
            .and_then(|document| document.path.parent().map(Path::to_path_buf))
    })
}

#[cfg(test)]
#[path = "../tests/unit/conversation_tests.rs"]
mod tests;
