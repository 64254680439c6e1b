use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::debug;

use crate::backend::ChatBackend;
use crate::code_tools::{self, ToolOutput, ToolRequest};
use crate::conversation::{Conversation, SessionState, TurnReply};
use crate::error::{BackendError, ConversationError, TurnError};
use crate::host::TerminalHost;
use crate::models::Model;

#[derive(Debug)]
pub enum AgentEvent {
    TurnCompleted(Result<TurnReply, ConversationError>),
    ModelsLoaded(Result<Vec<Model>, BackendError>),
    ToolCompleted(Result<ToolOutput, ConversationError>),
}

enum WorkerMessage {
    Turn {
        conversation: Box<Conversation>,
        result: Result<TurnReply, ConversationError>,
    },
    Models(Result<Vec<Model>, BackendError>),
    Tool(Result<ToolOutput, ConversationError>),
}

/// Runs conversation turns off the UI thread. The conversation travels to
/// the worker and back, so while a turn is in flight there is nothing to
/// submit against.
pub struct TurnAdapter {
    conversation: Option<Conversation>,
    backend: Arc<dyn ChatBackend>,
    worker_tx: Sender<WorkerMessage>,
    worker_rx: Receiver<WorkerMessage>,
}

impl TurnAdapter {
    pub fn new(conversation: Conversation) -> Self {
        let (worker_tx, worker_rx) = mpsc::channel();
        Self {
            backend: conversation.backend(),
            conversation: Some(conversation),
            worker_tx,
            worker_rx,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.conversation.is_none()
    }

    #[cfg(test)]
    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    pub fn conversation_mut(&mut self) -> Result<&mut Conversation, TurnError> {
        self.conversation.as_mut().ok_or(TurnError::Busy)
    }

    pub fn backend_label(&self) -> String {
        self.backend.describe()
    }

    pub fn replace_backend(&mut self, backend: Arc<dyn ChatBackend>) -> Result<(), TurnError> {
        let conversation = self.conversation.as_mut().ok_or(TurnError::Busy)?;
        conversation.set_backend(Arc::clone(&backend));
        self.backend = backend;
        Ok(())
    }

    pub fn submit(
        &mut self,
        text: String,
        session: &SessionState,
        host: &TerminalHost,
    ) -> Result<(), TurnError> {
        let mut conversation = self.conversation.take().ok_or(TurnError::Busy)?;
        let session = session.clone();
        let host = host.clone();
        let tx = self.worker_tx.clone();
        thread::spawn(move || {
            let result = conversation.handle_turn(&text, &session, &host);
            let _ = tx.send(WorkerMessage::Turn {
                conversation: Box::new(conversation),
                result,
            });
        });
        Ok(())
    }

    pub fn refresh_models(&self) {
        let backend = Arc::clone(&self.backend);
        let tx = self.worker_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(WorkerMessage::Models(backend.list_models()));
        });
    }

    /// Tools use the backend directly, so they run even while a turn holds
    /// the conversation.
    pub fn run_tool(&self, request: ToolRequest, model: Option<String>, host: &TerminalHost) {
        let backend = Arc::clone(&self.backend);
        let host = host.clone();
        let tx = self.worker_tx.clone();
        thread::spawn(move || {
            let result = code_tools::run_tool(backend.as_ref(), &request, model.as_deref(), &host);
            let _ = tx.send(WorkerMessage::Tool(result));
        });
    }

    pub fn drain_events_limited(&mut self, max_events: usize) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while events.len() < max_events {
            let Ok(message) = self.worker_rx.try_recv() else {
                break;
            };
            events.push(match message {
                WorkerMessage::Turn {
                    conversation,
                    result,
                } => {
                    debug!("conversation returned from worker");
                    self.conversation = Some(*conversation);
                    AgentEvent::TurnCompleted(result)
                }
                WorkerMessage::Models(result) => AgentEvent::ModelsLoaded(result),
                WorkerMessage::Tool(result) => AgentEvent::ToolCompleted(result),
            });
        }
        events
    }
}
