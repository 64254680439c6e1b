use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::ChatBackend;
use crate::error::ConversationError;
use crate::host::EditorHost;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RefactorKind {
    #[default]
    Clean,
    Optimize,
    Modernize,
}

impl RefactorKind {
    const ALL: [RefactorKind; 3] = [Self::Clean, Self::Optimize, Self::Modernize];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Optimize => "optimize",
            Self::Modernize => "modernize",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw))
    }
}

/// The backend's `/health` report.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub ollama_connected: bool,
    #[serde(default)]
    pub default_model: Option<String>,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }

    pub fn summary(&self) -> String {
        let ollama = if self.ollama_connected {
            "connected"
        } else {
            "not connected"
        };
        match &self.default_model {
            Some(model) => format!(
                "Backend is {}. Ollama {ollama}, default model {model}.",
                self.status
            ),
            None => format!("Backend is {}. Ollama {ollama}.", self.status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: String,
    pub explanation: Option<String>,
}

/// One-shot backend operations that sit beside the conversation and leave
/// its history alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    Health,
    Generate { language: String, prompt: String },
    /// Explains the active document.
    Explain,
    /// Refactors the active document in place.
    Refactor(RefactorKind),
}

impl ToolRequest {
    pub fn progress_label(&self) -> String {
        match self {
            Self::Health => "Checking backend health.".to_string(),
            Self::Generate { language, .. } => format!("Generating {language} code."),
            Self::Explain => "Explaining the open document.".to_string(),
            Self::Refactor(kind) => format!("Refactoring the open document ({}).", kind.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    Health(Health),
    Generated {
        language: String,
        generated: GeneratedCode,
    },
    Explained {
        path: PathBuf,
        explanation: String,
    },
    Refactored {
        path: PathBuf,
        kind: RefactorKind,
    },
}

impl ToolOutput {
    /// Transcript text, with paths shown through `display`.
    pub fn render(&self, display: impl Fn(&Path) -> String) -> String {
        match self {
            Self::Health(health) => health.summary(),
            Self::Generated {
                language,
                generated,
            } => {
                let block = format!("```{language}\n{}\n```", generated.code);
                match &generated.explanation {
                    Some(explanation) if !explanation.trim().is_empty() => {
                        format!("{}\n\n{block}", explanation.trim())
                    }
                    _ => block,
                }
            }
            Self::Explained { path, explanation } => {
                format!("Explanation of {}:\n\n{}", display(path), explanation.trim())
            }
            Self::Refactored { path, kind } => {
                format!("Refactored {} ({}).", display(path), kind.as_str())
            }
        }
    }
}

pub fn run_tool(
    backend: &dyn ChatBackend,
    request: &ToolRequest,
    model: Option<&str>,
    host: &dyn EditorHost,
) -> Result<ToolOutput, ConversationError> {
    match request {
        ToolRequest::Health => Ok(ToolOutput::Health(backend.health()?)),
        ToolRequest::Generate { language, prompt } => {
            let generated = backend.generate_code(prompt, language, model)?;
            info!(%language, chars = generated.code.len(), "code generated");
            Ok(ToolOutput::Generated {
                language: language.clone(),
                generated,
            })
        }
        ToolRequest::Explain => {
            let document = host
                .active_document()
                .ok_or(ConversationError::NoDocumentFor("explain"))?;
            let explanation = backend.explain_file(&document.path.to_string_lossy(), model)?;
            Ok(ToolOutput::Explained {
                path: document.path,
                explanation,
            })
        }
        ToolRequest::Refactor(kind) => {
            let document = host
                .active_document()
                .ok_or(ConversationError::NoDocumentFor("refactor"))?;
            let code = backend.refactor_file(&document.path.to_string_lossy(), *kind, model)?;
            host.replace_document(&document.path, &code)
                .map_err(|message| ConversationError::DocumentWrite {
                    path: document.path.clone(),
                    message,
                })?;
            info!(path = %document.path.display(), kind = kind.as_str(), "document refactored");
            Ok(ToolOutput::Refactored {
                path: document.path,
                kind: *kind,
            })
        }
    }
}
