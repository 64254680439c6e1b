use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::directives::ActionKind;
use crate::fs_io::{read_text_file, write_text_file};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    pub path: PathBuf,
    pub text: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    FileAction {
        kind: ActionKind,
        path: String,
        outcome: Result<(), String>,
    },
    Info(String),
}

impl Notification {
    pub fn summary(&self) -> String {
        match self {
            Self::FileAction {
                kind,
                path,
                outcome: Ok(()),
            } => format!("{} {path}", capitalize(kind.past_tense())),
            Self::FileAction {
                kind,
                path,
                outcome: Err(message),
            } => format!("Failed to {} {path}: {message}", kind_verb(*kind)),
            Self::Info(text) => text.clone(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::FileAction {
                outcome: Err(_),
                ..
            }
        )
    }
}

fn kind_verb(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Create => "create",
        ActionKind::Modify => "modify",
        ActionKind::Delete => "delete",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// What the conversation needs from the surrounding editor shell.
pub trait EditorHost: Send + Sync {
    fn notify(&self, notification: Notification);
    fn active_document(&self) -> Option<ActiveDocument>;
    fn replace_document(&self, path: &Path, text: &str) -> Result<(), String>;
    /// Best-effort; a document that is not open is ignored.
    fn close_document(&self, path: &Path);
    fn workspace_root(&self) -> Option<PathBuf>;
}

/// The terminal application acting as the editor: one active document held
/// in memory and backed by the real filesystem. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct TerminalHost {
    root: Option<PathBuf>,
    document: Arc<Mutex<Option<ActiveDocument>>>,
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl TerminalHost {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    pub fn open_document(&self, path: &Path) -> io::Result<ActiveDocument> {
        let path = path.canonicalize()?;
        let text = read_text_file(&path)?;
        let document = ActiveDocument {
            language: language_for_path(&path).to_string(),
            path,
            text,
        };
        if let Ok(mut slot) = self.document.lock() {
            *slot = Some(document.clone());
        }
        Ok(document)
    }

    pub fn close_active(&self) -> Option<PathBuf> {
        self.document
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .map(|document| document.path)
    }

    pub fn active_path(&self) -> Option<PathBuf> {
        self.document
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|document| document.path.clone()))
    }

    pub fn take_notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }
}

impl EditorHost for TerminalHost {
    fn notify(&self, notification: Notification) {
        if let Ok(mut queue) = self.notifications.lock() {
            queue.push(notification);
        }
    }

    fn active_document(&self) -> Option<ActiveDocument> {
        self.document.lock().ok().and_then(|slot| slot.clone())
    }

    fn replace_document(&self, path: &Path, text: &str) -> Result<(), String> {
        write_text_file(path, text).map_err(|err| err.to_string())?;
        if let Ok(mut slot) = self.document.lock()
            && let Some(document) = slot.as_mut()
            && same_file(&document.path, path)
        {
            document.text = text.to_string();
        }
        Ok(())
    }

    fn close_document(&self, path: &Path) {
        let closed = match self.document.lock() {
            Ok(mut slot) if slot.as_ref().is_some_and(|d| same_file(&d.path, path)) => {
                slot.take().is_some()
            }
            _ => false,
        };
        if closed {
            self.notify(Notification::Info(format!("Closed {}", path.display())));
        }
    }

    fn workspace_root(&self) -> Option<PathBuf> {
        self.root.clone()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

pub fn language_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("ts" | "tsx") => "typescript",
        Some("js" | "jsx" | "mjs") => "javascript",
        Some("go") => "go",
        Some("java") => "java",
        Some("c" | "h") => "c",
        Some("cc" | "cpp" | "hpp") => "cpp",
        Some("sh" | "bash") => "shell",
        Some("md") => "markdown",
        Some("toml") => "toml",
        Some("json") => "json",
        Some("yaml" | "yml") => "yaml",
        Some("html") => "html",
        Some("css") => "css",
        _ => "plaintext",
    }
}
