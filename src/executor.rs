use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::directives::{ActionKind, FileAction};
use crate::fs_io::{prune_empty_parents, remove_file_if_exists, write_text_file};
use crate::host::{EditorHost, Notification};
use crate::paths::normalize;

const MAX_PRUNE_LEVELS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub action: ActionKind,
    /// Normalized relative path, or the raw path when normalization failed.
    pub path: String,
    pub outcome: Result<(), String>,
}

impl ActionResult {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Applies every action in order. A failing action is reported and the
/// batch carries on.
pub fn execute(
    actions: &[FileAction],
    project_root: &Path,
    host: &dyn EditorHost,
) -> Vec<ActionResult> {
    actions
        .iter()
        .map(|action| {
            let result = apply(action, project_root, host);
            match &result.outcome {
                Ok(()) => info!(action = ?result.action, path = %result.path, "file action applied"),
                Err(message) => {
                    warn!(action = ?result.action, path = %result.path, %message, "file action failed")
                }
            }
            host.notify(Notification::FileAction {
                kind: result.action,
                path: result.path.clone(),
                outcome: result.outcome.clone(),
            });
            result
        })
        .collect()
}

fn apply(action: &FileAction, project_root: &Path, host: &dyn EditorHost) -> ActionResult {
    let kind = action.kind();
    let resolved = match normalize(action.path(), project_root) {
        Ok(resolved) => resolved,
        Err(err) => {
            return ActionResult {
                action: kind,
                path: action.path().to_string(),
                outcome: Err(err.to_string()),
            };
        }
    };

    let outcome = match action {
        FileAction::Create { content, .. } | FileAction::Modify { content, .. } => {
            write_text_file(&resolved.absolute, content).map_err(|err| err.to_string())
        }
        FileAction::Delete { .. } => {
            host.close_document(&resolved.absolute);
            remove_file_if_exists(&resolved.absolute)
                .map(|_| {
                    if let Some(parent) = resolved.absolute.parent() {
                        prune_empty_parents(parent, project_root, MAX_PRUNE_LEVELS);
                    }
                })
                .map_err(|err| err.to_string())
        }
    };

    ActionResult {
        action: kind,
        path: resolved.relative,
        outcome,
    }
}

#[cfg(test)]
#[path = "../tests/unit/executor_tests.rs"]
mod tests;
