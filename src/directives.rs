use serde::Serialize;

pub const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Modify,
    Delete,
}

impl ActionKind {
    const MARKERS: [(&'static str, ActionKind); 3] = [
        ("CREATE_FILE:", ActionKind::Create),
        ("MODIFY_FILE:", ActionKind::Modify),
        ("DELETE_FILE:", ActionKind::Delete),
    ];

    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Modify => "modified",
            Self::Delete => "deleted",
        }
    }

    fn takes_payload(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

/// A file operation requested by a directive in model output. Paths are kept
/// exactly as written (trimmed); they are normalized at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileAction {
    Create { path: String, content: String },
    Modify { path: String, content: String },
    Delete { path: String },
}

impl FileAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Modify { .. } => ActionKind::Modify,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Create { path, .. } | Self::Modify { path, .. } | Self::Delete { path } => path,
        }
    }

    fn from_parts(kind: ActionKind, path: String, content: String) -> Self {
        match kind {
            ActionKind::Create => Self::Create { path, content },
            ActionKind::Modify => Self::Modify { path, content },
            ActionKind::Delete => Self::Delete { path },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    pub lang: &'a str,
    pub content: &'a str,
    /// Byte offset just past the closing fence.
    pub end: usize,
}

/// Scans model output left to right for `CREATE_FILE:`, `MODIFY_FILE:` and
/// `DELETE_FILE:` directives. Create and modify need a fenced block right
/// after the path line; directives without one are skipped. Scanning resumes
/// after a consumed block, so markers quoted inside a payload never run.
pub fn extract(text: &str) -> Vec<FileAction> {
    let mut actions = Vec::new();
    let mut cursor = 0;
    while let Some((start, kind, marker)) = next_marker(text, cursor) {
        let path_start = start + marker.len();
        let line_end = text[path_start..]
            .find('\n')
            .map_or(text.len(), |offset| path_start + offset);
        let path = text[path_start..line_end].trim();
        let next_line = (line_end + 1).min(text.len());

        if !kind.takes_payload() {
            if !path.is_empty() {
                actions.push(FileAction::from_parts(kind, path.to_string(), String::new()));
            }
            cursor = next_line;
            continue;
        }

        match read_fenced_block(text, next_line) {
            Some(block) if !path.is_empty() => {
                actions.push(FileAction::from_parts(
                    kind,
                    path.to_string(),
                    block.content.to_string(),
                ));
                cursor = block.end;
            }
            _ => cursor = next_line,
        }
        if cursor <= start {
            break;
        }
    }
    actions
}

fn next_marker(text: &str, from: usize) -> Option<(usize, ActionKind, &'static str)> {
    let haystack = text.get(from..)?;
    ActionKind::MARKERS
        .iter()
        .filter_map(|(marker, kind)| {
            haystack
                .find(marker)
                .map(|offset| (from + offset, *kind, *marker))
        })
        .min_by_key(|(offset, _, _)| *offset)
}

/// Reads a fenced block whose opening fence is the first non-blank text at
/// or after `from`. The language is the first word of the info string and
/// may be empty; content is trimmed.
pub fn read_fenced_block(text: &str, from: usize) -> Option<FencedBlock<'_>> {
    let rest = text.get(from..)?;
    let fence_start = from + (rest.len() - rest.trim_start().len());
    let after_fence = text[fence_start..].strip_prefix(FENCE)?;
    let info_len = info_string_len(after_fence);
    let lang = after_fence[..info_len]
        .split_whitespace()
        .next()
        .unwrap_or("");
    let body_start = fence_start + FENCE.len() + info_len;
    let close = text[body_start..].find(FENCE)?;
    Some(FencedBlock {
        lang,
        content: text[body_start..body_start + close].trim(),
        end: body_start + close + FENCE.len(),
    })
}

/// The info string runs to the end of the opening line, unless the fence
/// closes on that same line.
fn info_string_len(after_fence: &str) -> usize {
    let line_end = after_fence.find('\n').unwrap_or(after_fence.len());
    if after_fence[..line_end].contains(FENCE) {
        0
    } else {
        line_end
    }
}

#[cfg(test)]
#[path = "../tests/unit/directives_tests.rs"]
mod tests;
