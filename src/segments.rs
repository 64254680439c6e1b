use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::directives::{FENCE, read_fenced_block};
use crate::todos::{TodoItem, parse_todos};

static THINKING: Lazy<Regex> = Lazy::new(|| tag_pattern("thinking"));
static PLAN: Lazy<Regex> = Lazy::new(|| tag_pattern("plan"));
static TODO: Lazy<Regex> = Lazy::new(|| tag_pattern("todo"));
static FEEDBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<feedback\s+type\s*=\s*"([^"]*)"\s*>(.*?)</feedback>"#)
        .expect("feedback pattern")
});
static ANY_FEEDBACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<feedback[^>]*>.*?</feedback>").expect("feedback pattern"));

fn tag_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}>(.*?)</{tag}>")).expect("tag pattern")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Info,
    Success,
    Warning,
    Error,
}

impl FeedbackKind {
    /// Unknown kinds render as `Info`.
    pub fn from_attr(attr: &str) -> Self {
        match attr.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "warning" | "warn" => Self::Warning,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    /// The raw `type` attribute as written by the model.
    pub kind: String,
    pub text: String,
}

impl Feedback {
    pub fn level(&self) -> FeedbackKind {
        FeedbackKind::from_attr(&self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    pub lang: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseSegments {
    pub thinking: Option<String>,
    pub plan: Option<String>,
    pub todos: Vec<TodoItem>,
    pub feedbacks: Vec<Feedback>,
    pub code_blocks: Vec<CodeBlock>,
    /// The reply with every thinking, plan, todo and feedback region removed.
    pub prose: String,
}

impl ResponseSegments {
    pub fn first_code_block(&self) -> Option<&CodeBlock> {
        self.code_blocks.first()
    }

    pub fn has_insights(&self) -> bool {
        self.thinking.is_some()
            || self.plan.is_some()
            || !self.todos.is_empty()
            || !self.feedbacks.is_empty()
            || !self.code_blocks.is_empty()
    }
}

pub fn segment(text: &str) -> ResponseSegments {
    let todos = first_body(&TODO, text)
        .map(|body| parse_todos(&body))
        .unwrap_or_default();

    let feedbacks = FEEDBACK
        .captures_iter(text)
        .map(|caps| Feedback {
            kind: caps[1].to_string(),
            text: caps[2].trim().to_string(),
        })
        .collect();

    let code_blocks = code_blocks(text);

    let mut prose = text.to_string();
    for pattern in [&*THINKING, &*PLAN, &*TODO, &*ANY_FEEDBACK] {
        prose = pattern.replace_all(&prose, "").into_owned();
    }

    ResponseSegments {
        thinking: first_body(&THINKING, text),
        plan: first_body(&PLAN, text),
        todos,
        feedbacks,
        code_blocks,
        prose: prose.trim().to_string(),
    }
}

/// Every fenced block in order. The language defaults to `text`.
fn code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = text.get(cursor..).and_then(|rest| rest.find(FENCE)) {
        let Some(block) = read_fenced_block(text, cursor + offset) else {
            break;
        };
        blocks.push(CodeBlock {
            lang: if block.lang.is_empty() {
                "text".to_string()
            } else {
                block.lang.to_string()
            },
            code: block.content.to_string(),
        });
        cursor = block.end;
    }
    blocks
}

fn first_body(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
}

#[cfg(test)]
#[path = "../tests/unit/segments_tests.rs"]
mod tests;
