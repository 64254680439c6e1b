use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static PRIORITY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[(high|medium|low)\]").expect("priority tag pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MED",
            Self::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoItem {
    pub id: String,
    pub task: String,
    pub priority: Priority,
    pub completed: bool,
}

/// Parses the body of a `<todo>` block, one item per non-blank line.
pub fn parse_todos(block: &str) -> Vec<TodoItem> {
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            let body = strip_list_marker(line);
            TodoItem {
                id: format!("todo-{index}"),
                task: clean_task(body),
                priority: detect_priority(line),
                completed: ["[x]", "[X]", "✓"]
                    .iter()
                    .any(|mark| body.starts_with(mark)),
            }
        })
        .collect()
}

fn detect_priority(line: &str) -> Priority {
    let lower = line.to_lowercase();
    if lower.contains("[high]") || lower.contains("!!!") {
        Priority::High
    } else if lower.contains("[low]") || line.ends_with('?') {
        Priority::Low
    } else {
        Priority::Medium
    }
}

fn strip_list_marker(line: &str) -> &str {
    line.strip_prefix(['-', '*'])
        .map(str::trim_start)
        .unwrap_or(line)
}

fn clean_task(body: &str) -> String {
    let body = ["[x]", "[X]", "[ ]", "✓"]
        .iter()
        .find_map(|mark| body.strip_prefix(mark))
        .unwrap_or(body);
    let without_tags = PRIORITY_TAG.replace_all(body, "");
    let without_bang = without_tags.replacen("!!!", "", 1);
    let trimmed = without_bang.trim();
    trimmed.strip_suffix('?').unwrap_or(trimmed).trim().to_string()
}
