use std::path::Path;

use walkdir::WalkDir;

const IGNORED: &[&str] = &[
    "node_modules",
    "target",
    "__pycache__",
    "venv",
    "env",
    "dist",
    "build",
    "logs",
    "Thumbs.db",
];
const MAX_ENTRIES: usize = 400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Forward-slash path relative to the listed root.
    pub path: String,
    pub is_dir: bool,
}

/// Walks `root` up to `max_depth` levels, skipping hidden entries and common
/// dependency or build directories. Unreadable entries are skipped.
pub fn list_project(root: &Path, max_depth: usize) -> Vec<ListingEntry> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !is_ignored(&entry.file_name().to_string_lossy())
        })
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            let path = relative
                .components()
                .map(|part| part.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some(ListingEntry {
                path,
                is_dir: entry.file_type().is_dir(),
            })
        })
        .take(MAX_ENTRIES + 1)
        .collect()
}

fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || IGNORED.contains(&name)
}

/// One entry per line, directories with a trailing slash.
pub fn render_listing(entries: &[ListingEntry]) -> String {
    if entries.is_empty() {
        return "(empty project)".to_string();
    }
    let mut lines: Vec<String> = entries
        .iter()
        .take(MAX_ENTRIES)
        .map(|entry| {
            if entry.is_dir {
                format!("{}/", entry.path)
            } else {
                entry.path.clone()
            }
        })
        .collect();
    if entries.len() > MAX_ENTRIES {
        lines.push("... (listing truncated)".to_string());
    }
    lines.join("\n")
}
