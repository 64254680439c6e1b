use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// A directive path after normalization against the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Forward-slash relative form, used in notifications and transcripts.
    pub relative: String,
    pub absolute: PathBuf,
}

/// Turns a raw directive path into a path that is guaranteed to live under
/// `project_root`. One leading `./` and one leading `/` are stripped, `..`
/// segments are resolved lexically and anything that climbs out of the root
/// (lexically or through an existing symlink) is rejected.
pub fn normalize(raw: &str, project_root: &Path) -> Result<ResolvedPath, PathError> {
    let cleaned = clean_raw_path(raw);
    let stripped = strip_leading_markers(&cleaned);
    if is_drive_prefixed(stripped) {
        return Err(PathError::EscapesRoot(cleaned));
    }

    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(stripped).components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(PathError::EscapesRoot(cleaned));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::EscapesRoot(cleaned));
            }
        }
    }
    if parts.is_empty() {
        return Err(PathError::Empty);
    }

    let absolute = parts
        .iter()
        .fold(project_root.to_path_buf(), |acc, part| acc.join(part));
    ensure_contained(project_root, &absolute, &cleaned)?;
    Ok(ResolvedPath {
        relative: parts.join("/"),
        absolute,
    })
}

fn clean_raw_path(raw: &str) -> String {
    raw.trim()
        .trim_matches(|ch| matches!(ch, '`' | '"' | '\''))
        .trim()
        .replace('\\', "/")
}

fn strip_leading_markers(path: &str) -> &str {
    let path = path.strip_prefix("./").unwrap_or(path);
    path.strip_prefix('/').unwrap_or(path)
}

fn is_drive_prefixed(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn ensure_contained(root: &Path, absolute: &Path, display: &str) -> Result<(), PathError> {
    let Ok(canonical_root) = root.canonicalize() else {
        // A root that does not exist yet cannot be escaped through a link.
        return Ok(());
    };
    let mut existing = absolute.to_path_buf();
    while !existing.exists() {
        if !existing.pop() {
            return Ok(());
        }
    }
    let canonical = existing.canonicalize().map_err(|err| PathError::Inspect {
        path: existing.clone(),
        message: err.to_string(),
    })?;
    if canonical.starts_with(&canonical_root) {
        Ok(())
    } else {
        Err(PathError::EscapesRoot(display.to_string()))
    }
}
