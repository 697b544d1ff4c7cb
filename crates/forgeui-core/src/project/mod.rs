//! Projects, files and the persisted editor state.
//!
//! A project is a named, ordered list of files. Files may also stand alone.
//! The catalog (projects, file metadata, active pointers, recent files and
//! the working tree) is written as one snapshot; each file's element tree is
//! written under its own key.

mod manager;

pub use manager::ProjectManager;

use crate::element::{Element, ElementId};
use crate::settings::CanvasSettings;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a project.
pub type ProjectId = Uuid;

/// Unique identifier for a file.
pub type FileId = Uuid;

/// Name given to the file created alongside a new project.
pub const DEFAULT_FILE_NAME: &str = "Untitled";

/// Number of entries kept in the recent files list.
pub const MAX_RECENT_FILES: usize = 5;

/// Project and file catalog errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectError {
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("\"{0}\" is already taken")]
    DuplicateName(String),
    #[error("Project {0} does not exist")]
    UnknownProject(ProjectId),
}

/// A named group of files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub files: Vec<FileId>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_modified: u64,
    #[serde(default)]
    pub last_opened_file_id: Option<FileId>,
}

/// File metadata. The element tree itself is stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub last_modified: u64,
}

/// The catalog snapshot stored under [`STATE_KEY`](crate::storage::STATE_KEY).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct StateSnapshot {
    pub elements: Vec<Element>,
    pub selection: Vec<ElementId>,
    #[serde(flatten)]
    pub settings: CanvasSettings,
    pub projects: Vec<Project>,
    pub files: Vec<FileRecord>,
    pub active_project_id: Option<ProjectId>,
    pub active_file_id: Option<FileId>,
    pub recent_files: Vec<FileId>,
    pub has_unsaved_changes: bool,
}

/// A file's element tree as stored under its own key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FileDocument {
    pub id: FileId,
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// Current time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Trim a project or file name, rejecting blank input.
pub(crate) fn clean_name(raw: &str) -> Result<String, ProjectError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ProjectError::EmptyName);
    }
    Ok(name.to_string())
}

/// Case-insensitive name comparison, Unicode aware.
pub(crate) fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Move `id` to the front of the recent list, dropping duplicates and
/// keeping at most [`MAX_RECENT_FILES`] entries.
pub(crate) fn push_recent(recent: &mut Vec<FileId>, id: FileId) {
    recent.retain(|&existing| existing != id);
    recent.insert(0, id);
    recent.truncate(MAX_RECENT_FILES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_recent_dedupes_and_caps() {
        let ids: Vec<FileId> = (0..7).map(|_| Uuid::new_v4()).collect();
        let mut recent = Vec::new();
        for &id in &ids {
            push_recent(&mut recent, id);
        }
        assert_eq!(recent.len(), MAX_RECENT_FILES);
        assert_eq!(recent[0], ids[6]);

        push_recent(&mut recent, ids[4]);
        assert_eq!(recent[0], ids[4]);
        assert_eq!(recent.len(), MAX_RECENT_FILES);
        assert_eq!(recent.iter().filter(|&&id| id == ids[4]).count(), 1);
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("  Shop  "), Ok("Shop".to_string()));
        assert_eq!(clean_name("   "), Err(ProjectError::EmptyName));
    }

    #[test]
    fn test_same_name_folds_unicode_case() {
        assert!(same_name("Éclair", "éclair"));
        assert!(same_name("STRASSE", "strasse"));
        assert!(!same_name("Éclair", "Eclair"));
    }

    #[test]
    fn test_snapshot_uses_camel_case_keys() {
        let snapshot = StateSnapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        for key in [
            "elements",
            "selection",
            "gridSize",
            "snapToGrid",
            "addonName",
            "projects",
            "files",
            "activeProjectId",
            "activeFileId",
            "recentFiles",
            "viewport",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
    }

    #[test]
    fn test_snapshot_tolerates_missing_fields() {
        let snapshot: StateSnapshot = serde_json::from_str(r#"{"gridSize": 40}"#).unwrap();
        assert_eq!(snapshot.settings.grid_size, 40.0);
        assert!(snapshot.settings.snap_to_grid);
        assert!(snapshot.projects.is_empty());
    }
}
