//! Project and file catalog with persistence.

use super::{
    DEFAULT_FILE_NAME, FileDocument, FileId, FileRecord, Project, ProjectError, ProjectId,
    StateSnapshot, clean_name, now_millis, push_recent, same_name,
};
use crate::element::Element;
use crate::settings::CanvasSettings;
use crate::storage::{AutoSave, STATE_KEY, Storage, StorageError, file_key};
use crate::store::ElementStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Owns the project/file catalog and writes it to a [`Storage`] backend.
///
/// The working tree of the active file lives in the [`ElementStore`]; the
/// manager takes a snapshot of it at flush points and replaces it wholesale
/// when another file is opened.
pub struct ProjectManager<S: Storage> {
    storage: Arc<S>,
    projects: HashMap<ProjectId, Project>,
    files: HashMap<FileId, FileRecord>,
    /// Element trees of files touched this session, by file.
    documents: HashMap<FileId, Vec<Element>>,
    active_project_id: Option<ProjectId>,
    active_file_id: Option<FileId>,
    recent_files: Vec<FileId>,
    /// The working tree differs from the active file's record.
    unsaved: bool,
    autosave: AutoSave,
    /// File documents waiting to be written.
    dirty_files: HashSet<FileId>,
    /// File documents waiting to be removed from storage.
    pending_deletes: HashSet<FileId>,
}

impl<S: Storage> ProjectManager<S> {
    /// Create an empty catalog on top of `storage`.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            projects: HashMap::new(),
            files: HashMap::new(),
            documents: HashMap::new(),
            active_project_id: None,
            active_file_id: None,
            recent_files: Vec::new(),
            unsaved: false,
            autosave: AutoSave::new(),
            dirty_files: HashSet::new(),
            pending_deletes: HashSet::new(),
        }
    }

    /// Load the persisted state from `storage` into a new manager, the
    /// element store and the settings.
    ///
    /// A missing snapshot yields the empty default state. A corrupt one is
    /// logged and treated the same way.
    pub fn restore(
        storage: Arc<S>,
        store: &mut ElementStore,
        settings: &mut CanvasSettings,
    ) -> Self {
        let mut manager = Self::new(storage);
        let snapshot = match pollster::block_on(manager.storage.load(STATE_KEY)) {
            Ok(json) => match serde_json::from_str::<StateSnapshot>(&json) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    log::warn!("Discarding corrupt saved state: {}", e);
                    StateSnapshot::default()
                }
            },
            Err(StorageError::NotFound(_)) => {
                log::debug!("No saved state, starting fresh");
                StateSnapshot::default()
            }
            Err(e) => {
                log::warn!("Failed to read saved state: {}", e);
                StateSnapshot::default()
            }
        };
        manager.apply_snapshot(snapshot, store, settings);
        manager
    }

    fn apply_snapshot(
        &mut self,
        snapshot: StateSnapshot,
        store: &mut ElementStore,
        settings: &mut CanvasSettings,
    ) {
        for project in snapshot.projects {
            self.projects.entry(project.id).or_insert(project);
        }
        for mut file in snapshot.files {
            if file.project_id.is_some_and(|id| !self.projects.contains_key(&id)) {
                log::warn!("File {} points at a missing project, keeping it standalone", file.id);
                file.project_id = None;
            }
            self.files.entry(file.id).or_insert(file);
        }

        // Project file lists must agree with the files' own project ids
        let files = &self.files;
        for project in self.projects.values_mut() {
            let project_id = project.id;
            let mut seen = HashSet::new();
            project.files.retain(|id| {
                files.get(id).is_some_and(|f| f.project_id == Some(project_id)) && seen.insert(*id)
            });
            if project
                .last_opened_file_id
                .is_some_and(|id| !project.files.contains(&id))
            {
                project.last_opened_file_id = None;
            }
        }
        let mut orphans: Vec<&FileRecord> = self
            .files
            .values()
            .filter(|f| {
                f.project_id
                    .and_then(|pid| self.projects.get(&pid))
                    .is_some_and(|p| !p.files.contains(&f.id))
            })
            .collect();
        orphans.sort_by_key(|f| (f.last_modified, f.id));
        let orphans: Vec<(ProjectId, FileId)> = orphans
            .into_iter()
            .filter_map(|f| f.project_id.map(|pid| (pid, f.id)))
            .collect();
        for (project_id, file_id) in orphans {
            if let Some(project) = self.projects.get_mut(&project_id) {
                project.files.push(file_id);
            }
        }

        self.active_file_id = snapshot.active_file_id.filter(|id| self.files.contains_key(id));
        self.active_project_id = match self.active_file_id {
            Some(id) => self.files.get(&id).and_then(|f| f.project_id),
            None => snapshot
                .active_project_id
                .filter(|id| self.projects.contains_key(id)),
        };
        let mut recent = Vec::new();
        for id in snapshot.recent_files.into_iter().rev() {
            if self.files.contains_key(&id) {
                push_recent(&mut recent, id);
            }
        }
        self.recent_files = recent;

        let dropped = store.replace_elements(snapshot.elements);
        if dropped > 0 {
            log::warn!("Dropped {} invalid elements from saved state", dropped);
        }
        let selection: Vec<_> = snapshot
            .selection
            .into_iter()
            .filter(|id| store.contains(*id))
            .collect();
        store.set_selected_elements(selection);

        *settings = snapshot.settings;
        settings.sanitize();

        self.unsaved = snapshot.has_unsaved_changes && self.active_file_id.is_some();
        self.autosave.reset(Instant::now());
        log::debug!(
            "Restored {} projects, {} files, {} elements",
            self.projects.len(),
            self.files.len(),
            store.len()
        );
    }

    // --- Queries ---------------------------------------------------------

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn autosave(&self) -> &AutoSave {
        &self.autosave
    }

    pub fn autosave_mut(&mut self) -> &mut AutoSave {
        &mut self.autosave
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    pub fn file(&self, id: FileId) -> Option<&FileRecord> {
        self.files.get(&id)
    }

    /// All projects, sorted by name.
    pub fn projects(&self) -> Vec<&Project> {
        let mut projects: Vec<&Project> = self.projects.values().collect();
        projects.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        projects
    }

    /// Files that belong to no project, sorted by name.
    pub fn standalone_files(&self) -> Vec<&FileRecord> {
        let mut files: Vec<&FileRecord> = self
            .files
            .values()
            .filter(|f| f.project_id.is_none())
            .collect();
        files.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        files
    }

    /// A project's files in project order.
    pub fn project_files(&self, id: ProjectId) -> Vec<&FileRecord> {
        self.projects
            .get(&id)
            .map(|p| p.files.iter().filter_map(|f| self.files.get(f)).collect())
            .unwrap_or_default()
    }

    pub fn active_project_id(&self) -> Option<ProjectId> {
        self.active_project_id
    }

    pub fn active_file_id(&self) -> Option<FileId> {
        self.active_file_id
    }

    /// Most recently opened files, newest first.
    pub fn recent_files(&self) -> &[FileId] {
        &self.recent_files
    }

    /// Whether the working tree has changes not yet saved into its file.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    /// Whether anything is waiting to be written to storage.
    pub fn needs_persist(&self) -> bool {
        self.autosave.is_dirty()
    }

    // --- Change tracking -------------------------------------------------

    /// Record a change to the working tree.
    pub fn mark_changed(&mut self) {
        self.unsaved = true;
        self.autosave.mark_dirty(Instant::now());
    }

    /// Record a change that only affects the catalog or settings.
    pub fn mark_state_changed(&mut self) {
        self.autosave.mark_dirty(Instant::now());
    }

    // --- Projects --------------------------------------------------------

    /// Create a project with one empty default file and open it.
    pub fn create_project(
        &mut self,
        store: &mut ElementStore,
        name: &str,
    ) -> Result<ProjectId, ProjectError> {
        let name = clean_name(name)?;
        self.check_project_name(&name, None)?;

        let now = now_millis();
        let project_id = ProjectId::new_v4();
        let file_id = FileId::new_v4();
        self.projects.insert(
            project_id,
            Project {
                id: project_id,
                name: name.clone(),
                files: vec![file_id],
                last_modified: now,
                last_opened_file_id: None,
            },
        );
        self.files.insert(
            file_id,
            FileRecord {
                id: file_id,
                name: DEFAULT_FILE_NAME.to_string(),
                project_id: Some(project_id),
                last_modified: now,
            },
        );
        self.documents.insert(file_id, Vec::new());
        self.dirty_files.insert(file_id);

        self.open_file(store, file_id);
        log::debug!("Created project \"{}\"", name);
        Ok(project_id)
    }

    /// Rename a project. Unknown ids are `Ok(false)`.
    pub fn rename_project(&mut self, id: ProjectId, name: &str) -> Result<bool, ProjectError> {
        if !self.projects.contains_key(&id) {
            return Ok(false);
        }
        let name = clean_name(name)?;
        self.check_project_name(&name, Some(id))?;
        if let Some(project) = self.projects.get_mut(&id) {
            project.name = name;
            project.last_modified = now_millis();
        }
        self.mark_state_changed();
        Ok(true)
    }

    /// Delete a project and all of its files.
    pub fn delete_project(&mut self, store: &mut ElementStore, id: ProjectId) -> bool {
        let Some(project) = self.projects.remove(&id) else {
            return false;
        };
        for file_id in &project.files {
            self.forget_file(store, *file_id);
        }
        if self.active_project_id == Some(id) {
            self.active_project_id = None;
            self.close_active(store);
        }
        self.mark_state_changed();
        log::debug!("Deleted project \"{}\" with {} files", project.name, project.files.len());
        true
    }

    /// Make a project active and open its last opened file, else its first.
    pub fn load_project(&mut self, store: &mut ElementStore, id: ProjectId) -> bool {
        let Some(project) = self.projects.get(&id) else {
            return false;
        };
        let target = project
            .last_opened_file_id
            .filter(|f| project.files.contains(f))
            .or_else(|| project.files.first().copied());

        match target {
            Some(file_id) => self.open_file(store, file_id),
            None => {
                self.flush_active(store);
                self.active_project_id = Some(id);
                self.close_active(store);
                self.mark_state_changed();
            }
        }
        true
    }

    fn check_project_name(
        &self,
        name: &str,
        exclude: Option<ProjectId>,
    ) -> Result<(), ProjectError> {
        let taken = self
            .projects
            .values()
            .any(|p| Some(p.id) != exclude && same_name(&p.name, name));
        if taken {
            log::warn!("Project name \"{}\" is already taken", name);
            return Err(ProjectError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    // --- Files -----------------------------------------------------------

    /// Create an empty file, standalone or inside `project_id`, and open it.
    pub fn create_file(
        &mut self,
        store: &mut ElementStore,
        name: &str,
        project_id: Option<ProjectId>,
    ) -> Result<FileId, ProjectError> {
        let name = clean_name(name)?;
        if let Some(pid) = project_id {
            if !self.projects.contains_key(&pid) {
                return Err(ProjectError::UnknownProject(pid));
            }
        }
        self.check_file_name(&name, project_id, None)?;

        let now = now_millis();
        let file_id = FileId::new_v4();
        self.files.insert(
            file_id,
            FileRecord {
                id: file_id,
                name,
                project_id,
                last_modified: now,
            },
        );
        if let Some(project) = project_id.and_then(|pid| self.projects.get_mut(&pid)) {
            project.files.push(file_id);
            project.last_modified = now;
        }
        self.documents.insert(file_id, Vec::new());
        self.dirty_files.insert(file_id);

        self.open_file(store, file_id);
        Ok(file_id)
    }

    /// Rename a file within its scope. Unknown ids are `Ok(false)`.
    pub fn rename_file(&mut self, id: FileId, name: &str) -> Result<bool, ProjectError> {
        let Some(project_id) = self.files.get(&id).map(|f| f.project_id) else {
            return Ok(false);
        };
        let name = clean_name(name)?;
        self.check_file_name(&name, project_id, Some(id))?;
        if let Some(file) = self.files.get_mut(&id) {
            file.name = name;
            file.last_modified = now_millis();
        }
        self.mark_state_changed();
        Ok(true)
    }

    /// Delete a file and its stored tree.
    pub fn delete_file(&mut self, store: &mut ElementStore, id: FileId) -> bool {
        let Some(project_id) = self.files.get(&id).map(|f| f.project_id) else {
            return false;
        };
        if let Some(project) = project_id.and_then(|pid| self.projects.get_mut(&pid)) {
            project.files.retain(|f| *f != id);
            project.last_modified = now_millis();
        }
        self.forget_file(store, id);
        self.mark_state_changed();
        true
    }

    /// Move a file into a project, or out of any project with `None`.
    ///
    /// Unknown files or target projects are `Ok(false)`.
    pub fn move_file_to_project(
        &mut self,
        file_id: FileId,
        project_id: Option<ProjectId>,
    ) -> Result<bool, ProjectError> {
        let Some(file) = self.files.get(&file_id) else {
            return Ok(false);
        };
        if project_id.is_some_and(|pid| !self.projects.contains_key(&pid)) {
            return Ok(false);
        }
        let old_project = file.project_id;
        if old_project == project_id {
            return Ok(true);
        }
        let name = file.name.clone();
        self.check_file_name(&name, project_id, Some(file_id))?;

        let now = now_millis();
        if let Some(project) = old_project.and_then(|pid| self.projects.get_mut(&pid)) {
            project.files.retain(|f| *f != file_id);
            if project.last_opened_file_id == Some(file_id) {
                project.last_opened_file_id = None;
            }
            project.last_modified = now;
        }
        if let Some(project) = project_id.and_then(|pid| self.projects.get_mut(&pid)) {
            project.files.push(file_id);
            project.last_modified = now;
        }
        if let Some(file) = self.files.get_mut(&file_id) {
            file.project_id = project_id;
            file.last_modified = now;
        }
        if self.active_file_id == Some(file_id) {
            self.active_project_id = project_id;
        }
        self.mark_state_changed();
        Ok(true)
    }

    /// Open a file, saving the current working tree into its record first.
    pub fn load_file(&mut self, store: &mut ElementStore, id: FileId) -> bool {
        if !self.files.contains_key(&id) {
            return false;
        }
        self.open_file(store, id);
        true
    }

    fn check_file_name(
        &self,
        name: &str,
        project_id: Option<ProjectId>,
        exclude: Option<FileId>,
    ) -> Result<(), ProjectError> {
        let taken = self.files.values().any(|f| {
            Some(f.id) != exclude && f.project_id == project_id && same_name(&f.name, name)
        });
        if taken {
            log::warn!("File name \"{}\" is already taken", name);
            return Err(ProjectError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn open_file(&mut self, store: &mut ElementStore, id: FileId) {
        self.flush_active(store);

        let project_id = self.files.get(&id).and_then(|f| f.project_id);
        if let Some(project) = project_id.and_then(|pid| self.projects.get_mut(&pid)) {
            project.last_opened_file_id = Some(id);
        }
        let elements = self.document(id);
        let dropped = store.replace_elements(elements);
        if dropped > 0 {
            log::warn!("Dropped {} invalid elements while opening file {}", dropped, id);
        }

        self.active_file_id = Some(id);
        self.active_project_id = project_id;
        push_recent(&mut self.recent_files, id);
        self.unsaved = false;
        self.mark_state_changed();
        log::debug!("Opened file {} ({} elements)", id, store.len());
    }

    /// A file's tree, from this session's cache or from storage.
    fn document(&mut self, id: FileId) -> Vec<Element> {
        if let Some(elements) = self.documents.get(&id) {
            return elements.clone();
        }
        let elements = match pollster::block_on(self.storage.load(&file_key(&id.to_string()))) {
            Ok(json) => match serde_json::from_str::<FileDocument>(&json) {
                Ok(doc) => doc.elements,
                Err(e) => {
                    log::warn!("Discarding corrupt file {}: {}", id, e);
                    Vec::new()
                }
            },
            Err(StorageError::NotFound(_)) => {
                log::warn!("No stored tree for file {}, starting empty", id);
                Vec::new()
            }
            Err(e) => {
                log::warn!("Failed to read file {}: {}", id, e);
                Vec::new()
            }
        };
        self.documents.insert(id, elements.clone());
        elements
    }

    /// Copy the working tree into the active file's record if it changed.
    fn flush_active(&mut self, store: &ElementStore) {
        if !self.unsaved {
            return;
        }
        let Some(id) = self.active_file_id else {
            return;
        };
        let now = now_millis();
        self.documents.insert(id, store.export_elements());
        self.dirty_files.insert(id);
        let project_id = self.files.get_mut(&id).and_then(|file| {
            file.last_modified = now;
            file.project_id
        });
        if let Some(project) = project_id.and_then(|pid| self.projects.get_mut(&pid)) {
            project.last_modified = now;
        }
        self.unsaved = false;
        self.mark_state_changed();
    }

    /// Drop a file from the catalog. Resets the working tree if it was open.
    fn forget_file(&mut self, store: &mut ElementStore, id: FileId) {
        self.files.remove(&id);
        self.documents.remove(&id);
        self.dirty_files.remove(&id);
        self.pending_deletes.insert(id);
        self.recent_files.retain(|f| *f != id);
        for project in self.projects.values_mut() {
            if project.last_opened_file_id == Some(id) {
                project.last_opened_file_id = None;
            }
        }
        if self.active_file_id == Some(id) {
            self.close_active(store);
        }
    }

    fn close_active(&mut self, store: &mut ElementStore) {
        self.active_file_id = None;
        self.unsaved = false;
        store.replace_elements(Vec::new());
    }

    // --- Persistence -----------------------------------------------------

    /// Save the working tree into the active file and persist everything.
    ///
    /// Does nothing when there are no unsaved changes. Returns whether a
    /// write happened and succeeded.
    pub fn save_current_file(&mut self, store: &ElementStore, settings: &CanvasSettings) -> bool {
        if !self.unsaved {
            return false;
        }
        self.flush_active(store);
        self.persist(store, settings)
    }

    /// Persist if the autosave policy says so. Returns whether it saved.
    ///
    /// Autosave writes the working tree into the state snapshot together
    /// with the unsaved flag. It does not copy the tree into the active
    /// file's record, so the file keeps its last saved content until
    /// [`save_current_file`](Self::save_current_file) runs or another file
    /// is opened.
    pub fn tick(&mut self, store: &ElementStore, settings: &CanvasSettings, now: Instant) -> bool {
        if !self.autosave.should_save(now) {
            return false;
        }
        self.persist_at(store, settings, now)
    }

    /// Write the catalog snapshot, pending file trees and deletions.
    ///
    /// Failures are logged and keep the state dirty so a later call can
    /// retry.
    pub fn persist(&mut self, store: &ElementStore, settings: &CanvasSettings) -> bool {
        self.persist_at(store, settings, Instant::now())
    }

    fn persist_at(
        &mut self,
        store: &ElementStore,
        settings: &CanvasSettings,
        now: Instant,
    ) -> bool {
        let mut ok = true;

        let written: Vec<FileId> = self.dirty_files.iter().copied().collect();
        for id in written {
            let doc = FileDocument {
                id,
                elements: self.documents.get(&id).cloned().unwrap_or_default(),
            };
            let key = file_key(&id.to_string());
            let result = serde_json::to_string(&doc)
                .map_err(StorageError::from)
                .and_then(|json| pollster::block_on(self.storage.save(&key, &json)));
            match result {
                Ok(()) => {
                    self.dirty_files.remove(&id);
                }
                Err(e) => {
                    log::error!("Failed to save file {}: {}", id, e);
                    ok = false;
                }
            }
        }

        let deleted: Vec<FileId> = self.pending_deletes.iter().copied().collect();
        for id in deleted {
            match pollster::block_on(self.storage.delete(&file_key(&id.to_string()))) {
                Ok(()) => {
                    self.pending_deletes.remove(&id);
                }
                Err(e) => {
                    log::error!("Failed to delete file {}: {}", id, e);
                    ok = false;
                }
            }
        }

        let snapshot = self.snapshot(store, settings);
        let result = serde_json::to_string(&snapshot)
            .map_err(StorageError::from)
            .and_then(|json| pollster::block_on(self.storage.save(STATE_KEY, &json)));
        if let Err(e) = result {
            log::error!("Failed to save editor state: {}", e);
            ok = false;
        }

        if ok {
            self.autosave.mark_saved(now);
            log::debug!("Saved {} projects, {} files", self.projects.len(), self.files.len());
        }
        ok
    }

    fn snapshot(&self, store: &ElementStore, settings: &CanvasSettings) -> StateSnapshot {
        let mut projects: Vec<Project> = self.projects.values().cloned().collect();
        projects.sort_by_key(|p| p.id);
        let mut files: Vec<FileRecord> = self.files.values().cloned().collect();
        files.sort_by_key(|f| f.id);
        StateSnapshot {
            elements: store.export_elements(),
            selection: store.selected_ids(),
            settings: settings.clone(),
            projects,
            files,
            active_project_id: self.active_project_id,
            active_file_id: self.active_file_id,
            recent_files: self.recent_files.clone(),
            has_unsaved_changes: self.unsaved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementKind, ElementSpec};
    use crate::storage::{BoxFuture, MemoryStorage, StorageResult};
    use kurbo::Point;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn setup() -> (ProjectManager<MemoryStorage>, ElementStore, CanvasSettings) {
        (
            ProjectManager::new(Arc::new(MemoryStorage::new())),
            ElementStore::new(),
            CanvasSettings::default(),
        )
    }

    fn add_frame(store: &mut ElementStore) {
        store
            .add_element(ElementSpec::new(ElementKind::Frame, Point::new(10.0, 10.0)))
            .unwrap();
    }

    #[test]
    fn test_create_project_opens_default_file() {
        let (mut manager, mut store, _) = setup();
        add_frame(&mut store);

        let project_id = manager.create_project(&mut store, "Shop").unwrap();
        let project = manager.project(project_id).unwrap();
        assert_eq!(project.files.len(), 1);

        let file_id = project.files[0];
        assert_eq!(project.last_opened_file_id, Some(file_id));
        assert_eq!(manager.file(file_id).unwrap().name, DEFAULT_FILE_NAME);
        assert_eq!(manager.active_project_id(), Some(project_id));
        assert_eq!(manager.active_file_id(), Some(file_id));
        assert_eq!(manager.recent_files(), &[file_id]);
        assert!(store.is_empty());
        assert!(!manager.has_unsaved_changes());
    }

    #[test]
    fn test_project_names_are_unique_ignoring_case() {
        let (mut manager, mut store, _) = setup();
        let a = manager.create_project(&mut store, "Shop").unwrap();
        manager.create_project(&mut store, "Bank").unwrap();

        assert_eq!(
            manager.create_project(&mut store, "shop"),
            Err(ProjectError::DuplicateName("shop".to_string()))
        );
        assert_eq!(
            manager.rename_project(a, "BANK"),
            Err(ProjectError::DuplicateName("BANK".to_string()))
        );
        assert_eq!(manager.rename_project(a, "  "), Err(ProjectError::EmptyName));
        assert_eq!(manager.project(a).unwrap().name, "Shop");

        // Renaming to itself with another case is fine
        assert_eq!(manager.rename_project(a, "SHOP"), Ok(true));
        assert_eq!(manager.rename_project(ProjectId::new_v4(), "X"), Ok(false));

        let names: Vec<&str> = manager.projects().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Bank", "SHOP"]);
    }

    #[test]
    fn test_names_ignore_case_beyond_ascii() {
        let (mut manager, mut store, _) = setup();
        let eclair = manager.create_project(&mut store, "Éclair").unwrap();
        assert_eq!(
            manager.create_project(&mut store, "éclair"),
            Err(ProjectError::DuplicateName("éclair".to_string()))
        );
        assert_eq!(manager.projects().len(), 1);

        manager.create_file(&mut store, "Übersicht", Some(eclair)).unwrap();
        assert_eq!(
            manager.create_file(&mut store, "ÜBERSICHT", Some(eclair)),
            Err(ProjectError::DuplicateName("ÜBERSICHT".to_string()))
        );
        // Accents still count as different letters
        assert!(manager.create_file(&mut store, "Ubersicht", Some(eclair)).is_ok());
    }

    #[test]
    fn test_file_names_scoped_to_project() {
        let (mut manager, mut store, _) = setup();
        let shop = manager.create_project(&mut store, "Shop").unwrap();
        let bank = manager.create_project(&mut store, "Bank").unwrap();

        manager.create_file(&mut store, "Main", Some(shop)).unwrap();
        manager.create_file(&mut store, "main", Some(bank)).unwrap();
        let loose = manager.create_file(&mut store, "MAIN", None).unwrap();
        assert_eq!(
            manager.create_file(&mut store, "Main", Some(shop)),
            Err(ProjectError::DuplicateName("Main".to_string()))
        );

        // Moving into a project that already has the name is rejected
        assert_eq!(
            manager.move_file_to_project(loose, Some(shop)),
            Err(ProjectError::DuplicateName("MAIN".to_string()))
        );
        assert_eq!(manager.rename_file(loose, "Settings"), Ok(true));
        assert_eq!(manager.move_file_to_project(loose, Some(shop)), Ok(true));
        assert_eq!(manager.file(loose).unwrap().project_id, Some(shop));
        assert_eq!(manager.active_project_id(), Some(shop));
        assert!(manager.standalone_files().is_empty());

        let names: Vec<&str> = manager
            .project_files(shop)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec![DEFAULT_FILE_NAME, "Main", "Settings"]);

        assert_eq!(manager.move_file_to_project(loose, Some(ProjectId::new_v4())), Ok(false));
        assert_eq!(manager.move_file_to_project(FileId::new_v4(), None), Ok(false));
    }

    #[test]
    fn test_create_file_in_unknown_project() {
        let (mut manager, mut store, _) = setup();
        let missing = ProjectId::new_v4();
        assert_eq!(
            manager.create_file(&mut store, "Main", Some(missing)),
            Err(ProjectError::UnknownProject(missing))
        );
    }

    #[test]
    fn test_load_file_swaps_working_tree() {
        let (mut manager, mut store, _) = setup();
        let first = manager.create_file(&mut store, "First", None).unwrap();
        add_frame(&mut store);
        add_frame(&mut store);
        manager.mark_changed();

        let second = manager.create_file(&mut store, "Second", None).unwrap();
        assert!(store.is_empty());
        add_frame(&mut store);
        manager.mark_changed();

        assert!(manager.load_file(&mut store, first));
        assert_eq!(store.len(), 2);
        assert!(!manager.has_unsaved_changes());
        assert!(!store.history().can_undo());

        assert!(manager.load_file(&mut store, second));
        assert_eq!(store.len(), 1);
        assert!(!manager.load_file(&mut store, FileId::new_v4()));
    }

    #[test]
    fn test_recent_files_order() {
        let (mut manager, mut store, _) = setup();
        let a = manager.create_file(&mut store, "A", None).unwrap();
        let b = manager.create_file(&mut store, "B", None).unwrap();
        manager.load_file(&mut store, a);
        manager.load_file(&mut store, b);
        manager.load_file(&mut store, a);
        assert_eq!(manager.recent_files(), &[a, b]);
    }

    #[test]
    fn test_load_project_opens_last_opened_file() {
        let (mut manager, mut store, _) = setup();
        let shop = manager.create_project(&mut store, "Shop").unwrap();
        let cart = manager.create_file(&mut store, "Cart", Some(shop)).unwrap();
        manager.create_project(&mut store, "Bank").unwrap();

        assert!(manager.load_project(&mut store, shop));
        assert_eq!(manager.active_file_id(), Some(cart));
        assert_eq!(manager.active_project_id(), Some(shop));
        assert!(!manager.load_project(&mut store, ProjectId::new_v4()));
    }

    #[test]
    fn test_load_empty_project() {
        let (mut manager, mut store, _) = setup();
        let shop = manager.create_project(&mut store, "Shop").unwrap();
        let file = manager.project(shop).unwrap().files[0];
        manager.move_file_to_project(file, None).unwrap();
        add_frame(&mut store);

        assert!(manager.load_project(&mut store, shop));
        assert_eq!(manager.active_project_id(), Some(shop));
        assert_eq!(manager.active_file_id(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_project_cascades() {
        let (mut manager, mut store, settings) = setup();
        let shop = manager.create_project(&mut store, "Shop").unwrap();
        let cart = manager.create_file(&mut store, "Cart", Some(shop)).unwrap();
        add_frame(&mut store);
        manager.mark_changed();
        assert!(manager.save_current_file(&store, &settings));
        let key = file_key(&cart.to_string());
        assert!(pollster::block_on(manager.storage().exists(&key)).unwrap());

        assert!(manager.delete_project(&mut store, shop));
        assert!(manager.project(shop).is_none());
        assert!(manager.file(cart).is_none());
        assert!(manager.recent_files().is_empty());
        assert_eq!(manager.active_file_id(), None);
        assert_eq!(manager.active_project_id(), None);
        assert!(store.is_empty());

        assert!(manager.persist(&store, &settings));
        assert!(!pollster::block_on(manager.storage().exists(&key)).unwrap());
        assert!(!manager.delete_project(&mut store, shop));
    }

    #[test]
    fn test_delete_inactive_file_keeps_working_tree() {
        let (mut manager, mut store, _) = setup();
        let a = manager.create_file(&mut store, "A", None).unwrap();
        manager.create_file(&mut store, "B", None).unwrap();
        add_frame(&mut store);

        assert!(manager.delete_file(&mut store, a));
        assert_eq!(store.len(), 1);
        assert!(!manager.recent_files().contains(&a));
        assert!(!manager.delete_file(&mut store, a));
    }

    #[test]
    fn test_save_current_file_is_noop_when_clean() {
        let (mut manager, mut store, settings) = setup();
        manager.create_file(&mut store, "A", None).unwrap();
        assert!(!manager.save_current_file(&store, &settings));

        add_frame(&mut store);
        manager.mark_changed();
        assert!(manager.has_unsaved_changes());
        assert!(manager.save_current_file(&store, &settings));
        assert!(!manager.has_unsaved_changes());
        assert!(!manager.needs_persist());
    }

    #[test]
    fn test_tick_waits_for_debounce() {
        let (mut manager, mut store, settings) = setup();
        let file = manager.create_file(&mut store, "A", None).unwrap();
        manager.persist(&store, &settings);
        add_frame(&mut store);
        manager.mark_changed();

        let now = Instant::now();
        assert!(!manager.tick(&store, &settings, now));
        assert!(manager.tick(&store, &settings, now + Duration::from_secs(2)));
        assert!(!manager.tick(&store, &settings, now + Duration::from_secs(4)));
        // Autosave keeps the unsaved tree in the snapshot, not in the file
        assert!(manager.has_unsaved_changes());
        assert!(manager.documents.get(&file).is_none_or(|elements| elements.is_empty()));
        assert_eq!(manager.snapshot(&store, &settings).elements.len(), 1);
    }

    #[test]
    fn test_persist_and_restore_round_trip() {
        let storage = Arc::new(MemoryStorage::new());
        let mut manager = ProjectManager::new(storage.clone());
        let mut store = ElementStore::new();
        let mut settings = CanvasSettings::default();
        settings.set_grid_size(40.0);
        settings.set_addon_name("Inventory");

        let shop = manager.create_project(&mut store, "Shop").unwrap();
        let first = manager.active_file_id().unwrap();
        add_frame(&mut store);
        manager.mark_changed();
        let cart = manager.create_file(&mut store, "Cart", Some(shop)).unwrap();
        add_frame(&mut store);
        add_frame(&mut store);
        store.select_all();
        manager.mark_changed();
        assert!(manager.persist(&store, &settings));

        let mut restored_store = ElementStore::new();
        let mut restored_settings = CanvasSettings::default();
        let mut restored =
            ProjectManager::restore(storage, &mut restored_store, &mut restored_settings);

        assert_eq!(restored_settings, settings);
        assert_eq!(restored.active_file_id(), Some(cart));
        assert_eq!(restored.active_project_id(), Some(shop));
        assert_eq!(restored.recent_files(), &[cart, first]);
        assert!(restored.has_unsaved_changes());
        assert_eq!(restored_store.len(), 2);
        assert_eq!(restored_store.selected_ids().len(), 2);
        assert_eq!(restored_store.export_elements(), store.export_elements());

        // The first file's tree comes from its own document
        assert!(restored.load_file(&mut restored_store, first));
        assert_eq!(restored_store.len(), 1);
        assert!(restored.load_file(&mut restored_store, cart));
        assert_eq!(restored_store.len(), 2);
    }

    #[test]
    fn test_restore_from_corrupt_state() {
        let storage = Arc::new(MemoryStorage::new());
        pollster::block_on(storage.save(STATE_KEY, "{not json")).unwrap();

        let mut store = ElementStore::new();
        add_frame(&mut store);
        let mut settings = CanvasSettings::default();
        settings.set_grid_size(50.0);

        let manager = ProjectManager::restore(storage, &mut store, &mut settings);
        assert!(manager.projects().is_empty());
        assert!(store.is_empty());
        assert_eq!(settings, CanvasSettings::default());
    }

    #[test]
    fn test_restore_with_missing_file_document() {
        let storage = Arc::new(MemoryStorage::new());
        let file_id = FileId::new_v4();
        let state = serde_json::json!({
            "files": [{ "id": file_id, "name": "Lost", "projectId": ProjectId::new_v4() }],
            "recentFiles": [file_id, FileId::new_v4()],
        });
        pollster::block_on(storage.save(STATE_KEY, &state.to_string())).unwrap();

        let mut store = ElementStore::new();
        let mut settings = CanvasSettings::default();
        let mut manager = ProjectManager::restore(storage, &mut store, &mut settings);

        // Dangling project reference makes the file standalone
        assert_eq!(manager.standalone_files().len(), 1);
        assert_eq!(manager.recent_files(), &[file_id]);
        assert!(manager.load_file(&mut store, file_id));
        assert!(store.is_empty());
    }

    struct FailingStorage {
        inner: MemoryStorage,
        fail: AtomicBool,
    }

    impl Storage for FailingStorage {
        fn save(&self, key: &str, value: &str) -> BoxFuture<'_, StorageResult<()>> {
            if self.fail.load(Ordering::SeqCst) {
                return Box::pin(async { Err(StorageError::Io("disk full".to_string())) });
            }
            self.inner.save(key, value)
        }

        fn load(&self, key: &str) -> BoxFuture<'_, StorageResult<String>> {
            self.inner.load(key)
        }

        fn delete(&self, key: &str) -> BoxFuture<'_, StorageResult<()>> {
            self.inner.delete(key)
        }

        fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
            self.inner.list()
        }

        fn exists(&self, key: &str) -> BoxFuture<'_, StorageResult<bool>> {
            self.inner.exists(key)
        }
    }

    #[test]
    fn test_failed_write_stays_dirty() {
        let storage = Arc::new(FailingStorage {
            inner: MemoryStorage::new(),
            fail: AtomicBool::new(true),
        });
        let mut manager = ProjectManager::new(storage.clone());
        let mut store = ElementStore::new();
        let settings = CanvasSettings::default();
        manager.create_file(&mut store, "A", None).unwrap();

        assert!(!manager.persist(&store, &settings));
        assert!(manager.needs_persist());

        storage.fail.store(false, Ordering::SeqCst);
        assert!(manager.persist(&store, &settings));
        assert!(!manager.needs_persist());
        assert!(pollster::block_on(storage.exists(STATE_KEY)).unwrap());
    }
}
