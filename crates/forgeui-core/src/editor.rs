//! The editor: one owner for the design tree, settings, gestures and files.
//!
//! Presentation layers read from the editor and call its command methods.
//! Every command that changes the tree marks the active file as changed so
//! autosave and the unsaved-changes indicator stay in sync.

use crate::align::{self, AlignError, AlignMode};
use crate::element::{Element, ElementId, ElementKind, ElementSpec, ElementUpdate};
use crate::interaction::{DragController, GestureOutcome};
use crate::project::{FileId, ProjectError, ProjectId, ProjectManager};
use crate::settings::CanvasSettings;
use crate::storage::Storage;
use crate::store::{ElementStore, StoreError};
use kurbo::{Point, Rect, Vec2};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Read-only view of the design handed to code generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneExport {
    pub addon_name: String,
    /// Parents come before their children.
    pub elements: Vec<ExportedElement>,
}

/// One element with its absolute placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedElement {
    pub id: ElementId,
    pub kind: ElementKind,
    pub name: Option<String>,
    pub parent_id: Option<ElementId>,
    /// Nesting level, 0 for top-level containers.
    pub depth: usize,
    pub bounds: Rect,
    pub element: Element,
}

/// The headless layout editor.
pub struct Editor<S: Storage> {
    store: ElementStore,
    settings: CanvasSettings,
    gestures: DragController,
    projects: ProjectManager<S>,
}

impl<S: Storage> Editor<S> {
    /// An empty editor on top of `storage`. Nothing is read from it.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            store: ElementStore::new(),
            settings: CanvasSettings::default(),
            gestures: DragController::new(),
            projects: ProjectManager::new(storage),
        }
    }

    /// An editor with the state previously persisted to `storage`.
    pub fn restore(storage: Arc<S>) -> Self {
        let mut store = ElementStore::new();
        let mut settings = CanvasSettings::default();
        let projects = ProjectManager::restore(storage, &mut store, &mut settings);
        Self {
            store,
            settings,
            gestures: DragController::new(),
            projects,
        }
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    pub fn settings(&self) -> &CanvasSettings {
        &self.settings
    }

    pub fn projects(&self) -> &ProjectManager<S> {
        &self.projects
    }

    pub fn gestures(&self) -> &DragController {
        &self.gestures
    }

    /// Elements in paint order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.store.elements()
    }

    pub fn selected_ids(&self) -> Vec<ElementId> {
        self.store.selected_ids()
    }

    /// Run a tree mutation and mark the file changed if it did anything.
    fn edit<T>(&mut self, f: impl FnOnce(&mut ElementStore) -> T) -> T {
        let before = self.store.revision();
        let result = f(&mut self.store);
        if self.store.revision() != before {
            self.projects.mark_changed();
        }
        result
    }

    // --- Element commands ------------------------------------------------

    pub fn add_element(&mut self, spec: ElementSpec) -> Result<ElementId, StoreError> {
        self.edit(|store| store.add_element(spec))
    }

    pub fn update_element(
        &mut self,
        id: ElementId,
        update: ElementUpdate,
    ) -> Result<bool, StoreError> {
        self.edit(|store| store.update_element(id, update))
    }

    pub fn rename_element(&mut self, id: ElementId, name: &str) -> Result<bool, StoreError> {
        self.edit(|store| store.rename_element(id, name))
    }

    pub fn move_element(
        &mut self,
        id: ElementId,
        new_parent: Option<ElementId>,
        position: Point,
    ) -> Result<bool, StoreError> {
        self.edit(|store| store.move_element(id, new_parent, position))
    }

    /// Delete an element and everything inside it. Returns the number of
    /// removed records.
    pub fn delete_element(&mut self, id: ElementId) -> usize {
        self.edit(|store| store.delete_element(id))
    }

    pub fn delete_selected(&mut self) -> usize {
        self.edit(|store| store.delete_selected())
    }

    pub fn clear(&mut self) -> usize {
        self.edit(|store| store.clear())
    }

    pub fn align(&mut self, mode: AlignMode) -> Result<usize, AlignError> {
        self.edit(|store| align::align(store, mode))
    }

    pub fn undo(&mut self) -> Option<String> {
        if !self.gestures.is_idle() {
            return None;
        }
        self.edit(|store| store.undo())
    }

    pub fn redo(&mut self) -> Option<String> {
        if !self.gestures.is_idle() {
            return None;
        }
        self.edit(|store| store.redo())
    }

    // --- Selection -------------------------------------------------------

    pub fn set_selected_elements(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.store.set_selected_elements(ids);
        self.projects.mark_state_changed();
    }

    pub fn toggle_element_selection(&mut self, id: ElementId) {
        self.store.toggle_element_selection(id);
        self.projects.mark_state_changed();
    }

    pub fn clear_selection(&mut self) {
        self.store.clear_selection();
        self.projects.mark_state_changed();
    }

    pub fn select_all(&mut self) {
        self.store.select_all();
        self.projects.mark_state_changed();
    }

    // --- Pointer input ---------------------------------------------------
    //
    // Points are in screen coordinates and go through the viewport.

    pub fn pointer_down(&mut self, screen: Point, additive: bool) -> bool {
        let point = self.settings.viewport.screen_to_canvas(screen);
        self.gestures.pointer_down(&mut self.store, point, additive)
    }

    pub fn pointer_move(&mut self, screen: Point) {
        let point = self.settings.viewport.screen_to_canvas(screen);
        self.gestures.pointer_move(&mut self.store, point, &self.settings);
    }

    pub fn pointer_up(&mut self, screen: Point, additive: bool) -> GestureOutcome {
        let point = self.settings.viewport.screen_to_canvas(screen);
        let outcome = self
            .gestures
            .pointer_up(&mut self.store, point, additive, &self.settings);
        match outcome {
            GestureOutcome::Moved(_) | GestureOutcome::Reparented { .. } => {
                self.projects.mark_changed()
            }
            GestureOutcome::None => {}
            _ => self.projects.mark_state_changed(),
        }
        outcome
    }

    /// Abort the gesture in progress, restoring dragged elements.
    pub fn cancel_gesture(&mut self) {
        self.gestures.cancel(&mut self.store);
    }

    // --- Settings and view -----------------------------------------------

    pub fn set_grid_size(&mut self, size: f64) {
        self.settings.set_grid_size(size);
        self.projects.mark_state_changed();
    }

    pub fn toggle_snap(&mut self) -> bool {
        let enabled = self.settings.toggle_snap();
        self.projects.mark_state_changed();
        enabled
    }

    pub fn set_addon_name(&mut self, name: &str) {
        self.settings.set_addon_name(name);
        self.projects.mark_state_changed();
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.settings.viewport.pan(delta);
        self.projects.mark_state_changed();
    }

    pub fn zoom_at(&mut self, screen: Point, factor: f64) {
        self.settings.viewport.zoom_at(screen, factor);
        self.projects.mark_state_changed();
    }

    pub fn reset_view(&mut self) {
        self.settings.viewport.reset();
        self.projects.mark_state_changed();
    }

    // --- Projects and files ----------------------------------------------

    pub fn create_project(&mut self, name: &str) -> Result<ProjectId, ProjectError> {
        self.gestures.cancel(&mut self.store);
        self.projects.create_project(&mut self.store, name)
    }

    pub fn rename_project(&mut self, id: ProjectId, name: &str) -> Result<bool, ProjectError> {
        self.projects.rename_project(id, name)
    }

    pub fn delete_project(&mut self, id: ProjectId) -> bool {
        self.gestures.cancel(&mut self.store);
        self.projects.delete_project(&mut self.store, id)
    }

    pub fn load_project(&mut self, id: ProjectId) -> bool {
        self.gestures.cancel(&mut self.store);
        self.projects.load_project(&mut self.store, id)
    }

    pub fn create_file(
        &mut self,
        name: &str,
        project_id: Option<ProjectId>,
    ) -> Result<FileId, ProjectError> {
        self.gestures.cancel(&mut self.store);
        self.projects.create_file(&mut self.store, name, project_id)
    }

    pub fn rename_file(&mut self, id: FileId, name: &str) -> Result<bool, ProjectError> {
        self.projects.rename_file(id, name)
    }

    pub fn delete_file(&mut self, id: FileId) -> bool {
        self.gestures.cancel(&mut self.store);
        self.projects.delete_file(&mut self.store, id)
    }

    pub fn move_file_to_project(
        &mut self,
        file_id: FileId,
        project_id: Option<ProjectId>,
    ) -> Result<bool, ProjectError> {
        self.projects.move_file_to_project(file_id, project_id)
    }

    pub fn load_file(&mut self, id: FileId) -> bool {
        self.gestures.cancel(&mut self.store);
        self.projects.load_file(&mut self.store, id)
    }

    pub fn save_current_file(&mut self) -> bool {
        if !self.gestures.is_idle() {
            return false;
        }
        self.projects.save_current_file(&self.store, &self.settings)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.projects.has_unsaved_changes()
    }

    /// Run the autosave policy. Never flushes in the middle of a gesture.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.gestures.is_idle() {
            return false;
        }
        self.projects.tick(&self.store, &self.settings, now)
    }

    // --- Export ----------------------------------------------------------

    /// Snapshot of the design for code generation.
    pub fn export_scene(&self) -> SceneExport {
        let elements = self
            .store
            .render_order()
            .into_iter()
            .filter_map(|element| {
                let bounds = self.store.absolute_bounds(element.id)?;
                Some(ExportedElement {
                    id: element.id,
                    kind: element.kind,
                    name: element.name.clone(),
                    parent_id: element.parent_id,
                    depth: self.store.depth(element.id),
                    bounds,
                    element: element.clone(),
                })
            })
            .collect();
        SceneExport {
            addon_name: self.settings.addon_name.clone(),
            elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::time::Duration;

    fn editor() -> Editor<MemoryStorage> {
        let mut editor = Editor::new(Arc::new(MemoryStorage::new()));
        editor.create_project("Shop").unwrap();
        editor
    }

    #[test]
    fn test_mutations_mark_file_changed() {
        let mut editor = editor();
        assert!(!editor.has_unsaved_changes());

        // Rejected commands leave the flag alone
        let err = editor
            .add_element(ElementSpec::new(ElementKind::Button, Point::new(10.0, 10.0)))
            .unwrap_err();
        assert_eq!(err.to_string(), "Button must be inside a container");
        assert!(!editor.has_unsaved_changes());

        editor
            .add_element(ElementSpec::new(ElementKind::Frame, Point::new(10.0, 10.0)))
            .unwrap();
        assert!(editor.has_unsaved_changes());
        assert!(editor.save_current_file());
        assert!(!editor.has_unsaved_changes());

        assert_eq!(editor.undo().as_deref(), Some("Add Frame"));
        assert!(editor.has_unsaved_changes());
    }

    #[test]
    fn test_selection_does_not_dirty_file() {
        let mut editor = editor();
        let frame = editor
            .add_element(ElementSpec::new(ElementKind::Frame, Point::new(10.0, 10.0)))
            .unwrap();
        editor.save_current_file();

        editor.set_selected_elements([frame]);
        assert!(!editor.has_unsaved_changes());
        assert!(editor.projects().needs_persist());
    }

    #[test]
    fn test_pointer_uses_viewport() {
        let mut editor = editor();
        let frame = editor
            .add_element(
                ElementSpec::new(ElementKind::Frame, Point::new(100.0, 100.0))
                    .with_size(200.0, 200.0),
            )
            .unwrap();
        editor.zoom_at(Point::ZERO, 2.0);

        // Screen (240, 240) is canvas (120, 120)
        assert!(editor.pointer_down(Point::new(240.0, 240.0), false));
        editor.pointer_move(Point::new(280.0, 240.0));
        let outcome = editor.pointer_up(Point::new(280.0, 240.0), false);
        assert_eq!(outcome, GestureOutcome::Moved(frame));
        assert_eq!(editor.store().get(frame).unwrap().origin(), Point::new(120.0, 100.0));
        assert!(editor.has_unsaved_changes());
    }

    #[test]
    fn test_tick_skips_active_gesture() {
        let mut editor = editor();
        editor
            .add_element(ElementSpec::new(ElementKind::Frame, Point::new(100.0, 100.0)))
            .unwrap();
        let later = Instant::now() + Duration::from_secs(5);

        assert!(editor.pointer_down(Point::new(110.0, 110.0), false));
        assert!(!editor.tick(later));
        editor.pointer_up(Point::new(110.0, 110.0), false);
        assert!(editor.tick(later));
    }

    #[test]
    fn test_export_scene_uses_absolute_bounds() {
        let mut editor = editor();
        editor.set_addon_name("Inventory");
        let frame = editor
            .add_element(
                ElementSpec::new(ElementKind::Frame, Point::new(100.0, 100.0))
                    .with_size(300.0, 200.0),
            )
            .unwrap();
        let button = editor
            .add_element(
                ElementSpec::new(ElementKind::Button, Point::new(120.0, 130.0))
                    .with_parent(frame)
                    .with_size(80.0, 30.0)
                    .with_name("BuyButton"),
            )
            .unwrap();

        let scene = editor.export_scene();
        assert_eq!(scene.addon_name, "Inventory");
        assert_eq!(scene.elements.len(), 2);
        assert_eq!(scene.elements[0].id, frame);
        let exported = &scene.elements[1];
        assert_eq!(exported.id, button);
        assert_eq!(exported.depth, 1);
        assert_eq!(exported.name.as_deref(), Some("BuyButton"));
        assert_eq!(exported.bounds, Rect::new(120.0, 130.0, 200.0, 160.0));
        assert_eq!(exported.element.x, 20.0);
    }
}
