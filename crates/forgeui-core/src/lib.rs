//! ForgeUI Core Library
//!
//! Headless core of the ForgeUI layout designer: the element tree with its
//! containment rules, selection, drag and drop, grid snapping, alignment,
//! undo/redo and project/file persistence.

pub mod align;
pub mod editor;
pub mod element;
pub mod geometry;
pub mod interaction;
pub mod project;
pub mod settings;
pub mod snap;
pub mod storage;
pub mod store;
pub mod viewport;

pub use align::{AlignError, AlignMode};
pub use editor::{Editor, ExportedElement, SceneExport};
pub use element::{Element, ElementId, ElementKind, ElementSpec, ElementUpdate, RgbaColor};
pub use interaction::{DragController, GestureOutcome, GestureState, MarqueeRect};
pub use project::{FileId, FileRecord, Project, ProjectError, ProjectId, ProjectManager};
pub use settings::CanvasSettings;
pub use snap::{GRID_SIZE, SnapResult, snap_point, snap_to_grid};
pub use storage::{AutoSave, MemoryStorage, Storage, StorageError};
#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStorage;
pub use store::{ElementStore, StoreError};
pub use viewport::Viewport;
