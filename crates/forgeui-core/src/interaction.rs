//! Pointer gestures on the canvas: dragging elements and marquee selection.
//!
//! The controller turns a stream of pointer events into store mutations.
//! A drag is wrapped in a history batch so the whole gesture is one undo
//! step; a marquee only touches the selection.

use crate::element::{ElementId, ElementUpdate};
use crate::geometry;
use crate::settings::CanvasSettings;
use crate::snap;
use crate::store::ElementStore;
use kurbo::{Point, Rect, Vec2};
use std::collections::HashMap;

/// A marquee needs more than this extent on both axes to select anything.
pub const MIN_MARQUEE_SIZE: f64 = 2.0;

/// Selection rectangle state for marquee selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarqueeRect {
    /// Starting point in canvas coordinates.
    pub start: Point,
    /// Current point in canvas coordinates.
    pub current: Point,
}

impl MarqueeRect {
    pub fn new(start: Point) -> Self {
        Self {
            start,
            current: start,
        }
    }

    pub fn to_rect(&self) -> Rect {
        geometry::rect_from_corners(self.start, self.current)
    }

    /// Whether the rectangle is large enough to be a selection rather
    /// than a click.
    pub fn is_meaningful(&self) -> bool {
        let rect = self.to_rect();
        rect.width() > MIN_MARQUEE_SIZE && rect.height() > MIN_MARQUEE_SIZE
    }
}

/// State of an element drag.
#[derive(Debug, Clone)]
pub struct DragSession {
    /// The element under the pointer when the drag started.
    pub element_id: ElementId,
    /// Pointer position minus the grabbed element's canvas origin.
    pub grab_offset: Vec2,
    pub start_point: Point,
    pub current_point: Point,
    /// Other selected elements that follow the grabbed one.
    pub followers: Vec<ElementId>,
    /// Parent-relative origins of the moving set before the drag.
    pub original_origins: HashMap<ElementId, Point>,
    moved: bool,
    deselect_on_click: bool,
}

impl DragSession {
    /// Offset of the grabbed element from where it started, in its parent's frame.
    pub fn delta(&self, store: &ElementStore) -> Vec2 {
        match (
            store.get(self.element_id),
            self.original_origins.get(&self.element_id),
        ) {
            (Some(element), Some(original)) => element.origin() - *original,
            _ => Vec2::ZERO,
        }
    }
}

/// The gesture state machine.
#[derive(Debug, Clone, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Dragging(DragSession),
    Selecting(MarqueeRect),
}

/// What a finished gesture did.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    None,
    /// Press and release on an element without moving it.
    Clicked(ElementId),
    /// The element was dragged and stayed in its container.
    Moved(ElementId),
    /// The element was dropped into a different container.
    Reparented {
        element_id: ElementId,
        parent_id: ElementId,
    },
    /// A marquee selected this many elements.
    Selected(usize),
    SelectionCleared,
}

/// Translates pointer events into drags and marquee selections.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    state: GestureState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, GestureState::Idle)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging(_))
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.state, GestureState::Selecting(_))
    }

    /// The current marquee rectangle (for rendering).
    pub fn marquee(&self) -> Option<Rect> {
        match &self.state {
            GestureState::Selecting(marquee) => Some(marquee.to_rect()),
            _ => None,
        }
    }

    /// Start a gesture. Returns true if an element was grabbed.
    pub fn pointer_down(&mut self, store: &mut ElementStore, point: Point, additive: bool) -> bool {
        // A release we never saw still commits what was dragged
        if let GestureState::Dragging(_) = std::mem::take(&mut self.state) {
            store.end_batch();
        }

        let Some(id) = store.element_at(point) else {
            self.state = GestureState::Selecting(MarqueeRect::new(point));
            return false;
        };
        let Some(origin) = store.absolute_origin(id) else {
            return false;
        };

        let was_selected = store.is_selected(id);
        if additive {
            store.add_to_selection(id);
        } else if !was_selected {
            store.set_selected_elements([id]);
        }

        let followers = followers(store, id);
        let original_origins: HashMap<ElementId, Point> = std::iter::once(id)
            .chain(followers.iter().copied())
            .filter_map(|mid| store.get(mid).map(|e| (mid, e.origin())))
            .collect();

        let description = match followers.len() {
            0 => format!("Move {}", store.get(id).map_or("element", |e| e.display_name())),
            n => format!("Move {} elements", n + 1),
        };
        store.begin_batch(&description);
        log::debug!("Drag start {} with {} followers", id, followers.len());

        self.state = GestureState::Dragging(DragSession {
            element_id: id,
            grab_offset: point - origin,
            start_point: point,
            current_point: point,
            followers,
            original_origins,
            moved: false,
            deselect_on_click: additive && was_selected,
        });
        true
    }

    /// Continue a gesture.
    pub fn pointer_move(
        &mut self,
        store: &mut ElementStore,
        point: Point,
        settings: &CanvasSettings,
    ) {
        match &mut self.state {
            GestureState::Idle => {}
            GestureState::Selecting(marquee) => marquee.current = point,
            GestureState::Dragging(session) => {
                session.current_point = point;
                if point != session.start_point {
                    session.moved = true;
                }
                drag_to(store, session, point, settings);
            }
        }
    }

    /// Finish a gesture.
    pub fn pointer_up(
        &mut self,
        store: &mut ElementStore,
        point: Point,
        additive: bool,
        settings: &CanvasSettings,
    ) -> GestureOutcome {
        match std::mem::take(&mut self.state) {
            GestureState::Idle => GestureOutcome::None,
            GestureState::Selecting(mut marquee) => {
                marquee.current = point;
                finish_marquee(store, marquee, additive)
            }
            GestureState::Dragging(mut session) => {
                if point != session.current_point {
                    session.moved |= point != session.start_point;
                    drag_to(store, &session, point, settings);
                }
                let outcome = if session.moved {
                    drop_at(store, &session, point, settings)
                } else {
                    if session.deselect_on_click {
                        store.toggle_element_selection(session.element_id);
                    }
                    GestureOutcome::Clicked(session.element_id)
                };
                store.end_batch();
                outcome
            }
        }
    }

    /// Abandon the gesture, putting every dragged element back.
    pub fn cancel(&mut self, store: &mut ElementStore) {
        if let GestureState::Dragging(session) = std::mem::take(&mut self.state) {
            store.cancel_batch();
            log::debug!("Drag of {} cancelled", session.element_id);
        }
    }
}

/// Selected elements that move along with `grabbed`.
///
/// A selected container that is an ancestor of another selected element is
/// held fixed, and an element whose ancestor is already moving rides along
/// with it instead of being moved twice.
pub fn followers(store: &ElementStore, grabbed: ElementId) -> Vec<ElementId> {
    let mut selected = store.selected_ids();
    if !selected.contains(&grabbed) {
        selected.push(grabbed);
    }
    let movable: Vec<ElementId> = selected
        .iter()
        .copied()
        .filter(|&id| {
            !selected
                .iter()
                .any(|&other| other != id && store.is_ancestor(id, other))
        })
        .collect();
    let mut moving = vec![grabbed];
    moving.extend(movable.iter().copied().filter(|&id| id != grabbed));
    moving
        .iter()
        .copied()
        .filter(|&id| id != grabbed)
        .filter(|&id| !moving.iter().any(|&m| m != id && store.is_ancestor(m, id)))
        .collect()
}

/// Move the grabbed element towards `point` and shift the followers by the
/// delta it actually moved.
fn drag_to(
    store: &mut ElementStore,
    session: &DragSession,
    point: Point,
    settings: &CanvasSettings,
) {
    let id = session.element_id;
    let Some(element) = store.get(id) else {
        return;
    };
    let size = element.size();
    let frame = element
        .parent_id
        .and_then(|pid| store.get(pid))
        .map(|parent| parent.size());
    let frame_origin = store.frame_origin(element.parent_id);

    let mut local = point - session.grab_offset - frame_origin.to_vec2();
    if let Some(frame) = frame {
        local = geometry::clamp_origin(frame, local, size);
    }
    if settings.snap_to_grid {
        local = snap::snap_within(local, size, frame, settings.grid_size);
    }
    if let Err(err) = store.update_element(id, ElementUpdate::position(local.x, local.y)) {
        log::warn!("Drag update failed: {}", err);
        return;
    }

    if session.followers.is_empty() {
        return;
    }
    let delta = session.delta(store);
    let updates: Vec<_> = session
        .followers
        .iter()
        .filter_map(|&fid| {
            let original = session.original_origins.get(&fid)?;
            let target = *original + delta;
            Some((fid, ElementUpdate::position(target.x, target.y)))
        })
        .collect();
    if let Err(err) = store.apply_updates(updates, "Move") {
        log::warn!("Group drag failed: {}", err);
    }
}

/// Decide where a dragged element lands.
fn drop_at(
    store: &mut ElementStore,
    session: &DragSession,
    point: Point,
    settings: &CanvasSettings,
) -> GestureOutcome {
    let id = session.element_id;
    let current_parent = store.get(id).and_then(|e| e.parent_id);
    let target = store
        .containers_at(point)
        .into_iter()
        .find(|&c| c != id && !store.is_ancestor(id, c));

    match target {
        Some(parent_id) if Some(parent_id) != current_parent => {
            let container_origin = store.absolute_origin(parent_id).unwrap_or(Point::ZERO);
            let mut local = point - session.grab_offset - container_origin.to_vec2();
            if settings.snap_to_grid {
                local = snap::snap_to_grid(local, settings.grid_size).point;
            }
            match store.move_element(id, Some(parent_id), local + container_origin.to_vec2()) {
                Ok(true) => {
                    log::debug!("Dropped {} into {}", id, parent_id);
                    GestureOutcome::Reparented {
                        element_id: id,
                        parent_id,
                    }
                }
                Ok(false) => GestureOutcome::None,
                Err(err) => {
                    log::warn!("Drop rejected: {}", err);
                    GestureOutcome::Moved(id)
                }
            }
        }
        // Live dragging already kept the element inside its parent
        _ => GestureOutcome::Moved(id),
    }
}

fn finish_marquee(
    store: &mut ElementStore,
    marquee: MarqueeRect,
    additive: bool,
) -> GestureOutcome {
    if !marquee.is_meaningful() {
        if additive {
            return GestureOutcome::None;
        }
        store.clear_selection();
        return GestureOutcome::SelectionCleared;
    }
    let hits = store.elements_in_rect(marquee.to_rect());
    let count = hits.len();
    if additive {
        for id in hits {
            store.add_to_selection(id);
        }
    } else {
        store.set_selected_elements(hits);
    }
    GestureOutcome::Selected(count)
}
