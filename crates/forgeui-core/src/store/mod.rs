//! The element store: the authoritative design tree and selection.
//!
//! Elements live in a flat map keyed by id, with parallel `parent_id` /
//! `child_ids` fields expressing the hierarchy and a separate paint order.
//! All mutations go through the store so that both sides of the hierarchy
//! are always edited together and the containment invariants hold after
//! every call, including rejected ones.

mod edit;
mod history;
mod repair;

pub use history::{Command, ElementChange, History, MAX_HISTORY};

use crate::element::{Element, ElementId, ElementKind};
use crate::geometry::{self, EPSILON};
use kurbo::{Point, Rect};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Validation failures reported by store mutations.
///
/// The `Display` text is suitable for showing to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0} must be inside a container")]
    MissingContainer(ElementKind),
    #[error("Element {0} is not a container")]
    NotAContainer(ElementId),
    #[error("Name \"{0}\" is already taken")]
    DuplicateName(String),
    #[error(
        "Invalid name \"{0}\": must start with a letter or underscore and contain only letters, numbers, or underscores"
    )]
    InvalidName(String),
    #[error("An element cannot be moved inside itself")]
    Cycle,
}

/// A broken tree invariant, reported by [`ElementStore::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// Owns the working element tree of the active file.
#[derive(Debug, Clone, Default)]
pub struct ElementStore {
    elements: HashMap<ElementId, Element>,
    /// Paint order, back to front.
    order: Vec<ElementId>,
    selection: HashSet<ElementId>,
    history: History,
    revision: u64,
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter bumped by every observable change (tree or selection).
    ///
    /// Views compare it against the value they last rendered.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    /// All elements in paint order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.order.iter().filter_map(|id| self.elements.get(id))
    }

    /// Root-level elements in paint order.
    pub fn roots(&self) -> impl Iterator<Item = &Element> {
        self.elements().filter(|e| e.parent_id.is_none())
    }

    /// Elements in render order: each root followed depth-first by its
    /// children, so containers are always drawn below their content.
    pub fn render_order(&self) -> Vec<&Element> {
        let mut out = Vec::with_capacity(self.elements.len());
        let mut stack: Vec<ElementId> = self.roots().map(|e| e.id).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            if let Some(element) = self.elements.get(&id) {
                out.push(element);
                stack.extend(element.child_ids.iter().rev().copied());
            }
        }
        out
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.elements
            .get(&id)
            .map(|e| e.child_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Ancestors of an element, nearest first.
    pub fn ancestors(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut current = self.elements.get(&id).and_then(|e| e.parent_id);
        while let Some(parent_id) = current {
            out.push(parent_id);
            current = self.elements.get(&parent_id).and_then(|e| e.parent_id);
        }
        out
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: ElementId, id: ElementId) -> bool {
        let mut current = self.elements.get(&id).and_then(|e| e.parent_id);
        while let Some(parent_id) = current {
            if parent_id == ancestor {
                return true;
            }
            current = self.elements.get(&parent_id).and_then(|e| e.parent_id);
        }
        false
    }

    /// Number of ancestors.
    pub fn depth(&self, id: ElementId) -> usize {
        self.ancestors(id).len()
    }

    /// All descendants of an element, depth-first, excluding the element.
    pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = self.subtree(id);
        if !out.is_empty() {
            out.remove(0);
        }
        out
    }

    pub fn descendant_count(&self, id: ElementId) -> usize {
        self.descendants(id).len()
    }

    /// The element followed by its descendants, depth-first.
    fn subtree(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        if !self.elements.contains_key(&id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(element) = self.elements.get(&current) {
                stack.extend(element.child_ids.iter().rev().copied());
            }
        }
        out
    }

    /// Top-left corner of an element in canvas coordinates.
    pub fn absolute_origin(&self, id: ElementId) -> Option<Point> {
        let mut element = self.elements.get(&id)?;
        let mut origin = element.origin();
        while let Some(parent_id) = element.parent_id {
            match self.elements.get(&parent_id) {
                Some(parent) => {
                    origin += parent.origin().to_vec2();
                    element = parent;
                }
                None => break,
            }
        }
        Some(origin)
    }

    /// Bounds of an element in canvas coordinates.
    pub fn absolute_bounds(&self, id: ElementId) -> Option<Rect> {
        let element = self.elements.get(&id)?;
        let origin = self.absolute_origin(id)?;
        Some(Rect::from_origin_size(origin, element.size()))
    }

    /// Canvas-space origin of the frame an element with this parent lives in.
    pub(crate) fn frame_origin(&self, parent_id: Option<ElementId>) -> Point {
        parent_id
            .and_then(|pid| self.absolute_origin(pid))
            .unwrap_or(Point::ZERO)
    }

    /// The deepest element under a canvas point; ties go to the topmost.
    pub fn element_at(&self, point: Point) -> Option<ElementId> {
        self.hits(point, |_| true).into_iter().next()
    }

    /// Containers under a canvas point, innermost first.
    pub fn containers_at(&self, point: Point) -> Vec<ElementId> {
        self.hits(point, |e| e.is_container)
    }

    /// Elements under `point` matching `filter`, deepest first, then
    /// front-to-back.
    fn hits(&self, point: Point, filter: impl Fn(&Element) -> bool) -> Vec<ElementId> {
        let mut hits: Vec<(usize, usize, ElementId)> = self
            .order
            .iter()
            .enumerate()
            .filter_map(|(index, &id)| {
                let element = self.elements.get(&id)?;
                if !filter(element) {
                    return None;
                }
                let bounds = self.absolute_bounds(id)?;
                geometry::contains_point(bounds, point).then(|| (self.depth(id), index, id))
            })
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        hits.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Elements whose canvas bounds overlap `rect`, in paint order.
    pub fn elements_in_rect(&self, rect: Rect) -> Vec<ElementId> {
        self.order
            .iter()
            .copied()
            .filter(|&id| {
                self.absolute_bounds(id)
                    .map(|bounds| geometry::intersects(bounds, rect))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Whether `name` is unused by every element other than `exclude`.
    pub fn validate_name(&self, name: &str, exclude: Option<ElementId>) -> bool {
        if name.is_empty() {
            return true;
        }
        !self
            .elements
            .values()
            .any(|e| e.name.as_deref() == Some(name) && Some(e.id) != exclude)
    }

    // --- Selection -------------------------------------------------------

    /// Replace the selection. Unknown ids are kept but have no effect.
    pub fn set_selected_elements(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.selection = ids.into_iter().collect();
        self.revision += 1;
    }

    /// Add an id to the selection, or remove it if already selected.
    pub fn toggle_element_selection(&mut self, id: ElementId) {
        if !self.selection.remove(&id) {
            self.selection.insert(id);
        }
        self.revision += 1;
    }

    pub fn add_to_selection(&mut self, id: ElementId) {
        if self.selection.insert(id) {
            self.revision += 1;
        }
    }

    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.revision += 1;
        }
    }

    pub fn select_all(&mut self) {
        self.set_selected_elements(self.order.clone());
    }

    pub fn is_selected(&self, id: ElementId) -> bool {
        self.selection.contains(&id)
    }

    /// The raw selection set.
    pub fn selection(&self) -> &HashSet<ElementId> {
        &self.selection
    }

    /// Selected ids that exist in the tree, in paint order.
    pub fn selected_ids(&self) -> Vec<ElementId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.selection.contains(id))
            .collect()
    }

    // --- Invariants ------------------------------------------------------

    /// Verify the five tree invariants.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let fail = |msg: String| Err(InvariantViolation(msg));

        if self.order.len() != self.elements.len() {
            return fail(format!(
                "paint order has {} ids for {} elements",
                self.order.len(),
                self.elements.len()
            ));
        }

        let mut names: HashSet<&str> = HashSet::new();
        for element in self.elements.values() {
            let id = element.id;
            if element.is_container != element.kind.is_container() {
                return fail(format!("{id}: is_container does not match kind"));
            }

            match element.parent_id {
                None if !element.is_container => {
                    return fail(format!("{id}: leaf at root"));
                }
                None => {}
                Some(parent_id) => {
                    let Some(parent) = self.elements.get(&parent_id) else {
                        return fail(format!("{id}: dangling parent {parent_id}"));
                    };
                    if !parent.is_container {
                        return fail(format!("{id}: parent {parent_id} is not a container"));
                    }
                    if parent.child_ids.iter().filter(|&&c| c == id).count() != 1 {
                        return fail(format!("{id}: not listed exactly once by its parent"));
                    }
                    let frame = Rect::from_origin_size(Point::ZERO, parent.size());
                    if element.x < -EPSILON
                        || element.y < -EPSILON
                        || !geometry::contains_rect(frame, element.local_bounds())
                    {
                        return fail(format!("{id}: outside parent bounds"));
                    }
                }
            }

            if !element.child_ids.is_empty() && !element.is_container {
                return fail(format!("{id}: leaf with children"));
            }
            for child_id in &element.child_ids {
                match self.elements.get(child_id) {
                    Some(child) if child.parent_id == Some(id) => {}
                    _ => return fail(format!("{id}: lists {child_id} which is not its child")),
                }
            }

            if let Some(name) = element.name.as_deref() {
                if !name.is_empty() && !names.insert(name) {
                    return fail(format!("duplicate name {name}"));
                }
            }
        }

        // Every element must reach a root without revisiting a node
        for &id in self.elements.keys() {
            let mut seen = HashSet::new();
            let mut current = Some(id);
            while let Some(node) = current {
                if !seen.insert(node) {
                    return fail(format!("{id}: cycle in parent chain"));
                }
                current = self.elements.get(&node).and_then(|e| e.parent_id);
            }
        }

        Ok(())
    }
}
