//! Store mutations.
//!
//! Each public operation validates first, then runs inside a [`Transaction`]
//! that snapshots every record before it is touched. Committing diffs the
//! snapshots against the live records and records the result in history.

use super::history::{Command, ElementChange};
use super::{ElementStore, StoreError};
use crate::element::{
    Element, ElementId, ElementKind, ElementSpec, ElementUpdate, MAX_BORDER_WIDTH, clamp_unit,
    is_valid_name, normalize_name,
};
use crate::geometry;
use kurbo::{Point, Size};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Before-snapshots of the records touched by one operation.
#[derive(Debug, Default)]
pub(super) struct Transaction {
    touched: Vec<(ElementId, Option<Element>)>,
    seen: HashSet<ElementId>,
    /// Paint slots of removed elements, recorded before `order` changes.
    removed_slots: HashMap<ElementId, usize>,
}

impl Transaction {
    /// Snapshot `id` unless it was already snapshotted.
    pub(super) fn touch(&mut self, store: &ElementStore, id: ElementId) {
        if !self.seen.insert(id) {
            return;
        }
        let before = store.elements.get(&id).cloned();
        self.touched.push((id, before));
    }
}

fn reject<T>(err: StoreError) -> Result<T, StoreError> {
    log::warn!("Rejected: {}", err);
    Err(err)
}

impl ElementStore {
    /// Diff the transaction against the live tree and record it.
    ///
    /// Returns true if anything changed.
    pub(super) fn commit(&mut self, tx: Transaction, description: impl Into<String>) -> bool {
        let changes: Vec<ElementChange> = tx
            .touched
            .into_iter()
            .filter_map(|(id, before)| {
                let after = self.elements.get(&id).cloned();
                if before == after {
                    return None;
                }
                let slot = match (&before, &after) {
                    // New elements are appended, so search from the back
                    (None, Some(_)) => self.order.iter().rposition(|&o| o == id),
                    (Some(_), None) => tx.removed_slots.get(&id).copied(),
                    _ => None,
                };
                Some(ElementChange {
                    id,
                    before,
                    after,
                    slot,
                })
            })
            .collect();
        if changes.is_empty() {
            return false;
        }
        self.history.record(Command {
            description: description.into(),
            changes,
        });
        self.revision += 1;
        true
    }

    /// Put every touched record back. Only valid for transactions that did
    /// not add or remove elements.
    fn rollback(&mut self, tx: Transaction) {
        for (id, before) in tx.touched {
            if let Some(element) = before {
                self.elements.insert(id, element);
            }
        }
    }

    fn check_name(&self, name: &str, exclude: Option<ElementId>) -> Result<(), StoreError> {
        if name.is_empty() {
            return Ok(());
        }
        if !is_valid_name(name) {
            return reject(StoreError::InvalidName(name.to_string()));
        }
        if !self.validate_name(name, exclude) {
            return reject(StoreError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn check_parent(&self, parent_id: ElementId) -> Result<Size, StoreError> {
        match self.elements.get(&parent_id) {
            Some(parent) if parent.is_container => Ok(parent.size()),
            _ => reject(StoreError::NotAContainer(parent_id)),
        }
    }

    /// Create an element from a spec given in canvas coordinates.
    pub fn add_element(&mut self, spec: ElementSpec) -> Result<ElementId, StoreError> {
        let name = spec.name.filter(|n| !n.is_empty());
        if let Some(name) = name.as_deref() {
            self.check_name(name, None)?;
        }

        let size = geometry::clamp_size(Size::new(spec.width, spec.height));
        let frame_origin = self.frame_origin(spec.parent_id);
        let local =
            Point::new(finite_or(spec.x, 0.0), finite_or(spec.y, 0.0)) - frame_origin.to_vec2();
        let (origin, size) = match spec.parent_id {
            Some(parent_id) => {
                let frame = self.check_parent(parent_id)?;
                geometry::clamp_into(frame, local, size)
            }
            None if spec.kind.is_container() => (local, size),
            None => return reject(StoreError::MissingContainer(spec.kind)),
        };

        let id = Uuid::new_v4();
        let element = Element {
            id,
            kind: spec.kind,
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
            color: spec.color,
            border_color: spec.border_color,
            border_width: clamp_unit(spec.border_width, MAX_BORDER_WIDTH),
            opacity: clamp_unit(spec.opacity, 1.0),
            image_src: spec.image_src.filter(|src| !src.is_empty()),
            text: spec.text,
            name,
            min_value: spec.min_value,
            max_value: spec.max_value,
            value: spec.value,
            checked: spec.checked,
            parent_id: spec.parent_id,
            child_ids: Vec::new(),
            is_container: spec.kind.is_container(),
        };

        let mut tx = Transaction::default();
        tx.touch(self, id);
        if let Some(parent_id) = spec.parent_id {
            tx.touch(self, parent_id);
            if let Some(parent) = self.elements.get_mut(&parent_id) {
                parent.child_ids.push(id);
            }
        }
        self.elements.insert(id, element);
        self.order.push(id);
        self.commit(tx, format!("Add {}", spec.kind));
        log::debug!("Added {} {}", spec.kind, id);
        Ok(id)
    }

    /// Merge attributes into an element. `Ok(false)` if the id is unknown.
    pub fn update_element(
        &mut self,
        id: ElementId,
        update: ElementUpdate,
    ) -> Result<bool, StoreError> {
        let Some(element) = self.elements.get(&id) else {
            return Ok(false);
        };
        let description = format!("Update {}", element.display_name());
        let mut tx = Transaction::default();
        self.update_in(&mut tx, id, &update)?;
        self.commit(tx, description);
        Ok(true)
    }

    /// Apply a normalized name typed by the user.
    pub fn rename_element(&mut self, id: ElementId, raw: &str) -> Result<bool, StoreError> {
        self.update_element(id, ElementUpdate::name(normalize_name(raw)))
    }

    /// Apply several updates as one undo step.
    ///
    /// Either every update applies or none does. Unknown ids are skipped.
    /// Returns the number of elements that actually changed.
    pub fn apply_updates(
        &mut self,
        updates: Vec<(ElementId, ElementUpdate)>,
        description: &str,
    ) -> Result<usize, StoreError> {
        let mut tx = Transaction::default();
        for (id, update) in &updates {
            if !self.elements.contains_key(id) {
                continue;
            }
            if let Err(err) = self.update_in(&mut tx, *id, update) {
                self.rollback(tx);
                return Err(err);
            }
        }
        let changed = updates
            .iter()
            .filter(|(id, _)| {
                tx.touched
                    .iter()
                    .any(|(t, before)| t == id && before.as_ref() != self.elements.get(id))
            })
            .count();
        self.commit(tx, description);
        Ok(changed)
    }

    /// Validate and apply one update inside a transaction.
    ///
    /// Validation happens before anything is touched, so an error leaves
    /// this element unchanged.
    fn update_in(
        &mut self,
        tx: &mut Transaction,
        id: ElementId,
        update: &ElementUpdate,
    ) -> Result<(), StoreError> {
        let Some(current) = self.elements.get(&id) else {
            return Ok(());
        };
        if let Some(name) = update.name.as_deref() {
            self.check_name(name, Some(id))?;
        }

        let origin = Point::new(
            update.x.map_or(current.x, |x| finite_or(x, current.x)),
            update.y.map_or(current.y, |y| finite_or(y, current.y)),
        );
        let size = Size::new(
            update.width.map_or(current.width, geometry::clamp_dimension),
            update.height.map_or(current.height, geometry::clamp_dimension),
        );
        let (origin, size) = match current.parent_id.and_then(|pid| self.elements.get(&pid)) {
            Some(parent) => geometry::clamp_into(parent.size(), origin, size),
            None => (origin, size),
        };
        let resized = size != current.size();

        tx.touch(self, id);
        let Some(element) = self.elements.get_mut(&id) else {
            return Ok(());
        };
        element.x = origin.x;
        element.y = origin.y;
        element.width = size.width;
        element.height = size.height;
        update.apply_attributes(element);
        if let Some(name) = update.name.as_deref() {
            element.name = (!name.is_empty()).then(|| name.to_string());
        }
        let is_container = element.is_container;

        if resized && is_container {
            self.reclamp_children(tx, id);
        }
        Ok(())
    }

    /// Re-fit every descendant of a resized container into its parent.
    fn reclamp_children(&mut self, tx: &mut Transaction, id: ElementId) {
        let Some(frame) = self.elements.get(&id).map(|e| e.size()) else {
            return;
        };
        for child_id in self.children(id).to_vec() {
            tx.touch(self, child_id);
            let Some(child) = self.elements.get_mut(&child_id) else {
                continue;
            };
            let (origin, size) = geometry::clamp_into(frame, child.origin(), child.size());
            let resized = size != child.size();
            child.x = origin.x;
            child.y = origin.y;
            child.width = size.width;
            child.height = size.height;
            if resized && child.is_container {
                self.reclamp_children(tx, child_id);
            }
        }
    }

    /// Delete an element and its whole subtree.
    ///
    /// Returns the number of removed elements, 0 for an unknown id.
    pub fn delete_element(&mut self, id: ElementId) -> usize {
        let Some(element) = self.elements.get(&id) else {
            return 0;
        };
        let description = format!("Delete {}", element.display_name());
        self.remove_subtrees(&[id], description)
    }

    /// Delete every selected element with its subtree.
    pub fn delete_selected(&mut self) -> usize {
        let selected = self.selected_ids();
        self.remove_subtrees(&selected, "Delete selection")
    }

    /// Remove every element.
    pub fn clear(&mut self) -> usize {
        let roots: Vec<ElementId> = self.roots().map(|e| e.id).collect();
        self.remove_subtrees(&roots, "Clear canvas")
    }

    fn remove_subtrees(&mut self, ids: &[ElementId], description: impl Into<String>) -> usize {
        // A selected descendant goes away with its ancestor
        let roots: Vec<ElementId> = ids
            .iter()
            .copied()
            .filter(|&id| self.elements.contains_key(&id))
            .filter(|&id| !ids.iter().any(|&other| other != id && self.is_ancestor(other, id)))
            .collect();
        if roots.is_empty() {
            return 0;
        }

        // Snapshot everything before removing anything so that paint slots
        // refer to the original order
        let mut tx = Transaction::default();
        let mut doomed: HashSet<ElementId> = HashSet::new();
        for &root in &roots {
            for id in self.subtree(root) {
                tx.touch(self, id);
                doomed.insert(id);
            }
            if let Some(parent_id) = self.elements.get(&root).and_then(|e| e.parent_id) {
                tx.touch(self, parent_id);
            }
        }

        for &root in &roots {
            let parent_id = self.elements.get(&root).and_then(|e| e.parent_id);
            if let Some(parent) = parent_id.and_then(|pid| self.elements.get_mut(&pid)) {
                parent.child_ids.retain(|&c| c != root);
            }
        }
        tx.removed_slots = self
            .order
            .iter()
            .enumerate()
            .filter(|(_, id)| doomed.contains(id))
            .map(|(slot, &id)| (id, slot))
            .collect();
        self.elements.retain(|id, _| !doomed.contains(id));
        self.order.retain(|id| !doomed.contains(id));
        self.selection.retain(|id| !doomed.contains(id));

        self.commit(tx, description);
        log::debug!("Removed {} elements", doomed.len());
        doomed.len()
    }

    /// Re-parent an element, placing it at `absolute_origin`.
    ///
    /// `new_parent` of `None` moves to the root, which only containers may
    /// do. The position is converted into the new parent's frame and
    /// clamped. `Ok(false)` if the element is unknown.
    pub fn move_element(
        &mut self,
        id: ElementId,
        new_parent: Option<ElementId>,
        absolute_origin: Point,
    ) -> Result<bool, StoreError> {
        let Some(element) = self.elements.get(&id) else {
            return Ok(false);
        };
        let kind: ElementKind = element.kind;
        let old_parent = element.parent_id;
        let size = element.size();
        let description = format!("Move {}", element.display_name());

        let local = absolute_origin - self.frame_origin(new_parent).to_vec2();
        let (origin, size) = match new_parent {
            Some(parent_id) => {
                if parent_id == id || self.is_ancestor(id, parent_id) {
                    return reject(StoreError::Cycle);
                }
                let frame = self.check_parent(parent_id)?;
                geometry::clamp_into(frame, local, size)
            }
            None if kind.is_container() => (local, size),
            None => return reject(StoreError::MissingContainer(kind)),
        };

        let mut tx = Transaction::default();
        tx.touch(self, id);
        if old_parent != new_parent {
            if let Some(old) = old_parent {
                tx.touch(self, old);
                if let Some(parent) = self.elements.get_mut(&old) {
                    parent.child_ids.retain(|&c| c != id);
                }
            }
            if let Some(new) = new_parent {
                tx.touch(self, new);
                if let Some(parent) = self.elements.get_mut(&new) {
                    parent.child_ids.push(id);
                }
            }
        }
        let resized = match self.elements.get_mut(&id) {
            Some(element) => {
                let resized = size != element.size();
                element.parent_id = new_parent;
                element.x = origin.x;
                element.y = origin.y;
                element.width = size.width;
                element.height = size.height;
                resized && element.is_container
            }
            None => false,
        };
        if resized {
            self.reclamp_children(&mut tx, id);
        }
        self.commit(tx, description);
        Ok(true)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}
