//! Undo/redo command stack.
//!
//! Every store mutation is recorded as a [`Command`]: the before and after
//! state of each element record it touched. Undo re-applies the "before"
//! side, redo the "after" side. Only touched records are captured, so the
//! cost of a command is proportional to what changed, not to the tree.
//!
//! Drag gestures run inside a batch: the changes of every pointer move are
//! merged per element, keeping the earliest "before" and the latest "after",
//! so the whole gesture becomes one undo step.

use super::ElementStore;
use crate::element::{Element, ElementId};
use std::collections::HashMap;

/// Maximum number of undo steps to keep.
pub const MAX_HISTORY: usize = 100;

/// The before/after state of one element record.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementChange {
    pub id: ElementId,
    /// `None` when the element did not exist before the command.
    pub before: Option<Element>,
    /// `None` when the element was removed by the command.
    pub after: Option<Element>,
    /// Paint-order slot, recorded when the element was added or removed.
    pub slot: Option<usize>,
}

impl ElementChange {
    fn is_noop(&self) -> bool {
        self.before == self.after
    }

    fn target(&self, forward: bool) -> Option<&Element> {
        if forward {
            self.after.as_ref()
        } else {
            self.before.as_ref()
        }
    }
}

/// A reversible, described unit of change.
#[derive(Debug, Clone)]
pub struct Command {
    pub description: String,
    pub changes: Vec<ElementChange>,
}

#[derive(Debug, Clone)]
struct Batch {
    depth: usize,
    description: String,
    changes: Vec<ElementChange>,
    positions: HashMap<ElementId, usize>,
}

impl Batch {
    fn merge(&mut self, change: ElementChange) {
        match self.positions.get(&change.id) {
            Some(&pos) => {
                let existing = &mut self.changes[pos];
                existing.after = change.after;
                if existing.slot.is_none() {
                    existing.slot = change.slot;
                }
            }
            None => {
                self.positions.insert(change.id, self.changes.len());
                self.changes.push(change);
            }
        }
    }
}

/// Undo and redo stacks with batch grouping.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    max_depth: usize,
    batch: Option<Batch>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
            batch: None,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Description of the step `undo` would revert.
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|c| c.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.description.as_str())
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch = None;
    }

    pub(crate) fn record(&mut self, command: Command) {
        if let Some(batch) = self.batch.as_mut() {
            for change in command.changes {
                batch.merge(change);
            }
            return;
        }
        self.push(command);
    }

    fn push(&mut self, command: Command) {
        self.undo_stack.push(command);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    pub(crate) fn begin_batch(&mut self, description: &str) {
        match self.batch.as_mut() {
            Some(batch) => batch.depth += 1,
            None => {
                self.batch = Some(Batch {
                    depth: 1,
                    description: description.to_string(),
                    changes: Vec::new(),
                    positions: HashMap::new(),
                });
            }
        }
    }

    /// Close one batch level. When the outermost level closes, the merged
    /// changes are pushed as a single command. Returns true if a command was
    /// pushed.
    pub(crate) fn end_batch(&mut self) -> bool {
        let Some(batch) = self.batch.as_mut() else {
            return false;
        };
        batch.depth -= 1;
        if batch.depth > 0 {
            return false;
        }
        let Some(batch) = self.batch.take() else {
            return false;
        };
        let changes: Vec<_> = batch.changes.into_iter().filter(|c| !c.is_noop()).collect();
        if changes.is_empty() {
            return false;
        }
        self.push(Command {
            description: batch.description,
            changes,
        });
        true
    }

    /// Drop the open batch and hand back its changes so they can be reverted.
    pub(crate) fn take_batch(&mut self) -> Option<Vec<ElementChange>> {
        self.batch.take().map(|b| b.changes)
    }

    fn pop_undo(&mut self) -> Option<Command> {
        self.undo_stack.pop()
    }

    fn pop_redo(&mut self) -> Option<Command> {
        self.redo_stack.pop()
    }
}

impl ElementStore {
    /// Revert the most recent command. Returns its description.
    pub fn undo(&mut self) -> Option<String> {
        if self.history.is_batching() {
            return None;
        }
        let command = self.history.pop_undo()?;
        self.apply_changes(&command.changes, false);
        log::debug!("Undo: {}", command.description);
        let description = command.description.clone();
        self.history.redo_stack.push(command);
        Some(description)
    }

    /// Re-apply the most recently undone command. Returns its description.
    pub fn redo(&mut self) -> Option<String> {
        if self.history.is_batching() {
            return None;
        }
        let command = self.history.pop_redo()?;
        self.apply_changes(&command.changes, true);
        log::debug!("Redo: {}", command.description);
        let description = command.description.clone();
        self.history.undo_stack.push(command);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo() && !self.history.is_batching()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo() && !self.history.is_batching()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Group the following mutations into one undo step until
    /// [`end_batch`](Self::end_batch). Batches nest.
    pub fn begin_batch(&mut self, description: &str) {
        self.history.begin_batch(description);
    }

    pub fn end_batch(&mut self) -> bool {
        self.history.end_batch()
    }

    /// Abandon the open batch, reverting everything it changed.
    /// Returns false if no batch was open.
    pub fn cancel_batch(&mut self) -> bool {
        match self.history.take_batch() {
            Some(changes) => {
                self.apply_changes(&changes, false);
                true
            }
            None => false,
        }
    }

    /// Apply one side of a change set to the tree.
    ///
    /// Removals happen first, then records present on both sides are
    /// overwritten in place, then missing records are re-inserted at their
    /// recorded slots in ascending order, which restores the original paint
    /// order.
    pub(super) fn apply_changes(&mut self, changes: &[ElementChange], forward: bool) {
        let removed: Vec<ElementId> = changes
            .iter()
            .filter(|c| c.target(forward).is_none())
            .map(|c| c.id)
            .collect();
        if !removed.is_empty() {
            for id in &removed {
                self.elements.remove(id);
                self.selection.remove(id);
            }
            self.order.retain(|id| !removed.contains(id));
        }

        let mut inserts: Vec<(usize, &Element)> = Vec::new();
        for change in changes {
            let Some(target) = change.target(forward) else {
                continue;
            };
            match self.elements.get_mut(&change.id) {
                Some(existing) => *existing = target.clone(),
                None => inserts.push((change.slot.unwrap_or(usize::MAX), target)),
            }
        }
        inserts.sort_by_key(|(slot, _)| *slot);
        for (slot, element) in inserts {
            let slot = slot.min(self.order.len());
            self.order.insert(slot, element.id);
            self.elements.insert(element.id, element.clone());
        }

        self.revision += 1;
    }
}
