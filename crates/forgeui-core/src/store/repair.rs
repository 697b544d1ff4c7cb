//! Loading untrusted element lists into the store.

use super::ElementStore;
use crate::element::{Element, ElementId, is_valid_name};
use crate::geometry;
use kurbo::Size;
use std::collections::{HashMap, HashSet};

impl ElementStore {
    /// Snapshot of the tree in paint order, for persistence.
    pub fn export_elements(&self) -> Vec<Element> {
        self.elements().cloned().collect()
    }

    /// Replace the whole tree with `elements`.
    ///
    /// The input is treated as untrusted and repaired so that every tree
    /// invariant holds afterwards:
    /// - duplicate ids keep their first occurrence
    /// - `is_container` is re-derived from the kind and sizes are clamped
    /// - parents that are missing or not containers are dropped, as are
    ///   links that would close a cycle
    /// - leaves left at the root are removed together with their subtrees
    /// - `child_ids` is rebuilt from `parent_id`
    /// - positions are clamped into parents, top-down
    /// - invalid or duplicate names are cleared
    ///
    /// History and selection are cleared. Returns the number of records
    /// that were dropped.
    pub fn replace_elements(&mut self, elements: Vec<Element>) -> usize {
        let input_len = elements.len();

        let mut order: Vec<ElementId> = Vec::with_capacity(input_len);
        let mut map: HashMap<ElementId, Element> = HashMap::with_capacity(input_len);
        for mut element in elements {
            if map.contains_key(&element.id) {
                continue;
            }
            element.is_container = element.kind.is_container();
            let size = geometry::clamp_size(element.size());
            element.width = size.width;
            element.height = size.height;
            if !element.x.is_finite() {
                element.x = 0.0;
            }
            if !element.y.is_finite() {
                element.y = 0.0;
            }
            element.child_ids.clear();
            order.push(element.id);
            map.insert(element.id, element);
        }

        // Drop parent links to missing elements or non-containers
        let containers: HashSet<ElementId> = map
            .values()
            .filter(|e| e.is_container)
            .map(|e| e.id)
            .collect();
        for element in map.values_mut() {
            if let Some(parent_id) = element.parent_id {
                if parent_id == element.id || !containers.contains(&parent_id) {
                    element.parent_id = None;
                }
            }
        }

        // Break cycles: walk each chain and cut the link that revisits a node
        for &id in &order {
            let mut seen = HashSet::new();
            let mut current = id;
            seen.insert(current);
            while let Some(parent_id) = map.get(&current).and_then(|e| e.parent_id) {
                if !seen.insert(parent_id) {
                    if let Some(element) = map.get_mut(&current) {
                        element.parent_id = None;
                    }
                    break;
                }
                current = parent_id;
            }
        }

        // Leaves cannot live at the root; remove them and everything below
        let mut doomed: HashSet<ElementId> = map
            .values()
            .filter(|e| !e.is_container && e.parent_id.is_none())
            .map(|e| e.id)
            .collect();
        loop {
            let orphans: Vec<ElementId> = map
                .values()
                .filter(|e| !doomed.contains(&e.id))
                .filter(|e| e.parent_id.is_some_and(|pid| doomed.contains(&pid)))
                .map(|e| e.id)
                .collect();
            if orphans.is_empty() {
                break;
            }
            doomed.extend(orphans);
        }
        map.retain(|id, _| !doomed.contains(id));
        order.retain(|id| !doomed.contains(id));

        for &id in &order {
            if let Some(parent_id) = map.get(&id).and_then(|e| e.parent_id) {
                if let Some(parent) = map.get_mut(&parent_id) {
                    parent.child_ids.push(id);
                }
            }
        }

        // Clamp top-down so each parent is final before its children
        let mut stack: Vec<(ElementId, Option<Size>)> = order
            .iter()
            .filter(|id| map.get(id).is_some_and(|e| e.parent_id.is_none()))
            .map(|&id| (id, None))
            .collect();
        while let Some((id, frame)) = stack.pop() {
            let Some(element) = map.get_mut(&id) else {
                continue;
            };
            if let Some(frame) = frame {
                let (origin, size) = geometry::clamp_into(frame, element.origin(), element.size());
                element.x = origin.x;
                element.y = origin.y;
                element.width = size.width;
                element.height = size.height;
            }
            let size = element.size();
            stack.extend(element.child_ids.iter().map(|&c| (c, Some(size))));
        }

        let mut names: HashSet<String> = HashSet::new();
        for &id in &order {
            if let Some(element) = map.get_mut(&id) {
                let keep = element
                    .name
                    .as_deref()
                    .is_some_and(|n| is_valid_name(n) && !names.contains(n));
                if keep {
                    if let Some(name) = element.name.clone() {
                        names.insert(name);
                    }
                } else {
                    element.name = None;
                }
            }
        }

        let dropped = input_len - order.len();
        if dropped > 0 {
            log::warn!("Dropped {} invalid elements while loading", dropped);
        }

        self.elements = map;
        self.order = order;
        self.selection.clear();
        self.history.clear();
        self.revision += 1;
        dropped
    }
}
