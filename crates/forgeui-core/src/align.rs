//! Alignment and distribution of the selection.
//!
//! Computation happens in canvas coordinates because selected elements may
//! live in different containers. Each target position is converted back into
//! the element's own parent frame before it is handed to the store, which
//! clamps it like any other update.

use crate::element::{ElementId, ElementUpdate};
use crate::geometry::{EPSILON, approx_eq};
use crate::store::{ElementStore, StoreError};
use kurbo::{Point, Rect};
use std::fmt;
use thiserror::Error;

/// How to arrange the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlignMode {
    /// Left edges to the leftmost edge.
    Left,
    /// Right edges to the rightmost edge.
    Right,
    /// Top edges to the topmost edge.
    Top,
    /// Bottom edges to the lowest edge.
    Bottom,
    /// Centers to the average center.
    Center,
    /// Even vertical spacing.
    Vertical,
    /// Even horizontal spacing.
    Horizontal,
}

impl AlignMode {
    pub const ALL: [AlignMode; 7] = [
        AlignMode::Left,
        AlignMode::Right,
        AlignMode::Top,
        AlignMode::Bottom,
        AlignMode::Center,
        AlignMode::Vertical,
        AlignMode::Horizontal,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AlignMode::Left => "left",
            AlignMode::Right => "right",
            AlignMode::Top => "top",
            AlignMode::Bottom => "bottom",
            AlignMode::Center => "center",
            AlignMode::Vertical => "vertical",
            AlignMode::Horizontal => "horizontal",
        }
    }
}

impl fmt::Display for AlignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("Select at least two elements to align")]
    NotEnoughElements,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Passes allowed before a plan is considered unstable.
const MAX_PASSES: usize = 32;

/// A selected element during planning, in canvas coordinates.
#[derive(Debug, Clone, Copy)]
struct Item {
    id: ElementId,
    rect: Rect,
    /// Origins the store will accept without clamping. Unbounded for roots.
    range: Rect,
}

impl Item {
    fn holds(&self, origin: Point) -> bool {
        approx_eq(self.rect.x0, origin.x) && approx_eq(self.rect.y0, origin.y)
    }

    fn clamp(&self, origin: Point) -> Point {
        Point::new(
            origin.x.clamp(self.range.x0, self.range.x1),
            origin.y.clamp(self.range.y0, self.range.y1),
        )
    }
}

/// Compute the position updates for `mode` without applying them.
///
/// Every target is clamped into the element's parent before the shared
/// coordinate is settled, and the plan is repeated until it maps onto
/// itself. Aligning the result again therefore changes nothing. A selected
/// element inside another selected element moves with its ancestor and is
/// not arranged on its own. Elements already at their target get no entry.
pub fn plan_alignment(
    store: &ElementStore,
    mode: AlignMode,
) -> Result<Vec<(ElementId, ElementUpdate)>, AlignError> {
    let selected = store.selected_ids();
    let mut items: Vec<Item> = selected
        .iter()
        .copied()
        .filter(|&id| !selected.iter().any(|&other| other != id && store.is_ancestor(other, id)))
        .filter_map(|id| selection_item(store, id))
        .collect();
    if items.len() < 2 {
        return Err(AlignError::NotEnoughElements);
    }

    let mut settled = false;
    for _ in 0..MAX_PASSES {
        let targets = arrange(&items, mode);
        if items.iter().zip(&targets).all(|(item, &target)| item.holds(target)) {
            settled = true;
            break;
        }
        for (item, target) in items.iter_mut().zip(targets) {
            item.rect = item.rect.with_origin(target);
        }
    }
    if !settled {
        log::warn!("Alignment ({}) did not settle, leaving the selection in place", mode);
        return Ok(Vec::new());
    }

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let element = store.get(item.id)?;
            let local = item.rect.origin() - store.frame_origin(element.parent_id).to_vec2();
            if approx_eq(local.x, element.x) && approx_eq(local.y, element.y) {
                return None;
            }
            Some((item.id, ElementUpdate::position(local.x, local.y)))
        })
        .collect())
}

/// Align the selection as one undo step. Returns the number of elements
/// that moved.
pub fn align(store: &mut ElementStore, mode: AlignMode) -> Result<usize, AlignError> {
    let updates = plan_alignment(store, mode)?;
    if updates.is_empty() {
        return Ok(0);
    }
    let moved = store.apply_updates(updates, &format!("Align {}", mode))?;
    log::debug!("Aligned {} elements ({})", moved, mode);
    Ok(moved)
}

fn selection_item(store: &ElementStore, id: ElementId) -> Option<Item> {
    let element = store.get(id)?;
    let rect = store.absolute_bounds(id)?;
    let parent = element.parent_id.and_then(|pid| store.get(pid));
    let range = match parent {
        Some(parent) => {
            let origin = store.frame_origin(element.parent_id);
            let slack_x = (parent.width - element.width).max(0.0);
            let slack_y = (parent.height - element.height).max(0.0);
            Rect::new(origin.x, origin.y, origin.x + slack_x, origin.y + slack_y)
        }
        None => Rect::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::INFINITY),
    };
    Some(Item { id, rect, range })
}

/// One planning pass: the clamped target origin of every item, in order.
fn arrange(items: &[Item], mode: AlignMode) -> Vec<Point> {
    match mode {
        AlignMode::Left => {
            let min_x = fold(items, f64::INFINITY, |acc, r| acc.min(r.x0));
            map_targets(items, |r| Point::new(min_x, r.y0))
        }
        AlignMode::Right => {
            let max_x = fold(items, f64::NEG_INFINITY, |acc, r| acc.max(r.x1));
            map_targets(items, |r| Point::new(max_x - r.width(), r.y0))
        }
        AlignMode::Top => {
            let min_y = fold(items, f64::INFINITY, |acc, r| acc.min(r.y0));
            map_targets(items, |r| Point::new(r.x0, min_y))
        }
        AlignMode::Bottom => {
            let max_y = fold(items, f64::NEG_INFINITY, |acc, r| acc.max(r.y1));
            map_targets(items, |r| Point::new(r.x0, max_y - r.height()))
        }
        AlignMode::Center => {
            let cx = shared_center(items, Axis::Horizontal);
            let cy = shared_center(items, Axis::Vertical);
            map_targets(items, |r| Point::new(cx - r.width() / 2.0, cy - r.height() / 2.0))
        }
        AlignMode::Vertical => distribute(items, Axis::Vertical),
        AlignMode::Horizontal => distribute(items, Axis::Horizontal),
    }
}

fn fold(items: &[Item], init: f64, f: impl Fn(f64, &Rect) -> f64) -> f64 {
    items.iter().fold(init, |acc, item| f(acc, &item.rect))
}

fn map_targets(items: &[Item], f: impl Fn(&Rect) -> Point) -> Vec<Point> {
    items.iter().map(|item| item.clamp(f(&item.rect))).collect()
}

#[derive(Clone, Copy)]
enum Axis {
    Vertical,
    Horizontal,
}

impl Axis {
    fn start(self, r: &Rect) -> f64 {
        match self {
            Axis::Vertical => r.y0,
            Axis::Horizontal => r.x0,
        }
    }

    fn end(self, r: &Rect) -> f64 {
        match self {
            Axis::Vertical => r.y1,
            Axis::Horizontal => r.x1,
        }
    }

    fn coordinate(self, p: Point) -> f64 {
        match self {
            Axis::Vertical => p.y,
            Axis::Horizontal => p.x,
        }
    }

    fn with_start(self, r: &Rect, start: f64) -> Point {
        match self {
            Axis::Vertical => Point::new(r.x0, start),
            Axis::Horizontal => Point::new(start, r.y0),
        }
    }
}

/// The center every item is moved toward along `axis`.
///
/// Items that cannot reach it stop at the edge of their parent. The result
/// is the point where the clamped centers still average to the center
/// itself, taken nearest to the current average. Between two range bounds
/// that average is linear in the center, so the crossing is interpolated.
fn shared_center(items: &[Item], axis: Axis) -> f64 {
    let n = items.len() as f64;
    let ranges: Vec<(f64, f64)> = items
        .iter()
        .map(|item| {
            let half = (axis.end(&item.rect) - axis.start(&item.rect)) / 2.0;
            (axis.start(&item.range) + half, axis.end(&item.range) + half)
        })
        .collect();
    let offset = |c: f64| ranges.iter().map(|&(lo, hi)| c.clamp(lo, hi)).sum::<f64>() / n - c;

    let start = fold(items, 0.0, |acc, r| acc + (axis.start(r) + axis.end(r)) / 2.0) / n;
    let first = offset(start);
    if first.abs() <= EPSILON {
        return start;
    }
    let upward = first > 0.0;

    let mut bounds: Vec<f64> = ranges
        .iter()
        .flat_map(|&(lo, hi)| [lo, hi])
        .filter(|b| b.is_finite() && (*b > start) == upward && *b != start)
        .collect();
    bounds.sort_by(|a, b| a.total_cmp(b));
    if !upward {
        bounds.reverse();
    }

    let (mut prev, mut prev_offset) = (start, first);
    for bound in bounds {
        let here = offset(bound);
        if (upward && here <= 0.0) || (!upward && here >= 0.0) {
            return prev + (bound - prev) * prev_offset / (prev_offset - here);
        }
        prev = bound;
        prev_offset = here;
    }

    // Past every bound only unbounded items keep following
    let free = ranges
        .iter()
        .filter(|&&(lo, hi)| if upward { hi == f64::INFINITY } else { lo == f64::NEG_INFINITY })
        .count();
    let slope = free as f64 / n - 1.0;
    if slope >= 0.0 {
        return prev;
    }
    prev - prev_offset / slope
}

/// Even spacing along an axis. The first element (by leading edge) is the
/// anchor; every following one starts one gap after the previous one ends,
/// or as close to that as its parent allows. The last element keeps its
/// place, so the span runs from the first element's leading edge to the
/// trailing edge of the last one.
fn distribute(items: &[Item], axis: Axis) -> Vec<Point> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    // Stable, so ties keep paint order
    order.sort_by(|&a, &b| axis.start(&items[a].rect).total_cmp(&axis.start(&items[b].rect)));

    let first = axis.start(&items[order[0]].rect);
    let last = order.last().map_or(first, |&i| axis.end(&items[i].rect));
    let total: f64 = items.iter().map(|item| axis.end(&item.rect) - axis.start(&item.rect)).sum();
    let spacing = (last - first - total) / (items.len() - 1) as f64;

    let mut out: Vec<Point> = items.iter().map(|item| item.rect.origin()).collect();
    let mut cursor = first;
    for &i in &order[..order.len() - 1] {
        let rect = &items[i].rect;
        let target = items[i].clamp(axis.with_start(rect, cursor));
        out[i] = target;
        cursor = axis.coordinate(target) + axis.end(rect) - axis.start(rect) + spacing;
    }
    out
}
