//! Position numbering and reordering of line items.
//!
//! Top-level items (standalone items and group headers) are numbered
//! `1, 2, 3, ...`; members display as `"{header}.{NN}"` where `NN` is their
//! 1-based rank among earlier members of the same group.

use std::collections::HashMap;
use std::ops::Range;

use orderflow_core::{GroupId, LineItemId};

use crate::line_item::LineItem;

/// Recompute `position` and `display_position` for every item.
///
/// Idempotent. A member whose header is missing keeps its raw `position` and
/// displays it bare.
pub fn renumber(items: &mut [LineItem]) {
    let mut header_positions: HashMap<GroupId, u32> = HashMap::new();
    let mut next = 0u32;

    for item in items.iter_mut().filter(|item| item.is_top_level()) {
        next += 1;
        item.position = next;
        item.display_position = next.to_string();
        if let Some(header) = item.header() {
            header_positions.insert(header.group_id, next);
        }
    }

    let mut members_seen: HashMap<GroupId, u32> = HashMap::new();
    for item in items.iter_mut() {
        let Some(group_id) = item.member_of() else {
            continue;
        };
        let rank = members_seen.entry(group_id).or_insert(0);
        *rank += 1;

        match header_positions.get(&group_id) {
            Some(&header) => {
                item.position = header;
                item.display_position = format!("{header}.{:02}", *rank);
            }
            None => {
                tracing::warn!(item_id = %item.id, %group_id, "group member without header");
                item.display_position = item.position.to_string();
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Move an item one step. Returns `false` (and leaves `items` untouched) when
/// the move is not allowed.
///
/// - standalone item: swaps with the neighbouring top-level unit;
/// - group header: moves together with its contiguous members;
/// - group member: swaps only with an adjacent member of the same group.
pub fn move_item(items: &mut [LineItem], item_id: LineItemId, direction: Direction) -> bool {
    let Some(index) = items.iter().position(|item| item.id == item_id) else {
        return false;
    };

    if let Some(group_id) = items[index].member_of() {
        let neighbour = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => Some(index + 1).filter(|&n| n < items.len()),
        };
        return match neighbour {
            Some(n) if items[n].member_of() == Some(group_id) => {
                items.swap(index, n);
                true
            }
            _ => false,
        };
    }

    let units = units(items);
    let Some(unit) = units.iter().position(|u| u.start == index) else {
        return false;
    };
    let (first, second) = match direction {
        Direction::Up if unit > 0 => (&units[unit - 1], &units[unit]),
        Direction::Down if unit + 1 < units.len() => (&units[unit], &units[unit + 1]),
        _ => return false,
    };
    items[first.start..second.end].rotate_left(first.len());
    true
}

pub fn move_up(items: &mut [LineItem], item_id: LineItemId) -> bool {
    move_item(items, item_id, Direction::Up)
}

pub fn move_down(items: &mut [LineItem], item_id: LineItemId) -> bool {
    move_item(items, item_id, Direction::Down)
}

/// Split the list into movable units: a header plus the members directly
/// following it, or a single item.
fn units(items: &[LineItem]) -> Vec<Range<usize>> {
    let mut units = Vec::new();
    let mut start = 0;
    while start < items.len() {
        let mut end = start + 1;
        if let Some(header) = items[start].header() {
            while end < items.len() && items[end].member_of() == Some(header.group_id) {
                end += 1;
            }
        }
        units.push(start..end);
        start = end;
    }
    units
}
