//! Banner position arithmetic.
//!
//! Positions are 1-based and contiguous. The functions here only compute which
//! rows change; the banner service applies the result inside one transaction.

use uuid::Uuid;

/// Stored position of one banner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub id: Uuid,
    pub position: i32,
}

impl Slot {
    pub fn new(id: Uuid, position: i32) -> Self {
        Self { id, position }
    }
}

/// New position for one banner
pub type PositionUpdate = Slot;

/// Position for a banner appended after `slots`
pub fn next_position(slots: &[Slot]) -> i32 {
    slots.iter().map(|s| s.position).max().unwrap_or(0).max(0) + 1
}

/// Renumber to 1..n keeping the order of `slots`.
///
/// Callers pass slots sorted by (position, created_at).
pub fn renumber(slots: &[Slot]) -> Vec<PositionUpdate> {
    slots
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            let position = index as i32 + 1;
            (slot.position != position).then_some(Slot::new(slot.id, position))
        })
        .collect()
}

fn is_contiguous(sorted: &[Slot]) -> bool {
    sorted
        .iter()
        .enumerate()
        .all(|(index, slot)| slot.position == index as i32 + 1)
}

/// Move banner `id` to `new_position`.
///
/// The target is clamped to `[1, n]`. Moving down (old < new) decrements the
/// banners in `(old, new]`; moving up increments those in `[new, old)`. Stored
/// positions with gaps or duplicates are first compacted to 1..n. Returns
/// `None` when `id` is unknown.
pub fn plan_move(slots: &[Slot], id: Uuid, new_position: i32) -> Option<Vec<PositionUpdate>> {
    let mut sorted = slots.to_vec();
    sorted.sort_by_key(|s| s.position);

    let old_position = if is_contiguous(&sorted) {
        sorted.iter().find(|s| s.id == id)?.position
    } else {
        sorted.iter().position(|s| s.id == id)? as i32 + 1
    };

    let count = sorted.len() as i32;
    let target = new_position.clamp(1, count);

    let updates = sorted
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            let current = index as i32 + 1;
            let next = if slot.id == id {
                target
            } else if old_position < target && current > old_position && current <= target {
                current - 1
            } else if old_position > target && current >= target && current < old_position {
                current + 1
            } else {
                current
            };

            (next != slot.position).then_some(Slot::new(slot.id, next))
        })
        .collect();

    Some(updates)
}

/// Shift the banners after a deleted one up by one
pub fn plan_delete(slots: &[Slot], deleted_position: i32) -> Vec<PositionUpdate> {
    slots
        .iter()
        .filter(|s| s.position > deleted_position)
        .map(|s| Slot::new(s.id, s.position - 1))
        .collect()
}

/// Apply updates to a slot list
#[cfg(test)]
fn apply(slots: &[Slot], updates: &[PositionUpdate]) -> Vec<Slot> {
    let mut result: Vec<Slot> = slots
        .iter()
        .map(|slot| {
            updates
                .iter()
                .find(|u| u.id == slot.id)
                .copied()
                .unwrap_or(*slot)
        })
        .collect();
    result.sort_by_key(|s| s.position);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn slots(n: usize) -> Vec<Slot> {
        (0..n).map(|i| Slot::new(Uuid::new_v4(), i as i32 + 1)).collect()
    }

    fn order(slots: &[Slot]) -> Vec<Uuid> {
        slots.iter().map(|s| s.id).collect()
    }

    fn assert_contiguous(slots: &[Slot]) {
        let positions: Vec<i32> = slots.iter().map(|s| s.position).collect();
        let expected: Vec<i32> = (1..=slots.len() as i32).collect();
        assert_eq!(positions, expected);
    }

    #[test]
    fn test_move_down_shifts_range_up() {
        let s = slots(5);
        let updates = plan_move(&s, s[1].id, 4).unwrap();
        let result = apply(&s, &updates);

        assert_contiguous(&result);
        assert_eq!(order(&result), vec![s[0].id, s[2].id, s[3].id, s[1].id, s[4].id]);
        // Banners outside (2, 4] keep their rows untouched
        assert_eq!(updates.len(), 3);
    }

    #[test]
    fn test_move_up_shifts_range_down() {
        let s = slots(5);
        let updates = plan_move(&s, s[4].id, 2).unwrap();
        let result = apply(&s, &updates);

        assert_contiguous(&result);
        assert_eq!(order(&result), vec![s[0].id, s[4].id, s[1].id, s[2].id, s[3].id]);
        assert_eq!(updates.len(), 4);
    }

    #[test]
    fn test_move_to_same_position_is_noop() {
        let s = slots(3);
        assert!(plan_move(&s, s[1].id, 2).unwrap().is_empty());
    }

    #[test]
    fn test_move_clamps_target() {
        let s = slots(3);
        let result = apply(&s, &plan_move(&s, s[0].id, 99).unwrap());
        assert_contiguous(&result);
        assert_eq!(result[2].id, s[0].id);

        let result = apply(&s, &plan_move(&s, s[2].id, -4).unwrap());
        assert_eq!(result[0].id, s[2].id);
    }

    #[test]
    fn test_move_unknown_banner() {
        assert!(plan_move(&slots(2), Uuid::new_v4(), 1).is_none());
    }

    #[test]
    fn test_move_compacts_gaps() {
        let s = vec![
            Slot::new(Uuid::new_v4(), 2),
            Slot::new(Uuid::new_v4(), 5),
            Slot::new(Uuid::new_v4(), 9),
        ];
        let result = apply(&s, &plan_move(&s, s[2].id, 1).unwrap());
        assert_contiguous(&result);
        assert_eq!(order(&result), vec![s[2].id, s[0].id, s[1].id]);
    }

    #[test]
    fn test_delete_keeps_positions_contiguous() {
        let s = slots(4);
        let remaining: Vec<Slot> = s.iter().copied().filter(|x| x.id != s[1].id).collect();
        let result = apply(&remaining, &plan_delete(&remaining, 2));
        assert_contiguous(&result);
        assert_eq!(order(&result), vec![s[0].id, s[2].id, s[3].id]);
    }

    #[test]
    fn test_next_position() {
        assert_eq!(next_position(&[]), 1);
        assert_eq!(next_position(&slots(3)), 4);
    }

    #[test]
    fn test_renumber() {
        let s = vec![
            Slot::new(Uuid::new_v4(), 0),
            Slot::new(Uuid::new_v4(), 0),
            Slot::new(Uuid::new_v4(), 3),
        ];
        let updates = renumber(&s);
        assert_eq!(updates.len(), 2);
        assert_contiguous(&apply(&s, &updates));
    }
}
