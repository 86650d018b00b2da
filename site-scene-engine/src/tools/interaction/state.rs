use crate::engine::assets::placement::{ObjectId, ObjectPatch};
use crate::projection::{LocalPoint, point_in_polygon, snap_point};
use bevy::prelude::*;

/// Pointer interaction with placed objects.
///
/// `Idle -> Selected` on a pick hit, `Selected -> Dragging` on drag start and
/// back on drag end. A pick miss or `clear` returns to `Idle`. Picks are
/// ignored while dragging; the drag must end first.
#[derive(Resource, Debug, Clone, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Selected(ObjectId),
    Dragging(ObjectId),
}

impl InteractionState {
    /// Apply a pick result. Returns true when the selection changed.
    pub fn select(&mut self, hit: Option<ObjectId>) -> bool {
        if self.is_dragging() {
            return false;
        }
        let next = match hit {
            Some(id) => Self::Selected(id),
            None => Self::Idle,
        };
        let changed = *self != next;
        *self = next;
        changed
    }

    pub fn clear(&mut self) -> bool {
        match self {
            Self::Selected(_) => {
                *self = Self::Idle;
                true
            }
            _ => false,
        }
    }

    /// Start dragging the selection, if any.
    pub fn begin_drag(&mut self) -> Option<ObjectId> {
        match self {
            Self::Selected(id) => {
                let id = id.clone();
                *self = Self::Dragging(id.clone());
                Some(id)
            }
            _ => None,
        }
    }

    pub fn end_drag(&mut self) -> Option<ObjectId> {
        match self {
            Self::Dragging(id) => {
                let id = id.clone();
                *self = Self::Selected(id.clone());
                Some(id)
            }
            _ => None,
        }
    }

    /// Drop any reference to `id` (its mesh is gone). Returns the state that
    /// was left when it matched.
    pub fn forget(&mut self, id: &ObjectId) -> Option<InteractionState> {
        if self.active_object() == Some(id) {
            Some(std::mem::take(self))
        } else {
            None
        }
    }

    pub fn active_object(&self) -> Option<&ObjectId> {
        match self {
            Self::Idle => None,
            Self::Selected(id) | Self::Dragging(id) => Some(id),
        }
    }

    pub fn dragging(&self) -> Option<&ObjectId> {
        match self {
            Self::Dragging(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging(_))
    }
}

/// Result of validating one drag step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragOutcome {
    /// Snapped position inside the boundary; becomes the committed position.
    Commit(LocalPoint),
    /// Rejected; the object goes back to its last committed position.
    Rollback(LocalPoint),
}

impl DragOutcome {
    pub fn position(self) -> LocalPoint {
        match self {
            Self::Commit(point) | Self::Rollback(point) => point,
        }
    }
}

/// Snap then validate containment. Degenerate boundaries reject everything.
pub fn evaluate_drag(
    proposed: LocalPoint,
    committed: LocalPoint,
    boundary: &[LocalPoint],
    grid_size: f32,
) -> DragOutcome {
    if !(proposed.x.is_finite() && proposed.z.is_finite()) {
        return DragOutcome::Rollback(committed);
    }
    let snapped = snap_point(proposed, grid_size);
    if point_in_polygon(snapped, boundary) {
        DragOutcome::Commit(snapped)
    } else {
        DragOutcome::Rollback(committed)
    }
}

/// Patches waiting for the external object store.
#[derive(Resource, Debug, Default)]
pub struct PatchOutbox {
    patches: Vec<ObjectPatch>,
}

impl PatchOutbox {
    pub fn push(&mut self, patch: ObjectPatch) {
        self.patches.push(patch);
    }

    pub fn drain(&mut self) -> Vec<ObjectPatch> {
        std::mem::take(&mut self.patches)
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

/// Screen-space anchor of the selection handle, recomputed on camera moves.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq)]
pub struct SelectionHandle {
    pub anchor: Option<Vec2>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<LocalPoint> {
        vec![
            LocalPoint::new(0.0, 0.0),
            LocalPoint::new(10.0, 0.0),
            LocalPoint::new(10.0, 10.0),
            LocalPoint::new(0.0, 10.0),
        ]
    }

    #[test]
    fn pick_drag_release_cycle() {
        let mut state = InteractionState::default();
        assert!(state.select(Some("a".into())));
        assert_eq!(state.begin_drag(), Some(ObjectId::from("a")));
        assert!(state.is_dragging());

        // Picks during a drag are ignored.
        assert!(!state.select(Some("b".into())));
        assert!(!state.clear());
        assert_eq!(state.dragging(), Some(&ObjectId::from("a")));

        assert_eq!(state.end_drag(), Some(ObjectId::from("a")));
        assert_eq!(state, InteractionState::Selected("a".into()));
        assert!(state.select(None));
        assert_eq!(state, InteractionState::Idle);
    }

    #[test]
    fn drag_needs_a_selection() {
        let mut state = InteractionState::Idle;
        assert_eq!(state.begin_drag(), None);
        assert_eq!(state.end_drag(), None);
        assert_eq!(state, InteractionState::Idle);
    }

    #[test]
    fn forgetting_the_dragged_object_returns_to_idle() {
        let mut state = InteractionState::Dragging("a".into());
        assert_eq!(state.forget(&"b".into()), None);
        assert_eq!(
            state.forget(&"a".into()),
            Some(InteractionState::Dragging("a".into()))
        );
        assert_eq!(state, InteractionState::Idle);
    }

    #[test]
    fn outside_point_rolls_back() {
        let committed = LocalPoint::new(2.0, 2.0);
        let outcome = evaluate_drag(LocalPoint::new(11.0, 5.0), committed, &square(), 0.5);
        assert_eq!(outcome, DragOutcome::Rollback(committed));
    }

    #[test]
    fn inside_point_snaps_and_commits() {
        let outcome = evaluate_drag(LocalPoint::new(3.2, 3.2), LocalPoint::ZERO, &square(), 0.5);
        assert_eq!(outcome, DragOutcome::Commit(LocalPoint::new(3.0, 3.0)));
    }

    #[test]
    fn snapping_happens_before_containment() {
        // 9.8 is inside but snaps to 10.0, which sits on the edge and is outside
        // under the crossing rule for this ring.
        let committed = LocalPoint::new(5.0, 5.0);
        let outcome = evaluate_drag(LocalPoint::new(9.8, 5.0), committed, &square(), 0.5);
        assert_eq!(outcome, DragOutcome::Rollback(committed));
    }

    #[test]
    fn degenerate_boundary_rejects_every_drag() {
        let committed = LocalPoint::new(1.0, 1.0);
        let line = [LocalPoint::ZERO, LocalPoint::new(10.0, 10.0)];
        for proposed in [LocalPoint::new(5.0, 5.0), LocalPoint::new(0.5, 0.5)] {
            assert_eq!(
                evaluate_drag(proposed, committed, &line, 0.5),
                DragOutcome::Rollback(committed)
            );
            assert_eq!(
                evaluate_drag(proposed, committed, &[], 0.5),
                DragOutcome::Rollback(committed)
            );
        }
    }

    #[test]
    fn outbox_drains_in_order() {
        let mut outbox = PatchOutbox::default();
        outbox.push(ObjectPatch::rotation("a".into(), 0.1));
        outbox.push(ObjectPatch::rotation("b".into(), 0.2));
        let drained = outbox.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].id, ObjectId::from("a"));
        assert!(outbox.is_empty());
    }
}
