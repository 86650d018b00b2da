use bevy::prelude::*;

/// Engine lifecycle. `Disposed` is terminal.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineLifecycle {
    #[default]
    Uninitialized,
    /// Origin known, no host surface yet.
    Bound,
    /// Host attached; picking, dragging and frame rendering are live.
    Active,
    Disposed,
}

impl EngineLifecycle {
    pub fn on_origin(&mut self, has_origin: bool) {
        *self = match (*self, has_origin) {
            (Self::Uninitialized, true) => Self::Bound,
            (Self::Bound, false) => Self::Uninitialized,
            (state, _) => state,
        };
    }

    /// Returns false when attaching is no longer possible.
    pub fn on_attach(&mut self) -> bool {
        if *self == Self::Disposed {
            return false;
        }
        *self = Self::Active;
        true
    }

    /// Returns true on the first call only.
    pub fn on_dispose(&mut self) -> bool {
        let first = *self != Self::Disposed;
        *self = Self::Disposed;
        first
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    pub fn is_disposed(self) -> bool {
        self == Self::Disposed
    }
}

/// Run condition for everything that stops after dispose.
pub fn not_disposed(lifecycle: Res<EngineLifecycle>) -> bool {
    !lifecycle.is_disposed()
}
