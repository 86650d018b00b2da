//! Selection, dragging and rotation of placed objects.

pub mod manipulation;
pub mod ray;
pub mod selection;
pub mod state;
