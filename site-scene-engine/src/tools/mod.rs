/// Pointer interaction with placed objects.
pub mod interaction;

/// Two-point distance measurement and its overlay.
pub mod measure;
