//! Boundary between the engine and the map (or window) hosting it.

pub mod adapter;
pub mod camera;

/// Host rendering surface in physical pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct HostSurface {
    pub width: f32,
    pub height: f32,
    pub label: String,
}

impl HostSurface {
    pub fn new(width: f32, height: f32, label: &str) -> Self {
        Self {
            width,
            height,
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostChannel {
    PointerClick,
    CameraMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Services the engine needs from its host.
///
/// Event delivery runs the other way: the host calls back into the engine
/// (`SceneSyncEngine::pick`, `camera_moved`, `render_frame`) for every
/// channel it was subscribed to.
pub trait MapHost: Send + Sync + 'static {
    /// `None` when the host cannot render yet.
    fn surface(&self) -> Option<HostSurface>;

    fn subscribe(&mut self, channel: HostChannel) -> ListenerId;

    fn unsubscribe(&mut self, listener: ListenerId);

    /// Lock map panning while an object is dragged.
    fn set_pan_locked(&mut self, locked: bool);

    fn request_repaint(&mut self);
}
