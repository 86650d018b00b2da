use super::{HostChannel, HostSurface, ListenerId, MapHost};
use crate::engine::core::events::HostAttachedEvent;
use crate::engine::core::lifecycle::EngineLifecycle;
use crate::error::EngineError;
use bevy::prelude::*;

/// The bound host plus the listeners registered on it.
#[derive(Resource)]
pub struct HostAdapter {
    host: Box<dyn MapHost>,
    surface: HostSurface,
    listeners: Vec<(HostChannel, ListenerId)>,
    pan_locked: bool,
}

impl HostAdapter {
    fn new(host: Box<dyn MapHost>, surface: HostSurface) -> Self {
        Self {
            host,
            surface,
            listeners: Vec::new(),
            pan_locked: false,
        }
    }

    pub fn surface(&self) -> &HostSurface {
        &self.surface
    }

    pub fn set_surface_size(&mut self, width: f32, height: f32) {
        self.surface.width = width;
        self.surface.height = height;
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_pan_locked(&self) -> bool {
        self.pan_locked
    }

    pub fn set_pan_locked(&mut self, locked: bool) {
        if self.pan_locked != locked {
            self.pan_locked = locked;
            self.host.set_pan_locked(locked);
        }
    }

    pub fn request_repaint(&mut self) {
        self.host.request_repaint();
    }

    fn subscribe_all(&mut self) {
        for channel in [HostChannel::PointerClick, HostChannel::CameraMove] {
            let listener = self.host.subscribe(channel);
            self.listeners.push((channel, listener));
        }
    }

    /// Release the pan lock and drop every listener.
    pub fn detach(&mut self) {
        self.set_pan_locked(false);
        for (_, listener) in self.listeners.drain(..) {
            self.host.unsubscribe(listener);
        }
    }
}

/// Bind a host surface. A second attach is a no-op.
pub fn attach_host(world: &mut World, host: Box<dyn MapHost>) -> Result<(), EngineError> {
    let lifecycle = world
        .get_resource::<EngineLifecycle>()
        .copied()
        .unwrap_or_default();
    if lifecycle.is_disposed() {
        return Err(EngineError::Disposed);
    }
    if world.contains_resource::<HostAdapter>() {
        debug!("Host already attached, ignoring");
        return Ok(());
    }

    let Some(surface) = host.surface() else {
        error!("Cannot attach: host has no rendering surface");
        return Err(EngineError::MissingSurface);
    };

    info!(
        "Attaching to host surface {:?} ({}x{})",
        surface.label, surface.width, surface.height
    );
    let mut adapter = HostAdapter::new(host, surface);
    adapter.subscribe_all();
    world.insert_resource(adapter);

    if let Some(mut lifecycle) = world.get_resource_mut::<EngineLifecycle>() {
        lifecycle.on_attach();
    }
    world.send_event(HostAttachedEvent);
    Ok(())
}
