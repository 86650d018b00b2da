pub mod events;
pub mod facade;
pub mod lifecycle;
pub mod plugin;
