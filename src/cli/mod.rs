// Semdev CLI modules

pub mod debug_events;
pub mod list_devices;
pub mod ptraccel;
