// Semdev Core Library
// evdev streams in, device-independent semantic events out

pub mod backend;
pub mod buttonset;
pub mod codes;
pub mod config;
pub mod context;
pub mod device;
pub mod dispatch;
pub mod event;
pub mod fallback;
pub mod filter;
pub mod frame;
pub mod halfkey;
pub mod keyboard;
pub mod queue;
pub mod quirks;
pub mod seat;
pub mod tablet;
pub mod timer;
pub mod touchpad;

pub use backend::{DeviceOpener, DirectOpener};
pub use config::{
    AccelProfile, CalibrationMatrix, ClickMethod, ConfigKey, ConfigStatus, ConfigValue,
    ScrollMethod, SendEventsMode,
};
pub use context::{Context, ContextError};
pub use device::{AbsAxisInfo, Capability, CapabilitySet, DeviceDescriptor, DeviceId, GroupId};
pub use event::{
    AbsolutePosition, AxisMask, AxisSource, ButtonState, ButtonsetAxisType, Event, KeyState,
    ProximityState, ScrollAxis, TabletAxes, TabletAxis,
};
pub use filter::{MotionDelta, MotionFilter, PointerAccelerator, TouchpadAccelerator};
pub use frame::RawEvent;
pub use quirks::Quirks;
pub use tablet::tool::{TabletTool, ToolType};
