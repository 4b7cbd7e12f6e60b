// Semdev semantic events
// The device-independent stream handed to the consumer

use std::rc::Rc;

use crate::device::DeviceId;
use crate::tablet::tool::TabletTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

/// Where a scroll event came from. Consumers use this to decide on
/// kinetic scrolling (finger) vs discrete stepping (wheel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSource {
    Wheel,
    Finger,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityState {
    In,
    Out,
}

/// An absolute position in device coordinates together with the axis
/// extents needed to project it onto an output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsolutePosition {
    pub x: f64,
    pub y: f64,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl AbsolutePosition {
    pub fn new(x: f64, y: f64, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x,
            y,
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Scale into a `width` x `height` output space.
    pub fn transformed(&self, width: u32, height: u32) -> (f64, f64) {
        let xr = (self.x_max - self.x_min).max(1.0);
        let yr = (self.y_max - self.y_min).max(1.0);
        (
            (self.x - self.x_min) / xr * f64::from(width),
            (self.y - self.y_min) / yr * f64::from(height),
        )
    }
}

/// Axes a tablet tool can report. Doubles as the bit index in [`AxisMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TabletAxis {
    X = 0,
    Y = 1,
    Distance = 2,
    Pressure = 3,
    TiltX = 4,
    TiltY = 5,
    RotationZ = 6,
    Slider = 7,
    RelWheel = 8,
}

impl TabletAxis {
    pub const ALL: [TabletAxis; 9] = [
        TabletAxis::X,
        TabletAxis::Y,
        TabletAxis::Distance,
        TabletAxis::Pressure,
        TabletAxis::TiltX,
        TabletAxis::TiltY,
        TabletAxis::RotationZ,
        TabletAxis::Slider,
        TabletAxis::RelWheel,
    ];
}

/// Set of changed/capable tablet axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisMask(u32);

impl AxisMask {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn set(&mut self, axis: TabletAxis) {
        self.0 |= 1 << axis as u32;
    }

    pub fn clear(&mut self, axis: TabletAxis) {
        self.0 &= !(1 << axis as u32);
    }

    pub fn contains(&self, axis: TabletAxis) -> bool {
        self.0 & (1 << axis as u32) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = TabletAxis> + '_ {
        TabletAxis::ALL.iter().copied().filter(|a| self.contains(*a))
    }
}

/// Snapshot of all tablet axis values, indexed by [`TabletAxis`].
///
/// pressure/distance/slider are normalized to [0, 1], tilt to [-1, 1],
/// rotation is degrees clockwise from logical north, x/y are device units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TabletAxes {
    values: [f64; 9],
}

impl TabletAxes {
    pub fn get(&self, axis: TabletAxis) -> f64 {
        self.values[axis as usize]
    }

    pub fn set(&mut self, axis: TabletAxis, value: f64) {
        self.values[axis as usize] = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonsetAxisType {
    Ring,
    Strip,
}

/// One entry of the outgoing event stream.
#[derive(Debug, Clone)]
pub enum Event {
    DeviceAdded {
        device: DeviceId,
    },
    DeviceRemoved {
        device: DeviceId,
    },
    KeyboardKey {
        device: DeviceId,
        time: u64,
        key: u16,
        state: KeyState,
        /// Seat-wide pressed count for this key code, post-update.
        seat_key_count: u32,
    },
    PointerMotion {
        device: DeviceId,
        time: u64,
        dx: f64,
        dy: f64,
    },
    PointerMotionAbsolute {
        device: DeviceId,
        time: u64,
        position: AbsolutePosition,
    },
    PointerButton {
        device: DeviceId,
        time: u64,
        button: u16,
        state: ButtonState,
        seat_button_count: u32,
    },
    PointerAxis {
        device: DeviceId,
        time: u64,
        axis: ScrollAxis,
        /// Scroll amount; 0.0 marks the end of a finger scroll sequence.
        value: f64,
        source: AxisSource,
    },
    TouchDown {
        device: DeviceId,
        time: u64,
        slot: i32,
        seat_slot: u32,
        position: AbsolutePosition,
    },
    TouchMotion {
        device: DeviceId,
        time: u64,
        slot: i32,
        seat_slot: u32,
        position: AbsolutePosition,
    },
    TouchUp {
        device: DeviceId,
        time: u64,
        slot: i32,
        seat_slot: u32,
    },
    TouchCancel {
        device: DeviceId,
        time: u64,
        slot: i32,
        seat_slot: u32,
    },
    TouchFrame {
        device: DeviceId,
        time: u64,
    },
    TabletProximity {
        device: DeviceId,
        time: u64,
        tool: Rc<TabletTool>,
        state: ProximityState,
        changed: AxisMask,
        axes: TabletAxes,
    },
    TabletAxis {
        device: DeviceId,
        time: u64,
        tool: Rc<TabletTool>,
        changed: AxisMask,
        axes: TabletAxes,
        deltas: TabletAxes,
        /// Wheel movement in whole physical clicks.
        wheel_discrete: i32,
    },
    TabletButton {
        device: DeviceId,
        time: u64,
        tool: Rc<TabletTool>,
        button: u16,
        state: ButtonState,
    },
    ButtonsetButton {
        device: DeviceId,
        time: u64,
        button: u16,
        state: ButtonState,
    },
    ButtonsetAxis {
        device: DeviceId,
        time: u64,
        /// Index of the axis on this device, stable across events.
        axis: u32,
        kind: ButtonsetAxisType,
        value: f64,
        delta: f64,
        /// Ring: delta in hardware steps. Strip: always 0.
        delta_discrete: f64,
    },
}

impl Event {
    pub fn device(&self) -> DeviceId {
        match self {
            Event::DeviceAdded { device }
            | Event::DeviceRemoved { device }
            | Event::KeyboardKey { device, .. }
            | Event::PointerMotion { device, .. }
            | Event::PointerMotionAbsolute { device, .. }
            | Event::PointerButton { device, .. }
            | Event::PointerAxis { device, .. }
            | Event::TouchDown { device, .. }
            | Event::TouchMotion { device, .. }
            | Event::TouchUp { device, .. }
            | Event::TouchCancel { device, .. }
            | Event::TouchFrame { device, .. }
            | Event::TabletProximity { device, .. }
            | Event::TabletAxis { device, .. }
            | Event::TabletButton { device, .. }
            | Event::ButtonsetButton { device, .. }
            | Event::ButtonsetAxis { device, .. } => *device,
        }
    }

    /// Input-event timestamp in monotonic milliseconds. Device add/remove
    /// notifications carry no kernel timestamp.
    pub fn time(&self) -> Option<u64> {
        match self {
            Event::DeviceAdded { .. } | Event::DeviceRemoved { .. } => None,
            Event::KeyboardKey { time, .. }
            | Event::PointerMotion { time, .. }
            | Event::PointerMotionAbsolute { time, .. }
            | Event::PointerButton { time, .. }
            | Event::PointerAxis { time, .. }
            | Event::TouchDown { time, .. }
            | Event::TouchMotion { time, .. }
            | Event::TouchUp { time, .. }
            | Event::TouchCancel { time, .. }
            | Event::TouchFrame { time, .. }
            | Event::TabletProximity { time, .. }
            | Event::TabletAxis { time, .. }
            | Event::TabletButton { time, .. }
            | Event::ButtonsetButton { time, .. }
            | Event::ButtonsetAxis { time, .. } => Some(*time),
        }
    }
}
