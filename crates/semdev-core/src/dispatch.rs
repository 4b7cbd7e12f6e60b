// Semdev device dispatchers
// One tagged dispatcher per device, plus the shared notify surface

use crate::buttonset::ButtonsetDispatch;
use crate::device::Device;
use crate::event::{
    AbsolutePosition, ButtonState, Event, KeyState, ScrollAxis,
};
use crate::fallback::FallbackDispatch;
use crate::frame::RawEvent;
use crate::keyboard::KeyboardDispatch;
use crate::queue::EventQueue;
use crate::quirks::Quirks;
use crate::seat::SeatTable;
use crate::tablet::tool::ToolRegistry;
use crate::tablet::TabletDispatch;
use crate::timer::{TimerKind, TimerWheel};
use crate::touchpad::TouchpadDispatch;

/// Mutable context services handed into a dispatcher for one frame or
/// timeout. Owns nothing; everything lives on the context.
pub struct DispatchCtx<'a> {
    pub queue: &'a mut EventQueue,
    pub timers: &'a mut TimerWheel,
    pub seats: &'a mut SeatTable,
    pub tools: &'a mut ToolRegistry,
    pub quirks: &'a Quirks,
}

impl<'a> DispatchCtx<'a> {
    /// Emit a keyboard key event, maintaining the seat-wide counter.
    pub fn notify_key(&mut self, device: &Device, time: u64, key: u16, state: KeyState) {
        let count = match self.seats.get_mut(device.seat) {
            Some(seat) => match state {
                KeyState::Pressed => seat.press(key),
                KeyState::Released => seat.release(key),
            },
            None => 0,
        };
        self.queue.push(Event::KeyboardKey {
            device: device.id,
            time,
            key,
            state,
            seat_key_count: count,
        });
    }

    /// Emit a pointer button event, maintaining the seat-wide counter.
    pub fn notify_button(&mut self, device: &Device, time: u64, button: u16, state: ButtonState) {
        let count = match self.seats.get_mut(device.seat) {
            Some(seat) => match state {
                ButtonState::Pressed => seat.press(button),
                ButtonState::Released => seat.release(button),
            },
            None => 0,
        };
        self.queue.push(Event::PointerButton {
            device: device.id,
            time,
            button,
            state,
            seat_button_count: count,
        });
    }

    pub fn notify_motion(&mut self, device: &Device, time: u64, dx: f64, dy: f64) {
        self.queue.push(Event::PointerMotion {
            device: device.id,
            time,
            dx,
            dy,
        });
    }

    pub fn notify_motion_absolute(&mut self, device: &Device, time: u64, position: AbsolutePosition) {
        self.queue.push(Event::PointerMotionAbsolute {
            device: device.id,
            time,
            position,
        });
    }

    pub fn notify_axis(
        &mut self,
        device: &Device,
        time: u64,
        axis: ScrollAxis,
        value: f64,
        source: crate::event::AxisSource,
    ) {
        self.queue.push(Event::PointerAxis {
            device: device.id,
            time,
            axis,
            value,
            source,
        });
    }

    pub fn notify_touch_down(
        &mut self,
        device: &Device,
        time: u64,
        slot: i32,
        seat_slot: u32,
        position: AbsolutePosition,
    ) {
        self.queue.push(Event::TouchDown {
            device: device.id,
            time,
            slot,
            seat_slot,
            position,
        });
    }

    pub fn notify_touch_motion(
        &mut self,
        device: &Device,
        time: u64,
        slot: i32,
        seat_slot: u32,
        position: AbsolutePosition,
    ) {
        self.queue.push(Event::TouchMotion {
            device: device.id,
            time,
            slot,
            seat_slot,
            position,
        });
    }

    pub fn notify_touch_up(&mut self, device: &Device, time: u64, slot: i32, seat_slot: u32) {
        self.queue.push(Event::TouchUp {
            device: device.id,
            time,
            slot,
            seat_slot,
        });
    }

    pub fn notify_touch_cancel(&mut self, device: &Device, time: u64, slot: i32, seat_slot: u32) {
        self.queue.push(Event::TouchCancel {
            device: device.id,
            time,
            slot,
            seat_slot,
        });
    }

    pub fn notify_touch_frame(&mut self, device: &Device, time: u64) {
        self.queue.push(Event::TouchFrame {
            device: device.id,
            time,
        });
    }
}

/// The per-device dispatcher. Exactly one per device; the variant is fixed
/// at add time from the device's capabilities.
pub enum DeviceDispatch {
    Fallback(FallbackDispatch),
    Keyboard(KeyboardDispatch),
    Touchpad(Box<TouchpadDispatch>),
    Tablet(Box<TabletDispatch>),
    Buttonset(ButtonsetDispatch),
}

impl DeviceDispatch {
    /// Process one complete kernel frame (SYN_REPORT terminated).
    pub fn process_frame(&mut self, device: &mut Device, ctx: &mut DispatchCtx, frame: &[RawEvent]) {
        match self {
            DeviceDispatch::Fallback(d) => d.process_frame(device, ctx, frame),
            DeviceDispatch::Keyboard(d) => d.process_frame(device, ctx, frame),
            DeviceDispatch::Touchpad(d) => d.process_frame(device, ctx, frame),
            DeviceDispatch::Tablet(d) => d.process_frame(device, ctx, frame),
            DeviceDispatch::Buttonset(d) => d.process_frame(device, ctx, frame),
        }
    }

    /// A timer owned by this device fired. Treated exactly like a frame
    /// boundary for ordering purposes.
    pub fn handle_timeout(
        &mut self,
        device: &mut Device,
        ctx: &mut DispatchCtx,
        kind: TimerKind,
        now: u64,
    ) {
        match self {
            DeviceDispatch::Fallback(d) => d.handle_timeout(device, ctx, kind, now),
            DeviceDispatch::Keyboard(_) => {}
            DeviceDispatch::Touchpad(d) => d.handle_timeout(device, ctx, kind, now),
            DeviceDispatch::Tablet(_) => {}
            DeviceDispatch::Buttonset(_) => {}
        }
    }

    /// Force-release everything: buttons, keys, touches, proximity. Used on
    /// removal, suspend, and send-events disable.
    pub fn suspend(&mut self, device: &mut Device, ctx: &mut DispatchCtx, now: u64) {
        match self {
            DeviceDispatch::Fallback(d) => d.suspend(device, ctx, now),
            DeviceDispatch::Keyboard(d) => d.suspend(device, ctx, now),
            DeviceDispatch::Touchpad(d) => d.suspend(device, ctx, now),
            DeviceDispatch::Tablet(d) => d.suspend(device, ctx, now),
            DeviceDispatch::Buttonset(d) => d.suspend(device, ctx, now),
        }
    }

    /// Called once after the device-added event is queued. Tablets use this
    /// to synthesize proximity for a tool already on the device.
    pub fn post_added(&mut self, device: &mut Device, ctx: &mut DispatchCtx, now: u64) {
        if let DeviceDispatch::Tablet(d) = self {
            d.post_added(device, ctx, now);
        }
    }

    /// Buttonset axis values map to physical units (ring degrees, strip
    /// millimeters); every other dispatcher has no such mapping.
    pub fn to_physical(&self, axis: u32, value: f64) -> Option<f64> {
        match self {
            DeviceDispatch::Buttonset(d) => d.to_physical(axis, value),
            _ => None,
        }
    }
}
