// Shared test harness: synthetic devices and frame builders

#![allow(dead_code)]

use semdev_core::codes::*;
use semdev_core::{
    AbsAxisInfo, ButtonState, Context, DeviceDescriptor, DeviceId, Event, KeyState, RawEvent,
};

/// Clickpad geometry used throughout: 1000x500 units at 10 units/mm,
/// i.e. a 100mm x 50mm pad.
pub const PAD_X_MAX: i32 = 1000;
pub const PAD_Y_MAX: i32 = 500;
pub const PAD_RESOLUTION: i32 = 10;

pub fn clickpad_descriptor() -> DeviceDescriptor {
    let mut d = DeviceDescriptor {
        name: "test clickpad".into(),
        sysname: "event10".into(),
        vendor_id: 0xabcd,
        product_id: 0x0001,
        mt_slot_count: 5,
        ..Default::default()
    };
    for code in [
        BTN_TOUCH,
        BTN_TOOL_FINGER,
        BTN_TOOL_DOUBLETAP,
        BTN_TOOL_TRIPLETAP,
        BTN_TOOL_QUADTAP,
        BTN_TOOL_QUINTTAP,
        BTN_LEFT,
    ] {
        d.keys.insert(code);
    }
    for (code, max) in [
        (ABS_X, PAD_X_MAX),
        (ABS_MT_POSITION_X, PAD_X_MAX),
        (ABS_Y, PAD_Y_MAX),
        (ABS_MT_POSITION_Y, PAD_Y_MAX),
    ] {
        d.abs_axes
            .insert(code, AbsAxisInfo::new(0, max).with_resolution(PAD_RESOLUTION));
    }
    d.abs_axes.insert(ABS_MT_SLOT, AbsAxisInfo::new(0, 4));
    d.abs_axes
        .insert(ABS_MT_TRACKING_ID, AbsAxisInfo::new(0, 65535));
    d.properties.insert(PROP_BUTTONPAD);
    d
}

pub fn keyboard_descriptor(sysname: &str) -> DeviceDescriptor {
    let mut d = DeviceDescriptor {
        name: "test keyboard".into(),
        sysname: sysname.into(),
        vendor_id: 0x1111,
        product_id: 0x0001,
        ..Default::default()
    };
    for code in 1..=120u16 {
        d.keys.insert(code);
    }
    d
}

pub fn mouse_descriptor() -> DeviceDescriptor {
    let mut d = DeviceDescriptor {
        name: "test mouse".into(),
        sysname: "event11".into(),
        vendor_id: 0x2222,
        product_id: 0x0001,
        ..Default::default()
    };
    for code in [BTN_LEFT, BTN_RIGHT] {
        d.keys.insert(code);
    }
    for code in [REL_X, REL_Y, REL_WHEEL, REL_HWHEEL] {
        d.rel_axes.insert(code);
    }
    d
}

pub fn tablet_descriptor() -> DeviceDescriptor {
    let mut d = DeviceDescriptor {
        name: "test tablet".into(),
        sysname: "event12".into(),
        vendor_id: 0x056a,
        product_id: 0x00bc,
        ..Default::default()
    };
    for code in [
        BTN_TOOL_PEN,
        BTN_TOOL_RUBBER,
        BTN_TOOL_MOUSE,
        BTN_TOOL_LENS,
        BTN_STYLUS,
        BTN_STYLUS2,
        BTN_TOUCH,
        BTN_LEFT,
        BTN_MIDDLE,
        BTN_RIGHT,
    ] {
        d.keys.insert(code);
    }
    d.abs_axes
        .insert(ABS_X, AbsAxisInfo::new(0, 31496).with_resolution(200));
    d.abs_axes
        .insert(ABS_Y, AbsAxisInfo::new(0, 19685).with_resolution(200));
    d.abs_axes.insert(ABS_PRESSURE, AbsAxisInfo::new(0, 2047));
    d.abs_axes.insert(ABS_DISTANCE, AbsAxisInfo::new(0, 63));
    d.abs_axes.insert(ABS_TILT_X, AbsAxisInfo::new(-63, 63));
    d.abs_axes.insert(ABS_TILT_Y, AbsAxisInfo::new(-63, 63));
    d
}

pub fn pad_buttonset_descriptor() -> DeviceDescriptor {
    let mut d = DeviceDescriptor {
        name: "test pad".into(),
        sysname: "event13".into(),
        vendor_id: 0x056a,
        product_id: 0x00b9,
        ..Default::default()
    };
    for code in [BTN_0, BTN_0 + 1, BTN_0 + 2, BTN_0 + 3] {
        d.keys.insert(code);
    }
    d.abs_axes.insert(ABS_WHEEL, AbsAxisInfo::new(0, 71));
    d.abs_axes.insert(ABS_RX, AbsAxisInfo::new(0, 4096));
    d.abs_axes.insert(ABS_MISC, AbsAxisInfo::new(0, 255));
    d
}

pub fn touchscreen_descriptor(sysname: &str) -> DeviceDescriptor {
    let mut d = DeviceDescriptor {
        name: "test touchscreen".into(),
        sysname: sysname.into(),
        vendor_id: 0x3333,
        product_id: 0x0001,
        ..Default::default()
    };
    d.keys.insert(BTN_TOUCH);
    d.abs_axes
        .insert(ABS_X, AbsAxisInfo::new(0, 4095).with_resolution(12));
    d.abs_axes
        .insert(ABS_Y, AbsAxisInfo::new(0, 4095).with_resolution(12));
    d
}

fn tool_code_for_count(count: u32) -> Option<u16> {
    match count {
        1 => Some(BTN_TOOL_FINGER),
        2 => Some(BTN_TOOL_DOUBLETAP),
        3 => Some(BTN_TOOL_TRIPLETAP),
        4 => Some(BTN_TOOL_QUADTAP),
        5 => Some(BTN_TOOL_QUINTTAP),
        _ => None,
    }
}

/// Drives a synthetic touchpad the way the kernel would: slots, tracking
/// ids, BTN_TOUCH and the BTN_TOOL_* finger count chords.
pub struct TouchpadSim {
    pub ctx: Context,
    pub id: DeviceId,
    next_tracking_id: i32,
    down: [bool; 8],
}

impl TouchpadSim {
    pub fn new() -> Self {
        Self::with_descriptor(clickpad_descriptor())
    }

    pub fn with_descriptor(descriptor: DeviceDescriptor) -> Self {
        let mut ctx = Context::new();
        let id = ctx.add_synthetic_device(descriptor);
        let mut sim = Self {
            ctx,
            id,
            next_tracking_id: 1,
            down: [false; 8],
        };
        sim.drain();
        sim
    }

    fn finger_count(&self) -> u32 {
        self.down.iter().filter(|d| **d).count() as u32
    }

    pub fn units(pct_x: f64, pct_y: f64) -> (i32, i32) {
        (
            (pct_x / 100.0 * f64::from(PAD_X_MAX)) as i32,
            (pct_y / 100.0 * f64::from(PAD_Y_MAX)) as i32,
        )
    }

    pub fn touch_down(&mut self, slot: usize, pct_x: f64, pct_y: f64, time: u64) {
        let (x, y) = Self::units(pct_x, pct_y);
        let old = self.finger_count();
        self.down[slot] = true;
        let new = self.finger_count();

        let mut events = vec![
            RawEvent::new(time, EV_ABS, ABS_MT_SLOT, slot as i32),
            RawEvent::new(time, EV_ABS, ABS_MT_TRACKING_ID, self.next_tracking_id),
            RawEvent::new(time, EV_ABS, ABS_MT_POSITION_X, x),
            RawEvent::new(time, EV_ABS, ABS_MT_POSITION_Y, y),
        ];
        self.next_tracking_id += 1;
        if old == 0 {
            events.push(RawEvent::new(time, EV_KEY, BTN_TOUCH, 1));
        }
        if let Some(code) = tool_code_for_count(old) {
            events.push(RawEvent::new(time, EV_KEY, code, 0));
        }
        if let Some(code) = tool_code_for_count(new) {
            events.push(RawEvent::new(time, EV_KEY, code, 1));
        }
        events.push(RawEvent::new(time, EV_SYN, SYN_REPORT, 0));
        self.ctx.inject_frame(self.id, &events);
    }

    pub fn touch_move(&mut self, slot: usize, pct_x: f64, pct_y: f64, time: u64) {
        let (x, y) = Self::units(pct_x, pct_y);
        let events = [
            RawEvent::new(time, EV_ABS, ABS_MT_SLOT, slot as i32),
            RawEvent::new(time, EV_ABS, ABS_MT_POSITION_X, x),
            RawEvent::new(time, EV_ABS, ABS_MT_POSITION_Y, y),
            RawEvent::new(time, EV_SYN, SYN_REPORT, 0),
        ];
        self.ctx.inject_frame(self.id, &events);
    }

    pub fn touch_up(&mut self, slot: usize, time: u64) {
        let old = self.finger_count();
        self.down[slot] = false;
        let new = self.finger_count();

        let mut events = vec![
            RawEvent::new(time, EV_ABS, ABS_MT_SLOT, slot as i32),
            RawEvent::new(time, EV_ABS, ABS_MT_TRACKING_ID, -1),
        ];
        if new == 0 {
            events.push(RawEvent::new(time, EV_KEY, BTN_TOUCH, 0));
        }
        if let Some(code) = tool_code_for_count(old) {
            events.push(RawEvent::new(time, EV_KEY, code, 0));
        }
        if let Some(code) = tool_code_for_count(new) {
            events.push(RawEvent::new(time, EV_KEY, code, 1));
        }
        events.push(RawEvent::new(time, EV_SYN, SYN_REPORT, 0));
        self.ctx.inject_frame(self.id, &events);
    }

    pub fn click(&mut self, pressed: bool, time: u64) {
        let events = [
            RawEvent::new(time, EV_KEY, BTN_LEFT, i32::from(pressed)),
            RawEvent::new(time, EV_SYN, SYN_REPORT, 0),
        ];
        self.ctx.inject_frame(self.id, &events);
    }

    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(e) = self.ctx.get_event() {
            events.push(e);
        }
        events
    }

    /// Drain, keeping only pointer button events as (time, code, state).
    pub fn drain_buttons(&mut self) -> Vec<(u64, u16, ButtonState)> {
        self.drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::PointerButton {
                    time,
                    button,
                    state,
                    ..
                } => Some((time, button, state)),
                _ => None,
            })
            .collect()
    }
}

/// Inject one key press+release pair on a keyboard device.
pub fn key_tap(ctx: &mut Context, id: DeviceId, code: u16, time: u64) {
    key_event(ctx, id, code, true, time);
    key_event(ctx, id, code, false, time + 10);
}

pub fn key_event(ctx: &mut Context, id: DeviceId, code: u16, pressed: bool, time: u64) {
    let events = [
        RawEvent::new(time, EV_KEY, code, i32::from(pressed)),
        RawEvent::new(time, EV_SYN, SYN_REPORT, 0),
    ];
    ctx.inject_frame(id, &events);
}

pub fn drain(ctx: &mut Context) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(e) = ctx.get_event() {
        events.push(e);
    }
    events
}

pub fn keyboard_keys(events: &[Event]) -> Vec<(u64, u16, KeyState)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::KeyboardKey {
                time, key, state, ..
            } => Some((*time, *key, *state)),
            _ => None,
        })
        .collect()
}
