// Semdev button-set dispatcher
// Pad rings, strips, and button groups on tablet pads

use std::collections::HashMap;

use crate::codes::*;
use crate::device::Device;
use crate::dispatch::DispatchCtx;
use crate::event::{ButtonState, ButtonsetAxisType, Event};
use crate::frame::RawEvent;

const STATUS_NONE: u32 = 0;
const AXES_UPDATED: u32 = 1 << 0;
const BUTTONS_PRESSED: u32 = 1 << 1;
const BUTTONS_RELEASED: u32 = 1 << 2;

const MASK_WORDS: usize = KEY_CNT / 64;

/// Strip position spans roughly 52mm of physical travel on the hardware
/// that reports one.
const STRIP_PHYSICAL_MM: f64 = 52.0;

/// Normalize a ring reading to [0, 1), clockwise from logical north.
/// The hardware reports zero at the left-most position, a quarter turn off
/// north; the configured rotation shifts north further.
fn normalize_ring(raw: i32, minimum: i32, maximum: i32, rotation_turns: f64) -> f64 {
    let range = f64::from(maximum - minimum + 1);
    let mut value = f64::from(raw - minimum) / range - 0.25 + rotation_turns;
    value -= value.floor();
    value
}

/// Strips shift a bit left per position instead of counting, so the
/// normalization is logarithmic. Zero is not a position, it only marks
/// finger release and never reaches this function.
fn normalize_strip(raw: i32, maximum: i32) -> f64 {
    let max = f64::from(maximum).log2();
    f64::from(raw).log2() / max
}

/// Wrap-aware ring delta: of the three candidate differences, the one
/// with the smallest magnitude is the real movement.
fn guess_ring_delta(current: f64, old: f64) -> f64 {
    let d1 = current - old;
    let d2 = (current + 1.0) - old;
    let d3 = current - (old + 1.0);
    let mut delta = d1;
    if d2.abs() < delta.abs() {
        delta = d2;
    }
    if d3.abs() < delta.abs() {
        delta = d3;
    }
    delta
}

struct BsAxis {
    evcode: u16,
    kind: ButtonsetAxisType,
    value: f64,
    prev_value: f64,
    raw: i32,
}

/// Dispatcher for pad button-set devices.
pub struct ButtonsetDispatch {
    status: u32,
    axes: Vec<BsAxis>,
    evcode_map: HashMap<u16, usize>,
    changed: u32,
    /// The pad brackets ring/strip touches with an ABS_MISC marker; a zero
    /// marker means finger-up and the axis reset that rides along with it
    /// must be suppressed.
    have_abs_misc_terminator: bool,
    abs_misc_value: i32,
    button_state: [u64; MASK_WORDS],
    prev_button_state: [u64; MASK_WORDS],
    rotation_turns: f64,
}

impl ButtonsetDispatch {
    pub fn new(device: &Device) -> Self {
        let mut axes = Vec::new();
        let mut evcode_map = HashMap::new();

        // X/Y/Z are dead on most pads and carry accelerometer data on some
        for code in ABS_RX..=ABS_MAX {
            if !device.descriptor.has_abs(code) {
                continue;
            }
            let kind = match code {
                ABS_WHEEL | ABS_THROTTLE => ButtonsetAxisType::Ring,
                ABS_RX | ABS_RY => ButtonsetAxisType::Strip,
                _ => continue,
            };
            evcode_map.insert(code, axes.len());
            axes.push(BsAxis {
                evcode: code,
                kind,
                value: 0.0,
                prev_value: 0.0,
                raw: 0,
            });
        }

        Self {
            status: STATUS_NONE,
            axes,
            evcode_map,
            changed: 0,
            have_abs_misc_terminator: false,
            abs_misc_value: 0,
            button_state: [0; MASK_WORDS],
            prev_button_state: [0; MASK_WORDS],
            rotation_turns: f64::from(device.config.rotation % 360) / 360.0,
        }
    }

    pub fn num_axes(&self) -> u32 {
        self.axes.len() as u32
    }

    pub fn axis_type(&self, axis: u32) -> Option<ButtonsetAxisType> {
        self.axes.get(axis as usize).map(|a| a.kind)
    }

    /// Ring values map to degrees, strip values to millimeters of travel.
    pub fn to_physical(&self, axis: u32, value: f64) -> Option<f64> {
        match self.axis_type(axis)? {
            ButtonsetAxisType::Ring => Some(value * 360.0),
            ButtonsetAxisType::Strip => Some(value * STRIP_PHYSICAL_MM),
        }
    }

    pub fn set_rotation(&mut self, degrees: u32) {
        self.rotation_turns = f64::from(degrees % 360) / 360.0;
    }

    fn has_status(&self, s: u32) -> bool {
        self.status & s != 0
    }

    pub fn process_frame(&mut self, device: &mut Device, ctx: &mut DispatchCtx, frame: &[RawEvent]) {
        for e in frame {
            match e.kind {
                EV_ABS => self.process_absolute(e),
                EV_KEY => self.process_key(e),
                EV_SYN if e.code == SYN_REPORT => self.flush(device, ctx, e.time),
                EV_SYN => {}
                other => {
                    log::error!("buttonset: unexpected event type {:#x}", other);
                }
            }
        }
    }

    fn process_absolute(&mut self, e: &RawEvent) {
        match e.code {
            ABS_WHEEL | ABS_THROTTLE | ABS_RX | ABS_RY => {
                let Some(&idx) = self.evcode_map.get(&e.code) else {
                    log::error!("buttonset: unmapped ABS code {:#x}", e.code);
                    return;
                };
                self.axes[idx].raw = e.value;
                self.changed |= 1 << idx;
                self.status |= AXES_UPDATED;
            }
            ABS_MISC => {
                self.have_abs_misc_terminator = true;
                self.abs_misc_value = e.value;
            }
            other => {
                log::info!("buttonset: unhandled ABS code {:#x}", other);
            }
        }
    }

    fn process_key(&mut self, e: &RawEvent) {
        let code = e.code;
        let word = code as usize / 64;
        let bit = 1u64 << (code as usize % 64);
        if e.value != 0 {
            self.button_state[word] |= bit;
            self.status |= BUTTONS_PRESSED;
        } else {
            self.button_state[word] &= !bit;
            self.status |= BUTTONS_RELEASED;
        }
    }

    fn check_notify_axes(&mut self, device: &Device, ctx: &mut DispatchCtx, time: u64) {
        for idx in 0..self.axes.len() {
            if self.changed & (1 << idx) == 0 {
                continue;
            }
            let evcode = self.axes[idx].evcode;
            let Some(info) = device.descriptor.abs_info(evcode) else {
                log::error!("buttonset: no abs info for {:#x}", evcode);
                self.changed &= !(1 << idx);
                continue;
            };

            let (value, mut delta, mut delta_discrete) = match self.axes[idx].kind {
                ButtonsetAxisType::Ring => {
                    let value = normalize_ring(
                        self.axes[idx].raw,
                        info.minimum,
                        info.maximum,
                        self.rotation_turns,
                    );
                    let delta = guess_ring_delta(value, self.axes[idx].prev_value);
                    let discrete = delta * f64::from(info.maximum - info.minimum + 1);
                    (value, delta, discrete)
                }
                ButtonsetAxisType::Strip => {
                    // zero is finger release, not a position
                    if self.axes[idx].raw == 0 {
                        self.changed &= !(1 << idx);
                        continue;
                    }
                    let value = normalize_strip(self.axes[idx].raw, info.maximum);
                    let delta = value - self.axes[idx].prev_value;
                    (value, delta, 0.0)
                }
            };

            if self.have_abs_misc_terminator {
                if self.abs_misc_value == 0 {
                    // finger-up: the axis reset rides along, drop it
                    self.changed &= !(1 << idx);
                    continue;
                }
                // finger-down: position jump, not travel
                delta = 0.0;
                delta_discrete = 0.0;
            }

            self.axes[idx].value = value;
            ctx.queue.push(Event::ButtonsetAxis {
                device: device.id,
                time,
                axis: idx as u32,
                kind: self.axes[idx].kind,
                value,
                delta,
                delta_discrete,
            });
        }

        self.changed = 0;
        for axis in &mut self.axes {
            axis.prev_value = axis.value;
        }
        self.have_abs_misc_terminator = false;
    }

    fn notify_buttons(&mut self, device: &Device, ctx: &mut DispatchCtx, time: u64, state: ButtonState) {
        for word in 0..MASK_WORDS {
            let mask = match state {
                ButtonState::Pressed => self.button_state[word] & !self.prev_button_state[word],
                ButtonState::Released => self.prev_button_state[word] & !self.button_state[word],
            };
            let mut bits = mask;
            while bits != 0 {
                let bit = bits.trailing_zeros();
                bits &= bits - 1;
                ctx.queue.push(Event::ButtonsetButton {
                    device: device.id,
                    time,
                    button: (word * 64) as u16 + bit as u16,
                    state,
                });
            }
        }
    }

    fn flush(&mut self, device: &mut Device, ctx: &mut DispatchCtx, time: u64) {
        if self.has_status(AXES_UPDATED) {
            self.check_notify_axes(device, ctx, time);
            self.status &= !AXES_UPDATED;
        }
        if self.has_status(BUTTONS_RELEASED) {
            self.notify_buttons(device, ctx, time, ButtonState::Released);
            self.status &= !BUTTONS_RELEASED;
        }
        if self.has_status(BUTTONS_PRESSED) {
            self.notify_buttons(device, ctx, time, ButtonState::Pressed);
            self.status &= !BUTTONS_PRESSED;
        }

        self.prev_button_state = self.button_state;
    }

    /// Force-release all pad buttons, e.g. on removal or send-events off.
    pub fn suspend(&mut self, device: &mut Device, ctx: &mut DispatchCtx, now: u64) {
        let mut any = false;
        for word in 0..MASK_WORDS {
            if self.button_state[word] != 0 {
                self.button_state[word] = 0;
                any = true;
            }
        }
        if any {
            self.status |= BUTTONS_RELEASED;
        }
        self.flush(device, ctx, now);
    }
}
