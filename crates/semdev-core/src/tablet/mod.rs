// Semdev tablet dispatcher
// Tool proximity, axis normalization, stylus buttons

pub mod tool;

use std::collections::HashMap;
use std::rc::Rc;

use crate::codes::*;
use crate::device::Device;
use crate::dispatch::DispatchCtx;
use crate::event::{
    AxisMask, ButtonState, Event, ProximityState, TabletAxes, TabletAxis,
};
use crate::frame::RawEvent;

use self::tool::{stamp_capabilities, TabletTool, ToolType};

const STATUS_NONE: u32 = 0;
const TOOL_OUT_OF_PROXIMITY: u32 = 1 << 0;
const TOOL_ENTERING_PROXIMITY: u32 = 1 << 1;
const TOOL_LEAVING_PROXIMITY: u32 = 1 << 2;
const STYLUS_IN_CONTACT: u32 = 1 << 3;
const AXES_UPDATED: u32 = 1 << 4;
const BUTTONS_PRESSED: u32 = 1 << 5;
const BUTTONS_RELEASED: u32 = 1 << 6;

const MASK_WORDS: usize = KEY_CNT / 64;

/// Mouse/lens rotation zero sits 5 degrees off the tilt-derived angle on
/// the physical tool.
const MOUSE_ROTATION_OFFSET: f64 = 5.0;
/// Artpen reports zero with the buttons pointing east.
const ARTPEN_ROTATION_OFFSET: f64 = 90.0;

fn axis_to_evcode(axis: TabletAxis) -> u16 {
    match axis {
        TabletAxis::X => ABS_X,
        TabletAxis::Y => ABS_Y,
        TabletAxis::Distance => ABS_DISTANCE,
        TabletAxis::Pressure => ABS_PRESSURE,
        TabletAxis::TiltX => ABS_TILT_X,
        TabletAxis::TiltY => ABS_TILT_Y,
        TabletAxis::RotationZ => ABS_Z,
        TabletAxis::Slider => ABS_WHEEL,
        TabletAxis::RelWheel => REL_WHEEL,
    }
}

fn evcode_to_axis(code: u16) -> Option<TabletAxis> {
    match code {
        ABS_X => Some(TabletAxis::X),
        ABS_Y => Some(TabletAxis::Y),
        ABS_DISTANCE => Some(TabletAxis::Distance),
        ABS_PRESSURE => Some(TabletAxis::Pressure),
        ABS_TILT_X => Some(TabletAxis::TiltX),
        ABS_TILT_Y => Some(TabletAxis::TiltY),
        ABS_Z => Some(TabletAxis::RotationZ),
        ABS_WHEEL => Some(TabletAxis::Slider),
        _ => None,
    }
}

/// Wrap-aware delta for degree-valued axes: 350 -> 10 is +20, not -340.
fn guess_wheel_delta(current: f64, old: f64) -> f64 {
    let d1 = current - old;
    let d2 = (current + 360.0) - old;
    let d3 = current - (old + 360.0);
    let mut delta = d1;
    if d2.abs() < delta.abs() {
        delta = d2;
    }
    if d3.abs() < delta.abs() {
        delta = d3;
    }
    delta
}

/// Dispatcher for tablet pen devices.
pub struct TabletDispatch {
    status: u32,
    changed: AxisMask,
    axes: TabletAxes,
    /// Raw rel-wheel delta accumulated this frame, kernel sign convention.
    wheel_delta_raw: i32,
    /// Last raw value per ABS code, mirrors the kernel's axis state.
    raw_abs: HashMap<u16, i32>,
    axis_caps: AxisMask,
    current_tool_type: Option<ToolType>,
    current_tool_id: u32,
    current_tool_serial: u32,
    /// Tools without a serial stay local to this tablet.
    local_tools: Vec<Rc<TabletTool>>,
    button_state: [u64; MASK_WORDS],
    prev_button_state: [u64; MASK_WORDS],
    wheel_click_angle: f64,
}

impl TabletDispatch {
    pub fn new(device: &Device, quirks: &crate::quirks::Quirks) -> Self {
        let mut axis_caps = AxisMask::empty();
        for axis in TabletAxis::ALL {
            let has = if axis == TabletAxis::RotationZ {
                // mouse/lens rotation is synthesized from the tilt pair
                device.descriptor.has_abs(ABS_Z)
                    || (device.descriptor.has_abs(ABS_TILT_X)
                        && device.descriptor.has_abs(ABS_TILT_Y))
            } else if axis == TabletAxis::RelWheel {
                device.descriptor.has_rel(REL_WHEEL)
            } else {
                device.descriptor.has_abs(axis_to_evcode(axis))
            };
            if has {
                axis_caps.set(axis);
            }
        }

        let mut tablet = Self {
            status: STATUS_NONE,
            changed: AxisMask::empty(),
            axes: TabletAxes::default(),
            wheel_delta_raw: 0,
            raw_abs: HashMap::new(),
            axis_caps,
            current_tool_type: None,
            current_tool_id: 0,
            current_tool_serial: 0,
            local_tools: Vec::new(),
            button_state: [0; MASK_WORDS],
            prev_button_state: [0; MASK_WORDS],
            wheel_click_angle: quirks
                .wheel_click_angle(device.descriptor.vendor_id, device.descriptor.product_id),
        };
        tablet.mark_all_axes_changed();
        tablet.set_status(TOOL_OUT_OF_PROXIMITY);
        tablet
    }

    fn has_status(&self, s: u32) -> bool {
        self.status & s != 0
    }

    fn set_status(&mut self, s: u32) {
        self.status |= s;
    }

    fn unset_status(&mut self, s: u32) {
        self.status &= !s;
    }

    fn mark_all_axes_changed(&mut self) {
        for axis in TabletAxis::ALL {
            if self.axis_caps.contains(axis) {
                self.changed.set(axis);
            }
        }
        self.set_status(AXES_UPDATED);
    }

    fn raw_value(&self, device: &Device, code: u16) -> i32 {
        self.raw_abs.get(&code).copied().unwrap_or_else(|| {
            device
                .descriptor
                .abs_info(code)
                .map(|i| i.minimum)
                .unwrap_or(0)
        })
    }

    pub fn process_frame(&mut self, device: &mut Device, ctx: &mut DispatchCtx, frame: &[RawEvent]) {
        for e in frame {
            match e.kind {
                EV_ABS => self.process_absolute(device, e),
                EV_REL => self.process_relative(device, e),
                EV_KEY => self.process_key(e),
                EV_MSC => self.process_misc(e),
                EV_SYN if e.code == SYN_REPORT => {
                    self.flush(device, ctx, e.time);
                    self.reset_state();
                }
                EV_SYN => {}
                other => {
                    log::error!("tablet: unexpected event type {:#x}", other);
                }
            }
        }
    }

    fn process_absolute(&mut self, device: &Device, e: &RawEvent) {
        match e.code {
            ABS_X | ABS_Y | ABS_Z | ABS_PRESSURE | ABS_TILT_X | ABS_TILT_Y | ABS_DISTANCE
            | ABS_WHEEL => {
                self.raw_abs.insert(e.code, e.value);
                if let Some(axis) = evcode_to_axis(e.code) {
                    self.changed.set(axis);
                    self.set_status(AXES_UPDATED);
                }
            }
            // the tool id used for the capability lookup
            ABS_MISC => {
                self.current_tool_id = e.value as u32;
            }
            other => {
                let _ = device;
                log::info!("tablet: unhandled ABS code {:#x}", other);
            }
        }
    }

    fn process_relative(&mut self, device: &Device, e: &RawEvent) {
        match e.code {
            REL_WHEEL => {
                self.changed.set(TabletAxis::RelWheel);
                self.wheel_delta_raw = -e.value;
                self.set_status(AXES_UPDATED);
            }
            other => {
                let _ = device;
                log::info!("tablet: unhandled REL code {:#x}", other);
            }
        }
    }

    fn process_key(&mut self, e: &RawEvent) {
        if let Some(tool_type) = ToolType::from_evcode(e.code) {
            self.update_tool(tool_type, e.value != 0);
            return;
        }
        match e.code {
            BTN_TOUCH => {
                if e.value != 0 {
                    self.set_status(STYLUS_IN_CONTACT);
                } else {
                    self.unset_status(STYLUS_IN_CONTACT);
                }
                self.update_button(e.code, e.value != 0);
            }
            BTN_LEFT | BTN_RIGHT | BTN_MIDDLE | BTN_SIDE | BTN_EXTRA | BTN_FORWARD | BTN_BACK
            | BTN_TASK | BTN_STYLUS | BTN_STYLUS2 => {
                self.update_button(e.code, e.value != 0);
            }
            other => {
                log::info!("tablet: unhandled button {:#x}", other);
            }
        }
    }

    fn process_misc(&mut self, e: &RawEvent) {
        match e.code {
            MSC_SERIAL => {
                if e.value != -1 {
                    self.current_tool_serial = e.value as u32;
                }
            }
            other => {
                log::info!("tablet: unhandled MSC code {:#x}", other);
            }
        }
    }

    fn update_tool(&mut self, tool_type: ToolType, enabled: bool) {
        if enabled {
            self.current_tool_type = Some(tool_type);
            self.mark_all_axes_changed();
            self.set_status(TOOL_ENTERING_PROXIMITY);
            self.unset_status(TOOL_OUT_OF_PROXIMITY);
        } else if !self.has_status(TOOL_OUT_OF_PROXIMITY) {
            self.set_status(TOOL_LEAVING_PROXIMITY);
        }
    }

    fn update_button(&mut self, code: u16, pressed: bool) {
        let word = code as usize / 64;
        let bit = 1u64 << (code as usize % 64);
        if pressed {
            self.button_state[word] |= bit;
            self.set_status(BUTTONS_PRESSED);
        } else {
            self.button_state[word] &= !bit;
            self.set_status(BUTTONS_RELEASED);
        }
    }

    fn normalize_unit(&self, device: &Device, code: u16) -> f64 {
        let Some(info) = device.descriptor.abs_info(code) else {
            return 0.0;
        };
        let range = info.range().max(1.0);
        f64::from(self.raw_value(device, code) - info.minimum) / range
    }

    fn normalize_tilt(&self, device: &Device, code: u16) -> f64 {
        self.normalize_unit(device, code) * 2.0 - 1.0
    }

    /// Mouse/lens tools have no rotation axis of their own; the tilt pair
    /// encodes the barrel angle instead.
    fn convert_tilt_to_rotation(&mut self) {
        let x = self.axes.get(TabletAxis::TiltX);
        let y = self.axes.get(TabletAxis::TiltY);
        self.changed.clear(TabletAxis::TiltX);
        self.changed.clear(TabletAxis::TiltY);

        // atan2 is CCW, screen rotation is CW: negate x
        let mut angle = 0.0;
        if x != 0.0 || y != 0.0 {
            angle = (-x).atan2(y).to_degrees();
        }
        let angle = (360.0 + angle - MOUSE_ROTATION_OFFSET).rem_euclid(360.0);

        self.axes.set(TabletAxis::RotationZ, angle);
        self.changed.set(TabletAxis::RotationZ);
    }

    /// Keep distance and pressure mutually exclusive, and clamp the final
    /// pressure report of a contact to exactly zero, once.
    fn sanitize_axes(&mut self, device: &Device) {
        let dist_min = device
            .descriptor
            .abs_info(ABS_DISTANCE)
            .map(|i| i.minimum)
            .unwrap_or(0);
        let pres_min = device
            .descriptor
            .abs_info(ABS_PRESSURE)
            .map(|i| i.minimum)
            .unwrap_or(0);

        if self.changed.contains(TabletAxis::Distance)
            && device.descriptor.has_abs(ABS_PRESSURE)
            && self.raw_value(device, ABS_DISTANCE) > dist_min
            && self.raw_value(device, ABS_PRESSURE) > pres_min
        {
            self.changed.clear(TabletAxis::Distance);
            self.axes.set(TabletAxis::Distance, 0.0);
        } else if self.changed.contains(TabletAxis::Pressure)
            && !self.has_status(STYLUS_IN_CONTACT)
        {
            if self.axes.get(TabletAxis::Pressure) == 0.0 {
                // a zero was already sent for this contact
                self.changed.clear(TabletAxis::Pressure);
            } else {
                self.axes.set(TabletAxis::Pressure, 0.0);
            }
        }

        let is_mouse_tool = matches!(
            self.current_tool_type,
            Some(ToolType::Mouse) | Some(ToolType::Lens)
        );
        if is_mouse_tool
            && (self.changed.contains(TabletAxis::TiltX)
                || self.changed.contains(TabletAxis::TiltY))
        {
            self.changed.set(TabletAxis::RotationZ);
        }
    }

    fn check_notify_axes(
        &mut self,
        device: &Device,
        ctx: &mut DispatchCtx,
        time: u64,
        tool: &Rc<TabletTool>,
    ) {
        let mut deltas = TabletAxes::default();
        let mut wheel_discrete = 0i32;
        let mut axis_update_needed = false;
        let is_mouse_tool = matches!(tool.tool_type, ToolType::Mouse | ToolType::Lens);

        for axis in TabletAxis::ALL {
            if !self.changed.contains(axis) {
                continue;
            }
            axis_update_needed = true;
            let oldval = self.axes.get(axis);

            // tilt precedes rotation in the axis order, so the tilt values
            // are already normalized when we get here
            if axis == TabletAxis::RotationZ && is_mouse_tool {
                self.convert_tilt_to_rotation();
                self.axes.set(TabletAxis::TiltX, 0.0);
                self.axes.set(TabletAxis::TiltY, 0.0);
                deltas.set(axis, guess_wheel_delta(self.axes.get(axis), oldval));
                continue;
            }
            if axis == TabletAxis::RelWheel {
                wheel_discrete = self.wheel_delta_raw;
                deltas.set(axis, f64::from(self.wheel_delta_raw) * self.wheel_click_angle);
                self.axes.set(axis, 0.0);
                continue;
            }

            let code = axis_to_evcode(axis);
            let value = match axis {
                TabletAxis::X | TabletAxis::Y => {
                    let raw = self.raw_value(device, code);
                    if device.left_handed.enabled {
                        if let Some(info) = device.descriptor.abs_info(code) {
                            f64::from(info.maximum - (raw - info.minimum))
                        } else {
                            f64::from(raw)
                        }
                    } else {
                        f64::from(raw)
                    }
                }
                TabletAxis::Pressure => {
                    // out of contact the only reportable pressure is zero
                    if self.has_status(STYLUS_IN_CONTACT) {
                        self.normalize_unit(device, code)
                    } else {
                        0.0
                    }
                }
                TabletAxis::Distance | TabletAxis::Slider => self.normalize_unit(device, code),
                TabletAxis::TiltX | TabletAxis::TiltY => self.normalize_tilt(device, code),
                TabletAxis::RotationZ => {
                    // artpen: absolute rotation, zero pointing east
                    let range = device
                        .descriptor
                        .abs_info(code)
                        .map(|i| i.range() + 1.0)
                        .unwrap_or(360.0);
                    let unit = f64::from(self.raw_value(device, code)) / range;
                    (unit * 360.0 + ARTPEN_ROTATION_OFFSET).rem_euclid(360.0)
                }
                TabletAxis::RelWheel => unreachable!(),
            };
            self.axes.set(axis, value);

            let delta = if axis == TabletAxis::RotationZ {
                guess_wheel_delta(value, oldval)
            } else {
                value - oldval
            };
            deltas.set(axis, delta);
        }

        // Tablets close enough to sense a tool but not read from it send
        // garbage axis values; suppress everything until proximity settles.
        if axis_update_needed
            && !self.has_status(TOOL_OUT_OF_PROXIMITY)
            && !self.has_status(TOOL_LEAVING_PROXIMITY)
        {
            if self.has_status(TOOL_ENTERING_PROXIMITY) {
                ctx.queue.push(Event::TabletProximity {
                    device: device.id,
                    time,
                    tool: tool.clone(),
                    state: ProximityState::In,
                    changed: self.changed,
                    axes: self.axes,
                });
            } else {
                ctx.queue.push(Event::TabletAxis {
                    device: device.id,
                    time,
                    tool: tool.clone(),
                    changed: self.changed,
                    axes: self.axes,
                    deltas,
                    wheel_discrete,
                });
            }
        }

        self.changed = AxisMask::empty();
    }

    fn get_tool(&mut self, device: &Device, ctx: &mut DispatchCtx) -> Option<Rc<TabletTool>> {
        let tool_type = self.current_tool_type?;
        let serial = self.current_tool_serial;
        let tool_id = self.current_tool_id;

        if serial != 0 {
            if let Some(tool) = ctx.tools.find(tool_type, serial) {
                return Some(tool);
            }
        } else if let Some(tool) = self.local_tools.iter().find(|t| t.tool_type == tool_type) {
            return Some(tool.clone());
        }

        let (axis_caps, buttons) =
            stamp_capabilities(tool_type, tool_id, self.axis_caps, |b| {
                device.descriptor.has_key(b)
            });
        let tool = Rc::new(TabletTool {
            tool_type,
            tool_id,
            serial,
            axis_caps,
            buttons,
        });
        if serial != 0 {
            ctx.tools.insert(tool.clone());
        } else {
            // serial-less tools are not globally unique, keep them local
            self.local_tools.push(tool.clone());
        }
        Some(tool)
    }

    fn notify_buttons(
        &mut self,
        device: &Device,
        ctx: &mut DispatchCtx,
        time: u64,
        tool: &Rc<TabletTool>,
        state: ButtonState,
    ) {
        for word in 0..MASK_WORDS {
            let mask = match state {
                ButtonState::Pressed => self.button_state[word] & !self.prev_button_state[word],
                ButtonState::Released => self.prev_button_state[word] & !self.button_state[word],
            };
            let mut bits = mask;
            while bits != 0 {
                let bit = bits.trailing_zeros();
                bits &= bits - 1;
                let button = (word * 64) as u16 + bit as u16;
                ctx.queue.push(Event::TabletButton {
                    device: device.id,
                    time,
                    tool: tool.clone(),
                    button,
                    state,
                });
            }
        }
    }

    fn flush(&mut self, device: &mut Device, ctx: &mut DispatchCtx, time: u64) {
        if self.has_status(TOOL_OUT_OF_PROXIMITY) {
            return;
        }
        let Some(tool) = self.get_tool(device, ctx) else {
            return;
        };

        if self.has_status(TOOL_LEAVING_PROXIMITY) {
            // force-release all stylus buttons before the proximity-out
            if self.button_state.iter().any(|w| *w != 0) {
                self.button_state = [0; MASK_WORDS];
                self.set_status(BUTTONS_RELEASED);
            }
        } else if self.has_status(AXES_UPDATED) || self.has_status(TOOL_ENTERING_PROXIMITY) {
            self.sanitize_axes(device);
            self.check_notify_axes(device, ctx, time, &tool);
            self.unset_status(TOOL_ENTERING_PROXIMITY);
            self.unset_status(AXES_UPDATED);
        }

        if self.has_status(BUTTONS_RELEASED) {
            self.notify_buttons(device, ctx, time, &tool, ButtonState::Released);
            self.unset_status(BUTTONS_RELEASED);
        }
        if self.has_status(BUTTONS_PRESSED) {
            self.notify_buttons(device, ctx, time, &tool, ButtonState::Pressed);
            self.unset_status(BUTTONS_PRESSED);
        }

        if self.has_status(TOOL_LEAVING_PROXIMITY) {
            self.changed = AxisMask::empty();
            ctx.queue.push(Event::TabletProximity {
                device: device.id,
                time,
                tool,
                state: ProximityState::Out,
                changed: AxisMask::empty(),
                axes: self.axes,
            });
            self.set_status(TOOL_OUT_OF_PROXIMITY);
            self.unset_status(TOOL_LEAVING_PROXIMITY);
            self.unset_status(AXES_UPDATED);
            self.current_tool_type = None;

            // left-handed flips coordinates; only safe with no tool near
            if device.left_handed.enabled != device.left_handed.want_enabled {
                device.left_handed.enabled = device.left_handed.want_enabled;
            }
        }
    }

    fn reset_state(&mut self) {
        self.prev_button_state = self.button_state;
        self.wheel_delta_raw = 0;
    }

    /// A tool already in proximity when the device is added synthesizes
    /// its proximity-in from the descriptor's initial state.
    pub fn post_added(&mut self, device: &mut Device, ctx: &mut DispatchCtx, now: u64) {
        let initial = device.descriptor.initial_down.clone();
        let tool_code = initial
            .iter()
            .copied()
            .find(|c| ToolType::from_evcode(*c).is_some());
        let Some(code) = tool_code else {
            return;
        };
        let tool_type = ToolType::from_evcode(code).unwrap_or(ToolType::Pen);
        self.update_tool(tool_type, true);
        self.flush(device, ctx, now);
        self.reset_state();
    }

    /// Terminal transition: buttons released, proximity closed.
    pub fn suspend(&mut self, device: &mut Device, ctx: &mut DispatchCtx, now: u64) {
        if self.has_status(TOOL_OUT_OF_PROXIMITY) {
            return;
        }
        self.set_status(TOOL_LEAVING_PROXIMITY);
        self.flush(device, ctx, now);
        self.reset_state();
    }
}
