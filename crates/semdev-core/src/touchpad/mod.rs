// Semdev touchpad dispatcher
// MT slot tracking, finger roles, scrolling, tapping, clicking

pub mod dwt;

pub(crate) mod buttons;
pub(crate) mod edge_scroll;
pub(crate) mod palm;
pub(crate) mod tap;

use smallvec::SmallVec;

use crate::codes::*;
use crate::config::ScrollMethod;
use crate::device::Device;
use crate::dispatch::DispatchCtx;
use crate::event::{AxisSource, ButtonState, ScrollAxis};
use crate::filter::{MotionDelta, MotionFilter, TouchpadAccelerator};
use crate::frame::RawEvent;
use crate::timer::{
    TimerKind, TimerWheel, EDGE_SCROLL_TIMEOUT, FINGER_SWITCH_TIMEOUT, SOFTBUTTON_TIMEOUT,
};

use self::buttons::{AreaState, ButtonRegion, ClickState, SoftButtonGeometry};
use self::edge_scroll::{EdgeGeometry, EdgeState, ScrollEdge};
use self::palm::{HoverThresholds, PalmGeometry};
use self::tap::{TapInput, TapMachine};

/// Default tap motion threshold in millimeters.
const TAP_MOVE_THRESHOLD_MM: f64 = 1.3;
/// Fallback threshold in device units when resolution is unknown.
const TAP_MOVE_THRESHOLD_UNITS: f64 = 30.0;
/// Accumulated two-finger travel that starts a scroll.
const SCROLL_START_THRESHOLD_MM: f64 = 2.0;
const SCROLL_START_THRESHOLD_UNITS: f64 = 40.0;
/// Factor converting millimeters to the 400dpi-equivalent units the
/// acceleration profile expects.
const MM_TO_NORMALIZED: f64 = 400.0 / 25.4;

/// Events a touchpad frame wants to emit, flushed in the fixed order
/// releases, motion, scroll, presses so per-event consumers never observe
/// an inconsistent cursor at a release site.
pub(crate) struct PendingFrame {
    time: u64,
    button_releases: SmallVec<[(u64, u16); 4]>,
    motion: Option<MotionDelta>,
    scrolls: SmallVec<[(ScrollAxis, f64); 4]>,
    button_presses: SmallVec<[(u64, u16); 4]>,
}

impl PendingFrame {
    pub fn new(time: u64) -> Self {
        Self {
            time,
            button_releases: SmallVec::new(),
            motion: None,
            scrolls: SmallVec::new(),
            button_presses: SmallVec::new(),
        }
    }

    pub fn push_press(&mut self, button: u16) {
        self.button_presses.push((self.time, button));
    }

    pub fn push_release(&mut self, button: u16) {
        self.button_releases.push((self.time, button));
    }

    /// Release stamped with an earlier timestamp; used by multi-tap so the
    /// pair boundaries stay strictly monotonic.
    pub fn push_release_at(&mut self, button: u16, time: u64) {
        self.button_releases.push((time, button));
    }

    pub fn set_motion(&mut self, delta: MotionDelta) {
        self.motion = Some(delta);
    }

    pub fn push_scroll(&mut self, axis: ScrollAxis, value: f64) {
        self.scrolls.push((axis, value));
    }

    pub fn flush(self, device: &Device, ctx: &mut DispatchCtx) {
        for (t, b) in self.button_releases {
            ctx.notify_button(device, t, b, ButtonState::Released);
        }
        if let Some(delta) = self.motion {
            if !delta.is_zero() {
                ctx.notify_motion(device, self.time, delta.dx, delta.dy);
            }
        }
        for (axis, value) in self.scrolls {
            ctx.notify_axis(device, self.time, axis, value, AxisSource::Finger);
        }
        for (t, b) in self.button_presses {
            ctx.notify_button(device, t, b, ButtonState::Pressed);
        }
    }

    #[cfg(test)]
    pub fn take_button_releases(&mut self) -> Vec<(u64, u16)> {
        self.button_releases.drain(..).collect()
    }

    #[cfg(test)]
    pub fn take_button_presses(&mut self) -> Vec<(u64, u16)> {
        self.button_presses.drain(..).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TouchState {
    #[default]
    None,
    /// Tracked but not in contact (pressure below the hover threshold).
    Hovering,
    Begin,
    Update,
    End,
}

#[derive(Debug, Default)]
struct Touch {
    state: TouchState,
    dirty: bool,
    /// Set while a tracking id arrived this frame and the touch has not
    /// been through begin resolution yet.
    pending_begin: bool,
    raw_x: i32,
    raw_y: i32,
    x: f64,
    y: f64,
    last_x: f64,
    last_y: f64,
    initial_x: f64,
    initial_y: f64,
    initial_time: u64,
    pressure: i32,
    palm: bool,
    thumb: bool,
    dwt_muted: bool,
    moved_past_threshold: bool,
    area: AreaState,
    area_deadline: u64,
    edge: EdgeState,
    edge_deadline: u64,
    edge_scrolled: bool,
}

impl Touch {
    fn is_contact(&self) -> bool {
        matches!(self.state, TouchState::Begin | TouchState::Update)
    }

    /// Participates in tapping, pointer motion, and 2fg scroll.
    fn is_active(&self) -> bool {
        self.is_contact()
            && !self.palm
            && !self.thumb
            && !self.dwt_muted
            && !matches!(self.edge, EdgeState::EdgeNew(_) | EdgeState::Edge(_))
            && matches!(self.area, AreaState::Area)
    }
}

/// Dispatcher for multitouch touchpads.
pub struct TouchpadDispatch {
    touches: Vec<Touch>,
    slot: usize,
    has_mt: bool,
    /// BTN_TOOL_* finger-count bits for fingers beyond the slot count.
    fake_finger_mask: u8,

    filter: TouchpadAccelerator,
    tap: TapMachine,
    click: ClickState,
    softbuttons: Option<SoftButtonGeometry>,
    edge_geo: Option<EdgeGeometry>,
    palm_geo: Option<PalmGeometry>,
    hover: Option<HoverThresholds>,
    dwt_exempt: bool,

    scroll_active: [bool; 2],
    scroll_accum: MotionDelta,
    finger_count: u32,
    finger_count_pending: u32,
    tap_touch_count: u32,

    phys_buttons: SmallVec<[(u16, bool); 2]>,

    res_x: f64,
    res_y: f64,
    fuzz_x: f64,
    fuzz_y: f64,
}

impl TouchpadDispatch {
    pub fn new(device: &Device, quirks: &crate::quirks::Quirks) -> Self {
        let quirk = quirks.lookup(device.descriptor.vendor_id, device.descriptor.product_id);
        let has_mt = device.descriptor.has_abs(ABS_MT_POSITION_X);
        let slots = if has_mt {
            device.descriptor.mt_slot_count.max(2)
        } else {
            1
        };

        let x_info = device
            .descriptor
            .abs_info(ABS_MT_POSITION_X)
            .or_else(|| device.descriptor.abs_info(ABS_X));
        let y_info = device
            .descriptor
            .abs_info(ABS_MT_POSITION_Y)
            .or_else(|| device.descriptor.abs_info(ABS_Y));

        let has_topbuttons =
            quirk.topbuttonpad || device.descriptor.has_property(PROP_TOPBUTTONPAD);
        let softbuttons = if device.is_clickpad() && !quirk.apple_clickpad {
            SoftButtonGeometry::new(device, has_topbuttons)
        } else {
            None
        };

        let mut touches = Vec::with_capacity(slots);
        touches.resize_with(slots, Touch::default);

        Self {
            touches,
            slot: 0,
            has_mt,
            fake_finger_mask: 0,
            filter: TouchpadAccelerator::new(),
            tap: TapMachine::new(device.config.tap_enabled),
            click: ClickState::new(),
            softbuttons,
            edge_geo: EdgeGeometry::new(device),
            palm_geo: PalmGeometry::new(device, &quirk),
            hover: HoverThresholds::from_quirk(&quirk),
            dwt_exempt: quirk.dwt_exempt,
            scroll_active: [false; 2],
            scroll_accum: MotionDelta::default(),
            finger_count: 0,
            finger_count_pending: 0,
            tap_touch_count: 0,
            phys_buttons: SmallVec::new(),
            res_x: x_info.map(|i| f64::from(i.resolution)).unwrap_or(0.0),
            res_y: y_info.map(|i| f64::from(i.resolution)).unwrap_or(0.0),
            fuzz_x: x_info.map(|i| f64::from(i.fuzz)).unwrap_or(0.0),
            fuzz_y: y_info.map(|i| f64::from(i.fuzz)).unwrap_or(0.0),
        }
    }

    pub fn tap_machine(&mut self) -> &mut TapMachine {
        &mut self.tap
    }

    pub fn set_accel_speed(&mut self, speed: f64) -> bool {
        self.filter.set_speed(speed)
    }

    fn tap_move_threshold(&self) -> f64 {
        if self.res_x > 0.0 {
            TAP_MOVE_THRESHOLD_MM * self.res_x
        } else {
            TAP_MOVE_THRESHOLD_UNITS
        }
    }

    fn scroll_threshold(&self) -> f64 {
        if self.res_x > 0.0 {
            SCROLL_START_THRESHOLD_MM * self.res_x
        } else {
            SCROLL_START_THRESHOLD_UNITS
        }
    }

    /// Convert a device-unit delta into the 400dpi-equivalent space used
    /// by the acceleration profile and scroll values.
    fn normalize_delta(&self, delta: MotionDelta) -> MotionDelta {
        if self.res_x > 0.0 && self.res_y > 0.0 {
            MotionDelta::new(
                delta.dx / self.res_x * MM_TO_NORMALIZED,
                delta.dy / self.res_y * MM_TO_NORMALIZED,
            )
        } else {
            delta
        }
    }

    pub fn process_frame(&mut self, device: &mut Device, ctx: &mut DispatchCtx, frame: &[RawEvent]) {
        for e in frame {
            match e.kind {
                EV_ABS => self.process_abs(e),
                EV_KEY => self.process_key(device, e),
                EV_SYN if e.code == SYN_REPORT => self.handle_state(device, ctx, e.time),
                EV_SYN | EV_MSC => {}
                other => {
                    log::error!("touchpad: unexpected event type {:#x}", other);
                }
            }
        }
    }

    fn process_abs(&mut self, e: &RawEvent) {
        if self.has_mt {
            match e.code {
                ABS_MT_SLOT => {
                    self.slot = (e.value.max(0) as usize).min(self.touches.len() - 1);
                }
                ABS_MT_TRACKING_ID => {
                    let slot = self.slot;
                    let touch = &mut self.touches[slot];
                    if e.value >= 0 {
                        touch.state = TouchState::Begin;
                        touch.pending_begin = true;
                        touch.dirty = true;
                    } else if touch.state != TouchState::None {
                        touch.state = TouchState::End;
                        touch.dirty = true;
                    }
                }
                ABS_MT_POSITION_X => {
                    let touch = &mut self.touches[self.slot];
                    touch.raw_x = e.value;
                    touch.dirty = true;
                }
                ABS_MT_POSITION_Y => {
                    let touch = &mut self.touches[self.slot];
                    touch.raw_y = e.value;
                    touch.dirty = true;
                }
                ABS_MT_PRESSURE => {
                    self.touches[self.slot].pressure = e.value;
                }
                _ => {}
            }
        } else {
            match e.code {
                ABS_X => {
                    let touch = &mut self.touches[0];
                    touch.raw_x = e.value;
                    touch.dirty = true;
                }
                ABS_Y => {
                    let touch = &mut self.touches[0];
                    touch.raw_y = e.value;
                    touch.dirty = true;
                }
                ABS_PRESSURE => {
                    self.touches[0].pressure = e.value;
                }
                _ => {}
            }
        }
    }

    fn process_key(&mut self, device: &Device, e: &RawEvent) {
        match e.code {
            BTN_TOUCH if !self.has_mt => {
                let touch = &mut self.touches[0];
                if e.value != 0 {
                    touch.state = TouchState::Begin;
                    touch.pending_begin = true;
                } else if touch.state != TouchState::None {
                    touch.state = TouchState::End;
                }
                touch.dirty = true;
            }
            BTN_TOUCH => {}
            BTN_TOOL_FINGER => self.set_fake_finger(0, e.value != 0),
            BTN_TOOL_DOUBLETAP => self.set_fake_finger(1, e.value != 0),
            BTN_TOOL_TRIPLETAP => self.set_fake_finger(2, e.value != 0),
            BTN_TOOL_QUADTAP => self.set_fake_finger(3, e.value != 0),
            BTN_TOOL_QUINTTAP => self.set_fake_finger(4, e.value != 0),
            BTN_LEFT | BTN_RIGHT | BTN_MIDDLE => {
                if e.value != 2 {
                    self.phys_buttons.push((e.code, e.value != 0));
                }
            }
            other => {
                let _ = device;
                log::debug!("touchpad: ignoring key {:#x}", other);
            }
        }
    }

    fn set_fake_finger(&mut self, bit: u8, set: bool) {
        if set {
            self.fake_finger_mask |= 1 << bit;
        } else {
            self.fake_finger_mask &= !(1 << bit);
        }
    }

    fn fake_finger_count(&self) -> u32 {
        // the highest set BTN_TOOL_* wins
        (8 - self.fake_finger_mask.leading_zeros()).min(5)
    }

    fn calibrate(&self, device: &Device, raw_x: i32, raw_y: i32) -> (f64, f64) {
        if device.config.calibration.is_identity() {
            return (f64::from(raw_x), f64::from(raw_y));
        }
        let x_code = if self.has_mt { ABS_MT_POSITION_X } else { ABS_X };
        let y_code = if self.has_mt { ABS_MT_POSITION_Y } else { ABS_Y };
        let (Some(xi), Some(yi)) = (
            device.descriptor.abs_info(x_code),
            device.descriptor.abs_info(y_code),
        ) else {
            return (f64::from(raw_x), f64::from(raw_y));
        };
        device.config.calibration.apply(
            f64::from(raw_x),
            f64::from(raw_y),
            f64::from(xi.minimum),
            f64::from(xi.maximum),
            f64::from(yi.minimum),
            f64::from(yi.maximum),
        )
    }

    /// Fuzz-based hysteresis: positions inside the margin stick to the
    /// previous value so a resting finger does not jitter the pointer.
    fn hysteresis(value: f64, center: f64, margin: f64) -> f64 {
        if (value - center).abs() <= margin {
            center
        } else if value > center {
            value - margin
        } else {
            value + margin
        }
    }

    fn begin_touch(&mut self, device: &Device, ctx: &mut DispatchCtx, idx: usize, time: u64) {
        let (x, y) = self.calibrate(device, self.touches[idx].raw_x, self.touches[idx].raw_y);

        // the scroll strips overlay the palm strip; with edge scrolling
        // configured a touch starting there is a scroll finger, not a palm
        let edge_candidate = if device.config.scroll_method == ScrollMethod::Edge {
            self.edge_geo.as_ref().and_then(|g| g.edge_at(x, y))
        } else {
            None
        };

        let palm = edge_candidate.is_none()
            && self
                .palm_geo
                .as_ref()
                .map(|g| g.is_palm_position(x, y))
                .unwrap_or(false);
        let thumb = !palm
            && edge_candidate.is_none()
            && self
                .palm_geo
                .as_ref()
                .map(|g| {
                    let pressure = if self.hover.is_some() || self.touches[idx].pressure > 0 {
                        Some(self.touches[idx].pressure)
                    } else {
                        None
                    };
                    g.is_thumb_position(y, pressure)
                })
                .unwrap_or(false);
        let dwt_muted = !self.dwt_exempt
            && device.config.dwt_enabled
            && ctx
                .seats
                .get(device.seat)
                .map(|s| s.typing.active(time))
                .unwrap_or(false);

        let area = match self.softbuttons.as_ref().map(|g| g.region_at(x, y)) {
            Some(r) if r.is_bottom() => AreaState::BottomNew,
            Some(r) if r.is_top() => AreaState::TopNew,
            _ => AreaState::Area,
        };
        if matches!(area, AreaState::BottomNew | AreaState::TopNew) {
            ctx.timers
                .set(device.id, TimerKind::SoftButton, time + SOFTBUTTON_TIMEOUT);
        }

        let edge = match edge_candidate {
            Some(edge) if !dwt_muted => {
                ctx.timers
                    .set(device.id, TimerKind::EdgeScroll, time + EDGE_SCROLL_TIMEOUT);
                EdgeState::EdgeNew(edge)
            }
            _ => EdgeState::Area,
        };

        let touch = &mut self.touches[idx];
        touch.x = x;
        touch.y = y;
        touch.last_x = x;
        touch.last_y = y;
        touch.initial_x = x;
        touch.initial_y = y;
        touch.initial_time = time;
        touch.palm = palm;
        touch.thumb = thumb;
        touch.dwt_muted = dwt_muted;
        touch.moved_past_threshold = false;
        touch.area = area;
        touch.area_deadline = time + SOFTBUTTON_TIMEOUT;
        touch.edge = edge;
        touch.edge_deadline = time + EDGE_SCROLL_TIMEOUT;
        touch.edge_scrolled = false;
        touch.pending_begin = false;
    }

    fn handle_state(&mut self, device: &mut Device, ctx: &mut DispatchCtx, time: u64) {
        let mut frame = PendingFrame::new(time);

        self.resolve_touch_transitions(device, ctx, time);
        let deltas = self.update_positions(device);
        self.update_area_states(time);
        self.feed_tap(device, ctx, time, &mut frame);
        self.handle_clicks(device, ctx, time, &mut frame);
        self.handle_motion_and_scroll(device, ctx, time, &mut frame, &deltas);
        self.handle_edge_scroll(device, time, &mut frame, &deltas);
        self.end_touches(&mut frame);

        frame.flush(device, ctx);
    }

    fn resolve_touch_transitions(&mut self, device: &mut Device, ctx: &mut DispatchCtx, time: u64) {
        for idx in 0..self.touches.len() {
            match self.touches[idx].state {
                TouchState::Begin if self.touches[idx].pending_begin => {
                    // hover-capable pads report non-contact fingers as
                    // touches with low pressure
                    if let Some(hover) = self.hover {
                        if self.touches[idx].pressure < hover.down {
                            self.touches[idx].state = TouchState::Hovering;
                            self.touches[idx].pending_begin = false;
                            let (x, y) = self.calibrate(
                                device,
                                self.touches[idx].raw_x,
                                self.touches[idx].raw_y,
                            );
                            self.touches[idx].x = x;
                            self.touches[idx].y = y;
                            continue;
                        }
                    }
                    self.begin_touch(device, ctx, idx, time);
                }
                TouchState::Hovering => {
                    if let Some(hover) = self.hover {
                        if self.touches[idx].pressure >= hover.down {
                            // finger landed: fresh touch, and the filter
                            // forgets the hover trajectory
                            self.touches[idx].state = TouchState::Begin;
                            self.begin_touch(device, ctx, idx, time);
                            self.filter.restart();
                        }
                    }
                }
                TouchState::Update => {
                    if let Some(hover) = self.hover {
                        if self.touches[idx].pressure > 0
                            && self.touches[idx].pressure < hover.up
                        {
                            self.touches[idx].state = TouchState::Hovering;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Calibrate dirty positions and compute per-touch deltas.
    fn update_positions(&mut self, device: &Device) -> Vec<MotionDelta> {
        let mut deltas = vec![MotionDelta::default(); self.touches.len()];
        let threshold = self.tap_move_threshold();

        for idx in 0..self.touches.len() {
            if !self.touches[idx].dirty {
                continue;
            }
            let state = self.touches[idx].state;
            if !matches!(state, TouchState::Begin | TouchState::Update | TouchState::Hovering) {
                continue;
            }
            let (cx, cy) = self.calibrate(device, self.touches[idx].raw_x, self.touches[idx].raw_y);
            let touch = &mut self.touches[idx];
            touch.x = Self::hysteresis(cx, touch.x, self.fuzz_x);
            touch.y = Self::hysteresis(cy, touch.y, self.fuzz_y);

            if state == TouchState::Update {
                deltas[idx] = MotionDelta::new(touch.x - touch.last_x, touch.y - touch.last_y);
            }
            touch.last_x = touch.x;
            touch.last_y = touch.y;

            let moved = ((touch.x - touch.initial_x).powi(2)
                + (touch.y - touch.initial_y).powi(2))
            .sqrt();
            if moved > threshold && !touch.moved_past_threshold {
                touch.moved_past_threshold = true;
            }

            // begins become updates once their first frame is done
            if state == TouchState::Begin && !touch.pending_begin {
                touch.state = TouchState::Update;
            }
        }

        for touch in &mut self.touches {
            touch.dirty = false;
        }
        deltas
    }

    fn update_area_states(&mut self, time: u64) {
        let Some(geometry) = self.softbuttons.clone() else {
            return;
        };
        for touch in &mut self.touches {
            if !touch.is_contact() {
                continue;
            }
            match touch.area {
                AreaState::BottomNew | AreaState::TopNew => {
                    let region = geometry.region_at(touch.x, touch.y);
                    let still_inside = if touch.area == AreaState::BottomNew {
                        region.is_bottom()
                    } else {
                        region.is_top()
                    };
                    if touch.moved_past_threshold || !still_inside {
                        // a moving finger is a pointer, not a button press
                        touch.area = AreaState::Area;
                    } else if time >= touch.area_deadline {
                        touch.area = if touch.area == AreaState::BottomNew {
                            AreaState::Bottom
                        } else {
                            AreaState::Top
                        };
                    }
                }
                _ => {}
            }
        }
    }

    fn active_touch_count(&self) -> u32 {
        self.touches.iter().filter(|t| t.is_active()).count() as u32
    }

    /// Count used for tapping: slot contacts, or the BTN_TOOL count when
    /// more fingers are down than the pad has slots.
    fn tap_relevant_count(&self) -> u32 {
        let slot_count = self.active_touch_count();
        let fake = self.fake_finger_count();
        if fake > self.touches.len() as u32 {
            fake
        } else {
            slot_count
        }
    }

    fn feed_tap(&mut self, device: &Device, ctx: &mut DispatchCtx, time: u64, frame: &mut PendingFrame) {
        // motion first: a moving touch kills the tap before count changes
        let any_moved = self
            .touches
            .iter()
            .any(|t| t.is_active() && t.moved_past_threshold);
        if any_moved {
            self.tap
                .handle(TapInput::Motion, time, device.id, frame, ctx.timers);
        }

        let count = self.tap_relevant_count();
        while self.tap_touch_count < count {
            self.tap
                .handle(TapInput::Down, time, device.id, frame, ctx.timers);
            self.tap_touch_count += 1;
        }
        while self.tap_touch_count > count {
            self.tap
                .handle(TapInput::Up, time, device.id, frame, ctx.timers);
            self.tap_touch_count -= 1;
        }
    }

    /// First touch still down, by age. Its position picks the soft-button
    /// region for a physical click.
    fn oldest_touch_region(&self) -> ButtonRegion {
        let oldest = self
            .touches
            .iter()
            .filter(|t| t.is_contact())
            .min_by_key(|t| t.initial_time);
        let Some(touch) = oldest else {
            return ButtonRegion::None;
        };
        match touch.area {
            AreaState::Bottom | AreaState::BottomNew | AreaState::Top | AreaState::TopNew => self
                .softbuttons
                .as_ref()
                .map(|g| g.region_at(touch.x, touch.y))
                .unwrap_or(ButtonRegion::None),
            AreaState::Area => ButtonRegion::None,
        }
    }

    fn click_finger_count(&self) -> u32 {
        self.touches
            .iter()
            .filter(|t| t.is_contact() && !t.palm && !t.thumb)
            .count() as u32
    }

    fn handle_clicks(
        &mut self,
        device: &Device,
        ctx: &mut DispatchCtx,
        time: u64,
        frame: &mut PendingFrame,
    ) {
        let clicks = std::mem::take(&mut self.phys_buttons);
        for (code, pressed) in clicks {
            if pressed {
                // an in-flight tap ends before the physical click
                self.tap
                    .handle(TapInput::Click, time, device.id, frame, ctx.timers);
            }

            if self.softbuttons.is_some() || device.is_clickpad() {
                let region = self.oldest_touch_region();
                let fingers = self.click_finger_count();
                if let Some((button, is_press)) = self.click.handle_click(
                    device,
                    device.config.click_method,
                    pressed,
                    region,
                    fingers,
                ) {
                    if is_press {
                        frame.push_press(button);
                    } else {
                        frame.push_release(button);
                    }
                }
            } else {
                // separate physical buttons pass through, left-handed aware
                let button = device.map_button(code);
                if pressed {
                    frame.push_press(button);
                } else {
                    frame.push_release(button);
                }
            }
        }
    }

    fn stop_scroll(&mut self, frame: &mut PendingFrame) {
        if self.scroll_active[0] {
            frame.push_scroll(ScrollAxis::Vertical, 0.0);
            self.scroll_active[0] = false;
        }
        if self.scroll_active[1] {
            frame.push_scroll(ScrollAxis::Horizontal, 0.0);
            self.scroll_active[1] = false;
        }
        self.scroll_accum = MotionDelta::default();
    }

    fn handle_motion_and_scroll(
        &mut self,
        device: &Device,
        ctx: &mut DispatchCtx,
        time: u64,
        frame: &mut PendingFrame,
        deltas: &[MotionDelta],
    ) {
        let mut count = self.active_touch_count();

        // tap-dragging and a held clickpad button force single-finger mode
        if self.tap.is_dragging() || self.click.button_is_down() {
            if count > 0 {
                count = 1;
            }
            if self.scroll_active.iter().any(|a| *a) {
                self.stop_scroll(frame);
            }
            self.finger_count = count;
            self.finger_count_pending = 0;
            ctx.timers.cancel(device.id, TimerKind::FingerSwitch);
        } else if count != self.finger_count {
            if count == 0 {
                self.stop_scroll(frame);
                self.finger_count = 0;
                self.finger_count_pending = 0;
                ctx.timers.cancel(device.id, TimerKind::FingerSwitch);
            } else if !self.scroll_active.iter().any(|a| *a) {
                // no gesture in flight: switch immediately, no latency
                self.finger_count = count;
                self.finger_count_pending = 0;
            } else if count != self.finger_count_pending {
                self.finger_count_pending = count;
                ctx.timers
                    .set(device.id, TimerKind::FingerSwitch, time + FINGER_SWITCH_TIMEOUT);
            }
        } else {
            self.finger_count_pending = 0;
        }

        if self.finger_count_pending != 0 {
            // hand-off in progress, hold events until it settles
            return;
        }

        let natural = if device.config.natural_scroll { -1.0 } else { 1.0 };

        match self.finger_count {
            0 => {}
            2 if device.config.scroll_method == ScrollMethod::TwoFinger => {
                // average the two active touches
                let mut sum = MotionDelta::default();
                let mut n = 0.0;
                for (idx, touch) in self.touches.iter().enumerate() {
                    if touch.is_active() {
                        sum.dx += deltas[idx].dx;
                        sum.dy += deltas[idx].dy;
                        n += 1.0;
                    }
                }
                if n > 0.0 {
                    sum.dx /= n;
                    sum.dy /= n;
                }

                let threshold = self.scroll_threshold();
                let started = self.scroll_active.iter().any(|a| *a);
                let emit = if started {
                    sum
                } else {
                    self.scroll_accum.dx += sum.dx;
                    self.scroll_accum.dy += sum.dy;
                    if self.scroll_accum.dx.abs() < threshold
                        && self.scroll_accum.dy.abs() < threshold
                    {
                        return;
                    }
                    // entering scroll flushes any pointer motion in flight,
                    // and the pre-threshold travel is emitted in one piece
                    // so scroll totals match finger displacement
                    self.filter.dispatch(MotionDelta::default(), time);
                    std::mem::take(&mut self.scroll_accum)
                };

                let normalized = self.normalize_delta(emit);
                if normalized.dy != 0.0 {
                    frame.push_scroll(ScrollAxis::Vertical, normalized.dy * natural);
                    self.scroll_active[0] = true;
                }
                if normalized.dx != 0.0 {
                    frame.push_scroll(ScrollAxis::Horizontal, normalized.dx * natural);
                    self.scroll_active[1] = true;
                }
            }
            _ => {
                if self.scroll_active.iter().any(|a| *a) {
                    self.stop_scroll(frame);
                }
                // the pointing finger is the most recent active touch
                let pointing = self
                    .touches
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.is_active())
                    .max_by_key(|(_, t)| t.initial_time)
                    .map(|(i, _)| i);
                let Some(idx) = pointing else {
                    return;
                };

                let delta = if self.click.button_is_down() && device.is_clickpad() {
                    // clicked clickpad: combine all active touches
                    let mut sum = MotionDelta::default();
                    for (i, touch) in self.touches.iter().enumerate() {
                        if touch.is_active() {
                            sum.dx += deltas[i].dx;
                            sum.dy += deltas[i].dy;
                        }
                    }
                    sum
                } else {
                    deltas[idx]
                };

                if !delta.is_zero() {
                    let accel = self.filter.dispatch(self.normalize_delta(delta), time);
                    frame.set_motion(accel);
                }
            }
        }
    }

    fn handle_edge_scroll(
        &mut self,
        device: &Device,
        time: u64,
        frame: &mut PendingFrame,
        deltas: &[MotionDelta],
    ) {
        let Some(geometry) = self.edge_geo.clone() else {
            return;
        };
        for idx in 0..self.touches.len() {
            let state = self.touches[idx].edge;
            match state {
                EdgeState::EdgeNew(edge) => {
                    let touch = &self.touches[idx];
                    if geometry.edge_at(touch.x, touch.y) != Some(edge) {
                        // wandered off before activation
                        self.touches[idx].edge = EdgeState::Area;
                    } else if time >= touch.edge_deadline {
                        self.touches[idx].edge = EdgeState::Edge(edge);
                    }
                }
                EdgeState::Edge(edge) => {
                    if !self.touches[idx].is_contact() {
                        continue;
                    }
                    let delta = deltas[idx];
                    let normalized = self.normalize_delta(delta);
                    let natural = if device.config.natural_scroll { -1.0 } else { 1.0 };
                    match edge {
                        ScrollEdge::Right if normalized.dy != 0.0 => {
                            frame.push_scroll(ScrollAxis::Vertical, normalized.dy * natural);
                            self.touches[idx].edge_scrolled = true;
                        }
                        ScrollEdge::Bottom if normalized.dx != 0.0 => {
                            frame.push_scroll(ScrollAxis::Horizontal, normalized.dx * natural);
                            self.touches[idx].edge_scrolled = true;
                        }
                        _ => {}
                    }
                }
                EdgeState::Area => {}
            }
        }
    }

    fn end_touches(&mut self, frame: &mut PendingFrame) {
        for touch in &mut self.touches {
            if touch.state != TouchState::End {
                continue;
            }
            if touch.edge_scrolled {
                // an edge scroll closes with a stop event at lift
                match touch.edge {
                    EdgeState::Edge(ScrollEdge::Right) => {
                        frame.push_scroll(ScrollAxis::Vertical, 0.0)
                    }
                    EdgeState::Edge(ScrollEdge::Bottom) => {
                        frame.push_scroll(ScrollAxis::Horizontal, 0.0)
                    }
                    _ => {}
                }
            }
            *touch = Touch::default();
        }
    }

    pub fn handle_timeout(
        &mut self,
        device: &mut Device,
        ctx: &mut DispatchCtx,
        kind: TimerKind,
        now: u64,
    ) {
        let mut frame = PendingFrame::new(now);
        match kind {
            TimerKind::Tap => {
                self.tap
                    .handle(TapInput::TimeoutTap, now, device.id, &mut frame, ctx.timers);
            }
            TimerKind::TapDrag => {
                self.tap
                    .handle(TapInput::TimeoutDrag, now, device.id, &mut frame, ctx.timers);
            }
            TimerKind::SoftButton => self.update_area_states(now),
            TimerKind::EdgeScroll => {
                let empty = vec![MotionDelta::default(); self.touches.len()];
                self.handle_edge_scroll(device, now, &mut frame, &empty);
            }
            TimerKind::FingerSwitch => {
                if self.finger_count_pending != 0 {
                    self.stop_scroll(&mut frame);
                    self.finger_count = self.finger_count_pending;
                    self.finger_count_pending = 0;
                }
            }
            _ => {}
        }
        frame.flush(device, ctx);
    }

    /// Terminal transition: release buttons, stop scrolls, drop touches.
    pub fn suspend(&mut self, device: &mut Device, ctx: &mut DispatchCtx, now: u64) {
        let mut frame = PendingFrame::new(now);
        self.tap.cancel(now, device.id, &mut frame, ctx.timers);
        self.tap_touch_count = 0;
        if let Some(button) = self.click.force_release() {
            frame.push_release(button);
        }
        self.stop_scroll(&mut frame);
        for touch in &mut self.touches {
            if touch.edge_scrolled {
                match touch.edge {
                    EdgeState::Edge(ScrollEdge::Right) => {
                        frame.push_scroll(ScrollAxis::Vertical, 0.0)
                    }
                    EdgeState::Edge(ScrollEdge::Bottom) => {
                        frame.push_scroll(ScrollAxis::Horizontal, 0.0)
                    }
                    _ => {}
                }
            }
            *touch = Touch::default();
        }
        self.fake_finger_mask = 0;
        self.finger_count = 0;
        self.finger_count_pending = 0;
        ctx.timers.cancel_device(device.id);
        self.filter.restart();
        frame.flush(device, ctx);
    }
}
