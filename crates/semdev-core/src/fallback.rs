// Semdev fallback dispatcher
// Relative pointers, wheels, buttons, single-touch and combo devices

use smallvec::SmallVec;

use crate::codes::*;
use crate::config::{AccelProfile, ScrollMethod};
use crate::device::{Capability, Device};
use crate::dispatch::DispatchCtx;
use crate::event::{AbsolutePosition, AxisSource, ButtonState, ScrollAxis};
use crate::filter::{MotionDelta, MotionFilter, PointerAccelerator, TouchpadAccelerator};
use crate::frame::RawEvent;
use crate::keyboard::KeyboardDispatch;
use crate::timer::{TimerKind, BUTTON_SCROLL_TIMEOUT, MIDDLEBUTTON_TIMEOUT};

const MASK_WORDS: usize = KEY_CNT / 64;

/// Middle-button emulation: a left+right chord within the pairing window
/// becomes a middle click. Only runs on devices without a real middle
/// button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MiddleState {
    Idle,
    /// One of the pair is down, press withheld until timeout or partner.
    Pending(u16),
    /// Both down, middle is held.
    Middle,
    /// Middle released, the other physical button is still down and its
    /// release must be swallowed.
    MiddleWait(u16),
    /// Emulation stood down for this interaction; events pass through
    /// until all buttons are up.
    Passthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonScrollState {
    Idle,
    /// Scroll button down, press withheld, timer running.
    Pending,
    /// Timeout passed without motion.
    Ready,
    Scrolling,
}

#[derive(Debug, Default, Clone, Copy)]
struct SingleTouch {
    down: bool,
    seat_slot: Option<u32>,
    x: i32,
    y: i32,
    changed: bool,
    begin: bool,
    end: bool,
}

/// Pending button emissions for one frame, flushed releases-first.
#[derive(Default)]
struct FrameButtons {
    releases: SmallVec<[u16; 4]>,
    presses: SmallVec<[u16; 4]>,
}

impl FrameButtons {
    fn push(&mut self, button: u16, state: ButtonState) {
        match state {
            ButtonState::Pressed => self.presses.push(button),
            ButtonState::Released => self.releases.push(button),
        }
    }
}

/// Dispatcher for everything that is not a touchpad, tablet, button-set or
/// plain keyboard: mice, trackpoints, absolute pointers, single-touch
/// devices, and key/pointer combos.
pub struct FallbackDispatch {
    filter: Box<dyn MotionFilter>,
    dpi: u32,
    /// Keyboard half of a combo device, if any.
    keyboard: Option<KeyboardDispatch>,

    rel_delta: MotionDelta,
    wheel_clicks_v: i32,
    wheel_clicks_h: i32,
    wheel_click_angle: f64,

    middle_enabled: bool,
    middle: MiddleState,
    buttonscroll: ButtonScrollState,

    abs_x: i32,
    abs_y: i32,
    abs_changed: bool,
    touch: SingleTouch,

    /// Logical buttons we have emitted as pressed.
    buttons_down: [u64; MASK_WORDS],
    frame_buttons: FrameButtons,
}

impl FallbackDispatch {
    pub fn new(device: &Device, quirks: &crate::quirks::Quirks) -> Self {
        let dpi = quirks.mouse_dpi(device.descriptor.vendor_id, device.descriptor.product_id);
        let keyboard = if device.capabilities.has(Capability::Keyboard) {
            Some(KeyboardDispatch::new(device, quirks))
        } else {
            None
        };
        let middle_enabled = device.descriptor.has_key(BTN_LEFT)
            && device.descriptor.has_key(BTN_RIGHT)
            && !device.descriptor.has_key(BTN_MIDDLE);
        Self {
            filter: Box::new(PointerAccelerator::new(dpi)),
            dpi,
            keyboard,
            rel_delta: MotionDelta::default(),
            wheel_clicks_v: 0,
            wheel_clicks_h: 0,
            wheel_click_angle: quirks
                .wheel_click_angle(device.descriptor.vendor_id, device.descriptor.product_id),
            middle_enabled,
            middle: MiddleState::Idle,
            buttonscroll: ButtonScrollState::Idle,
            abs_x: 0,
            abs_y: 0,
            abs_changed: false,
            touch: SingleTouch::default(),
            buttons_down: [0; MASK_WORDS],
            frame_buttons: FrameButtons::default(),
        }
    }

    pub fn set_accel_speed(&mut self, speed: f64) -> bool {
        self.filter.set_speed(speed)
    }

    /// Swap the acceleration curve, preserving the speed setting.
    pub fn set_accel_profile(&mut self, profile: AccelProfile) {
        let speed = self.filter.speed();
        self.filter = match profile {
            AccelProfile::SmoothSimple => Box::new(PointerAccelerator::new(self.dpi)),
            AccelProfile::Linear => Box::new(TouchpadAccelerator::new()),
        };
        self.filter.set_speed(speed);
    }

    pub fn halfkey(&mut self) -> Option<&mut crate::halfkey::Halfkey> {
        self.keyboard.as_mut().map(|k| &mut k.halfkey)
    }

    fn button_is_down(&self, code: u16) -> bool {
        self.buttons_down[code as usize / 64] & (1 << (code as usize % 64)) != 0
    }

    fn set_button_down(&mut self, code: u16, down: bool) {
        let word = code as usize / 64;
        let bit = 1u64 << (code as usize % 64);
        if down {
            self.buttons_down[word] |= bit;
        } else {
            self.buttons_down[word] &= !bit;
        }
    }

    fn queue_button(&mut self, button: u16, state: ButtonState) {
        let pressed = state == ButtonState::Pressed;
        if pressed == self.button_is_down(button) {
            return;
        }
        self.set_button_down(button, pressed);
        self.frame_buttons.push(button, state);
    }

    pub fn process_frame(&mut self, device: &mut Device, ctx: &mut DispatchCtx, frame: &[RawEvent]) {
        for e in frame {
            match e.kind {
                EV_REL => self.process_relative(e),
                EV_ABS => self.process_absolute(device, e),
                EV_KEY if is_button_code(e.code) => self.process_button(device, ctx, e),
                EV_KEY => {
                    if let Some(keyboard) = self.keyboard.as_mut() {
                        if e.value != 2 {
                            keyboard.handle_key(device, ctx, e.time, e.code, e.value != 0);
                        }
                    }
                }
                EV_SYN if e.code == SYN_REPORT => self.flush(device, ctx, e.time),
                EV_SYN | EV_MSC | EV_SW => {}
                other => {
                    log::error!("fallback: unexpected event type {:#x}", other);
                }
            }
        }
    }

    fn process_relative(&mut self, e: &RawEvent) {
        match e.code {
            REL_X => self.rel_delta.dx += f64::from(e.value),
            REL_Y => self.rel_delta.dy += f64::from(e.value),
            REL_WHEEL => self.wheel_clicks_v += e.value,
            REL_HWHEEL => self.wheel_clicks_h += e.value,
            _ => {}
        }
    }

    fn process_absolute(&mut self, device: &Device, e: &RawEvent) {
        match e.code {
            ABS_X => {
                self.abs_x = e.value;
                self.abs_changed = true;
                if self.touch.down {
                    self.touch.x = e.value;
                    self.touch.changed = true;
                }
            }
            ABS_Y => {
                self.abs_y = e.value;
                self.abs_changed = true;
                if self.touch.down {
                    self.touch.y = e.value;
                    self.touch.changed = true;
                }
            }
            _ => {
                let _ = device;
            }
        }
    }

    fn process_button(&mut self, device: &Device, ctx: &mut DispatchCtx, e: &RawEvent) {
        if e.value == 2 {
            return;
        }
        let pressed = e.value != 0;

        if e.code == BTN_TOUCH && device.capabilities.has(Capability::Touch) {
            self.touch.down = pressed;
            if pressed {
                self.touch.begin = true;
                self.touch.x = self.abs_x;
                self.touch.y = self.abs_y;
            } else {
                self.touch.end = true;
            }
            return;
        }

        let button = device.map_button(e.code);

        // scroll-button hold takes the button out of the click path
        if device.config.scroll_method == ScrollMethod::OnButtonDown
            && button == device.config.scroll_button
        {
            self.buttonscroll_button(device, ctx, e.time, pressed);
            return;
        }

        if self.middle_enabled && matches!(button, BTN_LEFT | BTN_RIGHT) {
            self.middlebutton_event(device, ctx, e.time, button, pressed);
        } else {
            self.queue_button(
                button,
                if pressed {
                    ButtonState::Pressed
                } else {
                    ButtonState::Released
                },
            );
        }
    }

    fn middlebutton_event(
        &mut self,
        device: &Device,
        ctx: &mut DispatchCtx,
        time: u64,
        button: u16,
        pressed: bool,
    ) {
        match (self.middle, pressed) {
            (MiddleState::Idle, true) => {
                self.middle = MiddleState::Pending(button);
                ctx.timers
                    .set(device.id, TimerKind::MiddleButton, time + MIDDLEBUTTON_TIMEOUT);
            }
            (MiddleState::Pending(pending), true) if pending != button => {
                ctx.timers.cancel(device.id, TimerKind::MiddleButton);
                self.middle = MiddleState::Middle;
                self.queue_button(BTN_MIDDLE, ButtonState::Pressed);
            }
            (MiddleState::Pending(pending), false) if pending == button => {
                // quick click of a single button: deliver the withheld
                // pair in press/release order, immediately
                ctx.timers.cancel(device.id, TimerKind::MiddleButton);
                self.middle = MiddleState::Idle;
                emit_click_pair(device, ctx, time, button);
            }
            (MiddleState::Middle, false) => {
                self.queue_button(BTN_MIDDLE, ButtonState::Released);
                self.middle = MiddleState::MiddleWait(other_button(button));
            }
            (MiddleState::MiddleWait(remaining), false) if remaining == button => {
                self.middle = MiddleState::Idle;
            }
            (MiddleState::MiddleWait(_), true) => {
                self.middle = MiddleState::Middle;
                self.queue_button(BTN_MIDDLE, ButtonState::Pressed);
            }
            (MiddleState::Passthrough, _) => {
                self.queue_button(
                    button,
                    if pressed {
                        ButtonState::Pressed
                    } else {
                        ButtonState::Released
                    },
                );
                if !pressed && !self.button_is_down(other_button(button)) {
                    self.middle = MiddleState::Idle;
                }
            }
            (state, _) => {
                log::error!(
                    "middlebutton: unexpected {} {:?} in state {:?}",
                    button,
                    pressed,
                    state
                );
                self.middle = MiddleState::Idle;
            }
        }
    }

    /// The pairing window closed with only one button down: it was a real
    /// single press after all.
    fn middlebutton_timeout(&mut self, device: &mut Device, ctx: &mut DispatchCtx, now: u64) {
        if let MiddleState::Pending(button) = self.middle {
            self.middle = MiddleState::Passthrough;
            self.queue_button(button, ButtonState::Pressed);
            self.flush_buttons(device, ctx, now);
        }
    }

    fn buttonscroll_button(
        &mut self,
        device: &Device,
        ctx: &mut DispatchCtx,
        time: u64,
        pressed: bool,
    ) {
        if pressed {
            self.buttonscroll = ButtonScrollState::Pending;
            ctx.timers
                .set(device.id, TimerKind::ButtonScroll, time + BUTTON_SCROLL_TIMEOUT);
            return;
        }
        ctx.timers.cancel(device.id, TimerKind::ButtonScroll);
        match self.buttonscroll {
            ButtonScrollState::Pending => {
                // released before anything happened: it was a click
                emit_click_pair(device, ctx, time, device.config.scroll_button);
            }
            ButtonScrollState::Scrolling => {
                // scroll sequence ends with a stop event
                ctx.notify_axis(device, time, ScrollAxis::Vertical, 0.0, AxisSource::Continuous);
                ctx.notify_axis(device, time, ScrollAxis::Horizontal, 0.0, AxisSource::Continuous);
            }
            ButtonScrollState::Ready | ButtonScrollState::Idle => {}
        }
        self.buttonscroll = ButtonScrollState::Idle;
    }

    fn buttonscroll_timeout(&mut self) {
        if self.buttonscroll == ButtonScrollState::Pending {
            self.buttonscroll = ButtonScrollState::Ready;
        }
    }

    pub fn handle_timeout(
        &mut self,
        device: &mut Device,
        ctx: &mut DispatchCtx,
        kind: TimerKind,
        now: u64,
    ) {
        match kind {
            TimerKind::MiddleButton => self.middlebutton_timeout(device, ctx, now),
            TimerKind::ButtonScroll => self.buttonscroll_timeout(),
            _ => {}
        }
    }

    fn flush_buttons(&mut self, device: &Device, ctx: &mut DispatchCtx, time: u64) {
        let buttons = std::mem::take(&mut self.frame_buttons);
        for b in buttons.releases {
            ctx.notify_button(device, time, b, ButtonState::Released);
        }
        for b in buttons.presses {
            ctx.notify_button(device, time, b, ButtonState::Pressed);
        }
    }

    fn flush(&mut self, device: &mut Device, ctx: &mut DispatchCtx, time: u64) {
        let natural = if device.config.natural_scroll { -1.0 } else { 1.0 };

        // releases first so a consumer redrawing per event never sees the
        // cursor move while a stale button appears held
        let buttons = std::mem::take(&mut self.frame_buttons);
        for b in &buttons.releases {
            ctx.notify_button(device, time, *b, ButtonState::Released);
        }

        let delta = std::mem::take(&mut self.rel_delta);
        if !delta.is_zero() {
            if matches!(
                self.buttonscroll,
                ButtonScrollState::Pending | ButtonScrollState::Ready | ButtonScrollState::Scrolling
            ) {
                self.buttonscroll = ButtonScrollState::Scrolling;
                ctx.timers.cancel(device.id, TimerKind::ButtonScroll);
                if delta.dy != 0.0 {
                    ctx.notify_axis(
                        device,
                        time,
                        ScrollAxis::Vertical,
                        delta.dy * natural,
                        AxisSource::Continuous,
                    );
                }
                if delta.dx != 0.0 {
                    ctx.notify_axis(
                        device,
                        time,
                        ScrollAxis::Horizontal,
                        delta.dx * natural,
                        AxisSource::Continuous,
                    );
                }
            } else {
                let accel = self.filter.dispatch(delta, time);
                ctx.notify_motion(device, time, accel.dx, accel.dy);
            }
        }

        if self.abs_changed && !device.capabilities.has(Capability::Touch) {
            self.abs_changed = false;
            ctx.notify_motion_absolute(device, time, self.absolute_position(device));
        }
        self.flush_touch(device, ctx, time);

        let clicks_v = std::mem::take(&mut self.wheel_clicks_v);
        if clicks_v != 0 {
            // positive wheel turns mean "up", pointer axes grow downward
            ctx.notify_axis(
                device,
                time,
                ScrollAxis::Vertical,
                f64::from(-clicks_v) * self.wheel_click_angle * natural,
                AxisSource::Wheel,
            );
        }
        let clicks_h = std::mem::take(&mut self.wheel_clicks_h);
        if clicks_h != 0 {
            ctx.notify_axis(
                device,
                time,
                ScrollAxis::Horizontal,
                f64::from(clicks_h) * self.wheel_click_angle * natural,
                AxisSource::Wheel,
            );
        }

        for b in &buttons.presses {
            ctx.notify_button(device, time, *b, ButtonState::Pressed);
        }
    }

    fn absolute_position(&self, device: &Device) -> AbsolutePosition {
        let x_info = device.descriptor.abs_info(ABS_X);
        let y_info = device.descriptor.abs_info(ABS_Y);
        AbsolutePosition::new(
            f64::from(self.abs_x),
            f64::from(self.abs_y),
            x_info.map(|i| f64::from(i.minimum)).unwrap_or(0.0),
            x_info.map(|i| f64::from(i.maximum)).unwrap_or(1.0),
            y_info.map(|i| f64::from(i.minimum)).unwrap_or(0.0),
            y_info.map(|i| f64::from(i.maximum)).unwrap_or(1.0),
        )
    }

    fn touch_position(&self, device: &Device) -> AbsolutePosition {
        let x_info = device.descriptor.abs_info(ABS_X);
        let y_info = device.descriptor.abs_info(ABS_Y);
        AbsolutePosition::new(
            f64::from(self.touch.x),
            f64::from(self.touch.y),
            x_info.map(|i| f64::from(i.minimum)).unwrap_or(0.0),
            x_info.map(|i| f64::from(i.maximum)).unwrap_or(1.0),
            y_info.map(|i| f64::from(i.minimum)).unwrap_or(0.0),
            y_info.map(|i| f64::from(i.maximum)).unwrap_or(1.0),
        )
    }

    fn flush_touch(&mut self, device: &Device, ctx: &mut DispatchCtx, time: u64) {
        let mut frame_needed = false;

        if self.touch.begin {
            self.touch.begin = false;
            let slot = ctx
                .seats
                .get_mut(device.seat)
                .and_then(|s| s.acquire_slot());
            if let Some(seat_slot) = slot {
                self.touch.seat_slot = Some(seat_slot);
                let pos = self.touch_position(device);
                ctx.notify_touch_down(device, time, 0, seat_slot, pos);
                frame_needed = true;
            } else {
                log::error!("{}: no free seat slot for touch", device.name());
            }
            self.touch.changed = false;
        } else if self.touch.changed && self.touch.down {
            self.touch.changed = false;
            if let Some(seat_slot) = self.touch.seat_slot {
                let pos = self.touch_position(device);
                ctx.notify_touch_motion(device, time, 0, seat_slot, pos);
                frame_needed = true;
            }
        }

        if self.touch.end {
            self.touch.end = false;
            if let Some(seat_slot) = self.touch.seat_slot.take() {
                ctx.notify_touch_up(device, time, 0, seat_slot);
                if let Some(seat) = ctx.seats.get_mut(device.seat) {
                    seat.release_slot(seat_slot);
                }
                frame_needed = true;
            }
        }

        if frame_needed {
            ctx.notify_touch_frame(device, time);
        }
    }

    /// Terminal transition: release every held button and active touch.
    pub fn suspend(&mut self, device: &mut Device, ctx: &mut DispatchCtx, now: u64) {
        ctx.timers.cancel(device.id, TimerKind::MiddleButton);
        ctx.timers.cancel(device.id, TimerKind::ButtonScroll);
        self.middle = MiddleState::Idle;
        self.buttonscroll = ButtonScrollState::Idle;

        for code in 0..KEY_CNT as u16 {
            if self.button_is_down(code) {
                self.set_button_down(code, false);
                ctx.notify_button(device, now, code, ButtonState::Released);
            }
        }
        if self.touch.down || self.touch.seat_slot.is_some() {
            if let Some(seat_slot) = self.touch.seat_slot.take() {
                ctx.notify_touch_cancel(device, now, 0, seat_slot);
                if let Some(seat) = ctx.seats.get_mut(device.seat) {
                    seat.release_slot(seat_slot);
                }
                ctx.notify_touch_frame(device, now);
            }
            self.touch = SingleTouch::default();
        }
        if let Some(keyboard) = self.keyboard.as_mut() {
            keyboard.suspend(device, ctx, now);
        }
    }
}

fn emit_click_pair(device: &Device, ctx: &mut DispatchCtx, time: u64, button: u16) {
    ctx.notify_button(device, time, button, ButtonState::Pressed);
    ctx.notify_button(device, time, button, ButtonState::Released);
}

fn other_button(button: u16) -> u16 {
    if button == BTN_LEFT {
        BTN_RIGHT
    } else {
        BTN_LEFT
    }
}
