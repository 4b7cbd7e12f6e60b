// Semdev tap state machine
// Multi-finger taps, multi-tap, and tap-and-drag

use crate::codes::{BTN_LEFT, BTN_MIDDLE, BTN_RIGHT};
use crate::device::DeviceId;
use crate::timer::{TimerKind, TimerWheel, TAP_N_DRAG_TIMEOUT, TAP_TIMEOUT};

use super::PendingFrame;

/// One machine per touchpad. Tap buttons never honor left-handed: the
/// finger count picks the button, not the pad geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// One finger down, undecided.
    Touch,
    /// Two fingers down, undecided.
    Touch2,
    /// Three fingers down, undecided.
    Touch3,
    /// A tap was recognized, its button is pressed, release pending.
    Tapped(u16),
    /// Finger back down right after a 1fg tap: double tap or drag.
    DraggingOrDoubletap,
    Dragging,
    /// Drag finger lifted, waiting for it to come back.
    DraggingWait,
    /// Dragging with a second finger resting.
    Dragging2,
    /// Several quick taps chained; LEFT held for the latest one.
    Multitap,
    /// A finger is down during a multitap chain.
    MultitapDown,
    /// Gesture exceeded tapping; wait for all fingers to lift.
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TapInput {
    Down,
    Up,
    /// A participating touch moved past the motion threshold.
    Motion,
    /// The physical button was clicked.
    Click,
    TimeoutTap,
    TimeoutDrag,
}

#[derive(Debug)]
pub(crate) struct TapMachine {
    state: State,
    nfingers_down: u32,
    /// Touch-down time of the finger that may chain the next tap; the
    /// previous tap's release is stamped here so multi-tap timestamps stay
    /// strictly monotonic.
    chain_down_time: u64,
    enabled: bool,
}

impl TapMachine {
    pub fn new(enabled: bool) -> Self {
        Self {
            state: State::Idle,
            nfingers_down: 0,
            chain_down_time: 0,
            enabled,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        // takes effect at the next idle point; a sequence in flight
        // finishes under the old setting
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_dragging(&self) -> bool {
        matches!(
            self.state,
            State::Dragging | State::Dragging2 | State::DraggingWait
        )
    }

    /// True when the machine holds a button the consumer believes pressed.
    pub fn button_held(&self) -> bool {
        matches!(
            self.state,
            State::Tapped(_)
                | State::DraggingOrDoubletap
                | State::Dragging
                | State::DraggingWait
                | State::Dragging2
                | State::Multitap
                | State::MultitapDown
        )
    }

    /// Force-terminate, releasing any held button. Used on removal.
    pub fn cancel(
        &mut self,
        time: u64,
        device: DeviceId,
        frame: &mut PendingFrame,
        timers: &mut TimerWheel,
    ) {
        if let State::Tapped(button) = self.state {
            frame.push_release(button);
        } else if self.button_held() {
            frame.push_release(BTN_LEFT);
        }
        let _ = time;
        timers.cancel(device, TimerKind::Tap);
        timers.cancel(device, TimerKind::TapDrag);
        self.state = State::Idle;
        self.nfingers_down = 0;
    }

    pub fn handle(
        &mut self,
        input: TapInput,
        time: u64,
        device: DeviceId,
        frame: &mut PendingFrame,
        timers: &mut TimerWheel,
    ) {
        match input {
            TapInput::Down => self.nfingers_down += 1,
            TapInput::Up => self.nfingers_down = self.nfingers_down.saturating_sub(1),
            _ => {}
        }

        let set_tap = |timers: &mut TimerWheel| {
            timers.set(device, TimerKind::Tap, time + TAP_TIMEOUT);
        };

        match self.state {
            State::Idle => match input {
                TapInput::Down => {
                    if self.enabled {
                        self.state = State::Touch;
                        set_tap(timers);
                    }
                }
                TapInput::Up | TapInput::Click | TapInput::Motion => {}
                TapInput::TimeoutTap | TapInput::TimeoutDrag => {
                    self.unexpected(input);
                }
            },

            State::Touch => match input {
                TapInput::Up => {
                    self.state = State::Tapped(BTN_LEFT);
                    frame.push_press(BTN_LEFT);
                    set_tap(timers);
                }
                TapInput::Down => {
                    self.state = State::Touch2;
                    set_tap(timers);
                }
                TapInput::Motion | TapInput::Click => self.die(device, timers),
                TapInput::TimeoutTap => self.die(device, timers),
                TapInput::TimeoutDrag => self.unexpected(input),
            },

            State::Touch2 => match input {
                TapInput::Up => {
                    if self.nfingers_down == 0 {
                        self.state = State::Tapped(BTN_RIGHT);
                        frame.push_press(BTN_RIGHT);
                        set_tap(timers);
                    }
                }
                TapInput::Down => {
                    self.state = State::Touch3;
                    set_tap(timers);
                }
                TapInput::Motion | TapInput::Click | TapInput::TimeoutTap => {
                    self.die(device, timers)
                }
                TapInput::TimeoutDrag => self.unexpected(input),
            },

            State::Touch3 => match input {
                TapInput::Up => {
                    if self.nfingers_down == 0 {
                        self.state = State::Tapped(BTN_MIDDLE);
                        frame.push_press(BTN_MIDDLE);
                        set_tap(timers);
                    }
                }
                TapInput::Down => self.die(device, timers),
                TapInput::Motion | TapInput::Click | TapInput::TimeoutTap => {
                    self.die(device, timers)
                }
                TapInput::TimeoutDrag => self.unexpected(input),
            },

            State::Tapped(button) => match input {
                TapInput::TimeoutTap => {
                    frame.push_release(button);
                    self.state = State::Idle;
                }
                TapInput::Down => {
                    if button == BTN_LEFT {
                        // drag or double tap, the next event decides
                        self.state = State::DraggingOrDoubletap;
                        self.chain_down_time = time;
                        set_tap(timers);
                    } else {
                        // only LEFT taps chain into drags
                        frame.push_release(button);
                        self.state = State::Touch;
                        set_tap(timers);
                    }
                }
                TapInput::Click => {
                    frame.push_release(button);
                    self.state = State::Idle;
                    timers.cancel(device, TimerKind::Tap);
                }
                TapInput::Up | TapInput::Motion | TapInput::TimeoutDrag => {
                    self.unexpected(input);
                    frame.push_release(button);
                    self.reset(device, timers);
                }
            },

            State::DraggingOrDoubletap => match input {
                TapInput::Up => {
                    // second quick tap: close the first pair at the moment
                    // this finger landed, open the next at its lift
                    frame.push_release_at(BTN_LEFT, self.chain_down_time);
                    frame.push_press(BTN_LEFT);
                    self.state = State::Multitap;
                    set_tap(timers);
                }
                TapInput::Motion | TapInput::TimeoutTap => {
                    self.state = State::Dragging;
                    timers.cancel(device, TimerKind::Tap);
                }
                TapInput::Down => self.state = State::Dragging2,
                TapInput::Click => {
                    frame.push_release(BTN_LEFT);
                    self.die(device, timers);
                }
                TapInput::TimeoutDrag => self.unexpected(input),
            },

            State::Dragging => match input {
                TapInput::Up => {
                    self.state = State::DraggingWait;
                    timers.set(device, TimerKind::TapDrag, time + TAP_N_DRAG_TIMEOUT);
                }
                TapInput::Down => self.state = State::Dragging2,
                TapInput::Motion => {}
                TapInput::Click => {
                    frame.push_release(BTN_LEFT);
                    self.die(device, timers);
                }
                TapInput::TimeoutTap | TapInput::TimeoutDrag => self.unexpected(input),
            },

            State::DraggingWait => match input {
                TapInput::Down => {
                    self.state = State::Dragging;
                    timers.cancel(device, TimerKind::TapDrag);
                }
                TapInput::TimeoutDrag => {
                    frame.push_release(BTN_LEFT);
                    self.state = State::Idle;
                }
                TapInput::Click => {
                    frame.push_release(BTN_LEFT);
                    self.state = State::Idle;
                    timers.cancel(device, TimerKind::TapDrag);
                }
                TapInput::Up | TapInput::Motion | TapInput::TimeoutTap => {
                    self.unexpected(input);
                    frame.push_release(BTN_LEFT);
                    self.reset(device, timers);
                }
            },

            State::Dragging2 => match input {
                TapInput::Up => self.state = State::Dragging,
                TapInput::Down => {
                    // a third finger ends the drag
                    frame.push_release(BTN_LEFT);
                    self.die(device, timers);
                }
                TapInput::Motion => {}
                TapInput::Click => {
                    frame.push_release(BTN_LEFT);
                    self.die(device, timers);
                }
                TapInput::TimeoutTap | TapInput::TimeoutDrag => self.unexpected(input),
            },

            State::Multitap => match input {
                TapInput::TimeoutTap => {
                    frame.push_release(BTN_LEFT);
                    self.state = State::Idle;
                }
                TapInput::Down => {
                    self.state = State::MultitapDown;
                    self.chain_down_time = time;
                    set_tap(timers);
                }
                TapInput::Click => {
                    frame.push_release(BTN_LEFT);
                    self.state = State::Idle;
                    timers.cancel(device, TimerKind::Tap);
                }
                TapInput::Up | TapInput::Motion | TapInput::TimeoutDrag => {
                    self.unexpected(input);
                    frame.push_release(BTN_LEFT);
                    self.reset(device, timers);
                }
            },

            State::MultitapDown => match input {
                TapInput::Up => {
                    frame.push_release_at(BTN_LEFT, self.chain_down_time);
                    frame.push_press(BTN_LEFT);
                    self.state = State::Multitap;
                    set_tap(timers);
                }
                TapInput::Motion | TapInput::TimeoutTap => {
                    // the chain turned into a drag, LEFT stays held
                    self.state = State::Dragging;
                    timers.cancel(device, TimerKind::Tap);
                }
                TapInput::Down => self.state = State::Dragging2,
                TapInput::Click => {
                    frame.push_release(BTN_LEFT);
                    self.die(device, timers);
                }
                TapInput::TimeoutDrag => self.unexpected(input),
            },

            State::Dead => {
                if self.nfingers_down == 0 {
                    self.state = State::Idle;
                }
            }
        }
    }

    fn die(&mut self, device: DeviceId, timers: &mut TimerWheel) {
        timers.cancel(device, TimerKind::Tap);
        timers.cancel(device, TimerKind::TapDrag);
        self.state = if self.nfingers_down == 0 {
            State::Idle
        } else {
            State::Dead
        };
    }

    fn reset(&mut self, device: DeviceId, timers: &mut TimerWheel) {
        timers.cancel(device, TimerKind::Tap);
        timers.cancel(device, TimerKind::TapDrag);
        self.state = State::Idle;
    }

    fn unexpected(&self, input: TapInput) {
        log::error!("tap: unexpected {:?} in state {:?}", input, self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ButtonState;

    struct Harness {
        machine: TapMachine,
        timers: TimerWheel,
        device: DeviceId,
        emitted: Vec<(u64, u16, ButtonState)>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                machine: TapMachine::new(true),
                timers: TimerWheel::new(),
                device: DeviceId(1),
                emitted: Vec::new(),
            }
        }

        fn feed(&mut self, input: TapInput, time: u64) {
            let mut frame = PendingFrame::new(time);
            self.machine
                .handle(input, time, self.device, &mut frame, &mut self.timers);
            for (t, b) in frame.take_button_releases() {
                self.emitted.push((t, b, ButtonState::Released));
            }
            for (t, b) in frame.take_button_presses() {
                self.emitted.push((t, b, ButtonState::Pressed));
            }
        }

        /// Fire due timers the way the context would.
        fn advance(&mut self, now: u64) {
            for (_, kind, deadline) in self.timers.fire_due(now) {
                let input = match kind {
                    TimerKind::Tap => TapInput::TimeoutTap,
                    TimerKind::TapDrag => TapInput::TimeoutDrag,
                    _ => continue,
                };
                self.feed(input, deadline);
            }
        }
    }

    #[test]
    fn test_single_tap() {
        let mut h = Harness::new();
        h.feed(TapInput::Down, 0);
        h.feed(TapInput::Up, 50);
        h.advance(500);
        assert_eq!(
            h.emitted,
            vec![
                (50, BTN_LEFT, ButtonState::Pressed),
                (50 + TAP_TIMEOUT, BTN_LEFT, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn test_tap_timeout_no_button() {
        let mut h = Harness::new();
        h.feed(TapInput::Down, 0);
        h.advance(1000); // held too long
        h.feed(TapInput::Up, 1100);
        assert!(h.emitted.is_empty());
    }

    #[test]
    fn test_motion_kills_tap() {
        let mut h = Harness::new();
        h.feed(TapInput::Down, 0);
        h.feed(TapInput::Motion, 20);
        h.feed(TapInput::Up, 50);
        h.advance(500);
        assert!(h.emitted.is_empty());
    }

    #[test]
    fn test_two_finger_tap_is_right() {
        let mut h = Harness::new();
        h.feed(TapInput::Down, 0);
        h.feed(TapInput::Down, 5);
        h.feed(TapInput::Up, 60);
        h.feed(TapInput::Up, 60);
        h.advance(500);
        assert_eq!(
            h.emitted,
            vec![
                (60, BTN_RIGHT, ButtonState::Pressed),
                (60 + TAP_TIMEOUT, BTN_RIGHT, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn test_three_finger_tap_is_middle() {
        let mut h = Harness::new();
        h.feed(TapInput::Down, 0);
        h.feed(TapInput::Down, 5);
        h.feed(TapInput::Down, 10);
        h.feed(TapInput::Up, 60);
        h.feed(TapInput::Up, 61);
        h.feed(TapInput::Up, 62);
        h.advance(500);
        assert_eq!(h.emitted[0], (62, BTN_MIDDLE, ButtonState::Pressed));
        assert_eq!(
            h.emitted[1],
            (62 + TAP_TIMEOUT, BTN_MIDDLE, ButtonState::Released)
        );
    }

    #[test]
    fn test_four_fingers_dead() {
        let mut h = Harness::new();
        for t in 0..4 {
            h.feed(TapInput::Down, t);
        }
        for t in 50..54 {
            h.feed(TapInput::Up, t);
        }
        h.advance(500);
        assert!(h.emitted.is_empty());
    }

    #[test]
    fn test_double_tap_two_pairs_monotonic() {
        let mut h = Harness::new();
        h.feed(TapInput::Down, 0);
        h.feed(TapInput::Up, 50);
        h.feed(TapInput::Down, 100);
        h.feed(TapInput::Up, 150);
        h.advance(1000);
        assert_eq!(
            h.emitted,
            vec![
                (50, BTN_LEFT, ButtonState::Pressed),
                (100, BTN_LEFT, ButtonState::Released),
                (150, BTN_LEFT, ButtonState::Pressed),
                (150 + TAP_TIMEOUT, BTN_LEFT, ButtonState::Released),
            ]
        );
        // strictly monotonic timestamps
        for pair in h.emitted.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn test_multitap_n_pairs() {
        for n in 1..=8u64 {
            let mut h = Harness::new();
            let mut t = 0;
            for _ in 0..n {
                h.feed(TapInput::Down, t);
                h.feed(TapInput::Up, t + 50);
                t += 100;
            }
            h.advance(t + 1000);
            let presses = h
                .emitted
                .iter()
                .filter(|(_, _, s)| *s == ButtonState::Pressed)
                .count();
            let releases = h
                .emitted
                .iter()
                .filter(|(_, _, s)| *s == ButtonState::Released)
                .count();
            assert_eq!(presses as u64, n, "n={}", n);
            assert_eq!(releases as u64, n, "n={}", n);
            // press/release alternate, starting with a press
            for (i, (_, button, state)) in h.emitted.iter().enumerate() {
                assert_eq!(*button, BTN_LEFT);
                let expect = if i % 2 == 0 {
                    ButtonState::Pressed
                } else {
                    ButtonState::Released
                };
                assert_eq!(*state, expect, "n={} i={}", n, i);
            }
            for pair in h.emitted.windows(2) {
                assert!(pair[0].0 < pair[1].0, "n={}", n);
            }
        }
    }

    #[test]
    fn test_tap_and_drag() {
        let mut h = Harness::new();
        h.feed(TapInput::Down, 0);
        h.feed(TapInput::Up, 50);
        h.feed(TapInput::Down, 100);
        h.feed(TapInput::Motion, 140); // drag, not double tap
        h.feed(TapInput::Up, 400);
        h.advance(400 + TAP_N_DRAG_TIMEOUT);
        assert_eq!(
            h.emitted,
            vec![
                (50, BTN_LEFT, ButtonState::Pressed),
                (400 + TAP_N_DRAG_TIMEOUT, BTN_LEFT, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn test_drag_relanding_continues() {
        let mut h = Harness::new();
        h.feed(TapInput::Down, 0);
        h.feed(TapInput::Up, 50);
        h.feed(TapInput::Down, 100);
        h.feed(TapInput::Motion, 140);
        h.feed(TapInput::Up, 300);
        // finger back down within the grace period keeps dragging
        h.feed(TapInput::Down, 400);
        h.feed(TapInput::Up, 800);
        h.advance(800 + TAP_N_DRAG_TIMEOUT);
        let releases: Vec<_> = h
            .emitted
            .iter()
            .filter(|(_, _, s)| *s == ButtonState::Released)
            .collect();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].0, 800 + TAP_N_DRAG_TIMEOUT);
    }

    #[test]
    fn test_third_finger_ends_drag() {
        let mut h = Harness::new();
        h.feed(TapInput::Down, 0);
        h.feed(TapInput::Up, 50);
        h.feed(TapInput::Down, 100);
        h.feed(TapInput::Motion, 140);
        h.feed(TapInput::Down, 200); // second finger
        h.feed(TapInput::Down, 250); // third finger
        assert_eq!(
            h.emitted,
            vec![
                (50, BTN_LEFT, ButtonState::Pressed),
                (250, BTN_LEFT, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn test_click_during_drag_releases_first() {
        let mut h = Harness::new();
        h.feed(TapInput::Down, 0);
        h.feed(TapInput::Up, 50);
        h.feed(TapInput::Down, 100);
        h.feed(TapInput::Motion, 140);
        h.feed(TapInput::Click, 200);
        assert_eq!(
            h.emitted,
            vec![
                (50, BTN_LEFT, ButtonState::Pressed),
                (200, BTN_LEFT, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn test_disabled_machine_stays_idle() {
        let mut h = Harness::new();
        h.machine.set_enabled(false);
        h.feed(TapInput::Down, 0);
        h.feed(TapInput::Up, 50);
        h.advance(500);
        assert!(h.emitted.is_empty());
    }
}
