// Semdev timer wheel
// Coarse monotonic timeouts owned by device dispatchers

use crate::device::DeviceId;

/// Tap finalization window.
pub const TAP_TIMEOUT: u64 = 180;
/// Grace period before a released drag is committed.
pub const TAP_N_DRAG_TIMEOUT: u64 = 300;
/// Lock-in delay for a touch entering the soft-button strip.
pub const SOFTBUTTON_TIMEOUT: u64 = 200;
/// Dwell before a touch in the edge strip starts scrolling.
pub const EDGE_SCROLL_TIMEOUT: u64 = 300;
/// Hold time that turns a scroll-button press into scrolling.
pub const BUTTON_SCROLL_TIMEOUT: u64 = 200;
/// Pairing window for middle-button emulation.
pub const MIDDLEBUTTON_TIMEOUT: u64 = 50;
/// Post-release typing grace.
pub const DWT_SHORT_TIMEOUT: u64 = 100;
/// Typing grace after a sustained burst.
pub const DWT_LONG_TIMEOUT: u64 = 500;
/// Debounce for 2fg-scroll vs motion hand-off.
pub const FINGER_SWITCH_TIMEOUT: u64 = 120;

/// The timeouts a dispatcher can own. One slot per kind per device;
/// re-setting replaces the previous deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Tap,
    TapDrag,
    SoftButton,
    EdgeScroll,
    ButtonScroll,
    MiddleButton,
    Dwt,
    FingerSwitch,
}

#[derive(Debug, Clone, Copy)]
struct TimerSlot {
    device: DeviceId,
    kind: TimerKind,
    deadline: u64,
}

/// Absolute-deadline timer set, polled from dispatch. Cancelling a timer
/// that is not set is a no-op.
#[derive(Debug, Default)]
pub struct TimerWheel {
    slots: Vec<TimerSlot>,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, device: DeviceId, kind: TimerKind, deadline: u64) {
        self.cancel(device, kind);
        self.slots.push(TimerSlot {
            device,
            kind,
            deadline,
        });
    }

    pub fn cancel(&mut self, device: DeviceId, kind: TimerKind) {
        self.slots
            .retain(|s| !(s.device == device && s.kind == kind));
    }

    pub fn cancel_device(&mut self, device: DeviceId) {
        self.slots.retain(|s| s.device != device);
    }

    pub fn is_set(&self, device: DeviceId, kind: TimerKind) -> bool {
        self.slots
            .iter()
            .any(|s| s.device == device && s.kind == kind)
    }

    /// Earliest pending deadline, if any. Used to arm the caller wakeup.
    pub fn next_deadline(&self) -> Option<u64> {
        self.slots.iter().map(|s| s.deadline).min()
    }

    /// Pop every timer due at `now`, in deadline order. The caller routes
    /// each expiry back into the owning dispatcher, where it is handled
    /// exactly like a frame boundary.
    pub fn fire_due(&mut self, now: u64) -> Vec<(DeviceId, TimerKind, u64)> {
        let mut due: Vec<TimerSlot> = self
            .slots
            .iter()
            .copied()
            .filter(|s| s.deadline <= now)
            .collect();
        self.slots.retain(|s| s.deadline > now);
        due.sort_by_key(|s| s.deadline);
        due.into_iter()
            .map(|s| (s.device, s.kind, s.deadline))
            .collect()
    }
}
