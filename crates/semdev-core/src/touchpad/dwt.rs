// Semdev disable-while-typing
// Cross-device interlock: keyboard activity mutes new touchpad touches

use crate::codes::is_modifier_key;
use crate::timer::{DWT_LONG_TIMEOUT, DWT_SHORT_TIMEOUT};

/// How many keys inside the short window count as sustained typing.
const TYPING_BURST: u32 = 5;

/// Seat-level typing activity. Keyboards on the seat record presses here;
/// touchpads consult it when a touch begins. A touch that starts while the
/// window is open is muted for its whole lifetime; touches that began
/// earlier are never muted mid-stroke.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypingState {
    active_until: u64,
    burst_count: u32,
    last_press: u64,
}

impl TypingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one key press at `now`. Modifier keys are ignored so that
    /// ctrl-click and friends keep working.
    pub fn record_key(&mut self, code: u16, now: u64) {
        if is_modifier_key(code) {
            return;
        }
        if now.saturating_sub(self.last_press) <= DWT_SHORT_TIMEOUT {
            self.burst_count += 1;
        } else {
            self.burst_count = 1;
        }
        self.last_press = now;

        let grace = if self.burst_count >= TYPING_BURST {
            DWT_LONG_TIMEOUT
        } else {
            DWT_SHORT_TIMEOUT
        };
        self.active_until = now + grace;
    }

    /// True while new touches should be muted.
    pub fn active(&self, now: u64) -> bool {
        now < self.active_until
    }
}
