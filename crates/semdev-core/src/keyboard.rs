// Semdev keyboard dispatcher
// Key events through the halfkey filter, seat counters, DWT arming

use crate::codes::{is_button_code, EV_KEY, KEY_CNT};
use crate::device::Device;
use crate::dispatch::DispatchCtx;
use crate::event::KeyState;
use crate::frame::RawEvent;
use crate::halfkey::Halfkey;

const MASK_WORDS: usize = KEY_CNT / 64;

/// Dispatcher for keyboard-only devices.
pub struct KeyboardDispatch {
    pub halfkey: Halfkey,
    /// Emitted key codes currently down, for force-release on removal.
    keys_down: [u64; MASK_WORDS],
    /// This keyboard never arms disable-while-typing.
    dwt_exempt: bool,
}

impl KeyboardDispatch {
    pub fn new(device: &Device, ctx_quirks: &crate::quirks::Quirks) -> Self {
        let quirk = ctx_quirks.lookup(device.descriptor.vendor_id, device.descriptor.product_id);
        Self {
            halfkey: Halfkey::new(device.config.halfkey_enabled),
            keys_down: [0; MASK_WORDS],
            dwt_exempt: quirk.dwt_exempt,
        }
    }

    fn key_down(&self, code: u16) -> bool {
        self.keys_down[code as usize / 64] & (1 << (code as usize % 64)) != 0
    }

    fn set_key_down(&mut self, code: u16, down: bool) {
        let word = code as usize / 64;
        let bit = 1u64 << (code as usize % 64);
        if down {
            self.keys_down[word] |= bit;
        } else {
            self.keys_down[word] &= !bit;
        }
    }

    pub fn process_frame(&mut self, device: &mut Device, ctx: &mut DispatchCtx, frame: &[RawEvent]) {
        for e in frame {
            if e.kind != EV_KEY || is_button_code(e.code) {
                continue;
            }
            // kernel soft-repeats are regenerated by the consumer
            if e.value == 2 {
                continue;
            }
            self.handle_key(device, ctx, e.time, e.code, e.value != 0);
        }
    }

    pub fn handle_key(
        &mut self,
        device: &mut Device,
        ctx: &mut DispatchCtx,
        time: u64,
        code: u16,
        pressed: bool,
    ) {
        for (out_code, out_pressed) in self.halfkey.filter_key(code, pressed) {
            // a key can only go down once and must be down to come up;
            // anything else means we and the kernel disagree
            if out_pressed == self.key_down(out_code) {
                continue;
            }
            self.set_key_down(out_code, out_pressed);
            let state = if out_pressed {
                KeyState::Pressed
            } else {
                KeyState::Released
            };
            ctx.notify_key(device, time, out_code, state);

            if out_pressed && !self.dwt_exempt {
                if let Some(seat) = ctx.seats.get_mut(device.seat) {
                    seat.typing.record_key(out_code, time);
                }
            }
        }
    }

    /// Force-release every key still down, e.g. on removal or suspend.
    pub fn suspend(&mut self, device: &mut Device, ctx: &mut DispatchCtx, now: u64) {
        for code in 0..KEY_CNT as u16 {
            if self.key_down(code) {
                self.set_key_down(code, false);
                ctx.notify_key(device, now, code, KeyState::Released);
            }
        }
    }
}
