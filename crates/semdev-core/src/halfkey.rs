// Semdev halfkey remapper
// Space-modal mirroring of the keyboard for one-handed typing

use smallvec::SmallVec;

use crate::codes::*;

/// Mirror a key code across the QWERTY G/H axis; the number row and the
/// three letter rows reflect symmetrically, with BACKSPACE<->TAB and
/// ENTER<->CAPSLOCK swapped. Codes outside the table map to themselves.
pub fn mirror_key(code: u16) -> u16 {
    let row_start = if (KEY_1..=KEY_0).contains(&code) {
        KEY_1
    } else if (KEY_Q..=KEY_P).contains(&code) {
        KEY_Q
    } else if (KEY_A..=KEY_SEMICOLON).contains(&code) {
        KEY_A
    } else if (KEY_Z..=KEY_SLASH).contains(&code) {
        KEY_Z
    } else {
        0
    };

    if row_start != 0 {
        // reflect around the row center, skipping the nonexistent zero
        // offset so even-length rows pair up cleanly
        let center = i32::from(row_start) + 4;
        let mut offset = i32::from(code) - center;
        if offset < 1 {
            offset -= 1;
        }
        offset = -offset;
        if offset < 1 {
            offset += 1;
        }
        return (center + offset) as u16;
    }

    match code {
        KEY_BACKSPACE => KEY_TAB,
        KEY_TAB => KEY_BACKSPACE,
        KEY_ENTER => KEY_CAPSLOCK,
        KEY_CAPSLOCK => KEY_ENTER,
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SpaceIdle,
    SpacePressed,
    SpaceModified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    SpaceDown,
    SpaceUp,
    MirrorDown,
    MirrorUp,
    OtherKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Passthrough,
    Discard,
    InjectMirror,
}

const MASK_WORDS: usize = KEY_CNT / 64;

/// The halfkey state machine for one keyboard device.
///
/// `filter_key` consumes every key event of the device and returns the
/// events to emit in its place: the original, nothing, or the mirrored
/// code. A bitmap of virtually-down mirrored keys guarantees that every
/// injected press gets exactly one matching release no matter in which
/// order the physical keys come back up.
#[derive(Debug)]
pub struct Halfkey {
    state: State,
    keymask: [u64; MASK_WORDS],
    enabled: bool,
    want_enabled: bool,
    enabled_default: bool,
}

impl Halfkey {
    pub fn new(enabled: bool) -> Self {
        Self {
            state: State::SpaceIdle,
            keymask: [0; MASK_WORDS],
            enabled,
            want_enabled: enabled,
            enabled_default: enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn enabled_default(&self) -> bool {
        self.enabled_default
    }

    /// Request enable/disable. Takes effect once no mirrored key is
    /// virtually down, so runtime reconfiguration cannot strand a press.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.want_enabled = enabled;
        self.try_apply_config();
    }

    fn try_apply_config(&mut self) {
        if self.want_enabled == self.enabled {
            return;
        }
        if self.keymask.iter().any(|w| *w != 0) {
            log::debug!("halfkey: mirrored keys down, config deferred");
            return;
        }
        self.enabled = self.want_enabled;
        self.state = State::SpaceIdle;
    }

    fn mask_set(&mut self, code: u16, down: bool) {
        let word = code as usize / 64;
        let bit = 1u64 << (code as usize % 64);
        if down {
            self.keymask[word] |= bit;
        } else {
            self.keymask[word] &= !bit;
        }
    }

    fn mask_is_set(&self, code: u16) -> bool {
        self.keymask[code as usize / 64] & (1 << (code as usize % 64)) != 0
    }

    /// Rewrite one key event. Returns the (code, pressed) events to emit.
    pub fn filter_key(&mut self, code: u16, pressed: bool) -> SmallVec<[(u16, bool); 2]> {
        let mut out: SmallVec<[(u16, bool); 2]> = SmallVec::new();

        if !self.enabled {
            out.push((code, pressed));
            return out;
        }

        let mirrored = mirror_key(code);
        let input = if code == KEY_SPACE {
            if pressed {
                Input::SpaceDown
            } else {
                Input::SpaceUp
            }
        } else if mirrored != code {
            if pressed {
                Input::MirrorDown
            } else {
                Input::MirrorUp
            }
        } else {
            Input::OtherKey
        };

        let was_space_pressed = self.state == State::SpacePressed;
        let action = self.handle_input(input);

        match action {
            Action::InjectMirror => {
                self.mask_set(mirrored, pressed);
                out.push((mirrored, pressed));
            }
            Action::Passthrough => {
                // release inversion: the press went out as the mirror, so
                // the release must too, whatever state we are in now
                if !pressed && self.mask_is_set(mirrored) {
                    self.mask_set(mirrored, false);
                    out.push((mirrored, false));
                } else if input == Input::SpaceUp && was_space_pressed {
                    // leaving SpacePressed on a plain tap: the swallowed
                    // press is re-injected so a brief tap still types space
                    out.push((KEY_SPACE, true));
                    out.push((KEY_SPACE, false));
                } else {
                    out.push((code, pressed));
                }
            }
            Action::Discard => {}
        }

        self.try_apply_config();
        out
    }

    fn handle_input(&mut self, input: Input) -> Action {
        match self.state {
            State::SpaceIdle => self.idle_handle_input(input),
            State::SpacePressed => self.pressed_handle_input(input),
            State::SpaceModified => self.modified_handle_input(input),
        }
    }

    fn idle_handle_input(&mut self, input: Input) -> Action {
        match input {
            Input::SpaceDown => {
                // swallow; whether this becomes a space or a modifier is
                // decided by the next event
                self.state = State::SpacePressed;
                Action::Discard
            }
            Input::SpaceUp => {
                // can only happen if space went down before we started
                log::error!("halfkey: space up in idle state");
                Action::Passthrough
            }
            Input::MirrorDown | Input::MirrorUp | Input::OtherKey => Action::Passthrough,
        }
    }

    fn pressed_handle_input(&mut self, input: Input) -> Action {
        match input {
            Input::SpaceDown => {
                log::error!("halfkey: space down while already pressed");
                Action::Discard
            }
            Input::SpaceUp => {
                self.state = State::SpaceIdle;
                // filter_key re-injects the swallowed space press
                Action::Passthrough
            }
            Input::MirrorDown => {
                self.state = State::SpaceModified;
                Action::InjectMirror
            }
            // pressed before space went down, let it release as itself
            Input::MirrorUp => Action::Passthrough,
            Input::OtherKey => Action::Passthrough,
        }
    }

    fn modified_handle_input(&mut self, input: Input) -> Action {
        match input {
            Input::SpaceDown => {
                log::error!("halfkey: space down while modified");
                Action::Discard
            }
            Input::SpaceUp => {
                // a mirrored sequence completed, no space is typed
                self.state = State::SpaceIdle;
                Action::Discard
            }
            Input::MirrorDown | Input::MirrorUp => Action::InjectMirror,
            Input::OtherKey => Action::Passthrough,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_J: u16 = 36;
    const KEY_F: u16 = 33;
    const KEY_G: u16 = 34;
    const KEY_H: u16 = 35;
    const KEY_T: u16 = 20;
    const KEY_Y: u16 = 21;

    #[test]
    fn test_mirror_rows() {
        assert_eq!(mirror_key(KEY_Q), KEY_P);
        assert_eq!(mirror_key(KEY_P), KEY_Q);
        assert_eq!(mirror_key(KEY_T), KEY_Y);
        assert_eq!(mirror_key(KEY_Y), KEY_T);
        assert_eq!(mirror_key(KEY_G), KEY_H);
        assert_eq!(mirror_key(KEY_H), KEY_G);
        assert_eq!(mirror_key(KEY_J), KEY_F);
        assert_eq!(mirror_key(KEY_A), KEY_SEMICOLON);
        assert_eq!(mirror_key(KEY_1), KEY_0);
        assert_eq!(mirror_key(KEY_Z), KEY_SLASH);
    }

    #[test]
    fn test_mirror_specials_and_identity() {
        assert_eq!(mirror_key(KEY_BACKSPACE), KEY_TAB);
        assert_eq!(mirror_key(KEY_TAB), KEY_BACKSPACE);
        assert_eq!(mirror_key(KEY_ENTER), KEY_CAPSLOCK);
        assert_eq!(mirror_key(KEY_CAPSLOCK), KEY_ENTER);
        assert_eq!(mirror_key(KEY_SPACE), KEY_SPACE);
        assert_eq!(mirror_key(KEY_ESC), KEY_ESC);
    }

    #[test]
    fn test_mirror_involution() {
        for code in 1..=120u16 {
            assert_eq!(mirror_key(mirror_key(code)), code, "code {}", code);
        }
    }

    #[test]
    fn test_space_tap_types_space() {
        let mut hk = Halfkey::new(true);
        assert!(hk.filter_key(KEY_SPACE, true).is_empty());
        let out = hk.filter_key(KEY_SPACE, false);
        assert_eq!(out.as_slice(), &[(KEY_SPACE, true), (KEY_SPACE, false)]);
    }

    #[test]
    fn test_space_hold_mirrors() {
        let mut hk = Halfkey::new(true);
        hk.filter_key(KEY_SPACE, true);
        assert_eq!(hk.filter_key(KEY_J, true).as_slice(), &[(KEY_F, true)]);
        assert_eq!(hk.filter_key(KEY_J, false).as_slice(), &[(KEY_F, false)]);
        // space up after a mirrored sequence types nothing
        assert!(hk.filter_key(KEY_SPACE, false).is_empty());
    }

    #[test]
    fn test_release_inversion_no_stuck_mirror() {
        let mut hk = Halfkey::new(true);
        hk.filter_key(KEY_SPACE, true);
        assert_eq!(hk.filter_key(KEY_J, true).as_slice(), &[(KEY_F, true)]);
        // space released first, then the physical key
        assert!(hk.filter_key(KEY_SPACE, false).is_empty());
        let out = hk.filter_key(KEY_J, false);
        assert_eq!(out.as_slice(), &[(KEY_F, false)]);
    }

    #[test]
    fn test_key_down_before_space_releases_as_itself() {
        let mut hk = Halfkey::new(true);
        assert_eq!(hk.filter_key(KEY_J, true).as_slice(), &[(KEY_J, true)]);
        hk.filter_key(KEY_SPACE, true);
        assert_eq!(hk.filter_key(KEY_J, false).as_slice(), &[(KEY_J, false)]);
    }

    #[test]
    fn test_other_keys_pass_through_modified() {
        let mut hk = Halfkey::new(true);
        hk.filter_key(KEY_SPACE, true);
        hk.filter_key(KEY_J, true);
        assert_eq!(hk.filter_key(KEY_ESC, true).as_slice(), &[(KEY_ESC, true)]);
        assert_eq!(hk.filter_key(KEY_ESC, false).as_slice(), &[(KEY_ESC, false)]);
    }

    #[test]
    fn test_disable_deferred_until_keys_up() {
        let mut hk = Halfkey::new(true);
        hk.filter_key(KEY_SPACE, true);
        hk.filter_key(KEY_J, true); // F virtually down
        hk.set_enabled(false);
        assert!(hk.enabled()); // deferred
        let out = hk.filter_key(KEY_J, false);
        assert_eq!(out.as_slice(), &[(KEY_F, false)]);
        assert!(!hk.enabled()); // keymask drained, config applied
    }

    #[test]
    fn test_disabled_passthrough() {
        let mut hk = Halfkey::new(false);
        assert_eq!(
            hk.filter_key(KEY_SPACE, true).as_slice(),
            &[(KEY_SPACE, true)]
        );
        assert_eq!(hk.filter_key(KEY_J, true).as_slice(), &[(KEY_J, true)]);
    }
}
