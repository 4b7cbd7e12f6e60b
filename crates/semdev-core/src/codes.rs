// Semdev evdev code tables
// The subset of linux/input-event-codes.h the engines match on

/// Event type: synchronization markers.
pub const EV_SYN: u16 = 0x00;
/// Event type: key and button state changes.
pub const EV_KEY: u16 = 0x01;
/// Event type: relative axis movement.
pub const EV_REL: u16 = 0x02;
/// Event type: absolute axis values.
pub const EV_ABS: u16 = 0x03;
/// Event type: miscellaneous (tool serial numbers et al).
pub const EV_MSC: u16 = 0x04;
/// Event type: binary switches.
pub const EV_SW: u16 = 0x05;

pub const SYN_REPORT: u16 = 0x00;
pub const SYN_DROPPED: u16 = 0x03;

pub const REL_X: u16 = 0x00;
pub const REL_Y: u16 = 0x01;
pub const REL_HWHEEL: u16 = 0x06;
pub const REL_WHEEL: u16 = 0x08;

pub const ABS_X: u16 = 0x00;
pub const ABS_Y: u16 = 0x01;
pub const ABS_Z: u16 = 0x02;
pub const ABS_RX: u16 = 0x03;
pub const ABS_RY: u16 = 0x04;
pub const ABS_RZ: u16 = 0x05;
pub const ABS_THROTTLE: u16 = 0x06;
pub const ABS_WHEEL: u16 = 0x08;
pub const ABS_PRESSURE: u16 = 0x18;
pub const ABS_DISTANCE: u16 = 0x19;
pub const ABS_TILT_X: u16 = 0x1a;
pub const ABS_TILT_Y: u16 = 0x1b;
pub const ABS_MISC: u16 = 0x28;
pub const ABS_MT_SLOT: u16 = 0x2f;
pub const ABS_MT_TOUCH_MAJOR: u16 = 0x30;
pub const ABS_MT_POSITION_X: u16 = 0x35;
pub const ABS_MT_POSITION_Y: u16 = 0x36;
pub const ABS_MT_TRACKING_ID: u16 = 0x39;
pub const ABS_MT_PRESSURE: u16 = 0x3a;
pub const ABS_MAX: u16 = 0x3f;

pub const MSC_SERIAL: u16 = 0x00;

// Keyboard codes used by the halfkey mirror table and DWT.
pub const KEY_ESC: u16 = 1;
pub const KEY_1: u16 = 2;
pub const KEY_0: u16 = 11;
pub const KEY_BACKSPACE: u16 = 14;
pub const KEY_TAB: u16 = 15;
pub const KEY_Q: u16 = 16;
pub const KEY_P: u16 = 25;
pub const KEY_ENTER: u16 = 28;
pub const KEY_LEFTCTRL: u16 = 29;
pub const KEY_A: u16 = 30;
pub const KEY_SEMICOLON: u16 = 39;
pub const KEY_LEFTSHIFT: u16 = 42;
pub const KEY_Z: u16 = 44;
pub const KEY_SLASH: u16 = 53;
pub const KEY_RIGHTSHIFT: u16 = 54;
pub const KEY_LEFTALT: u16 = 56;
pub const KEY_SPACE: u16 = 57;
pub const KEY_CAPSLOCK: u16 = 58;
pub const KEY_F1: u16 = 59;
pub const KEY_RIGHTCTRL: u16 = 97;
pub const KEY_RIGHTALT: u16 = 100;
pub const KEY_LEFTMETA: u16 = 125;
pub const KEY_RIGHTMETA: u16 = 126;

pub const BTN_0: u16 = 0x100;
pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;
pub const BTN_SIDE: u16 = 0x113;
pub const BTN_EXTRA: u16 = 0x114;
pub const BTN_FORWARD: u16 = 0x115;
pub const BTN_BACK: u16 = 0x116;
pub const BTN_TASK: u16 = 0x117;

pub const BTN_TOOL_PEN: u16 = 0x140;
pub const BTN_TOOL_RUBBER: u16 = 0x141;
pub const BTN_TOOL_BRUSH: u16 = 0x142;
pub const BTN_TOOL_PENCIL: u16 = 0x143;
pub const BTN_TOOL_AIRBRUSH: u16 = 0x144;
pub const BTN_TOOL_FINGER: u16 = 0x145;
pub const BTN_TOOL_MOUSE: u16 = 0x146;
pub const BTN_TOOL_LENS: u16 = 0x147;
pub const BTN_TOUCH: u16 = 0x14a;
pub const BTN_STYLUS: u16 = 0x14b;
pub const BTN_STYLUS2: u16 = 0x14c;
pub const BTN_TOOL_DOUBLETAP: u16 = 0x14d;
pub const BTN_TOOL_TRIPLETAP: u16 = 0x14e;
pub const BTN_TOOL_QUADTAP: u16 = 0x14f;
pub const BTN_TOOL_QUINTTAP: u16 = 0x148;

/// One past the highest key/button code, the size of key bitmaps.
pub const KEY_CNT: usize = 0x300;

// Device property bits (INPUT_PROP_*).
pub const PROP_POINTER: u16 = 0x00;
pub const PROP_BUTTONPAD: u16 = 0x02;
pub const PROP_SEMI_MT: u16 = 0x03;
pub const PROP_TOPBUTTONPAD: u16 = 0x04;

/// True for codes that act as keyboard modifiers. Modifier presses do not
/// arm disable-while-typing: chording (ctrl+click etc.) must stay usable.
pub fn is_modifier_key(code: u16) -> bool {
    matches!(
        code,
        KEY_LEFTCTRL
            | KEY_RIGHTCTRL
            | KEY_LEFTSHIFT
            | KEY_RIGHTSHIFT
            | KEY_LEFTALT
            | KEY_RIGHTALT
            | KEY_LEFTMETA
            | KEY_RIGHTMETA
            | KEY_CAPSLOCK
    )
}

/// True for key codes in the button range (BTN_*), which feed the pointer
/// button path rather than the keyboard path.
pub fn is_button_code(code: u16) -> bool {
    (0x100..0x160).contains(&code) || (0x220..0x2c0).contains(&code)
}

/// Display name for a key or button code.
pub fn key_name(code: u16) -> &'static str {
    static KEY_NAMES: std::sync::OnceLock<Vec<&'static str>> = std::sync::OnceLock::new();
    KEY_NAMES
        .get_or_init(|| {
            let mut names = vec!["UNKNOWN"; KEY_CNT];
            names[0] = "RESERVED";
            names[1] = "ESC";
            names[2] = "1";
            names[3] = "2";
            names[4] = "3";
            names[5] = "4";
            names[6] = "5";
            names[7] = "6";
            names[8] = "7";
            names[9] = "8";
            names[10] = "9";
            names[11] = "0";
            names[12] = "MINUS";
            names[13] = "EQUAL";
            names[14] = "BACKSPACE";
            names[15] = "TAB";
            names[16] = "Q";
            names[17] = "W";
            names[18] = "E";
            names[19] = "R";
            names[20] = "T";
            names[21] = "Y";
            names[22] = "U";
            names[23] = "I";
            names[24] = "O";
            names[25] = "P";
            names[26] = "LEFTBRACE";
            names[27] = "RIGHTBRACE";
            names[28] = "ENTER";
            names[29] = "LEFTCTRL";
            names[30] = "A";
            names[31] = "S";
            names[32] = "D";
            names[33] = "F";
            names[34] = "G";
            names[35] = "H";
            names[36] = "J";
            names[37] = "K";
            names[38] = "L";
            names[39] = "SEMICOLON";
            names[40] = "APOSTROPHE";
            names[41] = "GRAVE";
            names[42] = "LEFTSHIFT";
            names[43] = "BACKSLASH";
            names[44] = "Z";
            names[45] = "X";
            names[46] = "C";
            names[47] = "V";
            names[48] = "B";
            names[49] = "N";
            names[50] = "M";
            names[51] = "COMMA";
            names[52] = "DOT";
            names[53] = "SLASH";
            names[54] = "RIGHTSHIFT";
            names[55] = "KPASTERISK";
            names[56] = "LEFTALT";
            names[57] = "SPACE";
            names[58] = "CAPSLOCK";
            names[59] = "F1";
            names[60] = "F2";
            names[61] = "F3";
            names[62] = "F4";
            names[63] = "F5";
            names[64] = "F6";
            names[65] = "F7";
            names[66] = "F8";
            names[67] = "F9";
            names[68] = "F10";
            names[69] = "NUMLOCK";
            names[70] = "SCROLLLOCK";
            names[87] = "F11";
            names[88] = "F12";
            names[96] = "KPENTER";
            names[97] = "RIGHTCTRL";
            names[98] = "KPSLASH";
            names[100] = "RIGHTALT";
            names[102] = "HOME";
            names[103] = "UP";
            names[104] = "PAGEUP";
            names[105] = "LEFT";
            names[106] = "RIGHT";
            names[107] = "END";
            names[108] = "DOWN";
            names[109] = "PAGEDOWN";
            names[110] = "INSERT";
            names[111] = "DELETE";
            names[113] = "MUTE";
            names[114] = "VOLUMEDOWN";
            names[115] = "VOLUMEUP";
            names[119] = "PAUSE";
            names[125] = "LEFTMETA";
            names[126] = "RIGHTMETA";
            names[127] = "COMPOSE";
            names[0x100] = "BTN_0";
            names[0x101] = "BTN_1";
            names[0x102] = "BTN_2";
            names[0x103] = "BTN_3";
            names[0x104] = "BTN_4";
            names[0x105] = "BTN_5";
            names[0x106] = "BTN_6";
            names[0x107] = "BTN_7";
            names[0x108] = "BTN_8";
            names[0x109] = "BTN_9";
            names[0x110] = "BTN_LEFT";
            names[0x111] = "BTN_RIGHT";
            names[0x112] = "BTN_MIDDLE";
            names[0x113] = "BTN_SIDE";
            names[0x114] = "BTN_EXTRA";
            names[0x115] = "BTN_FORWARD";
            names[0x116] = "BTN_BACK";
            names[0x117] = "BTN_TASK";
            names[0x140] = "BTN_TOOL_PEN";
            names[0x141] = "BTN_TOOL_RUBBER";
            names[0x142] = "BTN_TOOL_BRUSH";
            names[0x143] = "BTN_TOOL_PENCIL";
            names[0x144] = "BTN_TOOL_AIRBRUSH";
            names[0x145] = "BTN_TOOL_FINGER";
            names[0x146] = "BTN_TOOL_MOUSE";
            names[0x147] = "BTN_TOOL_LENS";
            names[0x148] = "BTN_TOOL_QUINTTAP";
            names[0x14a] = "BTN_TOUCH";
            names[0x14b] = "BTN_STYLUS";
            names[0x14c] = "BTN_STYLUS2";
            names[0x14d] = "BTN_TOOL_DOUBLETAP";
            names[0x14e] = "BTN_TOOL_TRIPLETAP";
            names[0x14f] = "BTN_TOOL_QUADTAP";
            names
        })
        .get(code as usize)
        .copied()
        .unwrap_or("UNKNOWN")
}

/// Display name for an event type.
pub fn event_type_name(kind: u16) -> &'static str {
    match kind {
        EV_SYN => "EV_SYN",
        EV_KEY => "EV_KEY",
        EV_REL => "EV_REL",
        EV_ABS => "EV_ABS",
        EV_MSC => "EV_MSC",
        EV_SW => "EV_SW",
        _ => "EV_UNKNOWN",
    }
}
