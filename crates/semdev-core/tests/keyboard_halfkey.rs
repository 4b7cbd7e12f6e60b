// Keyboard path: halfkey remapping and seat-wide key counters

mod common;

use common::*;
use semdev_core::codes::*;
use semdev_core::{ConfigKey, ConfigStatus, ConfigValue, Context, Event, KeyState};

const KEY_F: u16 = 33;
const KEY_J: u16 = 36;

fn halfkey_keyboard() -> (Context, semdev_core::DeviceId) {
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(keyboard_descriptor("event20"));
    drain(&mut ctx);
    assert_eq!(
        ctx.config_set(id, ConfigKey::HalfkeyEnabled, ConfigValue::Bool(true)),
        ConfigStatus::Success
    );
    (ctx, id)
}

#[test]
fn test_plain_keys_pass_through() {
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(keyboard_descriptor("event20"));
    drain(&mut ctx);

    key_event(&mut ctx, id, KEY_A, true, 10);
    key_event(&mut ctx, id, KEY_A, false, 20);
    let keys = keyboard_keys(&drain(&mut ctx));
    assert_eq!(
        keys,
        vec![
            (10, KEY_A, KeyState::Pressed),
            (20, KEY_A, KeyState::Released),
        ]
    );
}

#[test]
fn test_space_tap_still_types_space() {
    let (mut ctx, id) = halfkey_keyboard();
    key_event(&mut ctx, id, KEY_SPACE, true, 10);
    key_event(&mut ctx, id, KEY_SPACE, false, 60);
    let keys = keyboard_keys(&drain(&mut ctx));
    // the swallowed press is re-injected on release
    assert_eq!(
        keys,
        vec![
            (60, KEY_SPACE, KeyState::Pressed),
            (60, KEY_SPACE, KeyState::Released),
        ]
    );
}

#[test]
fn test_space_hold_mirrors_j_to_f() {
    let (mut ctx, id) = halfkey_keyboard();
    key_event(&mut ctx, id, KEY_SPACE, true, 10);
    key_event(&mut ctx, id, KEY_J, true, 20);
    key_event(&mut ctx, id, KEY_J, false, 30);
    key_event(&mut ctx, id, KEY_SPACE, false, 40);
    let keys = keyboard_keys(&drain(&mut ctx));
    assert_eq!(
        keys,
        vec![
            (20, KEY_F, KeyState::Pressed),
            (30, KEY_F, KeyState::Released),
        ]
    );
}

#[test]
fn test_no_stuck_mirror_on_any_release_order() {
    // property 9, adversarial release ordering
    let (mut ctx, id) = halfkey_keyboard();
    key_event(&mut ctx, id, KEY_SPACE, true, 10);
    key_event(&mut ctx, id, KEY_J, true, 20);
    // space released before the mirrored key
    key_event(&mut ctx, id, KEY_SPACE, false, 30);
    key_event(&mut ctx, id, KEY_J, false, 40);

    let keys = keyboard_keys(&drain(&mut ctx));
    let mut down = std::collections::HashMap::new();
    for (_, key, state) in &keys {
        let entry = down.entry(*key).or_insert(0i32);
        match state {
            KeyState::Pressed => *entry += 1,
            KeyState::Released => *entry -= 1,
        }
    }
    for (key, balance) in down {
        assert_eq!(balance, 0, "key {} left unbalanced", key);
    }
    // and the mirror pair did happen
    assert!(keys.contains(&(20, KEY_F, KeyState::Pressed)));
    assert!(keys.contains(&(40, KEY_F, KeyState::Released)));
}

#[test]
fn test_halfkey_disable_waits_for_release() {
    let (mut ctx, id) = halfkey_keyboard();
    key_event(&mut ctx, id, KEY_SPACE, true, 10);
    key_event(&mut ctx, id, KEY_J, true, 20); // F virtually down

    assert_eq!(
        ctx.config_set(id, ConfigKey::HalfkeyEnabled, ConfigValue::Bool(false)),
        ConfigStatus::Success
    );
    // the release still maps through the old table
    key_event(&mut ctx, id, KEY_J, false, 30);
    let keys = keyboard_keys(&drain(&mut ctx));
    assert!(keys.contains(&(30, KEY_F, KeyState::Released)));

    // now disabled: J is J again
    key_event(&mut ctx, id, KEY_SPACE, false, 40);
    key_event(&mut ctx, id, KEY_J, true, 50);
    let keys = keyboard_keys(&drain(&mut ctx));
    assert!(keys.contains(&(50, KEY_J, KeyState::Pressed)));
}

#[test]
fn test_row_mirrors_roundtrip() {
    // each row reflects across its center; tapping a key twice with space
    // held produces the mirror twice
    let pairs = [
        (16u16, 25u16), // Q <-> P
        (2, 11),        // 1 <-> 0
        (30, 39),       // A <-> ;
        (44, 53),       // Z <-> /
        (KEY_BACKSPACE, KEY_TAB),
        (KEY_ENTER, KEY_CAPSLOCK),
    ];
    for (physical, mirrored) in pairs {
        let (mut ctx, id) = halfkey_keyboard();
        key_event(&mut ctx, id, KEY_SPACE, true, 10);
        key_event(&mut ctx, id, physical, true, 20);
        key_event(&mut ctx, id, physical, false, 30);
        key_event(&mut ctx, id, KEY_SPACE, false, 40);
        let keys = keyboard_keys(&drain(&mut ctx));
        assert_eq!(
            keys,
            vec![
                (20, mirrored, KeyState::Pressed),
                (30, mirrored, KeyState::Released),
            ],
            "physical {}",
            physical
        );
    }
}

#[test]
fn test_unmirrored_keys_type_through_modified_state() {
    let (mut ctx, id) = halfkey_keyboard();
    key_event(&mut ctx, id, KEY_SPACE, true, 10);
    key_event(&mut ctx, id, KEY_J, true, 20); // enters modified
    key_event(&mut ctx, id, KEY_ESC, true, 30);
    key_event(&mut ctx, id, KEY_ESC, false, 40);
    key_event(&mut ctx, id, KEY_J, false, 50);
    key_event(&mut ctx, id, KEY_SPACE, false, 60);

    let keys = keyboard_keys(&drain(&mut ctx));
    assert!(keys.contains(&(30, KEY_ESC, KeyState::Pressed)));
    assert!(keys.contains(&(40, KEY_ESC, KeyState::Released)));
    // and no space was typed: the sequence was a mirror chord
    assert!(keys.iter().all(|(_, k, _)| *k != KEY_SPACE));
}

#[test]
fn test_key_held_before_space_is_untouched() {
    // a mirrorable key already down when space lands releases as itself
    let (mut ctx, id) = halfkey_keyboard();
    key_event(&mut ctx, id, KEY_J, true, 10);
    key_event(&mut ctx, id, KEY_SPACE, true, 20);
    key_event(&mut ctx, id, KEY_J, false, 30);
    key_event(&mut ctx, id, KEY_SPACE, false, 40);

    let keys = keyboard_keys(&drain(&mut ctx));
    assert_eq!(keys[0], (10, KEY_J, KeyState::Pressed));
    assert_eq!(keys[1], (30, KEY_J, KeyState::Released));
}

#[test]
fn test_seat_key_count_across_keyboards() {
    // property 1: the counter tracks pressed keys per code seat-wide
    let mut ctx = Context::new();
    let a = ctx.add_synthetic_device(keyboard_descriptor("event20"));
    let b = ctx.add_synthetic_device(keyboard_descriptor("event21"));
    drain(&mut ctx);

    key_event(&mut ctx, a, KEY_A, true, 10);
    key_event(&mut ctx, b, KEY_A, true, 20);
    key_event(&mut ctx, a, KEY_A, false, 30);
    key_event(&mut ctx, b, KEY_A, false, 40);

    let counts: Vec<u32> = drain(&mut ctx)
        .into_iter()
        .filter_map(|e| match e {
            Event::KeyboardKey { seat_key_count, .. } => Some(seat_key_count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![1, 2, 1, 0]);
}

#[test]
fn test_removal_releases_keys_and_counters() {
    let mut ctx = Context::new();
    let a = ctx.add_synthetic_device(keyboard_descriptor("event20"));
    let b = ctx.add_synthetic_device(keyboard_descriptor("event21"));
    drain(&mut ctx);

    key_event(&mut ctx, a, KEY_A, true, 10);
    drain(&mut ctx);

    ctx.remove_device(a).unwrap();
    let events = drain(&mut ctx);
    let keys = keyboard_keys(&events);
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].1, KEY_A);
    assert_eq!(keys[0].2, KeyState::Released);

    // the seat counter is clean for the surviving keyboard
    key_event(&mut ctx, b, KEY_A, true, 100);
    let counts: Vec<u32> = drain(&mut ctx)
        .into_iter()
        .filter_map(|e| match e {
            Event::KeyboardKey { seat_key_count, .. } => Some(seat_key_count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![1]);
}
