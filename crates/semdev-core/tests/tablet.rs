// Tablet proximity, axes, tools, buttons

mod common;

use common::*;
use semdev_core::codes::*;
use semdev_core::{
    ButtonState, ConfigKey, ConfigValue, Context, Event, ProximityState, RawEvent, TabletAxis,
    ToolType,
};

fn pen_prox_in(ctx: &mut Context, id: semdev_core::DeviceId, time: u64, x: i32, y: i32) {
    ctx.inject_frame(
        id,
        &[
            RawEvent::new(time, EV_KEY, BTN_TOOL_PEN, 1),
            RawEvent::new(time, EV_ABS, ABS_X, x),
            RawEvent::new(time, EV_ABS, ABS_Y, y),
            RawEvent::new(time, EV_ABS, ABS_DISTANCE, 30),
            RawEvent::new(time, EV_SYN, SYN_REPORT, 0),
        ],
    );
}

fn pen_prox_out(ctx: &mut Context, id: semdev_core::DeviceId, time: u64) {
    ctx.inject_frame(
        id,
        &[
            RawEvent::new(time, EV_KEY, BTN_TOOL_PEN, 0),
            RawEvent::new(time, EV_SYN, SYN_REPORT, 0),
        ],
    );
}

#[test]
fn test_proximity_in_then_out() {
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(tablet_descriptor());
    drain(&mut ctx);

    pen_prox_in(&mut ctx, id, 10, 1000, 1000);
    pen_prox_out(&mut ctx, id, 50);

    let events = drain(&mut ctx);
    let prox: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::TabletProximity { state, tool, .. } => Some((*state, tool.tool_type)),
            _ => None,
        })
        .collect();
    assert_eq!(
        prox,
        vec![
            (ProximityState::In, ToolType::Pen),
            (ProximityState::Out, ToolType::Pen),
        ]
    );
}

#[test]
fn test_mouse_tool_tilt_to_rotation() {
    // S6: tilt (0, max) reads as 355 degrees on a mouse tool
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(tablet_descriptor());
    drain(&mut ctx);

    ctx.inject_frame(
        id,
        &[
            RawEvent::new(10, EV_KEY, BTN_TOOL_MOUSE, 1),
            RawEvent::new(10, EV_ABS, ABS_TILT_X, 0),
            RawEvent::new(10, EV_ABS, ABS_TILT_Y, 63),
            RawEvent::new(10, EV_SYN, SYN_REPORT, 0),
        ],
    );

    let events = drain(&mut ctx);
    let (changed, axes) = events
        .iter()
        .find_map(|e| match e {
            Event::TabletProximity {
                state: ProximityState::In,
                changed,
                axes,
                ..
            } => Some((*changed, *axes)),
            _ => None,
        })
        .expect("no proximity-in");
    assert!(changed.contains(TabletAxis::RotationZ));
    let rotation = axes.get(TabletAxis::RotationZ);
    assert!((rotation - 355.0).abs() < 0.5, "rotation {}", rotation);
    // tilt is consumed by the conversion
    assert_eq!(axes.get(TabletAxis::TiltX), 0.0);
    assert_eq!(axes.get(TabletAxis::TiltY), 0.0);
}

#[test]
fn test_pressure_suppresses_distance() {
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(tablet_descriptor());
    drain(&mut ctx);

    pen_prox_in(&mut ctx, id, 10, 1000, 1000);
    drain(&mut ctx);

    // both axes nonzero in one frame: distance must not be reported
    ctx.inject_frame(
        id,
        &[
            RawEvent::new(20, EV_KEY, BTN_TOUCH, 1),
            RawEvent::new(20, EV_ABS, ABS_PRESSURE, 800),
            RawEvent::new(20, EV_ABS, ABS_DISTANCE, 10),
            RawEvent::new(20, EV_SYN, SYN_REPORT, 0),
        ],
    );

    let events = drain(&mut ctx);
    let changed = events
        .iter()
        .find_map(|e| match e {
            Event::TabletAxis { changed, .. } => Some(*changed),
            _ => None,
        })
        .expect("no axis event");
    assert!(changed.contains(TabletAxis::Pressure));
    assert!(!changed.contains(TabletAxis::Distance));
}

#[test]
fn test_pressure_clamped_to_zero_out_of_contact() {
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(tablet_descriptor());
    drain(&mut ctx);
    pen_prox_in(&mut ctx, id, 10, 1000, 1000);

    ctx.inject_frame(
        id,
        &[
            RawEvent::new(20, EV_KEY, BTN_TOUCH, 1),
            RawEvent::new(20, EV_ABS, ABS_PRESSURE, 800),
            RawEvent::new(20, EV_SYN, SYN_REPORT, 0),
        ],
    );
    drain(&mut ctx);

    // contact ends; residual pressure readings clamp to zero, once
    ctx.inject_frame(
        id,
        &[
            RawEvent::new(30, EV_KEY, BTN_TOUCH, 0),
            RawEvent::new(30, EV_ABS, ABS_PRESSURE, 12),
            RawEvent::new(30, EV_SYN, SYN_REPORT, 0),
        ],
    );
    let events = drain(&mut ctx);
    let axes = events
        .iter()
        .find_map(|e| match e {
            Event::TabletAxis { changed, axes, .. }
                if changed.contains(TabletAxis::Pressure) =>
            {
                Some(*axes)
            }
            _ => None,
        })
        .expect("no pressure event");
    assert_eq!(axes.get(TabletAxis::Pressure), 0.0);

    // a second residual reading is not re-emitted
    ctx.inject_frame(
        id,
        &[
            RawEvent::new(40, EV_ABS, ABS_PRESSURE, 6),
            RawEvent::new(40, EV_SYN, SYN_REPORT, 0),
        ],
    );
    let events = drain(&mut ctx);
    assert!(events.iter().all(|e| match e {
        Event::TabletAxis { changed, .. } => !changed.contains(TabletAxis::Pressure),
        _ => true,
    }));
}

#[test]
fn test_buttons_released_before_proximity_out() {
    // property 7: button closure no later than proximity-out
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(tablet_descriptor());
    drain(&mut ctx);

    pen_prox_in(&mut ctx, id, 10, 1000, 1000);
    ctx.inject_frame(
        id,
        &[
            RawEvent::new(20, EV_KEY, BTN_STYLUS, 1),
            RawEvent::new(20, EV_SYN, SYN_REPORT, 0),
        ],
    );
    // stylus leaves with the button still physically down
    pen_prox_out(&mut ctx, id, 50);

    let events = drain(&mut ctx);
    let mut saw_press = false;
    let mut saw_release = false;
    let mut saw_out = false;
    for e in &events {
        match e {
            Event::TabletButton {
                button: BTN_STYLUS,
                state,
                ..
            } => match state {
                ButtonState::Pressed => {
                    assert!(!saw_out);
                    saw_press = true;
                }
                ButtonState::Released => {
                    assert!(saw_press);
                    assert!(!saw_out, "release came after proximity-out");
                    saw_release = true;
                }
            },
            Event::TabletProximity {
                state: ProximityState::Out,
                ..
            } => {
                assert!(saw_release, "proximity-out before button release");
                saw_out = true;
            }
            _ => {}
        }
    }
    assert!(saw_press && saw_release && saw_out);
}

#[test]
fn test_serialized_tool_shared_across_tablets() {
    let mut ctx = Context::new();
    let a = ctx.add_synthetic_device(tablet_descriptor());
    let mut second = tablet_descriptor();
    second.sysname = "event15".into();
    let b = ctx.add_synthetic_device(second);
    drain(&mut ctx);

    let frame = |time, tool_down| {
        vec![
            RawEvent::new(time, EV_MSC, MSC_SERIAL, 0x5eab),
            RawEvent::new(time, EV_KEY, BTN_TOOL_PEN, tool_down),
            RawEvent::new(time, EV_ABS, ABS_X, 500),
            RawEvent::new(time, EV_SYN, SYN_REPORT, 0),
        ]
    };
    ctx.inject_frame(a, &frame(10, 1));
    ctx.inject_frame(a, &frame(20, 0));
    ctx.inject_frame(b, &frame(30, 1));

    let events = drain(&mut ctx);
    let tools: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::TabletProximity {
                state: ProximityState::In,
                tool,
                ..
            } => Some(tool.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(tools.len(), 2);
    // same serial, same physical pen: one shared tool object
    assert!(std::rc::Rc::ptr_eq(&tools[0], &tools[1]));
    assert_eq!(tools[0].serial, 0x5eab);
}

#[test]
fn test_left_handed_deferred_until_prox_out() {
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(tablet_descriptor());
    drain(&mut ctx);

    pen_prox_in(&mut ctx, id, 10, 1000, 1000);
    drain(&mut ctx);

    assert_eq!(
        ctx.config_set(id, ConfigKey::LeftHanded, ConfigValue::Bool(true)),
        semdev_core::ConfigStatus::Success
    );

    // while in proximity the axes stay unflipped
    ctx.inject_frame(
        id,
        &[
            RawEvent::new(20, EV_ABS, ABS_X, 1000),
            RawEvent::new(20, EV_SYN, SYN_REPORT, 0),
        ],
    );
    let events = drain(&mut ctx);
    let x = events
        .iter()
        .find_map(|e| match e {
            Event::TabletAxis { axes, .. } => Some(axes.get(TabletAxis::X)),
            _ => None,
        })
        .expect("no axis event");
    assert_eq!(x, 1000.0);

    pen_prox_out(&mut ctx, id, 30);
    drain(&mut ctx);

    // back in proximity: now inverted
    pen_prox_in(&mut ctx, id, 40, 1000, 1000);
    let events = drain(&mut ctx);
    let x = events
        .iter()
        .find_map(|e| match e {
            Event::TabletProximity { axes, .. } => Some(axes.get(TabletAxis::X)),
            _ => None,
        })
        .expect("no proximity event");
    assert_eq!(x, f64::from(31496 - 1000));
}

fn mouse_tablet_descriptor() -> semdev_core::DeviceDescriptor {
    let mut d = tablet_descriptor();
    d.sysname = "event16".into();
    d.rel_axes.insert(REL_WHEEL);
    d.abs_axes.insert(
        ABS_Z,
        semdev_core::AbsAxisInfo::new(0, 359),
    );
    d.abs_axes.insert(ABS_WHEEL, semdev_core::AbsAxisInfo::new(0, 1023));
    d
}

#[test]
fn test_rel_wheel_delta_and_discrete() {
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(mouse_tablet_descriptor());
    drain(&mut ctx);

    ctx.inject_frame(
        id,
        &[
            RawEvent::new(10, EV_KEY, BTN_TOOL_MOUSE, 1),
            RawEvent::new(10, EV_SYN, SYN_REPORT, 0),
        ],
    );
    drain(&mut ctx);

    // one click toward the user
    ctx.inject_frame(
        id,
        &[
            RawEvent::new(20, EV_REL, REL_WHEEL, -1),
            RawEvent::new(20, EV_SYN, SYN_REPORT, 0),
        ],
    );
    let events = drain(&mut ctx);
    let (changed, deltas, discrete) = events
        .iter()
        .find_map(|e| match e {
            Event::TabletAxis {
                changed,
                deltas,
                wheel_discrete,
                ..
            } => Some((*changed, *deltas, *wheel_discrete)),
            _ => None,
        })
        .expect("no axis event");
    assert!(changed.contains(TabletAxis::RelWheel));
    assert_eq!(discrete, 1); // kernel sign is inverted
    // angle delta: one click at the default 15 degrees
    assert!((deltas.get(TabletAxis::RelWheel) - 15.0).abs() < 1e-9);
}

#[test]
fn test_artpen_absolute_rotation_offset() {
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(mouse_tablet_descriptor());
    drain(&mut ctx);

    // a pen (not mouse) with a real rotation axis: zero points east
    ctx.inject_frame(
        id,
        &[
            RawEvent::new(10, EV_KEY, BTN_TOOL_PEN, 1),
            RawEvent::new(10, EV_ABS, ABS_Z, 0),
            RawEvent::new(10, EV_SYN, SYN_REPORT, 0),
        ],
    );
    let events = drain(&mut ctx);
    let axes = events
        .iter()
        .find_map(|e| match e {
            Event::TabletProximity { axes, .. } => Some(*axes),
            _ => None,
        })
        .expect("no proximity event");
    assert!((axes.get(TabletAxis::RotationZ) - 90.0).abs() < 1.5);
}

#[test]
fn test_airbrush_slider_normalized() {
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(mouse_tablet_descriptor());
    drain(&mut ctx);

    ctx.inject_frame(
        id,
        &[
            RawEvent::new(10, EV_KEY, BTN_TOOL_AIRBRUSH, 1),
            RawEvent::new(10, EV_ABS, ABS_WHEEL, 512),
            RawEvent::new(10, EV_SYN, SYN_REPORT, 0),
        ],
    );
    let events = drain(&mut ctx);
    let axes = events
        .iter()
        .find_map(|e| match e {
            Event::TabletProximity { axes, .. } => Some(*axes),
            _ => None,
        })
        .expect("no proximity event");
    let slider = axes.get(TabletAxis::Slider);
    assert!((slider - 512.0 / 1023.0).abs() < 1e-3, "slider {}", slider);
}

#[test]
fn test_initial_proximity_synthesized() {
    let mut ctx = Context::new();
    let mut descriptor = tablet_descriptor();
    descriptor.initial_down.insert(BTN_TOOL_PEN);
    let _id = ctx.add_synthetic_device(descriptor);

    let events = drain(&mut ctx);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::TabletProximity {
            state: ProximityState::In,
            ..
        }
    )));
}

#[test]
fn test_device_removal_closes_proximity() {
    let mut ctx = Context::new();
    let id = ctx.add_synthetic_device(tablet_descriptor());
    drain(&mut ctx);

    pen_prox_in(&mut ctx, id, 10, 1000, 1000);
    ctx.inject_frame(
        id,
        &[
            RawEvent::new(20, EV_KEY, BTN_STYLUS, 1),
            RawEvent::new(20, EV_SYN, SYN_REPORT, 0),
        ],
    );
    drain(&mut ctx);

    ctx.remove_device(id).unwrap();
    let events = drain(&mut ctx);
    // release, then proximity-out, then the removal notice
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            Event::TabletButton {
                state: ButtonState::Released,
                ..
            } => "release",
            Event::TabletProximity {
                state: ProximityState::Out,
                ..
            } => "prox-out",
            Event::DeviceRemoved { .. } => "removed",
            _ => "other",
        })
        .filter(|k| *k != "other")
        .collect();
    assert_eq!(kinds, vec!["release", "prox-out", "removed"]);
}
