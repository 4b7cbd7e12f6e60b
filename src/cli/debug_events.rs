// Semdev debug-events
// Print the outbound semantic stream until interrupted

use std::error::Error;
use std::path::PathBuf;

use semdev_core::backend::path::enumerate_input_nodes;
use semdev_core::codes::key_name;
use semdev_core::{
    ButtonState, ConfigKey, ConfigValue, Context, DirectOpener, Event, KeyState, ProximityState,
};

fn state_str(state: ButtonState) -> &'static str {
    match state {
        ButtonState::Pressed => "pressed",
        ButtonState::Released => "released",
    }
}

fn print_event(ctx: &Context, event: &Event, start: u64) {
    let device = ctx
        .device_sysname(event.device())
        .unwrap_or("gone")
        .to_string();
    let time = event
        .time()
        .map(|t| format!("{:+8.3}s", (t.saturating_sub(start)) as f64 / 1000.0))
        .unwrap_or_else(|| format!("{:>9}", "-"));

    let details = match event {
        Event::DeviceAdded { device } => {
            let name = ctx.device_name(*device).unwrap_or("unknown");
            format!("DEVICE_ADDED      {}", name)
        }
        Event::DeviceRemoved { device } => {
            let name = ctx.device_name(*device).unwrap_or("unknown");
            format!("DEVICE_REMOVED    {}", name)
        }
        Event::KeyboardKey {
            key,
            state,
            seat_key_count,
            ..
        } => {
            let state = match state {
                KeyState::Pressed => "pressed",
                KeyState::Released => "released",
            };
            format!(
                "KEYBOARD_KEY      {} {} (seat count {})",
                key_name(*key),
                state,
                seat_key_count
            )
        }
        Event::PointerMotion { dx, dy, .. } => {
            format!("POINTER_MOTION    {:6.2}/{:6.2}", dx, dy)
        }
        Event::PointerMotionAbsolute { position, .. } => {
            format!("POINTER_ABSOLUTE  {:7.2}/{:7.2}", position.x, position.y)
        }
        Event::PointerButton {
            button,
            state,
            seat_button_count,
            ..
        } => format!(
            "POINTER_BUTTON    {} {} (seat count {})",
            key_name(*button),
            state_str(*state),
            seat_button_count
        ),
        Event::PointerAxis {
            axis, value, source, ..
        } => format!("POINTER_AXIS      {:?} {:6.2} ({:?})", axis, value, source),
        Event::TouchDown {
            slot, seat_slot, position, ..
        } => format!(
            "TOUCH_DOWN        {} ({}) {:7.2}/{:7.2}",
            slot, seat_slot, position.x, position.y
        ),
        Event::TouchMotion {
            slot, seat_slot, position, ..
        } => format!(
            "TOUCH_MOTION      {} ({}) {:7.2}/{:7.2}",
            slot, seat_slot, position.x, position.y
        ),
        Event::TouchUp { slot, seat_slot, .. } => {
            format!("TOUCH_UP          {} ({})", slot, seat_slot)
        }
        Event::TouchCancel { slot, seat_slot, .. } => {
            format!("TOUCH_CANCEL      {} ({})", slot, seat_slot)
        }
        Event::TouchFrame { .. } => "TOUCH_FRAME".to_string(),
        Event::TabletProximity { tool, state, .. } => {
            let state = match state {
                ProximityState::In => "in",
                ProximityState::Out => "out",
            };
            format!(
                "TABLET_PROXIMITY  {:?} serial {:#x} {}",
                tool.tool_type, tool.serial, state
            )
        }
        Event::TabletAxis { axes, changed, .. } => {
            let mut parts = Vec::new();
            for axis in changed.iter() {
                parts.push(format!("{:?}: {:.2}", axis, axes.get(axis)));
            }
            format!("TABLET_AXIS       {}", parts.join(" "))
        }
        Event::TabletButton { button, state, .. } => {
            format!("TABLET_BUTTON     {} {}", key_name(*button), state_str(*state))
        }
        Event::ButtonsetButton { button, state, .. } => {
            format!("BUTTONSET_BUTTON  {} {}", key_name(*button), state_str(*state))
        }
        Event::ButtonsetAxis {
            axis,
            kind,
            value,
            delta,
            ..
        } => format!(
            "BUTTONSET_AXIS    {} {:?} {:.3} (delta {:+.3})",
            axis, kind, value, delta
        ),
    };

    println!("{:<10} {} {}", device, time, details);
}

fn apply_options(ctx: &mut Context, id: semdev_core::DeviceId, tap: bool, natural: bool) {
    if tap {
        ctx.config_set(id, ConfigKey::TapEnabled, ConfigValue::Bool(true));
    }
    if natural {
        ctx.config_set(id, ConfigKey::NaturalScroll, ConfigValue::Bool(true));
    }
}

pub fn run(paths: &[PathBuf], enable_tap: bool, natural_scroll: bool) -> Result<(), Box<dyn Error>> {
    let mut ctx = Context::with_backend(Box::new(DirectOpener))?;

    let nodes = if paths.is_empty() {
        enumerate_input_nodes()?
    } else {
        paths.to_vec()
    };
    for node in nodes {
        match ctx.add_device_from_path(&node) {
            Ok(id) => apply_options(&mut ctx, id, enable_tap, natural_scroll),
            Err(e) => log::debug!("skipping {}: {}", node.display(), e),
        }
    }

    let start = ctx.now();
    let fd = ctx.fd().ok_or("context has no backend fd")?;

    loop {
        while let Some(event) = ctx.get_event() {
            print_event(&ctx, &event, start);
        }

        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, -1) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                break;
            }
            return Err(err.into());
        }
        ctx.dispatch()?;
    }

    Ok(())
}
