// Semdev list-devices
// Enumerate devices and print identity, seat, and capabilities

use std::error::Error;

use semdev_core::backend::path::enumerate_input_nodes;
use semdev_core::{Capability, Context, DirectOpener, Event};

fn capability_string(ctx: &Context, id: semdev_core::DeviceId) -> String {
    let Some(caps) = ctx.device_capabilities(id) else {
        return String::new();
    };
    let mut names = Vec::new();
    if caps.has(Capability::Keyboard) {
        names.push("keyboard");
    }
    if caps.has(Capability::Pointer) {
        names.push("pointer");
    }
    if caps.has(Capability::Touch) {
        names.push("touch");
    }
    if caps.has(Capability::Tablet) {
        names.push("tablet");
    }
    if caps.has(Capability::Buttonset) {
        names.push("buttonset");
    }
    names.join(" ")
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let mut ctx = Context::with_backend(Box::new(DirectOpener))?;

    for node in enumerate_input_nodes()? {
        if let Err(e) = ctx.add_device_from_path(&node) {
            log::debug!("skipping {}: {}", node.display(), e);
        }
    }

    while let Some(event) = ctx.get_event() {
        let Event::DeviceAdded { device } = event else {
            continue;
        };
        let name = ctx.device_name(device).unwrap_or("unknown").to_string();
        let sysname = ctx.device_sysname(device).unwrap_or("?").to_string();
        let (seat_phys, seat_logical) = ctx
            .device_seat(device)
            .unwrap_or_else(|| ("?".into(), "?".into()));
        let group = ctx
            .device_group(device)
            .map(|g| g.0.to_string())
            .unwrap_or_else(|| "?".into());

        println!("Device:       {}", name);
        println!("Kernel:       {}", sysname);
        println!("Group:        {}", group);
        println!("Seat:         {}, {}", seat_phys, seat_logical);
        println!("Capabilities: {}", capability_string(&ctx, device));
        println!();
    }

    Ok(())
}
