// Semdev backend
// Opening devices, extracting descriptors, classifying capabilities

pub mod path;

use std::io;
use std::path::Path;

use crate::codes::*;
use crate::device::{AbsAxisInfo, Capability, CapabilitySet, DeviceDescriptor};

/// The host-provided restricted open/close seam. The context never opens
/// device nodes on its own authority; a privileged host hands handles out
/// and takes them back on removal, suspend, and destruction.
pub trait DeviceOpener {
    fn open(&mut self, path: &Path) -> io::Result<evdev::Device>;
    fn close(&mut self, device: evdev::Device);
}

/// Opener for hosts that already run with access to /dev/input.
#[derive(Debug, Default)]
pub struct DirectOpener;

impl DeviceOpener for DirectOpener {
    fn open(&mut self, path: &Path) -> io::Result<evdev::Device> {
        evdev::Device::open(path)
    }

    fn close(&mut self, device: evdev::Device) {
        drop(device);
    }
}

/// Which dispatcher a device gets. One per device, picked at add time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Keyboard,
    Touchpad,
    Tablet,
    Buttonset,
    Fallback,
}

/// Derive capabilities and the dispatcher class from a descriptor.
pub fn classify(descriptor: &DeviceDescriptor) -> (CapabilitySet, DeviceClass) {
    let mut caps = CapabilitySet::empty();

    let has_abs_pos = descriptor.has_abs(ABS_X) && descriptor.has_abs(ABS_Y);
    let is_tablet = descriptor.has_key(BTN_TOOL_PEN)
        || descriptor.has_key(BTN_TOOL_RUBBER)
        || (descriptor.has_key(BTN_STYLUS) && has_abs_pos);
    let has_ring_or_strip = descriptor.has_abs(ABS_WHEEL)
        || descriptor.has_abs(ABS_THROTTLE)
        || descriptor.has_abs(ABS_RX)
        || descriptor.has_abs(ABS_RY);
    let is_buttonset = !is_tablet
        && has_ring_or_strip
        && !descriptor.has_key(BTN_TOOL_FINGER)
        && !descriptor.has_rel(REL_X);
    let is_touchpad = !is_tablet
        && descriptor.has_key(BTN_TOOL_FINGER)
        && (descriptor.has_abs(ABS_MT_POSITION_X) || has_abs_pos);
    let is_keyboard = is_keyboard_descriptor(descriptor);
    let is_pointer = descriptor.has_rel(REL_X) && descriptor.has_rel(REL_Y)
        || (has_abs_pos && descriptor.has_key(BTN_LEFT));
    let is_touch = !is_tablet && !is_touchpad && has_abs_pos && descriptor.has_key(BTN_TOUCH);

    if is_tablet {
        caps.add(Capability::Tablet);
        return (caps, DeviceClass::Tablet);
    }
    if is_buttonset {
        caps.add(Capability::Buttonset);
        return (caps, DeviceClass::Buttonset);
    }
    if is_touchpad {
        caps.add(Capability::Pointer);
        caps.add(Capability::Touch);
        return (caps, DeviceClass::Touchpad);
    }

    if is_keyboard {
        caps.add(Capability::Keyboard);
    }
    if is_pointer {
        caps.add(Capability::Pointer);
    }
    if is_touch {
        caps.add(Capability::Touch);
    }
    if caps.is_empty() {
        // a device with keys only (media buttons etc.) still counts as a
        // keyboard for event purposes
        caps.add(Capability::Keyboard);
        return (caps, DeviceClass::Keyboard);
    }

    if is_keyboard && !is_pointer && !is_touch {
        (caps, DeviceClass::Keyboard)
    } else {
        (caps, DeviceClass::Fallback)
    }
}

// The QWERTY row plus representative letters and space. A device carrying
// all of these is a typing keyboard, not a button collection.
const QWERTY_CODES: &[u16] = &[16, 17, 18, 19, 20, 21];
const A_Z_SPACE_CODES: &[u16] = &[KEY_SPACE, KEY_A, KEY_Z];

pub fn is_keyboard_descriptor(descriptor: &DeviceDescriptor) -> bool {
    QWERTY_CODES.iter().all(|c| descriptor.has_key(*c))
        && A_Z_SPACE_CODES.iter().all(|c| descriptor.has_key(*c))
}

/// Read identity, axis ranges, key sets and properties out of an opened
/// evdev device.
pub fn describe_device(device: &evdev::Device, sysname: &str) -> DeviceDescriptor {
    let mut descriptor = DeviceDescriptor {
        name: device.name().unwrap_or("unknown").to_string(),
        sysname: sysname.to_string(),
        vendor_id: device.input_id().vendor(),
        product_id: device.input_id().product(),
        group_tag: device.physical_path().unwrap_or("").to_string(),
        ..Default::default()
    };

    if let Some(keys) = device.supported_keys() {
        for key in keys.iter() {
            descriptor.keys.insert(key.code());
        }
    }
    if let Some(rels) = device.supported_relative_axes() {
        for rel in rels.iter() {
            descriptor.rel_axes.insert(rel.0);
        }
    }
    if let Some(axes) = device.supported_absolute_axes() {
        if let Ok(state) = device.get_abs_state() {
            for axis in axes.iter() {
                let code = axis.0;
                let info = state[code as usize];
                descriptor.abs_axes.insert(
                    code,
                    AbsAxisInfo {
                        minimum: info.minimum,
                        maximum: info.maximum,
                        fuzz: info.fuzz,
                        resolution: info.resolution,
                    },
                );
            }
        }
    }
    for prop in device.properties().iter() {
        descriptor.properties.insert(prop.0);
    }
    if let Ok(down) = device.get_key_state() {
        for key in down.iter() {
            descriptor.initial_down.insert(key.code());
        }
    }
    descriptor.mt_slot_count = descriptor
        .abs_axes
        .get(&ABS_MT_SLOT)
        .map(|info| (info.maximum - info.minimum + 1).max(0) as usize)
        .unwrap_or(0);

    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_with(keys: &[u16], abs: &[u16], rel: &[u16]) -> DeviceDescriptor {
        let mut d = DeviceDescriptor::default();
        for k in keys {
            d.keys.insert(*k);
        }
        for a in abs {
            d.abs_axes.insert(*a, AbsAxisInfo::new(0, 100));
        }
        for r in rel {
            d.rel_axes.insert(*r);
        }
        d
    }

    #[test]
    fn test_classify_mouse() {
        let d = descriptor_with(&[BTN_LEFT, BTN_RIGHT], &[], &[REL_X, REL_Y, REL_WHEEL]);
        let (caps, class) = classify(&d);
        assert_eq!(class, DeviceClass::Fallback);
        assert!(caps.has(Capability::Pointer));
        assert!(!caps.has(Capability::Keyboard));
    }

    #[test]
    fn test_classify_keyboard() {
        let mut keys: Vec<u16> = (16..=21).collect();
        keys.extend_from_slice(&[KEY_SPACE, KEY_A, KEY_Z]);
        let d = descriptor_with(&keys, &[], &[]);
        let (caps, class) = classify(&d);
        assert_eq!(class, DeviceClass::Keyboard);
        assert!(caps.has(Capability::Keyboard));
    }

    #[test]
    fn test_classify_touchpad() {
        let d = descriptor_with(
            &[BTN_TOOL_FINGER, BTN_TOUCH, BTN_LEFT],
            &[ABS_X, ABS_Y, ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT],
            &[],
        );
        let (caps, class) = classify(&d);
        assert_eq!(class, DeviceClass::Touchpad);
        assert!(caps.has(Capability::Pointer));
        assert!(caps.has(Capability::Touch));
    }

    #[test]
    fn test_classify_tablet() {
        let d = descriptor_with(
            &[BTN_TOOL_PEN, BTN_STYLUS, BTN_TOUCH],
            &[ABS_X, ABS_Y, ABS_PRESSURE, ABS_TILT_X, ABS_TILT_Y],
            &[],
        );
        let (_, class) = classify(&d);
        assert_eq!(class, DeviceClass::Tablet);
    }

    #[test]
    fn test_classify_pad_buttonset() {
        let d = descriptor_with(&[BTN_0], &[ABS_WHEEL, ABS_MISC], &[]);
        let (caps, class) = classify(&d);
        assert_eq!(class, DeviceClass::Buttonset);
        assert!(caps.has(Capability::Buttonset));
    }

    #[test]
    fn test_classify_combo_is_fallback() {
        let mut keys: Vec<u16> = (16..=21).collect();
        keys.extend_from_slice(&[KEY_SPACE, KEY_A, KEY_Z, BTN_LEFT, BTN_RIGHT]);
        let d = descriptor_with(&keys, &[], &[REL_X, REL_Y]);
        let (caps, class) = classify(&d);
        assert_eq!(class, DeviceClass::Fallback);
        assert!(caps.has(Capability::Keyboard));
        assert!(caps.has(Capability::Pointer));
    }
}
