// Semdev device records
// Capabilities, axis ranges, groups, and per-device state

use std::collections::{HashMap, HashSet};

use crate::config::DeviceConfig;
use crate::seat::SeatId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

/// Broad device classes a single device can combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Capability {
    Keyboard = 0,
    Pointer = 1,
    Touch = 2,
    Tablet = 3,
    Buttonset = 4,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, cap: Capability) -> Self {
        self.0 |= 1 << cap as u8;
        self
    }

    pub fn add(&mut self, cap: Capability) {
        self.0 |= 1 << cap as u8;
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.0 & (1 << cap as u8) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Range and resolution of one absolute axis, as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsAxisInfo {
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    /// Units per millimeter; 0 when the kernel does not know.
    pub resolution: i32,
}

impl AbsAxisInfo {
    pub fn new(minimum: i32, maximum: i32) -> Self {
        Self {
            minimum,
            maximum,
            fuzz: 0,
            resolution: 0,
        }
    }

    pub fn with_resolution(mut self, resolution: i32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_fuzz(mut self, fuzz: i32) -> Self {
        self.fuzz = fuzz;
        self
    }

    pub fn range(&self) -> f64 {
        f64::from(self.maximum - self.minimum)
    }

    /// Physical length of the axis in mm, when resolution is known.
    pub fn size_mm(&self) -> Option<f64> {
        if self.resolution > 0 {
            Some(self.range() / f64::from(self.resolution))
        } else {
            None
        }
    }
}

/// Everything the backend learns about a device before it is added:
/// identity, axis ranges, supported codes, property bits. Synthetic test
/// devices are built from the same description.
#[derive(Debug, Clone, Default)]
pub struct DeviceDescriptor {
    pub name: String,
    pub sysname: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub abs_axes: HashMap<u16, AbsAxisInfo>,
    pub rel_axes: HashSet<u16>,
    pub keys: HashSet<u16>,
    pub properties: HashSet<u16>,
    /// Key/button codes already down when the device is opened. Drives the
    /// initial tablet proximity check.
    pub initial_down: HashSet<u16>,
    /// Number of MT slots, 0 for single-touch devices.
    pub mt_slot_count: usize,
    /// Physical-group tag: devices sharing one non-empty tag (e.g. the same
    /// USB path) land in the same device group.
    pub group_tag: String,
}

impl DeviceDescriptor {
    pub fn has_key(&self, code: u16) -> bool {
        self.keys.contains(&code)
    }

    pub fn has_rel(&self, code: u16) -> bool {
        self.rel_axes.contains(&code)
    }

    pub fn has_abs(&self, code: u16) -> bool {
        self.abs_axes.contains_key(&code)
    }

    pub fn abs_info(&self, code: u16) -> Option<AbsAxisInfo> {
        self.abs_axes.get(&code).copied()
    }

    pub fn has_property(&self, prop: u16) -> bool {
        self.properties.contains(&prop)
    }
}

/// Left-handed is applied lazily: the wanted value only becomes current at
/// a gesture-neutral point (buttons up, tool out of proximity).
#[derive(Debug, Clone, Copy, Default)]
pub struct LeftHandedState {
    pub enabled: bool,
    pub want_enabled: bool,
    pub enabled_default: bool,
}

/// One opened input device.
#[derive(Debug)]
pub struct Device {
    pub id: DeviceId,
    pub descriptor: DeviceDescriptor,
    pub seat: SeatId,
    pub group: GroupId,
    pub capabilities: CapabilitySet,
    pub config: DeviceConfig,
    pub left_handed: LeftHandedState,
    /// Whether the device has been removed but is still externally
    /// referenced; read queries keep resolving, events stop.
    pub removed: bool,
}

impl Device {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn sysname(&self) -> &str {
        &self.descriptor.sysname
    }

    /// Touchpad/tablet surface width in mm, if resolutions are known.
    pub fn width_mm(&self) -> Option<f64> {
        let info = self
            .descriptor
            .abs_info(crate::codes::ABS_MT_POSITION_X)
            .or_else(|| self.descriptor.abs_info(crate::codes::ABS_X))?;
        info.size_mm()
    }

    pub fn is_clickpad(&self) -> bool {
        self.descriptor.has_property(crate::codes::PROP_BUTTONPAD)
    }

    /// Swap left/right button codes when left-handed is in effect. Only
    /// physical and soft buttons go through here; tap and clickfinger
    /// mappings stay fixed.
    pub fn map_button(&self, button: u16) -> u16 {
        if !self.left_handed.enabled {
            return button;
        }
        match button {
            crate::codes::BTN_LEFT => crate::codes::BTN_RIGHT,
            crate::codes::BTN_RIGHT => crate::codes::BTN_LEFT,
            other => other,
        }
    }
}

/// Groups tie together devices from one physical unit. Lifetime equals the
/// last member's lifetime; the table drops a group with its final member.
#[derive(Debug, Default)]
pub struct GroupTable {
    by_tag: HashMap<String, GroupId>,
    members: HashMap<GroupId, HashSet<DeviceId>>,
    next_id: u32,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, device: DeviceId, tag: &str) -> GroupId {
        let id = if tag.is_empty() {
            // untagged devices each get a singleton group
            let id = GroupId(self.next_id);
            self.next_id += 1;
            id
        } else if let Some(id) = self.by_tag.get(tag) {
            *id
        } else {
            let id = GroupId(self.next_id);
            self.next_id += 1;
            self.by_tag.insert(tag.to_string(), id);
            id
        };
        self.members.entry(id).or_default().insert(device);
        id
    }

    pub fn remove_member(&mut self, group: GroupId, device: DeviceId) {
        let emptied = match self.members.get_mut(&group) {
            Some(set) => {
                set.remove(&device);
                set.is_empty()
            }
            None => false,
        };
        if emptied {
            self.members.remove(&group);
            self.by_tag.retain(|_, id| *id != group);
        }
    }

    pub fn members(&self, group: GroupId) -> impl Iterator<Item = DeviceId> + '_ {
        self.members
            .get(&group)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }
}
