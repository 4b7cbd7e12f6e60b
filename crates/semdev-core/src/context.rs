// Semdev context
// Owns the queue, devices, seats, tools, and the dispatch loop

use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use crate::backend::path::PathBackend;
use crate::backend::{classify, describe_device, DeviceClass, DeviceOpener};
use crate::codes::*;
use crate::config::{
    AccelProfile, CalibrationMatrix, ClickMethod, ConfigKey, ConfigStatus, ConfigValue,
    DeviceConfig, ScrollMethod, SendEventsMode,
};
use crate::device::{Device, DeviceDescriptor, DeviceId, GroupTable, LeftHandedState};
use crate::dispatch::{DeviceDispatch, DispatchCtx};
use crate::event::Event;
use crate::frame::{FrameBuffer, RawEvent};
use crate::queue::EventQueue;
use crate::quirks::Quirks;
use crate::seat::SeatTable;
use crate::tablet::tool::ToolRegistry;
use crate::tablet::TabletDispatch;
use crate::timer::TimerWheel;
use crate::touchpad::TouchpadDispatch;

#[derive(Debug, Clone, Copy)]
enum Clock {
    Monotonic,
    Manual(u64),
}

struct DeviceEntry {
    device: Device,
    dispatch: DeviceDispatch,
    frames: FrameBuffer,
    path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No such device")]
    NoSuchDevice,
}

/// Process-wide state: one per consumer thread. All mutation happens from
/// calls on this object; there is no internal threading.
pub struct Context {
    queue: EventQueue,
    timers: TimerWheel,
    seats: SeatTable,
    tools: ToolRegistry,
    quirks: Quirks,
    devices: HashMap<DeviceId, DeviceEntry>,
    /// Removed devices still resolvable for read queries.
    retired: HashMap<DeviceId, Device>,
    groups: GroupTable,
    backend: Option<PathBackend>,
    /// Paths closed by suspend, in their original add order.
    suspended_paths: Vec<(PathBuf, String, String)>,
    clock: Clock,
    next_device_id: u32,
}

impl Context {
    /// A context without an fd backend; devices are added synthetically
    /// and frames injected. Time is a manual monotonic counter.
    pub fn new() -> Self {
        Self {
            queue: EventQueue::new(),
            timers: TimerWheel::new(),
            seats: SeatTable::new(),
            tools: ToolRegistry::new(),
            quirks: Quirks::new(),
            devices: HashMap::new(),
            retired: HashMap::new(),
            groups: GroupTable::new(),
            backend: None,
            suspended_paths: Vec::new(),
            clock: Clock::Manual(0),
            next_device_id: 1,
        }
    }

    /// A context reading real devices through the restricted opener.
    pub fn with_backend(opener: Box<dyn DeviceOpener>) -> io::Result<Self> {
        let mut context = Self::new();
        context.backend = Some(PathBackend::new(opener)?);
        context.clock = Clock::Monotonic;
        Ok(context)
    }

    /// Replace the quirk database; meant to be called before devices are
    /// added.
    pub fn set_quirks(&mut self, quirks: Quirks) {
        self.quirks = quirks;
    }

    /// The fd the host polls for readability before calling `dispatch`.
    pub fn fd(&self) -> Option<RawFd> {
        self.backend.as_ref().map(|b| b.fd())
    }

    /// Current time in monotonic milliseconds.
    pub fn now(&self) -> u64 {
        match self.clock {
            Clock::Manual(t) => t,
            Clock::Monotonic => {
                let mut ts = libc::timespec {
                    tv_sec: 0,
                    tv_nsec: 0,
                };
                unsafe {
                    libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
                }
                ts.tv_sec as u64 * 1000 + ts.tv_nsec as u64 / 1_000_000
            }
        }
    }

    /// Pull the next queued event, if any.
    pub fn get_event(&mut self) -> Option<Event> {
        self.queue.pop()
    }

    pub fn events_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Read all pending kernel events, process complete frames, and fire
    /// due timers. Called when the context fd signals readable.
    pub fn dispatch(&mut self) -> Result<(), ContextError> {
        let now = self.now();
        let batches = match self.backend.as_mut() {
            Some(backend) => backend.poll(now)?,
            None => Vec::new(),
        };
        for batch in batches {
            if batch.gone {
                self.retire_device(batch.device, now);
                continue;
            }
            self.feed_events(batch.device, &batch.events);
        }
        self.fire_timers(now);
        if let Some(backend) = &self.backend {
            backend.arm_timer(self.timers.next_deadline());
        }
        Ok(())
    }

    fn feed_events(&mut self, id: DeviceId, events: &[RawEvent]) {
        let mut frames = Vec::new();
        {
            let Some(entry) = self.devices.get_mut(&id) else {
                return;
            };
            for e in events {
                if e.kind == EV_SYN && e.code == SYN_DROPPED {
                    // the kernel overwrote part of the stream; the partial
                    // frame cannot be trusted
                    log::warn!("{}: SYN_DROPPED, discarding partial frame", entry.device.name());
                    entry.frames.clear();
                    continue;
                }
                if let Some(frame) = entry.frames.push(*e) {
                    frames.push(frame);
                }
            }
        }
        for frame in frames {
            self.process_frame(id, &frame);
        }
    }

    fn process_frame(&mut self, id: DeviceId, frame: &[RawEvent]) {
        let Some(entry) = self.devices.get_mut(&id) else {
            return;
        };
        if entry.device.removed || entry.device.config.send_events == SendEventsMode::Disabled {
            return;
        }
        let mut ctx = DispatchCtx {
            queue: &mut self.queue,
            timers: &mut self.timers,
            seats: &mut self.seats,
            tools: &mut self.tools,
            quirks: &self.quirks,
        };
        entry.dispatch.process_frame(&mut entry.device, &mut ctx, frame);
    }

    fn fire_timers(&mut self, now: u64) {
        // a fired timer may set another one already due
        loop {
            let due = self.timers.fire_due(now);
            if due.is_empty() {
                break;
            }
            for (id, kind, deadline) in due {
                let Some(entry) = self.devices.get_mut(&id) else {
                    continue;
                };
                if entry.device.removed {
                    continue;
                }
                let mut ctx = DispatchCtx {
                    queue: &mut self.queue,
                    timers: &mut self.timers,
                    seats: &mut self.seats,
                    tools: &mut self.tools,
                    quirks: &self.quirks,
                };
                entry
                    .dispatch
                    .handle_timeout(&mut entry.device, &mut ctx, kind, deadline);
            }
        }
    }

    /// Advance the manual clock, firing timers on the way. No-op on a
    /// monotonic-clock context.
    pub fn advance_clock(&mut self, to: u64) {
        if let Clock::Manual(t) = self.clock {
            if to > t {
                self.clock = Clock::Manual(to);
            }
            self.fire_timers(to.max(t));
        }
    }

    /// Inject one complete evdev frame into a synthetic device. The frame
    /// need not end in SYN_REPORT; partial input stays buffered.
    pub fn inject_frame(&mut self, id: DeviceId, events: &[RawEvent]) {
        if let Some(first) = events.first() {
            // timers due before this frame fire first, like in dispatch
            self.advance_clock(first.time);
        }
        self.feed_events(id, events);
        if let Some(last) = events.last() {
            self.advance_clock(last.time);
        }
    }

    fn alloc_device_id(&mut self) -> DeviceId {
        let id = DeviceId(self.next_device_id);
        self.next_device_id += 1;
        id
    }

    fn default_config(
        &self,
        class: DeviceClass,
        descriptor: &DeviceDescriptor,
    ) -> DeviceConfig {
        let quirk = self.quirks.lookup(descriptor.vendor_id, descriptor.product_id);
        let mut config = DeviceConfig::default();
        match class {
            DeviceClass::Touchpad => {
                config.tap_finger_count = 3;
                config.accel_profile = AccelProfile::Linear;
                config.accel_profile_default = AccelProfile::Linear;
                let two_finger = descriptor.mt_slot_count >= 2;
                config.scroll_method = if two_finger {
                    ScrollMethod::TwoFinger
                } else {
                    ScrollMethod::Edge
                };
                config.scroll_method_default = config.scroll_method;
                let is_clickpad = descriptor.has_property(PROP_BUTTONPAD);
                if is_clickpad {
                    config.click_method = if quirk.apple_clickpad {
                        ClickMethod::ClickFinger
                    } else {
                        ClickMethod::ButtonAreas
                    };
                    config.click_method_default = config.click_method;
                }
                config.dwt_enabled = !quirk.dwt_exempt;
                config.dwt_enabled_default = config.dwt_enabled;
            }
            DeviceClass::Fallback => {
                config.accel_profile = AccelProfile::SmoothSimple;
                config.accel_profile_default = AccelProfile::SmoothSimple;
            }
            DeviceClass::Keyboard | DeviceClass::Tablet | DeviceClass::Buttonset => {}
        }
        config
    }

    fn add_device_common(
        &mut self,
        descriptor: DeviceDescriptor,
        physical_seat: &str,
        logical_seat: &str,
        path: Option<PathBuf>,
    ) -> DeviceId {
        let id = self.alloc_device_id();
        let seat = self.seats.get_or_create(physical_seat, logical_seat);
        let group = self.groups.assign(id, &descriptor.group_tag);
        let (capabilities, class) = classify(&descriptor);
        let config = self.default_config(class, &descriptor);

        let device = Device {
            id,
            descriptor,
            seat,
            group,
            capabilities,
            config,
            left_handed: LeftHandedState::default(),
            removed: false,
        };

        let dispatch = match class {
            DeviceClass::Keyboard => DeviceDispatch::Keyboard(
                crate::keyboard::KeyboardDispatch::new(&device, &self.quirks),
            ),
            DeviceClass::Touchpad => {
                DeviceDispatch::Touchpad(Box::new(TouchpadDispatch::new(&device, &self.quirks)))
            }
            DeviceClass::Tablet => {
                DeviceDispatch::Tablet(Box::new(TabletDispatch::new(&device, &self.quirks)))
            }
            DeviceClass::Buttonset => {
                DeviceDispatch::Buttonset(crate::buttonset::ButtonsetDispatch::new(&device))
            }
            DeviceClass::Fallback => DeviceDispatch::Fallback(
                crate::fallback::FallbackDispatch::new(&device, &self.quirks),
            ),
        };

        self.queue.push(Event::DeviceAdded { device: id });
        self.devices.insert(
            id,
            DeviceEntry {
                device,
                dispatch,
                frames: FrameBuffer::new(),
                path,
            },
        );

        // a tablet tool may already be on the device
        let now = self.now();
        if let Some(entry) = self.devices.get_mut(&id) {
            let mut ctx = DispatchCtx {
                queue: &mut self.queue,
                timers: &mut self.timers,
                seats: &mut self.seats,
                tools: &mut self.tools,
                quirks: &self.quirks,
            };
            entry.dispatch.post_added(&mut entry.device, &mut ctx, now);
        }
        id
    }

    /// Add a device from its description alone; frames are delivered via
    /// `inject_frame`. This is the seam the test suite drives.
    pub fn add_synthetic_device(&mut self, descriptor: DeviceDescriptor) -> DeviceId {
        self.add_device_common(descriptor, "seat0", "default", None)
    }

    /// Open and add a device node. Initial device-added events are queued
    /// before this returns, so the caller can configure the device before
    /// its first input event.
    pub fn add_device_from_path(&mut self, path: &Path) -> Result<DeviceId, ContextError> {
        let backend = self.backend.as_mut().ok_or(ContextError::NoSuchDevice)?;
        let handle = backend.open(path)?;
        let sysname = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        let descriptor = describe_device(&handle, &sysname);
        let id = self.add_device_common(descriptor, "seat0", "default", Some(path.to_path_buf()));
        if let Some(backend) = self.backend.as_mut() {
            backend.track(id, path.to_path_buf(), handle)?;
        }
        Ok(id)
    }

    fn retire_device(&mut self, id: DeviceId, now: u64) {
        let Some(mut entry) = self.devices.remove(&id) else {
            return;
        };
        {
            let mut ctx = DispatchCtx {
                queue: &mut self.queue,
                timers: &mut self.timers,
                seats: &mut self.seats,
                tools: &mut self.tools,
                quirks: &self.quirks,
            };
            entry.dispatch.suspend(&mut entry.device, &mut ctx, now);
        }
        self.timers.cancel_device(id);
        self.groups.remove_member(entry.device.group, id);
        self.queue.push(Event::DeviceRemoved { device: id });
        entry.device.removed = true;
        self.retired.insert(id, entry.device);
    }

    /// Remove a device: all held buttons, keys, and touches are released
    /// first, then the removed event is queued.
    pub fn remove_device(&mut self, id: DeviceId) -> Result<(), ContextError> {
        if !self.devices.contains_key(&id) {
            return Err(ContextError::NoSuchDevice);
        }
        let now = self.now();
        if let Some(backend) = self.backend.as_mut() {
            backend.untrack(id);
        }
        self.retire_device(id, now);
        Ok(())
    }

    /// Drop the record of a removed device once the caller no longer
    /// holds references to it.
    pub fn release_device(&mut self, id: DeviceId) {
        self.retired.remove(&id);
    }

    /// Close every device fd. Devices are removed (with force-released
    /// state); `resume` re-opens and re-adds them in enumeration order.
    pub fn suspend(&mut self) {
        let now = self.now();
        let mut live: Vec<(DeviceId, Option<PathBuf>, String, String)> = self
            .devices
            .iter()
            .map(|(id, e)| {
                let (phys, logical) = self
                    .seats
                    .get(e.device.seat)
                    .map(|s| (s.physical_name.clone(), s.logical_name.clone()))
                    .unwrap_or_else(|| ("seat0".into(), "default".into()));
                (*id, e.path.clone(), phys, logical)
            })
            .collect();
        live.sort_by_key(|(id, ..)| *id);

        if let Some(backend) = self.backend.as_mut() {
            backend.drain_all();
        }
        for (id, path, phys, logical) in live {
            self.retire_device(id, now);
            if let Some(path) = path {
                self.suspended_paths.push((path, phys, logical));
            }
        }
    }

    /// Re-open everything `suspend` closed, in order. Nodes that fail to
    /// open are dropped silently; their removal was already reported.
    pub fn resume(&mut self) {
        let paths = std::mem::take(&mut self.suspended_paths);
        for (path, phys, logical) in paths {
            let Some(backend) = self.backend.as_mut() else {
                continue;
            };
            match backend.open(&path) {
                Ok(handle) => {
                    let sysname = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("")
                        .to_string();
                    let descriptor = describe_device(&handle, &sysname);
                    let id =
                        self.add_device_common(descriptor, &phys, &logical, Some(path.clone()));
                    if let Some(backend) = self.backend.as_mut() {
                        let _ = backend.track(id, path, handle);
                    }
                }
                Err(e) => {
                    log::info!("resume: dropping {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Move a device to another logical seat. The device is destroyed and
    /// re-created: the removed event for the old id precedes the added
    /// event for the new one.
    pub fn set_seat_logical_name(
        &mut self,
        id: DeviceId,
        logical: &str,
    ) -> Result<DeviceId, ContextError> {
        let entry = self.devices.get(&id).ok_or(ContextError::NoSuchDevice)?;
        let descriptor = entry.device.descriptor.clone();
        let path = entry.path.clone();
        let physical = self
            .seats
            .get(entry.device.seat)
            .map(|s| s.physical_name.clone())
            .unwrap_or_else(|| "seat0".into());

        self.remove_device(id)?;
        match path {
            Some(path) => {
                let backend = self.backend.as_mut().ok_or(ContextError::NoSuchDevice)?;
                let handle = backend.open(&path)?;
                let descriptor = describe_device(&handle, &descriptor.sysname);
                let new_id =
                    self.add_device_common(descriptor, &physical, logical, Some(path.clone()));
                if let Some(backend) = self.backend.as_mut() {
                    backend.track(new_id, path, handle)?;
                }
                Ok(new_id)
            }
            None => Ok(self.add_device_common(descriptor, &physical, logical, None)),
        }
    }

    fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices
            .get(&id)
            .map(|e| &e.device)
            .or_else(|| self.retired.get(&id))
    }

    pub fn device_name(&self, id: DeviceId) -> Option<&str> {
        self.device(id).map(|d| d.name())
    }

    pub fn device_sysname(&self, id: DeviceId) -> Option<&str> {
        self.device(id).map(|d| d.sysname())
    }

    pub fn device_capabilities(&self, id: DeviceId) -> Option<crate::device::CapabilitySet> {
        self.device(id).map(|d| d.capabilities)
    }

    pub fn device_seat(&self, id: DeviceId) -> Option<(String, String)> {
        let device = self.device(id)?;
        self.seats
            .get(device.seat)
            .map(|s| (s.physical_name.clone(), s.logical_name.clone()))
    }

    pub fn device_group(&self, id: DeviceId) -> Option<crate::device::GroupId> {
        self.device(id).map(|d| d.group)
    }

    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        let mut ids: Vec<DeviceId> = self.devices.keys().copied().collect();
        ids.sort();
        ids.into_iter()
    }

    fn dispatch_of(&self, id: DeviceId) -> Option<&DeviceDispatch> {
        self.devices.get(&id).map(|e| &e.dispatch)
    }

    /// Map a buttonset axis value to physical units (ring degrees, strip
    /// millimeters).
    pub fn buttonset_to_physical(&self, id: DeviceId, axis: u32, value: f64) -> Option<f64> {
        self.dispatch_of(id)?.to_physical(axis, value)
    }

    pub fn config_is_available(&self, id: DeviceId, key: ConfigKey) -> bool {
        let Some(entry) = self.devices.get(&id) else {
            return false;
        };
        let device = &entry.device;
        let descriptor = &device.descriptor;
        match key {
            ConfigKey::TapEnabled | ConfigKey::TapFingerCount | ConfigKey::DwtEnabled => {
                matches!(entry.dispatch, DeviceDispatch::Touchpad(_))
            }
            ConfigKey::ClickMethod => {
                matches!(entry.dispatch, DeviceDispatch::Touchpad(_))
                    && descriptor.has_property(PROP_BUTTONPAD)
            }
            ConfigKey::ScrollMethod => matches!(
                entry.dispatch,
                DeviceDispatch::Touchpad(_) | DeviceDispatch::Fallback(_)
            ),
            ConfigKey::LeftHanded => {
                matches!(
                    entry.dispatch,
                    DeviceDispatch::Touchpad(_) | DeviceDispatch::Tablet(_)
                ) || descriptor.has_key(BTN_LEFT)
            }
            ConfigKey::NaturalScroll | ConfigKey::AccelSpeed | ConfigKey::AccelProfile => matches!(
                entry.dispatch,
                DeviceDispatch::Touchpad(_) | DeviceDispatch::Fallback(_)
            ),
            ConfigKey::SendEvents => true,
            ConfigKey::Rotation => matches!(entry.dispatch, DeviceDispatch::Buttonset(_)),
            ConfigKey::HalfkeyEnabled => matches!(
                entry.dispatch,
                DeviceDispatch::Keyboard(_) | DeviceDispatch::Fallback(_)
            ) && crate::backend::is_keyboard_descriptor(descriptor),
            ConfigKey::Calibration => {
                descriptor.has_abs(ABS_X) || descriptor.has_abs(ABS_MT_POSITION_X)
            }
        }
    }

    pub fn config_get(&self, id: DeviceId, key: ConfigKey) -> Option<ConfigValue> {
        let device = self.device(id)?;
        let c = &device.config;
        Some(match key {
            ConfigKey::TapEnabled => ConfigValue::Bool(c.tap_enabled),
            ConfigKey::TapFingerCount => ConfigValue::UInt(c.tap_finger_count),
            ConfigKey::LeftHanded => ConfigValue::Bool(device.left_handed.want_enabled),
            ConfigKey::NaturalScroll => ConfigValue::Bool(c.natural_scroll),
            ConfigKey::ScrollMethod => ConfigValue::ScrollMethod(c.scroll_method),
            ConfigKey::ClickMethod => ConfigValue::ClickMethod(c.click_method),
            ConfigKey::SendEvents => ConfigValue::SendEvents(c.send_events),
            ConfigKey::Rotation => ConfigValue::UInt(c.rotation),
            ConfigKey::AccelSpeed => ConfigValue::Float(c.accel_speed),
            ConfigKey::AccelProfile => ConfigValue::AccelProfile(c.accel_profile),
            ConfigKey::DwtEnabled => ConfigValue::Bool(c.dwt_enabled),
            ConfigKey::HalfkeyEnabled => ConfigValue::Bool(c.halfkey_enabled),
            ConfigKey::Calibration => ConfigValue::Calibration(c.calibration),
        })
    }

    pub fn config_get_default(&self, id: DeviceId, key: ConfigKey) -> Option<ConfigValue> {
        let device = self.device(id)?;
        let c = &device.config;
        Some(match key {
            ConfigKey::TapEnabled => ConfigValue::Bool(c.tap_enabled_default),
            ConfigKey::TapFingerCount => ConfigValue::UInt(c.tap_finger_count),
            ConfigKey::LeftHanded => ConfigValue::Bool(device.left_handed.enabled_default),
            ConfigKey::NaturalScroll => ConfigValue::Bool(c.natural_scroll_default),
            ConfigKey::ScrollMethod => ConfigValue::ScrollMethod(c.scroll_method_default),
            ConfigKey::ClickMethod => ConfigValue::ClickMethod(c.click_method_default),
            ConfigKey::SendEvents => ConfigValue::SendEvents(SendEventsMode::Enabled),
            ConfigKey::Rotation => ConfigValue::UInt(c.rotation_default),
            ConfigKey::AccelSpeed => ConfigValue::Float(0.0),
            ConfigKey::AccelProfile => ConfigValue::AccelProfile(c.accel_profile_default),
            ConfigKey::DwtEnabled => ConfigValue::Bool(c.dwt_enabled_default),
            ConfigKey::HalfkeyEnabled => ConfigValue::Bool(c.halfkey_enabled_default),
            ConfigKey::Calibration => ConfigValue::Calibration(CalibrationMatrix::identity()),
        })
    }

    pub fn config_reset(&mut self, id: DeviceId, key: ConfigKey) -> ConfigStatus {
        match self.config_get_default(id, key) {
            Some(value) => self.config_set(id, key, value),
            None => ConfigStatus::Unsupported,
        }
    }

    pub fn config_set(&mut self, id: DeviceId, key: ConfigKey, value: ConfigValue) -> ConfigStatus {
        if !self.config_is_available(id, key) {
            return ConfigStatus::Unsupported;
        }
        let now = self.now();
        let Some(entry) = self.devices.get_mut(&id) else {
            return ConfigStatus::Unsupported;
        };

        match (key, value) {
            (ConfigKey::TapEnabled, ConfigValue::Bool(v)) => {
                entry.device.config.tap_enabled = v;
                if let DeviceDispatch::Touchpad(tp) = &mut entry.dispatch {
                    tp.tap_machine().set_enabled(v);
                }
            }
            (ConfigKey::TapFingerCount, _) => return ConfigStatus::Unsupported,
            (ConfigKey::LeftHanded, ConfigValue::Bool(v)) => {
                entry.device.left_handed.want_enabled = v;
                // tablets wait for proximity-out; everything else has no
                // in-flight gesture the flip could tear
                if !matches!(entry.dispatch, DeviceDispatch::Tablet(_)) {
                    entry.device.left_handed.enabled = v;
                }
            }
            (ConfigKey::NaturalScroll, ConfigValue::Bool(v)) => {
                entry.device.config.natural_scroll = v;
            }
            (ConfigKey::ScrollMethod, ConfigValue::ScrollMethod(m)) => {
                let valid = match &entry.dispatch {
                    DeviceDispatch::Touchpad(_) => matches!(
                        m,
                        ScrollMethod::NoScroll | ScrollMethod::Edge | ScrollMethod::TwoFinger
                    ),
                    DeviceDispatch::Fallback(_) => {
                        matches!(m, ScrollMethod::NoScroll | ScrollMethod::OnButtonDown)
                    }
                    _ => false,
                };
                if !valid {
                    return ConfigStatus::Invalid;
                }
                entry.device.config.scroll_method = m;
            }
            (ConfigKey::ClickMethod, ConfigValue::ClickMethod(m)) => {
                entry.device.config.click_method = m;
            }
            (ConfigKey::SendEvents, ConfigValue::SendEvents(mode)) => {
                let previous = entry.device.config.send_events;
                entry.device.config.send_events = mode;
                if mode == SendEventsMode::Disabled && previous == SendEventsMode::Enabled {
                    let mut ctx = DispatchCtx {
                        queue: &mut self.queue,
                        timers: &mut self.timers,
                        seats: &mut self.seats,
                        tools: &mut self.tools,
                        quirks: &self.quirks,
                    };
                    entry.dispatch.suspend(&mut entry.device, &mut ctx, now);
                }
            }
            (ConfigKey::Rotation, ConfigValue::UInt(deg)) => {
                if deg >= 360 {
                    return ConfigStatus::Invalid;
                }
                entry.device.config.rotation = deg;
                if let DeviceDispatch::Buttonset(bs) = &mut entry.dispatch {
                    bs.set_rotation(deg);
                }
            }
            (ConfigKey::AccelSpeed, ConfigValue::Float(speed)) => {
                if !(-1.0..=1.0).contains(&speed) || speed.is_nan() {
                    return ConfigStatus::Invalid;
                }
                let ok = match &mut entry.dispatch {
                    DeviceDispatch::Touchpad(tp) => tp.set_accel_speed(speed),
                    DeviceDispatch::Fallback(fb) => fb.set_accel_speed(speed),
                    _ => false,
                };
                if !ok {
                    return ConfigStatus::Invalid;
                }
                entry.device.config.accel_speed = speed;
            }
            (ConfigKey::AccelProfile, ConfigValue::AccelProfile(profile)) => {
                match &mut entry.dispatch {
                    DeviceDispatch::Fallback(fb) => fb.set_accel_profile(profile),
                    DeviceDispatch::Touchpad(_) => {
                        if profile != AccelProfile::Linear {
                            return ConfigStatus::Unsupported;
                        }
                    }
                    _ => return ConfigStatus::Unsupported,
                }
                entry.device.config.accel_profile = profile;
            }
            (ConfigKey::DwtEnabled, ConfigValue::Bool(v)) => {
                entry.device.config.dwt_enabled = v;
            }
            (ConfigKey::HalfkeyEnabled, ConfigValue::Bool(v)) => {
                entry.device.config.halfkey_enabled = v;
                match &mut entry.dispatch {
                    DeviceDispatch::Keyboard(kbd) => kbd.halfkey.set_enabled(v),
                    DeviceDispatch::Fallback(fb) => {
                        if let Some(halfkey) = fb.halfkey() {
                            halfkey.set_enabled(v);
                        }
                    }
                    _ => {}
                }
            }
            (ConfigKey::Calibration, ConfigValue::Calibration(matrix)) => {
                if matrix.0.iter().any(|v| !v.is_finite()) {
                    return ConfigStatus::Invalid;
                }
                entry.device.config.calibration = matrix;
            }
            // the value variant does not match the key's type
            _ => return ConfigStatus::Invalid,
        }
        ConfigStatus::Success
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::AbsAxisInfo;

    fn mouse_descriptor() -> DeviceDescriptor {
        let mut d = DeviceDescriptor {
            name: "test mouse".into(),
            sysname: "event5".into(),
            ..Default::default()
        };
        d.keys.insert(BTN_LEFT);
        d.keys.insert(BTN_RIGHT);
        d.rel_axes.insert(REL_X);
        d.rel_axes.insert(REL_Y);
        d.rel_axes.insert(REL_WHEEL);
        d
    }

    #[test]
    fn test_device_added_queued_before_first_event() {
        let mut ctx = Context::new();
        let id = ctx.add_synthetic_device(mouse_descriptor());
        match ctx.get_event() {
            Some(Event::DeviceAdded { device }) => assert_eq!(device, id),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_removed_device_still_readable() {
        let mut ctx = Context::new();
        let id = ctx.add_synthetic_device(mouse_descriptor());
        ctx.remove_device(id).unwrap();
        assert_eq!(ctx.device_name(id), Some("test mouse"));
        ctx.release_device(id);
        assert_eq!(ctx.device_name(id), None);
    }

    #[test]
    fn test_seat_rename_is_remove_then_add() {
        let mut ctx = Context::new();
        let id = ctx.add_synthetic_device(mouse_descriptor());
        while ctx.get_event().is_some() {}

        let new_id = ctx.set_seat_logical_name(id, "secondary").unwrap();
        assert_ne!(id, new_id);
        match ctx.get_event() {
            Some(Event::DeviceRemoved { device }) => assert_eq!(device, id),
            other => panic!("expected removed first, got {:?}", other),
        }
        match ctx.get_event() {
            Some(Event::DeviceAdded { device }) => assert_eq!(device, new_id),
            other => panic!("expected added, got {:?}", other),
        }
        assert_eq!(
            ctx.device_seat(new_id),
            Some(("seat0".into(), "secondary".into()))
        );
    }

    #[test]
    fn test_config_unsupported_on_wrong_class() {
        let mut ctx = Context::new();
        let id = ctx.add_synthetic_device(mouse_descriptor());
        assert!(!ctx.config_is_available(id, ConfigKey::TapEnabled));
        assert_eq!(
            ctx.config_set(id, ConfigKey::TapEnabled, ConfigValue::Bool(true)),
            ConfigStatus::Unsupported
        );
    }

    #[test]
    fn test_config_invalid_value_rejected() {
        let mut ctx = Context::new();
        let id = ctx.add_synthetic_device(mouse_descriptor());
        assert_eq!(
            ctx.config_set(id, ConfigKey::AccelSpeed, ConfigValue::Float(2.0)),
            ConfigStatus::Invalid
        );
        // no state change on rejection
        assert_eq!(
            ctx.config_get(id, ConfigKey::AccelSpeed),
            Some(ConfigValue::Float(0.0))
        );
        assert_eq!(
            ctx.config_set(id, ConfigKey::AccelSpeed, ConfigValue::Float(0.5)),
            ConfigStatus::Success
        );
    }

    #[test]
    fn test_wheel_frame_emits_axis() {
        let mut ctx = Context::new();
        let id = ctx.add_synthetic_device(mouse_descriptor());
        while ctx.get_event().is_some() {}

        ctx.inject_frame(
            id,
            &[
                RawEvent::new(10, EV_REL, REL_WHEEL, 1),
                RawEvent::new(10, EV_SYN, SYN_REPORT, 0),
            ],
        );
        match ctx.get_event() {
            Some(Event::PointerAxis { value, source, axis, .. }) => {
                assert_eq!(axis, crate::event::ScrollAxis::Vertical);
                assert_eq!(source, crate::event::AxisSource::Wheel);
                assert!(value < 0.0); // wheel up scrolls up
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_touchpad_defaults() {
        let mut ctx = Context::new();
        let mut d = DeviceDescriptor {
            name: "test touchpad".into(),
            sysname: "event7".into(),
            ..Default::default()
        };
        d.keys.insert(BTN_TOOL_FINGER);
        d.keys.insert(BTN_TOUCH);
        d.keys.insert(BTN_LEFT);
        d.abs_axes.insert(ABS_X, AbsAxisInfo::new(0, 1000));
        d.abs_axes.insert(ABS_Y, AbsAxisInfo::new(0, 500));
        d.abs_axes.insert(ABS_MT_POSITION_X, AbsAxisInfo::new(0, 1000));
        d.abs_axes.insert(ABS_MT_POSITION_Y, AbsAxisInfo::new(0, 500));
        d.abs_axes.insert(ABS_MT_SLOT, AbsAxisInfo::new(0, 4));
        d.abs_axes.insert(ABS_MT_TRACKING_ID, AbsAxisInfo::new(0, 65535));
        d.mt_slot_count = 5;
        d.properties.insert(PROP_BUTTONPAD);
        let id = ctx.add_synthetic_device(d);

        assert!(ctx.config_is_available(id, ConfigKey::TapEnabled));
        assert_eq!(
            ctx.config_get(id, ConfigKey::ScrollMethod),
            Some(ConfigValue::ScrollMethod(ScrollMethod::TwoFinger))
        );
        assert_eq!(
            ctx.config_get(id, ConfigKey::ClickMethod),
            Some(ConfigValue::ClickMethod(ClickMethod::ButtonAreas))
        );
        assert_eq!(
            ctx.config_get(id, ConfigKey::TapFingerCount),
            Some(ConfigValue::UInt(3))
        );
    }
}
