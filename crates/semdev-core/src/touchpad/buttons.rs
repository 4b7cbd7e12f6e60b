// Semdev touchpad buttons
// Soft-button regions, top-button strip, click methods

use crate::codes::{BTN_LEFT, BTN_MIDDLE, BTN_RIGHT};
use crate::config::ClickMethod;
use crate::device::Device;

/// Fraction of the pad height taken by the bottom soft-button strip.
const BOTTOM_STRIP_FRACTION: f64 = 0.20;
/// Fraction of the pad height taken by the top-button strip.
const TOP_STRIP_FRACTION: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ButtonRegion {
    None,
    BottomLeft,
    BottomMiddle,
    BottomRight,
    TopLeft,
    TopMiddle,
    TopRight,
}

impl ButtonRegion {
    pub fn is_bottom(&self) -> bool {
        matches!(
            self,
            ButtonRegion::BottomLeft | ButtonRegion::BottomMiddle | ButtonRegion::BottomRight
        )
    }

    pub fn is_top(&self) -> bool {
        matches!(
            self,
            ButtonRegion::TopLeft | ButtonRegion::TopMiddle | ButtonRegion::TopRight
        )
    }

    pub fn button(&self) -> u16 {
        match self {
            ButtonRegion::BottomLeft | ButtonRegion::TopLeft | ButtonRegion::None => BTN_LEFT,
            ButtonRegion::BottomMiddle | ButtonRegion::TopMiddle => BTN_MIDDLE,
            ButtonRegion::BottomRight | ButtonRegion::TopRight => BTN_RIGHT,
        }
    }
}

/// Per-touch soft-button participation. A touch that begins in a strip is
/// provisional until the lock-in timeout; significant motion before then
/// reclassifies it as a plain pointer touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum AreaState {
    /// Main surface; never arms a soft button.
    #[default]
    Area,
    BottomNew,
    Bottom,
    TopNew,
    Top,
}

/// The clickpad surface partition. Bottom and top strips never overlap;
/// everything else is the main area.
#[derive(Debug, Clone)]
pub(crate) struct SoftButtonGeometry {
    x_min: f64,
    x_range: f64,
    y_min: f64,
    y_range: f64,
    has_top_buttons: bool,
}

impl SoftButtonGeometry {
    pub fn new(device: &Device, has_top_buttons: bool) -> Option<Self> {
        let x = device.descriptor.abs_info(crate::codes::ABS_MT_POSITION_X)
            .or_else(|| device.descriptor.abs_info(crate::codes::ABS_X))?;
        let y = device.descriptor.abs_info(crate::codes::ABS_MT_POSITION_Y)
            .or_else(|| device.descriptor.abs_info(crate::codes::ABS_Y))?;
        Some(Self {
            x_min: f64::from(x.minimum),
            x_range: x.range().max(1.0),
            y_min: f64::from(y.minimum),
            y_range: y.range().max(1.0),
            has_top_buttons,
        })
    }

    /// Which region a coordinate falls in. Left-handed swaps the outcome,
    /// not the geometry, and is applied by the caller.
    pub fn region_at(&self, x: f64, y: f64) -> ButtonRegion {
        let xf = (x - self.x_min) / self.x_range;
        let yf = (y - self.y_min) / self.y_range;

        if yf >= 1.0 - BOTTOM_STRIP_FRACTION {
            return if xf < 1.0 / 3.0 {
                ButtonRegion::BottomLeft
            } else if xf < 2.0 / 3.0 {
                ButtonRegion::BottomMiddle
            } else {
                ButtonRegion::BottomRight
            };
        }
        if self.has_top_buttons && yf <= TOP_STRIP_FRACTION {
            return if xf < 1.0 / 3.0 {
                ButtonRegion::TopLeft
            } else if xf < 2.0 / 3.0 {
                ButtonRegion::TopMiddle
            } else {
                ButtonRegion::TopRight
            };
        }
        ButtonRegion::None
    }
}

/// Physical-click handling for one touchpad. The emitted button is chosen
/// at press time and locked until release, whatever the fingers do in
/// between and whatever the click method is changed to.
#[derive(Debug, Default)]
pub(crate) struct ClickState {
    active_button: Option<u16>,
}

impl ClickState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn button_is_down(&self) -> bool {
        self.active_button.is_some()
    }

    /// Resolve a physical press/release into the logical button to emit.
    ///
    /// `region` is the soft-button region of the first touch still down at
    /// press time; `finger_count` is the contact count for clickfinger.
    pub fn handle_click(
        &mut self,
        device: &Device,
        method: ClickMethod,
        pressed: bool,
        region: ButtonRegion,
        finger_count: u32,
    ) -> Option<(u16, bool)> {
        if !pressed {
            // the press decided the button; release mirrors it
            return self.active_button.take().map(|b| (b, false));
        }
        if self.active_button.is_some() {
            log::error!("{}: second click while button held", device.name());
            return None;
        }

        let button = match method {
            ClickMethod::ButtonAreas => device.map_button(region.button()),
            ClickMethod::ClickFinger => match finger_count {
                0 | 1 => BTN_LEFT,
                2 => BTN_RIGHT,
                3 => BTN_MIDDLE,
                _ => return None, // suppressed for 4+
            },
            ClickMethod::NoMethod => device.map_button(crate::codes::BTN_LEFT),
        };
        self.active_button = Some(button);
        Some((button, true))
    }

    /// Force-release a held click, e.g. on removal.
    pub fn force_release(&mut self) -> Option<u16> {
        self.active_button.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::device::{
        AbsAxisInfo, Capability, CapabilitySet, DeviceDescriptor, DeviceId, GroupId,
        LeftHandedState,
    };

    fn clickpad() -> Device {
        let mut descriptor = DeviceDescriptor {
            name: "test clickpad".into(),
            ..Default::default()
        };
        descriptor
            .abs_axes
            .insert(crate::codes::ABS_X, AbsAxisInfo::new(0, 100));
        descriptor
            .abs_axes
            .insert(crate::codes::ABS_Y, AbsAxisInfo::new(0, 100));
        Device {
            id: DeviceId(1),
            descriptor,
            seat: crate::seat::SeatId(0),
            group: GroupId(0),
            capabilities: CapabilitySet::empty()
                .with(Capability::Pointer)
                .with(Capability::Touch),
            config: DeviceConfig::default(),
            left_handed: LeftHandedState::default(),
            removed: false,
        }
    }

    #[test]
    fn test_bottom_partition_thirds() {
        let device = clickpad();
        let geo = SoftButtonGeometry::new(&device, false).unwrap();
        assert_eq!(geo.region_at(10.0, 90.0), ButtonRegion::BottomLeft);
        assert_eq!(geo.region_at(50.0, 95.0), ButtonRegion::BottomMiddle);
        assert_eq!(geo.region_at(90.0, 90.0), ButtonRegion::BottomRight);
        assert_eq!(geo.region_at(90.0, 50.0), ButtonRegion::None);
    }

    #[test]
    fn test_top_strip_only_on_topbutton_pads() {
        let device = clickpad();
        let plain = SoftButtonGeometry::new(&device, false).unwrap();
        assert_eq!(plain.region_at(90.0, 2.0), ButtonRegion::None);
        let top = SoftButtonGeometry::new(&device, true).unwrap();
        assert_eq!(top.region_at(10.0, 2.0), ButtonRegion::TopLeft);
        assert_eq!(top.region_at(90.0, 2.0), ButtonRegion::TopRight);
    }

    #[test]
    fn test_strips_do_not_overlap() {
        let device = clickpad();
        let geo = SoftButtonGeometry::new(&device, true).unwrap();
        for y in 0..=100 {
            let r = geo.region_at(50.0, f64::from(y));
            let claims =
                u32::from(r.is_bottom()) + u32::from(r.is_top()) + u32::from(r == ButtonRegion::None);
            assert_eq!(claims, 1, "y={}", y);
        }
    }

    #[test]
    fn test_click_locks_button_until_release() {
        let device = clickpad();
        let mut click = ClickState::new();
        let press = click.handle_click(
            &device,
            ClickMethod::ButtonAreas,
            true,
            ButtonRegion::BottomRight,
            1,
        );
        assert_eq!(press, Some((BTN_RIGHT, true)));
        // region has changed by release time; the lock holds
        let release = click.handle_click(
            &device,
            ClickMethod::ButtonAreas,
            false,
            ButtonRegion::BottomLeft,
            1,
        );
        assert_eq!(release, Some((BTN_RIGHT, false)));
    }

    #[test]
    fn test_method_switch_mid_press_keeps_cycle() {
        let device = clickpad();
        let mut click = ClickState::new();
        click.handle_click(
            &device,
            ClickMethod::ButtonAreas,
            true,
            ButtonRegion::BottomRight,
            1,
        );
        // method changed to clickfinger while held: release still matches
        let release =
            click.handle_click(&device, ClickMethod::ClickFinger, false, ButtonRegion::None, 1);
        assert_eq!(release, Some((BTN_RIGHT, false)));
    }

    #[test]
    fn test_clickfinger_count_mapping() {
        let device = clickpad();
        let mut click = ClickState::new();
        for (count, expected) in [(1u32, Some(BTN_LEFT)), (2, Some(BTN_RIGHT)), (3, Some(BTN_MIDDLE)), (4, None)] {
            let out = click.handle_click(
                &device,
                ClickMethod::ClickFinger,
                true,
                ButtonRegion::None,
                count,
            );
            assert_eq!(out.map(|(b, _)| b), expected, "count={}", count);
            click.force_release();
        }
    }

    #[test]
    fn test_left_handed_swaps_soft_buttons() {
        let mut device = clickpad();
        device.left_handed.enabled = true;
        let mut click = ClickState::new();
        let press = click.handle_click(
            &device,
            ClickMethod::ButtonAreas,
            true,
            ButtonRegion::BottomRight,
            1,
        );
        assert_eq!(press, Some((BTN_LEFT, true)));
    }

    #[test]
    fn test_clickfinger_ignores_left_handed() {
        let mut device = clickpad();
        device.left_handed.enabled = true;
        let mut click = ClickState::new();
        let press =
            click.handle_click(&device, ClickMethod::ClickFinger, true, ButtonRegion::None, 2);
        assert_eq!(press, Some((BTN_RIGHT, true)));
    }
}
