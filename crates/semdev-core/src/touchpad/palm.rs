// Semdev palm, thumb, and hover detection
// Labels touches that must not move the pointer

use crate::device::Device;
use crate::quirks::ModelQuirk;

/// Outermost fraction of the pad width that counts as palm strip.
const PALM_STRIP_FRACTION: f64 = 0.05;
/// Pads at least this wide also treat their corners as palm territory.
const LARGE_PAD_WIDTH_MM: f64 = 70.0;
/// Pads narrower than this skip palm detection entirely; every touch on
/// them is deliberate.
const SMALL_PAD_WIDTH_MM: f64 = 50.0;
/// Corner zones extend this fraction inward on large pads.
const CORNER_X_FRACTION: f64 = 0.15;
const CORNER_Y_FRACTION: f64 = 0.08;

/// Pressure above which a contact in the lower pad area is a resting
/// thumb.
const THUMB_PRESSURE: i32 = 100;
const THUMB_AREA_FRACTION: f64 = 0.75;

#[derive(Debug, Clone)]
pub(crate) struct PalmGeometry {
    enabled: bool,
    corners: bool,
    x_min: f64,
    x_range: f64,
    y_min: f64,
    y_range: f64,
}

impl PalmGeometry {
    pub fn new(device: &Device, quirk: &ModelQuirk) -> Option<Self> {
        let x = device
            .descriptor
            .abs_info(crate::codes::ABS_MT_POSITION_X)
            .or_else(|| device.descriptor.abs_info(crate::codes::ABS_X))?;
        let y = device
            .descriptor
            .abs_info(crate::codes::ABS_MT_POSITION_Y)
            .or_else(|| device.descriptor.abs_info(crate::codes::ABS_Y))?;

        let width_mm = x.size_mm();
        let enabled = !quirk.no_palm_detect
            && width_mm.map(|w| w >= SMALL_PAD_WIDTH_MM).unwrap_or(true);
        let corners = width_mm.map(|w| w >= LARGE_PAD_WIDTH_MM).unwrap_or(false);

        Some(Self {
            enabled,
            corners,
            x_min: f64::from(x.minimum),
            x_range: x.range().max(1.0),
            y_min: f64::from(y.minimum),
            y_range: y.range().max(1.0),
        })
    }

    /// Whether a touch *beginning* at this position is a palm. Only the
    /// initial contact matters; a pointer finger wandering into the strip
    /// later stays a pointer.
    pub fn is_palm_position(&self, x: f64, y: f64) -> bool {
        if !self.enabled {
            return false;
        }
        let xf = (x - self.x_min) / self.x_range;
        let yf = (y - self.y_min) / self.y_range;

        if xf <= PALM_STRIP_FRACTION || xf >= 1.0 - PALM_STRIP_FRACTION {
            return true;
        }
        if self.corners {
            let near_x = xf <= CORNER_X_FRACTION || xf >= 1.0 - CORNER_X_FRACTION;
            let near_y = yf <= CORNER_Y_FRACTION || yf >= 1.0 - CORNER_Y_FRACTION;
            if near_x && near_y {
                return true;
            }
        }
        false
    }

    /// A heavy contact low on the pad is a resting thumb.
    pub fn is_thumb_position(&self, y: f64, pressure: Option<i32>) -> bool {
        let Some(pressure) = pressure else {
            return false;
        };
        let yf = (y - self.y_min) / self.y_range;
        pressure >= THUMB_PRESSURE && yf >= THUMB_AREA_FRACTION
    }
}

/// Hover thresholds for touchpads whose pressure axis distinguishes a
/// finger resting above the surface from one touching it. The two values
/// form a hysteresis: a touch becomes a contact above `down` and goes back
/// to hovering below `up`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HoverThresholds {
    pub down: i32,
    pub up: i32,
}

impl HoverThresholds {
    pub fn from_quirk(quirk: &ModelQuirk) -> Option<Self> {
        quirk.pressure_range.map(|(down, up)| Self { down, up })
    }
}
