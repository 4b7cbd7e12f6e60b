// Semdev edge scrolling
// Single-finger scrolling along the right and bottom pad edges

use crate::device::Device;

/// Width of the scroll strips in millimeters, when the pad reports its
/// resolution.
const EDGE_WIDTH_MM: f64 = 6.0;
/// Fallback strip width as a fraction of the axis range.
const EDGE_WIDTH_FRACTION: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScrollEdge {
    Right,
    Bottom,
}

/// Per-touch edge-scroll progression. A touch must begin inside a strip
/// and dwell there for the activation timeout; once scrolling it may leave
/// the strip and keeps scrolling on its dominant axis until lift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum EdgeState {
    /// Not an edge touch (began outside a strip, or left one early).
    #[default]
    Area,
    /// Began in a strip, dwell timer running.
    EdgeNew(ScrollEdge),
    /// Activated; motion becomes scroll.
    Edge(ScrollEdge),
}

#[derive(Debug, Clone)]
pub(crate) struct EdgeGeometry {
    right_edge_x: f64,
    bottom_edge_y: f64,
}

impl EdgeGeometry {
    pub fn new(device: &Device) -> Option<Self> {
        let x = device
            .descriptor
            .abs_info(crate::codes::ABS_MT_POSITION_X)
            .or_else(|| device.descriptor.abs_info(crate::codes::ABS_X))?;
        let y = device
            .descriptor
            .abs_info(crate::codes::ABS_MT_POSITION_Y)
            .or_else(|| device.descriptor.abs_info(crate::codes::ABS_Y))?;

        let x_width = if x.resolution > 0 {
            EDGE_WIDTH_MM * f64::from(x.resolution)
        } else {
            x.range() * EDGE_WIDTH_FRACTION
        };
        let y_width = if y.resolution > 0 {
            EDGE_WIDTH_MM * f64::from(y.resolution)
        } else {
            y.range() * EDGE_WIDTH_FRACTION
        };

        Some(Self {
            right_edge_x: f64::from(x.maximum) - x_width,
            bottom_edge_y: f64::from(y.maximum) - y_width,
        })
    }

    /// The strip a position falls in. The right strip wins the shared
    /// corner so a touch cannot belong to both.
    pub fn edge_at(&self, x: f64, y: f64) -> Option<ScrollEdge> {
        if x >= self.right_edge_x {
            Some(ScrollEdge::Right)
        } else if y >= self.bottom_edge_y {
            Some(ScrollEdge::Bottom)
        } else {
            None
        }
    }
}
