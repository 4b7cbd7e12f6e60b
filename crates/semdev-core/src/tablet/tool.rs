// Semdev tablet tools
// Tool identity, lifetime, and capability stamping

use std::rc::Rc;

use smallvec::SmallVec;

use crate::codes::*;
use crate::event::{AxisMask, TabletAxis};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolType {
    Pen,
    Eraser,
    Brush,
    Pencil,
    Airbrush,
    Finger,
    Mouse,
    Lens,
}

impl ToolType {
    pub fn from_evcode(code: u16) -> Option<ToolType> {
        match code {
            BTN_TOOL_PEN => Some(ToolType::Pen),
            BTN_TOOL_RUBBER => Some(ToolType::Eraser),
            BTN_TOOL_BRUSH => Some(ToolType::Brush),
            BTN_TOOL_PENCIL => Some(ToolType::Pencil),
            BTN_TOOL_AIRBRUSH => Some(ToolType::Airbrush),
            BTN_TOOL_FINGER => Some(ToolType::Finger),
            BTN_TOOL_MOUSE => Some(ToolType::Mouse),
            BTN_TOOL_LENS => Some(ToolType::Lens),
            _ => None,
        }
    }

    pub fn is_pen_like(&self) -> bool {
        matches!(
            self,
            ToolType::Pen
                | ToolType::Eraser
                | ToolType::Brush
                | ToolType::Pencil
                | ToolType::Airbrush
        )
    }
}

/// One physical tool. Tools with a nonzero serial are shared across every
/// tablet on the context; serial-less tools stay local to the tablet they
/// entered proximity on.
#[derive(Debug, PartialEq)]
pub struct TabletTool {
    pub tool_type: ToolType,
    pub tool_id: u32,
    pub serial: u32,
    pub axis_caps: AxisMask,
    pub buttons: SmallVec<[u16; 8]>,
}

impl TabletTool {
    pub fn has_axis(&self, axis: TabletAxis) -> bool {
        self.axis_caps.contains(axis)
    }

    pub fn has_button(&self, button: u16) -> bool {
        self.buttons.contains(&button)
    }
}

/// Axis and button capabilities for known tool ids, with a per-type
/// fallback when the id is absent from the table. The tablet's own
/// capabilities clip the result: a tool never gains an axis its tablet
/// cannot report.
pub fn stamp_capabilities(
    tool_type: ToolType,
    tool_id: u32,
    tablet_axes: AxisMask,
    tablet_has_button: impl Fn(u16) -> bool,
) -> (AxisMask, SmallVec<[u16; 8]>) {
    let mut axes = AxisMask::empty();
    let mut copy_axis = |axis: TabletAxis, mask: &mut AxisMask| {
        if tablet_axes.contains(axis) {
            mask.set(axis);
        }
    };

    let wanted: &[TabletAxis] = match known_tool_axes(tool_id) {
        Some(list) => list,
        None => match tool_type {
            t if t.is_pen_like() => &[
                TabletAxis::Pressure,
                TabletAxis::Distance,
                TabletAxis::TiltX,
                TabletAxis::TiltY,
                TabletAxis::Slider,
                TabletAxis::RotationZ,
            ],
            ToolType::Mouse | ToolType::Lens => {
                &[TabletAxis::RotationZ, TabletAxis::RelWheel]
            }
            _ => &[],
        },
    };
    for axis in wanted {
        copy_axis(*axis, &mut axes);
    }
    // every tool that reports positions gets x/y
    copy_axis(TabletAxis::X, &mut axes);
    copy_axis(TabletAxis::Y, &mut axes);

    let mut buttons: SmallVec<[u16; 8]> = SmallVec::new();
    let wanted_buttons: &[u16] = if tool_type.is_pen_like() {
        &[BTN_STYLUS, BTN_STYLUS2, BTN_TOUCH]
    } else {
        &[BTN_LEFT, BTN_MIDDLE, BTN_RIGHT, BTN_SIDE, BTN_EXTRA]
    };
    for b in wanted_buttons {
        if tablet_has_button(*b) {
            buttons.push(*b);
        }
    }

    (axes, buttons)
}

/// Axis sets for tool ids we recognize (Wacom id space). A miss falls back
/// to the per-type defaults above.
fn known_tool_axes(tool_id: u32) -> Option<&'static [TabletAxis]> {
    match tool_id {
        // Grip Pen
        0x802 => Some(&[
            TabletAxis::Pressure,
            TabletAxis::Distance,
            TabletAxis::TiltX,
            TabletAxis::TiltY,
        ]),
        // Art Marker: adds barrel rotation
        0x804 => Some(&[
            TabletAxis::Pressure,
            TabletAxis::Distance,
            TabletAxis::TiltX,
            TabletAxis::TiltY,
            TabletAxis::RotationZ,
        ]),
        // Airbrush: adds the finger wheel slider
        0x902 | 0x912 => Some(&[
            TabletAxis::Pressure,
            TabletAxis::Distance,
            TabletAxis::TiltX,
            TabletAxis::TiltY,
            TabletAxis::Slider,
        ]),
        // Classic/Inking pens: no tilt
        0x812 | 0x822 => Some(&[TabletAxis::Pressure, TabletAxis::Distance]),
        // 4D Mouse / Lens cursor
        0x094 | 0x096 => Some(&[TabletAxis::RotationZ, TabletAxis::RelWheel, TabletAxis::Distance]),
        _ => None,
    }
}

/// Context-global registry for serialized tools: the same pen entering
/// proximity on two tablets resolves to one tool object.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Rc<TabletTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, tool_type: ToolType, serial: u32) -> Option<Rc<TabletTool>> {
        self.tools
            .iter()
            .find(|t| t.tool_type == tool_type && t.serial == serial)
            .cloned()
    }

    pub fn insert(&mut self, tool: Rc<TabletTool>) {
        self.tools.push(tool);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_tablet_axes() -> AxisMask {
        let mut mask = AxisMask::empty();
        for axis in TabletAxis::ALL {
            mask.set(axis);
        }
        mask
    }

    #[test]
    fn test_fallback_pen_caps_clipped_by_tablet() {
        let mut tablet_axes = AxisMask::empty();
        tablet_axes.set(TabletAxis::X);
        tablet_axes.set(TabletAxis::Y);
        tablet_axes.set(TabletAxis::Pressure);
        let (axes, buttons) =
            stamp_capabilities(ToolType::Pen, 0, tablet_axes, |b| b == BTN_STYLUS || b == BTN_TOUCH);
        assert!(axes.contains(TabletAxis::Pressure));
        assert!(!axes.contains(TabletAxis::TiltX));
        assert!(buttons.contains(&BTN_STYLUS));
        assert!(!buttons.contains(&BTN_STYLUS2));
    }

    #[test]
    fn test_known_id_beats_type_fallback() {
        // a classic pen id must not be stamped with tilt even though the
        // pen-type fallback would grant it
        let (axes, _) = stamp_capabilities(ToolType::Pen, 0x812, full_tablet_axes(), |_| true);
        assert!(axes.contains(TabletAxis::Pressure));
        assert!(!axes.contains(TabletAxis::TiltX));
    }

    #[test]
    fn test_mouse_gets_rotation_and_wheel() {
        let (axes, buttons) =
            stamp_capabilities(ToolType::Mouse, 0, full_tablet_axes(), |b| {
                matches!(b, BTN_LEFT | BTN_MIDDLE | BTN_RIGHT)
            });
        assert!(axes.contains(TabletAxis::RotationZ));
        assert!(axes.contains(TabletAxis::RelWheel));
        assert!(!axes.contains(TabletAxis::Pressure));
        assert_eq!(buttons.as_slice(), &[BTN_LEFT, BTN_MIDDLE, BTN_RIGHT]);
    }

    #[test]
    fn test_registry_shared_by_serial() {
        let mut registry = ToolRegistry::new();
        assert!(registry.find(ToolType::Pen, 1234).is_none());
        let tool = Rc::new(TabletTool {
            tool_type: ToolType::Pen,
            tool_id: 0x802,
            serial: 1234,
            axis_caps: AxisMask::empty(),
            buttons: SmallVec::new(),
        });
        registry.insert(tool.clone());
        let found = registry.find(ToolType::Pen, 1234).unwrap();
        assert!(Rc::ptr_eq(&tool, &found));
        assert!(registry.find(ToolType::Eraser, 1234).is_none());
    }
}
