// Semdev motion filter
// Velocity-tracked pointer acceleration

mod profiles;
mod tracker;

pub use profiles::{LinearProfile, SmoothSimpleProfile};
pub use tracker::VelocityTracker;

/// A relative motion delta, in device units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionDelta {
    pub dx: f64,
    pub dy: f64,
}

impl MotionDelta {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }

    pub fn magnitude(&self) -> f64 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }
}

/// Turns raw deltas into accelerated deltas. Deterministic: the output
/// depends only on the delta history, never on wall-clock drift.
pub trait MotionFilter {
    /// Feed one delta, get the accelerated delta for on-screen motion.
    fn dispatch(&mut self, delta: MotionDelta, time: u64) -> MotionDelta;

    /// Adjust the user speed setting in [-1, 1]. Returns false when the
    /// value is out of range; state is unchanged then.
    fn set_speed(&mut self, speed: f64) -> bool;

    fn speed(&self) -> f64;

    /// Forget the motion history, e.g. when a finger transitions from
    /// hover to contact.
    fn restart(&mut self);
}

/// Acceleration filter for variable-dpi pointer devices (mice).
pub struct PointerAccelerator {
    tracker: VelocityTracker,
    profile: SmoothSimpleProfile,
}

impl PointerAccelerator {
    pub fn new(dpi: u32) -> Self {
        Self {
            tracker: VelocityTracker::new(),
            profile: SmoothSimpleProfile::new(dpi),
        }
    }
}

impl MotionFilter for PointerAccelerator {
    fn dispatch(&mut self, delta: MotionDelta, time: u64) -> MotionDelta {
        let velocity = self.tracker.feed(delta, time);
        let factor = self.profile.factor(velocity);
        MotionDelta::new(delta.dx * factor, delta.dy * factor)
    }

    fn set_speed(&mut self, speed: f64) -> bool {
        self.profile.set_speed(speed)
    }

    fn speed(&self) -> f64 {
        self.profile.speed()
    }

    fn restart(&mut self) {
        self.tracker.reset();
    }
}

/// Acceleration filter for touchpads, deltas pre-normalized by the caller
/// to the 400dpi-equivalent coordinate space.
pub struct TouchpadAccelerator {
    tracker: VelocityTracker,
    profile: LinearProfile,
}

impl TouchpadAccelerator {
    pub fn new() -> Self {
        Self {
            tracker: VelocityTracker::new(),
            profile: LinearProfile::new(),
        }
    }
}

impl Default for TouchpadAccelerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionFilter for TouchpadAccelerator {
    fn dispatch(&mut self, delta: MotionDelta, time: u64) -> MotionDelta {
        let velocity = self.tracker.feed(delta, time);
        let factor = self.profile.factor(velocity);
        MotionDelta::new(delta.dx * factor, delta.dy * factor)
    }

    fn set_speed(&mut self, speed: f64) -> bool {
        self.profile.set_speed(speed)
    }

    fn speed(&self) -> f64 {
        self.profile.speed()
    }

    fn restart(&mut self) {
        self.tracker.reset();
    }
}
