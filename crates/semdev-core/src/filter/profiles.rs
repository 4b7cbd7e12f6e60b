// Semdev acceleration profiles
// velocity (units/ms) -> unitless gain

/// Default point where acceleration starts, in units/ms.
const DEFAULT_THRESHOLD: f64 = 0.4;
/// Default saturation gain.
const DEFAULT_ACCEL: f64 = 2.0;
/// Reference resolution all velocities are normalized to.
const REFERENCE_DPI: f64 = 400.0;

/// Smoothed step used to blend between the flat and saturated regions:
/// maps [0, 1] onto [0, 1] with zero slope at both ends.
fn penumbral_gradient(x: f64) -> f64 {
    let x = (x * 2.0 - 1.0).clamp(-1.0, 1.0);
    0.5 + (x * (1.0 - x * x).sqrt() + x.asin()) / std::f64::consts::PI
}

/// Profile for mice and other variable-resolution pointer devices.
/// Velocities are normalized to a 400dpi-equivalent before the curve is
/// applied, so a 1600dpi mouse does not accelerate four times as early.
#[derive(Debug, Clone)]
pub struct SmoothSimpleProfile {
    dpi: f64,
    speed: f64,
    threshold: f64,
    accel: f64,
}

impl SmoothSimpleProfile {
    pub fn new(dpi: u32) -> Self {
        let mut profile = Self {
            dpi: f64::from(dpi.max(1)),
            speed: 0.0,
            threshold: DEFAULT_THRESHOLD,
            accel: DEFAULT_ACCEL,
        };
        profile.apply_speed();
        profile
    }

    pub fn set_speed(&mut self, speed: f64) -> bool {
        if !(-1.0..=1.0).contains(&speed) || speed.is_nan() {
            return false;
        }
        self.speed = speed;
        self.apply_speed();
        true
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    fn apply_speed(&mut self) {
        // faster setting: accel kicks in earlier and climbs higher
        self.threshold = (DEFAULT_THRESHOLD - 0.25 * self.speed).max(0.2);
        self.accel = DEFAULT_ACCEL + 1.5 * self.speed;
    }

    pub fn factor(&self, velocity: f64) -> f64 {
        let velocity = velocity * REFERENCE_DPI / self.dpi;
        let threshold = self.threshold.max(0.0005);

        let f = velocity / threshold;
        if f < 1.0 {
            penumbral_gradient(f)
        } else if f <= self.accel {
            let blend = (f - 1.0) / (self.accel - 1.0).max(1e-9);
            1.0 + penumbral_gradient(blend) * (self.accel - 1.0)
        } else {
            self.accel
        }
    }
}

/// Profile for touchpads: flat below the threshold, linear rise, hard
/// saturation. Deltas reaching this profile are already normalized to the
/// 400dpi-equivalent space by the touchpad engine.
#[derive(Debug, Clone)]
pub struct LinearProfile {
    speed: f64,
    threshold: f64,
    incline: f64,
    max_factor: f64,
}

impl LinearProfile {
    pub fn new() -> Self {
        let mut profile = Self {
            speed: 0.0,
            threshold: DEFAULT_THRESHOLD,
            incline: 1.0,
            max_factor: DEFAULT_ACCEL,
        };
        profile.apply_speed();
        profile
    }

    pub fn set_speed(&mut self, speed: f64) -> bool {
        if !(-1.0..=1.0).contains(&speed) || speed.is_nan() {
            return false;
        }
        self.speed = speed;
        self.apply_speed();
        true
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    fn apply_speed(&mut self) {
        self.threshold = DEFAULT_THRESHOLD - 0.2 * self.speed;
        self.incline = 1.0 + 0.5 * self.speed;
        self.max_factor = DEFAULT_ACCEL + self.speed;
    }

    pub fn factor(&self, velocity: f64) -> f64 {
        if velocity <= self.threshold {
            return 1.0;
        }
        (1.0 + (velocity - self.threshold) * self.incline).min(self.max_factor)
    }
}

impl Default for LinearProfile {
    fn default() -> Self {
        Self::new()
    }
}
