// Semdev velocity tracker
// Sliding window of deltas feeding the acceleration profile

use super::MotionDelta;

const NUM_TRACKERS: usize = 16;
/// Samples further apart than this do not belong to one motion.
const MAX_SAMPLE_GAP: u64 = 40;
/// A pause this long restarts the tracker entirely.
const MOTION_TIMEOUT: u64 = 1000;
/// Minimum span needed before a velocity is trusted.
const MIN_VELOCITY_SPAN: u64 = 2;

#[derive(Debug, Clone, Copy, Default)]
struct Sample {
    delta: MotionDelta,
    time: u64,
}

/// Keeps the last 16 (delta, time) samples and derives a smoothed velocity
/// in units/ms. Smoothing averages the instantaneous velocity with the
/// previous one so single-sample jitter cannot jump the profile by more
/// than one step.
#[derive(Debug)]
pub struct VelocityTracker {
    samples: [Sample; NUM_TRACKERS],
    next: usize,
    used: usize,
    last_time: u64,
    last_velocity: f64,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self {
            samples: [Sample::default(); NUM_TRACKERS],
            next: 0,
            used: 0,
            last_time: 0,
            last_velocity: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.next = 0;
        self.used = 0;
        self.last_time = 0;
        self.last_velocity = 0.0;
    }

    /// Push a sample, return the smoothed velocity at `time`.
    pub fn feed(&mut self, delta: MotionDelta, time: u64) -> f64 {
        if self.used > 0 && time.saturating_sub(self.last_time) > MOTION_TIMEOUT {
            self.reset();
        }
        self.samples[self.next] = Sample { delta, time };
        self.next = (self.next + 1) % NUM_TRACKERS;
        self.used = (self.used + 1).min(NUM_TRACKERS);
        self.last_time = time;

        let velocity = self.instantaneous_velocity();
        let smoothed = (velocity + self.last_velocity) / 2.0;
        self.last_velocity = velocity;
        smoothed
    }

    /// Distance over time across the newest run of samples whose spacing
    /// stays under the gap limit; needs a span of at least 2ms.
    fn instantaneous_velocity(&self) -> f64 {
        if self.used < 2 {
            return 0.0;
        }

        let newest_idx = (self.next + NUM_TRACKERS - 1) % NUM_TRACKERS;
        let newest = self.samples[newest_idx];
        let mut distance = 0.0;
        let mut span_start = newest.time;
        let mut younger_time = newest.time;

        for back in 1..self.used {
            let idx = (self.next + NUM_TRACKERS - 1 - back) % NUM_TRACKERS;
            let sample = self.samples[idx];
            if younger_time.saturating_sub(sample.time) > MAX_SAMPLE_GAP {
                break;
            }
            // the delta stored on the younger sample covers the interval
            // from this sample to it
            let younger_idx = (idx + 1) % NUM_TRACKERS;
            distance += self.samples[younger_idx].delta.magnitude();
            span_start = sample.time;
            younger_time = sample.time;
        }

        let span = newest.time.saturating_sub(span_start);
        if span < MIN_VELOCITY_SPAN {
            return 0.0;
        }
        distance / span as f64
    }
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new()
    }
}
