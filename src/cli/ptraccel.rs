// Semdev ptraccel
// Drive the motion filter in isolation, print gnuplot data

use std::error::Error;

use semdev_core::{
    AccelProfile, MotionDelta, MotionFilter, PointerAccelerator, TouchpadAccelerator,
};

/// Events sent per input speed, enough to hide tracker startup.
const NEVENTS: usize = 30;
/// Simulated report interval in ms.
const EVENT_INTERVAL: u64 = 8;
const DELTA_STEP: f64 = 0.5;
const DELTA_MAX: f64 = 127.0;

fn units_to_m_per_s(units: f64, dpi: u32) -> f64 {
    // units per 8ms report -> units/s -> inches/s at the device dpi -> m/s
    let units_per_s = units * 1000.0 / EVENT_INTERVAL as f64;
    let inches_per_s = units_per_s / f64::from(dpi);
    inches_per_s * 2.54 / 100.0
}

fn make_filter(profile: AccelProfile, dpi: u32, speed: f64) -> Box<dyn MotionFilter> {
    let mut filter: Box<dyn MotionFilter> = match profile {
        AccelProfile::SmoothSimple => Box::new(PointerAccelerator::new(dpi)),
        AccelProfile::Linear => Box::new(TouchpadAccelerator::new()),
    };
    if !filter.set_speed(speed) {
        log::warn!("speed {} out of range, using 0", speed);
    }
    filter
}

pub fn run(profile: AccelProfile, dpi: u32, speed: f64) -> Result<(), Box<dyn Error>> {
    let mut filter = make_filter(profile, dpi, speed);

    println!("#!/usr/bin/gnuplot");
    println!("set style data lines");
    println!("set xlabel 'unaccelerated dx in m/s'");
    println!("set ylabel 'accelerated dx in m/s'");
    println!("plot '-' using 1:2 title 'm/s', \\");
    println!("     '-' using 1:2 title 'gain m/s'");

    let mut speeds = Vec::new();
    let mut gains = Vec::new();
    let mut time = 0u64;

    let mut dx = 0.0;
    while dx <= DELTA_MAX {
        let mut sum = 0.0;
        for _ in 0..NEVENTS {
            time += EVENT_INTERVAL;
            let out = filter.dispatch(MotionDelta::new(dx, 0.0), time);
            sum += out.dx;
        }
        let out_speed = units_to_m_per_s(sum / NEVENTS as f64, dpi);
        speeds.push((units_to_m_per_s(dx, dpi), out_speed));
        gains.push((units_to_m_per_s(dx, dpi), out_speed - units_to_m_per_s(dx, dpi)));

        // a long pause resets the velocity trackers between speeds
        time += 1000;
        dx += DELTA_STEP;
    }

    for (x, y) in &speeds {
        println!("\t{:.4} {:.4}", x, y);
    }
    println!("\te");
    for (x, y) in &gains {
        println!("\t{:.4} {:.4}", x, y);
    }
    println!("\te");
    println!("pause -1");

    Ok(())
}
