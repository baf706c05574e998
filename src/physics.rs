//! Jump and flip quantities built from the integrators.
//!
//! Every run carries a `Hang Time(s)` series with two samples: the first is
//! stamped at takeoff, the second at landing and holds the measured hang time.

use std::io::{Read, Seek};

use crate::config::Config;
use crate::data::model::{rss, Datum, Descriptor, Measurement};
use crate::data::source::DataSource;
use crate::error::{Error, Result};
use crate::math::{self, Bounds};

pub const HANG_TIME: &str = "Hang Time(s)";
pub const FORCE: &str = "Force(N)";
pub const LATERAL_FORCE: &str = "Lateral Force(N)";
pub const Z_ACCELERATION: &str = "Z-axis acceleration(m/s2)";
pub const Z_ANGULAR_VELOCITY: &str = "Z-angular velocity(rad/s)";

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// First `n` samples of a series; the scan is always stopped afterwards.
fn leading_samples<R: Read + Seek>(
    source: &mut DataSource<R>,
    descriptor: &Descriptor,
    n: usize,
) -> Result<Vec<Datum>> {
    let mut out = Vec::with_capacity(n);
    let mut scan = || -> Result<()> {
        while out.len() < n {
            match source.next(descriptor)? {
                Some(datum) => out.push(datum),
                None => break,
            }
        }
        Ok(())
    };
    let scanned = scan();
    source.stop();
    scanned.map(|_| out)
}

pub fn takeoff_time<R: Read + Seek>(source: &mut DataSource<R>, run: u32) -> Result<f64> {
    let d = Descriptor::new(run.into(), HANG_TIME)?;
    match leading_samples(source, &d, 1)?.first() {
        Some(takeoff) => Ok(takeoff.timestamp),
        None => Err(Error::MissingSample {
            descriptor: d,
            what: "takeoff",
        }),
    }
}

/// Landing sample: timestamp is the landing time, value the hang time.
pub fn landing<R: Read + Seek>(source: &mut DataSource<R>, run: u32) -> Result<Datum> {
    let d = Descriptor::new(run.into(), HANG_TIME)?;
    match leading_samples(source, &d, 2)?.get(1) {
        Some(landing) if landing.value > 0.0 => Ok(*landing),
        _ => Err(Error::MissingSample {
            descriptor: d,
            what: "landing",
        }),
    }
}

/// `[0, takeoff]`.
fn launch_window<R: Read + Seek>(source: &mut DataSource<R>, run: u32) -> Result<Bounds> {
    Bounds::new(0.0, takeoff_time(source, run)?)
}

// ---------------------------------------------------------------------------
// Impulse and height
// ---------------------------------------------------------------------------

fn impulse<R: Read + Seek>(
    source: &mut DataSource<R>,
    run: u32,
    field: &str,
    config: &Config,
) -> Result<Measurement> {
    let d = Descriptor::new(run.into(), field)?;
    let bounds = launch_window(source, run)?;
    let sigma = config.constants.forceplate_ucty_n;
    math::integral(source, &d, bounds, Some(Box::new(move |_: f64| sigma)), &config.limits)
}

/// Vertical impulse over the launch window (N s).
pub fn vertical_impulse<R: Read + Seek>(
    source: &mut DataSource<R>,
    run: u32,
    config: &Config,
) -> Result<Measurement> {
    impulse(source, run, FORCE, config)
}

/// Horizontal impulse over the launch window (N s).
pub fn horizontal_impulse<R: Read + Seek>(
    source: &mut DataSource<R>,
    run: u32,
    config: &Config,
) -> Result<Measurement> {
    impulse(source, run, LATERAL_FORCE, config)
}

/// Apex height from hang time alone: `g T² / 8`.
pub fn raw_height<R: Read + Seek>(
    source: &mut DataSource<R>,
    run: u32,
    config: &Config,
) -> Result<Measurement> {
    let airtime = landing(source, run)?.value;
    let c = &config.constants;
    Ok(Measurement::new(
        c.little_g * airtime.powi(2) / 8.0,
        airtime.powi(2) * c.little_g_ucty / 8.0,
    ))
}

/// Takeoff velocity `J / m`.
pub fn jump_velocity<R: Read + Seek>(
    source: &mut DataSource<R>,
    run: u32,
    config: &Config,
) -> Result<Measurement> {
    let j = vertical_impulse(source, run, config)?;
    let c = &config.constants;
    Ok(Measurement::new(
        j.value / c.mass_kg,
        rss([
            j.uncertainty / c.mass_kg,
            j.value / c.mass_kg.powi(2) * c.mass_ucty_kg,
        ]),
    ))
}

/// Apex height from the takeoff velocity: `v² / 2g`.
pub fn impulse_height<R: Read + Seek>(
    source: &mut DataSource<R>,
    run: u32,
    config: &Config,
) -> Result<Measurement> {
    let v = jump_velocity(source, run, config)?;
    let c = &config.constants;
    Ok(Measurement::new(
        v.value.powi(2) / (2.0 * c.little_g),
        rss([
            v.value * v.uncertainty / c.little_g,
            v.value.powi(2) * c.little_g_ucty / (2.0 * c.little_g.powi(2)),
        ]),
    ))
}

// ---------------------------------------------------------------------------
// Centre of mass
// ---------------------------------------------------------------------------

/// Lowest centre-of-mass position during the crouch before takeoff, relative
/// to the standing position, and when it happens.
///
/// The starting velocity is the one that returns the centre of mass to its
/// starting height at takeoff.
pub fn com_drop<R: Read + Seek>(
    source: &mut DataSource<R>,
    run: u32,
    config: &Config,
) -> Result<Datum> {
    let d = Descriptor::new(run.into(), Z_ACCELERATION)?;
    let bounds = launch_window(source, run)?;
    let v0 = math::best_initial_condition(source, &d, bounds, &config.limits, &config.solver)?;
    math::double_integral_minimum(source, &d, bounds, v0, &config.limits)
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Peak angular velocity between the start of the run and landing.
pub fn max_angular_velocity<R: Read + Seek>(
    source: &mut DataSource<R>,
    run: u32,
    config: &Config,
) -> Result<Measurement> {
    let cutoff = landing(source, run)?.timestamp;
    let d = Descriptor::new(run.into(), Z_ANGULAR_VELOCITY)?;

    let mut peak: Option<f64> = None;
    let mut scan = || -> Result<()> {
        while let Some(w) = source.next(&d)? {
            if w.timestamp > cutoff {
                break;
            }
            peak = Some(peak.map_or(w.value, |p| p.max(w.value)));
        }
        Ok(())
    };
    let scanned = scan();
    source.stop();
    scanned?;

    match peak {
        Some(peak) => Ok(Measurement::new(
            peak,
            config.constants.angular_velocity_ucty,
        )),
        None => Err(Error::MissingSample {
            descriptor: d,
            what: "angular velocity",
        }),
    }
}

/// Moment of inertia `L / ω`, with `L` the angular impulse of the lateral
/// force about the centre of mass over the launch window.
pub fn moment_of_inertia<R: Read + Seek>(
    source: &mut DataSource<R>,
    run: u32,
    config: &Config,
) -> Result<Measurement> {
    let w = max_angular_velocity(source, run, config)?;

    let c = config.constants.clone();
    let d = Descriptor::new(run.into(), LATERAL_FORCE)?;
    let bounds = launch_window(source, run)?;
    let torque_sigma = move |force: f64| {
        ((force * c.com_ucty_m).powi(2) + (c.com_m * c.forceplate_ucty_n).powi(2)).sqrt()
    };
    let force = math::integral(source, &d, bounds, Some(Box::new(torque_sigma)), &config.limits)?;
    let momentum = Measurement::new(config.constants.com_m * force.value, force.uncertainty);

    Ok(Measurement::new(
        momentum.value / w.value,
        rss([
            momentum.uncertainty / w.value,
            momentum.value * w.uncertainty / w.value.powi(2),
        ]),
    ))
}
