use std::io::{Read, Seek};

use super::integrator::{Bounds, DatumSource, Integrator, Nested, SeriesSource};
use crate::config::{Limits, SolverConfig};
use crate::data::model::{Datum, Descriptor};
use crate::data::source::DataSource;
use crate::error::{Error, Result};

const TRACE: &str = "backflip::solver";

/// Build `outer(inner(series))`: the inner integrator starts at `initial`, the
/// outer one at zero.
pub fn double_integrator<'a, R: Read + Seek>(
    source: &'a mut DataSource<R>,
    descriptor: &Descriptor,
    bounds: Bounds,
    initial: f64,
    limits: &Limits,
) -> Result<Integrator<Nested<SeriesSource<'a, R>>>> {
    let series = SeriesSource::new(source, descriptor.clone());
    let inner = Integrator::new(series, bounds, initial, None, limits.max_rows)?;
    Integrator::new(Nested::new(inner), bounds, 0.0, None, limits.max_rows)
}

/// Terminal value of the double integral for one candidate initial condition.
pub fn double_integral<R: Read + Seek>(
    source: &mut DataSource<R>,
    descriptor: &Descriptor,
    bounds: Bounds,
    initial: f64,
    limits: &Limits,
) -> Result<f64> {
    let outer = double_integrator(source, descriptor, bounds, initial, limits)?;
    Ok(outer.integrate()?.value)
}

// ---------------------------------------------------------------------------
// Shooting method
// ---------------------------------------------------------------------------

/// Bisect for the inner initial condition that brings the double integral's
/// terminal value to zero (within `solver.tolerance`).
///
/// E.g. with acceleration samples this is the starting velocity for which the
/// displacement at `ub` vanishes.
pub fn best_initial_condition<R: Read + Seek>(
    source: &mut DataSource<R>,
    descriptor: &Descriptor,
    bounds: Bounds,
    limits: &Limits,
    solver: &SolverConfig,
) -> Result<f64> {
    let mut min = -solver.bound;
    let mut max = solver.bound;

    log::debug!(target: TRACE, "start {descriptor} ({} - {})", bounds.lb, bounds.ub);
    for i in 0..solver.max_iterations {
        let candidate = (min + max) / 2.0;
        let terminal = double_integral(source, descriptor, bounds, candidate, limits)?;

        if terminal.abs() < solver.tolerance {
            log::debug!(target: TRACE, "DONE: {candidate} err {terminal} took {i} iterations");
            return Ok(candidate);
        } else if terminal < 0.0 {
            log::debug!(target: TRACE, "{candidate} too low");
            min = candidate;
        } else {
            log::debug!(target: TRACE, "{candidate} too high");
            max = candidate;
        }
    }

    Err(Error::NoConvergence { min, max })
}

// ---------------------------------------------------------------------------
// Extremum scan
// ---------------------------------------------------------------------------

/// Minimum of the double-integrated series for a fixed initial condition,
/// stamped at the step midpoint where it occurs.
pub fn double_integral_minimum<R: Read + Seek>(
    source: &mut DataSource<R>,
    descriptor: &Descriptor,
    bounds: Bounds,
    initial: f64,
    limits: &Limits,
) -> Result<Datum> {
    let outer = double_integrator(source, descriptor, bounds, initial, limits)?;
    minimum(outer)
}

/// Smallest running total over all steps of `integrator`. The earliest step
/// wins ties.
pub fn minimum<S: DatumSource>(mut integrator: Integrator<S>) -> Result<Datum> {
    let mut found: Option<Datum> = None;
    while let Some(step) = integrator.step()? {
        if found.map_or(true, |f| step.value < f.value) {
            found = Some(Datum::new(step.midpoint, step.value));
        }
    }

    let bounds = integrator.bounds();
    found.ok_or(Error::EmptyIntegration {
        lb: bounds.lb,
        ub: bounds.ub,
    })
}
