/// Numeric integration over session series.
///
/// ```text
///   DataSource ──► SeriesSource ──► Integrator ──► Measurement
///                                       │
///                                       ▼ (per step)
///                                    Nested ──► Integrator ──► shooting / minimum
/// ```
pub mod integrator;
pub mod shooting;

use std::io::{Read, Seek};

pub use integrator::{Bounds, DatumSource, Integrator, Nested, SeriesSource, Step, Uncertainty};
pub use shooting::{best_initial_condition, double_integral, double_integral_minimum};

use crate::config::Limits;
use crate::data::model::{Descriptor, Measurement};
use crate::data::source::DataSource;
use crate::error::Result;

/// Definite integral of one series over `bounds`, starting from zero.
pub fn integral<R: Read + Seek>(
    source: &mut DataSource<R>,
    descriptor: &Descriptor,
    bounds: Bounds,
    uncertainty: Option<Uncertainty>,
    limits: &Limits,
) -> Result<Measurement> {
    let series = SeriesSource::new(source, descriptor.clone());
    Integrator::new(series, bounds, 0.0, uncertainty, limits.max_rows)?.integrate()
}
