use std::f64::consts::FRAC_1_SQRT_2;
use std::io::{Read, Seek};

use crate::data::model::{rss, Datum, Descriptor, Measurement};
use crate::data::source::DataSource;
use crate::error::{Error, Result};

/// Per-value uncertainty estimator: maps a sample value to its standard error.
pub type Uncertainty = Box<dyn Fn(f64) -> f64>;

// ---------------------------------------------------------------------------
// DatumSource – where an integrator pulls samples from
// ---------------------------------------------------------------------------

/// A stream of (timestamp, value) samples in ascending time order.
pub trait DatumSource {
    /// Next sample, or `None` once the stream is exhausted.
    fn next_datum(&mut self) -> Result<Option<Datum>>;

    /// The consumer is done; release any scan state.
    fn stop(&mut self);
}

/// One named series of an open session.
///
/// The session's selection is cleared when the integration stops or when this
/// value is dropped, so an aborted integration never leaves a stale cursor
/// behind for the next scan.
pub struct SeriesSource<'a, R: Read + Seek> {
    source: &'a mut DataSource<R>,
    descriptor: Descriptor,
}

impl<'a, R: Read + Seek> SeriesSource<'a, R> {
    pub fn new(source: &'a mut DataSource<R>, descriptor: Descriptor) -> Self {
        Self { source, descriptor }
    }
}

impl<R: Read + Seek> DatumSource for SeriesSource<'_, R> {
    fn next_datum(&mut self) -> Result<Option<Datum>> {
        self.source.next(&self.descriptor)
    }

    fn stop(&mut self) {
        self.source.stop();
    }
}

impl<R: Read + Seek> Drop for SeriesSource<'_, R> {
    fn drop(&mut self) {
        self.source.stop();
    }
}

// ---------------------------------------------------------------------------
// Integrator – trapezoidal rule over a DatumSource
// ---------------------------------------------------------------------------

/// Integration interval `[lb, ub]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lb: f64,
    pub ub: f64,
}

impl Bounds {
    /// Requires `0 <= lb < ub`.
    pub fn new(lb: f64, ub: f64) -> Result<Self> {
        if !(lb >= 0.0 && ub > lb && ub.is_finite()) {
            return Err(Error::InvalidBounds { lb, ub });
        }
        Ok(Self { lb, ub })
    }
}

/// Output of one trapezoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// Running integral including this step and the initial condition.
    pub value: f64,
    /// This step's uncertainty term (zero without an estimator).
    pub uncertainty: f64,
    /// Midpoint of the step's two sample timestamps.
    pub midpoint: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Primed,
    Stepping,
    Terminated,
}

/// Trapezoidal integrator over a sample stream.
///
/// Construction primes the integrator: samples before `lb` are discarded and
/// the first one at or after it becomes the left edge of the first trapezoid.
/// Each [`Integrator::step`] then consumes one more sample until the stream
/// ends or a sample lies past `ub`.
pub struct Integrator<S: DatumSource> {
    source: S,
    bounds: Bounds,
    total: f64,
    last: Datum,
    uncertainty: Option<Uncertainty>,
    phase: Phase,
    steps: usize,
    max_steps: usize,
}

impl<S: DatumSource> Integrator<S> {
    pub fn new(
        mut source: S,
        bounds: Bounds,
        initial: f64,
        uncertainty: Option<Uncertainty>,
        max_steps: usize,
    ) -> Result<Self> {
        let mut first = None;
        for _ in 0..max_steps {
            match source.next_datum()? {
                Some(datum) if datum.timestamp >= bounds.lb => {
                    first = Some(datum);
                    break;
                }
                Some(_) => continue,
                None => return Err(Error::LowerBoundNotReached { lb: bounds.lb }),
            }
        }
        let Some(first) = first else {
            return Err(Error::RowBudgetExceeded { limit: max_steps });
        };

        Ok(Self {
            source,
            bounds,
            total: initial,
            last: first,
            uncertainty,
            phase: Phase::Primed,
            steps: 0,
            max_steps,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Running integral so far (the initial condition before any step).
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Stop early, releasing the source.
    pub fn terminate(&mut self) {
        if self.phase != Phase::Terminated {
            self.phase = Phase::Terminated;
            self.source.stop();
        }
    }

    /// Integrate one more trapezoid. `None` once terminated.
    pub fn step(&mut self) -> Result<Option<Step>> {
        if self.phase == Phase::Terminated {
            return Ok(None);
        }

        let next = match self.source.next_datum()? {
            Some(datum) if datum.timestamp <= self.bounds.ub => datum,
            _ => {
                self.terminate();
                return Ok(None);
            }
        };

        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(Error::RowBudgetExceeded {
                limit: self.max_steps,
            });
        }

        let prev = std::mem::replace(&mut self.last, next);
        let dt = next.timestamp - prev.timestamp;
        let average = (prev.value + next.value) / 2.0;
        self.total += dt * average;
        self.phase = Phase::Stepping;

        let uncertainty = match &self.uncertainty {
            Some(sigma) => (FRAC_1_SQRT_2 * sigma(average) * dt).abs(),
            None => 0.0,
        };

        Ok(Some(Step {
            value: self.total,
            uncertainty,
            midpoint: (prev.timestamp + next.timestamp) / 2.0,
        }))
    }

    /// Run to termination. The value is the final running total; the
    /// uncertainty is the root-sum-of-squares of every step's term.
    pub fn integrate(mut self) -> Result<Measurement> {
        let mut terms = Vec::new();
        while let Some(step) = self.step()? {
            terms.push(step.uncertainty);
        }
        Ok(Measurement::new(self.total, rss(terms)))
    }
}

// ---------------------------------------------------------------------------
// Nested – an integrator's steps as a sample stream
// ---------------------------------------------------------------------------

/// Feeds the running total of an inner integrator, stamped at each step's
/// midpoint, to an outer integrator.
pub struct Nested<S: DatumSource> {
    inner: Integrator<S>,
}

impl<S: DatumSource> Nested<S> {
    pub fn new(inner: Integrator<S>) -> Self {
        Self { inner }
    }
}

impl<S: DatumSource> DatumSource for Nested<S> {
    fn next_datum(&mut self) -> Result<Option<Datum>> {
        Ok(self
            .inner
            .step()?
            .map(|step| Datum::new(step.midpoint, step.value)))
    }

    fn stop(&mut self) {
        self.inner.terminate();
    }
}
