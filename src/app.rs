use std::fmt;
use std::io::{Read, Seek};

use serde::Serialize;

use crate::config::Config;
use crate::data::model::Measurement;
use crate::data::source::DataSource;
use crate::error::Result;
use crate::physics;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Jump,
    Flip,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Jump => write!(f, "JUMP"),
            RunKind::Flip => write!(f, "FLIP"),
        }
    }
}

/// One named line of a report.
#[derive(Debug, Clone, Serialize)]
pub struct Quantity {
    pub name: &'static str,
    pub units: &'static str,
    #[serde(flatten)]
    pub measurement: Measurement,
    /// Time at which the quantity was observed, for extremum results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<f64>,
}

/// All quantities computed for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub kind: RunKind,
    pub run: u32,
    pub quantities: Vec<Quantity>,
}

impl RunReport {
    fn new(kind: RunKind, run: u32) -> Self {
        Self {
            kind,
            run,
            quantities: Vec::new(),
        }
    }

    fn push(&mut self, name: &'static str, units: &'static str, measurement: Measurement) {
        self.quantities.push(Quantity {
            name,
            units,
            measurement,
            at: None,
        });
    }

    pub fn get(&self, name: &str) -> Option<&Quantity> {
        self.quantities.iter().find(|q| q.name == name)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} RUN #{}", self.kind, self.run)?;
        for q in &self.quantities {
            write!(f, "  {:<35} {} {}", q.name, q.measurement, q.units)?;
            if let Some(at) = q.at {
                write!(f, " (t = {at:.3} s)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Analyzer – session + configuration
// ---------------------------------------------------------------------------

/// Computes run reports against one open session.
pub struct Analyzer<R: Read + Seek> {
    source: DataSource<R>,
    config: Config,
}

impl<R: Read + Seek> Analyzer<R> {
    pub fn new(source: DataSource<R>, config: Config) -> Self {
        Self { source, config }
    }

    /// Impulses and both height estimates.
    pub fn jump(&mut self, run: u32) -> Result<RunReport> {
        log::info!("analyzing jump run {run}");
        let mut report = RunReport::new(RunKind::Jump, run);
        self.common(&mut report)?;
        Ok(report)
    }

    /// Everything a jump reports, plus rotation and centre-of-mass drop.
    pub fn flip(&mut self, run: u32) -> Result<RunReport> {
        log::info!("analyzing flip run {run}");
        let mut report = RunReport::new(RunKind::Flip, run);
        self.common(&mut report)?;

        let (src, cfg) = (&mut self.source, &self.config);
        report.push(
            "Moment of inertia",
            "kg m^2",
            physics::moment_of_inertia(src, run, cfg)?,
        );

        let lowest = physics::com_drop(src, run, cfg)?;
        report.quantities.push(Quantity {
            name: "Center of mass drop",
            units: "m",
            measurement: Measurement::exact(lowest.value),
            at: Some(lowest.timestamp),
        });
        Ok(report)
    }

    fn common(&mut self, report: &mut RunReport) -> Result<()> {
        let run = report.run;
        let (src, cfg) = (&mut self.source, &self.config);
        report.push(
            "Vertical Impulse",
            "N s",
            physics::vertical_impulse(src, run, cfg)?,
        );
        report.push(
            "Horizontal Impulse",
            "N s",
            physics::horizontal_impulse(src, run, cfg)?,
        );
        report.push(
            "True height achieved",
            "m",
            physics::raw_height(src, run, cfg)?,
        );
        report.push(
            "Height via impulse (at feet)",
            "m",
            physics::impulse_height(src, run, cfg)?,
        );
        Ok(())
    }

    /// Release the session.
    pub fn finish(self) {
        self.source.close();
    }
}
