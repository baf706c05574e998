use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// Longest field name a [`Descriptor`] accepts.
pub const MAX_FIELD_NAME_LEN: usize = 1024;

/// Field name of the per-run time column.
pub const TIME_FIELD: &str = "Time(s)";

// ---------------------------------------------------------------------------
// Descriptor – (run, field) pair naming one series
// ---------------------------------------------------------------------------

/// Identifies one series: a field within a numbered run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Descriptor {
    run: u32,
    field: String,
}

impl Descriptor {
    /// Validate and build a descriptor. The run must be positive and the field
    /// name non-empty and at most [`MAX_FIELD_NAME_LEN`] bytes.
    pub fn new(run: i64, field: impl Into<String>) -> Result<Self> {
        let field = field.into();
        let reason = if run <= 0 {
            Some("run must be positive")
        } else if run > u32::MAX as i64 {
            Some("run out of range")
        } else if field.is_empty() {
            Some("field name is empty")
        } else if field.len() > MAX_FIELD_NAME_LEN {
            Some("field name too long")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::InvalidDescriptor { run, field, reason }),
            None => Ok(Self {
                run: run as u32,
                field,
            }),
        }
    }

    pub fn run(&self) -> u32 {
        self.run
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// The descriptor of this run's time column.
    pub fn time(&self) -> Descriptor {
        Descriptor {
            run: self.run,
            field: TIME_FIELD.to_string(),
        }
    }

    /// Header cell text naming this series, e.g. `Data Set 3:Force(N)`.
    pub fn column_name(&self) -> String {
        format!("Data Set {}:{}", self.run, self.field)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.run, self.field)
    }
}

// ---------------------------------------------------------------------------
// Datum – one observation
// ---------------------------------------------------------------------------

/// One (timestamp, value) observation. Copied out of the session, never borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Datum {
    pub timestamp: f64,
    pub value: f64,
}

impl Datum {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

// ---------------------------------------------------------------------------
// ColumnPair – resolved (time, value) column indices
// ---------------------------------------------------------------------------

/// Zero-based column indices, valid only for the session that resolved them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnPair {
    pub time: usize,
    pub value: usize,
}

// ---------------------------------------------------------------------------
// Measurement – value with uncertainty
// ---------------------------------------------------------------------------

/// A value and its (non-negative) uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Measurement {
    pub value: f64,
    pub uncertainty: f64,
}

impl Measurement {
    pub fn new(value: f64, uncertainty: f64) -> Self {
        Self {
            value,
            uncertainty: uncertainty.abs(),
        }
    }

    /// Exact value, zero uncertainty.
    pub fn exact(value: f64) -> Self {
        Self::new(value, 0.0)
    }
}

/// Root-sum-of-squares of independent uncertainty terms.
pub fn rss<I: IntoIterator<Item = f64>>(terms: I) -> f64 {
    terms.into_iter().map(|t| t * t).sum::<f64>().sqrt()
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:12.6} ± {:<12.6}", self.value, self.uncertainty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_rejects_bad_input() {
        assert!(matches!(
            Descriptor::new(0, "Force(N)"),
            Err(Error::InvalidDescriptor { .. })
        ));
        assert!(matches!(
            Descriptor::new(-3, "Force(N)"),
            Err(Error::InvalidDescriptor { .. })
        ));
        assert!(matches!(
            Descriptor::new(1, ""),
            Err(Error::InvalidDescriptor { .. })
        ));
        let long = "x".repeat(MAX_FIELD_NAME_LEN + 1);
        assert!(matches!(
            Descriptor::new(1, long),
            Err(Error::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn column_names_follow_header_template() {
        let d = Descriptor::new(3, "Force(N)").unwrap();
        assert_eq!(d.column_name(), "Data Set 3:Force(N)");
        assert_eq!(d.time().column_name(), "Data Set 3:Time(s)");
    }

    #[test]
    fn rss_combines_terms() {
        assert_eq!(rss([3.0, 4.0]), 5.0);
        assert_eq!(rss(std::iter::empty()), 0.0);
    }
}
