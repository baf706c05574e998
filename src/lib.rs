//! Physics quantities from force-plate and motion sensor CSV exports.
//!
//! A [`DataSource`] streams named series out of the export, the [`math`]
//! module integrates them, and [`physics`] turns the integrals into impulses,
//! heights and moments of inertia.

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod math;
pub mod physics;

pub use config::{Config, Limits, SolverConfig};
pub use data::model::{Datum, Descriptor, Measurement};
pub use data::source::DataSource;
pub use error::{Error, Result};
