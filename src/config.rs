use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Limits – runaway guards for the streaming reader and integrators
// ---------------------------------------------------------------------------

/// Bounds on how much input one scan may consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum rows read (or integration steps taken) in one scan.
    pub max_rows: usize,
    /// Maximum header width.
    pub max_columns: usize,
    /// Maximum byte length of a single cell.
    pub max_field_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            max_columns: 500,
            max_field_len: 8192,
        }
    }
}

// ---------------------------------------------------------------------------
// SolverConfig – shooting-method search parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// The search starts from `[-bound, bound]`.
    pub bound: f64,
    pub max_iterations: usize,
    /// Terminal value magnitude accepted as zero.
    pub tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            bound: 100.0,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

// ---------------------------------------------------------------------------
// Constants – physical constants and instrument uncertainties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constants {
    /// Gravitational acceleration (m/s²).
    pub little_g: f64,
    pub little_g_ucty: f64,
    /// Jumper mass (kg).
    pub mass_kg: f64,
    pub mass_ucty_kg: f64,
    /// Force plate uncertainty (N).
    pub forceplate_ucty_n: f64,
    /// Lever arm from the force plate to the centre of mass (m).
    pub com_m: f64,
    pub com_ucty_m: f64,
    /// Gyroscope uncertainty (rad/s).
    pub angular_velocity_ucty: f64,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            little_g: 9.81,
            little_g_ucty: 0.01,
            mass_kg: 62.5,
            mass_ucty_kg: 0.5,
            forceplate_ucty_n: 5.0,
            com_m: 1.0,
            com_ucty_m: 0.25,
            angular_velocity_ucty: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Config – everything above, loadable from JSON
// ---------------------------------------------------------------------------

/// Full analyzer configuration. Missing keys fall back to defaults.
///
/// ```json
/// { "limits": { "max_rows": 20000 }, "constants": { "mass_kg": 70.0 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: Limits,
    pub solver: SolverConfig,
    pub constants: Constants,
}

impl Config {
    /// Read a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }
}
