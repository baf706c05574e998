//! Writes `sample_data.csv`: one jump run and one flip run in the column layout
//! the analyzer expects, sampled at 100 Hz with deterministic noise.

use std::f64::consts::PI;

use anyhow::{Context, Result};

const MASS_KG: f64 = 62.5;
const LITTLE_G: f64 = 9.81;
const RATE_HZ: f64 = 100.0;
const DURATION_S: f64 = 3.0;

const FIELDS: [&str; 6] = [
    "Time(s)",
    "Force(N)",
    "Lateral Force(N)",
    "Hang Time(s)",
    "Z-axis acceleration(m/s2)",
    "Z-angular velocity(rad/s)",
];

/// Seeded Gaussian sensor noise (SplitMix64 feeding Box-Muller).
struct Noise(u64);

impl Noise {
    fn uniform(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    }

    fn gauss(&mut self, sigma: f64) -> f64 {
        let radius = (-2.0 * self.uniform().max(f64::MIN_POSITIVE).ln()).sqrt();
        radius * (2.0 * PI * self.uniform()).cos() * sigma
    }
}

/// Timing and intensity of one trial.
struct Trial {
    push_start: f64,
    takeoff: f64,
    hang: f64,
    peak_force: f64,
    lateral_peak: f64,
    spin: f64,
}

impl Trial {
    fn landing(&self) -> f64 {
        self.takeoff + self.hang
    }

    /// (vertical force, lateral force, angular velocity) at `t`, noiseless.
    fn sample(&self, t: f64) -> (f64, f64, f64) {
        let weight = MASS_KG * LITTLE_G;
        if t < self.push_start {
            (weight, 0.0, 0.0)
        } else if t < self.takeoff {
            let phase = (t - self.push_start) / (self.takeoff - self.push_start);
            // Unweighting dip followed by the push.
            let dip = if phase < 0.5 {
                0.4 * weight * (2.0 * PI * phase).sin()
            } else {
                0.0
            };
            let vertical = weight - dip + self.peak_force * (PI * phase).sin().powi(2);
            (vertical, self.lateral_peak * (PI * phase).sin(), 0.0)
        } else if t < self.landing() {
            let phase = (t - self.takeoff) / self.hang;
            (0.0, 0.0, self.spin * (PI * phase).sin())
        } else {
            (weight, 0.0, 0.0)
        }
    }
}

fn main() -> Result<()> {
    let mut noise = Noise(42);
    let trials = [
        Trial {
            push_start: 0.8,
            takeoff: 1.4,
            hang: 0.52,
            peak_force: 900.0,
            lateral_peak: 15.0,
            spin: 0.3,
        },
        Trial {
            push_start: 0.7,
            takeoff: 1.35,
            hang: 0.61,
            peak_force: 1100.0,
            lateral_peak: 180.0,
            spin: 7.5,
        },
    ];

    let output_path = "sample_data.csv";
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(output_path)
        .with_context(|| format!("creating {output_path}"))?;

    let header: Vec<String> = (1..=trials.len())
        .flat_map(|run| FIELDS.iter().map(move |f| format!("Data Set {run}:{f}")))
        .collect();
    writer.write_record(&header).context("writing header")?;

    let rows = (DURATION_S * RATE_HZ) as usize;
    for i in 0..=rows {
        let t = i as f64 / RATE_HZ;
        let mut record = Vec::with_capacity(header.len());

        for trial in &trials {
            let (vertical, lateral, spin) = trial.sample(t);
            let vertical = (vertical + noise.gauss(4.0)).max(0.0);
            let lateral = lateral + noise.gauss(2.0);
            let spin = spin + noise.gauss(0.05);
            let accel = vertical / MASS_KG - LITTLE_G;

            let hang = if (t - trial.takeoff).abs() < 0.5 / RATE_HZ {
                "0".to_string()
            } else if (t - trial.landing()).abs() < 0.5 / RATE_HZ {
                format!("{:.3}", trial.hang)
            } else {
                String::new()
            };

            record.push(format!("{t:.2}"));
            record.push(format!("{vertical:.3}"));
            record.push(format!("{lateral:.3}"));
            record.push(hang);
            record.push(format!("{accel:.4}"));
            record.push(format!("{spin:.4}"));
        }

        writer.write_record(&record).with_context(|| format!("writing row {i}"))?;
    }
    writer.flush().context("flushing output")?;

    println!(
        "Wrote {} runs ({} rows at {RATE_HZ} Hz) to {output_path}",
        trials.len(),
        rows + 1
    );
    Ok(())
}
