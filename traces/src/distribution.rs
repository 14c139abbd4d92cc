use failure::{bail, Error, ResultExt};
use misc_utils::fs::{file_open_read, file_open_write, WriteOptions};
use ordered_float::NotNan;
use rand::Rng;
use std::{
    fs::OpenOptions,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

/// A sorted pool of observed values, which can be resampled with replacement
///
/// The distribution is never empty and the values are always sorted ascending.
/// Sampling does not interpolate, every sample is one of the observed values.
#[derive(Clone, Debug, PartialEq)]
pub struct EmpiricalDistribution(Vec<f64>);

impl EmpiricalDistribution {
    /// Create a new distribution from arbitrary ordered values
    ///
    /// Fails if `values` is empty or contains a NaN or a negative value.
    pub fn new(values: Vec<f64>) -> Result<Self, Error> {
        if values.is_empty() {
            bail!("An empirical distribution requires at least one value.");
        }
        if let Some(value) = values.iter().find(|&&v| v < 0.) {
            bail!(
                "An empirical distribution may not contain negative values, found {}",
                value
            );
        }
        let mut values = values
            .into_iter()
            .map(NotNan::new)
            .collect::<Result<Vec<_>, _>>()
            .context("An empirical distribution may not contain NaN values")?;
        values.sort();
        Ok(Self(values.into_iter().map(NotNan::into_inner).collect()))
    }

    /// Load a distribution file with one value per line
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let rdr = file_open_read(path).with_context(|_| {
            format!("Opening distribution file '{}' failed", path.display())
        })?;
        let mut values = Vec::new();
        for (lineno, line) in BufReader::new(rdr).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value = line.parse::<f64>().with_context(|_| {
                format!(
                    "Invalid value '{}' in line {} of '{}'",
                    line,
                    lineno + 1,
                    path.display()
                )
            })?;
            values.push(value);
        }
        Ok(Self::new(values)
            .with_context(|_| format!("Invalid distribution file '{}'", path.display()))?)
    }

    /// Write the distribution with one value per line in ascending order
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let wtr = file_open_write(
            path,
            WriteOptions::new().set_open_options(OpenOptions::new().create(true).truncate(true)),
        )
        .with_context(|_| format!("Opening distribution file '{}' failed", path.display()))?;
        let mut wtr = BufWriter::new(wtr);
        for value in &self.0 {
            writeln!(wtr, "{}", value)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Draw a uniformly random value from the pool
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.0[rng.gen_range(0, self.0.len())]
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
