//! Mine segment durations and inter-packet timings from real traces

use crate::{
    config::{ExtractorConfig, ParamsConfig},
    segments::{detect_segments, merge_retransmissions},
    Dataset, EmpiricalDistribution, Trace,
};
use failure::{bail, Error, ResultExt};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::Path;

/// Statistics of a single trace
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TraceParameters {
    /// Duration of every segment after merging
    pub durations: Vec<f64>,
    /// Inter-packet intervals normalized by the mean of their segment
    pub ratios: Vec<f64>,
}

impl TraceParameters {
    fn append(&mut self, other: TraceParameters) {
        self.durations.extend(other.durations);
        self.ratios.extend(other.ratios);
    }
}

/// Extract the parameters of a single trace
///
/// `offset` determines how many segments are expected in the trace.
/// Returns [`None`] if the trace does not contain any segment.
pub fn extract_trace_parameters(
    trace: &Trace,
    offset: u32,
    config: &ExtractorConfig,
) -> Option<TraceParameters> {
    let segments = detect_segments(trace.packets(), config);
    if segments.is_empty() {
        return None;
    }
    let detected = segments.len();
    let segments = merge_retransmissions(segments, config.merge_target(offset));
    debug!(
        "{}: {} segments detected, {} after merging",
        trace.id(),
        detected,
        segments.len()
    );

    Some(TraceParameters {
        durations: segments.iter().map(|seg| seg.duration as f64).collect(),
        ratios: segments
            .iter()
            .flat_map(|seg| seg.normalized_intervals())
            .collect(),
    })
}

/// The two distributions shared between extraction and augmentation
#[derive(Clone, Debug, PartialEq)]
pub struct AugmentationParameters {
    pub durations: EmpiricalDistribution,
    pub ratios: EmpiricalDistribution,
}

impl AugmentationParameters {
    /// Build the distributions from the pooled values of all traces
    ///
    /// Fails if either list is empty.
    pub fn from_pooled(pooled: TraceParameters) -> Result<Self, Error> {
        if pooled.durations.is_empty() {
            bail!("No segments found in any trace. Cannot build a duration distribution.");
        }
        if pooled.ratios.is_empty() {
            bail!("No inter-packet times found in any segment. Cannot build an inter-packet distribution.");
        }
        Ok(Self {
            durations: EmpiricalDistribution::new(pooled.durations)?,
            ratios: EmpiricalDistribution::new(pooled.ratios)?,
        })
    }

    pub fn load(params: &ParamsConfig) -> Result<Self, Error> {
        Ok(Self {
            durations: EmpiricalDistribution::from_path(&params.durations_path())?,
            ratios: EmpiricalDistribution::from_path(&params.ipts_path())?,
        })
    }

    pub fn save(&self, params: &ParamsConfig) -> Result<(), Error> {
        self.durations.save(&params.durations_path())?;
        self.ratios.save(&params.ipts_path())?;
        Ok(())
    }
}

/// Extract the [`AugmentationParameters`] from all traces of the dataset
///
/// Traces are processed in parallel.
/// Traces without any segment are skipped, but a missing trace file aborts the extraction.
pub fn extract_parameters(
    dataset: &Dataset,
    config: &ExtractorConfig,
) -> Result<AugmentationParameters, Error> {
    let ids = dataset.trace_ids();
    info!(
        "Extracting parameters from {} traces in {}",
        ids.len(),
        dataset.root().display()
    );

    let per_trace = ids
        .par_iter()
        .map(|&id| -> Result<Option<TraceParameters>, Error> {
            let trace = dataset
                .load_trace(id)
                .with_context(|_| format!("Could not load trace {}", id))?;
            let params = extract_trace_parameters(&trace, id.offset, config);
            if params.is_none() {
                warn!("Trace {} does not contain any segments, skipping it", id);
            }
            Ok(params)
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let mut pooled = TraceParameters::default();
    let mut skipped = 0;
    for params in per_trace {
        match params {
            Some(params) => pooled.append(params),
            None => skipped += 1,
        }
    }
    info!(
        "Found {} segments and {} inter-packet times, skipped {} traces",
        pooled.durations.len(),
        pooled.ratios.len(),
        skipped
    );

    AugmentationParameters::from_pooled(pooled)
}

/// Run the extraction and write the distribution files into `params.dir`
pub fn write_params(
    dataset: &Dataset,
    config: &ExtractorConfig,
    params: &ParamsConfig,
) -> Result<AugmentationParameters, Error> {
    let extracted = extract_parameters(dataset, config)?;
    ensure_dir(&params.dir)?;
    extracted.save(params)?;
    info!(
        "Wrote {} and {}",
        params.durations_path().display(),
        params.ipts_path().display()
    );
    Ok(extracted)
}

fn ensure_dir(path: &Path) -> Result<(), Error> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|_| format!("Could not create directory '{}'", path.display()))?;
    }
    Ok(())
}
