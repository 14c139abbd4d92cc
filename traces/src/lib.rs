//! Bandwidth augmentation for encrypted video-streaming traces
//!
//! The crate implements a two stage pipeline:
//!
//! 1. [`extract_parameters`] scans a corpus of real traces and derives two [`EmpiricalDistribution`]s,
//!    one over segment durations and one over normalized inter-packet interval ratios.
//! 2. [`augment_dataset`] replays every real trace with a simulated bitrate trajectory
//!    ([`QualityModel`]) and timing drawn from these distributions.
//!
//! Augmentation runs are not resumable.
//! A run which fails partway leaves the output directory with only the already processed items.
//! The output directory must not exist beforehand, so a failed run has to be removed manually before retrying.

pub mod config;
pub mod constants;
mod dataset;
mod distribution;
pub mod extractor;
pub mod generator;
mod load_trace;
mod quality;
pub mod segments;
mod utils;

pub use crate::{
    config::Config,
    dataset::{Dataset, TraceId},
    distribution::EmpiricalDistribution,
    extractor::{extract_parameters, AugmentationParameters},
    generator::{augment_dataset, Generator},
    load_trace::{parse_trace_line, read_trace},
    quality::{Quality, QualityModel},
    utils::Probability,
};
use failure::{Error, ResultExt};
use misc_utils::fs::{file_open_read, file_open_write, WriteOptions};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::OpenOptions,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Direction of a packet as seen from the streaming client
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    /// The short code used in trace files
    pub fn code(self) -> &'static str {
        match self {
            Direction::ClientToServer => "s",
            Direction::ServerToClient => "r",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "s" => Some(Direction::ClientToServer),
            "r" => Some(Direction::ServerToClient),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Packet {
    /// Nanoseconds since session start
    pub time: i64,
    pub direction: Direction,
    /// Size on the wire in bytes
    pub size: u32,
}

impl Packet {
    pub fn new(time: i64, direction: Direction, size: u32) -> Self {
        Self {
            time,
            direction,
            size,
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.time, self.direction.code(), self.size)
    }
}

/// An ordered list of [`Packet`]s of one recording together with an identifier, normally the file name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace(Vec<Packet>, String);

impl Trace {
    pub fn new(packets: Vec<Packet>, identifier: String) -> Self {
        Trace(packets, identifier)
    }

    /// Load a [`Trace`] from a trace file.
    ///
    /// Compressed files are supported based on their file extension.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let rdr = file_open_read(path)
            .with_context(|_| format!("Opening trace file '{}' failed", path.display()))?;
        Ok(
            read_trace(BufReader::new(rdr), path.to_string_lossy().to_string())
                .with_context(|_| format!("Reading trace file '{}' failed", path.display()))?,
        )
    }

    pub fn id(&self) -> &str {
        &*self.1
    }

    pub fn packets(&self) -> &[Packet] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Write all packets in the trace file format, one packet per line
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        for packet in &self.0 {
            writeln!(writer, "{}", packet)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let wtr = file_open_write(
            path,
            WriteOptions::new().set_open_options(OpenOptions::new().create(true).truncate(true)),
        )
        .with_context(|_| format!("Opening trace file '{}' failed", path.display()))?;
        self.write_to(BufWriter::new(wtr))
            .with_context(|_| format!("Writing trace file '{}' failed", path.display()))?;
        Ok(())
    }
}
