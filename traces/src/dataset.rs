use crate::{constants::TRACE_FILE_EXTENSION, Trace};
use failure::{bail, Error, Fail, ResultExt};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

/// Identifies a single recording within a [`Dataset`]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct TraceId {
    pub item: u32,
    pub offset: u32,
    pub sample: u32,
}

impl TraceId {
    pub fn new(item: u32, offset: u32, sample: u32) -> Self {
        Self {
            item,
            offset,
            sample,
        }
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:04}-{:04}", self.item, self.offset, self.sample)
    }
}

/// A directory of traces with one sub-directory per item
///
/// ```text
/// root/
///   0/0000-0000-0000.log
///   0/0000-0000-0001.log
///   ...
///   1/0001-0000-0000.log
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dataset {
    root: PathBuf,
    items: u32,
    offsets: u32,
    samples: u32,
}

impl Dataset {
    /// Describe an existing dataset
    pub fn new(root: impl Into<PathBuf>, items: u32, offsets: u32, samples: u32) -> Self {
        Self {
            root: root.into(),
            items,
            offsets,
            samples,
        }
    }

    /// Create the root directory for a new dataset
    ///
    /// Fails if the directory already exists, such that earlier results are never overwritten.
    pub fn create(
        root: impl Into<PathBuf>,
        items: u32,
        offsets: u32,
        samples: u32,
    ) -> Result<Self, Error> {
        let dataset = Self::new(root, items, offsets, samples);
        match fs::create_dir(&dataset.root) {
            Ok(()) => Ok(dataset),
            Err(ref err) if err.kind() == io::ErrorKind::AlreadyExists => bail!(
                "Output directory '{}' already exists. Remove it or choose a different path.",
                dataset.root.display()
            ),
            Err(err) => Err(err
                .context(format!(
                    "Could not create output directory '{}'",
                    dataset.root.display()
                ))
                .into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn items(&self) -> u32 {
        self.items
    }

    pub fn offsets(&self) -> u32 {
        self.offsets
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn item_dir(&self, item: u32) -> PathBuf {
        self.root.join(item.to_string())
    }

    pub fn trace_path(&self, id: TraceId) -> PathBuf {
        self.item_dir(id.item)
            .join(format!("{}.{}", id, TRACE_FILE_EXTENSION))
    }

    /// All traces of one item, ordered by offset and sample
    pub fn item_trace_ids(&self, item: u32) -> impl Iterator<Item = TraceId> {
        let samples = self.samples;
        (0..self.offsets).flat_map(move |offset| {
            (0..samples).map(move |sample| TraceId::new(item, offset, sample))
        })
    }

    /// All traces of the dataset, ordered by item, offset, and sample
    pub fn trace_ids(&self) -> Vec<TraceId> {
        (0..self.items)
            .flat_map(|item| self.item_trace_ids(item))
            .collect()
    }

    pub fn load_trace(&self, id: TraceId) -> Result<Trace, Error> {
        Trace::from_path(&self.trace_path(id))
    }

    /// Create the directory for `item`, which must not exist yet
    pub fn create_item_dir(&self, item: u32) -> Result<(), Error> {
        let path = self.item_dir(item);
        fs::create_dir(&path)
            .with_context(|_| format!("Could not create item directory '{}'", path.display()))?;
        Ok(())
    }

    pub fn write_trace(&self, id: TraceId, trace: &Trace) -> Result<(), Error> {
        trace.save(&self.trace_path(id))
    }
}
