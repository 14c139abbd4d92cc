//! Default values for the augmentation parameters
//!
//! All of them can be overwritten using the [`Config`](crate::Config).
//! The values are calibrated for the LongEnough video dataset and need recalibration for other datasets.

/// Number of time units in one second. Trace timestamps are nanoseconds.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Smallest client request which starts a new media segment
pub const MARKER_MIN_SIZE: u32 = 149;
/// Largest client request which starts a new media segment
pub const MARKER_MAX_SIZE: u32 = 154;
/// Two segment requests must be at least this far apart
pub const MARKER_MIN_GAP: i64 = NANOS_PER_SECOND;

/// Expected number of segments for offset `0`
///
/// `T = MERGE_TARGET_BASE - offset * MERGE_TARGET_PER_OFFSET`
pub const MERGE_TARGET_BASE: i64 = 300;
/// Each offset shortens the trace and removes this many expected segments
pub const MERGE_TARGET_PER_OFFSET: i64 = 30;

/// Chance of switching the quality at each segment
pub const SWITCH_PROBABILITY: f64 = 0.10;
/// Chance of switching from LOW to HIGH, if switching
pub const QUALITY_PARAM_LOW: f64 = 0.22;
/// Chance of switching from MEDIUM to HIGH, if switching
pub const QUALITY_PARAM_MEDIUM: f64 = 0.36;
/// Chance of switching from HIGH to MEDIUM, if switching
pub const QUALITY_PARAM_HIGH: f64 = 0.79;

/// Width of the time buckets used to measure segment sizes in real traces
pub const BUCKET_WIDTH: i64 = 2 * NANOS_PER_SECOND;
/// Size of a full packet on the wire
pub const PACKET_SIZE: u32 = 1500;
/// Protocol overhead per packet (IP + TCP with timestamps)
///
/// This is specific to the capture setup and not derived from the transport.
pub const PACKET_OVERHEAD: u32 = 52;
/// Synthesized traces are cut after this much time
pub const MAX_TRACE_DURATION: i64 = 40 * NANOS_PER_SECOND;

/// File name of the segment duration distribution
pub const SEGMENT_DURATION_FILE: &str = "durations.txt";
/// File name of the normalized inter-packet time distribution
pub const INTER_ARRIVAL_FILE: &str = "ipts.txt";
/// File extension of trace files
pub const TRACE_FILE_EXTENSION: &str = "log";
