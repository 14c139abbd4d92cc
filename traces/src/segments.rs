//! Detection of media segments in real traces
//!
//! A video player requests each media segment with a small client request.
//! These requests, called markers, are identified by their size and the time since the last marker.
//! All server traffic after a marker belongs to the segment until the next marker.

use crate::{config::ExtractorConfig, Direction, Packet};
use log::debug;
use std::{cmp::Reverse, collections::BinaryHeap};

#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// Time of the marker which requested the segment
    pub start_time: i64,
    /// Time of the last packet belonging to the segment minus `start_time`
    pub duration: i64,
    /// Time between consecutive packets of the segment
    pub inter_packet_intervals: Vec<f64>,
    /// Sum of all server packet sizes
    pub total_bytes: u64,
}

impl Segment {
    fn open(start_time: i64) -> Self {
        Self {
            start_time,
            duration: 0,
            inter_packet_intervals: Vec::new(),
            total_bytes: 0,
        }
    }

    /// Append `other` to this segment
    fn merge(&mut self, other: Segment) {
        self.duration += other.duration;
        self.inter_packet_intervals
            .extend(other.inter_packet_intervals);
        self.total_bytes += other.total_bytes;
    }

    /// Inter-packet intervals divided by their mean
    ///
    /// Returns an empty list if there are no intervals or all intervals are zero.
    pub fn normalized_intervals(&self) -> Vec<f64> {
        if self.inter_packet_intervals.is_empty() {
            return Vec::new();
        }
        let mean = self.inter_packet_intervals.iter().sum::<f64>()
            / self.inter_packet_intervals.len() as f64;
        if mean <= 0. {
            return Vec::new();
        }
        self.inter_packet_intervals
            .iter()
            .map(|ipt| ipt / mean)
            .collect()
    }
}

/// Split the packets into segments based on the client's segment requests
///
/// Only markers and server packets count as observed packets.
/// Other client packets, e.g., ACKs, are ignored completely.
/// Server packets before the first marker do not belong to any segment.
pub fn detect_segments(packets: &[Packet], config: &ExtractorConfig) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Option<Segment> = None;
    // The first marker is compared against the session start
    let mut last_marker = 0;
    let mut previous_time = 0;

    for packet in packets {
        match packet.direction {
            Direction::ClientToServer => {
                if config.is_marker_size(packet.size)
                    && packet.time - last_marker > config.marker_min_gap
                {
                    if let Some(mut segment) = current.take() {
                        segment.duration = (previous_time - segment.start_time).max(0);
                        segments.push(segment);
                    }
                    current = Some(Segment::open(packet.time));
                    last_marker = packet.time;
                    previous_time = packet.time;
                }
            }
            Direction::ServerToClient => {
                if let Some(segment) = &mut current {
                    // Reordered capture lines must not produce negative intervals
                    segment
                        .inter_packet_intervals
                        .push((packet.time - previous_time).max(0) as f64);
                    segment.total_bytes += u64::from(packet.size);
                }
                previous_time = packet.time;
            }
        }
    }

    if let Some(mut segment) = current {
        segment.duration = (previous_time - segment.start_time).max(0);
        segments.push(segment);
    }
    segments
}

/// Merge spurious segments caused by re-requests into their predecessor
///
/// As long as there are more than `target` segments, the segment with the smallest start time difference to its predecessor is merged into the predecessor.
/// Ties are resolved in favor of the earlier segment.
/// The first segment is never merged away, thus at least one segment remains.
///
/// Merging keeps the total duration and all inter-packet intervals.
pub fn merge_retransmissions(segments: Vec<Segment>, target: usize) -> Vec<Segment> {
    let target = target.max(1);
    if segments.len() <= target {
        return segments;
    }

    let start_times: Vec<i64> = segments.iter().map(|seg| seg.start_time).collect();
    let len = segments.len();
    let mut slots: Vec<Option<Segment>> = segments.into_iter().map(Some).collect();
    // Doubly-linked list over the remaining slots
    let mut prev: Vec<Option<usize>> = (0..len).map(|i| i.checked_sub(1)).collect();
    let mut next: Vec<Option<usize>> = (0..len)
        .map(|i| if i + 1 < len { Some(i + 1) } else { None })
        .collect();
    // Min-heap of the gap to the predecessor, the index breaks ties
    // Entries become stale once the slot is removed or the predecessor changed.
    let mut gaps: BinaryHeap<Reverse<(i64, usize)>> = (1..len)
        .map(|i| Reverse((start_times[i] - start_times[i - 1], i)))
        .collect();
    let mut remaining = len;

    while remaining > target {
        let Reverse((gap, idx)) = match gaps.pop() {
            Some(entry) => entry,
            None => break,
        };
        let pred = match prev[idx] {
            Some(pred) => pred,
            None => continue,
        };
        if start_times[idx] - start_times[pred] != gap {
            continue;
        }
        let segment = match slots[idx].take() {
            Some(segment) => segment,
            None => continue,
        };
        // Predecessors are always alive
        if let Some(pred_segment) = &mut slots[pred] {
            pred_segment.merge(segment);
        }
        remaining -= 1;

        next[pred] = next[idx];
        if let Some(succ) = next[idx] {
            prev[succ] = Some(pred);
            gaps.push(Reverse((start_times[succ] - start_times[pred], succ)));
        }
    }

    debug!("Merged {} segments into their predecessors", len - remaining);
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::NANOS_PER_SECOND;
    use pretty_assertions::assert_eq;

    const SEC: i64 = NANOS_PER_SECOND;

    fn marker(time: i64) -> Packet {
        Packet::new(time, Direction::ClientToServer, 150)
    }

    fn data(time: i64) -> Packet {
        Packet::new(time, Direction::ServerToClient, 1500)
    }

    fn segment(start_time: i64, duration: i64) -> Segment {
        Segment {
            start_time,
            duration,
            inter_packet_intervals: vec![duration as f64],
            total_bytes: 1500,
        }
    }

    #[test]
    fn test_detect_segments() {
        let packets = vec![
            // before the first marker
            data(SEC / 2),
            marker(3 * SEC / 2),
            data(16 * SEC / 10),
            // ACK
            Packet::new(17 * SEC / 10, Direction::ClientToServer, 52),
            data(2 * SEC),
            data(5 * SEC / 2),
            marker(3 * SEC),
            data(7 * SEC / 2),
            data(4 * SEC),
            data(5 * SEC),
        ];
        let segments = detect_segments(&packets, &ExtractorConfig::default());
        assert_eq!(2, segments.len());

        assert_eq!(3 * SEC / 2, segments[0].start_time);
        assert_eq!(SEC, segments[0].duration);
        assert_eq!(
            vec![(SEC / 10) as f64, (4 * SEC / 10) as f64, (SEC / 2) as f64],
            segments[0].inter_packet_intervals
        );
        assert_eq!(4500, segments[0].total_bytes);

        assert_eq!(3 * SEC, segments[1].start_time);
        assert_eq!(2 * SEC, segments[1].duration);
        assert_eq!(
            vec![(SEC / 2) as f64, (SEC / 2) as f64, SEC as f64],
            segments[1].inter_packet_intervals
        );
    }

    #[test]
    fn test_detect_segments_marker_gap() {
        // The second marker is too close to the first one
        let packets = vec![
            marker(2 * SEC),
            data(2 * SEC + 10),
            marker(2 * SEC + 100),
            data(2 * SEC + 200),
            // Wrong size for a marker
            Packet::new(5 * SEC, Direction::ClientToServer, 500),
            data(5 * SEC + 10),
        ];
        let segments = detect_segments(&packets, &ExtractorConfig::default());
        assert_eq!(1, segments.len());
        assert_eq!(3 * SEC + 10, segments[0].duration);
        assert_eq!(vec![10., 190., (3 * SEC - 190) as f64], segments[0].inter_packet_intervals);
    }

    #[test]
    fn test_detect_segments_first_marker_too_early() {
        let packets = vec![marker(SEC / 2), data(SEC)];
        assert!(detect_segments(&packets, &ExtractorConfig::default()).is_empty());
        assert!(detect_segments(&[], &ExtractorConfig::default()).is_empty());
    }

    #[test]
    fn test_detect_segments_reordered_packets() {
        let start = 2 * SEC;
        let packets = vec![
            marker(start),
            data(start + 100),
            data(start + 1000),
            data(start + 50),
            data(start + 1050),
        ];
        let segments = detect_segments(&packets, &ExtractorConfig::default());
        assert_eq!(1, segments.len());
        assert_eq!(vec![100., 900., 0., 1000.], segments[0].inter_packet_intervals);
        assert_eq!(1050, segments[0].duration);
        assert!(segments[0].normalized_intervals().iter().all(|&r| r >= 0.));

        // Only packets from before the marker
        let segments = detect_segments(
            &[marker(start), data(start - 10)],
            &ExtractorConfig::default(),
        );
        assert_eq!(0, segments[0].duration);
    }

    #[test]
    fn test_normalized_intervals() {
        let seg = Segment {
            start_time: 0,
            duration: 6,
            inter_packet_intervals: vec![1., 2., 3.],
            total_bytes: 0,
        };
        assert_eq!(vec![0.5, 1., 1.5], seg.normalized_intervals());

        let seg = Segment {
            inter_packet_intervals: vec![0., 0.],
            ..seg
        };
        assert!(seg.normalized_intervals().is_empty());
    }

    #[test]
    fn test_merge_noop() {
        let segments = vec![segment(0, 5), segment(10, 5)];
        assert_eq!(segments.clone(), merge_retransmissions(segments.clone(), 2));
        assert_eq!(segments.clone(), merge_retransmissions(segments, 300));
    }

    #[test]
    fn test_merge_smallest_gap() {
        let segments = vec![
            segment(0, 9),
            segment(10, 1),
            segment(11, 18),
            segment(30, 1),
            segment(31, 28),
            segment(60, 5),
        ];
        let merged = merge_retransmissions(segments.clone(), 4);
        let starts: Vec<_> = merged.iter().map(|seg| seg.start_time).collect();
        assert_eq!(vec![0, 10, 30, 60], starts);
        let durations: Vec<_> = merged.iter().map(|seg| seg.duration).collect();
        assert_eq!(vec![9, 19, 29, 5], durations);
        assert_eq!(vec![1., 18.], merged[1].inter_packet_intervals);
        assert_eq!(3000, merged[1].total_bytes);

        let total: i64 = segments.iter().map(|seg| seg.duration).sum();
        let merged_total: i64 = merged.iter().map(|seg| seg.duration).sum();
        assert_eq!(total, merged_total);
    }

    #[test]
    fn test_merge_recomputes_neighbor_gap() {
        // After merging 2 into 1, the gap of 3 grows from 3 to 5 and 4 becomes the smallest
        let segments = vec![
            segment(0, 1),
            segment(10, 1),
            segment(12, 1),
            segment(15, 1),
            segment(19, 1),
        ];
        let merged = merge_retransmissions(segments, 3);
        let starts: Vec<_> = merged.iter().map(|seg| seg.start_time).collect();
        assert_eq!(vec![0, 10, 15], starts);
        assert_eq!(2, merged[2].duration);
    }

    #[test]
    fn test_merge_ties_prefer_earlier() {
        let segments = vec![segment(0, 1), segment(5, 2), segment(10, 3)];
        let merged = merge_retransmissions(segments, 2);
        assert_eq!(2, merged.len());
        assert_eq!(0, merged[0].start_time);
        assert_eq!(3, merged[0].duration);
        assert_eq!(10, merged[1].start_time);
    }

    #[test]
    fn test_merge_keeps_first_segment() {
        let segments = vec![segment(0, 1), segment(100, 2), segment(101, 3), segment(150, 4)];
        let merged = merge_retransmissions(segments, 0);
        assert_eq!(1, merged.len());
        assert_eq!(0, merged[0].start_time);
        assert_eq!(10, merged[0].duration);
        assert_eq!(4, merged[0].inter_packet_intervals.len());
    }
}
