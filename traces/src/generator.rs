//! Synthesize new traces from a real trace and the extracted parameters

use crate::{
    config::{Config, GeneratorConfig, QualityConfig},
    AugmentationParameters, Dataset, Direction, Packet, QualityModel, Trace, TraceId,
};
use failure::{Error, ResultExt};
use fnv::FnvHasher;
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use rayon::prelude::*;
use std::{
    hash::{Hash, Hasher},
    path::Path,
};

/// Amount of server data sent within one time bucket of a real trace
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RealSegment {
    /// Time of the first packet in the bucket
    pub start_time: i64,
    /// Payload bytes, i.e., without per packet overhead
    pub bytes: u64,
}

/// Split the server traffic into fixed-width time buckets
///
/// Buckets start at the first server packet.
/// Unlike [`detect_segments`](crate::segments::detect_segments), this does not depend on the client requests.
/// Buckets without any packet do not produce a segment.
pub fn bucket_segments(packets: &[Packet], config: &GeneratorConfig) -> Vec<RealSegment> {
    let mut segments: Vec<RealSegment> = Vec::new();
    let mut first_time = None;
    let mut current_bucket = None;
    let width = config.bucket_width.max(1);

    for packet in packets
        .iter()
        .filter(|p| p.direction == Direction::ServerToClient)
    {
        let start = *first_time.get_or_insert(packet.time);
        let bucket = (packet.time - start).div_euclid(width);
        if current_bucket != Some(bucket) {
            current_bucket = Some(bucket);
            segments.push(RealSegment {
                start_time: packet.time,
                bytes: 0,
            });
        }
        let payload = packet.size.saturating_sub(config.packet_overhead);
        if let Some(segment) = segments.last_mut() {
            segment.bytes += u64::from(payload);
        }
    }

    segments
}

/// Split `bytes` into packets with at most `mtu_payload` payload each
///
/// All packets but the last are full-sized.
/// The last packet carries the remaining bytes plus the overhead.
pub fn packet_sizes(bytes: f64, config: &GeneratorConfig) -> Vec<u32> {
    if bytes <= 0. {
        return Vec::new();
    }
    let payload = f64::from(config.mtu_payload());
    let count = (bytes / payload).ceil() as usize;
    let mut remaining = bytes;
    (0..count)
        .map(|_| {
            if remaining > payload {
                remaining -= payload;
                config.packet_size
            } else {
                remaining as u32 + config.packet_overhead
            }
        })
        .collect()
}

/// Creates synthetic traces
///
/// The generator only holds shared references and can be used from many threads at once.
#[derive(Copy, Clone, Debug)]
pub struct Generator<'a> {
    params: &'a AugmentationParameters,
    quality: &'a QualityConfig,
    config: &'a GeneratorConfig,
}

impl<'a> Generator<'a> {
    pub fn new(
        params: &'a AugmentationParameters,
        quality: &'a QualityConfig,
        config: &'a GeneratorConfig,
    ) -> Self {
        Self {
            params,
            quality,
            config,
        }
    }

    /// Create a synthetic variant of `trace`
    ///
    /// Each real segment is scaled by a quality chosen by a fresh [`QualityModel`].
    /// Segment duration and packet timings are drawn from the [`AugmentationParameters`].
    /// The synthetic trace ends before `max_trace_duration`.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        trace: &Trace,
        identifier: String,
        rng: &mut R,
    ) -> Trace {
        let mut model = QualityModel::new(*self.quality);
        let mut clock = 0f64;
        let mut packets = Vec::new();

        'segments: for segment in bucket_segments(trace.packets(), self.config) {
            let quality = model.step(rng);
            let bytes = segment.bytes as f64 * quality.scale();
            let duration = self.params.durations.sample(rng);
            let sizes = packet_sizes(bytes, self.config);

            // Keep the idle gaps of the real trace
            if clock < segment.start_time as f64 {
                clock = segment.start_time as f64;
            }
            if sizes.is_empty() {
                continue;
            }

            let ipt = duration / sizes.len() as f64;
            for size in sizes {
                clock += ipt * self.params.ratios.sample(rng);
                let time = clock as i64;
                if time > self.config.max_trace_duration {
                    debug!("{}: Reached maximal trace duration", identifier);
                    break 'segments;
                }
                packets.push(Packet::new(time, Direction::ServerToClient, size));
            }
        }

        Trace::new(packets, identifier)
    }
}

/// Deterministic RNG for one output trace
///
/// The seed only depends on the base seed and the trace, not on the processing order.
pub fn trace_rng(seed: u64, id: TraceId) -> XorShiftRng {
    let mut hasher = FnvHasher::with_key(0);
    seed.hash(&mut hasher);
    id.hash(&mut hasher);
    XorShiftRng::seed_from_u64(hasher.finish())
}

/// Augment every trace of `input` and write the results into a new dataset at `output`
///
/// `output` must not exist yet.
/// Every input sample is turned into `duplicates` output samples, sample `s` becomes samples `s * duplicates .. (s + 1) * duplicates`.
///
/// Items are processed in parallel.
/// There is no rollback, if an error occurs, the items written so far stay in `output`.
pub fn augment_dataset(
    input: &Dataset,
    output: &Path,
    params: &AugmentationParameters,
    config: &Config,
) -> Result<Dataset, Error> {
    let duplicates = config.generator.duplicates;
    let output = Dataset::create(
        output,
        input.items(),
        input.offsets(),
        input.samples() * duplicates,
    )?;
    let generator = Generator::new(params, &config.quality, &config.generator);
    info!(
        "Augmenting {} traces from {} into {}",
        input.trace_ids().len(),
        input.root().display(),
        output.root().display()
    );

    (0..input.items())
        .into_par_iter()
        .try_for_each(|item| -> Result<(), Error> {
            output.create_item_dir(item)?;
            for id in input.item_trace_ids(item) {
                let trace = input
                    .load_trace(id)
                    .with_context(|_| format!("Could not load trace {}", id))?;
                for dup in 0..duplicates {
                    let new_id = TraceId::new(id.item, id.offset, id.sample * duplicates + dup);
                    let mut rng = trace_rng(config.generator.seed, new_id);
                    let synthetic = generator.synthesize(&trace, new_id.to_string(), &mut rng);
                    output
                        .write_trace(new_id, &synthetic)
                        .with_context(|_| format!("Could not write trace {}", new_id))?;
                }
            }
            info!("Finished item {}", item);
            Ok(())
        })?;

    Ok(output)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{constants::NANOS_PER_SECOND as SEC, EmpiricalDistribution, Probability};
    use pretty_assertions::assert_eq;

    fn fixed_params(duration: f64, ratio: f64) -> AugmentationParameters {
        AugmentationParameters {
            durations: EmpiricalDistribution::new(vec![duration]).unwrap(),
            ratios: EmpiricalDistribution::new(vec![ratio]).unwrap(),
        }
    }

    fn no_switch() -> QualityConfig {
        QualityConfig {
            p_switch: Probability::new(0.).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_packet_sizes() {
        let config = GeneratorConfig::default();
        assert_eq!(vec![1500, 1500, 156], packet_sizes(3000., &config));
        assert_eq!(vec![1500], packet_sizes(1448., &config));
        assert_eq!(vec![1500, 53], packet_sizes(1449., &config));
        assert_eq!(vec![152], packet_sizes(100., &config));
        assert!(packet_sizes(0., &config).is_empty());
    }

    #[test]
    fn test_packet_sizes_payload_sum() {
        let config = GeneratorConfig::default();
        for &bytes in &[1., 1447., 2896., 10_000., 123_456.] {
            let sizes = packet_sizes(bytes, &config);
            assert_eq!((bytes / 1448.).ceil() as usize, sizes.len());
            let payload: u32 = sizes.iter().map(|s| s - 52).sum();
            assert_eq!(bytes as u32, payload);
        }
    }

    #[test]
    fn test_bucket_segments() {
        let packets = vec![
            Packet::new(50, Direction::ClientToServer, 150),
            Packet::new(100, Direction::ServerToClient, 1500),
            Packet::new(200, Direction::ServerToClient, 1500),
            Packet::new(300, Direction::ClientToServer, 60),
            Packet::new(2 * SEC + 99, Direction::ServerToClient, 40),
            // skips the bucket at [2 s + 100, 4 s + 100)
            Packet::new(5 * SEC, Direction::ServerToClient, 1052),
            Packet::new(6 * SEC, Direction::ServerToClient, 552),
        ];
        let segments = bucket_segments(&packets, &GeneratorConfig::default());
        assert_eq!(
            vec![
                RealSegment {
                    start_time: 100,
                    bytes: 2896,
                },
                RealSegment {
                    start_time: 5 * SEC,
                    bytes: 1500,
                },
            ],
            segments
        );
    }

    #[test]
    fn test_synthesize_fixed_parameters() {
        let packets = vec![
            Packet::new(100, Direction::ServerToClient, 1500),
            Packet::new(200, Direction::ServerToClient, 1500),
            Packet::new(300, Direction::ClientToServer, 60),
            Packet::new(5 * SEC / 2, Direction::ServerToClient, 1052),
        ];
        let trace = Trace::new(packets, "real".into());
        let params = fixed_params(SEC as f64, 1.);
        let quality = no_switch();
        let config = GeneratorConfig::default();
        let generator = Generator::new(&params, &quality, &config);

        let mut rng = XorShiftRng::seed_from_u64(0);
        let synthetic = generator.synthesize(&trace, "synthetic".into(), &mut rng);
        // MEDIUM quality halves the segment sizes
        assert_eq!(
            &[
                Packet::new(SEC + 100, Direction::ServerToClient, 1500),
                Packet::new(7 * SEC / 2, Direction::ServerToClient, 552),
            ],
            synthetic.packets()
        );
        assert_eq!("synthetic", synthetic.id());
    }

    #[test]
    fn test_synthesize_spreads_packets() {
        let packets = (0..4)
            .map(|i| Packet::new(i * 1000, Direction::ServerToClient, 1500))
            .collect();
        let trace = Trace::new(packets, "real".into());
        let params = fixed_params(SEC as f64, 1.);
        let quality = QualityConfig {
            p_switch: Probability::new(1.).unwrap(),
            p2: Probability::new(1.).unwrap(),
            p4: Probability::new(1.).unwrap(),
            ..Default::default()
        };
        let config = GeneratorConfig::default();
        let generator = Generator::new(&params, &quality, &config);

        let mut rng = XorShiftRng::seed_from_u64(0);
        let synthetic = generator.synthesize(&trace, "synthetic".into(), &mut rng);
        // HIGH quality keeps all 4 * 1448 bytes
        let times: Vec<_> = synthetic.packets().iter().map(|p| p.time).collect();
        assert_eq!(vec![SEC / 4, SEC / 2, 3 * SEC / 4, SEC], times);
        assert!(synthetic.packets().iter().all(|p| p.size == 1500));
    }

    #[test]
    fn test_synthesize_cutoff() {
        let packets = vec![
            Packet::new(100, Direction::ServerToClient, 1500),
            Packet::new(5 * SEC / 2, Direction::ServerToClient, 1052),
        ];
        let trace = Trace::new(packets, "real".into());
        let params = fixed_params(SEC as f64, 1.);
        let quality = no_switch();
        let config = GeneratorConfig {
            max_trace_duration: 3 * SEC,
            ..Default::default()
        };
        let generator = Generator::new(&params, &quality, &config);

        let mut rng = XorShiftRng::seed_from_u64(0);
        let synthetic = generator.synthesize(&trace, "synthetic".into(), &mut rng);
        assert_eq!(1, synthetic.len());
        assert!(synthetic.packets()[0].time <= 3 * SEC);
    }

    #[test]
    fn test_synthesize_from_reordered_trace() {
        use crate::{config::ExtractorConfig, extractor::extract_trace_parameters};

        let start = 2 * SEC;
        let mut packets = vec![Packet::new(start, Direction::ClientToServer, 150)];
        for &offset in &[100, 1000, 50, 1050, 1200] {
            packets.push(Packet::new(
                start + offset,
                Direction::ServerToClient,
                1500,
            ));
        }
        let real = Trace::new(packets, "reordered".into());
        let extracted =
            extract_trace_parameters(&real, 0, &ExtractorConfig::default()).unwrap();
        assert!(extracted.ratios.iter().all(|&r| r >= 0.));
        let params = AugmentationParameters::from_pooled(extracted).unwrap();

        let quality = QualityConfig::default();
        let config = GeneratorConfig::default();
        let generator = Generator::new(&params, &quality, &config);
        for seed in 0..20 {
            let mut rng = XorShiftRng::seed_from_u64(seed);
            let synthetic = generator.synthesize(&real, "synthetic".into(), &mut rng);
            assert!(!synthetic.is_empty());
            assert!(synthetic
                .packets()
                .windows(2)
                .all(|w| w[0].time <= w[1].time));
        }
    }

    #[test]
    fn test_trace_rng_is_deterministic() {
        let id = TraceId::new(1, 2, 3);
        let draw = |seed| -> Vec<u64> {
            let mut rng = trace_rng(seed, id);
            (0..4).map(|_| rng.gen()).collect()
        };
        let a = draw(5);
        let b = draw(5);
        let c = draw(6);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
