use crate::config::QualityConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bitrate tier of a synthesized segment
///
/// The numeric value is the relative bitrate, with [`Quality::High`] being the full bitrate of the real trace.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum Quality {
    Low = 1,
    Medium = 2,
    High = 4,
}

impl Quality {
    pub fn level(self) -> u32 {
        self as u32
    }

    /// Factor to scale the segment size of the real trace with
    pub fn scale(self) -> f64 {
        f64::from(self.level()) / f64::from(Quality::High.level())
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Medium
    }
}

/// Markov chain over the [`Quality`] states, advanced once per segment
#[derive(Clone, Debug)]
pub struct QualityModel {
    config: QualityConfig,
    state: Quality,
}

impl QualityModel {
    /// Create a new model starting in [`Quality::Medium`]
    pub fn new(config: QualityConfig) -> Self {
        Self {
            config,
            state: Quality::default(),
        }
    }

    pub fn state(&self) -> Quality {
        self.state
    }

    /// Advance the model by one segment and return the new state
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Quality {
        self.state = Self::next_state(&self.config, self.state, rng);
        self.state
    }

    /// Pick the state following `from`
    ///
    /// A switch is attempted with probability `p_switch`.
    /// The target state of the switch is determined by a second draw against the branch probability of `from`.
    pub fn next_state<R: Rng + ?Sized>(config: &QualityConfig, from: Quality, rng: &mut R) -> Quality {
        use self::Quality::*;

        if !config.p_switch.sample(rng) {
            return from;
        }
        match from {
            Low => {
                if config.p1.sample(rng) {
                    High
                } else {
                    Medium
                }
            }
            Medium => {
                if config.p2.sample(rng) {
                    High
                } else {
                    Low
                }
            }
            High => {
                if config.p4.sample(rng) {
                    Medium
                } else {
                    Low
                }
            }
        }
    }
}
