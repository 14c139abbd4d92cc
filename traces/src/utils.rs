use failure::{bail, Error};
use rand::{distributions::Open01, Rng};
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt};

/// A probability value in the range `[0, 1]`
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Probability(f64);

impl Probability {
    pub fn new(value: f64) -> Result<Self, Error> {
        if !(0. ..=1.).contains(&value) {
            bail!("Probability must be in the range [0, 1] but is {}", value);
        }
        Ok(Self(value))
    }

    pub fn to_float(self) -> f64 {
        self.0
    }

    /// Perform a Bernoulli trial, returns `true` with the probability of `self`
    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> bool {
        rng.sample::<f64, _>(Open01) < self.0
    }
}

impl TryFrom<f64> for Probability {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Probability> for f64 {
    fn from(prob: Probability) -> f64 {
        prob.0
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0 * 100.)
    }
}

#[cfg(test)]
mod test {
    use super::Probability;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    #[test]
    fn test_probability_range() {
        assert!(Probability::new(0.).is_ok());
        assert!(Probability::new(1.).is_ok());
        assert!(Probability::new(0.36).is_ok());
        assert!(Probability::new(-0.1).is_err());
        assert!(Probability::new(1.01).is_err());
        assert!(Probability::new(std::f64::NAN).is_err());
    }

    #[test]
    fn test_probability_extremes() {
        let mut rng = XorShiftRng::seed_from_u64(7);
        let never = Probability::new(0.).unwrap();
        let always = Probability::new(1.).unwrap();
        for _ in 0..1000 {
            assert!(!never.sample(&mut rng));
            assert!(always.sample(&mut rng));
        }
    }
}
