//! Random draws for simulation runs.
//!
//! All randomness of a run comes from one [`RandomProvider`]. The seeded
//! implementation, [`RandomStream`], makes a run reproducible from a single
//! `u64` seed. Tests can swap in their own provider to script draws.

use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::Exp;
use tracing::trace;

use crate::error::SimError;

/// Sampling interface used by model code.
pub trait RandomProvider {
    /// Draw a non-negative value from an exponential distribution with the
    /// given `mean`. Fails with [`SimError::InvalidParameter`] unless
    /// `mean` is positive and finite.
    fn exponential(&mut self, mean: f64) -> Result<f64, SimError>;

    /// Draw an index with probability proportional to `weights[index]`.
    ///
    /// Fails with [`SimError::InvalidParameter`] if `weights` is empty, holds
    /// a negative or non-finite weight, or sums to zero.
    fn weighted_index(&mut self, weights: &[f64]) -> Result<usize, SimError>;
}

/// Pick one of `items` with probability proportional to its weight.
pub fn weighted_choice<'a, T, P>(provider: &mut P, items: &'a [T], weights: &[f64]) -> Result<&'a T, SimError>
where
    P: RandomProvider + ?Sized,
{
    if items.len() != weights.len() {
        return Err(SimError::invalid_parameter(format!(
            "{} choices but {} weights",
            items.len(),
            weights.len()
        )));
    }
    let index = provider.weighted_index(weights)?;
    items
        .get(index)
        .ok_or_else(|| SimError::invalid_parameter(format!("weighted index {index} out of range")))
}

fn validate_mean(mean: f64) -> Result<f64, SimError> {
    if mean.is_finite() && mean > 0.0 {
        Ok(mean)
    } else {
        Err(SimError::invalid_parameter(format!(
            "exponential mean must be positive and finite, got {mean}"
        )))
    }
}

fn validate_weights(weights: &[f64]) -> Result<(), SimError> {
    if weights.is_empty() {
        return Err(SimError::invalid_parameter("weighted choice needs at least one weight"));
    }
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(SimError::invalid_parameter(format!(
            "weights must be finite and non-negative, got {bad}"
        )));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(SimError::invalid_parameter("weights sum to zero"));
    }
    Ok(())
}

/// Seeded draw stream over ChaCha8.
///
/// Exponential draws come from [`rand_distr::Exp`] with `rate = 1 / mean`.
/// The sequence only depends on the seed and on the order of the draws.
#[derive(Debug, Clone)]
pub struct RandomStream {
    seed: u64,
    rng: ChaCha8Rng,
    draws: u64,
}

impl RandomStream {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            draws: 0,
        }
    }

    /// Seed this stream was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of draws taken so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

impl RandomProvider for RandomStream {
    fn exponential(&mut self, mean: f64) -> Result<f64, SimError> {
        let rate = 1.0 / validate_mean(mean)?;
        let distribution = Exp::new(rate).map_err(|err| SimError::invalid_parameter(err.to_string()))?;
        self.draws += 1;
        let value = distribution.sample(&mut self.rng);
        trace!(seed = self.seed, draw = self.draws, mean, value, "Exponential draw");
        Ok(value)
    }

    fn weighted_index(&mut self, weights: &[f64]) -> Result<usize, SimError> {
        validate_weights(weights)?;
        let distribution =
            WeightedIndex::new(weights).map_err(|err| SimError::invalid_parameter(err.to_string()))?;
        self.draws += 1;
        let index = distribution.sample(&mut self.rng);
        trace!(seed = self.seed, draw = self.draws, index, "Weighted draw");
        Ok(index)
    }
}
