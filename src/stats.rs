use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::HeliosError;
use crate::utilities::interpolate_linear;

/// Sampling distributions referenced by sources.
///
/// One tagged enum covers the three marginal classes (spatial, angular,
/// energy); a source validates at setup that each of its references is of
/// the right class. Distributions are reusable across sources by user id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistributionKind {
    /// Fixed birth position.
    Point { position: [f64; 3] },
    /// Uniform position over an axis-aligned box.
    Box {
        lower: [f64; 3],
        upper: [f64; 3],
    },
    /// Direction uniform over the unit sphere.
    Isotropic,
    /// Fixed direction (normalized at setup).
    Monodirectional { direction: [f64; 3] },
    /// Fixed birth energy.
    Monoenergetic { energy: f64 },
    /// Energy sampled from a tabulated cumulative distribution: linear
    /// interpolation of energy against the cumulative probability grid.
    Tabulated {
        energy: Vec<f64>,
        probability: Vec<f64>,
    },
}

impl DistributionKind {
    pub fn is_spatial(&self) -> bool {
        matches!(self, DistributionKind::Point { .. } | DistributionKind::Box { .. })
    }

    pub fn is_angular(&self) -> bool {
        matches!(
            self,
            DistributionKind::Isotropic | DistributionKind::Monodirectional { .. }
        )
    }

    pub fn is_energy(&self) -> bool {
        matches!(
            self,
            DistributionKind::Monoenergetic { .. } | DistributionKind::Tabulated { .. }
        )
    }

    /// Validate parameters at setup time.
    pub fn validate(&self, user_id: &str) -> Result<(), HeliosError> {
        match self {
            DistributionKind::Box { lower, upper } => {
                if (0..3).any(|i| lower[i] > upper[i]) {
                    return Err(HeliosError::Parse(format!(
                        "distribution `{}`: box lower corner exceeds upper corner",
                        user_id
                    )));
                }
            }
            DistributionKind::Monodirectional { direction } => {
                if crate::surface::norm(*direction) == 0.0 {
                    return Err(HeliosError::Parse(format!(
                        "distribution `{}`: direction vector cannot be zero",
                        user_id
                    )));
                }
            }
            DistributionKind::Monoenergetic { energy } => {
                if *energy <= 0.0 {
                    return Err(HeliosError::Parse(format!(
                        "distribution `{}`: energy must be positive",
                        user_id
                    )));
                }
            }
            DistributionKind::Tabulated { energy, probability } => {
                if energy.len() != probability.len() || energy.len() < 2 {
                    return Err(HeliosError::Parse(format!(
                        "distribution `{}`: tabulated grids must be parallel with at least two points",
                        user_id
                    )));
                }
                if probability.windows(2).any(|w| w[1] < w[0])
                    || probability[probability.len() - 1] <= probability[0]
                {
                    return Err(HeliosError::Parse(format!(
                        "distribution `{}`: cumulative probabilities must increase",
                        user_id
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Sample a position; panics if the distribution is not spatial (the
    /// source module validates classes at setup).
    pub fn sample_position<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 3] {
        match self {
            DistributionKind::Point { position } => *position,
            DistributionKind::Box { lower, upper } => {
                let mut p = [0.0; 3];
                for i in 0..3 {
                    let xi: f64 = rng.gen();
                    p[i] = lower[i] + xi * (upper[i] - lower[i]);
                }
                p
            }
            other => unreachable!("{other:?} is not a spatial distribution"),
        }
    }

    /// Sample a unit direction; panics if the distribution is not angular.
    pub fn sample_direction<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 3] {
        match self {
            DistributionKind::Isotropic => {
                let xi1: f64 = rng.gen();
                let xi2: f64 = rng.gen();
                let mu = 2.0 * xi1 - 1.0;
                let phi = 2.0 * std::f64::consts::PI * xi2;
                let sin_theta = (1.0 - mu * mu).sqrt();
                [sin_theta * phi.cos(), sin_theta * phi.sin(), mu]
            }
            DistributionKind::Monodirectional { direction } => {
                let mag = crate::surface::norm(*direction);
                [
                    direction[0] / mag,
                    direction[1] / mag,
                    direction[2] / mag,
                ]
            }
            other => unreachable!("{other:?} is not an angular distribution"),
        }
    }

    /// Sample an energy; panics if the distribution is not an energy one.
    pub fn sample_energy<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            DistributionKind::Monoenergetic { energy } => *energy,
            DistributionKind::Tabulated { energy, probability } => {
                // Invert the cumulative table at a uniform deviate
                let xi: f64 = rng.gen_range(probability[0]..probability[probability.len() - 1]);
                interpolate_linear(probability, energy, xi)
            }
            other => unreachable!("{other:?} is not an energy distribution"),
        }
    }
}
