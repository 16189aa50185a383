use rand::Rng;

use crate::error::HeliosError;
use crate::objects::{DistributionDef, SourceDef};
use crate::particle::Particle;
use crate::stats::DistributionKind;

/// One source term: a weight plus the three sampling marginals, resolved
/// from distribution user ids at setup.
#[derive(Clone, Debug)]
pub struct SourceDistribution {
    pub user_id: String,
    pub weight: f64,
    pub space: DistributionKind,
    pub angle: DistributionKind,
    pub energy: DistributionKind,
}

/// The source module: a weighted sum of distributions over (position,
/// direction, energy). Distributions are reusable across sources by user
/// id.
#[derive(Clone, Debug)]
pub struct Source {
    pub distributions: Vec<SourceDistribution>,
    total_weight: f64,
}

impl Source {
    pub fn from_definitions(
        source_defs: &[SourceDef],
        distribution_defs: &[DistributionDef],
    ) -> Result<Self, HeliosError> {
        if source_defs.is_empty() {
            return Err(HeliosError::Parse(
                "source module has no source definitions".to_string(),
            ));
        }
        for def in distribution_defs {
            def.kind.validate(&def.user_id)?;
        }

        let lookup = |id: &str| -> Result<DistributionKind, HeliosError> {
            distribution_defs
                .iter()
                .find(|d| d.user_id == id)
                .map(|d| d.kind.clone())
                .ok_or_else(|| HeliosError::ObjectMissing {
                    module: "source".to_string(),
                    user_id: id.to_string(),
                })
        };

        let mut distributions = Vec::with_capacity(source_defs.len());
        let mut total_weight = 0.0;
        for def in source_defs {
            if def.weight <= 0.0 {
                return Err(HeliosError::Parse(format!(
                    "source `{}` must have positive weight",
                    def.user_id
                )));
            }
            let space = lookup(&def.space)?;
            let angle = lookup(&def.angle)?;
            let energy = lookup(&def.energy)?;
            if !space.is_spatial() {
                return Err(HeliosError::Parse(format!(
                    "source `{}`: `{}` is not a spatial distribution",
                    def.user_id, def.space
                )));
            }
            if !angle.is_angular() {
                return Err(HeliosError::Parse(format!(
                    "source `{}`: `{}` is not an angular distribution",
                    def.user_id, def.angle
                )));
            }
            if !energy.is_energy() {
                return Err(HeliosError::Parse(format!(
                    "source `{}`: `{}` is not an energy distribution",
                    def.user_id, def.energy
                )));
            }
            total_weight += def.weight;
            distributions.push(SourceDistribution {
                user_id: def.user_id.clone(),
                weight: def.weight,
                space,
                angle,
                energy,
            });
        }
        Ok(Source {
            distributions,
            total_weight,
        })
    }

    /// Sample one birth event: pick a distribution by cumulative weight,
    /// then sample its three marginals.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Particle {
        let mut chosen = self
            .distributions
            .last()
            .expect("setup rejects an empty source");
        if self.distributions.len() > 1 {
            let mut remaining = rng.gen_range(0.0..self.total_weight);
            for dist in &self.distributions {
                remaining -= dist.weight;
                if remaining <= 0.0 {
                    chosen = dist;
                    break;
                }
            }
        }
        Particle::new(
            chosen.space.sample_position(rng),
            chosen.angle.sample_direction(rng),
            chosen.energy.sample_energy(rng),
        )
    }
}
