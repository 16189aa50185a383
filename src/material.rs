use rand::Rng;

use crate::nuclide::{Nuclide, MT_TOTAL};

/// A material: bulk atom density plus a nuclide composition.
///
/// Macroscopic cross sections are computed per query against each nuclide's
/// own energy grid; no unified grid is built. Post-setup the composition is
/// immutable and shared across worker threads.
#[derive(Clone, Debug)]
pub struct Material {
    pub user_id: String,
    pub internal_id: usize,
    /// Atom density N in atoms / (barn cm).
    pub density: f64,
    /// (nuclide internal id, atom fraction), fractions normalized at setup.
    pub composition: Vec<(usize, f64)>,
}

impl Material {
    /// Macroscopic cross section in 1/cm:
    /// N * sum over i of a_i * sigma_i(E).
    pub fn macroscopic_xs(&self, mt: i64, energy: f64, nuclides: &[Nuclide]) -> f64 {
        self.density
            * self
                .composition
                .iter()
                .map(|&(nuclide, fraction)| {
                    fraction * nuclides[nuclide].microscopic_xs(mt, energy)
                })
                .sum::<f64>()
    }

    /// Sample the free flight distance to the next collision. None when the
    /// total cross section vanishes (the flight is unbounded).
    pub fn sample_distance_to_collision<R: Rng + ?Sized>(
        &self,
        energy: f64,
        nuclides: &[Nuclide],
        rng: &mut R,
    ) -> Option<f64> {
        let sigma_t = self.macroscopic_xs(MT_TOTAL, energy, nuclides);
        if sigma_t <= 0.0 {
            return None;
        }
        let xi: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        Some(-xi.ln() / sigma_t)
    }

    /// Pick the nuclide the collision happens on, weighted by each
    /// nuclide's share of the total macroscopic cross section.
    pub fn sample_collision_nuclide<R: Rng + ?Sized>(
        &self,
        energy: f64,
        nuclides: &[Nuclide],
        rng: &mut R,
    ) -> Option<usize> {
        let partials: Vec<f64> = self
            .composition
            .iter()
            .map(|&(nuclide, fraction)| {
                fraction * nuclides[nuclide].microscopic_xs(MT_TOTAL, energy)
            })
            .collect();
        let total: f64 = partials.iter().sum();
        if total <= 0.0 {
            return None;
        }
        let mut remaining = rng.gen_range(0.0..total);
        for (&(nuclide, _), partial) in self.composition.iter().zip(&partials) {
            remaining -= partial;
            if remaining <= 0.0 {
                return Some(nuclide);
            }
        }
        Some(self.composition.last()?.0)
    }
}
