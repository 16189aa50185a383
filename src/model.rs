use log::{info, warn};
use rayon::prelude::*;

use crate::environment::Environment;
use crate::error::HeliosError;
use crate::fast_rng::FastRng;
use crate::geometry::{CrossOutcome, Geometry};
use crate::materials::Materials;
use crate::nuclide::{MT_ABSORPTION, MT_TOTAL};
use crate::particle::FailureCode;
use crate::settings::Settings;
use crate::source::Source;
use crate::stats::DistributionKind;

/// Event counts accumulated over a run. Statistical estimators live in the
/// driver above this crate; the core only reports what happened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub histories: u64,
    pub collisions: u64,
    pub absorbed: u64,
    pub leaked: u64,
    /// Histories that died with a failure code.
    pub failures: u64,
}

impl RunSummary {
    fn merge(self, other: RunSummary) -> RunSummary {
        RunSummary {
            histories: self.histories + other.histories,
            collisions: self.collisions + other.collisions,
            absorbed: self.absorbed + other.absorbed,
            leaked: self.leaked + other.leaked,
            failures: self.failures + other.failures,
        }
    }
}

/// Thin transport driver over a set-up environment.
///
/// Histories run in parallel over read-only post-setup data; each history
/// owns its RNG stream (derived from the global seed and the history index,
/// so scheduling does not affect results) and its particle stack.
pub struct Model {
    environment: Environment,
}

impl Model {
    /// Wrap a set-up environment. Geometry, materials and source must all
    /// be loaded.
    pub fn new(environment: Environment) -> Result<Self, HeliosError> {
        environment.geometry()?;
        environment.materials()?;
        environment.source()?;
        Ok(Model { environment })
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Transport `particles x batches` histories and report event counts.
    pub fn run(&self) -> Result<RunSummary, HeliosError> {
        let geometry = self.environment.geometry()?;
        let materials = self.environment.materials()?;
        let source = self.environment.source()?;
        let default_settings = Settings::default();
        let settings = match self.environment.settings() {
            Ok(settings) => settings,
            Err(_) => &default_settings,
        };

        let histories = (settings.particles() * settings.batches()) as u64;
        let seed = settings.seed();
        info!("transporting {} histories (seed {})", histories, seed);

        let summary = (0..histories)
            .into_par_iter()
            .map(|history| {
                transport_history(geometry, materials, source, settings, seed, history)
            })
            .reduce(RunSummary::default, RunSummary::merge);

        if summary.failures > 0 {
            warn!("{} of {} histories failed", summary.failures, histories);
        }
        Ok(summary)
    }
}

// One synchronous history: locate, fly to the nearer of collision and
// boundary, repeat until absorption, leakage or failure. Runtime geometry
// errors are recorded on the particle and the run continues.
fn transport_history(
    geometry: &Geometry,
    materials: &Materials,
    source: &Source,
    settings: &Settings,
    seed: u64,
    history: u64,
) -> RunSummary {
    let mut summary = RunSummary {
        histories: 1,
        ..RunSummary::default()
    };
    let mut rng = FastRng::from_history(seed, history);
    let mut particle = source.sample(&mut rng);
    particle.history = history;

    let mut state = match geometry.locate(particle.position, particle.direction) {
        Ok(state) => state,
        Err(_) => {
            particle.fail(FailureCode::LostInGeometry);
            summary.failures += 1;
            return summary;
        }
    };

    let energy_cutoff = settings.energy_cutoff();
    for _ in 0..settings.max_steps() {
        if !particle.alive {
            return summary;
        }

        let cell = &geometry.cells[state.cell()];
        let distance_collision = cell
            .material
            .and_then(|m| {
                materials.materials[m].sample_distance_to_collision(
                    particle.energy,
                    &materials.nuclides,
                    &mut rng,
                )
            })
            .unwrap_or(f64::INFINITY);

        let boundary = geometry.distance_to_boundary(&state);
        let to_boundary = boundary
            .as_ref()
            .map(|b| b.distance < distance_collision)
            .unwrap_or(false);

        if to_boundary {
            let crossing = boundary.expect("boundary checked above");
            match geometry.cross(&mut state, &crossing) {
                Ok(CrossOutcome::Crossed) | Ok(CrossOutcome::Reflected) => {
                    particle.position = state.world_position();
                    particle.direction = state.direction();
                }
                Ok(CrossOutcome::Leaked) => {
                    summary.leaked += 1;
                    particle.alive = false;
                }
                Err(_) => {
                    particle.fail(FailureCode::LostInGeometry);
                    summary.failures += 1;
                    return summary;
                }
            }
            continue;
        }

        if distance_collision.is_infinite() {
            // Streaming through an unbounded void: nothing ahead.
            particle.fail(FailureCode::LostInGeometry);
            summary.failures += 1;
            return summary;
        }

        geometry.advance(&mut state, distance_collision);
        particle.position = state.world_position();
        summary.collisions += 1;

        // Pick the nuclide the collision happens on, then decide the
        // outcome on that nuclide's own channels.
        let material = &materials.materials[cell.material.expect("collision needs a material")];
        let nuclide = &materials.nuclides[material
            .sample_collision_nuclide(particle.energy, &materials.nuclides, &mut rng)
            .expect("collision sampled in a material with zero cross section")];
        let sigma_t = nuclide.microscopic_xs(MT_TOTAL, particle.energy);
        let sigma_a = nuclide.microscopic_xs(MT_ABSORPTION, particle.energy);
        if rng.random() < sigma_a / sigma_t {
            summary.absorbed += 1;
            particle.alive = false;
            continue;
        }

        // Scatter isotropically in the lab frame
        let direction = DistributionKind::Isotropic.sample_direction(&mut rng);
        particle.direction = direction;
        geometry.set_direction(&mut state, direction);

        if particle.energy < energy_cutoff {
            summary.absorbed += 1;
            particle.alive = false;
        }
    }

    if particle.alive {
        particle.fail(FailureCode::MaxStepsExceeded);
        summary.failures += 1;
    }
    summary
}
