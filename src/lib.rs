//! Core of the Helios Monte Carlo neutron transport code.
//!
//! Three engines make up the core: the modular environment that assembles a
//! problem from parsed definitions ([`Environment`]), the
//! constructive-solid-geometry engine with nested universes and lattices
//! ([`Geometry`]), and the ACE cross-section reader ([`ace`]). Materials,
//! source sampling and a thin transport driver ([`Model`]) sit on top.
//!
//! Everything is read-only after [`Environment::setup`]; worker threads
//! share the geometry, materials and tables without synchronization and own
//! their particle state and RNG streams.

pub mod ace;
pub mod cell;
pub mod environment;
pub mod error;
pub mod fast_rng;
pub mod geometry;
pub mod material;
pub mod materials;
pub mod model;
pub mod nuclide;
pub mod objects;
pub mod particle;
pub mod settings;
pub mod source;
pub mod stats;
pub mod surface;
pub mod universe;
pub mod utilities;

pub use ace::AceTable;
pub use cell::Cell;
pub use environment::{Environment, Module, ModuleFactory, SetupContext};
pub use error::HeliosError;
pub use fast_rng::FastRng;
pub use geometry::{
    BoundaryCrossing, CrossOutcome, CrossingKind, Geometry, TrackLevel, TrackState,
};
pub use material::Material;
pub use materials::Materials;
pub use model::{Model, RunSummary};
pub use nuclide::Nuclide;
pub use objects::McObject;
pub use particle::{FailureCode, Particle};
pub use settings::Settings;
pub use source::Source;
pub use stats::DistributionKind;
pub use surface::{Sense, Surface, SurfaceFlags, SurfaceKind};
pub use universe::{Lattice, LatticeExtent, Universe};
pub use utilities::{interpolate_linear, interpolate_log_linear, interpolate_log_log};
