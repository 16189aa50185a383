use std::collections::HashMap;

use log::debug;

use crate::cell::Cell;
use crate::error::HeliosError;
use crate::objects::{CellDef, LatticeDef, SurfaceDef};
use crate::surface::{add, dot, sub, Sense, Surface, SurfaceFlags};
use crate::universe::{Lattice, LatticeExtent, Universe, ROOT_UNIVERSE};

/// The geometry module: setup-frozen surfaces, cells and universes plus the
/// point-location and distance-to-boundary queries transported particles
/// run on.
///
/// Internal ids are dense indices into the flat vectors, assigned in input
/// order at setup; user-id indexes map back. After setup the whole structure
/// is immutable and shared across worker threads.
#[derive(Clone, Debug)]
pub struct Geometry {
    pub surfaces: Vec<Surface>,
    pub cells: Vec<Cell>,
    pub universes: Vec<Universe>,
    root: usize,
    surface_index: HashMap<String, usize>,
    cell_index: HashMap<String, Vec<usize>>,
    universe_index: HashMap<String, usize>,
    surface_tolerance: f64,
    nudge: f64,
}

/// One level of the per-particle universe stack. Positions and directions
/// are in this level's local coordinates (translation-only transforms keep
/// directions identical across levels).
#[derive(Clone, Debug)]
pub struct TrackLevel {
    pub universe: usize,
    pub cell: usize,
    /// Set when this level was entered by tiling a lattice.
    pub site: Option<LatticeSite>,
    pub position: [f64; 3],
    pub direction: [f64; 3],
    /// Crossed last; excluded from re-intersection within one step.
    pub last_surface: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LatticeSite {
    /// Internal id of the lattice universe.
    pub lattice: usize,
    /// Raw (unwrapped) slot indices of the tile.
    pub slot: [i64; 3],
}

/// Per-particle navigation state: one entry per nested universe level, the
/// deepest entry current.
#[derive(Clone, Debug)]
pub struct TrackState {
    pub levels: Vec<TrackLevel>,
}

impl TrackState {
    pub fn current(&self) -> &TrackLevel {
        self.levels.last().expect("track state has at least one level")
    }

    /// Internal id of the deepest (current) cell.
    pub fn cell(&self) -> usize {
        self.current().cell
    }

    /// Position in root-universe coordinates.
    pub fn world_position(&self) -> [f64; 3] {
        self.levels[0].position
    }

    pub fn direction(&self) -> [f64; 3] {
        self.levels[0].direction
    }
}

/// What the next boundary along the flight path is.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryCrossing {
    pub distance: f64,
    pub kind: CrossingKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CrossingKind {
    /// A surface of the cell at this stack level.
    Surface { level: usize, surface: usize },
    /// A tile wall of the lattice this level sits in.
    LatticeWall {
        level: usize,
        axis: usize,
        positive: bool,
    },
}

/// Outcome of stepping across a boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrossOutcome {
    /// The particle is in the adjacent cell (possibly at another level).
    Crossed,
    /// A reflective boundary mirrored the direction in place.
    Reflected,
    /// A vacuum boundary let the particle escape.
    Leaked,
}

impl Geometry {
    /// Build the geometry from parsed definitions.
    ///
    /// `resolve_material` maps a material user id to its internal id in the
    /// materials module (None when unknown). Internal ids are assigned in
    /// definition order; universes come into existence as cells, fills and
    /// lattice slots name them.
    pub fn from_definitions(
        surface_defs: &[SurfaceDef],
        cell_defs: &[CellDef],
        lattice_defs: &[LatticeDef],
        resolve_material: impl Fn(&str) -> Option<usize>,
        surface_tolerance: f64,
        nudge: f64,
    ) -> Result<Self, HeliosError> {
        // Surfaces first: sense lists resolve against them.
        let mut surfaces = Vec::with_capacity(surface_defs.len());
        let mut surface_index = HashMap::new();
        for def in surface_defs {
            let flags = SurfaceFlags {
                reflective: def.reflective,
                vacuum: def.vacuum,
            };
            let mut surface =
                Surface::from_coefficients(&def.kind, def.user_id.clone(), &def.coefficients, flags)?;
            surface.internal_id = surfaces.len();
            if surface_index
                .insert(def.user_id.clone(), surface.internal_id)
                .is_some()
            {
                return Err(HeliosError::Parse(format!(
                    "duplicate surface user id `{}`",
                    def.user_id
                )));
            }
            surfaces.push(surface);
        }

        // Universes come into existence as definitions name them. The root
        // exists whenever any cell lands in it.
        let mut universes: Vec<Universe> = Vec::new();
        let mut universe_index: HashMap<String, usize> = HashMap::new();
        let intern_universe = |id: &str,
                                   universes: &mut Vec<Universe>,
                                   universe_index: &mut HashMap<String, usize>|
         -> usize {
            if let Some(&idx) = universe_index.get(id) {
                return idx;
            }
            let idx = universes.len();
            universes.push(Universe::new(id, idx));
            universe_index.insert(id.to_string(), idx);
            idx
        };

        for def in cell_defs {
            intern_universe(&def.universe, &mut universes, &mut universe_index);
            if let Some(fill) = &def.fill {
                intern_universe(fill, &mut universes, &mut universe_index);
            }
        }
        for def in lattice_defs {
            let idx = intern_universe(&def.user_id, &mut universes, &mut universe_index);
            if universes[idx].lattice.is_some() {
                return Err(HeliosError::Parse(format!(
                    "duplicate lattice user id `{}`",
                    def.user_id
                )));
            }
            if def.universes.len() != def.shape[0] * def.shape[1] * def.shape[2] {
                return Err(HeliosError::Parse(format!(
                    "lattice `{}` declares {} slots but shape {:?} needs {}",
                    def.user_id,
                    def.universes.len(),
                    def.shape,
                    def.shape[0] * def.shape[1] * def.shape[2]
                )));
            }
            if def.pitch.iter().any(|&p| p <= 0.0) {
                return Err(HeliosError::Parse(format!(
                    "lattice `{}` has a non-positive pitch",
                    def.user_id
                )));
            }
            let extent = match def.extent.as_str() {
                "bounded" => LatticeExtent::Bounded,
                "infinite" => LatticeExtent::Infinite,
                other => {
                    return Err(HeliosError::Parse(format!(
                        "lattice `{}` has unknown extent `{}`",
                        def.user_id, other
                    )))
                }
            };
            let slots = def
                .universes
                .iter()
                .map(|id| intern_universe(id, &mut universes, &mut universe_index))
                .collect();
            universes[idx].lattice = Some(Lattice {
                shape: def.shape,
                pitch: def.pitch,
                origin: def.origin,
                universes: slots,
                extent,
            });
        }

        // Cells resolve their sense lists, fills and materials, then link
        // into their owning universe.
        let mut cells = Vec::with_capacity(cell_defs.len());
        let mut cell_index: HashMap<String, Vec<usize>> = HashMap::new();
        for def in cell_defs {
            let mut senses = Vec::with_capacity(def.senses.len());
            for entry in &def.senses {
                let (sense, name) = match entry.strip_prefix('-') {
                    Some(rest) => (Sense::Negative, rest),
                    None => (Sense::Positive, entry.strip_prefix('+').unwrap_or(entry)),
                };
                let surface =
                    *surface_index
                        .get(name)
                        .ok_or_else(|| HeliosError::ObjectMissing {
                            module: "geometry".to_string(),
                            user_id: name.to_string(),
                        })?;
                senses.push((surface, sense));
            }
            let fill = def
                .fill
                .as_ref()
                .map(|id| universe_index[id.as_str()]);
            let material = match &def.material {
                Some(id) => Some(resolve_material(id).ok_or_else(|| {
                    HeliosError::ObjectMissing {
                        module: "materials".to_string(),
                        user_id: id.clone(),
                    }
                })?),
                None => None,
            };
            let internal_id = cells.len();
            let mut cell = Cell::new(def.user_id.clone(), internal_id, senses, fill, material)?;
            cell.translation = def.translation;

            let owner = universe_index[def.universe.as_str()];
            if universes[owner].lattice.is_some() {
                return Err(HeliosError::Parse(format!(
                    "cell `{}` cannot live in lattice universe `{}`",
                    def.user_id, def.universe
                )));
            }
            universes[owner].cells.push(internal_id);
            cell_index
                .entry(def.user_id.clone())
                .or_default()
                .push(internal_id);
            cells.push(cell);
        }

        // Parent back-references are indices into the frozen cell vector.
        for cell in &cells {
            if let Some(fill) = cell.fill {
                universes[fill].parent_cell = Some(cell.internal_id);
            }
        }

        let root = *universe_index
            .get(ROOT_UNIVERSE)
            .ok_or_else(|| HeliosError::ObjectMissing {
                module: "geometry".to_string(),
                user_id: ROOT_UNIVERSE.to_string(),
            })?;

        let geometry = Geometry {
            surfaces,
            cells,
            universes,
            root,
            surface_index,
            cell_index,
            universe_index,
            surface_tolerance,
            nudge,
        };
        geometry.check_acyclic()?;
        debug!(
            "geometry set up: {} surfaces, {} cells, {} universes",
            geometry.surfaces.len(),
            geometry.cells.len(),
            geometry.universes.len()
        );
        Ok(geometry)
    }

    pub fn root_universe(&self) -> usize {
        self.root
    }

    /// Internal id of a surface by user id.
    pub fn find_surface(&self, user_id: &str) -> Option<usize> {
        self.surface_index.get(user_id).copied()
    }

    /// All cells sharing a user id (repeated pin cells are legal).
    pub fn find_cells(&self, user_id: &str) -> &[usize] {
        self.cell_index
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find_universe(&self, user_id: &str) -> Option<usize> {
        self.universe_index.get(user_id).copied()
    }

    // The directed graph of fill edges must be a tree: walk down from every
    // universe and fail on a repeat visit along the path.
    fn check_acyclic(&self) -> Result<(), HeliosError> {
        fn visit(
            geometry: &Geometry,
            universe: usize,
            path: &mut Vec<usize>,
        ) -> Result<(), HeliosError> {
            if path.contains(&universe) {
                return Err(HeliosError::Parse(format!(
                    "universe `{}` is filled into itself through a cycle",
                    geometry.universes[universe].user_id
                )));
            }
            path.push(universe);
            let mut children: Vec<usize> = Vec::new();
            if let Some(lattice) = &geometry.universes[universe].lattice {
                children.extend(lattice.universes.iter().copied());
            }
            for &cell in &geometry.universes[universe].cells {
                if let Some(fill) = geometry.cells[cell].fill {
                    children.push(fill);
                }
            }
            children.sort_unstable();
            children.dedup();
            for child in children {
                visit(geometry, child, path)?;
            }
            path.pop();
            Ok(())
        }
        let mut path = Vec::new();
        visit(self, self.root, &mut path)
    }

    /// Consistency sweep for overlapping cells: probe points are expressed
    /// in each universe's local coordinates and checked against every
    /// universe.
    pub fn check_overlaps(&self, probes: &[[f64; 3]]) -> Result<(), HeliosError> {
        for universe in &self.universes {
            for &p in probes {
                let hits: Vec<&Cell> = universe
                    .cells
                    .iter()
                    .map(|&c| &self.cells[c])
                    .filter(|c| c.contains(p, &self.surfaces))
                    .collect();
                if hits.len() > 1 {
                    return Err(HeliosError::OverlappingCells {
                        cells: hits.iter().map(|c| c.user_id.clone()).collect(),
                        point: p,
                    });
                }
            }
        }
        Ok(())
    }

    /// Locate a point: recursive descent from the root universe, pushing a
    /// stack level per fill and translating coordinates per lattice tile.
    pub fn locate(
        &self,
        position: [f64; 3],
        direction: [f64; 3],
    ) -> Result<TrackState, HeliosError> {
        let mut levels = Vec::new();
        self.descend(self.root, position, direction, None, &mut levels)?;
        Ok(TrackState { levels })
    }

    fn descend(
        &self,
        universe_id: usize,
        position: [f64; 3],
        direction: [f64; 3],
        site: Option<LatticeSite>,
        levels: &mut Vec<TrackLevel>,
    ) -> Result<(), HeliosError> {
        let universe = &self.universes[universe_id];
        if let Some(lattice) = &universe.lattice {
            let raw = lattice.raw_slot(position);
            let slot = lattice
                .resolve_slot(raw)
                .ok_or(HeliosError::GeometryUnbounded { point: position })?;
            let child = lattice.universe_at(slot);
            let local = sub(position, lattice.tile_translation(raw));
            return self.descend(
                child,
                local,
                direction,
                Some(LatticeSite {
                    lattice: universe_id,
                    slot: raw,
                }),
                levels,
            );
        }

        let cell_id = universe
            .find_cell(position, &self.cells, &self.surfaces)
            .ok_or(HeliosError::GeometryUnbounded { point: position })?;
        levels.push(TrackLevel {
            universe: universe_id,
            cell: cell_id,
            site,
            position,
            direction,
            last_surface: None,
        });

        if let Some(fill) = self.cells[cell_id].fill {
            let local = match self.cells[cell_id].translation {
                Some(t) => sub(position, t),
                None => position,
            };
            return self.descend(fill, local, direction, None, levels);
        }
        Ok(())
    }

    /// Minimum distance to the next boundary over every stack level,
    /// including lattice tile walls.
    pub fn distance_to_boundary(&self, state: &TrackState) -> Option<BoundaryCrossing> {
        let mut best: Option<BoundaryCrossing> = None;
        let mut consider = |candidate: BoundaryCrossing| {
            if best
                .as_ref()
                .map(|b| candidate.distance < b.distance)
                .unwrap_or(true)
            {
                best = Some(candidate);
            }
        };

        for (li, level) in state.levels.iter().enumerate() {
            if let Some((surface, distance)) = self.cells[level.cell].boundary(
                level.position,
                level.direction,
                &self.surfaces,
                level.last_surface,
                self.surface_tolerance,
            ) {
                consider(BoundaryCrossing {
                    distance,
                    kind: CrossingKind::Surface { level: li, surface },
                });
            }

            if let Some(site) = &level.site {
                let lattice = self.universes[site.lattice]
                    .lattice
                    .as_ref()
                    .expect("lattice site points at a lattice universe");
                for axis in 0..3 {
                    let u = level.direction[axis];
                    if u.abs() < 1e-30 {
                        continue;
                    }
                    let half = 0.5 * lattice.pitch[axis];
                    let target = if u > 0.0 { half } else { -half };
                    let distance = (target - level.position[axis]) / u;
                    if distance > 0.0 {
                        consider(BoundaryCrossing {
                            distance,
                            kind: CrossingKind::LatticeWall {
                                level: li,
                                axis,
                                positive: u > 0.0,
                            },
                        });
                    }
                }
            }
        }
        best
    }

    /// Advance every stack level by a distance with no boundary crossing
    /// (a flight ending in a collision inside the current cell).
    pub fn advance(&self, state: &mut TrackState, distance: f64) {
        for level in &mut state.levels {
            level.position = add(level.position, scale(level.direction, distance));
        }
    }

    /// Change the flight direction at every stack level (post-collision).
    /// The crossing-suppression marker is cleared: the new flight may hit
    /// any surface.
    pub fn set_direction(&self, state: &mut TrackState, direction: [f64; 3]) {
        for level in &mut state.levels {
            level.direction = direction;
            level.last_surface = None;
        }
    }

    /// Step across the boundary found by [`Geometry::distance_to_boundary`].
    ///
    /// Every level advances by the crossing distance; the stack is then
    /// updated for an intra-level crossing, a pop into the enclosing
    /// universe, a push into a fill, or a lattice tile transition. A
    /// reflective surface mirrors the direction without leaving the root
    /// universe; a vacuum surface lets the particle escape. The particle is
    /// nudged off the crossed boundary and the boundary is excluded from
    /// immediate re-intersection.
    pub fn cross(
        &self,
        state: &mut TrackState,
        crossing: &BoundaryCrossing,
    ) -> Result<CrossOutcome, HeliosError> {
        for level in &mut state.levels {
            level.position = add(level.position, scale(level.direction, crossing.distance));
        }

        match crossing.kind {
            CrossingKind::Surface { level, surface } => {
                let flags = self.surfaces[surface].flags;
                if flags.vacuum {
                    return Ok(CrossOutcome::Leaked);
                }
                if flags.reflective {
                    return self.reflect(state, level, surface);
                }

                state.levels.truncate(level + 1);
                for lv in &mut state.levels {
                    lv.position = add(lv.position, scale(lv.direction, self.nudge));
                }
                state.levels[level].last_surface = Some(surface);
                self.relocate_up(state, level)?;
                Ok(CrossOutcome::Crossed)
            }
            CrossingKind::LatticeWall {
                level,
                axis,
                positive,
            } => {
                state.levels.truncate(level + 1);
                for lv in &mut state.levels {
                    lv.position = add(lv.position, scale(lv.direction, self.nudge));
                }

                let top = state.levels.pop().expect("crossing level exists");
                let site = top.site.expect("lattice wall crossing has a site");
                let lattice = self.universes[site.lattice]
                    .lattice
                    .as_ref()
                    .expect("lattice site points at a lattice universe");

                let mut raw = site.slot;
                raw[axis] += if positive { 1 } else { -1 };
                match lattice.resolve_slot(raw) {
                    Some(slot) => {
                        // Re-express the local position in the neighbor
                        // tile's frame.
                        let mut position = top.position;
                        position[axis] -= if positive {
                            lattice.pitch[axis]
                        } else {
                            -lattice.pitch[axis]
                        };
                        let child = lattice.universe_at(slot);
                        let mut subs = Vec::new();
                        self.descend(
                            child,
                            position,
                            top.direction,
                            Some(LatticeSite {
                                lattice: site.lattice,
                                slot: raw,
                            }),
                            &mut subs,
                        )?;
                        state.levels.extend(subs);
                        Ok(CrossOutcome::Crossed)
                    }
                    None => {
                        // Bounded lattice edge: exit to the enclosing level.
                        if state.levels.is_empty() {
                            return Err(HeliosError::GeometryUnbounded {
                                point: top.position,
                            });
                        }
                        let li = state.levels.len() - 1;
                        self.relocate_up(state, li)?;
                        Ok(CrossOutcome::Crossed)
                    }
                }
            }
        }
    }

    // Mirror the direction about the surface normal at the crossing point.
    // Position only changes by the nudge; the stack below the crossing
    // level is rebuilt with the new direction.
    fn reflect(
        &self,
        state: &mut TrackState,
        level: usize,
        surface: usize,
    ) -> Result<CrossOutcome, HeliosError> {
        let n = self.surfaces[surface].normal(state.levels[level].position);
        let nn = dot(n, n);
        for lv in &mut state.levels {
            let f = 2.0 * dot(lv.direction, n) / nn;
            lv.direction = sub(lv.direction, scale(n, f));
            lv.position = add(lv.position, scale(lv.direction, self.nudge));
        }
        state.levels.truncate(level + 1);
        state.levels[level].last_surface = Some(surface);

        let current = &state.levels[level];
        let (position, direction) = (current.position, current.direction);
        if let Some(fill) = self.cells[current.cell].fill {
            let local = match self.cells[current.cell].translation {
                Some(t) => sub(position, t),
                None => position,
            };
            let mut subs = Vec::new();
            self.descend(fill, local, direction, None, &mut subs)?;
            state.levels.extend(subs);
        }
        Ok(CrossOutcome::Reflected)
    }

    // Find the cell at the deepest surviving level, popping levels whose
    // universe no longer contains the point, then descend into any fill of
    // the found cell. The root running out of cells is an unbounded
    // geometry.
    fn relocate_up(&self, state: &mut TrackState, start: usize) -> Result<(), HeliosError> {
        let mut li = start;
        loop {
            let lv = &state.levels[li];
            if let Some(cell) =
                self.universes[lv.universe].find_cell(lv.position, &self.cells, &self.surfaces)
            {
                state.levels[li].cell = cell;
                let (position, direction) = (state.levels[li].position, state.levels[li].direction);
                if let Some(fill) = self.cells[cell].fill {
                    let local = match self.cells[cell].translation {
                        Some(t) => sub(position, t),
                        None => position,
                    };
                    let mut subs = Vec::new();
                    self.descend(fill, local, direction, None, &mut subs)?;
                    state.levels.extend(subs);
                }
                return Ok(());
            }
            if li == 0 {
                return Err(HeliosError::GeometryUnbounded {
                    point: state.levels[0].position,
                });
            }
            state.levels.truncate(li);
            li -= 1;
        }
    }
}

#[inline]
fn scale(v: [f64; 3], s: f64) -> [f64; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{CellDef, LatticeDef, SurfaceDef};
    use crate::settings::NUDGE;
    use crate::surface::SURFACE_TOLERANCE;

    fn surface(user_id: &str, kind: &str, coefficients: &[f64]) -> SurfaceDef {
        SurfaceDef {
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            coefficients: coefficients.to_vec(),
            reflective: false,
            vacuum: false,
        }
    }

    fn cell(user_id: &str, universe: &str, senses: &[&str]) -> CellDef {
        CellDef {
            user_id: user_id.to_string(),
            universe: universe.to_string(),
            senses: senses.iter().map(|s| s.to_string()).collect(),
            fill: None,
            translation: None,
            material: None,
        }
    }

    fn no_materials(_: &str) -> Option<usize> {
        None
    }

    /// Two concentric spheres: a core cell and a shell cell.
    fn concentric() -> Geometry {
        Geometry::from_definitions(
            &[surface("inner", "so", &[1.0]), surface("outer", "so", &[2.0])],
            &[
                cell("core", "0", &["-inner"]),
                cell("shell", "0", &["+inner", "-outer"]),
            ],
            &[],
            no_materials,
            SURFACE_TOLERANCE,
            NUDGE,
        )
        .unwrap()
    }

    #[test]
    fn test_internal_ids_are_dense() {
        let g = concentric();
        assert_eq!(g.surfaces[0].internal_id, 0);
        assert_eq!(g.surfaces[1].internal_id, 1);
        assert_eq!(g.cells[0].internal_id, 0);
        assert_eq!(g.find_surface("outer"), Some(1));
        assert_eq!(g.find_cells("shell"), &[1]);
        assert_eq!(g.find_cells("nope"), &[] as &[usize]);
    }

    #[test]
    fn test_locate_simple() {
        let g = concentric();
        let state = g.locate([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]).unwrap();
        assert_eq!(state.levels.len(), 1);
        assert_eq!(g.cells[state.cell()].user_id, "core");

        let state = g.locate([1.5, 0.0, 0.0], [0.0, 0.0, 1.0]).unwrap();
        assert_eq!(g.cells[state.cell()].user_id, "shell");
    }

    #[test]
    fn test_locate_unbounded() {
        let g = concentric();
        let err = g.locate([5.0, 0.0, 0.0], [0.0, 0.0, 1.0]).unwrap_err();
        assert!(matches!(err, HeliosError::GeometryUnbounded { .. }));
    }

    #[test]
    fn test_distance_and_cross_intra_level() {
        let g = concentric();
        let mut state = g.locate([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        let crossing = g.distance_to_boundary(&state).unwrap();
        assert!((crossing.distance - 1.0).abs() < 1e-9);
        let outcome = g.cross(&mut state, &crossing).unwrap();
        assert_eq!(outcome, CrossOutcome::Crossed);
        assert_eq!(g.cells[state.cell()].user_id, "shell");

        // Step 2 of the walk is strictly positive and crosses the outer
        // sphere next.
        let next = g.distance_to_boundary(&state).unwrap();
        assert!(next.distance > 0.0);
        assert!((state.world_position()[0] + next.distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_vacuum_leak() {
        let g = Geometry::from_definitions(
            &[SurfaceDef {
                user_id: "outer".into(),
                kind: "so".into(),
                coefficients: vec![2.0],
                reflective: false,
                vacuum: true,
            }],
            &[cell("world", "0", &["-outer"])],
            &[],
            no_materials,
            SURFACE_TOLERANCE,
            NUDGE,
        )
        .unwrap();
        let mut state = g.locate([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        let crossing = g.distance_to_boundary(&state).unwrap();
        assert_eq!(g.cross(&mut state, &crossing).unwrap(), CrossOutcome::Leaked);
    }

    #[test]
    fn test_reflective_boundary() {
        // Reflective pz plane at z = 0, world above it inside a vacuum
        // sphere.
        let g = Geometry::from_definitions(
            &[
                SurfaceDef {
                    user_id: "mirror".into(),
                    kind: "pz".into(),
                    coefficients: vec![0.0],
                    reflective: true,
                    vacuum: false,
                },
                SurfaceDef {
                    user_id: "outer".into(),
                    kind: "so".into(),
                    coefficients: vec![10.0],
                    reflective: false,
                    vacuum: true,
                },
            ],
            &[cell("world", "0", &["+mirror", "-outer"])],
            &[],
            no_materials,
            SURFACE_TOLERANCE,
            NUDGE,
        )
        .unwrap();

        let s3 = 3.0_f64.sqrt();
        let d0 = [1.0 / s3, 1.0 / s3, -1.0 / s3];
        let mut state = g.locate([0.0, 0.0, 1e-3], d0).unwrap();
        let crossing = g.distance_to_boundary(&state).unwrap();
        let outcome = g.cross(&mut state, &crossing).unwrap();
        assert_eq!(outcome, CrossOutcome::Reflected);

        let d = state.direction();
        assert!((d[0] - 1.0 / s3).abs() < 1e-12);
        assert!((d[1] - 1.0 / s3).abs() < 1e-12);
        assert!((d[2] - 1.0 / s3).abs() < 1e-12);
        // Speed preserved to machine epsilon
        assert!((crate::surface::norm(d) - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_nested_universe_push_and_pop() {
        // A pin universe (fuel rod inside moderator) filling a box-like
        // region of the root universe.
        let g = Geometry::from_definitions(
            &[
                surface("rod", "c/z", &[0.5, 0.0, 0.0]),
                surface("box", "so", &[4.0]),
                surface("outer", "so", &[8.0]),
            ],
            &[
                cell("fuel", "pin", &["-rod"]),
                cell("water", "pin", &["+rod"]),
                CellDef {
                    user_id: "holder".into(),
                    universe: "0".into(),
                    senses: vec!["-box".into()],
                    fill: Some("pin".into()),
                    translation: None,
                    material: None,
                },
                cell("void", "0", &["+box", "-outer"]),
            ],
            &[],
            no_materials,
            SURFACE_TOLERANCE,
            NUDGE,
        )
        .unwrap();

        // Locate inside the rod: two levels deep
        let mut state = g.locate([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        assert_eq!(state.levels.len(), 2);
        assert_eq!(g.cells[state.cell()].user_id, "fuel");
        assert_eq!(
            g.universes[state.levels[0].universe].parent_cell, None
        );
        assert_eq!(
            g.universes[state.current().universe].parent_cell,
            Some(g.find_cells("holder")[0])
        );

        // Rod wall at 0.5
        let crossing = g.distance_to_boundary(&state).unwrap();
        assert!((crossing.distance - 0.5).abs() < 1e-9);
        g.cross(&mut state, &crossing).unwrap();
        assert_eq!(g.cells[state.cell()].user_id, "water");

        // Next crossing pops back to the root-level void cell
        let crossing = g.distance_to_boundary(&state).unwrap();
        assert!((state.world_position()[0] + crossing.distance - 4.0).abs() < 1e-6);
        g.cross(&mut state, &crossing).unwrap();
        assert_eq!(state.levels.len(), 1);
        assert_eq!(g.cells[state.cell()].user_id, "void");
    }

    #[test]
    fn test_fill_translation() {
        // The pin universe is centered in its tile; the holder shifts it to
        // x = 2.
        let g = Geometry::from_definitions(
            &[
                surface("rod", "c/z", &[0.5, 0.0, 0.0]),
                surface("outer", "so", &[8.0]),
            ],
            &[
                cell("fuel", "pin", &["-rod"]),
                cell("water", "pin", &["+rod"]),
                CellDef {
                    user_id: "holder".into(),
                    universe: "0".into(),
                    senses: vec!["-outer".into()],
                    fill: Some("pin".into()),
                    translation: Some([2.0, 0.0, 0.0]),
                    material: None,
                },
            ],
            &[],
            no_materials,
            SURFACE_TOLERANCE,
            NUDGE,
        )
        .unwrap();

        let state = g.locate([2.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        assert_eq!(g.cells[state.cell()].user_id, "fuel");
        // Local coordinates are shifted by the translation
        assert!((state.current().position[0]).abs() < 1e-12);

        let state = g.locate([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        assert_eq!(g.cells[state.cell()].user_id, "water");
    }

    fn lattice_geometry(extent: &str) -> Geometry {
        // 2x2 lattice of pin universes inside a spherical container.
        Geometry::from_definitions(
            &[
                surface("rod", "c/z", &[0.4, 0.0, 0.0]),
                surface("outer", "so", &[20.0]),
            ],
            &[
                cell("fuel", "pin", &["-rod"]),
                cell("water", "pin", &["+rod"]),
                CellDef {
                    user_id: "core".into(),
                    universe: "0".into(),
                    senses: vec!["-outer".into()],
                    fill: Some("grid".into()),
                    translation: None,
                    material: None,
                },
            ],
            &[LatticeDef {
                user_id: "grid".into(),
                shape: [2, 2, 1],
                pitch: [2.0, 2.0, 40.0],
                origin: [-2.0, -2.0, -20.0],
                universes: vec!["pin".into(); 4],
                extent: extent.to_string(),
            }],
            no_materials,
            SURFACE_TOLERANCE,
            NUDGE,
        )
        .unwrap()
    }

    #[test]
    fn test_lattice_locate_descends_into_tile() {
        let g = lattice_geometry("infinite");
        // (-1, -1) is the center of tile (0, 0): inside the rod
        let state = g.locate([-1.0, -1.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        assert_eq!(g.cells[state.cell()].user_id, "fuel");
        let site = state.current().site.clone().unwrap();
        assert_eq!(site.slot, [0, 0, 0]);

        // Tile-centered local coordinates
        assert!(crate::surface::norm(state.current().position) < 1e-12);
    }

    #[test]
    fn test_lattice_wall_transition() {
        let g = lattice_geometry("infinite");
        let mut state = g.locate([-1.0, -1.0, 0.0], [1.0, 0.0, 0.0]).unwrap();

        // Rod wall first
        let crossing = g.distance_to_boundary(&state).unwrap();
        assert!((crossing.distance - 0.4).abs() < 1e-9);
        g.cross(&mut state, &crossing).unwrap();
        assert_eq!(g.cells[state.cell()].user_id, "water");

        // Then the tile wall at local x = +1
        let crossing = g.distance_to_boundary(&state).unwrap();
        assert!(matches!(
            crossing.kind,
            CrossingKind::LatticeWall {
                axis: 0,
                positive: true,
                ..
            }
        ));
        g.cross(&mut state, &crossing).unwrap();
        let site = state.current().site.clone().unwrap();
        assert_eq!(site.slot, [1, 0, 0]);
        assert_eq!(g.cells[state.cell()].user_id, "water");
        // Local x sits just inside the neighbor tile's low wall
        assert!(state.current().position[0] + 1.0 < 1e-6);
    }

    #[test]
    fn test_lattice_infinite_wraps_past_edge() {
        let g = lattice_geometry("infinite");
        // Start in tile (1, 0) heading +x; crossing the wall wraps to slot
        // index 2, which resolves to tile (0, 0) periodically.
        let mut state = g.locate([1.0, -1.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        let mut crossing = g.distance_to_boundary(&state).unwrap();
        // Skip the rod wall if it comes first
        while !matches!(crossing.kind, CrossingKind::LatticeWall { .. }) {
            g.cross(&mut state, &crossing).unwrap();
            crossing = g.distance_to_boundary(&state).unwrap();
        }
        g.cross(&mut state, &crossing).unwrap();
        let site = state.current().site.clone().unwrap();
        assert_eq!(site.slot, [2, 0, 0]);
    }

    #[test]
    fn test_lattice_bounded_edge_loses_particle() {
        // Crossing the outer wall of a bounded lattice pops to the core
        // fill cell; the core still maps the point into the (out of range)
        // lattice, so relocation reports the particle as lost. The history
        // records the failure and the run continues.
        let g = lattice_geometry("bounded");
        let mut state = g.locate([1.0, -1.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        loop {
            let crossing = g.distance_to_boundary(&state).unwrap();
            let at_edge = matches!(
                crossing.kind,
                CrossingKind::LatticeWall {
                    axis: 0,
                    positive: true,
                    ..
                }
            ) && state.current().site.as_ref().unwrap().slot[0] == 1;
            let result = g.cross(&mut state, &crossing);
            if at_edge {
                assert!(matches!(
                    result,
                    Err(HeliosError::GeometryUnbounded { .. })
                ));
                break;
            }
            result.unwrap();
        }
    }

    #[test]
    fn test_fill_cycle_detected() {
        let err = Geometry::from_definitions(
            &[surface("s", "so", &[1.0])],
            &[
                CellDef {
                    user_id: "a".into(),
                    universe: "0".into(),
                    senses: vec!["-s".into()],
                    fill: Some("u1".into()),
                    translation: None,
                    material: None,
                },
                CellDef {
                    user_id: "b".into(),
                    universe: "u1".into(),
                    senses: vec!["-s".into()],
                    fill: Some("0".into()),
                    translation: None,
                    material: None,
                },
            ],
            &[],
            no_materials,
            SURFACE_TOLERANCE,
            NUDGE,
        )
        .unwrap_err();
        assert!(matches!(err, HeliosError::Parse(_)));
    }

    #[test]
    fn test_unknown_surface_reference() {
        let err = Geometry::from_definitions(
            &[],
            &[cell("c", "0", &["-ghost"])],
            &[],
            no_materials,
            SURFACE_TOLERANCE,
            NUDGE,
        )
        .unwrap_err();
        assert_eq!(
            err,
            HeliosError::ObjectMissing {
                module: "geometry".into(),
                user_id: "ghost".into()
            }
        );
    }

    #[test]
    fn test_missing_material_reference() {
        let err = Geometry::from_definitions(
            &[surface("s", "so", &[1.0])],
            &[CellDef {
                user_id: "c".into(),
                universe: "0".into(),
                senses: vec!["-s".into()],
                fill: None,
                translation: None,
                material: Some("fuel".into()),
            }],
            &[],
            no_materials,
            SURFACE_TOLERANCE,
            NUDGE,
        )
        .unwrap_err();
        assert_eq!(
            err,
            HeliosError::ObjectMissing {
                module: "materials".into(),
                user_id: "fuel".into()
            }
        );
    }

    #[test]
    fn test_overlap_sweep() {
        let g = Geometry::from_definitions(
            &[surface("a", "so", &[2.0]), surface("b", "so", &[3.0])],
            &[cell("one", "0", &["-a"]), cell("two", "0", &["-b"])],
            &[],
            no_materials,
            SURFACE_TOLERANCE,
            NUDGE,
        )
        .unwrap();
        let err = g.check_overlaps(&[[0.0, 0.0, 0.0]]).unwrap_err();
        match err {
            HeliosError::OverlappingCells { cells, .. } => {
                assert_eq!(cells, vec!["one".to_string(), "two".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        // A probe outside both cells passes
        assert!(g.check_overlaps(&[[2.5, 0.0, 0.0]]).is_ok());
    }

    #[test]
    fn test_step_property_across_boundary() {
        // After any positive-distance crossing the next distance is again
        // strictly positive.
        let g = concentric();
        let mut state = g.locate([0.2, 0.1, -0.3], [0.0, 1.0, 0.0]).unwrap();
        for _ in 0..2 {
            let crossing = g.distance_to_boundary(&state).unwrap();
            assert!(crossing.distance > 0.0);
            match g.cross(&mut state, &crossing).unwrap() {
                CrossOutcome::Crossed | CrossOutcome::Reflected => {}
                CrossOutcome::Leaked => break,
            }
        }
    }
}
