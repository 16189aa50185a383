use crate::cell::Cell;
use crate::surface::Surface;

/// User id of the root universe.
pub const ROOT_UNIVERSE: &str = "0";

/// A container of cells meant to tile a region of space.
///
/// Universes nest through cell fills; the parent back-reference is an index
/// into the setup-frozen cell vector, never an owning link. A lattice
/// universe carries no cells of its own and instead tiles a grid of child
/// universes.
#[derive(Clone, Debug)]
pub struct Universe {
    pub user_id: String,
    pub internal_id: usize,
    /// Cell internal ids, in input order.
    pub cells: Vec<usize>,
    /// The fill cell this universe hangs below; None for the root.
    pub parent_cell: Option<usize>,
    pub lattice: Option<Lattice>,
}

impl Universe {
    pub fn new(user_id: impl Into<String>, internal_id: usize) -> Self {
        Universe {
            user_id: user_id.into(),
            internal_id,
            cells: Vec::new(),
            parent_cell: None,
            lattice: None,
        }
    }

    /// First cell of this universe containing the point, or None. A None
    /// answer at the root is an unbounded-geometry user error; inside a
    /// lattice tile it means the point belongs to a neighboring tile.
    pub fn find_cell(&self, p: [f64; 3], cells: &[Cell], surfaces: &[Surface]) -> Option<usize> {
        self.cells
            .iter()
            .copied()
            .find(|&c| cells[c].contains(p, surfaces))
    }
}

/// Out-of-range policy for lattice slot lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatticeExtent {
    /// Out-of-range slots exit to the enclosing level.
    Bounded,
    /// Slot indices wrap periodically.
    Infinite,
}

/// A regular grid of universe slots.
///
/// `shape` holds the slot counts per dimension (1 for unused dimensions),
/// `origin` the lower corner of slot (0, 0, 0), and `universes` the slot
/// contents in row-major order (x fastest). Local coordinates inside a tile
/// are tile-centered.
#[derive(Clone, Debug)]
pub struct Lattice {
    pub shape: [usize; 3],
    pub pitch: [f64; 3],
    pub origin: [f64; 3],
    pub universes: Vec<usize>,
    pub extent: LatticeExtent,
}

impl Lattice {
    /// Raw (unwrapped) slot indices of a point: floor((p - origin) / pitch)
    /// per dimension.
    pub fn raw_slot(&self, p: [f64; 3]) -> [i64; 3] {
        let mut slot = [0i64; 3];
        for i in 0..3 {
            slot[i] = ((p[i] - self.origin[i]) / self.pitch[i]).floor() as i64;
        }
        slot
    }

    /// Apply the extent policy to raw indices. Bounded lattices answer None
    /// out of range; infinite lattices wrap.
    pub fn resolve_slot(&self, raw: [i64; 3]) -> Option<[usize; 3]> {
        let mut slot = [0usize; 3];
        for i in 0..3 {
            let n = self.shape[i] as i64;
            let idx = match self.extent {
                LatticeExtent::Bounded => {
                    if raw[i] < 0 || raw[i] >= n {
                        return None;
                    }
                    raw[i]
                }
                LatticeExtent::Infinite => raw[i].rem_euclid(n),
            };
            slot[i] = idx as usize;
        }
        Some(slot)
    }

    /// Universe internal id occupying a slot.
    pub fn universe_at(&self, slot: [usize; 3]) -> usize {
        let idx = slot[0] + self.shape[0] * (slot[1] + self.shape[1] * slot[2]);
        self.universes[idx]
    }

    /// World translation from lattice coordinates to the center of the tile
    /// holding the given raw indices. Local coordinates are p minus this.
    pub fn tile_translation(&self, raw: [i64; 3]) -> [f64; 3] {
        let mut t = [0.0; 3];
        for i in 0..3 {
            t[i] = self.origin[i] + (raw[i] as f64 + 0.5) * self.pitch[i];
        }
        t
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.shape[0] * self.shape[1] * self.shape[2]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
