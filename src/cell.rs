use crate::error::HeliosError;
use crate::surface::{Sense, Surface, SURFACE_TOLERANCE};

/// A region defined as the conjunction of surface half-spaces.
///
/// Each entry of the sense list pairs a surface internal id with the side of
/// that surface the cell occupies. A point is inside the cell iff every
/// entry matches. A cell is either filled with another universe or carries a
/// material; void cells carry neither.
#[derive(Clone, Debug)]
pub struct Cell {
    pub user_id: String,
    pub internal_id: usize,
    /// (surface internal id, required sense), in input order.
    pub senses: Vec<(usize, Sense)>,
    /// Universe internal id this cell is filled with.
    pub fill: Option<usize>,
    /// Translation applied when descending into the fill universe.
    pub translation: Option<[f64; 3]>,
    /// Material internal id.
    pub material: Option<usize>,
}

impl Cell {
    pub fn new(
        user_id: impl Into<String>,
        internal_id: usize,
        senses: Vec<(usize, Sense)>,
        fill: Option<usize>,
        material: Option<usize>,
    ) -> Result<Self, HeliosError> {
        let user_id = user_id.into();
        if fill.is_some() && material.is_some() {
            return Err(HeliosError::Parse(format!(
                "cell `{}` has both a fill and a material",
                user_id
            )));
        }
        Ok(Cell {
            user_id,
            internal_id,
            senses,
            fill,
            translation: None,
            material,
        })
    }

    /// A cell with neither fill nor material.
    pub fn is_void(&self) -> bool {
        self.fill.is_none() && self.material.is_none()
    }

    /// Check the sense list against a point; the first mismatch returns
    /// false.
    pub fn contains(&self, p: [f64; 3], surfaces: &[Surface]) -> bool {
        self.senses
            .iter()
            .all(|&(surface, sense)| surfaces[surface].sense(p) == sense)
    }

    /// The stored sense of this cell with respect to a surface. Never
    /// recomputed from the surface function at runtime.
    pub fn sense(&self, surface: usize) -> Option<Sense> {
        self.senses
            .iter()
            .find(|&&(s, _)| s == surface)
            .map(|&(_, sense)| sense)
    }

    /// Distance to the nearest bounding surface along a direction.
    ///
    /// Queries every surface on the sense list with the stored sense and
    /// returns the minimum positive distance together with the surface
    /// producing it. `skip` names the last-crossed surface: it is excluded
    /// only while the point still sits within tolerance of it, so a genuine
    /// later re-entry of the same surface is kept. Distance ties break on
    /// the lexicographically earlier surface user id.
    pub fn boundary(
        &self,
        p: [f64; 3],
        d: [f64; 3],
        surfaces: &[Surface],
        skip: Option<usize>,
        tolerance: f64,
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for &(surface, sense) in &self.senses {
            if skip == Some(surface) && surfaces[surface].function(p).abs() < tolerance {
                continue;
            }
            let Some(dist) = surfaces[surface].intersect_with_tolerance(p, d, sense, tolerance)
            else {
                continue;
            };
            best = match best {
                None => Some((surface, dist)),
                Some((s0, d0)) => {
                    if dist < d0
                        || (dist == d0 && surfaces[surface].user_id < surfaces[s0].user_id)
                    {
                        Some((surface, dist))
                    } else {
                        Some((s0, d0))
                    }
                }
            };
        }
        best
    }
}
