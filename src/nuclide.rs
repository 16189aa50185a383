use crate::ace::{AceTable, Block, BlockType};
use crate::error::HeliosError;
use crate::utilities::interpolate_log_linear;

/// ENDF/MT number for the total cross section lookup.
pub const MT_TOTAL: i64 = 1;
/// Elastic scattering.
pub const MT_ELASTIC: i64 = 2;
/// Lumped absorption as carried on the principal grid.
pub const MT_ABSORPTION: i64 = 27;

/// One reaction channel carved out of the SIG block: the threshold index
/// offsets the channel's cross sections on the main energy grid.
#[derive(Clone, Debug)]
pub struct NuclideReaction {
    pub mt: i64,
    /// 1-based index into the main grid where the channel opens.
    pub threshold: usize,
    pub cross_section: Vec<f64>,
}

/// Microscopic cross-section data for one nuclide, built from an ACE table.
///
/// The principal grid (ESZ block) carries energy, total, absorption and
/// elastic; additional channels come from the SIG block. Lookups are
/// log-linear on the energy grid.
#[derive(Clone, Debug)]
pub struct Nuclide {
    pub zaid: String,
    pub internal_id: usize,
    pub awr: f64,
    pub temperature: f64,
    pub energy: Vec<f64>,
    pub total: Vec<f64>,
    pub absorption: Vec<f64>,
    pub elastic: Vec<f64>,
    pub reactions: Vec<NuclideReaction>,
}

impl Nuclide {
    /// Build a nuclide from its ACE table. The principal cross-section
    /// block is required; the reaction block is optional.
    pub fn from_ace(table: &AceTable, internal_id: usize) -> Result<Self, HeliosError> {
        let esz = match table.block(BlockType::Esz) {
            Some(Block::Esz(esz)) => esz,
            _ => {
                return Err(HeliosError::ace(
                    0,
                    format!("table `{}` has no principal cross-section block", table.zaid),
                ))
            }
        };
        let mut reactions = Vec::new();
        if let Some(Block::Sig(sig)) = table.block(BlockType::Sig) {
            for r in &sig.reactions {
                let start = r.threshold.saturating_sub(1);
                if start + r.cross_section.len() > esz.energy.len() {
                    return Err(HeliosError::ace(
                        0,
                        format!(
                            "table `{}`: MT {} channel runs past the energy grid",
                            table.zaid, r.mt
                        ),
                    ));
                }
                reactions.push(NuclideReaction {
                    mt: r.mt,
                    threshold: r.threshold,
                    cross_section: r.cross_section.clone(),
                });
            }
        }
        Ok(Nuclide {
            zaid: table.zaid.clone(),
            internal_id,
            awr: table.awr,
            temperature: table.temperature,
            energy: esz.energy.clone(),
            total: esz.total.clone(),
            absorption: esz.absorption.clone(),
            elastic: esz.elastic.clone(),
            reactions,
        })
    }

    /// Microscopic cross section in barns for a reaction at an energy.
    ///
    /// MT 1, 2 and 27 read the principal grid; other MT numbers search the
    /// reaction channels (zero below threshold or for unknown channels).
    pub fn microscopic_xs(&self, mt: i64, energy: f64) -> f64 {
        match mt {
            MT_TOTAL => interpolate_log_linear(&self.energy, &self.total, energy),
            MT_ELASTIC => interpolate_log_linear(&self.energy, &self.elastic, energy),
            MT_ABSORPTION => interpolate_log_linear(&self.energy, &self.absorption, energy),
            _ => self
                .reactions
                .iter()
                .find(|r| r.mt == mt)
                .map(|r| self.channel_xs(r, energy))
                .unwrap_or(0.0),
        }
    }

    // A channel's grid is the tail of the main grid starting at its
    // threshold index.
    fn channel_xs(&self, reaction: &NuclideReaction, energy: f64) -> f64 {
        let start = reaction.threshold.saturating_sub(1);
        let grid = &self.energy[start..start + reaction.cross_section.len()];
        if energy < grid[0] {
            return 0.0;
        }
        interpolate_log_linear(grid, &reaction.cross_section, energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ace::{EszBlock, SigBlock, SigReaction};
    use crate::ace::{JXS_SIZE, NXS_SIZE};

    fn table() -> AceTable {
        let esz = EszBlock {
            energy: vec![1.0, 10.0, 100.0, 1000.0],
            total: vec![20.0, 10.0, 5.0, 2.0],
            absorption: vec![15.0, 6.0, 2.0, 0.5],
            elastic: vec![5.0, 4.0, 3.0, 1.5],
            heating: vec![0.0, 0.0, 0.0, 0.0],
        };
        let sig = SigBlock {
            reactions: vec![SigReaction {
                mt: 102,
                // Opens at the second grid point
                threshold: 2,
                cross_section: vec![6.0, 2.0, 0.5],
            }],
        };
        let mut table = AceTable {
            zaid: "5010.70c".to_string(),
            awr: 9.9269,
            temperature: 2.5301e-8,
            date: "today".to_string(),
            comment: String::new(),
            source_info: "mat525".to_string(),
            nxs: [0; NXS_SIZE],
            jxs: [0; JXS_SIZE],
            blocks: vec![Block::Esz(esz), Block::Sig(sig)],
        };
        table.update_pointers();
        table
    }

    #[test]
    fn test_from_ace() {
        let nuclide = Nuclide::from_ace(&table(), 0).unwrap();
        assert_eq!(nuclide.zaid, "5010.70c");
        assert_eq!(nuclide.energy.len(), 4);
        assert_eq!(nuclide.reactions.len(), 1);
    }

    #[test]
    fn test_total_lookup_at_grid_points() {
        let nuclide = Nuclide::from_ace(&table(), 0).unwrap();
        assert!((nuclide.microscopic_xs(MT_TOTAL, 1.0) - 20.0).abs() < 1e-12);
        assert!((nuclide.microscopic_xs(MT_TOTAL, 100.0) - 5.0).abs() < 1e-12);
        // Clamped outside the grid
        assert!((nuclide.microscopic_xs(MT_TOTAL, 1e6) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_log_linear_between_points() {
        let nuclide = Nuclide::from_ace(&table(), 0).unwrap();
        // Halfway in ln(E) between 1 and 10
        let mid = 10.0_f64.sqrt();
        let xs = nuclide.microscopic_xs(MT_TOTAL, mid);
        assert!((xs - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_channel_threshold() {
        let nuclide = Nuclide::from_ace(&table(), 0).unwrap();
        // Below the channel threshold the cross section vanishes
        assert_eq!(nuclide.microscopic_xs(102, 1.0), 0.0);
        assert!((nuclide.microscopic_xs(102, 10.0) - 6.0).abs() < 1e-12);
        assert!((nuclide.microscopic_xs(102, 1000.0) - 0.5).abs() < 1e-12);
        // Unknown channel
        assert_eq!(nuclide.microscopic_xs(444, 10.0), 0.0);
    }

    #[test]
    fn test_missing_esz_rejected() {
        let mut bad = table();
        bad.blocks.retain(|b| b.block_type() != BlockType::Esz);
        bad.update_pointers();
        assert!(Nuclide::from_ace(&bad, 0).is_err());
    }
}
