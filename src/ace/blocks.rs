use crate::ace::cursor::XssCursor;
use crate::error::HeliosError;

use super::{JXS_SIZE, NXS_SIZE};

/// Block types with their fixed JXS slots.
///
/// One slot convention covers every table kind; a zero entry in JXS marks
/// the block as absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlockType {
    /// Principal cross sections on the main energy grid.
    Esz,
    /// Fission neutron multiplicity.
    Nu,
    /// Reaction cross sections by MT number.
    Sig,
    /// Equiprobable-bin angular distributions.
    Ang,
    /// Outgoing-energy law data.
    Dlw,
    /// Thermal incoherent inelastic incident-energy grid.
    Itie,
    /// Thermal inelastic outgoing energy/angle grids.
    Itix,
    /// Thermal elastic incident-energy grid.
    Itce,
}

impl BlockType {
    /// Fixed JXS slot of the block.
    pub fn jxs_slot(self) -> usize {
        match self {
            BlockType::Esz => 0,
            BlockType::Nu => 1,
            BlockType::Sig => 2,
            BlockType::Ang => 3,
            BlockType::Dlw => 4,
            BlockType::Itie => 5,
            BlockType::Itix => 6,
            BlockType::Itce => 7,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            BlockType::Esz => "ESZ",
            BlockType::Nu => "NU",
            BlockType::Sig => "SIG",
            BlockType::Ang => "ANG",
            BlockType::Dlw => "DLW",
            BlockType::Itie => "ITIE",
            BlockType::Itix => "ITIX",
            BlockType::Itce => "ITCE",
        }
    }

    /// Every known block type, in slot order.
    pub fn all() -> [BlockType; 8] {
        [
            BlockType::Esz,
            BlockType::Nu,
            BlockType::Sig,
            BlockType::Ang,
            BlockType::Dlw,
            BlockType::Itie,
            BlockType::Itix,
            BlockType::Itce,
        ]
    }
}

/// A typed, deserialized ACE block. Every block owns copies of its fields;
/// the XSS payload is not referenced after construction. `size()` in words
/// always equals the number of values `dump` emits.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Esz(EszBlock),
    Nu(NuBlock),
    Sig(SigBlock),
    Ang(AngBlock),
    Dlw(DlwBlock),
    Itie(ItieBlock),
    Itix(ItixBlock),
    Itce(ItceBlock),
}

impl Block {
    /// Parse the block of the given type out of a table's XSS payload.
    pub fn parse(
        block_type: BlockType,
        nxs: &[i64; NXS_SIZE],
        jxs: &[i64; JXS_SIZE],
        xss: &[f64],
    ) -> Result<Block, HeliosError> {
        let mut cursor = XssCursor::new(xss);
        cursor.seek(jxs[block_type.jxs_slot()])?;
        match block_type {
            BlockType::Esz => EszBlock::parse(nxs, &mut cursor).map(Block::Esz),
            BlockType::Nu => NuBlock::parse(&mut cursor).map(Block::Nu),
            BlockType::Sig => SigBlock::parse(&mut cursor).map(Block::Sig),
            BlockType::Ang => AngBlock::parse(&mut cursor).map(Block::Ang),
            BlockType::Dlw => DlwBlock::parse(&mut cursor).map(Block::Dlw),
            BlockType::Itie => ItieBlock::parse(&mut cursor).map(Block::Itie),
            BlockType::Itix => ItixBlock::parse(&mut cursor).map(Block::Itix),
            BlockType::Itce => ItceBlock::parse(&mut cursor).map(Block::Itce),
        }
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            Block::Esz(_) => BlockType::Esz,
            Block::Nu(_) => BlockType::Nu,
            Block::Sig(_) => BlockType::Sig,
            Block::Ang(_) => BlockType::Ang,
            Block::Dlw(_) => BlockType::Dlw,
            Block::Itie(_) => BlockType::Itie,
            Block::Itix(_) => BlockType::Itix,
            Block::Itce(_) => BlockType::Itce,
        }
    }

    /// Append the block's words to a payload under construction.
    pub fn dump(&self, xss: &mut Vec<f64>) {
        match self {
            Block::Esz(b) => b.dump(xss),
            Block::Nu(b) => b.dump(xss),
            Block::Sig(b) => b.dump(xss),
            Block::Ang(b) => b.dump(xss),
            Block::Dlw(b) => b.dump(xss),
            Block::Itie(b) => b.dump(xss),
            Block::Itix(b) => b.dump(xss),
            Block::Itce(b) => b.dump(xss),
        }
    }

    /// Size in words, equal to the number of values `dump` emits.
    pub fn size(&self) -> usize {
        match self {
            Block::Esz(b) => b.size(),
            Block::Nu(b) => b.size(),
            Block::Sig(b) => b.size(),
            Block::Ang(b) => b.size(),
            Block::Dlw(b) => b.size(),
            Block::Itie(b) => b.size(),
            Block::Itix(b) => b.size(),
            Block::Itce(b) => b.size(),
        }
    }
}

/// Principal cross sections: five parallel arrays on the main energy grid.
/// The grid length comes from NXS(3), not from the payload.
#[derive(Clone, Debug, PartialEq)]
pub struct EszBlock {
    pub energy: Vec<f64>,
    pub total: Vec<f64>,
    pub absorption: Vec<f64>,
    pub elastic: Vec<f64>,
    pub heating: Vec<f64>,
}

impl EszBlock {
    fn parse(nxs: &[i64; NXS_SIZE], cursor: &mut XssCursor) -> Result<Self, HeliosError> {
        let nes = usize::try_from(nxs[2])
            .map_err(|_| HeliosError::ace(cursor.offset(), "negative energy grid length in NXS"))?;
        Ok(EszBlock {
            energy: cursor.get_vec(nes)?,
            total: cursor.get_vec(nes)?,
            absorption: cursor.get_vec(nes)?,
            elastic: cursor.get_vec(nes)?,
            heating: cursor.get_vec(nes)?,
        })
    }

    fn dump(&self, xss: &mut Vec<f64>) {
        xss.extend_from_slice(&self.energy);
        xss.extend_from_slice(&self.total);
        xss.extend_from_slice(&self.absorption);
        xss.extend_from_slice(&self.elastic);
        xss.extend_from_slice(&self.heating);
    }

    pub fn size(&self) -> usize {
        5 * self.energy.len()
    }
}

/// Fission multiplicity, either a polynomial in energy or a tabulated
/// nu-bar. The leading flag word (LNU) selects the form.
#[derive(Clone, Debug, PartialEq)]
pub enum NuBlock {
    Polynomial { coefficients: Vec<f64> },
    Tabulated { energy: Vec<f64>, nu: Vec<f64> },
}

impl NuBlock {
    fn parse(cursor: &mut XssCursor) -> Result<Self, HeliosError> {
        let flag_offset = cursor.offset();
        match cursor.get_int()? {
            1 => {
                let nc = cursor.get_count()?;
                Ok(NuBlock::Polynomial {
                    coefficients: cursor.get_vec(nc)?,
                })
            }
            2 => {
                let ne = cursor.get_count()?;
                Ok(NuBlock::Tabulated {
                    energy: cursor.get_vec(ne)?,
                    nu: cursor.get_vec(ne)?,
                })
            }
            other => Err(HeliosError::ace(
                flag_offset,
                format!("unknown NU form flag {}", other),
            )),
        }
    }

    fn dump(&self, xss: &mut Vec<f64>) {
        match self {
            NuBlock::Polynomial { coefficients } => {
                xss.push(1.0);
                xss.push(coefficients.len() as f64);
                xss.extend_from_slice(coefficients);
            }
            NuBlock::Tabulated { energy, nu } => {
                xss.push(2.0);
                xss.push(energy.len() as f64);
                xss.extend_from_slice(energy);
                xss.extend_from_slice(nu);
            }
        }
    }

    pub fn size(&self) -> usize {
        match self {
            NuBlock::Polynomial { coefficients } => 2 + coefficients.len(),
            NuBlock::Tabulated { energy, .. } => 2 + 2 * energy.len(),
        }
    }
}

/// One reaction channel within the SIG block: MT number, threshold index
/// into the main grid (1-based), and the cross sections from there on.
#[derive(Clone, Debug, PartialEq)]
pub struct SigReaction {
    pub mt: i64,
    pub threshold: usize,
    pub cross_section: Vec<f64>,
}

/// Reaction cross sections: a reaction count, then per reaction the MT
/// number, the threshold index, the value count and the values.
#[derive(Clone, Debug, PartialEq)]
pub struct SigBlock {
    pub reactions: Vec<SigReaction>,
}

impl SigBlock {
    fn parse(cursor: &mut XssCursor) -> Result<Self, HeliosError> {
        let nmt = cursor.get_count()?;
        let mut reactions = Vec::with_capacity(nmt);
        for _ in 0..nmt {
            let mt = cursor.get_int()?;
            let threshold = cursor.get_count()?;
            let ne = cursor.get_count()?;
            reactions.push(SigReaction {
                mt,
                threshold,
                cross_section: cursor.get_vec(ne)?,
            });
        }
        Ok(SigBlock { reactions })
    }

    fn dump(&self, xss: &mut Vec<f64>) {
        xss.push(self.reactions.len() as f64);
        for reaction in &self.reactions {
            xss.push(reaction.mt as f64);
            xss.push(reaction.threshold as f64);
            xss.push(reaction.cross_section.len() as f64);
            xss.extend_from_slice(&reaction.cross_section);
        }
    }

    pub fn size(&self) -> usize {
        1 + self
            .reactions
            .iter()
            .map(|r| 3 + r.cross_section.len())
            .sum::<usize>()
    }
}

/// Number of equiprobable cosine-bin bounds per incident energy.
pub const ANG_BIN_BOUNDS: usize = 33;

/// Angular distributions: an incident energy grid, then 33 equiprobable
/// cosine-bin bounds per energy.
#[derive(Clone, Debug, PartialEq)]
pub struct AngBlock {
    pub energy: Vec<f64>,
    pub bins: Vec<[f64; ANG_BIN_BOUNDS]>,
}

impl AngBlock {
    fn parse(cursor: &mut XssCursor) -> Result<Self, HeliosError> {
        let ne = cursor.get_count()?;
        let energy = cursor.get_vec(ne)?;
        let mut bins = Vec::with_capacity(ne);
        for _ in 0..ne {
            let row = cursor.get_vec(ANG_BIN_BOUNDS)?;
            let mut bounds = [0.0; ANG_BIN_BOUNDS];
            bounds.copy_from_slice(&row);
            bins.push(bounds);
        }
        Ok(AngBlock { energy, bins })
    }

    fn dump(&self, xss: &mut Vec<f64>) {
        xss.push(self.energy.len() as f64);
        xss.extend_from_slice(&self.energy);
        for bounds in &self.bins {
            xss.extend_from_slice(bounds);
        }
    }

    pub fn size(&self) -> usize {
        1 + self.energy.len() * (1 + ANG_BIN_BOUNDS)
    }
}

/// Outgoing-energy law: a law number, then parallel incident and outgoing
/// energy grids.
#[derive(Clone, Debug, PartialEq)]
pub struct DlwBlock {
    pub law: i64,
    pub energy_in: Vec<f64>,
    pub energy_out: Vec<f64>,
}

impl DlwBlock {
    fn parse(cursor: &mut XssCursor) -> Result<Self, HeliosError> {
        let law = cursor.get_int()?;
        let ne = cursor.get_count()?;
        Ok(DlwBlock {
            law,
            energy_in: cursor.get_vec(ne)?,
            energy_out: cursor.get_vec(ne)?,
        })
    }

    fn dump(&self, xss: &mut Vec<f64>) {
        xss.push(self.law as f64);
        xss.push(self.energy_in.len() as f64);
        xss.extend_from_slice(&self.energy_in);
        xss.extend_from_slice(&self.energy_out);
    }

    pub fn size(&self) -> usize {
        2 + 2 * self.energy_in.len()
    }
}

/// Thermal incoherent inelastic incident-energy grid: a length, the
/// incident energies and the inelastic cross sections.
#[derive(Clone, Debug, PartialEq)]
pub struct ItieBlock {
    pub energy: Vec<f64>,
    pub sigma_in: Vec<f64>,
}

impl ItieBlock {
    fn parse(cursor: &mut XssCursor) -> Result<Self, HeliosError> {
        let length = cursor.get_count()?;
        Ok(ItieBlock {
            energy: cursor.get_vec(length)?,
            sigma_in: cursor.get_vec(length)?,
        })
    }

    fn dump(&self, xss: &mut Vec<f64>) {
        xss.push(self.energy.len() as f64);
        xss.extend_from_slice(&self.energy);
        xss.extend_from_slice(&self.sigma_in);
    }

    pub fn size(&self) -> usize {
        2 * self.energy.len() + 1
    }
}

/// Thermal inelastic secondary grids: per incident energy, `outgoing`
/// equiprobable outgoing energies and cosines.
#[derive(Clone, Debug, PartialEq)]
pub struct ItixBlock {
    /// Outgoing values per incident energy (NIL).
    pub outgoing: usize,
    pub energy_out: Vec<f64>,
    pub cosine: Vec<f64>,
}

impl ItixBlock {
    fn parse(cursor: &mut XssCursor) -> Result<Self, HeliosError> {
        let incident = cursor.get_count()?;
        let outgoing = cursor.get_count()?;
        let n = incident * outgoing;
        Ok(ItixBlock {
            outgoing,
            energy_out: cursor.get_vec(n)?,
            cosine: cursor.get_vec(n)?,
        })
    }

    fn dump(&self, xss: &mut Vec<f64>) {
        xss.push(self.incident() as f64);
        xss.push(self.outgoing as f64);
        xss.extend_from_slice(&self.energy_out);
        xss.extend_from_slice(&self.cosine);
    }

    /// Incident energy count (L).
    pub fn incident(&self) -> usize {
        if self.outgoing == 0 {
            0
        } else {
            self.energy_out.len() / self.outgoing
        }
    }

    pub fn size(&self) -> usize {
        2 + 2 * self.energy_out.len()
    }
}

/// Thermal elastic incident-energy grid, shaped like ITIE.
#[derive(Clone, Debug, PartialEq)]
pub struct ItceBlock {
    pub energy: Vec<f64>,
    pub sigma_el: Vec<f64>,
}

impl ItceBlock {
    fn parse(cursor: &mut XssCursor) -> Result<Self, HeliosError> {
        let length = cursor.get_count()?;
        Ok(ItceBlock {
            energy: cursor.get_vec(length)?,
            sigma_el: cursor.get_vec(length)?,
        })
    }

    fn dump(&self, xss: &mut Vec<f64>) {
        xss.push(self.energy.len() as f64);
        xss.extend_from_slice(&self.energy);
        xss.extend_from_slice(&self.sigma_el);
    }

    pub fn size(&self) -> usize {
        2 * self.energy.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(block: &Block) {
        let mut xss = Vec::new();
        block.dump(&mut xss);
        assert_eq!(xss.len(), block.size());

        let mut nxs = [0i64; NXS_SIZE];
        let mut jxs = [0i64; JXS_SIZE];
        nxs[0] = xss.len() as i64;
        jxs[block.block_type().jxs_slot()] = 1;
        if let Block::Esz(esz) = block {
            nxs[2] = esz.energy.len() as i64;
        }
        let reparsed = Block::parse(block.block_type(), &nxs, &jxs, &xss).unwrap();
        assert_eq!(&reparsed, block);
    }

    #[test]
    fn test_esz_round_trip() {
        round_trip(&Block::Esz(EszBlock {
            energy: vec![1.0, 2.0, 3.0],
            total: vec![10.0, 9.0, 8.0],
            absorption: vec![1.0, 0.5, 0.25],
            elastic: vec![9.0, 8.5, 7.75],
            heating: vec![0.1, 0.2, 0.3],
        }));
    }

    #[test]
    fn test_nu_round_trip_both_forms() {
        round_trip(&Block::Nu(NuBlock::Polynomial {
            coefficients: vec![2.4, 0.1],
        }));
        round_trip(&Block::Nu(NuBlock::Tabulated {
            energy: vec![1.0, 2e6],
            nu: vec![2.4, 2.9],
        }));
    }

    #[test]
    fn test_sig_round_trip() {
        round_trip(&Block::Sig(SigBlock {
            reactions: vec![
                SigReaction {
                    mt: 102,
                    threshold: 1,
                    cross_section: vec![4.0, 3.0, 2.0],
                },
                SigReaction {
                    mt: 18,
                    threshold: 2,
                    cross_section: vec![1.5, 1.0],
                },
            ],
        }));
    }

    #[test]
    fn test_ang_round_trip() {
        let mut bounds = [0.0; ANG_BIN_BOUNDS];
        for (i, b) in bounds.iter_mut().enumerate() {
            *b = -1.0 + 2.0 * i as f64 / (ANG_BIN_BOUNDS - 1) as f64;
        }
        round_trip(&Block::Ang(AngBlock {
            energy: vec![1.0, 1e6],
            bins: vec![bounds, bounds],
        }));
    }

    #[test]
    fn test_dlw_round_trip() {
        round_trip(&Block::Dlw(DlwBlock {
            law: 3,
            energy_in: vec![1.0, 10.0, 100.0],
            energy_out: vec![0.5, 5.0, 50.0],
        }));
    }

    #[test]
    fn test_itie_size_rule() {
        let block = ItieBlock {
            energy: vec![1e-5, 1e-4, 1e-3, 1e-2, 1e-1],
            sigma_in: vec![20.0, 18.0, 15.0, 10.0, 5.0],
        };
        // A length word plus two parallel arrays
        assert_eq!(block.size(), 2 * 5 + 1);
        round_trip(&Block::Itie(block));
    }

    #[test]
    fn test_itix_round_trip() {
        round_trip(&Block::Itix(ItixBlock {
            outgoing: 2,
            energy_out: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
            cosine: vec![-0.5, 0.5, -0.4, 0.4, -0.3, 0.3],
        }));
    }

    #[test]
    fn test_itce_round_trip() {
        round_trip(&Block::Itce(ItceBlock {
            energy: vec![1e-5, 1e-3],
            sigma_el: vec![4.0, 2.0],
        }));
    }

    #[test]
    fn test_nu_bad_flag() {
        let xss = vec![7.0];
        let mut nxs = [0i64; NXS_SIZE];
        nxs[0] = 1;
        let mut jxs = [0i64; JXS_SIZE];
        jxs[BlockType::Nu.jxs_slot()] = 1;
        let err = Block::parse(BlockType::Nu, &nxs, &jxs, &xss).unwrap_err();
        assert!(matches!(err, HeliosError::AceParse { .. }));
    }

    #[test]
    fn test_truncated_block() {
        // ITIE claims 5 energies but the payload ends early
        let xss = vec![5.0, 1.0, 2.0];
        let nxs = {
            let mut n = [0i64; NXS_SIZE];
            n[0] = xss.len() as i64;
            n
        };
        let mut jxs = [0i64; JXS_SIZE];
        jxs[BlockType::Itie.jxs_slot()] = 1;
        let err = Block::parse(BlockType::Itie, &nxs, &jxs, &xss).unwrap_err();
        match err {
            HeliosError::AceParse { offset, .. } => assert_eq!(offset, 1),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
