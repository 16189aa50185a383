//! ACE cross-section table reader.
//!
//! Tables are block-structured: a fixed-length integer header (NXS), a
//! pointer array into the payload (JXS, 1-based, 0 = absent) and a flat
//! floating-point payload (XSS). Each known block type deserializes from
//! its fixed JXS slot into a typed value and dumps back symmetrically, so a
//! table can be re-laid-out after in-memory edits with freshly computed
//! pointers.

pub mod blocks;
pub mod cursor;
pub mod table;

/// Number of NXS header entries.
pub const NXS_SIZE: usize = 16;
/// Number of JXS pointer entries.
pub const JXS_SIZE: usize = 32;

pub use blocks::{
    AngBlock, Block, BlockType, DlwBlock, EszBlock, ItceBlock, ItieBlock, ItixBlock, NuBlock,
    SigBlock, SigReaction,
};
pub use cursor::{shift_jxs_array, XssCursor};
pub use table::{clear_table_cache, read_tables_cached, AceTable};
