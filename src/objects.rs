use serde::{Deserialize, Serialize};

use crate::stats::DistributionKind;

/// A definition parsed from input, routed to its owning module by name.
///
/// The input grammar and lexer live in an external collaborator; this enum
/// is the object-stream boundary. Definitions deserialize from a JSON array
/// (see `Environment::push_objects_from_json`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "object", rename_all = "snake_case")]
pub enum McObject {
    Surface(SurfaceDef),
    Cell(CellDef),
    Lattice(LatticeDef),
    Material(MaterialDef),
    AceTable(AceTableDef),
    Distribution(DistributionDef),
    Source(SourceDef),
    Setting(SettingDef),
}

impl McObject {
    /// Name of the module this definition belongs to.
    pub fn module_name(&self) -> &'static str {
        match self {
            McObject::Surface(_) | McObject::Cell(_) | McObject::Lattice(_) => "geometry",
            McObject::Material(_) | McObject::AceTable(_) => "materials",
            McObject::Distribution(_) | McObject::Source(_) => "source",
            McObject::Setting(_) => "settings",
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            McObject::Surface(d) => &d.user_id,
            McObject::Cell(d) => &d.user_id,
            McObject::Lattice(d) => &d.user_id,
            McObject::Material(d) => &d.user_id,
            McObject::AceTable(d) => &d.zaid,
            McObject::Distribution(d) => &d.user_id,
            McObject::Source(d) => &d.user_id,
            McObject::Setting(d) => &d.key,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SurfaceDef {
    pub user_id: String,
    /// Surface kind tag: `px`, `p`, `c/z`, `s`, `so`, `sq`, ...
    pub kind: String,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub reflective: bool,
    #[serde(default)]
    pub vacuum: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CellDef {
    pub user_id: String,
    /// Owning universe user id; defaults to the root universe.
    #[serde(default = "default_universe")]
    pub universe: String,
    /// Signed surface references: "surf" or "+surf" for the positive
    /// half-space, "-surf" for the negative one.
    pub senses: Vec<String>,
    /// Universe user id this cell is filled with (exclusive with material).
    #[serde(default)]
    pub fill: Option<String>,
    /// Translation applied to the filled universe.
    #[serde(default)]
    pub translation: Option<[f64; 3]>,
    /// Material user id (exclusive with fill).
    #[serde(default)]
    pub material: Option<String>,
}

fn default_universe() -> String {
    crate::universe::ROOT_UNIVERSE.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LatticeDef {
    pub user_id: String,
    pub shape: [usize; 3],
    pub pitch: [f64; 3],
    pub origin: [f64; 3],
    /// Slot universe user ids, row-major with x fastest.
    pub universes: Vec<String>,
    /// "bounded" (default) or "infinite".
    #[serde(default = "default_extent")]
    pub extent: String,
}

fn default_extent() -> String {
    "bounded".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MaterialDef {
    pub user_id: String,
    /// Atom density in atoms / (barn cm).
    pub density: f64,
    /// (zaid, atom fraction) pairs.
    pub composition: Vec<(String, f64)>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AceTableDef {
    pub zaid: String,
    /// Path of the ACE file holding this table.
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DistributionDef {
    pub user_id: String,
    #[serde(flatten)]
    pub kind: DistributionKind,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SourceDef {
    pub user_id: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Spatial distribution user id.
    pub space: String,
    /// Angular distribution user id.
    pub angle: String,
    /// Energy distribution user id.
    pub energy: String,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SettingDef {
    pub key: String,
    pub value: serde_json::Value,
}
