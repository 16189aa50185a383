use std::collections::HashMap;

use log::debug;

use crate::ace::{read_tables_cached, AceTable};
use crate::error::HeliosError;
use crate::material::Material;
use crate::nuclide::Nuclide;
use crate::objects::{AceTableDef, MaterialDef};

/// The materials module: nuclides built from ACE tables plus the material
/// compositions resolved against them.
///
/// Nuclide internal ids index `nuclides`; material internal ids index
/// `materials`. Material user ids may repeat (the index keeps every match);
/// zaids are unique.
#[derive(Clone, Debug, Default)]
pub struct Materials {
    pub nuclides: Vec<Nuclide>,
    pub materials: Vec<Material>,
    nuclide_index: HashMap<String, usize>,
    material_index: HashMap<String, Vec<usize>>,
}

impl Materials {
    /// Build the module from staged definitions, reading ACE files from
    /// disk (cached per path).
    pub fn from_definitions(
        ace_defs: &[AceTableDef],
        material_defs: &[MaterialDef],
    ) -> Result<Self, HeliosError> {
        let mut tables = Vec::new();
        for def in ace_defs {
            let file_tables = read_tables_cached(&def.path)?;
            let table = file_tables
                .iter()
                .find(|t| t.zaid == def.zaid)
                .ok_or_else(|| HeliosError::ObjectMissing {
                    module: "materials".to_string(),
                    user_id: def.zaid.clone(),
                })?
                .clone();
            tables.push(table);
        }
        Self::from_tables(&tables, material_defs)
    }

    /// Build the module from already-parsed tables (tests inject tables
    /// directly through this).
    pub fn from_tables(
        tables: &[AceTable],
        material_defs: &[MaterialDef],
    ) -> Result<Self, HeliosError> {
        let mut nuclides = Vec::with_capacity(tables.len());
        let mut nuclide_index = HashMap::new();
        for table in tables {
            let internal_id = nuclides.len();
            if nuclide_index
                .insert(table.zaid.clone(), internal_id)
                .is_some()
            {
                return Err(HeliosError::Parse(format!(
                    "duplicate ACE table for zaid `{}`",
                    table.zaid
                )));
            }
            nuclides.push(Nuclide::from_ace(table, internal_id)?);
        }

        let mut materials = Vec::with_capacity(material_defs.len());
        let mut material_index: HashMap<String, Vec<usize>> = HashMap::new();
        for def in material_defs {
            if def.density <= 0.0 {
                return Err(HeliosError::Parse(format!(
                    "material `{}` must have positive density",
                    def.user_id
                )));
            }
            let mut composition = Vec::with_capacity(def.composition.len());
            let mut total_fraction = 0.0;
            for (zaid, fraction) in &def.composition {
                let nuclide = *nuclide_index
                    .get(zaid)
                    .ok_or_else(|| HeliosError::MaterialResolution(zaid.clone()))?;
                if *fraction <= 0.0 {
                    return Err(HeliosError::Parse(format!(
                        "material `{}`: fraction of `{}` must be positive",
                        def.user_id, zaid
                    )));
                }
                composition.push((nuclide, *fraction));
                total_fraction += fraction;
            }
            if composition.is_empty() {
                return Err(HeliosError::Parse(format!(
                    "material `{}` has an empty composition",
                    def.user_id
                )));
            }
            // Atom fractions normalize to one
            for entry in &mut composition {
                entry.1 /= total_fraction;
            }
            let internal_id = materials.len();
            material_index
                .entry(def.user_id.clone())
                .or_default()
                .push(internal_id);
            materials.push(Material {
                user_id: def.user_id.clone(),
                internal_id,
                density: def.density,
                composition,
            });
        }

        debug!(
            "materials set up: {} nuclides, {} materials",
            nuclides.len(),
            materials.len()
        );
        Ok(Materials {
            nuclides,
            materials,
            nuclide_index,
            material_index,
        })
    }

    /// Internal id of a nuclide by zaid.
    pub fn find_nuclide(&self, zaid: &str) -> Option<usize> {
        self.nuclide_index.get(zaid).copied()
    }

    /// All materials sharing a user id.
    pub fn find_materials(&self, user_id: &str) -> &[usize] {
        self.material_index
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first material with this user id (the common case of a unique
    /// id).
    pub fn find_material(&self, user_id: &str) -> Option<usize> {
        self.find_materials(user_id).first().copied()
    }
}
