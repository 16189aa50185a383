use std::collections::HashMap;

use log::{debug, info};

use crate::error::HeliosError;
use crate::geometry::Geometry;
use crate::materials::Materials;
use crate::objects::McObject;
use crate::settings::Settings;
use crate::source::Source;

/// Module setup order. Materials need their nuclear data before geometry
/// resolves material references; settings come first so every factory can
/// read them.
const SETUP_ORDER: [&str; 4] = ["settings", "source", "materials", "geometry"];

/// A constructed module, one variant per module kind.
#[derive(Clone, Debug)]
pub enum Module {
    Settings(Settings),
    Source(Source),
    Materials(Materials),
    Geometry(Geometry),
}

impl Module {
    pub fn name(&self) -> &'static str {
        match self {
            Module::Settings(_) => "settings",
            Module::Source(_) => "source",
            Module::Materials(_) => "materials",
            Module::Geometry(_) => "geometry",
        }
    }
}

/// Peer modules already constructed earlier in the setup order, passed to
/// each factory by parameter. Objects never hold environment
/// back-references.
pub struct SetupContext<'a> {
    modules: &'a HashMap<String, Module>,
}

impl<'a> SetupContext<'a> {
    pub fn settings(&self) -> Option<&'a Settings> {
        match self.modules.get("settings") {
            Some(Module::Settings(settings)) => Some(settings),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&'a Source> {
        match self.modules.get("source") {
            Some(Module::Source(source)) => Some(source),
            _ => None,
        }
    }

    pub fn materials(&self) -> Option<&'a Materials> {
        match self.modules.get("materials") {
            Some(Module::Materials(materials)) => Some(materials),
            _ => None,
        }
    }
}

/// Factory: staged definitions plus the setup context in, module out.
pub type ModuleFactory = fn(&[McObject], &SetupContext) -> Result<Module, HeliosError>;

/// The environment holds everything that conforms the problem: staged
/// definitions routed by module name, the factory registry and the
/// constructed modules.
///
/// Factories are registered explicitly at construction (nothing happens in
/// static initializers); `setup` then builds the modules in dependency
/// order and resolves cross-module references.
pub struct Environment {
    factory_map: HashMap<String, ModuleFactory>,
    object_map: HashMap<String, Vec<McObject>>,
    module_map: HashMap<String, Module>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// An environment with the default factories registered.
    pub fn new() -> Self {
        let mut environment = Environment {
            factory_map: HashMap::new(),
            object_map: HashMap::new(),
            module_map: HashMap::new(),
        };
        environment.register_factory("settings", settings_factory);
        environment.register_factory("source", source_factory);
        environment.register_factory("materials", materials_factory);
        environment.register_factory("geometry", geometry_factory);
        environment
    }

    /// Register (or override) a module factory.
    pub fn register_factory(&mut self, name: &str, factory: ModuleFactory) {
        self.factory_map.insert(name.to_string(), factory);
    }

    /// Stage a parsed definition under its module name.
    pub fn push_object(&mut self, object: McObject) {
        self.object_map
            .entry(object.module_name().to_string())
            .or_default()
            .push(object);
    }

    /// Stage a batch of parsed definitions.
    pub fn push_objects<I: IntoIterator<Item = McObject>>(&mut self, objects: I) {
        for object in objects {
            self.push_object(object);
        }
    }

    /// Stage definitions from a JSON array (the parser collaborator's
    /// output format).
    pub fn push_objects_from_json(&mut self, text: &str) -> Result<(), HeliosError> {
        let objects: Vec<McObject> = serde_json::from_str(text)
            .map_err(|e| HeliosError::Parse(format!("object stream: {}", e)))?;
        self.push_objects(objects);
        Ok(())
    }

    /// Staged definitions of one module with a given user id. User ids may
    /// legally repeat within a module, hence the vector.
    pub fn get_objects(&self, module: &str, user_id: &str) -> Vec<&McObject> {
        self.object_map
            .get(module)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|o| o.user_id() == user_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Build every module that has staged definitions, in dependency
    /// order. Modules without definitions are skipped silently; a module
    /// without a factory is an error.
    pub fn setup(&mut self) -> Result<(), HeliosError> {
        for name in SETUP_ORDER {
            self.setup_module(name)?;
        }
        info!(
            "environment set up: {} module(s) loaded",
            self.module_map.len()
        );
        Ok(())
    }

    fn setup_module(&mut self, name: &str) -> Result<(), HeliosError> {
        let factory = *self
            .factory_map
            .get(name)
            .ok_or_else(|| HeliosError::MissingFactory(name.to_string()))?;
        let Some(definitions) = self.object_map.get(name) else {
            debug!("module `{}` has no definitions, skipping", name);
            return Ok(());
        };
        let context = SetupContext {
            modules: &self.module_map,
        };
        let module = factory(definitions, &context)?;
        self.module_map.insert(name.to_string(), module);
        Ok(())
    }

    pub fn is_module_set(&self, name: &str) -> bool {
        self.module_map.contains_key(name)
    }

    /// Typed lookup for the settings module.
    pub fn settings(&self) -> Result<&Settings, HeliosError> {
        match self.module_map.get("settings") {
            Some(Module::Settings(settings)) => Ok(settings),
            _ => Err(HeliosError::ModuleMissing("settings".to_string())),
        }
    }

    pub fn source(&self) -> Result<&Source, HeliosError> {
        match self.module_map.get("source") {
            Some(Module::Source(source)) => Ok(source),
            _ => Err(HeliosError::ModuleMissing("source".to_string())),
        }
    }

    pub fn materials(&self) -> Result<&Materials, HeliosError> {
        match self.module_map.get("materials") {
            Some(Module::Materials(materials)) => Ok(materials),
            _ => Err(HeliosError::ModuleMissing("materials".to_string())),
        }
    }

    pub fn geometry(&self) -> Result<&Geometry, HeliosError> {
        match self.module_map.get("geometry") {
            Some(Module::Geometry(geometry)) => Ok(geometry),
            _ => Err(HeliosError::ModuleMissing("geometry".to_string())),
        }
    }
}

fn settings_factory(
    definitions: &[McObject],
    _context: &SetupContext,
) -> Result<Module, HeliosError> {
    let defs: Vec<_> = definitions
        .iter()
        .filter_map(|o| match o {
            McObject::Setting(def) => Some(def.clone()),
            _ => None,
        })
        .collect();
    Ok(Module::Settings(Settings::from_definitions(&defs)))
}

fn source_factory(
    definitions: &[McObject],
    _context: &SetupContext,
) -> Result<Module, HeliosError> {
    let mut sources = Vec::new();
    let mut distributions = Vec::new();
    for object in definitions {
        match object {
            McObject::Source(def) => sources.push(def.clone()),
            McObject::Distribution(def) => distributions.push(def.clone()),
            _ => {}
        }
    }
    Ok(Module::Source(Source::from_definitions(
        &sources,
        &distributions,
    )?))
}

fn materials_factory(
    definitions: &[McObject],
    _context: &SetupContext,
) -> Result<Module, HeliosError> {
    let mut ace_defs = Vec::new();
    let mut material_defs = Vec::new();
    for object in definitions {
        match object {
            McObject::AceTable(def) => ace_defs.push(def.clone()),
            McObject::Material(def) => material_defs.push(def.clone()),
            _ => {}
        }
    }
    Ok(Module::Materials(Materials::from_definitions(
        &ace_defs,
        &material_defs,
    )?))
}

fn geometry_factory(
    definitions: &[McObject],
    context: &SetupContext,
) -> Result<Module, HeliosError> {
    let mut surfaces = Vec::new();
    let mut cells = Vec::new();
    let mut lattices = Vec::new();
    for object in definitions {
        match object {
            McObject::Surface(def) => surfaces.push(def.clone()),
            McObject::Cell(def) => cells.push(def.clone()),
            McObject::Lattice(def) => lattices.push(def.clone()),
            _ => {}
        }
    }
    let default_settings = Settings::default();
    let settings = context.settings().unwrap_or(&default_settings);
    let materials = context.materials();
    let geometry = Geometry::from_definitions(
        &surfaces,
        &cells,
        &lattices,
        |user_id| materials.and_then(|m| m.find_material(user_id)),
        settings.surface_tolerance(),
        settings.nudge(),
    )?;
    Ok(Module::Geometry(geometry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{CellDef, SettingDef, SurfaceDef};
    use serde_json::json;

    fn surface_object(user_id: &str, radius: f64) -> McObject {
        McObject::Surface(SurfaceDef {
            user_id: user_id.to_string(),
            kind: "so".to_string(),
            coefficients: vec![radius],
            reflective: false,
            vacuum: true,
        })
    }

    fn cell_object(user_id: &str, senses: &[&str]) -> McObject {
        McObject::Cell(CellDef {
            user_id: user_id.to_string(),
            universe: "0".to_string(),
            senses: senses.iter().map(|s| s.to_string()).collect(),
            fill: None,
            translation: None,
            material: None,
        })
    }

    #[test]
    fn test_setup_builds_staged_modules_only() {
        let mut env = Environment::new();
        env.push_objects([
            surface_object("outer", 5.0),
            cell_object("world", &["-outer"]),
        ]);
        env.setup().unwrap();

        assert!(env.is_module_set("geometry"));
        assert!(!env.is_module_set("materials"));
        assert!(env.geometry().is_ok());
        // Typed lookup of an unloaded module
        assert_eq!(
            env.materials().unwrap_err(),
            HeliosError::ModuleMissing("materials".to_string())
        );
    }

    #[test]
    fn test_settings_reach_geometry_factory() {
        let mut env = Environment::new();
        env.push_objects([
            McObject::Setting(SettingDef {
                key: "surface_tolerance".to_string(),
                value: json!(1e-7),
            }),
            surface_object("outer", 5.0),
            cell_object("world", &["-outer"]),
        ]);
        env.setup().unwrap();
        assert_eq!(env.settings().unwrap().surface_tolerance(), 1e-7);
    }

    #[test]
    fn test_missing_factory() {
        let mut env = Environment::new();
        env.factory_map.remove("geometry");
        env.push_object(surface_object("outer", 5.0));
        let err = env.setup().unwrap_err();
        assert_eq!(err, HeliosError::MissingFactory("geometry".to_string()));
    }

    #[test]
    fn test_factory_error_aborts_setup() {
        let mut env = Environment::new();
        // A cell referencing a surface that was never staged
        env.push_object(cell_object("world", &["-ghost"]));
        let err = env.setup().unwrap_err();
        assert_eq!(
            err,
            HeliosError::ObjectMissing {
                module: "geometry".to_string(),
                user_id: "ghost".to_string()
            }
        );
        assert!(!env.is_module_set("geometry"));
    }

    #[test]
    fn test_get_objects_returns_all_matches() {
        let mut env = Environment::new();
        env.push_objects([
            cell_object("pin", &["-a"]),
            cell_object("pin", &["-b"]),
            cell_object("other", &["-c"]),
        ]);
        assert_eq!(env.get_objects("geometry", "pin").len(), 2);
        assert_eq!(env.get_objects("geometry", "other").len(), 1);
        assert!(env.get_objects("materials", "pin").is_empty());
    }

    #[test]
    fn test_push_objects_from_json() {
        let mut env = Environment::new();
        env.push_objects_from_json(
            r#"[
                {"object": "surface", "user_id": "outer", "kind": "so",
                 "coefficients": [3.0], "vacuum": true},
                {"object": "cell", "user_id": "world", "senses": ["-outer"]}
            ]"#,
        )
        .unwrap();
        env.setup().unwrap();
        let geometry = env.geometry().unwrap();
        assert_eq!(geometry.cells.len(), 1);

        let err = env.push_objects_from_json("not json").unwrap_err();
        assert!(matches!(err, HeliosError::Parse(_)));
    }

    #[test]
    fn test_factory_override() {
        fn empty_settings(
            _defs: &[McObject],
            _ctx: &SetupContext,
        ) -> Result<Module, HeliosError> {
            Ok(Module::Settings(Settings::default()))
        }
        let mut env = Environment::new();
        env.register_factory("settings", empty_settings);
        env.push_object(McObject::Setting(SettingDef {
            key: "seed".to_string(),
            value: json!(99),
        }));
        env.setup().unwrap();
        // The override ignored the staged definition
        assert_eq!(env.settings().unwrap().seed(), 1);
    }
}
