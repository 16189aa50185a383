use thiserror::Error;

/// Error taxonomy for problem setup and transport.
///
/// Construction and setup errors abort setup and carry the module name and
/// the offending user id. Errors raised during a particle history are
/// recorded on the particle (which terminates with a failure code) and the
/// simulation continues with the next history.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HeliosError {
    /// Malformed input object, propagated from the parser collaborator.
    #[error("malformed input object: {0}")]
    Parse(String),

    /// Wrong coefficient count or degenerate surface parameters.
    #[error("bad creation of surface `{user_id}`: {reason}")]
    BadSurfaceCreation { user_id: String, reason: String },

    /// No cell contains the point at the root universe level.
    #[error("no cell found at point {point:?}")]
    GeometryUnbounded { point: [f64; 3] },

    /// A consistency sweep found a point inside more than one cell.
    #[error("cells {cells:?} overlap at point {point:?}")]
    OverlappingCells { cells: Vec<String>, point: [f64; 3] },

    /// A module was referenced without a registered factory.
    #[error("cannot create module `{0}`: no factory is registered")]
    MissingFactory(String),

    /// Typed lookup for a module whose factory had no staged objects.
    #[error("module `{0}` is not loaded on the environment")]
    ModuleMissing(String),

    /// User id not found in a module's object index.
    #[error("object `{user_id}` is missing on module `{module}`")]
    ObjectMissing { module: String, user_id: String },

    /// ACE block schema violation; `offset` is the word index into XSS
    /// (or 0 when the failure happens before the payload).
    #[error("ACE parse error at word {offset}: {reason}")]
    AceParse { offset: usize, reason: String },

    /// A material composition references a nuclide with no loaded table.
    #[error("material references nuclide `{0}` but no ACE table is loaded for it")]
    MaterialResolution(String),
}

impl HeliosError {
    pub(crate) fn ace(offset: usize, reason: impl Into<String>) -> Self {
        HeliosError::AceParse {
            offset,
            reason: reason.into(),
        }
    }
}
