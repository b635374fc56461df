use rootcause::Report;
use thiserror::Error;

/// Every way an export can fail. All of these abort the export; none are
/// recovered locally.
#[derive(Error, Debug)]
pub enum EscherError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error("'{name}' has the wrong type: expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: String,
    },
    #[error("{kind} '{name}' could not be resolved")]
    Unresolved { kind: &'static str, name: String },
    #[error("duplicate key '{key}'")]
    DuplicateKey { key: String },
    #[error("remotes '{first}' and '{second}' in space '{space}' both use portal slot {slot}")]
    DuplicateSlot {
        space: String,
        slot: u32,
        first: String,
        second: String,
    },
    #[error("'{name}' is missing marker field '{field}'")]
    MissingField { name: String, field: String },
    #[error("spawn '{spawn}' has {count} path children, at most one is allowed")]
    MultiplePaths { spawn: String, count: usize },
    #[error("invalid geometry on '{name}': {reason}")]
    InvalidGeometry { name: String, reason: String },
    #[error("portal slot {slot} on '{name}' is outside the slot cap of {cap}")]
    SlotOutOfRange { name: String, slot: i64, cap: u32 },
    #[error("all {cap} portal slots are in use")]
    PaletteExhausted { cap: u32 },
    #[error("object '{name}' is its own ancestor")]
    CyclicHierarchy { name: String },
    #[error("I/O error on {path}: {err}")]
    Io {
        path: String,
        #[source]
        err: std::io::Error,
    },
    #[cfg(feature = "json")]
    #[error("Error serializing or deserializing json: {err}")]
    SerdeJson {
        #[from]
        err: serde_json::Error,
    },
}

impl EscherError {
    pub(crate) fn type_mismatch(
        name: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Report<EscherError> {
        Report::new(EscherError::TypeMismatch {
            name: name.into(),
            expected,
            found: found.into(),
        })
    }

    pub(crate) fn unresolved(kind: &'static str, name: impl Into<String>) -> Report<EscherError> {
        Report::new(EscherError::Unresolved {
            kind,
            name: name.into(),
        })
    }

    pub(crate) fn invalid_geometry(
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Report<EscherError> {
        Report::new(EscherError::InvalidGeometry {
            name: name.into(),
            reason: reason.into(),
        })
    }
}

pub type EscherResult<T> = Result<T, Report<EscherError>>;
