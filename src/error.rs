use thiserror::Error;

/// Crate-level error. Nothing on the tick or render paths produces one;
/// these surface only at the edges (decoding, configuration, storage).
#[derive(Debug, Error)]
pub enum KeyRevError {
    #[error("Malformed message: {0}")]
    Message(#[from] serde_json::Error),

    #[error("Invalid gear table: {0}")]
    GearTable(#[from] GearTableError),

    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),

    #[error("simulator service has shut down")]
    ServiceClosed,
}

/// Invariant violations found while building a custom gear table.
#[derive(Debug, Error, PartialEq)]
pub enum GearTableError {
    #[error("gear table must contain at least one gear")]
    Empty,

    #[error("expected {expected} entries per sequence, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("up-shift threshold decreases at gear {gear}")]
    UpshiftNotMonotonic { gear: u8 },

    #[error("down-shift threshold of gear {gear} is not below its up-shift threshold")]
    DownshiftNotBelowUpshift { gear: u8 },

    #[error("gear {gear} has a non-positive ratio")]
    NonPositiveRatio { gear: u8 },
}

/// Errors from the on-disk settings store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no home directory available for the settings file")]
    NoConfigDir,

    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}
