//! Error types for placement and catalog handling.

use thiserror::Error;

/// Why a placement attempt was rejected.
///
/// Rejections are expected during normal use (the user taps before a surface
/// is found, or taps twice in quick succession) and are surfaced as debug
/// logs rather than user-facing errors; tapping again is always a valid
/// retry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceError {
    /// No surface has been detected under the camera this frame.
    #[error("no surface detected")]
    NoSurface,

    /// An object is already placed (or a placement is being committed).
    #[error("an object is already placed")]
    AlreadyPlaced,

    /// The tap arrived inside the cooldown window after the previous one.
    #[error("tap arrived within the placement cooldown window")]
    Cooldown,

    /// A touch gesture is manipulating the placed object.
    #[error("a gesture is in progress")]
    GestureActive,
}

/// Errors raised while building a [`Catalog`](crate::Catalog).
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog JSON could not be parsed.
    #[error("invalid catalog data: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two entries share the same key.
    #[error("duplicate catalog key: {0}")]
    DuplicateKey(String),
}
