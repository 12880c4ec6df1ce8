//! Error types for the Tote engine.

use thiserror::Error;

/// All possible errors from the Tote engine.
///
/// List mutations never fail; these errors come from decoding data that
/// crossed a process boundary (cache values, remote documents, order input).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Decoding errors
    #[error("invalid cache value: {0}")]
    InvalidCache(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("unknown list kind: {0}")]
    UnknownListKind(String),

    #[error("unknown login policy: {0}")]
    UnknownLoginPolicy(String),

    #[error("unknown order status: {0}")]
    UnknownOrderStatus(String),

    // Order errors
    #[error("cannot place an order for an empty cart")]
    EmptyCart,

    #[error("shipping address is required")]
    MissingAddress,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
