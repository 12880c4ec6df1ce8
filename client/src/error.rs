//! Error types for the client runtime.

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] tote_engine::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    #[error("Remote store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A remote store ended a subscription feed.
    #[error("Subscription closed")]
    SubscriptionClosed,

    #[error("Not signed in")]
    NotSignedIn,

    /// Returned by the submit future a caller passes to
    /// [`StorefrontSession::checkout`](crate::StorefrontSession::checkout)
    /// when the order backend refuses the draft. The cart is kept.
    #[error("Order submission failed: {0}")]
    Submission(String),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
