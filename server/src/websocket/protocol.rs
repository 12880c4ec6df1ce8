//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded and use snake_case for field names. Item
//! arrays keep the document's camelCase shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tote_engine::{ListDocument, Revision, UserId};

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving snapshots of a document.
    Subscribe {
        /// Collection name (`carts` or `wishlists`)
        collection: String,
        /// Owner of the document
        user_id: UserId,
        /// Request ID for correlating responses
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Stop receiving snapshots of a document.
    Unsubscribe {
        collection: String,
        user_id: UserId,
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current contents of a subscribed document. Sent once on subscribe
    /// and again after every write.
    Snapshot {
        collection: String,
        user_id: UserId,
        items: Vec<Value>,
        /// 0 when the document does not exist yet
        revision: Revision,
        updated_at: DateTime<Utc>,
    },

    /// Confirms an unsubscribe.
    Unsubscribed {
        collection: String,
        user_id: UserId,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        /// Error description
        message: String,
        /// Request ID from the original request (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    /// Create a snapshot of a document.
    pub fn snapshot(collection: &str, document: &ListDocument<Value>) -> Self {
        ServerMessage::Snapshot {
            collection: collection.to_string(),
            user_id: document.user_id.clone(),
            items: document.items.clone(),
            revision: document.revision,
            updated_at: document.updated_at,
        }
    }
}
