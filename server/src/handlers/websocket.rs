//! WebSocket handler for document subscriptions.
//!
//! A connection may subscribe to any number of documents. Each subscription
//! gets a forwarder task that turns hub notifications into `snapshot`
//! messages on the connection's outgoing channel.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tote_engine::{ListKind, Revision, UserId};

use crate::auth::AuthUser;
use crate::websocket::{ClientMessage, DocumentReceiver, ServerMessage, SubscriptionHub};

use super::{fetch_document, parse_collection};

type Outgoing = mpsc::UnboundedSender<ServerMessage>;

/// Subscriptions held by one connection.
#[derive(Default)]
struct Subscriptions {
    forwarders: HashMap<(ListKind, UserId), JoinHandle<()>>,
}

impl Subscriptions {
    fn insert(&mut self, key: (ListKind, UserId), task: JoinHandle<()>) {
        if let Some(previous) = self.forwarders.insert(key, task) {
            previous.abort();
        }
    }

    fn remove(&mut self, key: &(ListKind, UserId)) -> bool {
        match self.forwarders.remove(key) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.forwarders.len()
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        for (_, task) in self.forwarders.drain() {
            task.abort();
        }
    }
}

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Registers the connection with the hub
/// 2. Spawns a task to forward outgoing messages
/// 3. Processes incoming messages in a loop
/// 4. Cleans up on disconnect
pub async fn handle_websocket_connection(
    socket: WebSocket,
    pool: PgPool,
    hub: Arc<SubscriptionHub>,
    auth: AuthUser,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let active = hub.register_connection();
    tracing::info!(
        user_id = ?auth.user_id,
        active_connections = active,
        "WebSocket client connected"
    );

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    let mut subscriptions = Subscriptions::default();

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Some(response) =
                    process_message(&text, &pool, &hub, &auth, &tx, &mut subscriptions).await
                {
                    let _ = tx.send(response);
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(user_id = ?auth.user_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(user_id = ?auth.user_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    let subscribed = subscriptions.len();
    drop(subscriptions);
    send_task.abort();
    hub.prune();

    tracing::info!(
        user_id = ?auth.user_id,
        subscriptions = subscribed,
        active_connections = hub.unregister_connection(),
        "WebSocket client disconnected"
    );
}

/// Process a client message. Returns the reply, if the message has one
/// beyond the snapshots it triggers.
async fn process_message(
    text: &str,
    pool: &PgPool,
    hub: &SubscriptionHub,
    auth: &AuthUser,
    tx: &Outgoing,
    subscriptions: &mut Subscriptions,
) -> Option<ServerMessage> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return Some(ServerMessage::error(
                format!("Invalid message format: {}", e),
                None,
            ));
        }
    };

    match client_msg {
        ClientMessage::Subscribe {
            collection,
            user_id,
            request_id,
        } => {
            let kind = match parse_collection(&collection) {
                Ok(kind) => kind,
                Err(e) => return Some(ServerMessage::error(e.to_string(), request_id)),
            };
            if let Err(e) = auth.authorize(&user_id) {
                return Some(ServerMessage::error(e.to_string(), request_id));
            }

            // Subscribe before reading; the forwarder skips revisions the
            // initial snapshot already covers.
            let rx = hub.subscribe(kind, &user_id);
            let document = match fetch_document(pool, kind, &user_id).await {
                Ok(document) => document,
                Err(e) => return Some(ServerMessage::error(e.to_string(), request_id)),
            };

            let _ = tx.send(ServerMessage::snapshot(kind.collection(), &document));
            let task = tokio::spawn(forward_snapshots(kind, rx, document.revision, tx.clone()));
            subscriptions.insert((kind, user_id.clone()), task);

            tracing::debug!(
                collection = kind.collection(),
                user_id = %user_id,
                revision = document.revision,
                "WebSocket subscription started"
            );
            None
        }

        ClientMessage::Unsubscribe {
            collection,
            user_id,
            request_id,
        } => {
            let kind = match parse_collection(&collection) {
                Ok(kind) => kind,
                Err(e) => return Some(ServerMessage::error(e.to_string(), request_id)),
            };
            if !subscriptions.remove(&(kind, user_id.clone())) {
                return Some(ServerMessage::error(
                    format!("Not subscribed to {collection}/{user_id}"),
                    request_id,
                ));
            }
            Some(ServerMessage::Unsubscribed {
                collection,
                user_id,
                request_id,
            })
        }

        ClientMessage::Ping => Some(ServerMessage::Pong),
    }
}

/// Push every revision newer than `last_sent` until the connection closes.
async fn forward_snapshots(
    kind: ListKind,
    mut rx: DocumentReceiver,
    mut last_sent: Revision,
    tx: Outgoing,
) {
    while rx.changed().await.is_ok() {
        let published = rx.borrow_and_update().clone();
        let Some(document) = published else {
            continue;
        };
        if document.revision <= last_sent {
            continue;
        }
        last_sent = document.revision;
        if tx
            .send(ServerMessage::snapshot(kind.collection(), &document))
            .is_err()
        {
            break;
        }
    }
}
