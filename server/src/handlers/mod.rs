//! Request handlers for documents and orders.

mod lists;
mod orders;
mod websocket;

pub use lists::*;
pub use orders::*;
pub use websocket::handle_websocket_connection;
