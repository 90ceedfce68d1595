pub mod activity;
pub mod config;
pub mod error;
pub mod http;
pub mod hub;
pub mod identity;
pub mod protocol;
pub mod rooms;
pub mod session;

use std::sync::Arc;

use axum::extract::FromRef;

pub use error::{ChatError, ChatResult};
pub use hub::Hub;
pub use protocol::{Action, Event, Outbound};
pub use session::Coordinator;

pub type ConnectionId = String;
pub type RoomId = String;
/// Ownership token: a connection id, or a secret bound by export.
pub type Token = String;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub hub: Arc<Hub>,
}
