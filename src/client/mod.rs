//! Connection manager and client-side session API.
//!
//! [`ConnectionManager`] turns a [`Connector`](crate::transport::Connector)
//! into a long-lived session. It performs the hello handshake and
//! reconnects with exponential backoff after unexpected closes. Inbound
//! messages fan out to handlers registered per
//! [`MessageType`](crate::codec::MessageType).

mod config;
mod connection;
mod error;
mod handlers;
mod session;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use connection::ConnectionManager;
pub use error::ConnectError;
pub use handlers::Subscription;
pub use session::{ConnectionState, ConnectionStats};
