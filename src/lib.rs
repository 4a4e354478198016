//! Passive decoder for the MySQL client/server protocol.
//!
//! Feed the bytes each peer sent to a [`Decoder`] and it reports the
//! handshake, commands and responses it recognises to a [`MessageSink`].

pub mod connection;
pub mod error;
pub mod message;
pub mod mysql;
pub mod state_handler;
pub mod util;

pub use connection::{Connection, ConnectionState, Direction, QueryState};
pub use error::{Error, Result};
pub use message::{FnSink, Message, MessageSink};
pub use state_handler::Decoder;
