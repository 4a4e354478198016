//! Messages of the connection phase, and the column definitions of the text
//! result set.

pub mod auth_switch_request;
pub mod handshake;
pub mod handshake_response;
pub mod result_set;
pub mod stmt_prepare;
