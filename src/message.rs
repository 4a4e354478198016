use serde::Serialize;

use crate::mysql::command::Command;
use crate::mysql::packet::{EofData, ErrPacket, ErrorData, OkData, ProgressData};
use crate::mysql::protocol::auth_switch_request::{AuthMoreData, AuthSwitchRequest};
use crate::mysql::protocol::handshake::Handshake;
use crate::mysql::protocol::handshake_response::HandshakeResponse;
use crate::mysql::protocol::result_set::ColumnDefinition;
use crate::mysql::protocol::stmt_prepare::StmtPrepareOk;

/// A decoded message, handed to the [`MessageSink`] in the order the peers
/// exchanged them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Message {
    ServerHandshake(Handshake),
    ClientHandshake(HandshakeResponse),
    AuthSwitchRequest(AuthSwitchRequest),
    AuthMoreData(AuthMoreData),
    /// Plugin specific answer of the client, left opaque.
    AuthData { len: usize },
    Ok(OkData),
    Err(ErrorData),
    Progress(ProgressData),
    Eof(EofData),
    Command(Command),
    ResultSetHeader { column_count: u64 },
    ColumnDefinition(ColumnDefinition),
    StmtPrepareOk(StmtPrepareOk),
    /// Row contents are not decoded.
    Row { len: usize },
    LocalInfileRequest { filename: String },
    LocalInfileData { len: usize },
}

impl From<ErrPacket> for Message {
    fn from(packet: ErrPacket) -> Self {
        match packet {
            ErrPacket::Error(error) => Message::Err(error),
            ErrPacket::Progress(progress) => Message::Progress(progress),
        }
    }
}

/// Receives decoded messages.
pub trait MessageSink {
    fn on_message(&mut self, message: Message);
}

impl MessageSink for Vec<Message> {
    fn on_message(&mut self, message: Message) {
        self.push(message);
    }
}

/// Adapts a closure into a [`MessageSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(Message)> MessageSink for FnSink<F> {
    fn on_message(&mut self, message: Message) {
        (self.0)(message)
    }
}
