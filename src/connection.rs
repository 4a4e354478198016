use std::fmt;

use log::debug;
use serde::Serialize;

use crate::mysql::command::MySqlCommand;
use crate::mysql::flags::CapabilityFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Client,
    Server,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Client => write!(f, "client"),
            Direction::Server => write!(f, "server"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionState {
    #[default]
    AwaitingServerHandshake,
    AwaitingClientHandshake,
    AwaitingHandshakeResult,
    AwaitingClientAuthData,
    AwaitingClientCommand,
    AwaitingQueryResult,
    LocalInfileData,
    LocalInfileResult,
}

impl ConnectionState {
    /// The peer whose packets are decoded in this state.
    pub fn expects(self) -> Direction {
        match self {
            ConnectionState::AwaitingClientHandshake
            | ConnectionState::AwaitingClientAuthData
            | ConnectionState::AwaitingClientCommand
            | ConnectionState::LocalInfileData => Direction::Client,
            ConnectionState::AwaitingServerHandshake
            | ConnectionState::AwaitingHandshakeResult
            | ConnectionState::AwaitingQueryResult
            | ConnectionState::LocalInfileResult => Direction::Server,
        }
    }
}

/// Progress through a command response, only meaningful while
/// [`ConnectionState::AwaitingQueryResult`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QueryState {
    #[default]
    Idle,
    ReadingColumnDefinitions,
    ReadingRows,
}

/// Everything the decoder knows about the observed connection.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub state: ConnectionState,
    pub query_state: QueryState,
    pub server_capabilities: CapabilityFlags,
    /// What both peers agreed on, the server's flags until the client answers.
    pub capabilities: CapabilityFlags,
    /// Sequence id of the next packet in the current exchange.
    pub sequence: u8,
    pub last_command: Option<MySqlCommand>,
    /// Set once the column count of the current result set has been read.
    pub column_count: Option<u64>,
    pub columns_remaining: u64,
    /// Definition blocks still owed by a `COM_STMT_PREPARE` response.
    pub pending_definitions: Vec<u64>,
}

impl Connection {
    pub fn new() -> Connection {
        Connection::default()
    }

    pub fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("{:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }

    pub fn set_query_state(&mut self, query_state: QueryState) {
        if self.query_state != query_state {
            debug!("{:?} -> {:?}", self.query_state, query_state);
        }
        self.query_state = query_state;
    }

    /// Moves past a packet that spanned `frames` frames.
    pub fn advance_sequence(&mut self, frames: usize) {
        self.sequence = self.sequence.wrapping_add((frames % 256) as u8);
    }

    /// Starts reading a (further) result set of the current command.
    pub fn begin_result(&mut self) {
        self.set_state(ConnectionState::AwaitingQueryResult);
        self.set_query_state(QueryState::ReadingColumnDefinitions);
        self.column_count = None;
        self.columns_remaining = 0;
    }

    /// Rows with no column count or definitions in front, as `COM_STMT_FETCH`
    /// gets them.
    pub fn begin_rows(&mut self) {
        self.set_state(ConnectionState::AwaitingQueryResult);
        self.set_query_state(QueryState::ReadingRows);
        self.column_count = None;
        self.columns_remaining = 0;
    }

    /// Expects `count` definitions before the rows or the next block.
    pub fn begin_definitions(&mut self, count: u64) {
        self.column_count = Some(count);
        self.columns_remaining = count;
    }

    /// Back to waiting for the next command.
    pub fn reset(&mut self) {
        self.set_state(ConnectionState::AwaitingClientCommand);
        self.set_query_state(QueryState::Idle);
        self.sequence = 0;
        self.column_count = None;
        self.columns_remaining = 0;
        self.pending_definitions.clear();
    }

    pub fn deprecate_eof(&self) -> bool {
        self.capabilities.contains(CapabilityFlags::CLIENT_DEPRECATE_EOF)
    }
}
