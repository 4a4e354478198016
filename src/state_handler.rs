use std::collections::VecDeque;

use log::{trace, warn};

use crate::connection::{Connection, ConnectionState, Direction, QueryState};
use crate::error::{Error, Result};
use crate::message::{Message, MessageSink};
use crate::mysql::command::{Command, MySqlCommand};
use crate::mysql::flags::CapabilityFlags;
use crate::mysql::packet::{
    EofData, ErrPacket, ErrorData, OkData, Packet, PacketType, EOF_HEADER, MAX_PAYLOAD_LEN,
    OK_HEADER,
};
use crate::mysql::protocol::auth_switch_request::{
    AuthMoreData, AuthSwitchRequest, AUTH_MORE_DATA_HEADER,
};
use crate::mysql::protocol::handshake::Handshake;
use crate::mysql::protocol::handshake_response::HandshakeResponse;
use crate::mysql::protocol::result_set::{self, ColumnDefinition};
use crate::mysql::protocol::stmt_prepare::StmtPrepareOk;
use crate::mysql::types::ByteCursor;
use crate::util::packet_printer;

/// Raw bytes and assembled packets of one direction.
#[derive(Debug, Default)]
struct PacketStream {
    buf: Vec<u8>,
    packets: VecDeque<Packet>,
}

impl PacketStream {
    /// Cuts every complete frame off the buffer, gluing continued frames
    /// onto the packet they belong to.
    fn push(&mut self, bytes: &[u8], direction: Direction) -> Result<()> {
        self.buf.extend_from_slice(bytes);

        while Packet::contains_full_packet(&self.buf) {
            let frame = Packet::extract(&mut self.buf)?;
            match self.packets.back_mut() {
                Some(last) if last.continuation => {
                    let expected = last.last_seq.wrapping_add(1);
                    if frame.seq != expected {
                        return Err(Error::Sequence {
                            direction,
                            expected,
                            actual: frame.seq,
                        });
                    }
                    last.append(frame);
                }
                _ => self.packets.push_back(frame),
            }
        }
        Ok(())
    }

    /// Next packet whose frames have all arrived.
    fn pop(&mut self) -> Option<Packet> {
        match self.packets.front() {
            Some(packet) if !packet.continuation => self.packets.pop_front(),
            _ => None,
        }
    }

    fn clear(&mut self) {
        self.buf = Vec::new();
        self.packets.clear();
    }
}

/// Decodes both directions of one MySQL connection.
///
/// Bytes may be fed in chunks of any size. Packets are decoded once the
/// connection state expects their direction, so the two streams can be fed
/// independently of each other. The first error disables the decoder: it is
/// returned once and later calls do nothing.
pub struct Decoder<S: MessageSink> {
    connection: Connection,
    client: PacketStream,
    server: PacketStream,
    sink: S,
    failure: Option<Error>,
}

impl<S: MessageSink> Decoder<S> {
    pub fn new(sink: S) -> Self {
        Decoder {
            connection: Connection::new(),
            client: PacketStream::default(),
            server: PacketStream::default(),
            sink,
            failure: None,
        }
    }

    /// Bytes sent by the client to the server.
    pub fn feed_client(&mut self, bytes: &[u8]) -> Result<()> {
        self.feed(Direction::Client, bytes)
    }

    /// Bytes sent by the server to the client.
    pub fn feed_server(&mut self, bytes: &[u8]) -> Result<()> {
        self.feed(Direction::Server, bytes)
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The error that stopped the decoder, if any.
    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    pub fn is_disabled(&self) -> bool {
        self.failure.is_some()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn feed(&mut self, direction: Direction, bytes: &[u8]) -> Result<()> {
        if self.failure.is_some() {
            return Ok(());
        }

        let result = self.process(direction, bytes);
        if let Err(error) = &result {
            warn!(
                "giving up on connection in {:?}: {}",
                self.connection.state, error
            );
            self.failure = Some(error.clone());
            self.client.clear();
            self.server.clear();
        }
        result
    }

    fn process(&mut self, direction: Direction, bytes: &[u8]) -> Result<()> {
        self.stream(direction).push(bytes, direction)?;
        self.dispatch()
    }

    fn stream(&mut self, direction: Direction) -> &mut PacketStream {
        match direction {
            Direction::Client => &mut self.client,
            Direction::Server => &mut self.server,
        }
    }

    /// Decodes queued packets for as long as the expected peer has one.
    fn dispatch(&mut self) -> Result<()> {
        loop {
            let direction = self.connection.state.expects();
            let Some(packet) = self.stream(direction).pop() else {
                return Ok(());
            };

            if packet.seq != self.connection.sequence {
                return Err(Error::Sequence {
                    direction,
                    expected: self.connection.sequence,
                    actual: packet.seq,
                });
            }
            self.connection.advance_sequence(packet.frames);

            trace!(
                "{} packet seq={} len={} in {:?}\n{}",
                direction,
                packet.seq,
                packet.len(),
                self.connection.state,
                packet_printer::format_packet(&packet)
            );
            self.handle(packet)?;
        }
    }

    fn handle(&mut self, packet: Packet) -> Result<()> {
        match self.connection.state {
            ConnectionState::AwaitingServerHandshake => self.on_server_handshake(packet),
            ConnectionState::AwaitingClientHandshake => self.on_client_handshake(packet),
            ConnectionState::AwaitingHandshakeResult => self.on_handshake_result(packet),
            ConnectionState::AwaitingClientAuthData => self.on_auth_data(packet),
            ConnectionState::AwaitingClientCommand => self.on_command(packet),
            ConnectionState::AwaitingQueryResult => self.on_query_result(packet),
            ConnectionState::LocalInfileData => self.on_local_infile_data(packet),
            ConnectionState::LocalInfileResult => self.on_local_infile_result(packet),
        }
    }

    fn emit(&mut self, message: Message) {
        trace!("{:?}", message);
        self.sink.on_message(message);
    }

    /// Emits an ERR packet; false when it was a progress report.
    fn emit_err(&mut self, packet: &Packet) -> Result<bool> {
        let err = ErrorData::from_packet(packet, self.connection.capabilities)?;
        let is_error = matches!(err, ErrPacket::Error(_));
        self.emit(err.into());
        Ok(is_error)
    }

    fn unsupported(&self, packet: &Packet) -> Error {
        let packet = match packet.header() {
            Some(header) => format!("{} byte packet with header {header:#04x}", packet.len()),
            None => "empty packet".to_owned(),
        };
        Error::UnsupportedState {
            state: self.connection.state,
            packet,
        }
    }

    fn on_server_handshake(&mut self, packet: Packet) -> Result<()> {
        // The server may refuse the connection before greeting.
        if packet.packet_type(self.connection.capabilities) == PacketType::Error {
            self.emit_err(&packet)?;
            return Ok(());
        }

        let handshake = Handshake::from_packet(&packet)?;
        self.connection.server_capabilities = handshake.capability_flags;
        self.connection.capabilities = handshake.capability_flags;
        self.emit(Message::ServerHandshake(handshake));
        self.connection
            .set_state(ConnectionState::AwaitingClientHandshake);
        Ok(())
    }

    fn on_client_handshake(&mut self, packet: Packet) -> Result<()> {
        if HandshakeResponse::is_ssl_request(&packet) {
            return Err(Error::Unsupported("TLS encrypted connection"));
        }

        let response = HandshakeResponse::from_packet(&packet)?;
        self.connection.capabilities = self.connection.server_capabilities & response.client_flag;
        self.emit(Message::ClientHandshake(response));

        if self
            .connection
            .capabilities
            .contains(CapabilityFlags::CLIENT_COMPRESS)
        {
            return Err(Error::Unsupported("compressed protocol"));
        }
        self.connection
            .set_state(ConnectionState::AwaitingHandshakeResult);
        Ok(())
    }

    fn on_handshake_result(&mut self, packet: Packet) -> Result<()> {
        let capabilities = self.connection.capabilities;

        match packet.packet_type(capabilities) {
            PacketType::Ok => {
                let ok = OkData::from_packet(&packet, capabilities)?;
                self.emit(Message::Ok(ok));
                self.connection.reset();
            }
            PacketType::Eof => {
                let eof = EofData::from_packet(&packet, capabilities)?;
                self.emit(Message::Eof(eof));
                self.connection.reset();
            }
            PacketType::Error | PacketType::Progress => {
                if self.emit_err(&packet)? {
                    self.connection.reset();
                }
            }
            _ => match packet.header() {
                Some(EOF_HEADER) => {
                    let request = AuthSwitchRequest::from_packet(&packet)?;
                    self.emit(Message::AuthSwitchRequest(request));
                    self.connection
                        .set_state(ConnectionState::AwaitingClientAuthData);
                }
                Some(AUTH_MORE_DATA_HEADER) => {
                    let more_data = AuthMoreData::from_packet(&packet)?;
                    let fast_auth = more_data.is_fast_auth_success();
                    self.emit(Message::AuthMoreData(more_data));
                    if !fast_auth {
                        self.connection
                            .set_state(ConnectionState::AwaitingClientAuthData);
                    }
                }
                _ => return Err(self.unsupported(&packet)),
            },
        }
        Ok(())
    }

    fn on_auth_data(&mut self, packet: Packet) -> Result<()> {
        self.emit(Message::AuthData { len: packet.len() });
        self.connection
            .set_state(ConnectionState::AwaitingHandshakeResult);
        Ok(())
    }

    fn on_command(&mut self, packet: Packet) -> Result<()> {
        let command = Command::from_packet(&packet)?;
        let com_code = command.com_code;
        self.connection.last_command = Some(com_code);
        self.emit(Message::Command(command));

        match com_code {
            MySqlCommand::ComStmtFetch => self.connection.begin_rows(),
            MySqlCommand::ComChangeUser => {
                self.connection.set_query_state(QueryState::Idle);
                self.connection
                    .set_state(ConnectionState::AwaitingHandshakeResult);
            }
            _ if com_code.expects_response() => self.connection.begin_result(),
            _ => self.connection.reset(),
        }
        Ok(())
    }

    fn on_query_result(&mut self, packet: Packet) -> Result<()> {
        let packet_type = packet.packet_type(self.connection.capabilities);
        if packet_type == PacketType::Progress {
            self.emit_err(&packet)?;
            return Ok(());
        }

        match self.connection.query_state {
            QueryState::ReadingColumnDefinitions => {
                self.on_column_definitions(packet, packet_type)
            }
            QueryState::ReadingRows => self.on_rows(packet, packet_type),
            QueryState::Idle => Err(self.unsupported(&packet)),
        }
    }

    fn on_column_definitions(&mut self, packet: Packet, packet_type: PacketType) -> Result<()> {
        if packet_type == PacketType::Error {
            self.emit_err(&packet)?;
            self.connection.reset();
            return Ok(());
        }

        if self.connection.column_count.is_none() {
            return self.on_first_response(packet, packet_type);
        }

        if self.connection.columns_remaining > 0 {
            let column = ColumnDefinition::from_packet(&packet)?;
            self.emit(Message::ColumnDefinition(column));
            self.connection.columns_remaining -= 1;
            if self.connection.columns_remaining == 0 && self.connection.deprecate_eof() {
                self.end_of_definitions();
            }
            return Ok(());
        }

        if packet_type == PacketType::Eof {
            let eof = EofData::from_packet(&packet, self.connection.capabilities)?;
            self.emit(Message::Eof(eof));
            self.end_of_definitions();
            return Ok(());
        }
        Err(self.unsupported(&packet))
    }

    /// First packet of a command response.
    fn on_first_response(&mut self, packet: Packet, packet_type: PacketType) -> Result<()> {
        let capabilities = self.connection.capabilities;
        let last_command = self.connection.last_command;

        // A column count is never zero, so 0x00 is always OK here.
        if packet_type == PacketType::Ok || packet.header() == Some(OK_HEADER) {
            if last_command == Some(MySqlCommand::ComStmtPrepare) {
                let prepared = StmtPrepareOk::from_packet(&packet)?;
                self.connection.pending_definitions = [prepared.num_params, prepared.num_columns]
                    .into_iter()
                    .filter(|&count| count > 0)
                    .map(u64::from)
                    .collect();
                self.emit(Message::StmtPrepareOk(prepared));
                self.next_definition_block();
            } else {
                let ok = OkData::from_packet(&packet, capabilities)?;
                let more_results = ok.more_results();
                self.emit(Message::Ok(ok));
                self.finish_result(more_results);
            }
            return Ok(());
        }

        match packet_type {
            PacketType::Eof if last_command == Some(MySqlCommand::ComFieldList) => {
                let (message, _) = self.decode_terminator(&packet)?;
                self.emit(message);
                self.connection.reset();
            }
            PacketType::Eof => {
                let eof = EofData::from_packet(&packet, capabilities)?;
                self.emit(Message::Eof(eof));
                self.connection.set_query_state(QueryState::ReadingRows);
            }
            PacketType::LocalInfile => {
                let mut cursor = ByteCursor::new(&packet.body);
                cursor.skip(1)?;
                let filename = cursor.get_string_rest();
                self.emit(Message::LocalInfileRequest { filename });
                self.connection.set_state(ConnectionState::LocalInfileData);
                self.connection.set_query_state(QueryState::Idle);
            }
            _ if last_command == Some(MySqlCommand::ComFieldList) => {
                let column = ColumnDefinition::from_packet(&packet)?;
                self.emit(Message::ColumnDefinition(column));
            }
            _ => {
                let (column_count, metadata_follows) =
                    result_set::column_count(&packet, capabilities)?;
                self.emit(Message::ResultSetHeader { column_count });
                if metadata_follows {
                    self.connection.begin_definitions(column_count);
                } else {
                    self.connection.begin_definitions(0);
                    if self.connection.deprecate_eof() {
                        self.end_of_definitions();
                    }
                }
            }
        }
        Ok(())
    }

    fn on_rows(&mut self, packet: Packet, packet_type: PacketType) -> Result<()> {
        // Binary rows and text rows led by an empty string start with 0x00,
        // and rows never end with a 0x00 OK.
        match packet_type {
            PacketType::Error => {
                self.emit_err(&packet)?;
                self.connection.reset();
            }
            PacketType::Eof => self.on_terminator(&packet)?,
            // Under CLIENT_DEPRECATE_EOF the closing OK can outgrow an EOF.
            _ if self.connection.deprecate_eof()
                && packet.header() == Some(EOF_HEADER)
                && packet.len() < MAX_PAYLOAD_LEN =>
            {
                self.on_terminator(&packet)?
            }
            _ => self.emit(Message::Row { len: packet.len() }),
        }
        Ok(())
    }

    fn on_local_infile_data(&mut self, packet: Packet) -> Result<()> {
        let len = packet.len();
        self.emit(Message::LocalInfileData { len });
        if len == 0 {
            self.connection.set_state(ConnectionState::LocalInfileResult);
        }
        Ok(())
    }

    fn on_local_infile_result(&mut self, packet: Packet) -> Result<()> {
        match packet.packet_type(self.connection.capabilities) {
            PacketType::Ok | PacketType::Eof => self.on_terminator(&packet),
            PacketType::Error | PacketType::Progress => {
                if self.emit_err(&packet)? {
                    self.connection.reset();
                }
                Ok(())
            }
            _ => Err(self.unsupported(&packet)),
        }
    }

    /// Decodes the OK or EOF packet that ends a result, and whether another
    /// result follows.
    fn decode_terminator(&self, packet: &Packet) -> Result<(Message, bool)> {
        let capabilities = self.connection.capabilities;

        if packet.header() == Some(EOF_HEADER) && !self.connection.deprecate_eof() {
            let eof = EofData::from_packet(packet, capabilities)?;
            let more_results = eof.more_results();
            return Ok((Message::Eof(eof), more_results));
        }

        let ok = OkData::from_packet(packet, capabilities)?;
        let more_results = ok.more_results();
        Ok((Message::Ok(ok), more_results))
    }

    fn on_terminator(&mut self, packet: &Packet) -> Result<()> {
        let (message, more_results) = self.decode_terminator(packet)?;
        self.emit(message);
        self.finish_result(more_results);
        Ok(())
    }

    fn finish_result(&mut self, more_results: bool) {
        if more_results {
            self.connection.begin_result();
        } else {
            self.connection.reset();
        }
    }

    fn end_of_definitions(&mut self) {
        if self.connection.last_command == Some(MySqlCommand::ComStmtPrepare) {
            self.next_definition_block();
        } else {
            self.connection.set_query_state(QueryState::ReadingRows);
        }
    }

    /// Parameter definitions first, then column definitions.
    fn next_definition_block(&mut self) {
        if self.connection.pending_definitions.is_empty() {
            self.connection.reset();
            return;
        }
        let count = self.connection.pending_definitions.remove(0);
        self.connection.begin_definitions(count);
    }
}
