use serde::Serialize;

use crate::error::{Error, Result};
use crate::mysql::packet::Packet;
use crate::mysql::types::ByteCursor;

/// A command sent by the client in the command phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    pub com_code: MySqlCommand,
    pub name: &'static str,
    /// Statement text of `COM_QUERY`, schema name of `COM_INIT_DB`.
    pub arg: Option<String>,
}

impl Command {
    pub fn from_packet(packet: &Packet) -> Result<Command> {
        let mut cursor = ByteCursor::new(&packet.body);

        let code = cursor.get_u8()?;
        let com_code = MySqlCommand::from_byte(code)
            .ok_or_else(|| Error::Decode(format!("unknown command {code:#04x}")))?;

        let arg = match com_code {
            MySqlCommand::ComQuery | MySqlCommand::ComInitDb => Some(cursor.get_string_rest()),
            _ => None,
        };

        Ok(Command {
            com_code,
            name: com_code.name(),
            arg,
        })
    }

    pub fn code(&self) -> u8 {
        self.com_code as u8
    }
}

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum MySqlCommand {
    ComSleep = 0x00,
    ComQuit = 0x01,
    ComInitDb = 0x02,
    ComQuery = 0x03,
    ComFieldList = 0x04,
    ComCreateDb = 0x05,
    ComDropDb = 0x06,
    ComRefresh = 0x07,
    ComShutdown = 0x08,
    ComStatistics = 0x09,
    ComProcessInfo = 0x0A,
    ComConnect = 0x0B,
    ComProcessKill = 0x0C,
    ComDebug = 0x0D,
    ComPing = 0x0E,
    ComTime = 0x0F,
    ComDelayedInsert = 0x10,
    ComChangeUser = 0x11,
    ComBinlogDump = 0x12,
    ComTableDump = 0x13,
    ComConnectOut = 0x14,
    ComRegisterSlave = 0x15,
    ComStmtPrepare = 0x16,
    ComStmtExecute = 0x17,
    ComStmtSendLongData = 0x18,
    ComStmtClose = 0x19,
    ComStmtReset = 0x1A,
    ComSetOption = 0x1B,
    ComStmtFetch = 0x1C,
    ComDaemon = 0x1D,
    ComBinlogDumpGtid = 0x1E,
    ComResetConnection = 0x1F,
}

impl MySqlCommand {
    /// Try to convert a u8 value to a MySqlCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(MySqlCommand::ComSleep),
            0x01 => Some(MySqlCommand::ComQuit),
            0x02 => Some(MySqlCommand::ComInitDb),
            0x03 => Some(MySqlCommand::ComQuery),
            0x04 => Some(MySqlCommand::ComFieldList),
            0x05 => Some(MySqlCommand::ComCreateDb),
            0x06 => Some(MySqlCommand::ComDropDb),
            0x07 => Some(MySqlCommand::ComRefresh),
            0x08 => Some(MySqlCommand::ComShutdown),
            0x09 => Some(MySqlCommand::ComStatistics),
            0x0A => Some(MySqlCommand::ComProcessInfo),
            0x0B => Some(MySqlCommand::ComConnect),
            0x0C => Some(MySqlCommand::ComProcessKill),
            0x0D => Some(MySqlCommand::ComDebug),
            0x0E => Some(MySqlCommand::ComPing),
            0x0F => Some(MySqlCommand::ComTime),
            0x10 => Some(MySqlCommand::ComDelayedInsert),
            0x11 => Some(MySqlCommand::ComChangeUser),
            0x12 => Some(MySqlCommand::ComBinlogDump),
            0x13 => Some(MySqlCommand::ComTableDump),
            0x14 => Some(MySqlCommand::ComConnectOut),
            0x15 => Some(MySqlCommand::ComRegisterSlave),
            0x16 => Some(MySqlCommand::ComStmtPrepare),
            0x17 => Some(MySqlCommand::ComStmtExecute),
            0x18 => Some(MySqlCommand::ComStmtSendLongData),
            0x19 => Some(MySqlCommand::ComStmtClose),
            0x1A => Some(MySqlCommand::ComStmtReset),
            0x1B => Some(MySqlCommand::ComSetOption),
            0x1C => Some(MySqlCommand::ComStmtFetch),
            0x1D => Some(MySqlCommand::ComDaemon),
            0x1E => Some(MySqlCommand::ComBinlogDumpGtid),
            0x1F => Some(MySqlCommand::ComResetConnection),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MySqlCommand::ComSleep => "COM_SLEEP",
            MySqlCommand::ComQuit => "COM_QUIT",
            MySqlCommand::ComInitDb => "COM_INIT_DB",
            MySqlCommand::ComQuery => "COM_QUERY",
            MySqlCommand::ComFieldList => "COM_FIELD_LIST",
            MySqlCommand::ComCreateDb => "COM_CREATE_DB",
            MySqlCommand::ComDropDb => "COM_DROP_DB",
            MySqlCommand::ComRefresh => "COM_REFRESH",
            MySqlCommand::ComShutdown => "COM_SHUTDOWN",
            MySqlCommand::ComStatistics => "COM_STATISTICS",
            MySqlCommand::ComProcessInfo => "COM_PROCESS_INFO",
            MySqlCommand::ComConnect => "COM_CONNECT",
            MySqlCommand::ComProcessKill => "COM_PROCESS_KILL",
            MySqlCommand::ComDebug => "COM_DEBUG",
            MySqlCommand::ComPing => "COM_PING",
            MySqlCommand::ComTime => "COM_TIME",
            MySqlCommand::ComDelayedInsert => "COM_DELAYED_INSERT",
            MySqlCommand::ComChangeUser => "COM_CHANGE_USER",
            MySqlCommand::ComBinlogDump => "COM_BINLOG_DUMP",
            MySqlCommand::ComTableDump => "COM_TABLE_DUMP",
            MySqlCommand::ComConnectOut => "COM_CONNECT_OUT",
            MySqlCommand::ComRegisterSlave => "COM_REGISTER_SLAVE",
            MySqlCommand::ComStmtPrepare => "COM_STMT_PREPARE",
            MySqlCommand::ComStmtExecute => "COM_STMT_EXECUTE",
            MySqlCommand::ComStmtSendLongData => "COM_STMT_SEND_LONG_DATA",
            MySqlCommand::ComStmtClose => "COM_STMT_CLOSE",
            MySqlCommand::ComStmtReset => "COM_STMT_RESET",
            MySqlCommand::ComSetOption => "COM_SET_OPTION",
            MySqlCommand::ComStmtFetch => "COM_STMT_FETCH",
            MySqlCommand::ComDaemon => "COM_DAEMON",
            MySqlCommand::ComBinlogDumpGtid => "COM_BINLOG_DUMP_GTID",
            MySqlCommand::ComResetConnection => "COM_RESET_CONNECTION",
        }
    }

    /// The server sends nothing back for these.
    pub fn expects_response(self) -> bool {
        !matches!(
            self,
            MySqlCommand::ComQuit | MySqlCommand::ComStmtClose | MySqlCommand::ComStmtSendLongData
        )
    }
}
