use serde::Serialize;

use crate::error::{Error, Result};
use crate::mysql::packet::{Packet, OK_HEADER};
use crate::mysql::types::ByteCursor;

/// First packet of a successful `COM_STMT_PREPARE` response.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_com_stmt_prepare.html>
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StmtPrepareOk {
    pub statement_id: u32,
    pub num_columns: u16,
    pub num_params: u16,
    pub warnings: u16,
}

impl StmtPrepareOk {
    pub fn from_packet(packet: &Packet) -> Result<StmtPrepareOk> {
        let mut cursor = ByteCursor::new(&packet.body);

        let status = cursor.get_u8()?;
        if status != OK_HEADER {
            return Err(Error::Decode(format!(
                "prepare response starts with {status:#04x}"
            )));
        }

        let statement_id = cursor.get_u32()?;
        let num_columns = cursor.get_u16()?;
        let num_params = cursor.get_u16()?;
        cursor.skip(1)?;

        Ok(StmtPrepareOk {
            statement_id,
            num_columns,
            num_params,
            warnings: cursor.get_u16()?,
        })
    }
}
