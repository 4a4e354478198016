use serde::Serialize;

use crate::error::Result;
use crate::mysql::flags::{CapabilityFlags, StatusFlags};
use crate::mysql::packet::Packet;
use crate::mysql::types::{to_string, ByteCursor};

const RESERVED_LEN: usize = 10;
const MIN_AUTH_PLUGIN_DATA_PART_2_LEN: usize = 13;

/// Initial greeting sent by the server.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_connection_phase_packets_protocol_handshake_v10.html>
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handshake {
    pub protocol_version: u8,
    pub server_version: String,
    pub thread_id: u32,
    /// Both parts of the scramble, without the trailing NUL.
    pub auth_plugin_data: Vec<u8>,
    pub capability_flags: CapabilityFlags,
    pub character_set: u8,
    pub status_flags: StatusFlags,
    pub auth_plugin_name: Option<String>,
}

impl Handshake {
    pub fn from_packet(packet: &Packet) -> Result<Handshake> {
        let mut cursor = ByteCursor::new(&packet.body);

        let protocol_version = cursor.get_u8()?;
        let server_version = cursor.get_string_null()?;
        let thread_id = cursor.get_u32()?;
        let mut auth_plugin_data = cursor.get_bytes_null()?.to_vec();

        let mut capabilities = u32::from(cursor.get_u16()?);
        let character_set = cursor.get_u8()?;
        let status_flags = StatusFlags::from_wire(cursor.get_u16()?);
        capabilities |= u32::from(cursor.get_u16()?) << 16;
        let capability_flags = CapabilityFlags::from_wire(capabilities);

        let auth_plugin_data_len = cursor.get_u8()? as usize;
        cursor.skip(RESERVED_LEN)?;

        if capability_flags
            .intersects(CapabilityFlags::CLIENT_SECURE_CONNECTION | CapabilityFlags::CLIENT_PLUGIN_AUTH)
        {
            let len = MIN_AUTH_PLUGIN_DATA_PART_2_LEN.max(auth_plugin_data_len.saturating_sub(8));
            let part_2 = cursor.get_bytes(len)?;
            auth_plugin_data.extend_from_slice(part_2.strip_suffix(&[0x00]).unwrap_or(part_2));
        }

        let mut auth_plugin_name = None;
        if capability_flags.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
            // Some server versions forget the terminator.
            auth_plugin_name = Some(match cursor.get_bytes_null() {
                Ok(name) => to_string(name),
                Err(_) => cursor.get_string_rest(),
            });
        }

        Ok(Handshake {
            protocol_version,
            server_version,
            thread_id,
            auth_plugin_data,
            capability_flags,
            character_set,
            status_flags,
            auth_plugin_name,
        })
    }
}
