use serde::Serialize;

use crate::error::{Error, Result};
use crate::mysql::packet::{Packet, EOF_HEADER};
use crate::mysql::types::ByteCursor;

pub const AUTH_MORE_DATA_HEADER: u8 = 0x01;
/// caching_sha2_password: the scramble matched the server cache.
pub const FAST_AUTH_SUCCESS: u8 = 0x03;

/// Server asks the client to authenticate again with another plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSwitchRequest {
    pub plugin_name: String,
    pub plugin_data: Vec<u8>,
}

impl AuthSwitchRequest {
    pub fn from_packet(packet: &Packet) -> Result<AuthSwitchRequest> {
        let mut cursor = ByteCursor::new(&packet.body);

        let status_tag = cursor.get_u8()?;
        if status_tag != EOF_HEADER {
            return Err(Error::Decode(format!(
                "auth switch request starts with {status_tag:#04x}"
            )));
        }

        let plugin_name = cursor.get_string_null()?;
        let plugin_data = cursor.get_rest();

        Ok(AuthSwitchRequest {
            plugin_name,
            plugin_data: plugin_data.strip_suffix(&[0x00]).unwrap_or(plugin_data).to_vec(),
        })
    }
}

/// Extra round of plugin specific data from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthMoreData {
    pub data: Vec<u8>,
}

impl AuthMoreData {
    pub fn from_packet(packet: &Packet) -> Result<AuthMoreData> {
        let mut cursor = ByteCursor::new(&packet.body);

        let status_tag = cursor.get_u8()?;
        if status_tag != AUTH_MORE_DATA_HEADER {
            return Err(Error::Decode(format!(
                "auth more data starts with {status_tag:#04x}"
            )));
        }

        Ok(AuthMoreData {
            data: cursor.get_rest().to_vec(),
        })
    }

    pub fn is_fast_auth_success(&self) -> bool {
        self.data == [FAST_AUTH_SUCCESS]
    }
}
