use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::mysql::flags::CapabilityFlags;
use crate::mysql::packet::Packet;
use crate::mysql::types::{to_string, ByteCursor};

const FILLER_LEN: usize = 23;
/// capability flags, max packet size, character set and filler
const SSL_REQUEST_LEN: usize = 4 + 4 + 1 + FILLER_LEN;

/// The client's answer to the server greeting.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_connection_phase_packets_protocol_handshake_response.html>
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct HandshakeResponse {
    pub client_flag: CapabilityFlags,
    pub max_packet_size: u32,
    pub character_set: Option<u8>,
    pub username: String,
    pub auth_response: Vec<u8>,
    pub database: Option<String>,
    pub client_plugin_name: Option<String>,
    pub connection_attrs: BTreeMap<String, String>,
    /// Only sent by pre-4.1 clients.
    pub password: Option<String>,
}

impl HandshakeResponse {
    /// An SSLRequest carries the capability block only; everything after it
    /// is TLS.
    pub fn is_ssl_request(packet: &Packet) -> bool {
        let cursor = ByteCursor::new(&packet.body);
        let Ok(flags) = cursor.peek_u32() else {
            return false;
        };

        let client_flag = CapabilityFlags::from_wire(flags);
        client_flag.contains(CapabilityFlags::CLIENT_SSL)
            && client_flag.contains(CapabilityFlags::CLIENT_PROTOCOL_41)
            && packet.len() == SSL_REQUEST_LEN
    }

    pub fn from_packet(packet: &Packet) -> Result<HandshakeResponse> {
        let mut cursor = ByteCursor::new(&packet.body);

        let mut client_flag = CapabilityFlags::from_wire(u32::from(cursor.get_u16()?));

        if !client_flag.contains(CapabilityFlags::CLIENT_PROTOCOL_41) {
            return Ok(HandshakeResponse {
                client_flag,
                max_packet_size: cursor.get_u24()?,
                username: cursor.get_string_null()?,
                password: Some(cursor.get_string_rest()),
                ..HandshakeResponse::default()
            });
        }

        client_flag |= CapabilityFlags::from_wire(u32::from(cursor.get_u16()?) << 16);
        let max_packet_size = cursor.get_u32()?;
        let character_set = cursor.get_u8()?;
        cursor.skip(FILLER_LEN)?;
        let username = cursor.get_string_null()?;

        let auth_response =
            if client_flag.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA) {
                cursor.get_bytes_lenenc()?
            } else if client_flag.contains(CapabilityFlags::CLIENT_SECURE_CONNECTION) {
                cursor.get_bytes_prefixed()?
            } else {
                cursor.get_bytes_null()?
            }
            .to_vec();

        let mut database = None;
        if client_flag.contains(CapabilityFlags::CLIENT_CONNECT_WITH_DB) {
            database = Some(cursor.get_string_null()?);
        }

        let mut client_plugin_name = None;
        if client_flag.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
            client_plugin_name = Some(cursor.get_string_null()?);
        }

        let mut connection_attrs = BTreeMap::new();
        if client_flag.contains(CapabilityFlags::CLIENT_CONNECT_ATTRS) {
            connection_attrs = read_connection_attrs(&mut cursor)?;
        }

        Ok(HandshakeResponse {
            client_flag,
            max_packet_size,
            character_set: Some(character_set),
            username,
            auth_response,
            database,
            client_plugin_name,
            connection_attrs,
            password: None,
        })
    }
}

/// Key/value pairs preceded by their total length in bytes.
fn read_connection_attrs(cursor: &mut ByteCursor) -> Result<BTreeMap<String, String>> {
    let total = cursor.get_int_lenenc()? as usize;
    let start = cursor.offset();

    let mut connection_attrs = BTreeMap::new();
    while cursor.offset() - start < total {
        let key = cursor.get_bytes_lenenc()?;
        let value = cursor.get_bytes_lenenc()?;
        connection_attrs.insert(to_string(key), to_string(value));
    }

    if cursor.offset() - start != total {
        return Err(Error::Decode(format!(
            "connection attributes overran their length of {total} bytes"
        )));
    }
    Ok(connection_attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mysql::types::StringLenEnc;

    fn packet(bytes: &[u8]) -> Packet {
        let mut buf = bytes.to_vec();
        Packet::extract(&mut buf).unwrap()
    }

    #[test]
    fn test_handshake_response() {
        let packet = packet(&[
            0xe2, 0x00, 0x00, 0x01, 0x8d, 0xa6, 0xff, 0x19, 0x00, 0x00, 0x00, 0x01, 0xff, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x72, 0x6f, 0x6f, 0x74, 0x00, 0x20,
            0x6d, 0xa0, 0xcf, 0x99, 0x9c, 0xa0, 0x73, 0x04, 0xbd, 0xc1, 0x4d, 0xe8, 0xe4, 0x1b,
            0xa8, 0x35, 0x6e, 0x9d, 0xad, 0xa0, 0x53, 0xec, 0xa4, 0xa8, 0xef, 0x5e, 0x1c, 0x0f,
            0xb3, 0xd4, 0xe4, 0xd5, 0x73, 0x77, 0x69, 0x74, 0x63, 0x68, 0x72, 0x6f, 0x75, 0x74,
            0x65, 0x72, 0x00, 0x63, 0x61, 0x63, 0x68, 0x69, 0x6e, 0x67, 0x5f, 0x73, 0x68, 0x61,
            0x32, 0x5f, 0x70, 0x61, 0x73, 0x73, 0x77, 0x6f, 0x72, 0x64, 0x00, 0x78, 0x04, 0x5f,
            0x70, 0x69, 0x64, 0x06, 0x31, 0x37, 0x39, 0x30, 0x31, 0x38, 0x09, 0x5f, 0x70, 0x6c,
            0x61, 0x74, 0x66, 0x6f, 0x72, 0x6d, 0x06, 0x78, 0x38, 0x36, 0x5f, 0x36, 0x34, 0x03,
            0x5f, 0x6f, 0x73, 0x05, 0x4c, 0x69, 0x6e, 0x75, 0x78, 0x0c, 0x5f, 0x63, 0x6c, 0x69,
            0x65, 0x6e, 0x74, 0x5f, 0x6e, 0x61, 0x6d, 0x65, 0x08, 0x6c, 0x69, 0x62, 0x6d, 0x79,
            0x73, 0x71, 0x6c, 0x07, 0x6f, 0x73, 0x5f, 0x75, 0x73, 0x65, 0x72, 0x08, 0x64, 0x61,
            0x6e, 0x69, 0x79, 0x61, 0x61, 0x6c, 0x0f, 0x5f, 0x63, 0x6c, 0x69, 0x65, 0x6e, 0x74,
            0x5f, 0x76, 0x65, 0x72, 0x73, 0x69, 0x6f, 0x6e, 0x06, 0x38, 0x2e, 0x30, 0x2e, 0x34,
            0x30, 0x0c, 0x70, 0x72, 0x6f, 0x67, 0x72, 0x61, 0x6d, 0x5f, 0x6e, 0x61, 0x6d, 0x65,
            0x05, 0x6d, 0x79, 0x73, 0x71, 0x6c,
        ]);

        assert_eq!(1, packet.seq);
        let response = HandshakeResponse::from_packet(&packet).unwrap();

        assert_eq!(0x19ff_a68d, response.client_flag.bits());
        assert_eq!(16_777_216, response.max_packet_size);
        assert_eq!(Some(255), response.character_set);
        assert_eq!("root", response.username);
        assert_eq!(32, response.auth_response.len());
        assert_eq!(Some("switchrouter".to_owned()), response.database);
        assert_eq!(
            Some("caching_sha2_password".to_owned()),
            response.client_plugin_name
        );
        assert_eq!(7, response.connection_attrs.len());
        assert_eq!("libmysql", response.connection_attrs["_client_name"]);
        assert_eq!("8.0.40", response.connection_attrs["_client_version"]);
        assert_eq!("mysql", response.connection_attrs["program_name"]);
        assert_eq!(None, response.password);
        assert!(!HandshakeResponse::is_ssl_request(&packet));
    }

    fn response_41(client_flag: CapabilityFlags) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend(client_flag.bits().to_le_bytes());
        body.extend(0x0100_0000u32.to_le_bytes());
        body.push(0x21);
        body.extend([0u8; FILLER_LEN]);
        body.extend_from_slice(b"app\0");
        body
    }

    #[test]
    fn test_length_prefixed_auth_response() {
        let client_flag = CapabilityFlags::CLIENT_PROTOCOL_41
            | CapabilityFlags::CLIENT_SECURE_CONNECTION
            | CapabilityFlags::CLIENT_CONNECT_WITH_DB;
        let mut body = response_41(client_flag);
        body.extend([0x04, 0xde, 0xad, 0xbe, 0xef]);
        body.extend_from_slice(b"shop\0");

        let mut buf = Packet::to_bytes(1, &body);
        let response = HandshakeResponse::from_packet(&Packet::extract(&mut buf).unwrap()).unwrap();

        assert_eq!("app", response.username);
        assert_eq!(vec![0xde, 0xad, 0xbe, 0xef], response.auth_response);
        assert_eq!(Some("shop".to_owned()), response.database);
        assert_eq!(None, response.client_plugin_name);
        assert!(response.connection_attrs.is_empty());
    }

    #[test]
    fn test_null_terminated_auth_response() {
        let mut body = response_41(CapabilityFlags::CLIENT_PROTOCOL_41);
        body.extend_from_slice(b"secret\0");

        let mut buf = Packet::to_bytes(1, &body);
        let response = HandshakeResponse::from_packet(&Packet::extract(&mut buf).unwrap()).unwrap();
        assert_eq!(b"secret".to_vec(), response.auth_response);
    }

    #[test]
    fn test_connection_attrs_overrun() {
        let client_flag = CapabilityFlags::CLIENT_PROTOCOL_41
            | CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA
            | CapabilityFlags::CLIENT_CONNECT_ATTRS;
        let mut body = response_41(client_flag);
        body.push(0x00);
        body.push(0x05);
        body.extend(StringLenEnc::encode(b"_os"));
        body.extend(StringLenEnc::encode(b"Linux"));

        let mut buf = Packet::to_bytes(1, &body);
        assert!(matches!(
            HandshakeResponse::from_packet(&Packet::extract(&mut buf).unwrap()),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_pre_41_response() {
        let mut body = vec![0x85, 0x00, 0xff, 0xff, 0xff];
        body.extend_from_slice(b"legacy\0");
        body.extend_from_slice(b"pw");

        let mut buf = Packet::to_bytes(1, &body);
        let response = HandshakeResponse::from_packet(&Packet::extract(&mut buf).unwrap()).unwrap();

        assert_eq!(0x0085, response.client_flag.bits());
        assert_eq!(0xff_ffff, response.max_packet_size);
        assert_eq!(None, response.character_set);
        assert_eq!("legacy", response.username);
        assert_eq!(Some("pw".to_owned()), response.password);
    }

    #[test]
    fn test_ssl_request() {
        let client_flag = CapabilityFlags::CLIENT_PROTOCOL_41 | CapabilityFlags::CLIENT_SSL;
        let mut body = Vec::new();
        body.extend(client_flag.bits().to_le_bytes());
        body.extend(0x0100_0000u32.to_le_bytes());
        body.push(0x21);
        body.extend([0u8; FILLER_LEN]);

        let mut buf = Packet::to_bytes(1, &body);
        assert!(HandshakeResponse::is_ssl_request(&Packet::extract(&mut buf).unwrap()));
    }
}
