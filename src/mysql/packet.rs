use serde::Serialize;

use crate::error::{Error, Result};
use crate::mysql::flags::{CapabilityFlags, StatusFlags};
use crate::mysql::types::{to_string, ByteCursor};

/// Largest payload a single frame can carry. A frame of exactly this size is
/// continued by the next one.
pub const MAX_PAYLOAD_LEN: usize = 0xff_ffff;

pub const OK_HEADER: u8 = 0x00;
pub const LOCAL_INFILE_HEADER: u8 = 0xfb;
pub const EOF_HEADER: u8 = 0xfe;
pub const ERR_HEADER: u8 = 0xff;

const PROGRESS_ERROR_CODE: u16 = 0xffff;

/// One logical packet: a single frame, or several continued frames glued
/// together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence id of the first frame.
    pub seq: u8,
    /// Sequence id of the most recent frame.
    pub last_seq: u8,
    pub frames: usize,
    pub body: Vec<u8>,
    /// The last frame was full, more frames belong to this packet.
    pub continuation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub size: usize,
    pub seq: u8,
}

impl PacketHeader {
    pub fn from_bytes(bytes: &[u8; 4]) -> Self {
        let size = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]) as usize;
        Self {
            size,
            seq: bytes[3],
        }
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        let mut ret: [u8; 4] = [0x00; 4];
        ret[..3].copy_from_slice(&(self.size as u32).to_le_bytes()[..3]);
        ret[3] = self.seq;
        ret
    }
}

impl Packet {
    /// True when `buf` starts with a whole frame.
    pub fn contains_full_packet(buf: &[u8]) -> bool {
        match Self::peek_header(buf) {
            Some(header) => buf.len() >= header.size + 4,
            None => false,
        }
    }

    fn peek_header(buf: &[u8]) -> Option<PacketHeader> {
        let raw_header: &[u8; 4] = buf.get(..4)?.try_into().ok()?;
        Some(PacketHeader::from_bytes(raw_header))
    }

    /// Removes one frame from the front of `buf`.
    pub fn extract(buf: &mut Vec<u8>) -> Result<Packet> {
        let Some(header) = Self::peek_header(buf) else {
            return Err(Error::Underrun {
                needed: 4,
                available: buf.len(),
            });
        };
        if buf.len() < header.size + 4 {
            return Err(Error::Underrun {
                needed: header.size + 4,
                available: buf.len(),
            });
        }

        let body: Vec<u8> = buf.drain(..header.size + 4).skip(4).collect();

        Ok(Packet {
            seq: header.seq,
            last_seq: header.seq,
            frames: 1,
            body,
            continuation: header.size == MAX_PAYLOAD_LEN,
        })
    }

    /// Appends the next frame of a continued packet.
    pub fn append(&mut self, frame: Packet) {
        self.last_seq = frame.last_seq;
        self.frames += frame.frames;
        self.continuation = frame.continuation;
        self.body.extend(frame.body);
    }

    /// Splits the payload into frames starting at `seq`.
    pub fn to_bytes(seq: u8, body: &[u8]) -> Vec<u8> {
        let mut ret: Vec<u8> = Vec::with_capacity(body.len() + 4);
        let mut seq = seq;
        let mut chunks = body.chunks(MAX_PAYLOAD_LEN).peekable();

        if chunks.peek().is_none() {
            ret.extend(PacketHeader { size: 0, seq }.to_bytes());
            return ret;
        }

        while let Some(chunk) = chunks.next() {
            ret.extend(
                PacketHeader {
                    size: chunk.len(),
                    seq,
                }
                .to_bytes(),
            );
            ret.extend_from_slice(chunk);
            seq = seq.wrapping_add(1);

            if chunks.peek().is_none() && chunk.len() == MAX_PAYLOAD_LEN {
                ret.extend(PacketHeader { size: 0, seq }.to_bytes());
            }
        }
        ret
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn header(&self) -> Option<u8> {
        self.body.first().copied()
    }

    pub fn packet_type(&self, capabilities: CapabilityFlags) -> PacketType {
        PacketType::classify(&self.body, capabilities)
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum PacketType {
    Ok,
    Error,
    Eof,
    Progress,
    LocalInfile,
    Other,
}

impl PacketType {
    /// Looks at the first byte, and at the error code of ERR packets, to tell
    /// generic responses apart. Rows and column definitions come out as
    /// `Other`.
    pub fn classify(body: &[u8], capabilities: CapabilityFlags) -> PacketType {
        let cursor = ByteCursor::new(body);
        let Ok(header) = cursor.peek_u8() else {
            return PacketType::Other;
        };

        match header {
            OK_HEADER if body.len() >= 7 => PacketType::Ok,
            EOF_HEADER if body.len() <= 9 => PacketType::Eof,
            ERR_HEADER => {
                let code = cursor.peek_bytes(3).map(|b| u16::from_le_bytes([b[1], b[2]]));
                if code == Ok(PROGRESS_ERROR_CODE)
                    && capabilities.contains(CapabilityFlags::CLIENT_PROGRESS)
                {
                    PacketType::Progress
                } else {
                    PacketType::Error
                }
            }
            LOCAL_INFILE_HEADER => PacketType::LocalInfile,
            _ => PacketType::Other,
        }
    }
}

fn expect_header(cursor: &mut ByteCursor, expected: &[u8], what: &str) -> Result<u8> {
    let header = cursor.get_u8()?;
    if !expected.contains(&header) {
        return Err(Error::Decode(format!(
            "{what} packet starts with {header:#04x}"
        )));
    }
    Ok(header)
}

/// <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_basic_ok_packet.html>
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OkData {
    pub header: u8,
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: Option<StatusFlags>,
    pub warnings: Option<u16>,
    pub info: String,
    pub session_state_changes: Option<Vec<u8>>,
}

impl OkData {
    pub fn from_packet(packet: &Packet, capabilities: CapabilityFlags) -> Result<OkData> {
        let mut cursor = ByteCursor::new(&packet.body);

        // 0xfe is the OK packet that ends a result set under CLIENT_DEPRECATE_EOF.
        let header = expect_header(&mut cursor, &[OK_HEADER, EOF_HEADER], "OK")?;
        let affected_rows = cursor.get_int_lenenc()?;
        let last_insert_id = cursor.get_int_lenenc()?;

        let mut status_flags = None;
        let mut warnings = None;
        if capabilities.contains(CapabilityFlags::CLIENT_PROTOCOL_41) {
            status_flags = Some(StatusFlags::from_wire(cursor.get_u16()?));
            warnings = Some(cursor.get_u16()?);
        } else if capabilities.contains(CapabilityFlags::CLIENT_TRANSACTIONS) {
            status_flags = Some(StatusFlags::from_wire(cursor.get_u16()?));
        }

        let mut info = String::new();
        let mut session_state_changes = None;
        if capabilities.contains(CapabilityFlags::CLIENT_SESSION_TRACKING) {
            // Servers leave the info out entirely when it is empty.
            if !cursor.is_empty() {
                info = cursor.get_string_lenenc()?;
            }
            if status_flags
                .unwrap_or_default()
                .contains(StatusFlags::SERVER_SESSION_STATE_CHANGED)
            {
                session_state_changes = Some(cursor.get_bytes_lenenc()?.to_vec());
            }
        } else {
            info = cursor.get_string_rest();
        }

        Ok(OkData {
            header,
            affected_rows,
            last_insert_id,
            status_flags,
            warnings,
            info,
            session_state_changes,
        })
    }

    pub fn more_results(&self) -> bool {
        self.status_flags
            .unwrap_or_default()
            .contains(StatusFlags::SERVER_MORE_RESULTS_EXISTS)
    }
}

/// <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_basic_err_packet.html>
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorData {
    pub error_code: u16,
    pub sql_state: Option<SQLState>,
    pub error_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SQLState {
    pub state_marker: String,
    pub state: String,
}

/// MariaDB progress report, sent as an ERR packet with code 0xffff.
///
/// <https://mariadb.com/kb/en/err_packet/>
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressData {
    pub stage: u8,
    pub max_stage: u8,
    pub progress: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrPacket {
    Error(ErrorData),
    Progress(ProgressData),
}

impl ErrorData {
    pub fn from_packet(packet: &Packet, capabilities: CapabilityFlags) -> Result<ErrPacket> {
        let mut cursor = ByteCursor::new(&packet.body);

        expect_header(&mut cursor, &[ERR_HEADER], "ERR")?;
        let error_code = cursor.get_u16()?;

        if error_code == PROGRESS_ERROR_CODE
            && capabilities.contains(CapabilityFlags::CLIENT_PROGRESS)
        {
            return Ok(ErrPacket::Progress(ProgressData {
                stage: cursor.get_u8()?,
                max_stage: cursor.get_u8()?,
                progress: cursor.get_u24()?,
                message: cursor.get_string_lenenc()?,
            }));
        }

        let mut sql_state = None;
        if capabilities.contains(CapabilityFlags::CLIENT_PROTOCOL_41) {
            sql_state = Some(SQLState {
                state_marker: cursor.get_string_fixed(1)?,
                state: cursor.get_string_fixed(5)?,
            });
        }

        Ok(ErrPacket::Error(ErrorData {
            error_code,
            sql_state,
            error_message: to_string(cursor.get_rest()),
        }))
    }
}

/// <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_basic_eof_packet.html>
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EofData {
    pub warnings: Option<u16>,
    pub status_flags: Option<StatusFlags>,
}

impl EofData {
    pub fn from_packet(packet: &Packet, capabilities: CapabilityFlags) -> Result<EofData> {
        let mut cursor = ByteCursor::new(&packet.body);

        expect_header(&mut cursor, &[EOF_HEADER], "EOF")?;
        if cursor.remaining() >= 9 {
            return Err(Error::Decode(format!(
                "EOF packet too long: {} bytes",
                packet.len()
            )));
        }

        if capabilities.contains(CapabilityFlags::CLIENT_PROTOCOL_41) {
            return Ok(EofData {
                warnings: Some(cursor.get_u16()?),
                status_flags: Some(StatusFlags::from_wire(cursor.get_u16()?)),
            });
        }

        Ok(EofData {
            warnings: None,
            status_flags: None,
        })
    }

    pub fn more_results(&self) -> bool {
        self.status_flags
            .unwrap_or_default()
            .contains(StatusFlags::SERVER_MORE_RESULTS_EXISTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_41: CapabilityFlags = CapabilityFlags::CLIENT_PROTOCOL_41;

    fn packet(body: &[u8]) -> Packet {
        let mut buf = Packet::to_bytes(1, body);
        Packet::extract(&mut buf).unwrap()
    }

    #[test]
    fn test_single_frame() {
        let mut buf = vec![0x05, 0x00, 0x00, 0x07, 0x03, b'a', b'b', b'c', b'd', 0x01];

        assert!(Packet::contains_full_packet(&buf));
        let packet = Packet::extract(&mut buf).unwrap();

        assert_eq!(7, packet.seq);
        assert_eq!(vec![0x03, b'a', b'b', b'c', b'd'], packet.body);
        assert!(!packet.continuation);
        assert_eq!(vec![0x01], buf);
        assert!(!Packet::contains_full_packet(&buf));
    }

    #[test]
    fn test_partial_frames() {
        assert!(!Packet::contains_full_packet(&[]));
        assert!(!Packet::contains_full_packet(&[0x01, 0x00, 0x00]));
        assert!(!Packet::contains_full_packet(&[0x02, 0x00, 0x00, 0x00, 0x0e]));
        assert!(Packet::contains_full_packet(&[0x00, 0x00, 0x00, 0x04]));

        let mut buf = vec![0x02, 0x00, 0x00, 0x00, 0x0e];
        assert_eq!(
            Err(Error::Underrun {
                needed: 6,
                available: 5
            }),
            Packet::extract(&mut buf)
        );
        assert_eq!(5, buf.len());
    }

    #[test]
    fn test_payload_lengths_below_max_are_terminal() {
        for len in [0usize, 1, 250, 251, 0xffff, 0x1_0000] {
            let body = vec![0x61u8; len];
            let mut buf = Packet::to_bytes(9, &body);
            assert_eq!(len + 4, buf.len());

            let packet = Packet::extract(&mut buf).unwrap();
            assert_eq!(9, packet.seq);
            assert_eq!(len, packet.len());
            assert!(!packet.continuation);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_continued_frames() {
        let body = vec![0x42u8; MAX_PAYLOAD_LEN + 10];
        let mut buf = Packet::to_bytes(0, &body);

        let mut packet = Packet::extract(&mut buf).unwrap();
        assert!(packet.continuation);
        assert_eq!(MAX_PAYLOAD_LEN, packet.len());

        let next = Packet::extract(&mut buf).unwrap();
        assert_eq!(1, next.seq);
        assert!(!next.continuation);

        packet.append(next);
        assert!(!packet.continuation);
        assert_eq!(0, packet.seq);
        assert_eq!(1, packet.last_seq);
        assert_eq!(2, packet.frames);
        assert_eq!(MAX_PAYLOAD_LEN + 10, packet.len());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_exactly_max_payload_gets_empty_trailer() {
        let body = vec![0x00u8; MAX_PAYLOAD_LEN];
        let buf = Packet::to_bytes(3, &body);

        assert_eq!(MAX_PAYLOAD_LEN + 8, buf.len());
        assert_eq!([0x00, 0x00, 0x00, 0x04], buf[MAX_PAYLOAD_LEN + 4..]);
    }

    #[test]
    fn test_classify() {
        let progress = CLIENT_41 | CapabilityFlags::CLIENT_PROGRESS;

        assert_eq!(
            PacketType::Ok,
            PacketType::classify(&[0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00], CLIENT_41)
        );
        assert_eq!(PacketType::Other, PacketType::classify(&[0x00, 0x01], CLIENT_41));
        assert_eq!(
            PacketType::Eof,
            PacketType::classify(&[0xfe, 0x00, 0x00, 0x02, 0x00], CLIENT_41)
        );
        assert_eq!(
            PacketType::Other,
            PacketType::classify(&[0xfe; 10], CLIENT_41)
        );
        assert_eq!(
            PacketType::Error,
            PacketType::classify(&[0xff, 0x15, 0x04], CLIENT_41)
        );
        assert_eq!(
            PacketType::Error,
            PacketType::classify(&[0xff, 0xff, 0xff], CLIENT_41)
        );
        assert_eq!(
            PacketType::Progress,
            PacketType::classify(&[0xff, 0xff, 0xff], progress)
        );
        assert_eq!(
            PacketType::LocalInfile,
            PacketType::classify(b"\xfb/tmp/data.csv", CLIENT_41)
        );
        assert_eq!(PacketType::Other, PacketType::classify(&[0x01], CLIENT_41));
        assert_eq!(PacketType::Other, PacketType::classify(&[], CLIENT_41));
    }

    #[test]
    fn test_ok_packet_protocol_41() {
        let packet = packet(&[0x00, 0x01, 0xfc, 0x10, 0x27, 0x02, 0x00, 0x03, 0x00, b'h', b'i']);
        let ok = OkData::from_packet(&packet, CLIENT_41).unwrap();

        assert_eq!(1, ok.affected_rows);
        assert_eq!(10000, ok.last_insert_id);
        assert_eq!(Some(StatusFlags::SERVER_STATUS_AUTOCOMMIT), ok.status_flags);
        assert_eq!(Some(3), ok.warnings);
        assert_eq!("hi", ok.info);
        assert_eq!(None, ok.session_state_changes);
        assert!(!ok.more_results());
    }

    #[test]
    fn test_ok_packet_transactions_only() {
        let packet = packet(&[0x00, 0x00, 0x00, 0x01, 0x00]);
        let ok = OkData::from_packet(&packet, CapabilityFlags::CLIENT_TRANSACTIONS).unwrap();

        assert_eq!(Some(StatusFlags::SERVER_STATUS_IN_TRANS), ok.status_flags);
        assert_eq!(None, ok.warnings);
        assert_eq!("", ok.info);

        let ok = OkData::from_packet(&packet, CapabilityFlags::empty()).unwrap();
        assert_eq!(None, ok.status_flags);
        assert_eq!("\u{1}\u{0}", ok.info);
    }

    #[test]
    fn test_ok_packet_session_tracking() {
        let capabilities = CLIENT_41 | CapabilityFlags::CLIENT_SESSION_TRACKING;

        let packet = packet(&[0x00, 0x00, 0x00, 0x02, 0x40, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, b'd', b'b']);
        let ok = OkData::from_packet(&packet, capabilities).unwrap();
        assert_eq!("", ok.info);
        assert_eq!(Some(vec![0x01, 0x03, 0x02, b'd', b'b']), ok.session_state_changes);

        let packet = self::packet(&[0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]);
        let ok = OkData::from_packet(&packet, capabilities).unwrap();
        assert_eq!("", ok.info);
        assert_eq!(None, ok.session_state_changes);
    }

    #[test]
    fn test_ok_packet_wrong_header() {
        let packet = packet(&[0x01, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]);
        assert!(matches!(
            OkData::from_packet(&packet, CLIENT_41),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_err_packet() {
        let mut body = vec![0xff, 0x48, 0x04, b'#'];
        body.extend_from_slice(b"HY000");
        body.extend_from_slice(b"No tables used");

        let ErrPacket::Error(err) = ErrorData::from_packet(&packet(&body), CLIENT_41).unwrap()
        else {
            panic!("expected an error");
        };
        assert_eq!(1096, err.error_code);
        assert_eq!(
            Some(SQLState {
                state_marker: "#".to_owned(),
                state: "HY000".to_owned()
            }),
            err.sql_state
        );
        assert_eq!("No tables used", err.error_message);
    }

    #[test]
    fn test_err_packet_pre_41() {
        let ErrPacket::Error(err) =
            ErrorData::from_packet(&packet(b"\xff\x15\x04Access denied"), CapabilityFlags::empty())
                .unwrap()
        else {
            panic!("expected an error");
        };
        assert_eq!(0x0415, err.error_code);
        assert_eq!(None, err.sql_state);
        assert_eq!("Access denied", err.error_message);
    }

    #[test]
    fn test_progress_packet() {
        let mut body = vec![0xff, 0xff, 0xff, 0x01, 0x02, 0x10, 0x27, 0x00];
        body.push(9);
        body.extend_from_slice(b"copy data");
        let capabilities = CLIENT_41 | CapabilityFlags::CLIENT_PROGRESS;

        assert_eq!(
            ErrPacket::Progress(ProgressData {
                stage: 1,
                max_stage: 2,
                progress: 10000,
                message: "copy data".to_owned(),
            }),
            ErrorData::from_packet(&packet(&body), capabilities).unwrap()
        );

        // Without the capability it is an ordinary error.
        assert!(matches!(
            ErrorData::from_packet(&packet(&body), CLIENT_41).unwrap(),
            ErrPacket::Error(ErrorData {
                error_code: 0xffff,
                ..
            })
        ));
    }

    #[test]
    fn test_eof_packet() {
        let eof = EofData::from_packet(&packet(&[0xfe, 0x01, 0x00, 0x0a, 0x00]), CLIENT_41).unwrap();
        assert_eq!(Some(1), eof.warnings);
        assert_eq!(
            Some(StatusFlags::SERVER_STATUS_AUTOCOMMIT | StatusFlags::SERVER_MORE_RESULTS_EXISTS),
            eof.status_flags
        );
        assert!(eof.more_results());

        let eof = EofData::from_packet(&packet(&[0xfe]), CapabilityFlags::empty()).unwrap();
        assert_eq!(None, eof.warnings);

        assert!(matches!(
            EofData::from_packet(&packet(&[0xfe; 10]), CLIENT_41),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            EofData::from_packet(&packet(&[0xfe, 0x00]), CLIENT_41),
            Err(Error::Underrun { .. })
        ));
    }
}
