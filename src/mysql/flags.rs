use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// <https://dev.mysql.com/doc/dev/mysql-server/latest/group__group__cs__capabilities__flags.html>
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct CapabilityFlags: u32 {
        const CLIENT_LONG_PASSWORD = 1;
        const CLIENT_FOUND_ROWS = 1 << 1;
        const CLIENT_LONG_FLAG = 1 << 2;
        const CLIENT_CONNECT_WITH_DB = 1 << 3;
        const CLIENT_NO_SCHEMA = 1 << 4;
        const CLIENT_COMPRESS = 1 << 5;
        const CLIENT_ODBC = 1 << 6;
        const CLIENT_LOCAL_FILES = 1 << 7;
        const CLIENT_IGNORE_SPACE = 1 << 8;
        const CLIENT_PROTOCOL_41 = 1 << 9;
        const CLIENT_INTERACTIVE = 1 << 10;
        const CLIENT_SSL = 1 << 11;
        const CLIENT_IGNORE_SIGPIPE = 1 << 12;
        const CLIENT_TRANSACTIONS = 1 << 13;
        const CLIENT_RESERVED = 1 << 14;
        const CLIENT_SECURE_CONNECTION = 1 << 15;
        const CLIENT_MULTI_STATEMENTS = 1 << 16;
        const CLIENT_MULTI_RESULTS = 1 << 17;
        const CLIENT_PS_MULTI_RESULTS = 1 << 18;
        const CLIENT_PLUGIN_AUTH = 1 << 19;
        const CLIENT_CONNECT_ATTRS = 1 << 20;
        const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA = 1 << 21;
        const CLIENT_CAN_HANDLE_EXPIRED_PASSWORDS = 1 << 22;
        const CLIENT_SESSION_TRACKING = 1 << 23;
        const CLIENT_DEPRECATE_EOF = 1 << 24;
        const CLIENT_OPTIONAL_RESULTSET_METADATA = 1 << 25;
        const CLIENT_ZSTD_COMPRESSION_ALGORITHM = 1 << 26;
        const CLIENT_QUERY_ATTRIBUTES = 1 << 27;
        const MULTI_FACTOR_AUTHENTICATION = 1 << 28;
        /// MariaDB progress reporting.
        const CLIENT_PROGRESS = 1 << 29;
        const CLIENT_SSL_VERIFY_SERVER_CERT = 1 << 30;
        const CLIENT_REMEMBER_OPTIONS = 1 << 31;
    }
}

bitflags! {
    /// <https://dev.mysql.com/doc/dev/mysql-server/latest/mysql__com_8h.html>
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct StatusFlags: u16 {
        const SERVER_STATUS_IN_TRANS = 1;
        const SERVER_STATUS_AUTOCOMMIT = 1 << 1;
        const SERVER_MORE_RESULTS_EXISTS = 1 << 3;
        const SERVER_QUERY_NO_GOOD_INDEX_USED = 1 << 4;
        const SERVER_QUERY_NO_INDEX_USED = 1 << 5;
        const SERVER_STATUS_CURSOR_EXISTS = 1 << 6;
        const SERVER_STATUS_LAST_ROW_SENT = 1 << 7;
        const SERVER_STATUS_DB_DROPPED = 1 << 8;
        const SERVER_STATUS_NO_BACKSLASH_ESCAPES = 1 << 9;
        const SERVER_STATUS_METADATA_CHANGED = 1 << 10;
        const SERVER_QUERY_WAS_SLOW = 1 << 11;
        const SERVER_PS_OUT_PARAMS = 1 << 12;
        const SERVER_STATUS_IN_TRANS_READONLY = 1 << 13;
        const SERVER_SESSION_STATE_CHANGED = 1 << 14;
        const SERVER_STATUS_ANSI_QUOTES = 1 << 15;
    }
}

impl CapabilityFlags {
    /// Keeps unknown bits: the peers may speak a newer protocol than we know.
    pub fn from_wire(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }
}

impl StatusFlags {
    pub fn from_wire(bits: u16) -> Self {
        Self::from_bits_retain(bits)
    }
}
