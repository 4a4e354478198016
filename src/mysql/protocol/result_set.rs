use serde::Serialize;

use crate::error::Result;
use crate::mysql::flags::CapabilityFlags;
use crate::mysql::packet::Packet;
use crate::mysql::types::ByteCursor;

/// Column metadata of a text result set, `Protocol::ColumnDefinition41`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub character_set: u16,
    pub column_length: u32,
    pub column_type: u8,
    pub flags: u16,
    pub decimals: u8,
}

impl ColumnDefinition {
    pub fn from_packet(packet: &Packet) -> Result<ColumnDefinition> {
        let mut cursor = ByteCursor::new(&packet.body);

        let catalog = cursor.get_string_lenenc()?;
        let schema = cursor.get_string_lenenc()?;
        let table = cursor.get_string_lenenc()?;
        let org_table = cursor.get_string_lenenc()?;
        let name = cursor.get_string_lenenc()?;
        let org_name = cursor.get_string_lenenc()?;

        // always 0x0c
        let _fixed_length_fields = cursor.get_int_lenenc()?;

        // COM_FIELD_LIST appends default values, nobody needs them here.
        Ok(ColumnDefinition {
            catalog,
            schema,
            table,
            org_table,
            name,
            org_name,
            character_set: cursor.get_u16()?,
            column_length: cursor.get_u32()?,
            column_type: cursor.get_u8()?,
            flags: cursor.get_u16()?,
            decimals: cursor.get_u8()?,
        })
    }
}

/// Number of columns announced at the start of a result set, and whether
/// their definitions follow.
pub fn column_count(packet: &Packet, capabilities: CapabilityFlags) -> Result<(u64, bool)> {
    let mut cursor = ByteCursor::new(&packet.body);
    let count = cursor.get_int_lenenc()?;
    let metadata_follows =
        if capabilities.contains(CapabilityFlags::CLIENT_OPTIONAL_RESULTSET_METADATA) {
            cursor.get_u8()? != 0
        } else {
            true
        };
    Ok((count, metadata_follows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_column_definition_decode() {
        let mut buf = vec![
            0x49u8, 0x00u8, 0x00u8, 0x02u8, 0x03u8, 0x64u8, 0x65u8, 0x66u8, 0x0cu8, 0x73u8,
            0x77u8, 0x69u8, 0x74u8, 0x63u8, 0x68u8, 0x72u8, 0x6fu8, 0x75u8, 0x74u8, 0x65u8,
            0x72u8, 0x0cu8, 0x74u8, 0x78u8, 0x6eu8, 0x70u8, 0x61u8, 0x72u8, 0x74u8, 0x69u8,
            0x63u8, 0x69u8, 0x30u8, 0x5fu8, 0x10u8, 0x74u8, 0x78u8, 0x6eu8, 0x5fu8, 0x70u8,
            0x61u8, 0x72u8, 0x74u8, 0x69u8, 0x63u8, 0x69u8, 0x70u8, 0x61u8, 0x6eu8, 0x74u8,
            0x73u8, 0x09u8, 0x69u8, 0x64u8, 0x31u8, 0x5fu8, 0x38u8, 0x35u8, 0x5fu8, 0x30u8,
            0x5fu8, 0x02u8, 0x69u8, 0x64u8, 0x0cu8, 0x3fu8, 0x00u8, 0x14u8, 0x00u8, 0x00u8,
            0x00u8, 0x08u8, 0x03u8, 0x42u8, 0x00u8, 0x00u8, 0x00u8, 0x00u8,
        ];
        let packet = Packet::extract(&mut buf).unwrap();
        let column = ColumnDefinition::from_packet(&packet).unwrap();

        assert_eq!("def", column.catalog);
        assert_eq!("switchrouter", column.schema);
        assert_eq!("txnpartici0_", column.table);
        assert_eq!("txn_participants", column.org_table);
        assert_eq!("id1_85_0_", column.name);
        assert_eq!("id", column.org_name);
        assert_eq!(63, column.character_set);
        assert_eq!(20, column.column_length);
        assert_eq!(0x08, column.column_type);
        assert_eq!(0x4203, column.flags);
        assert_eq!(0, column.decimals);
    }

    #[test]
    fn test_truncated_column_definition() {
        let mut buf = vec![0x05, 0x00, 0x00, 0x02, 0x03, 0x64, 0x65, 0x66, 0x00];
        let packet = Packet::extract(&mut buf).unwrap();
        assert!(matches!(
            ColumnDefinition::from_packet(&packet),
            Err(Error::Underrun { .. })
        ));
    }

    #[test]
    fn test_column_count() {
        let mut buf = vec![0x01, 0x00, 0x00, 0x01, 0x03];
        let packet = Packet::extract(&mut buf).unwrap();
        assert_eq!((3, true), column_count(&packet, CapabilityFlags::empty()).unwrap());
    }

    #[test]
    fn test_column_count_without_metadata() {
        let mut buf = vec![0x02, 0x00, 0x00, 0x01, 0x03, 0x00];
        let packet = Packet::extract(&mut buf).unwrap();
        let capabilities = CapabilityFlags::CLIENT_OPTIONAL_RESULTSET_METADATA;
        assert_eq!((3, false), column_count(&packet, capabilities).unwrap());

        let mut buf = vec![0x01, 0x00, 0x00, 0x01, 0x03];
        let packet = Packet::extract(&mut buf).unwrap();
        assert!(matches!(
            column_count(&packet, capabilities),
            Err(Error::Underrun { .. })
        ));
    }
}
