use std::collections::HashMap;
use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::agires::bytes;

const ENTRY_SIZE: usize = 3;
/// Name offsets count from the end of the header
const NAMES_BASE: usize = 3;

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct InventoryObject {
    pub name: String,
    pub room: u8,
}

/// The OBJECT file, already decrypted
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct InventoryTable {
    pub objects: Vec<InventoryObject>,
    pub max_animated: u8,
}

impl InventoryTable {
    pub fn new(data: &[u8]) -> Result<InventoryTable> {
        let mut rdr = Cursor::new(data);
        let names_offset = rdr.read_u16::<LittleEndian>().context("objects: header truncated")? as usize;
        let max_animated = rdr.read_u8().context("objects: header truncated")?;

        let count = names_offset / ENTRY_SIZE;
        let mut objects = Vec::with_capacity(count);
        for n in 0..count {
            let offset = rdr.read_u16::<LittleEndian>()
                .with_context(|| format!("objects: entry {} truncated", n))? as usize;
            let room = rdr.read_u8()
                .with_context(|| format!("objects: entry {} truncated", n))?;
            let name = bytes::read_cstring(data, NAMES_BASE + offset)
                .map_err(|_| anyhow!("objects: name of entry {} at {} out of range", n, offset))?;
            objects.push(InventoryObject{ name, room });
        }
        Ok(InventoryTable{ objects, max_animated })
    }

    /// Builds the file image; repeated names share one string
    pub fn encode(&self) -> Result<Vec<u8>> {
        let names_start = self.objects.len() * ENTRY_SIZE;
        let mut name_offsets: HashMap<&str, usize> = HashMap::new();
        let mut names: Vec<&str> = Vec::new();
        let mut next_offset = names_start;

        let mut out = Vec::new();
        out.write_u16::<LittleEndian>(to_u16(names_start)?)?;
        out.write_u8(self.max_animated)?;
        for obj in &self.objects {
            let offset = match name_offsets.get(obj.name.as_str()) {
                Some(offset) => *offset,
                None => {
                    let offset = next_offset;
                    name_offsets.insert(&obj.name, offset);
                    names.push(&obj.name);
                    next_offset += obj.name.chars().count() + 1;
                    offset
                }
            };
            out.write_u16::<LittleEndian>(to_u16(offset)?)?;
            out.write_u8(obj.room)?;
        }
        for name in names {
            for ch in name.chars() {
                let b = u8::try_from(ch as u32).map_err(|_| anyhow!("objects: cannot encode '{}'", ch))?;
                out.write_u8(b)?;
            }
            out.write_u8(0)?;
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&InventoryObject> {
        self.objects.get(index)
    }
}

fn to_u16(value: usize) -> Result<u16> {
    u16::try_from(value).map_err(|_| anyhow!("objects: offset {} does not fit", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn obj(name: &str, room: u8) -> InventoryObject {
        InventoryObject{ name: name.to_string(), room }
    }

    #[test]
    fn decode_table() {
        let data = [
            0x06, 0x00, 0x10,
            0x06, 0x00, 0x00,
            0x08, 0x00, 0x2a,
            b'?', 0x00, b'k', b'e', b'y', 0x00,
        ];
        let table = InventoryTable::new(&data).unwrap();
        assert_eq!(table.max_animated, 0x10);
        assert_eq!(table.objects, vec![ obj("?", 0), obj("key", 42) ]);
    }

    #[test]
    fn duplicate_names_share_offsets() {
        let table = InventoryTable{
            objects: vec![ obj("?", 0), obj("key", 3), obj("?", 0), obj("key", 9), obj("rope", 255) ],
            max_animated: 16,
        };
        let data = table.encode().unwrap();
        // 3 header + 5 entries + "?\0key\0rope\0"
        assert_eq!(data.len(), 3 + 15 + 11);
        assert_eq!(&data[3..6], &data[9..12]);
        assert_eq!(&data[6..8], &data[12..14]);
        assert_eq!(InventoryTable::new(&data).unwrap(), table);
    }

    #[test]
    fn empty_and_truncated() {
        let empty = InventoryTable{ objects: vec![], max_animated: 0 };
        assert_eq!(InventoryTable::new(&empty.encode().unwrap()).unwrap(), empty);
        assert!(InventoryTable::new(&[ 0x06 ]).is_err());
        assert!(InventoryTable::new(&[ 0x06, 0x00, 0x00, 0x00, 0x00, 0x00 ]).is_err());
        assert!(InventoryTable::new(&[ 0x03, 0x00, 0x00, 0x40, 0x00, 0x00 ]).is_err());
    }
}
