use std::io::Cursor;
use byteorder::ReadBytesExt;

pub const MAX_ENTRIES: usize = 256;

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub struct DirectoryEntry {
    pub volume: u8,
    pub offset: u32,
}

/// One resource type's directory: 3-byte entries, 0xFF marks an empty slot
pub struct Directory {
    entries: Vec<Option<DirectoryEntry>>,
}

impl Directory {
    pub fn new(data: &[u8]) -> Directory {
        let mut rdr = Cursor::new(data);
        let mut entries = Vec::new();
        while entries.len() < MAX_ENTRIES {
            let b0 = match rdr.read_u8() { Ok(b) => b, Err(_) => break };
            let (b1, b2) = match (rdr.read_u8(), rdr.read_u8()) {
                (Ok(b1), Ok(b2)) => (b1, b2),
                _ => {
                    log::debug!("directory: ignoring incomplete entry {}", entries.len());
                    break
                }
            };
            if b0 == 0xff {
                entries.push(None);
                continue;
            }
            let volume = b0 >> 4;
            let offset = ((b0 as u32 & 0x0f) << 16) | ((b1 as u32) << 8) | b2 as u32;
            entries.push(Some(DirectoryEntry{ volume, offset }));
        }
        Directory{ entries }
    }

    pub fn get(&self, num: u16) -> Option<&DirectoryEntry> {
        self.entries.get(num as usize).and_then(|e| e.as_ref())
    }

    /// Number of slots, including empty ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn numbers(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(n, _)| n as u16)
    }
}
