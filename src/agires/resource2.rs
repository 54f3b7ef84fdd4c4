use std::collections::HashMap;

use anyhow::{anyhow, Result};
use packed_struct::prelude::*;

use crate::agires::{bytes, crypt};
use crate::agires::directory::Directory;
use crate::agires::resource::{
    CompressionMethod, GameFiles, ResourceData, ResourceError, ResourceID, ResourceInfo,
    ResourceLocation, ResourceProvider, ResourceType, VOLUME_TYPES,
};

pub const RESOURCE_SIGNATURE: [u8; 2] = [ 0x12, 0x34 ];

const DIRECTORY_FILES: [(ResourceType, &str); 4] = [
    (ResourceType::Logic, "logdir"),
    (ResourceType::Picture, "picdir"),
    (ResourceType::Sound, "snddir"),
    (ResourceType::View, "viewdir"),
];

#[derive(PackedStruct)]
#[packed_struct(endian="lsb")]
pub struct ResourceHeaderV2 {
    pub signature_hi: u8,
    pub signature_lo: u8,
    pub volume: u8,
    pub length: u16,
}

pub const HEADER_V2_SIZE: usize = 5;

pub(crate) fn check_signature(id: &ResourceID, hi: u8, lo: u8) -> std::result::Result<(), ResourceError> {
    if [ hi, lo ] != RESOURCE_SIGNATURE {
        log::warn!("{}: bad signature {:02x} {:02x}", id, hi, lo);
        return Err(ResourceError::CorruptedResource(*id));
    }
    Ok(())
}

pub(crate) fn whole_file_data(id: &ResourceID, files: &GameFiles) -> Result<ResourceData> {
    let data = match id.rtype {
        ResourceType::Object => files.object_data()?,
        ResourceType::Word => files.words_data()?,
        rtype => return Err(ResourceError::ResourceTypeInvalid(rtype.into()).into()),
    };
    let size = data.len() as u32;
    let info = ResourceInfo{
        compressed_size: size,
        uncompressed_size: size,
        compression_method: CompressionMethod::None,
        volume: 0,
        offset: 0,
    };
    Ok(ResourceData{ info, data })
}

/// Games with LOGDIR, PICDIR, SNDDIR, VIEWDIR and VOL.n files
pub struct ResourceProviderV2 {
    files: GameFiles,
    directories: HashMap<ResourceType, Directory>,
}

/// Whether `name` is one of the four V2 directory files
pub fn is_directory_file(name: &str) -> bool {
    DIRECTORY_FILES.iter().any(|(_, fname)| name.eq_ignore_ascii_case(fname))
}

/// V2 directory files absent from `files`
pub fn missing_directories(files: &GameFiles) -> Vec<&'static str> {
    DIRECTORY_FILES.iter()
        .filter(|(_, fname)| files.get(fname).is_none())
        .map(|(_, fname)| *fname)
        .collect()
}

/// True when all four V2 directory files are present
pub fn has_directories(files: &GameFiles) -> bool {
    missing_directories(files).is_empty()
}

impl ResourceProviderV2 {
    pub fn new(files: GameFiles) -> std::result::Result<Self, ResourceError> {
        let mut directories = HashMap::new();
        for (rtype, fname) in DIRECTORY_FILES {
            match files.get(fname) {
                Some(data) => { directories.insert(rtype, Directory::new(data)); },
                None => {
                    log::debug!("v2: {} not found", fname);
                    return Err(ResourceError::NoDirectoryAvailable);
                }
            }
        }
        Ok(ResourceProviderV2{ files, directories })
    }

    fn volume(&self, volume: u8) -> std::result::Result<&[u8], ResourceError> {
        self.files.get(&format!("vol.{}", volume)).ok_or(ResourceError::NoVolumeAvailable(volume))
    }
}

impl ResourceProvider for ResourceProviderV2 {
    fn locate(&self, id: &ResourceID) -> std::result::Result<ResourceLocation, ResourceError> {
        let directory = self.directories.get(&id.rtype)
            .ok_or(ResourceError::ResourceTypeInvalid(id.rtype.into()))?;
        let entry = directory.get(id.num).ok_or(ResourceError::ResourceNotExisting(*id))?;
        Ok(ResourceLocation{ id: *id, volume: entry.volume, offset: entry.offset })
    }

    fn open(&self, id: &ResourceID) -> Result<ResourceData> {
        if !id.rtype.is_volume_type() {
            return whole_file_data(id, &self.files);
        }
        let location = self.locate(id)?;
        let volume = self.volume(location.volume)?;

        let offset = location.offset as usize;
        let header = bytes::segment(volume, offset, HEADER_V2_SIZE)
            .map_err(|_| ResourceError::CorruptedResource(*id))?;
        let header = ResourceHeaderV2::unpack_from_slice(header)
            .map_err(|e| anyhow!("{}: cannot unpack header: {:?}", id, e))?;
        check_signature(id, header.signature_hi, header.signature_lo)?;

        let mut data = bytes::segment(volume, offset + HEADER_V2_SIZE, header.length as usize)
            .map_err(|_| ResourceError::CorruptedResource(*id))?
            .to_vec();
        if id.rtype == ResourceType::Logic {
            crypt::decrypt_logic_messages(&mut data, self.files.key())?;
        }

        let info = ResourceInfo{
            compressed_size: header.length as u32,
            uncompressed_size: header.length as u32,
            compression_method: CompressionMethod::None,
            volume: location.volume,
            offset: location.offset,
        };
        Ok(ResourceData{ info, data })
    }

    fn get_entries(&self) -> Vec<ResourceID> {
        let mut entries: Vec<ResourceID> = VOLUME_TYPES.iter()
            .filter_map(|rtype| self.directories.get(rtype).map(|d| (rtype, d)))
            .flat_map(|(rtype, d)| d.numbers().map(move |num| ResourceID::new(*rtype, num)))
            .collect();
        entries.sort();
        entries
    }

    fn game_files(&self) -> &GameFiles {
        &self.files
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use test_log::test;

    pub fn header_v2(volume: u8, data: &[u8]) -> Vec<u8> {
        let mut out = vec![ 0x12, 0x34, volume, data.len() as u8, (data.len() >> 8) as u8 ];
        out.extend_from_slice(data);
        out
    }

    fn game() -> GameFiles {
        // logic 0 has one encrypted message, logic 1 has a bad signature
        let mut logic = vec![ 0x01, 0x00, 0x00, 0x01, 0x07, 0x00, 0x04, 0x00, b'h', b'i', 0x00 ];
        crypt::crypt(&mut logic, b"Avis Durgan", 8);
        let mut vol0 = header_v2(0, &logic);
        let bad_offset = vol0.len();
        vol0.extend_from_slice(&[ 0x12, 0x35, 0x00, 0x01, 0x00, 0x00 ]);
        let pic_offset = vol0.len();
        vol0.extend(header_v2(0x80, &[ 0xff ]));

        let mut files = HashMap::new();
        files.insert("LOGDIR".to_string(), vec![ 0x00, 0x00, 0x00, 0x00, 0x00, bad_offset as u8 ]);
        files.insert("PICDIR".to_string(), vec![ 0xff, 0xff, 0xff, 0x00, 0x00, pic_offset as u8 ]);
        files.insert("SNDDIR".to_string(), vec![]);
        files.insert("VIEWDIR".to_string(), vec![ 0x30, 0x00, 0x00 ]);
        files.insert("VOL.0".to_string(), vol0);
        GameFiles::new(files)
    }

    fn provider() -> ResourceProviderV2 {
        ResourceProviderV2::new(game()).unwrap()
    }

    #[test]
    fn partial_directory_set() {
        assert!(missing_directories(&game()).is_empty());
        assert!(has_directories(&game()));

        let mut files = HashMap::new();
        files.insert("LOGDIR".to_string(), vec![]);
        files.insert("PicDir".to_string(), vec![]);
        files.insert("viewdir".to_string(), vec![]);
        let files = GameFiles::new(files);
        assert_eq!(missing_directories(&files), vec![ "snddir" ]);
        assert!(!has_directories(&files));
        assert!(matches!(ResourceProviderV2::new(files), Err(ResourceError::NoDirectoryAvailable)));
    }

    #[test]
    fn opens_and_decrypts_logic() {
        let p = provider();
        let res = p.open(&ResourceID::new(ResourceType::Logic, 0)).unwrap();
        assert_eq!(&res.data[8..], b"hi\0");
        assert_eq!(res.info.uncompressed_size, 11);
    }

    #[test]
    fn high_volume_bits_are_ignored() {
        let p = provider();
        let res = p.open(&ResourceID::new(ResourceType::Picture, 1)).unwrap();
        assert_eq!(res.data, vec![ 0xff ]);
    }

    #[test]
    fn container_errors() {
        let p = provider();
        let err = p.open(&ResourceID::new(ResourceType::Logic, 1)).unwrap_err();
        assert!(matches!(err.downcast_ref::<ResourceError>(), Some(ResourceError::CorruptedResource(_))));
        let err = p.open(&ResourceID::new(ResourceType::Picture, 0)).unwrap_err();
        assert!(matches!(err.downcast_ref::<ResourceError>(), Some(ResourceError::ResourceNotExisting(_))));
        let err = p.open(&ResourceID::new(ResourceType::View, 0)).unwrap_err();
        assert!(matches!(err.downcast_ref::<ResourceError>(), Some(ResourceError::NoVolumeAvailable(3))));
        assert!(matches!(p.locate(&ResourceID::new(ResourceType::Object, 0)),
            Err(ResourceError::ResourceTypeInvalid(10))));
        // a failed fetch leaves the others usable
        assert!(p.open(&ResourceID::new(ResourceType::Logic, 0)).is_ok());
    }

    #[test]
    fn entries_are_sorted() {
        let p = provider();
        let entries = p.get_entries();
        assert_eq!(entries, vec![
            ResourceID::new(ResourceType::Logic, 0),
            ResourceID::new(ResourceType::Logic, 1),
            ResourceID::new(ResourceType::Picture, 1),
            ResourceID::new(ResourceType::View, 0),
        ]);
    }

    #[test]
    fn missing_directory() {
        let mut files = HashMap::new();
        files.insert("kq4dir".to_string(), vec![]);
        let files = GameFiles::new(files);
        assert!(!has_directories(&files));
        assert!(matches!(ResourceProviderV2::new(files), Err(ResourceError::NoDirectoryAvailable)));
        assert!(has_directories(&game()));
    }
}
