use std::collections::HashMap;

use anyhow::{anyhow, Result};
use packed_struct::prelude::*;

use crate::agires::{bytes, crypt, decompress, picstream};
use crate::agires::directory::Directory;
use crate::agires::resource::{
    CompressionMethod, GameFiles, ResourceData, ResourceError, ResourceID, ResourceInfo,
    ResourceLocation, ResourceProvider, ResourceType, VOLUME_TYPES,
};
use crate::agires::resource2::{check_signature, is_directory_file, whole_file_data};

#[derive(PackedStruct)]
#[packed_struct(endian="lsb")]
pub struct DirectoryHeaderV3 {
    pub logic: u16,
    pub picture: u16,
    pub view: u16,
    pub sound: u16,
}

#[derive(PackedStruct)]
#[packed_struct(endian="lsb")]
pub struct ResourceHeaderV3 {
    pub signature_hi: u8,
    pub signature_lo: u8,
    pub volume: u8,
    pub uncompressed_size: u16,
    pub compressed_size: u16,
}

const DIRECTORY_HEADER_V3_SIZE: usize = 8;
const HEADER_V3_SIZE: usize = 7;
const PICTURE_COMPRESSION_FLAG: u8 = 0x80;

/// Volume number of a `<sig>vol.<n>` file name
fn volume_number(fname: &str) -> Option<u8> {
    let (stem, ext) = fname.rsplit_once('.')?;
    let sig = stem.strip_suffix("vol")?;
    if !sig.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) { return None; }
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_digit()) { return None; }
    ext.parse::<u8>().ok()
}

/// Games with a single <sig>DIR file and <sig>VOL.n files
pub struct ResourceProviderV3 {
    files: GameFiles,
    signature: String,
    directories: HashMap<ResourceType, Directory>,
    volumes: HashMap<u8, String>,
}

impl ResourceProviderV3 {
    pub fn new(files: GameFiles) -> Result<Self> {
        let mut dir_names: Vec<&str> = files.names()
            .filter(|n| n.ends_with("dir") && !is_directory_file(n))
            .collect();
        dir_names.sort();
        let dir_name = dir_names.first().copied().ok_or(ResourceError::NoDirectoryAvailable)?.to_string();
        let signature = dir_name.trim_end_matches("dir").to_uppercase();
        let dir_data = files.get(&dir_name).ok_or(ResourceError::NoDirectoryAvailable)?;

        let header = bytes::segment(dir_data, 0, DIRECTORY_HEADER_V3_SIZE)
            .map_err(|_| anyhow!("{}: directory header truncated", dir_name))?;
        let header = DirectoryHeaderV3::unpack_from_slice(header)
            .map_err(|e| anyhow!("{}: cannot unpack directory header: {:?}", dir_name, e))?;

        let starts = [
            (ResourceType::Logic, header.logic as usize),
            (ResourceType::Picture, header.picture as usize),
            (ResourceType::View, header.view as usize),
            (ResourceType::Sound, header.sound as usize),
        ];
        let mut directories = HashMap::new();
        for (rtype, start) in starts {
            // each segment runs up to the next higher offset
            let end = starts.iter()
                .map(|(_, o)| *o)
                .filter(|o| *o > start)
                .min()
                .unwrap_or(dir_data.len())
                .min(dir_data.len());
            let segment = if start < end { &dir_data[start..end] } else {
                log::warn!("{}: empty {} directory at offset {}", dir_name, rtype, start);
                &dir_data[0..0]
            };
            directories.insert(rtype, Directory::new(segment));
        }

        let volumes: HashMap<u8, String> = files.names()
            .filter_map(|n| volume_number(n).map(|v| (v, n.to_string())))
            .collect();
        log::debug!("v3: signature {}, {} volume files", signature, volumes.len());

        Ok(ResourceProviderV3{ files, signature, directories, volumes })
    }

    /// Game signature, taken from the directory file name
    pub fn signature(&self) -> &str {
        &self.signature
    }

    fn volume(&self, volume: u8) -> std::result::Result<&[u8], ResourceError> {
        self.volumes.get(&volume)
            .and_then(|name| self.files.get(name))
            .ok_or(ResourceError::NoVolumeAvailable(volume))
    }
}

impl ResourceProvider for ResourceProviderV3 {
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
        let header = bytes::segment(volume, offset, HEADER_V3_SIZE)
            .map_err(|_| ResourceError::CorruptedResource(*id))?;
        let header = ResourceHeaderV3::unpack_from_slice(header)
            .map_err(|e| anyhow!("{}: cannot unpack header: {:?}", id, e))?;
        check_signature(id, header.signature_hi, header.signature_lo)?;

        let raw = bytes::segment(volume, offset + HEADER_V3_SIZE, header.compressed_size as usize)
            .map_err(|_| ResourceError::CorruptedResource(*id))?;
        let uncompressed_size = header.uncompressed_size as usize;

        let compression_method;
        let data = if id.rtype == ResourceType::Picture && (header.volume & PICTURE_COMPRESSION_FLAG) != 0 {
            compression_method = CompressionMethod::Picture;
            picstream::unpack_picture(raw)
        } else if header.compressed_size != header.uncompressed_size {
            compression_method = CompressionMethod::LZW;
            let mut output = Vec::with_capacity(uncompressed_size);
            decompress::decompress_lzw(raw, &mut output)
                .map_err(|e| e.context(format!("{}: decompression failed", id)))?;
            if output.len() < uncompressed_size {
                log::warn!("{}: decompressed to {} bytes, expected {}", id, output.len(), uncompressed_size);
            }
            output.truncate(uncompressed_size);
            output
        } else {
            compression_method = CompressionMethod::None;
            let mut data = raw.to_vec();
            // only uncompressed logic text is encrypted
            if id.rtype == ResourceType::Logic {
                crypt::decrypt_logic_messages(&mut data, self.files.key())?;
            }
            data
        };

        let info = ResourceInfo{
            compressed_size: header.compressed_size as u32,
            uncompressed_size: header.uncompressed_size as u32,
            compression_method,
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
mod tests {
    use super::*;
    use test_log::test;

    const PLAIN_LOGIC: [u8; 6] = [ 0x01, 0x00, 0x00, 0x00, 0x00, 0x00 ];
    const MESSAGE_LOGIC: [u8; 11] = [ 0x01, 0x00, 0x00, 0x01, 0x07, 0x00, 0x04, 0x00, b'h', b'i', 0x00 ];

    fn header_v3(volume: u8, uncompressed: usize, data: &[u8]) -> Vec<u8> {
        let mut out = vec![ 0x12, 0x34, volume,
            uncompressed as u8, (uncompressed >> 8) as u8,
            data.len() as u8, (data.len() >> 8) as u8 ];
        out.extend_from_slice(data);
        out
    }

    fn game() -> GameFiles {
        let compressed = decompress::compress_lzw(&PLAIN_LOGIC);
        let mut vol0 = header_v3(0, PLAIN_LOGIC.len(), &compressed);
        let logic1 = vol0.len();
        let mut crypted = MESSAGE_LOGIC.to_vec();
        crypt::crypt(&mut crypted, b"Avis Durgan", 8);
        vol0.extend(header_v3(0, crypted.len(), &crypted));

        let packed = [ 0xf0, 0x5f, 0xf0 ];
        let vol2 = header_v3(0x82, 3, &packed);

        let dir = vec![
            // logic, picture, view, sound
            0x08, 0x00, 0x0e, 0x00, 0x11, 0x00, 0x14, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, logic1 as u8,
            0x20, 0x00, 0x00,
            0x10, 0x00, 0x00,
        ];

        let mut files = HashMap::new();
        files.insert("KQ4DIR".to_string(), dir);
        files.insert("KQ4VOL.0".to_string(), vol0);
        files.insert("KQ4VOL.2".to_string(), vol2);
        files.insert("WORDS.TOK".to_string(), vec![ 0u8; 52 ]);
        GameFiles::new(files)
    }

    #[test]
    fn volume_names() {
        assert_eq!(volume_number("kq4vol.0"), Some(0));
        assert_eq!(volume_number("vol.12"), Some(12));
        assert_eq!(volume_number("kq4vol.x"), None);
        assert_eq!(volume_number("kq4dir"), None);
        assert_eq!(volume_number("kq4-vol.1"), None);
    }

    #[test]
    fn signature_and_entries() {
        let p = ResourceProviderV3::new(game()).unwrap();
        assert_eq!(p.signature(), "KQ4");
        assert_eq!(p.get_entries(), vec![
            ResourceID::new(ResourceType::Logic, 0),
            ResourceID::new(ResourceType::Logic, 1),
            ResourceID::new(ResourceType::Picture, 0),
            ResourceID::new(ResourceType::View, 0),
        ]);
    }

    #[test]
    fn compressed_logic_is_plain() {
        let p = ResourceProviderV3::new(game()).unwrap();
        let res = p.open(&ResourceID::new(ResourceType::Logic, 0)).unwrap();
        assert_eq!(res.info.compression_method, CompressionMethod::LZW);
        assert_eq!(res.data, PLAIN_LOGIC);
    }

    #[test]
    fn uncompressed_logic_is_decrypted() {
        let p = ResourceProviderV3::new(game()).unwrap();
        let res = p.open(&ResourceID::new(ResourceType::Logic, 1)).unwrap();
        assert_eq!(res.info.compression_method, CompressionMethod::None);
        assert_eq!(res.data, MESSAGE_LOGIC);
    }

    #[test]
    fn picture_nibbles_from_gapped_volume() {
        let p = ResourceProviderV3::new(game()).unwrap();
        let res = p.open(&ResourceID::new(ResourceType::Picture, 0)).unwrap();
        assert_eq!(res.info.compression_method, CompressionMethod::Picture);
        assert_eq!(res.info.volume, 2);
        assert_eq!(res.data, vec![ 0xf0, 0x05, 0xff ]);
    }

    #[test]
    fn missing_volume_and_whole_files() {
        let p = ResourceProviderV3::new(game()).unwrap();
        let err = p.open(&ResourceID::new(ResourceType::View, 0)).unwrap_err();
        assert!(matches!(err.downcast_ref::<ResourceError>(), Some(ResourceError::NoVolumeAvailable(1))));
        let words = p.open(&ResourceID::new(ResourceType::Word, 0)).unwrap();
        assert_eq!(words.data.len(), 52);
        let err = p.open(&ResourceID::new(ResourceType::Object, 0)).unwrap_err();
        assert!(matches!(err.downcast_ref::<ResourceError>(), Some(ResourceError::ResourceNotExisting(_))));
    }

    #[test]
    fn no_directory() {
        let err = ResourceProviderV3::new(GameFiles::new(HashMap::new())).err().unwrap();
        assert!(matches!(err.downcast_ref::<ResourceError>(), Some(ResourceError::NoDirectoryAvailable)));
    }
}
