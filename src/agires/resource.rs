use std::fmt;
use std::fmt::Formatter;
use std::collections::HashMap;

use anyhow::Result;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::agires::crypt;

#[derive(PartialEq,Eq,Hash,Clone,Copy,Debug,PartialOrd,Ord,TryFromPrimitive,IntoPrimitive)]
#[repr(u8)]
pub enum ResourceType {
    Logic = 0,
    Picture = 1,
    Sound = 2,
    View = 3,
    Object = 10,
    Word = 11,
}

pub const VOLUME_TYPES: [ResourceType; 4] = [
    ResourceType::Logic, ResourceType::Picture, ResourceType::Sound, ResourceType::View
];

impl ResourceType {
    pub fn new(value: u8) -> std::result::Result<ResourceType, ResourceError> {
        ResourceType::try_from(value).map_err(|_| ResourceError::ResourceTypeInvalid(value))
    }

    /// Whether resources of this type live inside volume files
    pub fn is_volume_type(&self) -> bool {
        VOLUME_TYPES.contains(self)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Logic => { write!(f, "logic") },
            ResourceType::Picture => { write!(f, "picture") },
            ResourceType::Sound => { write!(f, "sound") },
            ResourceType::View => { write!(f, "view") },
            ResourceType::Object => { write!(f, "object") },
            ResourceType::Word => { write!(f, "words") },
        }
    }
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum CompressionMethod {
    None,
    LZW,
    Picture,
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            CompressionMethod::None => { write!(f, "none") },
            CompressionMethod::LZW => { write!(f, "lzw") },
            CompressionMethod::Picture => { write!(f, "picture") },
        }
    }
}

#[derive(PartialEq,Eq,Hash,Clone,Copy,Debug,PartialOrd,Ord)]
pub struct ResourceID {
    pub rtype: ResourceType,
    pub num: u16,
}

impl ResourceID {
    pub fn new(rtype: ResourceType, num: u16) -> Self {
        ResourceID{ rtype, num }
    }
}

impl fmt::Display for ResourceID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.rtype, self.num)
    }
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub struct ResourceLocation {
    pub id: ResourceID,
    pub volume: u8,
    pub offset: u32,
}

#[derive(Clone,Debug)]
pub struct ResourceInfo {
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub compression_method: CompressionMethod,
    pub volume: u8,
    pub offset: u32,
}

#[derive(Debug)]
pub struct ResourceData {
    pub info: ResourceInfo,
    pub data: Vec<u8>
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("no directory file available")]
    NoDirectoryAvailable,
    #[error("volume file {0} is not available")]
    NoVolumeAvailable(u8),
    #[error("resource {0} is corrupted")]
    CorruptedResource(ResourceID),
    #[error("resource {0} does not exist")]
    ResourceNotExisting(ResourceID),
    #[error("invalid resource type {0}")]
    ResourceTypeInvalid(u8),
}

/// Returns true if the error is the expected "slot is empty" case
pub fn is_not_existing(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<ResourceError>(), Some(ResourceError::ResourceNotExisting(_)))
}

pub trait ResourceProvider {
    /// Finds where a volume resource lives
    fn locate(&self, id: &ResourceID) -> std::result::Result<ResourceLocation, ResourceError>;

    /// Returns the resource bytes with all decryption and decompression applied
    fn open(&self, id: &ResourceID) -> Result<ResourceData>;

    /// All volume resources present in the directories, sorted
    fn get_entries(&self) -> Vec<ResourceID>;

    fn game_files(&self) -> &GameFiles;
}

const SIERRA_KEY: &[u8] = b"Avis Durgan";
const GROZA_KEY: &[u8] = b"Alex Simkin";
const GROZA_MARKER: [u8; 6] = [ 0x2a, 0x2a, 0x2a, 0x2a, 0x2a, 0x1a ];

// Stand-ins for AGDS games: an encrypted table holding the single object "?"
// and a dictionary holding only "anyword" (1).
const GROZA_OBJECT: [u8; 8] = [ 0x42, 0x76, 0x69, 0x70, 0x20, 0x44, 0x4a, 0x72 ];
const GROZA_WORDS: [u8; 63] = [
    0x00, 0x34, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x1e, 0x11, 0x06,
    0x08, 0x10, 0x0d, 0x9b, 0x00, 0x01, 0x00
];

const OBJECT_FILE: &str = "object";
const WORDS_FILE: &str = "words.tok";
const AGIDATA_FILE: &str = "agidata.ovl";
const VERSION_MARKER: &[u8] = b"Version ";

/// Raw game files keyed by lowercase file name
pub struct GameFiles {
    files: HashMap<String, Vec<u8>>,
    groza: bool,
}

impl GameFiles {
    pub fn new(files: HashMap<String, Vec<u8>>) -> Self {
        let files: HashMap<String, Vec<u8>> = files.into_iter()
            .map(|(name, data)| (name.to_lowercase(), data))
            .collect();
        let groza = [ OBJECT_FILE, WORDS_FILE ].iter()
            .filter_map(|name| files.get(*name))
            .any(|data| data.starts_with(&GROZA_MARKER));
        if groza {
            log::debug!("AGDS game detected, using alternate key");
        }
        GameFiles{ files, groza }
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(&name.to_lowercase()).map(|d| d.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|k| k.as_str())
    }

    pub fn is_groza(&self) -> bool {
        self.groza
    }

    /// Key used for logic message text
    pub fn key(&self) -> &'static [u8] {
        if self.groza { GROZA_KEY } else { SIERRA_KEY }
    }

    /// Decrypted contents of the OBJECT file
    pub fn object_data(&self) -> Result<Vec<u8>> {
        let id = ResourceID::new(ResourceType::Object, 0);
        let mut data = match self.get(OBJECT_FILE) {
            Some(_) if self.groza => GROZA_OBJECT.to_vec(),
            Some(data) => data.to_vec(),
            None => return Err(ResourceError::ResourceNotExisting(id).into()),
        };
        if is_crypted(&data) {
            crypt::crypt(&mut data, SIERRA_KEY, 0);
        }
        Ok(data)
    }

    pub fn words_data(&self) -> Result<Vec<u8>> {
        let id = ResourceID::new(ResourceType::Word, 0);
        match self.get(WORDS_FILE) {
            Some(_) if self.groza => Ok(GROZA_WORDS.to_vec()),
            Some(data) => Ok(data.to_vec()),
            None => Err(ResourceError::ResourceNotExisting(id).into()),
        }
    }

    /// Interpreter version as stored in AGIDATA.OVL
    pub fn version(&self) -> String {
        let data = match self.get(AGIDATA_FILE) {
            Some(data) => data,
            None => return "unknown".to_string(),
        };
        let start = match data.windows(VERSION_MARKER.len()).position(|w| w == VERSION_MARKER) {
            Some(pos) => pos + VERSION_MARKER.len(),
            None => return "unknown".to_string(),
        };
        let end = data[start..].iter().position(|&b| b == 0).map_or(data.len(), |n| start + n);
        data[start..end].iter().map(|&b| b as char).collect()
    }

    /// AGIPAL palette files, indexed 0..=9 for pal.100 to pal.109
    pub fn palettes(&self) -> Vec<(u8, &[u8])> {
        let mut palettes: Vec<(u8, &[u8])> = self.files.iter()
            .filter_map(|(name, data)| {
                let ext = name.strip_prefix("pal.10")?;
                if ext.len() != 1 { return None; }
                let n = ext.parse::<u8>().ok()?;
                Some((n, data.as_slice()))
            })
            .collect();
        palettes.sort_by_key(|(n, _)| *n);
        palettes
    }
}

/// An OBJECT file is encrypted when its names offset points past the end
pub fn is_crypted(data: &[u8]) -> bool {
    if data.len() < 2 { return false; }
    let names_offset = u16::from_le_bytes([ data[0], data[1] ]) as usize;
    names_offset > data.len()
}
