use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::agigfx::agi256::Agi256Picture;
use crate::agigfx::palette::{self, Palette};
use crate::agigfx::picture::Picture;
use crate::agigfx::view::View;
use crate::agires::cache::{CacheHandle, ResourceCache};
use crate::agires::resource::{is_not_existing, GameFiles, ResourceID, ResourceProvider, ResourceType};
use crate::agires::resource2::{self, ResourceProviderV2};
use crate::agires::resource3::ResourceProviderV3;
use crate::agiscript::logic::Script;
use crate::agiscript::objects::InventoryTable;
use crate::agiscript::opcode::OperationTable;
use crate::agiscript::words::WordIndex;
use crate::agisnd::sound::Sound;

/// Number of slots per resource type
pub const NUM_SLOTS: u16 = 256;

pub enum Container {
    V2(ResourceProviderV2),
    V3(ResourceProviderV3),
}

impl Container {
    pub fn provider(&self) -> &dyn ResourceProvider {
        match self {
            Container::V2(p) => p,
            Container::V3(p) => p,
        }
    }

    pub fn signature(&self) -> Option<&str> {
        match self {
            Container::V2(_) => None,
            Container::V3(p) => Some(p.signature()),
        }
    }
}

/// Picks the V2 layout when all four directory files exist, V3 otherwise
pub fn open_container(files: GameFiles) -> Result<Container> {
    let missing = resource2::missing_directories(&files);
    if missing.len() < 4 && !missing.is_empty() {
        log::warn!("v2 directory files incomplete, missing {}; trying v3", missing.join(", "));
    }
    if missing.is_empty() {
        log::debug!("opening v2 container");
        Ok(Container::V2(ResourceProviderV2::new(files)?))
    } else {
        log::debug!("opening v3 container");
        Ok(Container::V3(ResourceProviderV3::new(files)?))
    }
}

pub struct Game {
    container: Container,
    pub version: String,
    pub words: Option<WordIndex>,
    pub objects: Option<InventoryTable>,
    /// AGIPAL palettes by file number (pal.100 is 0)
    pub palettes: Vec<(u8, Palette)>,
    table: OperationTable,
    logics: ResourceCache<Script>,
    pictures: ResourceCache<Picture>,
    views: ResourceCache<View>,
    sounds: ResourceCache<Sound>,
}

impl Game {
    /// Opens a game from its files. `version` overrides the interpreter
    /// version found in AGIDATA.OVL.
    pub fn new(files: HashMap<String, Vec<u8>>, version: Option<&str>) -> Result<Game> {
        let files = GameFiles::new(files);
        let version = version.map(|v| v.to_string()).unwrap_or_else(|| files.version());
        log::debug!("interpreter version {}", version);

        let words = load_optional("words", files.words_data(), |data| WordIndex::new(data));
        let objects = load_optional("objects", files.object_data(), |data| InventoryTable::new(data));

        let mut palettes = Vec::new();
        for (n, data) in files.palettes() {
            match palette::from_vga_dac(data) {
                Ok(p) => palettes.push((n, p)),
                Err(e) => log::warn!("pal.{}: {:#}", 100 + n as u16, e),
            }
        }

        let table = OperationTable::new(&version)?;
        let container = open_container(files)?;
        Ok(Game{
            container,
            version,
            words,
            objects,
            palettes,
            table,
            logics: ResourceCache::new(),
            pictures: ResourceCache::new(),
            views: ResourceCache::new(),
            sounds: ResourceCache::new(),
        })
    }

    pub fn provider(&self) -> &dyn ResourceProvider {
        self.container.provider()
    }

    /// Signature of a V3 game, e.g. "KQ4"
    pub fn v3_signature(&self) -> Option<&str> {
        self.container.signature()
    }

    pub fn operation_table(&self) -> &OperationTable {
        &self.table
    }

    fn raw(&self, id: &ResourceID) -> Result<Vec<u8>> {
        Ok(self.provider().open(id)?.data)
    }

    pub fn logic(&self, num: u16) -> Result<CacheHandle<Script>> {
        self.logics.acquire(ResourceID::new(ResourceType::Logic, num), |id| {
            let data = self.raw(id)?;
            Script::new(num, &data, &self.table).with_context(|| format!("cannot decode {}", id))
        })
    }

    pub fn picture(&self, num: u16) -> Result<CacheHandle<Picture>> {
        self.pictures.acquire(ResourceID::new(ResourceType::Picture, num), |id| {
            let data = self.raw(id)?;
            Picture::new(&data).with_context(|| format!("cannot decode {}", id))
        })
    }

    pub fn view(&self, num: u16) -> Result<CacheHandle<View>> {
        self.views.acquire(ResourceID::new(ResourceType::View, num), |id| {
            let data = self.raw(id)?;
            View::new(&data).with_context(|| format!("cannot decode {}", id))
        })
    }

    pub fn sound(&self, num: u16) -> Result<CacheHandle<Sound>> {
        self.sounds.acquire(ResourceID::new(ResourceType::Sound, num), |id| {
            let data = self.raw(id)?;
            Sound::new(&data).with_context(|| format!("cannot decode {}", id))
        })
    }

    /// Picture slot `num` read as a raw 256-colour image. Not cached.
    pub fn agi256_picture(&self, num: u16) -> Result<Agi256Picture> {
        let id = ResourceID::new(ResourceType::Picture, num);
        Agi256Picture::new(&self.raw(&id)?).with_context(|| format!("cannot decode {}", id))
    }

    /// AGIPAL palette `n`, or the default VGA palette
    pub fn vga_palette(&self, n: u8) -> Palette {
        self.palettes.iter()
            .find(|(num, _)| *num == n)
            .map(|(_, p)| *p)
            .unwrap_or_else(palette::vga_palette)
    }

    /// The id set by set.game.id in LOGIC.000
    pub fn game_id(&self) -> Option<String> {
        let logic = self.logic(0).ok()?;
        logic.game_id().map(|s| s.to_string())
    }

    pub fn all_logics(&self) -> Vec<Option<CacheHandle<Script>>> {
        load_all(ResourceType::Logic, |n| self.logic(n))
    }

    pub fn all_pictures(&self) -> Vec<Option<CacheHandle<Picture>>> {
        load_all(ResourceType::Picture, |n| self.picture(n))
    }

    pub fn all_views(&self) -> Vec<Option<CacheHandle<View>>> {
        load_all(ResourceType::View, |n| self.view(n))
    }

    pub fn all_sounds(&self) -> Vec<Option<CacheHandle<Sound>>> {
        load_all(ResourceType::Sound, |n| self.sound(n))
    }

    /// Drops every cached resource without a live handle
    pub fn evict_unused(&self) -> usize {
        self.logics.evict_unused() + self.pictures.evict_unused()
            + self.views.evict_unused() + self.sounds.evict_unused()
    }
}

/// Fills all slots of a type. Absent numbers stay None quietly; any other
/// failure is logged and leaves the slot empty.
fn load_all<T, F>(rtype: ResourceType, mut load: F) -> Vec<Option<T>>
    where F: FnMut(u16) -> Result<T>
{
    (0..NUM_SLOTS)
        .map(|n| match load(n) {
            Ok(value) => Some(value),
            Err(e) if is_not_existing(&e) => None,
            Err(e) => {
                log::warn!("{}: {:#}", ResourceID::new(rtype, n), e);
                None
            }
        })
        .collect()
}

fn load_optional<T, F>(what: &str, data: Result<Vec<u8>>, decode: F) -> Option<T>
    where F: FnOnce(&[u8]) -> Result<T>
{
    let data = match data {
        Ok(data) => data,
        Err(e) if is_not_existing(&e) => {
            log::debug!("{}: not present", what);
            return None;
        },
        Err(e) => {
            log::warn!("{}: {:#}", what, e);
            return None;
        }
    };
    match decode(&data) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("{}: {:#}", what, e);
            None
        }
    }
}
