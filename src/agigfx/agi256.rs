use anyhow::{anyhow, Result};

use crate::agigfx::context::{PICTURE_HEIGHT, PICTURE_WIDTH};
use crate::agigfx::palette::{self, Palette};

const IMAGE_SIZE: usize = PICTURE_WIDTH * PICTURE_HEIGHT;

/// A 256-colour picture: one VGA palette index per pixel, no opcode stream
pub struct Agi256Picture {
    pub pixels: Vec<u8>,
}

impl Agi256Picture {
    pub fn new(data: &[u8]) -> Result<Self> {
        if data.len() < IMAGE_SIZE {
            return Err(anyhow!("agi256: image too short ({} of {} bytes)", data.len(), IMAGE_SIZE));
        }
        if data.len() > IMAGE_SIZE {
            log::debug!("agi256: ignoring {} trailing bytes", data.len() - IMAGE_SIZE);
        }
        Ok(Self{ pixels: data[..IMAGE_SIZE].to_vec() })
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * PICTURE_WIDTH + x]
    }

    /// Packed RGBA for every pixel
    pub fn to_rgba(&self, palette: &Palette) -> Vec<u32> {
        self.pixels.iter().map(|&v| palette::rgba(palette, v)).collect()
    }
}
