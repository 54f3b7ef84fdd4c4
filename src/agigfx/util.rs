use bmp::{Image, Pixel, px};
use anyhow::{anyhow, Result};

use crate::agigfx::palette::Palette;

fn check_size(width: u32, height: u32, len: usize) -> Result<()> {
    if (width * height) as usize > len {
        return Err(anyhow!("bitmap {}x{} needs {} pixels, have {}", width, height, width * height, len));
    }
    Ok(())
}

/// Writes palette-indexed pixels as a BMP file
pub fn render_bitmap(fname: &str, width: u32, height: u32, bits: &[u8], palette: &Palette) -> Result<()> {
    check_size(width, height, bits.len())?;
    let mut img = Image::new(width, height);
    for (x, y) in img.coordinates() {
        let v = bits[(width * y + x) as usize] as usize;
        let r = palette[v * 3];
        let g = palette[v * 3 + 1];
        let b = palette[v * 3 + 2];
        img.set_pixel(x, y, px!(r, g, b));
    }
    img.save(fname)?;
    Ok(())
}

/// Writes packed RGBA pixels as a BMP file; alpha is dropped
pub fn render_rgba(fname: &str, width: u32, height: u32, pixels: &[u32]) -> Result<()> {
    check_size(width, height, pixels.len())?;
    let mut img = Image::new(width, height);
    for (x, y) in img.coordinates() {
        let v = pixels[(width * y + x) as usize];
        img.set_pixel(x, y, px!(v >> 24, (v >> 16) & 0xff, (v >> 8) & 0xff));
    }
    img.save(fname)?;
    Ok(())
}
