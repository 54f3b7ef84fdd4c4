use anyhow::{anyhow, Result};

/// 256 RGB triplets, 8 bits per component
pub type Palette = [u8; 768];

/// EGA colours as 6-bit DAC values
const EGA_DAC: [[u8; 3]; 16] = [
    [ 0, 0, 0 ], [ 0, 0, 42 ], [ 0, 42, 0 ], [ 0, 42, 42 ],
    [ 42, 0, 0 ], [ 42, 0, 42 ], [ 42, 21, 0 ], [ 42, 42, 42 ],
    [ 21, 21, 21 ], [ 21, 21, 63 ], [ 21, 63, 21 ], [ 21, 63, 63 ],
    [ 63, 21, 21 ], [ 63, 21, 63 ], [ 63, 63, 21 ], [ 63, 63, 63 ],
];

const VGA_GREYS: [u8; 16] = [ 0, 5, 8, 11, 14, 17, 20, 24, 28, 32, 36, 40, 45, 50, 56, 63 ];

/// Intensity levels of the nine hue rings of the BIOS palette
const VGA_RING_LEVELS: [[u8; 5]; 9] = [
    [ 0, 16, 31, 47, 63 ], [ 31, 39, 47, 55, 63 ], [ 45, 49, 54, 58, 63 ],
    [ 0, 7, 14, 21, 28 ], [ 14, 17, 21, 24, 28 ], [ 20, 22, 24, 26, 28 ],
    [ 0, 4, 8, 12, 16 ], [ 8, 10, 12, 14, 16 ], [ 11, 12, 13, 15, 16 ],
];

/// Level index per component for the 24 hues of a ring, blue through red and green back to blue
const VGA_RING_HUES: [[usize; 3]; 24] = [
    [ 0, 0, 4 ], [ 1, 0, 4 ], [ 2, 0, 4 ], [ 3, 0, 4 ], [ 4, 0, 4 ], [ 4, 0, 3 ], [ 4, 0, 2 ], [ 4, 0, 1 ],
    [ 4, 0, 0 ], [ 4, 1, 0 ], [ 4, 2, 0 ], [ 4, 3, 0 ], [ 4, 4, 0 ], [ 3, 4, 0 ], [ 2, 4, 0 ], [ 1, 4, 0 ],
    [ 0, 4, 0 ], [ 0, 4, 1 ], [ 0, 4, 2 ], [ 0, 4, 3 ], [ 0, 4, 4 ], [ 0, 3, 4 ], [ 0, 2, 4 ], [ 0, 1, 4 ],
];

pub const WHITE: u8 = 15;

fn dac_to_8bit(v: u8) -> u8 {
    let v = v & 0x3f;
    (v << 2) | (v >> 4)
}

fn set_dac(palette: &mut Palette, index: usize, rgb: [u8; 3]) {
    for (n, c) in rgb.iter().enumerate() {
        palette[index * 3 + n] = dac_to_8bit(*c);
    }
}

pub fn fill_ega_colours(palette: &mut Palette) {
    for (n, rgb) in EGA_DAC.iter().enumerate() {
        set_dac(palette, n, *rgb);
    }
}

pub fn ega_palette() -> Palette {
    let mut palette = [ 0u8; 768 ];
    fill_ega_colours(&mut palette);
    palette
}

/// Power-on VGA palette: EGA colours, a grey ramp, nine hue rings, then black
pub fn vga_palette() -> Palette {
    let mut palette = [ 0u8; 768 ];
    fill_ega_colours(&mut palette);
    for (n, grey) in VGA_GREYS.iter().enumerate() {
        set_dac(&mut palette, 16 + n, [ *grey; 3 ]);
    }
    let mut index = 32;
    for levels in &VGA_RING_LEVELS {
        for hue in &VGA_RING_HUES {
            set_dac(&mut palette, index, [ levels[hue[0]], levels[hue[1]], levels[hue[2]] ]);
            index += 1;
        }
    }
    palette
}

/// Parses a DAC dump (AGIPAL pal.1xx): 6-bit RGB triplets, at least the 16
/// EGA slots. Entries the file does not cover stay black.
pub fn from_vga_dac(data: &[u8]) -> Result<Palette> {
    if data.len() < 16 * 3 {
        return Err(anyhow!("palette too short ({} bytes)", data.len()));
    }
    let mut palette = [ 0u8; 768 ];
    for (n, rgb) in data.chunks_exact(3).take(256).enumerate() {
        set_dac(&mut palette, n, [ rgb[0], rgb[1], rgb[2] ]);
    }
    Ok(palette)
}

/// Colour `index` as packed RGBA8888
pub fn rgba(palette: &Palette, index: u8) -> u32 {
    let i = index as usize * 3;
    (palette[i] as u32) << 24 | (palette[i + 1] as u32) << 16 | (palette[i + 2] as u32) << 8 | 0xff
}
