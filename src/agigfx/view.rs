use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Seek, SeekFrom};
use anyhow::{Context, Result};

use crate::agires::bytes;

const MIRRORED: u8 = 0x08;

pub struct Cel {
    pub width: u8,
    pub height: u8,
    /// Colour index treated as see-through
    pub transparent: u8,
    pub pixels: Vec<u8>,
}

impl Cel {
    fn new(rdr: &mut Cursor<&[u8]>, loop_number: usize) -> Result<Cel> {
        let width = rdr.read_u8()?;
        let height = rdr.read_u8()?;
        let trans_mirror = rdr.read_u8()?;
        let mirror_info = trans_mirror >> 4;
        let transparent = trans_mirror & 0x0f;

        let w = width as usize;
        let mut pixels = vec![ transparent; w * height as usize ];
        let mut overflow = false;
        for y in 0..height as usize {
            let mut x = 0;
            loop {
                let b = rdr.read_u8()?;
                if b == 0 { break; }
                let colour = b >> 4;
                for _ in 0..(b & 0x0f) {
                    if x < w {
                        pixels[y * w + x] = colour;
                    } else {
                        overflow = true;
                    }
                    x += 1;
                }
            }
        }
        if overflow {
            log::warn!("view: cel row runs past width {}, clipped", width);
        }

        let mut cel = Cel{ width, height, transparent, pixels };
        if mirror_info & MIRRORED != 0 && (mirror_info & 0x07) as usize != loop_number {
            cel.mirror();
        }
        Ok(cel)
    }

    fn mirror(&mut self) {
        let w = self.width as usize;
        if w == 0 { return; }
        for row in self.pixels.chunks_exact_mut(w) {
            row.reverse();
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width as usize + x]
    }
}

pub struct Loop {
    pub cels: Vec<Cel>,
}

pub struct View {
    pub description: String,
    pub loops: Vec<Loop>,
}

impl View {
    pub fn new(data: &[u8]) -> Result<Self> {
        let mut rdr = Cursor::new(data);
        rdr.seek(SeekFrom::Start(2))?;
        let num_loops = rdr.read_u8().context("view: header truncated")?;
        let description_offset = rdr.read_u16::<LittleEndian>().context("view: header truncated")?;
        let description = if description_offset == 0 {
            String::new()
        } else {
            bytes::read_cstring(data, description_offset as usize)
                .with_context(|| format!("view: description at {} out of range", description_offset))?
        };

        let mut loop_offsets = vec![ 0u16; num_loops as usize ];
        for offset in loop_offsets.iter_mut() {
            *offset = rdr.read_u16::<LittleEndian>().context("view: loop table truncated")?;
        }

        let mut loops = Vec::new();
        for (n, loop_offset) in loop_offsets.iter().enumerate() {
            let loop_offset = *loop_offset as u64;
            rdr.seek(SeekFrom::Start(loop_offset))?;
            let num_cels = rdr.read_u8().with_context(|| format!("view: loop {} truncated", n))?;
            let mut cel_offsets = vec![ 0u16; num_cels as usize ];
            for offset in cel_offsets.iter_mut() {
                *offset = rdr.read_u16::<LittleEndian>().with_context(|| format!("view: loop {} truncated", n))?;
            }

            let mut cels = Vec::new();
            for (m, cel_offset) in cel_offsets.iter().enumerate() {
                rdr.seek(SeekFrom::Start(loop_offset + *cel_offset as u64))?;
                let cel = Cel::new(&mut rdr, n)
                    .with_context(|| format!("view: cel {} of loop {} truncated", m, n))?;
                cels.push(cel);
            }
            loops.push(Loop{ cels });
        }
        Ok(Self{ description, loops })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    // two loops sharing one mirrored cel, plus a description
    fn sample_view() -> Vec<u8> {
        let mut data = vec![ 0x01, 0x01, 0x02, 0x00, 0x00, 0x09, 0x00, 0x09, 0x00 ];
        // loop at 9: one cel at +3
        data.extend_from_slice(&[ 0x01, 0x03, 0x00 ]);
        // cel at 12: 3x2, transparent 5, mirrored, drawn for loop 0
        data.extend_from_slice(&[ 0x03, 0x02, 0x85 ]);
        data.extend_from_slice(&[ 0x12, 0x21, 0x00 ]);
        data.extend_from_slice(&[ 0x43, 0x00 ]);
        let text = data.len() as u16;
        data[3..5].copy_from_slice(&text.to_le_bytes());
        data.extend_from_slice(b"a view\0");
        data
    }

    #[test]
    fn decode_view() {
        let view = View::new(&sample_view()).unwrap();
        assert_eq!(view.description, "a view");
        assert_eq!(view.loops.len(), 2);

        let cel = &view.loops[0].cels[0];
        assert_eq!((cel.width, cel.height, cel.transparent), (3, 2, 5));
        assert_eq!(cel.pixels, vec![ 1, 1, 2, 4, 4, 4 ]);

        let mirrored = &view.loops[1].cels[0];
        assert_eq!(mirrored.pixels, vec![ 2, 1, 1, 4, 4, 4 ]);
    }

    #[test]
    fn short_rows_padded() {
        let data = [
            0x00, 0x00, 0x01, 0x00, 0x00, 0x07, 0x00,
            0x01, 0x03, 0x00,
            0x04, 0x02, 0x0f, 0x31, 0x00, 0x00,
        ];
        let view = View::new(&data).unwrap();
        assert_eq!(view.description, "");
        let cel = &view.loops[0].cels[0];
        assert_eq!(cel.pixels, vec![ 3, 15, 15, 15, 15, 15, 15, 15 ]);
        assert_eq!(cel.pixel(0, 0), 3);
    }

    #[test]
    fn truncated_view() {
        assert!(View::new(&[ 0x00, 0x00 ]).is_err());
        let mut data = sample_view();
        data.truncate(16);
        assert!(View::new(&data).is_err());
    }
}
