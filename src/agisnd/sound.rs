use byteorder::{LittleEndian, WriteBytesExt};
use anyhow::{anyhow, Result};

use crate::agires::bytes;

pub const NUM_CHANNELS: usize = 4;
const NOTE_SIZE: usize = 5;
const END_OF_CHANNEL: u16 = 0xffff;
/// Clock of the tone generator divided by 32
const TONE_CLOCK: f64 = 111860.0;

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct SoundNote {
    pub channel: u8,
    /// In 1/60 second ticks
    pub duration: u16,
    /// 10-bit tone divisor; 0 is silence
    pub divisor: u16,
    /// 0 loudest, 15 off
    pub attenuation: u8,
}

impl SoundNote {
    fn decode(channel: u8, raw: &[u8; NOTE_SIZE]) -> Option<SoundNote> {
        let duration = u16::from_le_bytes([ raw[0], raw[1] ]);
        if duration == END_OF_CHANNEL {
            return None;
        }
        let divisor = ((raw[2] as u16 & 0x3f) << 4) | (raw[3] as u16 & 0x0f);
        Some(SoundNote{ channel, duration, divisor, attenuation: raw[4] & 0x0f })
    }

    pub fn frequency(&self) -> f64 {
        if self.divisor == 0 { 0.0 } else { TONE_CLOCK / self.divisor as f64 }
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let channel_bits = (self.channel << 5) & 0x60;
        out.write_u16::<LittleEndian>(self.duration)?;
        out.write_u8(((self.divisor >> 4) & 0x3f) as u8)?;
        out.write_u8(0x80 | channel_bits | (self.divisor & 0x0f) as u8)?;
        out.write_u8(0x90 | channel_bits | (self.attenuation & 0x0f))?;
        Ok(())
    }
}

impl std::fmt::Display for SoundNote {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:5} ticks  {:8.2} Hz  att {:2}", self.duration, self.frequency(), self.attenuation)
    }
}

pub struct Sound {
    pub channels: [ Vec<SoundNote>; NUM_CHANNELS ],
}

impl Sound {
    pub fn new(data: &[u8]) -> Result<Sound> {
        let mut offsets = [ 0usize; NUM_CHANNELS ];
        for (n, offset) in offsets.iter_mut().enumerate() {
            *offset = bytes::read_lohi(data, n * 2)
                .map_err(|_| anyhow!("sound: channel table truncated"))? as usize;
        }

        let mut channels: [ Vec<SoundNote>; NUM_CHANNELS ] = Default::default();
        for (n, notes) in channels.iter_mut().enumerate() {
            let start = offsets[n];
            let end = if n + 1 < NUM_CHANNELS { offsets[n + 1] } else { data.len() };
            if start > data.len() {
                log::warn!("sound: channel {} starts at {} past end of data", n, start);
                continue;
            }
            let mut pos = start;
            while pos < end {
                let mut raw = [ 0u8; NOTE_SIZE ];
                for (i, b) in raw.iter_mut().enumerate() {
                    *b = data.get(pos + i).copied().unwrap_or(0);
                }
                match SoundNote::decode(n as u8, &raw) {
                    Some(note) => notes.push(note),
                    None => break
                }
                pos += NOTE_SIZE;
            }
        }
        Ok(Sound{ channels })
    }

    /// Builds the resource image: channel table, then each channel's notes
    /// closed by the end marker
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        let mut offsets = Vec::new();
        for notes in &self.channels {
            let offset = NUM_CHANNELS * 2 + body.len();
            offsets.push(u16::try_from(offset).map_err(|_| anyhow!("sound: offset {} does not fit", offset))?);
            for note in notes {
                note.encode(&mut body)?;
            }
            body.write_u16::<LittleEndian>(END_OF_CHANNEL)?;
        }
        let mut out = Vec::with_capacity(NUM_CHANNELS * 2 + body.len());
        for offset in offsets {
            out.write_u16::<LittleEndian>(offset)?;
        }
        out.extend(body);
        Ok(out)
    }

    pub fn num_notes(&self) -> usize {
        self.channels.iter().map(|c| c.len()).sum()
    }

    /// Length of the longest channel in ticks
    pub fn duration(&self) -> u32 {
        self.channels.iter()
            .map(|c| c.iter().map(|n| n.duration as u32).sum::<u32>())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn note(channel: u8, duration: u16, divisor: u16, attenuation: u8) -> SoundNote {
        SoundNote{ channel, duration, divisor, attenuation }
    }

    #[test]
    fn decode_channels() {
        let data = [
            0x08, 0x00, 0x12, 0x00, 0x14, 0x00, 0x16, 0x00,
            // channel 0: one note, terminator
            0x10, 0x00, 0x3f, 0x8f, 0x92, 0xff, 0xff, 0x00, 0x00, 0x00,
            0xff, 0xff,
            0xff, 0xff,
            // channel 3 ends the data in the middle of a note
            0x20, 0x00, 0x01,
        ];
        let sound = Sound::new(&data).unwrap();
        assert_eq!(sound.channels[0], vec![ note(0, 16, 0x3ff, 2) ]);
        assert!(sound.channels[1].is_empty());
        assert!(sound.channels[2].is_empty());
        assert_eq!(sound.channels[3], vec![ note(3, 32, 0x10, 0) ]);
        assert_eq!(sound.num_notes(), 2);
        assert_eq!(sound.duration(), 32);
    }

    #[test]
    fn frequency() {
        assert_eq!(note(0, 1, 0, 0).frequency(), 0.0);
        assert_eq!(note(0, 1, 254, 0).frequency(), 111860.0 / 254.0);
    }

    #[test]
    fn encode_layout() {
        let sound = Sound{ channels: [
            vec![ note(0, 30, 0x155, 4) ],
            vec![],
            vec![ note(2, 7, 0x020, 15), note(2, 8, 0, 0) ],
            vec![],
        ] };
        let data = sound.encode().unwrap();
        assert_eq!(&data[0..8], &[ 0x08, 0x00, 0x0f, 0x00, 0x11, 0x00, 0x1d, 0x00 ]);
        assert_eq!(&data[8..13], &[ 0x1e, 0x00, 0x15, 0x85, 0x94 ]);
        assert_eq!(&data[17..22], &[ 0x07, 0x00, 0x02, 0xc0, 0xdf ]);
        assert_eq!(data.len(), 0x1d + 2);
        assert_eq!(Sound::new(&data).unwrap().channels, sound.channels);
    }

    #[test]
    fn short_header() {
        assert!(Sound::new(&[ 0x08, 0x00, 0x08 ]).is_err());
    }
}
