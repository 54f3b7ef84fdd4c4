use anyhow::{anyhow, Result};

use crate::agigfx::palette;

pub const PICTURE_WIDTH: usize = 160;
pub const PICTURE_HEIGHT: usize = 168;
pub const DEFAULT_PRIORITY: u8 = 4;

const CIRCLES: [&[u8]; 8] = [
    &[ 0x80 ],
    &[ 0xfc ],
    &[ 0x5f, 0xf4 ],
    &[ 0x66, 0xff, 0xf6, 0x60 ],
    &[ 0x23, 0xbf, 0xff, 0xff, 0xee, 0x20 ],
    &[ 0x31, 0xe7, 0x9e, 0xff, 0xff, 0xde, 0x79, 0xe3, 0x00 ],
    &[ 0x38, 0xf9, 0xf3, 0xef, 0xff, 0xff, 0xff, 0xfe, 0xf9, 0xf3, 0xe3, 0x80 ],
    &[ 0x18, 0x3c, 0x7e, 0x7e, 0x7e, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7e, 0x7e, 0x7e, 0x3c, 0x18 ],
];

const SPLATTER_MAP: [u8; 32] = [
    0x20, 0x94, 0x02, 0x24, 0x90, 0x82, 0xa4, 0xa2,
    0x82, 0x09, 0x0a, 0x22, 0x12, 0x10, 0x42, 0x14,
    0x91, 0x4a, 0x91, 0x11, 0x08, 0x12, 0x25, 0x10,
    0x22, 0xa8, 0x14, 0x24, 0x00, 0x50, 0x24, 0x04,
];

/// Splatter map bit position for each of the 120 spray patterns
const SPLATTER_START: [u8; 120] = [
    0x00, 0x18, 0x30, 0xc4, 0xdc, 0x65, 0xeb, 0x48,
    0x60, 0xbd, 0x89, 0x05, 0x0a, 0xf4, 0x7d, 0x7d,
    0x85, 0xb0, 0x8e, 0x95, 0x1f, 0x22, 0x0d, 0xdf,
    0x2a, 0x78, 0xd5, 0x73, 0x1c, 0xb4, 0x40, 0xa1,
    0xb9, 0x3c, 0xca, 0x58, 0x92, 0x34, 0xcc, 0xce,
    0xd7, 0x42, 0x90, 0x0f, 0x8b, 0x7f, 0x32, 0xed,
    0x5c, 0x9d, 0xc8, 0x99, 0xad, 0x4e, 0x56, 0xa6,
    0xf7, 0x68, 0xb7, 0x25, 0x82, 0x37, 0x3a, 0x51,
    0x69, 0x26, 0x38, 0x52, 0x9e, 0x9a, 0x4f, 0xa7,
    0x43, 0x10, 0x80, 0xee, 0x3d, 0x59, 0x35, 0xcf,
    0x79, 0x74, 0xb5, 0xa2, 0xb1, 0x96, 0x23, 0xe0,
    0xbe, 0x05, 0xf5, 0x6e, 0x19, 0xc5, 0x66, 0x49,
    0xf0, 0xd1, 0x54, 0xa9, 0x70, 0x4b, 0xa4, 0xe2,
    0xe6, 0xe5, 0xab, 0xe4, 0xd2, 0xaa, 0x4c, 0xe3,
    0x06, 0x6f, 0xc6, 0x4a, 0xa4, 0x75, 0x97, 0xe1,
];

const PEN_RECTANGLE: u8 = 0x10;
const PEN_SIZE_MASK: u8 = 0x07;

fn bit_set(bits: &[u8], pos: usize) -> bool {
    (bits[pos >> 3] >> (7 - (pos & 7))) & 1 == 1
}

/// Drawing state of a picture: the visual plane as packed RGBA, the
/// priority plane as 0-15, and the current pens. A disabled pen is None.
pub struct PictureContext {
    pub visual: Vec<u32>,
    pub priority: Vec<u8>,
    pub pic_color: Option<u32>,
    pub pri_color: Option<u8>,
    pub pen_style: u8,
    colours: [u32; 16],
    white: u32,
}

impl PictureContext {
    pub fn new() -> Self {
        let ega = palette::ega_palette();
        let mut colours = [ 0u32; 16 ];
        for (n, c) in colours.iter_mut().enumerate() {
            *c = palette::rgba(&ega, n as u8);
        }
        let white = colours[palette::WHITE as usize];
        Self{
            visual: vec![ white; PICTURE_WIDTH * PICTURE_HEIGHT ],
            priority: vec![ DEFAULT_PRIORITY; PICTURE_WIDTH * PICTURE_HEIGHT ],
            pic_color: None,
            pri_color: None,
            pen_style: 0,
            colours,
            white,
        }
    }

    /// Selects EGA colour `colour` (low nibble) for the visual plane
    pub fn set_pic_color(&mut self, colour: Option<u8>) {
        self.pic_color = colour.map(|c| self.colours[(c & 0x0f) as usize]);
    }

    pub fn set_pri_color(&mut self, priority: Option<u8>) {
        self.pri_color = priority.map(|p| p & 0x0f);
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.visual[y * PICTURE_WIDTH + x]
    }

    pub fn priority_pixel(&self, x: usize, y: usize) -> u8 {
        self.priority[y * PICTURE_WIDTH + x]
    }

    /// The visual plane mapped back to EGA colour indices
    pub fn visual_indices(&self) -> Vec<u8> {
        self.visual.iter()
            .map(|rgba| self.colours.iter().position(|c| c == rgba).unwrap_or(0) as u8)
            .collect()
    }

    pub fn put_pixel(&mut self, x: i32, y: i32) {
        if x < 0 || y < 0 || x >= PICTURE_WIDTH as i32 || y >= PICTURE_HEIGHT as i32 {
            return;
        }
        let i = y as usize * PICTURE_WIDTH + x as usize;
        if let Some(c) = self.pic_color {
            self.visual[i] = c;
        }
        if let Some(p) = self.pri_color {
            self.priority[i] = p;
        }
    }

    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let x1 = x1.min(PICTURE_WIDTH as i32 - 1);
        let x2 = x2.min(PICTURE_WIDTH as i32 - 1);
        let y1 = y1.min(PICTURE_HEIGHT as i32 - 1);
        let y2 = y2.min(PICTURE_HEIGHT as i32 - 1);

        if x1 == x2 {
            for y in y1.min(y2)..=y1.max(y2) {
                self.put_pixel(x1, y);
            }
            return;
        }
        if y1 == y2 {
            for x in x1.min(x2)..=x1.max(x2) {
                self.put_pixel(x, y1);
            }
            return;
        }

        let step_x = if x2 < x1 { -1 } else { 1 };
        let step_y = if y2 < y1 { -1 } else { 1 };
        let delta_x = (x2 - x1).abs();
        let delta_y = (y2 - y1).abs();
        let (mut count, det_delta, mut error_x, mut error_y) = if delta_y > delta_x {
            (delta_y, delta_y, delta_y / 2, 0)
        } else {
            (delta_x, delta_x, 0, delta_x / 2)
        };

        let mut x = x1;
        let mut y = y1;
        self.put_pixel(x, y);
        loop {
            error_y += delta_y;
            if error_y >= det_delta {
                error_y -= det_delta;
                y += step_y;
            }
            error_x += delta_x;
            if error_x >= det_delta {
                error_x -= det_delta;
                x += step_x;
            }
            self.put_pixel(x, y);
            count -= 1;
            if count <= 0 { break; }
        }
        self.put_pixel(x, y);
    }

    /// Whether the fill may spread into (x, y). A visual fill stops at
    /// non-white pixels; a priority-only fill stops at priority other than 4.
    pub fn is_fill_correct(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= PICTURE_WIDTH as i32 || y >= PICTURE_HEIGHT as i32 {
            return false;
        }
        let i = y as usize * PICTURE_WIDTH + x as usize;
        match (self.pic_color, self.pri_color) {
            (None, None) => false,
            (Some(c), None) if c != self.white => self.visual[i] == self.white,
            (None, Some(p)) if p != DEFAULT_PRIORITY => self.priority[i] == DEFAULT_PRIORITY,
            (Some(c), _) => c != self.white && self.visual[i] == self.white,
            _ => false,
        }
    }

    pub fn fill(&mut self, x: i32, y: i32) {
        let mut stack = vec![ (x, y) ];
        while let Some((x, y)) = stack.pop() {
            if !self.is_fill_correct(x, y) {
                continue;
            }
            self.put_pixel(x, y);
            if x > 0 && self.is_fill_correct(x - 1, y) {
                stack.push((x - 1, y));
            }
            if x < PICTURE_WIDTH as i32 - 1 && self.is_fill_correct(x + 1, y) {
                stack.push((x + 1, y));
            }
            if y < PICTURE_HEIGHT as i32 - 1 && self.is_fill_correct(x, y + 1) {
                stack.push((x, y + 1));
            }
            if y > 0 && self.is_fill_correct(x, y - 1) {
                stack.push((x, y - 1));
            }
        }
    }

    /// Stamps the pen at (x, y). With a pattern the stamp is sprayed through
    /// the splatter map starting at that pattern's bit.
    pub fn plot(&mut self, pattern: Option<u8>, x: i32, y: i32) -> Result<()> {
        let mut bit_pos = match pattern {
            Some(p) => *SPLATTER_START.get(p as usize)
                .ok_or_else(|| anyhow!("splatter pattern {} out of range", p))? as usize,
            None => 0,
        };
        let circle = self.pen_style & PEN_RECTANGLE == 0;
        let size = (self.pen_style & PEN_SIZE_MASK) as i32;
        let shape = CIRCLES[size as usize];

        let x = if x < size { size - 1 } else { x };
        let y = if y < size { size } else { y };

        let mut circle_pos = 0;
        for y1 in y - size..=y + size {
            for x1 in x - (size + 1) / 2..=x + size / 2 {
                if circle {
                    let inside = bit_set(shape, circle_pos);
                    circle_pos += 1;
                    if !inside { continue; }
                }
                if pattern.is_none() {
                    self.put_pixel(x1, y1);
                    continue;
                }
                if bit_set(&SPLATTER_MAP, bit_pos) {
                    self.put_pixel(x1, y1);
                }
                bit_pos += 1;
                if bit_pos == 0xff {
                    bit_pos = 0;
                }
            }
        }
        Ok(())
    }
}

impl Default for PictureContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn rect(ctx: &mut PictureContext, x1: i32, y1: i32, x2: i32, y2: i32) {
        ctx.draw_line(x1, y1, x2, y1);
        ctx.draw_line(x2, y1, x2, y2);
        ctx.draw_line(x2, y2, x1, y2);
        ctx.draw_line(x1, y2, x1, y1);
    }

    #[test]
    fn initial_planes() {
        let ctx = PictureContext::new();
        assert_eq!(ctx.pixel(0, 0), 0xffffffff);
        assert_eq!(ctx.priority_pixel(159, 167), DEFAULT_PRIORITY);
        assert!(ctx.visual_indices().iter().all(|&c| c == 15));
    }

    #[test]
    fn fill_inside_rectangle() {
        let mut ctx = PictureContext::new();
        ctx.set_pic_color(Some(0));
        rect(&mut ctx, 10, 10, 20, 20);
        ctx.set_pic_color(Some(1));
        ctx.fill(15, 15);
        let blue = 0x0000aaff;
        for y in 11..20 {
            for x in 11..20 {
                assert_eq!(ctx.pixel(x, y), blue, "({}, {})", x, y);
            }
        }
        assert_eq!(ctx.pixel(10, 15), 0x000000ff);
        assert_eq!(ctx.pixel(9, 15), 0xffffffff);
        assert_eq!(ctx.pixel(21, 21), 0xffffffff);
        assert_eq!(ctx.priority_pixel(15, 15), DEFAULT_PRIORITY);
    }

    #[test]
    fn priority_only_fill() {
        let mut ctx = PictureContext::new();
        ctx.set_pri_color(Some(9));
        ctx.draw_line(0, 50, 159, 50);
        ctx.fill(80, 10);
        assert_eq!(ctx.priority_pixel(0, 0), 9);
        assert_eq!(ctx.priority_pixel(159, 49), 9);
        assert_eq!(ctx.priority_pixel(80, 51), DEFAULT_PRIORITY);
        assert_eq!(ctx.pixel(80, 10), 0xffffffff);
    }

    #[test]
    fn fill_rules() {
        let mut ctx = PictureContext::new();
        assert!(!ctx.is_fill_correct(5, 5));
        ctx.set_pic_color(Some(15));
        assert!(!ctx.is_fill_correct(5, 5));
        ctx.set_pic_color(Some(2));
        assert!(ctx.is_fill_correct(5, 5));
        ctx.set_pri_color(Some(DEFAULT_PRIORITY));
        assert!(ctx.is_fill_correct(5, 5));
        ctx.set_pic_color(None);
        assert!(!ctx.is_fill_correct(5, 5));
        assert!(!ctx.is_fill_correct(0, PICTURE_HEIGHT as i32));
    }

    #[test]
    fn fill_seed_off_canvas() {
        let mut ctx = PictureContext::new();
        ctx.set_pic_color(Some(0));
        ctx.draw_line(100, 0, 100, 167);
        ctx.set_pic_color(Some(1));
        ctx.fill(200, 10);
        ctx.fill(10, 168);
        ctx.fill(-1, 10);
        assert!(!ctx.is_fill_correct(160, 10));
        assert!(!ctx.is_fill_correct(239, 0));
        assert!(!ctx.is_fill_correct(0, 168));
        assert!(ctx.visual_indices().iter().all(|&c| c == 15 || c == 0));
    }

    #[test]
    fn fill_from_edges_stays_in_rows() {
        let blue = 0x0000aaff;
        let black = 0x000000ff;
        let white = 0xffffffff;

        // right strip bounded by a wall at x = 150
        let mut ctx = PictureContext::new();
        ctx.set_pic_color(Some(0));
        ctx.draw_line(150, 0, 150, 167);
        ctx.set_pic_color(Some(1));
        ctx.fill(159, 167);
        for y in [ 0, 80, 167 ] {
            for x in 151..160 {
                assert_eq!(ctx.pixel(x, y), blue, "({}, {})", x, y);
            }
            assert_eq!(ctx.pixel(150, y), black);
            assert_eq!(ctx.pixel(149, y), white);
            assert_eq!(ctx.pixel(0, y), white);
        }

        // left strip from the top left corner
        let mut ctx = PictureContext::new();
        ctx.set_pic_color(Some(0));
        ctx.draw_line(5, 0, 5, 167);
        ctx.set_pic_color(Some(1));
        ctx.fill(0, 0);
        for y in [ 0, 167 ] {
            for x in 0..5 {
                assert_eq!(ctx.pixel(x, y), blue, "({}, {})", x, y);
            }
            assert_eq!(ctx.pixel(6, y), white);
            assert_eq!(ctx.pixel(159, y), white);
        }

        // top row band
        let mut ctx = PictureContext::new();
        ctx.set_pic_color(Some(0));
        ctx.draw_line(0, 1, 159, 1);
        ctx.set_pic_color(Some(1));
        ctx.fill(80, 0);
        assert!((0..160).all(|x| ctx.pixel(x, 0) == blue));
        assert!((0..160).all(|x| ctx.pixel(x, 2) == white));
    }

    #[test]
    fn diagonal_line() {
        let mut ctx = PictureContext::new();
        ctx.set_pic_color(Some(4));
        ctx.draw_line(0, 0, 4, 2);
        let red = 0xaa0000ff;
        let drawn: Vec<(usize, usize)> = (0..3)
            .flat_map(|y| (0..5).map(move |x| (x, y)))
            .filter(|(x, y)| ctx.pixel(*x, *y) == red)
            .collect();
        assert_eq!(drawn, vec![ (0, 0), (1, 1), (2, 1), (3, 2), (4, 2) ]);
    }

    #[test]
    fn clipped_line() {
        let mut ctx = PictureContext::new();
        ctx.set_pri_color(Some(1));
        ctx.draw_line(150, 5, 200, 5);
        assert_eq!(ctx.priority_pixel(159, 5), 1);
        assert_eq!(ctx.priority_pixel(149, 5), DEFAULT_PRIORITY);
    }

    #[test]
    fn plot_pen() {
        let mut ctx = PictureContext::new();
        ctx.set_pic_color(Some(0));
        ctx.pen_style = PEN_RECTANGLE | 1;
        ctx.plot(None, 50, 50).unwrap();
        let black = 0x000000ff;
        let drawn = ctx.visual.iter().filter(|&&c| c == black).count();
        // 2 wide, 3 high
        assert_eq!(drawn, 6);
        assert_eq!(ctx.pixel(49, 49), black);
        assert_eq!(ctx.pixel(50, 51), black);

        ctx.pen_style = 0;
        ctx.plot(None, 0, 0).unwrap();
        assert_eq!(ctx.pixel(0, 0), black);
        assert!(ctx.plot(Some(120), 10, 10).is_err());
    }

    #[test]
    fn splatter() {
        let mut ctx = PictureContext::new();
        ctx.set_pic_color(Some(0));
        ctx.pen_style = PEN_RECTANGLE | 7;
        ctx.plot(Some(0), 80, 80).unwrap();
        let black = 0x000000ff;
        // pattern 0 reads the map from bit 0: 0x20 sets only the third bit
        assert_eq!(ctx.pixel(76, 73), 0xffffffff);
        assert_eq!(ctx.pixel(78, 73), black);
        let drawn = ctx.visual.iter().filter(|&&c| c == black).count();
        assert!(drawn > 0 && drawn < 8 * 15);
    }
}
