use anyhow::{anyhow, Result};

use crate::agigfx::context::PictureContext;

const CMD_START: u8 = 0xf0;
const CMD_CHANGE_PIC_COLOR: u8 = 0xf0;
const CMD_DISABLE_PIC_DRAW: u8 = 0xf1;
const CMD_CHANGE_PRI_COLOR: u8 = 0xf2;
const CMD_DISABLE_PRI_DRAW: u8 = 0xf3;
const CMD_DRAW_Y_CORNER: u8 = 0xf4;
const CMD_DRAW_X_CORNER: u8 = 0xf5;
const CMD_DRAW_ABS_LINE: u8 = 0xf6;
const CMD_DRAW_REL_LINE: u8 = 0xf7;
const CMD_FILL: u8 = 0xf8;
const CMD_CHANGE_PEN: u8 = 0xf9;
const CMD_PLOT: u8 = 0xfa;
const CMD_END: u8 = 0xff;

/// Colour argument that disables a plane
const DISABLED_COLOR: u8 = 0xff;
const PEN_SPLATTER: u8 = 0x20;

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Point {
    pub x: u8,
    pub y: u8,
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct PlotPoint {
    /// Spray pattern, only present when the pen was splattering
    pub pattern: Option<u8>,
    pub x: u8,
    pub y: u8,
}

#[derive(Clone,Debug,PartialEq,Eq)]
pub enum PictureEntry {
    ChangePicColor(Option<u8>),
    ChangePriColor(Option<u8>),
    /// Alternating y then x steps from `start`
    DrawYCorner{ start: Point, steps: Vec<u8> },
    /// Alternating x then y steps from `start`
    DrawXCorner{ start: Point, steps: Vec<u8> },
    AbsLine(Vec<Point>),
    RelLine{ start: Point, deltas: Vec<(i8, i8)> },
    Fill(Vec<Point>),
    ChangePen(u8),
    Plot(Vec<PlotPoint>),
}

struct CommandReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CommandReader<'a> {
    fn read(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    /// Next byte if it is not a command
    fn read_param(&mut self) -> Option<u8> {
        match self.data.get(self.pos) {
            Some(b) if *b < CMD_START => self.read(),
            _ => None,
        }
    }

    fn read_point(&mut self) -> Option<Point> {
        let x = self.read()?;
        let y = self.read()?;
        Some(Point{ x, y })
    }

    /// A point whose x must not be a command byte
    fn read_param_point(&mut self) -> Option<Point> {
        let x = self.read_param()?;
        let y = self.read()?;
        Some(Point{ x, y })
    }

    fn read_color(&mut self) -> Option<u8> {
        match self.read() {
            Some(DISABLED_COLOR) | None => None,
            Some(c) => Some(c)
        }
    }
}

fn rel_delta(b: u8) -> (i8, i8) {
    let mut dx = ((b & 0x70) >> 4) as i8;
    let mut dy = (b & 0x07) as i8;
    if b & 0x80 != 0 { dx = -dx; }
    if b & 0x08 != 0 { dy = -dy; }
    (dx, dy)
}

impl std::fmt::Display for PictureEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PictureEntry::ChangePicColor(Some(c)) => { write!(f, "pic-color {}", c) },
            PictureEntry::ChangePicColor(None) => { write!(f, "pic-color off") },
            PictureEntry::ChangePriColor(Some(c)) => { write!(f, "pri-color {}", c) },
            PictureEntry::ChangePriColor(None) => { write!(f, "pri-color off") },
            PictureEntry::DrawYCorner{ start, steps } => { write!(f, "y-corner ({},{}) +{} steps", start.x, start.y, steps.len()) },
            PictureEntry::DrawXCorner{ start, steps } => { write!(f, "x-corner ({},{}) +{} steps", start.x, start.y, steps.len()) },
            PictureEntry::AbsLine(points) => { write!(f, "abs-line {} points", points.len()) },
            PictureEntry::RelLine{ start, deltas } => { write!(f, "rel-line ({},{}) +{} deltas", start.x, start.y, deltas.len()) },
            PictureEntry::Fill(points) => { write!(f, "fill {} seeds", points.len()) },
            PictureEntry::ChangePen(pen) => { write!(f, "pen {:02x}", pen) },
            PictureEntry::Plot(points) => { write!(f, "plot {} points", points.len()) },
        }
    }
}

impl PictureEntry {
    pub fn draw(&self, ctx: &mut PictureContext) -> Result<()> {
        match self {
            PictureEntry::ChangePicColor(c) => ctx.set_pic_color(*c),
            PictureEntry::ChangePriColor(c) => ctx.set_pri_color(*c),
            PictureEntry::DrawYCorner{ start, steps } => draw_corner(ctx, start, steps, false),
            PictureEntry::DrawXCorner{ start, steps } => draw_corner(ctx, start, steps, true),
            PictureEntry::AbsLine(points) => {
                if let [ p ] = points.as_slice() {
                    ctx.draw_line(p.x.into(), p.y.into(), p.x.into(), p.y.into());
                }
                for pair in points.windows(2) {
                    ctx.draw_line(pair[0].x.into(), pair[0].y.into(), pair[1].x.into(), pair[1].y.into());
                }
            },
            PictureEntry::RelLine{ start, deltas } => {
                let mut x: i32 = start.x.into();
                let mut y: i32 = start.y.into();
                ctx.put_pixel(x, y);
                for (dx, dy) in deltas {
                    let (x2, y2) = (x + *dx as i32, y + *dy as i32);
                    ctx.draw_line(x, y, x2, y2);
                    x = x2;
                    y = y2;
                }
            },
            PictureEntry::Fill(points) => {
                for p in points {
                    ctx.fill(p.x.into(), p.y.into());
                }
            },
            PictureEntry::ChangePen(pen) => ctx.pen_style = *pen,
            PictureEntry::Plot(points) => {
                for p in points {
                    ctx.plot(p.pattern, p.x.into(), p.y.into())?;
                }
            },
        }
        Ok(())
    }
}

fn draw_corner(ctx: &mut PictureContext, start: &Point, steps: &[u8], x_first: bool) {
    let mut x1: i32 = start.x.into();
    let mut y1: i32 = start.y.into();
    let mut change_x = x_first;
    for step in steps {
        let (x2, y2) = if change_x { (*step as i32, y1) } else { (x1, *step as i32) };
        ctx.draw_line(x1, y1, x2, y2);
        x1 = x2;
        y1 = y2;
        change_x = !change_x;
    }
}

/// A decoded picture resource: the drawing commands in stream order
pub struct Picture {
    pub entries: Vec<PictureEntry>,
}

impl Picture {
    /// Decodes an opcode stream. V3 pictures must be nibble-unpacked first.
    pub fn new(data: &[u8]) -> Result<Picture> {
        let mut rdr = CommandReader{ data, pos: 0 };
        let mut entries = Vec::new();
        let mut last_pen: u8 = 0;
        let mut terminated = false;

        while let Some(command) = rdr.read() {
            let entry = match command {
                CMD_CHANGE_PIC_COLOR => PictureEntry::ChangePicColor(rdr.read_color()),
                CMD_DISABLE_PIC_DRAW => PictureEntry::ChangePicColor(None),
                CMD_CHANGE_PRI_COLOR => PictureEntry::ChangePriColor(rdr.read_color()),
                CMD_DISABLE_PRI_DRAW => PictureEntry::ChangePriColor(None),
                CMD_DRAW_Y_CORNER | CMD_DRAW_X_CORNER => {
                    let Some(start) = rdr.read_point() else { break };
                    let mut steps = Vec::new();
                    while let Some(b) = rdr.read_param() {
                        steps.push(b);
                    }
                    if command == CMD_DRAW_X_CORNER {
                        PictureEntry::DrawXCorner{ start, steps }
                    } else {
                        PictureEntry::DrawYCorner{ start, steps }
                    }
                },
                CMD_DRAW_ABS_LINE => {
                    let Some(start) = rdr.read_point() else { break };
                    let mut points = vec![ start ];
                    while let Some(p) = rdr.read_param_point() {
                        points.push(p);
                    }
                    PictureEntry::AbsLine(points)
                },
                CMD_DRAW_REL_LINE => {
                    let Some(start) = rdr.read_point() else { break };
                    let mut deltas = Vec::new();
                    while let Some(b) = rdr.read_param() {
                        deltas.push(rel_delta(b));
                    }
                    PictureEntry::RelLine{ start, deltas }
                },
                CMD_FILL => {
                    let mut points = Vec::new();
                    while let Some(p) = rdr.read_param_point() {
                        points.push(p);
                    }
                    PictureEntry::Fill(points)
                },
                CMD_CHANGE_PEN => {
                    let Some(pen) = rdr.read() else { break };
                    last_pen = pen;
                    PictureEntry::ChangePen(pen)
                },
                CMD_PLOT => {
                    let mut points = Vec::new();
                    while let Some(b) = rdr.read_param() {
                        let point = if last_pen & PEN_SPLATTER != 0 {
                            let Some(p) = rdr.read_point() else { break };
                            PlotPoint{ pattern: Some((b >> 1) & 0x7f), x: p.x, y: p.y }
                        } else {
                            let Some(y) = rdr.read() else { break };
                            PlotPoint{ pattern: None, x: b, y }
                        };
                        points.push(point);
                    }
                    PictureEntry::Plot(points)
                },
                CMD_END => {
                    terminated = true;
                    break;
                },
                _ => {
                    return Err(anyhow!("picture: invalid command {:02x} at offset {}", command, rdr.pos - 1));
                }
            };
            entries.push(entry);
        }
        if !terminated {
            log::debug!("picture: stream ended without end command");
        }
        Ok(Picture{ entries })
    }

    /// Replays the picture onto a fresh context
    pub fn draw(&self) -> Result<PictureContext> {
        let mut ctx = PictureContext::new();
        self.overlay(&mut ctx)?;
        Ok(ctx)
    }

    /// Replays the picture onto `ctx`, keeping whatever was drawn before
    pub fn overlay(&self, ctx: &mut PictureContext) -> Result<()> {
        for entry in &self.entries {
            entry.draw(ctx)?;
        }
        Ok(())
    }
}
