extern crate agi_reenigne;

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use agi_reenigne::agigfx::{context, palette, util};
use agi_reenigne::agires::resource::{ResourceID, ResourceType};
use agi_reenigne::agiscript::print;
use agi_reenigne::game::Game;

#[derive(Subcommand)]
enum CliCommand {
    /// Shows version, signature and resource counts
    Info,
    /// Lists all resources
    List,
    /// Extracts decoded resources to individual files
    Extract {
        /// Output directory
        out_dir: PathBuf,
    },
    /// Disassembles logic.nnn
    Logic {
        /// Logic to decode
        logic_id: u16,
    },
    /// Renders picture.nnn to visual and priority bitmaps
    Picture {
        picture_id: u16,
        #[clap(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Renders picture.nnn as a raw 256-colour image
    Agi256 {
        picture_id: u16,
        /// AGIPAL palette number (default: standard VGA palette)
        #[clap(long)]
        palette: Option<u8>,
        #[clap(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Writes every cel of view.nnn as a bitmap
    View {
        view_id: u16,
        #[clap(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Lists the notes of sound.nnn
    Sound {
        sound_id: u16,
    },
    /// Displays the dictionary, or parses input against it
    Words {
        #[clap(long)]
        parse: Option<String>,
    },
    /// Displays the inventory objects
    Objects,
}

/// Decodes Sierra AGI resources
#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,
    /// Interpreter version to assume (default: taken from AGIDATA.OVL)
    #[clap(long)]
    version: Option<String>,
    /// Input directory
    in_dir: PathBuf,
    #[command(subcommand)]
    command: CliCommand
}

fn read_game_files(in_dir: &Path) -> Result<HashMap<String, Vec<u8>>> {
    let mut files = HashMap::new();
    for entry in std::fs::read_dir(in_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() { continue; }
        let name = entry.file_name().to_string_lossy().to_string();
        files.insert(name, std::fs::read(entry.path())?);
    }
    log::debug!("read {} files from {}", files.len(), in_dir.display());
    Ok(files)
}

fn info(game: &Game) -> Result<()> {
    println!("interpreter version: {}", game.version);
    if let Some(sig) = game.v3_signature() {
        println!("v3 signature: {}", sig);
    }
    if let Some(id) = game.game_id() {
        println!("game id: {}", id);
    }
    let entries = game.provider().get_entries();
    for rtype in [ ResourceType::Logic, ResourceType::Picture, ResourceType::View, ResourceType::Sound ] {
        println!("{:8} {}", rtype, entries.iter().filter(|id| id.rtype == rtype).count());
    }
    if let Some(words) = &game.words {
        println!("words    {}", words.len());
    }
    if let Some(objects) = &game.objects {
        println!("objects  {}", objects.len());
    }
    if !game.palettes.is_empty() {
        let nums: Vec<String> = game.palettes.iter().map(|(n, _)| format!("pal.{}", 100 + *n as u16)).collect();
        println!("palettes {}", nums.join(" "));
    }
    Ok(())
}

fn list(game: &Game) -> Result<()> {
    println!("resource      compr uncompr method  vol offset");
    for rid in game.provider().get_entries() {
        match game.provider().open(&rid) {
            Ok(resource) => {
                let info = &resource.info;
                println!("{:12} {:6}  {:6} {:7} {:3} {}", rid.to_string(), info.compressed_size,
                    info.uncompressed_size, info.compression_method.to_string(), info.volume, info.offset);
            },
            Err(e) => { println!("{:12} error: {:#}", rid.to_string(), e); }
        }
    }
    Ok(())
}

fn extract(game: &Game, out_dir: &Path) -> Result<()> {
    let mut ids = game.provider().get_entries();
    ids.push(ResourceID::new(ResourceType::Object, 0));
    ids.push(ResourceID::new(ResourceType::Word, 0));
    for rid in ids {
        let resource = match game.provider().open(&rid) {
            Ok(resource) => resource,
            Err(e) => {
                println!("  {}: skipped, {:#}", rid, e);
                continue;
            }
        };
        let fname = match rid.rtype {
            ResourceType::Object => "object".to_string(),
            ResourceType::Word => "words.tok".to_string(),
            _ => rid.to_string(),
        };
        println!("  {}: {} bytes ({})", fname, resource.data.len(), resource.info.compression_method);
        let mut r_file = File::create(out_dir.join(fname))?;
        r_file.write_all(&resource.data)?;
    }
    Ok(())
}

fn picture(game: &Game, picture_id: u16, out_dir: &Path) -> Result<()> {
    let pic = game.picture(picture_id)?;
    for entry in &pic.entries {
        log::debug!("{}", entry);
    }
    let ctx = pic.draw()?;
    let width = context::PICTURE_WIDTH as u32;
    let height = context::PICTURE_HEIGHT as u32;
    let ega = palette::ega_palette();
    let visual = out_dir.join(format!("picture.{:03}.visual.bmp", picture_id));
    let priority = out_dir.join(format!("picture.{:03}.priority.bmp", picture_id));
    util::render_rgba(&visual.to_string_lossy(), width, height, &ctx.visual)?;
    util::render_bitmap(&priority.to_string_lossy(), width, height, &ctx.priority, &ega)?;
    println!("wrote {} and {}", visual.display(), priority.display());
    Ok(())
}

fn agi256(game: &Game, picture_id: u16, palette_num: Option<u8>, out_dir: &Path) -> Result<()> {
    let image = game.agi256_picture(picture_id)?;
    let vga = match palette_num {
        Some(n) => {
            if !game.palettes.iter().any(|(num, _)| *num == n) {
                return Err(anyhow!("palette pal.{} not present", 100 + n as u16));
            }
            game.vga_palette(n)
        },
        None => palette::vga_palette(),
    };
    let fname = out_dir.join(format!("picture.{:03}.agi256.bmp", picture_id));
    util::render_bitmap(&fname.to_string_lossy(), context::PICTURE_WIDTH as u32, context::PICTURE_HEIGHT as u32, &image.pixels, &vga)?;
    println!("wrote {}", fname.display());
    Ok(())
}

fn view(game: &Game, view_id: u16, out_dir: &Path) -> Result<()> {
    let view = game.view(view_id)?;
    if !view.description.is_empty() {
        println!("description: {:?}", view.description);
    }
    let ega = palette::ega_palette();
    for (l, lp) in view.loops.iter().enumerate() {
        println!("loop {}: {} cels", l, lp.cels.len());
        for (c, cel) in lp.cels.iter().enumerate() {
            println!("  cel {}: {}x{} transparent {}", c, cel.width, cel.height, cel.transparent);
            if cel.width == 0 || cel.height == 0 { continue; }
            let fname = out_dir.join(format!("view.{:03}.{}.{}.bmp", view_id, l, c));
            util::render_bitmap(&fname.to_string_lossy(), cel.width.into(), cel.height.into(), &cel.pixels, &ega)?;
        }
    }
    Ok(())
}

fn sound(game: &Game, sound_id: u16) -> Result<()> {
    let sound = game.sound(sound_id)?;
    println!("sound.{:03}: {} notes, {} ticks", sound_id, sound.num_notes(), sound.duration());
    for (n, notes) in sound.channels.iter().enumerate() {
        println!("channel {}:", n);
        for note in notes {
            println!("  {}", note);
        }
    }
    Ok(())
}

fn words(game: &Game, parse: &Option<String>) -> Result<()> {
    let index = game.words.as_ref().ok_or_else(|| anyhow!("no usable WORDS.TOK"))?;
    match parse {
        Some(input) => {
            for word in index.parse(input) {
                match word.number {
                    Some(n) => println!("{} = {}", word.text, n),
                    None => println!("{} = ?", word.text),
                }
            }
            Ok(())
        },
        None => print::print_words(index),
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    let files = read_game_files(&args.in_dir)?;
    let game = Game::new(files, args.version.as_deref())?;

    match &args.command {
        CliCommand::Info => info(&game),
        CliCommand::List => list(&game),
        CliCommand::Extract{ out_dir } => extract(&game, out_dir),
        CliCommand::Logic{ logic_id } => {
            let script = game.logic(*logic_id)?;
            print::print_logic(&script)
        },
        CliCommand::Picture{ picture_id, out_dir } => picture(&game, *picture_id, out_dir),
        CliCommand::Agi256{ picture_id, palette, out_dir } => agi256(&game, *picture_id, *palette, out_dir),
        CliCommand::View{ view_id, out_dir } => view(&game, *view_id, out_dir),
        CliCommand::Sound{ sound_id } => sound(&game, *sound_id),
        CliCommand::Words{ parse } => words(&game, parse),
        CliCommand::Objects => {
            let objects = game.objects.as_ref().ok_or_else(|| anyhow!("no usable OBJECT file"))?;
            print::print_objects(objects)
        },
    }
}
